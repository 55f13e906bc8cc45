// ============================================================================
// src/cmd/mod.rs – command subsystem root
// ============================================================================
pub mod base; // allowlisted process runner (Cmd, OutputData)
pub mod tools; // drbdsetup/drbdmeta discovery

pub use base::{Cmd, OutputData};
pub use tools::SystemTools;

use crate::error::Result;

/// The userland binaries this crate knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tool {
    Drbdsetup,
    Drbdmeta,
}

impl Tool {
    pub fn name(self) -> &'static str {
        match self {
            Tool::Drbdsetup => "drbdsetup",
            Tool::Drbdmeta => "drbdmeta",
        }
    }

    /// Install locations probed by discovery, in order.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            Tool::Drbdsetup => &[
                "/sbin/drbdsetup",
                "/usr/sbin/drbdsetup",
                "/usr/local/sbin/drbdsetup",
                "/bin/drbdsetup",
                "/usr/bin/drbdsetup",
            ],
            Tool::Drbdmeta => &[
                "/sbin/drbdmeta",
                "/usr/sbin/drbdmeta",
                "/usr/local/sbin/drbdmeta",
                "/bin/drbdmeta",
                "/usr/bin/drbdmeta",
            ],
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Seam between argument building and process spawning.
pub trait Exec {
    fn exec(&self, tool: Tool, args: &[&str]) -> Result<OutputData>;
}
