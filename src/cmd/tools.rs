// ============================================================================
// src/cmd/tools.rs – Locate drbdsetup/drbdmeta and run them
// ============================================================================

use super::{Cmd, Exec, OutputData, Tool};
use crate::error::{DrbdError, Result};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SystemTools {
    drbdsetup: Cmd,
    drbdmeta: Cmd,
}

impl SystemTools {
    /// Probe the standard install locations for both tools.
    pub fn discover(timeout: Duration) -> Result<Self> {
        Self::with_paths(None, None, timeout)
    }

    /// Use explicit paths where given, discovery otherwise. Explicit paths
    /// still have to pass the allowlist.
    pub fn with_paths(
        drbdsetup: Option<&str>,
        drbdmeta: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            drbdsetup: resolve(Tool::Drbdsetup, drbdsetup, timeout)?,
            drbdmeta: resolve(Tool::Drbdmeta, drbdmeta, timeout)?,
        })
    }

    pub fn path(&self, tool: Tool) -> &str {
        &self.cmd(tool).path
    }

    fn cmd(&self, tool: Tool) -> &Cmd {
        match tool {
            Tool::Drbdsetup => &self.drbdsetup,
            Tool::Drbdmeta => &self.drbdmeta,
        }
    }
}

impl Exec for SystemTools {
    fn exec(&self, tool: Tool, args: &[&str]) -> Result<OutputData> {
        self.cmd(tool).run(args, None)
    }
}

fn resolve(tool: Tool, explicit: Option<&str>, timeout: Duration) -> Result<Cmd> {
    if let Some(path) = explicit {
        return Cmd::new_allowlisted(path, timeout);
    }
    match find_binary(tool.candidates()) {
        Some(path) => Cmd::new_allowlisted(path, timeout),
        None => Err(DrbdError::ToolNotFound {
            tool: tool.name(),
            candidates: tool.candidates().iter().map(|s| s.to_string()).collect(),
        }),
    }
}

pub fn find_binary<'a>(candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|p| Path::new(p).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_must_be_allowlisted() {
        let err = SystemTools::with_paths(
            Some("/opt/drbd/bin/drbdsetup"),
            Some("/usr/sbin/drbdmeta"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, DrbdError::NotAllowlisted(p) if p == "/opt/drbd/bin/drbdsetup"));
    }

    #[test]
    fn explicit_paths_skip_probing() {
        let tools = SystemTools::with_paths(
            Some("/usr/local/sbin/drbdsetup"),
            Some("/usr/local/sbin/drbdmeta"),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(tools.path(Tool::Drbdsetup), "/usr/local/sbin/drbdsetup");
        assert_eq!(tools.path(Tool::Drbdmeta), "/usr/local/sbin/drbdmeta");
    }

    #[test]
    fn find_binary_returns_none_for_missing() {
        assert_eq!(find_binary(&["/nonexistent/drbdsetup"]), None);
    }
}
