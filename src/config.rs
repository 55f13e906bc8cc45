// ============================================================================
// src/config.rs – strict config loader
// ============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/drbd-shim.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tools {
    #[serde(default)]
    pub drbdsetup_path: Option<String>,
    #[serde(default)]
    pub drbdmeta_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            drbdsetup_path: None,
            drbdmeta_path: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Meta {
    /// drbdmeta on-disk format version.
    #[serde(default = "default_meta_format")]
    pub format: String,
    /// drbdmeta meta-data index for external meta devices.
    #[serde(default = "default_meta_index")]
    pub index: String,
    /// Meta-data index argument passed to `drbdsetup attach`.
    #[serde(default = "default_attach_index")]
    pub attach_index: String,
}

fn default_meta_format() -> String {
    "v08".to_string()
}

fn default_meta_index() -> String {
    "flex-external".to_string()
}

fn default_attach_index() -> String {
    "flexible".to_string()
}

impl Default for Meta {
    fn default() -> Self {
        Self {
            format: default_meta_format(),
            index: default_meta_index(),
            attach_index: default_attach_index(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Net {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Split-brain policy when neither side was primary.
    #[serde(default = "default_after_sb_0pri")]
    pub after_sb_0pri: String,
}

fn default_protocol() -> String {
    "C".to_string()
}

fn default_after_sb_0pri() -> String {
    "discard-zero-changes".to_string()
}

impl Default for Net {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            after_sb_0pri: default_after_sb_0pri(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Audit {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_audit_path")]
    pub path: String,
}

fn default_audit_path() -> String {
    "/var/log/drbd-shim.log".to_string()
}

impl Default for Audit {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_audit_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub tools: Tools,
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub net: Net,
    #[serde(default)]
    pub audit: Audit,
}

impl ConfigFile {
    pub fn load<P: AsRef<Path>>(p: P) -> Result<Self> {
        let s = fs::read_to_string(&p)
            .with_context(|| format!("read config: {}", p.as_ref().display()))?;
        let cfg: Self = if p.as_ref().extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&s).context("toml parse")?
        } else {
            serde_yaml::from_str(&s).context("yaml parse")?
        };
        Ok(cfg)
    }

    /// Load `p` when given (it must exist); otherwise the default path if it
    /// exists, else built-in defaults.
    pub fn load_or_default(p: Option<&Path>) -> Result<Self> {
        match p {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }
}
