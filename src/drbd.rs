// ============================================================================
// src/drbd.rs – drbdsetup / drbdmeta subcommands
// ============================================================================

use crate::cmd::{Exec, OutputData, SystemTools, Tool};
use crate::config::ConfigFile;
use crate::endpoint::Endpoint;
use crate::error::{DrbdError, Result};
use crate::show::{parse_show, ShowReport};
use crate::util::audit::audit_log;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Knobs baked into the argument lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub meta_format: String,
    pub meta_index: String,
    pub attach_index: String,
    pub protocol: String,
    pub after_sb_0pri: String,
    pub audit_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from(&ConfigFile::default())
    }
}

impl From<&ConfigFile> for Settings {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            meta_format: cfg.meta.format.clone(),
            meta_index: cfg.meta.index.clone(),
            attach_index: cfg.meta.attach_index.clone(),
            protocol: cfg.net.protocol.clone(),
            after_sb_0pri: cfg.net.after_sb_0pri.clone(),
            audit_path: cfg.audit.enabled.then(|| PathBuf::from(&cfg.audit.path)),
        }
    }
}

/// Block device node of a minor.
pub fn minor_dev(minor: u32) -> PathBuf {
    PathBuf::from(format!("/dev/drbd{minor}"))
}

pub struct Drbd {
    exec: Box<dyn Exec>,
    settings: Settings,
}

impl Drbd {
    pub fn new<E: Exec + 'static>(exec: E, settings: Settings) -> Self {
        Self {
            exec: Box::new(exec),
            settings,
        }
    }

    /// Locate the tools (honouring configured paths) and apply the config.
    pub fn discover(cfg: &ConfigFile) -> Result<Self> {
        let tools = SystemTools::with_paths(
            cfg.tools.drbdsetup_path.as_deref(),
            cfg.tools.drbdmeta_path.as_deref(),
            Duration::from_secs(cfg.tools.timeout_secs.max(1)),
        )?;
        Ok(Self::new(tools, Settings::from(cfg)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ------------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------------

    pub fn new_resource(&self, name: &str) -> Result<()> {
        self.setup("new-resource", &[name])
    }

    pub fn del_resource(&self, name: &str) -> Result<()> {
        self.setup("del-resource", &[name])
    }

    pub fn down(&self, name: &str) -> Result<()> {
        self.setup("down", &[name])
    }

    // ------------------------------------------------------------------------
    // Minors and backing storage
    // ------------------------------------------------------------------------

    pub fn new_minor(&self, name: &str, minor: u32, volume: u32) -> Result<()> {
        self.setup(
            "new-minor",
            &[name, minor.to_string().as_str(), volume.to_string().as_str()],
        )
    }

    pub fn del_minor(&self, minor: u32) -> Result<()> {
        self.setup("del-minor", &[minor.to_string().as_str()])
    }

    /// Initialise external meta-data for `minor` on `meta_dev`.
    pub fn create_md(&self, minor: u32, meta_dev: &Path) -> Result<()> {
        let dev = minor_dev(minor);
        let dev = dev.to_string_lossy();
        let meta = meta_dev.to_string_lossy();
        let args = [
            "--force",
            &*dev,
            self.settings.meta_format.as_str(),
            &*meta,
            self.settings.meta_index.as_str(),
            "create-md",
        ];
        self.mutate("drbdmeta create-md", Tool::Drbdmeta, &args)
    }

    pub fn attach(
        &self,
        minor: u32,
        data_dev: &Path,
        meta_dev: &Path,
        extra: &[String],
    ) -> Result<()> {
        let minor = minor.to_string();
        let data = data_dev.to_string_lossy();
        let meta = meta_dev.to_string_lossy();
        let mut args: Vec<&str> = vec![
            minor.as_str(),
            &*data,
            &*meta,
            self.settings.attach_index.as_str(),
        ];
        args.extend(extra.iter().map(String::as_str));
        self.setup("attach", &args)
    }

    pub fn detach(&self, minor: u32) -> Result<()> {
        self.setup("detach", &[minor.to_string().as_str()])
    }

    // ------------------------------------------------------------------------
    // Peering
    // ------------------------------------------------------------------------

    pub fn connect(
        &self,
        name: &str,
        local: &Endpoint,
        remote: &Endpoint,
        extra: &[String],
    ) -> Result<()> {
        let local = local.to_string();
        let remote = remote.to_string();
        let mut args: Vec<&str> = vec![
            name,
            local.as_str(),
            remote.as_str(),
            "--protocol",
            self.settings.protocol.as_str(),
            "--after-sb-0pri",
            self.settings.after_sb_0pri.as_str(),
        ];
        args.extend(extra.iter().map(String::as_str));
        self.setup("connect", &args)
    }

    pub fn disconnect(&self, local: &Endpoint, remote: &Endpoint) -> Result<()> {
        self.setup(
            "disconnect",
            &[local.to_string().as_str(), remote.to_string().as_str()],
        )
    }

    // ------------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------------

    pub fn primary(&self, minor: u32, force: bool) -> Result<()> {
        let minor = minor.to_string();
        let mut args = vec![minor.as_str()];
        if force {
            args.push("--force");
        }
        self.setup("primary", &args)
    }

    pub fn secondary(&self, minor: u32) -> Result<()> {
        self.setup("secondary", &[minor.to_string().as_str()])
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    /// Raw `drbdsetup show all` text.
    pub fn show_all(&self) -> Result<String> {
        let out = self.run_checked("drbdsetup show", Tool::Drbdsetup, &["show", "all"])?;
        Ok(out.stdout)
    }

    pub fn show(&self) -> Result<ShowReport> {
        parse_show(&self.show_all()?)
    }

    /// Names of all configured resources, in the order drbdsetup prints them.
    pub fn list_resources(&self) -> Result<Vec<String>> {
        Ok(self.show()?.resource_names())
    }

    // ------------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------------

    fn setup(&self, sub: &str, rest: &[&str]) -> Result<()> {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(sub);
        args.extend_from_slice(rest);
        self.mutate(&format!("drbdsetup {sub}"), Tool::Drbdsetup, &args)
    }

    /// State-changing invocation; logged and audited on success.
    fn mutate(&self, prefix: &str, tool: Tool, args: &[&str]) -> Result<()> {
        self.run_checked(prefix, tool, args)?;
        let line = args.join(" ");
        info!(op = prefix, args = %line, "ok");
        if let Some(path) = &self.settings.audit_path {
            audit_log(path, prefix, &line);
        }
        Ok(())
    }

    fn run_checked(&self, prefix: &str, tool: Tool, args: &[&str]) -> Result<OutputData> {
        debug!(%tool, ?args, "running");
        let out = self.exec.exec(tool, args)?;
        if !out.success() {
            return Err(DrbdError::CommandFailed {
                prefix: prefix.to_string(),
                status: out.status,
                output: out.combined(),
            });
        }
        Ok(out)
    }
}
