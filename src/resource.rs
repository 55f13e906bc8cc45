// ============================================================================
// src/resource.rs – Handle on one drbd resource and its (single) volume
// ============================================================================

use crate::drbd::{minor_dev, Drbd};
use crate::endpoint::Endpoint;
use crate::error::{DrbdError, Result};
use crate::show::ShowReport;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A resource as seen from this node. Tracks the one minor/volume pair and
/// meta device this handle has set up (or found via `scan`).
pub struct Resource<'d> {
    drbd: &'d Drbd,
    name: String,
    meta_dev: Option<PathBuf>,
    minor: Option<u32>,
    volume: Option<u32>,
}

impl<'d> Resource<'d> {
    /// `drbdsetup new-resource`, then pick up whatever the kernel reports.
    /// A failed scan removes the resource again.
    pub fn create(drbd: &'d Drbd, name: &str) -> Result<Self> {
        drbd.new_resource(name)?;
        let mut res = Self::handle(drbd, name);
        if let Err(err) = res.scan() {
            if let Err(undo) = drbd.del_resource(name) {
                warn!(resource = name, error = %undo, "del-resource after failed scan");
            }
            return Err(err);
        }
        Ok(res)
    }

    /// Wrap a resource that already exists; fails when `show all` does not
    /// list it.
    pub fn open(drbd: &'d Drbd, name: &str) -> Result<Self> {
        let report = drbd.show()?;
        if report.find(name).is_none() {
            return Err(DrbdError::ResourceNotFound(name.to_string()));
        }
        let mut res = Self::handle(drbd, name);
        res.adopt(&report);
        Ok(res)
    }

    fn handle(drbd: &'d Drbd, name: &str) -> Self {
        Self {
            drbd,
            name: name.to_string(),
            meta_dev: None,
            minor: None,
            volume: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn minor(&self) -> Option<u32> {
        self.minor
    }

    pub fn volume(&self) -> Option<u32> {
        self.volume
    }

    pub fn meta_dev(&self) -> Option<&Path> {
        self.meta_dev.as_deref()
    }

    /// Adopt minor/volume from `show all`. Fields stay untouched when the
    /// resource is not listed or has no minor bound yet.
    pub fn scan(&mut self) -> Result<()> {
        let report = self.drbd.show()?;
        self.adopt(&report);
        Ok(())
    }

    fn adopt(&mut self, report: &ShowReport) {
        let found = report
            .find(&self.name)
            .and_then(|r| r.primary_volume())
            .map(|v| (v.minor, v.volume));
        if let Some((minor, volume)) = found {
            debug!(resource = %self.name, ?minor, ?volume, "scanned");
            self.minor = minor;
            if volume.is_some() {
                self.volume = volume;
            }
        }
    }

    pub fn create_minor(&mut self, minor: u32, volume: u32) -> Result<()> {
        self.drbd.new_minor(&self.name, minor, volume)?;
        self.minor = Some(minor);
        self.volume = Some(volume);
        Ok(())
    }

    pub fn minor_dev(&self) -> Result<PathBuf> {
        Ok(minor_dev(self.require_minor()?))
    }

    /// No-op when no minor is bound.
    pub fn delete_minor(&mut self) -> Result<()> {
        let Some(minor) = self.minor else {
            return Ok(());
        };
        self.drbd.del_minor(minor)?;
        self.minor = None;
        self.volume = None;
        Ok(())
    }

    pub fn delete(&mut self) -> Result<()> {
        self.delete_minor()?;
        self.drbd.del_resource(&self.name)
    }

    pub fn create_meta_dev<P: AsRef<Path>>(&mut self, meta_dev: P) -> Result<()> {
        let minor = self.require_minor()?;
        self.drbd.create_md(minor, meta_dev.as_ref())?;
        self.meta_dev = Some(meta_dev.as_ref().to_path_buf());
        Ok(())
    }

    /// Attach `data_dev` as backing storage, using the meta device created
    /// earlier. `extra` is appended verbatim (e.g. `--on-io-error=detach`).
    pub fn attach<P: AsRef<Path>>(&self, data_dev: P, extra: &[String]) -> Result<()> {
        let minor = self.require_minor()?;
        let meta = self
            .meta_dev
            .as_deref()
            .ok_or_else(|| DrbdError::MetaDevUnset(self.name.clone()))?;
        self.drbd.attach(minor, data_dev.as_ref(), meta, extra)
    }

    pub fn detach(&self) -> Result<()> {
        self.drbd.detach(self.require_minor()?)
    }

    pub fn connect(&self, local: &Endpoint, remote: &Endpoint, extra: &[String]) -> Result<()> {
        self.drbd.connect(&self.name, local, remote, extra)
    }

    pub fn disconnect(&self, local: &Endpoint, remote: &Endpoint) -> Result<()> {
        self.drbd.disconnect(local, remote)
    }

    pub fn down(&self) -> Result<()> {
        self.drbd.down(&self.name)
    }

    pub fn set_primary(&self, force: bool) -> Result<()> {
        self.drbd.primary(self.require_minor()?, force)
    }

    pub fn set_secondary(&self) -> Result<()> {
        self.drbd.secondary(self.require_minor()?)
    }

    fn require_minor(&self) -> Result<u32> {
        self.minor
            .ok_or_else(|| DrbdError::MinorUnset(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drbd::testing::Scripted;
    use crate::drbd::Settings;

    const FOO: &str = "resource foo {\n    options {\n    }\n}\n";

    fn client() -> (Drbd, Scripted) {
        let exec = Scripted::new();
        (Drbd::new(exec.clone(), Settings::default()), exec)
    }

    #[test]
    fn create_runs_new_resource_then_scans() {
        let (drbd, exec) = client();
        exec.reply_stdout(""); // new-resource
        exec.reply_stdout(FOO);
        let res = Resource::create(&drbd, "foo").unwrap();
        assert_eq!(res.name(), "foo");
        assert_eq!(res.minor(), None);
        assert_eq!(res.volume(), None);
        assert_eq!(
            exec.calls(),
            vec!["drbdsetup new-resource foo", "drbdsetup show all"]
        );
    }

    #[test]
    fn open_adopts_own_minor_not_the_last_one_printed() {
        let (drbd, exec) = client();
        exec.reply_stdout(
            "resource foo { _this_host { volume 2 { device minor 4; } } }\n\
             resource bar { _this_host { volume 0 { device minor 9; } } }\n",
        );
        let res = Resource::open(&drbd, "foo").unwrap();
        assert_eq!(res.minor(), Some(4));
        assert_eq!(res.volume(), Some(2));
        assert_eq!(res.minor_dev().unwrap(), PathBuf::from("/dev/drbd4"));
    }

    #[test]
    fn open_rejects_unlisted_resource() {
        let (drbd, exec) = client();
        exec.reply_stdout("resource bar {\n}\n");
        let err = Resource::open(&drbd, "foo").err().unwrap();
        assert!(matches!(err, DrbdError::ResourceNotFound(ref n) if n == "foo"));
        assert_eq!(exec.calls(), vec!["drbdsetup show all"]);
    }

    #[test]
    fn create_failure_skips_scan() {
        let (drbd, exec) = client();
        exec.fail_on("drbdsetup new-resource", 10, "resource exists\n");
        assert!(Resource::create(&drbd, "foo").is_err());
        assert_eq!(exec.calls(), vec!["drbdsetup new-resource foo"]);
    }

    #[test]
    fn create_undoes_resource_when_scan_fails() {
        let (drbd, exec) = client();
        exec.reply_stdout(""); // new-resource
        exec.reply_stdout("resource foo { device minor x; }");
        let err = Resource::create(&drbd, "foo").err().unwrap();
        assert!(matches!(err, DrbdError::BadNumber { .. }));
        assert_eq!(
            exec.calls(),
            vec![
                "drbdsetup new-resource foo",
                "drbdsetup show all",
                "drbdsetup del-resource foo",
            ]
        );
    }

    #[test]
    fn minor_lifecycle() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO);
        let mut res = Resource::open(&drbd, "foo").unwrap();
        assert!(matches!(res.minor_dev(), Err(DrbdError::MinorUnset(_))));

        res.create_minor(0, 0).unwrap();
        assert_eq!(res.minor_dev().unwrap(), PathBuf::from("/dev/drbd0"));

        res.delete_minor().unwrap();
        assert_eq!(res.minor(), None);
        // second delete has nothing to do
        res.delete_minor().unwrap();

        assert_eq!(
            exec.calls(),
            vec![
                "drbdsetup show all",
                "drbdsetup new-minor foo 0 0",
                "drbdsetup del-minor 0",
            ]
        );
    }

    #[test]
    fn failed_new_minor_leaves_state_unset() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO);
        let mut res = Resource::open(&drbd, "foo").unwrap();
        exec.fail_on("drbdsetup new-minor", 10, "minor exists\n");
        assert!(res.create_minor(0, 0).is_err());
        assert_eq!(res.minor(), None);
    }

    #[test]
    fn delete_removes_minor_then_resource() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO);
        let mut res = Resource::open(&drbd, "foo").unwrap();
        res.create_minor(1, 0).unwrap();
        res.delete().unwrap();
        let calls = exec.calls();
        assert_eq!(
            &calls[2..],
            &["drbdsetup del-minor 1", "drbdsetup del-resource foo"]
        );
    }

    #[test]
    fn attach_requires_meta_dev() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO);
        let mut res = Resource::open(&drbd, "foo").unwrap();
        res.create_minor(0, 0).unwrap();
        assert!(matches!(
            res.attach("/dev/loop0", &[]),
            Err(DrbdError::MetaDevUnset(_))
        ));

        res.create_meta_dev("/dev/loop1").unwrap();
        assert_eq!(res.meta_dev(), Some(Path::new("/dev/loop1")));
        res.attach("/dev/loop0", &["--on-io-error=detach".to_string()])
            .unwrap();

        let calls = exec.calls();
        assert_eq!(
            calls.last().unwrap(),
            "drbdsetup attach 0 /dev/loop0 /dev/loop1 flexible --on-io-error=detach"
        );
    }

    #[test]
    fn role_and_detach_need_a_minor() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO);
        let mut res = Resource::open(&drbd, "foo").unwrap();
        assert!(matches!(res.set_primary(true), Err(DrbdError::MinorUnset(_))));
        assert!(matches!(res.set_secondary(), Err(DrbdError::MinorUnset(_))));
        assert!(matches!(res.detach(), Err(DrbdError::MinorUnset(_))));
        assert!(matches!(
            res.create_meta_dev("/dev/loop1"),
            Err(DrbdError::MinorUnset(_))
        ));
        assert_eq!(res.meta_dev(), None);
    }
}
