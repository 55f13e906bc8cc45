// ============================================================================
// src/provision.rs – Bring-up / peering / teardown sequences
// ============================================================================
//! Each helper runs a fixed sequence of drbd operations. When a step fails
//! after the kernel already holds state for the resource, the helper undoes
//! what it can (`down`, `disconnect`) and returns the error of the step that
//! failed. Errors from the undo itself are logged, never returned.

use crate::drbd::Drbd;
use crate::endpoint::Endpoint;
use crate::error::{DrbdError, Result};
use crate::resource::Resource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything needed to bring one volume of a resource up locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub resource: String,
    pub minor: u32,
    pub volume: u32,
    pub data_dev: PathBuf,
    pub meta_dev: PathBuf,
    /// Appended to `drbdsetup attach`, e.g. `--on-io-error=detach`.
    #[serde(default)]
    pub attach_args: Vec<String>,
}

/// Local and remote address of one side of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub local: Endpoint,
    pub remote: Endpoint,
}

impl Link {
    pub fn new(local: Endpoint, remote: Endpoint) -> Self {
        Self { local, remote }
    }

    /// The same connection seen from the peer.
    pub fn reversed(&self) -> Self {
        Self {
            local: self.remote,
            remote: self.local,
        }
    }
}

/// new-resource → new-minor → create-md → attach. Any failure after the
/// resource exists takes it down again.
pub fn provision<'d>(drbd: &'d Drbd, spec: &VolumeSpec) -> Result<Resource<'d>> {
    let mut res = Resource::create(drbd, &spec.resource)?;
    if let Err(err) = bring_up(&mut res, spec) {
        unwind_down(&res, &err);
        return Err(err);
    }
    info!(resource = %spec.resource, minor = spec.minor, "volume provisioned");
    Ok(res)
}

fn bring_up(res: &mut Resource<'_>, spec: &VolumeSpec) -> Result<()> {
    res.create_minor(spec.minor, spec.volume)?;
    res.create_meta_dev(&spec.meta_dev)?;
    res.attach(&spec.data_dev, &spec.attach_args)
}

/// Provision, hand the resource to `f`, and always take it down afterwards.
/// `f`'s error wins over a teardown error.
pub fn with_volume<'d, T, F>(drbd: &'d Drbd, spec: &VolumeSpec, f: F) -> Result<T>
where
    F: FnOnce(&mut Resource<'d>) -> Result<T>,
{
    let mut res = provision(drbd, spec)?;
    let outcome = f(&mut res);
    let down = res.down();
    match (outcome, down) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(down_err)) => {
            warn!(resource = res.name(), error = %down_err, "down after failed body");
            Err(err)
        }
    }
}

/// Connect `a` to `b` and `b` back to `a`. If `b` cannot connect, `a` is
/// disconnected again.
pub fn connect_pair(
    a: &Resource<'_>,
    b: &Resource<'_>,
    a_link: &Link,
    extra: &[String],
) -> Result<()> {
    a.connect(&a_link.local, &a_link.remote, extra)?;
    let b_link = a_link.reversed();
    if let Err(err) = b.connect(&b_link.local, &b_link.remote, extra) {
        if let Err(undo) = a.disconnect(&a_link.local, &a_link.remote) {
            warn!(resource = a.name(), error = %undo, "disconnect after failed peer connect");
        }
        return Err(err);
    }
    Ok(())
}

/// Disconnect both sides; both are attempted, the first error is returned.
pub fn disconnect_pair(a: &Resource<'_>, b: &Resource<'_>, a_link: &Link) -> Result<()> {
    let first = a.disconnect(&a_link.local, &a_link.remote);
    let b_link = a_link.reversed();
    let second = b.disconnect(&b_link.local, &b_link.remote);
    first.and(second)
}

/// secondary → disconnect (when `link` is given) → detach → down.
/// Steps after the first failure are skipped except `down`, which always runs.
pub fn teardown(res: &Resource<'_>, link: Option<&Link>) -> Result<()> {
    let mut first: Option<DrbdError> = None;

    if res.minor().is_some() {
        first = res.set_secondary().err();
    }
    if first.is_none() {
        if let Some(link) = link {
            first = res.disconnect(&link.local, &link.remote).err();
        }
    }
    if first.is_none() && res.minor().is_some() {
        first = res.detach().err();
    }

    let down = res.down();
    match first {
        Some(err) => {
            if let Err(down_err) = down {
                warn!(resource = res.name(), error = %down_err, "down after failed teardown step");
            }
            Err(err)
        }
        None => down,
    }
}

fn unwind_down(res: &Resource<'_>, cause: &DrbdError) {
    warn!(resource = res.name(), error = %cause, "bring-up failed; taking resource down");
    if let Err(err) = res.down() {
        warn!(resource = res.name(), error = %err, "down during unwind failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drbd::testing::Scripted;
    use crate::drbd::Settings;

    const FOO_BAR: &str = "resource foo {\n}\nresource bar {\n}\n";

    fn client() -> (Drbd, Scripted) {
        let exec = Scripted::new();
        (Drbd::new(exec.clone(), Settings::default()), exec)
    }

    fn spec(name: &str, minor: u32) -> VolumeSpec {
        VolumeSpec {
            resource: name.to_string(),
            minor,
            volume: 0,
            data_dev: PathBuf::from("/dev/loop0"),
            meta_dev: PathBuf::from("/dev/loop1"),
            attach_args: vec!["--on-io-error=detach".to_string()],
        }
    }

    fn link() -> Link {
        Link::new(
            "ipv4:127.0.0.1:7788".parse().unwrap(),
            "ipv4:127.0.0.1:7789".parse().unwrap(),
        )
    }

    #[test]
    fn provision_runs_full_bring_up() {
        let (drbd, exec) = client();
        let res = provision(&drbd, &spec("foo", 0)).unwrap();
        assert_eq!(res.minor(), Some(0));
        assert_eq!(
            exec.calls(),
            vec![
                "drbdsetup new-resource foo",
                "drbdsetup show all",
                "drbdsetup new-minor foo 0 0",
                "drbdmeta --force /dev/drbd0 v08 /dev/loop1 flex-external create-md",
                "drbdsetup attach 0 /dev/loop0 /dev/loop1 flexible --on-io-error=detach",
            ]
        );
    }

    #[test]
    fn failed_attach_takes_resource_down() {
        let (drbd, exec) = client();
        exec.fail_on("drbdsetup attach", 10, "(114) Lower device is already claimed\n");
        let err = provision(&drbd, &spec("foo", 0)).err().unwrap();
        assert!(err.to_string().contains("already claimed"));
        assert_eq!(exec.calls().last().unwrap(), "drbdsetup down foo");
    }

    #[test]
    fn failed_new_resource_has_nothing_to_unwind() {
        let (drbd, exec) = client();
        exec.fail_on("drbdsetup new-resource", 10, "exists\n");
        assert!(provision(&drbd, &spec("foo", 0)).is_err());
        assert_eq!(exec.calls(), vec!["drbdsetup new-resource foo"]);
    }

    #[test]
    fn unwind_error_does_not_mask_cause() {
        let (drbd, exec) = client();
        exec.fail_on("drbdmeta", 20, "open(/dev/loop1) failed\n");
        exec.fail_on("drbdsetup down", 11, "down failed\n");
        let err = provision(&drbd, &spec("foo", 0)).err().unwrap();
        assert!(err.to_string().starts_with("drbdmeta create-md"));
    }

    #[test]
    fn with_volume_always_downs() {
        let (drbd, exec) = client();
        let minor = with_volume(&drbd, &spec("foo", 3), |res| {
            res.set_primary(true)?;
            res.set_secondary()?;
            res.detach()?;
            Ok(res.minor())
        })
        .unwrap();
        assert_eq!(minor, Some(3));
        let calls = exec.calls();
        assert_eq!(
            &calls[5..],
            &[
                "drbdsetup primary 3 --force",
                "drbdsetup secondary 3",
                "drbdsetup detach 3",
                "drbdsetup down foo",
            ]
        );
    }

    #[test]
    fn with_volume_reports_body_error_and_still_downs() {
        let (drbd, exec) = client();
        exec.fail_on("drbdsetup primary", 17, "Refusing to be Primary\n");
        let err = with_volume(&drbd, &spec("foo", 0), |res| res.set_primary(false))
            .unwrap_err();
        assert!(err.to_string().starts_with("drbdsetup primary"));
        assert_eq!(exec.calls().last().unwrap(), "drbdsetup down foo");
    }

    #[test]
    fn connect_pair_connects_both_directions() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO_BAR).reply_stdout(FOO_BAR);
        let foo = Resource::open(&drbd, "foo").unwrap();
        let bar = Resource::open(&drbd, "bar").unwrap();
        connect_pair(&foo, &bar, &link(), &[]).unwrap();
        disconnect_pair(&foo, &bar, &link()).unwrap();
        let calls = exec.calls();
        assert_eq!(
            &calls[2..],
            &[
                "drbdsetup connect foo ipv4:127.0.0.1:7788 ipv4:127.0.0.1:7789 --protocol C --after-sb-0pri discard-zero-changes",
                "drbdsetup connect bar ipv4:127.0.0.1:7789 ipv4:127.0.0.1:7788 --protocol C --after-sb-0pri discard-zero-changes",
                "drbdsetup disconnect ipv4:127.0.0.1:7788 ipv4:127.0.0.1:7789",
                "drbdsetup disconnect ipv4:127.0.0.1:7789 ipv4:127.0.0.1:7788",
            ]
        );
    }

    #[test]
    fn connect_pair_rolls_back_first_side() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO_BAR).reply_stdout(FOO_BAR);
        let foo = Resource::open(&drbd, "foo").unwrap();
        let bar = Resource::open(&drbd, "bar").unwrap();
        exec.fail_on("drbdsetup connect bar", 10, "no such resource\n");
        assert!(connect_pair(&foo, &bar, &link(), &[]).is_err());
        assert_eq!(
            exec.calls().last().unwrap(),
            "drbdsetup disconnect ipv4:127.0.0.1:7788 ipv4:127.0.0.1:7789"
        );
    }

    #[test]
    fn teardown_sequence_with_link() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO_BAR);
        let mut res = Resource::open(&drbd, "foo").unwrap();
        res.create_minor(0, 0).unwrap();
        teardown(&res, Some(&link())).unwrap();
        let calls = exec.calls();
        assert_eq!(
            &calls[2..],
            &[
                "drbdsetup secondary 0",
                "drbdsetup disconnect ipv4:127.0.0.1:7788 ipv4:127.0.0.1:7789",
                "drbdsetup detach 0",
                "drbdsetup down foo",
            ]
        );
    }

    #[test]
    fn teardown_without_minor_only_downs() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO_BAR);
        let res = Resource::open(&drbd, "foo").unwrap();
        teardown(&res, None).unwrap();
        assert_eq!(exec.calls(), vec!["drbdsetup show all", "drbdsetup down foo"]);
    }

    #[test]
    fn teardown_skips_to_down_after_failure() {
        let (drbd, exec) = client();
        exec.reply_stdout(FOO_BAR);
        let mut res = Resource::open(&drbd, "foo").unwrap();
        res.create_minor(0, 0).unwrap();
        exec.fail_on("drbdsetup secondary", 11, "device is held open\n");
        let err = teardown(&res, Some(&link())).unwrap_err();
        assert!(err.to_string().starts_with("drbdsetup secondary"));
        let calls = exec.calls();
        assert_eq!(
            &calls[2..],
            &["drbdsetup secondary 0", "drbdsetup down foo"]
        );
    }
}
