// ============================================================================
// src/cmd/base.rs – Allowlisted external command runner (drbd userland tools)
// ============================================================================

use crate::error::{DrbdError, Result};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Every path a drbd userland binary may be spawned from.
/// Must stay in sync with `Tool::candidates`.
const ALLOWED: &[&str] = &[
    "/sbin/drbdsetup",
    "/usr/sbin/drbdsetup",
    "/usr/local/sbin/drbdsetup",
    "/bin/drbdsetup",
    "/usr/bin/drbdsetup",
    "/sbin/drbdmeta",
    "/usr/sbin/drbdmeta",
    "/usr/local/sbin/drbdmeta",
    "/bin/drbdmeta",
    "/usr/bin/drbdmeta",
];

/// Safe wrapper for external process execution. No shell is involved; the
/// binary must live at one of the allowlisted locations.
#[derive(Clone, Debug)]
pub struct Cmd {
    pub path: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputData {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl OutputData {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stdout followed by stderr, the way an interactive user would have seen it.
    pub fn combined(&self) -> String {
        let mut s = String::with_capacity(self.stdout.len() + self.stderr.len());
        s.push_str(&self.stdout);
        s.push_str(&self.stderr);
        s
    }
}

impl Cmd {
    pub fn new_allowlisted<S: Into<String>>(path: S, timeout: Duration) -> Result<Self> {
        let path = path.into();
        if !ALLOWED.contains(&path.as_str()) {
            return Err(DrbdError::NotAllowlisted(path));
        }
        Ok(Self { path, timeout })
    }

    /// Run with arguments, returning whatever the process produced. A non-zero
    /// exit is not an error at this layer.
    pub fn run(&self, args: &[&str], input: Option<&[u8]>) -> Result<OutputData> {
        debug!(cmd = %self.path, args = ?args, "exec");

        let mut child = Command::new(&self.path)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DrbdError::Spawn {
                path: self.path.clone(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty `show all` cannot fill a
        // pipe buffer and stall the child while we feed it or poll for exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        if let Some(bytes) = input {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(source) = stdin.write_all(bytes) {
                    warn!(cmd = %self.path, error = %source, "writing stdin failed; killing child");
                    drop(stdin);
                    reap(&mut child);
                    return Err(DrbdError::WriteInput {
                        path: self.path.clone(),
                        source,
                    });
                }
            }
        }

        let status = self.wait_with_timeout(&mut child)?;
        Ok(OutputData {
            stdout: collect(stdout),
            stderr: collect(stderr),
            status,
        })
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<i32> {
        let start = Instant::now();
        loop {
            let polled = child.try_wait().map_err(|source| DrbdError::Spawn {
                path: self.path.clone(),
                source,
            })?;
            if let Some(status) = polled {
                return Ok(status.code().unwrap_or(-1));
            }
            if start.elapsed() > self.timeout {
                warn!(cmd = %self.path, timeout = ?self.timeout, "command timed out; terminating");
                // Best effort terminate, then kill.
                #[cfg(unix)]
                {
                    use nix::sys::signal::{kill, Signal::SIGTERM};
                    use nix::unistd::Pid;
                    let _ = kill(Pid::from_raw(child.id() as i32), SIGTERM);
                }
                thread::sleep(Duration::from_millis(200));
                reap(child);
                return Err(DrbdError::Timeout {
                    path: self.path.clone(),
                    after: self.timeout,
                });
            }
            thread::sleep(Duration::from_millis(30));
        }
    }
}

/// Kill (if still running) and wait, so no zombie is left behind.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{Cmd, OutputData};
    use crate::cmd::Tool;
    use crate::error::DrbdError;
    use std::time::Duration;

    #[test]
    fn tool_candidates_are_allowlisted() {
        for tool in [Tool::Drbdsetup, Tool::Drbdmeta] {
            for path in tool.candidates() {
                assert!(
                    Cmd::new_allowlisted(*path, Duration::from_secs(1)).is_ok(),
                    "expected {path} to be allowlisted"
                );
            }
        }
    }

    #[test]
    fn foreign_binaries_are_rejected() {
        for path in ["/bin/sh", "/usr/bin/bash", "drbdsetup", "/tmp/drbdsetup"] {
            match Cmd::new_allowlisted(path, Duration::from_secs(1)) {
                Err(DrbdError::NotAllowlisted(p)) => assert_eq!(p, path),
                other => panic!("expected {path} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn failed_stdin_write_reaps_child() {
        // `true` never reads stdin; a write larger than the pipe buffer
        // fails once it exits.
        let cmd = Cmd {
            path: "true".into(),
            timeout: Duration::from_secs(5),
        };
        let input = vec![b'x'; 4 << 20];
        match cmd.run(&[], Some(&input)) {
            Err(DrbdError::WriteInput { path, .. }) => assert_eq!(path, "true"),
            other => panic!("expected a stdin write failure, got {other:?}"),
        }
    }

    #[test]
    fn combined_output_puts_stdout_first() {
        let out = OutputData {
            stdout: "out\n".into(),
            stderr: "err\n".into(),
            status: 10,
        };
        assert_eq!(out.combined(), "out\nerr\n");
        assert!(!out.success());
    }
}
