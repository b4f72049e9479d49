//! Run the hypervisor and wait for it to exit

use std::ffi::OsStr;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use super::args::EXTRA_FD_BASE;
use crate::{Error, Result};

/// Binary looked up in `PATH` when no explicit path is configured.
pub const DEFAULT_QEMU_BINARY: &str = "qemu-system-x86_64";

/// Sink for launch diagnostics.
pub trait LaunchLog {
    fn info(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Discards everything. Used when no sink is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl LaunchLog for NullLog {
    fn info(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
}

/// Forwards to `tracing` under the `vmlaunch::launch` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl LaunchLog for TracingLog {
    fn info(&self, msg: &str) {
        tracing::info!(target: "vmlaunch::launch", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "vmlaunch::launch", "{}", msg);
    }
}

/// Launch `path` (or [`DEFAULT_QEMU_BINARY`]) with `params` and block until it exits.
///
/// `fds[i]` is inherited by the child as descriptor `3 + i`. Standard
/// error is captured; standard input and output go to `/dev/null`.
///
/// On a non-zero exit the captured standard error is returned inside
/// [`Error::Exited`].
pub fn launch_custom_qemu(
    path: Option<&Path>,
    params: &[String],
    fds: &[BorrowedFd<'_>],
    log: Option<&dyn LaunchLog>,
) -> Result<()> {
    let log = log.unwrap_or(&NullLog);

    let program = match path {
        Some(p) if !p.as_os_str().is_empty() => p.as_os_str(),
        _ => OsStr::new(DEFAULT_QEMU_BINARY),
    };

    let mut cmd = Command::new(program);
    cmd.args(params)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    if !fds.is_empty() {
        let raw: Vec<RawFd> = fds.iter().map(|fd| fd.as_raw_fd()).collect();
        log.info(&format!("Adding extra files {:?}", raw));
        inherit_extra_files(&mut cmd, raw);
    }

    log.info(&format!(
        "launching {} with: {:?}",
        program.to_string_lossy(),
        params
    ));

    let output = match cmd.output() {
        Ok(output) => output,
        Err(e) => {
            log.error(&format!("Unable to launch {}: {}", program.to_string_lossy(), e));
            return Err(Error::Spawn {
                program: program.to_string_lossy().into_owned(),
                source: e,
            });
        }
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    log.error(&format!(
        "Unable to launch {}: {}",
        program.to_string_lossy(),
        output.status
    ));
    log.error(&stderr);

    Err(Error::Exited {
        status: output.status,
        stderr,
    })
}

/// Arrange for `fds[i]` to appear as `EXTRA_FD_BASE + i` in the child.
fn inherit_extra_files(cmd: &mut Command, mut fds: Vec<RawFd>) {
    let floor = EXTRA_FD_BASE + fds.len() as RawFd;

    // SAFETY: the hook runs between fork and exec and only calls
    // async-signal-safe functions on memory allocated before the fork.
    unsafe {
        cmd.pre_exec(move || {
            // Move every source above the target range first so that
            // dup2 never clobbers a source that is still pending.
            for fd in fds.iter_mut() {
                let moved = libc::fcntl(*fd, libc::F_DUPFD_CLOEXEC, floor);
                if moved < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                *fd = moved;
            }

            // dup2 clears FD_CLOEXEC on the target.
            for (i, fd) in fds.iter().enumerate() {
                if libc::dup2(*fd, EXTRA_FD_BASE + i as RawFd) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
            }

            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingLog {
        infos: RefCell<Vec<String>>,
        errors: RefCell<Vec<String>>,
    }

    impl LaunchLog for RecordingLog {
        fn info(&self, msg: &str) {
            self.infos.borrow_mut().push(msg.to_string());
        }

        fn error(&self, msg: &str) {
            self.errors.borrow_mut().push(msg.to_string());
        }
    }

    fn sh() -> Option<&'static Path> {
        Some(Path::new("/bin/sh"))
    }

    #[test]
    fn test_success_returns_ok() {
        let params = vec!["-c".to_string(), "exit 0".to_string()];
        assert!(launch_custom_qemu(sh(), &params, &[], None).is_ok());
    }

    #[test]
    fn test_failure_captures_stderr() {
        let params = vec!["-c".to_string(), "printf boom >&2; exit 3".to_string()];
        let log = RecordingLog::default();

        let err = launch_custom_qemu(sh(), &params, &[], Some(&log)).unwrap_err();
        assert_eq!(err.stderr(), "boom");
        assert!(matches!(err, Error::Exited { .. }));
        assert!(log.errors.borrow().iter().any(|m| m == "boom"));
        assert!(log.infos.borrow()[0].starts_with("launching /bin/sh"));
    }

    #[test]
    fn test_spawn_failure() {
        let missing = Path::new("/nonexistent/qemu-system-x86_64");
        let err = launch_custom_qemu(Some(missing), &[], &[], None).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert_eq!(err.stderr(), "");
    }
}
