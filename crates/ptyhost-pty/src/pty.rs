//! Low-level PTY allocation and shell spawning
//!
//! Provides platform-specific PTY handling for Unix-like systems

use crate::PtyError;
use nix::pty::{openpty, OpenptyResult, Winsize};
use nix::unistd::{fork, ForkResult, Pid};
use std::ffi::{CStr, CString};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::debug;

/// Status the child exits with when the shell cannot be exec'd
pub const EXEC_FAILED_STATUS: i32 = 127;

/// Parent-side handles of a freshly spawned shell
#[derive(Debug)]
pub struct Spawned {
    pub master: OwnedFd,
    pub child: Pid,
}

/// Allocate a PTY pair sized to `winsize` and run `shell` on its slave side.
///
/// The shell gets no arguments besides argv[0] (its file name) and inherits
/// the environment and working directory.
pub fn spawn_shell(shell: &Path, winsize: &Winsize) -> Result<Spawned, PtyError> {
    // Everything the child needs is allocated before forking
    let path = CString::new(shell.as_os_str().as_bytes())
        .map_err(|_| PtyError::PtyCreation(format!("shell path contains NUL: {}", shell.display())))?;
    let argv0 = shell
        .file_name()
        .map(|name| CString::new(name.as_bytes()))
        .transpose()
        .map_err(|_| PtyError::PtyCreation("shell name contains NUL".to_string()))?
        .unwrap_or_else(|| path.clone());
    let argv = [argv0.as_ptr(), std::ptr::null()];

    let OpenptyResult { master, slave } = openpty(Some(winsize), None)
        .map_err(|e| PtyError::PtyCreation(format!("openpty failed: {e}")))?;

    match unsafe { fork() }.map_err(|e| PtyError::PtyCreation(format!("fork failed: {e}")))? {
        ForkResult::Parent { child } => {
            // The child holds its own copy of the slave
            drop(slave);
            debug!(pid = child.as_raw(), shell = %shell.display(), "spawned shell");
            Ok(Spawned { master, child })
        }
        ForkResult::Child => unsafe {
            exec_on_slave(master.as_raw_fd(), slave.as_raw_fd(), &path, &argv)
        },
    }
}

/// Runs in the forked child; only async-signal-safe calls from here on.
unsafe fn exec_on_slave(
    master: RawFd,
    slave: RawFd,
    path: &CStr,
    argv: &[*const libc::c_char],
) -> ! {
    libc::close(master);

    // New session with the slave as controlling terminal
    if libc::setsid() == -1 {
        libc::_exit(EXEC_FAILED_STATUS);
    }
    if libc::ioctl(slave, libc::TIOCSCTTY as _, 0) == -1 {
        libc::_exit(EXEC_FAILED_STATUS);
    }

    for target in 0..=2 {
        if libc::dup2(slave, target) == -1 {
            libc::_exit(EXEC_FAILED_STATUS);
        }
    }
    if slave > 2 {
        libc::close(slave);
    }

    // The parent echoes locally, so the slave must not
    let mut attrs: libc::termios = std::mem::zeroed();
    if libc::tcgetattr(0, &mut attrs) == 0 {
        attrs.c_lflag &= !libc::ECHO;
        libc::tcsetattr(0, libc::TCSANOW, &attrs);
    }

    libc::execv(path.as_ptr(), argv.as_ptr());
    libc::_exit(EXEC_FAILED_STATUS)
}
