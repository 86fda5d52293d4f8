//! High-level PTY session management
//!
//! A [`PtySession`] owns the master descriptor and the child pid of one
//! spawned shell and is the only place either is released.

use crate::io::write_all;
use crate::pty::spawn_shell;
use crate::size::{self, set_terminal_size, terminal_size, terminal_size_or_default};
use crate::PtyError;
use nix::errno::Errno;
use nix::pty::Winsize;
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{tcgetpgrp, Pid};
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// How long a terminated child gets before it is sent SIGKILL
pub const DEFAULT_REAP_GRACE: Duration = Duration::from_millis(500);

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How the child shell ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    Signaled(Signal),
}

impl ChildStatus {
    fn from_wait(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(Self::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(Self::Signaled(signal)),
            _ => None,
        }
    }

    /// Shell-style exit code (128 + signal number for a signal death)
    pub fn code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => 128 + *signal as i32,
        }
    }
}

/// A shell running on the slave side of a PTY
pub struct PtySession {
    master: Option<OwnedFd>,
    child: Option<Pid>,
    status: Option<ChildStatus>,

    /// Terminal whose geometry the PTY mirrors on resize
    size_source: Option<RawFd>,

    reap_grace: Duration,
}

impl PtySession {
    /// Spawn `shell` sized to the process's stdout terminal
    pub fn open(shell: impl AsRef<Path>) -> Result<Self, PtyError> {
        SessionBuilder::new().shell(shell).build()
    }

    /// Master side of the PTY while the session is active
    pub fn master(&self) -> Option<BorrowedFd<'_>> {
        self.master.as_ref().map(|fd| fd.as_fd())
    }

    /// Child pid until it has been reaped
    pub fn pid(&self) -> Option<Pid> {
        self.child
    }

    pub fn is_active(&self) -> bool {
        self.master.is_some() && self.child.is_some()
    }

    /// Exit status of the child once it has been reaped
    pub fn status(&self) -> Option<ChildStatus> {
        self.status
    }

    /// Mirror the size source's current geometry onto the PTY.
    ///
    /// Does nothing when the geometry cannot be read or the session is
    /// already closed.
    pub fn resize(&self) -> Result<(), PtyError> {
        let Some(source) = self.size_source else {
            return Ok(());
        };
        // The size source is one of the process's own terminal descriptors
        let source = unsafe { BorrowedFd::borrow_raw(source) };
        match terminal_size(source) {
            Some(ws) => self.apply_size(&ws),
            None => Ok(()),
        }
    }

    /// Set an explicit geometry
    pub fn resize_to(&self, rows: u16, cols: u16) -> Result<(), PtyError> {
        self.apply_size(&size::winsize(rows, cols))
    }

    fn apply_size(&self, ws: &Winsize) -> Result<(), PtyError> {
        if let Some(master) = &self.master {
            set_terminal_size(master, ws)?;
            debug!(rows = ws.ws_row, cols = ws.ws_col, "PTY resized");
        }
        Ok(())
    }

    /// Send bytes to the shell's input
    pub fn write(&self, bytes: &[u8]) -> Result<(), PtyError> {
        let master = self
            .master
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "PTY master is closed"))?;
        write_all(master, bytes)?;
        Ok(())
    }

    /// Deliver a signal without waiting.
    ///
    /// Goes to the PTY's foreground process group when there is one, so a
    /// job running under the shell is hit rather than only the shell itself.
    /// A process that is already gone is not an error.
    pub fn signal(&self, signal: Signal) -> Result<(), PtyError> {
        let Some(pid) = self.child else {
            return Ok(());
        };

        let foreground = self
            .master
            .as_ref()
            .and_then(|master| tcgetpgrp(master).ok())
            .filter(|pgrp| pgrp.as_raw() > 0);

        let (result, target) = match foreground {
            Some(pgrp) => (killpg(pgrp, signal), -pgrp.as_raw()),
            None => (kill(pid, signal), pid.as_raw()),
        };

        match result {
            Ok(()) | Err(Errno::ESRCH) => {
                debug!(%signal, target, "signal delivered");
                Ok(())
            }
            Err(errno) => Err(PtyError::SignalDelivery {
                signal,
                pid: target,
                errno,
            }),
        }
    }

    /// Deliver `signal` to the child. For SIGINT, SIGTERM and SIGKILL, wait
    /// for it to exit (escalating to SIGKILL after the grace period) and
    /// forget its pid.
    pub fn terminate(&mut self, signal: Signal) -> Result<(), PtyError> {
        let Some(pid) = self.child else {
            return Ok(());
        };

        match kill(pid, signal) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(errno) => {
                return Err(PtyError::SignalDelivery {
                    signal,
                    pid: pid.as_raw(),
                    errno,
                })
            }
        }

        match signal {
            Signal::SIGINT | Signal::SIGTERM => {
                // A stopped shell cannot act on the signal until continued
                let _ = kill(pid, Signal::SIGCONT);
                self.reap(pid)
            }
            Signal::SIGKILL => self.wait_blocking(pid),
            _ => Ok(()),
        }
    }

    /// Collect the child if it has already exited
    pub fn try_reap(&mut self) -> Option<ChildStatus> {
        let pid = self.child?;
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => {
                if let Some(status) = ChildStatus::from_wait(status) {
                    self.record_exit(status);
                }
            }
            Err(Errno::ECHILD) => self.child = None,
            Err(e) => warn!(pid = pid.as_raw(), "waitpid failed: {}", e),
        }
        self.status
    }

    fn reap(&mut self, pid: Pid) -> Result<(), PtyError> {
        let deadline = Instant::now() + self.reap_grace;
        loop {
            match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(status) => {
                    if let Some(status) = ChildStatus::from_wait(status) {
                        self.record_exit(status);
                        return Ok(());
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => {
                    self.child = None;
                    return Ok(());
                }
                Err(e) => return Err(PtyError::Io(e.into())),
            }

            if Instant::now() >= deadline {
                warn!(pid = pid.as_raw(), "child still running after grace period, killing");
                match kill(pid, Signal::SIGKILL) {
                    Ok(()) | Err(Errno::ESRCH) => {}
                    Err(errno) => {
                        return Err(PtyError::SignalDelivery {
                            signal: Signal::SIGKILL,
                            pid: pid.as_raw(),
                            errno,
                        })
                    }
                }
                return self.wait_blocking(pid);
            }
            std::thread::sleep(REAP_POLL_INTERVAL);
        }
    }

    fn wait_blocking(&mut self, pid: Pid) -> Result<(), PtyError> {
        loop {
            match waitpid(pid, None) {
                Ok(status) => {
                    if let Some(status) = ChildStatus::from_wait(status) {
                        self.record_exit(status);
                        return Ok(());
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => {
                    self.child = None;
                    return Ok(());
                }
                Err(e) => return Err(PtyError::Io(e.into())),
            }
        }
    }

    fn record_exit(&mut self, status: ChildStatus) {
        info!(code = status.code(), "shell exited: {:?}", status);
        self.status = Some(status);
        self.child = None;
    }

    /// Close the master, then terminate and reap the child if it is still
    /// around. Safe to call any number of times.
    pub fn close(&mut self) -> Result<(), PtyError> {
        if let Some(master) = self.master.take() {
            drop(master);
            debug!("PTY master closed");
        }

        if self.child.is_some() {
            self.try_reap();
        }
        if self.child.is_some() {
            self.terminate(Signal::SIGTERM)?;
        }
        Ok(())
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("PTY session cleanup failed: {}", e);
        }
    }
}

/// Builder for creating PTY sessions
pub struct SessionBuilder {
    shell: PathBuf,
    dimensions: Option<(u16, u16)>,
    size_source: Option<RawFd>,
    reap_grace: Duration,
}

impl SessionBuilder {
    /// Create a new session builder
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            dimensions: None,
            size_source: Some(libc::STDOUT_FILENO),
            reap_grace: DEFAULT_REAP_GRACE,
        }
    }

    /// Set the program to run on the slave side
    pub fn shell(mut self, shell: impl AsRef<Path>) -> Self {
        self.shell = shell.as_ref().to_path_buf();
        self
    }

    /// Set initial dimensions instead of reading them from the size source
    pub fn dimensions(mut self, rows: u16, cols: u16) -> Self {
        self.dimensions = Some((rows, cols));
        self
    }

    /// Terminal whose geometry is used at spawn and on every resize.
    /// `None` pins the PTY to its initial size.
    pub fn size_source(mut self, fd: Option<RawFd>) -> Self {
        self.size_source = fd;
        self
    }

    pub fn reap_grace(mut self, grace: Duration) -> Self {
        self.reap_grace = grace;
        self
    }

    /// Allocate the PTY and spawn the shell
    pub fn build(self) -> Result<PtySession, PtyError> {
        let winsize = match (self.dimensions, self.size_source) {
            (Some((rows, cols)), _) => size::winsize(rows, cols),
            (None, Some(fd)) => terminal_size_or_default(unsafe { BorrowedFd::borrow_raw(fd) }),
            (None, None) => size::winsize(size::FALLBACK_ROWS, size::FALLBACK_COLS),
        };

        let spawned = spawn_shell(&self.shell, &winsize)?;
        Ok(PtySession {
            master: Some(spawned.master),
            child: Some(spawned.child),
            status: None,
            size_source: self.size_source,
            reap_grace: self.reap_grace,
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{read_chunk, ReadOutcome};
    use crate::pty::EXEC_FAILED_STATUS;

    fn sh() -> SessionBuilder {
        SessionBuilder::new().shell("/bin/sh").size_source(None)
    }

    #[test]
    fn test_open_sets_initial_size() {
        let session = sh().dimensions(30, 100).build().unwrap();
        assert!(session.is_active());

        let ws = terminal_size(session.master().unwrap()).unwrap();
        assert_eq!((ws.ws_row, ws.ws_col), (30, 100));
    }

    #[test]
    fn test_resize_to_updates_geometry() {
        let session = sh().build().unwrap();
        session.resize_to(40, 120).unwrap();

        let ws = terminal_size(session.master().unwrap()).unwrap();
        assert_eq!((ws.ws_row, ws.ws_col), (40, 120));
    }

    #[test]
    fn test_resize_without_source_is_noop() {
        let session = sh().dimensions(24, 80).build().unwrap();
        session.resize().unwrap();

        let ws = terminal_size(session.master().unwrap()).unwrap();
        assert_eq!((ws.ws_row, ws.ws_col), (24, 80));
    }

    #[test]
    fn test_exec_failure_exits_with_distinct_status() {
        let mut session = sh().shell("/nonexistent/shell").build().unwrap();

        // Drain until the slave hangs up
        let mut buf = [0u8; 256];
        while let Ok(ReadOutcome::Data(_)) = read_chunk(session.master().unwrap(), &mut buf) {}

        session.close().unwrap();
        assert_eq!(session.status(), Some(ChildStatus::Exited(EXEC_FAILED_STATUS)));
    }

    #[test]
    fn test_terminate_reaps_and_forgets_pid() {
        let mut session = sh().build().unwrap();
        session.terminate(Signal::SIGKILL).unwrap();

        assert_eq!(session.pid(), None);
        assert_eq!(session.status(), Some(ChildStatus::Signaled(Signal::SIGKILL)));
        assert_eq!(session.status().unwrap().code(), 137);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = sh().build().unwrap();
        session.close().unwrap();
        assert!(!session.is_active());
        assert!(session.master().is_none());
        assert!(session.pid().is_none());

        session.close().unwrap();
        session.terminate(Signal::SIGTERM).unwrap();
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut session = sh().build().unwrap();
        session.close().unwrap();

        let err = session.write(b"echo\n").unwrap_err();
        assert!(matches!(err, PtyError::Io(_)));
    }
}
