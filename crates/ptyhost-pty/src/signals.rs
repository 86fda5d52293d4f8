//! Process-wide signal forwarding for the active session
//!
//! Signal handlers cannot be handed a context pointer, so the one active
//! session is published through a handful of atomics for the lifetime of a
//! [`SignalBridge`]. The handler only touches those atomics and makes
//! async-signal-safe syscalls: it forwards SIGINT/SIGTERM to the child,
//! records pending work, and writes a byte to a self-pipe so the event
//! loop's readiness wait wakes up and does the rest.

use crate::PtyError;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{pipe2, read, Pid};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::{debug, warn};

/// Signals the bridge takes over while a session is active
pub const FORWARDED_SIGNALS: [Signal; 3] = [Signal::SIGWINCH, Signal::SIGINT, Signal::SIGTERM];

static ACTIVE: AtomicBool = AtomicBool::new(false);
static CHILD_PID: AtomicI32 = AtomicI32::new(0);
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);
static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);
static TERMINATE_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(signo: libc::c_int) {
    let saved_errno = Errno::last_raw();

    match signo {
        libc::SIGWINCH => RESIZE_PENDING.store(true, Ordering::SeqCst),
        libc::SIGINT | libc::SIGTERM => {
            let pid = CHILD_PID.load(Ordering::SeqCst);
            if pid > 0 {
                unsafe {
                    libc::kill(pid, signo);
                }
            }
            if signo == libc::SIGTERM {
                TERMINATE_PENDING.store(true, Ordering::SeqCst);
            }
        }
        _ => {}
    }

    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        let byte = 1u8;
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }

    Errno::set_raw(saved_errno);
}

/// Work the handler left for the event loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingSignals {
    /// SIGWINCH arrived; mirror the terminal size onto the PTY
    pub resize: bool,

    /// SIGTERM arrived; the session should shut down
    pub terminate: bool,
}

impl PendingSignals {
    pub fn is_empty(&self) -> bool {
        !self.resize && !self.terminate
    }
}

/// Handle on the process-wide signal state. Only one may exist at a time.
pub struct SignalBridge {
    wake_rx: OwnedFd,
    // Kept open for the handler, which writes to it by raw fd
    _wake_tx: OwnedFd,
    previous: Vec<(Signal, SigAction)>,
    cleared: bool,
}

impl SignalBridge {
    /// Publish `child` as the forwarding target and install the handlers.
    ///
    /// Fails with [`PtyError::SignalBridgeBusy`] while another bridge is
    /// installed.
    pub fn install(child: Pid) -> Result<Self, PtyError> {
        if ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PtyError::SignalBridgeBusy);
        }

        let (wake_rx, wake_tx) = match pipe2(OFlag::O_NONBLOCK | OFlag::O_CLOEXEC) {
            Ok(pair) => pair,
            Err(e) => {
                ACTIVE.store(false, Ordering::SeqCst);
                return Err(PtyError::SignalSetup(e));
            }
        };

        RESIZE_PENDING.store(false, Ordering::SeqCst);
        TERMINATE_PENDING.store(false, Ordering::SeqCst);
        CHILD_PID.store(child.as_raw(), Ordering::SeqCst);
        WAKE_FD.store(wake_tx.as_raw_fd(), Ordering::SeqCst);

        let mut bridge = Self {
            wake_rx,
            _wake_tx: wake_tx,
            previous: Vec::with_capacity(FORWARDED_SIGNALS.len()),
            cleared: false,
        };

        let action = SigAction::new(
            SigHandler::Handler(handle_signal),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for signal in FORWARDED_SIGNALS {
            match unsafe { sigaction(signal, &action) } {
                Ok(previous) => bridge.previous.push((signal, previous)),
                Err(e) => {
                    bridge.clear();
                    return Err(PtyError::SignalSetup(e));
                }
            }
        }

        debug!(pid = child.as_raw(), "signal bridge installed");
        Ok(bridge)
    }

    /// Whether some bridge is currently installed in this process
    pub fn is_installed() -> bool {
        ACTIVE.load(Ordering::SeqCst)
    }

    /// Becomes readable whenever a handled signal arrives
    pub fn wake_fd(&self) -> BorrowedFd<'_> {
        self.wake_rx.as_fd()
    }

    /// Drain the wake-up pipe and collect pending work
    pub fn take_pending(&self) -> PendingSignals {
        let mut buf = [0u8; 64];
        while let Ok(n) = read(self.wake_rx.as_raw_fd(), &mut buf) {
            if n == 0 {
                break;
            }
        }

        PendingSignals {
            resize: RESIZE_PENDING.swap(false, Ordering::SeqCst),
            terminate: TERMINATE_PENDING.swap(false, Ordering::SeqCst),
        }
    }

    /// Put the previous handlers back and unpublish the session
    pub fn clear(&mut self) {
        if self.cleared {
            return;
        }
        self.cleared = true;

        for (signal, previous) in self.previous.drain(..) {
            if let Err(e) = unsafe { sigaction(signal, &previous) } {
                warn!(%signal, "failed to restore signal disposition: {}", e);
            }
        }

        WAKE_FD.store(-1, Ordering::SeqCst);
        CHILD_PID.store(0, Ordering::SeqCst);
        ACTIVE.store(false, Ordering::SeqCst);
        debug!("signal bridge cleared");
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::raise;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;
    use std::sync::Mutex;

    // The bridge is process-wide; tests touching it take turns
    static BRIDGE_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_only_one_bridge_at_a_time() {
        let _lock = BRIDGE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let first = SignalBridge::install(Pid::from_raw(i32::MAX)).unwrap();
        assert!(SignalBridge::is_installed());
        assert!(matches!(
            SignalBridge::install(Pid::from_raw(i32::MAX)),
            Err(PtyError::SignalBridgeBusy)
        ));

        drop(first);
        assert!(!SignalBridge::is_installed());

        let mut second = SignalBridge::install(Pid::from_raw(i32::MAX)).unwrap();
        second.clear();
        second.clear();
        assert!(!SignalBridge::is_installed());
    }

    #[test]
    fn test_sigwinch_sets_resize_and_wakes() {
        let _lock = BRIDGE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let bridge = SignalBridge::install(Pid::from_raw(i32::MAX)).unwrap();

        assert!(bridge.take_pending().is_empty());
        raise(Signal::SIGWINCH).unwrap();

        let mut probe = [0u8; 1];
        assert_eq!(read(bridge.wake_fd().as_raw_fd(), &mut probe), Ok(1));

        let pending = bridge.take_pending();
        assert!(pending.resize);
        assert!(!pending.terminate);
        assert!(bridge.take_pending().is_empty());
    }

    #[test]
    fn test_sigterm_is_forwarded_to_child() {
        let _lock = BRIDGE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let bridge = SignalBridge::install(Pid::from_raw(child.id() as i32)).unwrap();

        raise(Signal::SIGTERM).unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
        assert!(bridge.take_pending().terminate);
    }

    #[test]
    fn test_sigint_is_forwarded_to_child() {
        let _lock = BRIDGE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let bridge = SignalBridge::install(Pid::from_raw(child.id() as i32)).unwrap();

        raise(Signal::SIGINT).unwrap();

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGINT));
        assert!(bridge.take_pending().is_empty());
    }
}
