//! RAII guard for the controlling terminal's raw mode

use crate::PtyError;
use nix::sys::termios::{
    tcgetattr, tcsetattr, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use tracing::{debug, warn};

/// Saved attributes of a terminal that has been switched into raw mode.
///
/// Restores the saved attributes when dropped, so every exit path that
/// unwinds through the owner leaves the terminal cooked again.
pub struct RawMode {
    fd: RawFd,
    saved: Termios,
    restored: bool,
    // Marker to ensure this type is !Send and !Sync
    _marker: std::marker::PhantomData<*const ()>,
}

impl RawMode {
    /// Capture the attributes of `fd` and switch it to raw mode.
    ///
    /// Echo, canonical input, signal generation (Ctrl+C/Ctrl+Z arrive as
    /// bytes 3 and 26), flow control and CR→NL translation are turned off.
    /// Reads return after one byte with no timeout. Output processing is
    /// left alone so `\n` still renders as a new line.
    pub fn enter(fd: BorrowedFd<'_>) -> Result<Self, PtyError> {
        let saved = tcgetattr(fd)
            .map_err(|e| PtyError::TerminalConfig(format!("tcgetattr failed: {e}")))?;

        tcsetattr(fd, SetArg::TCSAFLUSH, &raw_attributes(&saved))
            .map_err(|e| PtyError::TerminalConfig(format!("tcsetattr failed: {e}")))?;

        debug!(fd = fd.as_raw_fd(), "terminal switched to raw mode");
        Ok(Self {
            fd: fd.as_raw_fd(),
            saved,
            restored: false,
            _marker: std::marker::PhantomData,
        })
    }

    /// Reapply the saved attributes. Failures are logged, never returned,
    /// so the rest of teardown always runs.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;

        // The guard only exists while the descriptor it was built from is open
        let fd = unsafe { BorrowedFd::borrow_raw(self.fd) };
        match tcsetattr(fd, SetArg::TCSAFLUSH, &self.saved) {
            Ok(()) => debug!(fd = self.fd, "terminal attributes restored"),
            Err(e) => warn!(fd = self.fd, "failed to restore terminal attributes: {}", e),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.restored
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Derive the raw configuration from a terminal's current attributes
pub fn raw_attributes(original: &Termios) -> Termios {
    let mut raw = original.clone();
    raw.local_flags
        .remove(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG | LocalFlags::IEXTEN);
    raw.input_flags
        .remove(InputFlags::IXON | InputFlags::ICRNL | InputFlags::INLCR | InputFlags::IGNCR);
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    raw
}
