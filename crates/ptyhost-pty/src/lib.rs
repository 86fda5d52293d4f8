//! PTY (Pseudo-Terminal) handling for Ptyhost
//!
//! Owns everything that talks to the operating system on behalf of a
//! session: the controlling terminal's mode, the PTY pair and child shell,
//! process-wide signal forwarding and the retrying descriptor I/O used by
//! the event loop.

pub mod io;
pub mod pty;
pub mod raw_mode;
pub mod session;
pub mod signals;
pub mod size;

pub use raw_mode::RawMode;
pub use session::{ChildStatus, PtySession, SessionBuilder};
pub use signals::{PendingSignals, SignalBridge};

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Terminal configuration failed: {0}")]
    TerminalConfig(String),

    #[error("Failed to create PTY: {0}")]
    PtyCreation(String),

    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deliver {signal} to pid {pid}: {errno}")]
    SignalDelivery {
        signal: nix::sys::signal::Signal,
        pid: i32,
        errno: Errno,
    },

    #[error("A signal bridge is already installed for another session")]
    SignalBridgeBusy,

    #[error("Failed to install signal handler: {0}")]
    SignalSetup(Errno),
}
