//! Interactive PTY session host
//!
//! Puts the controlling terminal into raw mode, runs a shell on a PTY and
//! relays bytes between the two, editing the input line locally on the way.

pub mod app;
pub mod config;
pub mod event_loop;
pub mod logging;
pub mod session;

pub use app::run;
pub use config::{Args, SessionConfig};
pub use event_loop::{EventLoop, LoopError, LoopState, StopReason};
pub use session::{Session, TerminalFds};
