//! Keyboard input handling for Ptyhost
//!
//! Turns raw keyboard bytes into shell input, local echo and child signals.
//! Nothing in this crate touches a file descriptor; every side effect is
//! routed through an [`InputSink`] so the event loop decides where bytes go.

pub mod escape;
pub mod history;
pub mod keys;
pub mod line;
pub mod machine;

pub use escape::EscapeAccumulator;
pub use history::History;
pub use line::LineBuffer;
pub use machine::{EscapeState, Flow, InputStateMachine, SessionEnd};

/// Signals the input layer can ask to have delivered to the shell side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSignal {
    /// Ctrl+C
    Interrupt,

    /// Ctrl+Z
    Suspend,
}

/// Destination for everything the state machine decides to emit.
///
/// Mirrors the way a `vte::Perform` receives parser callbacks: the machine
/// classifies bytes, the sink performs the I/O.
pub trait InputSink {
    type Error;

    /// Bytes for the shell's input side
    fn forward(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Bytes for the local display
    fn echo(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Deliver a job-control signal to the child
    fn signal_child(&mut self, signal: ChildSignal) -> Result<(), Self::Error>;
}
