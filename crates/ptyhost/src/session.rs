//! Session lifecycle: setup, relay, and the single teardown path

use crate::config::SessionConfig;
use crate::event_loop::{EventLoop, LoopError, StopReason};
use ptyhost_input::InputStateMachine;
use ptyhost_pty::{PtyError, PtySession, RawMode, SessionBuilder, SignalBridge};
use std::os::fd::{AsRawFd, BorrowedFd};
use tracing::{debug, info, warn};

/// The terminal a session runs on
#[derive(Debug, Clone, Copy)]
pub struct TerminalFds<'t> {
    /// Read for keystrokes; also the descriptor put into raw mode
    pub keyboard: BorrowedFd<'t>,

    /// Receives local echo and shell output; its geometry is mirrored
    pub display: BorrowedFd<'t>,
}

impl TerminalFds<'static> {
    /// The process's own stdin and stdout
    pub fn stdio() -> Self {
        // Standard descriptors stay open for the life of the process
        unsafe {
            Self {
                keyboard: BorrowedFd::borrow_raw(libc::STDIN_FILENO),
                display: BorrowedFd::borrow_raw(libc::STDOUT_FILENO),
            }
        }
    }
}

/// One running shell plus everything that has to be undone when it ends
pub struct Session<'t> {
    terminal: TerminalFds<'t>,
    raw_mode: RawMode,
    pty: PtySession,
    bridge: Option<SignalBridge>,
    machine: InputStateMachine,
    running: bool,
}

impl<'t> Session<'t> {
    /// Enter raw mode, spawn the shell and install the signal bridge.
    ///
    /// A failure after raw mode was entered restores the terminal before
    /// the error is returned.
    pub fn start(config: &SessionConfig, terminal: TerminalFds<'t>) -> Result<Self, PtyError> {
        let raw_mode = RawMode::enter(terminal.keyboard)?;

        // On error `raw_mode` drops here and the terminal is cooked again
        let pty = SessionBuilder::new()
            .shell(&config.shell)
            .size_source(Some(terminal.display.as_raw_fd()))
            .build()?;

        let pid = pty
            .pid()
            .ok_or_else(|| PtyError::PtyCreation("child exited during setup".to_string()))?;
        let bridge = SignalBridge::install(pid)?;

        info!(shell = %config.shell.display(), pid = pid.as_raw(), "session started");
        Ok(Self {
            terminal,
            raw_mode,
            pty,
            bridge: Some(bridge),
            machine: InputStateMachine::with_prompt(config.prompt.as_str()),
            running: true,
        })
    }

    /// Relay until the session ends. Call [`Session::teardown`] afterwards
    /// (dropping the session does it too).
    pub fn run(&mut self) -> Result<StopReason, LoopError> {
        let mut event_loop = EventLoop::new(self.terminal.keyboard, self.terminal.display);
        if let Some(bridge) = &self.bridge {
            event_loop = event_loop.with_signals(bridge);
        }

        let result = event_loop.run(&self.pty, &mut self.machine);
        self.running = false;
        result
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn pty(&self) -> &PtySession {
        &self.pty
    }

    pub fn machine(&self) -> &InputStateMachine {
        &self.machine
    }

    /// Close the master, reap the child, restore the terminal and clear the
    /// signal bridge. Errors are logged; every step always runs. Repeated
    /// calls do nothing.
    pub fn teardown(&mut self) {
        self.running = false;

        if let Err(e) = self.pty.close() {
            warn!("failed to shut down shell: {}", e);
        }
        self.raw_mode.restore();
        if let Some(mut bridge) = self.bridge.take() {
            bridge.clear();
        }

        if let Some(status) = self.pty.status() {
            debug!(code = status.code(), "teardown complete");
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}
