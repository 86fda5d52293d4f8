//! Readiness loop relaying keyboard input and shell output
//!
//! One thread blocks in `poll` on the keyboard, the PTY master and (when a
//! [`SignalBridge`] is attached) its wake-up pipe, and handles whatever is
//! ready in that order. Keyboard bytes go through the
//! [`InputStateMachine`]; shell output is copied to the display unchanged.

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::Signal;
use ptyhost_input::{ChildSignal, Flow, InputSink, InputStateMachine, SessionEnd};
use ptyhost_pty::io::{read_chunk, write_all, ReadOutcome};
use ptyhost_pty::{PtyError, PtySession, SignalBridge};
use std::io;
use std::os::fd::BorrowedFd;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Largest single read from either source
pub const READ_CHUNK: usize = 1024;

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Pty(#[from] PtyError),
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The keyboard descriptor reached end of input or failed
    KeyboardClosed,

    /// The input state machine ended the session
    Input(SessionEnd),

    /// The PTY master hung up
    ShellExited,

    /// SIGTERM was delivered to this process
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

pub struct EventLoop<'a> {
    keyboard: BorrowedFd<'a>,
    display: BorrowedFd<'a>,
    signals: Option<&'a SignalBridge>,
    state: LoopState,
}

impl<'a> EventLoop<'a> {
    pub fn new(keyboard: BorrowedFd<'a>, display: BorrowedFd<'a>) -> Self {
        Self {
            keyboard,
            display,
            signals: None,
            state: LoopState::Running,
        }
    }

    /// Also wake up for signals recorded by `bridge`
    pub fn with_signals(mut self, bridge: &'a SignalBridge) -> Self {
        self.signals = Some(bridge);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Relay until one of the stop conditions occurs.
    ///
    /// I/O failures other than end of stream are returned as errors; the
    /// caller tears the session down either way.
    pub fn run(
        &mut self,
        pty: &PtySession,
        machine: &mut InputStateMachine,
    ) -> Result<StopReason, LoopError> {
        let Some(master) = pty.master() else {
            self.stop(StopReason::ShellExited);
            return Ok(StopReason::ShellExited);
        };

        let mut buf = [0u8; READ_CHUNK];

        loop {
            if let LoopState::Stopped(reason) = self.state {
                return Ok(reason);
            }

            let mut fds = Vec::with_capacity(3);
            fds.push(PollFd::new(self.keyboard, PollFlags::POLLIN));
            fds.push(PollFd::new(master, PollFlags::POLLIN));
            if let Some(bridge) = self.signals {
                fds.push(PollFd::new(bridge.wake_fd(), PollFlags::POLLIN));
            }

            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(LoopError::Io(e.into())),
            }

            let keyboard_ready = is_ready(&fds[0]);
            let master_ready = is_ready(&fds[1]);
            let wake_ready = fds.get(2).map_or(false, is_ready);

            if wake_ready {
                self.handle_signals(pty);
            }
            if keyboard_ready && self.is_running() {
                self.handle_keyboard(pty, machine, &mut buf)?;
            }
            if master_ready && self.is_running() {
                self.handle_shell_output(master, &mut buf)?;
            }
        }
    }

    fn handle_signals(&mut self, pty: &PtySession) {
        let Some(bridge) = self.signals else {
            return;
        };

        let pending = bridge.take_pending();
        if pending.resize {
            if let Err(e) = pty.resize() {
                warn!("failed to propagate terminal size: {}", e);
            }
        }
        if pending.terminate {
            debug!("terminate signal received");
            self.stop(StopReason::Terminated);
        }
    }

    fn handle_keyboard(
        &mut self,
        pty: &PtySession,
        machine: &mut InputStateMachine,
        buf: &mut [u8],
    ) -> Result<(), LoopError> {
        let n = match read_chunk(self.keyboard, buf) {
            Ok(ReadOutcome::Data(n)) => n,
            Ok(ReadOutcome::Closed) => {
                self.stop(StopReason::KeyboardClosed);
                return Ok(());
            }
            Err(e) => {
                warn!("keyboard read failed: {}", e);
                self.stop(StopReason::KeyboardClosed);
                return Ok(());
            }
        };
        trace!(n, "keyboard input");

        let mut sink = SessionSink {
            pty,
            display: self.display,
        };
        if let Flow::End(reason) = machine.feed_all(&buf[..n], &mut sink)? {
            self.stop(StopReason::Input(reason));
        }
        Ok(())
    }

    fn handle_shell_output(
        &mut self,
        master: BorrowedFd<'_>,
        buf: &mut [u8],
    ) -> Result<(), LoopError> {
        match read_chunk(master, buf)? {
            ReadOutcome::Data(n) => {
                trace!(n, "shell output");
                write_all(self.display, &buf[..n])?;
            }
            ReadOutcome::Closed => self.stop(StopReason::ShellExited),
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    fn stop(&mut self, reason: StopReason) {
        if self.is_running() {
            debug!(?reason, "event loop stopping");
            self.state = LoopState::Stopped(reason);
        }
    }
}

fn is_ready(fd: &PollFd<'_>) -> bool {
    fd.revents().map_or(false, |revents| {
        // POLLNVAL too, so the read that follows fails instead of the loop spinning
        revents.intersects(
            PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL,
        )
    })
}

/// Routes state machine output to the PTY and the display
struct SessionSink<'s> {
    pty: &'s PtySession,
    display: BorrowedFd<'s>,
}

impl InputSink for SessionSink<'_> {
    type Error = LoopError;

    fn forward(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.pty.write(bytes)?;
        Ok(())
    }

    fn echo(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        write_all(self.display, bytes)?;
        Ok(())
    }

    fn signal_child(&mut self, signal: ChildSignal) -> Result<(), Self::Error> {
        let signal = match signal {
            ChildSignal::Interrupt => Signal::SIGINT,
            ChildSignal::Suspend => Signal::SIGTSTP,
        };
        // Delivery failures are not worth ending the session over
        if let Err(e) = self.pty.signal(signal) {
            warn!("{}", e);
        }
        Ok(())
    }
}
