//! Per-byte keyboard state machine
//!
//! Classifies each keyboard byte as a control key, part of an arrow-key
//! escape sequence, or ordinary line input, and emits the resulting shell
//! input, local echo and child signals through an [`InputSink`].

use crate::escape::EscapeAccumulator;
use crate::history::History;
use crate::keys;
use crate::line::LineBuffer;
use crate::{ChildSignal, InputSink};
use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};
use tracing::{debug, trace};

/// Prompt reprinted when history navigation redraws the line
pub const DEFAULT_PROMPT: &str = "$ ";

/// Where the machine is within a multi-byte key sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeState {
    Normal,

    /// Saw `ESC`
    EscapeStarted,

    /// Saw `ESC [`
    EscapeBracket,
}

/// Why the input side asked for the session to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Ctrl+D
    EndOfTransmission,

    /// The line `exit` was submitted
    ExitCommand,
}

/// Outcome of feeding one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    End(SessionEnd),
}

#[derive(Debug, Clone, Copy)]
enum Recall {
    Older,
    Newer,
}

/// Keyboard state machine with a local line buffer and command history
pub struct InputStateMachine {
    state: EscapeState,
    escape: EscapeAccumulator,
    line: LineBuffer,
    history: History,
    prompt: String,
}

impl Default for InputStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InputStateMachine {
    pub fn new() -> Self {
        Self::with_prompt(DEFAULT_PROMPT)
    }

    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            state: EscapeState::Normal,
            escape: EscapeAccumulator::new(),
            line: LineBuffer::new(),
            history: History::new(),
            prompt: prompt.into(),
        }
    }

    /// Start from an existing history, cursor parked on live input
    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn state(&self) -> EscapeState {
        self.state
    }

    pub fn line(&self) -> &LineBuffer {
        &self.line
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Feed a chunk, stopping at the first byte that ends the session
    pub fn feed_all<S: InputSink>(&mut self, bytes: &[u8], sink: &mut S) -> Result<Flow, S::Error> {
        for &byte in bytes {
            if let Flow::End(reason) = self.feed(byte, sink)? {
                return Ok(Flow::End(reason));
            }
        }
        Ok(Flow::Continue)
    }

    /// Process a single keyboard byte
    pub fn feed<S: InputSink>(&mut self, byte: u8, sink: &mut S) -> Result<Flow, S::Error> {
        // Control keys win over whatever sequence is in progress
        match byte {
            keys::END_OF_TRANSMISSION => {
                self.abandon_escape();
                sink.forward(&[byte])?;
                debug!("end of transmission from keyboard");
                return Ok(Flow::End(SessionEnd::EndOfTransmission));
            }
            keys::INTERRUPT => {
                self.abandon_escape();
                sink.signal_child(ChildSignal::Interrupt)?;
                return Ok(Flow::Continue);
            }
            keys::SUSPEND => {
                self.abandon_escape();
                sink.signal_child(ChildSignal::Suspend)?;
                return Ok(Flow::Continue);
            }
            _ => {}
        }

        match self.state {
            EscapeState::Normal => self.normal(byte, sink),
            EscapeState::EscapeStarted => {
                if byte == keys::CSI_BRACKET {
                    self.escape.push(byte);
                    self.state = EscapeState::EscapeBracket;
                } else {
                    trace!(byte, "discarding unrecognised escape sequence");
                    self.abandon_escape();
                }
                Ok(Flow::Continue)
            }
            EscapeState::EscapeBracket => self.escape_final(byte, sink),
        }
    }

    fn normal<S: InputSink>(&mut self, byte: u8, sink: &mut S) -> Result<Flow, S::Error> {
        match byte {
            keys::DELETE => {
                if self.line.pop_char() {
                    sink.echo(keys::VISUAL_ERASE)?;
                    sink.forward(&[keys::DELETE])?;
                }
            }
            keys::ESCAPE => {
                self.escape.start(byte);
                self.state = EscapeState::EscapeStarted;
            }
            keys::CARRIAGE_RETURN | keys::LINE_FEED => return self.submit(sink),
            _ => {
                self.line.push(byte);
                sink.echo(&[byte])?;
                sink.forward(&[byte])?;
            }
        }
        Ok(Flow::Continue)
    }

    fn escape_final<S: InputSink>(&mut self, byte: u8, sink: &mut S) -> Result<Flow, S::Error> {
        self.escape.push(byte);
        let sequence = self.escape;
        self.abandon_escape();

        // Unmapped sequences (left/right, ...) still reach shell-side editing
        sink.forward(sequence.as_bytes())?;

        match byte {
            keys::ARROW_UP => self.recall(Recall::Older, sink)?,
            keys::ARROW_DOWN => self.recall(Recall::Newer, sink)?,
            _ => trace!(byte, "escape sequence has no local action"),
        }
        Ok(Flow::Continue)
    }

    fn submit<S: InputSink>(&mut self, sink: &mut S) -> Result<Flow, S::Error> {
        if self.line.as_bytes() == keys::EXIT_COMMAND {
            self.line.clear();
            debug!("exit command entered");
            return Ok(Flow::End(SessionEnd::ExitCommand));
        }

        let line = self.line.take();
        if !line.is_empty() {
            self.history.push(line);
        }

        sink.forward(b"\n")?;
        sink.echo(b"\n")?;
        Ok(Flow::Continue)
    }

    fn recall<S: InputSink>(&mut self, direction: Recall, sink: &mut S) -> Result<(), S::Error> {
        let cursor = match direction {
            Recall::Older => self.history.up(),
            Recall::Newer => self.history.down(),
        };
        trace!(cursor, "history navigation");

        let entry = self.history.current().unwrap_or_default();
        self.line.replace(entry);

        let redraw = format!(
            "{}{}{}",
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            self.prompt
        );
        sink.echo(redraw.as_bytes())?;
        sink.echo(self.line.as_bytes())?;
        Ok(())
    }

    fn abandon_escape(&mut self) {
        self.escape.reset();
        self.state = EscapeState::Normal;
    }
}
