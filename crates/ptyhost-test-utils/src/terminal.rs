use anyhow::Result;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::read;
use std::os::fd::{AsFd, AsRawFd};
use std::time::{Duration, Instant};

/// Accumulates bytes read from a descriptor (a PTY master, a display pipe)
#[derive(Debug, Default, Clone)]
pub struct TerminalCapture {
    raw_output: Vec<u8>,
    closed: bool,
}

impl TerminalCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture_bytes(&mut self, data: &[u8]) {
        self.raw_output.extend_from_slice(data);
    }

    /// Read everything that arrives until `idle` passes with no new data or
    /// the descriptor reaches end of stream.
    pub fn drain<Fd: AsFd>(&mut self, fd: Fd, idle: Duration) -> Result<()> {
        while !self.closed && self.read_once(fd.as_fd(), idle)? {}
        Ok(())
    }

    /// Read until the ANSI-stripped output contains `pattern`
    pub fn wait_for<Fd: AsFd>(&mut self, fd: Fd, pattern: &str, timeout: Duration) -> Result<()> {
        let start = Instant::now();

        while !self.text().contains(pattern) {
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() || self.closed {
                anyhow::bail!(
                    "Timeout waiting for output containing {:?}; got {:?}",
                    pattern,
                    self.text()
                );
            }
            self.read_once(fd.as_fd(), remaining)?;
        }

        Ok(())
    }

    /// One bounded read; `false` when nothing arrived in time or the stream ended
    fn read_once<Fd: AsFd>(&mut self, fd: Fd, wait: Duration) -> Result<bool> {
        let millis = wait.as_millis().min(u16::MAX as u128) as u16;
        let mut fds = [PollFd::new(fd.as_fd(), PollFlags::POLLIN)];

        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => return Ok(false),
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(true),
            Err(e) => anyhow::bail!("poll failed: {}", e),
        }

        let mut buf = [0u8; 4096];
        match read(fd.as_fd().as_raw_fd(), &mut buf) {
            Ok(0) | Err(Errno::EIO) => {
                self.closed = true;
                Ok(false)
            }
            Ok(n) => {
                self.capture_bytes(&buf[..n]);
                Ok(true)
            }
            Err(Errno::EINTR) | Err(Errno::EAGAIN) => Ok(true),
            Err(e) => anyhow::bail!("read failed: {}", e),
        }
    }

    pub fn raw_output(&self) -> &[u8] {
        &self.raw_output
    }

    /// Output with escape sequences removed
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&strip_ansi_escapes::strip(&self.raw_output)).into_owned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
