//! Descriptor reads and writes that survive partial transfers and `EINTR`

use nix::errno::Errno;
use nix::unistd::{read, write};
use std::io;
use std::os::fd::{AsFd, AsRawFd};

/// Result of a single read from a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(usize),

    /// End of stream. A PTY master reports `EIO` once the slave side hangs
    /// up, which lands here too.
    Closed,
}

/// Write the whole buffer, retrying on short writes and interrupted calls
pub fn write_all<Fd: AsFd>(fd: Fd, data: &[u8]) -> io::Result<()> {
    let fd = fd.as_fd();
    let mut written = 0;
    while written < data.len() {
        match write(fd, &data[written..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read whatever is available, retrying interrupted calls
pub fn read_chunk<Fd: AsFd>(fd: Fd, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    let fd = fd.as_fd().as_raw_fd();
    loop {
        match read(fd, buf) {
            Ok(0) => return Ok(ReadOutcome::Closed),
            Ok(n) => return Ok(ReadOutcome::Data(n)),
            Err(Errno::EINTR) => continue,
            Err(Errno::EIO) => return Ok(ReadOutcome::Closed),
            Err(e) => return Err(e.into()),
        }
    }
}
