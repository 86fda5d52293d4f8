//! Terminal geometry queries

use nix::pty::Winsize;
use std::io;
use std::os::fd::{AsFd, AsRawFd};

pub const FALLBACK_ROWS: u16 = 24;
pub const FALLBACK_COLS: u16 = 80;

pub fn winsize(rows: u16, cols: u16) -> Winsize {
    Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    }
}

/// Current geometry of the terminal behind `fd`, `None` if it has none
pub fn terminal_size<Fd: AsFd>(fd: Fd) -> Option<Winsize> {
    let mut ws = winsize(0, 0);
    let ret = unsafe { libc::ioctl(fd.as_fd().as_raw_fd(), libc::TIOCGWINSZ, &mut ws) };
    if ret == -1 || ws.ws_row == 0 || ws.ws_col == 0 {
        return None;
    }
    Some(ws)
}

/// Like [`terminal_size`], falling back to 80x24
pub fn terminal_size_or_default<Fd: AsFd>(fd: Fd) -> Winsize {
    terminal_size(fd).unwrap_or_else(|| winsize(FALLBACK_ROWS, FALLBACK_COLS))
}

/// Apply a geometry to a terminal (normally a PTY master)
pub fn set_terminal_size<Fd: AsFd>(fd: Fd, ws: &Winsize) -> io::Result<()> {
    let ret = unsafe { libc::ioctl(fd.as_fd().as_raw_fd(), libc::TIOCSWINSZ, ws as *const Winsize) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
