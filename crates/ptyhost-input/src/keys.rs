//! Control bytes recognised by the input state machine

/// Ctrl+C
pub const INTERRUPT: u8 = 0x03;

/// Ctrl+D
pub const END_OF_TRANSMISSION: u8 = 0x04;

/// Ctrl+Z
pub const SUSPEND: u8 = 0x1A;

pub const ESCAPE: u8 = 0x1B;

/// What most terminals send for the Backspace key
pub const DELETE: u8 = 0x7F;

pub const CARRIAGE_RETURN: u8 = b'\r';
pub const LINE_FEED: u8 = b'\n';

/// Second byte of a CSI arrow-key sequence
pub const CSI_BRACKET: u8 = b'[';

pub const ARROW_UP: u8 = b'A';
pub const ARROW_DOWN: u8 = b'B';

/// Moves the cursor back over the last column and blanks it
pub const VISUAL_ERASE: &[u8] = b"\x08 \x08";

/// Line that ends the session instead of reaching the shell
pub const EXIT_COMMAND: &[u8] = b"exit";
