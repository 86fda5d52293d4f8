use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let result = ptyhost::run();

    // The terminal is cooked again by now; make sure nothing is left buffered
    let _ = io::stdout().flush();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ptyhost: {e:#}");
            ExitCode::FAILURE
        }
    }
}
