//! Application entry point

use crate::config::Args;
use crate::logging;
use crate::session::{Session, TerminalFds};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

pub fn run() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_level, args.log_file.as_deref())?;

    let config = args.session_config();
    let mut session =
        Session::start(&config, TerminalFds::stdio()).context("Failed to start session")?;

    let result = session.run();
    session.teardown();

    let reason = result.context("Session terminated abnormally")?;
    info!(?reason, "session ended");
    Ok(())
}
