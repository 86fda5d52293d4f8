//! Command-line configuration

use clap::{Parser, ValueEnum};
use ptyhost_input::machine::DEFAULT_PROMPT;
use ptyhost_pty::session::DEFAULT_SHELL;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Ptyhost - run a shell on a PTY with local line editing")]
pub struct Args {
    /// Program to run on the PTY (invoked with no arguments)
    #[arg(long, default_value = DEFAULT_SHELL)]
    pub shell: PathBuf,

    /// Prompt shown when history navigation redraws the line
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Log level (RUST_LOG takes precedence when set)
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Append logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            shell: self.shell.clone(),
            prompt: self.prompt.clone(),
        }
    }
}

/// What a session needs to know to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub shell: PathBuf,
    pub prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["ptyhost"]).unwrap();
        assert_eq!(args.session_config(), SessionConfig::default());
        assert_eq!(args.log_level, LogLevel::Warn);
        assert!(args.log_file.is_none());
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "ptyhost",
            "--shell",
            "/bin/zsh",
            "--prompt",
            "% ",
            "--log-level",
            "debug",
            "--log-file",
            "/tmp/ptyhost.log",
        ])
        .unwrap();

        let config = args.session_config();
        assert_eq!(config.shell, PathBuf::from("/bin/zsh"));
        assert_eq!(config.prompt, "% ");
        assert_eq!(args.log_level.directive(), "debug");
        assert_eq!(args.log_file, Some(PathBuf::from("/tmp/ptyhost.log")));
    }

    #[test]
    fn test_rejects_positional_arguments() {
        assert!(Args::try_parse_from(["ptyhost", "extra"]).is_err());
    }
}
