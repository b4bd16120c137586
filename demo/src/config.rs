//! Command-line and environment configuration for the demo binary.
//!
//! Every flag has an environment fallback because CGI servers start the
//! binary without arguments.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use wgi_core::Mode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "wgi-demo", version, about = "Run the hello handler once under CGI or an event runtime")]
pub struct Config {
    /// Invocation model: cgi, event (alias: lambda). Defaults to cgi.
    #[arg(long, env = "WGI_MODE")]
    pub mode: Option<Mode>,

    /// Event JSON file for event mode; stdin when omitted
    #[arg(long, env = "WGI_EVENT")]
    pub event: Option<PathBuf>,

    /// Artificial handler delay in milliseconds
    #[arg(long, env = "WGI_DELAY_MS", default_value_t = 0)]
    pub delay_ms: u64,

    /// Log format on stderr
    #[arg(long, env = "WGI_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// CGI servers pass an indexed query (one without `=`) as arguments.
    /// The handler reads `QUERY_STRING` instead.
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub search_words: Vec<String>,
}

impl Config {
    /// `WGI_MODE` is already folded in by clap; without it a CGI server is
    /// assumed, since those start the binary with no arguments.
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(Mode::Cgi)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Raw event JSON from `--event` or stdin.
    pub fn read_event(&self) -> std::io::Result<String> {
        match &self.event {
            Some(path) => std::fs::read_to_string(path),
            None => {
                let mut raw = String::new();
                std::io::stdin().read_to_string(&mut raw)?;
                Ok(raw)
            }
        }
    }
}
