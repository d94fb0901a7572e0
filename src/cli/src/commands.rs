use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

fn about_message() -> String {
    format!(
        "Capture application errors and ship them to a remote collector\nVersion: {}",
        env!("CARGO_PKG_VERSION")
    )
}

#[derive(Parser, Clone, Debug)]
#[clap(name = "arcu-monitor", about = about_message(), version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Report an error and deliver it before exiting
    Report(ReportArgs),

    /// Store the user the following reports are attributed to
    SetUser {
        user_id: String,
        /// Extra user details as a JSON object
        #[clap(long)]
        info: Option<String>,
    },

    /// Replace the tags attached to the following reports
    SetTags {
        /// Tags as key=value pairs
        #[clap(value_parser = parse_key_value, required = true)]
        tags: Vec<(String, String)>,
    },

    /// Show the effective configuration
    Config {
        /// Output in JSON format
        #[clap(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// Error message
    pub message: String,

    /// Error type, e.g. TypeError. Without it the error is reported as plain text
    #[clap(long)]
    pub kind: Option<String>,

    /// Stack trace to attach
    #[clap(long)]
    pub stack: Option<String>,

    /// Context entries as key=value pairs
    #[clap(long = "context", value_parser = parse_key_value)]
    pub context: Vec<(String, String)>,

    /// Send to this endpoint instead of the configured one
    #[clap(long)]
    pub endpoint: Option<String>,
}

pub fn parse_key_value(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got `{}`", raw))?;
    if key.is_empty() {
        return Err(anyhow!("empty key in `{}`", raw));
    }
    Ok((key.to_string(), value.to_string()))
}
