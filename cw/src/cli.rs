//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// comicwatch - follow booru comics and hear about new pages
#[derive(Parser)]
#[command(
    name = "cw",
    about = "Follow booru comics and report new pages",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/comicwatch/logs/comicwatch.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, help = "Log level override")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Search comics by name and show the closest matches
    Search {
        /// Comic name to look for
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Follow a comic
    Follow {
        /// Comic id, or a search option such as "Night Shift (1234)"
        comic: String,

        /// Follower id
        #[arg(short, long)]
        user: String,
    },

    /// Stop following a comic
    Unfollow {
        /// Comic id, or a search option such as "Night Shift (1234)"
        comic: String,

        /// Follower id
        #[arg(short, long)]
        user: String,
    },

    /// List followed comics
    List {
        /// Only comics this follower follows
        #[arg(short, long)]
        user: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Stop following every comic
    Forget {
        /// Follower id
        #[arg(short, long)]
        user: String,
    },

    /// Check all followed comics once and print new pages
    Check {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Keep checking for new pages until interrupted
    Watch {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

impl Command {
    /// Whether the command calls the booru API
    pub fn needs_api(&self) -> bool {
        matches!(
            self,
            Self::Search { .. } | Self::Follow { .. } | Self::Check { .. } | Self::Watch { .. }
        )
    }
}

/// Output format for list/check/watch commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("comicwatch")
        .join("logs")
        .join("comicwatch.log")
}
