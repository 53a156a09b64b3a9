//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Team time tracker.
///
/// Records start/stop intervals against work item URLs on a shared server.
#[derive(Debug, Parser)]
#[command(name = "timetracker", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start tracking time on a work item.
    Start {
        /// URL of the work item.
        url: String,

        /// What you are working on.
        description: String,
    },

    /// Stop tracking time on a work item.
    Stop {
        /// URL of the work item.
        url: String,
    },

    /// Show whether you are tracking anything.
    Status,

    /// List time entries.
    Entries {
        /// Only show entries for this user.
        #[arg(long)]
        username: Option<String>,

        /// Only show entries for this work item.
        #[arg(long)]
        url: Option<String>,

        /// Output format: json or csv.
        #[arg(long, default_value = "json")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "timetracker",
            "start",
            "https://x/1",
            "fix bug",
            "--verbose",
            "-c",
            "/tmp/tt.toml",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tt.toml")));
        match cli.command {
            Some(Commands::Start { url, description }) => {
                assert_eq!(url, "https://x/1");
                assert_eq!(description, "fix bug");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn start_requires_description() {
        assert!(Cli::try_parse_from(["timetracker", "start", "https://x/1"]).is_err());
    }

    #[test]
    fn entries_defaults_to_json() {
        let cli = Cli::try_parse_from(["timetracker", "entries", "--url", "u1"]).unwrap();
        match cli.command {
            Some(Commands::Entries {
                username,
                url,
                format,
            }) => {
                assert_eq!(username, None);
                assert_eq!(url.as_deref(), Some("u1"));
                assert_eq!(format, "json");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
