//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Live position overlay for a NATS telemetry feed.
///
/// Draws the latest position of every reporting entity over a field image
/// and dumps all received messages to a zstd-compressed file. Press any key
/// in the window to clear the view; Ctrl-C flushes the dump and exits.
#[derive(Parser, Debug)]
#[command(name = "radarview", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short = 'c', default_value = "radarview.toml")]
    pub config: PathBuf,

    /// Run without a window: ingest and dump only.
    #[arg(long)]
    pub headless: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a dump file and the entity state it leads to.
    Replay {
        /// Dump file (`*.mqttdump.zst`).
        file: PathBuf,

        /// Topic whose records carry position reports.
        #[arg(long, default_value = "radar_debug")]
        draw_topic: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["radarview"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("radarview.toml"));
        assert!(!cli.headless);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_replay_subcommand() {
        let cli = Cli::try_parse_from([
            "radarview",
            "replay",
            "20260212T153045.mqttdump.zst",
            "--draw-topic",
            "tracks",
        ])
        .unwrap();

        match cli.command {
            Some(Command::Replay { file, draw_topic }) => {
                assert_eq!(file, PathBuf::from("20260212T153045.mqttdump.zst"));
                assert_eq!(draw_topic, "tracks");
            }
            other => panic!("Expected replay, got {:?}", other),
        }
    }
}
