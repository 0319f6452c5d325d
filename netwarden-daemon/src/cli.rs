//! CLI argument definitions for netwarden-daemon.
//!
//! Uses `clap` v4 derive macros. Every override here takes precedence
//! over both the config file and `NETWARDEN_*` environment variables.

use std::path::PathBuf;

use clap::Parser;

use netwarden_core::config::NetwardenConfig;

/// Netwarden flow-based intrusion detection daemon.
///
/// Reads packet records, groups them into bidirectional flows, classifies
/// idle flows and reports non-benign ones.
#[derive(Parser, Debug, Default)]
#[command(name = "netwarden-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to netwarden.toml.
    ///
    /// When omitted, built-in defaults plus environment overrides are used.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and classifier artifacts, then exit.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path.
    #[arg(long)]
    pub pid_file: Option<String>,

    /// Packet replay input (JSON lines). "-" reads standard input.
    #[arg(short, long)]
    pub replay: Option<String>,

    /// Replay packets at their recorded pace.
    #[arg(long)]
    pub pace: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut NetwardenConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
        if let Some(replay) = &self.replay {
            config.capture.replay_path = replay.clone();
        }
        if self.pace {
            config.capture.pace = true;
        }
    }
}
