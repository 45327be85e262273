//! CLI argument definitions.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "filterctl",
    version,
    about = "Beam-attenuation filter controller",
    after_help = "Example: filterctl 9000 9001 127.0.0.1:10009,127.0.0.1:10019"
)]
pub struct Cli {
    /// Port for the control reply socket, bound on all interfaces
    pub control_port: u16,

    /// Port for the event publish socket, bound on all interfaces
    pub publish_port: u16,

    /// Comma-separated host:port endpoints to subscribe to for histograms
    pub subscribe_endpoints: String,

    /// Optional startup configuration TOML
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Optional log file sink
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<String>,

    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    #[arg(long = "log-rotation", value_name = "POLICY")]
    pub log_rotation: Option<String>,
}
