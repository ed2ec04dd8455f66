//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use scanpost_scanner::{CameraBackendKind, DetectionStrategy};

/// Scanpost -- scan QR codes from a camera and submit them to a persistence endpoint.
///
/// Use `scanpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "scanpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the scanpost.toml configuration file.
    #[arg(short, long, global = true, default_value = "scanpost.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON (one object per line while scanning).
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the camera and scan until interrupted.
    Run(RunArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Start a scanning session. Flags override the configuration file.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Operator identifier forwarded with every submission.
    #[arg(long)]
    pub operator: Option<String>,

    /// Persistence endpoint URL.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Camera backend (native, replay).
    #[arg(long)]
    pub backend: Option<CameraBackendKind>,

    /// Image directory played back by the replay backend.
    #[arg(long)]
    pub replay_dir: Option<PathBuf>,

    /// Detection strategy (polling, continuous).
    #[arg(long)]
    pub strategy: Option<DetectionStrategy>,
}

// ---- config ----

/// Manage scanpost configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, camera, detection, gate, submission, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
