//! `scanpost run` command handler
//!
//! Opens the camera, streams every save-status change to stdout and stops on Ctrl-C.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use scanpost_core::config::ScanpostConfig;
use scanpost_scanner::{
    CameraBackend, CameraBackendKind, HttpPersistClient, ReplayCamera, ScannerConfig,
    ScannerControllerBuilder, SubmissionState,
};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Load the configuration for a scanning session.
///
/// Order: file, `SCANPOST_*` environment overrides, command-line flags, validation.
pub async fn load_config(config_path: &Path, args: &RunArgs) -> Result<ScanpostConfig, CliError> {
    let mut config = ScanpostConfig::from_file(config_path).await?;
    config.apply_env_overrides();
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut ScanpostConfig, args: &RunArgs) {
    if let Some(ref operator) = args.operator {
        config.general.operator = operator.clone();
    }
    if let Some(ref endpoint) = args.endpoint {
        config.submission.endpoint = endpoint.clone();
    }
    if let Some(backend) = args.backend {
        config.camera.backend = backend.to_string();
    }
    if let Some(ref dir) = args.replay_dir {
        config.camera.replay_dir = dir.display().to_string();
    }
    if let Some(strategy) = args.strategy {
        config.detection.strategy = strategy.to_string();
    }
}

/// Execute the `run` command with an already loaded configuration.
pub async fn execute(config: &ScanpostConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let scanner_config = ScannerConfig::from_core(config)?;

    match scanner_config.backend {
        CameraBackendKind::Replay => {
            let backend = ReplayCamera::new(&scanner_config.replay_dir, scanner_config.replay_fps);
            run_session(scanner_config, backend, writer).await
        }
        CameraBackendKind::Native => run_native(scanner_config, writer).await,
    }
}

#[cfg(feature = "native-camera")]
async fn run_native(config: ScannerConfig, writer: &OutputWriter) -> Result<(), CliError> {
    run_session(config, scanpost_scanner::NativeCamera::new(), writer).await
}

#[cfg(not(feature = "native-camera"))]
async fn run_native(_config: ScannerConfig, _writer: &OutputWriter) -> Result<(), CliError> {
    Err(scanpost_scanner::ScannerError::from(scanpost_scanner::CameraError::Unsupported(
        "this build has no native camera support (enable the native-camera feature)".to_owned(),
    ))
    .into())
}

async fn run_session<B: CameraBackend>(
    config: ScannerConfig,
    backend: B,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let client = HttpPersistClient::new(config.endpoint.clone(), config.request_timeout)?;
    let mut controller = ScannerControllerBuilder::new()
        .config(config)
        .camera_backend(Arc::new(backend))
        .persist_client(Arc::new(client))
        .build()?;

    controller.start().await?;
    info!(
        strategy = controller.strategy_name(),
        endpoint = %controller.config().endpoint,
        "scanning; press Ctrl-C to stop"
    );

    let mut updates = controller.subscribe();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            biased;
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                info!("interrupt received, stopping");
                break Ok(());
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = updates.borrow_and_update().clone();
                let line = StatusLine::new(&state, controller.scan_count());
                if let Err(e) = writer.render_line(&line) {
                    break Err(e);
                }
            }
        }
    };

    controller.stop().await;

    let summary = SessionSummary {
        strategy: controller.strategy_name().to_owned(),
        scan_count: controller.scan_count(),
        detections_received: controller.detections_received(),
        detections_accepted: controller.detections_accepted(),
        detections_suppressed: controller.detections_suppressed(),
    };
    info!(scan_count = summary.scan_count, "session ended");

    outcome?;
    writer.render(&summary)?;
    Ok(())
}

/// One save-status change.
#[derive(Debug, Serialize)]
pub struct StatusLine {
    /// Status name (idle, saving, saved, error)
    pub status: &'static str,
    /// Text of the current scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Error message when `status` is `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Trace ID of the current scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Scans saved so far in this session
    pub scan_count: u64,
}

impl StatusLine {
    pub fn new(state: &SubmissionState, scan_count: u64) -> Self {
        Self {
            status: state.status.name(),
            text: state.current.as_ref().map(|r| r.text.clone()),
            error: state.status.error_message().map(str::to_owned),
            trace_id: state.current.as_ref().map(|r| r.trace_id.clone()),
            scan_count,
        }
    }
}

impl Render for StatusLine {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let label = match self.status {
            "saved" => self.status.green().bold(),
            "error" => self.status.red().bold(),
            "saving" => self.status.yellow(),
            _ => self.status.dimmed(),
        };
        write!(w, "[{}]", label)?;
        if let Some(ref text) = self.text {
            write!(w, " {:?}", text)?;
        }
        if let Some(ref error) = self.error {
            write!(w, " {}", error.red())?;
        }
        writeln!(w, " (scans: {})", self.scan_count)
    }
}

/// Printed once after the session stops.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub strategy: String,
    pub scan_count: u64,
    pub detections_received: u64,
    pub detections_accepted: u64,
    pub detections_suppressed: u64,
}

impl Render for SessionSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "Session summary".bold())?;
        writeln!(w, "  Scans saved:  {}", self.scan_count)?;
        writeln!(
            w,
            "  Detections:   {} received, {} accepted, {} suppressed",
            self.detections_received, self.detections_accepted, self.detections_suppressed
        )?;
        writeln!(w, "  Strategy:     {}", self.strategy)
    }
}
