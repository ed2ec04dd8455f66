#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ScannerError`, `CameraError`, `DecodeError`, `SubmissionError`)
//! - [`config`]: Runtime configuration derived from `scanpost.toml` (`ScannerConfig`)
//! - [`frame`]: Luma frames and the `FrameSource` seam
//! - [`camera`]: Camera backends and session lifecycle (`CameraSession`, `ReplayCamera`)
//! - [`detection`]: Decoding strategies (`PollingDetector`, `ContinuousDetector`, `RqrrDecoder`)
//! - [`gate`]: Cooldown gate (`ScanGate`)
//! - [`submission`]: Persistence client and save-status state machine (`SubmissionPipeline`)
//! - [`controller`]: Main orchestrator (`ScannerController`, `ScannerControllerBuilder`)

pub mod camera;
pub mod config;
pub mod controller;
pub mod detection;
pub mod error;
pub mod frame;
pub mod gate;
pub mod submission;

// --- Public API Re-exports ---

// Controller (main orchestrator)
pub use controller::{ScannerController, ScannerControllerBuilder, ScannerPhase, ScannerSnapshot};

// Configuration
pub use config::{CameraBackendKind, DetectionStrategy, ScannerConfig};

// Error
pub use error::{CameraError, DecodeError, ScannerError, SubmissionError};

// Camera
#[cfg(feature = "native-camera")]
pub use camera::native::NativeCamera;
pub use camera::replay::ReplayCamera;
pub use camera::{
    CameraBackend, CameraCapabilities, CameraConstraints, CameraSession, FacingMode, FocusMode,
    VideoTrack, ZoomRange,
};

// Frames
pub use frame::{Frame, FrameSource};

// Detection
pub use detection::{
    ContinuousDetector, DetectionHandle, DetectionSink, DetectionSource, FrameDecoder,
    PollingDetector, RqrrDecoder,
};

// Gate
pub use gate::ScanGate;

// Submission
pub use submission::{
    HttpPersistClient, PersistClient, SaveRequest, SaveResponse, SubmissionPipeline,
    SubmissionState,
};
