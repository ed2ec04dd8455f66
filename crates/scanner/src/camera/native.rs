//! System camera backend built on `nokhwa`.
//!
//! The device is owned by a dedicated capture thread that keeps the most
//! recent frame in a shared slot. Decoding reads that slot and never blocks
//! frame delivery. Stopping the track joins that thread, so the device has
//! been released by the time `stop()` returns.
//!
//! `nokhwa` has no notion of facing mode, so the facing hint is ignored and the
//! device is chosen by index. Zoom and focus controls are not exposed; the
//! track advertises no capabilities.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::{Camera, NokhwaError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::camera::capture::CaptureThread;
use crate::camera::{CameraBackend, CameraCapabilities, CameraConstraints, FocusMode, VideoTrack};
use crate::error::CameraError;
use crate::frame::{Frame, FrameSource};

/// Pause after a failed frame read before retrying.
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// System camera backend.
#[derive(Debug, Clone, Default)]
pub struct NativeCamera;

impl NativeCamera {
    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for NativeCamera {
    type Track = NativeTrack;

    fn name(&self) -> &str {
        "native"
    }

    async fn open(&self, constraints: &CameraConstraints) -> Result<NativeTrack, CameraError> {
        let devices = nokhwa::query(ApiBackend::Auto).map_err(|e| classify(&e))?;
        if devices.is_empty() {
            return Err(CameraError::NoDeviceFound);
        }
        debug!(
            devices = devices.len(),
            facing = ?constraints.facing,
            "facing hint ignored by native backend, selecting by index"
        );

        let slot: Arc<Mutex<Option<Frame>>> = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = oneshot::channel();

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(constraints.ideal_width, constraints.ideal_height),
                FrameFormat::MJPEG,
                constraints.ideal_frame_rate.min(constraints.max_frame_rate),
            ),
        ));
        let index = CameraIndex::Index(constraints.device_index);

        let thread_slot = Arc::clone(&slot);
        let capture = CaptureThread::spawn("scanpost-camera", move |stop| {
            capture_loop(index, requested, thread_slot, stop, ready_tx)
        })
        .map_err(|e| CameraError::Unknown(format!("failed to spawn capture thread: {e}")))?;

        // On failure `capture` is dropped here, which joins the exited thread.
        match ready_rx.await {
            Ok(Ok(())) => Ok(NativeTrack { slot, capture }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CameraError::Unknown(
                "capture thread exited before the stream opened".to_owned(),
            )),
        }
    }
}

fn capture_loop(
    index: CameraIndex,
    requested: RequestedFormat<'static>,
    slot: Arc<Mutex<Option<Frame>>>,
    stop: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), CameraError>>,
) {
    let mut camera = match Camera::new(index, requested) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(classify(&e)));
            return;
        }
    };
    if let Err(e) = camera.open_stream() {
        let _ = ready.send(Err(classify(&e)));
        return;
    }

    info!(
        device = %camera.info().human_name(),
        resolution = %camera.resolution(),
        frame_rate = camera.frame_rate(),
        "native camera stream opened"
    );
    if ready.send(Ok(())).is_err() {
        // open() was cancelled; release the device.
        let _ = camera.stop_stream();
        return;
    }

    while !stop.load(Ordering::Acquire) {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(e) => {
                debug!(error = %e, "frame read failed");
                thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        };
        match buffer.decode_image::<RgbFormat>() {
            Ok(image) => {
                let frame = Frame::from_rgb(image.width(), image.height(), image.as_raw());
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
            }
            Err(e) => debug!(error = %e, "frame conversion failed"),
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!(error = %e, "failed to stop camera stream");
    }
    debug!("capture thread exited");
}

/// Maps `nokhwa` errors onto the acquisition taxonomy.
///
/// Only the unsupported-operation variants are structured; device and stream
/// errors carry platform strings and go through the message classifier.
fn classify(err: &NokhwaError) -> CameraError {
    match err {
        NokhwaError::NotImplementedError(detail) => CameraError::Unsupported(detail.clone()),
        NokhwaError::UnsupportedOperationError(backend) => {
            CameraError::Unsupported(format!("operation not supported by {backend:?}"))
        }
        other => CameraError::classify_message(&other.to_string()),
    }
}

/// Live system camera track.
pub struct NativeTrack {
    slot: Arc<Mutex<Option<Frame>>>,
    capture: CaptureThread,
}

impl FrameSource for NativeTrack {
    fn latest_frame(&self) -> Option<Frame> {
        if self.capture.is_stopped() {
            return None;
        }
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VideoTrack for NativeTrack {
    fn capabilities(&self) -> CameraCapabilities {
        CameraCapabilities::default()
    }

    async fn apply_zoom(&self, _level: f64) -> Result<(), CameraError> {
        Err(CameraError::Constraint {
            constraint: "zoom".to_owned(),
            reason: "not exposed by the native backend".to_owned(),
        })
    }

    async fn apply_focus_mode(&self, _mode: FocusMode) -> Result<(), CameraError> {
        Err(CameraError::Constraint {
            constraint: "focus_mode".to_owned(),
            reason: "not exposed by the native backend".to_owned(),
        })
    }

    /// Blocks until the capture thread has stopped the stream. A frame read
    /// in progress finishes first, so this takes at most one frame interval.
    fn stop(&self) {
        self.capture.shutdown();
    }
}
