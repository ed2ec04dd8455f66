//! 연속 스캔 엔진 탐지
//!
//! 전용 OS 스레드에서 엔진이 최신 프레임을 계속 디코드하고, 결과를
//! 성공/실패 콜백으로 전달합니다. 디코드 사이에는 짧게 쉬어 CPU를 양보합니다.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use metrics::counter;
use scanpost_core::metrics as m;
use tracing::{debug, error};

use crate::detection::{
    DetectionHandle, DetectionSink, DetectionSource, FrameDecoder, decode_first,
};
use crate::error::DecodeError;
use crate::frame::FrameSource;

const STRATEGY: &str = "continuous";

/// 연속 스캔 엔진 탐지기
pub struct ContinuousDetector<D: FrameDecoder> {
    decoder: Arc<D>,
    idle: Duration,
}

impl<D: FrameDecoder> ContinuousDetector<D> {
    /// 새 탐지기를 생성합니다. `idle`은 디코드 사이 휴지 시간입니다.
    pub fn new(decoder: Arc<D>, idle: Duration) -> Self {
        Self {
            decoder,
            idle: idle.max(Duration::from_millis(1)),
        }
    }
}

impl<D: FrameDecoder> DetectionSource for ContinuousDetector<D> {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    fn start(&self, frames: Arc<dyn FrameSource>, sink: DetectionSink) -> DetectionHandle {
        let handle = DetectionHandle::for_thread(&sink);
        let engine = ScanEngine {
            decoder: Arc::clone(&self.decoder),
            frames,
            idle: self.idle,
        };

        let engine_sink = sink.clone();
        let spawned = thread::Builder::new()
            .name("scanpost-scan-engine".to_owned())
            .spawn(move || {
                engine.run(
                    &engine_sink,
                    |text| {
                        counter!(m::DETECTION_CODES_DECODED_TOTAL, m::LABEL_STRATEGY => STRATEGY)
                            .increment(1);
                        engine_sink.emit(text);
                    },
                    |err| {
                        counter!(m::DETECTION_DECODE_ERRORS_TOTAL).increment(1);
                        debug!(error = %err, "frame decode failed");
                    },
                );
            });

        match spawned {
            Ok(_) => debug!(idle_ms = self.idle.as_millis() as u64, "scan engine started"),
            Err(e) => {
                error!(error = %e, "failed to spawn scan engine thread");
                sink.cancel_token().cancel();
            }
        }
        handle
    }
}

struct ScanEngine<D: FrameDecoder> {
    decoder: Arc<D>,
    frames: Arc<dyn FrameSource>,
    idle: Duration,
}

impl<D: FrameDecoder> ScanEngine<D> {
    fn run(
        &self,
        sink: &DetectionSink,
        on_decoded: impl Fn(String),
        on_failure: impl Fn(DecodeError),
    ) {
        while !sink.is_cancelled() {
            if let Some(frame) = self.frames.latest_frame() {
                match decode_first(&*self.decoder, &frame) {
                    Ok(Some(text)) => on_decoded(text),
                    Ok(None) => {}
                    Err(e) => on_failure(e),
                }
            }
            thread::sleep(self.idle);
        }
        debug!("scan engine stopped");
    }
}
