//! 고정 주기 polling 탐지
//!
//! 매 틱마다 최신 프레임 하나를 blocking 풀에서 디코드합니다.
//! 이전 디코드가 아직 진행 중이면 그 틱은 건너뜁니다 (틱이 쌓이지 않음).

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use scanpost_core::metrics as m;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::detection::{
    DetectionHandle, DetectionSink, DetectionSource, FrameDecoder, decode_first,
};
use crate::error::DecodeError;
use crate::frame::FrameSource;

const STRATEGY: &str = "polling";

type DecodeTask = JoinHandle<Result<Option<String>, DecodeError>>;

/// 고정 주기 polling 탐지기
pub struct PollingDetector<D: FrameDecoder> {
    decoder: Arc<D>,
    interval: Duration,
}

impl<D: FrameDecoder> PollingDetector<D> {
    /// 새 탐지기를 생성합니다. 0 주기는 1ms로 취급합니다.
    pub fn new(decoder: Arc<D>, interval: Duration) -> Self {
        Self {
            decoder,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// 샘플링 주기
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl<D: FrameDecoder> DetectionSource for PollingDetector<D> {
    fn name(&self) -> &'static str {
        STRATEGY
    }

    fn start(&self, frames: Arc<dyn FrameSource>, sink: DetectionSink) -> DetectionHandle {
        let task = tokio::spawn(run_polling(
            Arc::clone(&self.decoder),
            frames,
            sink.clone(),
            self.interval,
        ));
        debug!(interval_ms = self.interval.as_millis() as u64, "polling detector started");
        DetectionHandle::for_task(&sink, task)
    }
}

async fn run_polling<D: FrameDecoder>(
    decoder: Arc<D>,
    frames: Arc<dyn FrameSource>,
    sink: DetectionSink,
    period: Duration,
) {
    let cancel = sink.cancel_token().clone();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<DecodeTask> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            result = join_in_flight(&mut in_flight), if in_flight.is_some() => {
                handle_result(result, &sink);
            }

            _ = ticker.tick() => {
                if in_flight.is_some() {
                    counter!(m::DETECTION_TICKS_SKIPPED_TOTAL).increment(1);
                    continue;
                }
                let Some(frame) = frames.latest_frame() else {
                    continue;
                };
                let decoder = Arc::clone(&decoder);
                in_flight = Some(tokio::task::spawn_blocking(move || {
                    decode_first(&*decoder, &frame)
                }));
            }
        }
    }

    debug!("polling detector stopped");
}

/// 진행 중인 디코드를 기다리고 슬롯을 비웁니다.
async fn join_in_flight(
    slot: &mut Option<DecodeTask>,
) -> Result<Result<Option<String>, DecodeError>, JoinError> {
    match slot.as_mut() {
        Some(task) => {
            let result = task.await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}

fn handle_result(
    result: Result<Result<Option<String>, DecodeError>, JoinError>,
    sink: &DetectionSink,
) {
    match result {
        Ok(Ok(Some(text))) => {
            counter!(m::DETECTION_CODES_DECODED_TOTAL, m::LABEL_STRATEGY => STRATEGY).increment(1);
            sink.emit(text);
        }
        Ok(Ok(None)) => {}
        Ok(Err(e)) => {
            counter!(m::DETECTION_DECODE_ERRORS_TOTAL).increment(1);
            debug!(error = %e, "frame decode failed");
        }
        Err(e) => {
            counter!(m::DETECTION_DECODE_ERRORS_TOTAL).increment(1);
            warn!(error = %e, "decode task failed");
        }
    }
}
