//! 제출 파이프라인
//!
//! 게이트를 통과한 텍스트를 영속화 엔드포인트로 보내고, 표시 상태를
//! `idle → saving → {saved | error}`로 구동합니다.
//!
//! - 제출은 fire-and-forget입니다. 반환된 핸들은 무시해도 됩니다.
//! - 가장 최근에 시작된 제출만 표시 상태와 현재 레코드를 바꿀 수 있습니다
//!   (세대 번호 비교).
//! - `saved`는 표시 시간이 지나면 `idle`로 돌아갑니다. 그 사이 새 제출이
//!   시작되었다면 되돌리지 않습니다.
//! - `error`는 다음 제출까지 유지됩니다. 자동 재시도는 없습니다.
//! - 저장 성공 카운터는 표시 여부와 무관하게 증가합니다.
//!
//! 상태는 `tokio::sync::watch` 채널로 발행됩니다.

pub mod client;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use scanpost_core::event::{
    DetectionEvent, EventMetadata, MODULE_SUBMISSION, SaveStatus, ScanRecord, SubmissionStatus,
};
use scanpost_core::metrics as m;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use client::{HttpPersistClient, PersistClient, SaveRequest, SaveResponse};

/// 발행되는 제출 상태
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionState {
    /// 표시 상태
    pub status: SaveStatus,
    /// 현재 스캔 레코드 (가장 최근에 수락된 것)
    pub current: Option<ScanRecord>,
    /// 세대 번호. 제출 시작과 표시 초기화마다 증가합니다.
    pub generation: u64,
}

/// 제출 파이프라인
pub struct SubmissionPipeline<P: PersistClient> {
    client: Arc<P>,
    display_window: Duration,
    state: Arc<watch::Sender<SubmissionState>>,
    saved: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl<P: PersistClient> Clone for SubmissionPipeline<P> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            display_window: self.display_window,
            state: Arc::clone(&self.state),
            saved: Arc::clone(&self.saved),
            failed: Arc::clone(&self.failed),
        }
    }
}

impl<P: PersistClient> SubmissionPipeline<P> {
    /// 새 파이프라인을 생성합니다. `display_window`는 `saved` 표시 유지 시간입니다.
    pub fn new(client: Arc<P>, display_window: Duration) -> Self {
        let (state, _) = watch::channel(SubmissionState::default());
        Self {
            client,
            display_window,
            state: Arc::new(state),
            saved: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 텍스트를 제출합니다. 새 추적 ID가 부여됩니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn submit(&self, text: impl Into<String>, operator: Option<String>) -> JoinHandle<()> {
        let trace_id = EventMetadata::with_new_trace(MODULE_SUBMISSION).trace_id;
        self.submit_traced(text.into(), operator, trace_id)
    }

    /// 탐지 이벤트의 추적 ID를 이어받아 제출합니다.
    pub fn submit_detection(
        &self,
        event: &DetectionEvent,
        operator: Option<String>,
    ) -> JoinHandle<()> {
        self.submit_traced(event.text.clone(), operator, event.metadata.trace_id.clone())
    }

    fn submit_traced(
        &self,
        text: String,
        operator: Option<String>,
        trace_id: String,
    ) -> JoinHandle<()> {
        let record = ScanRecord::pending(text.clone(), operator.clone(), trace_id.clone());
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            generation = state.generation;
            state.status = SaveStatus::Saving;
            state.current = Some(record);
        });
        counter!(m::SUBMISSIONS_TOTAL).increment(1);
        info!(trace_id = %trace_id, text = %text, generation, "submitting scan");

        let pipeline = self.clone();
        let request = SaveRequest {
            qr_text: text,
            operator,
        };
        tokio::spawn(async move { pipeline.run_submission(generation, request, trace_id).await })
    }

    async fn run_submission(self, generation: u64, request: SaveRequest, trace_id: String) {
        let started = Instant::now();
        let result = self.client.save(&request).await;
        histogram!(m::SUBMISSION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                let total = self.saved.fetch_add(1, Ordering::Relaxed) + 1;
                counter!(m::SUBMISSIONS_SAVED_TOTAL).increment(1);
                let shown = self.finish(generation, SaveStatus::Saved, SubmissionStatus::Saved);
                info!(trace_id = %trace_id, generation, shown, scan_count = total, "scan saved");
                if shown {
                    self.schedule_revert(generation);
                }
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                counter!(m::SUBMISSIONS_FAILED_TOTAL).increment(1);
                let message = e.to_string();
                let shown = self.finish(
                    generation,
                    SaveStatus::Error(message.clone()),
                    SubmissionStatus::Failed,
                );
                warn!(
                    trace_id = %trace_id,
                    generation,
                    shown,
                    error = %message,
                    "scan submission failed"
                );
            }
        }
    }

    /// 세대가 일치할 때만 결과를 반영합니다. 반영되면 `true`.
    fn finish(&self, generation: u64, status: SaveStatus, record_status: SubmissionStatus) -> bool {
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            state.status = status;
            if let Some(record) = state.current.as_mut() {
                record.submission_status = record_status;
            }
            true
        })
    }

    fn schedule_revert(&self, generation: u64) {
        let state = Arc::clone(&self.state);
        let window = self.display_window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let reverted = state.send_if_modified(|state| {
                if state.generation != generation || state.status != SaveStatus::Saved {
                    return false;
                }
                state.status = SaveStatus::Idle;
                state.current = None;
                true
            });
            debug!(generation, reverted, "saved display window elapsed");
        });
    }

    /// 표시 상태를 `idle`로 초기화하고 대기 중인 되돌리기를 무효화합니다.
    pub fn reset_display(&self) {
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = SaveStatus::Idle;
            state.current = None;
        });
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// 현재 상태의 복사본
    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    /// 현재 표시 상태
    pub fn status(&self) -> SaveStatus {
        self.state.borrow().status.clone()
    }

    /// 이 세션에서 저장에 성공한 스캔 수
    pub fn scan_count(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    /// 이 세션에서 실패한 제출 수
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// `saved` 표시 유지 시간
    pub fn display_window(&self) -> Duration {
        self.display_window
    }
}
