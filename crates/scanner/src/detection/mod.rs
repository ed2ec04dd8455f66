//! 코드 탐지: 프레임에서 QR 텍스트를 추출하는 전략들
//!
//! [`DetectionSource`]는 "프레임이 주어지면 0개 또는 1개의 텍스트"를 만드는
//! 샘플링 루프를 시작합니다. 두 가지 전략이 같은 인터페이스 뒤에 있습니다.
//!
//! - [`PollingDetector`]: 고정 주기마다 blocking 풀에서 한 번 디코드
//! - [`ContinuousDetector`]: 전용 스레드 엔진이 연속으로 디코드하고 콜백으로 결과를 전달
//!
//! # 보장
//! - 디코드는 프레임 전달을 막지 않습니다.
//! - 한 번의 디코드에서 난 에러나 패닉은 루프를 끝내지 않습니다.
//! - 디코더가 여러 코드를 보고해도 첫 번째만 사용합니다.
//! - [`DetectionHandle::stop`]이 반환된 뒤에는 어떤 이벤트도 내보내지 않습니다.

pub mod continuous;
pub mod decoder;
pub mod polling;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use scanpost_core::event::DetectionEvent;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::{DetectionStrategy, ScannerConfig};
use crate::error::DecodeError;
use crate::frame::{Frame, FrameSource};

pub use continuous::ContinuousDetector;
pub use decoder::RqrrDecoder;
pub use polling::PollingDetector;

/// 단일 프레임 디코더
///
/// 블로킹 호출이며 blocking 풀이나 전용 스레드에서만 실행됩니다.
pub trait FrameDecoder: Send + Sync + 'static {
    /// 프레임에서 찾은 모든 코드의 텍스트를 발견 순서대로 반환합니다.
    fn decode(&self, frame: &Frame) -> Result<Vec<String>, DecodeError>;
}

/// 프레임을 검증하고 디코드하여 첫 번째 코드만 반환합니다.
///
/// 디코더 패닉은 [`DecodeError::Panicked`]로 변환됩니다.
pub fn decode_first<D: FrameDecoder + ?Sized>(
    decoder: &D,
    frame: &Frame,
) -> Result<Option<String>, DecodeError> {
    frame.validate()?;
    let codes = catch_unwind(AssertUnwindSafe(|| decoder.decode(frame)))
        .map_err(|_| DecodeError::Panicked)??;
    Ok(codes.into_iter().next())
}

/// 탐지 루프 시작 인터페이스
pub trait DetectionSource: Send + Sync {
    /// 전략 이름 (로그, 메트릭 레이블)
    fn name(&self) -> &'static str;

    /// 탐지 루프를 시작합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다. 반환된 핸들로 루프를 정지합니다.
    fn start(&self, frames: Arc<dyn FrameSource>, sink: DetectionSink) -> DetectionHandle;
}

/// 설정에 맞는 탐지 소스를 생성합니다.
pub fn from_config(config: &ScannerConfig) -> Arc<dyn DetectionSource> {
    let decoder = Arc::new(RqrrDecoder::new());
    match config.strategy {
        DetectionStrategy::Polling => Arc::new(PollingDetector::new(decoder, config.tick_interval)),
        DetectionStrategy::Continuous => {
            Arc::new(ContinuousDetector::new(decoder, config.engine_idle))
        }
    }
}

/// 탐지 결과를 소비자에게 전달하는 출구
///
/// 취소된 뒤에는 아무것도 보내지 않습니다. 소비자가 바쁘면(채널 가득 참)
/// 탐지를 버리며, 다음 샘플링에서 다시 탐지됩니다.
#[derive(Clone)]
pub struct DetectionSink {
    tx: mpsc::Sender<DetectionEvent>,
    cancel: CancellationToken,
    emit_lock: Arc<Mutex<()>>,
}

impl DetectionSink {
    /// 새 출구를 생성합니다.
    pub fn new(tx: mpsc::Sender<DetectionEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            emit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 디코드된 텍스트를 탐지 이벤트로 내보냅니다. 전달되면 `true`.
    pub fn emit(&self, text: String) -> bool {
        let _guard = self.emit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.tx.try_send(DetectionEvent::new(text)) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                debug!(text = %event.text, "detection channel full, dropping detection");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// 취소되었는지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 취소 토큰
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// 실행 중인 탐지 루프의 핸들
///
/// 드롭하면 루프가 취소됩니다 (대기하지 않음).
pub struct DetectionHandle {
    cancel: CancellationToken,
    emit_lock: Arc<Mutex<()>>,
    task: Option<JoinHandle<()>>,
}

impl DetectionHandle {
    /// tokio 태스크로 실행되는 루프의 핸들을 만듭니다.
    pub fn for_task(sink: &DetectionSink, task: JoinHandle<()>) -> Self {
        Self {
            cancel: sink.cancel.clone(),
            emit_lock: Arc::clone(&sink.emit_lock),
            task: Some(task),
        }
    }

    /// 자체 스레드에서 실행되는 루프의 핸들을 만듭니다.
    ///
    /// 스레드는 취소 토큰을 보고 스스로 종료합니다.
    pub fn for_thread(sink: &DetectionSink) -> Self {
        Self {
            cancel: sink.cancel.clone(),
            emit_lock: Arc::clone(&sink.emit_lock),
            task: None,
        }
    }

    /// 루프를 취소하고 종료를 기다립니다.
    ///
    /// 반환 시점 이후에는 이 루프에서 어떤 이벤트도 나오지 않습니다.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        // 진행 중인 emit이 끝날 때까지 기다린 뒤로는 모든 emit이 취소를 관찰함
        drop(self.emit_lock.lock().unwrap_or_else(PoisonError::into_inner));
    }

    /// 취소되었는지 확인합니다.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for DetectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// --- 테스트용 mock ---

/// 미리 정한 결과를 순서대로 돌려주는 테스트용 디코더
///
/// 결과가 소진되면 항상 빈 결과를 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct ScriptedDecoder {
    script: Mutex<std::collections::VecDeque<ScriptStep>>,
    calls: std::sync::atomic::AtomicUsize,
}

/// [`ScriptedDecoder`]의 한 단계
#[cfg(test)]
pub enum ScriptStep {
    /// 이 코드들을 반환
    Codes(Vec<&'static str>),
    /// 디코드 에러
    Fail,
    /// 패닉
    Panic,
    /// 지정한 시간 동안 블로킹 후 코드 반환
    Slow(std::time::Duration, &'static str),
}

#[cfg(test)]
impl ScriptedDecoder {
    /// 단계 목록으로 디코더를 생성합니다.
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// decode 호출 횟수
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl FrameDecoder for ScriptedDecoder {
    fn decode(&self, _frame: &Frame) -> Result<Vec<String>, DecodeError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(ScriptStep::Codes(codes)) => Ok(codes.into_iter().map(str::to_owned).collect()),
            Some(ScriptStep::Fail) => Err(DecodeError::Decode("scripted failure".to_owned())),
            Some(ScriptStep::Panic) => panic!("scripted decoder panic"),
            Some(ScriptStep::Slow(delay, code)) => {
                std::thread::sleep(delay);
                Ok(vec![code.to_owned()])
            }
            None => Ok(Vec::new()),
        }
    }
}

/// 고정 프레임을 돌려주는 테스트용 프레임 소스
#[cfg(test)]
pub struct StaticFrames(pub Option<Frame>);

#[cfg(test)]
impl FrameSource for StaticFrames {
    fn latest_frame(&self) -> Option<Frame> {
        self.0.clone()
    }
}

#[cfg(test)]
pub(crate) fn blank_frame() -> Frame {
    Frame::from_luma(4, 4, vec![255_u8; 16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_first_takes_only_first_code() {
        let decoder = ScriptedDecoder::new(vec![ScriptStep::Codes(vec!["FIRST", "SECOND"])]);
        let result = decode_first(&decoder, &blank_frame()).unwrap();
        assert_eq!(result.as_deref(), Some("FIRST"));
    }

    #[test]
    fn decode_first_empty_is_none() {
        let decoder = ScriptedDecoder::new(vec![]);
        assert_eq!(decode_first(&decoder, &blank_frame()).unwrap(), None);
    }

    #[test]
    fn decode_first_converts_panic() {
        let decoder = ScriptedDecoder::new(vec![ScriptStep::Panic]);
        let err = decode_first(&decoder, &blank_frame()).unwrap_err();
        assert_eq!(err, DecodeError::Panicked);
    }

    #[test]
    fn decode_first_rejects_invalid_frame_without_decoding() {
        let decoder = ScriptedDecoder::new(vec![ScriptStep::Codes(vec!["X"])]);
        let frame = Frame::from_luma(10, 10, vec![0_u8; 3]);
        assert!(matches!(
            decode_first(&decoder, &frame),
            Err(DecodeError::InvalidFrame { .. })
        ));
        assert_eq!(decoder.calls(), 0);
    }

    #[tokio::test]
    async fn sink_drops_when_channel_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = DetectionSink::new(tx, CancellationToken::new());
        assert!(sink.emit("A".to_owned()));
        assert!(!sink.emit("B".to_owned()));
        assert_eq!(rx.recv().await.unwrap().text, "A");
    }

    #[tokio::test]
    async fn sink_stops_emitting_after_cancel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = DetectionSink::new(tx, CancellationToken::new());
        let handle = DetectionHandle::for_thread(&sink);
        handle.stop().await;

        assert!(sink.is_cancelled());
        assert!(!sink.emit("late".to_owned()));
        drop(sink);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn from_config_selects_strategy() {
        let polling = from_config(&ScannerConfig::default());
        assert_eq!(polling.name(), "polling");

        let continuous = from_config(&ScannerConfig {
            strategy: DetectionStrategy::Continuous,
            ..ScannerConfig::default()
        });
        assert_eq!(continuous.name(), "continuous");
    }
}
