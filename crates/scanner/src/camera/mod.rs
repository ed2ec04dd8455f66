//! 카메라 추상화 및 세션 관리
//!
//! [`CameraBackend`] trait은 카메라 획득을 추상화하여, 운영 코드는
//! [`ReplayCamera`]나 `NativeCamera`를, 테스트는 `MockCameraBackend`를 사용합니다.
//! [`CameraSession`]은 열린 트랙 하나를 소유하고 초기 줌/초점 설정,
//! 초점 재조정, 종료를 담당합니다.
//!
//! # 아키텍처
//!
//! ```text
//! ScannerController
//!        │ open()
//!        ▼
//! CameraSession ──owns──> VideoTrack (FrameSource)
//!        │                      ▲
//!        │ frames()             │ latest_frame()
//!        ▼                      │
//! DetectionSource ──────────────┘
//! ```
//!
//! 줌/초점은 모두 best-effort입니다. 지원하지 않으면 아무것도 하지 않고,
//! 적용에 실패하면 debug 로그만 남깁니다.

pub mod replay;

#[cfg(any(feature = "native-camera", test))]
mod capture;
#[cfg(feature = "native-camera")]
pub mod native;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::CameraError;
use crate::frame::FrameSource;

pub use replay::ReplayCamera;

#[cfg(feature = "native-camera")]
pub use native::NativeCamera;

/// 카메라 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// 후면 카메라
    Environment,
    /// 전면 카메라
    User,
}

/// 카메라 요청 제약
///
/// 모든 값은 "이상적인" 값이며, 백엔드는 가장 가까운 형식으로 대체하고
/// 불일치로 실패하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraConstraints {
    /// 시스템 카메라 인덱스
    pub device_index: u32,
    /// 요청 방향
    pub facing: FacingMode,
    /// 이상적인 가로 해상도
    pub ideal_width: u32,
    /// 이상적인 세로 해상도
    pub ideal_height: u32,
    /// 이상적인 프레임레이트
    pub ideal_frame_rate: u32,
    /// 최대 프레임레이트
    pub max_frame_rate: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            device_index: 0,
            facing: FacingMode::Environment,
            ideal_width: 1920,
            ideal_height: 1080,
            ideal_frame_rate: 30,
            max_frame_rate: 60,
        }
    }
}

/// 줌 범위
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomRange {
    /// 최소 배율
    pub min: f64,
    /// 최대 배율
    pub max: f64,
}

impl ZoomRange {
    /// 배율을 지원 범위로 제한합니다.
    pub fn clamp(&self, level: f64) -> f64 {
        level.clamp(self.min, self.max)
    }

    /// 세션 시작 시 적용할 초기 배율: `max(min, 1.0)`
    pub fn initial_level(&self) -> f64 {
        self.clamp(self.min.max(1.0))
    }
}

/// 초점 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    /// 연속 자동 초점
    Continuous,
    /// 단발 자동 초점
    SingleShot,
    /// 수동 초점
    Manual,
}

/// 트랙 기능 스냅샷 (세션당 한 번 조회)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CameraCapabilities {
    /// 줌 범위 (미지원 시 `None`)
    pub zoom: Option<ZoomRange>,
    /// 지원하는 초점 모드
    pub focus_modes: Vec<FocusMode>,
}

impl CameraCapabilities {
    /// 해당 초점 모드를 지원하는지 확인합니다.
    pub fn supports_focus(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }
}

/// 열린 비디오 트랙
///
/// 프레임 제공([`FrameSource`])과 선택적 제약 적용을 담당합니다.
pub trait VideoTrack: FrameSource + 'static {
    /// 트랙 기능을 조회합니다.
    fn capabilities(&self) -> CameraCapabilities;

    /// 줌 배율을 적용합니다.
    fn apply_zoom(&self, level: f64) -> impl Future<Output = Result<(), CameraError>> + Send;

    /// 초점 모드를 적용합니다.
    fn apply_focus_mode(
        &self,
        mode: FocusMode,
    ) -> impl Future<Output = Result<(), CameraError>> + Send;

    /// 트랙을 정지하고 장치를 해제합니다.
    ///
    /// 반환 시점에는 장치가 이미 해제되어 있어야 하며, 여러 번 호출해도 안전해야 합니다.
    fn stop(&self);
}

/// 카메라 획득을 추상화하는 trait
///
/// # Implementations
///
/// - [`ReplayCamera`]: 이미지 디렉토리를 고정 프레임레이트로 재생
/// - `NativeCamera`: 시스템 카메라 (`native-camera` 기능)
/// - `MockCameraBackend`: 테스트 전용
pub trait CameraBackend: Send + Sync + 'static {
    /// 이 백엔드가 여는 트랙 타입
    type Track: VideoTrack;

    /// 백엔드 이름 (로그, 메트릭 레이블)
    fn name(&self) -> &str;

    /// 제약에 맞는 트랙을 엽니다.
    ///
    /// # Errors
    ///
    /// 권한 거부, 장치 없음, 미지원, 기타 실패를 [`CameraError`]로 분류하여 반환합니다.
    fn open(
        &self,
        constraints: &CameraConstraints,
    ) -> impl Future<Output = Result<Self::Track, CameraError>> + Send;
}

/// 카메라 세션: 열린 트랙 하나의 생명주기
///
/// 드롭 시 [`close`](Self::close)가 실행됩니다.
pub struct CameraSession<T: VideoTrack> {
    track: Arc<T>,
    capabilities: CameraCapabilities,
    closed: Arc<AtomicBool>,
    refocus_restore: Duration,
    restore_task: Option<JoinHandle<()>>,
}

impl<T: VideoTrack> CameraSession<T> {
    /// 백엔드에서 트랙을 열고 초기 줌/초점을 적용합니다.
    pub async fn open<B>(
        backend: &B,
        constraints: &CameraConstraints,
        refocus_restore: Duration,
    ) -> Result<Self, CameraError>
    where
        B: CameraBackend<Track = T>,
    {
        let track = backend.open(constraints).await?;
        let capabilities = track.capabilities();
        info!(
            backend = backend.name(),
            zoom = capabilities.zoom.is_some(),
            focus_modes = ?capabilities.focus_modes,
            "camera session opened"
        );

        let session = Self {
            track: Arc::new(track),
            capabilities,
            closed: Arc::new(AtomicBool::new(false)),
            refocus_restore,
            restore_task: None,
        };
        session.apply_initial_settings().await;
        Ok(session)
    }

    async fn apply_initial_settings(&self) {
        if let Some(range) = self.capabilities.zoom {
            let level = range.initial_level();
            if let Err(e) = self.track.apply_zoom(level).await {
                debug!(level, error = %e, "initial zoom not applied");
            }
        }

        if self.capabilities.supports_focus(FocusMode::Continuous) {
            if let Err(e) = self.track.apply_focus_mode(FocusMode::Continuous).await {
                debug!(error = %e, "continuous focus not applied");
            }
        }
    }

    /// 세션 시작 시 조회한 기능 스냅샷
    pub fn capabilities(&self) -> &CameraCapabilities {
        &self.capabilities
    }

    /// 탐지 소스에 넘길 프레임 소스
    pub fn frames(&self) -> Arc<dyn FrameSource> {
        let track: Arc<T> = Arc::clone(&self.track);
        track
    }

    /// 세션이 닫혔는지 확인합니다.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 줌 배율을 지원 범위로 제한하여 적용합니다. 미지원이면 아무것도 하지 않습니다.
    pub async fn apply_zoom(&self, level: f64) {
        if self.is_closed() {
            return;
        }
        let Some(range) = self.capabilities.zoom else {
            debug!(level, "zoom not supported by this track");
            return;
        };
        if !level.is_finite() {
            debug!(level, "ignoring non-finite zoom level");
            return;
        }

        let clamped = range.clamp(level);
        if let Err(e) = self.track.apply_zoom(clamped).await {
            debug!(level = clamped, error = %e, "zoom not applied");
        }
    }

    /// 초점을 다시 잡습니다 (best-effort).
    ///
    /// - 단발 + 연속 모두 지원: 단발 적용 후 복귀 지연 뒤 연속으로 되돌림
    /// - 연속만 지원: 연속 모드 재적용
    /// - 단발만 지원: 단발 적용
    /// - 그 외: 아무것도 하지 않음
    pub async fn trigger_refocus(&mut self) {
        if self.is_closed() {
            return;
        }
        let single_shot = self.capabilities.supports_focus(FocusMode::SingleShot);
        let continuous = self.capabilities.supports_focus(FocusMode::Continuous);

        match (single_shot, continuous) {
            (true, true) => {
                if let Err(e) = self.track.apply_focus_mode(FocusMode::SingleShot).await {
                    debug!(error = %e, "single-shot focus not applied");
                    return;
                }
                self.schedule_focus_restore();
            }
            (false, true) => {
                if let Err(e) = self.track.apply_focus_mode(FocusMode::Continuous).await {
                    debug!(error = %e, "continuous focus not re-applied");
                }
            }
            (true, false) => {
                if let Err(e) = self.track.apply_focus_mode(FocusMode::SingleShot).await {
                    debug!(error = %e, "single-shot focus not applied");
                }
            }
            (false, false) => debug!("focus control not supported by this track"),
        }
    }

    fn schedule_focus_restore(&mut self) {
        if let Some(previous) = self.restore_task.take() {
            previous.abort();
        }

        let track = Arc::clone(&self.track);
        let closed = Arc::clone(&self.closed);
        let delay = self.refocus_restore;
        self.restore_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if closed.load(Ordering::Acquire) {
                return;
            }
            if let Err(e) = track.apply_focus_mode(FocusMode::Continuous).await {
                debug!(error = %e, "continuous focus not restored");
            }
        }));
    }

    /// 트랙을 정지합니다. 여러 번 호출해도 안전합니다.
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.restore_task.take() {
            task.abort();
        }
        self.track.stop();
        info!("camera session closed");
    }
}

impl<T: VideoTrack> Drop for CameraSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

// --- 테스트용 mock ---

/// mock 트랙에 기록된 호출
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum TrackCall {
    /// apply_zoom 호출
    Zoom(f64),
    /// apply_focus_mode 호출
    Focus(FocusMode),
    /// stop 호출
    Stop,
}

#[cfg(test)]
#[derive(Default)]
struct MockTrackState {
    capabilities: CameraCapabilities,
    frame: std::sync::Mutex<Option<crate::frame::Frame>>,
    calls: std::sync::Mutex<Vec<TrackCall>>,
    stopped: AtomicBool,
    fail_constraints: bool,
}

/// 호출을 기록하는 테스트용 트랙
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTrack {
    state: Arc<MockTrackState>,
}

#[cfg(test)]
impl MockTrack {
    /// 기록된 호출 목록
    pub fn calls(&self) -> Vec<TrackCall> {
        self.state.calls.lock().unwrap().clone()
    }

    /// 정지되었는지 확인합니다.
    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::Acquire)
    }

    /// 다음 `latest_frame()`이 반환할 프레임을 설정합니다.
    pub fn set_frame(&self, frame: crate::frame::Frame) {
        *self.state.frame.lock().unwrap() = Some(frame);
    }
}

#[cfg(test)]
impl FrameSource for MockTrack {
    fn latest_frame(&self) -> Option<crate::frame::Frame> {
        if self.is_stopped() {
            return None;
        }
        self.state.frame.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl VideoTrack for MockTrack {
    fn capabilities(&self) -> CameraCapabilities {
        self.state.capabilities.clone()
    }

    async fn apply_zoom(&self, level: f64) -> Result<(), CameraError> {
        self.state.calls.lock().unwrap().push(TrackCall::Zoom(level));
        if self.state.fail_constraints {
            return Err(CameraError::Constraint {
                constraint: "zoom".to_owned(),
                reason: "mock failure".to_owned(),
            });
        }
        Ok(())
    }

    async fn apply_focus_mode(&self, mode: FocusMode) -> Result<(), CameraError> {
        self.state.calls.lock().unwrap().push(TrackCall::Focus(mode));
        if self.state.fail_constraints {
            return Err(CameraError::Constraint {
                constraint: "focus_mode".to_owned(),
                reason: "mock failure".to_owned(),
            });
        }
        Ok(())
    }

    fn stop(&self) {
        if !self.state.stopped.swap(true, Ordering::AcqRel) {
            self.state.calls.lock().unwrap().push(TrackCall::Stop);
        }
    }
}

/// 설정 가능한 응답을 가진 테스트용 카메라 백엔드
#[cfg(test)]
#[derive(Default)]
pub struct MockCameraBackend {
    /// 열리는 트랙의 기능
    pub capabilities: CameraCapabilities,
    /// open 호출 시 반환할 에러
    pub open_error: Option<CameraError>,
    /// 제약 적용 실패를 시뮬레이션할지 여부
    pub fail_constraints: bool,
    /// 지금까지 연 트랙
    pub opened: std::sync::Mutex<Vec<MockTrack>>,
}

#[cfg(test)]
impl MockCameraBackend {
    /// 기능이 없는 mock 백엔드를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 트랙 기능을 설정합니다.
    pub fn with_capabilities(mut self, capabilities: CameraCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// open이 실패하도록 설정합니다.
    pub fn with_open_error(mut self, error: CameraError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// 줌/초점 적용이 실패하도록 설정합니다.
    pub fn with_failing_constraints(mut self) -> Self {
        self.fail_constraints = true;
        self
    }

    /// 가장 최근에 연 트랙
    pub fn last_track(&self) -> Option<MockTrack> {
        self.opened.lock().unwrap().last().cloned()
    }
}

#[cfg(test)]
impl CameraBackend for MockCameraBackend {
    type Track = MockTrack;

    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, _constraints: &CameraConstraints) -> Result<MockTrack, CameraError> {
        if let Some(ref error) = self.open_error {
            return Err(error.clone());
        }
        let track = MockTrack {
            state: Arc::new(MockTrackState {
                capabilities: self.capabilities.clone(),
                fail_constraints: self.fail_constraints,
                ..MockTrackState::default()
            }),
        };
        self.opened.lock().unwrap().push(track.clone());
        Ok(track)
    }
}
