//! 스캐너 컨트롤러 -- 카메라/탐지/게이트/제출의 전체 흐름 관리
//!
//! [`ScannerController`]는 core의 [`Pipeline`] trait을 구현하여
//! 다른 파이프라인과 동일한 생명주기(start/stop/health_check)로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! CameraSession ──frames──> DetectionSource
//!                                |
//!                          DetectionEvent ──mpsc──> forwarder task
//!                                                       |
//!                                                  ScanGate.accept()
//!                                                       |
//!                                              SubmissionPipeline.submit()
//!                                                       |
//!                                              watch<SubmissionState>
//! ```
//!
//! # 정지 순서
//! 탐지 소스 → 전달 태스크(대기) → 카메라 세션 → 게이트 초기화.
//! 진행 중인 제출은 기다리지 않습니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use scanpost_core::error::ScanpostError;
use scanpost_core::event::{DetectionEvent, SaveStatus, ScanRecord};
use scanpost_core::metrics as m;
use scanpost_core::pipeline::{HealthStatus, Pipeline};

use crate::camera::{CameraBackend, CameraCapabilities, CameraSession, VideoTrack};
use crate::config::ScannerConfig;
use crate::detection::{self, DetectionHandle, DetectionSink, DetectionSource};
use crate::error::{CameraError, ScannerError};
use crate::gate::ScanGate;
use crate::submission::{PersistClient, SubmissionPipeline, SubmissionState};

/// 컨트롤러 실행 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerPhase {
    /// 정지됨
    Stopped,
    /// 카메라를 여는 중
    Starting,
    /// 스캔 중
    Running,
}

impl ScannerPhase {
    /// 단계명을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
        }
    }
}

/// 운영자에게 보여줄 스캐너 상태 스냅샷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScannerSnapshot {
    /// 실행 단계
    pub phase: ScannerPhase,
    /// 스캔 중 여부
    pub scanning: bool,
    /// 현재 스캔 레코드
    pub last_scan: Option<ScanRecord>,
    /// 제출 표시 상태
    pub status: SaveStatus,
    /// 제출 실패 메시지
    pub error_text: Option<String>,
    /// 카메라 획득 실패 메시지 (사용자용)
    pub camera_error: Option<String>,
    /// 이 세션에서 저장된 스캔 수
    pub scan_count: u64,
}

/// 실행 중에만 존재하는 자원
struct ActiveSession<T: VideoTrack> {
    session: CameraSession<T>,
    detection: DetectionHandle,
    forwarder: JoinHandle<()>,
    cancel: CancellationToken,
}

/// 스캐너 컨트롤러
///
/// # 사용 예시
/// ```ignore
/// use scanpost_scanner::{ScannerControllerBuilder, ReplayCamera, HttpPersistClient};
///
/// let mut scanner = ScannerControllerBuilder::new()
///     .config(config)
///     .camera_backend(Arc::new(ReplayCamera::new("./frames", 10)))
///     .persist_client(Arc::new(HttpPersistClient::new(endpoint, timeout)?))
///     .build()?;
///
/// scanner.start().await?;
/// ```
pub struct ScannerController<B: CameraBackend, P: PersistClient> {
    /// 스캐너 설정
    config: ScannerConfig,
    /// 현재 단계
    phase: ScannerPhase,
    /// 카메라 백엔드
    backend: Arc<B>,
    /// 탐지 전략
    detection: Arc<dyn DetectionSource>,
    /// 쿨다운 게이트 (전달 태스크와 공유)
    gate: Arc<Mutex<ScanGate>>,
    /// 제출 파이프라인
    submissions: SubmissionPipeline<P>,
    /// 실행 중 자원
    active: Option<ActiveSession<B::Track>>,
    /// 마지막 카메라 획득 실패
    camera_error: Option<CameraError>,
    /// 제출에 그대로 전달되는 운영자 식별자
    operator: watch::Sender<Option<String>>,
    /// 전달 태스크가 받은 탐지 수
    detections_received: Arc<AtomicU64>,
}

impl<B: CameraBackend, P: PersistClient> ScannerController<B, P> {
    /// 스캔을 시작합니다. 이미 실행 중이면 아무것도 하지 않습니다.
    ///
    /// 카메라 획득에 실패하면 정지 상태로 돌아가고 에러를 기록한 뒤 반환합니다.
    pub async fn start(&mut self) -> Result<(), ScannerError> {
        if self.phase == ScannerPhase::Running {
            debug!("scanner already running");
            return Ok(());
        }

        self.phase = ScannerPhase::Starting;
        self.camera_error = None;
        self.submissions.reset_display();
        info!(
            backend = self.backend.name(),
            strategy = self.detection.name(),
            "starting scanner"
        );

        let session = match CameraSession::open(
            &*self.backend,
            &self.config.constraints,
            self.config.refocus_restore,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                counter!(m::CAMERA_OPEN_FAILURES_TOTAL, m::LABEL_ERROR_KIND => e.kind())
                    .increment(1);
                warn!(kind = e.kind(), error = %e, "camera acquisition failed");
                self.phase = ScannerPhase::Stopped;
                self.camera_error = Some(e.clone());
                return Err(e.into());
            }
        };
        let backend = self.backend.name().to_owned();
        counter!(m::CAMERA_SESSIONS_OPENED_TOTAL, m::LABEL_BACKEND => backend).increment(1);

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let detection = self
            .detection
            .start(session.frames(), DetectionSink::new(tx, cancel.child_token()));

        let forwarder = tokio::spawn(forward_detections(
            rx,
            cancel.clone(),
            Arc::clone(&self.gate),
            self.submissions.clone(),
            self.operator.subscribe(),
            Arc::clone(&self.detections_received),
        ));

        self.active = Some(ActiveSession {
            session,
            detection,
            forwarder,
            cancel,
        });
        self.phase = ScannerPhase::Running;
        gauge!(m::SCANNER_RUNNING).set(1.0);
        info!("scanner started");
        Ok(())
    }

    /// 스캔을 정지합니다. 여러 번 호출해도 안전합니다.
    ///
    /// 반환 이후에는 게이트나 제출 파이프라인에 새 탐지가 들어가지 않습니다.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            self.phase = ScannerPhase::Stopped;
            return;
        };
        info!("stopping scanner");

        let ActiveSession {
            mut session,
            detection,
            forwarder,
            cancel,
        } = active;

        detection.stop().await;
        cancel.cancel();
        forwarder.abort();
        let _ = forwarder.await;
        session.close();
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();

        self.phase = ScannerPhase::Stopped;
        gauge!(m::SCANNER_RUNNING).set(0.0);
        info!(scan_count = self.submissions.scan_count(), "scanner stopped");
    }

    /// 줌을 적용합니다. 정지 상태이거나 미지원이면 아무것도 하지 않습니다.
    pub async fn apply_zoom(&self, level: f64) {
        if let Some(active) = &self.active {
            active.session.apply_zoom(level).await;
        }
    }

    /// 초점을 다시 잡습니다. 정지 상태이면 아무것도 하지 않습니다.
    pub async fn trigger_refocus(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.session.trigger_refocus().await;
        }
    }

    /// 이후 제출에 사용할 운영자 식별자를 바꿉니다.
    pub fn set_operator(&self, operator: Option<String>) {
        let operator = operator.filter(|name| !name.trim().is_empty());
        debug!(operator = ?operator, "operator changed");
        self.operator.send_replace(operator);
    }

    /// 현재 운영자 식별자
    pub fn operator(&self) -> Option<String> {
        self.operator.borrow().clone()
    }

    /// 현재 상태 스냅샷을 반환합니다.
    pub fn snapshot(&self) -> ScannerSnapshot {
        let state = self.submissions.state();
        ScannerSnapshot {
            phase: self.phase,
            scanning: self.phase == ScannerPhase::Running,
            error_text: state.status.error_message().map(str::to_owned),
            last_scan: state.current,
            status: state.status,
            camera_error: self.camera_error.as_ref().map(CameraError::user_message),
            scan_count: self.submissions.scan_count(),
        }
    }

    /// 제출 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.submissions.subscribe()
    }

    /// 현재 단계
    pub fn phase(&self) -> ScannerPhase {
        self.phase
    }

    /// 현재 상태명을 반환합니다.
    pub fn state_name(&self) -> &str {
        self.phase.name()
    }

    /// 마지막 카메라 획득 실패
    pub fn camera_error(&self) -> Option<&CameraError> {
        self.camera_error.as_ref()
    }

    /// 실행 중인 카메라의 기능
    pub fn capabilities(&self) -> Option<&CameraCapabilities> {
        self.active.as_ref().map(|active| active.session.capabilities())
    }

    /// 이 세션에서 저장된 스캔 수
    pub fn scan_count(&self) -> u64 {
        self.submissions.scan_count()
    }

    /// 전달 태스크가 받은 탐지 수
    pub fn detections_received(&self) -> u64 {
        self.detections_received.load(Ordering::Relaxed)
    }

    /// 게이트가 수락한 탐지 수
    pub fn detections_accepted(&self) -> u64 {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accepted()
    }

    /// 쿨다운으로 버려진 탐지 수
    pub fn detections_suppressed(&self) -> u64 {
        self.gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .suppressed()
    }

    /// 탐지 전략 이름
    pub fn strategy_name(&self) -> &'static str {
        self.detection.name()
    }

    /// 스캐너 설정
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }
}

async fn forward_detections<P: PersistClient>(
    mut rx: mpsc::Receiver<DetectionEvent>,
    cancel: CancellationToken,
    gate: Arc<Mutex<ScanGate>>,
    submissions: SubmissionPipeline<P>,
    operator: watch::Receiver<Option<String>>,
    received: Arc<AtomicU64>,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            event = rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                received.fetch_add(1, Ordering::Relaxed);
                let accepted = gate
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .accept(&event);
                if accepted {
                    let operator = operator.borrow().clone();
                    submissions.submit_detection(&event, operator);
                }
            }
        }
    }
    debug!("detection forwarder stopped");
}

impl<B: CameraBackend, P: PersistClient> Pipeline for ScannerController<B, P> {
    async fn start(&mut self) -> Result<(), ScanpostError> {
        Self::start(self).await.map_err(ScanpostError::from)
    }

    async fn stop(&mut self) -> Result<(), ScanpostError> {
        Self::stop(self).await;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.phase {
            ScannerPhase::Running => match self.submissions.status() {
                SaveStatus::Error(message) => {
                    HealthStatus::Degraded(format!("last submission failed: {message}"))
                }
                _ => HealthStatus::Healthy,
            },
            ScannerPhase::Starting => HealthStatus::Unhealthy("starting".to_owned()),
            ScannerPhase::Stopped => HealthStatus::Unhealthy(
                self.camera_error
                    .as_ref()
                    .map(CameraError::user_message)
                    .unwrap_or_else(|| "stopped".to_owned()),
            ),
        }
    }
}

impl<B: CameraBackend, P: PersistClient> Drop for ScannerController<B, P> {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.cancel.cancel();
            active.forwarder.abort();
            active.session.close();
            gauge!(m::SCANNER_RUNNING).set(0.0);
        }
    }
}

/// 스캐너 컨트롤러 빌더
pub struct ScannerControllerBuilder<B: CameraBackend, P: PersistClient> {
    config: ScannerConfig,
    backend: Option<Arc<B>>,
    client: Option<Arc<P>>,
    detection: Option<Arc<dyn DetectionSource>>,
}

impl<B: CameraBackend, P: PersistClient> ScannerControllerBuilder<B, P> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ScannerConfig::default(),
            backend: None,
            client: None,
            detection: None,
        }
    }

    /// 스캐너 설정을 지정합니다.
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// 카메라 백엔드를 설정합니다.
    pub fn camera_backend(mut self, backend: Arc<B>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// 영속화 클라이언트를 설정합니다.
    pub fn persist_client(mut self, client: Arc<P>) -> Self {
        self.client = Some(client);
        self
    }

    /// 탐지 전략을 직접 지정합니다.
    ///
    /// 설정하지 않으면 설정의 전략과 rqrr 디코더로 생성합니다.
    pub fn detection_source(mut self, detection: Arc<dyn DetectionSource>) -> Self {
        self.detection = Some(detection);
        self
    }

    /// 컨트롤러를 빌드합니다.
    pub fn build(self) -> Result<ScannerController<B, P>, ScannerError> {
        self.config.validate()?;

        let backend = self.backend.ok_or_else(|| ScannerError::Config {
            field: "camera_backend".to_owned(),
            reason: "camera backend must be provided".to_owned(),
        })?;
        let client = self.client.ok_or_else(|| ScannerError::Config {
            field: "persist_client".to_owned(),
            reason: "persist client must be provided".to_owned(),
        })?;
        let detection = self
            .detection
            .unwrap_or_else(|| detection::from_config(&self.config));

        let gate = Arc::new(Mutex::new(ScanGate::new(self.config.cooldown)));
        let submissions = SubmissionPipeline::new(client, self.config.display_window);
        let (operator, _) = watch::channel(self.config.operator.clone());

        Ok(ScannerController {
            config: self.config,
            phase: ScannerPhase::Stopped,
            backend,
            detection,
            gate,
            submissions,
            active: None,
            camera_error: None,
            operator,
            detections_received: Arc::new(AtomicU64::new(0)),
        })
    }
}

impl<B: CameraBackend, P: PersistClient> Default for ScannerControllerBuilder<B, P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FocusMode, MockCameraBackend, TrackCall, ZoomRange};
    use crate::detection::{PollingDetector, ScriptStep, ScriptedDecoder};
    use crate::submission::client::MockPersistClient;
    use std::time::Duration;

    type TestController = ScannerController<MockCameraBackend, MockPersistClient>;

    fn build(
        backend: MockCameraBackend,
        steps: Vec<ScriptStep>,
    ) -> (TestController, Arc<MockCameraBackend>) {
        let backend = Arc::new(backend);
        let decoder = Arc::new(ScriptedDecoder::new(steps));
        let controller = ScannerControllerBuilder::new()
            .camera_backend(Arc::clone(&backend))
            .persist_client(Arc::new(MockPersistClient::new()))
            .detection_source(Arc::new(PollingDetector::new(
                decoder,
                Duration::from_millis(10),
            )))
            .build()
            .unwrap();
        (controller, backend)
    }

    #[test]
    fn builder_requires_backend_and_client() {
        let result = ScannerControllerBuilder::<MockCameraBackend, MockPersistClient>::new()
            .persist_client(Arc::new(MockPersistClient::new()))
            .build();
        assert!(matches!(
            result,
            Err(ScannerError::Config { ref field, .. }) if field == "camera_backend"
        ));

        let result = ScannerControllerBuilder::<MockCameraBackend, MockPersistClient>::new()
            .camera_backend(Arc::new(MockCameraBackend::new()))
            .build();
        assert!(matches!(
            result,
            Err(ScannerError::Config { ref field, .. }) if field == "persist_client"
        ));
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = ScannerControllerBuilder::new()
            .config(ScannerConfig {
                cooldown: Duration::ZERO,
                ..ScannerConfig::default()
            })
            .camera_backend(Arc::new(MockCameraBackend::new()))
            .persist_client(Arc::new(MockPersistClient::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_uses_configured_strategy_by_default() {
        let controller: TestController = ScannerControllerBuilder::new()
            .camera_backend(Arc::new(MockCameraBackend::new()))
            .persist_client(Arc::new(MockPersistClient::new()))
            .build()
            .unwrap();
        assert_eq!(controller.strategy_name(), "polling");
        assert_eq!(controller.state_name(), "stopped");
    }

    #[tokio::test]
    async fn start_failure_records_camera_error() {
        let (mut controller, _backend) = build(
            MockCameraBackend::new().with_open_error(CameraError::PermissionDenied),
            vec![],
        );

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, ScannerError::Camera(CameraError::PermissionDenied)));
        assert_eq!(controller.phase(), ScannerPhase::Stopped);

        let snapshot = controller.snapshot();
        assert!(!snapshot.scanning);
        assert!(snapshot.camera_error.unwrap().contains("denied"));
        assert!(!controller.health_check().await.is_healthy());
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let (mut controller, backend) = build(MockCameraBackend::new(), vec![]);

        controller.start().await.unwrap();
        assert_eq!(controller.state_name(), "running");
        assert!(controller.snapshot().scanning);
        assert!(controller.health_check().await.is_healthy());

        // 실행 중 재시작은 no-op
        controller.start().await.unwrap();
        assert_eq!(backend.opened.lock().unwrap().len(), 1);

        controller.stop().await;
        assert_eq!(controller.state_name(), "stopped");
        assert!(backend.last_track().unwrap().is_stopped());

        // 중복 정지도 안전
        controller.stop().await;
        assert_eq!(controller.phase(), ScannerPhase::Stopped);
    }

    #[tokio::test]
    async fn zoom_and_refocus_delegate_to_session() {
        let capabilities = CameraCapabilities {
            zoom: Some(ZoomRange { min: 1.0, max: 4.0 }),
            focus_modes: vec![FocusMode::Continuous],
        };
        let (mut controller, backend) =
            build(MockCameraBackend::new().with_capabilities(capabilities), vec![]);

        // 정지 상태에서는 아무 일도 없음
        controller.apply_zoom(2.0).await;
        controller.trigger_refocus().await;
        assert!(backend.last_track().is_none());

        controller.start().await.unwrap();
        controller.apply_zoom(10.0).await;
        controller.trigger_refocus().await;

        let calls = backend.last_track().unwrap().calls();
        assert!(calls.contains(&TrackCall::Zoom(4.0)));
        assert_eq!(
            calls
                .iter()
                .filter(|call| **call == TrackCall::Focus(FocusMode::Continuous))
                .count(),
            2
        );
        controller.stop().await;
    }

    #[tokio::test]
    async fn operator_is_normalized() {
        let (controller, _backend) = build(MockCameraBackend::new(), vec![]);
        controller.set_operator(Some("  ".to_owned()));
        assert_eq!(controller.operator(), None);
        controller.set_operator(Some("kim".to_owned()));
        assert_eq!(controller.operator().as_deref(), Some("kim"));
    }
}
