//! 설정 관리: scanpost.toml 파싱 및 런타임 설정
//!
//! [`ScanpostConfig`]는 모든 섹션의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SCANPOST_SUBMISSION_ENDPOINT=https://...` 형식)
//! 3. 설정 파일 (`scanpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), scanpost_core::error::ScanpostError> {
//! use scanpost_core::config::ScanpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ScanpostConfig::load("scanpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ScanpostConfig::parse("[gate]\ncooldown_ms = 3000")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ScanpostError};

/// 허용되는 로그 레벨
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
/// 허용되는 로그 형식
pub const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];
/// 허용되는 카메라 백엔드
pub const VALID_CAMERA_BACKENDS: [&str; 2] = ["native", "replay"];
/// 허용되는 카메라 방향
pub const VALID_FACING_MODES: [&str; 2] = ["environment", "user"];
/// 허용되는 탐지 전략
pub const VALID_DETECTION_STRATEGIES: [&str; 2] = ["polling", "continuous"];

/// Scanpost 통합 설정
///
/// `scanpost.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 카메라 설정
    #[serde(default)]
    pub camera: CameraConfig,
    /// 코드 탐지 설정
    #[serde(default)]
    pub detection: DetectionConfig,
    /// 쿨다운 게이트 설정
    #[serde(default)]
    pub gate: GateConfig,
    /// 제출(영속화 엔드포인트) 설정
    #[serde(default)]
    pub submission: SubmissionConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ScanpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용한 뒤 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScanpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드, 검증 없음).
    ///
    /// 검증은 오버라이드가 모두 적용된 뒤에 수행해야 하므로 여기서는 하지 않습니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ScanpostError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ScanpostError> {
        toml::from_str(toml_str).map_err(|e| {
            ScanpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SCANPOST_{SECTION}_{FIELD}`
    /// 예: `SCANPOST_GATE_COOLDOWN_MS=3000`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SCANPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SCANPOST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.operator, "SCANPOST_GENERAL_OPERATOR");

        // Camera
        override_string(&mut self.camera.backend, "SCANPOST_CAMERA_BACKEND");
        override_u32(&mut self.camera.device_index, "SCANPOST_CAMERA_DEVICE_INDEX");
        override_string(&mut self.camera.facing, "SCANPOST_CAMERA_FACING");
        override_u32(&mut self.camera.ideal_width, "SCANPOST_CAMERA_IDEAL_WIDTH");
        override_u32(&mut self.camera.ideal_height, "SCANPOST_CAMERA_IDEAL_HEIGHT");
        override_u32(
            &mut self.camera.ideal_frame_rate,
            "SCANPOST_CAMERA_IDEAL_FRAME_RATE",
        );
        override_u32(
            &mut self.camera.max_frame_rate,
            "SCANPOST_CAMERA_MAX_FRAME_RATE",
        );
        override_string(&mut self.camera.replay_dir, "SCANPOST_CAMERA_REPLAY_DIR");
        override_u32(&mut self.camera.replay_fps, "SCANPOST_CAMERA_REPLAY_FPS");
        override_u64(
            &mut self.camera.refocus_restore_ms,
            "SCANPOST_CAMERA_REFOCUS_RESTORE_MS",
        );

        // Detection
        override_string(&mut self.detection.strategy, "SCANPOST_DETECTION_STRATEGY");
        override_u64(
            &mut self.detection.tick_interval_ms,
            "SCANPOST_DETECTION_TICK_INTERVAL_MS",
        );
        override_u64(
            &mut self.detection.engine_idle_ms,
            "SCANPOST_DETECTION_ENGINE_IDLE_MS",
        );
        override_usize(
            &mut self.detection.channel_capacity,
            "SCANPOST_DETECTION_CHANNEL_CAPACITY",
        );

        // Gate
        override_u64(&mut self.gate.cooldown_ms, "SCANPOST_GATE_COOLDOWN_MS");

        // Submission
        override_string(&mut self.submission.endpoint, "SCANPOST_SUBMISSION_ENDPOINT");
        override_u64(
            &mut self.submission.request_timeout_secs,
            "SCANPOST_SUBMISSION_REQUEST_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.submission.display_window_ms,
            "SCANPOST_SUBMISSION_DISPLAY_WINDOW_MS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "SCANPOST_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "SCANPOST_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "SCANPOST_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "SCANPOST_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ScanpostError> {
        check_one_of(
            "general.log_level",
            &self.general.log_level,
            &VALID_LOG_LEVELS,
        )?;
        check_one_of(
            "general.log_format",
            &self.general.log_format,
            &VALID_LOG_FORMATS,
        )?;

        // camera
        check_one_of("camera.backend", &self.camera.backend, &VALID_CAMERA_BACKENDS)?;
        check_one_of("camera.facing", &self.camera.facing, &VALID_FACING_MODES)?;
        check_positive("camera.ideal_width", u64::from(self.camera.ideal_width))?;
        check_positive("camera.ideal_height", u64::from(self.camera.ideal_height))?;
        check_positive(
            "camera.ideal_frame_rate",
            u64::from(self.camera.ideal_frame_rate),
        )?;
        if self.camera.max_frame_rate < self.camera.ideal_frame_rate {
            return Err(invalid(
                "camera.max_frame_rate",
                format!(
                    "must be >= ideal_frame_rate ({})",
                    self.camera.ideal_frame_rate
                ),
            ));
        }
        if self.camera.backend == "replay" {
            if self.camera.replay_dir.trim().is_empty() {
                return Err(invalid(
                    "camera.replay_dir",
                    "must not be empty when backend is 'replay'".to_owned(),
                ));
            }
            check_positive("camera.replay_fps", u64::from(self.camera.replay_fps))?;
        }

        // detection
        check_one_of(
            "detection.strategy",
            &self.detection.strategy,
            &VALID_DETECTION_STRATEGIES,
        )?;
        check_positive("detection.tick_interval_ms", self.detection.tick_interval_ms)?;
        check_positive("detection.engine_idle_ms", self.detection.engine_idle_ms)?;
        check_positive(
            "detection.channel_capacity",
            self.detection.channel_capacity as u64,
        )?;

        // gate
        check_positive("gate.cooldown_ms", self.gate.cooldown_ms)?;

        // submission
        let endpoint = self.submission.endpoint.trim();
        if endpoint.is_empty() {
            return Err(invalid(
                "submission.endpoint",
                "must not be empty".to_owned(),
            ));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(invalid(
                "submission.endpoint",
                "must be an http:// or https:// URL".to_owned(),
            ));
        }
        check_positive(
            "submission.request_timeout_secs",
            self.submission.request_timeout_secs,
        )?;
        check_positive(
            "submission.display_window_ms",
            self.submission.display_window_ms,
        )?;

        // metrics
        if self.metrics.enabled && self.metrics.endpoint != "/metrics" {
            return Err(invalid(
                "metrics.endpoint",
                "only '/metrics' is supported".to_owned(),
            ));
        }

        Ok(())
    }
}

// Default는 derive 매크로로 자동 생성 (각 필드가 Default를 구현하므로)

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 운영자 식별자: 제출 요청에 그대로 전달됩니다 (빈 문자열 = 없음)
    pub operator: String,
}

impl GeneralConfig {
    /// 운영자 식별자를 반환합니다. 공백뿐인 값은 `None`으로 취급합니다.
    pub fn operator(&self) -> Option<&str> {
        let trimmed = self.operator.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(self.operator.as_str())
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            operator: String::new(),
        }
    }
}

/// 기본 카메라 백엔드
///
/// 시스템 카메라 백엔드는 `native-camera` 기능으로 빌드했을 때만 존재하므로,
/// 그 외 빌드의 기본값은 `replay`입니다.
pub const DEFAULT_CAMERA_BACKEND: &str = if cfg!(feature = "native-camera") {
    "native"
} else {
    "replay"
};

/// replay 백엔드의 기본 이미지 디렉토리
pub const DEFAULT_REPLAY_DIR: &str = "./frames";

/// 카메라 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// 카메라 백엔드 (native, replay)
    pub backend: String,
    /// 시스템 카메라 인덱스 (native 백엔드)
    pub device_index: u32,
    /// 요청할 카메라 방향 (environment = 후면, user = 전면)
    pub facing: String,
    /// 이상적인 가로 해상도
    pub ideal_width: u32,
    /// 이상적인 세로 해상도
    pub ideal_height: u32,
    /// 이상적인 프레임레이트
    pub ideal_frame_rate: u32,
    /// 최대 프레임레이트
    pub max_frame_rate: u32,
    /// 재생할 이미지 디렉토리 (replay 백엔드)
    pub replay_dir: String,
    /// 재생 프레임레이트 (replay 백엔드)
    pub replay_fps: u32,
    /// 단발 초점 후 연속 초점 복귀까지의 지연 (밀리초)
    pub refocus_restore_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_CAMERA_BACKEND.to_owned(),
            device_index: 0,
            facing: "environment".to_owned(),
            ideal_width: 1920,
            ideal_height: 1080,
            ideal_frame_rate: 30,
            max_frame_rate: 60,
            replay_dir: DEFAULT_REPLAY_DIR.to_owned(),
            replay_fps: 10,
            refocus_restore_ms: 500,
        }
    }
}

/// 코드 탐지 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// 탐지 전략 (polling, continuous)
    pub strategy: String,
    /// polling 전략의 샘플링 주기 (밀리초)
    pub tick_interval_ms: u64,
    /// continuous 엔진의 디코드 사이 휴지 시간 (밀리초)
    pub engine_idle_ms: u64,
    /// 탐지 이벤트 채널 용량
    pub channel_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategy: "polling".to_owned(),
            tick_interval_ms: 150,
            engine_idle_ms: 50,
            channel_capacity: 16,
        }
    }
}

/// 쿨다운 게이트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// 수락 후 탐지를 무시하는 시간 (밀리초)
    pub cooldown_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self { cooldown_ms: 2000 }
    }
}

/// 제출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// 영속화 엔드포인트 URL
    pub endpoint: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// saved 상태 표시 유지 시간 (밀리초)
    pub display_window_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/api/save.php".to_owned(),
            request_timeout_secs: 10,
            display_window_ms: 1000,
        }
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 익스포터 활성화 여부
    pub enabled: bool,
    /// 리슨 주소
    pub listen_addr: String,
    /// 리슨 포트
    pub port: u16,
    /// 스크레이프 경로 (현재 `/metrics`만 지원)
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: String) -> ScanpostError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), ScanpostError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

fn check_positive(field: &str, value: u64) -> Result<(), ScanpostError> {
    if value == 0 {
        Err(invalid(field, "must be greater than 0".to_owned()))
    } else {
        Ok(())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
