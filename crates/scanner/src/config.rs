//! 스캐너 설정
//!
//! [`ScannerConfig`]는 core의 [`ScanpostConfig`]를 기반으로 스캐너가 실제로
//! 사용하는 `Duration`/enum 기반 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use scanpost_core::config::ScanpostConfig;
//! use scanpost_scanner::config::ScannerConfig;
//!
//! let core_config = ScanpostConfig::default();
//! let config = ScannerConfig::from_core(&core_config)?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use scanpost_core::config::{DEFAULT_REPLAY_DIR, ScanpostConfig};
use serde::Serialize;

use crate::camera::{CameraConstraints, FacingMode};
use crate::error::ScannerError;

/// 카메라 백엔드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackendKind {
    /// 시스템 카메라 (nokhwa)
    Native,
    /// 이미지 디렉토리 재생
    Replay,
}

impl FromStr for CameraBackendKind {
    type Err = ScannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "replay" => Ok(Self::Replay),
            other => Err(ScannerError::Config {
                field: "camera.backend".to_owned(),
                reason: format!("unknown backend '{other}', expected native or replay"),
            }),
        }
    }
}

impl fmt::Display for CameraBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Replay => write!(f, "replay"),
        }
    }
}

/// 탐지 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    /// 고정 주기로 프레임을 디코드
    Polling,
    /// 전용 스레드 엔진이 연속으로 디코드
    Continuous,
}

impl FromStr for DetectionStrategy {
    type Err = ScannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "polling" => Ok(Self::Polling),
            "continuous" => Ok(Self::Continuous),
            other => Err(ScannerError::Config {
                field: "detection.strategy".to_owned(),
                reason: format!("unknown strategy '{other}', expected polling or continuous"),
            }),
        }
    }
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::Continuous => write!(f, "continuous"),
        }
    }
}

/// 스캐너 런타임 설정
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// 카메라 백엔드
    pub backend: CameraBackendKind,
    /// 카메라 요청 제약 (방향, 해상도, 프레임레이트)
    pub constraints: CameraConstraints,
    /// 재생할 이미지 디렉토리 (replay 백엔드)
    pub replay_dir: PathBuf,
    /// 재생 프레임레이트 (replay 백엔드)
    pub replay_fps: u32,
    /// 단발 초점 후 연속 초점 복귀 지연
    pub refocus_restore: Duration,
    /// 탐지 전략
    pub strategy: DetectionStrategy,
    /// polling 샘플링 주기
    pub tick_interval: Duration,
    /// continuous 엔진 휴지 시간
    pub engine_idle: Duration,
    /// 탐지 이벤트 채널 용량
    pub channel_capacity: usize,
    /// 쿨다운
    pub cooldown: Duration,
    /// 영속화 엔드포인트 URL
    pub endpoint: String,
    /// 요청 타임아웃
    pub request_timeout: Duration,
    /// saved 표시 유지 시간
    pub display_window: Duration,
    /// 운영자 식별자
    pub operator: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: if cfg!(feature = "native-camera") {
                CameraBackendKind::Native
            } else {
                CameraBackendKind::Replay
            },
            constraints: CameraConstraints::default(),
            replay_dir: PathBuf::from(DEFAULT_REPLAY_DIR),
            replay_fps: 10,
            refocus_restore: Duration::from_millis(500),
            strategy: DetectionStrategy::Polling,
            tick_interval: Duration::from_millis(150),
            engine_idle: Duration::from_millis(50),
            channel_capacity: 16,
            cooldown: Duration::from_millis(2000),
            endpoint: "http://localhost:8080/api/save.php".to_owned(),
            request_timeout: Duration::from_secs(10),
            display_window: Duration::from_millis(1000),
            operator: None,
        }
    }
}

impl ScannerConfig {
    /// core 설정에서 스캐너 설정을 생성합니다.
    pub fn from_core(core: &ScanpostConfig) -> Result<Self, ScannerError> {
        let facing = match core.camera.facing.as_str() {
            "environment" => FacingMode::Environment,
            "user" => FacingMode::User,
            other => {
                return Err(ScannerError::Config {
                    field: "camera.facing".to_owned(),
                    reason: format!("unknown facing mode '{other}'"),
                });
            }
        };

        let config = Self {
            backend: core.camera.backend.parse()?,
            constraints: CameraConstraints {
                device_index: core.camera.device_index,
                facing,
                ideal_width: core.camera.ideal_width,
                ideal_height: core.camera.ideal_height,
                ideal_frame_rate: core.camera.ideal_frame_rate,
                max_frame_rate: core.camera.max_frame_rate,
            },
            replay_dir: PathBuf::from(&core.camera.replay_dir),
            replay_fps: core.camera.replay_fps,
            refocus_restore: Duration::from_millis(core.camera.refocus_restore_ms),
            strategy: core.detection.strategy.parse()?,
            tick_interval: Duration::from_millis(core.detection.tick_interval_ms),
            engine_idle: Duration::from_millis(core.detection.engine_idle_ms),
            channel_capacity: core.detection.channel_capacity,
            cooldown: Duration::from_millis(core.gate.cooldown_ms),
            endpoint: core.submission.endpoint.trim().to_owned(),
            request_timeout: Duration::from_secs(core.submission.request_timeout_secs),
            display_window: Duration::from_millis(core.submission.display_window_ms),
            operator: core.general.operator().map(str::to_owned),
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ScannerError> {
        let durations = [
            ("detection.tick_interval", self.tick_interval),
            ("detection.engine_idle", self.engine_idle),
            ("gate.cooldown", self.cooldown),
            ("submission.request_timeout", self.request_timeout),
            ("submission.display_window", self.display_window),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ScannerError::Config {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if self.channel_capacity == 0 {
            return Err(ScannerError::Config {
                field: "detection.channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.endpoint.is_empty() {
            return Err(ScannerError::Config {
                field: "submission.endpoint".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.backend == CameraBackendKind::Replay {
            if self.replay_dir.as_os_str().is_empty() {
                return Err(ScannerError::Config {
                    field: "camera.replay_dir".to_owned(),
                    reason: "must be set for the replay backend".to_owned(),
                });
            }
            if self.replay_fps == 0 {
                return Err(ScannerError::Config {
                    field: "camera.replay_fps".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        Ok(())
    }
}
