//! 이벤트 및 스캔 레코드: 탐지에서 제출까지 흐르는 데이터
//!
//! [`DetectionEvent`]는 탐지 소스가 만든 원시 탐지 결과이며, 게이트를 통과한
//! 탐지는 [`ScanRecord`]가 되어 제출 파이프라인에서 상태가 추적됩니다.
//! [`EventMetadata`]의 trace_id는 탐지 → 제출 로그를 하나로 묶습니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// --- 모듈명 상수 ---

/// 탐지 모듈명
pub const MODULE_DETECTION: &str = "detection";
/// 제출 모듈명
pub const MODULE_SUBMISSION: &str = "submission";

// --- 이벤트 타입 상수 ---

/// 탐지 이벤트 타입
pub const EVENT_TYPE_DETECTION: &str = "detection";

/// 이벤트 메타데이터: 발생 시각, 생성 모듈, 추적 ID
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명
    pub source_module: String,
    /// 추적 ID: 같은 스캔의 로그를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            unix_timestamp_str(self.timestamp),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio::mpsc` 채널을 통한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅에 사용)
    fn event_type(&self) -> &str;
}

/// 탐지 이벤트: 한 번의 샘플링에서 디코드된 텍스트
///
/// 불변이며, 게이트가 정확히 한 번 소비합니다.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 디코드된 텍스트
    pub text: String,
}

impl DetectionEvent {
    /// 새로운 trace를 시작하는 탐지 이벤트를 생성합니다.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_DETECTION),
            text: text.into(),
        }
    }

    /// 탐지 시각
    pub fn timestamp(&self) -> SystemTime {
        self.metadata.timestamp
    }
}

impl Event for DetectionEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_DETECTION
    }
}

impl fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} text={:?}", self.metadata, self.text)
    }
}

/// 스캔 레코드의 제출 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// 요청 진행 중
    Pending,
    /// 저장 완료
    Saved,
    /// 저장 실패
    Failed,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Saved => write!(f, "saved"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// 스캔 레코드: 게이트를 통과한 탐지 하나
///
/// 항상 가장 최근에 수락된 레코드 하나만 "현재" 레코드로 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// 레코드 ID (UUID v4)
    pub id: String,
    /// 디코드된 텍스트
    pub text: String,
    /// 운영자 식별자 (그대로 전달)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// 수락 시각
    pub accepted_at: SystemTime,
    /// 제출 상태
    pub submission_status: SubmissionStatus,
    /// 원본 탐지의 추적 ID
    pub trace_id: String,
}

impl ScanRecord {
    /// `pending` 상태의 새 레코드를 생성합니다.
    pub fn pending(
        text: impl Into<String>,
        operator: Option<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            operator,
            accepted_at: SystemTime::now(),
            submission_status: SubmissionStatus::Pending,
            trace_id: trace_id.into(),
        }
    }

    /// 수락 시각을 Unix epoch 초로 반환합니다.
    pub fn accepted_at_unix(&self) -> Option<u64> {
        self.accepted_at
            .duration_since(SystemTime::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs())
    }
}

impl fmt::Display for ScanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:?} status={}",
            unix_timestamp_str(self.accepted_at),
            self.text,
            self.submission_status
        )?;
        if let Some(ref operator) = self.operator {
            write!(f, " operator={operator}")?;
        }
        Ok(())
    }
}

/// 제출 파이프라인의 표시 상태
///
/// `idle → saving → {saved | error}` 로 전이하며, `saved`만 표시 시간이 지나면
/// 자동으로 `idle`로 돌아갑니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SaveStatus {
    /// 대기
    #[default]
    Idle,
    /// 제출 중
    Saving,
    /// 저장 완료 (표시 시간 동안만 유지)
    Saved,
    /// 실패: 다음 제출까지 유지
    Error(String),
}

impl SaveStatus {
    /// 상태명을 반환합니다.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error(_) => "error",
        }
    }

    /// 에러 상태일 때 메시지를 반환합니다.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(message) => write!(f, "error: {message}"),
            other => write!(f, "{}", other.name()),
        }
    }
}

fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => {
            let secs = duration.as_secs();
            format!("{secs}")
        }
        Err(_) => "unknown".to_owned(),
    }
}
