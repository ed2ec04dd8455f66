//! 에러 타입: 도메인별 에러 정의

/// Scanpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ScanpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 카메라 획득 에러 (권한, 장치 없음 등)
    #[error("camera error: {0}")]
    Camera(String),

    /// 스캔 제출 에러
    #[error("submission error: {0}")]
    Submission(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}
