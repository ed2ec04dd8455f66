//! 스캐너 에러 타입
//!
//! [`ScannerError`]는 스캐너 내부에서 발생하는 에러를 표현합니다.
//! `From<ScannerError> for ScanpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.
//!
//! # 에러 분류
//! - [`CameraError`]: 카메라 획득 실패. `start()`에 치명적이며 재시도로 복구됩니다.
//! - [`DecodeError`]: 단일 프레임 디코드 실패. 밖으로 드러나지 않고 debug 로그만 남깁니다.
//! - [`SubmissionError`]: 제출 실패. `error` 상태로 표시되며 카메라는 멈추지 않습니다.
//! - 줌/초점 적용 실패는 [`CameraError::Constraint`]로 표현되며 debug 로그만 남깁니다.

use scanpost_core::error::{ConfigError, ScanpostError};

/// 스캐너 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    /// 카메라 획득 실패
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// 제출 실패
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<ScannerError> for ScanpostError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::Camera(e) => ScanpostError::Camera(e.to_string()),
            ScannerError::Submission(e) => ScanpostError::Submission(e.to_string()),
            ScannerError::Config { field, reason } => {
                ScanpostError::Config(ConfigError::InvalidValue { field, reason })
            }
        }
    }
}

/// 카메라 에러
///
/// 획득 실패는 네 가지로 분류되며 각각 구분되는 사용자 메시지를 가집니다
/// ([`CameraError::user_message`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    /// 카메라 접근 권한 거부
    #[error("camera access denied")]
    PermissionDenied,

    /// 사용 가능한 카메라 없음
    #[error("no camera device found")]
    NoDeviceFound,

    /// 플랫폼/빌드가 카메라 캡처를 지원하지 않음
    #[error("camera capture unsupported: {0}")]
    Unsupported(String),

    /// 분류되지 않은 실패
    #[error("camera error: {0}")]
    Unknown(String),

    /// 줌/초점 제약 적용 실패 (획득 실패가 아님)
    #[error("failed to apply {constraint}: {reason}")]
    Constraint {
        /// 제약 이름 (zoom, focus_mode)
        constraint: String,
        /// 실패 사유
        reason: String,
    },
}

impl CameraError {
    /// 운영자에게 보여줄 메시지를 반환합니다.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Camera access was denied. Allow this application to use the camera and try again."
                    .to_owned()
            }
            Self::NoDeviceFound => "No camera was found on this device.".to_owned(),
            Self::Unsupported(_) => "Camera capture is not supported on this platform.".to_owned(),
            Self::Unknown(detail) => format!("Could not start the camera: {detail}"),
            Self::Constraint { .. } => format!("Could not configure the camera: {self}"),
        }
    }

    /// 메트릭 레이블로 쓰는 분류명을 반환합니다.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::NoDeviceFound => "no_device",
            Self::Unsupported(_) => "unsupported",
            Self::Unknown(_) => "unknown",
            Self::Constraint { .. } => "constraint",
        }
    }

    /// 장치 노드 접근 시의 I/O 에러를 분류합니다.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            std::io::ErrorKind::NotFound => Self::NoDeviceFound,
            std::io::ErrorKind::Unsupported => Self::Unsupported(err.to_string()),
            _ => Self::Unknown(err.to_string()),
        }
    }

    /// 문자열로만 에러를 보고하는 백엔드를 위한 분류기.
    ///
    /// 구조화된 분류가 없는 에러 메시지에서만 사용합니다. 브라우저 계열
    /// 에러 이름(`NotAllowedError`, `NotFoundError`)과 흔한 OS 메시지를 인식합니다.
    pub fn classify_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("notallowederror")
            || lower.contains("permission")
            || lower.contains("access denied")
        {
            Self::PermissionDenied
        } else if lower.contains("notfounderror")
            || lower.contains("no device")
            || lower.contains("no camera")
            || lower.contains("device not found")
        {
            Self::NoDeviceFound
        } else if lower.contains("not supported")
            || lower.contains("unsupported")
            || lower.contains("not implemented")
        {
            Self::Unsupported(message.to_owned())
        } else {
            Self::Unknown(message.to_owned())
        }
    }
}

/// 단일 프레임 디코드 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// 프레임 버퍼 크기가 해상도와 맞지 않음
    #[error("invalid frame: {width}x{height} needs {expected} bytes, got {actual}")]
    InvalidFrame {
        /// 가로 픽셀 수
        width: u32,
        /// 세로 픽셀 수
        height: u32,
        /// 필요한 바이트 수
        expected: usize,
        /// 실제 바이트 수
        actual: usize,
    },

    /// 코드 영역은 찾았지만 디코드 실패
    #[error("decode failed: {0}")]
    Decode(String),

    /// 디코더 내부 패닉
    #[error("decoder panicked")]
    Panicked,
}

/// 제출 에러
///
/// `Display` 출력이 그대로 `error` 상태의 메시지가 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// 서버가 `success: false`로 응답
    #[error("{0}")]
    Rejected(String),

    /// 전송 실패 (타임아웃, 연결 불가, 잘못된 응답 본문)
    #[error("request failed: {0}")]
    Transport(String),

    /// 해석할 수 없는 본문과 함께 200이 아닌 상태 코드
    #[error("server responded with status {0}")]
    Status(u16),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "EACCES");
        assert_eq!(CameraError::from_io(&denied), CameraError::PermissionDenied);

        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "/dev/video0");
        assert_eq!(CameraError::from_io(&missing), CameraError::NoDeviceFound);

        let busy = std::io::Error::other("device busy");
        assert!(matches!(
            CameraError::from_io(&busy),
            CameraError::Unknown(ref d) if d.contains("busy")
        ));
    }

    #[test]
    fn legacy_messages_are_classified() {
        assert_eq!(
            CameraError::classify_message("NotAllowedError: Permission denied"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::classify_message("NotFoundError: Requested device not found"),
            CameraError::NoDeviceFound
        );
        assert!(matches!(
            CameraError::classify_message("backend not supported"),
            CameraError::Unsupported(_)
        ));
        assert!(matches!(
            CameraError::classify_message("OverconstrainedError"),
            CameraError::Unknown(_)
        ));
    }

    #[test]
    fn each_category_has_distinct_user_message() {
        let messages = [
            CameraError::PermissionDenied.user_message(),
            CameraError::NoDeviceFound.user_message(),
            CameraError::Unsupported("wasm".to_owned()).user_message(),
            CameraError::Unknown("EBUSY".to_owned()).user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(messages[0].contains("denied"));
        assert!(messages[1].contains("No camera"));
        assert!(messages[2].contains("not supported"));
        // 일반 메시지에는 진단 정보가 포함됨
        assert!(messages[3].contains("EBUSY"));
    }

    #[test]
    fn submission_error_messages() {
        assert_eq!(
            SubmissionError::Rejected("duplicate".to_owned()).to_string(),
            "duplicate"
        );
        assert_eq!(
            SubmissionError::Transport("connection refused".to_owned()).to_string(),
            "request failed: connection refused"
        );
        assert_eq!(
            SubmissionError::Status(502).to_string(),
            "server responded with status 502"
        );
    }

    #[test]
    fn scanner_error_converts_to_scanpost_error() {
        let err: ScanpostError = ScannerError::Camera(CameraError::NoDeviceFound).into();
        assert!(matches!(err, ScanpostError::Camera(_)));

        let err: ScanpostError = ScannerError::Config {
            field: "cooldown".to_owned(),
            reason: "must be > 0".to_owned(),
        }
        .into();
        assert!(matches!(err, ScanpostError::Config(_)));
    }
}
