//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `scanpost_`
//! - 모듈명: `camera_`, `detection_`, `gate_`, `submission_`, `scanner_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(scanpost_core::metrics::GATE_ACCEPTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 탐지 전략 레이블 키 (polling, continuous)
pub const LABEL_STRATEGY: &str = "strategy";

/// 카메라 백엔드 레이블 키 (native, replay)
pub const LABEL_BACKEND: &str = "backend";

/// 카메라 에러 분류 레이블 키
pub const LABEL_ERROR_KIND: &str = "kind";

// ─── Camera 메트릭 ──────────────────────────────────────────────────

/// Camera: 열린 세션 수 (counter, label: backend)
pub const CAMERA_SESSIONS_OPENED_TOTAL: &str = "scanpost_camera_sessions_opened_total";

/// Camera: 열기 실패 수 (counter, label: kind)
pub const CAMERA_OPEN_FAILURES_TOTAL: &str = "scanpost_camera_open_failures_total";

// ─── Detection 메트릭 ───────────────────────────────────────────────

/// Detection: 디코드된 코드 수 (counter, label: strategy)
pub const DETECTION_CODES_DECODED_TOTAL: &str = "scanpost_detection_codes_decoded_total";

/// Detection: 디코드 실패/패닉 수 (counter)
pub const DETECTION_DECODE_ERRORS_TOTAL: &str = "scanpost_detection_decode_errors_total";

/// Detection: 이전 디코드가 진행 중이라 건너뛴 틱 수 (counter)
pub const DETECTION_TICKS_SKIPPED_TOTAL: &str = "scanpost_detection_ticks_skipped_total";

// ─── Gate 메트릭 ────────────────────────────────────────────────────

/// Gate: 수락된 탐지 수 (counter)
pub const GATE_ACCEPTED_TOTAL: &str = "scanpost_gate_accepted_total";

/// Gate: 쿨다운으로 무시된 탐지 수 (counter)
pub const GATE_SUPPRESSED_TOTAL: &str = "scanpost_gate_suppressed_total";

// ─── Submission 메트릭 ──────────────────────────────────────────────

/// Submission: 시작된 제출 수 (counter)
pub const SUBMISSIONS_TOTAL: &str = "scanpost_submissions_total";

/// Submission: 저장 성공 수 (counter)
pub const SUBMISSIONS_SAVED_TOTAL: &str = "scanpost_submissions_saved_total";

/// Submission: 저장 실패 수 (counter)
pub const SUBMISSIONS_FAILED_TOTAL: &str = "scanpost_submissions_failed_total";

/// Submission: 요청 지연 시간 (histogram, 초)
pub const SUBMISSION_DURATION_SECONDS: &str = "scanpost_submission_duration_seconds";

// ─── Scanner 메트릭 ─────────────────────────────────────────────────

/// Scanner: 실행 중 여부 (gauge, 0 또는 1)
pub const SCANNER_RUNNING: &str = "scanpost_scanner_running";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 제출 지연 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 10s 범위 (요청 타임아웃 기본값 10s)
pub const SUBMISSION_DURATION_BUCKETS: [f64; 9] = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Camera
    describe_counter!(
        CAMERA_SESSIONS_OPENED_TOTAL,
        "Total number of camera sessions opened"
    );
    describe_counter!(
        CAMERA_OPEN_FAILURES_TOTAL,
        "Total number of failed camera acquisitions by failure kind"
    );

    // Detection
    describe_counter!(
        DETECTION_CODES_DECODED_TOTAL,
        "Total number of QR codes decoded from frames"
    );
    describe_counter!(
        DETECTION_DECODE_ERRORS_TOTAL,
        "Total number of decode attempts that errored or panicked"
    );
    describe_counter!(
        DETECTION_TICKS_SKIPPED_TOTAL,
        "Total number of polling ticks skipped while a decode was still running"
    );

    // Gate
    describe_counter!(
        GATE_ACCEPTED_TOTAL,
        "Total number of detections accepted by the cooldown gate"
    );
    describe_counter!(
        GATE_SUPPRESSED_TOTAL,
        "Total number of detections dropped during cooldown"
    );

    // Submission
    describe_counter!(SUBMISSIONS_TOTAL, "Total number of submissions started");
    describe_counter!(
        SUBMISSIONS_SAVED_TOTAL,
        "Total number of submissions persisted successfully"
    );
    describe_counter!(
        SUBMISSIONS_FAILED_TOTAL,
        "Total number of submissions that ended in error"
    );
    describe_histogram!(
        SUBMISSION_DURATION_SECONDS,
        "Persistence endpoint round-trip time in seconds"
    );

    // Scanner
    describe_gauge!(SCANNER_RUNNING, "1 while the scanner is running, 0 otherwise");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        CAMERA_SESSIONS_OPENED_TOTAL,
        CAMERA_OPEN_FAILURES_TOTAL,
        DETECTION_CODES_DECODED_TOTAL,
        DETECTION_DECODE_ERRORS_TOTAL,
        DETECTION_TICKS_SKIPPED_TOTAL,
        GATE_ACCEPTED_TOTAL,
        GATE_SUPPRESSED_TOTAL,
        SUBMISSIONS_TOTAL,
        SUBMISSIONS_SAVED_TOTAL,
        SUBMISSIONS_FAILED_TOTAL,
        SUBMISSION_DURATION_SECONDS,
        SCANNER_RUNNING,
    ];

    #[test]
    fn all_metrics_start_with_scanpost_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("scanpost_"),
                "Metric '{}' does not start with 'scanpost_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            if *name == SUBMISSION_DURATION_SECONDS || *name == SCANNER_RUNNING {
                continue;
            }
            assert!(name.ends_with("_total"), "counter '{}' lacks _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않아도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_STRATEGY, LABEL_BACKEND, LABEL_ERROR_KIND] {
            assert_eq!(label.to_lowercase(), label);
        }
    }

    #[test]
    fn submission_duration_buckets_are_sorted() {
        let buckets = SUBMISSION_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
