//! scanpost.toml 통합 설정 테스트
//!
//! - scanpost.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use scanpost_core::config::{DEFAULT_CAMERA_BACKEND, ScanpostConfig};
use scanpost_core::error::{ConfigError, ScanpostError};

// =============================================================================
// scanpost.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../scanpost.toml.example");
    let config = ScanpostConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.camera.backend, "replay");
    assert_eq!(config.camera.replay_dir, "./frames");
    assert!(config.general.operator().is_none());
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../scanpost.toml.example");
    let config = ScanpostConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_reference_timings() {
    let content = include_str!("../../../scanpost.toml.example");
    let config = ScanpostConfig::parse(content).expect("should parse");

    assert_eq!(config.gate.cooldown_ms, 2000);
    assert_eq!(config.detection.tick_interval_ms, 150);
    assert_eq!(config.submission.display_window_ms, 1000);
    assert_eq!(config.camera.refocus_restore_ms, 500);
}

// =============================================================================
// 부분 설정 / 에러 테스트
// =============================================================================

#[test]
fn only_submission_section_keeps_other_defaults() {
    let toml = r#"
[submission]
endpoint = "https://scans.example.com/save"
"#;
    let config = ScanpostConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");
    assert_eq!(config.submission.endpoint, "https://scans.example.com/save");
    assert_eq!(config.submission.request_timeout_secs, 10);
    assert_eq!(config.camera.backend, DEFAULT_CAMERA_BACKEND);
}

#[test]
fn empty_file_uses_defaults() {
    let config = ScanpostConfig::parse("").expect("empty config should parse");
    config.validate().expect("defaults should validate");
}

#[test]
fn wrong_value_type_is_parse_error() {
    let toml = r#"
[gate]
cooldown_ms = "two seconds"
"#;
    let err = ScanpostConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        ScanpostError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[tokio::test]
async fn load_from_disk_validates() {
    let dir = tempfile::TempDir::new().expect("should create temp dir");
    let path = dir.path().join("scanpost.toml");
    std::fs::write(
        &path,
        r#"
[detection]
strategy = "telepathy"
"#,
    )
    .expect("should write config");

    let err = ScanpostConfig::load(&path).await.unwrap_err();
    assert!(err.to_string().contains("detection.strategy"));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[gate]
cooldown_ms = 2000
"#;

    let original = std::env::var("SCANPOST_GATE_COOLDOWN_MS").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("SCANPOST_GATE_COOLDOWN_MS", "4500");
    }

    let mut config = ScanpostConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.gate.cooldown_ms;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("SCANPOST_GATE_COOLDOWN_MS", val),
            None => std::env::remove_var("SCANPOST_GATE_COOLDOWN_MS"),
        }
    }

    assert_eq!(result, 4500);
}

#[test]
#[serial_test::serial]
fn env_override_operator() {
    let original = std::env::var("SCANPOST_GENERAL_OPERATOR").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("SCANPOST_GENERAL_OPERATOR", "warehouse-3");
    }

    let mut config = ScanpostConfig::default();
    config.apply_env_overrides();
    let operator = config.general.operator().map(str::to_owned);

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("SCANPOST_GENERAL_OPERATOR", val),
            None => std::env::remove_var("SCANPOST_GENERAL_OPERATOR"),
        }
    }

    assert_eq!(operator.as_deref(), Some("warehouse-3"));
}

#[test]
#[serial_test::serial]
fn invalid_env_value_is_ignored() {
    let original = std::env::var("SCANPOST_SUBMISSION_DISPLAY_WINDOW_MS").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("SCANPOST_SUBMISSION_DISPLAY_WINDOW_MS", "soon");
    }

    let mut config = ScanpostConfig::default();
    config.apply_env_overrides();
    let window = config.submission.display_window_ms;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("SCANPOST_SUBMISSION_DISPLAY_WINDOW_MS", val),
            None => std::env::remove_var("SCANPOST_SUBMISSION_DISPLAY_WINDOW_MS"),
        }
    }

    assert_eq!(window, 1000);
}

#[test]
#[serial_test::serial]
fn env_override_metrics_endpoint_reaches_validation() {
    let toml = r#"
[metrics]
enabled = true
"#;

    let original = std::env::var("SCANPOST_METRICS_ENDPOINT").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("SCANPOST_METRICS_ENDPOINT", "/prom");
    }

    let mut config = ScanpostConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let endpoint = config.metrics.endpoint.clone();
    let result = config.validate();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("SCANPOST_METRICS_ENDPOINT", val),
            None => std::env::remove_var("SCANPOST_METRICS_ENDPOINT"),
        }
    }

    assert_eq!(endpoint, "/prom");
    let err = result.expect_err("unsupported metrics endpoint should be rejected");
    assert!(err.to_string().contains("metrics.endpoint"));
}
