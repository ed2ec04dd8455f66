#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ScanpostError};

// 설정
pub use config::ScanpostConfig;

// 이벤트
pub use event::{DetectionEvent, Event, EventMetadata, SaveStatus, ScanRecord, SubmissionStatus};

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};
