//! 이미지 디렉토리 재생 카메라
//!
//! 디렉토리의 정지 이미지를 이름순으로 읽어 고정 프레임레이트로 반복 재생합니다.
//! 카메라가 없는 환경(헤드리스 운영, 데모, 테스트)에서 사용합니다.
//!
//! 실패 분류:
//! - 디렉토리 없음 → [`CameraError::NoDeviceFound`]
//! - 권한 없음 → [`CameraError::PermissionDenied`]
//! - 읽을 수 있는 이미지가 없음 → [`CameraError::NoDeviceFound`]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::camera::{CameraBackend, CameraCapabilities, CameraConstraints, FocusMode, VideoTrack};
use crate::error::CameraError;
use crate::frame::{Frame, FrameSource};

/// 재생 대상 확장자
const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "pgm", "gif"];

/// 이미지 디렉토리를 카메라처럼 재생하는 백엔드
#[derive(Debug, Clone)]
pub struct ReplayCamera {
    dir: PathBuf,
    fps: u32,
}

impl ReplayCamera {
    /// 새 재생 카메라를 생성합니다. `fps`가 0이면 1로 취급합니다.
    pub fn new(dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            dir: dir.into(),
            fps: fps.max(1),
        }
    }

    /// 재생 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CameraBackend for ReplayCamera {
    type Track = ReplayTrack;

    fn name(&self) -> &str {
        "replay"
    }

    async fn open(&self, _constraints: &CameraConstraints) -> Result<ReplayTrack, CameraError> {
        let paths = list_images(&self.dir).await?;
        if paths.is_empty() {
            warn!(dir = %self.dir.display(), "replay directory has no images");
            return Err(CameraError::NoDeviceFound);
        }

        let frames = tokio::task::spawn_blocking(move || load_frames(&paths))
            .await
            .map_err(|e| CameraError::Unknown(format!("frame loader failed: {e}")))?;
        if frames.is_empty() {
            return Err(CameraError::NoDeviceFound);
        }

        info!(
            dir = %self.dir.display(),
            frames = frames.len(),
            fps = self.fps,
            "replay camera opened"
        );

        Ok(ReplayTrack {
            frames,
            period: Duration::from_secs(1) / self.fps,
            started: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }
}

async fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CameraError::from_io(&e))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CameraError::from_io(&e))?
    {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn load_frames(paths: &[PathBuf]) -> Vec<Frame> {
    paths
        .iter()
        .filter_map(|path| match image::open(path) {
            Ok(img) => {
                let luma = img.to_luma8();
                let (width, height) = luma.dimensions();
                Some(Frame::from_luma(width, height, luma.into_raw()))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable replay image");
                None
            }
        })
        .collect()
}

/// 재생 트랙: 경과 시간에 따라 현재 프레임이 결정됩니다.
pub struct ReplayTrack {
    frames: Vec<Frame>,
    period: Duration,
    started: Instant,
    stopped: AtomicBool,
}

impl ReplayTrack {
    /// 재생 목록의 프레임 수
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplayTrack {
    fn latest_frame(&self) -> Option<Frame> {
        if self.stopped.load(Ordering::Acquire) || self.frames.is_empty() {
            return None;
        }
        let ticks = self.started.elapsed().as_nanos() / self.period.as_nanos().max(1);
        let index = (ticks % self.frames.len() as u128) as usize;
        self.frames.get(index).cloned()
    }
}

impl VideoTrack for ReplayTrack {
    fn capabilities(&self) -> CameraCapabilities {
        CameraCapabilities::default()
    }

    async fn apply_zoom(&self, _level: f64) -> Result<(), CameraError> {
        Err(CameraError::Constraint {
            constraint: "zoom".to_owned(),
            reason: "replay camera has no zoom".to_owned(),
        })
    }

    async fn apply_focus_mode(&self, _mode: FocusMode) -> Result<(), CameraError> {
        Err(CameraError::Constraint {
            constraint: "focus_mode".to_owned(),
            reason: "replay camera has no focus control".to_owned(),
        })
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            debug!(frames = self.frames.len(), "replay track stopped");
        }
    }
}
