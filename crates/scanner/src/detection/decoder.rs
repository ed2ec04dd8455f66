//! rqrr 기반 QR 디코더

use tracing::trace;

use crate::detection::FrameDecoder;
use crate::error::DecodeError;
use crate::frame::Frame;

/// `rqrr`로 휘도 프레임에서 QR 코드를 찾는 디코더
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    /// 새 디코더를 생성합니다.
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for RqrrDecoder {
    fn decode(&self, frame: &Frame) -> Result<Vec<String>, DecodeError> {
        frame.validate()?;
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let luma = frame.luma();

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma.get(y * width + x).copied().unwrap_or(0)
        });
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Ok(Vec::new());
        }

        let mut codes = Vec::with_capacity(grids.len());
        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    trace!(ecc = meta.ecc_level, version = meta.version.0, "qr grid decoded");
                    codes.push(content);
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        // 격자는 찾았지만 하나도 읽지 못한 경우만 에러
        match (codes.is_empty(), last_error) {
            (true, Some(reason)) => Err(DecodeError::Decode(reason)),
            _ => Ok(codes),
        }
    }
}
