//! 비디오 프레임: 8비트 휘도(luma) 버퍼
//!
//! 카메라 백엔드는 프레임을 [`Frame`]으로 변환해 [`FrameSource`]로 노출하고,
//! 탐지 소스는 이를 읽어 디코드합니다. 버퍼는 `bytes::Bytes`이므로
//! 복제 비용 없이 디코드 스레드로 넘길 수 있습니다.

use std::fmt;

use bytes::Bytes;

use crate::error::DecodeError;

/// 8비트 그레이스케일 프레임 (행 우선, stride = width)
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    luma: Bytes,
}

impl Frame {
    /// 휘도 버퍼로 프레임을 생성합니다.
    pub fn from_luma(width: u32, height: u32, luma: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            luma: luma.into(),
        }
    }

    /// RGB24 버퍼를 휘도로 변환하여 프레임을 생성합니다 (BT.601 가중치).
    pub fn from_rgb(width: u32, height: u32, rgb: &[u8]) -> Self {
        let luma: Vec<u8> = rgb
            .chunks_exact(3)
            .map(|px| {
                ((u32::from(px[0]) * 299 + u32::from(px[1]) * 587 + u32::from(px[2]) * 114)
                    / 1000) as u8
            })
            .collect();
        Self::from_luma(width, height, luma)
    }

    /// 가로 픽셀 수
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 세로 픽셀 수
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 휘도 버퍼
    pub fn luma(&self) -> &[u8] {
        &self.luma
    }

    /// 버퍼 크기가 해상도와 일치하는지 확인합니다.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let expected = self.width as usize * self.height as usize;
        if expected == 0 || self.luma.len() < expected {
            return Err(DecodeError::InvalidFrame {
                width: self.width,
                height: self.height,
                expected,
                actual: self.luma.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.luma.len())
            .finish()
    }
}

/// 현재 프레임을 제공하는 소스
///
/// 프레임 전달은 디코드와 독립적이어야 하므로 이 메서드는 블로킹하지 않습니다.
/// 아직 프레임이 준비되지 않았거나 트랙이 닫혔으면 `None`을 반환합니다.
pub trait FrameSource: Send + Sync {
    /// 가장 최근 프레임을 반환합니다.
    fn latest_frame(&self) -> Option<Frame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_conversion_uses_bt601_weights() {
        let rgb = [255, 255, 255, 0, 0, 0, 255, 0, 0, 0, 255, 0];
        let frame = Frame::from_rgb(2, 2, &rgb);
        assert_eq!(frame.luma(), &[255, 0, 76, 149]);
    }

    #[test]
    fn validate_rejects_short_buffer() {
        let frame = Frame::from_luma(4, 4, vec![0_u8; 15]);
        let err = frame.validate().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidFrame {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_empty_frame() {
        let frame = Frame::from_luma(0, 0, Vec::<u8>::new());
        assert!(frame.validate().is_err());
    }

    #[test]
    fn clone_shares_buffer() {
        let frame = Frame::from_luma(2, 1, vec![1_u8, 2]);
        let copy = frame.clone();
        assert_eq!(frame.luma().as_ptr(), copy.luma().as_ptr());
    }

    #[test]
    fn debug_omits_pixels() {
        let frame = Frame::from_luma(2, 1, vec![1_u8, 2]);
        let debug = format!("{frame:?}");
        assert!(debug.contains("bytes: 2"));
    }
}
