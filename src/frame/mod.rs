//! Frame module - Raw RGB frame buffers and the compressed frame store.
//!
//! A raw frame is `width * height * 3` bytes of interleaved RGB in row-major
//! order. Frames flow through the encoder one at a time via [`FrameSource`],
//! which decodes the next frame into a caller-owned buffer so that the encoder
//! can keep reusing the same two scratch buffers for the whole run.

mod rle;
mod sequence;

use std::io;

pub use rle::*;
pub use sequence::*;

/// Bytes per pixel in a raw frame (interleaved RGB).
pub const BYTES_PER_PIXEL: usize = 3;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels in one frame.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of one raw RGB frame in bytes.
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.pixel_count() * BYTES_PER_PIXEL
    }

    /// Fail unless `len` is exactly one raw frame.
    pub fn check_frame_len(&self, len: usize) -> Result<(), FrameError> {
        let expected = self.frame_size();
        if len != expected {
            return Err(FrameError::SizeMismatch {
                expected,
                actual: len,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pack one RGB triplet into a single comparable integer (`r | g << 8 | b << 16`).
#[inline]
pub fn pixel_key(rgb: &[u8]) -> u32 {
    u32::from(rgb[0]) | (u32::from(rgb[1]) << 8) | (u32::from(rgb[2]) << 16)
}

/// Inverse of [`pixel_key`].
#[inline]
pub fn key_to_rgb(key: u32) -> [u8; 3] {
    [key as u8, (key >> 8) as u8, (key >> 16) as u8]
}

/// An ordered, single-pass stream of raw RGB frames.
pub trait FrameSource {
    /// Dimensions shared by every frame of this source.
    fn dimensions(&self) -> Dimensions;

    /// Decode the next frame into `dst`.
    ///
    /// Returns `Ok(false)` once the source is exhausted; `dst` is left untouched
    /// in that case.
    fn next_frame_into(&mut self, dst: &mut [u8]) -> Result<bool, FrameError>;
}

/// Frame buffer and frame store errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Pixel buffer length {0} is not a multiple of 3")]
    PartialPixel(usize),
    #[error("Corrupt run-length data at byte {offset}")]
    CorruptRun { offset: usize },
    #[error("Frame I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_key_uses_all_three_channels() {
        assert_eq!(pixel_key(&[0x11, 0x22, 0x33]), 0x0033_2211);
        assert_ne!(pixel_key(&[1, 0, 0]), pixel_key(&[0, 1, 0]));
        assert_ne!(pixel_key(&[0, 0, 1]), pixel_key(&[0, 1, 0]));
        assert_eq!(key_to_rgb(pixel_key(&[9, 200, 77])), [9, 200, 77]);
    }

    #[test]
    fn test_dimensions_sizes() {
        let dims = Dimensions::new(4, 3);
        assert_eq!(dims.pixel_count(), 12);
        assert_eq!(dims.frame_size(), 36);
        assert!(dims.check_frame_len(36).is_ok());
        assert!(matches!(
            dims.check_frame_len(35),
            Err(FrameError::SizeMismatch {
                expected: 36,
                actual: 35
            })
        ));
        assert_eq!(dims.to_string(), "4x3");
    }
}
