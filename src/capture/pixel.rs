//! Framebuffer pixel layouts and their conversion to packed RGB.

use super::CaptureError;
use crate::frame::BYTES_PER_PIXEL;

/// Framebuffer pixel layout (little-endian memory order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32 bpp, bytes `B G R X`.
    Xrgb8888,
    /// 24 bpp, bytes `B G R`.
    Bgr888,
    /// 16 bpp, `RRRRRGGG GGGBBBBB` stored little-endian.
    Rgb565,
}

impl PixelFormat {
    pub fn from_bits_per_pixel(bpp: u32) -> Result<Self, CaptureError> {
        match bpp {
            32 => Ok(PixelFormat::Xrgb8888),
            24 => Ok(PixelFormat::Bgr888),
            16 => Ok(PixelFormat::Rgb565),
            other => Err(CaptureError::UnsupportedDepth(other)),
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Xrgb8888 => 4,
            PixelFormat::Bgr888 => 3,
            PixelFormat::Rgb565 => 2,
        }
    }

    /// Convert one row of device pixels to RGB. `src` may be longer than the
    /// row (stride padding); only as many pixels as fit `dst` are read.
    pub fn convert_row(self, src: &[u8], dst: &mut [u8]) {
        let pixels = src
            .chunks_exact(self.bytes_per_pixel())
            .zip(dst.chunks_exact_mut(BYTES_PER_PIXEL));
        match self {
            PixelFormat::Xrgb8888 | PixelFormat::Bgr888 => {
                for (px, out) in pixels {
                    out.copy_from_slice(&[px[2], px[1], px[0]]);
                }
            }
            PixelFormat::Rgb565 => {
                for (px, out) in pixels {
                    let v = u16::from_le_bytes([px[0], px[1]]);
                    let r = ((v >> 11) & 0x1F) as u8;
                    let g = ((v >> 5) & 0x3F) as u8;
                    let b = (v & 0x1F) as u8;
                    out.copy_from_slice(&[(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]);
                }
            }
        }
    }
}
