//! Run-length compression of raw RGB frames.
//!
//! Runs are stored as `(count, r, g, b)` with `count` in `1..=255`. Screen
//! content compresses well this way: large flat areas collapse into a handful
//! of runs.

use super::{BYTES_PER_PIXEL, FrameError};

/// Size of one encoded run in bytes.
pub const RUN_SIZE: usize = 4;

const MAX_RUN: usize = u8::MAX as usize;

/// One run-length compressed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RleFrame {
    runs: Vec<u8>,
    pixels: usize,
}

impl RleFrame {
    /// Compress a raw RGB buffer.
    pub fn encode(rgb: &[u8]) -> Result<Self, FrameError> {
        if rgb.len() % BYTES_PER_PIXEL != 0 {
            return Err(FrameError::PartialPixel(rgb.len()));
        }

        let mut runs = Vec::new();
        let mut pixels = rgb.chunks_exact(BYTES_PER_PIXEL);
        if let Some(first) = pixels.next() {
            let mut current = [first[0], first[1], first[2]];
            let mut count = 1;
            for px in pixels {
                if *px == current && count < MAX_RUN {
                    count += 1;
                    continue;
                }
                push_run(&mut runs, count, current);
                current = [px[0], px[1], px[2]];
                count = 1;
            }
            push_run(&mut runs, count, current);
        }

        Ok(Self {
            runs,
            pixels: rgb.len() / BYTES_PER_PIXEL,
        })
    }

    /// Rebuild a frame from previously serialized runs.
    pub fn from_bytes(runs: Vec<u8>, pixels: usize) -> Result<Self, FrameError> {
        if runs.len() % RUN_SIZE != 0 {
            return Err(FrameError::CorruptRun {
                offset: runs.len() - runs.len() % RUN_SIZE,
            });
        }
        Ok(Self { runs, pixels })
    }

    /// Decode into `dst`, which must hold exactly one frame.
    pub fn decode_into(&self, dst: &mut [u8]) -> Result<(), FrameError> {
        let expected = self.pixels * BYTES_PER_PIXEL;
        if dst.len() != expected {
            return Err(FrameError::SizeMismatch {
                expected,
                actual: dst.len(),
            });
        }

        let mut pos = 0;
        for (i, run) in self.runs.chunks_exact(RUN_SIZE).enumerate() {
            let count = usize::from(run[0]);
            let end = pos + count * BYTES_PER_PIXEL;
            if count == 0 || end > dst.len() {
                return Err(FrameError::CorruptRun {
                    offset: i * RUN_SIZE,
                });
            }
            for px in dst[pos..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&run[1..]);
            }
            pos = end;
        }

        if pos != dst.len() {
            return Err(FrameError::CorruptRun {
                offset: self.runs.len(),
            });
        }
        Ok(())
    }

    /// Number of pixels the frame decodes to.
    pub fn pixel_count(&self) -> usize {
        self.pixels
    }

    /// Compressed size in bytes.
    pub fn compressed_len(&self) -> usize {
        self.runs.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.runs
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.runs
    }
}

fn push_run(runs: &mut Vec<u8>, count: usize, rgb: [u8; 3]) {
    debug_assert!((1..=MAX_RUN).contains(&count));
    runs.push(count as u8);
    runs.extend_from_slice(&rgb);
}
