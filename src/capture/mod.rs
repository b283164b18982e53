//! Capture module - Linux framebuffer screen capture.
//!
//! The framebuffer geometry comes from sysfs
//! (`/sys/class/graphics/<fbN>/{virtual_size,bits_per_pixel,stride}`), and
//! pixels are read from the device node, or from a shared mapping of it with
//! the `mmap` feature, and converted to packed RGB.

mod framebuffer;
mod pixel;

use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info};

pub use framebuffer::*;
pub use pixel::*;

use crate::frame::{FrameError, Sequence};

/// Screen capture errors.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Unable to open framebuffer device '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to map framebuffer device '{}': {source}", path.display())]
    Map {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Memory-mapped capture needs a build with the `mmap` feature")]
    MmapUnavailable,
    #[error("Unable to read framebuffer attribute '{}': {source}", path.display())]
    Attribute {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed framebuffer attribute '{name}': {value:?}")]
    MalformedAttribute { name: &'static str, value: String },
    #[error("Device path '{}' has no file name", .0.display())]
    DeviceName(PathBuf),
    #[error("Unsupported framebuffer depth: {0} bits per pixel")]
    UnsupportedDepth(u32),
    #[error("Framebuffer stride {stride} is shorter than a {width} pixel row")]
    Stride { stride: u32, width: u32 },
    #[error("Capture rate must be positive and finite, got {0}")]
    InvalidFrameRate(f64),
    #[error("Framebuffer read failed: {0}")]
    Read(#[from] io::Error),
    #[error("Frame store rejected a capture: {0}")]
    Frame(#[from] FrameError),
}

/// Capture `frames` frames at `fps`, handing each one to `sink`.
///
/// Frames are paced to the requested rate; a capture that takes longer than
/// one interval is followed immediately by the next. The frame buffer passed
/// to `sink` is reused between calls.
pub fn capture_paced<F, E>(
    framebuffer: &mut Framebuffer,
    frames: usize,
    fps: f64,
    mut sink: F,
) -> Result<(), E>
where
    F: FnMut(&[u8]) -> Result<(), E>,
    E: From<CaptureError>,
{
    let interval = Duration::try_from_secs_f64(1.0 / fps)
        .map_err(|_| CaptureError::InvalidFrameRate(fps))?;
    let mut buf = vec![0u8; framebuffer.dimensions().frame_size()];

    for i in 0..frames {
        let start = Instant::now();
        framebuffer.capture_into(&mut buf)?;
        sink(&buf)?;
        debug!("Captured frame {}", i);

        if i + 1 < frames {
            thread::sleep(interval.saturating_sub(start.elapsed()));
        }
    }
    Ok(())
}

/// Capture `frames` frames at `fps` into an in-memory [`Sequence`].
pub fn capture_sequence(
    framebuffer: &mut Framebuffer,
    frames: usize,
    fps: f64,
) -> Result<Sequence, CaptureError> {
    let dimensions = framebuffer.dimensions();
    let mut sequence = Sequence::new(dimensions);

    info!("Capturing {} frames of {} at {} fps", frames, dimensions, fps);
    capture_paced(framebuffer, frames, fps, |rgb| {
        sequence.push(rgb).map_err(CaptureError::from)
    })?;
    info!(
        "Captured {} frames ({} bytes compressed)",
        sequence.len(),
        sequence.compressed_bytes()
    );

    Ok(sequence)
}
