//! In-memory store of run-length compressed frames.

use std::collections::VecDeque;

use super::{Dimensions, FrameError, FrameSource, RleFrame};

/// Ordered, forward-only store of compressed frames.
///
/// Consuming the sequence through [`FrameSource`] pops each node, decodes it
/// into the caller's buffer and drops it, so only the frames not yet encoded
/// stay resident.
///
/// Usage:
/// ```ignore
/// let mut sequence = Sequence::new(framebuffer.dimensions());
/// for _ in 0..frames {
///     framebuffer.capture_into(&mut buf)?;
///     sequence.push(&buf)?;
/// }
/// write_gif_sequence("out.gif", &mut sequence, &PaletteQuantizer::default(), timing)?;
/// ```
#[derive(Debug, Clone)]
pub struct Sequence {
    dimensions: Dimensions,
    frames: VecDeque<RleFrame>,
}

impl Sequence {
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            frames: VecDeque::new(),
        }
    }

    /// Compress and append one raw frame.
    pub fn push(&mut self, rgb: &[u8]) -> Result<(), FrameError> {
        self.dimensions.check_frame_len(rgb.len())?;
        self.frames.push_back(RleFrame::encode(rgb)?);
        Ok(())
    }

    /// Number of frames not yet consumed.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total compressed size of the frames still held.
    pub fn compressed_bytes(&self) -> usize {
        self.frames.iter().map(RleFrame::compressed_len).sum()
    }
}

impl FrameSource for Sequence {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn next_frame_into(&mut self, dst: &mut [u8]) -> Result<bool, FrameError> {
        let Some(node) = self.frames.pop_front() else {
            return Ok(false);
        };
        node.decode_into(dst)?;
        Ok(true)
    }
}
