//! Encode module - Palette quantization and image containers.
//!
//! The animated path turns a [`FrameSource`](crate::frame::FrameSource) into a
//! single GIF:
//!
//! ```text
//! FrameSource -> Quantizer (255 colors) -> mark_unchanged (frames >= 1) -> AnimationWriter
//! ```
//!
//! The still path quantizes one frame to at most 256 colors and writes it as
//! PNG or GIF, or dumps it untouched as PPM.

mod delta;
mod quantize;
mod still;
mod writer;

pub use delta::*;
pub use quantize::*;
pub use still::*;
pub use writer::*;
