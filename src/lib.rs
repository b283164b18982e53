//! vtshot - Framebuffer screenshots and animated GIF screen captures.
//!
//! Frames are read from a Linux framebuffer device, kept run-length encoded
//! in memory (or on disk as a `.vtcap` recording), then written out as a
//! single still image or as one animated GIF.
//!
//! # Architecture
//!
//! - `capture`: Framebuffer geometry, device reads, pixel conversion
//! - `frame`: Raw RGB frames, RLE compression, the draining frame sequence
//! - `encode`: Palette quantization, delta transparency, GIF/PNG/PPM writers
//! - `animation`: `.vtcap` recording and playback
//! - `schema`: Capture configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use vtshot::{
//!     capture::{Framebuffer, capture_sequence},
//!     encode::{AnimationTiming, PaletteQuantizer, write_gif_sequence},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut fb = Framebuffer::open("/dev/fb0")?;
//! let mut sequence = capture_sequence(&mut fb, 50, 10.0)?;
//!
//! let stats = write_gif_sequence("screen.gif", &mut sequence, &PaletteQuantizer::default(), AnimationTiming::new(10.0)?)?;
//! println!("{}", stats);
//! # Ok(())
//! # }
//! ```

pub mod animation;
pub mod capture;
pub mod encode;
pub mod frame;
pub mod schema;

// Re-export commonly used types
pub use capture::{CaptureError, Framebuffer, ReadMode};
pub use encode::{AnimationTiming, EncodeError, EncodeStats, PaletteQuantizer, StillFormat};
pub use frame::{Dimensions, FrameSource, Sequence};
pub use schema::CaptureConfig;
