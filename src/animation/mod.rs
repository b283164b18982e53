//! Raw capture recordings.
//!
//! Recording stores captured frames losslessly so they can be converted to
//! GIF later, or at a different frame rate.
//!
//! # File Format
//!
//! The `.vtcap` format stores RGB frames with per-frame compression:
//!
//! ```text
//! Header (40 bytes):
//!   Magic: "VTCP" (4 bytes)
//!   Version: u16
//!   Flags: u16 (compression in the low nibble)
//!   Width: u32
//!   Height: u32
//!   Frame count: u64
//!   Frame rate: f32
//!   Reserved: 12 bytes
//!
//! Frame data (variable):
//!   Each frame is width * height * 3 bytes of RGB,
//!   RLE or LZ4 compressed
//!
//! Frame index table (frame_count * 16 bytes, at end of file):
//!   Offset: u64
//!   Compressed size: u64
//! ```
//!
//! All integers are little-endian.

mod format;
mod player;
mod recorder;

pub use format::{
    CompressionType, FrameIndex, RECORDING_MAGIC, RECORDING_VERSION, RecordingHeader,
};
pub use player::CapturePlayer;
pub use recorder::{CaptureRecorder, RecordingStats};
