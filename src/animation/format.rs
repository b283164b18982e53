//! Binary format definitions for capture recordings.

use std::io::{self, Read, Write};

use crate::frame::{BYTES_PER_PIXEL, Dimensions, RleFrame};

/// Magic bytes identifying a capture recording.
pub const RECORDING_MAGIC: &[u8; 4] = b"VTCP";

/// Current format version.
pub const RECORDING_VERSION: u16 = 1;

/// Compression type for frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionType {
    /// Run-length encoded RGB triplets.
    #[default]
    Rle = 0,
    /// LZ4 fast compression.
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::Rle),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }

    /// Whether this build can read and write the compression type.
    pub fn is_available(self) -> bool {
        match self {
            CompressionType::Rle => true,
            CompressionType::Lz4 => cfg!(feature = "lz4"),
        }
    }
}

/// File header for capture recordings.
#[derive(Debug, Clone)]
pub struct RecordingHeader {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Total number of frames.
    pub frame_count: u64,
    /// Capture rate in frames per second.
    pub fps: f32,
    /// Frame compression.
    pub compression: CompressionType,
}

impl RecordingHeader {
    /// Encoded size in bytes.
    ///
    /// ```text
    /// 0..4    magic "VTCP"
    /// 4..6    version
    /// 6..8    flags, compression id in bits 0..4
    /// 8..12   width
    /// 12..16  height
    /// 16..24  frame count
    /// 24..28  fps (f32)
    /// 28..40  zero
    /// ```
    pub const SIZE: usize = 40;

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Bytes in one decoded frame.
    pub fn frame_size(&self) -> usize {
        self.dimensions().frame_size()
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(RECORDING_MAGIC);
        out[4..6].copy_from_slice(&RECORDING_VERSION.to_le_bytes());
        out[6..8].copy_from_slice(&u16::from(self.compression as u8).to_le_bytes());
        out[8..12].copy_from_slice(&self.width.to_le_bytes());
        out[12..16].copy_from_slice(&self.height.to_le_bytes());
        out[16..24].copy_from_slice(&self.frame_count.to_le_bytes());
        out[24..28].copy_from_slice(&self.fps.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> io::Result<Self> {
        if &bytes[0..4] != RECORDING_MAGIC {
            return Err(invalid_data(format!(
                "not a capture recording (magic {:02X?})",
                &bytes[0..4]
            )));
        }
        let version = u16::from_le_bytes(field(bytes, 4));
        if version != RECORDING_VERSION {
            return Err(invalid_data(format!(
                "recording version {version} is not readable by this build (expects {RECORDING_VERSION})"
            )));
        }
        let compression_id = (u16::from_le_bytes(field(bytes, 6)) & 0x0F) as u8;
        let compression = CompressionType::from_u8(compression_id)
            .ok_or_else(|| invalid_data(format!("compression id {compression_id} is unknown")))?;

        Ok(Self {
            width: u32::from_le_bytes(field(bytes, 8)),
            height: u32::from_le_bytes(field(bytes, 12)),
            frame_count: u64::from_le_bytes(field(bytes, 16)),
            fps: f32::from_le_bytes(field(bytes, 24)),
            compression,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut bytes = [0u8; Self::SIZE];
        r.read_exact(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}

/// Location of one compressed frame, stored in the trailing index table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndex {
    /// Absolute file offset of the first compressed byte.
    pub offset: u64,
    /// Compressed length.
    pub size: u64,
}

impl FrameIndex {
    /// Encoded size: offset and size, both u64 LE.
    pub const SIZE: usize = 16;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut out = [0u8; Self::SIZE];
        out[..8].copy_from_slice(&self.offset.to_le_bytes());
        out[8..].copy_from_slice(&self.size.to_le_bytes());
        w.write_all(&out)
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut bytes = [0u8; Self::SIZE];
        r.read_exact(&mut bytes)?;
        Ok(Self {
            offset: u64::from_le_bytes(field(&bytes, 0)),
            size: u64::from_le_bytes(field(&bytes, 8)),
        })
    }

    /// End offset, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// Copy `N` bytes starting at `at` out of a fixed-size block.
fn field<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Compress one raw RGB frame.
pub fn compress_frame(compression: CompressionType, rgb: &[u8]) -> io::Result<Vec<u8>> {
    match compression {
        CompressionType::Rle => RleFrame::encode(rgb)
            .map(RleFrame::into_bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e)),
        CompressionType::Lz4 => compress_lz4(rgb),
    }
}

/// Decompress one frame into `dst`, which must hold exactly one raw frame.
pub fn decompress_frame_into(
    compression: CompressionType,
    data: &[u8],
    dst: &mut [u8],
) -> io::Result<()> {
    match compression {
        CompressionType::Rle => RleFrame::from_bytes(data.to_vec(), dst.len() / BYTES_PER_PIXEL)
            .and_then(|rle| rle.decode_into(dst))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        CompressionType::Lz4 => {
            let raw = decompress_lz4(data)?;
            if raw.len() != dst.len() {
                return Err(invalid_data(format!(
                    "LZ4 frame decoded to {} bytes, frame holds {}",
                    raw.len(),
                    dst.len()
                )));
            }
            dst.copy_from_slice(&raw);
            Ok(())
        }
    }
}

/// Compress data using LZ4.
#[cfg(feature = "lz4")]
pub fn compress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    Ok(lz4_flex::compress_prepend_size(data))
}

/// Decompress LZ4 data.
#[cfg(feature = "lz4")]
pub fn decompress_lz4(data: &[u8]) -> io::Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data).map_err(|e| invalid_data(e.to_string()))
}

#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(lz4_unavailable())
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(_data: &[u8]) -> io::Result<Vec<u8>> {
    Err(lz4_unavailable())
}

#[cfg(not(feature = "lz4"))]
fn lz4_unavailable() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "recording uses LZ4 but this build lacks the `lz4` feature",
    )
}
