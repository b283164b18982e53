//! Capture player for reading back recorded frames.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::format::{FrameIndex, RecordingHeader, decompress_frame_into};
use crate::frame::{Dimensions, FrameError, FrameSource};

/// Capture player for reading recording files.
///
/// Usage:
/// ```ignore
/// let mut player = CapturePlayer::open("session.vtcap")?;
/// println!("Recording has {} frames", player.frame_count());
///
/// // Read specific frame
/// let rgb = player.read_frame(10)?;
///
/// // Or hand the whole recording to the GIF encoder
/// write_gif_sequence("session.gif", &mut player, &PaletteQuantizer::default(), timing)?;
/// ```
pub struct CapturePlayer {
    reader: BufReader<File>,
    header: RecordingHeader,
    frame_indices: Vec<FrameIndex>,
    /// Pre-allocated buffer for compressed frame data.
    read_buffer: Vec<u8>,
    /// Next frame handed out through [`FrameSource`].
    cursor: u64,
}

impl CapturePlayer {
    /// Open a recording file for playback.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        // Read header
        let header = RecordingHeader::read_from(&mut reader)?;

        // Seek to end to find index table
        let index_size = header
            .frame_count
            .checked_mul(FrameIndex::SIZE as u64)
            .ok_or_else(|| invalid_data("Frame count overflows the index table"))?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        let index_start = file_len
            .checked_sub(index_size)
            .filter(|&start| start >= RecordingHeader::SIZE as u64)
            .ok_or_else(|| invalid_data("Recording is truncated"))?;

        reader.seek(SeekFrom::Start(index_start))?;

        // Read frame indices
        let mut frame_indices = Vec::with_capacity(header.frame_count as usize);
        for _ in 0..header.frame_count {
            let index = FrameIndex::read_from(&mut reader)?;
            if index.end().is_none_or(|end| end > index_start) {
                return Err(invalid_data("Frame index points past the frame data"));
            }
            frame_indices.push(index);
        }

        Ok(Self {
            reader,
            header,
            frame_indices,
            read_buffer: Vec::new(),
            cursor: 0,
        })
    }

    /// Get recording header.
    pub fn header(&self) -> &RecordingHeader {
        &self.header
    }

    /// Get total number of frames.
    pub fn frame_count(&self) -> u64 {
        self.header.frame_count
    }

    /// Get capture rate.
    pub fn fps(&self) -> f32 {
        self.header.fps
    }

    /// Read frame data directly into a pre-allocated buffer.
    pub fn read_frame_into(&mut self, frame_index: u64, dst: &mut [u8]) -> io::Result<()> {
        if frame_index >= self.header.frame_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame index {} out of range ({} frames)",
                    frame_index, self.header.frame_count
                ),
            ));
        }
        if dst.len() != self.header.frame_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame size mismatch: {} bytes vs {} expected",
                    dst.len(),
                    self.header.frame_size()
                ),
            ));
        }

        let index = self.frame_indices[frame_index as usize];
        self.reader.seek(SeekFrom::Start(index.offset))?;

        self.read_buffer.resize(index.size as usize, 0);
        self.reader.read_exact(&mut self.read_buffer)?;

        decompress_frame_into(self.header.compression, &self.read_buffer, dst)
    }

    /// Read a specific frame by index.
    pub fn read_frame(&mut self, frame_index: u64) -> io::Result<Vec<u8>> {
        let mut rgb = vec![0u8; self.header.frame_size()];
        self.read_frame_into(frame_index, &mut rgb)?;
        Ok(rgb)
    }
}

impl FrameSource for CapturePlayer {
    fn dimensions(&self) -> Dimensions {
        self.header.dimensions()
    }

    fn next_frame_into(&mut self, dst: &mut [u8]) -> Result<bool, FrameError> {
        if self.cursor >= self.header.frame_count {
            return Ok(false);
        }
        self.read_frame_into(self.cursor, dst)?;
        self.cursor += 1;
        Ok(true)
    }
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}
