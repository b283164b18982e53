//! Capture recorder for writing raw frames to a recording file.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, info};

use super::format::{CompressionType, FrameIndex, RecordingHeader, compress_frame};
use crate::frame::Dimensions;

/// Capture recorder that stores compressed frames in a file.
///
/// Usage:
/// ```ignore
/// let mut recorder =
///     CaptureRecorder::new("session.vtcap", fb.dimensions(), 10.0, CompressionType::Rle)?;
/// for _ in 0..frames {
///     fb.capture_into(&mut buf)?;
///     recorder.record_frame(&buf)?;
/// }
/// recorder.finalize()?;
/// ```
pub struct CaptureRecorder {
    writer: BufWriter<File>,
    header: RecordingHeader,
    frame_indices: Vec<FrameIndex>,
    frames_written: u64,
}

impl CaptureRecorder {
    /// Create a new capture recorder.
    pub fn new<P: AsRef<Path>>(
        path: P,
        dimensions: Dimensions,
        fps: f32,
        compression: CompressionType,
    ) -> io::Result<Self> {
        if !compression.is_available() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{compression:?} compression is not available in this build"),
            ));
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = RecordingHeader {
            width: dimensions.width,
            height: dimensions.height,
            frame_count: 0, // Will be updated on finalize
            fps,
            compression,
        };

        // Write placeholder header
        header.write_to(&mut writer)?;

        Ok(Self {
            writer,
            header,
            frame_indices: Vec::new(),
            frames_written: 0,
        })
    }

    /// Compress and append one raw RGB frame.
    pub fn record_frame(&mut self, rgb: &[u8]) -> io::Result<()> {
        if rgb.len() != self.header.frame_size() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame size mismatch: {} bytes vs {} expected",
                    rgb.len(),
                    self.header.frame_size()
                ),
            ));
        }

        let offset = self.writer.stream_position()?;
        let data = compress_frame(self.header.compression, rgb)?;
        self.writer.write_all(&data)?;
        self.frame_indices.push(FrameIndex {
            offset,
            size: data.len() as u64,
        });
        debug!("Recorded frame {} ({} bytes)", self.frames_written, data.len());
        self.frames_written += 1;

        Ok(())
    }

    /// Finalize the recording.
    ///
    /// Writes frame index table and updates header with final frame count.
    pub fn finalize(mut self) -> io::Result<RecordingStats> {
        // Write frame index table at current position
        let index_offset = self.writer.stream_position()?;
        for index in &self.frame_indices {
            index.write_to(&mut self.writer)?;
        }

        // Update header with final frame count
        self.header.frame_count = self.frames_written;

        // Seek back and rewrite header
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.writer)?;

        // Flush and close
        self.writer.flush()?;

        let total_size = index_offset + (self.frame_indices.len() as u64 * FrameIndex::SIZE as u64);
        let stats = RecordingStats {
            frame_count: self.frames_written,
            total_bytes: total_size,
            average_frame_size: if self.frames_written > 0 {
                index_offset.saturating_sub(RecordingHeader::SIZE as u64) / self.frames_written
            } else {
                0
            },
            compression: self.header.compression,
        };
        info!("Recording finalized: {}", stats);
        Ok(stats)
    }

    /// Get number of frames recorded so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

/// Statistics from recording session.
#[derive(Debug, Clone)]
pub struct RecordingStats {
    /// Total frames recorded.
    pub frame_count: u64,
    /// Total file size in bytes.
    pub total_bytes: u64,
    /// Average compressed frame size.
    pub average_frame_size: u64,
    /// Compression used.
    pub compression: CompressionType,
}

impl std::fmt::Display for RecordingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {} bytes total, {} bytes/frame avg ({:?} compression)",
            self.frame_count, self.total_bytes, self.average_frame_size, self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn frame(dims: Dimensions, shade: u8) -> Vec<u8> {
        [shade, shade, 255 - shade].repeat(dims.pixel_count())
    }

    #[test]
    fn test_recorder_basic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.vtcap");
        let dims = Dimensions::new(16, 16);

        let mut recorder =
            CaptureRecorder::new(&path, dims, 10.0, CompressionType::Rle).unwrap();

        for i in 0..10 {
            recorder.record_frame(&frame(dims, i)).unwrap();
        }

        let stats = recorder.finalize().unwrap();
        assert_eq!(stats.frame_count, 10);
        // 256 flat pixels collapse to a 255-pixel run plus a 1-pixel run.
        assert_eq!(stats.average_frame_size, 8);

        let metadata = fs::metadata(&path).unwrap();
        assert_eq!(metadata.len(), stats.total_bytes);
        assert!(metadata.len() > RecordingHeader::SIZE as u64);
    }

    #[test]
    fn test_recorder_rejects_wrong_frame_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.vtcap");
        let mut recorder =
            CaptureRecorder::new(&path, Dimensions::new(2, 2), 10.0, CompressionType::Rle)
                .unwrap();
        let err = recorder.record_frame(&[0u8; 3]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(recorder.frames_written(), 0);
    }

    #[cfg(not(feature = "lz4"))]
    #[test]
    fn test_recorder_refuses_unavailable_compression() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lz4.vtcap");
        let err = CaptureRecorder::new(&path, Dimensions::new(2, 2), 10.0, CompressionType::Lz4)
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(!path.exists());
    }
}
