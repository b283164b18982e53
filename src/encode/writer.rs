//! Animated GIF assembly.
//!
//! Every frame carries its own local palette of at most 255 colors. From the
//! second frame on, the slot right after the palette is the transparent
//! sentinel, and pixels unchanged since the previous frame are written with
//! it. All frames use "keep previous" disposal so a decoder fills those
//! pixels from what it already displayed.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::delta::{mark_unchanged, transparent_sentinel};
use super::quantize::{MAX_PALETTE, QuantizeError, Quantizer, palette_bytes};
use crate::frame::{Dimensions, FrameError, FrameSource};

/// Color budget requested for animation frames (one slot kept for transparency).
pub const ANIMATION_COLORS: usize = MAX_PALETTE - 1;

/// Placeholder 2-entry global color table; real colors live in local tables.
const PLACEHOLDER_PALETTE: [u8; 6] = [0; 6];

/// Frame timing shared by every frame of one animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationTiming {
    fps: f64,
}

impl AnimationTiming {
    pub fn new(fps: f64) -> Result<Self, EncodeError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(EncodeError::InvalidFrameRate(fps));
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Per-frame delay in hundredths of a second: `round(100 / fps)`.
    pub fn delay_cs(&self) -> u16 {
        (100.0 / self.fps).round().clamp(0.0, f64::from(u16::MAX)) as u16
    }

    /// Delay as written in the graphics control block (low byte first).
    pub fn delay_bytes(&self) -> [u8; 2] {
        self.delay_cs().to_le_bytes()
    }
}

/// Animated GIF encoding errors.
///
/// Frame-scoped variants carry the index of the offending frame.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Frame rate must be positive and finite, got {0}")]
    InvalidFrameRate(f64),
    #[error("Frame dimensions {0} do not fit a GIF canvas")]
    Dimensions(Dimensions),
    #[error("Unable to open GIF file '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to write GIF descriptor: {0}")]
    Header(#[source] gif::EncodingError),
    #[error("Failed to add the loop-control extension: {0}")]
    LoopControl(#[source] gif::EncodingError),
    #[error("Unable to read frame {frame}: {source}")]
    Source {
        frame: usize,
        #[source]
        source: FrameError,
    },
    #[error("Unable to quantize frame {frame}: {source}")]
    Quantize {
        frame: usize,
        #[source]
        source: QuantizeError,
    },
    #[error("Quantization didn't reserve a slot for transparency at frame {frame} ({colors} colors)")]
    NoTransparentSlot { frame: usize, colors: usize },
    #[error("Unable to write frame {frame}: {source}")]
    Frame {
        frame: usize,
        #[source]
        source: gif::EncodingError,
    },
    #[error("Unable to close the GIF file: {0}")]
    Close(#[source] io::Error),
}

impl EncodeError {
    /// Index of the frame the error belongs to, if it is frame-scoped.
    pub fn frame(&self) -> Option<usize> {
        match self {
            EncodeError::Source { frame, .. }
            | EncodeError::Quantize { frame, .. }
            | EncodeError::NoTransparentSlot { frame, .. }
            | EncodeError::Frame { frame, .. } => Some(*frame),
            _ => None,
        }
    }
}

/// Low-level writer for the GIF container.
///
/// Usage:
/// ```ignore
/// let mut writer = AnimationWriter::new(&mut out, dimensions, timing)?;
/// writer.write_frame(&palette, &indices, None)?;
/// writer.write_frame(&palette, &indices, Some(sentinel))?;
/// writer.finish()?;
/// ```
pub struct AnimationWriter<W: Write> {
    encoder: gif::Encoder<W>,
    width: u16,
    height: u16,
    delay: u16,
    frames_written: usize,
}

impl<W: Write> AnimationWriter<W> {
    /// Write the header, the placeholder global palette and the infinite-loop block.
    pub fn new(
        writer: W,
        dimensions: Dimensions,
        timing: AnimationTiming,
    ) -> Result<Self, EncodeError> {
        let (width, height) = canvas_size(dimensions)?;
        let mut encoder = gif::Encoder::new(writer, width, height, &PLACEHOLDER_PALETTE)
            .map_err(EncodeError::Header)?;
        debug!("Wrote the header");

        encoder
            .set_repeat(gif::Repeat::Infinite)
            .map_err(EncodeError::LoopControl)?;
        debug!("Wrote the animation block");

        Ok(Self {
            encoder,
            width,
            height,
            delay: timing.delay_cs(),
            frames_written: 0,
        })
    }

    /// Write one frame with its local palette.
    ///
    /// `transparent` is the sentinel for frames after the first; the local
    /// color table is extended so that the sentinel addresses a real entry.
    pub fn write_frame(
        &mut self,
        palette: &[[u8; 3]],
        indices: &[u8],
        transparent: Option<u8>,
    ) -> Result<(), EncodeError> {
        let mut table = palette_bytes(palette);
        if let Some(sentinel) = transparent {
            let needed = (usize::from(sentinel) + 1) * 3;
            if table.len() < needed {
                table.resize(needed, 0);
            }
        }

        let frame = gif::Frame {
            width: self.width,
            height: self.height,
            delay: self.delay,
            dispose: gif::DisposalMethod::Keep,
            transparent,
            palette: Some(table),
            buffer: Cow::Borrowed(indices),
            ..gif::Frame::default()
        };
        self.encoder
            .write_frame(&frame)
            .map_err(|source| EncodeError::Frame {
                frame: self.frames_written,
                source,
            })?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Write the trailer and hand back the underlying writer.
    pub fn finish(self) -> Result<W, EncodeError> {
        self.encoder.into_inner().map_err(EncodeError::Close)
    }
}

fn canvas_size(dimensions: Dimensions) -> Result<(u16, u16), EncodeError> {
    match (
        u16::try_from(dimensions.width),
        u16::try_from(dimensions.height),
    ) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(EncodeError::Dimensions(dimensions)),
    }
}

/// Statistics from one encoding run.
#[derive(Debug, Clone, Default)]
pub struct EncodeStats {
    /// Frames written.
    pub frames: usize,
    /// Pixels per frame.
    pub pixels_per_frame: usize,
    /// Pixels replaced by the transparent sentinel, over all frames.
    pub transparent_pixels: usize,
}

impl std::fmt::Display for EncodeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.frames * self.pixels_per_frame;
        let share = if total > 0 {
            self.transparent_pixels as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        write!(
            f,
            "{} frames, {} transparent pixels ({:.1}%)",
            self.frames, self.transparent_pixels, share
        )
    }
}

/// Encode every frame of `source` as one animated GIF into `writer`.
///
/// Exactly two raw frame buffers are used for the whole run: after each frame
/// the current and previous buffers swap roles, so the previous buffer always
/// holds the immediately preceding frame.
pub fn encode_sequence<S, Q, W>(
    source: &mut S,
    quantizer: &Q,
    timing: AnimationTiming,
    writer: W,
) -> Result<EncodeStats, EncodeError>
where
    S: FrameSource + ?Sized,
    Q: Quantizer + ?Sized,
    W: Write,
{
    let dimensions = source.dimensions();
    let mut gif = AnimationWriter::new(writer, dimensions, timing)?;

    let mut current = vec![0u8; dimensions.frame_size()];
    let mut previous = vec![0u8; dimensions.frame_size()];
    let mut indices = Vec::with_capacity(dimensions.pixel_count());
    let mut stats = EncodeStats {
        pixels_per_frame: dimensions.pixel_count(),
        ..Default::default()
    };

    let mut frame = 0;
    while source
        .next_frame_into(&mut current)
        .map_err(|source| EncodeError::Source { frame, source })?
    {
        let palette = quantizer
            .quantize_into(&current, ANIMATION_COLORS, &mut indices)
            .map_err(|source| EncodeError::Quantize { frame, source })?;
        let sentinel =
            transparent_sentinel(palette.len()).ok_or(EncodeError::NoTransparentSlot {
                frame,
                colors: palette.len(),
            })?;

        let transparent = if frame > 0 {
            let marked = mark_unchanged(&current, &previous, &mut indices, sentinel);
            stats.transparent_pixels += marked;
            debug!(
                "Frame {}: {} colors, {} unchanged pixels",
                frame,
                palette.len(),
                marked
            );
            Some(sentinel)
        } else {
            debug!("Frame {}: {} colors", frame, palette.len());
            None
        };

        gif.write_frame(&palette, &indices, transparent)?;
        std::mem::swap(&mut current, &mut previous);
        frame += 1;
    }

    if frame == 0 {
        warn!("Frame source was empty, writing a GIF with no frames");
    }
    gif.finish()?;
    stats.frames = frame;
    Ok(stats)
}

/// Encode `source` into a new GIF file at `path`.
pub fn write_gif_sequence<S, Q>(
    path: impl AsRef<Path>,
    source: &mut S,
    quantizer: &Q,
    timing: AnimationTiming,
) -> Result<EncodeStats, EncodeError>
where
    S: FrameSource + ?Sized,
    Q: Quantizer + ?Sized,
{
    let path = path.as_ref();
    info!(
        "Writing {} animated GIF to '{}'",
        source.dimensions(),
        path.display()
    );

    let file = File::create(path).map_err(|source| EncodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    let stats = encode_sequence(source, quantizer, timing, &mut writer)?;
    writer.flush().map_err(EncodeError::Close)?;

    info!("Wrote {} to '{}'", stats, path.display());
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{Palette, PaletteQuantizer};
    use crate::frame::Sequence;
    use std::io::Cursor;
    use tempfile::tempdir;

    /// Graphics control blocks and image data, pulled out of raw GIF bytes.
    #[derive(Debug)]
    struct ParsedGif {
        global_table_len: usize,
        loop_block: Option<Vec<u8>>,
        controls: Vec<[u8; 4]>,
        local_table_lens: Vec<usize>,
    }

    fn skip_sub_blocks(bytes: &[u8], mut pos: usize) -> (Vec<u8>, usize) {
        let mut data = Vec::new();
        loop {
            let len = usize::from(bytes[pos]);
            pos += 1;
            if len == 0 {
                return (data, pos);
            }
            data.extend_from_slice(&bytes[pos..pos + len]);
            pos += len;
        }
    }

    fn parse_gif(bytes: &[u8]) -> ParsedGif {
        assert_eq!(&bytes[..6], b"GIF89a");
        let flags = bytes[10];
        assert!(flags & 0x80 != 0, "global color table missing");
        let global_table_len = 2usize << (flags & 0x07);
        let mut pos = 13 + global_table_len * 3;

        let mut parsed = ParsedGif {
            global_table_len,
            loop_block: None,
            controls: Vec::new(),
            local_table_lens: Vec::new(),
        };

        loop {
            match bytes[pos] {
                0x21 => {
                    let label = bytes[pos + 1];
                    let (data, next) = skip_sub_blocks(bytes, pos + 2);
                    match label {
                        0xF9 => parsed.controls.push([data[0], data[1], data[2], data[3]]),
                        0xFF => {
                            assert_eq!(&data[..11], b"NETSCAPE2.0");
                            parsed.loop_block = Some(data[11..].to_vec());
                        }
                        _ => {}
                    }
                    pos = next;
                }
                0x2C => {
                    let flags = bytes[pos + 9];
                    pos += 10;
                    assert!(flags & 0x80 != 0, "local color table missing");
                    let len = 2usize << (flags & 0x07);
                    parsed.local_table_lens.push(len);
                    pos += len * 3;
                    pos += 1; // LZW minimum code size
                    let (_, next) = skip_sub_blocks(bytes, pos);
                    pos = next;
                }
                0x3B => return parsed,
                other => panic!("unexpected block 0x{other:02X} at {pos}"),
            }
        }
    }

    /// Decode every frame and composite it with "keep previous" semantics.
    fn composite(bytes: &[u8]) -> Vec<Vec<[u8; 3]>> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(Cursor::new(bytes)).unwrap();
        let pixels = usize::from(decoder.width()) * usize::from(decoder.height());
        let mut canvas = vec![[0u8; 3]; pixels];
        let mut shown = Vec::new();

        while let Some(frame) = decoder.read_next_frame().unwrap() {
            let palette = frame.palette.as_ref().unwrap();
            for (pixel, &index) in frame.buffer.iter().enumerate() {
                if Some(index) == frame.transparent {
                    continue;
                }
                let at = usize::from(index) * 3;
                canvas[pixel] = [palette[at], palette[at + 1], palette[at + 2]];
            }
            shown.push(canvas.clone());
        }
        shown
    }

    fn frames_of(dimensions: Dimensions, frames: &[Vec<[u8; 3]>]) -> Sequence {
        let mut sequence = Sequence::new(dimensions);
        for frame in frames {
            let rgb: Vec<u8> = frame.iter().flatten().copied().collect();
            sequence.push(&rgb).unwrap();
        }
        sequence
    }

    fn encode(sequence: &mut Sequence, fps: f64) -> (EncodeStats, Vec<u8>) {
        let mut out = Vec::new();
        let stats = encode_sequence(
            sequence,
            &PaletteQuantizer::default(),
            AnimationTiming::new(fps).unwrap(),
            &mut out,
        )
        .unwrap();
        (stats, out)
    }

    /// Quantizer that ignores its budget, to exercise the slot check.
    struct Greedy;

    impl Quantizer for Greedy {
        fn quantize_into(
            &self,
            rgb: &[u8],
            _max_colors: usize,
            indices: &mut Vec<u8>,
        ) -> Result<Palette, QuantizeError> {
            PaletteQuantizer::default().quantize_into(rgb, MAX_PALETTE, indices)
        }
    }

    /// Quantizer that always fails.
    struct Refusing;

    impl Quantizer for Refusing {
        fn quantize_into(
            &self,
            _rgb: &[u8],
            max_colors: usize,
            _indices: &mut Vec<u8>,
        ) -> Result<Palette, QuantizeError> {
            Err(QuantizeError::InvalidBudget(max_colors))
        }
    }

    fn rainbow(count: usize) -> Vec<[u8; 3]> {
        (0..count).map(|i| [i as u8, 0, 255 - i as u8]).collect()
    }

    #[test]
    fn test_delay_from_fps() {
        assert_eq!(AnimationTiming::new(10.0).unwrap().delay_bytes(), [0x0A, 0x00]);
        assert_eq!(AnimationTiming::new(25.0).unwrap().delay_bytes(), [0x04, 0x00]);
        assert_eq!(AnimationTiming::new(30.0).unwrap().delay_cs(), 3);
        assert_eq!(AnimationTiming::new(0.001).unwrap().delay_cs(), u16::MAX);
        assert_eq!(AnimationTiming::new(1000.0).unwrap().delay_cs(), 0);
    }

    #[test]
    fn test_invalid_frame_rate() {
        for fps in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                AnimationTiming::new(fps),
                Err(EncodeError::InvalidFrameRate(_))
            ));
        }
    }

    #[test]
    fn test_two_pixel_round_trip() {
        let dims = Dimensions::new(2, 1);
        let mut sequence = frames_of(
            dims,
            &[
                vec![[0, 0, 0], [255, 255, 255]],
                vec![[10, 10, 10], [255, 255, 255]],
            ],
        );
        let (stats, bytes) = encode(&mut sequence, 10.0);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.transparent_pixels, 1);

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(Cursor::new(&bytes)).unwrap();

        let first = decoder.read_next_frame().unwrap().unwrap();
        assert_eq!(first.transparent, None);
        assert_eq!(first.dispose, gif::DisposalMethod::Keep);
        let first_palette_len = 2;
        assert!(first.buffer.iter().all(|&i| usize::from(i) < first_palette_len));

        let second = decoder.read_next_frame().unwrap().unwrap();
        // Two real colors, so the sentinel is index 2.
        assert_eq!(second.transparent, Some(2));
        assert_eq!(second.buffer[1], 2);
        assert_ne!(second.buffer[0], 2);
        let palette = second.palette.as_ref().unwrap();
        let at = usize::from(second.buffer[0]) * 3;
        assert_eq!(&palette[at..at + 3], &[10, 10, 10]);

        let shown = composite(&bytes);
        assert_eq!(shown[1], vec![[10, 10, 10], [255, 255, 255]]);
    }

    #[test]
    fn test_container_structure() {
        let dims = Dimensions::new(4, 4);
        let frame = vec![[1, 2, 3]; 16];
        let mut changed = frame.clone();
        changed[5] = [9, 9, 9];
        let mut sequence = frames_of(dims, &[frame, changed.clone(), changed]);
        let (_, bytes) = encode(&mut sequence, 25.0);

        let parsed = parse_gif(&bytes);
        assert_eq!(parsed.global_table_len, 2);
        assert_eq!(parsed.loop_block.as_deref(), Some(&[1, 0, 0][..]));
        assert_eq!(parsed.controls.len(), 3);

        // Frame 0: keep-previous disposal, no transparency.
        assert_eq!(parsed.controls[0][0], 0b0000_0100);
        assert_eq!(&parsed.controls[0][1..3], &[0x04, 0x00]);
        // Later frames: transparency enabled with the sentinel index.
        for control in &parsed.controls[1..] {
            assert_eq!(control[0], 0b0000_0101);
            assert_eq!(&control[1..3], &[0x04, 0x00]);
        }
        // Frame 0 has one color; frames 1 and 2 have two, so the sentinel is 2.
        assert_eq!(parsed.controls[1][3], 2);
        assert_eq!(parsed.controls[2][3], 2);
        assert_eq!(parsed.local_table_lens.len(), 3);
        assert_eq!(&bytes[bytes.len() - 1..], &[0x3B]);
    }

    #[test]
    fn test_base_frame_never_uses_sentinel() {
        let dims = Dimensions::new(16, 16);
        let frame = rainbow(256).into_iter().take(255).chain([[0, 0, 0]]).collect::<Vec<_>>();
        let mut sequence = frames_of(dims, &[frame.clone(), frame]);
        let (stats, bytes) = encode(&mut sequence, 10.0);
        assert_eq!(stats.transparent_pixels, 256);

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(Cursor::new(&bytes)).unwrap();
        let first = decoder.read_next_frame().unwrap().unwrap();
        let colors = first.palette.as_ref().unwrap().len() / 3;
        assert!(colors <= ANIMATION_COLORS + 1);
        assert!(first.buffer.iter().all(|&i| usize::from(i) < 255));

        let second = decoder.read_next_frame().unwrap().unwrap();
        let sentinel = second.transparent.unwrap();
        assert!(second.buffer.iter().all(|&i| i == sentinel));
    }

    #[test]
    fn test_composite_matches_source() {
        let dims = Dimensions::new(3, 3);
        let a: Vec<[u8; 3]> = (0..9).map(|i| [i * 20, 0, 0]).collect();
        let mut b = a.clone();
        b[0] = [0, 200, 0];
        b[8] = [0, 0, 200];
        let mut c = b.clone();
        c[4] = [77, 77, 77];
        let frames = vec![a, b, c];

        let mut sequence = frames_of(dims, &frames);
        let (_, bytes) = encode(&mut sequence, 10.0);
        assert_eq!(composite(&bytes), frames);
    }

    #[test]
    fn test_rich_frame_aborts_with_frame_index() {
        let dims = Dimensions::new(16, 16);
        let plain = vec![[5, 5, 5]; 256];
        let mut sequence = frames_of(dims, &[plain.clone(), plain, rainbow(256)]);

        let err = encode_sequence(
            &mut sequence,
            &Greedy,
            AnimationTiming::new(10.0).unwrap(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EncodeError::NoTransparentSlot {
                frame: 2,
                colors: 256
            }
        ));
        assert_eq!(err.frame(), Some(2));

        let mut sequence = frames_of(dims, &[rainbow(256)]);
        let err = encode_sequence(
            &mut sequence,
            &Refusing,
            AnimationTiming::new(10.0).unwrap(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::Quantize { frame: 0, .. }));
    }

    #[test]
    fn test_rich_frames_keep_a_transparent_slot() {
        let dims = Dimensions::new(16, 16);
        let mut sequence = frames_of(dims, &[rainbow(256), rainbow(256)]);
        let (stats, _) = encode(&mut sequence, 10.0);
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.transparent_pixels, 256);
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        let mut sequence = Sequence::new(Dimensions::new(70_000, 1));
        let err = encode_sequence(
            &mut sequence,
            &PaletteQuantizer::default(),
            AnimationTiming::new(10.0).unwrap(),
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::Dimensions(_)));
    }

    #[test]
    fn test_empty_source_still_closes() {
        let mut sequence = Sequence::new(Dimensions::new(2, 2));
        let (stats, bytes) = encode(&mut sequence, 10.0);
        assert_eq!(stats.frames, 0);
        let parsed = parse_gif(&bytes);
        assert!(parsed.controls.is_empty());
    }

    #[test]
    fn test_write_gif_sequence_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("capture.gif");
        let dims = Dimensions::new(2, 2);
        let mut sequence = frames_of(dims, &[vec![[1, 1, 1]; 4], vec![[1, 1, 1]; 4]]);

        let stats = write_gif_sequence(
            &path,
            &mut sequence,
            &PaletteQuantizer::default(),
            AnimationTiming::new(10.0).unwrap(),
        )
        .unwrap();
        assert_eq!(stats.frames, 2);
        assert!(sequence.is_empty());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(parse_gif(&bytes).controls.len(), 2);
    }

    #[test]
    fn test_open_failure_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("capture.gif");
        let mut sequence = Sequence::new(Dimensions::new(1, 1));
        let err = write_gif_sequence(
            &path,
            &mut sequence,
            &PaletteQuantizer::default(),
            AnimationTiming::new(10.0).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::Open { .. }));
        assert!(err.to_string().contains("capture.gif"));
    }
}
