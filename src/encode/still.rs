//! Single-image writers: indexed PNG, binary PPM and still GIF.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::info;

use super::quantize::{IndexedImage, MAX_PALETTE, PaletteQuantizer, QuantizeError, Quantizer};
use crate::frame::Dimensions;

/// Still image output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StillFormat {
    /// Indexed 8-bit PNG.
    #[default]
    Png,
    /// Binary PPM (P6).
    Ppm,
    /// Single-frame GIF.
    Gif,
}

impl StillFormat {
    pub fn extension(self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Ppm => "ppm",
            StillFormat::Gif => "gif",
        }
    }
}

/// Still image errors.
#[derive(Debug, thiserror::Error)]
pub enum StillError {
    #[error("Image buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("Image dimensions {0} are not supported by this format")]
    Dimensions(Dimensions),
    #[error("Unable to quantize: {0}")]
    Quantize(#[from] QuantizeError),
    #[error("PNG encoding failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error("GIF encoding failed: {0}")]
    Gif(#[from] gif::EncodingError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write `rgb` to `path` in the given format.
pub fn write_still(
    path: &Path,
    format: StillFormat,
    dimensions: Dimensions,
    rgb: &[u8],
) -> Result<(), StillError> {
    match format {
        StillFormat::Png => write_png(path, dimensions, rgb),
        StillFormat::Ppm => write_ppm(path, dimensions, rgb),
        StillFormat::Gif => write_gif(path, dimensions, rgb),
    }
}

pub fn write_png(path: &Path, dimensions: Dimensions, rgb: &[u8]) -> Result<(), StillError> {
    info!("Writing {} PNG to '{}'", dimensions, path.display());
    let image = quantize_still(dimensions, rgb)?;
    let mut writer = BufWriter::new(File::create(path)?);
    encode_png(&mut writer, dimensions, &image)?;
    writer.flush()?;
    Ok(())
}

pub fn write_ppm(path: &Path, dimensions: Dimensions, rgb: &[u8]) -> Result<(), StillError> {
    info!("Writing {} PPM to '{}'", dimensions, path.display());
    check_len(dimensions, rgb)?;
    let mut writer = BufWriter::new(File::create(path)?);
    encode_ppm(&mut writer, dimensions, rgb)?;
    writer.flush()?;
    Ok(())
}

pub fn write_gif(path: &Path, dimensions: Dimensions, rgb: &[u8]) -> Result<(), StillError> {
    info!("Writing {} GIF to '{}'", dimensions, path.display());
    let image = quantize_still(dimensions, rgb)?;
    let mut writer = BufWriter::new(File::create(path)?);
    encode_gif(&mut writer, dimensions, &image)?;
    writer.flush()?;
    Ok(())
}

/// Indexed PNG with a PLTE chunk.
pub fn encode_png<W: Write>(
    w: W,
    dimensions: Dimensions,
    image: &IndexedImage,
) -> Result<(), StillError> {
    let mut encoder = png::Encoder::new(w, dimensions.width, dimensions.height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(image.palette_bytes());

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.indices)?;
    writer.finish()?;
    Ok(())
}

pub fn encode_ppm<W: Write>(mut w: W, dimensions: Dimensions, rgb: &[u8]) -> io::Result<()> {
    write!(w, "P6\n{} {}\n255\n", dimensions.width, dimensions.height)?;
    w.write_all(rgb)
}

/// Single frame with the palette in the global color table.
pub fn encode_gif<W: Write>(
    w: W,
    dimensions: Dimensions,
    image: &IndexedImage,
) -> Result<(), StillError> {
    let (Ok(width), Ok(height)) = (
        u16::try_from(dimensions.width),
        u16::try_from(dimensions.height),
    ) else {
        return Err(StillError::Dimensions(dimensions));
    };

    let mut encoder = gif::Encoder::new(w, width, height, &image.palette_bytes())?;
    let frame = gif::Frame {
        width,
        height,
        buffer: Cow::Borrowed(&image.indices),
        ..gif::Frame::default()
    };
    encoder.write_frame(&frame)?;
    encoder.into_inner()?;
    Ok(())
}

fn check_len(dimensions: Dimensions, rgb: &[u8]) -> Result<(), StillError> {
    if rgb.len() != dimensions.frame_size() {
        return Err(StillError::SizeMismatch {
            expected: dimensions.frame_size(),
            actual: rgb.len(),
        });
    }
    Ok(())
}

fn quantize_still(dimensions: Dimensions, rgb: &[u8]) -> Result<IndexedImage, StillError> {
    check_len(dimensions, rgb)?;
    if dimensions.pixel_count() == 0 {
        return Err(StillError::Dimensions(dimensions));
    }
    Ok(PaletteQuantizer::default().quantize(rgb, MAX_PALETTE)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn checker(dims: Dimensions) -> Vec<u8> {
        (0..dims.pixel_count())
            .flat_map(|i| if i % 2 == 0 { [200, 10, 10] } else { [10, 10, 200] })
            .collect()
    }

    #[test]
    fn test_ppm_layout() {
        let dims = Dimensions::new(2, 1);
        let rgb = [1u8, 2, 3, 4, 5, 6];
        let mut out = Vec::new();
        encode_ppm(&mut out, dims, &rgb).unwrap();
        assert_eq!(out, b"P6\n2 1\n255\n\x01\x02\x03\x04\x05\x06");
    }

    #[test]
    fn test_png_is_indexed() {
        let dims = Dimensions::new(4, 2);
        let rgb = checker(dims);
        let image = PaletteQuantizer::default().quantize(&rgb, MAX_PALETTE).unwrap();
        let mut out = Vec::new();
        encode_png(&mut out, dims, &image).unwrap();

        let mut decoder = png::Decoder::new(Cursor::new(out));
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.color_type, png::ColorType::Indexed);
        assert_eq!((info.width, info.height), (4, 2));
        let palette = info.palette.as_ref().unwrap().to_vec();
        assert_eq!(palette.len(), 6);

        let mut buf = vec![0u8; reader.output_buffer_size()];
        reader.next_frame(&mut buf).unwrap();
        for (pixel, &index) in buf[..8].iter().enumerate() {
            let at = usize::from(index) * 3;
            assert_eq!(&palette[at..at + 3], &rgb[pixel * 3..pixel * 3 + 3]);
        }
    }

    #[test]
    fn test_gif_still_has_no_animation_blocks() {
        let dims = Dimensions::new(4, 2);
        let image = PaletteQuantizer::default().quantize(&checker(dims), MAX_PALETTE).unwrap();
        let mut out = Vec::new();
        encode_gif(&mut out, dims, &image).unwrap();

        assert!(!out.windows(11).any(|w| w == b"NETSCAPE2.0"));

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(Cursor::new(&out)).unwrap();
        let global = decoder.global_palette().unwrap().to_vec();
        let frame = decoder.read_next_frame().unwrap().unwrap();
        assert!(frame.palette.is_none());
        assert_eq!(frame.transparent, None);
        let at = usize::from(frame.buffer[0]) * 3;
        assert_eq!(&global[at..at + 3], &[200, 10, 10]);
    }

    #[test]
    fn test_write_still_files() {
        let dir = tempdir().unwrap();
        let dims = Dimensions::new(3, 3);
        let rgb = checker(dims);
        for format in [StillFormat::Png, StillFormat::Ppm, StillFormat::Gif] {
            let path = dir.path().join(format!("shot.{}", format.extension()));
            write_still(&path, format, dims, &rgb).unwrap();
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }

    #[test]
    fn test_size_mismatch() {
        let dir = tempdir().unwrap();
        let err = write_ppm(&dir.path().join("bad.ppm"), Dimensions::new(2, 2), &[0; 5]).unwrap_err();
        assert!(matches!(
            err,
            StillError::SizeMismatch {
                expected: 12,
                actual: 5
            }
        ));
    }
}
