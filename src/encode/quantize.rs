//! Palette quantization of raw RGB frames.
//!
//! Frames with no more distinct colors than the budget are reproduced
//! exactly, the same way `gif::Frame::from_rgba_speed` does. Richer frames
//! get a palette trained by NeuQuant (`color_quant`), and every distinct
//! source color is then assigned the palette entry closest to it.

use std::collections::HashMap;

use color_quant::NeuQuant;

use crate::frame::{BYTES_PER_PIXEL, key_to_rgb, pixel_key};

/// Largest palette an indexed GIF/PNG color table can hold.
pub const MAX_PALETTE: usize = 256;

/// NeuQuant sampling factor used by default (1 = best, 30 = fastest).
pub const DEFAULT_SPEED: i32 = 10;

/// Below this many pixels every pixel is used for training.
const MIN_SAMPLED_PIXELS: usize = 1 << 14;

/// Ordered color table.
pub type Palette = Vec<[u8; 3]>;

/// A palette plus one palette index per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub palette: Palette,
    pub indices: Vec<u8>,
}

impl IndexedImage {
    /// Palette flattened to `r, g, b` bytes for container color tables.
    pub fn palette_bytes(&self) -> Vec<u8> {
        palette_bytes(&self.palette)
    }
}

/// Flatten a palette to `r, g, b` bytes.
pub fn palette_bytes(palette: &[[u8; 3]]) -> Vec<u8> {
    palette.iter().flatten().copied().collect()
}

/// Quantization errors.
#[derive(Debug, thiserror::Error)]
pub enum QuantizeError {
    #[error("Color budget {0} is outside 1..=256")]
    InvalidBudget(usize),
    #[error("Pixel buffer length {0} is not a multiple of 3")]
    PartialPixel(usize),
    #[error("Sampling speed {0} is outside 1..=30")]
    InvalidSpeed(i32),
}

/// Reduces a raw RGB buffer to a bounded palette plus an index map.
pub trait Quantizer {
    /// Quantize `rgb` to at most `max_colors` entries.
    ///
    /// `indices` is cleared and refilled with one index per pixel so that a
    /// caller encoding many frames can reuse the allocation.
    fn quantize_into(
        &self,
        rgb: &[u8],
        max_colors: usize,
        indices: &mut Vec<u8>,
    ) -> Result<Palette, QuantizeError>;

    /// Quantize into a freshly allocated [`IndexedImage`].
    fn quantize(&self, rgb: &[u8], max_colors: usize) -> Result<IndexedImage, QuantizeError> {
        let mut indices = Vec::with_capacity(rgb.len() / BYTES_PER_PIXEL);
        let palette = self.quantize_into(rgb, max_colors, &mut indices)?;
        Ok(IndexedImage { palette, indices })
    }
}

/// Exact palette when it fits, NeuQuant otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteQuantizer {
    speed: i32,
}

impl Default for PaletteQuantizer {
    fn default() -> Self {
        Self {
            speed: DEFAULT_SPEED,
        }
    }
}

impl PaletteQuantizer {
    pub fn with_speed(speed: i32) -> Result<Self, QuantizeError> {
        if !(1..=30).contains(&speed) {
            return Err(QuantizeError::InvalidSpeed(speed));
        }
        Ok(Self { speed })
    }

    pub fn speed(&self) -> i32 {
        self.speed
    }

    /// Train a NeuQuant network of `max_colors` neurons on the frame.
    fn train(&self, rgb: &[u8], max_colors: usize) -> Palette {
        let pixels = rgb.len() / BYTES_PER_PIXEL;
        let rgba: Vec<u8> = rgb
            .chunks_exact(BYTES_PER_PIXEL)
            .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
            .collect();
        let speed = if pixels < MIN_SAMPLED_PIXELS {
            1
        } else {
            self.speed
        };
        let nq = NeuQuant::new(speed, max_colors, &rgba);
        nq.color_map_rgb()
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect()
    }
}

impl Quantizer for PaletteQuantizer {
    fn quantize_into(
        &self,
        rgb: &[u8],
        max_colors: usize,
        indices: &mut Vec<u8>,
    ) -> Result<Palette, QuantizeError> {
        if !(1..=MAX_PALETTE).contains(&max_colors) {
            return Err(QuantizeError::InvalidBudget(max_colors));
        }
        if rgb.len() % BYTES_PER_PIXEL != 0 {
            return Err(QuantizeError::PartialPixel(rgb.len()));
        }

        let colors = distinct_colors(rgb);
        let (palette, lookup): (Palette, HashMap<u32, u8>) = if colors.len() <= max_colors {
            let lookup = colors
                .iter()
                .enumerate()
                .map(|(slot, &key)| (key, slot as u8))
                .collect();
            (colors.iter().map(|&key| key_to_rgb(key)).collect(), lookup)
        } else {
            let palette = self.train(rgb, max_colors);
            let lookup = colors
                .iter()
                .map(|&key| (key, nearest(&palette, key_to_rgb(key))))
                .collect();
            (palette, lookup)
        };

        indices.clear();
        indices.extend(
            rgb.chunks_exact(BYTES_PER_PIXEL)
                .map(|px| lookup.get(&pixel_key(px)).copied().unwrap_or(0)),
        );
        Ok(palette)
    }
}

/// Distinct pixel keys in ascending order.
fn distinct_colors(rgb: &[u8]) -> Vec<u32> {
    let mut keys: Vec<u32> = rgb.chunks_exact(BYTES_PER_PIXEL).map(pixel_key).collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Index of the palette entry with the smallest squared RGB distance.
///
/// `NeuQuant::index_of` walks a green-sorted index and may stop before the
/// nearest entry, so the search here is exhaustive. It runs once per distinct
/// color, not per pixel.
fn nearest(palette: &[[u8; 3]], rgb: [u8; 3]) -> u8 {
    palette
        .iter()
        .enumerate()
        .min_by_key(|(_, entry)| distance(**entry, rgb))
        .map_or(0, |(slot, _)| slot as u8)
}

fn distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b)
        .map(|(&x, y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}
