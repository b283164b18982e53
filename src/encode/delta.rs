//! Inter-frame transparency.
//!
//! Pixels whose raw RGB value did not change since the previous frame are
//! replaced by a reserved transparent index. With "keep previous" disposal a
//! decoder leaves those pixels as they were, and the long runs of a single
//! index cost next to nothing after LZW.

use crate::frame::{BYTES_PER_PIXEL, pixel_key};

/// Reserved transparent index for a palette of `palette_len` colors.
///
/// The sentinel is the first slot past the palette, so it only exists while
/// the palette leaves room for it.
pub fn transparent_sentinel(palette_len: usize) -> Option<u8> {
    u8::try_from(palette_len).ok()
}

/// Mark every pixel whose raw RGB value equals the previous frame's with `sentinel`.
///
/// Equality is decided on the unquantized source, never on palette indices.
/// Returns the number of pixels marked.
pub fn mark_unchanged(current: &[u8], previous: &[u8], indices: &mut [u8], sentinel: u8) -> usize {
    debug_assert_eq!(current.len(), previous.len());
    debug_assert_eq!(current.len(), indices.len() * BYTES_PER_PIXEL);

    let mut marked = 0;
    let pixels = current
        .chunks_exact(BYTES_PER_PIXEL)
        .zip(previous.chunks_exact(BYTES_PER_PIXEL));
    for ((cur, prev), index) in pixels.zip(indices.iter_mut()) {
        if pixel_key(cur) == pixel_key(prev) {
            *index = sentinel;
            marked += 1;
        }
    }
    marked
}
