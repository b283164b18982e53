//! Framebuffer device access.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::{CaptureError, PixelFormat};
use crate::frame::{BYTES_PER_PIXEL, Dimensions};

/// Default framebuffer device.
pub const DEFAULT_DEVICE: &str = "/dev/fb0";

/// Where the kernel exposes framebuffer attributes.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/graphics";

/// Framebuffer geometry as reported by sysfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferGeometry {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including padding.
    pub stride: u32,
    pub bits_per_pixel: u32,
}

impl FramebufferGeometry {
    /// Read geometry from a sysfs directory such as `/sys/class/graphics/fb0`.
    pub fn from_sysfs(dir: &Path) -> Result<Self, CaptureError> {
        let size = read_attribute(dir, "virtual_size")?;
        let (width, height) = parse_size(&size)?;
        let bits_per_pixel = parse_number("bits_per_pixel", &read_attribute(dir, "bits_per_pixel")?)?;

        // Older kernels lack `stride`; fall back to a tightly packed row.
        let stride = match read_attribute(dir, "stride") {
            Ok(value) => parse_number("stride", &value)?,
            Err(_) => width * bits_per_pixel.div_ceil(8),
        };

        Ok(Self {
            width,
            height,
            stride,
            bits_per_pixel,
        })
    }
}

/// How frame bytes are pulled from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Seek to the start and `read` the whole frame each capture.
    #[default]
    Read,
    /// Map the device once and copy out of the mapping (requires the `mmap` feature).
    Mmap,
}

impl ReadMode {
    /// Whether this build can capture in this mode.
    pub fn is_available(self) -> bool {
        match self {
            ReadMode::Read => true,
            ReadMode::Mmap => cfg!(feature = "mmap"),
        }
    }
}

/// Source of raw device bytes.
enum Pixels {
    Read {
        device: File,
        /// Pre-allocated buffer for the raw device contents.
        raw: Vec<u8>,
    },
    #[cfg(feature = "mmap")]
    Mapped(memmap2::Mmap),
}

/// An open framebuffer device.
///
/// Usage:
/// ```ignore
/// let mut fb = Framebuffer::open("/dev/fb0")?;
/// let rgb = fb.capture()?;
/// write_png(path, fb.dimensions(), &rgb)?;
/// ```
pub struct Framebuffer {
    pixels: Pixels,
    path: PathBuf,
    geometry: FramebufferGeometry,
    format: PixelFormat,
    mode: ReadMode,
}

impl Framebuffer {
    /// Open a framebuffer device, reading its geometry from the default sysfs root.
    pub fn open<P: AsRef<Path>>(device: P) -> Result<Self, CaptureError> {
        Self::open_with_mode(device, ReadMode::Read)
    }

    /// Open a framebuffer device using the given read mode.
    pub fn open_with_mode<P: AsRef<Path>>(
        device: P,
        mode: ReadMode,
    ) -> Result<Self, CaptureError> {
        Self::open_with_sysfs(device, DEFAULT_SYSFS_ROOT, mode)
    }

    /// Open a framebuffer device with geometry read from `sysfs_root/<device name>`.
    pub fn open_with_sysfs<P: AsRef<Path>, S: AsRef<Path>>(
        device: P,
        sysfs_root: S,
        mode: ReadMode,
    ) -> Result<Self, CaptureError> {
        if !mode.is_available() {
            return Err(CaptureError::MmapUnavailable);
        }
        let path = device.as_ref().to_path_buf();
        let name = path
            .file_name()
            .ok_or_else(|| CaptureError::DeviceName(path.clone()))?;
        let geometry = FramebufferGeometry::from_sysfs(&sysfs_root.as_ref().join(name))?;
        let format = PixelFormat::from_bits_per_pixel(geometry.bits_per_pixel)?;

        let row_bytes = geometry.width as usize * format.bytes_per_pixel();
        if (geometry.stride as usize) < row_bytes {
            return Err(CaptureError::Stride {
                stride: geometry.stride,
                width: geometry.width,
            });
        }

        let device = File::open(&path).map_err(|source| CaptureError::Open {
            path: path.clone(),
            source,
        })?;
        let len = geometry.stride as usize * geometry.height as usize;
        let pixels = match mode {
            ReadMode::Read => Pixels::Read {
                device,
                raw: vec![0u8; len],
            },
            ReadMode::Mmap => map_device(&device, &path, len)?,
        };
        debug!(
            "Opened framebuffer '{}' ({:?}): {}x{}, {} bpp, stride {}",
            path.display(),
            mode,
            geometry.width,
            geometry.height,
            geometry.bits_per_pixel,
            geometry.stride
        );

        Ok(Self {
            pixels,
            path,
            geometry,
            format,
            mode,
        })
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.geometry.width, self.geometry.height)
    }

    pub fn geometry(&self) -> &FramebufferGeometry {
        &self.geometry
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_mode(&self) -> ReadMode {
        self.mode
    }

    /// Capture one frame into `dst`, which must hold exactly one RGB frame.
    pub fn capture_into(&mut self, dst: &mut [u8]) -> Result<(), CaptureError> {
        self.dimensions().check_frame_len(dst.len())?;

        let raw: &[u8] = match &mut self.pixels {
            Pixels::Read { device, raw } => {
                device.seek(SeekFrom::Start(0))?;
                device.read_exact(raw)?;
                &raw[..]
            }
            #[cfg(feature = "mmap")]
            Pixels::Mapped(map) => &map[..],
        };

        let stride = self.geometry.stride as usize;
        let row = self.geometry.width as usize * BYTES_PER_PIXEL;
        if row == 0 {
            return Ok(());
        }
        for (src, out) in raw.chunks_exact(stride).zip(dst.chunks_exact_mut(row)) {
            self.format.convert_row(src, out);
        }
        Ok(())
    }

    /// Capture one frame into a new buffer.
    pub fn capture(&mut self) -> Result<Vec<u8>, CaptureError> {
        let mut rgb = vec![0u8; self.dimensions().frame_size()];
        self.capture_into(&mut rgb)?;
        Ok(rgb)
    }
}

#[cfg(feature = "mmap")]
fn map_device(device: &File, path: &Path, len: usize) -> Result<Pixels, CaptureError> {
    let map_error = |source| CaptureError::Map {
        path: path.to_path_buf(),
        source,
    };
    // Device nodes report a zero length, so only regular files can be checked.
    let metadata = device.metadata().map_err(map_error)?;
    if metadata.is_file() && metadata.len() < len as u64 {
        return Err(map_error(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("{} bytes available, frame needs {}", metadata.len(), len),
        )));
    }
    // SAFETY: the mapping is read-only and its bytes are only copied out as
    // plain `u8`. Writes by the display while copying can tear a frame.
    let map = unsafe { memmap2::MmapOptions::new().len(len).map(device) }.map_err(map_error)?;
    Ok(Pixels::Mapped(map))
}

#[cfg(not(feature = "mmap"))]
fn map_device(_device: &File, _path: &Path, _len: usize) -> Result<Pixels, CaptureError> {
    Err(CaptureError::MmapUnavailable)
}

fn read_attribute(dir: &Path, name: &str) -> Result<String, CaptureError> {
    let path = dir.join(name);
    fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|source| CaptureError::Attribute { path, source })
}

fn parse_number(name: &'static str, value: &str) -> Result<u32, CaptureError> {
    value
        .trim()
        .parse()
        .map_err(|_| CaptureError::MalformedAttribute {
            name,
            value: value.to_string(),
        })
}

/// Parse `virtual_size`, formatted as `<width>,<height>`.
fn parse_size(value: &str) -> Result<(u32, u32), CaptureError> {
    let malformed = || CaptureError::MalformedAttribute {
        name: "virtual_size",
        value: value.to_string(),
    };
    let (w, h) = value.split_once(',').ok_or_else(malformed)?;
    let width = w.trim().parse().map_err(|_| malformed())?;
    let height = h.trim().parse().map_err(|_| malformed())?;
    Ok((width, height))
}
