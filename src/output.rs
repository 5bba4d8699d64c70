//! Uncompressed 32-bit TGA output

use bytemuck::{Pod, Zeroable};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::config::Resolution;

/// Uncompressed true-color image
const IMAGE_TYPE_TRUE_COLOR: u8 = 2;
/// 8 alpha bits, top-left origin
const DESCRIPTOR_TOP_LEFT_ALPHA8: u8 = 0x08 | 0x20;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("{width}x{height} exceeds the TGA size limit")]
    TooLarge { width: u32, height: u32 },

    #[error("Pixel buffer holds {actual} pixels, expected {expected}")]
    PixelCount { expected: usize, actual: usize },
}

/// The 18-byte TGA file header, multi-byte fields little-endian
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct TgaHeader {
    pub id_length: u8,
    pub color_map_type: u8,
    pub image_type: u8,
    pub color_map_origin: [u8; 2],
    pub color_map_length: [u8; 2],
    pub color_map_depth: u8,
    pub x_origin: [u8; 2],
    pub y_origin: [u8; 2],
    pub width: [u8; 2],
    pub height: [u8; 2],
    pub bits_per_pixel: u8,
    pub descriptor: u8,
}

const _: () = assert!(std::mem::size_of::<TgaHeader>() == 18);

impl TgaHeader {
    pub fn new(resolution: Resolution) -> Result<Self, OutputError> {
        let too_large = || OutputError::TooLarge {
            width: resolution.width(),
            height: resolution.height(),
        };
        let width = u16::try_from(resolution.width()).map_err(|_| too_large())?;
        let height = u16::try_from(resolution.height()).map_err(|_| too_large())?;
        Ok(Self {
            image_type: IMAGE_TYPE_TRUE_COLOR,
            width: width.to_le_bytes(),
            height: height.to_le_bytes(),
            bits_per_pixel: 32,
            descriptor: DESCRIPTOR_TOP_LEFT_ALPHA8,
            ..Self::zeroed()
        })
    }
}

/// Write a TGA image of ARGB32 pixels (stored as BGRA bytes) to `writer`
pub fn write_tga<W: Write>(writer: &mut W, resolution: Resolution, pixels: &[u32]) -> Result<(), OutputError> {
    if pixels.len() != resolution.pixel_count() {
        return Err(OutputError::PixelCount {
            expected: resolution.pixel_count(),
            actual: pixels.len(),
        });
    }
    let header = TgaHeader::new(resolution)?;
    writer.write_all(bytemuck::bytes_of(&header))?;
    for pixel in pixels {
        writer.write_all(&pixel.to_le_bytes())?;
    }
    Ok(())
}

/// Save a frame to `path`
pub fn save_tga<P: AsRef<Path>>(path: P, resolution: Resolution, pixels: &[u32]) -> Result<(), OutputError> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_tga(&mut writer, resolution, pixels)?;
    writer.flush()?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        let header = TgaHeader::new(Resolution::new(512, 260).unwrap()).unwrap();
        let bytes = bytemuck::bytes_of(&header);
        assert_eq!(
            bytes,
            &[0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x02, 0x04, 0x01, 32, 0x28]
        );
    }

    #[test]
    fn test_pixels_follow_header_as_bgra() {
        let resolution = Resolution::new(4, 4).unwrap();
        let mut pixels = vec![0u32; 16];
        pixels[0] = 0xff11_2233;
        let mut out = Vec::new();
        write_tga(&mut out, resolution, &pixels).unwrap();

        assert_eq!(out.len(), 18 + 16 * 4);
        assert_eq!(&out[18..22], &[0x33, 0x22, 0x11, 0xff]);
    }

    #[test]
    fn test_rejects_oversize() {
        let resolution = Resolution::new(65_540, 4).unwrap();
        assert!(matches!(
            TgaHeader::new(resolution),
            Err(OutputError::TooLarge { width: 65_540, .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_pixel_count() {
        let mut out = Vec::new();
        let result = write_tga(&mut out, Resolution::new(4, 4).unwrap(), &[0; 15]);
        assert!(matches!(result, Err(OutputError::PixelCount { expected: 16, actual: 15 })));
        assert!(out.is_empty());
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.tga");
        save_tga(&path, Resolution::new(8, 4).unwrap(), &[0xff00_00ff; 32]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 18 + 32 * 4);
        assert_eq!(bytes[12..16], [8, 0, 4, 0]);
    }
}
