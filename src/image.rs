//! Raster image registration. Decoding happens once, at registration, so a
//! bad file fails the calling operation instead of poisoning serialization.
//! Gray and RGB JPEG bytes are kept as-is and embedded under DCTDecode;
//! everything else, four-component JPEGs included, is flattened to 8-bit
//! samples and deflated when the file is written.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Handle to a registered image. Cheap to copy; stable for the lifetime of
/// the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorSpace {
    DeviceGray,
    DeviceRgb,
}

impl ColorSpace {
    pub(crate) fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRgb => "DeviceRGB",
        }
    }
}

#[derive(Debug)]
pub(crate) enum PixelData {
    /// Original JPEG file, passed through untouched under DCTDecode.
    Jpeg(Vec<u8>),
    /// Raw 8-bit samples, row-major, deflated at write time.
    Raw(Vec<u8>),
}

#[derive(Debug)]
pub struct ImageRecord {
    pub width: u32,
    pub height: u32,
    pub(crate) color: ColorSpace,
    pub(crate) pixels: PixelData,
    /// 8-bit coverage samples for an SMask, when the source had an alpha
    /// channel that is not fully opaque.
    pub(crate) alpha: Option<Vec<u8>>,
}

/// Document-level image store, deduplicated by content hash so the same
/// file placed on many pages is embedded once.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: Vec<ImageRecord>,
    by_sha: HashMap<[u8; 32], usize>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, data: &[u8]) -> Result<ImageId> {
        let sha: [u8; 32] = Sha256::digest(data).into();
        if let Some(&index) = self.by_sha.get(&sha) {
            return Ok(ImageId(index));
        }

        let format =
            image::guess_format(data).map_err(|e| Error::ImageFormat(e.to_string()))?;
        let decoded =
            image::load_from_memory(data).map_err(|e| Error::ImageFormat(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(Error::ImageFormat("image has a zero dimension".to_string()));
        }

        let record = if format == image::ImageFormat::Jpeg
            && !decoded.color().has_alpha()
            && jpeg_components(data).is_some_and(|n| n <= 3)
        {
            let color = if decoded.color().channel_count() == 1 {
                ColorSpace::DeviceGray
            } else {
                ColorSpace::DeviceRgb
            };
            ImageRecord {
                width,
                height,
                color,
                pixels: PixelData::Jpeg(data.to_vec()),
                alpha: None,
            }
        } else if decoded.color().has_alpha() {
            let rgba = decoded.to_rgba8();
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            let mut opaque = true;
            for px in rgba.pixels() {
                rgb.extend_from_slice(&px.0[..3]);
                alpha.push(px.0[3]);
                opaque &= px.0[3] == 0xFF;
            }
            ImageRecord {
                width,
                height,
                color: ColorSpace::DeviceRgb,
                pixels: PixelData::Raw(rgb),
                alpha: (!opaque).then_some(alpha),
            }
        } else if decoded.color().channel_count() == 1 {
            ImageRecord {
                width,
                height,
                color: ColorSpace::DeviceGray,
                pixels: PixelData::Raw(decoded.to_luma8().into_raw()),
                alpha: None,
            }
        } else {
            ImageRecord {
                width,
                height,
                color: ColorSpace::DeviceRgb,
                pixels: PixelData::Raw(decoded.to_rgb8().into_raw()),
                alpha: None,
            }
        };

        let index = self.images.len();
        log::debug!("registered image #{index}: {width}x{height}");
        self.images.push(record);
        self.by_sha.insert(sha, index);
        Ok(ImageId(index))
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageRecord> {
        self.images.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ImageId, &ImageRecord)> {
        self.images.iter().enumerate().map(|(i, r)| (ImageId(i), r))
    }
}

/// Component count from the first SOF segment. CMYK and YCCK files report
/// four; those are decoded and re-embedded as raw samples, because the
/// decoder hands back RGB and a DCTDecode passthrough would pair the
/// original four-component scan data with a three-component color space.
fn jpeg_components(data: &[u8]) -> Option<u8> {
    let mut i = 2;
    while i + 3 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        // SOI, TEM, and restart markers carry no length field.
        if marker == 0xD8 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            i += 2;
            continue;
        }
        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        match marker {
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                // precision (1), height (2), width (2), then the count.
                return data.get(i + 9).copied();
            }
            // Scan data reached without a frame header.
            0xDA => return None,
            _ => i += 2 + length,
        }
    }
    None
}
