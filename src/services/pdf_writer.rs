//! PDF assembly: one full-bleed page per uploaded image.
//!
//! Pages use a fixed A4 geometry with zero margins. Each image is placed
//! scaled-to-fit and centered on both axes, never cropped or distorted. JPEG
//! bytes whose decoded layout is plain 8-bit gray or RGB are embedded as-is
//! behind `DCTDecode`; everything else (PNG, exotic JPEG layouts) is embedded
//! as zlib-compressed pixels, with PNG alpha carried in a soft mask.

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{ColorType, DynamicImage, GenericImageView};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{ImageKind, UploadedImage};

/// Output page dimensions in PDF points.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    /// A4 portrait, the size the converter always emits.
    pub fn a4() -> Self {
        PageGeometry {
            width: 595.28,
            height: 841.89,
        }
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry::a4()
    }
}

/// Placement of an image within a page: scaled to fit entirely inside the
/// bounds, aspect ratio preserved, centered on both axes. Returns
/// `(x, y, width, height)` in page coordinates; any letterboxing is split
/// evenly across the constrained axis.
pub fn fit_rect(
    image_width: u32,
    image_height: u32,
    page_width: f32,
    page_height: f32,
) -> (f32, f32, f32, f32) {
    let scale = (page_width / image_width as f32).min(page_height / image_height as f32);
    let width = image_width as f32 * scale;
    let height = image_height as f32 * scale;
    (
        (page_width - width) / 2.0,
        (page_height - height) / 2.0,
        width,
        height,
    )
}

struct EncodedImage {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    /// Alpha channel as 8-bit gray samples, zlib-compressed.
    soft_mask: Option<Vec<u8>>,
}

/// Builds the output document page by page and saves it atomically from the
/// requester's point of view: nothing is handed to the transfer stage until
/// every page has been committed and the file write has succeeded.
pub struct DocumentWriter {
    geometry: PageGeometry,
}

impl DocumentWriter {
    pub fn new() -> Self {
        DocumentWriter {
            geometry: PageGeometry::default(),
        }
    }

    pub fn with_geometry(geometry: PageGeometry) -> Self {
        DocumentWriter { geometry }
    }

    /// Renders one page per image, in the given order, and writes the
    /// finished document to `out_path`. Returns the page count.
    pub fn write_document(&self, images: &[UploadedImage], out_path: &Path) -> AppResult<usize> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(images.len());
        for image in images {
            let page_id = self.append_page(&mut doc, pages_id, image)?;
            kids.push(page_id.into());
            debug!(image = %image.stored_name, page = kids.len(), "page committed");
        }

        let count = kids.len();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        doc.save(out_path)
            .map_err(|e| AppError::conversion(format!("failed to write document: {}", e)))?;
        Ok(count)
    }

    fn append_page(
        &self,
        doc: &mut Document,
        pages_id: ObjectId,
        image: &UploadedImage,
    ) -> AppResult<ObjectId> {
        let bytes = std::fs::read(&image.path).map_err(|e| {
            AppError::conversion(format!("failed to read {}: {}", image.stored_name, e))
        })?;
        let encoded = encode_image(&bytes, image.kind)?;

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => encoded.width as i64,
            "Height" => encoded.height as i64,
            "ColorSpace" => encoded.color_space,
            "BitsPerComponent" => 8,
            "Filter" => encoded.filter,
        };
        if let Some(alpha) = encoded.soft_mask {
            let mask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => encoded.width as i64,
                    "Height" => encoded.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                alpha,
            ));
            image_dict.set("SMask", mask_id);
        }
        let xobject_id = doc.add_object(Stream::new(image_dict, encoded.data));

        let (x, y, width, height) = fit_rect(
            encoded.width,
            encoded.height,
            self.geometry.width,
            self.geometry.height,
        );
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(width),
                        0.into(),
                        0.into(),
                        Object::Real(height),
                        Object::Real(x),
                        Object::Real(y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| AppError::conversion(format!("content encode failed: {}", e)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(self.geometry.width),
                Object::Real(self.geometry.height),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => xobject_id },
            },
            "Contents" => content_id,
        });
        Ok(page_id)
    }
}

impl Default for DocumentWriter {
    fn default() -> Self {
        DocumentWriter::new()
    }
}

fn encode_image(bytes: &[u8], kind: ImageKind) -> AppResult<EncodedImage> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| AppError::conversion(format!("image decode failed: {}", e)))?;
    match kind {
        ImageKind::Jpeg => encode_jpeg(bytes, &decoded),
        ImageKind::Png => encode_pixels(&decoded),
    }
}

/// JPEG pass-through keeps the original DCT bytes when the stream is plain
/// single- or three-component baseline data; anything else is re-embedded
/// from decoded pixels so the XObject always matches its declared color space.
fn encode_jpeg(raw: &[u8], decoded: &DynamicImage) -> AppResult<EncodedImage> {
    let (width, height) = decoded.dimensions();
    match (jpeg_component_count(raw), decoded.color()) {
        (Some(1), ColorType::L8) => Ok(EncodedImage {
            width,
            height,
            color_space: "DeviceGray",
            filter: "DCTDecode",
            data: raw.to_vec(),
            soft_mask: None,
        }),
        (Some(3), ColorType::Rgb8) => Ok(EncodedImage {
            width,
            height,
            color_space: "DeviceRGB",
            filter: "DCTDecode",
            data: raw.to_vec(),
            soft_mask: None,
        }),
        _ => encode_pixels(decoded),
    }
}

fn encode_pixels(decoded: &DynamicImage) -> AppResult<EncodedImage> {
    let (width, height) = decoded.dimensions();
    let color = decoded.color();
    let grayscale = matches!(
        color,
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16
    );

    if grayscale && color.has_alpha() {
        let pixels = decoded.to_luma_alpha8();
        let mut luma = Vec::with_capacity(pixels.len() / 2);
        let mut alpha = Vec::with_capacity(pixels.len() / 2);
        for px in pixels.pixels() {
            luma.push(px[0]);
            alpha.push(px[1]);
        }
        Ok(EncodedImage {
            width,
            height,
            color_space: "DeviceGray",
            filter: "FlateDecode",
            data: deflate(&luma)?,
            soft_mask: Some(deflate(&alpha)?),
        })
    } else if grayscale {
        Ok(EncodedImage {
            width,
            height,
            color_space: "DeviceGray",
            filter: "FlateDecode",
            data: deflate(&decoded.to_luma8().into_raw())?,
            soft_mask: None,
        })
    } else if color.has_alpha() {
        let pixels = decoded.to_rgba8();
        let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
        let mut alpha = Vec::with_capacity(pixels.len() / 4);
        for px in pixels.pixels() {
            rgb.extend_from_slice(&[px[0], px[1], px[2]]);
            alpha.push(px[3]);
        }
        Ok(EncodedImage {
            width,
            height,
            color_space: "DeviceRGB",
            filter: "FlateDecode",
            data: deflate(&rgb)?,
            soft_mask: Some(deflate(&alpha)?),
        })
    } else {
        Ok(EncodedImage {
            width,
            height,
            color_space: "DeviceRGB",
            filter: "FlateDecode",
            data: deflate(&decoded.to_rgb8().into_raw())?,
            soft_mask: None,
        })
    }
}

fn deflate(data: &[u8]) -> AppResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| AppError::conversion(format!("pixel stream compression failed: {}", e)))
}

/// Component count from the frame header of a JPEG stream. Returns `None`
/// when no SOF marker is found before the scan data.
fn jpeg_component_count(data: &[u8]) -> Option<u8> {
    let mut i = 2; // past SOI
    while i + 3 < data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];
        // fill bytes before a marker
        if marker == 0xFF {
            i += 1;
            continue;
        }
        // RST0-RST7 and TEM are standalone markers without a length word
        if (0xD0..=0xD9).contains(&marker) || marker == 0x01 {
            i += 2;
            continue;
        }
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            return data.get(i + 9).copied();
        }
        let len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        i += 2 + len;
    }
    None
}
