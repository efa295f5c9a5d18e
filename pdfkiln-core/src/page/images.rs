use super::{add_resource, append_content, Page};
use crate::error::{PdfError, Result};
use crate::geometry::Rect;
use crate::objects;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, GenericImageView, ImageBuffer, Luma, Rgb};
use lopdf::{dictionary, Document as LoDocument, Object, Stream};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};

/// An image XObject in the page resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Resource name used by the content stream
    pub name: String,
    pub xref: Option<u32>,
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: String,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// `jpeg`, `jp2` or `png`
    pub extension: String,
    pub data: Vec<u8>,
}

impl<'a> Page<'a> {
    pub fn images(&self) -> Result<Vec<ImageInfo>> {
        let doc = self.lo()?;
        let Some(xobjects) = self.xobjects(doc)? else {
            return Ok(Vec::new());
        };
        let mut images = Vec::new();
        for (name, value) in xobjects.iter() {
            let Some(stream) = objects::resolve(doc, value).ok().and_then(|o| o.as_stream().ok()) else {
                continue;
            };
            let dict = &stream.dict;
            if objects::dict_name(dict, b"Subtype") != Some("Image") {
                continue;
            }
            let int = |key: &[u8]| objects::resolve_key(doc, dict, key).and_then(|v| v.as_i64().ok());
            images.push(ImageInfo {
                name: String::from_utf8_lossy(name).into_owned(),
                xref: value.as_reference().ok().map(|id| id.0),
                width: int(b"Width").unwrap_or(0) as u32,
                height: int(b"Height").unwrap_or(0) as u32,
                bits_per_component: int(b"BitsPerComponent").unwrap_or(8) as u8,
                color_space: color_space_name(doc, dict),
                filter: filter_name(doc, dict),
            });
        }
        Ok(images)
    }

    /// Image data in a standalone file format. JPEG and JPEG 2000 streams
    /// are returned as stored; 8-bit gray and RGB samples are encoded as PNG.
    pub fn extract_image(&self, name: &str) -> Result<ExtractedImage> {
        let doc = self.lo()?;
        let stream = self
            .xobjects(doc)?
            .and_then(|x| objects::resolve_key(doc, x, name.as_bytes()))
            .and_then(|o| o.as_stream().ok())
            .ok_or_else(|| PdfError::InvalidImage(format!("no image named {name} on this page")))?;
        let info = self
            .images()?
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| PdfError::InvalidImage(format!("{name} is not an image")))?;

        let (extension, data) = match info.filter.as_deref() {
            Some("DCTDecode") => ("jpeg", stream.content.clone()),
            Some("JPXDecode") => ("jp2", stream.content.clone()),
            _ => {
                let samples = decode_samples(doc, stream, &info.name)?;
                ("png", encode_png(&info, samples)?)
            }
        };
        Ok(ExtractedImage {
            name: info.name,
            width: info.width,
            height: info.height,
            extension: extension.to_string(),
            data,
        })
    }

    /// Place an image so it fills `rect`. JPEG data is embedded as is;
    /// other formats are decoded and stored as Flate-compressed RGB with a
    /// soft mask when they carry transparency. Returns the resource name.
    pub fn insert_image(&mut self, rect: Rect, bytes: &[u8]) -> Result<String> {
        if rect.is_empty() {
            return Err(PdfError::InvalidOptions("image rectangle is empty".to_string()));
        }
        let format = image::guess_format(bytes)?;
        let decoded = image::load_from_memory_with_format(bytes, format)?;
        let id = self.id;
        let doc = self.lo_mut()?;

        let xobject = if format == image::ImageFormat::Jpeg {
            let color_space = if decoded.color().channel_count() <= 2 {
                "DeviceGray"
            } else {
                "DeviceRGB"
            };
            let (width, height) = decoded.dimensions();
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes.to_vec(),
            );
                doc.add_object(stream)
        } else {
            flate_image(doc, &decoded)?
        };

        let name = add_resource(doc, id, "XObject", "Im", Object::Reference(xobject))?;
        let ops = format!(
            "q\n{} 0 0 {} {} {} cm\n/{name} Do\nQ",
            rect.width(),
            rect.height(),
            rect.x0,
            rect.y0
        );
        append_content(doc, id, ops.into_bytes())?;
        Ok(name)
    }

    fn xobjects<'d>(&self, doc: &'d LoDocument) -> Result<Option<&'d lopdf::Dictionary>> {
        let resources = objects::page_dict(doc, self.id)?;
        let resources = match objects::resolve_key(doc, resources, b"Resources") {
            Some(Object::Dictionary(dict)) => dict,
            _ => return Ok(None),
        };
        Ok(objects::resolve_key(doc, resources, b"XObject").and_then(|x| x.as_dict().ok()))
    }
}

fn flate_image(doc: &mut LoDocument, image: &DynamicImage) -> Result<lopdf::ObjectId> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    if alpha.iter().any(|&a| a < 255) {
        let mask = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        ));
        dict.set("SMask", mask);
    }
    Ok(doc.add_object(Stream::new(dict, deflate(&rgb)?)))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Raw samples of an image stream. Only Flate without a predictor is
/// understood.
fn decode_samples(doc: &LoDocument, stream: &Stream, name: &str) -> Result<Vec<u8>> {
    let filters: Vec<String> = match objects::resolve_key(doc, &stream.dict, b"Filter") {
        None => Vec::new(),
        Some(Object::Name(filter)) => vec![String::from_utf8_lossy(filter).into_owned()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(objects::name_of)
            .map(str::to_string)
            .collect(),
        Some(_) => {
            return Err(PdfError::InvalidImage(format!("{name}: malformed /Filter")));
        }
    };
    let predictor = objects::resolve_key(doc, &stream.dict, b"DecodeParms")
        .and_then(|parms| parms.as_dict().ok())
        .and_then(|parms| parms.get(b"Predictor").ok())
        .and_then(|p| p.as_i64().ok())
        .unwrap_or(1);

    let mut samples = stream.content.clone();
    for filter in filters {
        match filter.as_str() {
            "FlateDecode" | "Fl" if predictor <= 1 => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(samples.as_slice())
                    .read_to_end(&mut inflated)
                    .map_err(|e| PdfError::InvalidImage(format!("{name}: {e}")))?;
                samples = inflated;
            }
            other => {
                return Err(PdfError::InvalidImage(format!(
                    "{name}: filter {other} not supported"
                )))
            }
        }
    }
    Ok(samples)
}

fn color_space_name(doc: &LoDocument, dict: &lopdf::Dictionary) -> String {
    match objects::resolve_key(doc, dict, b"ColorSpace") {
        Some(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
        Some(Object::Array(items)) => items
            .first()
            .and_then(objects::name_of)
            .unwrap_or("Unknown")
            .to_string(),
        _ => "Unknown".to_string(),
    }
}

fn filter_name(doc: &LoDocument, dict: &lopdf::Dictionary) -> Option<String> {
    match objects::resolve_key(doc, dict, b"Filter")? {
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        // The last filter decides the stored format
        Object::Array(items) => items.last().and_then(objects::name_of).map(str::to_string),
        _ => None,
    }
}

fn encode_png(info: &ImageInfo, samples: Vec<u8>) -> Result<Vec<u8>> {
    if info.bits_per_component != 8 {
        return Err(PdfError::InvalidImage(format!(
            "{} bits per component not supported",
            info.bits_per_component
        )));
    }
    let mismatch = || PdfError::InvalidImage(format!("{}: sample data does not match size", info.name));
    let image = match info.color_space.as_str() {
        "DeviceRGB" => ImageBuffer::<Rgb<u8>, _>::from_raw(info.width, info.height, samples)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(mismatch)?,
        "DeviceGray" => ImageBuffer::<Luma<u8>, _>::from_raw(info.width, info.height, samples)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(mismatch)?,
        other => {
            return Err(PdfError::InvalidImage(format!(
                "colour space {other} not supported"
            )))
        }
    };
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}
