//! FITS file I/O for image tiles and multi-band parent files
//!
//! Tiles are single 2-D images. Parent files carry one image HDU per band,
//! identified by `EXTNAME`. The `f32` array readers and writers flip rows so
//! that arrays follow the ndarray convention (FITS origin is bottom-left).
//! [`ImageHdu`] instead keeps an HDU as stored: native pixel type, FITS row
//! order and its header cards, so it can be copied between files unchanged.

use crate::image_size::ImageSize;
use fitsio::compat::fitsfile::FitsFile;
use fitsio::compat::hdu::{FitsHdu, HduInfo};
use fitsio::compat::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use fitsio::value::Value;
use log::debug;
use ndarray::Array2;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during FITS file operations
#[derive(Error, Debug)]
pub enum FitsError {
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::compat::errors::Error),
    #[error("HDU not found: {0}")]
    HduNotFound(String),
    #[error("Invalid data type in HDU: {0}")]
    InvalidDataType(String),
}

/// Keywords describing HDU layout; they are regenerated on write
const STRUCTURAL_KEYWORDS: [&str; 8] = [
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "EXTNAME",
];

fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|axis| axis.chars().all(|c| c.is_ascii_digit()))
}

/// One valued header card
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCard {
    pub keyword: String,
    pub value: Value,
}

/// Pixel samples in their stored type, in FITS order (first row is the bottom).
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    U8(Vec<u8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Pixels {
    fn read(fptr: &FitsFile, hdu: &FitsHdu, image_type: ImageType) -> Result<Self, FitsError> {
        Ok(match image_type {
            ImageType::UnsignedByte => Pixels::U8(u8::read_image(fptr, hdu)?),
            ImageType::Short => Pixels::I16(i16::read_image(fptr, hdu)?),
            ImageType::Long => Pixels::I32(i32::read_image(fptr, hdu)?),
            ImageType::LongLong => Pixels::I64(i64::read_image(fptr, hdu)?),
            ImageType::Float => Pixels::F32(f32::read_image(fptr, hdu)?),
            ImageType::Double => Pixels::F64(f64::read_image(fptr, hdu)?),
        })
    }

    fn write(&self, fptr: &mut FitsFile, hdu: &FitsHdu) -> Result<(), FitsError> {
        match self {
            Pixels::U8(v) => u8::write_image(fptr, hdu, v)?,
            Pixels::I16(v) => i16::write_image(fptr, hdu, v)?,
            Pixels::I32(v) => i32::write_image(fptr, hdu, v)?,
            Pixels::I64(v) => i64::write_image(fptr, hdu, v)?,
            Pixels::F32(v) => f32::write_image(fptr, hdu, v)?,
            Pixels::F64(v) => f64::write_image(fptr, hdu, v)?,
        }
        Ok(())
    }

    pub fn image_type(&self) -> ImageType {
        match self {
            Pixels::U8(_) => ImageType::UnsignedByte,
            Pixels::I16(_) => ImageType::Short,
            Pixels::I32(_) => ImageType::Long,
            Pixels::I64(_) => ImageType::LongLong,
            Pixels::F32(_) => ImageType::Float,
            Pixels::F64(_) => ImageType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Pixels::U8(v) => v.len(),
            Pixels::I16(v) => v.len(),
            Pixels::I32(v) => v.len(),
            Pixels::I64(v) => v.len(),
            Pixels::F32(v) => v.len(),
            Pixels::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A 2-D image HDU as stored on disk.
///
/// `cards` holds every valued, non-structural header card. Commentary
/// cards (COMMENT, HISTORY) are not kept.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageHdu {
    pub extname: String,
    pub size: ImageSize,
    pub pixels: Pixels,
    pub cards: Vec<HeaderCard>,
}

impl ImageHdu {
    /// Build an `f32` HDU from an ndarray image (rows flipped into FITS order)
    pub fn from_array(extname: &str, image: &Array2<f32>) -> Self {
        let flipped = image.slice(ndarray::s![..;-1, ..]);
        Self {
            extname: extname.to_string(),
            size: ImageSize::of_array(image),
            pixels: Pixels::F32(flipped.iter().copied().collect()),
            cards: Vec::new(),
        }
    }

    /// Add or replace a header card
    pub fn with_card(mut self, keyword: &str, value: Value) -> Self {
        self.set_card(keyword, value);
        self
    }

    pub fn set_card(&mut self, keyword: &str, value: Value) {
        match self.cards.iter_mut().find(|c| c.keyword == keyword) {
            Some(card) => card.value = value,
            None => self.cards.push(HeaderCard {
                keyword: keyword.to_string(),
                value,
            }),
        }
    }

    pub fn card(&self, keyword: &str) -> Option<&Value> {
        self.cards
            .iter()
            .find(|c| c.keyword == keyword)
            .map(|c| &c.value)
    }
}

/// Name used for HDUs that carry no EXTNAME
fn default_hdu_name(hdu_idx: usize) -> String {
    format!("HDU_{hdu_idx}")
}

fn hdu_shape(fptr: &FitsFile, hdu: &FitsHdu) -> Option<ImageSize> {
    let naxis = hdu.read_key::<i64>(fptr, "NAXIS").unwrap_or(0);
    if naxis != 2 {
        return None;
    }
    let naxis1 = hdu.read_key::<i64>(fptr, "NAXIS1").unwrap_or(0);
    let naxis2 = hdu.read_key::<i64>(fptr, "NAXIS2").unwrap_or(0);
    if naxis1 <= 0 || naxis2 <= 0 {
        return None;
    }
    Some(ImageSize::from_width_height(naxis1 as usize, naxis2 as usize))
}

fn hdu_name(fptr: &FitsFile, hdu: &FitsHdu, hdu_idx: usize) -> String {
    match hdu.read_key::<String>(fptr, "EXTNAME") {
        Ok(name) => name.trim().to_string(),
        Err(_) => default_hdu_name(hdu_idx),
    }
}

fn read_hdu_array(
    fptr: &FitsFile,
    hdu: &FitsHdu,
    size: ImageSize,
    hdu_name: &str,
) -> Result<Array2<f32>, FitsError> {
    let image_data = f64::read_image(fptr, hdu)?;
    let fits_array = Array2::from_shape_vec((size.height, size.width), image_data).map_err(|_| {
        FitsError::InvalidDataType(format!("Cannot reshape image data for HDU '{hdu_name}'"))
    })?;

    // Flip vertically to match ndarray convention (FITS origin is bottom-left)
    let flipped = fits_array.slice(ndarray::s![..;-1, ..]);
    Ok(flipped.mapv(|v| v as f32))
}

fn read_header_cards(fptr: &FitsFile, hdu_idx: usize) -> Result<Vec<HeaderCard>, FitsError> {
    let parsed = fptr.parsed()?;
    let core_hdu = parsed
        .get(hdu_idx)
        .ok_or_else(|| FitsError::HduNotFound(default_hdu_name(hdu_idx)))?;
    Ok(core_hdu
        .cards
        .iter()
        .filter(|card| !card.is_end() && !is_structural(card.keyword_str()))
        .filter_map(|card| {
            card.value.clone().map(|value| HeaderCard {
                keyword: card.keyword_str().to_string(),
                value,
            })
        })
        .collect())
}

fn no_image_error(path: &Path) -> FitsError {
    FitsError::HduNotFound(format!("no 2-D image in {}", path.display()))
}

/// Dimensions of the first 2-D image HDU, read from the header only.
pub fn read_image_dimensions<P: AsRef<Path>>(path: P) -> Result<ImageSize, FitsError> {
    let fptr = FitsFile::open(&path)?;

    for hdu in fptr.iter()? {
        if let Some(size) = hdu_shape(&fptr, &hdu) {
            return Ok(size);
        }
    }

    Err(no_image_error(path.as_ref()))
}

/// Read the first 2-D image HDU of a file as `f32` samples.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Array2<f32>, FitsError> {
    let fptr = FitsFile::open(&path)?;

    for (hdu_idx, hdu) in fptr.iter()?.into_iter().enumerate() {
        if let Some(size) = hdu_shape(&fptr, &hdu) {
            return read_hdu_array(&fptr, &hdu, size, &default_hdu_name(hdu_idx));
        }
    }

    Err(no_image_error(path.as_ref()))
}

/// Read every 2-D image HDU as stored, keyed by EXTNAME (or `HDU_<n>`).
///
/// A file that does not parse as FITS, or holds no 2-D image, is an error.
pub fn read_image_hdus<P: AsRef<Path>>(path: P) -> Result<HashMap<String, ImageHdu>, FitsError> {
    let fptr = FitsFile::open(&path)?;
    let mut hdus = HashMap::new();

    for (hdu_idx, hdu) in fptr.iter()?.into_iter().enumerate() {
        let Some(size) = hdu_shape(&fptr, &hdu) else {
            continue;
        };
        let extname = hdu_name(&fptr, &hdu, hdu_idx);
        let image_type = match hdu.info(&fptr)? {
            HduInfo::ImageInfo { image_type, .. } => image_type,
            _ => {
                return Err(FitsError::InvalidDataType(format!(
                    "HDU '{extname}' has image axes but is not an image"
                )))
            }
        };
        let pixels = Pixels::read(&fptr, &hdu, image_type)?;
        if pixels.len() != size.pixel_count() {
            return Err(FitsError::InvalidDataType(format!(
                "HDU '{extname}' holds {} samples, expected {size}",
                pixels.len()
            )));
        }
        let cards = read_header_cards(&fptr, hdu_idx)?;
        hdus.insert(
            extname.clone(),
            ImageHdu {
                extname,
                size,
                pixels,
                cards,
            },
        );
    }

    if hdus.is_empty() {
        return Err(no_image_error(path.as_ref()));
    }
    Ok(hdus)
}

/// Write image HDUs as stored into a new FITS file, overwriting any
/// existing one.
pub fn write_image_hdus<P: AsRef<Path>>(path: P, hdus: &[ImageHdu]) -> Result<(), FitsError> {
    let mut fptr = FitsFile::create(&path).overwrite().open()?;
    for image in hdus {
        let description = ImageDescription {
            data_type: image.pixels.image_type(),
            dimensions: vec![image.size.width, image.size.height],
        };
        let hdu = fptr.create_image(&image.extname, &description)?;
        image.pixels.write(&mut fptr, &hdu)?;
        for card in &image.cards {
            write_card(&mut fptr, &hdu, card)?;
        }
    }
    fptr.flush()?;
    Ok(())
}

fn write_card(fptr: &mut FitsFile, hdu: &FitsHdu, card: &HeaderCard) -> Result<(), FitsError> {
    match &card.value {
        Value::Logical(b) => hdu.write_key(fptr, &card.keyword, b)?,
        Value::Integer(i) => hdu.write_key(fptr, &card.keyword, i)?,
        Value::Float(f) => hdu.write_key(fptr, &card.keyword, f)?,
        Value::String(s) => hdu.write_key(fptr, &card.keyword, s)?,
        other => debug!("Not copying card {} = {other:?}", card.keyword),
    }
    Ok(())
}

/// Write a single `f32` image as a new FITS file, overwriting any existing
/// file.
///
/// `extname` is stored as EXTNAME; `keys` are written as additional string
/// header cards.
pub fn write_image<P: AsRef<Path>>(
    path: P,
    extname: &str,
    image: &Array2<f32>,
    keys: &[(&str, &str)],
) -> Result<(), FitsError> {
    let mut hdu = ImageHdu::from_array(extname, image);
    for (key, value) in keys {
        hdu.set_card(key, Value::String(value.to_string()));
    }
    write_image_hdus(path, &[hdu])
}

/// Write several named `f32` images into one FITS file (one HDU each).
pub fn write_named_images<P: AsRef<Path>>(
    path: P,
    images: &[(String, Array2<f32>)],
) -> Result<(), FitsError> {
    let hdus: Vec<ImageHdu> = images
        .iter()
        .map(|(name, image)| ImageHdu::from_array(name, image))
        .collect();
    write_image_hdus(path, &hdus)
}
