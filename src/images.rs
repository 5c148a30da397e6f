//! Image preprocessing: validation, downscaling, base64 encoding and
//! token-cost estimation for uploaded images.
//!
//! Every [`ImageAsset`] this module returns already satisfies the payload
//! invariant: its format is in the supported set and its encoded size is
//! under the provider limit. The request builder re-checks the size but
//! never transforms images itself.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::{debug, info};

use crate::config::ProviderConfig;
use crate::error::{Error, Result};

/// Images accepted per request
pub const MAX_IMAGES: usize = 5;
/// Longest side allowed before downscaling
pub const DEFAULT_MAX_DIMENSION: u32 = 1568;
/// Raw upload ceiling
pub const DEFAULT_MAX_RAW_BYTES: usize = 20 * 1024 * 1024;
/// Ceiling on the base64 payload after resizing
pub const DEFAULT_MAX_ENCODED_BYTES: usize = 5 * 1024 * 1024;
/// Provider-documented approximation: one token per 750 pixels
pub const PIXELS_PER_TOKEN: u64 = 750;

const MIB: f64 = 1024.0 * 1024.0;

/// Supported image formats. GIFs are flattened to their first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind
{   Png
  , Jpeg
  , Webp
  , Gif
}

impl ImageKind
{   fn from_format(format: ImageFormat) -> Option<Self>
    {   match format
        {   ImageFormat::Png => Some(ImageKind::Png)
          , ImageFormat::Jpeg => Some(ImageKind::Jpeg)
          , ImageFormat::WebP => Some(ImageKind::Webp)
          , ImageFormat::Gif => Some(ImageKind::Gif)
          , _ => None
        }
    }

    fn format(self) -> ImageFormat
    {   match self
        {   ImageKind::Png => ImageFormat::Png
          , ImageKind::Jpeg => ImageFormat::Jpeg
          , ImageKind::Webp => ImageFormat::WebP
          , ImageKind::Gif => ImageFormat::Gif
        }
    }

    pub fn media_type(self) -> &'static str
    {   match self
        {   ImageKind::Png => "image/png"
          , ImageKind::Jpeg => "image/jpeg"
          , ImageKind::Webp => "image/webp"
          , ImageKind::Gif => "image/gif"
        }
    }
}

/// Size and dimension ceilings applied by [`prepare`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits
{   pub max_raw_bytes: usize
  , pub max_encoded_bytes: usize
  , pub max_dimension: u32
}

impl Default for ImageLimits
{   fn default() -> Self
    {   ImageLimits
        {   max_raw_bytes: DEFAULT_MAX_RAW_BYTES
          , max_encoded_bytes: DEFAULT_MAX_ENCODED_BYTES
          , max_dimension: DEFAULT_MAX_DIMENSION
        }
    }
}

impl ImageLimits
{   /// Defaults narrowed by the provider's own payload ceiling
    pub fn for_provider(provider: &ProviderConfig) -> Self
    {   let mut limits = Self::default();
        if let Some(max) = provider.max_image_bytes
        {   limits.max_encoded_bytes = max;
        }
        limits
    }
}

/// One uploaded file, as handed over by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput
{   pub filename: String
  , pub bytes: Vec<u8>
}

impl ImageInput
{   pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self
    {   ImageInput
        {   filename: filename.into()
          , bytes
        }
    }
}

/// A validated, possibly resized image ready for a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset
{   pub name: String
  , /// Bytes that were encoded (resized or original)
    pub bytes: Vec<u8>
  , pub kind: ImageKind
  , pub width: u32
  , pub height: u32
  , /// Base64 without a data-URI prefix
    pub base64: String
  , pub estimated_tokens: u64
  , pub resized: bool
}

impl ImageAsset
{   pub fn media_type(&self) -> &'static str
    {   self.kind.media_type()
    }

    /// Size of the payload that ends up in the request body
    pub fn encoded_len(&self) -> usize
    {   self.base64.len()
    }

    /// Short human-readable summary for logs, e.g. `plan.png (12.3 KB, image/png)`
    pub fn describe(&self) -> String
    {   format!(
          "{} ({:.1} KB, {})",
          self.name,
          self.bytes.len() as f64 / 1024.0,
          self.media_type()
        )
    }
}

/// Validate, downscale and encode one uploaded image
pub fn prepare(raw: &[u8], filename: &str, limits: &ImageLimits)
  -> Result<ImageAsset>
{   if raw.is_empty()
    {   return Err(Error::validation(format!("{}: empty file", filename)));
    }
    if raw.len() > limits.max_raw_bytes
    {   return Err(Error::validation(format!(
          "{}: image too large: {:.1} MB (max {:.1} MB)",
          filename,
          raw.len() as f64 / MIB,
          limits.max_raw_bytes as f64 / MIB
        )));
    }

    let format = image::guess_format(raw)
      .map_err(|_| Error::validation(format!("{}: not a recognised image", filename)))?;
    let kind = ImageKind::from_format(format)
      .ok_or_else(|| Error::validation(format!(
        "{}: unsupported format {:?} (expected PNG, JPEG, WEBP or GIF)",
        filename,
        format
      )))?;

    let decoded = image::load_from_memory_with_format(raw, format)
      .map_err(|e| Error::validation(format!("{}: cannot decode image: {}", filename, e)))?;
    let (width, height) = (decoded.width(), decoded.height());

    let target = fit_within(width, height, limits.max_dimension);
    let (bytes, width, height) = match target
    {   Some((w, h)) => {
          debug!("Resizing {} from {}x{} to {}x{}", filename, width, height, w, h);
          let resized = decoded.resize_exact(w, h, FilterType::Lanczos3);
          (encode(&resized, kind, filename)?, w, h)
        }
        // GIFs lose any animation even when no resize is needed
      , None if kind == ImageKind::Gif => (encode(&decoded, kind, filename)?, width, height)
      , None => (raw.to_vec(), width, height)
    };

    let base64 = BASE64.encode(&bytes);
    if base64.len() > limits.max_encoded_bytes
    {   return Err(Error::validation(format!(
          "{}: encoded image is {:.1} MB, provider limit is {:.1} MB",
          filename,
          base64.len() as f64 / MIB,
          limits.max_encoded_bytes as f64 / MIB
        )));
    }

    let asset = ImageAsset
    {   name: filename.to_string()
      , estimated_tokens: estimate_tokens(width, height)
      , resized: target.is_some()
      , bytes
      , kind
      , width
      , height
      , base64
    };
    info!("Prepared image {}", asset.describe());
    Ok(asset)
}

/// Prepare every upload in order; the first invalid one fails the batch
pub fn prepare_batch(inputs: &[ImageInput], limits: &ImageLimits)
  -> Result<Vec<ImageAsset>>
{   if inputs.len() > MAX_IMAGES
    {   return Err(Error::validation(format!(
          "{} images supplied, at most {} are accepted",
          inputs.len(),
          MAX_IMAGES
        )));
    }
    inputs.iter()
      .map(|input| prepare(&input.bytes, &input.filename, limits))
      .collect()
}

/// Target size whose longer side equals `max`, or `None` if the image
/// already fits. Never upscales.
pub fn fit_within(width: u32, height: u32, max: u32) -> Option<(u32, u32)>
{   if width <= max && height <= max
    {   return None;
    }
    let scale = |short: u32, long: u32| -> u32 {
      let scaled = (u64::from(short) * u64::from(max) + u64::from(long) / 2)
        / u64::from(long);
      (scaled as u32).max(1)
    };
    if width >= height
    {   Some((max, scale(height, width)))
    } else
    {   Some((scale(width, height), max))
    }
}

/// Approximate token cost of an image of the given size
pub fn estimate_tokens(width: u32, height: u32) -> u64
{   (u64::from(width) * u64::from(height)).div_ceil(PIXELS_PER_TOKEN)
}

pub fn estimate_batch_tokens(assets: &[ImageAsset]) -> u64
{   assets.iter().map(|a| a.estimated_tokens).sum()
}

fn encode(img: &DynamicImage, kind: ImageKind, filename: &str) -> Result<Vec<u8>>
{   // JPEG has no alpha channel; the other encoders take RGBA
    let img = match kind
    {   ImageKind::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
      , ImageKind::Webp | ImageKind::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
      , ImageKind::Png => img.clone()
    };
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, kind.format())
      .map_err(|e| Error::validation(format!("{}: cannot re-encode image: {}", filename, e)))?;
    Ok(out.into_inner())
}
