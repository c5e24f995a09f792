//! Image download, validation and normalisation.
//!
//! Temu rejects carousel images that are smaller than 800 px on the short
//! side, that are not 1:1 or 3:4, or that exceed 3 MiB. Each source image
//! goes through:
//!
//! ```text
//! bytes ──▶ decode ──▶ flatten ──▶ pad ──▶ upscale ──▶ downscale ──▶ JPEG
//!                      (white)    (square) (Lanczos3)  (max side)    (q90→50)
//! ```
//!
//! Decoding and resampling are CPU-bound, so each image is processed inside
//! `spawn_blocking`; downloads run concurrently via `buffered`, which keeps
//! the source order so the first surviving image stays the main image.

use crate::config::ListingConfig;
use crate::error::{ImageIssue, ListingError};
use crate::pipeline::source::fetch_bytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use tracing::{debug, warn};

pub const JPEG_MIME: &str = "image/jpeg";

/// Width:height ratios Temu accepts for carousel images.
pub const ALLOWED_RATIOS: [(u32, u32); 2] = [(1, 1), (3, 4)];

/// Relative tolerance when comparing aspect ratios.
pub const RATIO_TOLERANCE: f64 = 0.02;

const MIN_JPEG_QUALITY: u8 = 50;
const QUALITY_STEP: u8 = 10;

/// Limits applied to every image, taken from [`ListingConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRules {
    pub min_side: u32,
    pub max_side: u32,
    pub upscale_floor: u32,
    pub pad_to_square: bool,
    pub max_bytes: usize,
    pub jpeg_quality: u8,
}

impl ImageRules {
    pub fn from_config(config: &ListingConfig) -> Self {
        Self {
            min_side: config.min_image_side,
            max_side: config.max_image_side,
            upscale_floor: config.upscale_floor,
            pad_to_square: config.pad_to_square,
            max_bytes: config.max_image_bytes,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

impl Default for ImageRules {
    fn default() -> Self {
        Self::from_config(&ListingConfig::default())
    }
}

/// A normalised, JPEG-encoded image ready for OCR and upload.
#[derive(Clone, PartialEq)]
pub struct ProcessedImage {
    /// Position in the source gallery (0-based).
    pub index: usize,
    pub source: String,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub padded: bool,
    pub resized: bool,
    pub jpeg: Vec<u8>,
}

impl std::fmt::Debug for ProcessedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedImage")
            .field("index", &self.index)
            .field("source", &self.source)
            .field("size", &format_args!("{}x{}", self.width, self.height))
            .field("quality", &self.quality)
            .field("jpeg_bytes", &self.jpeg.len())
            .finish()
    }
}

impl ProcessedImage {
    pub fn mime(&self) -> &'static str {
        JPEG_MIME
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.jpeg)
    }
}

/// Outcome for one source image.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    pub index: usize,
    pub source: String,
    pub result: Result<ProcessedImage, ImageIssue>,
}

/// Whether `width × height` is within tolerance of an allowed ratio.
pub fn aspect_ratio_ok(width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let ratio = width as f64 / height as f64;
    ALLOWED_RATIOS.iter().any(|&(w, h)| {
        let target = w as f64 / h as f64;
        ((ratio - target) / target).abs() <= RATIO_TOLERANCE
    })
}

/// Download and process every image, keeping source order.
pub async fn download_images(
    sources: &[String],
    client: &reqwest::Client,
    config: &ListingConfig,
) -> Vec<ImageOutcome> {
    let rules = ImageRules::from_config(config);
    let timeout = config.fetch_timeout_secs;

    stream::iter(sources.iter().take(config.max_source_images).enumerate())
        .map(|(index, source)| {
            let client = client.clone();
            let source = source.clone();
            async move {
                let result = match fetch_bytes(&client, &source, timeout).await {
                    Ok(bytes) => process_in_background(index, source.clone(), bytes, rules).await,
                    Err(e) => Err(ImageIssue::DownloadFailed {
                        index,
                        detail: e.to_string(),
                    }),
                };
                if let Err(issue) = &result {
                    warn!("{}", issue);
                }
                ImageOutcome {
                    index,
                    source,
                    result,
                }
            }
        })
        .buffered(config.image_concurrency.max(1))
        .collect()
        .await
}

async fn process_in_background(
    index: usize,
    source: String,
    bytes: Vec<u8>,
    rules: ImageRules,
) -> Result<ProcessedImage, ImageIssue> {
    tokio::task::spawn_blocking(move || process_image(index, &source, &bytes, &rules))
        .await
        .map_err(|e| ImageIssue::DecodeFailed {
            index,
            detail: format!("processing task failed: {e}"),
        })?
}

/// Decode, check and normalise one image.
pub fn process_image(
    index: usize,
    source: &str,
    bytes: &[u8],
    rules: &ImageRules,
) -> Result<ProcessedImage, ImageIssue> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ImageIssue::DecodeFailed {
        index,
        detail: e.to_string(),
    })?;
    let (original_width, original_height) = (decoded.width(), decoded.height());
    let mut rgb = flatten_on_white(&decoded);
    let mut padded = false;
    let mut resized = false;

    if !aspect_ratio_ok(rgb.width(), rgb.height()) {
        if !rules.pad_to_square {
            return Err(ImageIssue::BadAspectRatio {
                index,
                width: original_width,
                height: original_height,
            });
        }
        rgb = pad_to_square(&rgb);
        padded = true;
    }

    let short = rgb.width().min(rgb.height());
    if short < rules.min_side {
        if short < rules.upscale_floor {
            return Err(ImageIssue::TooSmall {
                index,
                width: original_width,
                height: original_height,
                min: rules.min_side,
            });
        }
        rgb = scale_short_side(&rgb, rules.min_side);
        resized = true;
    }

    let long = rgb.width().max(rgb.height());
    if long > rules.max_side {
        rgb = scale_long_side(&rgb, rules.max_side);
        resized = true;
    }

    let (jpeg, quality) = encode_within(&rgb, rules).ok_or_else(|| {
        let smallest = encode_jpeg(&rgb, MIN_JPEG_QUALITY).map(|b| b.len()).unwrap_or(0);
        ImageIssue::TooLarge {
            index,
            bytes: smallest,
            limit: rules.max_bytes,
        }
    })?;

    debug!(
        "Image {}: {}x{} → {}x{} q{} ({} bytes){}",
        index,
        original_width,
        original_height,
        rgb.width(),
        rgb.height(),
        quality,
        jpeg.len(),
        if padded { " padded" } else { "" }
    );

    Ok(ProcessedImage {
        index,
        source: source.to_string(),
        original_width,
        original_height,
        width: rgb.width(),
        height: rgb.height(),
        quality,
        padded,
        resized,
        jpeg,
    })
}

/// Composite any alpha channel onto white; JPEG has no transparency.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let alpha = p[3] as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

fn pad_to_square(img: &RgbImage) -> RgbImage {
    let side = img.width().max(img.height());
    let mut canvas = RgbImage::from_pixel(side, side, Rgb([255, 255, 255]));
    let x = (side - img.width()) / 2;
    let y = (side - img.height()) / 2;
    imageops::overlay(&mut canvas, img, x as i64, y as i64);
    canvas
}

fn scale_short_side(img: &RgbImage, target: u32) -> RgbImage {
    let short = img.width().min(img.height()).max(1);
    let factor = target as f64 / short as f64;
    resize_by(img, factor)
}

fn scale_long_side(img: &RgbImage, target: u32) -> RgbImage {
    let long = img.width().max(img.height()).max(1);
    let factor = target as f64 / long as f64;
    resize_by(img, factor)
}

fn resize_by(img: &RgbImage, factor: f64) -> RgbImage {
    let w = ((img.width() as f64 * factor).round() as u32).max(1);
    let h = ((img.height() as f64 * factor).round() as u32).max(1);
    imageops::resize(img, w, h, FilterType::Lanczos3)
}

/// Encode at the configured quality, stepping down until under the limit.
fn encode_within(img: &RgbImage, rules: &ImageRules) -> Option<(Vec<u8>, u8)> {
    let mut quality = rules.jpeg_quality.clamp(MIN_JPEG_QUALITY, 100);
    loop {
        let bytes = encode_jpeg(img, quality).ok()?;
        if bytes.len() <= rules.max_bytes {
            return Some((bytes, quality));
        }
        if quality == MIN_JPEG_QUALITY {
            return None;
        }
        quality = quality.saturating_sub(QUALITY_STEP).max(MIN_JPEG_QUALITY);
    }
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

/// The surviving images, or [`ListingError::NoUsableImages`] if none survived.
pub fn accepted(outcomes: &[ImageOutcome]) -> Result<Vec<ProcessedImage>, ListingError> {
    let images: Vec<ProcessedImage> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().cloned())
        .collect();
    if images.is_empty() {
        let first_issue = outcomes
            .iter()
            .find_map(|o| o.result.as_ref().err().map(ToString::to_string))
            .unwrap_or_else(|| "the page lists no images".to_string());
        return Err(ListingError::NoUsableImages {
            total: outcomes.len(),
            rejected: outcomes.len(),
            first_issue,
        });
    }
    Ok(images)
}
