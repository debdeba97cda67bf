//! Contribution image normalization.
//!
//! Every accepted image is turned into the same canonical form before it is
//! stored:
//!
//! | Step | Operation |
//! |---|---|
//! | Decode | `ImageReader` with guessed format and dimension limits (JPEG, PNG, GIF, WebP, BMP) |
//! | Pre-shrink | `Triangle` resample until the shorter side is [`PRESHRINK_EDGE`] |
//! | Gamma | darken by `v^2.0` before resampling, brighten by `v^(1/2.0)` after |
//! | Cover fit | `DynamicImage::resize_to_fill` to 400×400 with `Lanczos3` |
//! | Color space | RGB8, alpha dropped |
//! | Normalize | stretch the luma range to the full 0..=255 |
//! | Encode | PNG |

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Limits, Rgb, Rgb32FImage, RgbImage};
use std::io::Cursor;

/// Edge length of the canonical square output.
pub const CANONICAL_SIZE: u32 = 400;

/// Inputs wider or taller than this are rejected before any pixel is decoded.
pub const MAX_INPUT_DIMENSION: u32 = 8192;

/// Decoder allocation cap.
const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

/// Shorter side kept by the pre-shrink, twice the output so the float pass
/// still has detail to resample.
pub const PRESHRINK_EDGE: u32 = 2 * CANONICAL_SIZE;

const GAMMA: f32 = 2.0;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Input is not a decodable image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode normalized image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Normalization task failed: {0}")]
    Task(String),
}

/// Decode `input` and return the canonical PNG encoding.
///
/// Deterministic: identical input bytes give identical output bytes.
pub fn normalize_image(input: &[u8]) -> Result<Vec<u8>, NormalizeError> {
    let decoded = decode_bounded(input)?;
    let normalized = normalize_pixels(preshrink(decoded));

    let mut out = Vec::new();
    DynamicImage::ImageRgb8(normalized)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(NormalizeError::Encode)?;
    Ok(out)
}

/// Run [`normalize_image`] on the blocking pool.
pub async fn normalize_image_blocking(input: Vec<u8>) -> Result<Vec<u8>, NormalizeError> {
    tokio::task::spawn_blocking(move || normalize_image(&input))
        .await
        .map_err(|e| NormalizeError::Task(e.to_string()))?
}

fn decode_bounded(input: &[u8]) -> Result<DynamicImage, NormalizeError> {
    let mut reader = ImageReader::new(Cursor::new(input))
        .with_guessed_format()
        .map_err(|e| NormalizeError::Decode(image::ImageError::IoError(e)))?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_INPUT_DIMENSION);
    limits.max_image_height = Some(MAX_INPUT_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    reader.limits(limits);

    reader.decode().map_err(NormalizeError::Decode)
}

/// Cheap 8-bit downscale so the float pipeline never sees a full-size image.
fn preshrink(image: DynamicImage) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let shorter = width.min(height);
    if shorter <= PRESHRINK_EDGE {
        return image;
    }

    let scale = f64::from(PRESHRINK_EDGE) / f64::from(shorter);
    let scaled = |edge: u32| ((f64::from(edge) * scale).round() as u32).max(PRESHRINK_EDGE);
    image.resize_exact(scaled(width), scaled(height), FilterType::Triangle)
}

fn normalize_pixels(image: DynamicImage) -> RgbImage {
    let mut linear = image.into_rgb32f();
    apply_gamma(&mut linear, GAMMA);

    let mut resized = DynamicImage::ImageRgb32F(linear)
        .resize_to_fill(CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Lanczos3)
        .into_rgb32f();
    apply_gamma(&mut resized, 1.0 / GAMMA);

    let mut rgb = quantize(&resized);
    stretch_contrast(&mut rgb);
    rgb
}

fn apply_gamma(image: &mut Rgb32FImage, exponent: f32) {
    for value in image.iter_mut() {
        *value = value.clamp(0.0, 1.0).powf(exponent);
    }
}

fn quantize(image: &Rgb32FImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb(channels) = *image.get_pixel(x, y);
        Rgb(channels.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
    })
}

fn luma(pixel: &Rgb<u8>) -> f32 {
    let [r, g, b] = pixel.0;
    0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b)
}

/// Linear stretch so the darkest pixel maps to 0 and the brightest to 255.
fn stretch_contrast(image: &mut RgbImage) {
    let (min, max) = image
        .pixels()
        .map(luma)
        .fold((f32::MAX, f32::MIN), |(lo, hi), l| (lo.min(l), hi.max(l)));

    let range = max - min;
    if range < 1.0 {
        return;
    }

    let scale = 255.0 / range;
    for value in image.iter_mut() {
        *value = ((f32::from(*value) - min) * scale).round().clamp(0.0, 255.0) as u8;
    }
}
