// Image cleanup before Tesseract: shrink to fit 1500x1500 (never enlarge),
// grayscale, stretch levels, sharpen, lift brightness/contrast, PNG-encode.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat};
use std::io::Cursor;

pub const OCR_MAX_DIMENSION: u32 = 1500;
const SHARPEN_SIGMA: f32 = 1.5;
const BRIGHTNESS: f32 = 1.1;
const CONTRAST_PERCENT: f32 = 20.0;

/// Returns PNG bytes tuned for OCR.
pub fn preprocess_for_ocr(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let mut img = image::load_from_memory(bytes)?;
    if img.width() > OCR_MAX_DIMENSION || img.height() > OCR_MAX_DIMENSION {
        img = img.resize(OCR_MAX_DIMENSION, OCR_MAX_DIMENSION, FilterType::Lanczos3);
    }

    let gray = normalize(img.to_luma8());
    let mut sharpened = imageops::unsharpen(&gray, SHARPEN_SIGMA, 0);
    for pixel in sharpened.pixels_mut() {
        pixel[0] = (f32::from(pixel[0]) * BRIGHTNESS).round().min(255.0) as u8;
    }
    let adjusted = imageops::contrast(&sharpened, CONTRAST_PERCENT);

    let mut out = Vec::new();
    DynamicImage::ImageLuma8(adjusted).write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

/// Stretches the darkest pixel to black and the lightest to white.
fn normalize(mut img: GrayImage) -> GrayImage {
    let (min, max) = img
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return img;
    }
    let range = f32::from(max - min);
    for pixel in img.pixels_mut() {
        pixel[0] = ((f32::from(pixel[0] - min) * 255.0) / range).round() as u8;
    }
    img
}
