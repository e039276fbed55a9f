use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{BoothError, Result};

/// Effects every camera driver can apply to a capture.
pub const CAPTURE_EFFECTS: [&str; 4] = ["none", "negative", "grayscale", "sepia"];

pub fn is_supported(effect: &str, supported: &[&str]) -> bool {
    let effect = effect.trim().to_ascii_lowercase();
    supported.iter().any(|name| *name == effect)
}

pub fn ensure_supported(effect: &str, supported: &[&str]) -> Result<()> {
    if is_supported(effect, supported) {
        return Ok(());
    }
    Err(BoothError::UnsupportedEffect {
        effect: effect.to_string(),
        supported: supported.join(", "),
    })
}

pub fn apply_capture_effect(image: DynamicImage, effect: &str) -> Result<DynamicImage> {
    ensure_supported(effect, &CAPTURE_EFFECTS)?;
    let image = match effect.trim().to_ascii_lowercase().as_str() {
        "negative" => {
            let mut image = image;
            image.invert();
            image
        }
        "grayscale" => DynamicImage::ImageLuma8(image.to_luma8()),
        "sepia" => DynamicImage::ImageRgb8(sepia(&image.to_rgb8())),
        _ => image,
    };
    Ok(image)
}

fn sepia(src: &RgbImage) -> RgbImage {
    let mut out = src.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b] = pixel.0.map(f32::from);
        let tone = |kr: f32, kg: f32, kb: f32| (r * kr + g * kg + b * kb).clamp(0.0, 255.0) as u8;
        *pixel = Rgb([
            tone(0.393, 0.769, 0.189),
            tone(0.349, 0.686, 0.168),
            tone(0.272, 0.534, 0.131),
        ]);
    }
    out
}
