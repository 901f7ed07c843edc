//! Pothole age estimation.
//!
//! Heuristic over a cropped region: sharp, well-defined edges read as a fresh
//! pothole, while soft edges combined with texture and brightness read as an
//! older, weathered one.
//!
//! ```text
//! edge_factor       = 1 / (laplacian_variance + 1e-5)
//! texture_factor    = intensity_stddev / 255
//! brightness_factor = intensity_mean / 255
//! age_score         = 0.5 * edge_factor + 0.3 * texture_factor + 0.2 * brightness_factor
//! age_days          = clamp(round(age_score * 365), 0, 365)
//! ```
//!
//! Intensity follows the BT.601 integer conversion (`Y = 0.299 R + 0.587 G +
//! 0.114 B` in 14-bit fixed point) and the Laplacian uses the 3x3 aperture with
//! reflect-101 borders, so ages agree with records produced by OpenCV tooling.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};

/// Age returned when a crop is empty or the score is not a finite number.
pub const FALLBACK_AGE_DAYS: u32 = 30;

/// Upper bound of the estimate.
pub const MAX_AGE_DAYS: u32 = 365;

const EDGE_EPSILON: f64 = 1e-5;
const EDGE_WEIGHT: f64 = 0.5;
const TEXTURE_WEIGHT: f64 = 0.3;
const BRIGHTNESS_WEIGHT: f64 = 0.2;

/// Raw measures the score is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeFeatures {
    /// Variance of the Laplacian response
    pub edge_measure: f64,
    /// Standard deviation of intensity
    pub texture_measure: f64,
    /// Mean intensity
    pub brightness: f64,
}

impl AgeFeatures {
    pub fn age_score(&self) -> f64 {
        let edge_factor = 1.0 / (self.edge_measure + EDGE_EPSILON);
        let texture_factor = self.texture_measure / 255.0;
        let brightness_factor = self.brightness / 255.0;

        EDGE_WEIGHT * edge_factor + TEXTURE_WEIGHT * texture_factor + BRIGHTNESS_WEIGHT * brightness_factor
    }
}

/// Estimate the age in days of a cropped pothole region.
pub fn estimate_age_days(region: &DynamicImage) -> u32 {
    if region.width() == 0 || region.height() == 0 {
        return FALLBACK_AGE_DAYS;
    }
    estimate_from_gray(&to_intensity(region))
}

/// Estimate from an already single-channel region.
pub fn estimate_from_gray(gray: &GrayImage) -> u32 {
    match measure(gray) {
        Some(features) => score_to_days(features.age_score()),
        None => FALLBACK_AGE_DAYS,
    }
}

/// Compute the heuristic measures. `None` for an empty region.
pub fn measure(gray: &GrayImage) -> Option<AgeFeatures> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let n = (w as f64) * (h as f64);

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for p in gray.pixels() {
        let v = p[0] as f64;
        sum += v;
        sum_sq += v * v;
    }
    let brightness = sum / n;
    let texture_measure = (sum_sq / n - brightness * brightness).max(0.0).sqrt();

    let laplacian = laplacian(gray);
    let lap_mean = laplacian.iter().sum::<f64>() / n;
    let edge_measure = laplacian
        .iter()
        .map(|v| (v - lap_mean) * (v - lap_mean))
        .sum::<f64>()
        / n;

    Some(AgeFeatures {
        edge_measure,
        texture_measure,
        brightness,
    })
}

fn score_to_days(score: f64) -> u32 {
    if !score.is_finite() {
        return FALLBACK_AGE_DAYS;
    }
    let days = (score * MAX_AGE_DAYS as f64).round_ties_even();
    days.clamp(0.0, MAX_AGE_DAYS as f64) as u32
}

/// BT.601 luma in 14-bit fixed point.
pub fn to_intensity(region: &DynamicImage) -> GrayImage {
    const R2Y: u32 = 4899;
    const G2Y: u32 = 9617;
    const B2Y: u32 = 1868;
    const SHIFT: u32 = 14;

    let rgb = region.to_rgb8();
    ImageBuffer::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let y = (r as u32 * R2Y + g as u32 * G2Y + b as u32 * B2Y + (1 << (SHIFT - 1))) >> SHIFT;
        Luma([y.min(255) as u8])
    })
}

/// 3x3 Laplacian (`[0 1 0; 1 -4 1; 0 1 0]`) with reflect-101 borders.
fn laplacian(gray: &GrayImage) -> Vec<f64> {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let at = |x: i64, y: i64| -> f64 {
        let xi = reflect101(x, w);
        let yi = reflect101(y, h);
        gray.get_pixel(xi as u32, yi as u32)[0] as f64
    };

    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let value = at(x, y - 1) + at(x - 1, y) + at(x + 1, y) + at(x, y + 1) - 4.0 * at(x, y);
            out.push(value);
        }
    }
    out
}

fn reflect101(i: i64, len: i64) -> i64 {
    if len == 1 {
        return 0;
    }
    if i < 0 {
        -i
    } else if i >= len {
        2 * len - 2 - i
    } else {
        i
    }
}
