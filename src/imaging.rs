//! Pure raster operations used by the pipeline stages.
//!
//! Everything here is deterministic, in-memory and free of external
//! delegation: quarter-turn rotation, arbitrary-angle deskew rotation,
//! preprocessing helpers (crop, resize, grayscale, autocontrast) and the
//! projection-profile skew detector.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Rgb, RgbImage};

use crate::config::DeskewSettings;

/// Minimum fraction of dark pixels required for skew detection.
/// Below this the page is effectively blank and no angle is reported.
const MIN_INK_RATIO: f32 = 0.02;

/// Binarization threshold separating ink from background.
const INK_THRESHOLD: u8 = 128;

/// Lossless quarter-turn rotation, clockwise by `degrees`.
///
/// This is the correction step for a detected orientation: a page whose
/// text is rotated by N degrees is fixed by rotating the raster N degrees
/// clockwise. Width and height swap for 90 and 270.
pub fn rotate_quarter(img: &DynamicImage, degrees: u16) -> DynamicImage {
    match degrees % 360 {
        90 => img.rotate90(),
        180 => img.rotate180(),
        270 => img.rotate270(),
        _ => img.clone(),
    }
}

/// Rotate by an arbitrary angle (degrees, counter-clockwise positive),
/// expanding the canvas so no content is clipped and filling revealed
/// corners with white. Bilinear resampling.
pub fn rotate_arbitrary(img: &DynamicImage, degrees: f32) -> DynamicImage {
    if degrees.abs() < f32::EPSILON {
        return img.clone();
    }

    let src = img.to_rgb8();
    let (w, h) = src.dimensions();
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    let new_w = (w as f32 * cos.abs() + h as f32 * sin.abs()).ceil().max(1.0) as u32;
    let new_h = (w as f32 * sin.abs() + h as f32 * cos.abs()).ceil().max(1.0) as u32;

    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let ncx = new_w as f32 / 2.0;
    let ncy = new_h as f32 / 2.0;

    let mut out = RgbImage::from_pixel(new_w, new_h, Rgb([255, 255, 255]));

    for y in 0..new_h {
        for x in 0..new_w {
            let dx = x as f32 + 0.5 - ncx;
            let dy = y as f32 + 0.5 - ncy;
            // Inverse mapping: rotate the output coordinate back into the
            // source frame. Screen y grows downward, so this pair of
            // equations realizes a counter-clockwise visual rotation.
            let sx = cos * dx - sin * dy + cx - 0.5;
            let sy = sin * dx + cos * dy + cy - 0.5;
            if let Some(pixel) = bilinear_sample(&src, sx, sy) {
                out.put_pixel(x, y, pixel);
            }
        }
    }

    DynamicImage::ImageRgb8(out)
}

/// Crop away `fraction` of each edge, keeping the central region.
/// A fraction of 0.15 keeps the central 70% on each axis.
pub fn center_crop(img: &DynamicImage, fraction: f32) -> DynamicImage {
    let fraction = fraction.clamp(0.0, 0.45);
    let (w, h) = (img.width(), img.height());
    let x = (w as f32 * fraction) as u32;
    let y = (h as f32 * fraction) as u32;
    let cw = (w - 2 * x).max(1);
    let ch = (h - 2 * y).max(1);
    img.crop_imm(x, y, cw, ch)
}

/// Shrink so both edges fit within `max_px`, preserving aspect ratio.
/// Images already within bounds are returned unchanged.
pub fn bounded_resize(img: &DynamicImage, max_px: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_px {
        return img.clone();
    }
    img.thumbnail(max_px, max_px)
}

/// Scale so the long edge equals `target`, preserving aspect ratio.
/// Unlike `bounded_resize` this also upscales small inputs.
pub fn resize_long_edge(img: &DynamicImage, target: u32) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let long = w.max(h);
    if long == 0 || long == target {
        return img.clone();
    }
    let ratio = target as f32 / long as f32;
    let new_w = ((w as f32 * ratio) as u32).max(1);
    let new_h = ((h as f32 * ratio) as u32).max(1);
    img.resize_exact(new_w, new_h, FilterType::Triangle)
}

/// Grayscale conversion followed by a full-range contrast stretch.
pub fn grayscale_autocontrast(img: &DynamicImage) -> GrayImage {
    let mut gray = img.to_luma8();
    let (mut lo, mut hi) = (u8::MAX, u8::MIN);
    for p in gray.pixels() {
        lo = lo.min(p.0[0]);
        hi = hi.max(p.0[0]);
    }
    if hi > lo {
        let range = (hi - lo) as f32;
        for p in gray.pixels_mut() {
            p.0[0] = (((p.0[0] - lo) as f32 / range) * 255.0).round() as u8;
        }
    }
    gray
}

/// Estimate the skew angle of a page via projection profiles.
///
/// Candidate angles cover [-max_angle, +max_angle] at `angle_step`
/// resolution. Each candidate is scored by the sharpness of the horizontal
/// ink projection it produces; the estimate averages the `num_peaks`
/// best-scoring candidates weighted by how far they rise above the floor.
/// Returns 0.0 for blank or too-small pages.
pub fn detect_skew(img: &GrayImage, settings: &DeskewSettings) -> f32 {
    let (w, h) = img.dimensions();
    if w < 50 || h < 50 {
        return 0.0;
    }

    let dark = img.pixels().filter(|p| p.0[0] < INK_THRESHOLD).count();
    if (dark as f32 / (w * h) as f32) < MIN_INK_RATIO {
        return 0.0;
    }

    let step = settings.angle_step.max(0.01);
    let max_angle = settings.max_angle.abs();
    let mut candidates = Vec::new();
    let mut angle = -max_angle;
    while angle <= max_angle + step / 2.0 {
        candidates.push((angle, projection_score(img, angle)));
        angle += step;
    }

    let floor = candidates
        .iter()
        .map(|&(_, s)| s)
        .fold(f64::INFINITY, f64::min);
    candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let peaks = settings.num_peaks.max(1).min(candidates.len());
    let mut weight_sum = 0.0f64;
    let mut angle_sum = 0.0f64;
    for &(angle, score) in candidates.iter().take(peaks) {
        let weight = score - floor;
        weight_sum += weight;
        angle_sum += angle as f64 * weight;
    }

    if weight_sum <= 0.0 {
        return 0.0;
    }
    (angle_sum / weight_sum) as f32
}

/// Score one candidate angle: shear rows vertically by tan(angle) so that
/// text lines tilted by exactly that angle land in single profile rows,
/// then sum squared differences between adjacent row ink counts. Crisper
/// alignment gives sharper transitions and a higher score.
fn projection_score(img: &GrayImage, angle_deg: f32) -> f64 {
    let (w, h) = img.dimensions();
    let tan_a = (angle_deg.to_radians()).tan() as f64;
    let mut projection = vec![0u32; h as usize];

    for y in 0..h {
        let mut count = 0u32;
        // Every 4th pixel is enough signal for the profile.
        let mut x = 0u32;
        while x < w {
            // Counter-clockwise positive: a CCW-tilted line (rising to the
            // right on screen) aligns when rows are sheared downward.
            let sy = y as i64 - (x as f64 * tan_a).round() as i64;
            if sy >= 0 && (sy as u32) < h && img.get_pixel(x, sy as u32).0[0] < INK_THRESHOLD {
                count += 1;
            }
            x += 4;
        }
        projection[y as usize] = count;
    }

    let mut score = 0.0f64;
    for pair in projection.windows(2) {
        let diff = pair[1] as f64 - pair[0] as f64;
        score += diff * diff;
    }
    score
}

fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Option<Rgb<u8>> {
    let (w, h) = img.dimensions();
    if x < -1.0 || y < -1.0 || x >= w as f32 || y >= h as f32 {
        return None;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let sample = |px: f32, py: f32| -> [f32; 3] {
        let cx = px.clamp(0.0, (w - 1) as f32) as u32;
        let cy = py.clamp(0.0, (h - 1) as f32) as u32;
        let p = img.get_pixel(cx, cy);
        [p.0[0] as f32, p.0[1] as f32, p.0[2] as f32]
    };

    let p00 = sample(x0, y0);
    let p10 = sample(x0 + 1.0, y0);
    let p01 = sample(x0, y0 + 1.0);
    let p11 = sample(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgb(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Luma};

    fn solid(w: u32, h: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([value, value, value])))
    }

    /// Horizontal black stripes on white, perfectly aligned at 0 degrees.
    fn striped_gray(w: u32, h: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([255]));
        for y in (0..h).step_by(20) {
            for dy in 0..5u32 {
                if y + dy < h {
                    for x in 0..w {
                        img.put_pixel(x, y + dy, Luma([0]));
                    }
                }
            }
        }
        img
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let img = solid(10, 20, 128);
        assert_eq!(rotate_quarter(&img, 0).dimensions(), (10, 20));
        assert_eq!(rotate_quarter(&img, 90).dimensions(), (20, 10));
        assert_eq!(rotate_quarter(&img, 180).dimensions(), (10, 20));
        assert_eq!(rotate_quarter(&img, 270).dimensions(), (20, 10));
    }

    #[test]
    fn arbitrary_rotation_expands_canvas_and_fills_white() {
        let img = solid(100, 40, 0);
        let rotated = rotate_arbitrary(&img, 10.0);
        assert!(rotated.width() > 100);
        assert!(rotated.height() > 40);
        // Revealed corner must be white.
        let corner = rotated.to_rgb8().get_pixel(0, 0).0;
        assert_eq!(corner, [255, 255, 255]);
    }

    #[test]
    fn zero_rotation_is_identity() {
        let img = solid(30, 30, 77);
        let out = rotate_arbitrary(&img, 0.0);
        assert_eq!(out.dimensions(), (30, 30));
        assert_eq!(out.to_rgb8().get_pixel(15, 15).0, [77, 77, 77]);
    }

    #[test]
    fn center_crop_keeps_central_region() {
        let img = solid(100, 200, 50);
        let cropped = center_crop(&img, 0.15);
        assert_eq!(cropped.dimensions(), (70, 140));
    }

    #[test]
    fn bounded_resize_only_shrinks() {
        let small = solid(100, 50, 10);
        assert_eq!(bounded_resize(&small, 2048).dimensions(), (100, 50));

        let large = solid(4000, 2000, 10);
        let resized = bounded_resize(&large, 2048);
        assert!(resized.width() <= 2048 && resized.height() <= 2048);
    }

    #[test]
    fn long_edge_resize_hits_target() {
        let img = solid(400, 200, 10);
        let resized = resize_long_edge(&img, 1200);
        assert_eq!(resized.width(), 1200);
        assert_eq!(resized.height(), 600);
    }

    #[test]
    fn autocontrast_stretches_range() {
        let img = solid(10, 10, 100);
        // Uniform image: no range to stretch, stays put.
        let gray = grayscale_autocontrast(&img);
        assert_eq!(gray.get_pixel(0, 0).0[0], 100);

        let mut rgb = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
        rgb.put_pixel(0, 0, Rgb([150, 150, 150]));
        let gray = grayscale_autocontrast(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(5, 5).0[0], 0);
    }

    #[test]
    fn aligned_stripes_detect_as_level() {
        let settings = DeskewSettings::default();
        let angle = detect_skew(&striped_gray(400, 400), &settings);
        assert!(
            angle.abs() <= settings.angle_step,
            "expected near-zero skew, got {}",
            angle
        );
    }

    #[test]
    fn tilted_stripes_detect_their_angle() {
        // Stripes tilted 2 degrees counter-clockwise (rising to the right).
        let tilt = 2.0f64.to_radians().tan();
        let mut img = GrayImage::from_pixel(400, 400, Luma([255]));
        for y in 0..400u32 {
            for x in 0..400u32 {
                if (y as f64 + x as f64 * tilt).rem_euclid(20.0) < 5.0 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }

        let settings = DeskewSettings {
            num_peaks: 3,
            ..DeskewSettings::default()
        };
        let angle = detect_skew(&img, &settings);
        assert!(
            (1.0..=3.0).contains(&angle),
            "expected roughly +2 degrees, got {}",
            angle
        );
    }

    #[test]
    fn blank_page_reports_no_skew() {
        let settings = DeskewSettings::default();
        let blank = GrayImage::from_pixel(300, 300, Luma([255]));
        assert_eq!(detect_skew(&blank, &settings), 0.0);
    }

    #[test]
    fn tiny_image_reports_no_skew() {
        let settings = DeskewSettings::default();
        let tiny = GrayImage::from_pixel(10, 10, Luma([0]));
        assert_eq!(detect_skew(&tiny, &settings), 0.0);
    }
}
