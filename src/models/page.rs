//! In-flight page state for one pipeline run.

use image::DynamicImage;

/// One rendered page raster moving through the pipeline.
///
/// Owned exclusively by the coordinator for the duration of a request;
/// rotation and deskew replace the raster in place (dimensions may swap
/// for 90/270 degree rotations).
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number within the source document.
    pub page_number: u32,
    /// The raster itself.
    pub image: DynamicImage,
}

impl PageImage {
    pub fn new(page_number: u32, image: DynamicImage) -> Self {
        Self { page_number, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Orientation detection outcome for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationResult {
    /// Detected rotation of the text, one of 0, 90, 180, 270 degrees.
    pub rotation: u16,
    /// Classifier confidence, 0-100.
    pub confidence: f32,
}

impl OrientationResult {
    /// The fail-open result: no rotation, no confidence.
    pub fn none() -> Self {
        Self {
            rotation: 0,
            confidence: 0.0,
        }
    }
}

/// Skew detection outcome for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewResult {
    /// Detected skew in degrees, counter-clockwise positive.
    pub angle: f32,
}

impl SkewResult {
    pub fn none() -> Self {
        Self { angle: 0.0 }
    }
}
