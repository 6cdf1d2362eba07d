//! External capability contracts and their production implementations.
//!
//! The pipeline never talks to poppler or tesseract directly; it goes
//! through these traits so tests can substitute deterministic fakes:
//!
//! - `PageRenderer`: PDF bytes to ordered page rasters (pdftoppm/pdfinfo)
//! - `OrientationClassifier`: one raster to a 0/90/180/270 rotation guess
//!   with confidence (tesseract OSD)
//! - `TextRecognizer`: one raster to text, mean confidence and word boxes
//!   (tesseract TSV output)

mod osd;
mod poppler;
mod tesseract;

pub use osd::TesseractOsd;
pub use poppler::PopplerRenderer;
pub use tesseract::{RecognizedPage, TesseractRecognizer};
pub(crate) use tesseract::engine_version as tesseract_version;

use image::{DynamicImage, GrayImage};

use crate::error::CapabilityError;
use crate::models::{PageImage, RecognitionParams};

/// Renders a PDF into ordered page rasters.
pub trait PageRenderer: Send + Sync {
    /// Page count of the document, used to validate selections up front.
    fn page_count(&self, pdf: &[u8]) -> Result<u32, CapabilityError>;

    /// Render pages at the given resolution. `range` limits rendering to an
    /// inclusive 1-based page range; page numbering in the result reflects
    /// the document, not the render window.
    fn render(
        &self,
        pdf: &[u8],
        dpi: u32,
        thread_hint: u32,
        range: Option<(Option<u32>, Option<u32>)>,
    ) -> Result<Vec<PageImage>, CapabilityError>;
}

/// Classifies the orientation of a preprocessed page raster.
pub trait OrientationClassifier: Send + Sync {
    /// Returns (rotation in {0, 90, 180, 270}, confidence 0-100).
    fn classify(&self, image: &GrayImage) -> Result<(u16, f32), CapabilityError>;
}

/// Recognizes the text of one corrected page raster.
pub trait TextRecognizer: Send + Sync {
    fn recognize(
        &self,
        image: &DynamicImage,
        params: &RecognitionParams,
    ) -> Result<RecognizedPage, CapabilityError>;
}

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}
