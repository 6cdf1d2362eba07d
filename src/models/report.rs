//! Request and response types for the outward pipeline contract.

use serde::{Deserialize, Serialize};

/// An input document: the PDF bytes plus the client-supplied filename.
///
/// Consumed by the splitter; only the derived page rasters live past that.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    pub fn file_info(&self) -> FileInfo {
        FileInfo {
            filename: self.filename.clone(),
            size_bytes: self.bytes.len() as u64,
        }
    }
}

/// Basic file metadata echoed back in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size_bytes: u64,
}

/// Recognition engine parameters for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionParams {
    /// Languages combined into one recognizer pass.
    pub languages: Vec<String>,
    /// Engine mode (tesseract --oem).
    pub oem: u8,
    /// Page segmentation mode (tesseract --psm).
    pub psm: u8,
}

impl RecognitionParams {
    /// Language set in the recognizer's combined form, e.g. "rus+eng".
    pub fn language_string(&self) -> String {
        self.languages.join("+")
    }
}

/// Final per-page record, immutable once assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number.
    pub page_number: u32,
    /// Recognized text. Empty when recognition failed for this page.
    pub text: String,
    /// Mean recognition confidence across tokens, 0-100.
    pub confidence: f32,
    /// Rotation actually applied, degrees (0 when gated off by confidence).
    pub rotation_applied: u16,
    /// Deskew angle actually applied, degrees (0 when below threshold).
    pub deskew_angle: f32,
    /// Final raster width in pixels.
    pub width: u32,
    pub height: u32,
    /// Wall time spent on this page across all stage rounds.
    pub processing_time_ms: u64,
    /// Page-local failure marker; other pages are unaffected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Echo of the configuration a request was resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEcho {
    pub languages: Vec<String>,
    /// The resolved, ascending page list that was processed.
    pub pages: Vec<u32>,
    pub oem: u8,
    pub psm: u8,
    pub dpi: u32,
}

/// Top-level result of processing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub success: bool,
    /// Identifier for fetching coordinates; None on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    pub total_pages: u32,
    pub processing_time_ms: u64,
    pub pages: Vec<PageResult>,
    pub config_used: ConfigEcho,
    pub file_info: FileInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    /// Mean confidence across pages, 0 when there are none.
    pub fn mean_confidence(&self) -> f32 {
        if self.pages.is_empty() {
            return 0.0;
        }
        self.pages.iter().map(|p| p.confidence).sum::<f32>() / self.pages.len() as f32
    }
}
