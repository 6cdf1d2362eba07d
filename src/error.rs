//! Error types for the OCR pipeline.
//!
//! Two layers: `CapabilityError` for failures inside an external capability
//! (poppler, tesseract), `PipelineError` for document-level failures that
//! abort a request. Page-local failures are not errors at this level; they
//! are recorded on the affected `PageResult` and never interrupt siblings.

use thiserror::Error;

/// Errors from an external capability invocation.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("Unparseable tool output: {0}")]
    OutputUnparseable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document-level pipeline failures.
///
/// Once splitting succeeds the pipeline always completes; every variant here
/// is raised before or during splitting, on an invalid selection, or when
/// the document deadline elapses.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input is not a renderable PDF.
    #[error("Document cannot be rendered: {0}")]
    InvalidDocument(String),

    /// The requested page selection cannot be satisfied.
    #[error("Invalid page selection: {0}")]
    InvalidSelection(String),

    /// The document-level processing deadline elapsed.
    #[error("Processing timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A worker task panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable machine-readable tag for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDocument(_) => "render_failure",
            Self::InvalidSelection(_) => "configuration_error",
            Self::Timeout { .. } => "timeout",
            Self::Worker(_) => "worker_failure",
            Self::Io(_) => "io_error",
        }
    }
}
