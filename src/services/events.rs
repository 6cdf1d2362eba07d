//! Progress events emitted while a document moves through the pipeline.

use std::fmt;

/// The parallel stage rounds a selected page passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Orientation,
    Skew,
    Recognition,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orientation => write!(f, "orientation"),
            Self::Skew => write!(f, "skew"),
            Self::Recognition => write!(f, "recognition"),
        }
    }
}

/// Events emitted during document processing.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Splitting started for a document of `size_bytes`.
    SplitStarted { filename: String, size_bytes: u64 },
    /// Splitting finished; the selected subset continues.
    SplitCompleted {
        total_pages: u32,
        selected_pages: usize,
        duration_ms: u64,
    },
    /// A stage round is fanning out over the selected pages.
    PhaseStarted {
        phase: PipelinePhase,
        total_pages: usize,
    },
    /// One page finished a stage round.
    PageCompleted {
        phase: PipelinePhase,
        page_number: u32,
    },
    /// One page failed a stage round; the page degrades, the run continues.
    PageFailed {
        phase: PipelinePhase,
        page_number: u32,
        error: String,
    },
    /// A stage round's barrier was reached.
    PhaseCompleted {
        phase: PipelinePhase,
        duration_ms: u64,
        /// Pages that actually received a correction in this round
        /// (rotations applied, deskews applied, pages with text).
        corrected: usize,
    },
    /// The report was assembled and coordinates registered.
    Completed {
        doc_id: String,
        pages: usize,
        duration_ms: u64,
    },
}
