//! Service layer: pipeline orchestration and the outward facade.
//!
//! Domain logic lives here, separated from UI concerns. Services emit
//! events for progress tracking so the CLI (or any other frontend) can
//! render without being wired into the pipeline.

mod events;
mod pipeline;
mod service;

pub use events::{PipelineEvent, PipelinePhase};
pub use pipeline::PipelineCoordinator;
pub use service::{HealthReport, OcrService, ToolStatus};
