//! ocrpipe - PDF OCR pipeline with orientation and skew correction.
//!
//! Converts a PDF into per-page recognized text plus word-level
//! coordinates. Pages are rendered once, then pass through three
//! fully-barriered parallel rounds: orientation detection and correction,
//! skew detection and correction, text recognition. Word coordinates of
//! finished documents are held in an in-memory store for highlighting
//! queries.

pub mod capabilities;
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod models;
pub mod services;
pub mod store;

pub use config::Settings;
pub use error::{CapabilityError, PipelineError};
pub use models::{
    Document, DocumentCoordinates, DocumentReport, PageResult, PageSelection, RecognitionParams,
    WordBox,
};
pub use services::{HealthReport, OcrService, PipelineCoordinator, PipelineEvent};
pub use store::{CoordinateStore, InMemoryCoordinateStore, StoreStats};
