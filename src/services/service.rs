//! Outward service facade.
//!
//! This is the surface a transport layer (or the CLI) talks to: submit a
//! document, fetch coordinates, read store statistics, check health. The
//! transport itself (request parsing, size limits, serialization) is the
//! caller's concern.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::capabilities::{
    check_binary, OrientationClassifier, PageRenderer, PopplerRenderer, TesseractOsd,
    TesseractRecognizer, TextRecognizer,
};
use crate::config::Settings;
use crate::error::PipelineError;
use crate::models::{Document, DocumentCoordinates, DocumentReport, PageSelection, RecognitionParams};
use crate::services::{PipelineCoordinator, PipelineEvent};
use crate::store::{CoordinateStore, InMemoryCoordinateStore, StoreStats};

/// Availability of one external tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub available: bool,
}

/// Health snapshot: engine availability, host parallelism, effective config.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// "ok" when the recognition engine is usable, "degraded" otherwise.
    pub status: String,
    pub service: String,
    pub version: String,
    pub cpu_count: usize,
    pub recognition_engine_version: Option<String>,
    pub tools: Vec<ToolStatus>,
    pub config: Settings,
}

/// Service for OCR document processing.
pub struct OcrService {
    settings: Settings,
    store: Arc<dyn CoordinateStore>,
    coordinator: PipelineCoordinator,
}

impl OcrService {
    /// Create a service wired to the production capabilities
    /// (poppler rendering, tesseract OSD and recognition).
    pub fn new(settings: Settings) -> Self {
        let store: Arc<dyn CoordinateStore> = Arc::new(InMemoryCoordinateStore::with_capacity(
            settings.store.max_documents,
        ));
        Self::with_capabilities(
            settings,
            Arc::new(PopplerRenderer::new()),
            Arc::new(TesseractOsd::new()),
            Arc::new(TesseractRecognizer::new()),
            store,
        )
    }

    /// Create a service with injected capabilities and store.
    pub fn with_capabilities(
        settings: Settings,
        renderer: Arc<dyn PageRenderer>,
        classifier: Arc<dyn OrientationClassifier>,
        recognizer: Arc<dyn TextRecognizer>,
        store: Arc<dyn CoordinateStore>,
    ) -> Self {
        let coordinator = PipelineCoordinator::new(
            settings.clone(),
            renderer,
            classifier,
            recognizer,
            store.clone(),
        );
        Self {
            settings,
            store,
            coordinator,
        }
    }

    /// Default recognition parameters from the configured settings.
    pub fn default_params(&self) -> RecognitionParams {
        RecognitionParams {
            languages: self.settings.recognition.languages.clone(),
            oem: self.settings.recognition.oem,
            psm: self.settings.recognition.psm,
        }
    }

    /// Process a document synchronously and return its report.
    ///
    /// Never errors for page-local problems: inspect each PageResult's
    /// confidence and error marker. Errors only for unrenderable input,
    /// an unsatisfiable selection, or an elapsed document deadline.
    pub async fn submit(
        &self,
        document: Document,
        selection: PageSelection,
        params: RecognitionParams,
    ) -> Result<DocumentReport, PipelineError> {
        self.coordinator
            .process(document, selection, params, None)
            .await
    }

    /// Like `submit`, streaming progress events to the given channel.
    pub async fn submit_with_events(
        &self,
        document: Document,
        selection: PageSelection,
        params: RecognitionParams,
        events: mpsc::Sender<PipelineEvent>,
    ) -> Result<DocumentReport, PipelineError> {
        self.coordinator
            .process(document, selection, params, Some(events))
            .await
    }

    /// Coordinates of a previously processed document.
    pub fn coordinates(&self, doc_id: &str) -> Option<DocumentCoordinates> {
        self.store.get(doc_id)
    }

    /// Coordinate store statistics.
    pub fn store_stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Health snapshot of the service and its external tools.
    pub fn health(&self) -> HealthReport {
        let tools: Vec<ToolStatus> = ["tesseract", "pdftoppm", "pdfinfo"]
            .iter()
            .map(|name| ToolStatus {
                name: name.to_string(),
                available: check_binary(name),
            })
            .collect();
        let engine_version = crate::capabilities::tesseract_version();
        let status = if tools.iter().all(|t| t.available) {
            "ok"
        } else {
            "degraded"
        };

        HealthReport {
            status: status.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            recognition_engine_version: engine_version,
            tools,
            config: self.settings.clone(),
        }
    }
}
