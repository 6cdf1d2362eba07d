//! The page-processing pipeline coordinator.
//!
//! One document flows through: split -> orientation round -> rotation ->
//! skew round -> deskew -> recognition round -> assembly. Each round fans
//! out over the selected pages on the blocking pool and joins completely
//! before the next round starts: a stage's geometric output is the
//! mandatory input of the next, so rounds must not interleave.
//!
//! Failure semantics: splitting, selection validation and the document
//! deadline are fatal; everything after a successful split degrades only
//! the affected page.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::capabilities::{
    OrientationClassifier, PageRenderer, RecognizedPage, TextRecognizer,
};
use crate::config::Settings;
use crate::error::PipelineError;
use crate::imaging;
use crate::models::{
    ConfigEcho, Document, DocumentReport, OrientationResult, PageCoordinates, PageImage,
    PageResult, PageSelection, RecognitionParams, SkewResult,
};
use crate::store::CoordinateStore;

use super::events::{PipelineEvent, PipelinePhase};

/// Outcome of the recognition round for one page.
struct RecognitionOutcome {
    text: String,
    confidence: f32,
    coordinates: PageCoordinates,
    error: Option<String>,
}

/// Orchestrates the staged pipeline for one document at a time.
///
/// Cheap to clone per request; all collaborators are shared behind Arcs.
pub struct PipelineCoordinator {
    settings: Settings,
    renderer: Arc<dyn PageRenderer>,
    classifier: Arc<dyn OrientationClassifier>,
    recognizer: Arc<dyn TextRecognizer>,
    store: Arc<dyn CoordinateStore>,
}

impl PipelineCoordinator {
    pub fn new(
        settings: Settings,
        renderer: Arc<dyn PageRenderer>,
        classifier: Arc<dyn OrientationClassifier>,
        recognizer: Arc<dyn TextRecognizer>,
        store: Arc<dyn CoordinateStore>,
    ) -> Self {
        Self {
            settings,
            renderer,
            classifier,
            recognizer,
            store,
        }
    }

    /// Process one document end to end.
    ///
    /// Bounded by the configured document deadline; an elapsed deadline
    /// abandons the in-flight round rather than draining it, because page
    /// results without their later-stage inputs are not meaningful.
    pub async fn process(
        &self,
        document: Document,
        selection: PageSelection,
        params: RecognitionParams,
        events: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<DocumentReport, PipelineError> {
        let deadline = self.settings.pipeline.timeout_secs;
        let started = Instant::now();
        if deadline == 0 {
            return self.run(document, selection, params, events).await;
        }
        match tokio::time::timeout(
            Duration::from_secs(deadline),
            self.run(document, selection, params, events),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }

    async fn run(
        &self,
        document: Document,
        selection: PageSelection,
        params: RecognitionParams,
        events: Option<mpsc::Sender<PipelineEvent>>,
    ) -> Result<DocumentReport, PipelineError> {
        let total_start = Instant::now();
        let file_info = document.file_info();

        tracing::info!(
            filename = %file_info.filename,
            size_bytes = file_info.size_bytes,
            languages = %params.language_string(),
            "Processing document"
        );

        // Selection is validated against the real page count before any
        // rendering work; out-of-range requests never reach a stage.
        let total_pages = self
            .renderer
            .page_count(&document.bytes)
            .map_err(|e| PipelineError::InvalidDocument(e.to_string()))?;
        let resolved = selection.resolve(total_pages)?;

        emit(&events, PipelineEvent::SplitStarted {
            filename: file_info.filename.clone(),
            size_bytes: file_info.size_bytes,
        })
        .await;

        // Split once. The whole document (or the contiguous range) is
        // rendered; pages outside the selection are dropped right after,
        // so rendering cost is shared while later stages skip them.
        let split_start = Instant::now();
        let renderer = self.renderer.clone();
        let render_range = selection.render_range();
        let dpi = self.settings.render.dpi;
        let thread_hint = self.settings.render.thread_count;
        let bytes = document.bytes;
        let rendered = tokio::task::spawn_blocking(move || {
            renderer.render(&bytes, dpi, thread_hint, render_range)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))?
        .map_err(|e| PipelineError::InvalidDocument(e.to_string()))?;

        let mut by_number: HashMap<u32, PageImage> =
            rendered.into_iter().map(|p| (p.page_number, p)).collect();
        let mut pages = Vec::with_capacity(resolved.len());
        for &page_num in &resolved {
            let page = by_number.remove(&page_num).ok_or_else(|| {
                PipelineError::InvalidDocument(format!(
                    "renderer produced no image for page {}",
                    page_num
                ))
            })?;
            pages.push(page);
        }
        drop(by_number);

        let split_ms = split_start.elapsed().as_millis() as u64;
        tracing::info!(
            total_pages,
            selected = pages.len(),
            duration_ms = split_ms,
            "Split complete"
        );
        emit(&events, PipelineEvent::SplitCompleted {
            total_pages,
            selected_pages: pages.len(),
            duration_ms: split_ms,
        })
        .await;

        let mut page_times: HashMap<u32, u64> = HashMap::new();

        // Round 1: orientation detection, then confidence-gated rotation.
        let phase_start = Instant::now();
        emit(&events, PipelineEvent::PhaseStarted {
            phase: PipelinePhase::Orientation,
            total_pages: pages.len(),
        })
        .await;

        let osd = self.settings.osd.clone();
        let classifier = self.classifier.clone();
        let osd_events = events.clone();
        let detections = self
            .fan_out(pages, move |page| {
                detect_orientation(page, &osd, classifier.as_ref(), &osd_events)
            })
            .await?;

        let threshold = self.settings.osd.confidence_threshold;
        let mut rotations: HashMap<u32, u16> = HashMap::new();
        let mut pages = Vec::with_capacity(detections.len());
        for (mut page, detection, elapsed_ms) in detections {
            *page_times.entry(page.page_number).or_default() += elapsed_ms;
            // Fail-safe gate: never apply a rotation the classifier is not
            // confident about.
            let applied = if detection.rotation != 0 && detection.confidence >= threshold {
                page.image = imaging::rotate_quarter(&page.image, detection.rotation);
                detection.rotation
            } else {
                0
            };
            if applied != 0 {
                tracing::info!(
                    page = page.page_number,
                    rotation = applied,
                    confidence = detection.confidence,
                    "Applied rotation"
                );
            }
            rotations.insert(page.page_number, applied);
            pages.push(page);
        }

        let rotated = rotations.values().filter(|&&r| r != 0).count();
        tracing::info!(
            duration_ms = phase_start.elapsed().as_millis() as u64,
            rotated,
            "Orientation round complete"
        );
        emit(&events, PipelineEvent::PhaseCompleted {
            phase: PipelinePhase::Orientation,
            duration_ms: phase_start.elapsed().as_millis() as u64,
            corrected: rotated,
        })
        .await;

        // Round 2: skew detection, then threshold-gated deskew.
        let phase_start = Instant::now();
        emit(&events, PipelineEvent::PhaseStarted {
            phase: PipelinePhase::Skew,
            total_pages: pages.len(),
        })
        .await;

        let deskew = self.settings.deskew.clone();
        let skew_events = events.clone();
        let detections = self
            .fan_out(pages, move |page| {
                let small = imaging::resize_long_edge(&page.image, deskew.resize_px);
                let gray = imaging::grayscale_autocontrast(&small);
                let angle = imaging::detect_skew(&gray, &deskew);
                emit_blocking(&skew_events, PipelineEvent::PageCompleted {
                    phase: PipelinePhase::Skew,
                    page_number: page.page_number,
                });
                SkewResult { angle }
            })
            .await?;

        let skew_threshold = self.settings.deskew.threshold;
        let mut deskew_angles: HashMap<u32, f32> = HashMap::new();
        let mut pages = Vec::with_capacity(detections.len());
        for (mut page, detection, elapsed_ms) in detections {
            *page_times.entry(page.page_number).or_default() += elapsed_ms;
            // Corrections below the threshold are noise; skip the transform.
            let applied = if detection.angle.abs() > skew_threshold {
                page.image = imaging::rotate_arbitrary(&page.image, -detection.angle);
                detection.angle
            } else {
                0.0
            };
            if applied != 0.0 {
                tracing::info!(
                    page = page.page_number,
                    angle = applied,
                    "Applied deskew"
                );
            }
            deskew_angles.insert(page.page_number, applied);
            pages.push(page);
        }

        let deskewed = deskew_angles.values().filter(|a| **a != 0.0).count();
        tracing::info!(
            duration_ms = phase_start.elapsed().as_millis() as u64,
            deskewed,
            "Skew round complete"
        );
        emit(&events, PipelineEvent::PhaseCompleted {
            phase: PipelinePhase::Skew,
            duration_ms: phase_start.elapsed().as_millis() as u64,
            corrected: deskewed,
        })
        .await;

        // Round 3: recognition. A failed page degrades to an empty result
        // with an error marker; siblings are untouched.
        let phase_start = Instant::now();
        emit(&events, PipelineEvent::PhaseStarted {
            phase: PipelinePhase::Recognition,
            total_pages: pages.len(),
        })
        .await;

        let recognizer = self.recognizer.clone();
        let rec_params = params.clone();
        let rec_events = events.clone();
        let outcomes = self
            .fan_out(pages, move |page| {
                recognize_page(page, &rec_params, recognizer.as_ref(), &rec_events)
            })
            .await?;

        let recognized = outcomes.iter().filter(|(_, o, _)| o.error.is_none()).count();
        tracing::info!(
            duration_ms = phase_start.elapsed().as_millis() as u64,
            recognized,
            "Recognition round complete"
        );
        emit(&events, PipelineEvent::PhaseCompleted {
            phase: PipelinePhase::Recognition,
            duration_ms: phase_start.elapsed().as_millis() as u64,
            corrected: recognized,
        })
        .await;

        // Assembly: ascending page order regardless of completion order.
        let mut page_results = Vec::with_capacity(outcomes.len());
        let mut coordinate_pages = Vec::with_capacity(outcomes.len());
        for (page, outcome, elapsed_ms) in outcomes {
            *page_times.entry(page.page_number).or_default() += elapsed_ms;
            coordinate_pages.push(outcome.coordinates);
            page_results.push(PageResult {
                page_number: page.page_number,
                text: outcome.text,
                confidence: outcome.confidence,
                rotation_applied: rotations.get(&page.page_number).copied().unwrap_or(0),
                deskew_angle: deskew_angles.get(&page.page_number).copied().unwrap_or(0.0),
                width: page.width(),
                height: page.height(),
                processing_time_ms: page_times.get(&page.page_number).copied().unwrap_or(0),
                error: outcome.error,
            });
        }

        let doc_id = self.store.put(coordinate_pages);
        let total_ms = total_start.elapsed().as_millis() as u64;

        tracing::info!(
            doc_id = %doc_id,
            pages = page_results.len(),
            duration_ms = total_ms,
            "Document complete"
        );
        emit(&events, PipelineEvent::Completed {
            doc_id: doc_id.clone(),
            pages: page_results.len(),
            duration_ms: total_ms,
        })
        .await;

        Ok(DocumentReport {
            success: true,
            doc_id: Some(doc_id),
            total_pages,
            processing_time_ms: total_ms,
            pages: page_results,
            config_used: ConfigEcho {
                languages: params.languages,
                pages: resolved,
                oem: params.oem,
                psm: params.psm,
                dpi: self.settings.render.dpi,
            },
            file_info,
            error: None,
        })
    }

    /// Fan one stage round out over the blocking pool, capped at the
    /// configured worker count, and join every task before returning.
    /// Results come back sorted by page number.
    async fn fan_out<R, F>(
        &self,
        pages: Vec<PageImage>,
        task: F,
    ) -> Result<Vec<(PageImage, R, u64)>, PipelineError>
    where
        R: Send + 'static,
        F: Fn(&PageImage) -> R + Send + Sync + Clone + 'static,
    {
        let workers = self.settings.worker_count().max(1);
        let mut out = Vec::with_capacity(pages.len());
        let mut handles = Vec::with_capacity(workers);

        for page in pages {
            let task = task.clone();
            let handle = tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                let result = task(&page);
                (page, result, start.elapsed().as_millis() as u64)
            });
            handles.push(handle);

            if handles.len() >= workers {
                for handle in handles.drain(..) {
                    out.push(handle.await.map_err(|e| PipelineError::Worker(e.to_string()))?);
                }
            }
        }
        for handle in handles {
            out.push(handle.await.map_err(|e| PipelineError::Worker(e.to_string()))?);
        }

        out.sort_by_key(|(page, _, _)| page.page_number);
        Ok(out)
    }
}

/// Detect one page's orientation: crop away edge noise, shrink, boost
/// contrast, then ask the classifier. Detection never mutates the page and
/// never fails it; an erroring classifier means "no correction".
fn detect_orientation(
    page: &PageImage,
    settings: &crate::config::OsdSettings,
    classifier: &dyn OrientationClassifier,
    events: &Option<mpsc::Sender<PipelineEvent>>,
) -> OrientationResult {
    let work = imaging::center_crop(&page.image, settings.crop_fraction);
    let work = imaging::bounded_resize(&work, settings.resize_px);
    let gray = imaging::grayscale_autocontrast(&work);

    match classifier.classify(&gray) {
        Ok((rotation, confidence)) => {
            emit_blocking(events, PipelineEvent::PageCompleted {
                phase: PipelinePhase::Orientation,
                page_number: page.page_number,
            });
            OrientationResult {
                rotation,
                confidence,
            }
        }
        Err(e) => {
            tracing::debug!(
                page = page.page_number,
                error = %e,
                "Orientation detection failed, assuming no rotation"
            );
            emit_blocking(events, PipelineEvent::PageFailed {
                phase: PipelinePhase::Orientation,
                page_number: page.page_number,
                error: e.to_string(),
            });
            OrientationResult::none()
        }
    }
}

/// Recognize one corrected page. Failures produce an empty, marked result.
fn recognize_page(
    page: &PageImage,
    params: &RecognitionParams,
    recognizer: &dyn TextRecognizer,
    events: &Option<mpsc::Sender<PipelineEvent>>,
) -> RecognitionOutcome {
    match recognizer.recognize(&page.image, params) {
        Ok(RecognizedPage {
            text,
            confidence,
            blocks,
        }) => {
            emit_blocking(events, PipelineEvent::PageCompleted {
                phase: PipelinePhase::Recognition,
                page_number: page.page_number,
            });
            RecognitionOutcome {
                text,
                confidence,
                coordinates: PageCoordinates {
                    page_number: page.page_number,
                    width: page.width(),
                    height: page.height(),
                    blocks,
                },
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(
                page = page.page_number,
                error = %e,
                "Recognition failed for page"
            );
            emit_blocking(events, PipelineEvent::PageFailed {
                phase: PipelinePhase::Recognition,
                page_number: page.page_number,
                error: e.to_string(),
            });
            RecognitionOutcome {
                text: String::new(),
                confidence: 0.0,
                coordinates: PageCoordinates::empty(page.page_number, page.width(), page.height()),
                error: Some(e.to_string()),
            }
        }
    }
}

async fn emit(events: &Option<mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

/// Event send from inside a blocking task.
fn emit_blocking(events: &Option<mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        let _ = futures::executor::block_on(tx.send(event));
    }
}
