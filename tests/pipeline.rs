//! End-to-end pipeline tests over the public service API.
//!
//! External capabilities are replaced with deterministic fakes. The mock
//! renderer encodes the page number into the raster width (100 + n), so
//! per-page behavior in later stages can key off dimensions.

use std::sync::Arc;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use tokio::sync::mpsc;

use ocrpipe::capabilities::{
    OrientationClassifier, PageRenderer, RecognizedPage, TextRecognizer,
};
use ocrpipe::error::CapabilityError;
use ocrpipe::models::{
    BlockCoordinates, BoundingBox, LineCoordinates, PageImage, ParagraphCoordinates, WordBox,
};
use ocrpipe::services::{PipelineEvent, PipelinePhase};
use ocrpipe::{
    Document, InMemoryCoordinateStore, OcrService, PageSelection, PipelineError, RecognitionParams,
    Settings,
};

const PDF_BYTES: &[u8] = b"%PDF-1.4 fake";

fn page_width(page_num: u32) -> u32 {
    100 + page_num
}

/// Renders `total` white pages, width 100 + page number, height 140.
struct MockRenderer {
    total: u32,
}

impl PageRenderer for MockRenderer {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, CapabilityError> {
        if !pdf.starts_with(b"%PDF") {
            return Err(CapabilityError::ExecutionFailed(
                "input is missing the %PDF signature".to_string(),
            ));
        }
        Ok(self.total)
    }

    fn render(
        &self,
        pdf: &[u8],
        _dpi: u32,
        _thread_hint: u32,
        range: Option<(Option<u32>, Option<u32>)>,
    ) -> Result<Vec<PageImage>, CapabilityError> {
        self.page_count(pdf)?;
        let (first, last) = match range {
            Some((start, end)) => (start.unwrap_or(1), end.unwrap_or(self.total)),
            None => (1, self.total),
        };
        Ok((first..=last)
            .map(|n| {
                let img = RgbImage::from_pixel(page_width(n), 140, Rgb([255, 255, 255]));
                PageImage::new(n, DynamicImage::ImageRgb8(img))
            })
            .collect())
    }
}

/// Always reports the same rotation and confidence.
struct MockClassifier {
    rotation: u16,
    confidence: f32,
}

impl OrientationClassifier for MockClassifier {
    fn classify(&self, _image: &GrayImage) -> Result<(u16, f32), CapabilityError> {
        Ok((self.rotation, self.confidence))
    }
}

/// Classifier that always errors; the stage must fail open.
struct BrokenClassifier;

impl OrientationClassifier for BrokenClassifier {
    fn classify(&self, _image: &GrayImage) -> Result<(u16, f32), CapabilityError> {
        Err(CapabilityError::ExecutionFailed("no signal".to_string()))
    }
}

/// Deterministic recognizer: text and word derive from the raster width.
/// Optionally fails for one page (identified by its encoded width) or
/// stalls to trip the document deadline.
struct MockRecognizer {
    fail_page: Option<u32>,
    delay_ms: u64,
}

impl MockRecognizer {
    fn ok() -> Self {
        Self {
            fail_page: None,
            delay_ms: 0,
        }
    }

    fn failing_on(page: u32) -> Self {
        Self {
            fail_page: Some(page),
            delay_ms: 0,
        }
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(
        &self,
        image: &DynamicImage,
        _params: &RecognitionParams,
    ) -> Result<RecognizedPage, CapabilityError> {
        if self.delay_ms > 0 {
            std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));
        }
        let page_num = image.width().saturating_sub(100);
        if self.fail_page == Some(page_num) {
            return Err(CapabilityError::ExecutionFailed(format!(
                "forced failure on page {}",
                page_num
            )));
        }

        let word = WordBox {
            text: format!("word{}", page_num),
            left: 10,
            top: 20,
            width: 40,
            height: 12,
            conf: 85,
        };
        let line = LineCoordinates {
            line_id: 1,
            text: word.text.clone(),
            bbox: word.bbox(),
            words: vec![word],
        };
        let bbox = line.bbox;
        Ok(RecognizedPage {
            text: format!("recognized text of page {}", page_num),
            confidence: 85.0,
            blocks: vec![BlockCoordinates {
                block_id: 1,
                bbox,
                paragraphs: vec![ParagraphCoordinates {
                    par_id: 1,
                    bbox,
                    lines: vec![line],
                }],
            }],
        })
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.pipeline.workers = 2;
    settings
}

fn service(
    total_pages: u32,
    classifier: impl OrientationClassifier + 'static,
    recognizer: impl TextRecognizer + 'static,
) -> OcrService {
    service_with_settings(settings(), total_pages, classifier, recognizer)
}

fn service_with_settings(
    settings: Settings,
    total_pages: u32,
    classifier: impl OrientationClassifier + 'static,
    recognizer: impl TextRecognizer + 'static,
) -> OcrService {
    OcrService::with_capabilities(
        settings,
        Arc::new(MockRenderer { total: total_pages }),
        Arc::new(classifier),
        Arc::new(recognizer),
        Arc::new(InMemoryCoordinateStore::new()),
    )
}

fn document() -> Document {
    Document::new("sample.pdf", PDF_BYTES.to_vec())
}

fn no_rotation() -> MockClassifier {
    MockClassifier {
        rotation: 0,
        confidence: 99.0,
    }
}

fn params() -> RecognitionParams {
    RecognitionParams {
        languages: vec!["eng".to_string()],
        oem: 3,
        psm: 3,
    }
}

#[tokio::test]
async fn report_pages_follow_resolved_selection() {
    let service = service(5, no_rotation(), MockRecognizer::ok());
    let report = service
        .submit(document(), PageSelection::pages(vec![4, 1]), params())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.total_pages, 5);
    let numbers: Vec<u32> = report.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 4]);
    assert_eq!(report.config_used.pages, vec![1, 4]);
    assert_eq!(report.pages[0].text, "recognized text of page 1");
    assert_eq!(report.pages[1].text, "recognized text of page 4");
}

#[tokio::test]
async fn explicit_pages_override_range() {
    let service = service(5, no_rotation(), MockRecognizer::ok());
    let selection = PageSelection {
        pages: Some(vec![2, 5]),
        page_start: Some(1),
        page_end: Some(3),
    };
    let report = service.submit(document(), selection, params()).await.unwrap();
    assert_eq!(report.config_used.pages, vec![2, 5]);
}

#[tokio::test]
async fn resubmission_gets_fresh_id_and_identical_results() {
    let service = service(3, no_rotation(), MockRecognizer::ok());
    let first = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();
    let second = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();

    assert_ne!(first.doc_id, second.doc_id);
    let texts = |r: &ocrpipe::DocumentReport| {
        r.pages
            .iter()
            .map(|p| (p.text.clone(), p.confidence))
            .collect::<Vec<_>>()
    };
    assert_eq!(texts(&first), texts(&second));
}

#[tokio::test]
async fn low_confidence_rotation_is_not_applied() {
    let classifier = MockClassifier {
        rotation: 90,
        confidence: 1.0,
    };
    let service = service(1, classifier, MockRecognizer::ok());
    let report = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();

    let page = &report.pages[0];
    assert_eq!(page.rotation_applied, 0);
    assert_eq!((page.width, page.height), (page_width(1), 140));
}

#[tokio::test]
async fn confident_rotation_is_applied_and_swaps_dimensions() {
    let classifier = MockClassifier {
        rotation: 90,
        confidence: 12.0,
    };
    let service = service(1, classifier, MockRecognizer::ok());
    let report = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();

    let page = &report.pages[0];
    assert_eq!(page.rotation_applied, 90);
    assert_eq!((page.width, page.height), (140, page_width(1)));
}

#[tokio::test]
async fn classifier_failure_degrades_to_no_rotation() {
    let service = service(2, BrokenClassifier, MockRecognizer::ok());
    let report = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();

    assert!(report.success);
    for page in &report.pages {
        assert_eq!(page.rotation_applied, 0);
        assert!(page.error.is_none());
    }
}

#[tokio::test]
async fn blank_pages_get_no_deskew() {
    let service = service(2, no_rotation(), MockRecognizer::ok());
    let report = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();
    for page in &report.pages {
        assert_eq!(page.deskew_angle, 0.0);
    }
}

#[tokio::test]
async fn recognition_failure_is_isolated_to_its_page() {
    let service = service(3, no_rotation(), MockRecognizer::failing_on(2));
    let report = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();

    assert!(report.success, "page failure must not fail the document");
    assert_eq!(report.pages.len(), 3);

    let failed = &report.pages[1];
    assert_eq!(failed.page_number, 2);
    assert!(failed.text.is_empty());
    assert_eq!(failed.confidence, 0.0);
    assert!(failed.error.is_some());

    for page in [&report.pages[0], &report.pages[2]] {
        assert!(page.error.is_none());
        assert!(!page.text.is_empty());
        assert!(page.confidence > 60.0);
    }

    // The stored coordinates mirror the degradation.
    let coords = service.coordinates(report.doc_id.as_deref().unwrap()).unwrap();
    assert_eq!(coords.pages.len(), 3);
    assert!(coords.pages[1].blocks.is_empty());
    assert_eq!(coords.pages[0].word_count(), 1);
}

#[tokio::test]
async fn renderer_failure_is_fatal() {
    let service = service(3, no_rotation(), MockRecognizer::ok());
    let bad = Document::new("broken.bin", b"GIF89a not a pdf".to_vec());
    let err = service
        .submit(bad, PageSelection::all(), params())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidDocument(_)));
}

#[tokio::test]
async fn out_of_range_selection_is_rejected_before_any_stage() {
    let service = service(3, no_rotation(), MockRecognizer::ok());
    let err = service
        .submit(document(), PageSelection::pages(vec![1, 7]), params())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidSelection(_)));
    assert_eq!(service.store_stats().document_count, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn document_deadline_aborts_the_run() {
    let mut settings = settings();
    settings.pipeline.timeout_secs = 1;
    let recognizer = MockRecognizer {
        fail_page: None,
        delay_ms: 1800,
    };
    let service = service_with_settings(settings, 1, no_rotation(), recognizer);

    let err = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Timeout { .. }));
    assert_eq!(service.store_stats().document_count, 0);
}

#[tokio::test]
async fn coordinates_are_queryable_after_completion() {
    let service = service(2, no_rotation(), MockRecognizer::ok());
    let report = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();

    let doc_id = report.doc_id.as_deref().unwrap();
    let coords = service.coordinates(doc_id).unwrap();
    assert_eq!(coords.doc_id, doc_id);
    let numbers: Vec<u32> = coords.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    let words = coords.pages[0].words();
    assert_eq!(words[0].text, "word1");
    assert_eq!(
        words[0].bbox(),
        BoundingBox {
            left: 10,
            top: 20,
            right: 50,
            bottom: 32
        }
    );

    assert!(service.coordinates("unknown-id").is_none());

    let stats = service.store_stats();
    assert_eq!(stats.document_count, 1);
    assert_eq!(stats.total_word_count, 2);
}

#[tokio::test]
async fn clean_single_page_scenario() {
    // A straight, level, high-contrast page: no corrections, good text.
    let service = service(1, no_rotation(), MockRecognizer::ok());
    let report = service
        .submit(document(), PageSelection::all(), params())
        .await
        .unwrap();

    let page = &report.pages[0];
    assert_eq!(page.rotation_applied, 0);
    assert_eq!(page.deskew_angle, 0.0);
    assert!(page.confidence > 60.0);
    assert!(!page.text.is_empty());
}

#[tokio::test]
async fn events_cover_every_phase_in_order() {
    let service = service(2, no_rotation(), MockRecognizer::ok());
    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(100);

    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    });

    service
        .submit_with_events(document(), PageSelection::all(), params(), tx)
        .await
        .unwrap();
    let events = collector.await.unwrap();

    let phases: Vec<PipelinePhase> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::PhaseStarted { phase, .. } => Some(*phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![
            PipelinePhase::Orientation,
            PipelinePhase::Skew,
            PipelinePhase::Recognition
        ]
    );
    assert!(matches!(events.first(), Some(PipelineEvent::SplitStarted { .. })));
    assert!(matches!(events.last(), Some(PipelineEvent::Completed { .. })));
}
