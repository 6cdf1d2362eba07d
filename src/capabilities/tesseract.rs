//! Text recognition via tesseract's TSV output.
//!
//! A single invocation yields everything the pipeline needs: the word
//! boxes, per-word confidences, and enough structure (block, paragraph,
//! line numbers) to reassemble the page text. Running `tsv` instead of a
//! plain-text pass plus a data pass roughly halves recognition cost.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use image::DynamicImage;
use tempfile::TempDir;

use super::TextRecognizer;
use crate::error::CapabilityError;
use crate::models::coordinates::{enclosing_bbox, enclosing_word_bbox};
use crate::models::{
    BlockCoordinates, LineCoordinates, ParagraphCoordinates, RecognitionParams, WordBox,
};

/// Result of recognizing one page raster.
#[derive(Debug, Clone)]
pub struct RecognizedPage {
    /// Assembled page text: lines within a block joined by newlines,
    /// blocks separated by blank lines.
    pub text: String,
    /// Mean confidence over recognized words, 0-100.
    pub confidence: f32,
    /// Full coordinate hierarchy for highlighting.
    pub blocks: Vec<BlockCoordinates>,
}

/// Recognizer shelling out to the tesseract binary.
pub struct TesseractRecognizer;

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self
    }

    fn run_tesseract(
        &self,
        image_path: &Path,
        params: &RecognitionParams,
    ) -> Result<String, CapabilityError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &params.language_string()])
            .args(["--oem", &params.oem.to_string()])
            .args(["--psm", &params.psm.to_string()])
            .arg("tsv")
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    Err(CapabilityError::ExecutionFailed(format!(
                        "tesseract failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    )))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CapabilityError::ToolNotFound(
                    "tesseract (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(CapabilityError::Io(e)),
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(
        &self,
        image: &DynamicImage,
        params: &RecognitionParams,
    ) -> Result<RecognizedPage, CapabilityError> {
        let temp_dir = TempDir::new()?;
        let image_path = temp_dir.path().join("page.png");
        image.save(&image_path).map_err(|e| {
            CapabilityError::ExecutionFailed(format!("cannot save recognition input: {}", e))
        })?;

        let tsv = self.run_tesseract(&image_path, params)?;
        Ok(parse_tsv(&tsv))
    }
}

/// The tesseract version string, for health reporting.
pub(crate) fn engine_version() -> Option<String> {
    let output = Command::new("tesseract").arg("--version").output().ok()?;
    let text = if output.stdout.is_empty() {
        output.stderr
    } else {
        output.stdout
    };
    let first = String::from_utf8_lossy(&text).lines().next()?.to_string();
    Some(first.trim_start_matches("tesseract").trim().to_string())
}

/// Parse tesseract TSV output into text, mean confidence and the
/// coordinate hierarchy.
///
/// Word rows are level 5; words sharing a line are joined by spaces, the
/// lines of a block (across its paragraphs) by newlines, and blocks by a
/// blank line. Confidence is averaged over words only (conf >= 0).
pub fn parse_tsv(tsv: &str) -> RecognizedPage {
    // block_num -> par_num -> line_num -> words
    let mut grouped: BTreeMap<u32, BTreeMap<u32, BTreeMap<u32, Vec<WordBox>>>> = BTreeMap::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        let level: u32 = match fields[0].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }

        let parse_u32 = |s: &str| s.parse::<u32>().unwrap_or(0);
        let word = WordBox {
            text: text.to_string(),
            left: parse_u32(fields[6]),
            top: parse_u32(fields[7]),
            width: parse_u32(fields[8]),
            height: parse_u32(fields[9]),
            conf: conf.round().max(0.0) as u32,
        };

        grouped
            .entry(parse_u32(fields[2]))
            .or_default()
            .entry(parse_u32(fields[3]))
            .or_default()
            .entry(parse_u32(fields[4]))
            .or_default()
            .push(word);
    }

    let mut blocks = Vec::new();
    let mut block_texts = Vec::new();
    let mut conf_sum = 0.0f64;
    let mut conf_count = 0usize;

    for (block_id, pars) in grouped {
        let mut paragraphs = Vec::new();
        let mut block_lines = Vec::new();

        for (par_id, lines) in pars {
            let mut line_coords = Vec::new();
            for (line_id, words) in lines {
                for w in &words {
                    conf_sum += w.conf as f64;
                    conf_count += 1;
                }
                let text = words
                    .iter()
                    .map(|w| w.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                block_lines.push(text.clone());
                line_coords.push(LineCoordinates {
                    line_id,
                    text,
                    bbox: enclosing_word_bbox(&words),
                    words,
                });
            }
            paragraphs.push(ParagraphCoordinates {
                par_id,
                bbox: enclosing_bbox(line_coords.iter().map(|l| &l.bbox)),
                lines: line_coords,
            });
        }

        blocks.push(BlockCoordinates {
            block_id,
            bbox: enclosing_bbox(paragraphs.iter().map(|p| &p.bbox)),
            paragraphs,
        });
        block_texts.push(block_lines.join("\n"));
    }

    let confidence = if conf_count > 0 {
        (conf_sum / conf_count as f64) as f32
    } else {
        0.0
    };

    RecognizedPage {
        text: block_texts.join("\n\n"),
        confidence,
        blocks,
    }
}
