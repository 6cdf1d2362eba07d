//! PDF splitting via poppler's pdftoppm and pdfinfo.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use super::PageRenderer;
use crate::error::CapabilityError;
use crate::models::PageImage;

/// Page splitter backed by the poppler command line tools.
///
/// The thread hint is honored the way pdf2image does it: the page range is
/// partitioned into contiguous chunks and one pdftoppm process renders
/// each chunk into its own scratch subdirectory. Every render gets a
/// request-scoped TempDir; the guard removes it on all exit paths,
/// including errors mid-render.
pub struct PopplerRenderer;

impl PopplerRenderer {
    pub fn new() -> Self {
        Self
    }

    fn write_scratch_pdf(&self, dir: &Path, pdf: &[u8]) -> Result<PathBuf, CapabilityError> {
        if !pdf.starts_with(b"%PDF") {
            return Err(CapabilityError::ExecutionFailed(
                "input is missing the %PDF signature".to_string(),
            ));
        }
        let path = dir.join("input.pdf");
        std::fs::write(&path, pdf)?;
        Ok(path)
    }

    fn page_count_of(&self, pdf_path: &Path) -> Result<u32, CapabilityError> {
        let output = Command::new("pdfinfo").arg(pdf_path).output();
        let output = match output {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CapabilityError::ToolNotFound(
                    "pdfinfo (install poppler-utils)".to_string(),
                ))
            }
            Err(e) => return Err(CapabilityError::Io(e)),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CapabilityError::ExecutionFailed(format!(
                "pdfinfo failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if let Some(rest) = line.strip_prefix("Pages:") {
                return rest.trim().parse().map_err(|_| {
                    CapabilityError::OutputUnparseable(format!("pdfinfo page count: {}", rest))
                });
            }
        }
        Err(CapabilityError::OutputUnparseable(
            "pdfinfo output has no Pages line".to_string(),
        ))
    }

    /// Rendered page files of one chunk directory, in page order.
    fn collect_rendered(&self, dir: &Path) -> Result<Vec<PathBuf>, CapabilityError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "png").unwrap_or(false))
            .collect();
        // pdftoppm zero-pads page numbers, so the lexical order is the
        // page order within one invocation.
        files.sort();
        Ok(files)
    }
}

impl Default for PopplerRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Partition an inclusive page range into at most `parallel` contiguous
/// chunks of near-equal size.
fn chunk_ranges(first: u32, last: u32, parallel: u32) -> Vec<(u32, u32)> {
    let pages = last - first + 1;
    let chunks = parallel.clamp(1, pages);
    let base = pages / chunks;
    let remainder = pages % chunks;

    let mut ranges = Vec::with_capacity(chunks as usize);
    let mut start = first;
    for i in 0..chunks {
        let size = base + u32::from(i < remainder);
        ranges.push((start, start + size - 1));
        start += size;
    }
    ranges
}

impl PageRenderer for PopplerRenderer {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, CapabilityError> {
        let temp_dir = TempDir::new()?;
        let pdf_path = self.write_scratch_pdf(temp_dir.path(), pdf)?;
        self.page_count_of(&pdf_path)
    }

    fn render(
        &self,
        pdf: &[u8],
        dpi: u32,
        thread_hint: u32,
        range: Option<(Option<u32>, Option<u32>)>,
    ) -> Result<Vec<PageImage>, CapabilityError> {
        let temp_dir = TempDir::new()?;
        let pdf_path = self.write_scratch_pdf(temp_dir.path(), pdf)?;

        let total = self.page_count_of(&pdf_path)?;
        if total == 0 {
            return Err(CapabilityError::ExecutionFailed(
                "document has no pages".to_string(),
            ));
        }
        let (first, last) = match range {
            Some((start, end)) => (start.unwrap_or(1), end.unwrap_or(total).min(total)),
            None => (1, total),
        };
        if first < 1 || first > last {
            return Err(CapabilityError::ExecutionFailed(format!(
                "render range {}..={} is empty",
                first, last
            )));
        }

        // One pdftoppm per chunk, all running concurrently.
        let chunks = chunk_ranges(first, last, thread_hint.max(1));
        let mut children = Vec::with_capacity(chunks.len());
        for (idx, &(start, end)) in chunks.iter().enumerate() {
            let chunk_dir = temp_dir.path().join(format!("chunk-{}", idx));
            std::fs::create_dir(&chunk_dir)?;
            let child = Command::new("pdftoppm")
                .args(["-png", "-r", &dpi.to_string()])
                .args(["-f", &start.to_string(), "-l", &end.to_string()])
                .arg(&pdf_path)
                .arg(chunk_dir.join("page"))
                .spawn();
            match child {
                Ok(child) => children.push((chunk_dir, start, child)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(CapabilityError::ToolNotFound(
                        "pdftoppm (install poppler-utils)".to_string(),
                    ))
                }
                Err(e) => return Err(CapabilityError::Io(e)),
            }
        }

        let mut pages = Vec::new();
        for (chunk_dir, chunk_start, mut child) in children {
            let status = child.wait()?;
            if !status.success() {
                return Err(CapabilityError::ExecutionFailed(
                    "pdftoppm failed to render the document".to_string(),
                ));
            }
            for (offset, image_path) in self.collect_rendered(&chunk_dir)?.iter().enumerate() {
                let page_num = chunk_start + offset as u32;
                let image = image::open(image_path).map_err(|e| {
                    CapabilityError::OutputUnparseable(format!(
                        "cannot decode rendered page {}: {}",
                        page_num, e
                    ))
                })?;
                pages.push(PageImage::new(page_num, image));
            }
        }

        if pages.is_empty() {
            return Err(CapabilityError::ExecutionFailed(
                "document produced no page images".to_string(),
            ));
        }
        pages.sort_by_key(|p| p.page_number);

        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_bytes() {
        let renderer = PopplerRenderer::new();
        let temp = TempDir::new().unwrap();
        let err = renderer
            .write_scratch_pdf(temp.path(), b"not a pdf")
            .unwrap_err();
        assert!(matches!(err, CapabilityError::ExecutionFailed(_)));
    }

    #[test]
    fn chunks_cover_range_contiguously() {
        let chunks = chunk_ranges(1, 10, 4);
        assert_eq!(chunks, vec![(1, 3), (4, 6), (7, 8), (9, 10)]);

        let chunks = chunk_ranges(3, 5, 8);
        assert_eq!(chunks, vec![(3, 3), (4, 4), (5, 5)]);

        let chunks = chunk_ranges(2, 2, 1);
        assert_eq!(chunks, vec![(2, 2)]);
    }

    #[test]
    fn collect_rendered_sorts_by_name() {
        let renderer = PopplerRenderer::new();
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("page-02.png"), b"png").unwrap();
        std::fs::write(temp.path().join("page-01.png"), b"png").unwrap();
        std::fs::write(temp.path().join("input.pdf"), b"pdf").unwrap();

        let files = renderer.collect_rendered(temp.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("page-01.png"));
        assert!(files[1].ends_with("page-02.png"));
    }
}
