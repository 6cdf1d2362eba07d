//! Page selection and its resolution against a concrete document.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Which pages of a document to process.
///
/// Resolution priority:
///   1. `pages`: explicit page numbers, e.g. [1, 3, 5]
///   2. `page_start`/`page_end`: an inclusive 1-based range
///   3. neither: all pages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSelection {
    /// Explicit page numbers. Takes priority over the range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<u32>>,
    /// First page of the range (defaults to 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_start: Option<u32>,
    /// Last page of the range, inclusive (defaults to the last page).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,
}

impl PageSelection {
    /// Select every page.
    pub fn all() -> Self {
        Self::default()
    }

    /// Select an explicit set of pages.
    pub fn pages(pages: Vec<u32>) -> Self {
        Self {
            pages: Some(pages),
            ..Self::default()
        }
    }

    /// Select an inclusive range.
    pub fn range(start: Option<u32>, end: Option<u32>) -> Self {
        Self {
            pages: None,
            page_start: start,
            page_end: end,
        }
    }

    /// Resolve to a strictly ascending list of page numbers in
    /// [1, total_pages]. Out-of-range numbers and inverted ranges are
    /// rejected, never clamped.
    pub fn resolve(&self, total_pages: u32) -> Result<Vec<u32>, PipelineError> {
        if total_pages == 0 {
            return Err(PipelineError::InvalidSelection(
                "document has no pages".to_string(),
            ));
        }

        if let Some(pages) = &self.pages {
            if pages.is_empty() {
                return Err(PipelineError::InvalidSelection(
                    "explicit page list is empty".to_string(),
                ));
            }
            let mut resolved = pages.clone();
            resolved.sort_unstable();
            resolved.dedup();
            for &page in &resolved {
                if page < 1 || page > total_pages {
                    return Err(PipelineError::InvalidSelection(format!(
                        "page {} is outside 1..={}",
                        page, total_pages
                    )));
                }
            }
            return Ok(resolved);
        }

        if self.page_start.is_some() || self.page_end.is_some() {
            let start = self.page_start.unwrap_or(1);
            let end = self.page_end.unwrap_or(total_pages);
            if start < 1 || end > total_pages || start > end {
                return Err(PipelineError::InvalidSelection(format!(
                    "range {}..={} is outside 1..={}",
                    start, end, total_pages
                )));
            }
            return Ok((start..=end).collect());
        }

        Ok((1..=total_pages).collect())
    }

    /// The contiguous range to render, when the selection is range-shaped.
    ///
    /// Explicit page lists return None: the renderer splits the whole
    /// document and the coordinator filters afterwards.
    pub fn render_range(&self) -> Option<(Option<u32>, Option<u32>)> {
        if self.pages.is_some() {
            return None;
        }
        if self.page_start.is_some() || self.page_end.is_some() {
            Some((self.page_start, self.page_end))
        } else {
            None
        }
    }
}
