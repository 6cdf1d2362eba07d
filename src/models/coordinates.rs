//! Coordinate structures for text highlighting.
//!
//! Recognition emits a hierarchy per page: blocks contain paragraphs,
//! paragraphs contain lines, lines contain words. Each level carries the
//! bounding box enclosing its children, so a viewer can highlight at any
//! granularity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// One recognized token with its position and confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    /// Recognized text of the word.
    pub text: String,
    /// X of the left edge, in pixels.
    pub left: u32,
    /// Y of the top edge, in pixels.
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// Recognition confidence, 0-100.
    pub conf: u32,
}

impl WordBox {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox {
            left: self.left,
            top: self.top,
            right: self.left + self.width,
            bottom: self.top + self.height,
        }
    }
}

/// A horizontal run of words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCoordinates {
    /// Line number within its paragraph.
    pub line_id: u32,
    /// Full line text, words joined by spaces.
    pub text: String,
    pub bbox: BoundingBox,
    pub words: Vec<WordBox>,
}

/// A group of lines the recognizer considers one paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParagraphCoordinates {
    pub par_id: u32,
    pub bbox: BoundingBox,
    pub lines: Vec<LineCoordinates>,
}

/// A page region with text (a column, a caption, a stamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockCoordinates {
    pub block_id: u32,
    pub bbox: BoundingBox,
    pub paragraphs: Vec<ParagraphCoordinates>,
}

/// All recognized elements of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCoordinates {
    /// 1-based page number.
    pub page_number: u32,
    /// Final page width in pixels (after any correction).
    pub width: u32,
    pub height: u32,
    pub blocks: Vec<BlockCoordinates>,
}

impl PageCoordinates {
    /// An empty page record, used when recognition fails for a page.
    pub fn empty(page_number: u32, width: u32, height: u32) -> Self {
        Self {
            page_number,
            width,
            height,
            blocks: Vec::new(),
        }
    }

    /// Number of words on this page.
    pub fn word_count(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| &b.paragraphs)
            .flat_map(|p| &p.lines)
            .map(|l| l.words.len())
            .sum()
    }

    /// Flat view over all words on this page, reading order.
    pub fn words(&self) -> Vec<&WordBox> {
        self.blocks
            .iter()
            .flat_map(|b| &b.paragraphs)
            .flat_map(|p| &p.lines)
            .flat_map(|l| &l.words)
            .collect()
    }
}

/// Stored coordinate record for one processed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCoordinates {
    /// Generated document identifier, never reused.
    pub doc_id: String,
    pub created_at: DateTime<Utc>,
    /// Per-page coordinates, ascending page order.
    pub pages: Vec<PageCoordinates>,
}

impl DocumentCoordinates {
    pub fn word_count(&self) -> usize {
        self.pages.iter().map(|p| p.word_count()).sum()
    }
}

/// Box enclosing all the given word boxes.
pub(crate) fn enclosing_word_bbox(words: &[WordBox]) -> BoundingBox {
    enclose(words.iter().map(|w| w.bbox()))
}

/// Box enclosing all the given boxes.
pub(crate) fn enclosing_bbox<'a, I: IntoIterator<Item = &'a BoundingBox>>(boxes: I) -> BoundingBox {
    enclose(boxes.into_iter().copied())
}

fn enclose<I: IntoIterator<Item = BoundingBox>>(boxes: I) -> BoundingBox {
    let mut iter = boxes.into_iter();
    let Some(first) = iter.next() else {
        return BoundingBox::default();
    };
    iter.fold(first, |acc, b| BoundingBox {
        left: acc.left.min(b.left),
        top: acc.top.min(b.top),
        right: acc.right.max(b.right),
        bottom: acc.bottom.max(b.bottom),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, left: u32, top: u32, width: u32, height: u32) -> WordBox {
        WordBox {
            text: text.to_string(),
            left,
            top,
            width,
            height,
            conf: 90,
        }
    }

    #[test]
    fn word_bbox_spans_all_words() {
        let words = vec![word("a", 10, 20, 30, 10), word("b", 50, 15, 25, 12)];
        let bbox = enclosing_word_bbox(&words);
        assert_eq!(
            bbox,
            BoundingBox {
                left: 10,
                top: 15,
                right: 75,
                bottom: 30
            }
        );
    }

    #[test]
    fn empty_inputs_give_zero_bbox() {
        assert_eq!(enclosing_word_bbox(&[]), BoundingBox::default());
        let none: Vec<BoundingBox> = Vec::new();
        assert_eq!(enclosing_bbox(none.iter()), BoundingBox::default());
    }

    #[test]
    fn page_word_count_walks_hierarchy() {
        let line = LineCoordinates {
            line_id: 1,
            text: "a b".to_string(),
            bbox: BoundingBox::default(),
            words: vec![word("a", 0, 0, 5, 5), word("b", 6, 0, 5, 5)],
        };
        let page = PageCoordinates {
            page_number: 1,
            width: 100,
            height: 100,
            blocks: vec![BlockCoordinates {
                block_id: 1,
                bbox: BoundingBox::default(),
                paragraphs: vec![ParagraphCoordinates {
                    par_id: 1,
                    bbox: BoundingBox::default(),
                    lines: vec![line],
                }],
            }],
        };
        assert_eq!(page.word_count(), 2);
        assert_eq!(page.words().len(), 2);
    }
}
