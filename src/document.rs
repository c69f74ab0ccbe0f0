//! Page-tagged document model and the assembler that flattens it for prompts.
//!
//! Extraction backends never build the prompt string themselves: they hand
//! their per-unit text to [`Document::from_units`] (paginated formats) or
//! [`Document::unpaginated`] (DOCX), and the prompt builder only ever sees
//! [`Document::assemble`]. Keeping the join rule in one pure function makes the
//! prompt reproducible for a given upload.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between two assembled segments (a blank line).
pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// One page or slide worth of text.
///
/// `page` is the 1-based position in the source, or `None` for formats with
/// no intrinsic pagination. `text` is always trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSegment {
    pub page: Option<u32>,
    pub text: String,
}

impl PageSegment {
    /// Build a segment, returning `None` when the trimmed text is empty.
    pub fn new(page: Option<u32>, text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self {
                page,
                text: trimmed.to_string(),
            })
        }
    }

    /// Render the segment as it appears in the prompt.
    fn render(&self) -> String {
        match self.page {
            Some(p) => format!("[PAGE {}]\n{}", p, self.text),
            None => self.text.clone(),
        }
    }
}

/// Ordered page segments extracted from one upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Segments in source order.
    pub segments: Vec<PageSegment>,
    /// Pages or slides present in the source; `None` for unpaginated formats.
    pub source_units: Option<u32>,
    /// 1-based numbers of pages/slides that produced no text.
    pub skipped_units: Vec<u32>,
}

impl Document {
    /// Build a paginated document from per-unit text in source order.
    ///
    /// Unit numbers are the 1-based position in `units`; a unit whose text is
    /// blank is recorded in `skipped_units` and leaves a gap in the numbering.
    pub fn from_units<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut doc = Document::default();
        let mut count = 0u32;
        for (idx, text) in units.into_iter().enumerate() {
            let page = idx as u32 + 1;
            count = page;
            match PageSegment::new(Some(page), text.as_ref()) {
                Some(seg) => doc.segments.push(seg),
                None => doc.skipped_units.push(page),
            }
        }
        doc.source_units = Some(count);
        doc
    }

    /// Build an unpaginated document holding at most one segment.
    pub fn unpaginated(text: &str) -> Self {
        Document {
            segments: PageSegment::new(None, text).into_iter().collect(),
            source_units: None,
            skipped_units: Vec::new(),
        }
    }

    /// `true` when no segment carries any text.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Join every segment into the page-delimited prompt string.
    ///
    /// `"[PAGE p]\n{text}"` for paginated segments, the bare text otherwise,
    /// separated by a blank line.
    pub fn assemble(&self) -> String {
        self.segments
            .iter()
            .map(PageSegment::render)
            .collect::<Vec<_>>()
            .join(SEGMENT_SEPARATOR)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.assemble())
    }
}
