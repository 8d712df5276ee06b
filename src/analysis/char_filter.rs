//! Char filters rewrite the raw text before it reaches the tokenizer.
//!
//! A char filter returns the rewritten text together with the list of
//! [`Transformation`]s it applied, so that token offsets computed against the
//! rewritten text can be mapped back into the raw input with
//! [`correct_offset`].
//!
//! # Available Filters
//!
//! - [`html_strip::HtmlStripCharFilter`] - Removes markup and decodes entities

pub mod html_strip;

/// Represents a change in the text, mapping a range in the original text
/// to a range in the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformation {
    pub original_start: usize,
    pub original_end: usize,
    pub new_start: usize,
    pub new_end: usize,
}

impl Transformation {
    pub fn new(
        original_start: usize,
        original_end: usize,
        new_start: usize,
        new_end: usize,
    ) -> Self {
        Self {
            original_start,
            original_end,
            new_start,
            new_end,
        }
    }

    fn original_len(&self) -> usize {
        self.original_end - self.original_start
    }

    fn new_len(&self) -> usize {
        self.new_end - self.new_start
    }
}

/// Maps an offset in the filtered text back to the original text.
///
/// `transformations` must be ordered by position. End offsets (`is_end`)
/// stay in front of a removed region that starts exactly at the offset, while
/// start offsets move past it.
pub fn correct_offset(offset: usize, transformations: &[Transformation], is_end: bool) -> usize {
    let mut corrected = offset as isize;
    for t in transformations {
        if offset < t.new_start || (is_end && t.new_len() == 0 && offset == t.new_start) {
            break;
        }
        if offset >= t.new_end {
            corrected += t.original_len() as isize - t.new_len() as isize;
        } else {
            // Strictly inside a replacement: snap to where it began.
            return t.original_start;
        }
    }
    corrected.max(0) as usize
}
