// qr-labels: caption wrapping and auto-sizing
//
// A caption is the operator's free text wrapped to at most `max_lines`
// lines, followed by one bold identity line. The wrap width is the
// narrowest one that does not elide trailing words; the font size is the
// largest one (in 0.5pt steps) at which the longest line fits the label.

use crate::fonts::TextMeasure;
use std::collections::HashMap;

/// Appended to the last kept line when words had to be dropped
pub const PLACEHOLDER: &str = " [...]";

/// Font sizes never go below this, whatever the width
pub const MIN_FONT_SIZE: f32 = 4.0;

const FONT_SIZE_STEP: f32 = 0.5;

// ============================================================================
// Word Wrapping
// ============================================================================

/// Greedy word wrap to `width` characters and at most `max_lines` lines.
///
/// Words longer than `width` are broken, hyphenated words may break after
/// a hyphen, and text that does not fit in `max_lines` ends with
/// [`PLACEHOLDER`].
pub fn wrap(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut chunks = split_chunks(text);
    chunks.reverse();
    let placeholder_len = char_len(PLACEHOLDER);

    let mut lines: Vec<String> = Vec::new();
    while !chunks.is_empty() {
        let mut cur_line: Vec<String> = Vec::new();
        let mut cur_len = 0usize;

        // Leading whitespace is dropped on every line but the first.
        if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
            chunks.pop();
        }

        while let Some(chunk) = chunks.last() {
            let len = char_len(chunk);
            if cur_len + len > width {
                break;
            }
            cur_len += len;
            cur_line.extend(chunks.pop());
        }

        if chunks.last().is_some_and(|c| char_len(c) > width) {
            break_long_word(&mut chunks, &mut cur_line, cur_len, width);
            cur_len = cur_line.iter().map(|c| char_len(c)).sum();
        }

        if cur_line.last().is_some_and(|c| is_blank(c)) {
            if let Some(blank) = cur_line.pop() {
                cur_len -= char_len(&blank);
            }
        }

        if cur_line.is_empty() {
            continue;
        }

        let only_trailing_space = chunks.is_empty() || (chunks.len() == 1 && is_blank(&chunks[0]));
        if lines.len() + 1 < max_lines || (only_trailing_space && cur_len <= width) {
            lines.push(cur_line.concat());
            continue;
        }

        // Out of lines: keep what fits in front of the placeholder.
        loop {
            let fits = cur_line
                .last()
                .map(|last| !is_blank(last) && cur_len + placeholder_len <= width);
            match fits {
                Some(true) => {
                    cur_line.push(PLACEHOLDER.to_string());
                    lines.push(cur_line.concat());
                    break;
                }
                Some(false) => {
                    if let Some(dropped) = cur_line.pop() {
                        cur_len -= char_len(&dropped);
                    }
                }
                None => {
                    if let Some(prev) = lines.last_mut() {
                        let trimmed = prev.trim_end().to_string();
                        if char_len(&trimmed) + placeholder_len <= width {
                            *prev = trimmed + PLACEHOLDER;
                            break;
                        }
                    }
                    lines.push(PLACEHOLDER.trim_start().to_string());
                    break;
                }
            }
        }
        break;
    }

    lines
}

/// Split into alternating whitespace runs and words, breaking words
/// after hyphens that join two alphabetic runs.
fn split_chunks(text: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_blank = false;

    for c in text.chars() {
        let blank = c.is_whitespace();
        let c = if blank { ' ' } else { c };
        if !current.is_empty() && blank != current_blank {
            chunks.push(std::mem::take(&mut current));
        }
        current_blank = blank;
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .flat_map(|chunk| {
            if is_blank(&chunk) {
                vec![chunk]
            } else {
                split_hyphenated(&chunk)
            }
        })
        .collect()
}

fn split_hyphenated(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    let letter_at = |j: usize| chars.get(j).is_some_and(|c| is_letter(*c));

    for i in 0..chars.len() {
        if chars[i] != '-' || i < 2 {
            continue;
        }
        // Two letters before the hyphen, or a letter and an earlier hyphen.
        let after_word = letter_at(i - 1)
            && (letter_at(i - 2) || (i >= 3 && chars[i - 2] == '-' && letter_at(i - 3)));
        // A letter follows, then a letter or a hyphen and a letter.
        let before_word = letter_at(i + 1)
            && (letter_at(i + 2) || (chars.get(i + 2) == Some(&'-') && letter_at(i + 3)));
        if after_word && before_word {
            parts.push(chars[start..=i].iter().collect());
            start = i + 1;
        }
    }
    parts.push(chars[start..].iter().collect());
    parts
}

/// Word characters that are not digits.
fn is_letter(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn break_long_word(chunks: &mut Vec<String>, cur_line: &mut Vec<String>, cur_len: usize, width: usize) {
    let space_left = if width < 1 { 1 } else { width.saturating_sub(cur_len) };
    let Some(chunk) = chunks.pop() else {
        return;
    };
    let chars: Vec<char> = chunk.chars().collect();

    // Prefer breaking just after the last hyphen that fits.
    let mut end = space_left;
    if chars.len() > space_left {
        if let Some(hyphen) = chars[..space_left].iter().rposition(|&c| c == '-') {
            if hyphen > 0 && chars[..hyphen].iter().any(|&c| c != '-') {
                end = hyphen + 1;
            }
        }
    }
    let end = end.min(chars.len());

    cur_line.push(chars[..end].iter().collect());
    let rest: String = chars[end..].iter().collect();
    if !rest.is_empty() {
        chunks.push(rest);
    }
}

fn is_blank(chunk: &str) -> bool {
    chunk.trim().is_empty()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ============================================================================
// Wrap-Width Search
// ============================================================================

/// Narrowest wrap width at which `text` fits `max_lines` lines without
/// ending in [`PLACEHOLDER`].
///
/// Starts at the placeholder's own width and grows by one; bounded by the
/// text length, at which the whole text fits on one line.
pub fn optimal_wrap_width(text: &str, max_lines: usize) -> usize {
    let marker = PLACEHOLDER.trim_start();
    let start = char_len(marker);
    let limit = char_len(text).max(start);

    (start..=limit)
        .find(|&width| {
            wrap(text, width, max_lines)
                .last()
                .map_or(true, |last| !last.ends_with(marker))
        })
        .unwrap_or(limit)
}

/// Per-job memo of [`optimal_wrap_width`], keyed by text and line budget.
#[derive(Debug, Default)]
pub struct WrapCache {
    widths: HashMap<(String, usize), usize>,
}

impl WrapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap_width(&mut self, text: &str, max_lines: usize) -> usize {
        *self
            .widths
            .entry((text.to_string(), max_lines))
            .or_insert_with(|| optimal_wrap_width(text, max_lines))
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }
}

// ============================================================================
// Font-Size Search
// ============================================================================

/// Largest size in `[MIN_FONT_SIZE, max_font_size]`, stepping down by 0.5pt,
/// at which `text` is no wider than `max_width` points.
pub fn fit_font_size(text: &str, measure: &dyn TextMeasure, max_width: f32, max_font_size: f32) -> f32 {
    let mut size = max_font_size;
    while size >= MIN_FONT_SIZE {
        if measure.text_width(text, size) <= max_width {
            return size;
        }
        size -= FONT_SIZE_STEP;
    }
    MIN_FONT_SIZE
}

// ============================================================================
// Caption Fitting
// ============================================================================

/// Bounding box and limits of one label's caption.
#[derive(Debug, Clone, Copy)]
pub struct CaptionBox {
    pub max_lines: usize,
    /// Widest allowed line, in points
    pub max_width: f32,
    pub max_font_size: f32,
}

/// Caption ready to draw: `body` lines in the regular weight, then
/// `identity` in bold, all at `font_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedCaption {
    pub body: Vec<String>,
    pub identity: String,
    pub font_size: f32,
}

impl FittedCaption {
    pub fn line_count(&self) -> usize {
        self.body.len() + 1
    }
}

/// Wrap `text`, append `identity`, and size the block so its longest line
/// (by character count) fits `bounds.max_width` in the `measure` face.
pub fn fit_caption(
    text: &str,
    identity: &str,
    bounds: CaptionBox,
    measure: &dyn TextMeasure,
    cache: &mut WrapCache,
) -> FittedCaption {
    let max_lines = bounds.max_lines.max(1);
    let width = cache.wrap_width(text, max_lines);
    let body = wrap(text, width, max_lines);

    let longest = body
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(identity))
        .fold("", |longest, line| {
            if char_len(line) > char_len(longest) {
                line
            } else {
                longest
            }
        });
    let font_size = fit_font_size(longest, measure, bounds.max_width, bounds.max_font_size);

    FittedCaption {
        body,
        identity: identity.to_string(),
        font_size,
    }
}
