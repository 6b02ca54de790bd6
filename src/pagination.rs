//! Viewport pagination.
//!
//! Layout is estimated, not measured: a character budget per page is derived
//! from the viewport and font size with fixed empirical factors, then each
//! page boundary is nudged onto a natural break (newline or sentence end)
//! when one is close enough. Pagination is a full recompute — it is cheap at
//! chapter granularity, and triggered whenever font size or viewport change.

use tracing::debug;

/// Minimum allowed font size (points).
pub const MIN_FONT_SIZE: f32 = 12.0;
/// Maximum allowed font size (points).
pub const MAX_FONT_SIZE: f32 = 36.0;

/// Horizontal padding reserved around the text column.
const H_MARGIN: f32 = 32.0;
/// Vertical space reserved for navigation chrome.
const V_RESERVED: f32 = 100.0;
/// Average glyph width as a fraction of the font size.
const CHAR_WIDTH_FACTOR: f32 = 0.6;
/// Line height as a fraction of the font size.
const LINE_HEIGHT_FACTOR: f32 = 1.6;

/// How far forward to look for a newline to break at.
const NEWLINE_LOOKAHEAD: usize = 100;
/// How far forward to look for a sentence-ending period.
const PERIOD_LOOKAHEAD: usize = 50;
/// How far backward to look for a newline.
const NEWLINE_LOOKBACK: usize = 100;

/// One derived page. Never persisted; recomputed per layout change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub text: String,
}

/// Split `content` into pages sized for the given viewport and font.
///
/// Pages are contiguous and lossless: concatenating their text reproduces
/// the input. Boundaries prefer, in order, a newline shortly ahead, a `。`
/// shortly ahead, then a newline shortly behind the raw character budget.
pub fn paginate(content: &str, viewport_width: f32, viewport_height: f32, font_size: f32) -> Vec<Page> {
    if content.is_empty() {
        return vec![Page {
            index: 0,
            text: String::new(),
        }];
    }

    let font_size = font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
    let available_width = (viewport_width - H_MARGIN).max(font_size);
    let available_height = (viewport_height - V_RESERVED).max(font_size);

    let chars_per_line = (available_width / (font_size * CHAR_WIDTH_FACTOR)).floor() as usize;
    let lines_per_page = (available_height / (font_size * LINE_HEIGHT_FACTOR)).floor() as usize;
    let chars_per_page = (chars_per_line.max(1) * lines_per_page.max(1)).max(1);

    let chars: Vec<char> = content.chars().collect();
    let offsets: Vec<usize> = content.char_indices().map(|(i, _)| i).collect();
    let total = chars.len();
    let byte_at = |i: usize| offsets.get(i).copied().unwrap_or(content.len());

    let mut pages = Vec::new();
    let mut start = 0usize;
    while start < total {
        let raw_end = (start + chars_per_page).min(total);
        let mut end = if raw_end < total {
            soft_break(&chars, raw_end, total)
        } else {
            raw_end
        };
        // Soft breaks must still make forward progress.
        if end <= start {
            end = raw_end;
        }
        pages.push(Page {
            index: pages.len(),
            text: content[byte_at(start)..byte_at(end)].to_string(),
        });
        start = end;
    }

    debug!(
        pages = pages.len(),
        chars_per_page, chars_per_line, lines_per_page, "Paginated content"
    );
    pages
}

/// Nudge a raw boundary onto a natural break near it, in character units.
fn soft_break(chars: &[char], raw_end: usize, total: usize) -> usize {
    // Forward newline first: finishing the paragraph reads best.
    if let Some(pos) = chars[raw_end..total.min(raw_end + NEWLINE_LOOKAHEAD)]
        .iter()
        .position(|&c| c == '\n')
    {
        return raw_end + pos + 1;
    }
    // Then a close sentence end.
    if let Some(pos) = chars[raw_end..total.min(raw_end + PERIOD_LOOKAHEAD)]
        .iter()
        .position(|&c| c == '。')
    {
        return raw_end + pos + 1;
    }
    // Then a newline shortly behind.
    let back_start = raw_end.saturating_sub(NEWLINE_LOOKBACK);
    if let Some(pos) = chars[back_start..=raw_end.min(total - 1)]
        .iter()
        .rposition(|&c| c == '\n')
    {
        return back_start + pos + 1;
    }
    raw_end
}
