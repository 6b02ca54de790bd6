//! Small text helpers shared by the reader modules.

/// Default reading speed used by [`estimate_reading_minutes`].
pub const DEFAULT_CHARS_PER_MINUTE: usize = 200;

/// Collapse runs of line breaks and tabs inside a chapter title to single
/// spaces. Titles scraped from headings or HTML often span lines.
pub fn format_chapter_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut in_break = false;
    for ch in title.chars() {
        if matches!(ch, '\r' | '\n' | '\t') {
            in_break = true;
        } else {
            if in_break && !out.is_empty() {
                out.push(' ');
            }
            in_break = false;
            out.push(ch);
        }
    }
    out.trim().to_string()
}

/// Rough reading time in minutes, rounded up. Counts characters, which is
/// close enough for CJK text and an overestimate for spaced scripts.
pub fn estimate_reading_minutes(text: &str, chars_per_minute: usize) -> usize {
    if text.is_empty() {
        return 0;
    }
    let cpm = chars_per_minute.max(1);
    text.chars().count().div_ceil(cpm)
}

/// Format a position within a length as a whole percentage, e.g. `"42%"`.
pub fn progress_percentage(current_position: usize, total_length: usize) -> String {
    if total_length == 0 {
        return "0%".to_string();
    }
    let pct = (current_position as f64 / total_length as f64 * 100.0).round() as u64;
    format!("{}%", pct.min(100))
}
