//! Heuristic chapter extraction for unstructured plain text.
//!
//! Plain-text books carry no table of contents, so chapter boundaries are
//! inferred by running an ordered list of heading patterns over the whole
//! document and filtering the candidates. The function is total: any input,
//! including the empty string, yields at least one chapter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Minimum distance (in characters) between two accepted headings. Anything
/// closer is assumed to be a false positive rather than a real chapter.
pub const MIN_CHAPTER_CHARS: usize = 1000;
/// Documents shorter than this never get synthetic chapters.
const SYNTHETIC_SPLIT_THRESHOLD: usize = 5000;
/// Paragraphs per synthetic chapter when no headings are found.
const PARAGRAPHS_PER_CHAPTER: usize = 20;
/// Candidates starting within this many bytes past a kept heading are
/// treated as sub-matches of the same heading.
const MERGE_SLACK: usize = 10;
/// Matches this long are paragraphs, not headings.
const MAX_HEADING_CHARS: usize = 100;

/// A chapter of a book.
///
/// For plain text, `start_position`/`end_position` are byte offsets into the
/// source string and `href` is `None`. For EPUB chapters they are spine
/// ordinals (`i`/`i + 1`) and `href` locates the content document inside the
/// archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub start_position: usize,
    pub end_position: usize,
    pub href: Option<String>,
}

/// Ordered heading rules, most specific first. Each rule is independent so
/// new heuristics can be added without touching the merge/filter stages.
static HEADING_RULES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        // 第1章 / 第一章 / 第十二节 / 第三回 and friends.
        (
            "numbered",
            Regex::new(r"第[一二三四五六七八九十百千万\d]+[章节回集卷][^。\n]{0,50}[\r\n]").unwrap(),
        ),
        // Volume headings (第一卷 风起).
        (
            "volume",
            Regex::new(r"第[一二三四五六七八九十百千万\d]+卷[^。\n]{0,50}[\r\n]").unwrap(),
        ),
        // 章节1: / 章一、 style labels.
        (
            "labeled",
            Regex::new(r"[章节][一二三四五六七八九十百千万\d]+[：:\s][^。\n]{0,50}[\r\n]").unwrap(),
        ),
        // English "Chapter 12" lines.
        (
            "ascii-chapter",
            Regex::new(r"(?mi)^[ \t]*chapter[ \t]+\d+[^。\r\n]{0,50}[\r\n]").unwrap(),
        ),
        // Line-initial numeric list markers (1. xxx / 12、xxx).
        (
            "numeric-marker",
            Regex::new(r"(?m)^\d+[、.．：:\s][^。\n]{0,50}[\r\n]").unwrap(),
        ),
        // Line-initial Chinese-numeral markers (一、xxx).
        (
            "cn-numeral-marker",
            Regex::new(r"(?m)^[一二三四五六七八九十][、.．：:\s][^。\n]{0,50}[\r\n]").unwrap(),
        ),
        // Decorative separator lines (*** / === / ---).
        (
            "separator",
            Regex::new(r"(?m)^[*=-]{3,}[^。\n]{0,50}[\r\n]").unwrap(),
        ),
        // Short standalone lines that look like titles.
        (
            "short-line",
            Regex::new(r"(?m)^[^\r\n]{1,20}\r?\n").unwrap(),
        ),
    ]
});

struct Candidate {
    title: String,
    offset: usize,
    len: usize,
}

/// Extract chapters from raw text. Deterministic and infallible; when no
/// plausible headings survive filtering the document is split into synthetic
/// chapters, or kept whole when it is short.
pub fn extract(content: &str) -> Vec<Chapter> {
    let candidates = collect_candidates(content);
    let merged = merge_overlapping(candidates);
    let mut accepted = filter_by_spacing(content, merged);

    if accepted.is_empty() {
        let total_chars = content.chars().count();
        if total_chars < SYNTHETIC_SPLIT_THRESHOLD {
            debug!(total_chars, "No headings found; keeping document whole");
            return vec![whole_document(content)];
        }
        accepted = synthetic_candidates(content);
        debug!(count = accepted.len(), "Falling back to synthetic chapters");
        if accepted.is_empty() {
            return vec![whole_document(content)];
        }
    }

    let mut chapters: Vec<Chapter> = accepted
        .into_iter()
        .enumerate()
        .map(|(i, c)| Chapter {
            id: format!("chapter-{i}"),
            title: c.title,
            start_position: c.offset,
            end_position: content.len(),
            href: None,
        })
        .collect();

    for i in 0..chapters.len().saturating_sub(1) {
        chapters[i].end_position = chapters[i + 1].start_position.saturating_sub(1);
    }
    chapters
}

fn collect_candidates(content: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (name, rule) in HEADING_RULES.iter() {
        let mut hits = 0usize;
        for m in rule.find_iter(content) {
            if m.as_str().chars().count() >= MAX_HEADING_CHARS {
                continue;
            }
            let title = m.as_str().trim();
            if title.is_empty() {
                continue;
            }
            candidates.push(Candidate {
                title: title.to_string(),
                offset: m.start(),
                len: m.end() - m.start(),
            });
            hits += 1;
        }
        if hits > 0 {
            debug!(rule = name, hits, "Heading rule matched");
        }
    }
    candidates.sort_by_key(|c| c.offset);
    candidates
}

/// Keep the earliest candidate of each overlapping cluster; later candidates
/// starting inside a kept heading (plus a little slack) are duplicates from
/// other rules matching the same line.
fn merge_overlapping(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        match kept.last() {
            Some(last) if candidate.offset < last.offset + last.len + MERGE_SLACK => {}
            _ => kept.push(candidate),
        }
    }
    kept
}

/// Accept a candidate only if the run of text it introduces (up to the next
/// candidate, or end of document) is at least [`MIN_CHAPTER_CHARS`] long.
/// Known limitation: genuinely short chapters (poetry, anthologies) are
/// swallowed by this filter together with their neighbors' text.
fn filter_by_spacing(content: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut accepted = Vec::new();
    for i in 0..candidates.len() {
        let span_chars = match candidates.get(i + 1) {
            Some(next) => content[candidates[i].offset..next.offset].chars().count(),
            None => content[candidates[i].offset..].chars().count(),
        };
        if span_chars >= MIN_CHAPTER_CHARS {
            let c = &candidates[i];
            accepted.push(Candidate {
                title: c.title.clone(),
                offset: c.offset,
                len: c.len,
            });
        }
    }
    accepted
}

/// Split every [`PARAGRAPHS_PER_CHAPTER`] paragraphs. The first boundary is
/// skipped: the opening run of paragraphs is treated as front matter rather
/// than a chapter of its own, matching how un-headed books usually read.
fn synthetic_candidates(content: &str) -> Vec<Candidate> {
    static RE_BLANK_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

    let mut starts = Vec::new();
    let mut cursor = 0usize;
    for gap in RE_BLANK_GAP.find_iter(content) {
        starts.push(cursor);
        cursor = gap.end();
    }
    starts.push(cursor);

    let mut candidates = Vec::new();
    let mut i = PARAGRAPHS_PER_CHAPTER;
    while i < starts.len() {
        let offset = starts[i];
        // A trailing blank gap leaves an empty last "paragraph" at EOF.
        if offset > 0 && offset < content.len() {
            candidates.push(Candidate {
                title: format!("第{}章", i / PARAGRAPHS_PER_CHAPTER + 1),
                offset,
                len: 0,
            });
        }
        i += PARAGRAPHS_PER_CHAPTER;
    }
    candidates
}

fn whole_document(content: &str) -> Chapter {
    Chapter {
        id: "chapter-0".to_string(),
        title: "全文".to_string(),
        start_position: 0,
        end_position: content.len(),
        href: None,
    }
}

/// Slice a plain-text chapter out of the source document. `end_position` is
/// inclusive-style (`next.start - 1`), so the exclusive end is one past it,
/// capped at the document length and walked back onto a char boundary.
pub fn chapter_text<'a>(content: &'a str, chapter: &Chapter) -> &'a str {
    let start = chapter.start_position.min(content.len());
    let mut end = chapter
        .end_position
        .saturating_add(1)
        .min(content.len())
        .max(start);
    while end > start && !content.is_char_boundary(end) {
        end -= 1;
    }
    &content[start..end]
}
