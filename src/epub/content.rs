//! Lazy chapter content extraction.
//!
//! Chapter HTML stays compressed inside the archive until a chapter is
//! actually opened. Extracted text is cached on the archive handle, keyed by
//! chapter id, for the lifetime of the reading session. Loading never fails:
//! anything that goes wrong produces a reader-facing placeholder string so
//! navigation keeps working.

use crate::chapters::Chapter;
use crate::epub::EpubArchive;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

static RE_SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").unwrap());
static RE_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style>").unwrap());
static RE_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<head\b.*?</head>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Reduce a content document to display text. Script, style and head blocks
/// go first so their contents never leak into the prose, then the remaining
/// tags, then whitespace runs.
pub fn strip_html_to_text(html: &str) -> String {
    let text = RE_SCRIPT.replace_all(html, "");
    let text = RE_STYLE.replace_all(&text, "");
    let text = RE_HEAD.replace_all(&text, "");
    let text = RE_TAG.replace_all(&text, " ");
    RE_WS.replace_all(&text, " ").trim().to_string()
}

/// Return a chapter's plain text, extracting and caching it on first use.
///
/// Total: a missing entry or an entry with no prose yields a descriptive
/// placeholder instead of an error, and placeholders are never cached so a
/// later retry can still succeed.
pub fn load_chapter_content(archive: &EpubArchive, chapter: &Chapter) -> String {
    if let Some(cached) = archive.cached(&chapter.id) {
        debug!(chapter = %chapter.id, "Chapter content cache hit");
        return cached;
    }

    let Some(href) = chapter.href.as_deref().filter(|h| !h.is_empty()) else {
        // The synthetic info chapter and anything else without a locator.
        return archive.info_text().to_string();
    };

    match archive.read_entry(href) {
        Some(html) => {
            let text = strip_html_to_text(&html);
            if text.is_empty() {
                return "章节内容为空".to_string();
            }
            archive.insert_cached(&chapter.id, text.clone());
            debug!(chapter = %chapter.id, chars = text.len(), "Extracted chapter content");
            text
        }
        None => {
            warn!(chapter = %chapter.id, href, "Chapter content file missing from archive");
            format!("无法找到章节 {} 的内容文件。", chapter.title)
        }
    }
}

/// Warm the cache for the chapters next to `current_index`, best effort.
///
/// Runs on detached threads; a stale prefetch after further navigation is
/// harmless because the cache is additive and never evicted. Results are
/// ignored — a prefetch that fails will simply be retried on demand.
pub fn prefetch_adjacent(archive: &Arc<EpubArchive>, chapters: &[Chapter], current_index: usize) {
    let neighbors = [current_index.checked_sub(1), current_index.checked_add(1)];
    for idx in neighbors.into_iter().flatten() {
        let Some(chapter) = chapters.get(idx) else {
            continue;
        };
        if chapter.href.is_none() || archive.cached(&chapter.id).is_some() {
            continue;
        }
        let archive = Arc::clone(archive);
        let chapter = chapter.clone();
        std::thread::spawn(move || {
            debug!(chapter = %chapter.id, "Prefetching adjacent chapter");
            let _ = load_chapter_content(&archive, &chapter);
        });
    }
}
