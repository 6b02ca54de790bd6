//! Chapter title cleaning.
//!
//! EPUB chapter titles come from wherever they can be scavenged — `<h1>`
//! headings, `<title>` tags, or raw filenames like `003_chapter_three.xhtml`.
//! [`clean_title`] normalizes all of these into a readable `第N章`-style
//! title. It is pure and total: the worst case is the trimmed input.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static RE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(x?html|htm|xhtml)$").unwrap());
static RE_WELL_FORMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(第|卷|册|部|篇)\s*[一二三四五六七八九十百千万\d]+\s*(章|节|卷|部|篇|话|回)")
        .unwrap()
});
static RE_VOLUME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(第|卷|册)\s*([一二三四五六七八九十百千万\d]+)\s*(卷|册|部|篇)").unwrap()
});
static RE_CHAPTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(chapter|第|章)\s*([一二三四五六七八九十百千万\d]+)\s*(章|节)?").unwrap()
});
static RE_PURE_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static RE_COMMON_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)[\s._:：-]+(.+)$").unwrap());
static RE_LEADING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s._:：-]+").unwrap());
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_-]").unwrap());
static RE_HTML_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)&[a-z]+;").unwrap());
static RE_MULTI_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_MEANINGLESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(chapter|section|part|chap|ch)$").unwrap());

static RE_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").unwrap());
static RE_TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Normalize a scavenged chapter title. Idempotent for its own output.
pub fn clean_title(title: &str) -> String {
    let cleaned: String = title.trim().nfc().collect();
    let cleaned = RE_EXTENSION.replace(&cleaned, "").trim().to_string();
    if cleaned.is_empty() {
        return cleaned;
    }

    // Already a well-formed 第N章/第N卷 style title: keep it untouched.
    if RE_WELL_FORMED.is_match(&cleaned) {
        return cleaned;
    }

    // Volume marker buried in the name: pull it to the front.
    if let Some(caps) = RE_VOLUME.captures(&cleaned) {
        let number = caps.get(2).map_or("", |m| m.as_str());
        let volume_type = caps.get(3).map_or("卷", |m| m.as_str());
        let rest = tidy_remaining(&RE_VOLUME.replace(&cleaned, ""));
        return if rest.chars().count() > 1 {
            format!("第{number}{volume_type} {rest}")
        } else {
            format!("第{number}{volume_type}")
        };
    }

    // Chapter marker, Chinese or English ("Chapter 12 - ...").
    if let Some(caps) = RE_CHAPTER.captures(&cleaned) {
        let number = caps.get(2).map_or("", |m| m.as_str());
        let rest = tidy_remaining(&RE_CHAPTER.replace(&cleaned, ""));
        return if rest.chars().count() > 1 {
            format!("第{number}章 {rest}")
        } else {
            format!("第{number}章")
        };
    }

    // Bare numeric names ("001", "42").
    if RE_PURE_NUMERIC.is_match(&cleaned) {
        return format!("第{}章", strip_leading_zeros(&cleaned));
    }

    // "012 - Some Title" style names.
    if let Some(caps) = RE_COMMON_FORMAT.captures(&cleaned) {
        let number = strip_leading_zeros(caps.get(1).map_or("", |m| m.as_str()));
        let rest = tidy_remaining(caps.get(2).map_or("", |m| m.as_str()));
        if rest.chars().count() < 2 || RE_MEANINGLESS.is_match(&rest) {
            return format!("第{number}章");
        }
        return format!("第{number}章 {rest}");
    }

    // Nothing recognizable: just normalize separators and entities.
    let spaced = RE_SEPARATORS.replace_all(&cleaned, " ");
    let spaced = RE_HTML_ENTITY.replace_all(&spaced, " ");
    RE_MULTI_WS.replace_all(&spaced, " ").trim().to_string()
}

/// Best-effort chapter title from a content document: `<h1>` first, then
/// `<title>`. Returns the cleaned text, possibly empty.
pub fn extract_title_from_html(html: &str) -> String {
    let raw = RE_H1
        .captures(html)
        .or_else(|| RE_TITLE_TAG.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or("");
    let without_tags = RE_TAG.replace_all(raw, "");
    clean_title(&without_tags)
}

/// A title usable for display: non-empty and not just digits.
pub(crate) fn is_usable_title(title: &str) -> bool {
    !title.is_empty() && !RE_PURE_NUMERIC.is_match(title)
}

fn tidy_remaining(text: &str) -> String {
    let spaced = RE_SEPARATORS.replace_all(text, " ");
    let collapsed = RE_MULTI_WS.replace_all(spaced.trim(), " ").to_string();
    RE_LEADING_PUNCT.replace(&collapsed, "").trim().to_string()
}

fn strip_leading_zeros(digits: &str) -> &str {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() { "0" } else { stripped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_filename_becomes_chapter_title() {
        assert_eq!(clean_title("001_Chapter_One.xhtml"), "第1章 Chapter One");
        assert_eq!(clean_title("012 - 风雪夜.html"), "第12章 风雪夜");
        assert_eq!(clean_title("007"), "第7章");
    }

    #[test]
    fn well_formed_titles_are_preserved() {
        assert_eq!(clean_title("第三卷 风暴将至.html"), "第三卷 风暴将至");
        assert_eq!(clean_title("第5章 重逢"), "第5章 重逢");
        assert_eq!(clean_title("第十二回 大闹天宫"), "第十二回 大闹天宫");
    }

    #[test]
    fn chapter_markers_are_reassembled() {
        assert_eq!(clean_title("Chapter 7 - Dawn.html"), "第7章 Dawn");
        assert_eq!(clean_title("我的第2卷 风暴"), "第2卷 我的 风暴");
    }

    #[test]
    fn unrecognized_names_are_just_normalized() {
        assert_eq!(clean_title("some_odd-name"), "some odd name");
        assert_eq!(clean_title("Fore&nbsp;word"), "Fore word");
        assert_eq!(clean_title(""), "");
        assert_eq!(clean_title("   "), "");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let samples = [
            "001_Chapter_One.xhtml",
            "第三卷 风暴将至.html",
            "Chapter 7 - Dawn.html",
            "012 - 风雪夜.html",
            "007",
            "some_odd-name",
            "序幕",
        ];
        for sample in samples {
            let once = clean_title(sample);
            assert_eq!(clean_title(&once), once, "sample={sample:?}");
        }
    }

    #[test]
    fn html_title_prefers_h1_over_title_tag() {
        let html = "<html><head><title>忽略我</title></head>\
                    <body><h1><span>第一章 初遇</span></h1></body></html>";
        assert_eq!(extract_title_from_html(html), "第一章 初遇");

        let html = "<html><head><title>序幕</title></head><body><p>正文</p></body></html>";
        assert_eq!(extract_title_from_html(html), "序幕");

        assert_eq!(extract_title_from_html("<p>无标题</p>"), "");
    }

    #[test]
    fn usable_title_rejects_empty_and_pure_digits() {
        assert!(is_usable_title("第1章"));
        assert!(!is_usable_title(""));
        assert!(!is_usable_title("0042"));
    }
}
