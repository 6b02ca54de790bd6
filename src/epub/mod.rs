//! EPUB ingestion.
//!
//! An EPUB is a zip archive with an XML package document describing a
//! manifest (every file in the package) and a spine (reading order). Real
//! files are frequently missing pieces of that structure, so parsing
//! degrades through three tiers instead of failing:
//!
//! 1. container.xml → package document → spine-ordered chapters,
//! 2. a sweep over loose `.html`/`.xhtml` entries sorted by path,
//! 3. a single synthetic chapter carrying the book info.
//!
//! The only hard failure is an archive that is not a readable zip at all.

pub mod content;
pub mod titles;

use crate::chapters::Chapter;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use content::strip_html_to_text;
use titles::{clean_title, extract_title_from_html, is_usable_title};

const COMMON_OPF_PATHS: [&str; 3] = ["content.opf", "OEBPS/content.opf", "OPS/content.opf"];

static RE_ROOTFILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<rootfile\b[^>]*\bfull-path=["']([^"']*)["']"#).unwrap());
static RE_ITEM_ID_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<item\b[^>]*\bid=["']([^"']*)["'][^>]*\bhref=["']([^"']*)["']"#).unwrap()
});
static RE_ITEM_HREF_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<item\b[^>]*\bhref=["']([^"']*)["'][^>]*\bid=["']([^"']*)["']"#).unwrap()
});
static RE_ITEMREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<itemref\b[^>]*\bidref=["']([^"']*)["']"#).unwrap());
static RE_DC_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<dc:title[^>]*>(.*?)</dc:title>").unwrap());
static RE_DC_CREATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<dc:creator[^>]*>(.*?)</dc:creator>").unwrap());

/// A parsed EPUB: the chapter list plus the shared archive handle the
/// content loader reads from.
pub struct EpubBook {
    pub chapters: Vec<Chapter>,
    pub title: String,
    pub author: String,
    pub archive: Arc<EpubArchive>,
}

impl EpubBook {
    /// Text to show before the reader picks a chapter: the eagerly
    /// extracted first chapter, or the info summary when there is none.
    pub fn initial_content(&self) -> String {
        self.chapters
            .first()
            .and_then(|c| self.archive.cached(&c.id))
            .unwrap_or_else(|| self.archive.info_text().to_string())
    }
}

/// Owns the open archive and the per-session chapter content cache.
///
/// The cache is insert-only and keyed by chapter id; re-extracting a chapter
/// produces the same string, so concurrent loads need no coordination beyond
/// the mutex itself.
pub struct EpubArchive {
    zip: Mutex<ZipArchive<Cursor<Vec<u8>>>>,
    title: String,
    author: String,
    info_text: String,
    cache: Mutex<HashMap<String, String>>,
}

impl EpubArchive {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    /// Summary used for the `epub-info` fallback chapter.
    pub fn info_text(&self) -> &str {
        &self.info_text
    }

    pub fn cached(&self, chapter_id: &str) -> Option<String> {
        lock_unpoisoned(&self.cache).get(chapter_id).cloned()
    }

    pub(crate) fn insert_cached(&self, chapter_id: &str, text: String) {
        lock_unpoisoned(&self.cache)
            .entry(chapter_id.to_string())
            .or_insert(text);
    }

    pub(crate) fn read_entry(&self, name: &str) -> Option<String> {
        read_zip_entry(&mut lock_unpoisoned(&self.zip), name)
    }
}

/// The cache and archive are read-then-write idempotent, so a thread that
/// panicked mid-insert leaves nothing worth rejecting the lock over.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Parse an EPUB from raw bytes.
///
/// Fails only when the bytes are not a readable zip archive; every narrower
/// defect (missing container, empty spine, unparsable chapter files)
/// degrades through the fallback tiers and still yields at least one
/// chapter.
pub fn parse_epub(bytes: Vec<u8>) -> Result<EpubBook> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).context("Opening EPUB archive")?;
    let entry_names: Vec<String> = zip.file_names().map(str::to_string).collect();

    let mut title = "未知书名".to_string();
    let mut author = "未知作者".to_string();
    let mut chapters = Vec::new();
    let mut first_content: Option<(String, String)> = None;

    if let Some((opf_path, opf_xml)) = locate_package_document(&mut zip, &entry_names) {
        if let Some(t) = capture_text(&RE_DC_TITLE, &opf_xml) {
            let cleaned = clean_title(&t);
            if !cleaned.is_empty() {
                title = cleaned;
            }
        }
        if let Some(a) = capture_text(&RE_DC_CREATOR, &opf_xml) {
            let cleaned = clean_title(&a);
            if !cleaned.is_empty() {
                author = cleaned;
            }
        }

        let manifest = manifest_map(&opf_xml);
        let folder = package_folder(&opf_path);
        for idref in spine_order(&opf_xml) {
            let Some(href) = manifest.get(&idref) else {
                debug!(%idref, "Spine entry missing from manifest");
                continue;
            };
            let full_path = format!("{folder}{href}");
            let index = chapters.len();
            let html = read_zip_entry(&mut zip, &full_path);
            let chapter_title = resolve_chapter_title(html.as_deref(), href, index);
            let id = format!("epub-chapter-{index}");
            if index == 0 {
                if let Some(html) = &html {
                    first_content = Some((id.clone(), strip_html_to_text(html)));
                }
            }
            chapters.push(Chapter {
                id,
                title: chapter_title,
                start_position: index,
                end_position: index + 1,
                href: Some(full_path),
            });
        }
        if !chapters.is_empty() {
            debug!(count = chapters.len(), opf = %opf_path, "Built chapters from spine");
        }
    }

    // Tier 2: no usable spine; sweep the archive for content documents and
    // fall back to path order.
    if chapters.is_empty() {
        let mut html_entries: Vec<&String> = entry_names
            .iter()
            .filter(|name| is_content_document(name))
            .collect();
        html_entries.sort();
        for name in html_entries {
            let index = chapters.len();
            let html = read_zip_entry(&mut zip, name);
            let chapter_title = resolve_chapter_title(html.as_deref(), name, index);
            let id = format!("epub-chapter-{index}");
            if index == 0 {
                if let Some(html) = &html {
                    first_content = Some((id.clone(), strip_html_to_text(html)));
                }
            }
            chapters.push(Chapter {
                id,
                title: chapter_title,
                start_position: index,
                end_position: index + 1,
                href: Some(name.clone()),
            });
        }
        if !chapters.is_empty() {
            warn!(count = chapters.len(), "No spine; built chapters from HTML sweep");
        }
    }

    let info_text = format!("EPUB文件: {title}\n作者: {author}\n\n未能解析章节列表。");

    // Tier 3: nothing at all; a single info chapter keeps the reader usable.
    if chapters.is_empty() {
        warn!("No chapter structure found in EPUB");
        chapters.push(Chapter {
            id: "epub-info".to_string(),
            title: "书籍信息".to_string(),
            start_position: 0,
            end_position: 1,
            href: None,
        });
    }

    let mut cache = HashMap::new();
    if let Some((id, text)) = first_content {
        if !text.is_empty() {
            cache.insert(id, text);
        }
    }

    info!(
        chapters = chapters.len(),
        title = %title,
        author = %author,
        "Parsed EPUB"
    );

    Ok(EpubBook {
        chapters,
        title: title.clone(),
        author: author.clone(),
        archive: Arc::new(EpubArchive {
            zip: Mutex::new(zip),
            title,
            author,
            info_text,
            cache: Mutex::new(cache),
        }),
    })
}

/// Title priority: chapter HTML (`<h1>`, then `<title>`), then the cleaned
/// filename, then a synthetic ordinal. Empty or digit-only results fall
/// through to the next source.
fn resolve_chapter_title(html: Option<&str>, href: &str, index: usize) -> String {
    if let Some(html) = html {
        let from_html = extract_title_from_html(html);
        if is_usable_title(&from_html) {
            return from_html;
        }
    }
    let file_name = href.rsplit('/').next().unwrap_or(href);
    let from_name = clean_title(file_name);
    if is_usable_title(&from_name) {
        return from_name;
    }
    format!("第{}章", index + 1)
}

fn locate_package_document<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    entry_names: &[String],
) -> Option<(String, String)> {
    if let Some(container) = read_zip_entry(zip, "META-INF/container.xml") {
        if let Some(path) = capture_text(&RE_ROOTFILE, &container) {
            if let Some(xml) = read_zip_entry(zip, &path) {
                debug!(%path, "Found package document via container.xml");
                return Some((path, xml));
            }
            warn!(%path, "container.xml points at a missing package document");
        }
    }
    for path in COMMON_OPF_PATHS {
        if let Some(xml) = read_zip_entry(zip, path) {
            debug!(path, "Found package document at a common path");
            return Some((path.to_string(), xml));
        }
    }
    for name in entry_names {
        if name.to_ascii_lowercase().ends_with(".opf") {
            if let Some(xml) = read_zip_entry(zip, name) {
                debug!(%name, "Found package document by extension scan");
                return Some((name.clone(), xml));
            }
        }
    }
    None
}

/// Manifest id → href, accepting the attributes in either order.
fn manifest_map(opf_xml: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for caps in RE_ITEM_ID_HREF.captures_iter(opf_xml) {
        map.entry(caps[1].to_string()).or_insert_with(|| caps[2].to_string());
    }
    for caps in RE_ITEM_HREF_ID.captures_iter(opf_xml) {
        map.entry(caps[2].to_string()).or_insert_with(|| caps[1].to_string());
    }
    map
}

fn spine_order(opf_xml: &str) -> Vec<String> {
    RE_ITEMREF
        .captures_iter(opf_xml)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Folder prefix of the package document; manifest hrefs resolve against it.
fn package_folder(opf_path: &str) -> &str {
    match opf_path.rfind('/') {
        Some(i) => &opf_path[..=i],
        None => "",
    }
}

fn is_content_document(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".html") || lower.ends_with(".xhtml") || lower.ends_with(".htm")
}

fn capture_text(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn read_zip_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Option<String> {
    let mut file = zip.by_name(name).ok()?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).ok()?;
    Some(String::from_utf8_lossy(&buf).into_owned())
}
