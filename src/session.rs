//! Reading session orchestration.
//!
//! A deliberately thin coordinator: it owns the chapter list and the current
//! chapter/page pointers, and wires the extraction, pagination and speech
//! modules together. All heavy lifting happens in those modules; the host
//! application drives this type from its UI layer.

use crate::cache::ReadingPosition;
use crate::chapters::{self, Chapter};
use crate::config::ReaderConfig;
use crate::epub::content::{load_chapter_content, prefetch_adjacent};
use crate::epub::{self, EpubBook};
use crate::pagination::{self, Page};
use crate::speech::SpeechSequencer;
use crate::text_utils;
use anyhow::Result;
use tracing::{debug, info};

enum BookSource {
    PlainText(String),
    Epub(EpubBook),
}

pub struct ReadingSession {
    book_id: String,
    source: BookSource,
    chapters: Vec<Chapter>,
    current_chapter: usize,
    pages: Vec<Page>,
    current_page: usize,
    config: ReaderConfig,
}

impl ReadingSession {
    /// Open a plain-text book. Chapters are inferred heuristically; the
    /// session always starts on the first chapter's first page.
    pub fn open_text(book_id: impl Into<String>, content: String, config: ReaderConfig) -> Self {
        let chapters = chapters::extract(&content);
        info!(chapters = chapters.len(), "Opened plain-text book");
        let mut session = Self {
            book_id: book_id.into(),
            source: BookSource::PlainText(content),
            chapters,
            current_chapter: 0,
            pages: Vec::new(),
            current_page: 0,
            config,
        };
        session.repaginate();
        session
    }

    /// Open an EPUB book. Fails only when the bytes are not a readable zip.
    pub fn open_epub(
        book_id: impl Into<String>,
        bytes: Vec<u8>,
        config: ReaderConfig,
    ) -> Result<Self> {
        let book = epub::parse_epub(bytes)?;
        let chapters = book.chapters.clone();
        let mut session = Self {
            book_id: book_id.into(),
            source: BookSource::Epub(book),
            chapters,
            current_chapter: 0,
            pages: Vec::new(),
            current_page: 0,
            config,
        };
        session.repaginate();
        Ok(session)
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn current_chapter(&self) -> &Chapter {
        &self.chapters[self.current_chapter]
    }

    pub fn current_chapter_index(&self) -> usize {
        self.current_chapter
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn has_prev_chapter(&self) -> bool {
        self.current_chapter > 0
    }

    pub fn has_next_chapter(&self) -> bool {
        self.current_chapter + 1 < self.chapters.len()
    }

    /// The current chapter's plain text. For EPUBs this may extract from
    /// the archive on first access (and cache); for plain text it is a
    /// slice of the held document.
    pub fn chapter_content(&self) -> String {
        let chapter = &self.chapters[self.current_chapter];
        match &self.source {
            BookSource::PlainText(content) => chapters::chapter_text(content, chapter).to_string(),
            BookSource::Epub(book) => load_chapter_content(&book.archive, chapter),
        }
    }

    /// Jump to a chapter by index, resetting to its first page. Schedules a
    /// best-effort prefetch of the new neighbors for EPUB books.
    pub fn select_chapter(&mut self, index: usize) -> bool {
        if index >= self.chapters.len() {
            return false;
        }
        self.current_chapter = index;
        self.current_page = 0;
        self.repaginate();
        debug!(chapter = %self.chapters[index].id, "Selected chapter");
        if self.config.prefetch_adjacent {
            if let BookSource::Epub(book) = &self.source {
                prefetch_adjacent(&book.archive, &self.chapters, index);
            }
        }
        true
    }

    pub fn next_chapter(&mut self) -> bool {
        self.has_next_chapter() && self.select_chapter(self.current_chapter + 1)
    }

    pub fn prev_chapter(&mut self) -> bool {
        self.has_prev_chapter() && self.select_chapter(self.current_chapter - 1)
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page >= self.pages.len() {
            return false;
        }
        self.current_page = page;
        true
    }

    /// Changing the font triggers a full repagination of the current
    /// chapter; the page pointer is clamped, not mapped.
    pub fn set_font_size(&mut self, font_size: f32) {
        self.config.font_size = font_size;
        self.repaginate();
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self.repaginate();
    }

    fn repaginate(&mut self) {
        let content = self.chapter_content();
        self.pages = pagination::paginate(
            &content,
            self.config.viewport_width,
            self.config.viewport_height,
            self.config.font_size,
        );
        self.current_page = self.current_page.min(self.pages.len().saturating_sub(1));
    }

    /// Snapshot of where the reader is, suitable for persisting.
    pub fn position(&self) -> ReadingPosition {
        ReadingPosition::now(
            self.book_id.clone(),
            self.current_chapter().id.clone(),
            self.current_page,
        )
    }

    /// Restore a persisted cursor. Unknown chapter ids (the book changed on
    /// disk, say) leave the session where it is.
    pub fn resume(&mut self, position: &ReadingPosition) -> bool {
        let Some(index) = self
            .chapters
            .iter()
            .position(|c| c.id == position.chapter_id)
        else {
            return false;
        };
        self.select_chapter(index);
        self.current_page = position.page.min(self.pages.len().saturating_sub(1));
        true
    }

    /// Progress through the current chapter, e.g. `"40%"`.
    pub fn progress(&self) -> String {
        text_utils::progress_percentage(self.current_page + 1, self.pages.len())
    }

    /// Sequencer for reading the current page aloud. Its base position is
    /// the page's character offset within the chapter, so reported cursor
    /// positions are chapter-absolute.
    pub fn speech_for_current_page(&self) -> SpeechSequencer {
        let base: usize = self.pages[..self.current_page]
            .iter()
            .map(|p| p.text.chars().count())
            .sum();
        SpeechSequencer::new(
            &self.pages[self.current_page].text,
            self.config.speech_chunk_chars,
            base,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn small_config() -> ReaderConfig {
        ReaderConfig {
            font_size: 16.0,
            viewport_width: 200.0,
            viewport_height: 300.0,
            speech_chunk_chars: 50,
            prefetch_adjacent: false,
        }
    }

    fn three_chapter_text() -> String {
        let mut content = String::new();
        for i in 1..=3 {
            content.push_str(&format!("第{i}章 试炼\n"));
            content.push_str(&"这一章的内容还在继续。".repeat(140));
            content.push('\n');
        }
        content
    }

    #[test]
    fn text_session_navigates_chapters_and_pages() {
        let mut session = ReadingSession::open_text("book-1", three_chapter_text(), small_config());
        assert_eq!(session.chapters().len(), 3);
        assert_eq!(session.current_chapter().id, "chapter-0");
        assert!(session.pages().len() > 1);
        assert!(session.chapter_content().starts_with("第1章 试炼"));
        assert!(!session.has_prev_chapter());

        assert!(session.next_chapter());
        assert_eq!(session.current_chapter().id, "chapter-1");
        assert_eq!(session.current_page(), 0);
        assert!(session.chapter_content().starts_with("第2章 试炼"));

        assert!(session.prev_chapter());
        assert!(!session.prev_chapter());
    }

    #[test]
    fn font_change_repaginates_and_clamps_page() {
        let mut session = ReadingSession::open_text("book-2", three_chapter_text(), small_config());
        let last = session.pages().len() - 1;
        assert!(session.go_to_page(last));

        session.set_font_size(36.0);
        assert!(session.pages().len() > last);
        assert!(session.current_page() < session.pages().len());

        let joined: String = session.pages().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(joined, session.chapter_content());
    }

    #[test]
    fn position_round_trips_between_sessions() {
        let mut first = ReadingSession::open_text("book-3", three_chapter_text(), small_config());
        first.select_chapter(1);
        assert!(first.go_to_page(2));
        let position = first.position();
        assert_eq!(position.chapter_id, "chapter-1");
        assert_eq!(position.page, 2);

        let mut second = ReadingSession::open_text("book-3", three_chapter_text(), small_config());
        assert!(second.resume(&position));
        assert_eq!(second.current_chapter().id, "chapter-1");
        assert_eq!(second.current_page(), 2);

        // A cursor for a chapter that no longer exists is rejected.
        let stale = ReadingPosition::now("book-3", "chapter-99", 0);
        assert!(!second.resume(&stale));
        assert_eq!(second.current_chapter().id, "chapter-1");
    }

    #[test]
    fn speech_base_position_tracks_earlier_pages() {
        let mut session = ReadingSession::open_text("book-4", three_chapter_text(), small_config());
        let first_page_chars = session.pages()[0].text.chars().count();
        assert!(session.go_to_page(1));

        let sequencer = session.speech_for_current_page();
        assert_eq!(sequencer.chunks().concat(), session.pages()[1].text);

        let mut first_position = None;
        struct NullEngine;
        impl crate::speech::SpeechEngine for NullEngine {
            fn speak(&self, _text: &str) -> anyhow::Result<()> {
                Ok(())
            }
        }
        sequencer
            .play(&NullEngine, |pos| {
                first_position.get_or_insert(pos);
            })
            .unwrap();
        assert_eq!(first_position, Some(first_page_chars));
    }

    #[test]
    fn progress_reports_page_fraction() {
        let mut session = ReadingSession::open_text("book-5", three_chapter_text(), small_config());
        let total = session.pages().len();
        assert_eq!(session.progress(), crate::text_utils::progress_percentage(1, total));
        session.go_to_page(total - 1);
        assert_eq!(session.progress(), "100%");
    }

    #[test]
    fn epub_session_loads_chapters_on_demand() {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in [
            (
                "META-INF/container.xml",
                r#"<container><rootfiles><rootfile full-path="content.opf"/></rootfiles></container>"#,
            ),
            (
                "content.opf",
                r#"<package>
                     <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
                       <dc:title>旅途</dc:title>
                     </metadata>
                     <manifest>
                       <item id="a" href="a.xhtml" media-type="application/xhtml+xml"/>
                       <item id="b" href="b.xhtml" media-type="application/xhtml+xml"/>
                     </manifest>
                     <spine><itemref idref="a"/><itemref idref="b"/></spine>
                   </package>"#,
            ),
            ("a.xhtml", "<html><body><h1>第一章 出发</h1><p>向北而行。</p></body></html>"),
            ("b.xhtml", "<html><body><h1>第二章 抵达</h1><p>终于到了。</p></body></html>"),
        ] {
            writer.start_file(name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let mut session = ReadingSession::open_epub("epub-1", bytes, small_config()).unwrap();
        assert_eq!(session.chapters().len(), 2);
        assert!(session.chapter_content().contains("向北而行"));

        assert!(session.next_chapter());
        assert!(session.chapter_content().contains("终于到了"));
        assert!(!session.next_chapter());
    }
}
