//! End-to-end flow: open a book, navigate, and read a page aloud.

use bookvoice::speech::{PlaybackOutcome, SpeechEngine};
use bookvoice::{ReaderConfig, ReadingSession};
use std::sync::Mutex;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

struct CollectingEngine {
    spoken: Mutex<Vec<String>>,
}

impl SpeechEngine for CollectingEngine {
    fn speak(&self, text: &str) -> anyhow::Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[test]
fn plain_text_book_reads_end_to_end() {
    init_logging();

    let mut content = String::new();
    for i in 1..=4 {
        content.push_str(&format!("第{i}章 长夜\n"));
        content.push_str(&"夜色像潮水一样漫过山岗。风从谷底吹上来。".repeat(80));
        content.push('\n');
    }

    let config = ReaderConfig {
        font_size: 16.0,
        viewport_width: 390.0,
        viewport_height: 844.0,
        speech_chunk_chars: 60,
        prefetch_adjacent: false,
    };
    let mut session = ReadingSession::open_text("integration-book", content, config);

    assert_eq!(session.chapters().len(), 4);
    assert!(session.next_chapter());
    assert!(session.chapter_content().starts_with("第2章 长夜"));

    // Every page of the chapter, spoken in order, reproduces the chapter.
    let mut spoken_total = String::new();
    loop {
        let sequencer = session.speech_for_current_page();
        let engine = CollectingEngine {
            spoken: Mutex::new(Vec::new()),
        };
        let outcome = sequencer.play(&engine, |_| {}).unwrap();
        assert_eq!(outcome, PlaybackOutcome::Finished);
        spoken_total.push_str(&engine.spoken.lock().unwrap().concat());

        let next = session.current_page() + 1;
        if !session.go_to_page(next) {
            break;
        }
    }
    assert_eq!(spoken_total, session.chapter_content());
}
