//! Speech chunking and sequencing.
//!
//! Text-to-speech engines choke on long utterances, so chapter text is cut
//! into bounded chunks at sentence boundaries before being handed to the
//! engine. The engine itself is injected behind [`SpeechEngine`]; this module
//! only owns the chunking and the playback cursor arithmetic.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Default upper bound on chunk length, in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 200;

fn is_sentence_terminator(ch: char) -> bool {
    matches!(ch, '.' | '。' | '!' | '！' | '?' | '？' | '\n')
}

/// Split `text` into speech-safe chunks of at most `max_chars` characters.
///
/// Chunks concatenate back to the input exactly: every character appears in
/// exactly one chunk, in order. Sentences are packed greedily; a sentence
/// longer than the limit is sliced on its own, preferring to break after the
/// last space or comma inside the slice window.
pub fn split_text_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let max_chars = max_chars.max(1);
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }
    if !text.chars().any(is_sentence_terminator) {
        return slice_fixed(text, max_chars);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for sentence in split_sentences(text) {
        let sentence_chars = sentence.chars().count();
        if sentence_chars > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            split_long_sentence(sentence, max_chars, &mut chunks);
        } else if current_chars + sentence_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_chars = sentence_chars;
        } else {
            current.push_str(sentence);
            current_chars += sentence_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split into sentences, each keeping its run of trailing terminators; a
/// trailing unterminated remainder becomes the final sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut prev_was_terminator = false;
    for (idx, ch) in text.char_indices() {
        if prev_was_terminator && !is_sentence_terminator(ch) {
            sentences.push(&text[start..idx]);
            start = idx;
        }
        prev_was_terminator = is_sentence_terminator(ch);
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// No punctuation anywhere: cut every `max_chars` characters.
fn slice_fixed(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long_sentence(sentence: &str, max_chars: usize, out: &mut Vec<String>) {
    let offsets: Vec<usize> = sentence.char_indices().map(|(i, _)| i).collect();
    let chars: Vec<char> = sentence.chars().collect();
    let n = chars.len();
    let byte_at = |i: usize| offsets.get(i).copied().unwrap_or(sentence.len());

    let mut start = 0usize;
    while start < n {
        let mut end = (start + max_chars).min(n);
        if end < n {
            // Scan backward for a softer break than the raw boundary.
            for i in (start + 1..end).rev() {
                if matches!(chars[i], ' ' | '，' | ',') {
                    end = i + 1;
                    break;
                }
            }
        }
        out.push(sentence[byte_at(start)..byte_at(end)].to_string());
        start = end;
    }
}

/// A speech backend. `speak` blocks until the utterance has finished (or the
/// engine gave up); the sequencer never interprets the text it forwards.
pub trait SpeechEngine {
    fn speak(&self, text: &str) -> Result<()>;
}

/// Cooperative cancellation flag shared between the playback loop and
/// whichever thread asks it to stop.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Cancelled,
}

/// Drives an injected engine through the chunks of one text, reporting an
/// absolute, resumable cursor position before each chunk.
pub struct SpeechSequencer {
    chunks: Vec<String>,
    base_position: usize,
    cancel: CancellationToken,
}

impl SpeechSequencer {
    /// `base_position` is the absolute offset (in characters) of `text`
    /// within whatever the caller is tracking positions against, typically
    /// the current chapter.
    pub fn new(text: &str, max_chunk_chars: usize, base_position: usize) -> Self {
        let chunks = split_text_for_speech(text, max_chunk_chars);
        debug!(
            chunk_count = chunks.len(),
            base_position, "Prepared speech sequence"
        );
        Self {
            chunks,
            base_position,
            cancel: CancellationToken::new(),
        }
    }

    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Handle for stopping playback from another thread.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Speak every chunk in order. `on_position` fires before each chunk
    /// with `base_position` plus the characters already spoken, so callers
    /// can persist a resume cursor as playback advances.
    pub fn play(
        &self,
        engine: &dyn SpeechEngine,
        mut on_position: impl FnMut(usize),
    ) -> Result<PlaybackOutcome> {
        let mut spoken_chars = 0usize;
        for (idx, chunk) in self.chunks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(chunk = idx, "Speech playback cancelled");
                return Ok(PlaybackOutcome::Cancelled);
            }
            on_position(self.base_position + spoken_chars);
            engine.speak(chunk)?;
            spoken_chars += chunk.chars().count();
        }
        Ok(PlaybackOutcome::Finished)
    }
}
