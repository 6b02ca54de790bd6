//! Reading-position persistence.
//!
//! The current chapter and page are stored under `.cache/` using a hash of
//! the book id as the directory name to avoid filesystem issues. The format
//! is a tiny TOML file. Saving never surfaces errors — losing a bookmark is
//! preferable to interrupting reading.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const CACHE_DIR: &str = ".cache";

/// Resume cursor for one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingPosition {
    pub book_id: String,
    pub chapter_id: String,
    pub page: usize,
    pub last_read_unix_secs: u64,
}

impl ReadingPosition {
    /// A position stamped with the current wall clock.
    pub fn now(book_id: impl Into<String>, chapter_id: impl Into<String>, page: usize) -> Self {
        let last_read_unix_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            book_id: book_id.into(),
            chapter_id: chapter_id.into(),
            page,
            last_read_unix_secs,
        }
    }
}

/// Load the saved position for a book, if any.
pub fn load_position(book_id: &str) -> Option<ReadingPosition> {
    let data = fs::read_to_string(position_path(book_id)).ok()?;
    toml::from_str(&data).ok()
}

/// Persist the position for its book. Errors are ignored to keep the
/// reading loop responsive.
pub fn save_position(position: &ReadingPosition) {
    let path = position_path(&position.book_id);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Ok(contents) = toml::to_string(position) {
        let _ = fs::write(&path, contents);
    }
}

pub fn hash_dir(book_id: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(book_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    Path::new(CACHE_DIR).join(hash)
}

fn position_path(book_id: &str) -> PathBuf {
    hash_dir(book_id).join("position.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_book_id(tag: &str) -> String {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after epoch")
            .as_nanos();
        format!("bookvoice-test-{tag}-{nonce}")
    }

    #[test]
    fn position_round_trips_through_disk() {
        let book_id = unique_book_id("roundtrip");
        let saved = ReadingPosition::now(book_id.clone(), "chapter-3", 7);
        save_position(&saved);

        let loaded = load_position(&book_id).expect("position should load back");
        assert_eq!(loaded, saved);

        let _ = fs::remove_dir_all(hash_dir(&book_id));
    }

    #[test]
    fn unknown_book_has_no_position() {
        assert!(load_position(&unique_book_id("unknown")).is_none());
    }
}
