//! Reader configuration.
//!
//! All user-tunable settings are centralized here and loaded from a TOML
//! file if present. Any missing or invalid entries fall back to sensible
//! defaults so a book can always be opened.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "conf/config.toml";

fn default_font_size() -> f32 {
    16.0
}

fn default_viewport_width() -> f32 {
    390.0
}

fn default_viewport_height() -> f32 {
    844.0
}

fn default_speech_chunk_chars() -> usize {
    crate::speech::DEFAULT_MAX_CHUNK_CHARS
}

fn default_prefetch_adjacent() -> bool {
    true
}

/// Reading preferences; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub font_size: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub speech_chunk_chars: usize,
    pub prefetch_adjacent: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            speech_chunk_chars: default_speech_chunk_chars(),
            prefetch_adjacent: default_prefetch_adjacent(),
        }
    }
}

/// Load configuration from `path`, falling back to defaults on any error.
pub fn load_config(path: &Path) -> ReaderConfig {
    match fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<ReaderConfig>(&contents) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded reader config");
                config
            }
            Err(err) => {
                warn!(path = %path.display(), "Invalid config TOML: {err}");
                ReaderConfig::default()
            }
        },
        Err(err) => {
            warn!(path = %path.display(), "Falling back to default config: {err}");
            ReaderConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> std::path::PathBuf {
        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("bookvoice-{name}-{nonce}.toml"))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/definitely/not/here.toml"));
        assert_eq!(config.font_size, default_font_size());
        assert!(config.prefetch_adjacent);
    }

    #[test]
    fn partial_file_fills_missing_fields_from_defaults() {
        let path = temp_file("partial");
        fs::write(&path, "font_size = 20.0\nprefetch_adjacent = false\n").unwrap();

        let config = load_config(&path);
        assert_eq!(config.font_size, 20.0);
        assert!(!config.prefetch_adjacent);
        assert_eq!(config.speech_chunk_chars, default_speech_chunk_chars());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn invalid_toml_falls_back_to_defaults() {
        let path = temp_file("broken");
        fs::write(&path, "font_size = [not toml").unwrap();

        let config = load_config(&path);
        assert_eq!(config.font_size, default_font_size());

        let _ = fs::remove_file(&path);
    }
}
