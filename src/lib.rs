//! bookvoice — the algorithmic core of a reading application.
//!
//! Turns unstructured book content (plain text or an EPUB archive) into a
//! navigable, paginated, speakable document without relying on any metadata
//! being present:
//!
//! - [`chapters`] infers chapter boundaries from raw text heuristically.
//! - [`epub`] parses a zip-packaged EPUB with multi-tier fallback for
//!   malformed or missing structure, and loads chapter content lazily.
//! - [`pagination`] and [`speech`] split chapter text into viewport-sized
//!   pages and speech-safe chunks, both position-tracked for resuming.
//! - [`session`] is the thin coordinator a host application drives;
//!   [`cache`] and [`config`] persist the resume cursor and preferences.
//!
//! The guiding rule throughout: degrade, never fail. Arbitrary input yields
//! at least one readable chapter; the single hard error is an EPUB that is
//! not a readable zip at all.

pub mod cache;
pub mod chapters;
pub mod config;
pub mod epub;
pub mod pagination;
pub mod session;
pub mod speech;
pub mod text_utils;

pub use cache::{ReadingPosition, load_position, save_position};
pub use chapters::{Chapter, extract};
pub use config::{ReaderConfig, load_config};
pub use epub::{EpubBook, parse_epub};
pub use pagination::{Page, paginate};
pub use session::ReadingSession;
pub use speech::{SpeechEngine, SpeechSequencer, split_text_for_speech};
