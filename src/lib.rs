#![warn(missing_docs)]
//! Semantic search over OCR text extracted from lecture video keyframes.
//!
//! Corpora of OCR lines are embedded once through an OpenAI-compatible API and
//! cached in memory; queries are ranked by cosine similarity, and selected
//! frames resolve to a still image or a timestamped YouTube embed.

pub mod controls;
pub mod corpus;
pub mod detail;
pub mod embedder;
pub mod embeddings;
pub mod frame;
pub mod library;
pub mod locator;
pub mod matcher;
pub mod ocr;
pub mod resource;
pub mod video_index;

pub use controls::{Cli, SearchControls, Services};
pub use corpus::{Corpus, CorpusCache, CorpusCatalog, LoadControls};
pub use detail::{DetailState, DetailView};
pub use embedder::{CachingEmbedder, Embedder, Translator};
pub use embeddings::EmbeddedRecord;
pub use frame::{FrameKeyError, FrameRef, VideoIndexKind};
pub use library::LibraryState;
pub use locator::{Locator, LocatorConfig, Playback, FRAME_OFFSET_CORRECTION};
pub use matcher::{
    MatchResult, SearchOutcome, SearchSession, SearchToken, SessionStatus,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use ocr::{OcrLineError, OcrRecord, SkippedLine};
pub use resource::TextResource;
pub use video_index::{KeyMatch, VideoEntry, VideoIndex, DEFAULT_FPS};

/// Prints to stderr when the `debug_logs` feature is enabled.
#[cfg(feature = "debug_logs")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        eprintln!($($arg)*);
    };
}

/// Compiles away without the `debug_logs` feature.
#[cfg(not(feature = "debug_logs"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}
