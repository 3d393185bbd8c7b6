//! OCR index parsing: one recognized text line per video keyframe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text recognized on a single keyframe of a source video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrRecord {
    /// Source video identifier, e.g. `V004`.
    pub source_id: String,
    /// Keyframe number within the source video.
    pub frame_index: u64,
    /// Recognized text submitted to the embedding model.
    pub text: String,
}

impl OcrRecord {
    /// Composite key handed to the frame locator (`V004_123`).
    pub fn frame_key(&self) -> String {
        format!("{}_{}", self.source_id, self.frame_index)
    }
}

/// Reasons an OCR index line is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrLineError {
    /// The line has no `:` separating the frame key from its text.
    MissingColon,
    /// The frame key has no `_` separating source and frame index.
    MissingUnderscore,
    /// The source id before `_` is empty.
    EmptySourceId,
    /// The frame index is not a base-10 integer.
    InvalidFrameIndex(String),
}

impl fmt::Display for OcrLineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColon => write!(f, "missing ':' between frame key and text"),
            Self::MissingUnderscore => write!(f, "missing '_' between source id and frame index"),
            Self::EmptySourceId => write!(f, "empty source id"),
            Self::InvalidFrameIndex(raw) => write!(f, "invalid frame index '{raw}'"),
        }
    }
}

impl std::error::Error for OcrLineError {}

/// A rejected line, kept so loaders can report what they dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the source file.
    pub line_no: usize,
    /// Why the line was rejected.
    pub reason: OcrLineError,
}

/// Result of parsing a whole OCR index file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIndex {
    /// Accepted records in file order.
    pub records: Vec<OcrRecord>,
    /// Lines that failed to parse.
    pub skipped: Vec<SkippedLine>,
}

/// Parses a single `<sourceId>_<frameIndex>:<text>` line.
///
/// Only the first `:` and the first `_` are significant, so text may itself
/// contain colons and source ids may not contain underscores.
pub fn parse_line(line: &str) -> Result<OcrRecord, OcrLineError> {
    let (key, text) = line.split_once(':').ok_or(OcrLineError::MissingColon)?;
    let (source_id, frame) = key.split_once('_').ok_or(OcrLineError::MissingUnderscore)?;
    let source_id = source_id.trim();
    if source_id.is_empty() {
        return Err(OcrLineError::EmptySourceId);
    }
    let frame = frame.trim();
    let frame_index = frame
        .parse::<u64>()
        .map_err(|_| OcrLineError::InvalidFrameIndex(frame.to_string()))?;
    Ok(OcrRecord {
        source_id: source_id.to_string(),
        frame_index,
        text: text.trim().to_string(),
    })
}

/// Parses an OCR index file, dropping blank lines and collecting bad ones.
pub fn parse_index(body: &str) -> ParsedIndex {
    let mut parsed = ParsedIndex::default();
    for (idx, raw) in body.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(record) => parsed.records.push(record),
            Err(reason) => parsed.skipped.push(SkippedLine {
                line_no: idx + 1,
                reason,
            }),
        }
    }
    parsed
}
