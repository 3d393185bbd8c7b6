//! Shared embedding data structures used by the corpus cache and the matcher.

use serde::{Deserialize, Serialize};

use crate::ocr::OcrRecord;

/// OCR record paired with its model embedding. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedRecord {
    /// Source video identifier.
    pub source_id: String,
    /// Keyframe number within the source video.
    pub frame_index: u64,
    /// Text submitted to the embedding model.
    pub text: String,
    /// Model embedding vector.
    pub embedding: Vec<f32>,
}

impl EmbeddedRecord {
    /// Attaches an embedding to a parsed OCR record.
    pub fn new(record: OcrRecord, embedding: Vec<f32>) -> Self {
        Self {
            source_id: record.source_id,
            frame_index: record.frame_index,
            text: record.text,
            embedding,
        }
    }

    /// Composite key handed to the frame locator (`V004_123`).
    pub fn frame_key(&self) -> String {
        format!("{}_{}", self.source_id, self.frame_index)
    }
}
