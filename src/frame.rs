//! Parsed frame selections.
//!
//! The result grid hands selections to the detail view as composite keys.
//! Keys are parsed once into a [`FrameRef`] so later stages never sniff
//! string shapes again.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Line key used for selections that carry no recognizable video key.
pub const FALLBACK_LINE_KEY: &str = "L13";

/// Image folder for every non-OCR selection.
const LEGACY_IMAGE_DIR: &str = "L13";

/// Which video index a frame must be looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoIndexKind {
    /// Index for OCR-sourced lecture videos.
    Ocr,
    /// Index for the legacy L13 keyframe collection.
    Legacy,
}

/// A frame selection resolved from its composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameRef {
    /// `V004_123`: OCR-sourced frame.
    Ocr {
        /// Source video id (`V` plus three digits).
        source_id: String,
        /// Keyframe number.
        frame_index: u64,
    },
    /// `L13/L13_V001/90`: collection, video key, frame.
    Path {
        /// Leading collection segment.
        collection: String,
        /// Video index key.
        line_key: String,
        /// Keyframe number.
        frame_index: u64,
    },
    /// `L13_V027_14618`: first two segments form the video key.
    Legacy {
        /// Video index key.
        line_key: String,
        /// Keyframe number.
        frame_index: u64,
    },
    /// Anything else: the caller's default image id against the `L13` key.
    Fallback {
        /// Caller-supplied image id.
        image_id: u64,
    },
}

/// Why a composite key could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKeyError {
    /// The key was empty.
    Empty,
    /// A slash-separated key had fewer than three segments.
    MissingSegment(String),
    /// The frame segment is not an integer.
    InvalidFrameIndex(String),
}

impl fmt::Display for FrameKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "frame key is empty"),
            Self::MissingSegment(key) => {
                write!(f, "frame key '{key}' needs three '/'-separated segments")
            }
            Self::InvalidFrameIndex(raw) => write!(f, "invalid frame index '{raw}'"),
        }
    }
}

impl std::error::Error for FrameKeyError {}

impl FrameRef {
    /// Parses a composite key. `default_image_id` is used only when the key
    /// has no recognizable shape.
    pub fn parse(key: &str, default_image_id: u64) -> Result<Self, FrameKeyError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(FrameKeyError::Empty);
        }
        if let Some((source_id, frame_index)) = parse_ocr_key(key) {
            return Ok(Self::Ocr {
                source_id: source_id.to_string(),
                frame_index,
            });
        }
        if key.contains('/') {
            let parts: Vec<&str> = key.split('/').collect();
            if parts.len() < 3 {
                return Err(FrameKeyError::MissingSegment(key.to_string()));
            }
            return Ok(Self::Path {
                collection: parts[0].to_string(),
                line_key: parts[1].to_string(),
                frame_index: parse_frame_index(parts[2])?,
            });
        }
        let parts: Vec<&str> = key.split('_').collect();
        if parts.len() >= 3 {
            return Ok(Self::Legacy {
                line_key: format!("{}_{}", parts[0], parts[1]),
                frame_index: parse_frame_index(parts[2])?,
            });
        }
        Ok(Self::Fallback {
            image_id: default_image_id,
        })
    }

    /// Key matched against the first column of the video index.
    pub fn line_key(&self) -> &str {
        match self {
            Self::Ocr { source_id, .. } => source_id,
            Self::Path { line_key, .. } | Self::Legacy { line_key, .. } => line_key,
            Self::Fallback { .. } => FALLBACK_LINE_KEY,
        }
    }

    /// Frame number used to compute the playback offset.
    pub fn index_number(&self) -> u64 {
        match self {
            Self::Ocr { frame_index, .. }
            | Self::Path { frame_index, .. }
            | Self::Legacy { frame_index, .. } => *frame_index,
            Self::Fallback { image_id } => *image_id,
        }
    }

    /// Video index this frame is resolved against.
    pub fn index_kind(&self) -> VideoIndexKind {
        match self {
            Self::Ocr { .. } => VideoIndexKind::Ocr,
            _ => VideoIndexKind::Legacy,
        }
    }

    /// Still image for the frame under `assets_root`.
    ///
    /// OCR frames live at `<source>/<frame>.jpg`; every other selection shows
    /// `L13/<id>.jpg` with the caller's image id zero-padded to three digits.
    pub fn image_path(&self, assets_root: &Path, default_image_id: u64) -> PathBuf {
        match self {
            Self::Ocr {
                source_id,
                frame_index,
            } => assets_root
                .join(source_id)
                .join(format!("{frame_index}.jpg")),
            _ => assets_root
                .join(LEGACY_IMAGE_DIR)
                .join(format!("{default_image_id:03}.jpg")),
        }
    }
}

impl fmt::Display for FrameRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ocr {
                source_id,
                frame_index,
            } => write!(f, "{source_id}_{frame_index}"),
            Self::Path {
                collection,
                line_key,
                frame_index,
            } => write!(f, "{collection}/{line_key}/{frame_index}"),
            Self::Legacy {
                line_key,
                frame_index,
            } => write!(f, "{line_key}_{frame_index}"),
            Self::Fallback { image_id } => write!(f, "{FALLBACK_LINE_KEY}#{image_id}"),
        }
    }
}

/// Matches `V` + three ASCII digits + `_` + one or more ASCII digits.
fn parse_ocr_key(key: &str) -> Option<(&str, u64)> {
    let (source_id, digits) = key.split_once('_')?;
    let bytes = source_id.as_bytes();
    let source_ok =
        bytes.len() == 4 && bytes[0] == b'V' && bytes[1..].iter().all(u8::is_ascii_digit);
    if !source_ok || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|index| (source_id, index))
}

fn parse_frame_index(raw: &str) -> Result<u64, FrameKeyError> {
    let trimmed = raw.trim();
    trimmed
        .parse()
        .map_err(|_| FrameKeyError::InvalidFrameIndex(trimmed.to_string()))
}
