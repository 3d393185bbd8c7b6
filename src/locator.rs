//! Resolves a selected frame to a timestamped YouTube embed.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::frame::{FrameRef, VideoIndexKind};
use crate::resource::TextResource;
use crate::video_index::{KeyMatch, VideoEntry, VideoIndex};

/// Frames added to a keyframe number before converting it to seconds.
///
/// Empirical correction that the published keyframe sets rely on; keep it in
/// sync with whatever extracted them.
pub const FRAME_OFFSET_CORRECTION: u64 = 25;

/// Default player embed base.
pub const DEFAULT_EMBED_BASE: &str = "https://www.youtube.com/embed";

/// Where a frame can be watched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playback {
    /// YouTube video id; empty when the index URL was unusable.
    pub video_id: String,
    /// Frame rate used for the offset.
    pub fps: f64,
    /// Whole seconds into the video.
    pub start_seconds: u64,
    /// Embeddable player URL with autoplay.
    pub embed_url: String,
}

impl Playback {
    /// Builds the playback target for `index_number` within `entry`.
    pub fn from_entry(entry: &VideoEntry, index_number: u64, embed_base: &str) -> Self {
        let video_id = entry.video_id();
        let start_seconds = start_offset(index_number, entry.fps);
        let embed_url = format!(
            "{}/{}?start={}&autoplay=1",
            embed_base.trim_end_matches('/'),
            video_id,
            start_seconds
        );
        Self {
            video_id,
            fps: entry.fps,
            start_seconds,
            embed_url,
        }
    }
}

/// `floor((index_number + FRAME_OFFSET_CORRECTION) / fps)` in whole seconds.
///
/// Computed in `f64` so any parsed index is accepted; the cast saturates.
pub fn start_offset(index_number: u64, fps: f64) -> u64 {
    ((index_number as f64 + FRAME_OFFSET_CORRECTION as f64) / fps).floor() as u64
}

/// Locator settings.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Index used for OCR frames.
    pub ocr_index: TextResource,
    /// Index used for path, legacy, and fallback frames.
    pub legacy_index: TextResource,
    /// Key comparison mode.
    pub key_match: KeyMatch,
    /// Player embed base URL.
    pub embed_base: String,
}

/// Resolves frames against their video index, caching parsed indices.
pub struct Locator {
    config: LocatorConfig,
    http: Client,
    indices: Mutex<HashMap<VideoIndexKind, Arc<VideoIndex>>>,
}

impl Locator {
    /// Builds a locator with an empty index cache.
    pub fn new(config: LocatorConfig, http: Client) -> Self {
        Self {
            config,
            http,
            indices: Mutex::new(HashMap::new()),
        }
    }

    /// Playback target for `frame`, or `None` when the index has no entry
    /// for its line key.
    pub async fn resolve(&self, frame: &FrameRef) -> Result<Option<Playback>> {
        let index = self.index(frame.index_kind()).await?;
        let line_key = frame.line_key();
        let Some(entry) = index.find(line_key, self.config.key_match) else {
            crate::debug_log!("no video index entry for '{line_key}' ({frame})");
            return Ok(None);
        };
        let playback = Playback::from_entry(entry, frame.index_number(), &self.config.embed_base);
        crate::debug_log!("{frame} -> {}", playback.embed_url);
        Ok(Some(playback))
    }

    /// Forgets parsed indices so the next resolution re-reads them.
    pub async fn reload(&self) {
        self.indices.lock().await.clear();
    }

    async fn index(&self, kind: VideoIndexKind) -> Result<Arc<VideoIndex>> {
        if let Some(index) = self.indices.lock().await.get(&kind) {
            return Ok(Arc::clone(index));
        }
        let resource = match kind {
            VideoIndexKind::Ocr => &self.config.ocr_index,
            VideoIndexKind::Legacy => &self.config.legacy_index,
        };
        let body = resource
            .fetch(&self.http)
            .await
            .with_context(|| format!("failed to read video index {resource}"))?;
        let index = Arc::new(VideoIndex::parse(&body));
        self.indices
            .lock()
            .await
            .insert(kind, Arc::clone(&index));
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn computes_offset_and_embed_url() {
        let entry = VideoEntry::parse("V004 https://youtu.be/abc123 30").unwrap();
        let playback = Playback::from_entry(&entry, 125, DEFAULT_EMBED_BASE);
        assert_eq!(playback.start_seconds, 5);
        assert_eq!(playback.video_id, "abc123");
        assert_eq!(
            playback.embed_url,
            "https://www.youtube.com/embed/abc123?start=5&autoplay=1"
        );
    }

    #[test]
    fn offset_floors_fractional_seconds() {
        assert_eq!(start_offset(0, 25.0), 1);
        assert_eq!(start_offset(24, 25.0), 1);
        assert_eq!(start_offset(25, 25.0), 2);
        assert_eq!(start_offset(100, 29.97), 4);
    }

    #[test]
    fn largest_frame_index_does_not_overflow() {
        assert_eq!(start_offset(u64::MAX, 1.0), u64::MAX);
        assert_eq!(start_offset(u64::MAX, 25.0), (u64::MAX as f64 / 25.0).floor() as u64);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn resolves_largest_ocr_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = dir.path().join("frame_url_ocr.txt");
        std::fs::write(&index, "V004 https://youtu.be/abc123 25\n").expect("write index");
        let resource = TextResource::Path(index);
        let locator = Locator::new(
            LocatorConfig {
                ocr_index: resource.clone(),
                legacy_index: resource,
                key_match: KeyMatch::Prefix,
                embed_base: DEFAULT_EMBED_BASE.to_string(),
            },
            Client::new(),
        );
        let frame = FrameRef::parse("V004_18446744073709551615", 0).expect("ocr key");
        let playback = locator
            .resolve(&frame)
            .await
            .expect("resolve")
            .expect("indexed video");
        assert_eq!(playback.video_id, "abc123");
        assert!(playback.start_seconds > 0);
    }

    #[test]
    fn unusable_urls_still_produce_a_target() {
        let entry = VideoEntry::parse("V009 not-a-url 25").unwrap();
        let playback = Playback::from_entry(&entry, 0, "https://player.test/embed/");
        assert_eq!(playback.video_id, "");
        assert_eq!(playback.embed_url, "https://player.test/embed/?start=1&autoplay=1");
    }
}
