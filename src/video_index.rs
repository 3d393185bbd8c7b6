//! Video index files: `<key> <youtubeUrlOrId> <fps>` per line.

use serde::Serialize;
use url::Url;

/// Frame rate assumed when a line omits it or carries garbage.
pub const DEFAULT_FPS: f64 = 25.0;

/// One line of a video index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoEntry {
    /// First column, matched against frame line keys.
    pub key: String,
    /// YouTube watch URL, short link, or whatever the file holds.
    pub url: String,
    /// Frames per second of the source video.
    pub fps: f64,
}

impl VideoEntry {
    /// Parses one whitespace-separated line. Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let key = fields.next()?.to_string();
        let url = fields.next().unwrap_or_default().to_string();
        let fps = fields
            .next()
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(DEFAULT_FPS);
        Some(Self { key, url, fps })
    }

    /// YouTube video id extracted from the URL column (see [`youtube_id`]).
    pub fn video_id(&self) -> String {
        youtube_id(&self.url)
    }
}

/// How frame line keys are compared with index keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyMatch {
    /// The first entry whose key starts with the line key wins.
    #[default]
    Prefix,
    /// Only an identical key matches.
    Exact,
}

impl KeyMatch {
    fn accepts(self, entry_key: &str, line_key: &str) -> bool {
        match self {
            Self::Prefix => entry_key.starts_with(line_key),
            Self::Exact => entry_key == line_key,
        }
    }
}

/// Parsed video index, kept in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoIndex {
    entries: Vec<VideoEntry>,
}

impl VideoIndex {
    /// Parses every non-blank line of a video index file.
    pub fn parse(body: &str) -> Self {
        Self {
            entries: body.lines().filter_map(VideoEntry::parse).collect(),
        }
    }

    /// First entry, in file order, accepted by `mode` for `line_key`.
    pub fn find(&self, line_key: &str, mode: KeyMatch) -> Option<&VideoEntry> {
        if line_key.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| mode.accepts(&entry.key, line_key))
    }

    /// All entries.
    pub fn entries(&self) -> &[VideoEntry] {
        &self.entries
    }
}

/// Extracts a YouTube video id.
///
/// `youtu.be` short links carry the id as their path; other URLs carry it in
/// the `v` query parameter. Anything that does not parse as a URL yields an
/// empty id.
pub fn youtube_id(link: &str) -> String {
    let Ok(url) = Url::parse(link) else {
        crate::debug_log!("invalid YouTube URL: {link}");
        return String::new();
    };
    if url.host_str() == Some("youtu.be") {
        return url.path().trim_start_matches('/').to_string();
    }
    url.query_pairs()
        .find(|(name, _)| name == "v")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_entries_with_default_fps() {
        let index = VideoIndex::parse(
            "V004 https://youtu.be/abc123 30\n\n\
             V005 https://www.youtube.com/watch?v=xyz\n\
             V006 https://youtu.be/q nope\n",
        );
        let fps: Vec<f64> = index.entries().iter().map(|e| e.fps).collect();
        assert_eq!(fps, vec![30.0, DEFAULT_FPS, DEFAULT_FPS]);
        assert_eq!(index.entries()[1].video_id(), "xyz");
    }

    #[test]
    fn rejects_non_positive_fps() {
        let entry = VideoEntry::parse("V004 https://youtu.be/a 0").unwrap();
        assert_eq!(entry.fps, DEFAULT_FPS);
        let entry = VideoEntry::parse("V004 https://youtu.be/a -12").unwrap();
        assert_eq!(entry.fps, DEFAULT_FPS);
    }

    #[test]
    fn extracts_youtube_ids() {
        assert_eq!(youtube_id("https://youtu.be/abc123"), "abc123");
        assert_eq!(
            youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(youtube_id("https://www.youtube.com/watch"), "");
        assert_eq!(youtube_id("not a url"), "");
    }

    #[test]
    fn prefix_match_takes_first_line_in_file_order() {
        let index = VideoIndex::parse(
            "L13_V0010 https://youtu.be/first 25\nL13_V001 https://youtu.be/second 25\n",
        );
        let prefix = index.find("L13_V001", KeyMatch::Prefix).unwrap();
        assert_eq!(prefix.video_id(), "first");
        let exact = index.find("L13_V001", KeyMatch::Exact).unwrap();
        assert_eq!(exact.video_id(), "second");
        assert!(index.find("L14", KeyMatch::Prefix).is_none());
    }
}
