//! Text assets addressed by local path or http(s) URL.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Client;
use url::Url;

/// Location of a plain-text asset such as an OCR or video index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TextResource {
    /// File on the local filesystem.
    Path(PathBuf),
    /// Remote document fetched over HTTP.
    Url(Url),
}

impl TextResource {
    /// Interprets `raw` as a URL when it carries an http(s) scheme, otherwise
    /// as a filesystem path.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        anyhow::ensure!(!raw.is_empty(), "resource reference is empty");
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw).with_context(|| format!("invalid resource URL {raw}"))?;
            return Ok(Self::Url(url));
        }
        Ok(Self::Path(PathBuf::from(raw)))
    }

    /// Reads the whole resource as UTF-8 text.
    pub async fn fetch(&self, client: &Client) -> Result<String> {
        match self {
            Self::Path(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display())),
            Self::Url(url) => {
                let resp = client
                    .get(url.clone())
                    .send()
                    .await
                    .with_context(|| format!("failed to fetch {url}"))?;
                let status = resp.status();
                anyhow::ensure!(status.is_success(), "fetching {url} returned {status}");
                resp.text()
                    .await
                    .with_context(|| format!("failed to read body of {url}"))
            }
        }
    }
}

impl fmt::Display for TextResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn distinguishes_urls_from_paths() {
        assert!(matches!(
            TextResource::parse("https://cdn.test/ocr_004.txt").unwrap(),
            TextResource::Url(_)
        ));
        assert_eq!(
            TextResource::parse(" assets/ocr_004.txt ").unwrap(),
            TextResource::Path(PathBuf::from("assets/ocr_004.txt"))
        );
        assert!(TextResource::parse("   ").is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn reads_local_files() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "V004_1:hello").expect("write");
        let resource = TextResource::Path(file.path().to_path_buf());
        let body = resource.fetch(&Client::new()).await.expect("fetch");
        assert_eq!(body, "V004_1:hello\n");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn missing_files_error() {
        let resource = TextResource::Path(PathBuf::from("/definitely/not/here.txt"));
        let err = resource.fetch(&Client::new()).await.expect_err("missing");
        assert!(err.to_string().contains("failed to read"));
    }
}
