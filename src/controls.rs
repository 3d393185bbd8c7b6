//! Search knobs and the command-line interface shared by every binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use reqwest::Client;

use crate::corpus::{CorpusCache, CorpusCatalog, LoadControls};
use crate::embedder::openai::{OpenAiEmbedder, OpenAiTranslator};
use crate::embedder::{Embedder, Translator};
use crate::locator::{Locator, LocatorConfig, DEFAULT_EMBED_BASE};
use crate::matcher::DEFAULT_SIMILARITY_THRESHOLD;
use crate::resource::TextResource;
use crate::video_index::KeyMatch;

/// Default corpus catalog: one OCR index per school grade plus the campus tour.
pub const DEFAULT_CATALOG: &str = "grade6=assets/ocr_004.txt,\
    grade7=assets/ocr_005.txt,\
    grade8=assets/ocr_006.txt,\
    grade9=assets/ocr_007.txt,\
    campus=assets/ocr_008.txt";

/// Tunable knobs that shape search and playback resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchControls {
    threshold: f32,
    load: LoadControls,
    key_match: KeyMatch,
    assets_root: PathBuf,
}

impl SearchControls {
    /// Constructs a new set of search controls.
    pub fn new(
        threshold: f32,
        load: LoadControls,
        key_match: KeyMatch,
        assets_root: PathBuf,
    ) -> Self {
        Self {
            threshold,
            load,
            key_match,
            assets_root,
        }
    }

    /// Similarity a record must exceed to match.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Batching limits for corpus loads.
    pub fn load(&self) -> LoadControls {
        self.load
    }

    /// Video index key comparison.
    pub fn key_match(&self) -> KeyMatch {
        self.key_match
    }

    /// Directory holding frame images.
    pub fn assets_root(&self) -> &PathBuf {
        &self.assets_root
    }
}

impl Default for SearchControls {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            load: LoadControls::default(),
            key_match: KeyMatch::Prefix,
            assets_root: PathBuf::from("assets"),
        }
    }
}

/// Command-line flag for [`KeyMatch`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum KeyMatchArg {
    /// First index line whose key starts with the frame's key.
    Prefix,
    /// Index key must equal the frame's key.
    Exact,
}

impl From<KeyMatchArg> for KeyMatch {
    fn from(arg: KeyMatchArg) -> Self {
        match arg {
            KeyMatchArg::Prefix => KeyMatch::Prefix,
            KeyMatchArg::Exact => KeyMatch::Exact,
        }
    }
}

/// Options shared by binaries that search corpora and resolve frames.
#[derive(Args, Debug, Clone)]
pub struct Cli {
    /// Corpus catalog as comma separated id=path-or-url pairs
    #[arg(long, env = "FRAMESEARCH_CORPORA", default_value = DEFAULT_CATALOG)]
    pub corpora: String,

    /// Video index used for OCR frames (V###_frame keys)
    #[arg(
        long,
        env = "FRAMESEARCH_OCR_VIDEO_INDEX",
        default_value = "assets/frame_url_ocr.txt"
    )]
    pub ocr_video_index: String,

    /// Video index used for L13 path and underscore keys
    #[arg(
        long,
        env = "FRAMESEARCH_LEGACY_VIDEO_INDEX",
        default_value = "assets/frame_url.txt"
    )]
    pub legacy_video_index: String,

    /// Directory holding frame images (<source>/<frame>.jpg)
    #[arg(long, env = "FRAMESEARCH_ASSETS", default_value = "assets")]
    pub assets_root: PathBuf,

    /// How frame keys are matched against video index keys
    #[arg(long, env = "FRAMESEARCH_KEY_MATCH", value_enum, default_value = "prefix")]
    pub key_match: KeyMatchArg,

    /// Player embed base URL
    #[arg(long, env = "FRAMESEARCH_EMBED_BASE", default_value = DEFAULT_EMBED_BASE)]
    pub embed_base: String,

    /// Cosine similarity a record must exceed to match
    #[arg(long, env = "FRAMESEARCH_THRESHOLD", default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    pub threshold: f32,

    /// OpenAI API key used for embeddings and translation
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Embedding model identifier
    #[arg(
        long,
        env = "FRAMESEARCH_OPENAI_MODEL",
        default_value = "text-embedding-ada-002"
    )]
    pub openai_model: String,

    /// Optional embedding dimension override
    #[arg(long, env = "FRAMESEARCH_OPENAI_DIMENSIONS")]
    pub openai_dimensions: Option<usize>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(
        long,
        env = "FRAMESEARCH_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Max inputs per embedding request
    #[arg(long, env = "FRAMESEARCH_OPENAI_BATCH", default_value_t = 32)]
    pub batch_size: usize,

    /// Embedding requests kept in flight while loading a corpus
    #[arg(long, env = "FRAMESEARCH_OPENAI_CONCURRENCY", default_value_t = 4)]
    pub max_concurrent_batches: usize,

    /// Seconds before OpenAI requests time out
    #[arg(long, env = "FRAMESEARCH_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,

    /// Retry attempts for transient embedding errors
    #[arg(long, env = "FRAMESEARCH_OPENAI_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: usize,

    /// Chat model used to translate queries (translation is off when unset)
    #[arg(long, env = "FRAMESEARCH_TRANSLATE_MODEL")]
    pub translate_model: Option<String>,

    /// Language queries are translated into
    #[arg(long, env = "FRAMESEARCH_TRANSLATE_TO", default_value = "Vietnamese")]
    pub translate_to: String,
}

impl Cli {
    /// Converts the parsed CLI into `SearchControls`.
    pub fn build_controls(&self) -> SearchControls {
        SearchControls::new(
            self.threshold,
            LoadControls {
                batch_size: self.batch_size.max(1),
                max_concurrent_batches: self.max_concurrent_batches.max(1),
            },
            self.key_match.into(),
            self.assets_root.clone(),
        )
    }

    /// Parses the corpus catalog.
    pub fn catalog(&self) -> Result<CorpusCatalog> {
        let catalog = CorpusCatalog::parse(&self.corpora)?;
        anyhow::ensure!(!catalog.is_empty(), "no corpora configured");
        Ok(catalog)
    }

    /// Builds the embeddings client.
    pub fn embedder(&self) -> Result<OpenAiEmbedder> {
        OpenAiEmbedder::new(
            &self.openai_api_key,
            &self.openai_base_url,
            self.openai_model.clone(),
            self.openai_dimensions,
            self.timeout(),
            self.max_retries.max(1),
            self.batch_size.max(1),
        )
    }

    /// Builds the query translator when a chat model is configured.
    pub fn translator(&self) -> Result<Option<OpenAiTranslator>> {
        let Some(model) = &self.translate_model else {
            return Ok(None);
        };
        OpenAiTranslator::new(
            &self.openai_api_key,
            &self.openai_base_url,
            model.clone(),
            self.translate_to.clone(),
            self.timeout(),
        )
        .map(Some)
    }

    /// Builds the locator configuration.
    pub fn locator_config(&self) -> Result<LocatorConfig> {
        Ok(LocatorConfig {
            ocr_index: TextResource::parse(&self.ocr_video_index)?,
            legacy_index: TextResource::parse(&self.legacy_video_index)?,
            key_match: self.key_match.into(),
            embed_base: self.embed_base.clone(),
        })
    }

    /// Wires the shared services every front end needs.
    pub fn services(&self) -> Result<Services> {
        let controls = self.build_controls();
        let http = Client::builder()
            .timeout(self.timeout())
            .build()
            .context("failed to build resource HTTP client")?;
        let embedder: Arc<dyn Embedder> = Arc::new(self.embedder()?);
        let translator = self
            .translator()?
            .map(|t| Arc::new(t) as Arc<dyn Translator>);
        let corpora = Arc::new(CorpusCache::new(
            self.catalog()?,
            Arc::clone(&embedder),
            http.clone(),
            controls.load(),
        ));
        let locator = Arc::new(Locator::new(self.locator_config()?, http));
        Ok(Services {
            controls,
            embedder,
            translator,
            corpora,
            locator,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.openai_timeout_secs.max(1))
    }
}

/// Shared services handed to front ends.
#[derive(Clone)]
pub struct Services {
    /// Search knobs.
    pub controls: SearchControls,
    /// Embedding provider used for corpora and queries.
    pub embedder: Arc<dyn Embedder>,
    /// Optional query translator.
    pub translator: Option<Arc<dyn Translator>>,
    /// Load-once corpus cache.
    pub corpora: Arc<CorpusCache>,
    /// Frame locator.
    pub locator: Arc<Locator>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        shared: Cli,
    }

    #[test]
    fn defaults_build_controls() {
        let cli = TestCli::parse_from(["test", "--openai-api-key", "sk-test"]).shared;
        let controls = cli.build_controls();
        assert_eq!(controls.threshold(), DEFAULT_SIMILARITY_THRESHOLD);
        assert_eq!(controls.key_match(), KeyMatch::Prefix);
        assert_eq!(controls.load().batch_size, 32);
        assert_eq!(cli.catalog().expect("catalog").len(), 5);
        assert!(cli.translator().expect("translator").is_none());
    }

    #[test]
    fn exact_key_match_flag() {
        let cli = TestCli::parse_from([
            "test",
            "--openai-api-key",
            "sk-test",
            "--key-match",
            "exact",
            "--batch-size",
            "0",
        ])
        .shared;
        let controls = cli.build_controls();
        assert_eq!(controls.key_match(), KeyMatch::Exact);
        assert_eq!(controls.load().batch_size, 1);
    }
}
