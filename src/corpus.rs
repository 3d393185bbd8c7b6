//! Load-once cache of embedded OCR corpora, shared by every front end.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use tokio::sync::{Mutex, OnceCell};

use crate::embedder::Embedder;
use crate::embeddings::EmbeddedRecord;
use crate::ocr::{self, OcrRecord, SkippedLine};
use crate::resource::TextResource;

/// Maps corpus identities (e.g. a school grade) to their OCR index files.
#[derive(Debug, Clone, Default)]
pub struct CorpusCatalog {
    entries: BTreeMap<String, TextResource>,
}

impl CorpusCatalog {
    /// Builds a catalog from `(id, resource)` pairs.
    pub fn new<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, TextResource)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Parses `id=resource` pairs separated by commas.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (id, resource) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("corpus entry '{pair}' must look like id=path"))?;
            let id = id.trim();
            anyhow::ensure!(!id.is_empty(), "corpus entry '{pair}' has an empty id");
            let resource = TextResource::parse(resource)?;
            anyhow::ensure!(
                entries.insert(id.to_string(), resource).is_none(),
                "corpus id '{id}' listed twice"
            );
        }
        Ok(Self { entries })
    }

    /// Resource backing `id`, if configured.
    pub fn resource(&self, id: &str) -> Option<&TextResource> {
        self.entries.get(id)
    }

    /// Configured corpus ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of configured corpora.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no corpus is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Embedded records for one corpus identity.
#[derive(Debug)]
pub struct Corpus {
    id: String,
    records: Vec<EmbeddedRecord>,
    skipped: Vec<SkippedLine>,
}

impl Corpus {
    /// Assembles a corpus; every embedding must share one dimensionality.
    pub fn new(
        id: impl Into<String>,
        records: Vec<EmbeddedRecord>,
        skipped: Vec<SkippedLine>,
    ) -> Result<Self> {
        let id = id.into();
        if let Some(first) = records.first() {
            let dims = first.embedding.len();
            anyhow::ensure!(dims > 0, "corpus '{id}' received empty embeddings");
            if let Some(bad) = records.iter().find(|r| r.embedding.len() != dims) {
                anyhow::bail!(
                    "corpus '{id}' mixes embedding sizes: {} has {} dimensions, expected {dims}",
                    bad.frame_key(),
                    bad.embedding.len()
                );
            }
        }
        Ok(Self {
            id,
            records,
            skipped,
        })
    }

    /// Corpus identity.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Embedded records in file order.
    pub fn records(&self) -> &[EmbeddedRecord] {
        &self.records
    }

    /// Lines rejected while parsing the OCR index.
    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    /// Number of embedded records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the corpus holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding dimensionality, `None` for an empty corpus.
    pub fn dimensions(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }
}

/// Batching limits applied while embedding a corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadControls {
    /// Inputs per embedding request (clamped to the provider's maximum).
    pub batch_size: usize,
    /// Embedding requests allowed in flight at once.
    pub max_concurrent_batches: usize,
}

impl Default for LoadControls {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_concurrent_batches: 4,
        }
    }
}

type Slot = Arc<OnceCell<Arc<Corpus>>>;

/// Shared corpus cache: each identity is fetched and embedded at most once
/// until invalidated. Failed loads leave nothing behind and may be retried.
pub struct CorpusCache {
    catalog: CorpusCatalog,
    embedder: Arc<dyn Embedder>,
    http: Client,
    controls: LoadControls,
    slots: Mutex<HashMap<String, Slot>>,
}

impl CorpusCache {
    /// Builds an empty cache over `catalog`.
    pub fn new(
        catalog: CorpusCatalog,
        embedder: Arc<dyn Embedder>,
        http: Client,
        controls: LoadControls,
    ) -> Self {
        Self {
            catalog,
            embedder,
            http,
            controls,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Catalog this cache serves.
    pub fn catalog(&self) -> &CorpusCatalog {
        &self.catalog
    }

    /// Returns the corpus for `id`, loading and embedding it on first use.
    /// Concurrent callers for the same id share one load.
    pub async fn load(&self, id: &str) -> Result<Arc<Corpus>> {
        let resource = self
            .catalog
            .resource(id)
            .ok_or_else(|| anyhow!("unknown corpus '{id}'"))?
            .clone();
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(id.to_string()).or_default())
        };
        let corpus = slot
            .get_or_try_init(|| self.build(id, &resource))
            .await
            .with_context(|| format!("failed to load corpus '{id}'"))?;
        Ok(Arc::clone(corpus))
    }

    /// Returns the corpus for `id` only if it is already loaded.
    pub async fn cached(&self, id: &str) -> Option<Arc<Corpus>> {
        let slots = self.slots.lock().await;
        slots.get(id).and_then(|slot| slot.get().cloned())
    }

    /// Drops the cached corpus for `id`. Returns whether one was cached.
    ///
    /// A load still in flight keeps its slot, so concurrent callers keep
    /// sharing it; invalidate again once it settles to force a reload.
    pub async fn invalidate(&self, id: &str) -> bool {
        let mut slots = self.slots.lock().await;
        match slots.get(id) {
            Some(slot) if slot.initialized() => {
                slots.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Ids of corpora currently held in memory.
    pub async fn loaded_ids(&self) -> Vec<String> {
        let slots = self.slots.lock().await;
        let mut ids: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    async fn build(&self, id: &str, resource: &TextResource) -> Result<Arc<Corpus>> {
        let body = resource.fetch(&self.http).await?;
        let parsed = ocr::parse_index(&body);
        if !parsed.skipped.is_empty() {
            eprintln!(
                "corpus '{id}': skipped {} malformed line(s) in {resource}",
                parsed.skipped.len()
            );
            #[cfg(feature = "debug_logs")]
            for line in &parsed.skipped {
                crate::debug_log!("  line {}: {}", line.line_no, line.reason);
            }
        }
        let total = parsed.records.len();
        eprintln!("corpus '{id}': embedding {total} record(s) from {resource}...");
        let records = embed_records(Arc::clone(&self.embedder), parsed.records, self.controls)
            .await?;
        let corpus = Corpus::new(id, records, parsed.skipped)?;
        eprintln!("corpus '{id}': loaded {} record(s).", corpus.len());
        Ok(Arc::new(corpus))
    }
}

/// Embeds `records` in bounded concurrent batches, preserving input order.
pub async fn embed_records(
    embedder: Arc<dyn Embedder>,
    records: Vec<OcrRecord>,
    controls: LoadControls,
) -> Result<Vec<EmbeddedRecord>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let batch_size = controls.batch_size.clamp(1, embedder.batch_size().max(1));
    let in_flight = controls.max_concurrent_batches.max(1);

    let mut batches: Vec<Vec<OcrRecord>> = Vec::new();
    let mut remaining = records.into_iter().peekable();
    while remaining.peek().is_some() {
        batches.push(remaining.by_ref().take(batch_size).collect());
    }
    let batch_count = batches.len();

    let embedded: Vec<Vec<EmbeddedRecord>> = stream::iter(batches.into_iter().enumerate())
        .map(|(batch_id, batch)| {
            let embedder = Arc::clone(&embedder);
            async move {
                let joined = tokio::task::spawn_blocking(move || -> Result<Vec<EmbeddedRecord>> {
                    let inputs: Vec<&str> = batch.iter().map(|r| r.text.as_str()).collect();
                    let vectors = embedder.embed_batch(&inputs)?;
                    anyhow::ensure!(
                        vectors.len() == batch.len(),
                        "embedding count {} mismatched batch size {}",
                        vectors.len(),
                        batch.len()
                    );
                    Ok(batch
                        .into_iter()
                        .zip(vectors)
                        .map(|(record, vector)| EmbeddedRecord::new(record, vector))
                        .collect())
                })
                .await
                .map_err(|err| anyhow!("embedding task join error: {err}"))?;
                crate::debug_log!("embedded batch {}/{}", batch_id + 1, batch_count);
                joined.with_context(|| {
                    format!("embedding batch {}/{} failed", batch_id + 1, batch_count)
                })
            }
        })
        .buffered(in_flight)
        .try_collect()
        .await?;
    Ok(embedded.into_iter().flatten().collect())
}
