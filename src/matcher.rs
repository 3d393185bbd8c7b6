//! Semantic matching of a query against an embedded corpus.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::corpus::Corpus;
use crate::embedder::{Embedder, Translator};
use crate::embeddings::EmbeddedRecord;

/// Records must score strictly above this cosine similarity to match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.8;

/// Frame whose OCR text matched a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Source video identifier.
    pub source_id: String,
    /// Keyframe number within the source video.
    pub frame_index: u64,
    /// Cosine similarity between the query and the record, in `[-1, 1]`.
    pub similarity: f32,
}

impl MatchResult {
    /// Composite key handed to the frame locator (`V004_123`).
    pub fn frame_key(&self) -> String {
        format!("{}_{}", self.source_id, self.frame_index)
    }
}

/// What a search invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Empty query or empty corpus; callers keep whatever they showed before.
    Skipped,
    /// Matches sorted by descending similarity (possibly none).
    Completed(Vec<MatchResult>),
}

/// Cosine similarity of two vectors.
///
/// Vectors of different lengths, empty vectors, and zero-norm vectors score
/// `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Scores every record against `query`, keeps those above `threshold`, and
/// orders them by descending similarity. Ties keep corpus order.
pub fn rank(query: &[f32], records: &[EmbeddedRecord], threshold: f32) -> Vec<MatchResult> {
    let mut matches: Vec<MatchResult> = records
        .iter()
        .filter_map(|record| {
            let similarity = cosine_similarity(query, &record.embedding);
            (similarity > threshold).then(|| MatchResult {
                source_id: record.source_id.clone(),
                frame_index: record.frame_index,
                similarity,
            })
        })
        .collect();
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    matches
}

/// Embeds `query` and ranks `corpus` against it.
///
/// Provider failures are returned as errors so callers can tell them apart
/// from a search that genuinely matched nothing.
pub async fn search(
    embedder: Arc<dyn Embedder>,
    query: &str,
    corpus: &Corpus,
    threshold: f32,
) -> Result<SearchOutcome> {
    let query = query.trim();
    if query.is_empty() || corpus.is_empty() {
        return Ok(SearchOutcome::Skipped);
    }
    let owned = query.to_string();
    let embedding = tokio::task::spawn_blocking(move || embedder.embed_one(&owned))
        .await
        .map_err(|err| anyhow!("embedding task join error: {err}"))??;
    if let Some(dimensions) = corpus.dimensions() {
        anyhow::ensure!(
            embedding.len() == dimensions,
            "query embedding has {} dimensions but corpus '{}' uses {}",
            embedding.len(),
            corpus.id(),
            dimensions
        );
    }
    let matches = rank(&embedding, corpus.records(), threshold);
    crate::debug_log!(
        "query '{query}' matched {} of {} records in '{}'",
        matches.len(),
        corpus.len(),
        corpus.id()
    );
    Ok(SearchOutcome::Completed(matches))
}

/// Rewrites `query` through `translator` on the blocking pool.
pub async fn translate_query(translator: Arc<dyn Translator>, query: &str) -> Result<String> {
    let owned = query.to_string();
    tokio::task::spawn_blocking(move || translator.translate(&owned))
        .await
        .map_err(|err| anyhow!("translation task join error: {err}"))?
}

/// Ticket handed out for each search so late responses can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SearchToken(u64);

/// Visible state of the most recent search.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    /// Nothing searched yet (or the corpus changed).
    Idle,
    /// The latest search is outstanding.
    Busy,
    /// The latest search finished; results are current.
    Ready,
    /// The latest search failed.
    Failed(String),
}

/// Result list owned by one front end, guarded by generation tokens so that
/// only the latest search may update it.
#[derive(Debug)]
pub struct SearchSession {
    latest: u64,
    status: SessionStatus,
    settled: SessionStatus,
    results: Vec<MatchResult>,
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self {
            latest: 0,
            status: SessionStatus::Idle,
            settled: SessionStatus::Idle,
            results: Vec::new(),
        }
    }

    /// Issues a fresh token; every earlier token becomes stale.
    pub fn begin(&mut self) -> SearchToken {
        self.latest += 1;
        if self.status != SessionStatus::Busy {
            self.settled = self.status.clone();
        }
        self.status = SessionStatus::Busy;
        SearchToken(self.latest)
    }

    /// Whether `token` belongs to the latest search.
    pub fn is_current(&self, token: SearchToken) -> bool {
        token.0 == self.latest
    }

    /// Applies a finished search. Returns `false` when the outcome was
    /// discarded because a newer search had started.
    pub fn apply(&mut self, token: SearchToken, outcome: SearchOutcome) -> bool {
        if !self.is_current(token) {
            return false;
        }
        match outcome {
            SearchOutcome::Completed(matches) => {
                self.results = matches;
                self.status = SessionStatus::Ready;
            }
            SearchOutcome::Skipped => self.status = self.settled.clone(),
        }
        true
    }

    /// Records a failure for the latest search. Prior results stay visible.
    pub fn fail(&mut self, token: SearchToken, message: impl Into<String>) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.status = SessionStatus::Failed(message.into());
        true
    }

    /// Drops results and invalidates outstanding searches.
    pub fn clear(&mut self) {
        self.latest += 1;
        self.results.clear();
        self.status = SessionStatus::Idle;
        self.settled = SessionStatus::Idle;
    }

    /// Current status.
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Visible results.
    pub fn results(&self) -> &[MatchResult] {
        &self.results
    }
}
