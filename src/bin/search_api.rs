use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use clap::Parser;
use framesearch::corpus::Corpus;
use framesearch::matcher::{self, SearchOutcome};
use framesearch::{CachingEmbedder, Cli, Embedder, FrameRef, Playback, Services};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "framesearch-api",
    about = "HTTP API for semantic search over lecture keyframe OCR text"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "FRAMESEARCH_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Load every configured corpus before accepting requests.
    #[arg(long, default_value_t = false)]
    preload: bool,

    /// Max cached query embeddings kept in-memory (0 disables caching).
    #[arg(long, default_value_t = 1024)]
    embedding_cache_size: usize,

    #[command(flatten)]
    shared: Cli,
}

#[derive(Clone)]
struct AppState {
    services: Services,
    query_embedder: Arc<dyn Embedder>,
}

impl AppState {
    fn new(services: Services, embedding_cache_size: usize) -> Self {
        let query_embedder =
            CachingEmbedder::wrap(Arc::clone(&services.embedder), embedding_cache_size);
        Self {
            services,
            query_embedder,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    corpus: String,
    query: String,
    #[serde(default)]
    translate: bool,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    status: &'static str,
    matches: Vec<ResponseMatch>,
    meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
struct ResponseMeta {
    corpus: String,
    threshold: f32,
    latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    translated_query: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponseMatch {
    source_id: String,
    frame_index: u64,
    similarity: f32,
    frame_key: String,
    image_path: String,
}

#[derive(Debug, Serialize)]
struct CorpusSummary {
    id: String,
    loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped_lines: Option<usize>,
}

impl CorpusSummary {
    fn loaded(corpus: &Corpus) -> Self {
        Self {
            id: corpus.id().to_string(),
            loaded: true,
            records: Some(corpus.len()),
            skipped_lines: Some(corpus.skipped().len()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaybackParams {
    #[serde(default)]
    default_image_id: u64,
}

/// Still image for the frame, plus where to watch it when the index knows.
#[derive(Debug, Serialize)]
struct PlaybackResponse {
    frame: FrameRef,
    image_path: String,
    playback: Option<Playback>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn main() -> Result<()> {
    let cli = ApiCli::parse();
    // Provider clients are blocking reqwest clients; build them before the
    // async runtime exists.
    let services = cli.shared.services()?;
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(serve(cli, services))
}

async fn serve(cli: ApiCli, services: Services) -> Result<()> {
    if cli.preload {
        let ids: Vec<String> = services.corpora.catalog().ids().map(str::to_string).collect();
        for id in ids {
            services.corpora.load(&id).await?;
        }
    }
    let app = router(AppState::new(services, cli.embedding_cache_size));

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr().context("listener has no local address")?;
    println!("framesearch-api listening on http://{local}");
    axum::serve(listener, app)
        .await
        .context("server shutdown")?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/corpora", get(list_corpora))
        .route("/v1/corpora/:id/load", post(load_corpus))
        .route("/v1/corpora/:id", delete(invalidate_corpus))
        .route("/v1/search", post(search_handler))
        .route("/v1/frames/:key/playback", get(playback_handler))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn list_corpora(State(state): State<AppState>) -> Json<Vec<CorpusSummary>> {
    let corpora = &state.services.corpora;
    let mut out = Vec::new();
    for id in corpora.catalog().ids() {
        let summary = match corpora.cached(id).await {
            Some(corpus) => CorpusSummary::loaded(&corpus),
            None => CorpusSummary {
                id: id.to_string(),
                loaded: false,
                records: None,
                skipped_lines: None,
            },
        };
        out.push(summary);
    }
    Json(out)
}

async fn load_corpus(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CorpusSummary>, ApiError> {
    ensure_known(&state, &id)?;
    let corpus = state
        .services
        .corpora
        .load(&id)
        .await
        .map_err(upstream_error)?;
    Ok(Json(CorpusSummary::loaded(&corpus)))
}

async fn invalidate_corpus(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ensure_known(&state, &id)?;
    if state.services.corpora.invalidate(&id).await {
        eprintln!("corpus '{id}' invalidated");
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query text must not be empty"));
    }
    ensure_known(&state, &request.corpus)?;
    let start = Instant::now();
    let corpus = state
        .services
        .corpora
        .load(&request.corpus)
        .await
        .map_err(upstream_error)?;

    let mut query = request.query.trim().to_string();
    let mut translated_query = None;
    if request.translate {
        let translator = state
            .services
            .translator
            .clone()
            .ok_or_else(|| bad_request("translation is not configured on this server"))?;
        query = matcher::translate_query(translator, &query)
            .await
            .map_err(upstream_error)?;
        translated_query = Some(query.clone());
    }

    let threshold = state.services.controls.threshold();
    let outcome = matcher::search(
        Arc::clone(&state.query_embedder),
        &query,
        &corpus,
        threshold,
    )
    .await
    .map_err(upstream_error)?;
    let (status, matches) = match outcome {
        SearchOutcome::Skipped => ("skipped", Vec::new()),
        SearchOutcome::Completed(matches) => ("completed", matches),
    };

    let assets_root = state.services.controls.assets_root();
    let matches = matches
        .into_iter()
        .map(|m| {
            let frame = FrameRef::Ocr {
                source_id: m.source_id.clone(),
                frame_index: m.frame_index,
            };
            ResponseMatch {
                frame_key: m.frame_key(),
                image_path: frame.image_path(assets_root, 0).display().to_string(),
                source_id: m.source_id,
                frame_index: m.frame_index,
                similarity: m.similarity,
            }
        })
        .collect();
    Ok(Json(SearchResponse {
        status,
        matches,
        meta: ResponseMeta {
            corpus: request.corpus,
            threshold,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            translated_query,
        },
    }))
}

async fn playback_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<PlaybackParams>,
) -> Result<Json<PlaybackResponse>, ApiError> {
    let frame = FrameRef::parse(&key, params.default_image_id)
        .map_err(|err| bad_request(err.to_string()))?;
    let playback = state
        .services
        .locator
        .resolve(&frame)
        .await
        .map_err(upstream_error)?;
    let image_path = frame
        .image_path(state.services.controls.assets_root(), params.default_image_id)
        .display()
        .to_string();
    Ok(Json(PlaybackResponse {
        frame,
        image_path,
        playback,
    }))
}

fn ensure_known(state: &AppState, id: &str) -> Result<(), ApiError> {
    if state.services.corpora.catalog().resource(id).is_none() {
        return Err(not_found(format!("unknown corpus '{id}'")));
    }
    Ok(())
}

fn bad_request(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::BAD_REQUEST, message)
}

fn not_found(message: impl Into<String>) -> ApiError {
    error_body(StatusCode::NOT_FOUND, message)
}

fn upstream_error(err: anyhow::Error) -> ApiError {
    eprintln!("upstream failure: {err:#}");
    error_body(StatusCode::BAD_GATEWAY, format!("{err:#}"))
}

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use framesearch::locator::DEFAULT_EMBED_BASE;
    use framesearch::{
        CorpusCache, CorpusCatalog, KeyMatch, LoadControls, Locator, LocatorConfig,
        SearchControls, TextResource,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    /// Two topic axes; any input mentioning "offline" fails like a dead provider.
    struct TopicEmbedder;

    impl Embedder for TopicEmbedder {
        fn batch_size(&self) -> usize {
            8
        }

        fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            inputs
                .iter()
                .map(|text| {
                    anyhow::ensure!(!text.contains("offline"), "provider unavailable");
                    let text = text.to_lowercase();
                    let fractions = if text.contains("phân số") { 1.0 } else { 0.0 };
                    let area = if text.contains("diện tích") { 1.0 } else { 0.0 };
                    Ok(vec![fractions, area, 0.1])
                })
                .collect()
        }
    }

    fn fixture(name: &str) -> TextResource {
        TextResource::parse(&format!(
            "{}/tests/fixtures/{name}",
            env!("CARGO_MANIFEST_DIR")
        ))
        .expect("fixture path")
    }

    fn services() -> Services {
        let embedder: Arc<dyn Embedder> = Arc::new(TopicEmbedder);
        let http = reqwest::Client::new();
        let catalog = CorpusCatalog::new([("grade6".to_string(), fixture("ocr_004.txt"))]);
        let locator = LocatorConfig {
            ocr_index: fixture("frame_url_ocr.txt"),
            legacy_index: fixture("frame_url.txt"),
            key_match: KeyMatch::Prefix,
            embed_base: DEFAULT_EMBED_BASE.to_string(),
        };
        Services {
            controls: SearchControls::default(),
            embedder: Arc::clone(&embedder),
            translator: None,
            corpora: Arc::new(CorpusCache::new(
                catalog,
                embedder,
                http.clone(),
                LoadControls::default(),
            )),
            locator: Arc::new(Locator::new(locator, http)),
        }
    }

    async fn spawn_app() -> String {
        let app = router(AppState::new(services(), 16));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    async fn post_search(base: &str, body: Value) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .post(format!("{base}/v1/search"))
            .json(&body)
            .send()
            .await
            .expect("search request");
        let status = resp.status().as_u16();
        (status, resp.json().await.expect("json body"))
    }

    async fn get_playback(base: &str, key: &str) -> (u16, Value) {
        let resp = reqwest::Client::new()
            .get(format!("{base}/v1/frames/{key}/playback"))
            .send()
            .await
            .expect("playback request");
        let status = resp.status().as_u16();
        (status, resp.json().await.expect("json body"))
    }

    #[tokio::test(flavor = "current_thread")]
    async fn search_returns_ranked_frames() {
        let base = spawn_app().await;
        let (status, body) =
            post_search(&base, json!({ "corpus": "grade6", "query": "phân số" })).await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["status"], "completed");
        let keys: Vec<&str> = body["matches"]
            .as_array()
            .expect("matches")
            .iter()
            .map(|m| m["frame_key"].as_str().expect("frame_key"))
            .collect();
        assert_eq!(keys, vec!["V004_0", "V004_250"]);
        assert_eq!(body["matches"][0]["image_path"], "assets/V004/0.jpg");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn search_rejects_bad_requests() {
        let base = spawn_app().await;
        let (status, _) = post_search(&base, json!({ "corpus": "grade6", "query": "  " })).await;
        assert_eq!(status, 400);
        let (status, body) =
            post_search(&base, json!({ "corpus": "grade12", "query": "phân số" })).await;
        assert_eq!(status, 404);
        assert_eq!(body["message"], "unknown corpus 'grade12'");
        let (status, _) = post_search(
            &base,
            json!({ "corpus": "grade6", "query": "phân số", "translate": true }),
        )
        .await;
        assert_eq!(status, 400);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn provider_failure_is_a_bad_gateway() {
        let base = spawn_app().await;
        let (status, body) =
            post_search(&base, json!({ "corpus": "grade6", "query": "offline" })).await;
        assert_eq!(status, 502);
        assert!(
            body["message"]
                .as_str()
                .expect("message")
                .contains("provider unavailable"),
            "{body}"
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn playback_resolves_or_falls_back_to_the_image() {
        let base = spawn_app().await;

        let (status, body) = get_playback(&base, "V004_125").await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["frame"]["kind"], "ocr");
        assert_eq!(body["playback"]["start_seconds"], 5);
        assert_eq!(body["playback"]["video_id"], "abc123");

        let (status, body) = get_playback(&base, "V009_10").await;
        assert_eq!(status, 200, "{body}");
        assert_eq!(body["playback"], Value::Null);
        assert_eq!(body["image_path"], "assets/V009/10.jpg");

        let (status, body) = get_playback(&base, "L13_V001_abc").await;
        assert_eq!(status, 400);
        assert_eq!(body["message"], "invalid frame index 'abc'");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn corpora_report_load_state() {
        let base = spawn_app().await;
        let client = reqwest::Client::new();
        let before: Value = client
            .get(format!("{base}/v1/corpora"))
            .send()
            .await
            .expect("list")
            .json()
            .await
            .expect("json");
        assert_eq!(before, json!([{ "id": "grade6", "loaded": false }]));

        let loaded: Value = client
            .post(format!("{base}/v1/corpora/grade6/load"))
            .send()
            .await
            .expect("load")
            .json()
            .await
            .expect("json");
        assert_eq!(
            loaded,
            json!({ "id": "grade6", "loaded": true, "records": 3, "skipped_lines": 2 })
        );

        let status = client
            .delete(format!("{base}/v1/corpora/grade6"))
            .send()
            .await
            .expect("invalidate")
            .status();
        assert_eq!(status.as_u16(), 204);
    }
}
