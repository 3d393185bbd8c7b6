use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use framesearch::controls::{Cli, Services};
use framesearch::matcher::{self, SearchOutcome, SearchSession, SearchToken, SessionStatus};
use framesearch::{DetailState, DetailView, FrameRef, LibraryState, Playback};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[path = "console/commands.rs"]
mod commands;

use commands::Command;

#[derive(Parser, Debug)]
#[command(
    name = "framesearch-console",
    about = "Search lecture keyframes by their on-screen text from a terminal"
)]
struct ConsoleCli {
    /// Corpus searched at startup
    #[arg(long, env = "FRAMESEARCH_CORPUS", default_value = "grade6")]
    corpus: String,

    /// File holding uploaded video names and the sample flag
    #[arg(
        long,
        env = "FRAMESEARCH_LIBRARY_STATE",
        default_value = ".framesearch/library.json"
    )]
    library_state: PathBuf,

    /// Load the startup corpus before reading input
    #[arg(long, default_value_t = false)]
    preload: bool,

    #[command(flatten)]
    shared: Cli,
}

/// Completions delivered back to the input loop.
enum Event {
    Searched {
        token: SearchToken,
        result: Result<SearchOutcome>,
    },
    Resolved {
        position: usize,
        result: Result<Option<Playback>>,
    },
    Loaded {
        id: String,
        result: Result<usize>,
    },
}

struct Console {
    services: Services,
    corpus: String,
    session: SearchSession,
    detail: DetailView,
    image_id: u64,
    library: LibraryState,
    library_path: PathBuf,
    events: UnboundedSender<Event>,
}

fn main() -> Result<()> {
    let cli = ConsoleCli::parse();
    // Provider clients are blocking reqwest clients; build them before the
    // async runtime exists.
    let services = cli.shared.services()?;
    anyhow::ensure!(
        services.corpora.catalog().resource(&cli.corpus).is_some(),
        "unknown corpus '{}'",
        cli.corpus
    );
    let library = LibraryState::load(&cli.library_state)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let console = Console {
        services,
        corpus: cli.corpus,
        session: SearchSession::new(),
        detail: DetailView::new(),
        image_id: 0,
        library,
        library_path: cli.library_state,
        events: tx,
    };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    let result = runtime.block_on(console.run(rx, cli.preload));
    // A pending stdin read cannot be cancelled; do not wait for it.
    runtime.shutdown_background();
    result
}

impl Console {
    async fn run(mut self, mut events: UnboundedReceiver<Event>, preload: bool) -> Result<()> {
        if preload {
            let corpus = self.services.corpora.load(&self.corpus).await?;
            eprintln!("loaded corpus '{}' ({} frames)", corpus.id(), corpus.len());
        } else {
            self.spawn_load();
        }
        println!("corpus '{}'; type :help for commands", self.corpus);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("failed to read stdin")? else {
                        break;
                    };
                    match commands::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(command) => self.handle(command).await,
                        Err(message) => println!("{message}"),
                    }
                }
                Some(event) = events.recv() => self.on_event(event),
            }
        }
        Ok(())
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Search(query) => self.spawn_search(query),
            Command::Corpus(id) => self.switch_corpus(id),
            Command::Corpora => self.list_corpora().await,
            Command::Open(number) => {
                let frames: Vec<FrameRef> = self
                    .session
                    .results()
                    .iter()
                    .map(|m| FrameRef::Ocr {
                        source_id: m.source_id.clone(),
                        frame_index: m.frame_index,
                    })
                    .collect();
                self.open(frames, number - 1, 0);
            }
            Command::Show { key, image_id } => match FrameRef::parse(&key, image_id) {
                Ok(frame) => self.open(vec![frame], 0, image_id),
                Err(err) => println!("{err}"),
            },
            Command::Next => {
                if self.detail.next().is_none() {
                    println!("already at the last frame");
                } else {
                    self.spawn_resolve();
                }
            }
            Command::Prev => {
                if self.detail.prev().is_none() {
                    println!("already at the first frame");
                } else {
                    self.spawn_resolve();
                }
            }
            Command::Play => match self.detail.state() {
                DetailState::Idle => println!("no frame open"),
                DetailState::Loading => println!("still locating the video"),
                _ => {
                    self.detail.toggle();
                    self.render_detail();
                }
            },
            Command::Close => self.detail.close(),
            Command::Upload(name) => {
                if self.library.record_upload(&name) {
                    self.save_library();
                } else {
                    println!("'{}' is already listed", name.trim());
                }
            }
            Command::Uploads => {
                if self.library.uploaded_videos.is_empty() {
                    println!("no uploaded videos");
                }
                for (i, name) in self.library.uploaded_videos.iter().enumerate() {
                    println!("{:>3}. {name}", i + 1);
                }
                if self.library.has_sample_video {
                    println!("sample lecture available");
                }
            }
            Command::Sample(available) => {
                if self.library.mark_sample_video(available) {
                    self.save_library();
                }
            }
            Command::Help => println!("{}", commands::HELP),
            Command::Quit | Command::Nothing => {}
        }
    }

    fn on_event(&mut self, event: Event) {
        match event {
            Event::Searched { token, result } => {
                let applied = match result {
                    Ok(outcome) => self.session.apply(token, outcome),
                    Err(err) => self.session.fail(token, format!("{err:#}")),
                };
                // False when a newer search has started.
                if applied {
                    self.render_results();
                }
            }
            Event::Resolved { position, result } => {
                let playback = result.unwrap_or_else(|err| {
                    eprintln!("failed to locate video: {err:#}");
                    None
                });
                if self.detail.apply_playback(position, playback) {
                    self.render_detail();
                }
            }
            Event::Loaded { id, result } => match result {
                Ok(count) => eprintln!("loaded corpus '{id}' ({count} frames)"),
                Err(err) => eprintln!("{err:#}"),
            },
        }
    }

    fn spawn_search(&mut self, query: String) {
        let token = self.session.begin();
        let corpus = self.corpus.clone();
        let services = self.services.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = run_search(&services, &corpus, &query).await;
            let _ = events.send(Event::Searched { token, result });
        });
    }

    fn spawn_load(&self) {
        let id = self.corpus.clone();
        let corpora = Arc::clone(&self.services.corpora);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = corpora.load(&id).await.map(|corpus| corpus.len());
            let _ = events.send(Event::Loaded { id, result });
        });
    }

    fn spawn_resolve(&self) {
        let Some(frame) = self.detail.current().cloned() else {
            return;
        };
        let position = self.detail.position();
        let locator = Arc::clone(&self.services.locator);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = locator.resolve(&frame).await;
            let _ = events.send(Event::Resolved { position, result });
        });
    }

    fn switch_corpus(&mut self, id: String) {
        if self.services.corpora.catalog().resource(&id).is_none() {
            println!("unknown corpus '{id}'");
            return;
        }
        self.corpus = id;
        self.session.clear();
        self.detail.close();
        println!("corpus '{}'", self.corpus);
        self.spawn_load();
    }

    async fn list_corpora(&self) {
        let loaded = self.services.corpora.loaded_ids().await;
        for id in self.services.corpora.catalog().ids() {
            let marker = if id == self.corpus { "*" } else { " " };
            let state = if loaded.iter().any(|l| l == id) {
                "loaded"
            } else {
                "not loaded"
            };
            println!("{marker} {id} ({state})");
        }
    }

    fn open(&mut self, frames: Vec<FrameRef>, position: usize, image_id: u64) {
        let count = frames.len();
        if self.detail.open(frames, position).is_none() {
            println!("no result {} (have {count})", position + 1);
            return;
        }
        self.image_id = image_id;
        self.render_detail();
        self.spawn_resolve();
    }

    fn save_library(&self) {
        if let Err(err) = self.library.save(&self.library_path) {
            eprintln!("{err:#}");
        }
    }

    fn render_results(&self) {
        match self.session.status() {
            SessionStatus::Failed(message) => {
                println!("search failed: {message}");
                return;
            }
            SessionStatus::Idle => {
                println!("nothing to search");
                return;
            }
            SessionStatus::Busy | SessionStatus::Ready => {}
        }
        let results = self.session.results();
        if results.is_empty() {
            println!("no matching frames");
        }
        let root = self.services.controls.assets_root();
        for (i, m) in results.iter().enumerate() {
            let frame = FrameRef::Ocr {
                source_id: m.source_id.clone(),
                frame_index: m.frame_index,
            };
            println!(
                "{:>3}. {:<12} {:.3}  {}",
                i + 1,
                m.frame_key(),
                m.similarity,
                frame.image_path(root, 0).display()
            );
        }
    }

    fn render_detail(&self) {
        let Some(frame) = self.detail.current() else {
            return;
        };
        let header = format!(
            "[{}/{}] {frame}",
            self.detail.position() + 1,
            self.detail.len()
        );
        match self.detail.state() {
            DetailState::ShowVideo => {
                if let Some(playback) = self.detail.playback() {
                    println!("{header}  video {}", playback.embed_url);
                }
            }
            DetailState::Loading => {
                let image = frame.image_path(self.services.controls.assets_root(), self.image_id);
                println!("{header}  image {}", image.display());
            }
            DetailState::ShowImage => match self.detail.playback() {
                Some(playback) => println!(
                    "{header}  video at {}s available (:play)",
                    playback.start_seconds
                ),
                None => println!("{header}  no video found"),
            },
            DetailState::Idle => {}
        }
    }
}

async fn run_search(services: &Services, corpus_id: &str, query: &str) -> Result<SearchOutcome> {
    let corpus = services.corpora.load(corpus_id).await?;
    let query = match &services.translator {
        Some(translator) if !query.trim().is_empty() => {
            matcher::translate_query(Arc::clone(translator), query).await?
        }
        _ => query.to_string(),
    };
    matcher::search(
        Arc::clone(&services.embedder),
        &query,
        &corpus,
        services.controls.threshold(),
    )
    .await
}
