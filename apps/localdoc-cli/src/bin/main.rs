use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use localdoc_core::config::{Config, ContextMode, Settings};
use localdoc_core::data_processor::DataProcessor;
use localdoc_core::Corpus;
use localdoc_feedback::JsonFeedbackStore;
use localdoc_hybrid::{RankedResults, SearchEngine, SearchOptions};
use localdoc_text::Normalizer;
use localdoc_vector::{EmbedProvider, EmbeddingCache, LocalProvider};

#[derive(Parser)]
#[command(name = "localdoc", version, about = "Offline document search with hybrid ranking and relevance feedback")]
struct Cli {
    /// Directory holding config.toml; relative paths resolve against it
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Debug logging for localdoc crates
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read the docs directory and embed every chunk into the cache
    Ingest,
    /// Rank chunks for a query
    Search {
        query: String,
        /// Restrict to one document id
        #[arg(long)]
        doc: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rate a chunk for a query
    #[command(group(ArgGroup::new("rating").required(true).args(["relevant", "irrelevant"])))]
    Feedback {
        query: String,
        chunk_id: String,
        #[arg(long)]
        relevant: bool,
        #[arg(long)]
        irrelevant: bool,
    },
    /// Summarize stored feedback
    FeedbackStats,
    /// Delete all stored feedback
    FeedbackClear,
    /// Print the bounded context an LLM would receive for a query
    Context {
        query: String,
        #[arg(long)]
        doc: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Lines,
    Paragraph,
    Snippet,
}

impl From<Mode> for ContextMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Lines => ContextMode::Lines,
            Mode::Paragraph => ContextMode::Paragraph,
            Mode::Snippet => ContextMode::Snippet,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "info,localdoc=debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry().with(env_filter).with(fmt::layer().with_writer(std::io::stderr)).init();
}

fn load_settings(config_dir: Option<PathBuf>) -> Result<Settings> {
    let settings = match config_dir {
        Some(dir) => Config::load_from(&dir),
        None => Config::load(),
    };
    settings.context("loading configuration")
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Ingests the docs directory and builds the engine, embedding whatever the
/// cache does not hold yet.
fn open_engine(settings: Settings, show_progress: bool) -> Result<SearchEngine> {
    let normalizer = Normalizer::from_settings(&settings.normalize)?;
    let documents = DataProcessor::new(&normalizer)
        .process_directory(&settings.data.docs_dir)
        .with_context(|| format!("reading documents from {}", settings.data.docs_dir.display()))?;
    let corpus = Corpus::from_documents(documents)?;
    let provider = LocalProvider::new(&settings.embedding)?;
    let mut cache = EmbeddingCache::open(&settings.data.embedding_cache, provider.embedder_id(), provider.dim())?;
    let store = JsonFeedbackStore::open(&settings.feedback.dir)?;

    let pb = if show_progress { progress_bar(corpus.chunk_count())? } else { ProgressBar::hidden() };
    let (engine, report) = SearchEngine::build(settings, corpus, Box::new(provider), store, &mut cache, &pb)?;
    pb.finish_and_clear();
    cache.save()?;
    if !report.missing.is_empty() {
        tracing::warn!(missing = report.missing.len(), "some chunks have no embedding and rank on fuzzy/feedback only");
    }
    Ok(engine)
}

fn print_results(ranked: &RankedResults) {
    if ranked.results.is_empty() {
        println!("No matches.");
    }
    for (rank, r) in ranked.results.iter().enumerate() {
        let page = r.page_number.map_or_else(|| "-".to_string(), |p| p.to_string());
        let line = r.line_number.map_or_else(|| "-".to_string(), |l| l.to_string());
        println!(
            "{}. {} (page {page}, line {line})  score {:.3}  [sem {:.3} fuzzy {:.3} feedback {:+}]",
            rank + 1,
            r.chunk_id,
            r.final_score,
            r.semantic_score,
            r.fuzzy_score,
            r.feedback_score
        );
        for l in &r.context.before { println!("     {l}"); }
        println!("   > {}", r.context.matched);
        for l in &r.context.after { println!("     {l}"); }
    }
    for d in &ranked.degraded {
        eprintln!("degraded: {d:?}");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let settings = load_settings(cli.config_dir)?;

    match cli.command {
        Command::Ingest => {
            let docs_dir = settings.data.docs_dir.clone();
            let engine = open_engine(settings, true)?;
            info!(dir = %docs_dir.display(), "ingest complete");
            println!(
                "Ingested {} documents ({} chunks, {} embedded)",
                engine.corpus().documents().len(),
                engine.corpus().chunk_count(),
                engine.index().len()
            );
        }
        Command::Search { query, doc, top_k, mode, json } => {
            let engine = open_engine(settings, false)?;
            let ranked = engine.search(&query, doc.as_deref(), SearchOptions { top_k, mode: mode.map(Into::into) })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ranked)?);
            } else {
                print_results(&ranked);
            }
        }
        Command::Feedback { query, chunk_id, relevant, .. } => {
            let engine = open_engine(settings, false)?;
            match engine.record_feedback(&query, &chunk_id, relevant)? {
                Some(score) => println!("Recorded. Feedback for '{chunk_id}' on this query is now {score:+}"),
                None => println!("Feedback is disabled; nothing recorded."),
            }
        }
        Command::FeedbackStats => {
            let store = JsonFeedbackStore::open(&settings.feedback.dir)?;
            let stats = store.stats();
            println!("{} records, {} query signatures, {} rated pairs", stats.records, stats.signatures, stats.pairs);
            println!("log: {}", store.log_path().display());
        }
        Command::FeedbackClear => {
            let store = JsonFeedbackStore::open(&settings.feedback.dir)?;
            store.clear()?;
            println!("Feedback cleared.");
        }
        Command::Context { query, doc, json } => {
            let engine = open_engine(settings, false)?;
            let blocks = engine.llm_context(&query, doc.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else {
                for b in &blocks {
                    println!("--- {} ({})", b.chunk_id, b.document_id);
                    println!("{}", b.text);
                }
            }
        }
    }
    Ok(())
}
