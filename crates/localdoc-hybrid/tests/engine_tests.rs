use std::fs;

use indicatif::ProgressBar;
use tempfile::TempDir;

use localdoc_core::config::{ContextMode, Settings};
use localdoc_core::data_processor::DataProcessor;
use localdoc_core::{Corpus, Error, InputError};
use localdoc_feedback::JsonFeedbackStore;
use localdoc_hybrid::{SearchEngine, SearchOptions};
use localdoc_text::Normalizer;
use localdoc_vector::{EmbedProvider, EmbeddingCache, LocalProvider};

const HANDBOOK: &str = "Acme Ltd staff handbook\n\nLimited employee benefits policy\nDental plan details\n\x0cCafeteria opens at noon\n";

fn settings(tmp: &TempDir) -> Settings {
    let mut s = Settings::default();
    s.embedding.fake = true;
    s.embedding.fake_dim = 512;
    s.feedback.dir = tmp.path().join("feedback");
    s
}

fn engine(tmp: &TempDir, settings: Settings) -> SearchEngine {
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("handbook.txt"), HANDBOOK).unwrap();

    let normalizer = Normalizer::from_settings(&settings.normalize).unwrap();
    let documents = DataProcessor::new(&normalizer).process_directory(&docs).unwrap();
    let corpus = Corpus::from_documents(documents).unwrap();
    let provider = LocalProvider::new(&settings.embedding).unwrap();
    let mut cache = EmbeddingCache::in_memory(provider.embedder_id(), provider.dim());
    let store = JsonFeedbackStore::open(&settings.feedback.dir).unwrap();
    let (engine, report) = SearchEngine::build(settings, corpus, Box::new(provider), store, &mut cache, &ProgressBar::hidden()).unwrap();
    assert_eq!(report.embedded, 4);
    assert!(report.missing.is_empty());
    engine
}

#[test]
fn search_finds_expanded_abbreviation_with_context() {
    let tmp = TempDir::new().unwrap();
    let engine = engine(&tmp, settings(&tmp));

    let ranked = engine.search("Ltd benefits", None, SearchOptions::default()).unwrap();
    let top = &ranked.results[0];
    assert_eq!(top.chunk_id, "handbook.txt:1");
    assert_eq!((top.page_number, top.line_number), (Some(1), Some(3)));
    assert_eq!(top.context.matched, "Limited employee benefits policy");
    assert_eq!(top.context.before, vec!["Acme Ltd staff handbook"]);
    assert_eq!(top.context.after, vec!["Dental plan details", "Cafeteria opens at noon"]);

    let snippet = engine.search("Ltd benefits", None, SearchOptions { top_k: Some(1), mode: Some(ContextMode::Snippet) }).unwrap();
    assert_eq!(snippet.results.len(), 1);
    assert!(snippet.results[0].context.before.is_empty());
}

#[test]
fn feedback_round_trip_through_the_engine() {
    let tmp = TempDir::new().unwrap();
    let engine = engine(&tmp, settings(&tmp));

    let before = engine.search("dental plan", None, SearchOptions::default()).unwrap();
    let score = |r: &localdoc_hybrid::RankedResults| r.results.iter().find(|x| x.chunk_id == "handbook.txt:2").unwrap().final_score;
    assert_eq!(engine.record_feedback("Dental   PLAN", "handbook.txt:2", true).unwrap(), Some(1.0));
    let after = engine.search("dental plan", None, SearchOptions::default()).unwrap();
    assert!(score(&after) > score(&before));

    let err = engine.record_feedback("dental plan", "handbook.txt:99", true).unwrap_err();
    assert!(matches!(err, Error::Input(InputError::UnknownChunk(_))));
}

#[test]
fn disabled_feedback_is_ignored_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let mut s = settings(&tmp);
    s.feedback.enabled = false;
    let engine = engine(&tmp, s);
    assert_eq!(engine.record_feedback("dental plan", "handbook.txt:2", true).unwrap(), None);
    let ranked = engine.search("dental plan", None, SearchOptions::default()).unwrap();
    assert!(ranked.results.iter().all(|r| r.feedback_score == 0.0));
}

#[test]
fn scope_and_input_errors() {
    let tmp = TempDir::new().unwrap();
    let engine = engine(&tmp, settings(&tmp));
    assert!(matches!(engine.search("   ", None, SearchOptions::default()), Err(Error::Input(InputError::EmptyQuery))));
    assert!(matches!(
        engine.search("benefits", Some("missing.txt"), SearchOptions::default()),
        Err(Error::Input(InputError::UnknownDocument(_)))
    ));
    let scoped = engine.search("benefits", Some("handbook.txt"), SearchOptions::default()).unwrap();
    assert!(scoped.results.iter().all(|r| r.document_id == "handbook.txt"));
}

#[test]
fn llm_context_respects_the_budget() {
    let tmp = TempDir::new().unwrap();
    let mut s = settings(&tmp);
    s.context.max_context_chars = 40;
    s.context.mode = ContextMode::Snippet;
    let engine = engine(&tmp, s);
    let blocks = engine.llm_context("Ltd benefits", None).unwrap();
    assert!(!blocks.is_empty());
    assert_eq!(blocks[0].chunk_id, "handbook.txt:1");
    assert!(blocks.iter().map(|b| b.text.chars().count()).sum::<usize>() <= 40);
}
