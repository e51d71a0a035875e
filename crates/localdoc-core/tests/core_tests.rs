use std::fs;
use std::io::Write;
use tempfile::TempDir;

use localdoc_core::config::{Config, ContextMode, FuzzyStrategy, RankingWeights, Settings};
use localdoc_core::data_processor::DataProcessor;
use localdoc_core::traits::TextNormalizer;
use localdoc_core::types::Query;
use localdoc_core::{Error, InputError};

struct Lowercase;
impl TextNormalizer for Lowercase {
    fn normalize(&self, text: &str) -> String { text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ") }
}

#[test]
fn process_directory_one_chunk_per_line() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let mut f = fs::File::create(dir.join("a.txt")).unwrap();
    writeln!(f, "First Line").unwrap();
    writeln!(f).unwrap();
    writeln!(f, "  Second   line ").unwrap();

    let processor = DataProcessor::new(&Lowercase);
    let docs = processor.process_directory(dir).expect("process");

    assert_eq!(docs.len(), 1);
    let chunks = &docs[0].chunks;
    assert_eq!(chunks.len(), 2, "blank lines are skipped");
    assert_eq!(chunks[0].chunk_id, "a.txt:0");
    assert_eq!(chunks[1].raw_text, "Second   line");
    assert_eq!(chunks[1].normalized_text, "second line");
    assert_eq!(chunks[1].line_number, Some(3));
}

#[test]
fn form_feed_starts_a_new_page() {
    let processor = DataProcessor::new(&Lowercase);
    let doc = processor.process_text("report", std::path::Path::new("report.txt"), "cover\n\x0cintro\nbody");
    let pages: Vec<_> = doc.chunks.iter().map(|c| (c.page_number, c.line_number)).collect();
    assert_eq!(pages, vec![(Some(1), Some(1)), (Some(2), Some(1)), (Some(2), Some(2))]);
}

#[test]
fn process_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();
    fs::write(dir.join("ignored.md"), "not text").unwrap();

    let processor = DataProcessor::new(&Lowercase);
    let docs = processor.process_directory_limited(dir, 1).expect("process limited");
    assert_eq!(docs.len(), 1, "limited to one source document");
    assert_eq!(docs[0].document_id, "a.txt");
}

#[test]
fn empty_normalized_query_is_input_error() {
    let err = Query::new("   \t ", &Lowercase, None).unwrap_err();
    assert!(matches!(err, Error::Input(InputError::EmptyQuery)));
    let q = Query::new("Hello  World", &Lowercase, None).unwrap();
    assert_eq!(q.signature(), "hello world");
}

#[test]
fn defaults_are_valid() {
    let settings = Settings::default();
    settings.validate().expect("defaults validate");
    assert_eq!(settings.search.fuzzy_match_threshold, 85.0);
    assert_eq!(settings.ranking, RankingWeights { w_sem: 0.5, w_fuzzy: 0.3, w_fb: 0.2 });
}

#[test]
fn negative_weight_is_rejected() {
    let w = RankingWeights { w_sem: 0.7, w_fuzzy: 0.5, w_fb: -0.2 };
    assert!(matches!(w.validate(), Err(Error::InvalidConfig(_))));
    let nan = RankingWeights { w_sem: f32::NAN, w_fuzzy: 0.5, w_fb: 0.5 };
    assert!(matches!(nan.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn disabled_feedback_forces_zero_weight() {
    let mut settings = Settings::default();
    settings.feedback.enabled = false;
    assert_eq!(settings.effective_weights().w_fb, 0.0);
    assert_eq!(settings.effective_weights().w_sem, 0.5);
}

#[test]
fn load_from_merges_toml_over_defaults() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        r#"
[search]
fuzzy_match_threshold = 70
fuzzy_strategy = "token_sort_ratio"

[context]
mode = "paragraph"

[normalize.abbreviation_mapping]
mgmt = "management"
"#,
    )
    .unwrap();

    let settings = Config::load_from(tmp.path()).expect("load");
    assert_eq!(settings.search.fuzzy_match_threshold, 70.0);
    assert_eq!(settings.search.fuzzy_strategy, FuzzyStrategy::TokenSortRatio);
    assert_eq!(settings.context.mode, ContextMode::Paragraph);
    assert_eq!(settings.normalize.abbreviation_mapping.get("mgmt").map(String::as_str), Some("management"));
    assert_eq!(settings.ranking.w_sem, 0.5, "untouched sections keep defaults");
    assert!(settings.feedback.dir.starts_with(tmp.path()), "relative paths resolve against the config dir");
}

#[test]
fn unknown_keys_are_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[ranking]\nw_semantic = 0.4\n").unwrap();
    assert!(matches!(Config::load_from(tmp.path()), Err(Error::InvalidConfig(_))));
}

#[test]
fn out_of_range_threshold_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[search]\nfuzzy_match_threshold = 140\n").unwrap();
    let err = Config::load_from(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("fuzzy_match_threshold"));
}
