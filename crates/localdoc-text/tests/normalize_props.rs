use proptest::prelude::*;

use localdoc_core::config::NormalizeSettings;
use localdoc_text::{FuzzyMatcher, Normalizer};

fn normalizer() -> Normalizer {
    Normalizer::from_settings(&NormalizeSettings::default()).expect("default mapping is valid")
}

fn phrase() -> impl Strategy<Value = String> {
    let words = prop::sample::select(vec![
        "Ltd", "LTD", "co", "Co.", "Inc", "HR", "dept", "Limited", "benefits", "Policy", "x-ray", "ltd's", "cobalt", "42",
    ]);
    let seps = prop::sample::select(vec![" ", "  ", "\t", "\n", " , "]);
    prop::collection::vec((words, seps), 0..10)
        .prop_map(|parts| parts.into_iter().map(|(w, s)| format!("{w}{s}")).collect::<String>())
}

proptest! {
    #[test]
    fn normalize_is_idempotent_on_phrases(s in phrase()) {
        let n = normalizer();
        let once = n.normalize(&s);
        prop_assert_eq!(n.normalize(&once), once);
    }

    #[test]
    fn normalize_is_idempotent_on_arbitrary_text(s in "\\PC{0,40}") {
        let n = normalizer();
        let once = n.normalize(&s);
        prop_assert_eq!(n.normalize(&once), once);
    }

    #[test]
    fn normalize_ignores_case(s in phrase()) {
        let n = normalizer();
        prop_assert_eq!(n.normalize(&s.to_uppercase()), n.normalize(&s.to_lowercase()));
    }

    #[test]
    fn fuzzy_score_is_bounded(a in "[a-z ]{0,20}", b in "[a-z ]{0,40}") {
        let m = FuzzyMatcher::new(0.0, localdoc_core::config::FuzzyStrategy::PartialRatio).unwrap();
        let s = m.score(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
    }
}

#[test]
fn ltd_co_expands_to_limited_company() {
    let n = normalizer();
    assert_eq!(n.normalize("LTD Co"), n.normalize("ltd co"));
    let out = n.normalize("LTD Co");
    assert!(out.contains("limited"), "{out}");
    assert!(out.contains("company"), "{out}");
}

#[test]
fn abbreviated_query_matches_expanded_content() {
    let n = normalizer();
    let m = FuzzyMatcher::default();
    let query = n.normalize("Ltd benefits");
    let content = n.normalize("Acme Limited employee benefits");
    assert_eq!(query, "limited benefits");
    assert!(m.score(&n.normalize("Ltd"), &content) >= 0.99);
}
