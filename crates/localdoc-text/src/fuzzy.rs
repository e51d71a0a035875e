//! Lexical similarity between a normalized query and normalized chunk text.
//!
//! Ratios are on a 0-100 scale: `200 * lcs(a, b) / (|a| + |b|)` over chars,
//! i.e. one minus the normalized insertion/deletion distance. The matcher
//! gates them with a threshold and rescales to [0, 1].
use std::collections::HashMap;

use tracing::debug;

use localdoc_core::config::{FuzzyStrategy, SearchSettings};
use localdoc_core::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    threshold: f32,
    strategy: FuzzyStrategy,
}

impl Default for FuzzyMatcher {
    fn default() -> Self { Self { threshold: 85.0, strategy: FuzzyStrategy::PartialRatio } }
}

impl FuzzyMatcher {
    pub fn new(threshold: f32, strategy: FuzzyStrategy) -> Result<Self> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(Error::InvalidConfig(format!("fuzzy threshold must be within 0..=100, got {threshold}")));
        }
        Ok(Self { threshold, strategy })
    }

    pub fn from_settings(settings: &SearchSettings) -> Result<Self> {
        Self::new(settings.fuzzy_match_threshold, settings.fuzzy_strategy)
    }

    pub fn threshold(&self) -> f32 { self.threshold }

    /// Ungated ratio in 0..=100.
    pub fn raw_ratio(&self, query: &str, text: &str) -> f32 {
        match self.strategy {
            FuzzyStrategy::PartialRatio => partial_ratio(query, text),
            FuzzyStrategy::TokenSortRatio => token_sort_ratio(query, text),
            FuzzyStrategy::Ratio => ratio(query, text),
        }
    }

    /// Score in [0, 1]. Ratios under the threshold are treated as OCR/typo
    /// noise and score exactly 0.
    pub fn score(&self, query: &str, text: &str) -> f32 {
        let raw = self.raw_ratio(query, text);
        if raw < self.threshold { 0.0 } else { (raw / 100.0).clamp(0.0, 1.0) }
    }
}

pub fn ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Queries longer than this are compared whole instead of window by window.
pub const PARTIAL_WINDOW_LIMIT: usize = 256;

/// Best `ratio` of the shorter string against every equally long window of
/// the longer one. A window is skipped when the characters it shares with
/// the shorter string (as a multiset) cannot beat the best ratio so far.
pub fn partial_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if short.is_empty() { return 0.0; }
    if short.len() > PARTIAL_WINDOW_LIMIT {
        debug!(chars = short.len(), limit = PARTIAL_WINDOW_LIMIT, "query too long for windowed matching; comparing whole strings");
        return ratio_chars(short, long);
    }
    let m = short.len();
    let mut need: HashMap<char, usize> = HashMap::new();
    for &c in short {
        *need.entry(c).or_default() += 1;
    }
    let mut window = SharedChars::new(&need);
    for &c in &long[..m] {
        window.push(c);
    }

    let mut best = 0.0f32;
    for start in 0..=(long.len() - m) {
        if start > 0 {
            window.pop(long[start - 1]);
            window.push(long[start + m - 1]);
        }
        if upper_bound(window.shared, m) <= best {
            continue;
        }
        let r = ratio_chars(short, &long[start..start + m]);
        if r > best {
            best = r;
            if best >= 100.0 { break; }
        }
    }
    best
}

/// Characters of a sliding window that can pair with the shorter string.
struct SharedChars<'a> {
    need: &'a HashMap<char, usize>,
    have: HashMap<char, usize>,
    shared: usize,
}

impl<'a> SharedChars<'a> {
    fn new(need: &'a HashMap<char, usize>) -> Self {
        Self { need, have: HashMap::new(), shared: 0 }
    }

    fn push(&mut self, c: char) {
        let have = self.have.entry(c).or_default();
        if *have < self.need.get(&c).copied().unwrap_or(0) {
            self.shared += 1;
        }
        *have += 1;
    }

    fn pop(&mut self, c: char) {
        if let Some(have) = self.have.get_mut(&c) {
            *have -= 1;
            if *have < self.need.get(&c).copied().unwrap_or(0) {
                self.shared -= 1;
            }
        }
    }
}

/// Ratio ceiling for two strings of length `m` sharing `shared` characters.
#[allow(clippy::cast_precision_loss)]
fn upper_bound(shared: usize, m: usize) -> f32 {
    (200.0 * shared as f32) / (2 * m) as f32
}

pub fn token_sort_ratio(a: &str, b: &str) -> f32 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[allow(clippy::cast_precision_loss)]
fn ratio_chars(a: &[char], b: &[char]) -> f32 {
    let total = a.len() + b.len();
    if a.is_empty() || b.is_empty() { return 0.0; }
    let common = lcs_len(a, b);
    (200.0 * common as f32) / total as f32
}

/// Longest common subsequence length, two-row dynamic programming.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb { prev[j] + 1 } else { prev[j + 1].max(cur[j]) };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_100() {
        assert_eq!(ratio("benefits", "benefits"), 100.0);
        assert_eq!(partial_ratio("benefits", "benefits"), 100.0);
    }

    #[test]
    fn empty_strings_score_zero() {
        assert_eq!(ratio("", "abc"), 0.0);
        assert_eq!(partial_ratio("", "abc"), 0.0);
        assert_eq!(partial_ratio("", ""), 0.0);
    }

    #[test]
    fn substring_is_a_perfect_partial_match() {
        assert_eq!(partial_ratio("benefits policy", "limited employee benefits policy"), 100.0);
        assert_eq!(partial_ratio("limited employee benefits policy", "benefits policy"), 100.0, "argument order does not matter");
    }

    #[test]
    fn ocr_typo_stays_high() {
        let r = partial_ratio("benefits", "employee benefts policy");
        assert!(r >= 85.0 && r < 100.0, "r={r}");
    }

    #[test]
    fn token_sort_ignores_word_order() {
        assert_eq!(token_sort_ratio("policy benefits", "benefits policy"), 100.0);
        assert!(ratio("policy benefits", "benefits policy") < 100.0);
    }

    #[test]
    fn lcs_ratio_matches_hand_computation() {
        // lcs("abcd", "abxd") = 3 -> 200 * 3 / 8
        assert!((ratio("abcd", "abxd") - 75.0).abs() < 1e-4);
    }

    #[test]
    fn below_threshold_scores_exactly_zero() {
        let m = FuzzyMatcher::new(85.0, FuzzyStrategy::Ratio).unwrap();
        assert!(m.raw_ratio("abcd", "abxd") > 0.0);
        assert_eq!(m.score("abcd", "abxd"), 0.0);
        assert_eq!(m.score("abcd", "abcd"), 1.0);
    }

    fn exhaustive_partial_ratio(a: &str, b: &str) -> f32 {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
        if short.is_empty() { return 0.0; }
        (0..=long.len() - short.len())
            .map(|s| ratio_chars(short, &long[s..s + short.len()]))
            .fold(0.0, f32::max)
    }

    #[test]
    fn skipped_windows_never_change_the_result() {
        let cases = [
            ("benefits", "employee benefts policy"),
            ("dental plan", "the dental and vision plan details"),
            ("aaab", "baaaabaaaaab"),
            ("cafeteria noon", "cafeteria opens at noon on weekdays"),
            ("xyz", "no overlap here at all"),
        ];
        for (q, t) in cases {
            assert_eq!(partial_ratio(q, t), exhaustive_partial_ratio(q, t), "{q:?} vs {t:?}");
        }
    }

    #[test]
    fn overlong_query_is_compared_whole() {
        let query = "benefits policy ".repeat(40);
        let line = "limited employee benefits policy and dental plan ".repeat(60);
        assert!(query.chars().count() > PARTIAL_WINDOW_LIMIT);
        assert_eq!(partial_ratio(&query, &line), ratio(&query, &line));
    }

    #[test]
    fn threshold_is_validated() {
        assert!(FuzzyMatcher::new(101.0, FuzzyStrategy::PartialRatio).is_err());
        assert!(FuzzyMatcher::new(-1.0, FuzzyStrategy::PartialRatio).is_err());
        assert!(FuzzyMatcher::new(0.0, FuzzyStrategy::PartialRatio).is_ok());
    }
}
