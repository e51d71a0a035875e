//! Query and chunk text canonicalization.
//!
//! Steps: lowercase, collapse whitespace, expand abbreviations (whole-word,
//! single pass), collapse whitespace again. Collapsing before expansion keeps
//! matching independent of the input's spacing.
//!
//! `normalize` is idempotent for every mapping accepted by
//! [`Normalizer::new`]: keys are single words, and no word of any expansion
//! is itself a key, so a second pass finds nothing left to expand.
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use regex::{Captures, Regex};
use tracing::debug;

use localdoc_core::config::NormalizeSettings;
use localdoc_core::traits::TextNormalizer;
use localdoc_core::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    abbreviations: HashMap<String, String>,
    pattern: Option<Regex>,
}

impl Normalizer {
    /// A normalizer without abbreviation expansion.
    pub fn plain() -> Self { Self::default() }

    pub fn from_settings(settings: &NormalizeSettings) -> Result<Self> { Self::new(&settings.abbreviation_mapping) }

    pub fn new(mapping: &BTreeMap<String, String>) -> Result<Self> {
        let word = Regex::new(r"^\w+$").map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let mut abbreviations = HashMap::with_capacity(mapping.len());
        for (key, value) in mapping {
            let k = key.trim().to_lowercase();
            if !word.is_match(&k) {
                return Err(Error::InvalidConfig(format!("abbreviation key '{key}' must be a single word")));
            }
            let v = collapse_whitespace(&value.to_lowercase());
            if v.is_empty() {
                return Err(Error::InvalidConfig(format!("abbreviation '{key}' expands to nothing")));
            }
            if abbreviations.insert(k, v).is_some() {
                return Err(Error::InvalidConfig(format!("abbreviation key '{key}' is listed twice (keys are case-insensitive)")));
            }
        }
        if abbreviations.is_empty() {
            return Ok(Self::plain());
        }

        let mut keys: Vec<&String> = abbreviations.keys().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keys.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
        let pattern = Regex::new(&format!(r"\b(?:{alternation})\b")).map_err(|e| Error::InvalidConfig(e.to_string()))?;

        for (key, value) in &abbreviations {
            if let Some(m) = pattern.find(value) {
                return Err(Error::InvalidConfig(format!(
                    "expansion of '{key}' ('{value}') contains the abbreviation '{}'; expansions must not be re-expandable",
                    m.as_str()
                )));
            }
        }
        debug!(abbreviations = abbreviations.len(), "abbreviation pattern compiled");
        Ok(Self { abbreviations, pattern: Some(pattern) })
    }

    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let collapsed = collapse_whitespace(&lowered);
        let expanded = match self.expand_abbreviations(&collapsed) {
            Cow::Borrowed(_) => None,
            Cow::Owned(s) => Some(s),
        };
        match expanded {
            None => collapsed,
            Some(s) => collapse_whitespace(&s),
        }
    }

    /// Replaces whole-word abbreviations in already lowercased text.
    pub fn expand_abbreviations<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.pattern {
            None => Cow::Borrowed(text),
            Some(pattern) => pattern.replace_all(text, |caps: &Captures| {
                let word = &caps[0];
                self.abbreviations.get(word).cloned().unwrap_or_else(|| word.to_string())
            }),
        }
    }

    pub fn abbreviation_count(&self) -> usize { self.abbreviations.len() }
}

impl TextNormalizer for Normalizer {
    fn normalize(&self, text: &str) -> String { Normalizer::normalize(self, text) }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
