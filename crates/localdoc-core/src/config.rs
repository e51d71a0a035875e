//! Typed configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` +
//! `config.<env>.toml` + `LOCALDOC_*` env vars (`__` separates sections,
//! e.g. `LOCALDOC_RANKING__W_FB=0.1`). Every section rejects unknown keys.
//! Validation runs once at load time; a failure is fatal before any request
//! is served.
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyStrategy {
    /// Best alignment of the shorter string inside the longer one.
    #[default]
    PartialRatio,
    /// Whole-string ratio after sorting whitespace tokens.
    TokenSortRatio,
    /// Plain whole-string ratio.
    Ratio,
}

/// How raw cosine similarity in [-1, 1] is mapped onto [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRescale {
    /// `max(cos, 0)`: unrelated or opposed vectors contribute nothing.
    #[default]
    Clamp,
    /// `(cos + 1) / 2`.
    Shift,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    #[default]
    Lines,
    Paragraph,
    Snippet,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Fuzzy ratios below this (0-100 scale) contribute nothing.
    pub fuzzy_match_threshold: f32,
    pub fuzzy_strategy: FuzzyStrategy,
    pub semantic_rescale: SemanticRescale,
    /// Rescaled semantic scores below this (0-1 scale) contribute nothing.
    pub semantic_threshold: f32,
    pub top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: 85.0,
            fuzzy_strategy: FuzzyStrategy::PartialRatio,
            semantic_rescale: SemanticRescale::Clamp,
            semantic_threshold: 0.0,
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RankingWeights {
    pub w_sem: f32,
    pub w_fuzzy: f32,
    pub w_fb: f32,
}

impl Default for RankingWeights {
    fn default() -> Self { Self { w_sem: 0.5, w_fuzzy: 0.3, w_fb: 0.2 } }
}

impl RankingWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("w_sem", self.w_sem), ("w_fuzzy", self.w_fuzzy), ("w_fb", self.w_fb)] {
            if !w.is_finite() {
                return Err(Error::InvalidConfig(format!("ranking.{name} must be a finite number, got {w}")));
            }
            if w < 0.0 {
                return Err(Error::InvalidConfig(format!("ranking.{name} must not be negative, got {w}")));
            }
        }
        let sum = self.w_sem + self.w_fuzzy + self.w_fb;
        if sum <= 0.0 {
            return Err(Error::InvalidConfig("ranking weights must not all be zero".to_string()));
        }
        if (sum - 1.0).abs() > 1e-3 {
            tracing::warn!(sum, "ranking weights do not sum to 1.0; scores are not comparable across configurations");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ContextSettings {
    pub lines_before: usize,
    pub lines_after: usize,
    pub max_context_chars: usize,
    pub mode: ContextMode,
}

impl Default for ContextSettings {
    fn default() -> Self { Self { lines_before: 2, lines_after: 2, max_context_chars: 2000, mode: ContextMode::Lines } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackSettings {
    /// When false the feedback weight is forced to zero and ratings are
    /// ignored.
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for FeedbackSettings {
    fn default() -> Self { Self { enabled: true, dir: PathBuf::from("feedback") } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeSettings {
    pub abbreviation_mapping: BTreeMap<String, String>,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        let pairs = [
            ("ltd", "limited"),
            ("co", "company"),
            ("inc", "incorporated"),
            ("corp", "corporation"),
            ("dept", "department"),
            ("hr", "human resources"),
        ];
        Self { abbreviation_mapping: pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DataSettings {
    pub docs_dir: PathBuf,
    pub embedding_cache: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { docs_dir: PathBuf::from("docs"), embedding_cache: PathBuf::from("cache/embeddings.json") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSettings {
    pub model_dir: Option<PathBuf>,
    /// Use the deterministic hashing embedder instead of the neural model.
    pub fake: bool,
    pub fake_dim: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self { Self { model_dir: None, fake: false, fake_dim: 256, batch_size: 32 } }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub search: SearchSettings,
    pub ranking: RankingWeights,
    pub context: ContextSettings,
    pub feedback: FeedbackSettings,
    pub normalize: NormalizeSettings,
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let t = self.search.fuzzy_match_threshold;
        if !t.is_finite() || !(0.0..=100.0).contains(&t) {
            return Err(Error::InvalidConfig(format!("search.fuzzy_match_threshold must be within 0..=100, got {t}")));
        }
        let s = self.search.semantic_threshold;
        if !s.is_finite() || !(0.0..=1.0).contains(&s) {
            return Err(Error::InvalidConfig(format!("search.semantic_threshold must be within 0..=1, got {s}")));
        }
        if self.search.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be at least 1".to_string()));
        }
        self.ranking.validate()?;
        if self.context.max_context_chars == 0 {
            return Err(Error::InvalidConfig("context.max_context_chars must be positive".to_string()));
        }
        if self.embedding.batch_size == 0 || self.embedding.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size and embedding.fake_dim must be positive".to_string()));
        }
        Ok(())
    }

    /// Weights actually used for ranking: feedback weight is zero when
    /// feedback is disabled.
    pub fn effective_weights(&self) -> RankingWeights {
        let mut w = self.ranking;
        if !self.feedback.enabled { w.w_fb = 0.0; }
        w
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.feedback.dir = resolve_with_base(base, self.feedback.dir.to_string_lossy());
        self.data.docs_dir = resolve_with_base(base, self.data.docs_dir.to_string_lossy());
        self.data.embedding_cache = resolve_with_base(base, self.data.embedding_cache.to_string_lossy());
        if let Some(dir) = self.embedding.model_dir.take() {
            self.embedding.model_dir = Some(resolve_with_base(base, dir.to_string_lossy()));
        }
    }
}

pub struct Config;

impl Config {
    /// Loads settings from the current working directory.
    pub fn load() -> Result<Settings> {
        let cwd = env::current_dir().map_err(|e| Error::InvalidConfig(format!("cannot read working directory: {e}")))?;
        Self::load_from(&cwd)
    }

    pub fn load_from(base: &Path) -> Result<Settings> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(base.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("LOCALDOC_").split("__"));

        let mut settings: Settings = figment.extract()?;
        settings.validate()?;
        settings.resolve_paths(base);
        tracing::debug!(env = %env_name, base = %base.display(), "configuration loaded");
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
