//! Parser configuration.
//!
//! A [`ParserConfig`] bundles everything a mining job needs besides the file
//! itself: the log format, masking rules, tokenization delimiters and the
//! per-algorithm knobs. Configs round-trip through TOML; the builtin presets
//! live in [`presets`].

mod presets;
pub use presets::{preset, preset_names};

use std::path::Path;

use serde::{Deserialize, Serialize};

use log_lines::{MaskRule, MaskSet, Tokenizer};

use crate::errors::*;

const fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserConfig {
    /// Display name of the config, i.e. the preset name.
    pub name: String,
    /// Header format spec, i.e. `<Date> <Time> <Level>: <Content>`.
    pub log_format: String,
    /// Format-specific masking rules, applied before the builtin set.
    #[serde(default)]
    pub masking: Vec<MaskRule>,
    /// Literal strings that force token boundaries.
    #[serde(default)]
    pub delimiters: Vec<String>,
    /// Whether the builtin masking rules are appended. On unless a config
    /// explicitly opts out.
    #[serde(default = "yes")]
    pub use_builtin_masking: bool,
    #[serde(default)]
    pub drain: DrainConfig,
    #[serde(default)]
    pub jaccard_drain: DrainConfig,
    #[serde(default)]
    pub spell: SpellConfig,
    #[serde(default)]
    pub ael: AelConfig,
    #[serde(default)]
    pub brain: BrainConfig,
}

impl ParserConfig {
    /// A config with default algorithm parameters and builtin masking only.
    pub fn bare(name: impl Into<String>, log_format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            log_format: log_format.into(),
            masking: Vec::new(),
            delimiters: Vec::new(),
            use_builtin_masking: true,
            drain: DrainConfig::default(),
            jaccard_drain: DrainConfig::default(),
            spell: SpellConfig::default(),
            ael: AelConfig::default(),
            brain: BrainConfig::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs_err::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::BadConfig(format!("config does not serialize: {e}")))
    }

    /// The composed masking rule chain for this config.
    pub fn mask_set(&self) -> MaskSet {
        MaskSet::compose(self.masking.clone(), self.use_builtin_masking)
    }

    pub fn tokenizer(&self) -> Tokenizer {
        Tokenizer::new(self.delimiters.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DrainConfig {
    /// Absolute prefix-tree depth including the routing level. At least 3.
    #[serde(default = "default_depth")]
    pub depth: usize,
    /// Similarity threshold within `[0, 1]` for the leaf match.
    #[serde(default = "default_drain_sim_thr")]
    pub sim_thr: f64,
    /// Branching bound per internal node; the `<*>` child is the overflow.
    #[serde(default = "default_max_children")]
    pub max_children: usize,
}

const fn default_depth() -> usize {
    4
}

fn default_drain_sim_thr() -> f64 {
    0.4
}

const fn default_max_children() -> usize {
    100
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            sim_thr: default_drain_sim_thr(),
            max_children: default_max_children(),
        }
    }
}

impl DrainConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.depth < 3 {
            return Err(Error::BadConfig(format!(
                "drain depth must be at least 3, got {}",
                self.depth
            )));
        }
        if !(0.0..=1.0).contains(&self.sim_thr) {
            return Err(Error::BadConfig(format!(
                "drain sim_thr must be within [0, 1], got {}",
                self.sim_thr
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpellConfig {
    /// Fraction of the line length the LCS must cover to accept a merge.
    #[serde(default = "default_spell_sim_thr")]
    pub sim_thr: f64,
}

fn default_spell_sim_thr() -> f64 {
    0.5
}

impl Default for SpellConfig {
    fn default() -> Self {
        Self {
            sim_thr: default_spell_sim_thr(),
        }
    }
}

impl SpellConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sim_thr) {
            return Err(Error::BadConfig(format!(
                "spell sim_thr must be within [0, 1], got {}",
                self.sim_thr
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AelConfig {
    /// Bin size above which the merge pass runs.
    #[serde(default = "default_log_cluster_thr")]
    pub log_cluster_thr: usize,
    /// Maximum per-token disagreement ratio to merge, a fraction in `(0, 1]`.
    #[serde(default = "default_merge_thr")]
    pub merge_thr: f64,
}

const fn default_log_cluster_thr() -> usize {
    2
}

fn default_merge_thr() -> f64 {
    0.5
}

impl Default for AelConfig {
    fn default() -> Self {
        Self {
            log_cluster_thr: default_log_cluster_thr(),
            merge_thr: default_merge_thr(),
        }
    }
}

impl AelConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.merge_thr > 0.0 && self.merge_thr <= 1.0) {
            return Err(Error::BadConfig(format!(
                "ael merge_thr must be within (0, 1], got {}",
                self.merge_thr
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrainConfig {
    /// Distinct tokens a child column needs before it reads as variable.
    #[serde(default = "default_var_thr")]
    pub var_thr: usize,
}

const fn default_var_thr() -> usize {
    4
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            var_thr: default_var_thr(),
        }
    }
}
