//! Masking rewrites recognizable parameter shapes inside the `Content` field
//! into named sentinels (`<§IP§>`, `<§NUM§>`, ..) before tokenization.
//!
//! Rules are ordered `(pattern, replacement)` pairs; each one replaces all
//! non-overlapping matches. The patterns guard their boundaries with the
//! named groups `S` and `E` and the replacements re-emit them (`$S`, `$E`)
//! so surrounding non-alphanumeric context survives the rewrite.

use std::fmt;

use fancy_regex::Regex;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::errors::*;

/// The reserved wildcard token marking a parameter position in a template.
pub const WILDCARD: &str = "<*>";

/// `true` for tokens produced by masking, i.e. `<§NUM§>`.
pub fn is_sentinel(token: &str) -> bool {
    token.len() > "<§§>".len() && token.starts_with("<§") && token.ends_with("§>")
}

/// A masking pattern that can cross serde as its source string.
#[derive(Debug)]
pub struct WrappedRegex(pub Regex);

impl Clone for WrappedRegex {
    fn clone(&self) -> Self {
        Self(Regex::new(self.as_str()).unwrap())
    }
}

impl std::ops::Deref for WrappedRegex {
    type Target = Regex;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Regex> for WrappedRegex {
    fn as_ref(&self) -> &Regex {
        &self.0
    }
}

impl From<Regex> for WrappedRegex {
    fn from(other: Regex) -> WrappedRegex {
        WrappedRegex(other)
    }
}

impl Serialize for WrappedRegex {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WrappedRegex {
    fn deserialize<D>(deserializer: D) -> std::result::Result<WrappedRegex, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        deserializer
            .deserialize_any(RegexVisitor)
            .map(WrappedRegex::from)
    }
}

struct RegexVisitor;

impl<'de> serde::de::Visitor<'de> for RegexVisitor {
    type Value = Regex;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("String with valid regex expression")
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        let re = Regex::new(value).map_err(E::custom)?;
        Ok(re)
    }

    fn visit_string<E>(self, value: String) -> std::result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        self.visit_str::<E>(value.as_str())
    }
}

/// One ordered masking rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskRule {
    pub pattern: WrappedRegex,
    pub replacement: String,
}

impl MaskRule {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::BadMaskRule {
                pattern: pattern.to_owned(),
                source: Box::new(e),
            })?
            .into();
        Ok(Self {
            pattern,
            replacement: replacement.to_owned(),
        })
    }
}

/// An ordered list of masking rules applied front to back.
#[derive(Debug, Clone, Default)]
pub struct MaskSet {
    rules: Vec<MaskRule>,
}

impl MaskSet {
    /// Compose config rules with the builtin set. The config rules run first
    /// so format-specific shapes (i.e. `blk_-?\d+` for HDFS) win over the
    /// generic ones.
    pub fn compose(rules: Vec<MaskRule>, use_builtin: bool) -> Self {
        let mut rules = rules;
        if use_builtin {
            rules.extend(BUILTIN_MASKING.iter().cloned());
        }
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order, each replacing all non-overlapping matches.
    pub fn apply(&self, content: &str) -> String {
        let mut masked = content.to_owned();
        for rule in &self.rules {
            masked = rule
                .pattern
                .replace_all(&masked, rule.replacement.as_str())
                .into_owned();
        }
        masked
    }
}

lazy_static! {
    /// The builtin rule set, ordered from most to least specific.
    pub static ref BUILTIN_MASKING: Vec<MaskRule> = [
        // colon-separated ids, i.e. mac addresses and task guids
        (
            r"(?P<S>^|[^A-Za-z\d])([A-Za-z\d]{2,}:){3,}[A-Za-z\d]{2,}(?P<E>[^A-Za-z\d]|$)",
            "$S<§ID§>$E",
        ),
        // IPv4, optionally with a port
        (
            r"(?P<S>^|[^A-Za-z\d])\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(:\d{0,})?(?P<E>[^A-Za-z\d]|$)",
            "$S<§IP§>$E",
        ),
        // runs of long hex words, i.e. memory dumps
        (
            r"(?P<S>^|[^A-Za-z\d])([A-Fa-f\d]{4,}\s){3,}[A-Fa-f\d]{4,}(?P<E>[^A-Za-z\d]|$)",
            "$S<§SEQ§>$E",
        ),
        // 0x-prefixed hex
        (
            r"(?P<S>^|[^A-Za-z\d])0x[A-Fa-f\d]+(?P<E>[^A-Za-z\d]|$)",
            "$S<§HEX§>$E",
        ),
        // bare hex words
        (
            r"(?P<S>^|[^A-Za-z\d])[A-Fa-f\d]{4,}(?P<E>[^A-Za-z\d]|$)",
            "$S<§HEX§>$E",
        ),
        // size suffixes
        (
            r"(?P<S>^|[^A-Za-z\d])[KMGT]?i?B(?P<E>[^A-Za-z\d]|$)",
            "$S<§SIZE§>$E",
        ),
        // h:m[:s] clock times
        (
            r"(?P<S>^|[^A-Za-z\d])(\d\d:)+\d\d(?P<E>[^A-Za-z\d]|$)",
            "$S<§TIME§>$E",
        ),
        // integers grouped with thousands separators
        (
            r"(?P<S>^|[^A-Za-z\d])\d{1,3}(,\d\d\d)*(?P<E>[^A-Za-z\d]|$)",
            "$S<§NUM§>$E",
        ),
        // plain signed integers
        (
            r"(?P<S>^|[^A-Za-z\d])[-+]?\d+(?P<E>[^A-Za-z\d]|$)",
            "$S<§NUM§>$E",
        ),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        MaskRule::new(pattern, replacement).expect("builtin masking rule is valid")
    })
    .collect();
}
