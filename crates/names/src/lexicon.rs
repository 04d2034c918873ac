//! Versioned word lists for the validation rules
//!
//! The default lexicon ships inside the crate (`data/lexicon.toml`); a
//! replacement file with the same layout can be loaded at runtime.

use crate::normalize::TextNormalizer;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

const EMBEDDED_LEXICON: &str = include_str!("../data/lexicon.toml");

/// Word lists consulted by [`crate::rules::ValidationRules`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    /// Free-form version tag, reported in diagnostics
    pub version: String,
    /// Words ignored by the shared-content-token rule
    #[serde(default)]
    pub stopwords: BTreeSet<String>,
    /// Words that introduce a stage identifier
    #[serde(default)]
    pub sector_keywords: Vec<String>,
    /// Honorifics that start a saint phrase
    #[serde(default)]
    pub saint_honorifics: Vec<String>,
    /// Words that must agree when both names carry some
    #[serde(default)]
    pub distinctive: BTreeSet<String>,
    /// Settlement-type prefixes removable before comparison
    #[serde(default)]
    pub name_prefixes: Vec<String>,
}

impl Lexicon {
    /// The lexicon bundled with the crate
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(EMBEDDED_LEXICON)
    }

    /// Load a lexicon file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading lexicon from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse, validate and key-normalize a lexicon document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let lexicon: Lexicon = toml::from_str(content)?;
        lexicon.validate()?;
        Ok(lexicon.normalized())
    }

    fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::InvalidLexicon("version must not be empty".to_string()));
        }

        let lists = [
            ("stopwords", self.stopwords.iter().collect::<Vec<_>>()),
            ("sector_keywords", self.sector_keywords.iter().collect()),
            ("saint_honorifics", self.saint_honorifics.iter().collect()),
            ("distinctive", self.distinctive.iter().collect()),
            ("name_prefixes", self.name_prefixes.iter().collect()),
        ];
        for (list, words) in lists {
            if let Some(word) = words.iter().find(|w| w.trim().is_empty()) {
                return Err(Error::InvalidLexicon(format!(
                    "{list} contains a blank entry ({word:?})"
                )));
            }
            if let Some(word) = words.iter().find(|w| w.split_whitespace().count() > 1) {
                return Err(Error::InvalidLexicon(format!(
                    "{list} entry {word:?} must be a single word"
                )));
            }
        }
        Ok(())
    }

    /// Entries rewritten as matching keys so they compare against
    /// normalized names. Edge punctuation is kept ("SECC." stays dotted).
    fn normalized(self) -> Self {
        let key = TextNormalizer::new(true, false, true, true);
        let norm = |w: &String| key.normalize(w);

        let mut prefixes: Vec<String> = self.name_prefixes.iter().map(norm).collect();
        // Longest first so "COL." wins over "COL"
        prefixes.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        prefixes.dedup();

        Self {
            version: self.version.trim().to_string(),
            stopwords: self.stopwords.iter().map(norm).collect(),
            sector_keywords: dedup_keep_order(self.sector_keywords.iter().map(norm)),
            saint_honorifics: dedup_keep_order(self.saint_honorifics.iter().map(norm)),
            distinctive: self.distinctive.iter().map(norm).collect(),
            name_prefixes: prefixes,
        }
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn is_distinctive(&self, token: &str) -> bool {
        self.distinctive.contains(token)
    }

    /// Remove one leading settlement-type prefix from a matching key
    pub fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        for prefix in &self.name_prefixes {
            if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                if rest.starts_with(' ') {
                    let rest = rest.trim_start();
                    if !rest.is_empty() {
                        return rest;
                    }
                }
            }
        }
        key
    }
}

fn dedup_keep_order(words: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    words.filter(|w| seen.insert(w.clone())).collect()
}
