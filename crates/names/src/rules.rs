//! Validation predicates that keep look-alike names apart
//!
//! Similarity alone merges "PUERTA REAL VI" with "PUERTA REAL VIII". Each
//! pair that clears the similarity threshold must also pass every rule
//! below before it is grouped.

use crate::lexicon::Lexicon;
use crate::{Error, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

static ROMAN_SUFFIX_REGEX: OnceLock<Regex> = OnceLock::new();
static ARABIC_SUFFIX_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_roman_suffix_regex() -> &'static Regex {
    ROMAN_SUFFIX_REGEX.get_or_init(|| {
        Regex::new(r"\b([IVX]+)\s*$").expect("Failed to compile roman numeral regex")
    })
}

fn get_arabic_suffix_regex() -> &'static Regex {
    ARABIC_SUFFIX_REGEX
        .get_or_init(|| Regex::new(r"\s+(\d+)\s*$").expect("Failed to compile numeral regex"))
}

/// Why a pair of names was kept apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    RomanNumeral,
    ArabicNumeral,
    SectorIdentifier,
    NoSharedContentToken,
    DistinctiveWords,
    SaintNames,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Rejection::RomanNumeral => "trailing roman numerals differ",
            Rejection::ArabicNumeral => "trailing numbers differ",
            Rejection::SectorIdentifier => "sector/stage identifiers differ",
            Rejection::NoSharedContentToken => "no shared content word",
            Rejection::DistinctiveWords => "distinctive words differ",
            Rejection::SaintNames => "saint names differ",
        };
        f.write_str(text)
    }
}

/// Outcome of checking one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keys are identical; always grouped
    Same,
    /// No rule objects; similarity decides
    Compatible,
    Rejected(Rejection),
}

impl Verdict {
    pub fn allows_grouping(&self) -> bool {
        !matches!(self, Verdict::Rejected(_))
    }
}

/// Everything the rules need from one name, extracted once
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameFeatures {
    /// Matching key the features were taken from
    pub key: String,
    pub roman_suffix: Option<String>,
    pub arabic_suffix: Option<String>,
    pub sector_ids: BTreeSet<String>,
    /// Tokens that are not stopwords
    pub content_tokens: BTreeSet<String>,
    pub distinctive: BTreeSet<String>,
    /// Full "SAN PEDRO"-style phrases, in order of appearance
    pub saints: Vec<String>,
}

/// Compiled rule set
#[derive(Debug, Clone)]
pub struct ValidationRules {
    lexicon: Lexicon,
    sector_regex: Option<Regex>,
    saint_regex: Option<Regex>,
}

impl ValidationRules {
    /// Compile the rules for a lexicon
    pub fn new(lexicon: Lexicon) -> Result<Self> {
        let sector_regex = keyword_regex(&lexicon.sector_keywords, r"\s*([A-Z0-9]+)")?;
        let saint_regex = keyword_regex(&lexicon.saint_honorifics, r"\s+\w+")?;
        Ok(Self {
            lexicon,
            sector_regex,
            saint_regex,
        })
    }

    /// Rules over the bundled lexicon
    pub fn embedded() -> Result<Self> {
        Self::new(Lexicon::embedded()?)
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Extract the features of a matching key
    pub fn features(&self, key: &str) -> NameFeatures {
        let capture = |re: &Regex| {
            re.captures(key)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let tokens: Vec<&str> = key.split_whitespace().collect();

        let sector_ids = self
            .sector_regex
            .as_ref()
            .map(|re| {
                re.captures_iter(key)
                    .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let saints = self
            .saint_regex
            .as_ref()
            .map(|re| re.find_iter(key).map(|m| m.as_str().to_string()).collect())
            .unwrap_or_default();

        NameFeatures {
            key: key.to_string(),
            roman_suffix: capture(get_roman_suffix_regex()),
            arabic_suffix: capture(get_arabic_suffix_regex()),
            sector_ids,
            content_tokens: tokens
                .iter()
                .filter(|t| !self.lexicon.is_stopword(t))
                .map(|t| t.to_string())
                .collect(),
            distinctive: tokens
                .iter()
                .filter(|t| self.lexicon.is_distinctive(t))
                .map(|t| t.to_string())
                .collect(),
            saints,
        }
    }

    /// Check a pair of names by their features
    pub fn check(&self, a: &NameFeatures, b: &NameFeatures) -> Verdict {
        if a.key == b.key {
            return Verdict::Same;
        }
        if a.roman_suffix != b.roman_suffix {
            return Verdict::Rejected(Rejection::RomanNumeral);
        }
        if a.arabic_suffix != b.arabic_suffix {
            return Verdict::Rejected(Rejection::ArabicNumeral);
        }
        if !a.sector_ids.is_empty()
            && !b.sector_ids.is_empty()
            && a.sector_ids != b.sector_ids
        {
            return Verdict::Rejected(Rejection::SectorIdentifier);
        }
        if !a.content_tokens.is_empty()
            && !b.content_tokens.is_empty()
            && a.content_tokens.is_disjoint(&b.content_tokens)
        {
            return Verdict::Rejected(Rejection::NoSharedContentToken);
        }
        if !a.distinctive.is_empty()
            && !b.distinctive.is_empty()
            && a.distinctive != b.distinctive
        {
            return Verdict::Rejected(Rejection::DistinctiveWords);
        }
        if !a.saints.is_empty() && !b.saints.is_empty() && a.saints != b.saints {
            return Verdict::Rejected(Rejection::SaintNames);
        }
        Verdict::Compatible
    }

    /// Check two matching keys directly
    pub fn check_keys(&self, a: &str, b: &str) -> Verdict {
        self.check(&self.features(a), &self.features(b))
    }
}

/// `\b(?:KW1|KW2|...)<tail>`, longest keyword first so "SECCION" wins
/// over "SECC". `None` when the list is empty.
fn keyword_regex(keywords: &[String], tail: &str) -> Result<Option<Regex>> {
    if keywords.is_empty() {
        return Ok(None);
    }
    let mut sorted: Vec<&String> = keywords.iter().collect();
    sorted.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
    let alternatives: Vec<String> = sorted.iter().map(|k| regex::escape(k)).collect();
    let pattern = format!(r"\b(?:{}){}", alternatives.join("|"), tail);
    Regex::new(&pattern)
        .map(Some)
        .map_err(|e| Error::InvalidLexicon(format!("keyword pattern {pattern:?}: {e}")))
}
