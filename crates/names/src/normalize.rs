//! Place-name normalization
//!
//! Canonicalizes free-text neighborhood names before they are compared or
//! displayed. Two presets share one pipeline:
//!
//! - [`TextNormalizer::preserving`] cleans labels but keeps case and accents.
//! - [`TextNormalizer::matching`] additionally upper-cases and strips
//!   diacritics, producing the key used for every name comparison.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters trimmed from both ends of a name.
const EDGE_CHARS: &[char] = &[
    '\'', '"', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}', '.', ';', ',', '|', '/', '\\', '-',
    ' ',
];

/// Upper bound on whole-pipeline passes when chasing a fixed point.
const MAX_PASSES: usize = 4;

/// Name normalization configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNormalizer {
    /// Repair text that was UTF-8 decoded as Windows-1252 / Latin-1
    pub repair_mojibake: bool,
    /// Strip quotes and punctuation from both ends
    pub trim_punctuation: bool,
    /// Convert to uppercase
    pub uppercase: bool,
    /// Remove combining diacritics (á -> a, ñ -> n)
    pub strip_accents: bool,
}

static WHITESPACE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_whitespace_regex() -> &'static Regex {
    // `\s` already covers NBSP and the other Unicode spaces; zero-width
    // characters are not White_Space and have to be listed.
    WHITESPACE_REGEX.get_or_init(|| {
        Regex::new(r"[\s\u{200B}\u{2060}\u{FEFF}]+").expect("Failed to compile whitespace regex")
    })
}

impl TextNormalizer {
    /// Create a normalizer with custom settings
    pub fn new(
        repair_mojibake: bool,
        trim_punctuation: bool,
        uppercase: bool,
        strip_accents: bool,
    ) -> Self {
        Self {
            repair_mojibake,
            trim_punctuation,
            uppercase,
            strip_accents,
        }
    }

    /// Label-cleaning preset
    ///
    /// Keeps case and accents; only fixes encoding, spacing and stray
    /// punctuation.
    pub fn preserving() -> Self {
        Self {
            repair_mojibake: true,
            trim_punctuation: true,
            uppercase: false,
            strip_accents: false,
        }
    }

    /// Comparison-key preset (default)
    pub fn matching() -> Self {
        Self {
            repair_mojibake: true,
            trim_punctuation: true,
            uppercase: true,
            strip_accents: true,
        }
    }

    /// Normalize a name
    ///
    /// Applies, in order:
    /// 1. NFC composition
    /// 2. Mojibake repair (until nothing changes)
    /// 3. Whitespace unification, trimming and collapsing
    /// 4. Edge punctuation stripping
    /// 5. Uppercase and accent stripping (matching preset)
    ///
    /// The pipeline is re-run until its output is stable, so the result is
    /// always a fixed point: `normalize(normalize(x)) == normalize(x)`.
    pub fn normalize(&self, text: &str) -> String {
        let mut current = self.single_pass(text);
        for _ in 1..MAX_PASSES {
            let next = self.single_pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Normalize an optional value; `None` becomes the empty string
    pub fn normalize_opt(&self, text: Option<&str>) -> String {
        text.map(|t| self.normalize(t)).unwrap_or_default()
    }

    fn single_pass(&self, text: &str) -> String {
        let mut result: String = text.nfc().collect();

        if self.repair_mojibake {
            result = repair_mojibake(&result);
        }

        result = get_whitespace_regex()
            .replace_all(&result, " ")
            .trim()
            .to_string();

        if self.trim_punctuation {
            result = result.trim_matches(EDGE_CHARS).to_string();
            result = get_whitespace_regex().replace_all(&result, " ").into_owned();
        }

        if self.uppercase {
            result = result.to_uppercase();
        }

        if self.strip_accents {
            result = result
                .nfd()
                .filter(|c| !is_combining_mark(*c))
                .nfc()
                .collect();
        }

        result
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::matching()
    }
}

/// Undo UTF-8-read-as-cp1252 damage, layer by layer.
///
/// A layer is undone only when every character maps back to a single
/// cp1252 byte and those bytes form valid UTF-8 that differs from the input.
pub fn repair_mojibake(text: &str) -> String {
    let mut current = text.to_string();
    while let Some(repaired) = undo_one_layer(&current) {
        if repaired == current {
            break;
        }
        current = repaired;
    }
    current
}

fn undo_one_layer(text: &str) -> Option<String> {
    if text.is_ascii() {
        return None;
    }
    let bytes = text
        .chars()
        .map(cp1252_byte)
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

/// Byte that `c` decodes from under Windows-1252, falling back to Latin-1
/// for the five positions cp1252 leaves undefined.
fn cp1252_byte(c: char) -> Option<u8> {
    let code = c as u32;
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return Some(code as u8);
    }
    let byte = match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        // Latin-1 C1 controls that cp1252 leaves unassigned
        '\u{0081}' => 0x81,
        '\u{008D}' => 0x8D,
        '\u{008F}' => 0x8F,
        '\u{0090}' => 0x90,
        '\u{009D}' => 0x9D,
        _ => return None,
    };
    Some(byte)
}
