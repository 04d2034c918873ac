//! Similarity grouping of place-name variants
//!
//! Clusters raw names whose matching keys are similar enough and pass the
//! validation rules, then picks the most frequent variant of each cluster as
//! its canonical name.
//!
//! Seeds are taken shortest-key first. Each seed collects every still
//! unassigned name it is compatible with, so a name always joins the group of
//! the first compatible seed. A token inverted index restricts the scan to
//! names that share a content word with the seed (plus names with no content
//! word at all); the shared-content rule would reject every other pair, so
//! the restriction never changes the result.

use crate::lexicon::Lexicon;
use crate::mapping::NameMapping;
use crate::normalize::TextNormalizer;
use crate::rules::{NameFeatures, ValidationRules, Verdict};
use crate::similarity::SimilarityMetric;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// A raw name and how often it occurs in its source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNameRecord {
    pub name: String,
    pub frequency: u64,
}

impl RawNameRecord {
    pub fn new(name: impl Into<String>, frequency: u64) -> Self {
        Self {
            name: name.into(),
            frequency,
        }
    }
}

/// Configuration for name grouping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Minimum similarity (0.0 to 1.0) for two names to be grouped
    pub threshold: f64,
    /// Similarity metric
    pub metric: SimilarityMetric,
    /// Drop settlement-type prefixes ("COLONIA", "FRACC.") before comparing
    pub strip_prefixes: bool,
    /// Use the token inverted index instead of scanning every pair
    pub use_blocking: bool,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.90,
            metric: SimilarityMetric::Gestalt,
            strip_prefixes: false,
            use_blocking: true,
        }
    }
}

impl GroupingConfig {
    /// Grouping tuned for already-clean sources
    pub fn strict() -> Self {
        Self {
            threshold: 0.96,
            ..Default::default()
        }
    }

    /// Grouping for noisy free-text sources
    pub fn lenient() -> Self {
        Self {
            threshold: 0.85,
            strip_prefixes: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "similarity threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// A set of raw names judged equivalent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalNameGroup {
    /// Raw name of the chosen variant
    pub representative: String,
    /// Cleaned label of the representative, used as the canonical name
    pub canonical: String,
    /// Matching key of the representative
    pub key: String,
    /// Members in processing order, seed first
    pub members: Vec<RawNameRecord>,
    pub total_frequency: u64,
}

impl CanonicalNameGroup {
    pub fn is_multi_variant(&self) -> bool {
        self.members.len() > 1
    }

    pub fn variant_count(&self) -> usize {
        self.members.len()
    }
}

/// Statistics for one grouping run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupingStats {
    /// Input records before duplicate names were merged
    pub input_records: usize,
    /// Distinct raw names
    pub distinct_names: usize,
    pub groups: usize,
    pub multi_variant_groups: usize,
    /// Pairs actually examined
    pub pairs_compared: usize,
    /// Pairs kept apart by a validation rule
    pub rule_rejections: usize,
    /// Pairs below the similarity threshold
    pub below_threshold: usize,
}

impl GroupingStats {
    /// Share of distinct names folded into another name's group, as a percentage
    pub fn reduction_rate(&self) -> f64 {
        if self.distinct_names == 0 {
            0.0
        } else {
            ((self.distinct_names - self.groups) as f64 / self.distinct_names as f64) * 100.0
        }
    }
}

/// Result of grouping: groups, the induced mapping, and statistics
#[derive(Debug, Clone)]
pub struct Grouping {
    pub groups: Vec<CanonicalNameGroup>,
    pub mapping: NameMapping,
    pub stats: GroupingStats,
    group_of: HashMap<String, usize>,
}

impl Grouping {
    /// Groups with more than one variant
    pub fn multi_variant_groups(&self) -> impl Iterator<Item = &CanonicalNameGroup> {
        self.groups.iter().filter(|g| g.is_multi_variant())
    }

    /// Group containing a raw name
    pub fn group_of(&self, raw: &str) -> Option<&CanonicalNameGroup> {
        self.group_of.get(raw).map(|&i| &self.groups[i])
    }
}

/// One distinct name in the grouping arena
struct Entry {
    raw: String,
    frequency: u64,
    features: NameFeatures,
    key_len: usize,
}

/// Content token -> arena slots holding it
struct TokenBlockingIndex {
    postings: HashMap<String, Vec<usize>>,
    tokenless: Vec<usize>,
}

impl TokenBlockingIndex {
    fn build(entries: &[Entry]) -> Self {
        let mut postings: HashMap<String, Vec<usize>> = HashMap::new();
        let mut tokenless = Vec::new();
        for (slot, entry) in entries.iter().enumerate() {
            if entry.features.content_tokens.is_empty() {
                tokenless.push(slot);
            }
            for token in &entry.features.content_tokens {
                postings.entry(token.clone()).or_default().push(slot);
            }
        }
        Self {
            postings,
            tokenless,
        }
    }

    /// Slots after `seed` that could pass the shared-content rule, ascending
    fn candidates(&self, seed: usize, entries: &[Entry]) -> Vec<usize> {
        let tokens = &entries[seed].features.content_tokens;
        if tokens.is_empty() {
            return (seed + 1..entries.len()).collect();
        }
        let mut slots: Vec<usize> = tokens
            .iter()
            .filter_map(|t| self.postings.get(t))
            .flatten()
            .chain(self.tokenless.iter())
            .copied()
            .filter(|&slot| slot > seed)
            .collect();
        slots.sort_unstable();
        slots.dedup();
        slots
    }
}

/// Groups raw names into canonical groups
pub struct NameGrouper {
    config: GroupingConfig,
    rules: ValidationRules,
    key_normalizer: TextNormalizer,
    label_normalizer: TextNormalizer,
}

impl NameGrouper {
    /// Grouper over the bundled lexicon
    pub fn new(config: GroupingConfig) -> Result<Self> {
        Self::with_lexicon(config, Lexicon::embedded()?)
    }

    pub fn with_lexicon(config: GroupingConfig, lexicon: Lexicon) -> Result<Self> {
        config.validate()?;
        info!(
            "Creating NameGrouper with threshold {}, metric {}, lexicon {}",
            config.threshold, config.metric, lexicon.version
        );
        Ok(Self {
            config,
            rules: ValidationRules::new(lexicon)?,
            key_normalizer: TextNormalizer::matching(),
            label_normalizer: TextNormalizer::preserving(),
        })
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Comparison key of a raw name
    pub fn key_for(&self, raw: &str) -> String {
        let key = self.key_normalizer.normalize(raw);
        if self.config.strip_prefixes {
            self.rules.lexicon().strip_prefix(&key).to_string()
        } else {
            key
        }
    }

    /// Similarity of two keys under the configured metric
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        self.config.metric.symmetric_ratio(a, b)
    }

    /// Group raw names
    ///
    /// Repeated raw names are merged first, summing their frequencies.
    pub fn group(&self, records: &[RawNameRecord]) -> Grouping {
        let mut stats = GroupingStats {
            input_records: records.len(),
            ..Default::default()
        };

        let mut merged: BTreeMap<&str, u64> = BTreeMap::new();
        for record in records {
            let total = merged.entry(record.name.as_str()).or_insert(0);
            *total = total.saturating_add(record.frequency);
        }

        let mut entries: Vec<Entry> = merged
            .into_iter()
            .map(|(raw, frequency)| {
                let features = self.rules.features(&self.key_for(raw));
                Entry {
                    raw: raw.to_string(),
                    frequency,
                    key_len: features.key.chars().count(),
                    features,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.key_len.cmp(&b.key_len).then_with(|| a.raw.cmp(&b.raw)));
        stats.distinct_names = entries.len();

        info!(
            "Grouping {} distinct names ({} input records)",
            entries.len(),
            records.len()
        );

        let index = self.config.use_blocking.then(|| TokenBlockingIndex::build(&entries));
        let mut assigned = vec![false; entries.len()];
        let mut groups = Vec::new();
        let mut group_of = HashMap::with_capacity(entries.len());
        let mut mapping = NameMapping::new();

        for seed in 0..entries.len() {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;

            let candidates = match &index {
                Some(index) => index.candidates(seed, &entries),
                None => (seed + 1..entries.len()).collect(),
            };

            let mut members = vec![seed];
            for candidate in candidates {
                if assigned[candidate] {
                    continue;
                }
                stats.pairs_compared += 1;
                if self.accepts(&entries[seed], &entries[candidate], &mut stats) {
                    assigned[candidate] = true;
                    members.push(candidate);
                }
            }

            let group = self.build_group(&entries, &members);
            if group.is_multi_variant() {
                debug!(
                    "Group '{}' has {} variants",
                    group.canonical,
                    group.variant_count()
                );
            }
            for member in &group.members {
                mapping.insert(member.name.clone(), group.canonical.clone());
                group_of.insert(member.name.clone(), groups.len());
            }
            groups.push(group);
        }

        stats.groups = groups.len();
        stats.multi_variant_groups = groups.iter().filter(|g| g.is_multi_variant()).count();

        info!(
            "Grouping complete: {} groups, {} with several variants ({:.1}% reduction)",
            stats.groups,
            stats.multi_variant_groups,
            stats.reduction_rate()
        );

        Grouping {
            groups,
            mapping,
            stats,
            group_of,
        }
    }

    fn accepts(&self, seed: &Entry, candidate: &Entry, stats: &mut GroupingStats) -> bool {
        match self.rules.check(&seed.features, &candidate.features) {
            Verdict::Same => true,
            Verdict::Rejected(reason) => {
                stats.rule_rejections += 1;
                debug!(
                    "Kept '{}' apart from '{}': {}",
                    candidate.raw, seed.raw, reason
                );
                false
            }
            Verdict::Compatible => {
                let ratio = self.similarity(&seed.features.key, &candidate.features.key);
                if ratio >= self.config.threshold {
                    true
                } else {
                    stats.below_threshold += 1;
                    false
                }
            }
        }
    }

    /// Pick the representative among members that are similar to every
    /// other member. The seed always qualifies, so every member ends up
    /// above the threshold against the representative.
    fn build_group(&self, entries: &[Entry], members: &[usize]) -> CanonicalNameGroup {
        let is_central = |slot: usize| {
            members.iter().all(|&other| {
                other == slot
                    || entries[other].features.key == entries[slot].features.key
                    || self.similarity(&entries[slot].features.key, &entries[other].features.key)
                        >= self.config.threshold
            })
        };

        let mut chosen = members[0];
        for &slot in &members[1..] {
            if entries[slot].frequency > entries[chosen].frequency && is_central(slot) {
                chosen = slot;
            }
        }

        let representative = &entries[chosen];
        CanonicalNameGroup {
            representative: representative.raw.clone(),
            canonical: self.label_normalizer.normalize(&representative.raw),
            key: representative.features.key.clone(),
            members: members
                .iter()
                .map(|&slot| RawNameRecord::new(entries[slot].raw.clone(), entries[slot].frequency))
                .collect(),
            total_frequency: members
                .iter()
                .fold(0u64, |acc, &slot| acc.saturating_add(entries[slot].frequency)),
        }
    }
}
