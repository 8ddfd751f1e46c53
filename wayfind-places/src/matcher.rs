//! Entity matcher
//!
//! Clusters records from different providers that denote the same real place.
//!
//! # Algorithm
//!
//! 1. Flatten every successful place record, ordered by (source, source id)
//! 2. Score every cross-source pair: name, distance and category similarity,
//!    plus small bonuses for matching phone numbers or addresses
//! 3. Apply links strongest first through a union-find. A link that would put
//!    two records from one provider into the same component is skipped.
//! 4. Each component becomes a `MatchGroup` (transitive closure)
//!
//! Pure and deterministic: the same input always yields the same groups.

use crate::types::{MatchGroup, PlaceCategory, PlaceRecord, RawApiResults, SourceName, SourceRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const STOP_WORDS: &[&str] = &["the", "a", "an", "and", "of", "in", "at", "on", "for", "to", "by"];
const BUSINESS_WORDS: &[&str] = &["restaurant", "hotel", "cafe", "bar", "bistro", "inn", "suite", "suites"];

/// Matching weights and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub name_weight: f64,
    pub geo_weight: f64,
    pub category_weight: f64,
    /// Combined score needed to link two records
    pub link_threshold: f64,
    /// Name similarity required when either side lacks coordinates
    pub strict_name_threshold: f64,
    /// Distance at which geo similarity has decayed to 0.5
    pub geo_scale_m: f64,
    /// Records farther apart than this are never linked
    pub max_distance_m: f64,
    /// Floor for names where one token set contains the other
    pub containment_score: f64,
    pub phone_bonus: f64,
    pub address_bonus: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            name_weight: 0.5,
            geo_weight: 0.35,
            category_weight: 0.15,
            link_threshold: 0.65,
            strict_name_threshold: 0.85,
            geo_scale_m: 150.0,
            max_distance_m: 1_000.0,
            containment_score: 0.85,
            phone_bonus: 0.1,
            address_bonus: 0.05,
        }
    }
}

/// Breakdown of one pairwise comparison
#[derive(Debug, Clone, PartialEq)]
pub struct PairScore {
    pub name: f64,
    /// `None` when either record lacks coordinates
    pub geo: Option<f64>,
    pub distance_m: Option<f64>,
    pub category: f64,
    pub bonus: f64,
    pub total: f64,
    pub linked: bool,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    a: usize,
    b: usize,
    score: f64,
}

pub struct EntityMatcher {
    config: MatcherConfig,
}

impl EntityMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Partition every successful place record into match groups
    pub fn match_records(&self, raw: &RawApiResults) -> Vec<MatchGroup> {
        let mut records: Vec<&SourceRecord> = raw.records().filter(|r| r.as_place().is_some()).collect();
        records.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        let places: Vec<&dyn PlaceRecord> = records.iter().filter_map(|r| r.as_place()).collect();

        let mut links = Vec::new();
        for a in 0..places.len() {
            for b in (a + 1)..places.len() {
                if places[a].source() == places[b].source() {
                    continue;
                }
                let score = self.score(places[a], places[b]);
                if score.linked {
                    debug!(
                        a = %records[a].identity(),
                        b = %records[b].identity(),
                        score = score.total,
                        distance_m = ?score.distance_m,
                        "Candidate link"
                    );
                    links.push(Link { a, b, score: score.total });
                }
            }
        }

        // Strongest evidence first; index order breaks ties
        links.sort_by(|x, y| {
            y.score
                .total_cmp(&x.score)
                .then_with(|| (x.a, x.b).cmp(&(y.a, y.b)))
        });

        let mut components = UnionFind::new(places.iter().map(|p| p.source()));
        for link in &links {
            if !components.union(link.a, link.b) {
                debug!(
                    a = %records[link.a].identity(),
                    b = %records[link.b].identity(),
                    "Link skipped: would merge records from one source"
                );
            }
        }

        let mut by_root: BTreeMap<usize, (Vec<usize>, Vec<f64>)> = BTreeMap::new();
        for index in 0..places.len() {
            by_root.entry(components.find(index)).or_default().0.push(index);
        }
        for link in &links {
            let root = components.find(link.a);
            if root == components.find(link.b) {
                if let Some((_, scores)) = by_root.get_mut(&root) {
                    scores.push(link.score);
                }
            }
        }

        let mut groups: Vec<MatchGroup> = by_root
            .into_values()
            .map(|(members, scores)| {
                let confidence = if scores.is_empty() {
                    1.0
                } else {
                    scores.iter().sum::<f64>() / scores.len() as f64
                };
                MatchGroup {
                    members: members.iter().map(|&i| records[i].clone()).collect(),
                    confidence: confidence.clamp(0.0, 1.0),
                }
            })
            .collect();
        groups.sort_by(|a, b| {
            let first = |g: &MatchGroup| g.members.first().map(sort_key);
            first(a).cmp(&first(b))
        });

        info!(
            records = places.len(),
            links = links.len(),
            groups = groups.len(),
            merged = groups.iter().filter(|g| g.len() > 1).count(),
            "Matched records"
        );

        groups
    }

    /// Score one pair of records
    pub fn score(&self, a: &dyn PlaceRecord, b: &dyn PlaceRecord) -> PairScore {
        let cfg = &self.config;
        let name = self.name_similarity(a.name(), b.name());
        let category = category_compatibility(&a.categories(), &b.categories());
        let bonus = self.contact_bonus(a, b);

        let distance_m = match (a.coordinates(), b.coordinates()) {
            (Some(ca), Some(cb)) => Some(ca.distance_meters(&cb)),
            _ => None,
        };

        match distance_m {
            Some(d) => {
                let geo = if d > cfg.max_distance_m {
                    0.0
                } else {
                    0.5_f64.powf((d / cfg.geo_scale_m).powi(2))
                };
                let total =
                    (cfg.name_weight * name + cfg.geo_weight * geo + cfg.category_weight * category + bonus).min(1.0);
                PairScore {
                    name,
                    geo: Some(geo),
                    distance_m,
                    category,
                    bonus,
                    total,
                    linked: d <= cfg.max_distance_m && total >= cfg.link_threshold,
                }
            }
            None => {
                let weights = cfg.name_weight + cfg.category_weight;
                let base = if weights > 0.0 {
                    (cfg.name_weight * name + cfg.category_weight * category) / weights
                } else {
                    0.0
                };
                let total = (base + bonus).min(1.0);
                PairScore {
                    name,
                    geo: None,
                    distance_m: None,
                    category,
                    bonus,
                    total,
                    linked: name >= cfg.strict_name_threshold && total >= cfg.link_threshold,
                }
            }
        }
    }

    /// Case, diacritic and punctuation insensitive name similarity in [0, 1]
    pub fn name_similarity(&self, a: &str, b: &str) -> f64 {
        let ta = name_tokens(a);
        let tb = name_tokens(b);
        if ta.is_empty() || tb.is_empty() {
            return 0.0;
        }

        let sa: BTreeSet<&str> = ta.iter().map(String::as_str).collect();
        let sb: BTreeSet<&str> = tb.iter().map(String::as_str).collect();
        let shared = sa.intersection(&sb).count() as f64;
        let overlap = shared / sa.len().min(sb.len()) as f64;
        let jaccard = shared / sa.union(&sb).count() as f64;
        let token_score = (overlap + jaccard) / 2.0;

        let levenshtein = strsim::normalized_levenshtein(&ta.join(" "), &tb.join(" "));

        let mut similarity = token_score.max(levenshtein);
        if sa.is_subset(&sb) || sb.is_subset(&sa) {
            similarity = similarity.max(self.config.containment_score);
        }
        similarity.clamp(0.0, 1.0)
    }

    fn contact_bonus(&self, a: &dyn PlaceRecord, b: &dyn PlaceRecord) -> f64 {
        let mut bonus = 0.0;
        if let (Some(pa), Some(pb)) = (a.phone(), b.phone()) {
            if phones_match(pa, pb) {
                bonus += self.config.phone_bonus;
            }
        }
        if let (Some(aa), Some(ab)) = (a.address(), b.address()) {
            if address_overlap(&aa, &ab) >= 0.8 {
                bonus += self.config.address_bonus;
            }
        }
        bonus
    }
}

impl Default for EntityMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

fn sort_key(record: &SourceRecord) -> (SourceName, String) {
    let id = record.as_place().map(|p| p.source_id().to_string()).unwrap_or_default();
    (record.source(), id)
}

// ============================================================================
// Normalization
// ============================================================================

/// NFD, strip combining marks, lowercase, punctuation to spaces
fn normalize_text(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

/// Significant name tokens; falls back to every token when all are generic
fn name_tokens(name: &str) -> Vec<String> {
    let normalized = normalize_text(name);
    let all: Vec<&str> = normalized.split_whitespace().collect();
    let significant: Vec<String> = all
        .iter()
        .filter(|t| !STOP_WORDS.contains(*t) && !BUSINESS_WORDS.contains(*t))
        .map(|t| t.to_string())
        .collect();

    if significant.is_empty() {
        all.into_iter().map(str::to_string).collect()
    } else {
        significant
    }
}

fn phones_match(a: &str, b: &str) -> bool {
    let da: Vec<char> = a.chars().filter(char::is_ascii_digit).collect();
    let db: Vec<char> = b.chars().filter(char::is_ascii_digit).collect();
    if da.len() < 7 || db.len() < 7 {
        return false;
    }
    let n = da.len().min(db.len()).min(10);
    da[da.len() - n..] == db[db.len() - n..]
}

/// Overlap coefficient of address tokens
fn address_overlap(a: &str, b: &str) -> f64 {
    let na = normalize_text(a);
    let nb = normalize_text(b);
    let ta: BTreeSet<&str> = na.split_whitespace().collect();
    let tb: BTreeSet<&str> = nb.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    ta.intersection(&tb).count() as f64 / ta.len().min(tb.len()) as f64
}

fn category_compatibility(a: &[PlaceCategory], b: &[PlaceCategory]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.5;
    }
    if a.iter().any(|c| b.contains(c)) {
        1.0
    } else if a.iter().any(|ca| b.iter().any(|cb| ca.family() == cb.family())) {
        0.6
    } else {
        0.0
    }
}

// ============================================================================
// Union-find
// ============================================================================

/// Disjoint sets that refuse to hold two members from one source
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    sources: Vec<BTreeSet<SourceName>>,
}

impl UnionFind {
    fn new(sources: impl Iterator<Item = SourceName>) -> Self {
        let sources: Vec<BTreeSet<SourceName>> = sources.map(|s| BTreeSet::from([s])).collect();
        let n = sources.len();
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            sources,
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`; false if refused
    fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return true;
        }
        if !self.sources[ra].is_disjoint(&self.sources[rb]) {
            return false;
        }

        let (root, child) = if self.rank[ra] >= self.rank[rb] { (ra, rb) } else { (rb, ra) };
        if self.rank[root] == self.rank[child] {
            self.rank[root] += 1;
        }
        self.parent[child] = root;
        let moved = std::mem::take(&mut self.sources[child]);
        self.sources[root].extend(moved);
        true
    }
}
