//! Tiered entity resolution.
//!
//! The cascade runs in order and stops at the first tier whose confidence
//! clears that tier's floor: exact registry match (1.0), normalized match
//! (0.95), canonical directory lookup through the gateway (0.85 to 1.0),
//! fuzzy similarity against the registry (scaled, always below the
//! canonical floor). A cascade that clears no floor yields `Failed` with
//! confidence 0.0 and the caller surfaces suggestions instead.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gateway::AdapterGateway;
use crate::{QueryParams, SourceId};

const NORMALIZED_FLOOR: f64 = 0.95;
const CANONICAL_FLOOR: f64 = 0.85;

/// Which tier of the cascade produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    Exact,
    Normalized,
    Canonical,
    Fuzzy,
    Failed,
}

impl ResolutionTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Canonical => "canonical",
            Self::Fuzzy => "fuzzy",
            Self::Failed => "failed",
        }
    }
}

impl Display for ResolutionTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one resolution attempt. Tier and confidence are jointly
/// consistent with the cascade step that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub query: String,
    pub canonical_id: Option<String>,
    pub tier: ResolutionTier,
    pub confidence: f64,
}

impl EntityMatch {
    fn failed(query: &str) -> Self {
        Self {
            query: query.to_owned(),
            canonical_id: None,
            tier: ResolutionTier::Failed,
            confidence: 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tier != ResolutionTier::Failed
    }
}

/// One known entity with its canonical identifier and aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub canonical_id: String,
    pub aliases: Vec<String>,
}

impl EntityRecord {
    pub fn new(
        name: impl Into<String>,
        canonical_id: impl Into<String>,
        aliases: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            canonical_id: canonical_id.into(),
            aliases: aliases.iter().map(|alias| (*alias).to_owned()).collect(),
        }
    }

    fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Minimum similarity for the fuzzy tier to produce a match.
    pub fuzzy_min_similarity: f64,
    /// How many alternative queries `suggestions` returns.
    pub max_suggestions: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_similarity: 0.84,
            max_suggestions: 3,
        }
    }
}

/// Registry-backed resolver with a gateway hook for canonical lookups.
pub struct EntityResolver {
    registry: Vec<EntityRecord>,
    gateway: Arc<AdapterGateway>,
    config: ResolverConfig,
}

impl EntityResolver {
    pub fn new(gateway: Arc<AdapterGateway>, registry: Vec<EntityRecord>) -> Self {
        Self {
            registry,
            gateway,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// A starter registry of entities the built-in sources know about.
    pub fn default_registry() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(
                "Vladimir Putin",
                "Q7747",
                &["Vladimir Vladimirovich Putin", "Wladimir Putin"],
            ),
            EntityRecord::new("Sergei Lavrov", "Q304815", &["Sergey Lavrov"]),
            EntityRecord::new("Wagner Group", "Q63189584", &["PMC Wagner", "Wagner PMC"]),
            EntityRecord::new("Gazprom", "Q102673", &["OAO Gazprom", "PAO Gazprom"]),
            EntityRecord::new(
                "Islamic Revolutionary Guard Corps",
                "Q631722",
                &["IRGC", "Revolutionary Guards"],
            ),
        ]
    }

    /// Run the cascade for `query`.
    pub async fn resolve(&self, query: &str) -> EntityMatch {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return EntityMatch::failed(query);
        }

        if let Some(record) = self.exact_match(trimmed) {
            return EntityMatch {
                query: trimmed.to_owned(),
                canonical_id: Some(record.canonical_id.clone()),
                tier: ResolutionTier::Exact,
                confidence: 1.0,
            };
        }

        if let Some(record) = self.normalized_match(trimmed) {
            return EntityMatch {
                query: trimmed.to_owned(),
                canonical_id: Some(record.canonical_id.clone()),
                tier: ResolutionTier::Normalized,
                confidence: NORMALIZED_FLOOR,
            };
        }

        if let Some((canonical_id, confidence)) = self.canonical_lookup(trimmed).await {
            return EntityMatch {
                query: trimmed.to_owned(),
                canonical_id: Some(canonical_id),
                tier: ResolutionTier::Canonical,
                confidence,
            };
        }

        if let Some((record, confidence)) = self.fuzzy_match(trimmed) {
            return EntityMatch {
                query: trimmed.to_owned(),
                canonical_id: Some(record.canonical_id.clone()),
                tier: ResolutionTier::Fuzzy,
                confidence,
            };
        }

        debug!(query = trimmed, "entity resolution cascade exhausted");
        EntityMatch::failed(trimmed)
    }

    /// Exact lookup by canonical identifier, bypassing the cascade.
    pub fn lookup_canonical_id(&self, canonical_id: &str) -> Option<EntityMatch> {
        let id = canonical_id.trim();
        self.registry
            .iter()
            .find(|record| record.canonical_id == id)
            .map(|record| EntityMatch {
                query: record.name.clone(),
                canonical_id: Some(record.canonical_id.clone()),
                tier: ResolutionTier::Exact,
                confidence: 1.0,
            })
    }

    /// Nearest registry names to `query`, most similar first. Used to
    /// surface alternative queries when resolution fails.
    pub fn suggestions(&self, query: &str) -> Vec<String> {
        let folded = fold(query);
        let mut scored: Vec<(f64, &str)> = self
            .registry
            .iter()
            .map(|record| {
                let best = record
                    .labels()
                    .map(|label| strsim::jaro_winkler(&folded, &fold(label)))
                    .fold(0.0_f64, f64::max);
                (best, record.name.as_str())
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });

        scored
            .into_iter()
            .take(self.config.max_suggestions)
            .map(|(_, name)| name.to_owned())
            .collect()
    }

    fn exact_match(&self, query: &str) -> Option<&EntityRecord> {
        self.registry
            .iter()
            .find(|record| record.labels().any(|label| label == query))
    }

    fn normalized_match(&self, query: &str) -> Option<&EntityRecord> {
        let folded = fold(query);
        self.registry
            .iter()
            .find(|record| record.labels().any(|label| fold(label) == folded))
    }

    /// Tier 3: consult the canonical-identifier directory through the
    /// gateway. Confidence depends on how exactly the directory record
    /// matched: label 1.0, listed alias 0.9, normalized alias 0.85.
    async fn canonical_lookup(&self, query: &str) -> Option<(String, f64)> {
        if !self.gateway.is_registered(SourceId::Wikidata) {
            return None;
        }
        let params = QueryParams::entity(query).ok()?;
        let result = self.gateway.query(SourceId::Wikidata, &params).await;
        if !result.is_success() {
            return None;
        }

        let records = result.payload.get("records")?.as_array()?;
        let folded = fold(query);
        let mut best: Option<(String, f64)> = None;

        for record in records {
            let Some(canonical_id) = record.get("canonical_id").and_then(|v| v.as_str()) else {
                continue;
            };
            let name = record.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let aliases: Vec<&str> = record
                .get("aliases")
                .and_then(|v| v.as_array())
                .map(|list| list.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();

            let confidence = if name == query {
                1.0
            } else if aliases.contains(&query) {
                0.9
            } else if fold(name) == folded || aliases.iter().any(|alias| fold(alias) == folded) {
                CANONICAL_FLOOR
            } else {
                continue;
            };

            let better = best
                .as_ref()
                .map(|(_, existing)| confidence > *existing)
                .unwrap_or(true);
            if better {
                best = Some((canonical_id.to_owned(), confidence));
            }
        }

        best.filter(|(_, confidence)| *confidence >= CANONICAL_FLOOR)
    }

    fn fuzzy_match(&self, query: &str) -> Option<(&EntityRecord, f64)> {
        let folded = fold(query);
        let mut best: Option<(&EntityRecord, f64)> = None;

        for record in &self.registry {
            let similarity = record
                .labels()
                .map(|label| strsim::jaro_winkler(&folded, &fold(label)))
                .fold(0.0_f64, f64::max);
            let better = best
                .map(|(_, existing)| similarity > existing)
                .unwrap_or(true);
            if better {
                best = Some((record, similarity));
            }
        }

        let (record, similarity) = best?;
        if similarity < self.config.fuzzy_min_similarity {
            return None;
        }
        // Scaled from similarity, always strictly below the canonical floor.
        let confidence = (similarity * CANONICAL_FLOOR).min(CANONICAL_FLOOR - 0.01);
        Some((record, confidence))
    }
}

/// Case-fold, trim, collapse whitespace, and strip common diacritics.
fn fold(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.trim().chars() {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match strip_diacritic(ch) {
            Some(replacement) => out.push_str(replacement),
            None => out.extend(ch.to_lowercase()),
        }
    }
    out
}

fn strip_diacritic(ch: char) -> Option<&'static str> {
    let replacement = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ñ' | 'Ñ' => "n",
        'ç' | 'Ç' => "c",
        'ß' => "ss",
        'ž' | 'Ž' => "z",
        'š' | 'Š' => "s",
        'č' | 'Č' | 'ć' | 'Ć' => "c",
        _ => return None,
    };
    Some(replacement)
}
