//! Query parameters accepted at the aggregation boundary.

use serde::{Deserialize, Serialize};

use crate::{SourceId, UtcDateTime, ValidationError};

const MAX_SUBJECT_LEN: usize = 512;

/// Inclusive time window constraining a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: UtcDateTime,
    pub end: UtcDateTime,
}

impl TimeWindow {
    pub fn new(start: UtcDateTime, end: UtcDateTime) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidTimeWindow);
        }
        Ok(Self { start, end })
    }
}

/// Shape of the query subject, used by the source selector's affinity
/// heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Topic,
    Entity,
    VesselId,
    AircraftId,
}

impl QueryKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Entity => "entity",
            Self::VesselId => "vessel_id",
            Self::AircraftId => "aircraft_id",
        }
    }
}

/// Immutable query accepted by the correlator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    subject: String,
    kind: QueryKind,
    window: Option<TimeWindow>,
    include: Vec<SourceId>,
    exclude: Vec<SourceId>,
}

impl QueryParams {
    /// Build a query, inferring the subject's kind from its shape.
    pub fn new(subject: impl Into<String>) -> Result<Self, ValidationError> {
        let subject = subject.into();
        let kind = infer_kind(subject.trim());
        Self::with_kind(subject, kind)
    }

    pub fn topic(subject: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_kind(subject, QueryKind::Topic)
    }

    pub fn entity(subject: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_kind(subject, QueryKind::Entity)
    }

    pub fn vessel(identifier: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_kind(identifier, QueryKind::VesselId)
    }

    pub fn aircraft(identifier: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_kind(identifier, QueryKind::AircraftId)
    }

    pub fn with_kind(subject: impl Into<String>, kind: QueryKind) -> Result<Self, ValidationError> {
        let subject = subject.into().trim().to_owned();
        if subject.is_empty() {
            return Err(ValidationError::EmptySubject);
        }
        if subject.len() > MAX_SUBJECT_LEN {
            return Err(ValidationError::SubjectTooLong {
                len: subject.len(),
                max: MAX_SUBJECT_LEN,
            });
        }

        Ok(Self {
            subject,
            kind,
            window: None,
            include: Vec::new(),
            exclude: Vec::new(),
        })
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_sources(
        mut self,
        include: Vec<SourceId>,
        exclude: Vec<SourceId>,
    ) -> Result<Self, ValidationError> {
        for source in &include {
            if exclude.contains(source) {
                return Err(ValidationError::ConflictingSourceFilter {
                    value: source.as_str().to_owned(),
                });
            }
        }
        self.include = include;
        self.exclude = exclude;
        Ok(self)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub const fn kind(&self) -> QueryKind {
        self.kind
    }

    pub const fn window(&self) -> Option<TimeWindow> {
        self.window
    }

    pub fn include(&self) -> &[SourceId] {
        &self.include
    }

    pub fn exclude(&self) -> &[SourceId] {
        &self.exclude
    }

    pub fn permits(&self, source: SourceId) -> bool {
        if self.exclude.contains(&source) {
            return false;
        }
        self.include.is_empty() || self.include.contains(&source)
    }

    /// Canonical parameter pairs feeding the cache fingerprint.
    ///
    /// Include/exclude filters are deliberately absent: they shape which
    /// adapters are called, not what any one adapter returns.
    pub fn cache_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(String::from("kind"), self.kind.as_str().to_owned())];
        if let Some(window) = self.window {
            params.push((String::from("window_start"), window.start.format_rfc3339()));
            params.push((String::from("window_end"), window.end.format_rfc3339()));
        }
        params
    }
}

fn infer_kind(subject: &str) -> QueryKind {
    if let Some(rest) = strip_prefix_ci(subject, "imo") {
        if is_digits(rest.trim_start(), 7) {
            return QueryKind::VesselId;
        }
    }
    if let Some(rest) = strip_prefix_ci(subject, "mmsi") {
        if is_digits(rest.trim_start(), 9) {
            return QueryKind::VesselId;
        }
    }
    if is_tail_number(subject) {
        return QueryKind::AircraftId;
    }
    if looks_like_person_or_org(subject) {
        return QueryKind::Entity;
    }
    QueryKind::Topic
}

fn strip_prefix_ci<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    // `get` rather than indexing: the cut may land inside a multi-byte char.
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

fn is_digits(value: &str, expected_len: usize) -> bool {
    value.len() == expected_len && value.chars().all(|ch| ch.is_ascii_digit())
}

// Registration-style identifiers such as N12345 or G-ABCD.
fn is_tail_number(value: &str) -> bool {
    let compact: String = value.chars().filter(|ch| *ch != '-').collect();
    let mut chars = compact.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_uppercase() {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    (3..=5).contains(&rest.len())
        && rest.iter().any(|ch| ch.is_ascii_digit())
        && rest
            .iter()
            .all(|ch| ch.is_ascii_digit() || ch.is_ascii_uppercase())
}

fn looks_like_person_or_org(value: &str) -> bool {
    let words: Vec<&str> = value.split_whitespace().collect();
    words.len() >= 2
        && words.iter().all(|word| {
            word.chars()
                .next()
                .map(|ch| ch.is_uppercase())
                .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_subject() {
        let err = QueryParams::topic("   ").expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptySubject));
    }

    #[test]
    fn infers_vessel_kind_from_imo_number() {
        let query = QueryParams::new("IMO 9074729").expect("valid");
        assert_eq!(query.kind(), QueryKind::VesselId);
    }

    #[test]
    fn infers_entity_kind_from_capitalized_name() {
        let query = QueryParams::new("Vladimir Putin").expect("valid");
        assert_eq!(query.kind(), QueryKind::Entity);
    }

    #[test]
    fn infers_topic_kind_for_plain_subject() {
        let query = QueryParams::new("grain exports").expect("valid");
        assert_eq!(query.kind(), QueryKind::Topic);
    }

    #[test]
    fn classifies_non_ascii_subject_without_panicking() {
        let query = QueryParams::new("ñño").expect("valid");
        assert_eq!(query.kind(), QueryKind::Topic);

        let query = QueryParams::new("Émile Zola").expect("valid");
        assert_eq!(query.kind(), QueryKind::Entity);
    }

    #[test]
    fn infers_aircraft_kind_from_tail_number() {
        let query = QueryParams::new("N425AW").expect("valid");
        assert_eq!(query.kind(), QueryKind::AircraftId);
    }

    #[test]
    fn rejects_overlapping_include_exclude() {
        let err = QueryParams::topic("Ukraine")
            .expect("valid")
            .with_sources(vec![SourceId::Gdelt], vec![SourceId::Gdelt])
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::ConflictingSourceFilter { .. }));
    }

    #[test]
    fn permits_respects_filters() {
        let query = QueryParams::topic("Ukraine")
            .expect("valid")
            .with_sources(vec![SourceId::Gdelt], vec![SourceId::AisHub])
            .expect("valid filters");

        assert!(query.permits(SourceId::Gdelt));
        assert!(!query.permits(SourceId::Acled));
        assert!(!query.permits(SourceId::AisHub));
    }

    #[test]
    fn rejects_inverted_time_window() {
        let start = UtcDateTime::parse("2026-02-01T00:00:00Z").expect("valid");
        let end = UtcDateTime::parse("2026-01-01T00:00:00Z").expect("valid");
        let err = TimeWindow::new(start, end).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidTimeWindow));
    }

    #[test]
    fn cache_params_include_window_bounds() {
        let start = UtcDateTime::parse("2026-01-01T00:00:00Z").expect("valid");
        let end = UtcDateTime::parse("2026-02-01T00:00:00Z").expect("valid");
        let query = QueryParams::topic("Ukraine")
            .expect("valid")
            .with_window(TimeWindow::new(start, end).expect("valid window"));

        let params = query.cache_params();
        assert!(params.contains(&(String::from("kind"), String::from("topic"))));
        assert!(params
            .iter()
            .any(|(name, value)| name == "window_start" && value == "2026-01-01T00:00:00Z"));
    }
}
