//! Confidence labels and field provenance.
//!
//! Every derived value in a prefill result carries a [`Confidence`] and a
//! [`SourceInfo`]. Confidence only ever degrades: a value built from several
//! inputs is never more trustworthy than the weakest of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance quality label, ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Combines confidences with the minimum rule: any `Low` gives `Low`,
    /// otherwise any `Medium` gives `Medium`, otherwise `High`.
    ///
    /// An empty input yields `High` (nothing pulled it down).
    pub fn combine<I>(confidences: I) -> Confidence
    where
        I: IntoIterator<Item = Confidence>,
    {
        confidences
            .into_iter()
            .min()
            .unwrap_or(Confidence::High)
    }

    /// Human-readable label shown next to a field.
    pub fn label(&self) -> &'static str {
        match self {
            Confidence::High => "High reliability",
            Confidence::Medium => "Medium reliability",
            Confidence::Low => "Indicative estimate",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a value came from and how it was obtained.
///
/// Created when the value is produced and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Name of the source (e.g. "OSM", "MockBI", "Parametric Model").
    pub source: String,
    /// How the value was derived (e.g. "building:levels tag", "category estimate").
    pub method: String,
    pub confidence: Confidence,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SourceInfo {
    pub fn new(source: impl Into<String>, method: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            source: source.into(),
            method: method.into(),
            confidence,
            timestamp: Utc::now(),
            notes: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes = Some(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }

    #[test]
    fn test_combine_any_low_wins() {
        assert_eq!(
            Confidence::combine([Confidence::High, Confidence::Low, Confidence::Medium]),
            Confidence::Low
        );
    }

    #[test]
    fn test_combine_medium_without_low() {
        assert_eq!(
            Confidence::combine([Confidence::High, Confidence::Medium]),
            Confidence::Medium
        );
        assert_eq!(
            Confidence::combine([Confidence::High, Confidence::High]),
            Confidence::High
        );
    }

    #[test]
    fn test_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Confidence::Medium).unwrap(), "\"MEDIUM\"");
        let parsed: Confidence = serde_json::from_str("\"LOW\"").unwrap();
        assert_eq!(parsed, Confidence::Low);
    }

    #[test]
    fn test_source_info_note() {
        let info = SourceInfo::new("OSM", "polygon geometry", Confidence::High).with_note("way 42");
        assert_eq!(info.notes.as_deref(), Some("way 42"));
        assert_eq!(info.confidence, Confidence::High);
    }
}
