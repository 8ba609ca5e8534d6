//! Core domain model for brandlens visibility analysis.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `BrandCatalogEntry`: A known brand name with its variants
//! - `Mention`: One occurrence of a candidate brand name in a response
//! - `AnalysisRequest`: The (prompt, response) pair to analyze
//! - `AnalysisResult`: The engine's sole output, persisted by the caller

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input errors. Raised before any analysis work is done; the caller must
/// not persist a record when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Response text is empty")]
    EmptyResponse,
    #[error("Prompt text is empty")]
    EmptyPrompt,
}

/// A known brand name the organization cares about.
///
/// Owned and mutated by the persistence layer. The engine only reads
/// catalog entries; newly observed names are returned in
/// [`AnalysisResult::discovered`] for the caller to upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandCatalogEntry {
    /// Canonical display name
    pub name: String,

    /// True only for the organization's own brand(s)
    #[serde(default)]
    pub is_org_brand: bool,

    /// Alternate spellings, abbreviations, suffix-stripped forms
    #[serde(default)]
    pub variants: Vec<String>,
}

impl BrandCatalogEntry {
    /// Create a competitor entry with no variants.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_org_brand: false,
            variants: Vec::new(),
        }
    }

    /// Create an org-brand entry with no variants.
    pub fn org(name: impl Into<String>) -> Self {
        Self {
            is_org_brand: true,
            ..Self::new(name)
        }
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    /// The canonical name followed by every variant, in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.variants.iter().map(String::as_str))
    }
}

/// Where a mention came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionOrigin {
    /// A catalog variant found verbatim in the text
    Catalog,
    /// A capitalized run picked up by the pattern scanner
    Pattern,
    /// A name listed by the completion call and grounded in the text
    Assisted,
    /// An org name, alias or known competitor supplied with the request,
    /// found verbatim in the text
    Known,
}

/// A single occurrence of a name found in the response text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// The substring as it appeared in the response
    pub raw_text: String,

    /// Canonical (normalized) form of `raw_text`
    pub normalized_text: String,

    /// Byte offset of the first character in the response
    pub start_offset: usize,

    /// Byte offset one past the last character in the response
    pub end_offset: usize,

    /// The catalog entry this mention resolved to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_entry: Option<BrandCatalogEntry>,

    pub origin: MentionOrigin,
}

impl Mention {
    /// Whether this mention resolved to a catalog entry.
    pub fn is_resolved(&self) -> bool {
        self.matched_entry.is_some()
    }

    /// Whether the byte spans of two mentions intersect.
    pub fn overlaps(&self, other: &Mention) -> bool {
        self.start_offset < other.end_offset && other.start_offset < self.end_offset
    }

    /// Span length in bytes.
    pub fn span_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// Which extraction strategy produced the mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Deterministic,
    Assisted,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Assisted => "assisted",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unique competitor named in one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    /// Display name (catalog name when resolved)
    pub name: String,

    /// Deduplication key
    pub normalized: String,

    /// Occurrences within this response
    pub occurrences: u32,

    /// Distinct-name rank of the first occurrence (None if not grounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_rank: Option<usize>,

    /// Resolved through the catalog
    #[serde(default)]
    pub in_catalog: bool,

    /// Actually present in the response text
    #[serde(default = "default_true")]
    pub grounded: bool,
}

fn default_true() -> bool {
    true
}

/// A name seen in the response that the catalog does not know yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredName {
    pub name: String,
    pub normalized: String,
    pub occurrences: u32,

    /// Catalog entry this looks like a variant of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_to: Option<String>,

    /// The organization's own name, matched without a catalog entry
    #[serde(default)]
    pub is_org_brand: bool,
}

/// How a visibility score was put together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base: f32,
    pub prominence_bonus: f32,
    pub competitor_penalty: f32,
    /// `base + prominence_bonus - competitor_penalty` before clamping
    pub unclamped: f32,
    pub score: f32,
}

/// Observability metadata attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Strategy whose mentions were used
    pub method: ExtractionMethod,

    /// Coarse confidence in `[0.0, 1.0]`
    pub confidence: f32,

    /// Why the assisted strategy was abandoned, if it was
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,

    /// Total mentions considered
    pub mention_count: usize,

    /// Pattern candidates dropped by the candidate cap
    #[serde(default)]
    pub candidates_truncated: bool,
}

/// The engine's output for one (prompt, response) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub org_brand_present: bool,

    /// Distinct-name rank of the first org mention (0 = named first)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_brand_position: Option<usize>,

    pub org_mention_count: u32,

    /// Every distinct brand named, in order of first appearance
    pub brands_mentioned: Vec<String>,

    pub competitors: Vec<Competitor>,
    pub competitor_count: usize,

    pub score: f32,
    pub breakdown: ScoreBreakdown,

    /// Unresolved names for the caller to add to the catalog
    #[serde(default)]
    pub discovered: Vec<DiscoveredName>,

    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Competitor display names in rank order.
    pub fn competitor_names(&self) -> Vec<&str> {
        self.competitors.iter().map(|c| c.name.as_str()).collect()
    }
}

/// A (prompt, response) pair to analyze on behalf of one organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Raw text produced by the upstream model
    pub response_text: String,

    /// The tracked search prompt that elicited the response
    pub prompt_text: String,

    /// The organization's brand name
    pub org_name: String,

    /// Extra names that identify the organization
    #[serde(default)]
    pub org_aliases: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(
        response_text: impl Into<String>,
        prompt_text: impl Into<String>,
        org_name: impl Into<String>,
    ) -> Self {
        Self {
            response_text: response_text.into(),
            prompt_text: prompt_text.into(),
            org_name: org_name.into(),
            org_aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.org_aliases = aliases;
        self
    }

    /// Fail fast on missing input.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.response_text.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }
        if self.prompt_text.trim().is_empty() {
            return Err(AnalysisError::EmptyPrompt);
        }
        Ok(())
    }

    /// The org name followed by its aliases.
    pub fn org_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.org_name.as_str()).chain(self.org_aliases.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_names_order() {
        let entry = BrandCatalogEntry::org("Acme Corp").with_variants(["Acme", "ACME Inc."]);
        let names: Vec<_> = entry.names().collect();
        assert_eq!(names, vec!["Acme Corp", "Acme", "ACME Inc."]);
        assert!(entry.is_org_brand);
    }

    #[test]
    fn test_entry_deserialize_defaults() {
        let entry: BrandCatalogEntry = serde_json::from_str(r#"{"name": "Zendesk"}"#).unwrap();
        assert_eq!(entry, BrandCatalogEntry::new("Zendesk"));
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(
            AnalysisRequest::new("  ", "best crm?", "Acme").validate(),
            Err(AnalysisError::EmptyResponse)
        );
        assert_eq!(
            AnalysisRequest::new("Acme is great", "", "Acme").validate(),
            Err(AnalysisError::EmptyPrompt)
        );
        assert!(AnalysisRequest::new("Acme is great", "best crm?", "Acme")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_mention_overlap() {
        let make = |start, end| Mention {
            raw_text: String::new(),
            normalized_text: String::new(),
            start_offset: start,
            end_offset: end,
            matched_entry: None,
            origin: MentionOrigin::Pattern,
        };
        assert!(make(0, 5).overlaps(&make(4, 9)));
        assert!(!make(0, 5).overlaps(&make(5, 9)));
    }

    #[test]
    fn test_method_serialization() {
        let json = serde_json::to_string(&ExtractionMethod::Assisted).unwrap();
        assert_eq!(json, "\"assisted\"");
    }
}
