//! Mention extraction from model responses.
//!
//! Two strategies share the [`MentionExtractor`] contract:
//! - [`DeterministicExtractor`]: catalog and known-name scan plus
//!   capitalized-run candidates
//! - [`AssistedExtractor`]: names listed by an external completion call,
//!   kept only when grounded in the response text
//!
//! Both return mentions ordered by first appearance.

mod assisted;

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use brandlens_features::{
    capitalized_runs, normalize, strip_legal_suffixes, Stoplist, TokenizedText,
};
use brandlens_gazetteer::{Gazetteer, KnownNames};
use brandlens_model::{BrandCatalogEntry, ExtractionMethod, Mention, MentionOrigin};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use assisted::{
    build_user_content, ground_candidates, parse_completion, AssistedExtractor,
    CompletionBackend, CompletionError, Offline, BRAND_LIST_INSTRUCTION,
};

/// Errors from the assisted strategy. The caller recovers from all of them
/// by falling back to the deterministic strategy.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Malformed completion: {0}")]
    Malformed(String),

    #[error("Completion timed out after {0:?}")]
    TimedOut(Duration),
}

/// Configuration shared by both strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Maximum distinct pattern or assisted names kept, earliest first
    pub max_candidates: usize,
    /// Maximum words in a capitalized-run candidate
    pub max_candidate_tokens: usize,
    /// Minimum normalized length of a candidate
    pub min_candidate_len: usize,
    /// Caller additions to the built-in stoplist
    pub extra_stopwords: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_candidates: 15,
            max_candidate_tokens: 3,
            min_candidate_len: 2,
            extra_stopwords: Vec::new(),
        }
    }
}

impl ExtractorConfig {
    pub fn stoplist(&self) -> Stoplist {
        Stoplist::new(&self.extra_stopwords)
    }
}

/// Mentions produced by one extraction run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Ordered by start offset, non-overlapping
    pub mentions: Vec<Mention>,
    /// Pattern or assisted names dropped by the candidate cap
    pub candidates_truncated: bool,
}

/// Trait for extraction strategies.
pub trait MentionExtractor {
    /// Which method this strategy reports in result metadata.
    fn method(&self) -> ExtractionMethod;

    /// Extract mentions from a tokenized response. `known` holds the
    /// request's org names and known competitors.
    fn extract(
        &self,
        text: &TokenizedText<'_>,
        prompt_text: &str,
        gazetteer: &Gazetteer,
        known: &KnownNames,
    ) -> impl Future<Output = Result<Extraction, ExtractError>> + Send;
}

/// Pattern and catalog matching; never calls out.
#[derive(Debug, Clone)]
pub struct DeterministicExtractor {
    config: ExtractorConfig,
    stoplist: Stoplist,
}

impl Default for DeterministicExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl DeterministicExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let stoplist = config.stoplist();
        Self { config, stoplist }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Synchronous extraction.
    pub fn extract_mentions(
        &self,
        text: &TokenizedText<'_>,
        gazetteer: &Gazetteer,
        known: &KnownNames,
    ) -> Extraction {
        let scanned = scanned_mentions(text, gazetteer, known);
        let spans = capitalized_runs(
            text,
            self.config.max_candidate_tokens,
            self.config.min_candidate_len,
            &self.stoplist,
        );

        let pattern: Vec<Mention> = spans
            .into_iter()
            .filter_map(|span| {
                let normalized = text.normalized_slice(span.start, span.end);
                let entry = resolve_candidate(gazetteer, &normalized);
                mention_at(text, span.start, span.end, entry, MentionOrigin::Pattern)
            })
            .filter(|mention| !scanned.iter().any(|hit| hit.overlaps(mention)))
            .collect();

        tracing::debug!(
            scanned = scanned.len(),
            pattern = pattern.len(),
            "Deterministic extraction candidates"
        );

        let mut mentions = scanned;
        mentions.extend(pattern);
        let (mentions, candidates_truncated) =
            cap_candidates(merge_mentions(mentions), self.config.max_candidates);

        Extraction {
            mentions,
            candidates_truncated,
        }
    }
}

impl MentionExtractor for DeterministicExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Deterministic
    }

    async fn extract(
        &self,
        text: &TokenizedText<'_>,
        _prompt_text: &str,
        gazetteer: &Gazetteer,
        known: &KnownNames,
    ) -> Result<Extraction, ExtractError> {
        Ok(self.extract_mentions(text, gazetteer, known))
    }
}

/// Build a mention covering tokens `[start, end)`, or `None` for an
/// empty or out-of-range span.
pub fn mention_at(
    text: &TokenizedText<'_>,
    start: usize,
    end: usize,
    entry: Option<&BrandCatalogEntry>,
    origin: MentionOrigin,
) -> Option<Mention> {
    let (start_offset, end_offset) = text.byte_span(start, end)?;
    Some(Mention {
        raw_text: text.raw_slice(start, end)?.to_string(),
        normalized_text: text.normalized_slice(start, end),
        start_offset,
        end_offset,
        matched_entry: entry.cloned(),
        origin,
    })
}

/// Every catalog variant and known name occurring in the text.
///
/// Catalog hits are [`MentionOrigin::Catalog`]; request-supplied names the
/// catalog does not index are [`MentionOrigin::Known`].
pub fn scanned_mentions(
    text: &TokenizedText<'_>,
    gazetteer: &Gazetteer,
    known: &KnownNames,
) -> Vec<Mention> {
    gazetteer
        .scan_with(text, known)
        .into_iter()
        .filter_map(|hit| {
            let origin = match hit.entry {
                Some(_) => MentionOrigin::Catalog,
                None => MentionOrigin::Known,
            };
            mention_at(text, hit.start, hit.end, hit.entry, origin)
        })
        .collect()
}

/// Catalog and known-name hits: they win every overlap and are never capped.
fn is_scanned(origin: MentionOrigin) -> bool {
    matches!(origin, MentionOrigin::Catalog | MentionOrigin::Known)
}

/// Exact lookup, then again with trailing legal suffixes removed.
pub fn resolve_candidate<'g>(gazetteer: &'g Gazetteer, normalized: &str) -> Option<&'g BrandCatalogEntry> {
    gazetteer.resolve(normalized).or_else(|| {
        strip_legal_suffixes(normalized).and_then(|stripped| gazetteer.resolve(&stripped))
    })
}

/// Order by position and drop mentions overlapping a stronger one.
///
/// Catalog and known-name hits always keep their span. Among the rest, the earlier
/// start wins, then the longer span, then assisted over pattern.
pub fn merge_mentions(mentions: Vec<Mention>) -> Vec<Mention> {
    let (mut kept, mut others): (Vec<Mention>, Vec<Mention>) = mentions
        .into_iter()
        .partition(|m| is_scanned(m.origin));

    others.sort_by(|a, b| {
        a.start_offset
            .cmp(&b.start_offset)
            .then_with(|| b.span_len().cmp(&a.span_len()))
            .then_with(|| origin_rank(a.origin).cmp(&origin_rank(b.origin)))
    });

    for mention in others {
        if kept.iter().any(|k| k.overlaps(&mention)) {
            continue;
        }
        kept.push(mention);
    }

    kept.sort_by_key(|m| m.start_offset);
    kept
}

fn origin_rank(origin: MentionOrigin) -> u8 {
    match origin {
        MentionOrigin::Catalog | MentionOrigin::Known => 0,
        MentionOrigin::Assisted => 1,
        MentionOrigin::Pattern => 2,
    }
}

/// Keep scanned mentions plus the first `max` distinct other names.
pub fn cap_candidates(mentions: Vec<Mention>, max: usize) -> (Vec<Mention>, bool) {
    let mut allowed: HashSet<String> = HashSet::new();
    let mut truncated = false;

    let kept = mentions
        .into_iter()
        .filter(|m| {
            if is_scanned(m.origin) || allowed.contains(&m.normalized_text) {
                return true;
            }
            if allowed.len() < max {
                allowed.insert(m.normalized_text.clone());
                true
            } else {
                truncated = true;
                false
            }
        })
        .collect();

    if truncated {
        tracing::debug!(max, "Candidate list capped");
    }
    (kept, truncated)
}

/// Whether `name` occurs as a whole-word phrase in `text`.
pub fn is_grounded(text: &TokenizedText<'_>, name: &str) -> bool {
    let words: Vec<String> = normalize(name).split(' ').map(str::to_string).collect();
    !words[0].is_empty() && !text.find_phrase(&words).is_empty()
}
