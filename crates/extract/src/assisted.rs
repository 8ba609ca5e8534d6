//! Completion-assisted extraction.
//!
//! An external text-completion call lists candidate names; every candidate
//! must then be found as a whole-word phrase in the response before it
//! becomes a mention. Nothing the completion invents survives.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use brandlens_features::{normalize, phrase_tokens, Stoplist, TokenizedText};
use brandlens_gazetteer::{Gazetteer, KnownNames};
use brandlens_model::{ExtractionMethod, Mention, MentionOrigin};
use thiserror::Error;

use crate::{
    cap_candidates, mention_at, merge_mentions, resolve_candidate, scanned_mentions, Extraction,
    ExtractError, ExtractorConfig, MentionExtractor,
};

/// Instruction sent with every assisted extraction call.
pub const BRAND_LIST_INSTRUCTION: &str = "You extract brand, company, and product names \
from an AI assistant's answer. List every brand, company, or product name that appears in \
the answer, one per line, exactly as written in the answer. Do not add names that are not \
in the answer. Do not number, describe, or explain them. If there are none, reply NONE.";

/// Lines longer than this are prose, not names.
const MAX_NAME_WORDS: usize = 6;
const MAX_NAME_CHARS: usize = 80;

const NONE_MARKERS: &[&str] = &["none", "n a", "no brands", "no brand names", "no names"];

/// Errors from a completion backend.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Completion backend not available")]
    Unavailable,
}

impl CompletionError {
    /// Transient failures worth retrying after a back-off delay.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) | Self::Unavailable => false,
        }
    }
}

/// Trait for text-completion backends.
///
/// Implementations must be swappable and mockable; the extractor bounds
/// every call with its own timeout.
pub trait CompletionBackend {
    /// Complete `user_content` under `system_instruction`.
    fn complete(
        &self,
        system_instruction: &str,
        user_content: &str,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send;

    /// Check if the backend is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), CompletionError>> + Send;

    /// Get the backend name for logging.
    fn name(&self) -> &'static str;
}

/// A backend that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl CompletionBackend for Offline {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable)
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        Err(CompletionError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

/// Extraction through a completion backend, grounded in the response.
#[derive(Debug, Clone)]
pub struct AssistedExtractor<B> {
    backend: B,
    config: ExtractorConfig,
    stoplist: Stoplist,
    timeout: Duration,
}

impl<B: CompletionBackend> AssistedExtractor<B> {
    pub fn new(backend: B, config: ExtractorConfig, timeout: Duration) -> Self {
        let stoplist = config.stoplist();
        Self {
            backend,
            config,
            stoplist,
            timeout,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<B: CompletionBackend + Sync> MentionExtractor for AssistedExtractor<B> {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Assisted
    }

    async fn extract(
        &self,
        text: &TokenizedText<'_>,
        prompt_text: &str,
        gazetteer: &Gazetteer,
        known: &KnownNames,
    ) -> Result<Extraction, ExtractError> {
        let user_content = build_user_content(prompt_text, text.raw);
        let output = tokio::time::timeout(
            self.timeout,
            self.backend.complete(BRAND_LIST_INSTRUCTION, &user_content),
        )
        .await
        .map_err(|_| ExtractError::TimedOut(self.timeout))??;

        let candidates = parse_completion(&output, &self.stoplist, self.config.min_candidate_len)?;
        let grounded = ground_candidates(text, &candidates, gazetteer);

        tracing::debug!(
            backend = self.backend.name(),
            listed = candidates.len(),
            grounded = grounded.len(),
            "Assisted extraction candidates"
        );

        let mut mentions = scanned_mentions(text, gazetteer, known);
        mentions.extend(grounded);
        let (mentions, candidates_truncated) =
            cap_candidates(merge_mentions(mentions), self.config.max_candidates);

        Ok(Extraction {
            mentions,
            candidates_truncated,
        })
    }
}

/// The user message for an extraction call.
pub fn build_user_content(prompt_text: &str, response_text: &str) -> String {
    format!("Question:\n{}\n\nAnswer:\n{}", prompt_text.trim(), response_text.trim())
}

/// Parse a one-name-per-line completion into candidate names.
///
/// Strips list markers, quotes, emphasis, and trailing descriptions, then
/// applies the same length and stoplist filter as pattern candidates.
/// An empty completion, or one where no line yields a usable name and no
/// "none" marker is present, is malformed.
pub fn parse_completion(
    output: &str,
    stoplist: &Stoplist,
    min_len: usize,
) -> Result<Vec<String>, ExtractError> {
    if output.trim().is_empty() {
        return Err(ExtractError::Malformed("empty completion".to_string()));
    }

    let mut names = Vec::new();
    let mut seen = HashSet::new();
    let mut lines = 0;
    let mut said_none = false;

    for line in output.lines() {
        let name = clean_line(line);
        if name.is_empty() {
            continue;
        }
        lines += 1;

        let normalized = normalize(name);
        if NONE_MARKERS.contains(&normalized.as_str()) {
            said_none = true;
            continue;
        }
        if name.split_whitespace().count() > MAX_NAME_WORDS || name.chars().count() > MAX_NAME_CHARS {
            continue;
        }
        if !stoplist.accepts(&normalized, min_len) {
            continue;
        }
        if seen.insert(normalized) {
            names.push(name.to_string());
        }
    }

    if names.is_empty() && !said_none {
        return Err(ExtractError::Malformed(format!(
            "no usable names in {lines} line(s)"
        )));
    }
    Ok(names)
}

fn clean_line(line: &str) -> &str {
    let mut name = line.trim();

    name = name.trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | '·') || c.is_whitespace());
    let digits = name.len() - name.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &name[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            name = stripped.trim_start();
        }
    }

    for separator in [" - ", " – ", " — ", ": ", " ("] {
        if let Some(idx) = name.find(separator) {
            name = &name[..idx];
        }
    }

    name.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '_' | ',' | '.' | ';' | ':') || c.is_whitespace())
}

/// Turn candidate names into mentions at every place they occur.
///
/// A candidate whose normalized words do not appear as a whole-word
/// sequence of the response is dropped. Mentions carry the response's own
/// spelling, never the completion's.
pub fn ground_candidates(
    text: &TokenizedText<'_>,
    candidates: &[String],
    gazetteer: &Gazetteer,
) -> Vec<Mention> {
    let mut mentions = Vec::new();

    for candidate in candidates {
        let words = phrase_tokens(candidate);
        if words.is_empty() {
            continue;
        }
        let positions = text.find_phrase(&words);
        if positions.is_empty() {
            tracing::debug!(candidate = %candidate, "Dropping ungrounded candidate");
            continue;
        }

        let normalized = words.join(" ");
        let entry = resolve_candidate(gazetteer, &normalized);
        mentions.extend(positions.into_iter().filter_map(|start| {
            mention_at(text, start, start + words.len(), entry, MentionOrigin::Assisted)
        }));
    }

    mentions
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandlens_features::tokenize;
    use brandlens_model::BrandCatalogEntry;

    struct Scripted(&'static str);

    impl CompletionBackend for Scripted {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }

        async fn health_check(&self) -> Result<(), CompletionError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct Stalled;

    impl CompletionBackend for Stalled {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }

        async fn health_check(&self) -> Result<(), CompletionError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[test]
    fn test_parse_completion_cleans_lines() {
        let output = "1. Zendesk\n- **Freshdesk** - help desk\n* \"Intercom\"\n2) Help Scout (email)\nThe\n\nzendesk";
        let names = parse_completion(output, &Stoplist::default(), 2).unwrap();
        assert_eq!(names, vec!["Zendesk", "Freshdesk", "Intercom", "Help Scout"]);
    }

    #[test]
    fn test_parse_completion_none_and_malformed() {
        let stoplist = Stoplist::default();
        assert!(parse_completion("NONE", &stoplist, 2).unwrap().is_empty());
        assert!(matches!(
            parse_completion("   ", &stoplist, 2),
            Err(ExtractError::Malformed(_))
        ));
        let prose = "I could not find any specific companies mentioned in this particular answer text.";
        assert!(matches!(
            parse_completion(prose, &stoplist, 2),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn test_ground_candidates_drops_hallucinations() {
        let text = tokenize("Zendesk and freshdesk are popular. Zendesk leads.");
        let gazetteer = Gazetteer::build(&[BrandCatalogEntry::new("Zendesk")]);
        let candidates = vec!["Zendesk".to_string(), "Freshdesk".to_string(), "Salesforce".to_string()];
        let mentions = ground_candidates(&text, &candidates, &gazetteer);

        let raw: Vec<_> = mentions.iter().map(|m| m.raw_text.as_str()).collect();
        assert_eq!(raw, vec!["Zendesk", "Zendesk", "freshdesk"]);
        assert!(mentions[0].is_resolved());
        assert!(!mentions[2].is_resolved());
    }

    #[tokio::test]
    async fn test_assisted_extraction_grounds_and_orders() {
        let extractor = AssistedExtractor::new(
            Scripted("Intercom\nAcme Corp\nHubSpot\n"),
            ExtractorConfig::default(),
            Duration::from_secs(5),
        );
        let gazetteer = Gazetteer::build(&[BrandCatalogEntry::org("Acme Corp")]);
        let text = tokenize("For support, acme corp beats Intercom.");

        let extraction = extractor
            .extract(&text, "best help desk?", &gazetteer, &KnownNames::empty())
            .await
            .unwrap();
        let raw: Vec<_> = extraction.mentions.iter().map(|m| m.raw_text.as_str()).collect();
        assert_eq!(raw, vec!["acme corp", "Intercom"]);
        assert_eq!(extraction.mentions[0].origin, MentionOrigin::Catalog);
        assert_eq!(extraction.mentions[1].origin, MentionOrigin::Assisted);
    }

    #[tokio::test]
    async fn test_assisted_extraction_keeps_known_names() {
        let extractor = AssistedExtractor::new(
            Scripted("Intercom"),
            ExtractorConfig::default(),
            Duration::from_secs(5),
        );
        let known = KnownNames::new(["Acme Corp", "HubSpot"]);
        let text = tokenize("Pick acme corp over Intercom or hubspot.");

        let extraction = extractor
            .extract(&text, "best help desk?", &Gazetteer::empty(), &known)
            .await
            .unwrap();
        let found: Vec<_> = extraction
            .mentions
            .iter()
            .map(|m| (m.raw_text.as_str(), m.origin))
            .collect();
        assert_eq!(
            found,
            vec![
                ("acme corp", MentionOrigin::Known),
                ("Intercom", MentionOrigin::Assisted),
                ("hubspot", MentionOrigin::Known),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_assisted_extraction_times_out() {
        let extractor =
            AssistedExtractor::new(Stalled, ExtractorConfig::default(), Duration::from_millis(50));
        let text = tokenize("Zendesk is fine.");
        let result = extractor
            .extract(&text, "help desk?", &Gazetteer::empty(), &KnownNames::empty())
            .await;
        assert!(matches!(result, Err(ExtractError::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_offline_backend_fails() {
        let extractor =
            AssistedExtractor::new(Offline, ExtractorConfig::default(), Duration::from_secs(1));
        let text = tokenize("Zendesk is fine.");
        let result = extractor
            .extract(&text, "help desk?", &Gazetteer::empty(), &KnownNames::empty())
            .await;
        assert!(matches!(
            result,
            Err(ExtractError::Completion(CompletionError::Unavailable))
        ));
    }

    #[test]
    fn test_retriable_errors() {
        assert!(CompletionError::Timeout.is_retriable());
        assert!(CompletionError::Http { status: 503, body: String::new() }.is_retriable());
        assert!(CompletionError::Http { status: 429, body: String::new() }.is_retriable());
        assert!(!CompletionError::Http { status: 401, body: String::new() }.is_retriable());
        assert!(!CompletionError::Parse("bad".into()).is_retriable());
    }
}
