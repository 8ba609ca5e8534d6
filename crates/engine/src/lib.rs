//! Brand visibility analysis engine.
//!
//! Orchestrates one analysis per (prompt, response) pair:
//! validate -> tokenize -> extract -> classify -> score -> assemble.
//!
//! The engine holds configuration only. The catalog arrives as a built
//! [`Gazetteer`] (see [`brandlens_gazetteer::GazetteerCache`]) and is never
//! written; newly seen names come back in [`AnalysisResult::discovered`].
//! One engine can serve many concurrent analyses.

mod assemble;
mod config;

use std::time::Instant;

use brandlens_classify::{classify, OrgIdentity};
use brandlens_extract::{
    AssistedExtractor, CompletionBackend, DeterministicExtractor, Extraction, MentionExtractor,
    Offline,
};
use brandlens_features::{tokenize, TokenizedText};
use brandlens_gazetteer::{Gazetteer, KnownNames};
use brandlens_model::{AnalysisError, AnalysisRequest, AnalysisResult, ExtractionMethod};
use brandlens_score::visibility_score;

pub use assemble::{assemble, confidence, discovered_names, discovered_org_name, Provenance};
pub use config::{AssistConfig, ConfigError, EngineConfig};

/// Which extractor produces mentions.
#[derive(Debug, Clone)]
pub enum Strategy<B> {
    Deterministic,
    /// Completion-assisted, with deterministic fallback
    Assisted(AssistedExtractor<B>),
}

/// Visibility analysis engine.
#[derive(Debug, Clone)]
pub struct Engine<B = Offline> {
    config: EngineConfig,
    deterministic: DeterministicExtractor,
    strategy: Strategy<B>,
}

impl Engine<Offline> {
    /// An engine that never calls out.
    pub fn deterministic(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            deterministic: DeterministicExtractor::new(config.extractor.clone()),
            strategy: Strategy::Deterministic,
            config,
        })
    }
}

impl<B: CompletionBackend + Sync> Engine<B> {
    /// An engine that asks `backend` for names first.
    pub fn assisted(backend: B, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let assisted = AssistedExtractor::new(
            backend,
            config.extractor.clone(),
            config.assist.timeout(),
        );
        Ok(Self {
            deterministic: DeterministicExtractor::new(config.extractor.clone()),
            strategy: Strategy::Assisted(assisted),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy(&self) -> &Strategy<B> {
        &self.strategy
    }

    /// Analyze one response.
    ///
    /// Fails only on invalid input. Any assisted-extraction failure falls
    /// back to the deterministic strategy and is reported in
    /// `metadata.fallback_reason`.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        gazetteer: &Gazetteer,
    ) -> Result<AnalysisResult, AnalysisError> {
        request.validate()?;
        let started = Instant::now();
        let text = tokenize(&request.response_text);
        let known = self.known_names(request);

        let (extraction, provenance) = match &self.strategy {
            Strategy::Deterministic => self.run_deterministic(&text, gazetteer, &known, None),
            Strategy::Assisted(extractor) => {
                match extractor.extract(&text, &request.prompt_text, gazetteer, &known).await {
                    Ok(extraction) => {
                        let provenance = Provenance {
                            method: ExtractionMethod::Assisted,
                            fallback_reason: None,
                            candidates_truncated: extraction.candidates_truncated,
                        };
                        (extraction, provenance)
                    }
                    Err(error) => {
                        tracing::warn!(
                            backend = extractor.backend().name(),
                            error = %error,
                            "Assisted extraction failed, falling back to deterministic"
                        );
                        self.run_deterministic(&text, gazetteer, &known, Some(error.to_string()))
                    }
                }
            }
        };

        let result = self.finish(request, extraction, provenance, gazetteer);
        tracing::debug!(
            method = %result.metadata.method,
            mentions = result.metadata.mention_count,
            competitors = result.competitor_count,
            score = result.score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
    }

    /// Analyze one response with the deterministic strategy, without
    /// awaiting anything.
    pub fn analyze_deterministic(
        &self,
        request: &AnalysisRequest,
        gazetteer: &Gazetteer,
    ) -> Result<AnalysisResult, AnalysisError> {
        request.validate()?;
        let text = tokenize(&request.response_text);
        let known = self.known_names(request);
        let (extraction, provenance) = self.run_deterministic(&text, gazetteer, &known, None);
        Ok(self.finish(request, extraction, provenance, gazetteer))
    }

    /// Org names, aliases and configured known competitors, scanned
    /// alongside the catalog.
    fn known_names(&self, request: &AnalysisRequest) -> KnownNames {
        let competitors = self.config.classify.known_competitors.iter().map(String::as_str);
        KnownNames::new(request.org_names().chain(competitors))
    }

    fn run_deterministic(
        &self,
        text: &TokenizedText<'_>,
        gazetteer: &Gazetteer,
        known: &KnownNames,
        fallback_reason: Option<String>,
    ) -> (Extraction, Provenance) {
        let extraction = self.deterministic.extract_mentions(text, gazetteer, known);
        let provenance = Provenance {
            method: ExtractionMethod::Deterministic,
            fallback_reason,
            candidates_truncated: extraction.candidates_truncated,
        };
        (extraction, provenance)
    }

    fn finish(
        &self,
        request: &AnalysisRequest,
        extraction: Extraction,
        provenance: Provenance,
        gazetteer: &Gazetteer,
    ) -> AnalysisResult {
        let org = OrgIdentity::new(request.org_names());
        let classification = classify(&extraction.mentions, &org, &self.config.classify);
        let breakdown = visibility_score(
            classification.org_present(),
            classification.org_first_rank,
            classification.grounded_competitors().count(),
            &self.config.score,
        );
        assemble(&extraction.mentions, classification, breakdown, provenance, gazetteer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandlens_extract::CompletionError;
    use brandlens_model::BrandCatalogEntry;

    struct Listing(&'static str);

    impl CompletionBackend for Listing {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }

        async fn health_check(&self) -> Result<(), CompletionError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "listing"
        }
    }

    fn catalog() -> Gazetteer {
        Gazetteer::build(&[
            BrandCatalogEntry::org("Acme Corp").with_variants(["Acme"]),
            BrandCatalogEntry::new("Zendesk").with_variants(["Zendesk Inc"]),
        ])
    }

    #[tokio::test]
    async fn test_deterministic_engine() {
        let engine = Engine::deterministic(EngineConfig::default()).unwrap();
        let request = AnalysisRequest::new(
            "Zendesk Inc. is popular, but acme is cheaper.",
            "best helpdesk software",
            "Acme Corp",
        );
        let result = engine.analyze(&request, &catalog()).await.unwrap();
        assert!(result.org_brand_present);
        assert_eq!(result.org_brand_position, Some(1));
        assert_eq!(result.competitor_names(), vec!["Zendesk"]);
        assert_eq!(result.score, 8.0);
        assert_eq!(result.metadata.method, ExtractionMethod::Deterministic);
        assert_eq!(result.metadata.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_assisted_engine_reports_method() {
        let engine = Engine::assisted(Listing("Acme Corp\nFreshdesk"), EngineConfig::default()).unwrap();
        let request = AnalysisRequest::new(
            "Acme Corp leads; Freshdesk follows.",
            "best helpdesk software",
            "Acme Corp",
        );
        let result = engine.analyze(&request, &catalog()).await.unwrap();
        assert_eq!(result.metadata.method, ExtractionMethod::Assisted);
        assert_eq!(result.metadata.fallback_reason, None);
        assert_eq!(result.competitor_names(), vec!["Freshdesk"]);
        assert_eq!(result.discovered.len(), 1);
    }

    #[tokio::test]
    async fn test_assist_failure_falls_back() {
        let engine = Engine::assisted(Offline, EngineConfig::default()).unwrap();
        let request = AnalysisRequest::new("We recommend Acme Corp.", "best crm", "Acme Corp");
        let result = engine.analyze(&request, &catalog()).await.unwrap();
        assert!(result.org_brand_present);
        assert_eq!(result.metadata.method, ExtractionMethod::Deterministic);
        assert!(result
            .metadata
            .fallback_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("not available")));
        assert_eq!(result.metadata.confidence, 0.9);
    }

    #[test]
    fn test_input_errors_before_work() {
        let engine = Engine::deterministic(EngineConfig::default()).unwrap();
        let gazetteer = Gazetteer::empty();
        assert_eq!(
            engine.analyze_deterministic(&AnalysisRequest::new("  ", "prompt", "Acme"), &gazetteer),
            Err(AnalysisError::EmptyResponse)
        );
        assert_eq!(
            engine.analyze_deterministic(&AnalysisRequest::new("Acme", "", "Acme"), &gazetteer),
            Err(AnalysisError::EmptyPrompt)
        );
    }

    #[test]
    fn test_degenerate_result() {
        let engine = Engine::deterministic(EngineConfig::default()).unwrap();
        let request = AnalysisRequest::new("there are many options out there.", "best crm", "Acme");
        let result = engine
            .analyze_deterministic(&request, &Gazetteer::empty())
            .unwrap();
        assert!(!result.org_brand_present);
        assert!(result.competitors.is_empty());
        assert_eq!(result.score, 1.0);
        assert_eq!(result.metadata.mention_count, 0);
    }

    #[test]
    fn test_unmentioned_known_do_not_move_score() {
        let mut config = EngineConfig::default();
        config.classify.known_competitors = vec!["Salesforce".into(), "HubSpot".into()];
        config.classify.include_unmentioned_known = true;
        let engine = Engine::deterministic(config).unwrap();
        let request = AnalysisRequest::new("Acme Corp is the pick.", "best crm", "Acme Corp");
        let result = engine.analyze_deterministic(&request, &catalog()).unwrap();
        assert_eq!(result.competitor_count, 2);
        assert_eq!(result.score, 8.0);
        assert!(result.discovered.is_empty());
    }

    #[test]
    fn test_known_competitors_found_in_any_case() {
        let mut config = EngineConfig::default();
        config.classify.known_competitors = vec!["HubSpot".into(), "Salesforce".into()];
        let engine = Engine::deterministic(config).unwrap();
        let request = AnalysisRequest::new(
            "Acme Corp integrates with hubspot and salesforce.",
            "best crm",
            "Acme Corp",
        );
        let result = engine.analyze_deterministic(&request, &catalog()).unwrap();
        assert_eq!(result.competitor_names(), vec!["HubSpot", "Salesforce"]);
        assert!(result.competitors.iter().all(|c| c.grounded && !c.in_catalog));
        assert_eq!(result.competitor_count, 2);
        assert_eq!(result.score, 7.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.assist.timeout_ms = 0;
        assert!(matches!(
            Engine::assisted(Offline, config),
            Err(ConfigError::ZeroTimeout)
        ));
    }
}
