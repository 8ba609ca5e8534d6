//! End-to-end analysis scenarios.

use brandlens_engine::{Engine, EngineConfig};
use brandlens_extract::{CompletionBackend, CompletionError};
use brandlens_gazetteer::Gazetteer;
use brandlens_model::{AnalysisError, AnalysisRequest, BrandCatalogEntry, ExtractionMethod};
use pretty_assertions::assert_eq;

const PROMPT: &str = "What is the best customer support software?";

/// Completion backend that returns a fixed listing.
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

fn acme_catalog() -> Gazetteer {
    Gazetteer::build(&[BrandCatalogEntry::org("Acme Corp")])
}

fn request(response: &str) -> AnalysisRequest {
    AnalysisRequest::new(response, PROMPT, "Acme Corp")
}

#[tokio::test]
async fn test_org_named_alone() {
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let result = engine
        .analyze(&request("We recommend Acme Corp for this use case."), &acme_catalog())
        .await
        .unwrap();

    assert!(result.org_brand_present);
    assert_eq!(result.org_brand_position, Some(0));
    assert!(result.competitors.is_empty());
    assert_eq!(result.competitor_count, 0);
    assert_eq!(result.score, 8.0);
    assert_eq!(result.brands_mentioned, vec!["Acme Corp"]);
}

#[tokio::test]
async fn test_org_with_three_new_competitors() {
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let result = engine
        .analyze(
            &request("Top tools: Acme Corp, Zendesk, Freshdesk, Intercom."),
            &acme_catalog(),
        )
        .await
        .unwrap();

    assert!(result.org_brand_present);
    assert_eq!(result.org_brand_position, Some(0));
    assert_eq!(result.competitor_count, 3);
    assert_eq!(result.competitor_names(), vec!["Zendesk", "Freshdesk", "Intercom"]);
    assert_eq!(result.score, 7.0);
    assert_eq!(result.breakdown.competitor_penalty, 1.0);

    let discovered: Vec<&str> = result.discovered.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(discovered, vec!["Zendesk", "Freshdesk", "Intercom"]);
}

#[tokio::test]
async fn test_org_absent() {
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let result = engine
        .analyze(
            &request("Zendesk and Freshdesk are popular choices."),
            &acme_catalog(),
        )
        .await
        .unwrap();

    assert!(!result.org_brand_present);
    assert_eq!(result.org_brand_position, None);
    assert_eq!(result.score, 1.0);
    assert_eq!(result.competitor_names(), vec!["Zendesk", "Freshdesk"]);
}

#[tokio::test]
async fn test_empty_response_is_input_error() {
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let outcome = engine.analyze(&request(""), &acme_catalog()).await;
    assert_eq!(outcome, Err(AnalysisError::EmptyResponse));
}

#[tokio::test]
async fn test_hallucinated_name_is_dropped() {
    let response = "Acme Corp and Zendesk both offer live chat.";
    let honest = Engine::assisted(Scripted("Acme Corp\nZendesk"), EngineConfig::default()).unwrap();
    let hallucinating = Engine::assisted(
        Scripted("Acme Corp\nZendesk\nSalesforce Service Cloud"),
        EngineConfig::default(),
    )
    .unwrap();

    let expected = honest.analyze(&request(response), &acme_catalog()).await.unwrap();
    let actual = hallucinating
        .analyze(&request(response), &acme_catalog())
        .await
        .unwrap();

    assert_eq!(actual.metadata.method, ExtractionMethod::Assisted);
    assert_eq!(actual.competitor_names(), vec!["Zendesk"]);
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_catalog_variants_and_possessives() {
    let gazetteer = Gazetteer::build(&[
        BrandCatalogEntry::org("Acme Corp").with_variants(["Acme"]),
        BrandCatalogEntry::new("Zendesk").with_variants(["Zendesk Inc"]),
    ]);
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let result = engine
        .analyze(
            &request("Zendesk Inc. is well known, but Acme's pricing wins. Zendesk again."),
            &gazetteer,
        )
        .await
        .unwrap();

    assert_eq!(result.org_brand_position, Some(1));
    assert_eq!(result.competitors.len(), 1);
    assert_eq!(result.competitors[0].name, "Zendesk");
    assert_eq!(result.competitors[0].occurrences, 2);
    assert!(result.discovered.is_empty());
}

#[tokio::test]
async fn test_org_alias_without_catalog() {
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let request = AnalysisRequest::new("AcmeDesk is a great choice.", PROMPT, "Acme Corp")
        .with_aliases(vec!["AcmeDesk".to_string()]);
    let result = engine.analyze(&request, &Gazetteer::empty()).await.unwrap();

    assert!(result.org_brand_present);
    assert_eq!(result.brands_mentioned, vec!["Acme Corp"]);
    assert_eq!(result.score, 8.0);
}

#[tokio::test]
async fn test_org_outside_catalog_after_capitalized_word() {
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let result = engine
        .analyze(&request("Choose Acme Corp for support."), &Gazetteer::empty())
        .await
        .unwrap();

    assert!(result.org_brand_present);
    assert_eq!(result.org_brand_position, Some(0));
    assert!(result.competitors.is_empty());
    assert_eq!(result.score, 8.0);
}

#[tokio::test]
async fn test_org_outside_catalog_in_lowercase() {
    let engine = Engine::deterministic(EngineConfig::default()).unwrap();
    let result = engine
        .analyze(&request("Many teams pick acme corp for support."), &Gazetteer::empty())
        .await
        .unwrap();

    assert!(result.org_brand_present);
    assert_eq!(result.brands_mentioned, vec!["Acme Corp"]);
    assert_eq!(result.score, 8.0);

    let discovered = &result.discovered;
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].name, "Acme Corp");
    assert!(discovered[0].is_org_brand);
}

#[tokio::test]
async fn test_org_survives_candidate_cap() {
    let mut config = EngineConfig::default();
    config.extractor.max_candidates = 2;
    let engine = Engine::deterministic(config).unwrap();
    let result = engine
        .analyze(&request("Alpha, Bravo, Charlie and Acme Corp."), &Gazetteer::empty())
        .await
        .unwrap();

    assert!(result.org_brand_present);
    assert_eq!(result.org_brand_position, Some(2));
    assert_eq!(result.competitor_names(), vec!["Alpha", "Bravo"]);
    assert!(result.metadata.candidates_truncated);
    assert_eq!(result.score, 7.0);
}
