//! Result assembly. Pure: no I/O, no clock, no randomness.

use brandlens_classify::Classification;
use brandlens_features::{is_probable_variant, normalize};
use brandlens_gazetteer::Gazetteer;
use brandlens_model::{
    AnalysisMetadata, AnalysisResult, Competitor, DiscoveredName, ExtractionMethod, Mention,
    ScoreBreakdown,
};

const DETERMINISTIC_BASE: f32 = 1.0;
const ASSISTED_BASE: f32 = 0.85;
const FALLBACK_BASE: f32 = 0.9;

/// How the mentions behind a result were obtained.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub method: ExtractionMethod,
    pub fallback_reason: Option<String>,
    pub candidates_truncated: bool,
}

/// Package classifier and score output into an [`AnalysisResult`].
pub fn assemble(
    mentions: &[Mention],
    classification: Classification,
    breakdown: ScoreBreakdown,
    provenance: Provenance,
    gazetteer: &Gazetteer,
) -> AnalysisResult {
    let mut discovered: Vec<DiscoveredName> =
        discovered_org_name(&classification, gazetteer).into_iter().collect();
    discovered.extend(discovered_names(&classification.competitors, gazetteer));
    let confidence = confidence(
        provenance.method,
        provenance.fallback_reason.is_some(),
        mentions,
    );
    let competitor_count = classification.competitors.len();
    let org_mention_count = u32::try_from(classification.org_mentions.len()).unwrap_or(u32::MAX);

    AnalysisResult {
        org_brand_present: classification.org_present(),
        org_brand_position: classification.org_first_rank,
        org_mention_count,
        brands_mentioned: classification.brands_mentioned,
        competitors: classification.competitors,
        competitor_count,
        score: breakdown.score,
        breakdown,
        discovered,
        metadata: AnalysisMetadata {
            method: provenance.method,
            confidence,
            fallback_reason: provenance.fallback_reason,
            mention_count: mentions.len(),
            candidates_truncated: provenance.candidates_truncated,
        },
    }
}

/// Grounded competitors the catalog does not know yet.
///
/// A name that looks like a variant of a catalog entry carries that
/// entry's name in `similar_to`.
pub fn discovered_names(competitors: &[Competitor], gazetteer: &Gazetteer) -> Vec<DiscoveredName> {
    let known: Vec<(String, &str)> = gazetteer
        .entries()
        .iter()
        .flat_map(|entry| entry.names().map(move |name| (normalize(name), entry.name.as_str())))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    competitors
        .iter()
        .filter(|c| c.grounded && !c.in_catalog)
        .map(|c| DiscoveredName {
            name: c.name.clone(),
            normalized: c.normalized.clone(),
            occurrences: c.occurrences,
            similar_to: known
                .iter()
                .find(|(key, _)| is_probable_variant(&c.normalized, key))
                .map(|(_, name)| (*name).to_string()),
            is_org_brand: false,
        })
        .collect()
}

/// The org's own name when no mention of it resolved to an org-brand
/// catalog entry, so the caller can add it to the catalog.
///
/// Named after the request's org name when the first org mention matches
/// it, otherwise after the alias as written. `similar_to` points at an
/// existing org entry the alias could become a variant of.
pub fn discovered_org_name(
    classification: &Classification,
    gazetteer: &Gazetteer,
) -> Option<DiscoveredName> {
    let resolved = classification
        .org_mentions
        .iter()
        .any(|m| m.matched_entry.as_ref().is_some_and(|entry| entry.is_org_brand));
    if resolved {
        return None;
    }

    let first = classification.org_mentions.first()?;
    let name = if normalize(&classification.org_name) == first.normalized_text {
        classification.org_name.clone()
    } else {
        first.raw_text.clone()
    };
    Some(DiscoveredName {
        normalized: normalize(&name),
        name,
        occurrences: u32::try_from(classification.org_mentions.len()).unwrap_or(u32::MAX),
        similar_to: gazetteer.org_entries().next().map(|entry| entry.name.clone()),
        is_org_brand: true,
    })
}

/// Coarse confidence in `[0.0, 1.0]`, rounded to two decimals.
///
/// `method_base * (0.6 + 0.4 * resolved_fraction)`, where the fraction is
/// the share of mentions resolved through the catalog.
pub fn confidence(method: ExtractionMethod, fell_back: bool, mentions: &[Mention]) -> f32 {
    let base = match (method, fell_back) {
        (_, true) => FALLBACK_BASE,
        (ExtractionMethod::Deterministic, false) => DETERMINISTIC_BASE,
        (ExtractionMethod::Assisted, false) => ASSISTED_BASE,
    };

    #[allow(clippy::cast_precision_loss)]
    let resolved_fraction = if mentions.is_empty() {
        1.0
    } else {
        mentions.iter().filter(|m| m.is_resolved()).count() as f32 / mentions.len() as f32
    };

    let value = base * (0.6 + 0.4 * resolved_fraction);
    (value * 100.0).round() / 100.0
}
