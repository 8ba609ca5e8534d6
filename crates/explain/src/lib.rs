//! Explanation generation for visibility results.
//!
//! Converts a result and its score breakdown into human-readable
//! explanations suitable for reports and the dashboard.

use brandlens_model::AnalysisResult;
use brandlens_score::ScoreTable;
use serde::{Deserialize, Serialize};

/// A structured explanation of one score component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Detailed explanation (1-2 sentences)
    pub detail: String,

    /// Signed contribution to the score
    pub impact: f32,

    /// Evidence items supporting this explanation
    pub evidence: Vec<EvidenceItem>,
}

/// A piece of evidence supporting an explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Type of evidence
    pub kind: String,

    /// The specific value or match
    pub value: String,

    /// Optional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Generate explanations for a result, in score order.
pub fn explain_result(result: &AnalysisResult) -> Vec<Explanation> {
    let mut explanations = Vec::new();
    let breakdown = &result.breakdown;

    if !result.org_brand_present {
        explanations.push(Explanation {
            summary: "Brand not mentioned".to_string(),
            detail: "The response does not name your brand, so it receives the minimum score \
                     regardless of which competitors appear."
                .to_string(),
            impact: 0.0,
            evidence: vec![],
        });
    } else {
        let position = result.org_brand_position.map_or_else(
            || "an unknown position".to_string(),
            |rank| ordinal(rank + 1),
        );
        explanations.push(Explanation {
            summary: "Brand mentioned".to_string(),
            detail: format!(
                "Your brand is named {} time(s). Being present starts the score at {}.",
                result.org_mention_count, breakdown.base
            ),
            impact: breakdown.base,
            evidence: vec![EvidenceItem {
                kind: "org_mentions".to_string(),
                value: result.org_mention_count.to_string(),
                context: None,
            }],
        });
        explanations.push(Explanation {
            summary: format!("Named {position}"),
            detail: format!(
                "Your brand is the {position} brand named in the response, adding {} for prominence.",
                breakdown.prominence_bonus
            ),
            impact: breakdown.prominence_bonus,
            evidence: result
                .org_brand_position
                .map(|rank| EvidenceItem {
                    kind: "position".to_string(),
                    value: rank.to_string(),
                    context: Some(result.brands_mentioned.join(", ")),
                })
                .into_iter()
                .collect(),
        });
    }

    if result.competitor_count > 0 {
        explanations.push(Explanation {
            summary: format!("{} competitor(s) named", result.competitor_count),
            detail: if breakdown.competitor_penalty > 0.0 {
                format!(
                    "Sharing the answer with {} competitor(s) costs {} point(s).",
                    result.competitor_count, breakdown.competitor_penalty
                )
            } else {
                "Too few competitors are named to reduce the score.".to_string()
            },
            impact: -breakdown.competitor_penalty,
            evidence: result
                .competitors
                .iter()
                .map(|c| EvidenceItem {
                    kind: (if c.grounded { "competitor" } else { "known_competitor" }).to_string(),
                    value: c.name.clone(),
                    context: Some(format!("{} occurrence(s)", c.occurrences)),
                })
                .collect(),
        });
    }

    if !result.discovered.is_empty() {
        explanations.push(Explanation {
            summary: format!("{} new name(s) discovered", result.discovered.len()),
            detail: "These names are not in your brand catalog yet.".to_string(),
            impact: 0.0,
            evidence: result
                .discovered
                .iter()
                .map(|d| EvidenceItem {
                    kind: if d.is_org_brand { "org_brand" } else { "discovered" }.to_string(),
                    value: d.name.clone(),
                    context: if d.is_org_brand {
                        Some("your brand; add it to the catalog".to_string())
                    } else {
                        d.similar_to.as_ref().map(|s| format!("possible variant of {s}"))
                    },
                })
                .collect(),
        });
    }

    if let Some(reason) = &result.metadata.fallback_reason {
        explanations.push(Explanation {
            summary: "Assisted extraction unavailable".to_string(),
            detail: format!("Names were extracted by pattern matching instead: {reason}."),
            impact: 0.0,
            evidence: vec![],
        });
    }

    explanations
}

/// Generate a one-line visibility summary.
pub fn summarize_visibility(result: &AnalysisResult, table: &ScoreTable) -> String {
    if !result.org_brand_present {
        return match result.competitor_count {
            0 => "NOT VISIBLE: no brands named".to_string(),
            n => format!("NOT VISIBLE: {n} competitor(s) named instead"),
        };
    }

    let span = table.max - table.min;
    let fraction = if span > 0.0 {
        (result.score - table.min) / span
    } else {
        1.0
    };
    let level = if fraction >= 0.7 {
        "HIGH VISIBILITY"
    } else if fraction >= 0.4 {
        "MODERATE VISIBILITY"
    } else {
        "LOW VISIBILITY"
    };

    let position = result
        .org_brand_position
        .map_or_else(|| "named".to_string(), |rank| format!("named {}", ordinal(rank + 1)));
    format!(
        "{}: {} of {} brand(s), {} competitor(s)",
        level,
        position,
        result.brands_mentioned.len(),
        result.competitor_count
    )
}

fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
