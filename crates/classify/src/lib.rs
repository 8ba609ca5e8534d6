//! Partition mentions into org-brand and competitor mentions.
//!
//! A mention belongs to the organization when it resolved to an org-brand
//! catalog entry, or when its normalized text equals the normalized org
//! name or one of its aliases. Everything else is a competitor candidate.

use std::collections::HashMap;

use brandlens_features::normalize;
use brandlens_model::{Competitor, Mention};
use serde::{Deserialize, Serialize};

/// Caller-supplied competitor knowledge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyOptions {
    /// Well-known competitor names in the org's category
    pub known_competitors: Vec<String>,

    /// Report known competitors even when the response never names them
    pub include_unmentioned_known: bool,
}

/// The names that identify the organization.
#[derive(Debug, Clone)]
pub struct OrgIdentity {
    display_name: String,
    normalized: Vec<String>,
}

impl OrgIdentity {
    /// The first name is used for display.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut display_name = String::new();
        let mut normalized = Vec::new();
        for name in names {
            let name = name.as_ref();
            if display_name.is_empty() {
                display_name = name.trim().to_string();
            }
            let key = normalize(name);
            if !key.is_empty() && !normalized.contains(&key) {
                normalized.push(key);
            }
        }
        Self {
            display_name,
            normalized,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Whether a normalized name identifies the organization.
    pub fn matches(&self, normalized: &str) -> bool {
        self.normalized.iter().any(|n| n == normalized)
    }

    fn owns(&self, mention: &Mention) -> bool {
        match &mention.matched_entry {
            Some(entry) if entry.is_org_brand => true,
            Some(entry) => {
                self.matches(&mention.normalized_text) || self.matches(&normalize(&entry.name))
            }
            None => self.matches(&mention.normalized_text),
        }
    }
}

/// Output of [`classify`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub org_mentions: Vec<Mention>,
    pub competitor_mentions: Vec<Mention>,

    /// Unique competitors in rank order, with occurrence counts
    pub competitors: Vec<Competitor>,

    /// Distinct-name rank of the first org mention
    pub org_first_rank: Option<usize>,

    /// Every distinct brand named, in rank order
    pub brands_mentioned: Vec<String>,

    /// Display name of the organization
    pub org_name: String,
}

impl Classification {
    pub fn org_present(&self) -> bool {
        !self.org_mentions.is_empty()
    }

    /// Competitors actually named in the response.
    pub fn grounded_competitors(&self) -> impl Iterator<Item = &Competitor> {
        self.competitors.iter().filter(|c| c.grounded)
    }
}

/// Split mentions into org and competitor mentions.
///
/// `mentions` must be in text order. Competitors are deduplicated by their
/// catalog entry (or normalized text when unresolved) and counted. Ranks
/// count distinct names, so 0 means the brand was named first. Pure and
/// deterministic.
pub fn classify(mentions: &[Mention], org: &OrgIdentity, options: &ClassifyOptions) -> Classification {
    let known: HashMap<String, &str> = options
        .known_competitors
        .iter()
        .map(|name| (normalize(name), name.trim()))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    let mut result = Classification {
        org_name: org.display_name().to_string(),
        ..Default::default()
    };
    let mut competitor_index: HashMap<String, usize> = HashMap::new();
    let mut next_rank = 0;

    for mention in mentions {
        if org.owns(mention) {
            if result.org_first_rank.is_none() {
                result.org_first_rank = Some(next_rank);
                next_rank += 1;
                let name = match &mention.matched_entry {
                    Some(entry) if entry.is_org_brand => entry.name.clone(),
                    _ if !org.display_name().is_empty() => org.display_name().to_string(),
                    _ => mention.raw_text.clone(),
                };
                result.brands_mentioned.push(name);
            }
            result.org_mentions.push(mention.clone());
            continue;
        }

        let key = match &mention.matched_entry {
            Some(entry) => normalize(&entry.name),
            None => mention.normalized_text.clone(),
        };
        result.competitor_mentions.push(mention.clone());

        if let Some(&idx) = competitor_index.get(&key) {
            result.competitors[idx].occurrences += 1;
            continue;
        }

        let rank = next_rank;
        next_rank += 1;
        let name = match (&mention.matched_entry, known.get(&key)) {
            (Some(entry), _) => entry.name.clone(),
            (None, Some(display)) => (*display).to_string(),
            (None, None) => mention.raw_text.clone(),
        };
        result.brands_mentioned.push(name.clone());
        competitor_index.insert(key.clone(), result.competitors.len());
        result.competitors.push(Competitor {
            name,
            normalized: key,
            occurrences: 1,
            first_rank: Some(rank),
            in_catalog: mention.matched_entry.is_some(),
            grounded: true,
        });
    }

    if options.include_unmentioned_known {
        for name in &options.known_competitors {
            let key = normalize(name);
            if key.is_empty() || org.matches(&key) || competitor_index.contains_key(&key) {
                continue;
            }
            competitor_index.insert(key.clone(), result.competitors.len());
            result.competitors.push(Competitor {
                name: name.trim().to_string(),
                normalized: key,
                occurrences: 0,
                first_rank: None,
                in_catalog: false,
                grounded: false,
            });
        }
    }

    result
}
