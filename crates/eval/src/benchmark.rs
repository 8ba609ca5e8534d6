//! Scenario files for `eval benchmark`.
//!
//! ```json
//! {
//!   "catalog": [{"name": "Acme Corp", "is_org_brand": true}],
//!   "cases": [{
//!     "name": "org alone",
//!     "prompt": "best helpdesk",
//!     "response": "We recommend Acme Corp.",
//!     "org": "Acme Corp",
//!     "expect": {"org_present": true, "position": 0, "competitors": [], "score": 8}
//!   }]
//! }
//! ```

use brandlens_model::{AnalysisError, AnalysisRequest, AnalysisResult, BrandCatalogEntry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BenchmarkFile {
    #[serde(default)]
    pub catalog: Vec<BrandCatalogEntry>,
    pub cases: Vec<BenchmarkCase>,
}

#[derive(Debug, Deserialize)]
pub struct BenchmarkCase {
    pub name: String,
    pub prompt: String,
    pub response: String,
    pub org: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub expect: Expectation,
}

impl BenchmarkCase {
    pub fn request(&self) -> AnalysisRequest {
        AnalysisRequest::new(&self.response, &self.prompt, &self.org).with_aliases(self.aliases.clone())
    }
}

/// Expected outcome; unset fields are not checked.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Expectation {
    pub org_present: Option<bool>,
    pub position: Option<usize>,
    pub competitors: Option<Vec<String>>,
    pub score: Option<f32>,
    /// Debug name of the expected input error, e.g. `EmptyResponse`
    pub error: Option<String>,
}

/// Every way `outcome` differs from `expect`. Empty means the case passed.
pub fn check(outcome: &Result<AnalysisResult, AnalysisError>, expect: &Expectation) -> Vec<String> {
    let result = match (outcome, &expect.error) {
        (Err(err), Some(expected)) if format!("{err:?}") == *expected => return Vec::new(),
        (Err(err), _) => return vec![format!("unexpected error: {err}")],
        (Ok(_), Some(expected)) => return vec![format!("expected error {expected}, got a result")],
        (Ok(result), None) => result,
    };

    let mut failures = Vec::new();
    if let Some(present) = expect.org_present {
        if result.org_brand_present != present {
            failures.push(format!(
                "org_present: expected {present}, got {}",
                result.org_brand_present
            ));
        }
    }
    if let Some(position) = expect.position {
        if result.org_brand_position != Some(position) {
            failures.push(format!(
                "position: expected {position}, got {:?}",
                result.org_brand_position
            ));
        }
    }
    if let Some(competitors) = &expect.competitors {
        let actual = result.competitor_names();
        if actual != *competitors {
            failures.push(format!("competitors: expected {competitors:?}, got {actual:?}"));
        }
    }
    if let Some(score) = expect.score {
        if (result.score - score).abs() > f32::EPSILON {
            failures.push(format!("score: expected {score}, got {}", result.score));
        }
    }
    failures
}
