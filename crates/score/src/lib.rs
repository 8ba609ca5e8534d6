//! Visibility scoring for one analyzed response.
//!
//! The score is a pure function of org presence, the org's distinct-name
//! rank, and the number of competitors named:
//!
//! ```text
//! absent:   score = min
//! present:  score = clamp(base_presence + prominence_bonus(rank) - penalty(competitors), min, max)
//! ```
//!
//! With the default table (`min` 1, `max` 10, base 5, flat bonus 3,
//! penalty 1 from two competitors and 2 from four):
//!
//! | Org present | Competitors | Score |
//! |-------------|-------------|-------|
//! | no          | any         | 1     |
//! | yes         | 0–1         | 8     |
//! | yes         | 2–3         | 7     |
//! | yes         | 4+          | 6     |

use brandlens_model::ScoreBreakdown;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreTableError {
    #[error("Score range is empty: min {min} > max {max}")]
    InvalidRange { min: f32, max: f32 },
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),
    #[error("{0} must not be negative")]
    Negative(&'static str),
    #[error("Rank-scaled floor {floor} exceeds presence bonus {bonus}")]
    FloorAboveBonus { floor: f32, bonus: f32 },
}

/// How the presence bonus depends on where the org was named.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Prominence {
    /// Full bonus whenever the org is present
    Flat,
    /// `presence_bonus / (rank + 1)`, never below `floor`
    RankScaled { floor: f32 },
}

/// Penalty applied once `min_competitors` competitors are named.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenaltyStep {
    pub min_competitors: usize,
    pub penalty: f32,
}

/// Scoring constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTable {
    pub min: f32,
    pub max: f32,
    /// Starting value when the org is present
    pub base_presence: f32,
    /// Bonus for being present at all
    pub presence_bonus: f32,
    pub prominence: Prominence,
    /// Competitor-density steps; the largest applicable penalty is used
    pub penalties: Vec<PenaltyStep>,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 10.0,
            base_presence: 5.0,
            presence_bonus: 3.0,
            prominence: Prominence::Flat,
            penalties: vec![
                PenaltyStep {
                    min_competitors: 2,
                    penalty: 1.0,
                },
                PenaltyStep {
                    min_competitors: 4,
                    penalty: 2.0,
                },
            ],
        }
    }
}

impl ScoreTable {
    /// Check the table can produce a bounded, monotonic score.
    pub fn validate(&self) -> Result<(), ScoreTableError> {
        let finite = [
            ("min", self.min),
            ("max", self.max),
            ("base_presence", self.base_presence),
            ("presence_bonus", self.presence_bonus),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(ScoreTableError::NonFinite(field));
            }
        }
        if self.min > self.max {
            return Err(ScoreTableError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        if self.presence_bonus < 0.0 {
            return Err(ScoreTableError::Negative("presence_bonus"));
        }
        if let Prominence::RankScaled { floor } = self.prominence {
            if !floor.is_finite() {
                return Err(ScoreTableError::NonFinite("prominence floor"));
            }
            if floor < 0.0 {
                return Err(ScoreTableError::Negative("prominence floor"));
            }
            if floor > self.presence_bonus {
                return Err(ScoreTableError::FloorAboveBonus {
                    floor,
                    bonus: self.presence_bonus,
                });
            }
        }
        for step in &self.penalties {
            if !step.penalty.is_finite() {
                return Err(ScoreTableError::NonFinite("penalty"));
            }
            if step.penalty < 0.0 {
                return Err(ScoreTableError::Negative("penalty"));
            }
        }
        Ok(())
    }

    /// Bonus for an org first named at `rank` (None: rank unknown, full bonus).
    pub fn prominence_bonus(&self, rank: Option<usize>) -> f32 {
        match (self.prominence, rank) {
            (Prominence::Flat, _) | (Prominence::RankScaled { .. }, None) => self.presence_bonus,
            (Prominence::RankScaled { floor }, Some(rank)) => {
                #[allow(clippy::cast_precision_loss)]
                let scaled = self.presence_bonus / (rank as f32 + 1.0);
                scaled.max(floor)
            }
        }
    }

    /// Largest penalty whose threshold `competitor_count` reaches.
    pub fn competitor_penalty(&self, competitor_count: usize) -> f32 {
        self.penalties
            .iter()
            .filter(|step| competitor_count >= step.min_competitors)
            .map(|step| step.penalty)
            .fold(0.0_f32, f32::max)
    }

    fn bounded(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        value.max(self.min).min(self.max)
    }
}

/// Compute the visibility score and how it was reached.
pub fn visibility_score(
    org_present: bool,
    org_first_rank: Option<usize>,
    competitor_count: usize,
    table: &ScoreTable,
) -> ScoreBreakdown {
    if !org_present {
        let score = table.bounded(table.min);
        return ScoreBreakdown {
            unclamped: table.min,
            score,
            ..Default::default()
        };
    }

    let prominence_bonus = table.prominence_bonus(org_first_rank);
    let competitor_penalty = table.competitor_penalty(competitor_count);
    let unclamped = table.base_presence + prominence_bonus - competitor_penalty;

    ScoreBreakdown {
        base: table.base_presence,
        prominence_bonus,
        competitor_penalty,
        unclamped,
        score: table.bounded(unclamped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(present: bool, rank: Option<usize>, competitors: usize) -> f32 {
        visibility_score(present, rank, competitors, &ScoreTable::default()).score
    }

    #[test]
    fn test_default_table_steps() {
        assert_eq!(score(false, None, 0), 1.0);
        assert_eq!(score(false, None, 9), 1.0);
        assert_eq!(score(true, Some(0), 0), 8.0);
        assert_eq!(score(true, Some(0), 1), 8.0);
        assert_eq!(score(true, Some(0), 2), 7.0);
        assert_eq!(score(true, Some(3), 3), 7.0);
        assert_eq!(score(true, Some(0), 4), 6.0);
        assert_eq!(score(true, Some(0), 40), 6.0);
    }

    #[test]
    fn test_breakdown_components() {
        let breakdown = visibility_score(true, Some(1), 3, &ScoreTable::default());
        assert_eq!(breakdown.base, 5.0);
        assert_eq!(breakdown.prominence_bonus, 3.0);
        assert_eq!(breakdown.competitor_penalty, 1.0);
        assert_eq!(breakdown.unclamped, 7.0);
        assert_eq!(breakdown.score, 7.0);
    }

    #[test]
    fn test_rank_scaled_is_monotonic() {
        let table = ScoreTable {
            prominence: Prominence::RankScaled { floor: 0.5 },
            ..Default::default()
        };
        let scores: Vec<f32> = (0..10)
            .map(|rank| visibility_score(true, Some(rank), 2, &table).score)
            .collect();
        assert_eq!(scores[0], 7.0);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
        assert_eq!(scores[9], 4.5);
    }

    #[test]
    fn test_unsorted_penalties_stay_monotonic() {
        let table = ScoreTable {
            penalties: vec![
                PenaltyStep { min_competitors: 5, penalty: 1.0 },
                PenaltyStep { min_competitors: 2, penalty: 3.0 },
            ],
            ..Default::default()
        };
        assert_eq!(table.competitor_penalty(1), 0.0);
        assert_eq!(table.competitor_penalty(2), 3.0);
        assert_eq!(table.competitor_penalty(6), 3.0);
    }

    #[test]
    fn test_clamps_to_range() {
        let table = ScoreTable {
            base_presence: 50.0,
            ..Default::default()
        };
        assert_eq!(visibility_score(true, Some(0), 0, &table).score, 10.0);

        let table = ScoreTable {
            base_presence: -50.0,
            ..Default::default()
        };
        assert_eq!(visibility_score(true, Some(0), 0, &table).score, 1.0);
    }

    #[test]
    fn test_validate() {
        assert!(ScoreTable::default().validate().is_ok());
        let inverted = ScoreTable {
            min: 10.0,
            max: 1.0,
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(ScoreTableError::InvalidRange { .. })));
        let negative = ScoreTable {
            penalties: vec![PenaltyStep { min_competitors: 1, penalty: -1.0 }],
            ..Default::default()
        };
        assert_eq!(negative.validate(), Err(ScoreTableError::Negative("penalty")));
        let floor = ScoreTable {
            prominence: Prominence::RankScaled { floor: 4.0 },
            ..Default::default()
        };
        assert!(matches!(floor.validate(), Err(ScoreTableError::FloorAboveBonus { .. })));
    }

    #[test]
    fn test_table_deserializes_partial() {
        let table: ScoreTable =
            serde_json::from_str(r#"{"presence_bonus": 2, "prominence": {"mode": "rank_scaled", "floor": 1}}"#)
                .unwrap();
        assert_eq!(table.presence_bonus, 2.0);
        assert_eq!(table.prominence, Prominence::RankScaled { floor: 1.0 });
        assert_eq!(table.max, 10.0);
    }
}
