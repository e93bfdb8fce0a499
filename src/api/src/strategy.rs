//! Selection strategies: pick one horse per race.
//!
//! Every strategy works on a single race's candidates and a bet type. The bet
//! type decides which odds column (`win_dividend1` or `place_odds`) and which
//! rate columns (`*_top1` or `*_top3`) are used. Ties and empty filters are
//! resolved with a uniform draw from the injected random source.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::{DataQualityWarning, Diagnostics};
use crate::types::{BettingType, Entity, RaceGroup, RaceRecord, ScoreColumn};

/// Inclusive `[min, max]` range. NaN is never inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Default odds band: `[1, inf]`
    pub fn odds() -> Self {
        Self::new(default_min_odds(), default_max_odds())
    }

    /// Default rate band: `[0, 1]`
    pub fn rate() -> Self {
        Self::new(default_min_rate(), default_max_rate())
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

fn default_min_odds() -> f64 {
    1.0
}

fn default_max_odds() -> f64 {
    f64::INFINITY
}

fn default_min_rate() -> f64 {
    0.0
}

fn default_max_rate() -> f64 {
    1.0
}

fn default_entity() -> Entity {
    Entity::Jockey
}

fn default_rate_range() -> ValueRange {
    ValueRange::rate()
}

fn default_odds_range() -> ValueRange {
    ValueRange::odds()
}

fn default_alpha() -> f64 {
    0.65
}

fn default_beta() -> f64 {
    0.25
}

fn default_gamma() -> f64 {
    0.10
}

fn default_score_rank() -> usize {
    3
}

/// The closed set of selection policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    /// Uniform pick over the race
    Random,
    /// Odds inside `[min, max]`
    OddsRange {
        #[serde(default = "default_min_odds")]
        min: f64,
        #[serde(default = "default_max_odds")]
        max: f64,
    },
    /// Favourite: lowest odds
    MinOdds,
    /// Longest shot: highest odds
    MaxOdds,
    /// Entity rate inside `[min, max]`
    WinRateRange {
        #[serde(default = "default_entity")]
        entity: Entity,
        #[serde(default = "default_min_rate")]
        min: f64,
        #[serde(default = "default_max_rate")]
        max: f64,
    },
    /// Highest entity rate
    MaxWinRate {
        #[serde(default = "default_entity")]
        entity: Entity,
    },
    /// Filter by rate and odds bands, then maximize `rate * odds`
    CompositeScore {
        #[serde(default = "default_entity")]
        entity: Entity,
        #[serde(default = "default_rate_range")]
        rate: ValueRange,
        #[serde(default = "default_odds_range")]
        odds: ValueRange,
    },
    /// `(alpha * horse + beta * jockey) * gamma * odds`, banded at `score_rank`
    Combined {
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_beta")]
        beta: f64,
        #[serde(default = "default_gamma")]
        gamma: f64,
        /// Which distinct score to select: 1 = highest, 3 = third highest
        #[serde(default = "default_score_rank")]
        score_rank: usize,
    },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::combined(0.75, 0.25, 0.10)
    }
}

/// The horse a strategy picked for one race.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// Position inside the race group
    pub index: usize,
    pub record: &'a RaceRecord,
    /// True when the filter matched nobody and the pick was over the full race
    pub fallback: bool,
}

impl Strategy {
    pub fn odds_range(min: f64, max: f64) -> Self {
        Strategy::OddsRange { min, max }
    }

    pub fn win_rate_range(entity: Entity, min: f64, max: f64) -> Self {
        Strategy::WinRateRange { entity, min, max }
    }

    pub fn composite(entity: Entity, rate: ValueRange, odds: ValueRange) -> Self {
        Strategy::CompositeScore { entity, rate, odds }
    }

    pub fn combined(alpha: f64, beta: f64, gamma: f64) -> Self {
        Strategy::Combined {
            alpha,
            beta,
            gamma,
            score_rank: default_score_rank(),
        }
    }

    /// The strategies the sweep command runs, in report order.
    pub fn catalog() -> Vec<Strategy> {
        vec![
            Strategy::Random,
            Strategy::odds_range(2.0, 5.0),
            Strategy::MinOdds,
            Strategy::MaxOdds,
            Strategy::win_rate_range(Entity::Jockey, 0.0, 1.0),
            Strategy::MaxWinRate {
                entity: Entity::Jockey,
            },
            Strategy::MaxWinRate {
                entity: Entity::Horse,
            },
            Strategy::composite(Entity::Horse, ValueRange::rate(), ValueRange::odds()),
            Strategy::composite(Entity::Jockey, ValueRange::rate(), ValueRange::odds()),
            Strategy::default(),
        ]
    }

    /// Pick exactly one record from `race`.
    pub fn select<'a, R: Rng + ?Sized>(
        &self,
        race: &'a RaceGroup,
        betting_type: BettingType,
        rng: &mut R,
        diagnostics: &mut Diagnostics,
    ) -> Selection<'a> {
        let records = race.records();
        let odds = betting_type.odds_column();

        let candidates = match self {
            Strategy::Random => return pick_any(race, rng),
            Strategy::OddsRange { min, max } => {
                let range = ValueRange::new(*min, *max);
                matching(records, |r| range.contains(column_value(r, odds)))
            }
            Strategy::MinOdds => extremal(records, odds, Extreme::Min),
            Strategy::MaxOdds => extremal(records, odds, Extreme::Max),
            Strategy::WinRateRange { entity, min, max } => {
                let column = betting_type.rate_column(*entity);
                let range = ValueRange::new(*min, *max);
                matching(records, |r| range.contains(column_value(r, column)))
            }
            Strategy::MaxWinRate { entity } => {
                extremal(records, betting_type.rate_column(*entity), Extreme::Max)
            }
            Strategy::CompositeScore { entity, rate, odds: odds_range } => {
                let rate_column = betting_type.rate_column(*entity);
                composite_candidates(records, rate_column, *rate, odds, *odds_range)
            }
            Strategy::Combined {
                alpha,
                beta,
                gamma,
                score_rank,
            } => {
                let weights = [*alpha, *beta, *gamma];
                return select_combined(race, betting_type, weights, *score_rank, rng, diagnostics);
            }
        };

        if candidates.is_empty() {
            diagnostics.record_fallback();
            let mut selection = pick_any(race, rng);
            selection.fallback = true;
            return selection;
        }

        pick_from(race, &candidates, rng)
    }

    /// Short label for reports.
    pub fn label(&self) -> String {
        match self {
            Strategy::Random => "random".to_string(),
            Strategy::OddsRange { min, max } => {
                format!("odds_range{}", ValueRange::new(*min, *max))
            }
            Strategy::MinOdds => "min_odds".to_string(),
            Strategy::MaxOdds => "max_odds".to_string(),
            Strategy::WinRateRange { entity, min, max } => {
                format!("{}_rate_range{}", entity, ValueRange::new(*min, *max))
            }
            Strategy::MaxWinRate { entity } => format!("max_{}_rate", entity),
            Strategy::CompositeScore { entity, .. } => format!("{}_odds_composite", entity),
            Strategy::Combined {
                alpha,
                beta,
                gamma,
                score_rank,
            } => format!(
                "combined({:.2},{:.2},{:.2})@{}",
                alpha, beta, gamma, score_rank
            ),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Did the selected horse cash under `betting_type`?
pub fn evaluate(record: &RaceRecord, betting_type: BettingType) -> bool {
    match betting_type {
        BettingType::Win => record.is_win(),
        BettingType::Place => record.placed(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

/// Missing rate columns read as NaN, so they match no filter.
fn column_value(record: &RaceRecord, column: ScoreColumn) -> f64 {
    record.value(column).unwrap_or(f64::NAN)
}

fn matching<F>(records: &[RaceRecord], keep: F) -> Vec<usize>
where
    F: Fn(&RaceRecord) -> bool,
{
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| keep(*r))
        .map(|(i, _)| i)
        .collect()
}

/// Indices whose value equals the group extreme, ignoring NaN.
fn extremal(records: &[RaceRecord], column: ScoreColumn, extreme: Extreme) -> Vec<usize> {
    let values: Vec<f64> = records.iter().map(|r| column_value(r, column)).collect();
    best_indices(&values, extreme)
}

fn best_indices(values: &[f64], extreme: Extreme) -> Vec<usize> {
    let target = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(|a, b| match extreme {
            Extreme::Min => a.min(b),
            Extreme::Max => a.max(b),
        });

    match target {
        Some(target) => values
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == target)
            .map(|(i, _)| i)
            .collect(),
        None => Vec::new(),
    }
}

fn composite_candidates(
    records: &[RaceRecord],
    rate_column: ScoreColumn,
    rate_range: ValueRange,
    odds_column: ScoreColumn,
    odds_range: ValueRange,
) -> Vec<usize> {
    let filtered = matching(records, |r| {
        rate_range.contains(column_value(r, rate_column))
            && odds_range.contains(column_value(r, odds_column))
    });
    if filtered.is_empty() {
        return filtered;
    }

    let scores: Vec<f64> = filtered
        .iter()
        .map(|&i| column_value(&records[i], rate_column) * column_value(&records[i], odds_column))
        .collect();

    let best = best_indices(&scores, Extreme::Max);
    if best.is_empty() {
        // every score was NaN (0 * inf): any filtered horse will do
        return filtered;
    }
    best.into_iter().map(|k| filtered[k]).collect()
}

fn select_combined<'a, R: Rng + ?Sized>(
    race: &'a RaceGroup,
    betting_type: BettingType,
    [alpha, beta, gamma]: [f64; 3],
    score_rank: usize,
    rng: &mut R,
    diagnostics: &mut Diagnostics,
) -> Selection<'a> {
    let records = race.records();
    let horse = betting_type.rate_column(Entity::Horse);
    let jockey = betting_type.rate_column(Entity::Jockey);
    let odds = betting_type.odds_column();
    let required = [horse, jockey, odds];

    let missing: Vec<&'static str> = required
        .iter()
        .filter(|&&c| records.iter().any(|r| r.value(c).is_none()))
        .map(|c| c.name())
        .collect();
    if !missing.is_empty() {
        diagnostics.report(DataQualityWarning::MissingColumns {
            race_id: race.race_id().to_string(),
            columns: missing,
        });
        let mut selection = pick_any(race, rng);
        selection.fallback = true;
        return selection;
    }

    let nan_columns: Vec<&'static str> = required
        .iter()
        .filter(|&&c| records.iter().any(|r| column_value(r, c).is_nan()))
        .map(|c| c.name())
        .collect();
    if !nan_columns.is_empty() {
        diagnostics.report(DataQualityWarning::NanValues {
            race_id: race.race_id().to_string(),
            columns: nan_columns,
        });
    }

    let sanitized = |r: &RaceRecord, c: ScoreColumn| {
        let v = column_value(r, c);
        if v.is_nan() {
            0.0
        } else {
            v
        }
    };

    let mut scores: Vec<f64> = records
        .iter()
        .map(|r| (alpha * sanitized(r, horse) + beta * sanitized(r, jockey)) * gamma * sanitized(r, odds))
        .collect();

    if scores.iter().any(|s| !s.is_finite()) {
        diagnostics.report(DataQualityWarning::InfiniteScore {
            race_id: race.race_id().to_string(),
        });
        for score in scores.iter_mut().filter(|s| !s.is_finite()) {
            *score = 0.0;
        }
    }

    // Distinct scores, highest first. The band is the `score_rank`-th of them,
    // or the lowest one when the race has fewer distinct scores.
    let mut distinct = scores.clone();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup();
    let rank = score_rank.clamp(1, distinct.len());
    let threshold = distinct[rank - 1];

    let band: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, &s)| s == threshold)
        .map(|(i, _)| i)
        .collect();

    pick_from(race, &band, rng)
}

fn pick_any<'a, R: Rng + ?Sized>(race: &'a RaceGroup, rng: &mut R) -> Selection<'a> {
    let index = rng.random_range(0..race.len());
    Selection {
        index,
        record: &race.records()[index],
        fallback: false,
    }
}

fn pick_from<'a, R: Rng + ?Sized>(
    race: &'a RaceGroup,
    candidates: &[usize],
    rng: &mut R,
) -> Selection<'a> {
    let index = candidates[rng.random_range(0..candidates.len())];
    Selection {
        index,
        record: &race.records()[index],
        fallback: false,
    }
}
