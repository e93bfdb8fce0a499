//! Rolling horse and jockey performance features.
//!
//! For each record the engine looks at the same horse (or jockey) over its
//! previous N races and computes the share of wins (top1) and of top-3
//! finishes (top3). The current race never contributes to its own rate.
//! Each rate column is then standardized across the whole table.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::ConfigurationError;
use crate::types::{columns, Entity, RaceRecord, RaceTable, RollingRates};

/// Number of previous races in the rolling window
pub const DEFAULT_WINDOW: usize = 10;

/// How races on the same date as the current one are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameDayPolicy {
    /// Only races on earlier dates count as history.
    #[default]
    StrictlyEarlier,
    /// Earlier rows on the same date count as history (stable row order).
    Sequential,
}

/// Computes leakage-free, normalized rolling rates.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    window: usize,
    same_day: SameDayPolicy,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            same_day: SameDayPolicy::default(),
        }
    }
}

impl FeatureEngine {
    pub fn new(window: usize) -> Result<Self, ConfigurationError> {
        if window == 0 {
            return Err(ConfigurationError::InvalidWindow(window));
        }
        Ok(Self {
            window,
            same_day: SameDayPolicy::default(),
        })
    }

    pub fn with_same_day_policy(mut self, same_day: SameDayPolicy) -> Self {
        self.same_day = same_day;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Add normalized horse and jockey rates to every record.
    pub fn apply(&self, table: &mut RaceTable) -> Result<(), ConfigurationError> {
        for entity in Entity::ALL {
            self.add_entity_rates(table, entity)?;
        }
        Ok(())
    }

    /// Add the normalized `{entity}_win_rate_top1/top3` columns.
    pub fn add_entity_rates(
        &self,
        table: &mut RaceTable,
        entity: Entity,
    ) -> Result<(), ConfigurationError> {
        table.require_column(entity.id_column())?;
        table.require_column(columns::DATE)?;
        table.require_column(columns::RESULT)?;

        let raw = self.rolling_rates(table.records(), entity);
        let mut top1: Vec<f64> = raw.iter().map(|r| r.top1).collect();
        let mut top3: Vec<f64> = raw.iter().map(|r| r.top3).collect();
        normalize(&mut top1);
        normalize(&mut top3);

        for (record, (top1, top3)) in table
            .records_mut()
            .iter_mut()
            .zip(top1.into_iter().zip(top3))
        {
            record.set_rates(entity, RollingRates { top1, top3 });
        }
        for name in entity.rate_columns() {
            table.add_column(name);
        }

        info!(
            entity = entity.name(),
            window = self.window,
            rows = table.len(),
            "Added rolling win rates"
        );
        Ok(())
    }

    /// Raw (un-normalized) rates for every record, in table row order.
    pub fn rolling_rates(&self, records: &[RaceRecord], entity: Entity) -> Vec<RollingRates> {
        // entity id -> row indices, in table order
        let mut histories: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            let id = record.entity_id(entity);
            if id.is_empty() {
                continue;
            }
            histories.entry(id).or_default().push(i);
        }

        debug!(
            entity = entity.name(),
            entities = histories.len(),
            "Computing rolling rates"
        );

        let histories: Vec<Vec<usize>> = histories.into_values().collect();
        let computed: Vec<Vec<(usize, RollingRates)>> = histories
            .into_par_iter()
            .map(|mut rows| {
                // Stable sort: same-date rows keep their table order
                rows.sort_by_key(|&i| records[i].date);
                self.history_rates(records, &rows)
            })
            .collect();

        let mut rates = vec![RollingRates::default(); records.len()];
        for (row, rate) in computed.into_iter().flatten() {
            rates[row] = rate;
        }
        rates
    }

    /// Rates along one entity's date-ordered history.
    fn history_rates(&self, records: &[RaceRecord], rows: &[usize]) -> Vec<(usize, RollingRates)> {
        let mut out = Vec::with_capacity(rows.len());
        let mut day_start = 0;

        for (pos, &row) in rows.iter().enumerate() {
            if pos > 0 && records[rows[pos - 1]].date != records[row].date {
                day_start = pos;
            }

            let end = match self.same_day {
                SameDayPolicy::StrictlyEarlier => day_start,
                SameDayPolicy::Sequential => pos,
            };
            let start = end.saturating_sub(self.window);

            out.push((row, window_rates(records, &rows[start..end])));
        }

        out
    }
}

/// Share of wins and places in a window; an empty window rates 0.
fn window_rates(records: &[RaceRecord], window: &[usize]) -> RollingRates {
    if window.is_empty() {
        return RollingRates::default();
    }

    let count = window.len() as f64;
    let wins = window.iter().filter(|&&i| records[i].is_win()).count() as f64;
    let places = window.iter().filter(|&&i| records[i].placed()).count() as f64;

    RollingRates {
        top1: wins / count,
        top3: places / count,
    }
}

/// Standardize in place: `(x - mean) / std` with the sample standard deviation.
///
/// A column with zero deviation (or fewer than two values) is only centered.
pub fn normalize(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let std = if values.len() > 1 {
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    for value in values.iter_mut() {
        *value = if std == 0.0 {
            *value - mean
        } else {
            (*value - mean) / std
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
    }

    fn ride(race: &str, horse: &str, jockey: &str, day: u32, result: u32) -> RaceRecord {
        RaceRecord::new(race, horse, jockey, date(day), result)
    }

    fn engine(window: usize) -> FeatureEngine {
        FeatureEngine::new(window).unwrap()
    }

    #[test]
    fn test_first_record_has_zero_rates() {
        let records = vec![ride("R1", "H1", "J1", 1, 1), ride("R1", "H2", "J2", 1, 2)];
        let rates = engine(10).rolling_rates(&records, Entity::Horse);

        for rate in rates {
            assert_eq!(rate.top1, 0.0);
            assert_eq!(rate.top3, 0.0);
        }
    }

    #[test]
    fn test_rolling_rates_use_prior_races_only() {
        // H1 finishes 1, 4, 2, 1 on consecutive days
        let records = vec![
            ride("R1", "H1", "J1", 1, 1),
            ride("R2", "H1", "J1", 2, 4),
            ride("R3", "H1", "J1", 3, 2),
            ride("R4", "H1", "J1", 4, 1),
        ];
        let rates = engine(10).rolling_rates(&records, Entity::Horse);

        assert_eq!(rates[0], RollingRates { top1: 0.0, top3: 0.0 });
        assert_eq!(rates[1], RollingRates { top1: 1.0, top3: 1.0 });
        assert_eq!(rates[2], RollingRates { top1: 0.5, top3: 0.5 });
        assert!((rates[3].top1 - 1.0 / 3.0).abs() < 1e-12);
        assert!((rates[3].top3 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_limits_history() {
        let records = vec![
            ride("R1", "H1", "J1", 1, 1),
            ride("R2", "H1", "J1", 2, 5),
            ride("R3", "H1", "J1", 3, 5),
            ride("R4", "H1", "J1", 4, 5),
        ];
        let rates = engine(2).rolling_rates(&records, Entity::Horse);

        // R3 sees R1 and R2, R4 only sees R2 and R3
        assert_eq!(rates[2].top1, 0.5);
        assert_eq!(rates[3].top1, 0.0);
    }

    #[test]
    fn test_history_sorted_by_date_not_row_order() {
        let records = vec![
            ride("R3", "H1", "J1", 3, 5),
            ride("R1", "H1", "J1", 1, 1),
            ride("R2", "H1", "J1", 2, 5),
        ];
        let rates = engine(10).rolling_rates(&records, Entity::Horse);

        assert_eq!(rates[1].top1, 0.0);
        assert_eq!(rates[2].top1, 1.0);
        assert_eq!(rates[0].top1, 0.5);
    }

    #[test]
    fn test_current_result_does_not_leak() {
        let mut records = vec![
            ride("R1", "H1", "J1", 1, 3),
            ride("R2", "H1", "J1", 2, 6),
            ride("R3", "H1", "J1", 3, 1),
        ];
        let before = engine(10).rolling_rates(&records, Entity::Horse);

        records[1].result = 1;
        let after = engine(10).rolling_rates(&records, Entity::Horse);

        assert_eq!(before[1], after[1]);
        assert_eq!(before[0], after[0]);
        assert_ne!(before[2], after[2]);
    }

    #[test]
    fn test_same_day_rides_strictly_earlier() {
        // J1 rides twice on day 2
        let records = vec![
            ride("R1", "H1", "J1", 1, 1),
            ride("R2", "H2", "J1", 2, 1),
            ride("R3", "H3", "J1", 2, 7),
        ];
        let rates = engine(10).rolling_rates(&records, Entity::Jockey);

        assert_eq!(rates[1], rates[2]);
        assert_eq!(rates[2].top1, 1.0);
    }

    #[test]
    fn test_same_day_rides_sequential() {
        let records = vec![
            ride("R1", "H1", "J1", 1, 1),
            ride("R2", "H2", "J1", 2, 4),
            ride("R3", "H3", "J1", 2, 7),
        ];
        let rates = engine(10)
            .with_same_day_policy(SameDayPolicy::Sequential)
            .rolling_rates(&records, Entity::Jockey);

        assert_eq!(rates[1].top1, 1.0);
        // R3 follows R2 in row order, so R2's loss is history
        assert_eq!(rates[2].top1, 0.5);
    }

    #[test]
    fn test_missing_entity_id_has_no_history() {
        let records = vec![ride("R1", "", "J1", 1, 1), ride("R2", "", "J1", 2, 1)];
        let rates = engine(10).rolling_rates(&records, Entity::Horse);
        assert_eq!(rates[1].top1, 0.0);
    }

    #[test]
    fn test_normalize_unit_variance() {
        let mut values = vec![0.0, 0.1, 0.4, 0.5, 1.0];
        normalize(&mut values);

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();

        assert!(mean.abs() < 1e-9);
        assert!((std - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_zero_variance_only_centers() {
        let mut values = vec![0.3, 0.3, 0.3];
        normalize(&mut values);
        for v in values {
            assert!(v.abs() < 1e-12);
        }

        let mut single = vec![0.7];
        normalize(&mut single);
        assert_eq!(single, vec![0.0]);
    }

    #[test]
    fn test_apply_adds_columns() {
        let records = vec![
            ride("R1", "H1", "J1", 1, 1),
            ride("R1", "H2", "J2", 1, 2),
            ride("R2", "H1", "J2", 2, 3),
            ride("R2", "H2", "J1", 2, 1),
        ];
        let mut table = RaceTable::from_records(records);
        engine(10).apply(&mut table).unwrap();

        assert!(table.has_column("horse_win_rate_top1"));
        assert!(table.has_column("jockey_win_rate_top3"));
        assert!(table
            .records()
            .iter()
            .all(|r| r.horse_rates.is_some() && r.jockey_rates.is_some()));

        let top1_sum: f64 = table
            .records()
            .iter()
            .map(|r| r.horse_rates.unwrap().top1)
            .sum();
        assert!(top1_sum.abs() < 1e-9);
    }

    #[test]
    fn test_missing_id_column_is_configuration_error() {
        let records = vec![ride("R1", "H1", "J1", 1, 1)];
        let mut table = RaceTable::new(records, ["race_id", "horse_id", "date", "result"]);

        let err = engine(10).apply(&mut table).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingColumn("jockey_id".to_string()));
    }

    #[test]
    fn test_zero_window_rejected() {
        assert_eq!(
            FeatureEngine::new(0).unwrap_err(),
            ConfigurationError::InvalidWindow(0)
        );
    }
}
