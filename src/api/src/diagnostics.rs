//! Data-quality reporting.
//!
//! Strategies and the simulator sanitize bad values in place and keep going.
//! What they sanitized is recorded here and returned with the summary instead
//! of being printed.

use serde::Serialize;
use std::fmt;

/// Number of concrete warnings kept verbatim; the rest are only counted.
const MAX_SAMPLES: usize = 20;

/// A recoverable data problem encountered while scoring a race.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    /// NaN values in scoring columns, replaced by 0
    NanValues {
        race_id: String,
        columns: Vec<&'static str>,
    },
    /// Non-finite score, replaced by 0
    InfiniteScore { race_id: String },
    /// Scoring columns not derived, fell back to a random pick
    MissingColumns {
        race_id: String,
        columns: Vec<&'static str>,
    },
    /// Winning pick without a usable dividend, paid as 1
    MissingDividend { race_id: String, column: &'static str },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::NanValues { race_id, columns } => {
                write!(f, "race {}: NaN values in {:?}", race_id, columns)
            }
            DataQualityWarning::InfiniteScore { race_id } => {
                write!(f, "race {}: infinite score", race_id)
            }
            DataQualityWarning::MissingColumns { race_id, columns } => {
                write!(f, "race {}: missing columns {:?}", race_id, columns)
            }
            DataQualityWarning::MissingDividend { race_id, column } => {
                write!(f, "race {}: missing {}", race_id, column)
            }
        }
    }
}

/// Counts of everything sanitized during a run, plus the first few warnings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub nan_values: usize,
    pub infinite_scores: usize,
    pub missing_columns: usize,
    pub missing_dividends: usize,
    /// Filters that matched nobody and fell back to the full race
    pub empty_filter_fallbacks: usize,
    pub samples: Vec<DataQualityWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, warning: DataQualityWarning) {
        match &warning {
            DataQualityWarning::NanValues { .. } => self.nan_values += 1,
            DataQualityWarning::InfiniteScore { .. } => self.infinite_scores += 1,
            DataQualityWarning::MissingColumns { .. } => self.missing_columns += 1,
            DataQualityWarning::MissingDividend { .. } => self.missing_dividends += 1,
        }
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(warning);
        }
    }

    pub fn record_fallback(&mut self) {
        self.empty_filter_fallbacks += 1;
    }

    /// Number of data-quality warnings (fallbacks are policy, not warnings).
    pub fn warning_count(&self) -> usize {
        self.nan_values + self.infinite_scores + self.missing_columns + self.missing_dividends
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count() > 0
    }

    /// Fold another trial's diagnostics into this one.
    pub fn merge(&mut self, other: Diagnostics) {
        self.nan_values += other.nan_values;
        self.infinite_scores += other.infinite_scores;
        self.missing_columns += other.missing_columns;
        self.missing_dividends += other.missing_dividends;
        self.empty_filter_fallbacks += other.empty_filter_fallbacks;

        let room = MAX_SAMPLES.saturating_sub(self.samples.len());
        self.samples.extend(other.samples.into_iter().take(room));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nan_warning(race_id: &str) -> DataQualityWarning {
        DataQualityWarning::NanValues {
            race_id: race_id.to_string(),
            columns: vec!["place_odds"],
        }
    }

    #[test]
    fn test_report_counts_by_kind() {
        let mut diag = Diagnostics::new();
        diag.report(nan_warning("R1"));
        diag.report(DataQualityWarning::InfiniteScore {
            race_id: "R2".to_string(),
        });
        diag.record_fallback();

        assert_eq!(diag.nan_values, 1);
        assert_eq!(diag.infinite_scores, 1);
        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.empty_filter_fallbacks, 1);
        assert_eq!(diag.samples.len(), 2);
    }

    #[test]
    fn test_samples_are_capped() {
        let mut diag = Diagnostics::new();
        for i in 0..(MAX_SAMPLES + 5) {
            diag.report(nan_warning(&format!("R{}", i)));
        }
        assert_eq!(diag.nan_values, MAX_SAMPLES + 5);
        assert_eq!(diag.samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn test_merge() {
        let mut a = Diagnostics::new();
        a.report(nan_warning("R1"));
        let mut b = Diagnostics::new();
        b.report(nan_warning("R2"));
        b.record_fallback();

        a.merge(b);
        assert_eq!(a.nan_values, 2);
        assert_eq!(a.empty_filter_fallbacks, 1);
        assert_eq!(a.samples.len(), 2);
        assert!(a.has_warnings());
    }

    #[test]
    fn test_warning_display() {
        let warning = DataQualityWarning::MissingDividend {
            race_id: "R9".to_string(),
            column: "place_dividend2",
        };
        assert_eq!(warning.to_string(), "race R9: missing place_dividend2");
    }
}
