//! Table and JSON rendering of simulation summaries.

use serde::Serialize;

use crate::simulation::SimulationSummary;

/// Several strategies run against the same data.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub summaries: Vec<SimulationSummary>,
}

impl SweepReport {
    /// Summaries ordered by mean profit, best first.
    pub fn ranked(&self) -> Vec<&SimulationSummary> {
        let mut ranked: Vec<&SimulationSummary> = self.summaries.iter().collect();
        ranked.sort_by(|a, b| b.mean.total_cmp(&a.mean));
        ranked
    }
}

pub fn format_summary_table(summary: &SimulationSummary) -> String {
    let mut out = String::new();
    out.push_str("=== Simulation Results ===\n\n");
    out.push_str(&format!("  Strategy:      {}\n", summary.strategy));
    out.push_str(&format!("  Bet Type:      {}\n", summary.betting_type));
    out.push_str(&format!("  Trials:        {}\n", summary.trials()));
    out.push_str(&format!("  Seed:          {}\n", summary.seed));
    out.push_str(&format!("  Avg Races:     {:.1}\n", summary.avg_races));
    out.push('\n');
    out.push_str("Profit per Trial:\n");
    out.push_str(&format!("  Mean:          {:.2}\n", summary.mean));
    out.push_str(&format!("  Std:           {:.2}\n", summary.std));
    out.push_str(&format!("  Min:           {:.2}\n", summary.min));
    out.push_str(&format!("  Max:           {:.2}\n", summary.max));
    out.push_str(&format!("  Sum:           {:.2}\n", summary.sum));
    out.push_str(&format!("  ROI:           {:.2}%\n", summary.roi() * 100.0));

    let diag = &summary.diagnostics;
    if diag.has_warnings() || diag.empty_filter_fallbacks > 0 {
        out.push('\n');
        out.push_str("Data Quality:\n");
        out.push_str(&format!("  NaN values:         {}\n", diag.nan_values));
        out.push_str(&format!("  Infinite scores:    {}\n", diag.infinite_scores));
        out.push_str(&format!("  Missing columns:    {}\n", diag.missing_columns));
        out.push_str(&format!("  Missing dividends:  {}\n", diag.missing_dividends));
        out.push_str(&format!("  Filter fallbacks:   {}\n", diag.empty_filter_fallbacks));
        for warning in &diag.samples {
            out.push_str(&format!("    - {}\n", warning));
        }
    }
    out
}

pub fn format_sweep_table(report: &SweepReport) -> String {
    let mut out = String::new();
    out.push_str("=== Strategy Sweep ===\n\n");
    out.push_str(&format!(
        "  {:32} {:>6} {:>10} {:>10} {:>10} {:>10} {:>9}\n",
        "Strategy", "Bet", "Mean", "Std", "Min", "Max", "ROI"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(93)));
    for summary in report.ranked() {
        out.push_str(&format!(
            "  {:32} {:>6} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>8.1}%\n",
            summary.strategy,
            summary.betting_type.name(),
            summary.mean,
            summary.std,
            summary.min,
            summary.max,
            summary.roi() * 100.0
        ));
    }
    out
}

pub fn print_summary_table(summary: &SimulationSummary) {
    print!("{}", format_summary_table(summary));
}

pub fn print_sweep_table(report: &SweepReport) {
    print!("{}", format_sweep_table(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{Simulation, SimulationConfig};
    use crate::strategy::Strategy;
    use crate::types::{BettingType, RaceGroup, RaceRecord};
    use chrono::NaiveDate;

    fn summary(strategy: Strategy) -> SimulationSummary {
        let date = NaiveDate::from_ymd_opt(2023, 6, 4).unwrap();
        let mut winner = RaceRecord::new("R1", "H1", "J1", date, 1);
        winner.win_dividend1 = 30.0;
        let mut loser = RaceRecord::new("R1", "H2", "J2", date, 2);
        loser.win_dividend1 = 30.0;
        let races = vec![RaceGroup::new("R1", vec![winner, loser]).unwrap()];

        Simulation::new(strategy, SimulationConfig::new(3, BettingType::Win))
            .unwrap()
            .run(&races)
            .unwrap()
    }

    #[test]
    fn test_summary_table_lists_statistics() {
        let table = format_summary_table(&summary(Strategy::Random));
        assert!(table.contains("Strategy:      random"));
        assert!(table.contains("Trials:        3"));
        assert!(table.contains("Mean:"));
        assert!(!table.contains("Data Quality"));
    }

    #[test]
    fn test_sweep_ranks_by_mean() {
        let mut best = summary(Strategy::Random);
        best.strategy = "best".to_string();
        best.mean = 5.0;
        let mut worst = summary(Strategy::Random);
        worst.strategy = "worst".to_string();
        worst.mean = -5.0;

        let report = SweepReport {
            summaries: vec![worst, best],
        };
        let ranked = report.ranked();
        assert_eq!(ranked[0].strategy, "best");

        let table = format_sweep_table(&report);
        let best_at = table.find("best").unwrap();
        let worst_at = table.find("worst").unwrap();
        assert!(best_at < worst_at);
    }

    #[test]
    fn test_sweep_json() {
        let report = SweepReport {
            summaries: vec![summary(Strategy::MinOdds)],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summaries"][0]["strategy"], "min_odds");
        assert_eq!(json["summaries"][0]["results"].as_array().unwrap().len(), 3);
    }
}
