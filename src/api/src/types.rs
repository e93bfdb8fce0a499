//! Core data types: race records, race groups, betting types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Column names of the race-history table.
pub mod columns {
    pub const RACE_ID: &str = "race_id";
    pub const HORSE_ID: &str = "horse_id";
    pub const JOCKEY_ID: &str = "jockey_id";
    pub const DATE: &str = "date";
    pub const RESULT: &str = "result";
    pub const WIN_ODDS: &str = "win_odds";
    pub const PLACE_ODDS: &str = "place_odds";
    pub const WIN_DIVIDEND1: &str = "win_dividend1";
    pub const PLACE_DIVIDENDS: [&str; 3] = ["place_dividend1", "place_dividend2", "place_dividend3"];
    pub const PLACE_RESULT: &str = "place_result";
    pub const HORSE_WIN_RATE_TOP1: &str = "horse_win_rate_top1";
    pub const HORSE_WIN_RATE_TOP3: &str = "horse_win_rate_top3";
    pub const JOCKEY_WIN_RATE_TOP1: &str = "jockey_win_rate_top1";
    pub const JOCKEY_WIN_RATE_TOP3: &str = "jockey_win_rate_top3";

    /// Every source column the loader knows how to read.
    pub const SOURCE: [&str; 11] = [
        RACE_ID,
        HORSE_ID,
        JOCKEY_ID,
        DATE,
        RESULT,
        WIN_ODDS,
        PLACE_ODDS,
        WIN_DIVIDEND1,
        PLACE_DIVIDENDS[0],
        PLACE_DIVIDENDS[1],
        PLACE_DIVIDENDS[2],
    ];
}

/// Bet type for simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BettingType {
    Win,   // 単勝 - selected horse finishes 1st
    Place, // 複勝 - selected horse finishes in the top 3
}

impl BettingType {
    pub const ALL: [BettingType; 2] = [BettingType::Win, BettingType::Place];

    pub fn name(&self) -> &'static str {
        match self {
            BettingType::Win => "win",
            BettingType::Place => "place",
        }
    }

    /// Odds/dividend column the strategies score with.
    pub fn odds_column(&self) -> ScoreColumn {
        match self {
            BettingType::Win => ScoreColumn::WinDividend1,
            BettingType::Place => ScoreColumn::PlaceOdds,
        }
    }

    /// Rolling-rate column of `entity` relevant to this bet type.
    pub fn rate_column(&self, entity: Entity) -> ScoreColumn {
        match (entity, self) {
            (Entity::Horse, BettingType::Win) => ScoreColumn::HorseWinRateTop1,
            (Entity::Horse, BettingType::Place) => ScoreColumn::HorseWinRateTop3,
            (Entity::Jockey, BettingType::Win) => ScoreColumn::JockeyWinRateTop1,
            (Entity::Jockey, BettingType::Place) => ScoreColumn::JockeyWinRateTop3,
        }
    }
}

impl FromStr for BettingType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "win" | "tansho" => Ok(BettingType::Win),
            "place" | "fukusho" => Ok(BettingType::Place),
            other => Err(ConfigurationError::UnsupportedBettingType(other.to_string())),
        }
    }
}

impl fmt::Display for BettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whose history a rolling rate summarises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Horse,
    Jockey,
}

impl Entity {
    pub const ALL: [Entity; 2] = [Entity::Horse, Entity::Jockey];

    pub fn name(&self) -> &'static str {
        match self {
            Entity::Horse => "horse",
            Entity::Jockey => "jockey",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            Entity::Horse => columns::HORSE_ID,
            Entity::Jockey => columns::JOCKEY_ID,
        }
    }

    /// Derived (top1, top3) column names.
    pub fn rate_columns(&self) -> [&'static str; 2] {
        match self {
            Entity::Horse => [columns::HORSE_WIN_RATE_TOP1, columns::HORSE_WIN_RATE_TOP3],
            Entity::Jockey => [columns::JOCKEY_WIN_RATE_TOP1, columns::JOCKEY_WIN_RATE_TOP3],
        }
    }
}

impl FromStr for Entity {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "horse" => Ok(Entity::Horse),
            "jockey" => Ok(Entity::Jockey),
            other => Err(ConfigurationError::UnknownEntity(other.to_string())),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A numeric column a strategy can filter or score on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreColumn {
    WinDividend1,
    PlaceOdds,
    HorseWinRateTop1,
    HorseWinRateTop3,
    JockeyWinRateTop1,
    JockeyWinRateTop3,
}

impl ScoreColumn {
    pub fn name(&self) -> &'static str {
        match self {
            ScoreColumn::WinDividend1 => columns::WIN_DIVIDEND1,
            ScoreColumn::PlaceOdds => columns::PLACE_ODDS,
            ScoreColumn::HorseWinRateTop1 => columns::HORSE_WIN_RATE_TOP1,
            ScoreColumn::HorseWinRateTop3 => columns::HORSE_WIN_RATE_TOP3,
            ScoreColumn::JockeyWinRateTop1 => columns::JOCKEY_WIN_RATE_TOP1,
            ScoreColumn::JockeyWinRateTop3 => columns::JOCKEY_WIN_RATE_TOP3,
        }
    }
}

/// Trailing win (top1) and place (top3) rates for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RollingRates {
    pub top1: f64,
    pub top3: f64,
}

/// One horse's participation in one race.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceRecord {
    pub race_id: String,
    pub horse_id: String,
    pub jockey_id: String,
    pub date: NaiveDate,
    /// Finishing position, 0 when unknown (scratched, DNF, missing)
    pub result: u32,
    pub win_odds: f64,
    pub place_odds: f64,
    pub win_dividend1: f64,
    pub place_dividends: [Option<f64>; 3],
    /// Normalized rates, `None` until the feature engine has run
    pub horse_rates: Option<RollingRates>,
    pub jockey_rates: Option<RollingRates>,
}

impl RaceRecord {
    /// Record with no odds and no derived rates.
    pub fn new(
        race_id: impl Into<String>,
        horse_id: impl Into<String>,
        jockey_id: impl Into<String>,
        date: NaiveDate,
        result: u32,
    ) -> Self {
        Self {
            race_id: race_id.into(),
            horse_id: horse_id.into(),
            jockey_id: jockey_id.into(),
            date,
            result,
            win_odds: f64::NAN,
            place_odds: f64::NAN,
            win_dividend1: f64::NAN,
            place_dividends: [None; 3],
            horse_rates: None,
            jockey_rates: None,
        }
    }

    pub fn is_win(&self) -> bool {
        self.result == 1
    }

    /// Place flag: finished 1st, 2nd or 3rd.
    pub fn placed(&self) -> bool {
        (1..=3).contains(&self.result)
    }

    /// Dividend paid for a place bet at `rank`, `None` if absent or NaN.
    pub fn place_dividend(&self, rank: u32) -> Option<f64> {
        match rank {
            1..=3 => self.place_dividends[(rank - 1) as usize].filter(|d| !d.is_nan()),
            _ => None,
        }
    }

    pub fn entity_id(&self, entity: Entity) -> &str {
        match entity {
            Entity::Horse => &self.horse_id,
            Entity::Jockey => &self.jockey_id,
        }
    }

    pub fn rates(&self, entity: Entity) -> Option<RollingRates> {
        match entity {
            Entity::Horse => self.horse_rates,
            Entity::Jockey => self.jockey_rates,
        }
    }

    pub fn set_rates(&mut self, entity: Entity, rates: RollingRates) {
        match entity {
            Entity::Horse => self.horse_rates = Some(rates),
            Entity::Jockey => self.jockey_rates = Some(rates),
        }
    }

    /// Value of a scoring column, `None` when the column has not been derived.
    pub fn value(&self, column: ScoreColumn) -> Option<f64> {
        match column {
            ScoreColumn::WinDividend1 => Some(self.win_dividend1),
            ScoreColumn::PlaceOdds => Some(self.place_odds),
            ScoreColumn::HorseWinRateTop1 => self.horse_rates.map(|r| r.top1),
            ScoreColumn::HorseWinRateTop3 => self.horse_rates.map(|r| r.top3),
            ScoreColumn::JockeyWinRateTop1 => self.jockey_rates.map(|r| r.top1),
            ScoreColumn::JockeyWinRateTop3 => self.jockey_rates.map(|r| r.top3),
        }
    }
}

/// The loaded race-history table: records plus the columns present in the source.
#[derive(Debug, Clone, Default)]
pub struct RaceTable {
    records: Vec<RaceRecord>,
    columns: BTreeSet<String>,
}

impl RaceTable {
    pub fn new<I, S>(records: Vec<RaceRecord>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Table whose source carried every known column.
    pub fn from_records(records: Vec<RaceRecord>) -> Self {
        Self::new(records, columns::SOURCE)
    }

    pub fn records(&self) -> &[RaceRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [RaceRecord] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<RaceRecord> {
        self.records
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    pub fn require_column(&self, name: &str) -> Result<(), ConfigurationError> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(ConfigurationError::MissingColumn(name.to_string()))
        }
    }

    pub(crate) fn add_column(&mut self, name: &str) {
        self.columns.insert(name.to_string());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Group the records into per-race candidate sets.
    pub fn races(&self) -> Vec<RaceGroup> {
        group_races(&self.records)
    }
}

/// All records sharing one race identifier. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceGroup {
    race_id: String,
    records: Vec<RaceRecord>,
}

impl RaceGroup {
    /// Returns `None` for an empty candidate set.
    pub fn new(race_id: impl Into<String>, records: Vec<RaceRecord>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }
        Some(Self {
            race_id: race_id.into(),
            records,
        })
    }

    pub fn race_id(&self) -> &str {
        &self.race_id
    }

    pub fn records(&self) -> &[RaceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Group records by race id, ascending, keeping row order inside each race.
pub fn group_races(records: &[RaceRecord]) -> Vec<RaceGroup> {
    let mut race_map: BTreeMap<&str, Vec<RaceRecord>> = BTreeMap::new();
    for record in records {
        race_map
            .entry(record.race_id.as_str())
            .or_default()
            .push(record.clone());
    }

    race_map
        .into_iter()
        .filter_map(|(race_id, records)| RaceGroup::new(race_id, records))
        .collect()
}
