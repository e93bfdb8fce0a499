//! CSV ingestion: race-history file to [`RaceTable`].

use anyhow::{bail, Context};
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

use crate::error::ConfigurationError;
use crate::types::{columns, RaceRecord, RaceTable};

/// Columns the loader cannot do without.
const REQUIRED: [&str; 5] = [
    columns::RACE_ID,
    columns::DATE,
    columns::RESULT,
    columns::PLACE_ODDS,
    columns::WIN_DIVIDEND1,
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Load a race-history CSV (with header).
pub fn load_races<P: AsRef<Path>>(path: P) -> anyhow::Result<RaceTable> {
    let path = path.as_ref();
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .with_context(|| format!("failed to open {}", path.display()))?
        .finish()
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let table = table_from_dataframe(&df)?;
    info!(
        path = %path.display(),
        rows = table.len(),
        races = table.races().len(),
        "Loaded race history"
    );
    Ok(table)
}

/// Map a polars frame onto race records.
///
/// Ids may be strings or integers. Null numerics become NaN, a null result
/// becomes 0 (unknown finish). Absent optional columns are left out of the
/// table's column set so later stages can tell "absent" from "empty".
pub fn table_from_dataframe(df: &DataFrame) -> anyhow::Result<RaceTable> {
    for name in REQUIRED {
        if df.column(name).is_err() {
            return Err(ConfigurationError::MissingColumn(name.to_string()).into());
        }
    }

    let height = df.height();
    let race_ids = string_values(df, columns::RACE_ID)?;
    let horse_ids = string_values(df, columns::HORSE_ID)?;
    let jockey_ids = string_values(df, columns::JOCKEY_ID)?;
    let dates = string_values(df, columns::DATE)?;
    let results = integer_values(df, columns::RESULT)?;
    let win_odds = float_values(df, columns::WIN_ODDS)?;
    let place_odds = float_values(df, columns::PLACE_ODDS)?;
    let win_dividends = float_values(df, columns::WIN_DIVIDEND1)?;
    let mut place_dividends = Vec::with_capacity(3);
    for name in columns::PLACE_DIVIDENDS {
        place_dividends.push(float_values(df, name)?);
    }

    let mut records = Vec::with_capacity(height);
    for i in 0..height {
        let race_id = cell(&race_ids, i)
            .with_context(|| format!("row {}: missing {}", i, columns::RACE_ID))?;
        let raw_date = cell(&dates, i)
            .with_context(|| format!("row {}: missing {}", i, columns::DATE))?;
        let date = match parse_date(&raw_date) {
            Some(date) => date,
            None => bail!("row {}: invalid date `{}`", i, raw_date),
        };
        let result = cell(&results, i).map(|r| r.max(0) as u32).unwrap_or(0);

        let mut record = RaceRecord::new(
            race_id,
            cell(&horse_ids, i).unwrap_or_default(),
            cell(&jockey_ids, i).unwrap_or_default(),
            date,
            result,
        );
        record.win_odds = cell(&win_odds, i).unwrap_or(f64::NAN);
        record.place_odds = cell(&place_odds, i).unwrap_or(f64::NAN);
        record.win_dividend1 = cell(&win_dividends, i).unwrap_or(f64::NAN);
        for (slot, values) in record.place_dividends.iter_mut().zip(&place_dividends) {
            *slot = cell(values, i);
        }
        records.push(record);
    }

    let present: Vec<&str> = columns::SOURCE
        .into_iter()
        .filter(|name| df.column(name).is_ok())
        .collect();

    Ok(RaceTable::new(records, present))
}

/// `None` for an absent column, otherwise one entry per row.
type Values<T> = Option<Vec<Option<T>>>;

fn cell<T: Clone>(values: &Values<T>, row: usize) -> Option<T> {
    values.as_ref().and_then(|v| v.get(row).cloned().flatten())
}

fn string_values(df: &DataFrame, name: &str) -> anyhow::Result<Values<String>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let cast = column
        .cast(&DataType::String)
        .with_context(|| format!("column `{}` is not text-like", name))?;
    let values = cast
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect();
    Ok(Some(values))
}

fn float_values(df: &DataFrame, name: &str) -> anyhow::Result<Values<f64>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let cast = column
        .cast(&DataType::Float64)
        .with_context(|| format!("column `{}` is not numeric", name))?;
    Ok(Some(cast.f64()?.into_iter().collect()))
}

fn integer_values(df: &DataFrame, name: &str) -> anyhow::Result<Values<i64>> {
    let Ok(column) = df.column(name) else {
        return Ok(None);
    };
    let cast = column
        .cast(&DataType::Int64)
        .with_context(|| format!("column `{}` is not an integer", name))?;
    Ok(Some(cast.i64()?.into_iter().collect()))
}

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD` and `YYYYMMDD`.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_frame() -> DataFrame {
        df!(
            "race_id" => &[202301010101i64, 202301010101, 202301010102],
            "horse_id" => &["H1", "H2", "H1"],
            "jockey_id" => &[Some("J1"), Some("J2"), None],
            "date" => &["2023-01-01", "2023/01/01", "20230108"],
            "result" => &[Some(1i64), Some(2), None],
            "win_odds" => &[2.5, 6.0, 3.1],
            "place_odds" => &[Some(1.2), None, Some(1.4)],
            "win_dividend1" => &[25.0, 25.0, 31.0],
            "place_dividend1" => &[Some(12.0), Some(12.0), None],
            "place_dividend2" => &[Some(18.0), Some(18.0), None]
        )
        .unwrap()
    }

    #[test]
    fn test_maps_rows_to_records() {
        let table = table_from_dataframe(&base_frame()).unwrap();
        let records = table.records();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].race_id, "202301010101");
        assert_eq!(records[0].horse_id, "H1");
        assert_eq!(records[0].result, 1);
        assert!((records[0].win_odds - 2.5).abs() < 1e-12);
        assert_eq!(records[0].place_dividend(2), Some(18.0));
        assert_eq!(table.races().len(), 2);
    }

    #[test]
    fn test_date_formats() {
        let table = table_from_dataframe(&base_frame()).unwrap();
        let records = table.records();

        let jan1 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(records[0].date, jan1);
        assert_eq!(records[1].date, jan1);
        assert_eq!(records[2].date, NaiveDate::from_ymd_opt(2023, 1, 8).unwrap());
    }

    #[test]
    fn test_nulls() {
        let table = table_from_dataframe(&base_frame()).unwrap();
        let records = table.records();

        assert!(records[1].place_odds.is_nan());
        assert_eq!(records[2].result, 0);
        assert_eq!(records[2].jockey_id, "");
        assert_eq!(records[2].place_dividend(1), None);
        // place_dividend3 column absent
        assert_eq!(records[0].place_dividend(3), None);
    }

    #[test]
    fn test_column_set_reflects_source() {
        let mut df = base_frame();
        df = df.drop("jockey_id").unwrap();
        let table = table_from_dataframe(&df).unwrap();

        assert!(table.has_column("horse_id"));
        assert!(!table.has_column("jockey_id"));
        assert!(!table.has_column("place_dividend3"));
    }

    #[test]
    fn test_missing_required_column() {
        let df = base_frame().drop("win_dividend1").unwrap();
        let err = table_from_dataframe(&df).unwrap_err();

        assert_eq!(
            err.downcast_ref::<ConfigurationError>(),
            Some(&ConfigurationError::MissingColumn("win_dividend1".to_string()))
        );
    }

    #[test]
    fn test_invalid_date() {
        let df = df!(
            "race_id" => &["R1"],
            "date" => &["01-02-2023"],
            "result" => &[1i64],
            "place_odds" => &[1.1],
            "win_dividend1" => &[20.0]
        )
        .unwrap();
        let err = table_from_dataframe(&df).unwrap_err();
        assert!(err.to_string().contains("invalid date"));
    }

    #[test]
    fn test_load_csv_file() {
        let path = std::env::temp_dir().join(format!("keiba-sim-loader-{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "race_id,horse_id,jockey_id,date,result,win_odds,place_odds,win_dividend1,place_dividend1,place_dividend2,place_dividend3\n\
             R1,H1,J1,2023-01-01,1,2.0,1.1,20,11,15,\n\
             R1,H2,J2,2023-01-01,2,5.0,1.5,20,11,15,\n",
        )
        .unwrap();

        let table = load_races(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].place_dividend(2), Some(15.0));
        assert_eq!(table.records()[1].place_dividend(3), None);
    }
}
