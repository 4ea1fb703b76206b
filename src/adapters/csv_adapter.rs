//! CSV file bar-table adapter.
//!
//! Reads `<base_path>/<SYMBOL>.csv`. The header must contain a `timestamp`
//! (or `date`) column; every other column is loaded as a numeric series under
//! its lowercased header name. Empty cells and `NaN` load as undefined values.

use crate::domain::bar_table::BarTable;
use crate::domain::error::ProbeError;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn data_error(symbol: &str, reason: impl Into<String>) -> ProbeError {
    ProbeError::Data {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_cell(value: &str) -> Result<f64, String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    value
        .parse::<f64>()
        .map_err(|e| format!("invalid number '{}': {}", value, e))
}

impl DataPort for CsvAdapter {
    fn load_table(&self, symbol: &str) -> Result<BarTable, ProbeError> {
        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path).map_err(|e| {
            data_error(symbol, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| data_error(symbol, format!("CSV header error: {}", e)))?
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();

        let ts_index = headers
            .iter()
            .position(|h| h == "timestamp" || h == "date")
            .ok_or_else(|| data_error(symbol, "missing timestamp column"))?;

        let mut rows: Vec<(NaiveDateTime, Vec<f64>)> = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record =
                result.map_err(|e| data_error(symbol, format!("CSV parse error: {}", e)))?;

            let raw_ts = record.get(ts_index).unwrap_or_default();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                data_error(
                    symbol,
                    format!("invalid timestamp '{}' on row {}", raw_ts, line + 1),
                )
            })?;

            let mut values = Vec::with_capacity(headers.len() - 1);
            for (col, header) in headers.iter().enumerate() {
                if col == ts_index {
                    continue;
                }
                let value = parse_cell(record.get(col).unwrap_or_default()).map_err(|reason| {
                    data_error(symbol, format!("column {} row {}: {}", header, line + 1, reason))
                })?;
                values.push(value);
            }
            rows.push((timestamp, values));
        }

        rows.sort_by_key(|(ts, _)| *ts);

        let mut table = BarTable::new(rows.iter().map(|(ts, _)| *ts).collect())?;
        let value_headers = headers
            .iter()
            .enumerate()
            .filter(|(col, _)| *col != ts_index)
            .map(|(_, h)| h);
        for (slot, header) in value_headers.enumerate() {
            table.insert_column(header.clone(), rows.iter().map(|(_, v)| v[slot]).collect())?;
        }
        Ok(table)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ProbeError> {
        let entries = fs::read_dir(&self.base_path)?;

        let mut symbols = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
