#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use stratprobe::domain::bar_table::{ATR_COLUMN, BarTable, CLOSE, HIGH, LOW, OPEN, VOLUME};
use stratprobe::domain::error::ProbeError;
use stratprobe::ports::data_port::DataPort;

/// Hourly timestamps from 2024-03-01 00:00.
pub fn ts(n: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::hours(n as i64)
}

/// Table from `(open, high, low, close)` rows with a constant ATR column.
pub fn ohlc_table(rows: &[(f64, f64, f64, f64)], atr: f64) -> BarTable {
    BarTable::new((0..rows.len()).map(ts).collect())
        .unwrap()
        .with_column(OPEN, rows.iter().map(|r| r.0).collect())
        .unwrap()
        .with_column(HIGH, rows.iter().map(|r| r.1).collect())
        .unwrap()
        .with_column(LOW, rows.iter().map(|r| r.2).collect())
        .unwrap()
        .with_column(CLOSE, rows.iter().map(|r| r.3).collect())
        .unwrap()
        .with_column(VOLUME, vec![1000.0; rows.len()])
        .unwrap()
        .with_column(ATR_COLUMN, vec![atr; rows.len()])
        .unwrap()
}

/// Bars that open at the close and range half a point either side.
pub fn close_table(closes: &[f64], atr: f64) -> BarTable {
    let rows: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .map(|&c| (c, c + 0.5, c - 0.5, c))
        .collect();
    ohlc_table(&rows, atr)
}

/// Add a 0/1 column that is 1 exactly at `on` bars.
pub fn with_flag(table: BarTable, name: &str, on: &[usize]) -> BarTable {
    let values = (0..table.len())
        .map(|i| if on.contains(&i) { 1.0 } else { 0.0 })
        .collect();
    table.with_column(name, values).unwrap()
}

/// Write a bar CSV the way the data directory expects it.
pub fn write_bar_csv(dir: &Path, symbol: &str, rows: &[(f64, f64, f64, f64)], atr: f64) {
    let mut content = String::from("timestamp,open,high,low,close,volume,atr_14\n");
    for (i, (o, h, l, c)) in rows.iter().enumerate() {
        content.push_str(&format!(
            "{},{o},{h},{l},{c},1000,{atr}\n",
            ts(i).format("%Y-%m-%d %H:%M:%S")
        ));
    }
    fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}

pub struct MockDataPort {
    pub tables: HashMap<String, BarTable>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn with_table(mut self, symbol: &str, table: BarTable) -> Self {
        self.tables.insert(symbol.to_string(), table);
        self
    }
}

impl DataPort for MockDataPort {
    fn load_table(&self, symbol: &str) -> Result<BarTable, ProbeError> {
        self.tables
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProbeError::Data {
                symbol: symbol.to_string(),
                reason: "no such symbol".to_string(),
            })
    }

    fn list_symbols(&self) -> Result<Vec<String>, ProbeError> {
        let mut symbols: Vec<String> = self.tables.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub const STRATEGIES_INI: &str = r#"
# Probe strategies used by the integration tests.

[risk_profiles]
tight = 0.5

[strategy.ema_cross]
id = 2
display_name = EMA Cross
philosophy = Follow the faster average once it clears the slower one.
category = trend
tags = trend, crossover
direction = long_only
entry_long = crosses_above(ema_20, ema_50); above(adx_14, 25)
exit_long = crosses_below(ema_20, ema_50)
atr_stop_mult = 2.0
atr_target_mult = 3.0
required_indicators = ema_20, ema_50, adx_14, atr_14
detail.entry = EMA 20 crosses above EMA 50 with ADX above 25

[strategy.rsi_dip]
id = 7
display_name = RSI Dip
category = mean_reversion
entry_long = crosses_above(rsi_14, 30)
entry_short = crosses_below(rsi_14, 70)
exit_long = above(rsi_14, 55)
exit_short = below(rsi_14, 45)
trailing_atr_mult = 1.5
time_stop_bars = 10
"#;
