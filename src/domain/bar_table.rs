//! Columnar OHLCV + indicator table.
//!
//! Rows are indexed `0..len` by strictly increasing timestamp. Every lookup
//! returns `Option<f64>`: a missing column, an out-of-range index, NaN and
//! infinities all come back as `None`, so callers never see an undefined number.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use super::error::ProbeError;

pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// ATR column read by conditions and exit sizing unless the table names another.
pub const ATR_COLUMN: &str = "atr_14";

#[derive(Debug, Clone)]
pub struct BarTable {
    timestamps: Vec<NaiveDateTime>,
    columns: HashMap<String, Vec<f64>>,
    atr_column: String,
}

impl BarTable {
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Result<Self, ProbeError> {
        if let Some(index) = timestamps
            .windows(2)
            .position(|pair| pair[1] <= pair[0])
        {
            return Err(ProbeError::NonMonotonicTimestamps { index: index + 1 });
        }
        Ok(Self {
            timestamps,
            columns: HashMap::new(),
            atr_column: ATR_COLUMN.to_string(),
        })
    }

    /// Builder form of [`BarTable::set_atr_column`].
    pub fn with_atr_column(mut self, name: impl Into<String>) -> Self {
        self.set_atr_column(name);
        self
    }

    /// Choose the column that ATR-sized conditions and exits read.
    pub fn set_atr_column(&mut self, name: impl Into<String>) {
        self.atr_column = name.into();
    }

    pub fn atr_column(&self) -> &str {
        &self.atr_column
    }

    /// Builder form of [`BarTable::insert_column`].
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, ProbeError> {
        self.insert_column(name, values)?;
        Ok(self)
    }

    /// Add or replace a column. The column must have one value per row.
    pub fn insert_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), ProbeError> {
        let name = name.into();
        if values.len() != self.timestamps.len() {
            return Err(ProbeError::TableShape {
                column: name,
                expected: self.timestamps.len(),
                found: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn timestamp(&self, index: usize) -> Option<NaiveDateTime> {
        self.timestamps.get(index).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Finite value of `column` at `index`, or `None` when undefined.
    pub fn value(&self, column: &str, index: usize) -> Option<f64> {
        self.columns
            .get(column)
            .and_then(|values| values.get(index))
            .copied()
            .filter(|v| v.is_finite())
    }

    pub fn open(&self, index: usize) -> Option<f64> {
        self.value(OPEN, index)
    }

    pub fn high(&self, index: usize) -> Option<f64> {
        self.value(HIGH, index)
    }

    pub fn low(&self, index: usize) -> Option<f64> {
        self.value(LOW, index)
    }

    pub fn close(&self, index: usize) -> Option<f64> {
        self.value(CLOSE, index)
    }

    pub fn atr(&self, index: usize) -> Option<f64> {
        self.value(&self.atr_column, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn price_accessors_read_named_columns() {
        let table = BarTable::new(vec![ts(9), ts(10)])
            .unwrap()
            .with_column(OPEN, vec![99.0, 100.0])
            .unwrap()
            .with_column(HIGH, vec![102.0, 103.0])
            .unwrap()
            .with_column(LOW, vec![98.0, 99.0])
            .unwrap()
            .with_column(CLOSE, vec![100.0, 101.0])
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.open(0), Some(99.0));
        assert_eq!(table.high(1), Some(103.0));
        assert_eq!(table.low(1), Some(99.0));
        assert_eq!(table.close(1), Some(101.0));
        assert_eq!(table.value(VOLUME, 0), None);
    }

    #[test]
    fn atr_follows_the_configured_column() {
        let table = BarTable::new(vec![ts(9), ts(10)])
            .unwrap()
            .with_column(ATR_COLUMN, vec![1.0, 1.5])
            .unwrap()
            .with_column("atr_5", vec![2.0, 2.5])
            .unwrap();
        assert_eq!(table.atr_column(), "atr_14");
        assert_eq!(table.atr(1), Some(1.5));

        let table = table.with_atr_column("atr_5");
        assert_eq!(table.atr_column(), "atr_5");
        assert_eq!(table.atr(1), Some(2.5));
        assert_eq!(table.with_atr_column("atr_20").atr(0), None);
    }

    #[test]
    fn rejects_unordered_timestamps() {
        let err = BarTable::new(vec![ts(10), ts(9)]).unwrap_err();
        assert!(matches!(err, ProbeError::NonMonotonicTimestamps { index: 1 }));
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = BarTable::new(vec![ts(9), ts(10), ts(10)]).unwrap_err();
        assert!(matches!(err, ProbeError::NonMonotonicTimestamps { index: 2 }));
    }

    #[test]
    fn rejects_short_column() {
        let err = BarTable::new(vec![ts(9), ts(10)])
            .unwrap()
            .with_column("rsi_14", vec![50.0])
            .unwrap_err();
        match err {
            ProbeError::TableShape {
                column,
                expected,
                found,
            } => {
                assert_eq!(column, "rsi_14");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn undefined_values_resolve_to_none() {
        let table = BarTable::new(vec![ts(9), ts(10), ts(11)])
            .unwrap()
            .with_column("rsi_14", vec![f64::NAN, f64::INFINITY, 42.0])
            .unwrap();
        assert_eq!(table.value("rsi_14", 0), None);
        assert_eq!(table.value("rsi_14", 1), None);
        assert_eq!(table.value("rsi_14", 2), Some(42.0));
        assert_eq!(table.value("rsi_14", 3), None);
        assert_eq!(table.value("missing", 2), None);
    }

    #[test]
    fn empty_table() {
        let table = BarTable::new(Vec::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.timestamp(0), None);
        assert_eq!(table.close(0), None);
    }
}
