//! Bar-table source port trait.

use crate::domain::bar_table::BarTable;
use crate::domain::error::ProbeError;

pub trait DataPort {
    /// Load the full OHLCV + indicator table for `symbol`.
    fn load_table(&self, symbol: &str) -> Result<BarTable, ProbeError>;

    fn list_symbols(&self) -> Result<Vec<String>, ProbeError>;
}
