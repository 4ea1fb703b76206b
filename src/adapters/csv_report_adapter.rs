//! CSV report adapter implementing ReportPort.
//!
//! Headers come from the record field names. An empty slice writes an empty
//! file.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::batch::{GroupRecord, TradeRecord};
use crate::domain::error::ProbeError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    fn write_rows<T: Serialize>(&self, rows: &[T], output_path: &Path) -> Result<(), ProbeError> {
        let mut writer = csv::Writer::from_path(output_path).map_err(std::io::Error::from)?;
        for row in rows {
            writer.serialize(row).map_err(std::io::Error::from)?;
        }
        writer.flush()?;
        info!(rows = rows.len(), path = %output_path.display(), "wrote report");
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_trades(&self, trades: &[TradeRecord], output_path: &Path) -> Result<(), ProbeError> {
        self.write_rows(trades, output_path)
    }

    fn write_groups(&self, groups: &[GroupRecord], output_path: &Path) -> Result<(), ProbeError> {
        self.write_rows(groups, output_path)
    }
}
