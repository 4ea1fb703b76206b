//! Result export port trait.

use std::path::Path;

use crate::domain::batch::{GroupRecord, TradeRecord};
use crate::domain::error::ProbeError;

/// Port for writing probe results.
pub trait ReportPort {
    fn write_trades(&self, trades: &[TradeRecord], output_path: &Path) -> Result<(), ProbeError>;

    fn write_groups(&self, groups: &[GroupRecord], output_path: &Path) -> Result<(), ProbeError>;
}
