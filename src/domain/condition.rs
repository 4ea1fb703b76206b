//! Condition AST and primitive factories.
//!
//! A [`Condition`] is a pure predicate over `(table, bar_index)`; evaluation
//! lives in [`crate::domain::condition_eval`]. The lowercase factory functions
//! in this module are the intended way to build conditions in code, e.g.
//! `all_of([above("close", "ema_200"), crosses_above("rsi_14", 30.0)])`.
//!
//! `Display` renders the same text syntax accepted by
//! [`crate::domain::condition_parser`].

use std::collections::BTreeSet;
use std::fmt;

/// Right-hand operand: another column or a fixed constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Ref {
    Column(String),
    Value(f64),
}

impl From<&str> for Ref {
    fn from(column: &str) -> Self {
        Ref::Column(column.to_string())
    }
}

impl From<String> for Ref {
    fn from(column: String) -> Self {
        Ref::Column(column)
    }
}

impl From<f64> for Ref {
    fn from(value: f64) -> Self {
        Ref::Value(value)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Column(name) => write!(f, "{name}"),
            Ref::Value(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Above { column: String, reference: Ref },
    Below { column: String, reference: Ref },
    CrossesAbove { column: String, reference: Ref },
    CrossesBelow { column: String, reference: Ref },
    Between { column: String, low: f64, high: f64 },
    Rising { column: String, bars: usize },
    Falling { column: String, bars: usize },
    PullbackTo { level: String, tolerance_atr_mult: f64 },
    PullbackBelow { level: String, tolerance_atr_mult: f64 },
    BullishDivergence { indicator: String, lookback: usize },
    BearishDivergence { indicator: String, lookback: usize },
    CandleBullish { pattern: String },
    CandleBearish { pattern: String },
    ConsecutiveHigherCloses { count: usize },
    ConsecutiveLowerCloses { count: usize },
    Squeeze { width: String, lookback: usize },
    RangeExceedsAtr { multiplier: f64 },
    NarrowestRange { lookback: usize },
    BreaksAboveLevel { level: String },
    BreaksBelowLevel { level: String },
    InTopPctOfRange { pct: f64 },
    InBottomPctOfRange { pct: f64 },
    GapUp { atr_mult: f64 },
    GapDown { atr_mult: f64 },
    DeviationBelow { column: String, reference: String, atr_mult: f64 },
    DeviationAbove { column: String, reference: String, atr_mult: f64 },
    WasBelowThenCrossesAbove { column: String, threshold: f64, lookback: usize },
    WasAboveThenCrossesBelow { column: String, threshold: f64, lookback: usize },
    HeldAbove { column: String, threshold: f64, bars: usize },
    HeldBelow { column: String, threshold: f64, bars: usize },
    AllOf(Vec<Condition>),
    AnyOf(Vec<Condition>),
}

impl Condition {
    /// Every column this condition may read, including implicit price columns.
    /// The ATR column belongs to the table and is not listed.
    pub fn referenced_columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        let names: Vec<&str> = match self {
            Condition::Above { column, reference }
            | Condition::Below { column, reference }
            | Condition::CrossesAbove { column, reference }
            | Condition::CrossesBelow { column, reference } => match reference {
                Ref::Column(other) => vec![column.as_str(), other.as_str()],
                Ref::Value(_) => vec![column.as_str()],
            },
            Condition::Between { column, .. }
            | Condition::Rising { column, .. }
            | Condition::Falling { column, .. }
            | Condition::WasBelowThenCrossesAbove { column, .. }
            | Condition::WasAboveThenCrossesBelow { column, .. }
            | Condition::HeldAbove { column, .. }
            | Condition::HeldBelow { column, .. } => vec![column.as_str()],
            Condition::PullbackTo { level, .. } => vec![level.as_str(), "low", "close"],
            Condition::PullbackBelow { level, .. } => vec![level.as_str(), "high", "close"],
            Condition::BullishDivergence { indicator, .. } => vec![indicator.as_str(), "low"],
            Condition::BearishDivergence { indicator, .. } => vec![indicator.as_str(), "high"],
            Condition::CandleBullish { pattern } | Condition::CandleBearish { pattern } => {
                vec![pattern.as_str()]
            }
            Condition::ConsecutiveHigherCloses { .. } | Condition::ConsecutiveLowerCloses { .. } => {
                vec!["close"]
            }
            Condition::Squeeze { width, .. } => vec![width.as_str()],
            Condition::RangeExceedsAtr { .. } => vec!["high", "low"],
            Condition::NarrowestRange { .. } => vec!["high", "low"],
            Condition::BreaksAboveLevel { level } | Condition::BreaksBelowLevel { level } => {
                vec![level.as_str(), "close"]
            }
            Condition::InTopPctOfRange { .. } | Condition::InBottomPctOfRange { .. } => {
                vec!["high", "low", "close"]
            }
            Condition::GapUp { .. } | Condition::GapDown { .. } => vec!["open", "close"],
            Condition::DeviationBelow {
                column, reference, ..
            }
            | Condition::DeviationAbove {
                column, reference, ..
            } => vec![column.as_str(), reference.as_str()],
            Condition::AllOf(children) | Condition::AnyOf(children) => {
                for child in children {
                    child.collect_columns(out);
                }
                return;
            }
        };
        out.extend(names.into_iter().map(str::to_string));
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, children: &[Condition]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{child}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Above { column, reference } => write!(f, "above({column}, {reference})"),
            Condition::Below { column, reference } => write!(f, "below({column}, {reference})"),
            Condition::CrossesAbove { column, reference } => {
                write!(f, "crosses_above({column}, {reference})")
            }
            Condition::CrossesBelow { column, reference } => {
                write!(f, "crosses_below({column}, {reference})")
            }
            Condition::Between { column, low, high } => {
                write!(f, "between({column}, {low}, {high})")
            }
            Condition::Rising { column, bars } => write!(f, "rising({column}, {bars})"),
            Condition::Falling { column, bars } => write!(f, "falling({column}, {bars})"),
            Condition::PullbackTo {
                level,
                tolerance_atr_mult,
            } => write!(f, "pullback_to({level}, {tolerance_atr_mult})"),
            Condition::PullbackBelow {
                level,
                tolerance_atr_mult,
            } => write!(f, "pullback_below({level}, {tolerance_atr_mult})"),
            Condition::BullishDivergence {
                indicator,
                lookback,
            } => write!(f, "bullish_divergence({indicator}, {lookback})"),
            Condition::BearishDivergence {
                indicator,
                lookback,
            } => write!(f, "bearish_divergence({indicator}, {lookback})"),
            Condition::CandleBullish { pattern } => write!(f, "candle_bullish({pattern})"),
            Condition::CandleBearish { pattern } => write!(f, "candle_bearish({pattern})"),
            Condition::ConsecutiveHigherCloses { count } => {
                write!(f, "consecutive_higher_closes({count})")
            }
            Condition::ConsecutiveLowerCloses { count } => {
                write!(f, "consecutive_lower_closes({count})")
            }
            Condition::Squeeze { width, lookback } => write!(f, "squeeze({width}, {lookback})"),
            Condition::RangeExceedsAtr { multiplier } => {
                write!(f, "range_exceeds_atr({multiplier})")
            }
            Condition::NarrowestRange { lookback } => write!(f, "narrowest_range({lookback})"),
            Condition::BreaksAboveLevel { level } => write!(f, "breaks_above_level({level})"),
            Condition::BreaksBelowLevel { level } => write!(f, "breaks_below_level({level})"),
            Condition::InTopPctOfRange { pct } => write!(f, "in_top_pct_of_range({pct})"),
            Condition::InBottomPctOfRange { pct } => write!(f, "in_bottom_pct_of_range({pct})"),
            Condition::GapUp { atr_mult } => write!(f, "gap_up({atr_mult})"),
            Condition::GapDown { atr_mult } => write!(f, "gap_down({atr_mult})"),
            Condition::DeviationBelow {
                column,
                reference,
                atr_mult,
            } => write!(f, "deviation_below({column}, {reference}, {atr_mult})"),
            Condition::DeviationAbove {
                column,
                reference,
                atr_mult,
            } => write!(f, "deviation_above({column}, {reference}, {atr_mult})"),
            Condition::WasBelowThenCrossesAbove {
                column,
                threshold,
                lookback,
            } => write!(
                f,
                "was_below_then_crosses_above({column}, {threshold}, {lookback})"
            ),
            Condition::WasAboveThenCrossesBelow {
                column,
                threshold,
                lookback,
            } => write!(
                f,
                "was_above_then_crosses_below({column}, {threshold}, {lookback})"
            ),
            Condition::HeldAbove {
                column,
                threshold,
                bars,
            } => write!(f, "held_above({column}, {threshold}, {bars})"),
            Condition::HeldBelow {
                column,
                threshold,
                bars,
            } => write!(f, "held_below({column}, {threshold}, {bars})"),
            Condition::AllOf(children) => write_list(f, "all_of", children),
            Condition::AnyOf(children) => write_list(f, "any_of", children),
        }
    }
}

// Factories.

pub fn above(column: impl Into<String>, reference: impl Into<Ref>) -> Condition {
    Condition::Above {
        column: column.into(),
        reference: reference.into(),
    }
}

pub fn below(column: impl Into<String>, reference: impl Into<Ref>) -> Condition {
    Condition::Below {
        column: column.into(),
        reference: reference.into(),
    }
}

pub fn crosses_above(column: impl Into<String>, reference: impl Into<Ref>) -> Condition {
    Condition::CrossesAbove {
        column: column.into(),
        reference: reference.into(),
    }
}

pub fn crosses_below(column: impl Into<String>, reference: impl Into<Ref>) -> Condition {
    Condition::CrossesBelow {
        column: column.into(),
        reference: reference.into(),
    }
}

/// Inclusive range test, e.g. an ADX regime band.
pub fn between(column: impl Into<String>, low: f64, high: f64) -> Condition {
    Condition::Between {
        column: column.into(),
        low,
        high,
    }
}

/// Strictly increasing over the `bars`-bar window ending at the current bar.
pub fn rising(column: impl Into<String>, bars: usize) -> Condition {
    Condition::Rising {
        column: column.into(),
        bars,
    }
}

/// Strictly decreasing over the `bars`-bar window ending at the current bar.
pub fn falling(column: impl Into<String>, bars: usize) -> Condition {
    Condition::Falling {
        column: column.into(),
        bars,
    }
}

pub fn pullback_to(level: impl Into<String>, tolerance_atr_mult: f64) -> Condition {
    Condition::PullbackTo {
        level: level.into(),
        tolerance_atr_mult,
    }
}

pub fn pullback_below(level: impl Into<String>, tolerance_atr_mult: f64) -> Condition {
    Condition::PullbackBelow {
        level: level.into(),
        tolerance_atr_mult,
    }
}

pub fn bullish_divergence(indicator: impl Into<String>, lookback: usize) -> Condition {
    Condition::BullishDivergence {
        indicator: indicator.into(),
        lookback,
    }
}

pub fn bearish_divergence(indicator: impl Into<String>, lookback: usize) -> Condition {
    Condition::BearishDivergence {
        indicator: indicator.into(),
        lookback,
    }
}

pub fn candle_bullish(pattern: impl Into<String>) -> Condition {
    Condition::CandleBullish {
        pattern: pattern.into(),
    }
}

pub fn candle_bearish(pattern: impl Into<String>) -> Condition {
    Condition::CandleBearish {
        pattern: pattern.into(),
    }
}

pub fn consecutive_higher_closes(count: usize) -> Condition {
    Condition::ConsecutiveHigherCloses { count }
}

pub fn consecutive_lower_closes(count: usize) -> Condition {
    Condition::ConsecutiveLowerCloses { count }
}

pub fn squeeze(width: impl Into<String>, lookback: usize) -> Condition {
    Condition::Squeeze {
        width: width.into(),
        lookback,
    }
}

pub fn range_exceeds_atr(multiplier: f64) -> Condition {
    Condition::RangeExceedsAtr { multiplier }
}

pub fn narrowest_range(lookback: usize) -> Condition {
    Condition::NarrowestRange { lookback }
}

pub fn breaks_above_level(level: impl Into<String>) -> Condition {
    Condition::BreaksAboveLevel {
        level: level.into(),
    }
}

pub fn breaks_below_level(level: impl Into<String>) -> Condition {
    Condition::BreaksBelowLevel {
        level: level.into(),
    }
}

pub fn in_top_pct_of_range(pct: f64) -> Condition {
    Condition::InTopPctOfRange { pct }
}

pub fn in_bottom_pct_of_range(pct: f64) -> Condition {
    Condition::InBottomPctOfRange { pct }
}

pub fn gap_up(atr_mult: f64) -> Condition {
    Condition::GapUp { atr_mult }
}

pub fn gap_down(atr_mult: f64) -> Condition {
    Condition::GapDown { atr_mult }
}

pub fn deviation_below(
    column: impl Into<String>,
    reference: impl Into<String>,
    atr_mult: f64,
) -> Condition {
    Condition::DeviationBelow {
        column: column.into(),
        reference: reference.into(),
        atr_mult,
    }
}

pub fn deviation_above(
    column: impl Into<String>,
    reference: impl Into<String>,
    atr_mult: f64,
) -> Condition {
    Condition::DeviationAbove {
        column: column.into(),
        reference: reference.into(),
        atr_mult,
    }
}

pub fn was_below_then_crosses_above(
    column: impl Into<String>,
    threshold: f64,
    lookback: usize,
) -> Condition {
    Condition::WasBelowThenCrossesAbove {
        column: column.into(),
        threshold,
        lookback,
    }
}

pub fn was_above_then_crosses_below(
    column: impl Into<String>,
    threshold: f64,
    lookback: usize,
) -> Condition {
    Condition::WasAboveThenCrossesBelow {
        column: column.into(),
        threshold,
        lookback,
    }
}

pub fn held_above(column: impl Into<String>, threshold: f64, bars: usize) -> Condition {
    Condition::HeldAbove {
        column: column.into(),
        threshold,
        bars,
    }
}

pub fn held_below(column: impl Into<String>, threshold: f64, bars: usize) -> Condition {
    Condition::HeldBelow {
        column: column.into(),
        threshold,
        bars,
    }
}

pub fn all_of(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    Condition::AllOf(conditions.into_iter().collect())
}

pub fn any_of(conditions: impl IntoIterator<Item = Condition>) -> Condition {
    Condition::AnyOf(conditions.into_iter().collect())
}
