//! Condition evaluation.
//!
//! # Evaluation semantics
//!
//! - Every operand is read through [`BarTable::value`]; an undefined operand
//!   makes the condition `false`.
//! - Nothing reads beyond `bar_index`.
//! - ATR-sized primitives read the table's ATR column ([`BarTable::atr`]).
//! - Cross tests require `bar_index >= 1`; windowed tests return `false`
//!   until enough history exists.
//! - `AllOf` short-circuits on the first `false`, `AnyOf` on the first `true`.

use crate::domain::bar_table::{BarTable, CLOSE, HIGH, LOW, OPEN};
use crate::domain::condition::{Condition, Ref};

impl Condition {
    pub fn evaluate(&self, table: &BarTable, bar_index: usize) -> bool {
        evaluate(self, table, bar_index)
    }
}

pub fn evaluate(condition: &Condition, table: &BarTable, i: usize) -> bool {
    match condition {
        Condition::Above { column, reference } => {
            compare(table, column, reference, i, |v, r| v > r)
        }
        Condition::Below { column, reference } => {
            compare(table, column, reference, i, |v, r| v < r)
        }
        Condition::CrossesAbove { column, reference } => {
            cross(table, column, reference, i, |prev_a, prev_b, a, b| {
                prev_a <= prev_b && a > b
            })
        }
        Condition::CrossesBelow { column, reference } => {
            cross(table, column, reference, i, |prev_a, prev_b, a, b| {
                prev_a >= prev_b && a < b
            })
        }
        Condition::Between { column, low, high } => table
            .value(column, i)
            .is_some_and(|v| v >= *low && v <= *high),
        Condition::Rising { column, bars } => monotonic(table, column, *bars, i, |a, b| b > a),
        Condition::Falling { column, bars } => monotonic(table, column, *bars, i, |a, b| b < a),
        Condition::ConsecutiveHigherCloses { count } => {
            monotonic(table, CLOSE, *count, i, |a, b| b > a)
        }
        Condition::ConsecutiveLowerCloses { count } => {
            monotonic(table, CLOSE, *count, i, |a, b| b < a)
        }
        Condition::PullbackTo {
            level,
            tolerance_atr_mult,
        } => {
            let (Some(low), Some(close), Some(lvl), Some(atr)) = (
                table.low(i),
                table.close(i),
                table.value(level, i),
                table.atr(i),
            ) else {
                return false;
            };
            low <= lvl + tolerance_atr_mult * atr && close > lvl
        }
        Condition::PullbackBelow {
            level,
            tolerance_atr_mult,
        } => {
            let (Some(high), Some(close), Some(lvl), Some(atr)) = (
                table.high(i),
                table.close(i),
                table.value(level, i),
                table.atr(i),
            ) else {
                return false;
            };
            high >= lvl - tolerance_atr_mult * atr && close < lvl
        }
        Condition::BullishDivergence {
            indicator,
            lookback,
        } => divergence(table, LOW, indicator, *lookback, i, |price_now, price_then, ind_now, ind_then| {
            price_now < price_then && ind_now > ind_then
        }),
        Condition::BearishDivergence {
            indicator,
            lookback,
        } => divergence(table, HIGH, indicator, *lookback, i, |price_now, price_then, ind_now, ind_then| {
            price_now > price_then && ind_now < ind_then
        }),
        Condition::CandleBullish { pattern } => table.value(pattern, i).is_some_and(|v| v > 0.0),
        Condition::CandleBearish { pattern } => table.value(pattern, i).is_some_and(|v| v < 0.0),
        Condition::Squeeze { width, lookback } => {
            if *lookback == 0 || i < *lookback {
                return false;
            }
            let Some(window) = window_values(table, width, i + 1 - lookback, i) else {
                return false;
            };
            let min = window.iter().copied().fold(f64::INFINITY, f64::min);
            window.last().is_some_and(|current| *current <= min)
        }
        Condition::RangeExceedsAtr { multiplier } => {
            let (Some(high), Some(low), Some(atr)) =
                (table.high(i), table.low(i), table.atr(i))
            else {
                return false;
            };
            high - low > multiplier * atr
        }
        Condition::NarrowestRange { lookback } => {
            if *lookback == 0 || i + 1 < *lookback {
                return false;
            }
            let mut ranges = Vec::with_capacity(*lookback);
            for k in (i + 1 - lookback)..=i {
                match (table.high(k), table.low(k)) {
                    (Some(h), Some(l)) => ranges.push(h - l),
                    _ => return false,
                }
            }
            let min = ranges.iter().copied().fold(f64::INFINITY, f64::min);
            ranges.last().is_some_and(|current| *current <= min)
        }
        Condition::BreaksAboveLevel { level } => {
            cross(table, CLOSE, &Ref::Column(level.clone()), i, |prev_c, prev_l, c, l| {
                prev_c <= prev_l && c > l
            })
        }
        Condition::BreaksBelowLevel { level } => {
            cross(table, CLOSE, &Ref::Column(level.clone()), i, |prev_c, prev_l, c, l| {
                prev_c >= prev_l && c < l
            })
        }
        Condition::InTopPctOfRange { pct } => {
            range_position(table, i).is_some_and(|pos| pos >= 1.0 - pct)
        }
        Condition::InBottomPctOfRange { pct } => range_position(table, i).is_some_and(|pos| pos <= *pct),
        Condition::GapUp { atr_mult } => {
            gap(table, i).is_some_and(|(open, prev_close, atr)| open > prev_close + atr_mult * atr)
        }
        Condition::GapDown { atr_mult } => {
            gap(table, i).is_some_and(|(open, prev_close, atr)| open < prev_close - atr_mult * atr)
        }
        Condition::DeviationBelow {
            column,
            reference,
            atr_mult,
        } => deviation(table, column, reference, i).is_some_and(|(v, r, atr)| r - v > atr_mult * atr),
        Condition::DeviationAbove {
            column,
            reference,
            atr_mult,
        } => deviation(table, column, reference, i).is_some_and(|(v, r, atr)| v - r > atr_mult * atr),
        Condition::WasBelowThenCrossesAbove {
            column,
            threshold,
            lookback,
        } => {
            let t = *threshold;
            state_transition(table, column, *lookback, i, |prev, curr| prev <= t && curr > t, |v| v < t)
        }
        Condition::WasAboveThenCrossesBelow {
            column,
            threshold,
            lookback,
        } => {
            let t = *threshold;
            state_transition(table, column, *lookback, i, |prev, curr| prev >= t && curr < t, |v| v > t)
        }
        Condition::HeldAbove {
            column,
            threshold,
            bars,
        } => held(table, column, *bars, i, |v| v > *threshold),
        Condition::HeldBelow {
            column,
            threshold,
            bars,
        } => held(table, column, *bars, i, |v| v < *threshold),
        Condition::AllOf(children) => children.iter().all(|c| evaluate(c, table, i)),
        Condition::AnyOf(children) => children.iter().any(|c| evaluate(c, table, i)),
    }
}

fn resolve(table: &BarTable, reference: &Ref, i: usize) -> Option<f64> {
    match reference {
        Ref::Column(name) => table.value(name, i),
        Ref::Value(v) => Some(*v).filter(|v| v.is_finite()),
    }
}

fn compare(
    table: &BarTable,
    column: &str,
    reference: &Ref,
    i: usize,
    op: impl Fn(f64, f64) -> bool,
) -> bool {
    match (table.value(column, i), resolve(table, reference, i)) {
        (Some(v), Some(r)) => op(v, r),
        _ => false,
    }
}

fn cross(
    table: &BarTable,
    column: &str,
    reference: &Ref,
    i: usize,
    op: impl Fn(f64, f64, f64, f64) -> bool,
) -> bool {
    if i == 0 {
        return false;
    }
    match (
        table.value(column, i - 1),
        resolve(table, reference, i - 1),
        table.value(column, i),
        resolve(table, reference, i),
    ) {
        (Some(prev_a), Some(prev_b), Some(a), Some(b)) => op(prev_a, prev_b, a, b),
        _ => false,
    }
}

/// All values of `column` over `start..=end`, or `None` if any is undefined.
fn window_values(table: &BarTable, column: &str, start: usize, end: usize) -> Option<Vec<f64>> {
    (start..=end).map(|k| table.value(column, k)).collect()
}

/// Window `i-bars..=i` where every consecutive pair satisfies `step(prev, next)`.
fn monotonic(
    table: &BarTable,
    column: &str,
    bars: usize,
    i: usize,
    step: impl Fn(f64, f64) -> bool,
) -> bool {
    if bars == 0 || i < bars {
        return false;
    }
    match window_values(table, column, i - bars, i) {
        Some(window) => window.windows(2).all(|pair| step(pair[0], pair[1])),
        None => false,
    }
}

fn divergence(
    table: &BarTable,
    price_column: &str,
    indicator: &str,
    lookback: usize,
    i: usize,
    op: impl Fn(f64, f64, f64, f64) -> bool,
) -> bool {
    if lookback == 0 || i < lookback {
        return false;
    }
    let then = i - lookback;
    match (
        table.value(price_column, i),
        table.value(price_column, then),
        table.value(indicator, i),
        table.value(indicator, then),
    ) {
        (Some(p_now), Some(p_then), Some(ind_now), Some(ind_then)) => {
            op(p_now, p_then, ind_now, ind_then)
        }
        _ => false,
    }
}

/// `(close - low) / (high - low)`, undefined for a zero-range bar.
fn range_position(table: &BarTable, i: usize) -> Option<f64> {
    let (high, low, close) = (table.high(i)?, table.low(i)?, table.close(i)?);
    if high == low {
        return None;
    }
    Some((close - low) / (high - low))
}

fn gap(table: &BarTable, i: usize) -> Option<(f64, f64, f64)> {
    if i == 0 {
        return None;
    }
    Some((
        table.value(OPEN, i)?,
        table.close(i - 1)?,
        table.atr(i)?,
    ))
}

fn deviation(table: &BarTable, column: &str, reference: &str, i: usize) -> Option<(f64, f64, f64)> {
    Some((
        table.value(column, i)?,
        table.value(reference, i)?,
        table.atr(i)?,
    ))
}

/// Crosses now and was on the far side of the threshold within the prior
/// `lookback` bars (`i-lookback..i`).
fn state_transition(
    table: &BarTable,
    column: &str,
    lookback: usize,
    i: usize,
    crossed: impl Fn(f64, f64) -> bool,
    was_opposite: impl Fn(f64) -> bool,
) -> bool {
    if lookback == 0 || i < lookback {
        return false;
    }
    let (Some(prev), Some(curr)) = (table.value(column, i - 1), table.value(column, i)) else {
        return false;
    };
    if !crossed(prev, curr) {
        return false;
    }
    ((i - lookback)..i).any(|k| table.value(column, k).is_some_and(&was_opposite))
}

fn held(table: &BarTable, column: &str, bars: usize, i: usize, check: impl Fn(f64) -> bool) -> bool {
    if bars == 0 || i + 1 < bars {
        return false;
    }
    ((i + 1 - bars)..=i).all(|k| table.value(column, k).is_some_and(&check))
}
