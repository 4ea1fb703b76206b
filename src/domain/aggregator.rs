//! Trade aggregation and summary statistics.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;

use crate::domain::exits::population_std;
use crate::domain::trade::{Direction, ExitReason, ProbeTradeResult};

/// Trades sharing an entry date, entry hour and direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeGroup {
    pub open_day: NaiveDate,
    pub open_hour: u32,
    pub direction: Direction,
    pub num_trades: usize,
    pub pnl_mean: f64,
    pub pnl_std: f64,
    pub max_drawdown: f64,
    pub max_profit: f64,
}

/// Group trades by `(entry date, entry hour, direction)`, ordered by key.
pub fn aggregate_trades(trades: &[ProbeTradeResult]) -> Vec<TradeGroup> {
    let mut groups: BTreeMap<(NaiveDate, u32, Direction), Vec<&ProbeTradeResult>> =
        BTreeMap::new();
    for trade in trades {
        let key = (
            trade.entry_time.date(),
            trade.entry_time.hour(),
            trade.direction,
        );
        groups.entry(key).or_default().push(trade);
    }

    groups
        .into_iter()
        .map(|((open_day, open_hour, direction), members)| {
            let pnls: Vec<f64> = members.iter().map(|t| t.pnl_pct).collect();
            TradeGroup {
                open_day,
                open_hour,
                direction,
                num_trades: members.len(),
                pnl_mean: pnls.iter().sum::<f64>() / pnls.len() as f64,
                pnl_std: population_std(&pnls),
                max_drawdown: members
                    .iter()
                    .map(|t| t.max_drawdown_pct)
                    .fold(0.0, f64::max),
                max_profit: members
                    .iter()
                    .map(|t| t.max_profit_pct)
                    .fold(0.0, f64::max),
            }
        })
        .collect()
}

/// Headline statistics over a run's trades. P&L figures are fractions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeSummary {
    pub trades: usize,
    pub won: usize,
    pub lost: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub profit_factor: f64,
    pub avg_bars_held: f64,
    pub exit_reasons: BTreeMap<ExitReason, usize>,
}

impl TradeSummary {
    pub fn compute(trades: &[ProbeTradeResult]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            trades: trades.len(),
            ..Self::default()
        };
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut total_pnl = 0.0_f64;
        let mut total_bars = 0usize;

        for trade in trades {
            let pnl = trade.pnl_pct;
            total_pnl += pnl;
            total_bars += trade.bars_held;
            *summary.exit_reasons.entry(trade.exit_reason).or_insert(0) += 1;

            if pnl > 0.0 {
                summary.won += 1;
                total_wins += pnl;
                summary.largest_win = summary.largest_win.max(pnl);
            } else if pnl < 0.0 {
                summary.lost += 1;
                total_losses += pnl.abs();
                summary.largest_loss = summary.largest_loss.max(pnl.abs());
            } else {
                summary.breakeven += 1;
            }
        }

        let n = trades.len() as f64;
        summary.win_rate = summary.won as f64 / n;
        summary.expectancy = total_pnl / n;
        summary.avg_bars_held = total_bars as f64 / n;
        if summary.won > 0 {
            summary.avg_win = total_wins / summary.won as f64;
        }
        if summary.lost > 0 {
            summary.avg_loss = total_losses / summary.lost as f64;
        }
        summary.profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap()
    }

    fn trade(entry: NaiveDateTime, direction: Direction, pnl: f64, reason: ExitReason) -> ProbeTradeResult {
        ProbeTradeResult {
            entry_time: entry,
            exit_time: entry + chrono::Duration::hours(3),
            entry_price: 100.0,
            exit_price: 100.0 * (1.0 + direction.sign() * pnl),
            direction,
            pnl_pct: pnl,
            bars_held: 3,
            max_drawdown_pct: pnl.min(0.0).abs() + 0.01,
            max_profit_pct: pnl.max(0.0) + 0.01,
            pnl_std: 0.0,
            exit_reason: reason,
            entry_justification: String::new(),
            exit_justification: String::new(),
        }
    }

    #[test]
    fn aggregate_empty() {
        assert!(aggregate_trades(&[]).is_empty());
    }

    #[test]
    fn aggregate_groups_by_day_hour_direction() {
        let trades = vec![
            trade(at(2, 10), Direction::Long, 0.02, ExitReason::Target),
            trade(at(2, 10), Direction::Long, -0.01, ExitReason::StopLoss),
            trade(at(2, 10), Direction::Short, 0.03, ExitReason::Target),
            trade(at(1, 14), Direction::Long, 0.01, ExitReason::TimeStop),
        ];
        let groups = aggregate_trades(&trades);
        assert_eq!(groups.len(), 3);

        assert_eq!(groups[0].open_day, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(groups[0].num_trades, 1);
        assert_eq!(groups[0].pnl_std, 0.0);

        let pair = &groups[1];
        assert_eq!(pair.open_hour, 10);
        assert_eq!(pair.direction, Direction::Long);
        assert_eq!(pair.num_trades, 2);
        assert_relative_eq!(pair.pnl_mean, 0.005);
        assert_relative_eq!(pair.pnl_std, 0.015, epsilon = 1e-12);
        assert_relative_eq!(pair.max_drawdown, 0.02);
        assert_relative_eq!(pair.max_profit, 0.03);

        assert_eq!(groups[2].direction, Direction::Short);
    }

    #[test]
    fn summary_empty() {
        let s = TradeSummary::compute(&[]);
        assert_eq!(s.trades, 0);
        assert_eq!(s.profit_factor, 0.0);
    }

    #[test]
    fn summary_mixed_trades() {
        let trades = vec![
            trade(at(1, 9), Direction::Long, 0.04, ExitReason::Target),
            trade(at(1, 10), Direction::Long, -0.02, ExitReason::StopLoss),
            trade(at(1, 11), Direction::Short, 0.02, ExitReason::Target),
            trade(at(1, 12), Direction::Short, 0.0, ExitReason::SignalExit),
        ];
        let s = TradeSummary::compute(&trades);
        assert_eq!(s.trades, 4);
        assert_eq!((s.won, s.lost, s.breakeven), (2, 1, 1));
        assert_relative_eq!(s.win_rate, 0.5);
        assert_relative_eq!(s.expectancy, 0.01);
        assert_relative_eq!(s.avg_win, 0.03);
        assert_relative_eq!(s.avg_loss, 0.02);
        assert_relative_eq!(s.largest_win, 0.04);
        assert_relative_eq!(s.profit_factor, 3.0);
        assert_relative_eq!(s.avg_bars_held, 3.0);
        assert_eq!(s.exit_reasons.get(&ExitReason::Target), Some(&2));
        assert_eq!(s.exit_reasons.get(&ExitReason::TrailingStop), None);
    }

    #[test]
    fn summary_all_wins_has_infinite_profit_factor() {
        let trades = vec![trade(at(1, 9), Direction::Long, 0.01, ExitReason::Target)];
        assert!(TradeSummary::compute(&trades).profit_factor.is_infinite());
    }
}
