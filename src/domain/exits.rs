//! Per-trade exit bookkeeping for the probe engine.
//!
//! An [`OpenTrade`] lives from the fill bar until the bar that closes it. The
//! engine calls [`OpenTrade::observe`] once per bar after the fill, then
//! [`OpenTrade::check_mechanical`]; signal exits are checked by the engine
//! afterwards since they have the lowest priority.

use crate::domain::risk_profile::ExitParams;
use crate::domain::trade::{Direction, ExitReason};

/// A triggered exit and the price it fills at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exit {
    pub reason: ExitReason,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct OpenTrade {
    pub direction: Direction,
    pub entry_index: usize,
    pub entry_price: f64,
    pub atr: f64,
    pub bars_held: usize,
    stop_dist: Option<f64>,
    target_dist: Option<f64>,
    trail_dist: Option<f64>,
    time_limit: Option<usize>,
    best_price: f64,
    worst_price: f64,
    best_close: f64,
    bar_pnls: Vec<f64>,
    pub entry_justification: String,
}

fn distance(mult: Option<f64>, atr: f64) -> Option<f64> {
    mult.map(|m| m * atr).filter(|d| d.is_finite() && *d > 0.0)
}

impl OpenTrade {
    pub fn open(
        direction: Direction,
        entry_index: usize,
        entry_price: f64,
        atr: f64,
        params: &ExitParams,
    ) -> Self {
        Self {
            direction,
            entry_index,
            entry_price,
            atr,
            bars_held: 0,
            stop_dist: distance(params.stop_mult, atr),
            target_dist: distance(params.target_mult, atr),
            trail_dist: distance(params.trailing_mult, atr),
            time_limit: params.time_stop_bars,
            best_price: entry_price,
            worst_price: entry_price,
            best_close: entry_price,
            bar_pnls: Vec::new(),
            entry_justification: String::new(),
        }
    }

    /// Advance one bar: count it and fold its extremes into the excursions.
    pub fn observe(&mut self, high: Option<f64>, low: Option<f64>, close: Option<f64>) {
        self.bars_held += 1;
        let (favourable, adverse) = match self.direction {
            Direction::Long => (high, low),
            Direction::Short => (low, high),
        };
        if let Some(price) = favourable {
            if self.direction.pnl_pct(self.best_price, price) > 0.0 {
                self.best_price = price;
            }
        }
        if let Some(price) = adverse {
            if self.direction.pnl_pct(self.worst_price, price) < 0.0 {
                self.worst_price = price;
            }
        }
        if let Some(close) = close {
            self.bar_pnls.push(self.direction.pnl_pct(self.entry_price, close));
        }
    }

    /// Stop, target, trailing and time exits, in that order.
    pub fn check_mechanical(
        &mut self,
        high: Option<f64>,
        low: Option<f64>,
        close: Option<f64>,
    ) -> Option<Exit> {
        let sign = self.direction.sign();
        let (favourable, adverse) = match self.direction {
            Direction::Long => (high, low),
            Direction::Short => (low, high),
        };
        // reached: price moved to or beyond `level` in the adverse direction
        let breached = |level: f64| adverse.is_some_and(|p| sign * (p - level) <= 0.0);

        if let Some(dist) = self.stop_dist {
            let level = self.entry_price - sign * dist;
            if breached(level) {
                return Some(Exit {
                    reason: ExitReason::StopLoss,
                    price: level,
                });
            }
        }

        if let Some(dist) = self.target_dist {
            let level = self.entry_price + sign * dist;
            if favourable.is_some_and(|p| sign * (p - level) >= 0.0) {
                return Some(Exit {
                    reason: ExitReason::Target,
                    price: level,
                });
            }
        }

        if let Some(dist) = self.trail_dist {
            let level = self.trailing_level(dist);
            if breached(level) {
                return Some(Exit {
                    reason: ExitReason::TrailingStop,
                    price: level,
                });
            }
        }
        if let Some(close) = close {
            if self.direction.pnl_pct(self.best_close, close) > 0.0 {
                self.best_close = close;
            }
        }

        if let (Some(limit), Some(close)) = (self.time_limit, close) {
            if self.bars_held >= limit {
                return Some(Exit {
                    reason: ExitReason::TimeStop,
                    price: close,
                });
            }
        }

        None
    }

    fn trailing_level(&self, dist: f64) -> f64 {
        self.best_close - self.direction.sign() * dist
    }

    pub fn pnl_pct(&self, exit_price: f64) -> f64 {
        self.direction.pnl_pct(self.entry_price, exit_price)
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        -self.direction.pnl_pct(self.entry_price, self.worst_price)
    }

    pub fn max_profit_pct(&self) -> f64 {
        self.direction.pnl_pct(self.entry_price, self.best_price)
    }

    /// Population standard deviation of the per-bar close P&L.
    pub fn pnl_std(&self) -> f64 {
        population_std(&self.bar_pnls)
    }

    pub fn describe_exit(&self, exit: &Exit) -> String {
        let mut parts = vec![format!("Exit reason: {}", exit.reason)];
        match exit.reason {
            ExitReason::StopLoss => {
                if let Some(dist) = self.stop_dist {
                    parts.push(format!(
                        "stop distance={dist:.4} ({:.1}x ATR)",
                        dist / self.atr
                    ));
                }
            }
            ExitReason::Target => {
                if let Some(dist) = self.target_dist {
                    parts.push(format!(
                        "target distance={dist:.4} ({:.1}x ATR)",
                        dist / self.atr
                    ));
                }
            }
            ExitReason::TrailingStop => {
                parts.push(format!("trailing stop at {:.4}", exit.price));
            }
            ExitReason::TimeStop => {
                let limit = self.time_limit.unwrap_or(self.bars_held);
                parts.push(format!("after {} bars (limit={limit})", self.bars_held));
            }
            ExitReason::SignalExit => {
                parts.push(format!("signal-based exit at close={:.4}", exit.price));
            }
        }
        parts.push(format!(
            "exit_price={:.4}, pnl={:+.2}%",
            exit.price,
            self.pnl_pct(exit.price) * 100.0
        ));
        parts.join("; ")
    }
}

/// Population (ddof = 0) standard deviation; `0.0` for fewer than two values.
pub fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params(stop: Option<f64>, target: Option<f64>, trail: Option<f64>, time: Option<usize>) -> ExitParams {
        ExitParams {
            stop_mult: stop,
            target_mult: target,
            trailing_mult: trail,
            time_stop_bars: time,
        }
    }

    fn step(trade: &mut OpenTrade, high: f64, low: f64, close: f64) -> Option<Exit> {
        trade.observe(Some(high), Some(low), Some(close));
        trade.check_mechanical(Some(high), Some(low), Some(close))
    }

    #[test]
    fn long_stop_fills_at_level() {
        let mut t = OpenTrade::open(Direction::Long, 0, 100.0, 2.0, &params(Some(2.0), None, None, None));
        assert_eq!(step(&mut t, 101.0, 97.0, 98.0), None);
        let exit = step(&mut t, 99.0, 95.5, 96.0).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_relative_eq!(exit.price, 96.0);
        assert_relative_eq!(t.pnl_pct(exit.price), -0.04);
    }

    #[test]
    fn short_target_fills_at_level() {
        let mut t = OpenTrade::open(Direction::Short, 0, 100.0, 2.0, &params(None, Some(2.0), None, None));
        let exit = step(&mut t, 100.5, 95.0, 97.0).unwrap();
        assert_eq!(exit.reason, ExitReason::Target);
        assert_relative_eq!(exit.price, 96.0);
        assert_relative_eq!(t.pnl_pct(exit.price), 0.04);
    }

    #[test]
    fn stop_beats_target_on_same_bar() {
        let mut t = OpenTrade::open(Direction::Long, 0, 100.0, 1.0, &params(Some(1.0), Some(1.0), None, None));
        let exit = step(&mut t, 102.0, 98.0, 100.0).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
    }

    #[test]
    fn trailing_follows_best_close() {
        let mut t = OpenTrade::open(Direction::Long, 0, 100.0, 1.0, &params(None, None, Some(2.0), None));
        // best close 100 -> level 98
        assert_eq!(step(&mut t, 105.0, 99.0, 104.0), None);
        // best close 104 -> level 102
        assert_eq!(step(&mut t, 106.0, 102.5, 105.0), None);
        // best close 105 -> level 103
        let exit = step(&mut t, 105.5, 102.0, 103.0).unwrap();
        assert_eq!(exit.reason, ExitReason::TrailingStop);
        assert_relative_eq!(exit.price, 103.0);
    }

    #[test]
    fn trailing_does_not_use_current_close() {
        let mut t = OpenTrade::open(Direction::Short, 0, 100.0, 1.0, &params(None, None, Some(1.0), None));
        // level 101 from the entry; this bar's low close must not tighten it first
        assert_eq!(step(&mut t, 100.9, 95.0, 95.0), None);
        // level now 96
        let exit = step(&mut t, 96.5, 94.0, 96.2).unwrap();
        assert_eq!(exit.reason, ExitReason::TrailingStop);
        assert_relative_eq!(exit.price, 96.0);
    }

    #[test]
    fn time_stop_after_limit() {
        let mut t = OpenTrade::open(Direction::Long, 0, 100.0, 1.0, &params(None, None, None, Some(3)));
        assert_eq!(step(&mut t, 101.0, 99.0, 100.5), None);
        assert_eq!(step(&mut t, 101.0, 99.0, 100.5), None);
        let exit = step(&mut t, 102.0, 100.0, 101.0).unwrap();
        assert_eq!(exit.reason, ExitReason::TimeStop);
        assert_relative_eq!(exit.price, 101.0);
        assert_eq!(t.bars_held, 3);
    }

    #[test]
    fn undefined_bar_cannot_trigger() {
        let mut t = OpenTrade::open(Direction::Long, 0, 100.0, 1.0, &params(Some(1.0), None, None, Some(1)));
        t.observe(None, None, None);
        assert_eq!(t.check_mechanical(None, None, None), None);
        assert_eq!(t.bars_held, 1);
    }

    #[test]
    fn excursions_are_magnitudes() {
        let mut t = OpenTrade::open(Direction::Short, 0, 100.0, 1.0, &params(None, None, None, None));
        step(&mut t, 103.0, 98.0, 99.0);
        step(&mut t, 101.0, 95.0, 96.0);
        assert_relative_eq!(t.max_drawdown_pct(), 0.03);
        assert_relative_eq!(t.max_profit_pct(), 0.05);
    }

    #[test]
    fn pnl_std_population() {
        let mut t = OpenTrade::open(Direction::Long, 0, 100.0, 1.0, &params(None, None, None, None));
        assert_eq!(t.pnl_std(), 0.0);
        step(&mut t, 103.0, 99.0, 102.0);
        assert_eq!(t.pnl_std(), 0.0);
        step(&mut t, 105.0, 101.0, 104.0);
        assert_relative_eq!(t.pnl_std(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn exit_description_mentions_distance() {
        let t = OpenTrade::open(Direction::Long, 0, 100.0, 2.0, &params(Some(2.0), None, None, None));
        let text = t.describe_exit(&Exit {
            reason: ExitReason::StopLoss,
            price: 96.0,
        });
        assert!(text.starts_with("Exit reason: stop_loss"));
        assert!(text.contains("stop distance=4.0000 (2.0x ATR)"));
        assert!(text.ends_with("exit_price=96.0000, pnl=-4.00%"));
    }

    #[test]
    fn population_std_values() {
        assert_eq!(population_std(&[]), 0.0);
        assert_eq!(population_std(&[1.0]), 0.0);
        assert_relative_eq!(population_std(&[1.0, 3.0]), 1.0);
    }
}
