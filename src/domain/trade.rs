//! Trade direction, exit reasons and the closed-trade record.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    /// `+1.0` for long, `-1.0` for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Return of moving from `entry` to `exit` in this direction.
    pub fn pnl_pct(self, entry: f64, exit: f64) -> f64 {
        self.sign() * (exit - entry) / entry
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a trade closed. Variant order is the engine's evaluation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    Target,
    TrailingStop,
    TimeStop,
    SignalExit,
}

impl ExitReason {
    pub const ALL: [ExitReason; 5] = [
        ExitReason::StopLoss,
        ExitReason::Target,
        ExitReason::TrailingStop,
        ExitReason::TimeStop,
        ExitReason::SignalExit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::Target => "target",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::TimeStop => "time_stop",
            ExitReason::SignalExit => "signal_exit",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One closed simulated trade.
///
/// `pnl_pct`, `max_drawdown_pct` and `max_profit_pct` are fractions of the
/// entry price (`0.04` is four percent). `max_drawdown_pct` and
/// `max_profit_pct` are excursion magnitudes and never negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeTradeResult {
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub direction: Direction,
    pub pnl_pct: f64,
    pub bars_held: usize,
    pub max_drawdown_pct: f64,
    pub max_profit_pct: f64,
    pub pnl_std: f64,
    pub exit_reason: ExitReason,
    pub entry_justification: String,
    pub exit_justification: String,
}

impl ProbeTradeResult {
    pub fn is_win(&self) -> bool {
        self.pnl_pct > 0.0
    }
}
