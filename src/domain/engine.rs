//! Bar-by-bar probe engine.
//!
//! Replays one [`StrategyDef`] under one [`RiskProfile`] over a [`BarTable`]
//! and yields closed trades in exit order. The engine is a pure function of
//! its inputs: no I/O, no shared mutable state, and no errors. Undefined data
//! only makes the affected condition or exit mechanism fail to fire.
//!
//! # State machine
//!
//! `Flat -> Armed -> Open -> Flat`. For each bar `i`:
//!
//! 1. `Armed` from the previous bar fills at `open[i]` when the open and the
//!    table's ATR at `i` are both defined and positive; otherwise the signal
//!    is dropped. The fill bar is consumed either way.
//! 2. `Open` counts the bar, updates excursions, then checks stop, target,
//!    trailing, time and signal exits in that order. An exit emits a result
//!    and the exit bar does not evaluate entries.
//! 3. `Flat` evaluates `entry_long` then `entry_short` (gate permitting) when
//!    a next bar exists to fill on.
//!
//! Whatever is open or armed after the last bar is discarded.

use tracing::{debug, warn};

use crate::domain::bar_table::BarTable;
use crate::domain::condition::Condition;
use crate::domain::exits::{Exit, OpenTrade};
use crate::domain::risk_profile::{ExitParams, RiskProfile};
use crate::domain::strategy::StrategyDef;
use crate::domain::trade::{Direction, ExitReason, ProbeTradeResult};

/// Number of required-indicator values quoted in an entry justification.
const MAX_SNAPSHOTS: usize = 6;

#[derive(Debug, Clone)]
pub struct ProbeEngine<'s> {
    strategy: &'s StrategyDef,
    profile: &'s RiskProfile,
    params: ExitParams,
}

impl<'s> ProbeEngine<'s> {
    pub fn new(strategy: &'s StrategyDef, profile: &'s RiskProfile) -> Self {
        Self {
            strategy,
            profile,
            params: ExitParams::scaled(strategy, profile),
        }
    }

    /// Lazily replay the table; each item is one closed trade.
    pub fn trades<'a>(&'a self, table: &'a BarTable) -> ProbeRun<'a> {
        let done = if table.is_empty() {
            warn!(strategy = %self.strategy.name, "empty bar table, nothing to simulate");
            true
        } else if !self.strategy.has_usable_entry() {
            warn!(
                strategy = %self.strategy.name,
                direction = %self.strategy.direction,
                "no entry conditions on any permitted side"
            );
            true
        } else {
            false
        };
        ProbeRun {
            engine: self,
            table,
            index: 0,
            state: State::Flat,
            done,
        }
    }

    pub fn run(&self, table: &BarTable) -> Vec<ProbeTradeResult> {
        self.trades(table).collect()
    }

    fn entry_signal(&self, table: &BarTable, i: usize) -> Option<Direction> {
        [Direction::Long, Direction::Short]
            .into_iter()
            .find(|&direction| {
                self.strategy.can_enter(direction)
                    && all_hold(self.strategy.entry_conditions(direction), table, i)
            })
    }

    fn fill(&self, table: &BarTable, direction: Direction, i: usize) -> Option<OpenTrade> {
        let open = table.open(i).filter(|open| *open > 0.0);
        let atr = table.atr(i).filter(|atr| *atr > 0.0);
        let (Some(price), Some(atr)) = (open, atr) else {
            debug!(
                strategy = %self.strategy.name,
                bar = i,
                "dropping {direction} signal: open or {} not positive at fill bar",
                table.atr_column()
            );
            return None;
        };
        let mut trade = OpenTrade::open(direction, i, price, atr, &self.params);
        trade.entry_justification = self.describe_entry(table, direction, price, atr, i);
        debug!(
            strategy = %self.strategy.name,
            bar = i,
            "entered {direction} at {price:.4}, atr={atr:.4}"
        );
        Some(trade)
    }

    fn signal_exit(&self, trade: &OpenTrade, table: &BarTable, i: usize) -> Option<Exit> {
        let close = table.close(i)?;
        self.strategy
            .exit_conditions(trade.direction)
            .iter()
            .any(|condition| condition.evaluate(table, i))
            .then_some(Exit {
                reason: ExitReason::SignalExit,
                price: close,
            })
    }

    fn close(&self, table: &BarTable, trade: OpenTrade, exit: Exit, i: usize) -> ProbeTradeResult {
        let timestamps = table.timestamps();
        let result = ProbeTradeResult {
            entry_time: timestamps[trade.entry_index],
            exit_time: timestamps[i],
            entry_price: trade.entry_price,
            exit_price: exit.price,
            direction: trade.direction,
            pnl_pct: trade.pnl_pct(exit.price),
            bars_held: trade.bars_held,
            max_drawdown_pct: trade.max_drawdown_pct(),
            max_profit_pct: trade.max_profit_pct(),
            pnl_std: trade.pnl_std(),
            exit_reason: exit.reason,
            exit_justification: trade.describe_exit(&exit),
            entry_justification: trade.entry_justification,
        };
        debug!(
            strategy = %self.strategy.name,
            bar = i,
            reason = %result.exit_reason,
            "exited {} with pnl {:.4}%",
            result.direction,
            result.pnl_pct * 100.0
        );
        result
    }

    fn describe_entry(
        &self,
        table: &BarTable,
        direction: Direction,
        price: f64,
        atr: f64,
        i: usize,
    ) -> String {
        let mut text = format!(
            "Strategy '{}' {direction} entry at {price:.4} (ATR={atr:.4}, risk={})",
            self.strategy.display_name, self.profile.name
        );
        let snapshots: Vec<String> = self
            .strategy
            .required_indicators
            .iter()
            .filter_map(|column| {
                table
                    .value(column, i)
                    .map(|value| format!("{column}={value:.4}"))
            })
            .take(MAX_SNAPSHOTS)
            .collect();
        if !snapshots.is_empty() {
            text.push_str(&format!(" [{}]", snapshots.join(", ")));
        }
        text
    }
}

/// Replay a strategy over a table and collect every closed trade.
pub fn run(
    strategy: &StrategyDef,
    profile: &RiskProfile,
    table: &BarTable,
) -> Vec<ProbeTradeResult> {
    ProbeEngine::new(strategy, profile).run(table)
}

/// An entry list fires only when it is non-empty and every condition holds.
fn all_hold(conditions: &[Condition], table: &BarTable, i: usize) -> bool {
    !conditions.is_empty() && conditions.iter().all(|c| c.evaluate(table, i))
}

#[derive(Debug)]
enum State {
    Flat,
    Armed(Direction),
    Open(OpenTrade),
}

/// Iterator over the trades of one engine run.
#[derive(Debug)]
pub struct ProbeRun<'a> {
    engine: &'a ProbeEngine<'a>,
    table: &'a BarTable,
    index: usize,
    state: State,
    done: bool,
}

impl ProbeRun<'_> {
    fn step(&mut self, i: usize) -> Option<ProbeTradeResult> {
        let engine = self.engine;
        let table = self.table;
        match std::mem::replace(&mut self.state, State::Flat) {
            State::Armed(direction) => {
                if let Some(trade) = engine.fill(table, direction, i) {
                    self.state = State::Open(trade);
                }
                None
            }
            State::Open(mut trade) => {
                let (high, low, close) = (table.high(i), table.low(i), table.close(i));
                trade.observe(high, low, close);
                let exit = trade
                    .check_mechanical(high, low, close)
                    .or_else(|| engine.signal_exit(&trade, table, i));
                match exit {
                    Some(exit) => Some(engine.close(table, trade, exit, i)),
                    None => {
                        self.state = State::Open(trade);
                        None
                    }
                }
            }
            State::Flat => {
                if i + 1 < table.len() {
                    if let Some(direction) = engine.entry_signal(table, i) {
                        debug!(strategy = %engine.strategy.name, bar = i, "{direction} signal armed");
                        self.state = State::Armed(direction);
                    }
                }
                None
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        match std::mem::replace(&mut self.state, State::Flat) {
            State::Open(trade) => debug!(
                strategy = %self.engine.strategy.name,
                entry_bar = trade.entry_index,
                "discarding open {} trade at end of data",
                trade.direction
            ),
            State::Armed(direction) => debug!(
                strategy = %self.engine.strategy.name,
                "discarding unfilled {direction} signal at end of data"
            ),
            State::Flat => {}
        }
    }
}

impl Iterator for ProbeRun<'_> {
    type Item = ProbeTradeResult;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let i = self.index;
            if i >= self.table.len() {
                self.finish();
                break;
            }
            self.index += 1;
            if let Some(result) = self.step(i) {
                return Some(result);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for ProbeRun<'_> {}
