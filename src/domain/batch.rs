//! Batch probing: every selected strategy under every risk profile over one
//! instrument's table, plus the flat records the report writers consume.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::domain::aggregator::aggregate_trades;
use crate::domain::bar_table::BarTable;
use crate::domain::engine::ProbeEngine;
use crate::domain::risk_profile::RiskProfile;
use crate::domain::strategy::StrategyDef;
use crate::domain::trade::{Direction, ExitReason, ProbeTradeResult};

/// Trades produced by one (strategy, risk profile) pair.
#[derive(Debug, Clone)]
pub struct StrategyRun {
    pub strategy: Arc<StrategyDef>,
    pub profile: RiskProfile,
    pub trades: Vec<ProbeTradeResult>,
}

/// Run each strategy under each profile. Pairs run in parallel; the result
/// keeps strategy-major, profile-minor order. ATR comes from the table's
/// configured ATR column.
pub fn run_batch(
    strategies: &[Arc<StrategyDef>],
    profiles: &[RiskProfile],
    table: &BarTable,
) -> Vec<StrategyRun> {
    let jobs: Vec<(&Arc<StrategyDef>, &RiskProfile)> = strategies
        .iter()
        .flat_map(|s| profiles.iter().map(move |p| (s, p)))
        .collect();

    jobs.par_iter()
        .map(|(strategy, profile)| {
            let trades = ProbeEngine::new(strategy, profile).run(table);
            debug!(
                strategy = %strategy.name,
                profile = %profile.name,
                trades = trades.len(),
                "strategy run complete"
            );
            StrategyRun {
                strategy: Arc::clone(strategy),
                profile: (*profile).clone(),
                trades,
            }
        })
        .collect()
}

/// One trade row of the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub strategy_id: u32,
    pub strategy_name: String,
    pub risk_profile: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl_pct: f64,
    pub bars_held: usize,
    pub max_drawdown_pct: f64,
    pub max_profit_pct: f64,
    pub pnl_std: f64,
    pub exit_reason: ExitReason,
    pub entry_justification: String,
    pub exit_justification: String,
}

/// One aggregate row of the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub symbol: String,
    pub strategy_id: u32,
    pub strategy_name: String,
    pub risk_profile: String,
    pub open_day: NaiveDate,
    pub open_hour: u32,
    pub direction: Direction,
    pub num_trades: usize,
    pub pnl_mean: f64,
    pub pnl_std: f64,
    pub max_drawdown: f64,
    pub max_profit: f64,
}

pub fn trade_records(symbol: &str, runs: &[StrategyRun]) -> Vec<TradeRecord> {
    runs.iter()
        .flat_map(|run| {
            run.trades.iter().map(move |t| TradeRecord {
                symbol: symbol.to_string(),
                strategy_id: run.strategy.id,
                strategy_name: run.strategy.name.clone(),
                risk_profile: run.profile.name.clone(),
                direction: t.direction,
                entry_time: t.entry_time,
                exit_time: t.exit_time,
                entry_price: t.entry_price,
                exit_price: t.exit_price,
                pnl_pct: t.pnl_pct,
                bars_held: t.bars_held,
                max_drawdown_pct: t.max_drawdown_pct,
                max_profit_pct: t.max_profit_pct,
                pnl_std: t.pnl_std,
                exit_reason: t.exit_reason,
                entry_justification: t.entry_justification.clone(),
                exit_justification: t.exit_justification.clone(),
            })
        })
        .collect()
}

/// Aggregate each run separately and label the groups with their run.
pub fn group_records(symbol: &str, runs: &[StrategyRun]) -> Vec<GroupRecord> {
    runs.iter()
        .flat_map(|run| {
            aggregate_trades(&run.trades)
                .into_iter()
                .map(move |g| GroupRecord {
                    symbol: symbol.to_string(),
                    strategy_id: run.strategy.id,
                    strategy_name: run.strategy.name.clone(),
                    risk_profile: run.profile.name.clone(),
                    open_day: g.open_day,
                    open_hour: g.open_hour,
                    direction: g.direction,
                    num_trades: g.num_trades,
                    pnl_mean: g.pnl_mean,
                    pnl_std: g.pnl_std,
                    max_drawdown: g.max_drawdown,
                    max_profit: g.max_profit,
                })
        })
        .collect()
}
