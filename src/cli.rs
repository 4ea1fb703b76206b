//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::aggregator::TradeSummary;
use crate::domain::bar_table::{ATR_COLUMN, BarTable};
use crate::domain::batch::{self, StrategyRun};
use crate::domain::config_validation::{self as validation, CONDITION_KEYS};
use crate::domain::error::ProbeError;
use crate::domain::registry::StrategyRegistry;
use crate::domain::risk_profile::{RiskProfile, RiskProfileSet};
use crate::domain::strategy::StrategyDef;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "stratprobe", about = "Bar-by-bar strategy probe")]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe strategies against one instrument
    Run {
        #[arg(short, long)]
        strategies: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "low,medium,high")]
        risk_profiles: String,
        /// Comma-separated strategy ids; all strategies when omitted
        #[arg(long)]
        ids: Option<String>,
        /// Column read by ATR-sized conditions and exits
        #[arg(long, default_value = ATR_COLUMN)]
        atr_column: String,
        /// Trade CSV destination
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Aggregate CSV destination
        #[arg(long)]
        aggregate: Option<PathBuf>,
    },
    /// Validate a strategy file
    Validate {
        #[arg(short, long)]
        strategies: PathBuf,
    },
    /// List the strategies defined in a file
    List {
        #[arg(short, long)]
        strategies: PathBuf,
    },
    /// List the symbols available in a data directory
    ListSymbols {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            strategies,
            data,
            symbol,
            risk_profiles,
            ids,
            atr_column,
            output,
            aggregate,
        } => run_probe(&ProbeArgs {
            strategies,
            data,
            symbol,
            risk_profiles,
            ids,
            atr_column,
            output,
            aggregate,
        }),
        Command::Validate { strategies } => run_validate(&strategies),
        Command::List { strategies } => run_list(&strategies),
        Command::ListSymbols { data } => run_list_symbols(data),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = ProbeError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Build one strategy from its `[strategy.<name>]` section.
pub fn build_strategy(config: &dyn ConfigPort, section: &str) -> Result<StrategyDef, ProbeError> {
    validation::validate_strategy_section(config, section)?;

    let name = validation::strategy_name(section)?;
    let mut strategy = StrategyDef::new(validation::strategy_id(config, section)?, name);
    if let Some(display_name) = config
        .get_string(section, "display_name")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        strategy.display_name = display_name;
    }
    strategy.philosophy = config
        .get_string(section, "philosophy")
        .unwrap_or_default()
        .trim()
        .to_string();
    strategy.category = validation::category(config, section)?;
    strategy.tags = validation::string_list(config, section, "tags");
    strategy.direction = validation::direction_gate(config, section)?;
    strategy.entry_long = validation::condition_list(config, section, "entry_long")?;
    strategy.entry_short = validation::condition_list(config, section, "entry_short")?;
    strategy.exit_long = validation::condition_list(config, section, "exit_long")?;
    strategy.exit_short = validation::condition_list(config, section, "exit_short")?;
    strategy.atr_stop_mult = validation::atr_multiplier(config, section, "atr_stop_mult")?;
    strategy.atr_target_mult = validation::atr_multiplier(config, section, "atr_target_mult")?;
    strategy.trailing_atr_mult = validation::atr_multiplier(config, section, "trailing_atr_mult")?;
    strategy.time_stop_bars = validation::time_stop_bars(config, section)?;
    strategy.required_indicators = validation::string_list(config, section, "required_indicators");
    strategy.details = validation::details(config, section);
    Ok(strategy)
}

/// Build and register every strategy section in the file.
pub fn load_registry(config: &dyn ConfigPort) -> Result<StrategyRegistry, ProbeError> {
    let strategies = validation::strategy_sections(config)
        .iter()
        .map(|section| build_strategy(config, section))
        .collect::<Result<Vec<_>, _>>()?;
    let mut registry = StrategyRegistry::new();
    registry.register_all(strategies)?;
    Ok(registry)
}

/// Preset profiles plus any `[risk_profiles]` overrides.
pub fn build_risk_profiles(config: &dyn ConfigPort) -> Result<RiskProfileSet, ProbeError> {
    let mut profiles = RiskProfileSet::default();
    for (name, scale) in validation::risk_profile_scales(config)? {
        profiles.insert(RiskProfile::new(name, scale));
    }
    Ok(profiles)
}

/// Strategies named by a comma-separated id list, in list order; all of them
/// when no list is given.
pub fn select_strategies(
    registry: &StrategyRegistry,
    ids: Option<&str>,
) -> Result<Vec<Arc<StrategyDef>>, ProbeError> {
    let Some(ids) = ids else {
        return Ok(registry.all());
    };
    let invalid = |reason: String| ProbeError::ConfigInvalid {
        section: "command line".to_string(),
        key: "ids".to_string(),
        reason,
    };
    ids.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| {
            let id = raw
                .parse::<u32>()
                .map_err(|_| invalid(format!("'{raw}' is not a strategy id")))?;
            registry
                .get(id)
                .ok_or_else(|| invalid(format!("no strategy with id {id}")))
        })
        .collect()
}

/// Columns a strategy reads or declares that the table does not have,
/// including the table's ATR column.
pub fn missing_columns(strategy: &StrategyDef, table: &BarTable) -> Vec<String> {
    let mut wanted = strategy.referenced_columns();
    wanted.extend(strategy.required_indicators.iter().cloned());
    wanted.insert(table.atr_column().to_string());
    wanted
        .into_iter()
        .filter(|column| !table.has_column(column))
        .collect()
}

struct ProbeArgs {
    strategies: PathBuf,
    data: PathBuf,
    symbol: String,
    risk_profiles: String,
    ids: Option<String>,
    atr_column: String,
    output: Option<PathBuf>,
    aggregate: Option<PathBuf>,
}

fn run_probe(args: &ProbeArgs) -> ExitCode {
    // Stage 1: strategies and profiles
    eprintln!("Loading strategies from {}", args.strategies.display());
    let config = match load_config(&args.strategies) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let registry = match load_registry(&config) {
        Ok(r) => r,
        Err(e) => return report_error(&e),
    };
    let strategies = match select_strategies(&registry, args.ids.as_deref()) {
        Ok(s) => s,
        Err(e) => return report_error(&e),
    };
    if strategies.is_empty() {
        eprintln!("error: no strategies to run");
        return ExitCode::from(2);
    }
    let profile_names: Vec<&str> = args.risk_profiles.split(',').collect();
    let profiles = match build_risk_profiles(&config).and_then(|set| set.select(&profile_names)) {
        Ok(p) => p,
        Err(e) => return report_error(&e),
    };

    // Stage 2: bar table
    let data_port = CsvAdapter::new(args.data.clone());
    let mut table = match data_port.load_table(&args.symbol) {
        Ok(t) => t,
        Err(e) => return report_error(&e),
    };
    table.set_atr_column(&args.atr_column);
    eprintln!("Loaded {} bars for {}", table.len(), args.symbol);

    for strategy in &strategies {
        let missing = missing_columns(strategy, &table);
        if !missing.is_empty() {
            warn!(strategy = %strategy.name, missing = ?missing, "table lacks referenced columns");
            eprintln!(
                "warning: {} references missing columns: {}",
                strategy.name,
                missing.join(", ")
            );
        }
    }

    // Stage 3: simulate
    eprintln!(
        "Running {} strategies x {} risk profiles",
        strategies.len(),
        profiles.len()
    );
    let runs = batch::run_batch(&strategies, &profiles, &table);
    let total: usize = runs.iter().map(|r| r.trades.len()).sum();
    info!(symbol = %args.symbol, runs = runs.len(), trades = total, "probe complete");

    print_summary(&runs);

    // Stage 4: export
    let reporter = CsvReportAdapter::new();
    if let Some(path) = &args.output {
        let records = batch::trade_records(&args.symbol, &runs);
        if let Err(e) = reporter.write_trades(&records, path) {
            return report_error(&e);
        }
        eprintln!("Trades written to: {}", path.display());
    }
    if let Some(path) = &args.aggregate {
        let records = batch::group_records(&args.symbol, &runs);
        if let Err(e) = reporter.write_groups(&records, path) {
            return report_error(&e);
        }
        eprintln!("Aggregates written to: {}", path.display());
    }

    ExitCode::SUCCESS
}

fn print_summary(runs: &[StrategyRun]) {
    eprintln!("\n=== Probe Results ===");
    for run in runs {
        let s = TradeSummary::compute(&run.trades);
        eprintln!(
            "  [{:>3}] {:<28} {:<8} {:>4} trades, {:>5.1}% win, expectancy {:+.2}%, PF {:.2}, avg hold {:.1} bars",
            run.strategy.id,
            run.strategy.name,
            run.profile.name,
            s.trades,
            s.win_rate * 100.0,
            s.expectancy * 100.0,
            s.profit_factor,
            s.avg_bars_held,
        );
        if !s.exit_reasons.is_empty() {
            let reasons: Vec<String> = s
                .exit_reasons
                .iter()
                .map(|(reason, count)| format!("{reason}={count}"))
                .collect();
            eprintln!("        exits: {}", reasons.join(", "));
        }
    }
}

fn report_error(err: &ProbeError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

fn run_validate(strategies_path: &PathBuf) -> ExitCode {
    eprintln!("Validating strategies: {}", strategies_path.display());
    let config = match load_config(strategies_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let sections = validation::strategy_sections(&config);
    if sections.is_empty() {
        eprintln!("error: no [strategy.<name>] sections found");
        return ExitCode::from(2);
    }

    let mut first_failure: Option<ExitCode> = None;
    let mut built = Vec::with_capacity(sections.len());
    for section in &sections {
        match build_strategy(&config, section) {
            Ok(strategy) => {
                eprintln!("\n[{}] {} ({})", strategy.id, strategy.name, strategy.direction);
                for key in CONDITION_KEYS {
                    let conditions = match key {
                        "entry_long" => &strategy.entry_long,
                        "entry_short" => &strategy.entry_short,
                        "exit_long" => &strategy.exit_long,
                        _ => &strategy.exit_short,
                    };
                    for condition in conditions {
                        eprintln!("  {key:<12} {condition}");
                    }
                }
                if !strategy.has_usable_entry() {
                    eprintln!("  warning: no entry conditions on any permitted side");
                }
                built.push(strategy);
            }
            Err(e) => {
                eprintln!("\n{section}\n  error: {e}");
                if first_failure.is_none() {
                    first_failure = Some(ExitCode::from(&e));
                }
            }
        }
    }
    if let Some(code) = first_failure {
        return code;
    }

    if let Err(e) = StrategyRegistry::new().register_all(built) {
        return report_error(&e);
    }
    if let Err(e) = build_risk_profiles(&config) {
        return report_error(&e);
    }

    eprintln!("\n{} strategies are valid.", sections.len());
    ExitCode::SUCCESS
}

fn run_list(strategies_path: &PathBuf) -> ExitCode {
    let config = match load_config(strategies_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let registry = match load_registry(&config) {
        Ok(r) => r,
        Err(e) => return report_error(&e),
    };

    for strategy in registry.all() {
        println!(
            "{:>4}  {:<28} {:<15} {:<11} {}",
            strategy.id,
            strategy.name,
            strategy.category.as_str(),
            strategy.direction.as_str(),
            strategy.display_name
        );
    }
    eprintln!("{} strategies", registry.len());
    ExitCode::SUCCESS
}

fn run_list_symbols(data: PathBuf) -> ExitCode {
    let symbols = match CsvAdapter::new(data.clone()).list_symbols() {
        Ok(s) => s,
        Err(e) => return report_error(&e),
    };
    if symbols.is_empty() {
        eprintln!("No symbols found in {}", data.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}
