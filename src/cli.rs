//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestEngine, BacktestResult, EngineConfig};
use crate::domain::config_validation::{
    DataSettings, account_config, data_settings, engine_config, parse_timeframe, strategy_config,
};
use crate::domain::error::LevtraderError;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::PortfolioConfig;
use crate::domain::strategy::{ClusterMacdStrategy, StrategyConfig};
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "levtrader", about = "Leveraged single-instrument backtester")]
pub struct Cli {
    /// Log at info level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Reports directory, overrides [data] reports_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for a symbol, or every symbol of a timeframe
    Info {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// List symbols with data for a timeframe
    ListSymbols {
        #[arg(long)]
        timeframe: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Install the stderr log subscriber. Default level is `warn`, or `info`
/// with `--verbose`; `RUST_LOG` overrides both.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests calling run repeatedly) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            symbol,
            timeframe,
            data_dir,
            output,
            dry_run,
        } => {
            let overrides = Overrides {
                symbol,
                timeframe,
                data_dir,
                reports_dir: output,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_backtest(&config, &overrides)
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info {
            symbol,
            timeframe,
            data_dir,
            config,
        } => {
            let overrides = Overrides {
                symbol,
                timeframe,
                data_dir,
                reports_dir: None,
            };
            run_info(&overrides, config.as_deref())
        }
        Command::ListSymbols {
            timeframe,
            data_dir,
            config,
        } => {
            let overrides = Overrides {
                timeframe,
                data_dir,
                ..Overrides::default()
            };
            run_list_symbols(&overrides, config.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Command-line values that take precedence over the `[data]` section.
#[derive(Debug, Default)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub reports_dir: Option<PathBuf>,
}

impl Overrides {
    pub fn apply(&self, mut settings: DataSettings) -> Result<DataSettings, LevtraderError> {
        if let Some(symbol) = &self.symbol {
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() {
                return Err(LevtraderError::ConfigMissing {
                    section: "data".into(),
                    key: "symbol".into(),
                });
            }
            settings.symbol = symbol;
        }
        if let Some(tf) = &self.timeframe {
            settings.timeframe = parse_timeframe(tf)?;
        }
        if let Some(dir) = &self.data_dir {
            settings.data_dir = dir.clone();
        }
        if let Some(dir) = &self.reports_dir {
            settings.reports_dir = dir.clone();
        }
        Ok(settings)
    }
}

/// Everything a run needs, built from one validated config file.
#[derive(Debug)]
pub struct RunSettings {
    pub account: PortfolioConfig,
    pub strategy: StrategyConfig,
    pub engine: EngineConfig,
    pub data: DataSettings,
}

pub fn load_settings(
    config_path: &Path,
    overrides: &Overrides,
) -> Result<RunSettings, LevtraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = FileConfigAdapter::from_file(config_path)?;

    let account = account_config(&config)?;
    let strategy = strategy_config(&config)?;
    let engine = engine_config(&config)?;
    let data = overrides.apply(data_settings(&config)?)?;

    Ok(RunSettings {
        account,
        strategy,
        engine,
        data,
    })
}

fn run_backtest(config_path: &Path, overrides: &Overrides) -> Result<(), LevtraderError> {
    // Stage 1: Load and validate config
    let settings = load_settings(config_path, overrides)?;
    let data = &settings.data;
    let timeframe = data.timeframe.as_str();

    // Stage 2: Build strategy
    let strategy = ClusterMacdStrategy::new(settings.strategy.clone())?;

    // Stage 3: Load bars
    eprintln!(
        "Loading {} {} bars from {}",
        data.symbol,
        timeframe,
        data.data_dir.display()
    );
    let data_port = CsvAdapter::new(data.data_dir.clone());
    let bars = data_port.load_bars(&data.symbol, timeframe)?;

    let minimum = strategy.config().min_history();
    if bars.len() < minimum {
        return Err(LevtraderError::InsufficientData {
            symbol: data.symbol.clone(),
            timeframe: timeframe.to_string(),
            bars: bars.len(),
            minimum,
        });
    }

    let gaps = data.timeframe.count_gaps(&bars);
    if gaps > 0 {
        eprintln!("warning: {} gaps longer than {} in input", gaps, timeframe);
    }

    // Stage 4: Run the engine
    eprintln!("  Processing: {} bars", bars.len());
    let result = BacktestEngine::new(settings.account.clone(), settings.engine.clone())
        .run(&bars, &strategy)?;

    // Stage 5: Metrics and summary
    let metrics = result.metrics();
    print_summary(&result, &metrics);

    // Stage 6: Report
    let reporter = CsvReportAdapter::new(data.reports_dir.clone());
    let dir = reporter.write(&result, &metrics, &data.symbol, timeframe)?;
    eprintln!("\nReport written to: {}", dir.display());

    Ok(())
}

fn print_summary(result: &BacktestResult, metrics: &Metrics) {
    let account = result.portfolio.summary();
    eprintln!("\n=== Results ===");
    eprintln!("Initial Equity:   {:.2}", account.initial_equity);
    eprintln!("Final Equity:     {:.2}", account.current_equity);
    eprintln!("Total Return:     {:.2}%", account.total_return * 100.0);
    eprintln!(
        "Annual Return:    {:.2}%",
        metrics.annualized_return * 100.0
    );
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     {:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", account.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit/Loss:      {:.2}", metrics.profit_loss_ratio);
    eprintln!("Fees:             {:.2}", account.total_fees);
    eprintln!("Slippage:         {:.2}", account.total_slippage);
    if result.rejected_signals > 0 {
        eprintln!("Refused Signals:  {}", result.rejected_signals);
    }
}

fn run_dry_run(config_path: &Path, overrides: &Overrides) -> Result<(), LevtraderError> {
    let settings = load_settings(config_path, overrides)?;
    let strategy = ClusterMacdStrategy::new(settings.strategy.clone())?;
    eprintln!("Config validated successfully");

    let account = &settings.account;
    eprintln!("\nAccount:");
    eprintln!("  initial equity:     {}", account.initial_equity);
    eprintln!("  leverage:           {}x", account.leverage);
    eprintln!("  fee / slippage:     {} / {}", account.fee_rate, account.slippage_rate);
    eprintln!("  maintenance margin: {}", account.maintenance_margin);
    eprintln!("  take profit:        {}", account.take_profit);
    eprintln!("  stop loss:          {}", account.stop_loss);

    eprintln!("\nIndicators to compute:");
    for ind in strategy.config().indicators() {
        eprintln!("  {}", ind);
    }

    let data = &settings.data;
    eprintln!("\nData:");
    eprintln!("  symbol:    {}", data.symbol);
    eprintln!("  timeframe: {}", data.timeframe);
    eprintln!("  data dir:  {}", data.data_dir.display());
    eprintln!("  reports:   {}", data.reports_dir.display());

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), LevtraderError> {
    let settings = load_settings(config_path, &Overrides::default())?;
    ClusterMacdStrategy::new(settings.strategy)?;
    eprintln!("Config is valid");
    Ok(())
}

/// `[data]` settings from `-c` when given, otherwise defaults, with
/// command-line overrides applied.
fn resolve_data_settings(
    overrides: &Overrides,
    config_path: Option<&Path>,
) -> Result<DataSettings, LevtraderError> {
    let base = match config_path {
        Some(path) => data_settings(&FileConfigAdapter::from_file(path)?)?,
        None => DataSettings::default(),
    };
    overrides.apply(base)
}

fn run_info(overrides: &Overrides, config_path: Option<&Path>) -> Result<(), LevtraderError> {
    let data = resolve_data_settings(overrides, config_path)?;
    let timeframe = data.timeframe;
    let adapter = CsvAdapter::new(data.data_dir.clone());

    let symbols = if overrides.symbol.is_some() || config_path.is_some() {
        vec![data.symbol.clone()]
    } else {
        adapter.list_symbols(timeframe.as_str())?
    };

    for symbol in &symbols {
        print_range(&adapter, symbol, timeframe)?;
    }
    Ok(())
}

fn print_range(
    adapter: &CsvAdapter,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<(), LevtraderError> {
    match adapter.data_range(symbol, timeframe.as_str())? {
        Some(range) => {
            println!(
                "{} {}: {} bars, {} to {}",
                symbol, timeframe, range.bars, range.first, range.last
            );
        }
        None => {
            eprintln!("{} {}: no data found", symbol, timeframe);
        }
    }
    Ok(())
}

fn run_list_symbols(
    overrides: &Overrides,
    config_path: Option<&Path>,
) -> Result<(), LevtraderError> {
    let data = resolve_data_settings(overrides, config_path)?;
    let adapter = CsvAdapter::new(data.data_dir.clone());
    let symbols = adapter.list_symbols(data.timeframe.as_str())?;

    if symbols.is_empty() {
        eprintln!("No symbols found for timeframe {}", data.timeframe);
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}
