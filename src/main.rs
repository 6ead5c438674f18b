use analytics::{PerformancePeriod, PerformanceReport, PortfolioReport, TradeHistoryReport};
use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use configuration::{load_config, settings::Config, AccountPolicy, LogFormat};
use core_types::{AccountKind, OrderSide, OrderTicket};
use database::{connect, run_migrations, AccountStore, DbRepository, InMemoryAccountStore, OrderFilter};
use engine::{AuditReport, LedgerAuditor, TradingEngine};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use price_oracle::{FallbackPriceOracle, KlineFeed, PriceOracle};
use risk::ApplicantProfile;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// The main entry point for the ledger application.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // LEDGER__* overrides may live in the .env file as well.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli.config).context("Failed to load configuration")?;
    // Held until exit so buffered file logs are flushed.
    let _log_guard = configuration::init_tracing(&config.logging, cli.log_format)?;

    // The risk score is pure; it needs neither a store nor prices.
    if let Commands::RiskScore(args) = &cli.command {
        return handle_risk_score(args);
    }

    let policy = config.accounts.policy(cli.book.into());
    tracing::info!(book = %policy.kind, in_memory = cli.in_memory, "Starting ledger...");
    let (engine, repo) = build_engine(&config, policy, cli.in_memory).await?;

    let result = run(cli.command, Arc::clone(&engine)).await;

    if let Some(repo) = repo {
        repo.close().await;
    }
    result
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Order execution and portfolio accounting for live and paper accounts.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Which book of accounts to operate on.
    #[arg(long, global = true, value_enum, default_value_t = Book::Paper)]
    book: Book,

    /// Console log style.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Full)]
    log_format: LogFormat,

    /// Keep accounts in process memory instead of PostgreSQL.
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Book {
    Live,
    Paper,
}

impl From<Book> for AccountKind {
    fn from(book: Book) -> Self {
        match book {
            Book::Live => AccountKind::Live,
            Book::Paper => AccountKind::Paper,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Place a buy or sell order that executes immediately.
    PlaceOrder(PlaceOrderArgs),
    /// Show the valuation of an account at current prices.
    Portfolio {
        account: String,
        #[arg(long)]
        json: bool,
    },
    /// List an account's executed orders.
    History(HistoryArgs),
    /// P&L statement for a trailing period (week, month, quarter, year).
    Performance {
        account: String,
        #[arg(long)]
        period: Option<PerformancePeriod>,
        #[arg(long)]
        json: bool,
    },
    /// Export a report as CSV.
    Export(ExportArgs),
    /// Replay order logs and compare them with the stored ledgers.
    Audit {
        /// Audit a single account; all accounts when omitted.
        account: Option<String>,
        /// Keep running and audit every N seconds.
        #[arg(long)]
        every: Option<u64>,
    },
    /// Provision an account in the selected book.
    OpenAccount { account: String },
    /// Current price and daily change of a symbol.
    Quote { symbol: String },
    /// Score an onboarding applicant.
    RiskScore(RiskScoreArgs),
}

#[derive(Args)]
struct PlaceOrderArgs {
    account: String,
    symbol: String,
    /// "buy" or "sell".
    side: String,
    quantity: Decimal,
    /// Execution price. Required for limit orders.
    #[arg(long)]
    price: Option<Decimal>,
    /// "market" (default) or "limit".
    #[arg(long = "type")]
    order_type: Option<String>,
}

#[derive(Args)]
struct HistoryArgs {
    account: String,
    #[arg(long)]
    symbol: Option<String>,
    #[arg(long)]
    side: Option<String>,
    /// First day included (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Continue after this sequence number.
    #[arg(long)]
    after: Option<u64>,
    #[arg(long)]
    limit: Option<usize>,
    /// Print the report with totals as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Trades,
    Portfolio,
    Performance,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(value_enum)]
    kind: ExportKind,
    account: String,
    /// Statement period for `performance`; whole history when omitted.
    #[arg(long)]
    period: Option<PerformancePeriod>,
    /// Write to this file instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RiskScoreArgs {
    /// Read the profile from a JSON file instead of the flags below.
    #[arg(long, conflicts_with_all = ["age", "income", "employment", "experience", "tolerance", "pep"])]
    profile: Option<PathBuf>,
    #[arg(long, default_value = "")]
    age: String,
    #[arg(long, default_value = "")]
    income: String,
    #[arg(long, default_value = "")]
    employment: String,
    #[arg(long, default_value = "")]
    experience: String,
    #[arg(long, default_value = "")]
    tolerance: String,
    #[arg(long, default_value = "")]
    pep: String,
}

// ==============================================================================
// Wiring
// ==============================================================================

/// Opens the store and price feed and assembles the engine. The repository is
/// returned so its pool can be closed at shutdown.
async fn build_engine(
    config: &Config,
    policy: AccountPolicy,
    in_memory: bool,
) -> anyhow::Result<(Arc<TradingEngine>, Option<DbRepository>)> {
    if in_memory {
        let store: Arc<dyn AccountStore> = Arc::new(InMemoryAccountStore::new());
        let oracle: Arc<dyn PriceOracle> = Arc::new(FallbackPriceOracle::from_settings(&config.pricing));
        return Ok((Arc::new(TradingEngine::new(store, oracle, policy)), None));
    }

    let pool = connect().await.context("Failed to connect to the database")?;
    run_migrations(&pool).await.context("Failed to run database migrations")?;
    let repo = DbRepository::new(pool);

    let feed = Arc::new(KlineFeed::new(repo.clone(), config.pricing.kline_interval.clone()));
    let oracle: Arc<dyn PriceOracle> = Arc::new(FallbackPriceOracle::with_feed(feed, &config.pricing));
    let store: Arc<dyn AccountStore> = Arc::new(repo.clone());

    Ok((Arc::new(TradingEngine::new(store, oracle, policy)), Some(repo)))
}

async fn run(command: Commands, engine: Arc<TradingEngine>) -> anyhow::Result<()> {
    match command {
        Commands::PlaceOrder(args) => handle_place_order(args, &engine).await,
        Commands::Portfolio { account, json } => {
            let report = engine.get_portfolio(&account).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_portfolio(&report);
            }
            Ok(())
        }
        Commands::History(args) => handle_history(args, &engine).await,
        Commands::Performance { account, period, json } => {
            let report = engine.get_performance(&account, period).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_performance(&report);
            }
            Ok(())
        }
        Commands::Export(args) => handle_export(args, &engine).await,
        Commands::Audit { account, every } => handle_audit(account, every, engine).await,
        Commands::OpenAccount { account } => {
            let opened = engine.open_account(&account).await?;
            println!(
                "Opened {} account '{}' with {} cash.",
                opened.kind, opened.account_id, opened.starting_cash
            );
            Ok(())
        }
        Commands::Quote { symbol } => {
            let quote = engine.quote(&symbol).await;
            println!(
                "{}  {}  {:+} ({:+}%)",
                quote.symbol,
                quote.price,
                quote.change,
                quote.change_percent.round_dp(2)
            );
            Ok(())
        }
        // Handled before the engine is built.
        Commands::RiskScore(_) => Ok(()),
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_place_order(args: PlaceOrderArgs, engine: &TradingEngine) -> anyhow::Result<()> {
    let ticket = OrderTicket {
        account_id: args.account,
        symbol: args.symbol,
        side: args.side,
        quantity: args.quantity,
        price: args.price,
        order_type: args.order_type,
    };
    let request = ticket.into_request()?;

    match engine.place_order(&request).await {
        Ok(receipt) => {
            println!(
                "{} {} {} @ {} = {} [{}] order {} (cash {})",
                receipt.side.as_str().to_uppercase(),
                receipt.quantity,
                receipt.symbol,
                receipt.executed_price,
                receipt.total_amount,
                receipt.status.as_str().to_uppercase(),
                receipt.order_id,
                receipt.cash_after
            );
            Ok(())
        }
        Err(e) if e.is_rejection() => anyhow::bail!("Order rejected: {}", e),
        Err(e) => Err(e.into()),
    }
}

fn day_start(date: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn day_end(date: NaiveDate) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    let end = NaiveTime::from_hms_opt(23, 59, 59).context("invalid end-of-day time")?;
    Ok(date.and_time(end).and_utc())
}

async fn handle_history(args: HistoryArgs, engine: &TradingEngine) -> anyhow::Result<()> {
    let side = args.side.as_deref().map(str::parse::<OrderSide>).transpose()?;
    let filter = OrderFilter {
        symbol: args.symbol.as_deref().map(core_types::normalize_symbol),
        side,
        from: args.from.map(day_start),
        to: args.to.map(day_end).transpose()?,
        after_sequence: args.after,
        limit: args.limit,
    };

    let report = engine.get_trade_history_report(&args.account, &filter).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_history(&report);
    }
    Ok(())
}

async fn handle_export(args: ExportArgs, engine: &TradingEngine) -> anyhow::Result<()> {
    let csv = match args.kind {
        ExportKind::Trades => engine.export_trade_history_csv(&args.account, &OrderFilter::all()).await?,
        ExportKind::Portfolio => engine.export_portfolio_csv(&args.account).await?,
        ExportKind::Performance => engine.export_performance_csv(&args.account, args.period).await?,
    };

    match args.output {
        Some(path) => {
            std::fs::write(&path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}

async fn handle_audit(account: Option<String>, every: Option<u64>, engine: Arc<TradingEngine>) -> anyhow::Result<()> {
    if let Some(secs) = every {
        // Runs until the process is stopped.
        LedgerAuditor::new(engine, Duration::from_secs(secs.max(1))).start().await;
        return Ok(());
    }

    let account_ids = match account {
        Some(id) => vec![id],
        None => engine.account_ids().await?,
    };

    let progress_bar = ProgressBar::new(account_ids.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    // Accounts are independent, so their audits run concurrently.
    let tasks: Vec<_> = account_ids
        .into_iter()
        .map(|account_id| {
            let engine = Arc::clone(&engine);
            let pb = progress_bar.clone();
            tokio::spawn(async move {
                let result = engine.audit(&account_id).await;
                pb.inc(1);
                (account_id, result)
            })
        })
        .collect();

    let results = join_all(tasks).await;
    progress_bar.finish_with_message("Audit complete!");

    let mut reports: Vec<AuditReport> = Vec::new();
    for result in results {
        match result? {
            (_, Ok(report)) => reports.push(report),
            (account_id, Err(e)) => eprintln!("Could not audit {}: {}", account_id, e),
        }
    }
    print_audit(&reports);

    if reports.iter().any(|r| !r.is_consistent()) {
        anyhow::bail!("ledger discrepancies found");
    }
    Ok(())
}

fn handle_risk_score(args: &RiskScoreArgs) -> anyhow::Result<()> {
    let profile = match &args.profile {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw).context("Profile is not valid JSON")?
        }
        None => ApplicantProfile {
            age: args.age.clone(),
            annual_income: args.income.clone(),
            employment_status: args.employment.clone(),
            trading_experience: args.experience.clone(),
            risk_tolerance: args.tolerance.clone(),
            politically_exposed: args.pep.clone(),
        },
    };

    let (score, band) = risk::assess(&profile);
    println!("Risk score: {} ({})", score, band);
    Ok(())
}

// ==============================================================================
// Output
// ==============================================================================

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_portfolio(report: &PortfolioReport) {
    let mut summary = new_table(vec!["Metric", "Value"]);
    summary.add_row(vec!["Account".to_string(), report.account_id.clone()]);
    summary.add_row(vec!["Total Value".to_string(), report.total_value.round_dp(2).to_string()]);
    summary.add_row(vec!["Cash".to_string(), report.cash.round_dp(2).to_string()]);
    summary.add_row(vec!["Portfolio Value".to_string(), report.portfolio_value.round_dp(2).to_string()]);
    summary.add_row(vec!["Total Return".to_string(), report.total_return.round_dp(2).to_string()]);
    summary.add_row(vec![
        "Total Return %".to_string(),
        format!("{}%", report.total_return_percent.round_dp(2)),
    ]);
    summary.add_row(vec!["Realized P&L".to_string(), report.realized_pnl.round_dp(2).to_string()]);
    summary.add_row(vec!["Unrealized P&L".to_string(), report.unrealized_pnl.round_dp(2).to_string()]);
    println!("{summary}");

    if report.positions.is_empty() {
        println!("No open positions.");
        return;
    }
    let mut positions = new_table(vec![
        "Symbol", "Quantity", "Avg Cost", "Price", "Market Value", "Unrealized", "Return %", "Weight %",
    ]);
    for p in &report.positions {
        positions.add_row(vec![
            p.symbol.clone(),
            p.quantity.to_string(),
            p.average_cost.round_dp(2).to_string(),
            p.current_price.round_dp(2).to_string(),
            p.market_value.round_dp(2).to_string(),
            p.unrealized_pnl.round_dp(2).to_string(),
            p.unrealized_pnl_percent.round_dp(2).to_string(),
            p.weight_percent.round_dp(2).to_string(),
        ]);
    }
    println!("{positions}");
}

fn print_history(report: &TradeHistoryReport) {
    let mut table = new_table(vec!["#", "Time", "Symbol", "Side", "Quantity", "Price", "Total", "Status"]);
    for t in &report.trades {
        table.add_row(vec![
            t.sequence.to_string(),
            t.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            t.symbol.clone(),
            t.side.as_str().to_uppercase(),
            t.quantity.to_string(),
            t.price.round_dp(2).to_string(),
            t.total_value.round_dp(2).to_string(),
            t.status.as_str().to_uppercase(),
        ]);
    }
    println!("{table}");
    let s = &report.summary;
    println!(
        "{} trades in {} symbols. Bought {}, sold {}, net {}.",
        s.total_trades,
        s.symbols_traded,
        s.total_buy_value.round_dp(2),
        s.total_sell_value.round_dp(2),
        s.net_trading_value.round_dp(2)
    );
}

fn print_performance(report: &PerformanceReport) {
    let title = report.period.map(|p| p.to_string()).unwrap_or_else(|| "all time".to_string());
    println!("P&L statement for {} ({})", report.account_id, title);

    let mut table = new_table(vec!["Symbol", "Realized", "Unrealized", "Total", "Trades"]);
    for row in &report.symbol_breakdown {
        table.add_row(vec![
            row.symbol.clone(),
            row.realized_pnl.round_dp(2).to_string(),
            row.unrealized_pnl.round_dp(2).to_string(),
            row.total_pnl.round_dp(2).to_string(),
            row.trades_count.to_string(),
        ]);
    }
    println!("{table}");

    let m = &report.trading_metrics;
    println!(
        "Realized {}, unrealized {}, total {}. {} trades, volume {} (net flow {}).",
        report.realized_pnl.round_dp(2),
        report.unrealized_pnl.round_dp(2),
        report.total_pnl.round_dp(2),
        m.total_trades,
        m.trading_volume.round_dp(2),
        m.net_flow.round_dp(2)
    );
}

fn print_audit(reports: &[AuditReport]) {
    let mut table = new_table(vec!["Account", "Orders", "Status", "Discrepancies"]);
    for r in reports {
        let details = r
            .discrepancies
            .iter()
            .map(|d| format!("{:?}", d))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            r.account_id.clone(),
            r.orders_replayed.to_string(),
            if r.is_consistent() { "OK" } else { "MISMATCH" }.to_string(),
            details,
        ]);
    }
    println!("{table}");
}
