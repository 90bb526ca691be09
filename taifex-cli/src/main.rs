//! TAIFEX CLI — crawl institutional positioning and export it.
//!
//! Commands:
//! - `crawl`: fetch a date range from the exchange and write CSV + JSON
//! - `parse`: parse a saved positioning page offline and print the record

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taifex_core::calendar::BusinessCalendar;
use taifex_core::data::{classify_page, extract_record, PageClass};
use taifex_core::domain::{Contract, DataScope, FetchTask, Identity};
use taifex_runner::{
    exchange_fetcher, net_volume_mismatches, save_table, CrawlConfig, CrawlReport, CrawlStatus,
    Crawler,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "taifex",
    about = "TAIFEX CLI: daily institutional futures positioning crawler"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a date range and save the table as CSV and JSON.
    Crawl(CrawlArgs),
    /// Parse a saved positioning page and print the record as JSON.
    Parse {
        /// Saved HTML page.
        file: PathBuf,

        /// Contract code (TX, TE, MTX, ZMX, NQF).
        #[arg(long, default_value = "TX")]
        contract: String,

        /// Identity (自營商/投信/外資 or dealer/trust/foreign). Omit for the contract row.
        #[arg(long)]
        identity: Option<String>,

        /// Trade date to stamp on the record (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(clap::Args)]
struct CrawlArgs {
    /// `today`, a single date, or `START,END` (YYYY-MM-DD or YYYY/MM/DD).
    #[arg(long)]
    date_range: Option<String>,

    /// Start date. Used when neither --date-range nor --year is given.
    #[arg(long)]
    start: Option<String>,

    /// End date. Defaults to today.
    #[arg(long)]
    end: Option<String>,

    /// Whole year (with --month, one month of it).
    #[arg(long)]
    year: Option<i32>,

    #[arg(long, requires = "year")]
    month: Option<u32>,

    /// `ALL` or a comma list of contract codes.
    #[arg(long, default_value = "ALL")]
    contracts: String,

    /// `ALL`, `NONE` (contract rows only), or a comma list of identities.
    #[arg(long, default_value = "ALL")]
    identities: String,

    /// TOML crawl configuration. Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    workers: Option<usize>,

    /// Pause before every request, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    #[arg(long)]
    max_retries: Option<u32>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// COMPLETE (trades + open interest) or TRADING (trades only).
    #[arg(long, value_enum, ignore_case = true)]
    data_type: Option<DataType>,

    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Output file stem. Defaults to taifex_<start>-<end>_<contracts>_<identities>.
    #[arg(long)]
    filename: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "UPPER")]
enum DataType {
    Complete,
    Trading,
}

impl From<DataType> for DataScope {
    fn from(value: DataType) -> Self {
        match value {
            DataType::Complete => DataScope::Complete,
            DataType::Trading => DataScope::Trading,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Crawl(args) => run_crawl(args),
        Commands::Parse {
            file,
            contract,
            identity,
            date,
        } => run_parse(&file, &contract, identity.as_deref(), date.as_deref()),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let default = format!("taifex={level},taifex_core={level},taifex_runner={level}");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_target(false))
        .init();
}

// ─── crawl ──────────────────────────────────────────────────────────

fn run_crawl(args: CrawlArgs) -> Result<()> {
    let calendar = BusinessCalendar::taipei_today();
    let (start, end) = resolve_range(&args, calendar.today())?;
    let contracts = parse_contracts(&args.contracts)?;
    let identities = parse_identities(&args.identities)?;

    let config = build_config(&args)?;
    let fetcher = exchange_fetcher(&config)?;
    let crawler = Crawler::new(fetcher, config.workers)
        .with_calendar(calendar)
        .with_cancel(install_interrupt_flag()?);

    info!(
        %start,
        %end,
        contracts = %args.contracts,
        identities = %args.identities,
        scope = ?config.scope,
        "starting crawl"
    );
    let report = crawler.crawl_date_range(start, end, &contracts, &identities)?;
    print_summary(&report);
    if report.status == CrawlStatus::Cancelled {
        println!("Interrupted: saving the records collected so far.");
    }

    let mismatches = net_volume_mismatches(&report.table);
    if !mismatches.is_empty() {
        warn!(
            count = mismatches.len(),
            "printed net trade volume differs from long minus short"
        );
    }

    if report.table.is_empty() {
        println!("No records to save.");
    } else {
        let stem = args
            .filename
            .clone()
            .unwrap_or_else(|| default_stem(start, end, &contracts, &identities));
        let saved = save_table(&report.table, &args.output_dir, &stem)?;
        println!("Saved: {}", saved.csv.display());
        println!("Saved: {}", saved.json.display());
    }

    if report.status == CrawlStatus::AllFailed {
        bail!("every task failed ({} tasks)", report.summary.total);
    }
    Ok(())
}

/// First Ctrl-C stops new tasks from starting; a second one exits at once.
fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if interrupt(&flag) {
            std::process::exit(130);
        }
        warn!("interrupt received, finishing in-flight tasks");
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(cancel)
}

/// Raise the cancel flag. True when it was already raised.
fn interrupt(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::SeqCst)
}

fn build_config(args: &CrawlArgs) -> Result<CrawlConfig> {
    let mut config = match &args.config {
        Some(path) => CrawlConfig::from_file(path)?,
        None => CrawlConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(delay) = args.delay_ms {
        config.request_delay_ms = delay;
    }
    if let Some(retries) = args.max_retries {
        config.max_retries = retries;
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = timeout;
    }
    if let Some(data_type) = args.data_type {
        config.scope = data_type.into();
    }
    config.validate()?;
    Ok(config)
}

fn print_summary(report: &CrawlReport) {
    let s = &report.summary;
    println!();
    println!("=== Crawl Summary ===");
    println!("Tasks:      {}", s.total);
    println!("Parsed:     {}", s.parsed);
    println!("No data:    {}", s.no_data);
    println!("Failed:     {}", s.failed);
    if s.cancelled > 0 {
        println!("Cancelled:  {}", s.cancelled);
    }
    println!("Records:    {}", report.table.len());
    println!("Flags:      {}", report.flags.len());
    println!("Elapsed:    {:.1}s", s.elapsed_ms as f64 / 1000.0);
    println!();
}

// ─── date / selection parsing ───────────────────────────────────────

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD or YYYY/MM/DD)"))
}

/// Date range from, in order: --date-range, --year/--month, --start/--end,
/// else Jan 1 of this year through today.
fn resolve_range(args: &CrawlArgs, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    if let Some(range) = &args.date_range {
        return parse_date_range(range, today);
    }

    if let Some(year) = args.year {
        return match args.month {
            Some(month) => month_bounds(year, month),
            None => Ok((first_of_year(year)?, last_of_year(year)?)),
        };
    }

    if args.start.is_some() || args.end.is_some() {
        let end = args.end.as_deref().map(parse_date).transpose()?.unwrap_or(today);
        let start = match args.start.as_deref() {
            Some(s) => parse_date(s)?,
            None => first_of_year(end.year())?,
        };
        return Ok((start, end));
    }

    Ok((first_of_year(today.year())?, today))
}

fn parse_date_range(range: &str, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let range = range.trim();
    if range.eq_ignore_ascii_case("today") {
        return Ok((today, today));
    }
    match range.split_once(',') {
        Some((a, b)) => Ok((parse_date(a)?, parse_date(b)?)),
        None => {
            let day = parse_date(range)?;
            Ok((day, day))
        }
    }
}

fn first_of_year(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1).with_context(|| format!("invalid year {year}"))
}

fn last_of_year(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31).with_context(|| format!("invalid year {year}"))
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("invalid month {year}-{month}"))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|n| n.pred_opt())
        .with_context(|| format!("invalid month {year}-{month}"))?;
    Ok((first, last))
}

fn parse_contracts(list: &str) -> Result<Vec<Contract>> {
    if list.trim().eq_ignore_ascii_case("ALL") {
        return Ok(Contract::ALL.to_vec());
    }
    let mut contracts = Vec::new();
    for part in list.split(',').filter(|p| !p.trim().is_empty()) {
        let contract: Contract = part.parse()?;
        if !contracts.contains(&contract) {
            contracts.push(contract);
        }
    }
    if contracts.is_empty() {
        bail!("no contracts selected");
    }
    Ok(contracts)
}

fn parse_identities(list: &str) -> Result<Vec<Identity>> {
    let list = list.trim();
    if list.eq_ignore_ascii_case("ALL") {
        return Ok(Identity::ALL.to_vec());
    }
    if list.eq_ignore_ascii_case("NONE") || list.is_empty() {
        return Ok(Vec::new());
    }
    let mut identities = Vec::new();
    for part in list.split(',').filter(|p| !p.trim().is_empty()) {
        let identity: Identity = part.parse()?;
        if !identities.contains(&identity) {
            identities.push(identity);
        }
    }
    Ok(identities)
}

fn identity_slug(identity: Identity) -> &'static str {
    match identity {
        Identity::Dealer => "dealer",
        Identity::InvestmentTrust => "trust",
        Identity::Foreign => "foreign",
    }
}

fn default_stem(
    start: NaiveDate,
    end: NaiveDate,
    contracts: &[Contract],
    identities: &[Identity],
) -> String {
    let contracts = if contracts.len() == Contract::ALL.len() {
        "ALL".to_string()
    } else {
        contracts.iter().map(|c| c.code()).collect::<Vec<_>>().join("_")
    };
    let identities = if identities.is_empty() {
        "no_identity".to_string()
    } else if identities.len() == Identity::ALL.len() {
        "ALL".to_string()
    } else {
        identities
            .iter()
            .map(|i| identity_slug(*i))
            .collect::<Vec<_>>()
            .join("_")
    };
    format!(
        "taifex_{}-{}_{contracts}_{identities}",
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    )
}

// ─── parse ──────────────────────────────────────────────────────────

fn run_parse(file: &Path, contract: &str, identity: Option<&str>, date: Option<&str>) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let contract: Contract = contract.parse()?;
    let identity = identity.map(str::parse::<Identity>).transpose()?;
    let date = match date {
        Some(d) => parse_date(d)?,
        None => BusinessCalendar::taipei_today().today(),
    };

    match classify_page(&html) {
        PageClass::NoData => {
            println!("Page reports no data.");
            return Ok(());
        }
        PageClass::Error => bail!("page is an exchange error page"),
        PageClass::Candidate => {}
    }

    let task = FetchTask::new(date, contract, identity);
    let record = extract_record(&html, &task)
        .map_err(|miss| anyhow::anyhow!("{}: {miss}", task.describe()))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn args(argv: &[&str]) -> CrawlArgs {
        let mut full = vec!["taifex", "crawl"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Crawl(a) => a,
            Commands::Parse { .. } => unreachable!(),
        }
    }

    #[test]
    fn default_range_is_year_to_date() {
        let today = d(2024, 6, 12);
        assert_eq!(resolve_range(&args(&[]), today).unwrap(), (d(2024, 1, 1), today));
    }

    #[test]
    fn date_range_forms() {
        let today = d(2024, 6, 12);
        assert_eq!(
            resolve_range(&args(&["--date-range", "today"]), today).unwrap(),
            (today, today)
        );
        assert_eq!(
            resolve_range(&args(&["--date-range", "2024-03-05"]), today).unwrap(),
            (d(2024, 3, 5), d(2024, 3, 5))
        );
        assert_eq!(
            resolve_range(&args(&["--date-range", "2024/03/01,2024-03-31"]), today).unwrap(),
            (d(2024, 3, 1), d(2024, 3, 31))
        );
        assert!(resolve_range(&args(&["--date-range", "March"]), today).is_err());
    }

    #[test]
    fn start_end_and_year_month() {
        let today = d(2024, 6, 12);
        assert_eq!(
            resolve_range(&args(&["--start", "2024/05/01"]), today).unwrap(),
            (d(2024, 5, 1), today)
        );
        assert_eq!(
            resolve_range(&args(&["--year", "2023"]), today).unwrap(),
            (d(2023, 1, 1), d(2023, 12, 31))
        );
        assert_eq!(
            resolve_range(&args(&["--year", "2024", "--month", "2"]), today).unwrap(),
            (d(2024, 2, 1), d(2024, 2, 29))
        );
        assert_eq!(
            resolve_range(&args(&["--year", "2023", "--month", "12"]), today).unwrap(),
            (d(2023, 12, 1), d(2023, 12, 31))
        );
        assert!(resolve_range(&args(&["--year", "2024", "--month", "13"]), today).is_err());
    }

    #[test]
    fn option_precedence_follows_range_then_year_then_start() {
        let today = d(2024, 6, 12);
        assert_eq!(
            resolve_range(
                &args(&["--date-range", "2024-03-05", "--year", "2023", "--start", "2024-01-02"]),
                today
            )
            .unwrap(),
            (d(2024, 3, 5), d(2024, 3, 5))
        );
        assert_eq!(
            resolve_range(
                &args(&["--year", "2023", "--month", "7", "--start", "2024-01-02", "--end", "2024-02-01"]),
                today
            )
            .unwrap(),
            (d(2023, 7, 1), d(2023, 7, 31))
        );
    }

    #[test]
    fn second_interrupt_is_reported() {
        let flag = AtomicBool::new(false);
        assert!(!interrupt(&flag));
        assert!(flag.load(Ordering::SeqCst));
        assert!(interrupt(&flag));
    }

    #[test]
    fn contract_and_identity_selection() {
        assert_eq!(parse_contracts("ALL").unwrap(), Contract::ALL.to_vec());
        assert_eq!(
            parse_contracts("tx, mtx,TX").unwrap(),
            vec![Contract::Tx, Contract::Mtx]
        );
        assert!(parse_contracts("SPY").is_err());
        assert!(parse_contracts(",").is_err());

        assert_eq!(parse_identities("ALL").unwrap(), Identity::ALL.to_vec());
        assert!(parse_identities("NONE").unwrap().is_empty());
        assert_eq!(
            parse_identities("外資,trust").unwrap(),
            vec![Identity::Foreign, Identity::InvestmentTrust]
        );
    }

    #[test]
    fn default_stem_names() {
        let stem = default_stem(d(2024, 1, 1), d(2024, 6, 12), &Contract::ALL, &[]);
        assert_eq!(stem, "taifex_20240101-20240612_ALL_no_identity");

        let stem = default_stem(
            d(2024, 6, 3),
            d(2024, 6, 3),
            &[Contract::Tx, Contract::Te],
            &[Identity::Foreign],
        );
        assert_eq!(stem, "taifex_20240603-20240603_TX_TE_foreign");
    }

    #[test]
    fn flags_override_config() {
        let a = args(&["--workers", "2", "--max-retries", "5", "--data-type", "TRADING"]);
        let config = build_config(&a).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.scope, DataScope::Trading);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn zero_workers_rejected() {
        assert!(build_config(&args(&["--workers", "0"])).is_err());
    }
}
