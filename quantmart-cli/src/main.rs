//! QuantMart CLI — fetch, load, check, and run commands.
//!
//! Commands:
//! - `fetch coinbase|yahoo|macro` — pull upstream data, normalize, and
//!   stage it as parquet
//! - `load prices|macro` — merge a staged parquet file into the warehouse
//! - `check` — report warehouse row counts and the most recent fact rows
//! - `run` — execute a full fetch→stage→load job from a TOML config file

mod config;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use config::{CoinbaseJob, JobConfig, MacroJob, YahooJob};
use duckdb::Connection;
use quantmart_core::fetch::{CoinbaseClient, CoinbaseConfig, YahooClient, YahooConfig};
use quantmart_core::reshape::{normalize_macro, normalize_prices};
use quantmart_core::stage;
use quantmart_core::warehouse::{ensure_schema, load_macro, load_prices};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "quantmart",
    about = "QuantMart CLI — market-data warehouse pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch upstream data, normalize it, and stage it as parquet.
    Fetch {
        #[command(subcommand)]
        source: FetchSource,
    },
    /// Merge a staged parquet file into the warehouse.
    Load {
        #[command(subcommand)]
        target: LoadTarget,
    },
    /// Report warehouse row counts and the most recent fact rows.
    Check {
        /// Warehouse database file.
        #[arg(long, default_value = "warehouse.duckdb")]
        db: PathBuf,
    },
    /// Execute a full fetch→stage→load job from a TOML config file.
    Run {
        /// Path to a TOML job file.
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum FetchSource {
    /// Daily candles for one product from Coinbase Exchange.
    Coinbase {
        /// Product id, e.g. BTC-USD.
        #[arg(long, default_value = "BTC-USD")]
        product: String,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Staging path for the normalized parquet.
        #[arg(long, default_value = "data/raw/coinbase_btc_usd_daily.parquet")]
        out: PathBuf,
    },
    /// Daily OHLCV for one or more tickers from Yahoo Finance.
    Yahoo {
        /// Tickers to download (e.g. IBIT FBTC GBTC).
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2024-01-01")]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Staging path for the normalized parquet.
        #[arg(long, default_value = "data/raw/yahoo_prices.parquet")]
        out: PathBuf,
    },
    /// Daily macro-proxy closes (rates, dollar, gold, oil) from Yahoo.
    Macro {
        /// Proxy tickers; defaults to ^TNX DX-Y.NYB GC=F CL=F.
        #[arg(long, num_args = 1.., default_values_t = [
            "^TNX".to_string(),
            "DX-Y.NYB".to_string(),
            "GC=F".to_string(),
            "CL=F".to_string(),
        ])]
        tickers: Vec<String>,

        /// Start date (YYYY-MM-DD).
        #[arg(long, default_value = "2024-01-01")]
        start: String,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Staging path for the normalized parquet.
        #[arg(long, default_value = "data/raw/yahoo_macro_proxies.parquet")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum LoadTarget {
    /// Load a staged price parquet into dim_asset + fact_prices_daily.
    Prices {
        /// Staged parquet file.
        #[arg(long)]
        staged: PathBuf,

        /// Warehouse database file.
        #[arg(long, default_value = "warehouse.duckdb")]
        db: PathBuf,

        /// Asset type recorded in the dimension (e.g. ETF, CRYPTO).
        #[arg(long, default_value = "ETF")]
        asset_type: String,
    },
    /// Load a staged macro parquet into fact_macro_market_daily.
    Macro {
        /// Staged parquet file.
        #[arg(long)]
        staged: PathBuf,

        /// Warehouse database file.
        #[arg(long, default_value = "warehouse.duckdb")]
        db: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Fetch { source } => match source {
            FetchSource::Coinbase {
                product,
                start,
                end,
                out,
            } => {
                let job = CoinbaseJob {
                    product_id: product,
                    start: start.as_deref().map(parse_date).transpose()?,
                    end: end.as_deref().map(parse_date).transpose()?,
                    out,
                    asset_type: "CRYPTO".to_string(),
                };
                fetch_coinbase(&job)?;
            }
            FetchSource::Yahoo {
                tickers,
                start,
                end,
                out,
            } => {
                let job = YahooJob {
                    tickers,
                    start: parse_date(&start)?,
                    end: end.as_deref().map(parse_date).transpose()?,
                    out,
                    asset_type: "ETF".to_string(),
                };
                fetch_yahoo(&job)?;
            }
            FetchSource::Macro {
                tickers,
                start,
                end,
                out,
            } => {
                let job = MacroJob {
                    tickers,
                    start: parse_date(&start)?,
                    end: end.as_deref().map(parse_date).transpose()?,
                    out,
                };
                fetch_macro(&job)?;
            }
        },
        Commands::Load { target } => match target {
            LoadTarget::Prices {
                staged,
                db,
                asset_type,
            } => {
                let frame = stage::read_staged(&staged)?;
                let mut conn = open_warehouse(&db)?;
                let summary = load_prices(&mut conn, &frame, &asset_type)?;
                println!(
                    "Loaded {} rows for {} assets into {}",
                    summary.rows,
                    summary.entities,
                    db.display()
                );
            }
            LoadTarget::Macro { staged, db } => {
                let frame = stage::read_staged(&staged)?;
                let mut conn = open_warehouse(&db)?;
                let summary = load_macro(&mut conn, &frame)?;
                println!(
                    "Loaded {} rows for {} metrics into {}",
                    summary.rows,
                    summary.entities,
                    db.display()
                );
            }
        },
        Commands::Check { db } => check_warehouse(&db)?,
        Commands::Run { config } => run_job(&JobConfig::from_file(&config)?)?,
    }
    Ok(())
}

// ── Fetch steps ─────────────────────────────────────────────────────

fn fetch_coinbase(job: &CoinbaseJob) -> Result<()> {
    let client = CoinbaseClient::new();
    let frame = client.fetch_candles(&CoinbaseConfig {
        product_id: job.product_id.clone(),
        granularity: 86_400,
        start: job.start,
        end: job.end,
    })?;
    let meta = stage::write_staged(&frame, &job.out)?;
    println!(
        "[Coinbase] Extracted {} rows for {}.",
        meta.rows, job.product_id
    );
    println!("[Coinbase] Staged to: {}", job.out.display());
    Ok(())
}

fn fetch_yahoo(job: &YahooJob) -> Result<()> {
    let client = YahooClient::new();
    let raw = client.fetch_prices(&YahooConfig {
        tickers: job.tickers.clone(),
        start: job.start,
        end: job.end,
    })?;
    let frame = normalize_prices(raw, "yahoo_finance")?;
    let meta = stage::write_staged(&frame, &job.out)?;
    println!(
        "[Yahoo] Extracted {} rows for {} tickers.",
        meta.rows,
        job.tickers.len()
    );
    println!("[Yahoo] Staged to: {}", job.out.display());
    Ok(())
}

fn fetch_macro(job: &MacroJob) -> Result<()> {
    let client = YahooClient::new();
    let raw = client.fetch_prices(&YahooConfig {
        tickers: job.tickers.clone(),
        start: job.start,
        end: job.end,
    })?;
    let frame = normalize_macro(raw, "yahoo_finance")?;
    let meta = stage::write_staged(&frame, &job.out)?;
    println!("[Yahoo Macro] Extracted {} rows.", meta.rows);
    println!("[Yahoo Macro] Staged to: {}", job.out.display());
    Ok(())
}

// ── Warehouse commands ──────────────────────────────────────────────

fn open_warehouse(db: &Path) -> Result<Connection> {
    if let Some(parent) = db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    Connection::open(db).with_context(|| format!("open warehouse {}", db.display()))
}

fn check_warehouse(db: &Path) -> Result<()> {
    if !db.exists() {
        bail!("warehouse {} does not exist; run a load first", db.display());
    }
    let conn = Connection::open(db)?;
    ensure_schema(&conn)?;

    for table in ["dim_asset", "fact_prices_daily", "fact_macro_market_daily"] {
        let count: i64 =
            conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        println!("{table}: {count} rows");
    }

    let mut stmt = conn.prepare(
        "SELECT a.symbol, CAST(p.date AS VARCHAR), p.close, p.volume
         FROM fact_prices_daily p
         JOIN dim_asset a ON a.symbol = p.symbol
         ORDER BY p.date DESC, a.symbol
         LIMIT 10",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<f64>>(2)?,
            row.get::<_, Option<f64>>(3)?,
        ))
    })?;

    println!("\nmost recent prices:");
    for row in rows {
        let (symbol, date, close, volume) = row?;
        let close = close.map_or("null".to_string(), |v| format!("{v:.2}"));
        let volume = volume.map_or("null".to_string(), |v| format!("{v:.0}"));
        println!("  {date}  {symbol:<10} close={close:<12} volume={volume}");
    }
    Ok(())
}

// ── Job runner ──────────────────────────────────────────────────────

fn run_job(job: &JobConfig) -> Result<()> {
    if job.coinbase.is_none() && job.yahoo.is_none() && job.macro_proxies.is_none() {
        bail!("job config has no pipeline sections ([coinbase], [yahoo], [macro_proxies])");
    }
    let mut conn = open_warehouse(&job.warehouse)?;

    if let Some(cb) = &job.coinbase {
        fetch_coinbase(cb)?;
        let frame = stage::read_staged(&cb.out)?;
        let summary = load_prices(&mut conn, &frame, &cb.asset_type)?;
        println!("[Coinbase] Merged {} rows.", summary.rows);
    }
    if let Some(yh) = &job.yahoo {
        fetch_yahoo(yh)?;
        let frame = stage::read_staged(&yh.out)?;
        let summary = load_prices(&mut conn, &frame, &yh.asset_type)?;
        println!("[Yahoo] Merged {} rows.", summary.rows);
    }
    if let Some(mp) = &job.macro_proxies {
        fetch_macro(mp)?;
        let frame = stage::read_staged(&mp.out)?;
        let summary = load_macro(&mut conn, &frame)?;
        println!("[Yahoo Macro] Merged {} rows.", summary.rows);
    }

    println!("Job complete: warehouse at {}", job.warehouse.display());
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}
