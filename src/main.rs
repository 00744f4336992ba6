mod cache;
mod db;
mod details;
mod fetch;
mod harvest;
mod parser;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use cache::PageCache;
use fetch::Fetcher;
use parser::site::{ImdbAdapter, SiteAdapter};

#[derive(Parser)]
#[command(name = "imdb_harvester", about = "IMDb release-date catalog harvester")]
struct Cli {
    /// SQLite database path
    #[arg(long, default_value = "data/movies.sqlite")]
    db: String,

    /// Page cache directory
    #[arg(long, default_value = "data/cache")]
    cache_dir: PathBuf,

    /// Root directory for per-day link files and monthly summaries
    #[arg(long, default_value = "movie_links")]
    links_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest item links for a year (or one month of it) into link files
    Harvest {
        year: i32,
        /// Single month 1-12 (default: whole year)
        #[arg(short, long)]
        month: Option<u32>,
    },
    /// Scrape detail pages for previously harvested link files
    Details {
        year: i32,
        #[arg(short, long)]
        month: Option<u32>,
    },
    /// Harvest + details in one pipeline, month by month
    Run {
        year: i32,
        #[arg(short, long)]
        month: Option<u32>,
    },
    /// Show database statistics
    Stats,
    /// Prune the page cache down to the newest N entries
    PruneCache {
        #[arg(short = 'k', long, default_value = "10000")]
        keep: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Harvest { year, month } => {
            let (fetcher, adapter) = build_pipeline(&cli.cache_dir)?;
            for month in months(month) {
                let totals = harvest::harvest_month(
                    Arc::clone(&fetcher),
                    Arc::clone(&adapter),
                    year,
                    month,
                    &cli.links_dir,
                )
                .await?;
                println!(
                    "{}-{:02}: {} results, {} days with links",
                    year, month, totals.total_results, totals.days_with_results
                );
            }
            Ok(())
        }
        Commands::Details { year, month } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let (fetcher, adapter) = build_pipeline(&cli.cache_dir)?;
            for month in months(month) {
                details_month(&conn, &fetcher, &adapter, year, month, &cli.links_dir).await?;
            }
            Ok(())
        }
        Commands::Run { year, month } => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let (fetcher, adapter) = build_pipeline(&cli.cache_dir)?;
            for month in months(month) {
                harvest::harvest_month(
                    Arc::clone(&fetcher),
                    Arc::clone(&adapter),
                    year,
                    month,
                    &cli.links_dir,
                )
                .await?;
                details_month(&conn, &fetcher, &adapter, year, month, &cli.links_dir).await?;
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&cli.db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Movies:          {}", s.total);
            println!("With rating:     {}", s.rated);
            println!("Missing runtime: {}", s.missing_runtime);
            println!("Missing credits: {}", s.missing_credits);
            println!("Distinct years:  {}", s.distinct_years);
            Ok(())
        }
        Commands::PruneCache { keep } => {
            let cache = PageCache::new(&cli.cache_dir)?;
            let removed = cache.prune(keep)?;
            println!(
                "Pruned {} cache entries ({} remain)",
                removed,
                cache.entry_count()?
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_pipeline(cache_dir: &PathBuf) -> Result<(Arc<Fetcher>, Arc<dyn SiteAdapter>)> {
    let fetcher = Arc::new(Fetcher::new(PageCache::new(cache_dir)?)?);
    let adapter: Arc<dyn SiteAdapter> = Arc::new(ImdbAdapter::default());
    Ok((fetcher, adapter))
}

fn months(month: Option<u32>) -> Vec<u32> {
    match month {
        Some(m) => vec![m],
        None => (1..=12).collect(),
    }
}

/// Scrape detail pages for every day of the month that has a link file.
/// Days are strictly sequential: one day's batch is flushed before the next
/// day starts.
async fn details_month(
    conn: &rusqlite::Connection,
    fetcher: &Arc<Fetcher>,
    adapter: &Arc<dyn SiteAdapter>,
    year: i32,
    month: u32,
    links_root: &std::path::Path,
) -> Result<()> {
    for date in harvest::days_in_month(year, month)? {
        let links = match harvest::read_day_links(links_root, date)? {
            Some(links) if !links.is_empty() => links,
            _ => continue,
        };
        let stats = details::scrape_day(
            conn,
            Arc::clone(fetcher),
            Arc::clone(adapter),
            links,
        )
        .await?;
        if stats.failed > 0 {
            warn!("{}: {} of {} items failed", date, stats.failed, stats.total);
        }
        println!(
            "Finished processing {} ({} written, {} skipped)",
            date, stats.written, stats.skipped
        );
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
