use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::{self, MovieRecord};
use crate::fetch::Fetcher;
use crate::parser::{self, site::SiteAdapter};

const CONCURRENCY: usize = 10;

pub struct DayStats {
    pub total: usize,
    pub parsed: usize,
    pub failed: usize,
    pub written: usize,
    pub skipped: usize,
}

/// Scrape one day's item links concurrently and upsert the batch in a single
/// transaction. An item whose detail page cannot be fetched is logged and
/// skipped; it never aborts the day.
pub async fn scrape_day(
    conn: &Connection,
    fetcher: Arc<Fetcher>,
    adapter: Arc<dyn SiteAdapter>,
    links: Vec<String>,
) -> Result<DayStats> {
    let total = links.len();
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<Option<MovieRecord>>(CONCURRENCY * 2);

    for url in links {
        let fetcher = Arc::clone(&fetcher);
        let adapter = Arc::clone(&adapter);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let record = match parser::scrape_movie(&fetcher, adapter.as_ref(), &url).await {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping {}: {:#}", url, e);
                    None
                }
            };
            let _ = tx.send(record).await;
        });
    }
    drop(tx);

    let mut records = Vec::with_capacity(total);
    let mut failed = 0usize;
    while let Some(outcome) = rx.recv().await {
        match outcome {
            Some(record) => records.push(record),
            None => failed += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let counts = db::upsert_movies(conn, &records)?;
    info!(
        "Day batch: {} items, {} parsed, {} failed, {} written",
        total,
        records.len(),
        failed,
        counts.written
    );
    Ok(DayStats {
        total,
        parsed: records.len(),
        failed,
        written: counts.written,
        skipped: counts.skipped,
    })
}

// ── Tests ──
