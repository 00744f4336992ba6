use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::fetch::Fetcher;
use crate::parser::site::SiteAdapter;

/// Catalog pagination size, with the off-by-one margin page folded into
/// `page_count`.
const PAGE_SIZE: u64 = 50;

/// A day counts as degraded when fewer than this share of its result pages
/// fetched.
const DAY_SUCCESS_RATIO: f64 = 0.9;

/// Outcome of harvesting one calendar day.
pub struct DayHarvest {
    pub date: NaiveDate,
    pub result_count: u64,
    /// Item links in page order, pages concatenated in page-number order
    /// regardless of fetch completion order.
    pub links: Vec<String>,
    pub pages_total: u32,
    pub pages_failed: u32,
}

impl DayHarvest {
    fn zero(date: NaiveDate, pages_total: u32, pages_failed: u32) -> Self {
        Self {
            date,
            result_count: 0,
            links: Vec::new(),
            pages_total,
            pages_failed,
        }
    }

    pub fn degraded(&self) -> bool {
        if self.pages_total == 0 {
            return false;
        }
        let ok = (self.pages_total - self.pages_failed) as f64;
        ok / (self.pages_total as f64) < DAY_SUCCESS_RATIO
    }
}

pub fn page_count(result_count: u64) -> u32 {
    (result_count / PAGE_SIZE + 1) as u32
}

/// Enumerate every item link the catalog lists for one day.
///
/// The count page decides everything: a missing results-count marker means a
/// zero-result day, which is a valid terminal outcome, not an error. Result
/// pages are fetched as concurrent tasks and reassembled by page number; a
/// failed page degrades the day (its links are missing) and never aborts it.
pub async fn harvest_day(
    fetcher: Arc<Fetcher>,
    adapter: Arc<dyn SiteAdapter>,
    date: NaiveDate,
) -> DayHarvest {
    let count_url = adapter.search_url(date, None);
    let first = match fetcher.fetch(&count_url).await {
        Ok(html) => html,
        Err(e) => {
            warn!("Count page failed for {}: {:#}", date, e);
            return DayHarvest::zero(date, 1, 1);
        }
    };

    let result_count = match adapter.result_count(&first) {
        Some(n) => n,
        None => return DayHarvest::zero(date, 0, 0),
    };
    if result_count == 0 {
        return DayHarvest::zero(date, 0, 0);
    }

    let pages = page_count(result_count);
    let (tx, mut rx) = tokio::sync::mpsc::channel::<(u32, Option<Vec<String>>)>(pages as usize);

    for page in 1..=pages {
        let fetcher = Arc::clone(&fetcher);
        let adapter = Arc::clone(&adapter);
        let tx = tx.clone();
        let url = adapter.search_url(date, Some(page));

        tokio::spawn(async move {
            let links = match fetcher.fetch(&url).await {
                Ok(html) => Some(adapter.item_links(&html)),
                Err(e) => {
                    warn!("Results page {} failed for {}: {:#}", page, date, e);
                    None
                }
            };
            let _ = tx.send((page, links)).await;
        });
    }
    drop(tx);

    // Buffer per-page results and concatenate in page-number order so output
    // is reproducible under any completion order.
    let mut by_page: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    let mut pages_failed = 0u32;
    while let Some((page, links)) = rx.recv().await {
        match links {
            Some(links) => {
                by_page.insert(page, links);
            }
            None => pages_failed += 1,
        }
    }

    let links: Vec<String> = by_page.into_values().flatten().collect();
    DayHarvest {
        date,
        result_count,
        links,
        pages_total: pages,
        pages_failed,
    }
}

/// Totals for one harvested month.
pub struct MonthHarvest {
    pub total_results: u64,
    pub days_with_results: usize,
    pub pages_failed: u32,
}

/// Harvest every day of a month sequentially, writing one link file per
/// non-empty day and appending the month's total to the yearly summary file.
pub async fn harvest_month(
    fetcher: Arc<Fetcher>,
    adapter: Arc<dyn SiteAdapter>,
    year: i32,
    month: u32,
    links_root: &Path,
) -> Result<MonthHarvest> {
    let days = days_in_month(year, month)?;

    let pb = ProgressBar::new(days.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} days ({msg})")?
            .progress_chars("=> "),
    );

    let mut totals = MonthHarvest {
        total_results: 0,
        days_with_results: 0,
        pages_failed: 0,
    };

    for date in days {
        pb.set_message(date.to_string());
        let day = harvest_day(Arc::clone(&fetcher), Arc::clone(&adapter), date).await;

        if day.degraded() {
            warn!(
                "Day {} degraded: {}/{} pages fetched",
                date,
                day.pages_total - day.pages_failed,
                day.pages_total
            );
        }
        if !day.links.is_empty() {
            write_day_links(links_root, date, &day.links)?;
            totals.days_with_results += 1;
        }
        totals.total_results += day.result_count;
        totals.pages_failed += day.pages_failed;
        pb.inc(1);
    }
    pb.finish_and_clear();

    append_month_summary(links_root, year, month, totals.total_results)?;
    info!(
        "Harvested {}-{:02}: {} results across {} days",
        year, month, totals.total_results, totals.days_with_results
    );
    Ok(totals)
}

/// Path of one day's link file: `<root>/<year>/<month:02>/<YYYY-MM-DD>.txt`.
pub fn day_links_path(root: &Path, date: NaiveDate) -> PathBuf {
    root.join(format!(
        "{}/{:02}/{}.txt",
        date.format("%Y"),
        chrono::Datelike::month(&date),
        date.format("%Y-%m-%d")
    ))
}

/// One whole-file write per day, links already in page order, so readers
/// never observe interleaved partial lines.
fn write_day_links(root: &Path, date: NaiveDate, links: &[String]) -> Result<()> {
    let path = day_links_path(root, date);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut body = links.join("\n");
    body.push('\n');
    fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_day_links(root: &Path, date: NaiveDate) -> Result<Option<Vec<String>>> {
    let path = day_links_path(root, date);
    if !path.exists() {
        return Ok(None);
    }
    let body = fs::read_to_string(&path)?;
    Ok(Some(
        body.lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
    ))
}

/// Append `<MonthAbbrev>: <total>` to `<root>/movies_released_<year>.txt`.
fn append_month_summary(root: &Path, year: i32, month: u32, total: u64) -> Result<()> {
    fs::create_dir_all(root)?;
    let path = root.join(format!("movies_released_{}.txt", year));
    let mut file = fs::OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}: {}", month_abbrev(year, month)?, total)?;
    Ok(())
}

fn month_abbrev(year: i32, month: u32) -> Result<String> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("Invalid month {}-{}", year, month))?;
    Ok(first.format("%b").to_string())
}

pub fn days_in_month(year: i32, month: u32) -> Result<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .with_context(|| format!("Invalid month {}-{}", year, month))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .context("Invalid successor month")?;
    Ok(first.iter_days().take_while(|d| *d < next).collect())
}

// ── Tests ──
