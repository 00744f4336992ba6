pub mod detail;
pub mod site;

use anyhow::Result;
use tracing::warn;

use crate::db::MovieRecord;
use crate::fetch::Fetcher;
use site::SiteAdapter;

/// Fetch one item's detail page plus its full-credits page and parse both
/// into a MovieRecord.
///
/// A detail-page fetch failure is an error for the caller to absorb; an
/// unlocatable or unfetchable credits page only degrades the record to a
/// partial one.
pub async fn scrape_movie(
    fetcher: &Fetcher,
    adapter: &dyn SiteAdapter,
    url: &str,
) -> Result<MovieRecord> {
    let detail_html = fetcher.fetch(url).await?;

    let credits_html = match adapter.credits_url(&detail_html) {
        Some(credits_url) => match fetcher.fetch(&credits_url).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!("Credits page unavailable for {}: {:#}", url, e);
                None
            }
        },
        None => {
            warn!("No credits link on {}", url);
            None
        }
    };

    Ok(detail::parse(adapter, url, &detail_html, credits_html.as_deref()))
}
