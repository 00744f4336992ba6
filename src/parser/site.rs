use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{Html, Selector};

// All version-pinned selectors for the current IMDb markup live here, so a
// site redesign means swapping this adapter, not rewriting the parser.
static COUNT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".sc-fd6cf13d-3").unwrap());
static ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.ipc-title-link-wrapper").unwrap());
static CREDITS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"a[href*="fullcredits"]"#).unwrap());
static OG_TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());
static OG_DESC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static LONG_DESC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static DIRECTOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#director + table td.name a").unwrap());
static CAST_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.cast_list td.primary_photo + td a").unwrap());

/// Everything the harvester and parser need to know about one site-markup
/// version: URL construction and raw field lookup. Methods take the page
/// body as text and degrade to None/empty when the expected element is gone.
pub trait SiteAdapter: Send + Sync {
    /// Search-results URL for one calendar day; `page` of None means the
    /// unpaginated count page.
    fn search_url(&self, date: NaiveDate, page: Option<u32>) -> String;

    /// Canonical detail-page URL for an item id.
    fn detail_url(&self, item_id: &str) -> String;

    /// Total result count from the results-count marker, if present.
    fn result_count(&self, html: &str) -> Option<u64>;

    /// Canonical detail URLs for every item anchor on a results page, in
    /// document order.
    fn item_links(&self, html: &str) -> Vec<String>;

    /// Absolute URL of the full-credits page linked from a detail page.
    fn credits_url(&self, detail_html: &str) -> Option<String>;

    /// The "Title (Year) ⭐ Rating | Genres" summary string.
    fn title_summary(&self, detail_html: &str) -> Option<String>;

    /// The "Runtime | Certificate" metadata string.
    fn meta_summary(&self, detail_html: &str) -> Option<String>;

    /// The long description meta field (leading non-description sentences
    /// included).
    fn long_description(&self, detail_html: &str) -> Option<String>;

    /// Director names from the credits page, in listing order.
    fn directors(&self, credits_html: &str) -> Vec<String>;

    /// Cast names from the credits page, in listing order, empty matches
    /// filtered out.
    fn cast(&self, credits_html: &str) -> Vec<String>;
}

/// Adapter for the current IMDb search and title markup.
pub struct ImdbAdapter {
    base_url: String,
}

impl ImdbAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn meta_content(html: &str, sel: &Selector) -> Option<String> {
        let doc = Html::parse_document(html);
        doc.select(sel)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(|s| s.to_string())
    }

    fn names(html: &str, sel: &Selector) -> Vec<String> {
        let doc = Html::parse_document(html);
        doc.select(sel)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

impl Default for ImdbAdapter {
    fn default() -> Self {
        Self::new("https://www.imdb.com")
    }
}

impl SiteAdapter for ImdbAdapter {
    fn search_url(&self, date: NaiveDate, page: Option<u32>) -> String {
        let day = date.format("%Y-%m-%d");
        let mut url = format!(
            "{}/search/title/?title_type=feature&release_date={day},{day}\
             &user_rating=1,10&genres=!documentary,!short&primary_language=en&adult=include",
            self.base_url
        );
        if let Some(n) = page {
            url.push_str(&format!("&page={}", n));
        }
        url
    }

    fn detail_url(&self, item_id: &str) -> String {
        format!("{}/title/{}/", self.base_url, item_id)
    }

    fn result_count(&self, html: &str) -> Option<u64> {
        let doc = Html::parse_document(html);
        let marker = doc.select(&COUNT_SEL).next()?;
        let text = marker.text().collect::<String>();
        // Marker reads like "1-50 of 1,234 titles." — the count is the last
        // whitespace token that survives separator stripping.
        text.split_whitespace()
            .rev()
            .find_map(|tok| tok.replace(',', "").replace('.', "").parse::<u64>().ok())
    }

    fn item_links(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        doc.select(&ITEM_SEL)
            .filter_map(|a| a.value().attr("href"))
            // href layout: /title/<id>/?ref_=... — the id is the third
            // path segment
            .filter_map(|href| href.split('/').nth(2))
            .filter(|id| !id.is_empty())
            .map(|id| self.detail_url(id))
            .collect()
    }

    fn credits_url(&self, detail_html: &str) -> Option<String> {
        let doc = Html::parse_document(detail_html);
        let href = doc
            .select(&CREDITS_SEL)
            .next()
            .and_then(|a| a.value().attr("href"))?;
        if href.starts_with("http") {
            Some(href.to_string())
        } else {
            Some(format!("{}{}", self.base_url, href))
        }
    }

    fn title_summary(&self, detail_html: &str) -> Option<String> {
        Self::meta_content(detail_html, &OG_TITLE_SEL)
    }

    fn meta_summary(&self, detail_html: &str) -> Option<String> {
        Self::meta_content(detail_html, &OG_DESC_SEL)
    }

    fn long_description(&self, detail_html: &str) -> Option<String> {
        Self::meta_content(detail_html, &LONG_DESC_SEL)
    }

    fn directors(&self, credits_html: &str) -> Vec<String> {
        Self::names(credits_html, &DIRECTOR_SEL)
    }

    fn cast(&self, credits_html: &str) -> Vec<String> {
        Self::names(credits_html, &CAST_SEL)
    }
}

// ── Tests ──
