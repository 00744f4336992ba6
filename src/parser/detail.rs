use std::sync::LazyLock;

use regex::Regex;

use crate::db::MovieRecord;
use crate::parser::site::SiteAdapter;

static RUNTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)h\s+(\d+)m$").unwrap());

/// Build a MovieRecord from a detail page and (when reachable) its full
/// credits page.
///
/// Every field has its own extraction rule and its own failure mode: a
/// missing or reshaped element degrades that field to None and never aborts
/// the record. When `credits_html` is None (credits link unlocatable or its
/// fetch failed), the record is returned early with Directors, Cast and
/// Description absent — a legitimate partial record, not an error.
pub fn parse(
    adapter: &dyn SiteAdapter,
    url: &str,
    detail_html: &str,
    credits_html: Option<&str>,
) -> MovieRecord {
    let mut record = MovieRecord::empty(url);

    if let Some(summary) = adapter.title_summary(detail_html) {
        let (title, year, rating, genres) = parse_title_summary(&summary);
        record.title = title;
        record.year = year;
        record.rating = rating;
        record.genres = genres;
    }

    if let Some(meta) = adapter.meta_summary(detail_html) {
        let (runtime, certificate) = parse_runtime_certificate(&meta);
        record.runtime_min = runtime;
        record.certificate = certificate;
    }

    let credits = match credits_html {
        Some(html) => html,
        None => return record,
    };

    record.directors = adapter.directors(credits);
    record.cast = adapter.cast(credits);
    record.description = adapter
        .long_description(detail_html)
        .and_then(|d| trim_description(&d));

    record
}

/// Split "Title (Year) ⭐ Rating | Genre1, Genre2" into its parts. Any part
/// that does not match its expected shape comes back None/empty.
fn parse_title_summary(
    summary: &str,
) -> (Option<String>, Option<i32>, Option<f64>, Vec<String>) {
    let (title_year, rating_genre) = match summary.split_once('⭐') {
        Some((left, right)) => (left, Some(right)),
        None => (summary, None),
    };

    let (title, year) = match title_year.split_once('(') {
        Some((t, rest)) => {
            let digits = rest.trim().trim_end_matches(')').trim();
            // Year must be all-digits; anything else degrades to None
            let year = if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                digits.parse::<i32>().ok()
            } else {
                None
            };
            (t.trim(), year)
        }
        None => (title_year.trim(), None),
    };
    let title = if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    };

    let (rating, genres) = match rating_genre {
        Some(rg) => {
            let mut parts = rg.split('|');
            let rating = parts
                .next()
                .and_then(|r| r.trim().parse::<f64>().ok());
            let genres = parts
                .next()
                .map(|g| {
                    g.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            (rating, genres)
        }
        None => (None, Vec::new()),
    };

    (title, year, rating, genres)
}

/// Split "Runtime | Certificate"; without the separator the whole string is
/// tried as a runtime and the certificate stays absent.
fn parse_runtime_certificate(meta: &str) -> (Option<u32>, Option<String>) {
    match meta.split_once('|') {
        Some((runtime, certificate)) => {
            let certificate = certificate.trim();
            let certificate = if certificate.is_empty() {
                None
            } else {
                Some(certificate.to_string())
            };
            (parse_runtime(runtime), certificate)
        }
        None => (parse_runtime(meta), None),
    }
}

/// Strictly "<hours>h <minutes>m" in minutes; any other shape is absent.
/// Hours may carry more than one digit.
fn parse_runtime(s: &str) -> Option<u32> {
    let caps = RUNTIME_RE.captures(s.trim())?;
    let hours: u32 = caps[1].parse().ok()?;
    let minutes: u32 = caps[2].parse().ok()?;
    Some(hours * 60 + minutes)
}

/// The long description meta field always leads with two non-description
/// sentences ("Directed by …. With ….") — drop the first two ". " separated
/// segments and rejoin the rest.
fn trim_description(long: &str) -> Option<String> {
    let rest: Vec<&str> = long.split(". ").skip(2).collect();
    if rest.is_empty() {
        return None;
    }
    let text = rest.join(" ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::site::ImdbAdapter;

    const DETAIL: &str = r#"<html><head>
        <meta property="og:title" content="Dune (2021) ⭐ 8.0 | Action, Adventure, Drama"/>
        <meta property="og:description" content="2h 35m | PG-13"/>
        <meta name="description" content="Dune: Directed by Denis Villeneuve. With Timoth&#233;e Chalamet, Rebecca Ferguson. A noble family becomes embroiled in a war. The fate of a desert planet hangs in the balance."/>
        <a href="/title/tt1160419/fullcredits/">All cast and crew</a>
    </head></html>"#;

    const CREDITS: &str = r#"<html><body>
        <h4 id="director">Directed by</h4>
        <table><tr><td class="name"><a>Denis Villeneuve</a></td></tr></table>
        <table class="cast_list">
          <tr><td class="primary_photo"><a><img/></a></td><td><a>Timothée Chalamet</a></td></tr>
          <tr><td class="primary_photo"><a><img/></a></td><td><a>Rebecca Ferguson</a></td></tr>
        </table>
    </body></html>"#;

    fn parse_full() -> MovieRecord {
        let adapter = ImdbAdapter::default();
        parse(&adapter, "https://www.imdb.com/title/tt1160419/", DETAIL, Some(CREDITS))
    }

    #[test]
    fn full_record() {
        let record = parse_full();
        assert_eq!(record.title.as_deref(), Some("Dune"));
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.rating, Some(8.0));
        assert_eq!(record.genres, vec!["Action", "Adventure", "Drama"]);
        assert_eq!(record.runtime_min, Some(155));
        assert_eq!(record.certificate.as_deref(), Some("PG-13"));
        assert_eq!(record.directors, vec!["Denis Villeneuve"]);
        assert_eq!(record.cast, vec!["Timothée Chalamet", "Rebecca Ferguson"]);
        assert_eq!(
            record.description.as_deref(),
            Some("A noble family becomes embroiled in a war The fate of a desert planet hangs in the balance.")
        );
    }

    #[test]
    fn missing_credits_page_yields_partial_record() {
        let adapter = ImdbAdapter::default();
        let record = parse(&adapter, "u", DETAIL, None);
        assert_eq!(record.title.as_deref(), Some("Dune"));
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.rating, Some(8.0));
        assert_eq!(record.runtime_min, Some(155));
        assert_eq!(record.certificate.as_deref(), Some("PG-13"));
        assert!(record.directors.is_empty());
        assert!(record.cast.is_empty());
        assert!(record.description.is_none());
    }

    #[test]
    fn missing_meta_summary_degrades_runtime_and_certificate_only() {
        let detail = r#"<html><head>
            <meta property="og:title" content="Dune (2021) ⭐ 8.0 | Action"/>
        </head></html>"#;
        let adapter = ImdbAdapter::default();
        let record = parse(&adapter, "u", detail, Some(CREDITS));
        assert!(record.runtime_min.is_none());
        assert!(record.certificate.is_none());
        assert_eq!(record.title.as_deref(), Some("Dune"));
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.directors, vec!["Denis Villeneuve"]);
    }

    #[test]
    fn runtime_two_hours_fifteen() {
        assert_eq!(parse_runtime("2h 15m"), Some(135));
    }

    #[test]
    fn runtime_two_digit_hours() {
        assert_eq!(parse_runtime("10h 2m"), Some(602));
    }

    #[test]
    fn runtime_other_shapes_are_absent() {
        assert_eq!(parse_runtime("95 min"), None);
        assert_eq!(parse_runtime("2h"), None);
        assert_eq!(parse_runtime("45m"), None);
        assert_eq!(parse_runtime(""), None);
    }

    #[test]
    fn runtime_without_certificate_separator() {
        let (runtime, certificate) = parse_runtime_certificate("1h 30m");
        assert_eq!(runtime, Some(90));
        assert!(certificate.is_none());
    }

    #[test]
    fn non_numeric_year_degrades_to_none() {
        let (title, year, _, _) = parse_title_summary("Dune (I) ⭐ 8.0 | Action");
        assert_eq!(title.as_deref(), Some("Dune"));
        assert!(year.is_none());
    }

    #[test]
    fn summary_without_rating_marker_keeps_title() {
        let (title, year, rating, genres) = parse_title_summary("Dune (2021)");
        assert_eq!(title.as_deref(), Some("Dune"));
        assert_eq!(year, Some(2021));
        assert!(rating.is_none());
        assert!(genres.is_empty());
    }

    #[test]
    fn short_description_degrades_to_none() {
        assert!(trim_description("Directed by X. With Y.").is_none());
        assert!(trim_description("One sentence only").is_none());
    }
}
