use anyhow::Result;
use rusqlite::Connection;
use tracing::warn;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS movies (
            id          INTEGER PRIMARY KEY,
            title       TEXT NOT NULL,
            year        INTEGER,
            genre       TEXT,
            rating      REAL,
            certificate TEXT,
            directors   TEXT,
            \"cast\"      TEXT,
            description TEXT,
            runtime     INTEGER,
            source_url  TEXT,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(title, year)
        );
        CREATE INDEX IF NOT EXISTS idx_movies_year ON movies(year);
        ",
    )?;
    Ok(())
}

/// One parsed catalog item. Constructed fresh per detail-page fetch, never
/// mutated after parsing, handed to the upserter and discarded.
#[derive(Debug, Clone)]
pub struct MovieRecord {
    pub url: String,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    pub rating: Option<f64>,
    pub runtime_min: Option<u32>,
    pub certificate: Option<String>,
    pub directors: Vec<String>,
    pub cast: Vec<String>,
    pub description: Option<String>,
}

impl MovieRecord {
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            year: None,
            genres: Vec::new(),
            rating: None,
            runtime_min: None,
            certificate: None,
            directors: Vec::new(),
            cast: Vec::new(),
            description: None,
        }
    }
}

fn joined(names: &[String]) -> Option<String> {
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

/// Batch-upsert one day's records in a single transaction, keyed on the
/// natural key (title, year): an existing row with the same key has all
/// other columns overwritten. Records without a title are unusable and are
/// skipped (counted in the return value as `skipped`).
pub fn upsert_movies(conn: &Connection, records: &[MovieRecord]) -> Result<UpsertCounts> {
    let tx = conn.unchecked_transaction()?;
    let mut counts = UpsertCounts::default();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO movies
             (title, year, genre, rating, certificate, directors, \"cast\",
              description, runtime, source_url, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, datetime('now'))
             ON CONFLICT(title, year) DO UPDATE SET
                 genre       = excluded.genre,
                 rating      = excluded.rating,
                 certificate = excluded.certificate,
                 directors   = excluded.directors,
                 \"cast\"      = excluded.\"cast\",
                 description = excluded.description,
                 runtime     = excluded.runtime,
                 source_url  = excluded.source_url,
                 updated_at  = excluded.updated_at",
        )?;
        for record in records {
            let title = match &record.title {
                Some(t) => t,
                None => {
                    warn!("Skipping record without title: {}", record.url);
                    counts.skipped += 1;
                    continue;
                }
            };
            stmt.execute(rusqlite::params![
                title,
                record.year,
                joined(&record.genres),
                record.rating,
                record.certificate,
                joined(&record.directors),
                joined(&record.cast),
                record.description,
                record.runtime_min,
                record.url,
            ])?;
            counts.written += 1;
        }
    }
    tx.commit()?;
    Ok(counts)
}

#[derive(Debug, Default)]
pub struct UpsertCounts {
    pub written: usize,
    pub skipped: usize,
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub rated: usize,
    pub missing_runtime: usize,
    pub missing_credits: usize,
    pub distinct_years: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let total: usize = conn.query_row("SELECT COUNT(*) FROM movies", [], |r| r.get(0))?;
    let rated: usize = conn.query_row(
        "SELECT COUNT(*) FROM movies WHERE rating IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let missing_runtime: usize = conn.query_row(
        "SELECT COUNT(*) FROM movies WHERE runtime IS NULL",
        [],
        |r| r.get(0),
    )?;
    let missing_credits: usize = conn.query_row(
        "SELECT COUNT(*) FROM movies WHERE directors IS NULL",
        [],
        |r| r.get(0),
    )?;
    let distinct_years: usize = conn.query_row(
        "SELECT COUNT(DISTINCT year) FROM movies WHERE year IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        total,
        rated,
        missing_runtime,
        missing_credits,
        distinct_years,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn dune(rating: f64, description: &str) -> MovieRecord {
        MovieRecord {
            url: "https://www.imdb.com/title/tt1160419/".into(),
            title: Some("Dune".into()),
            year: Some(2021),
            genres: vec!["Action".into(), "Adventure".into()],
            rating: Some(rating),
            runtime_min: Some(155),
            certificate: Some("PG-13".into()),
            directors: vec!["Denis Villeneuve".into()],
            cast: vec!["Timothée Chalamet".into(), "Rebecca Ferguson".into()],
            description: Some(description.into()),
        }
    }

    #[test]
    fn upsert_overwrites_on_natural_key() {
        let conn = test_conn();
        upsert_movies(&conn, &[dune(7.9, "first pass")]).unwrap();
        upsert_movies(&conn, &[dune(8.0, "second pass")]).unwrap();

        let rows: usize = conn
            .query_row("SELECT COUNT(*) FROM movies", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);

        let (rating, description): (f64, String) = conn
            .query_row(
                "SELECT rating, description FROM movies WHERE title = 'Dune' AND year = 2021",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(rating, 8.0);
        assert_eq!(description, "second pass");
    }

    #[test]
    fn lists_are_comma_joined() {
        let conn = test_conn();
        upsert_movies(&conn, &[dune(8.0, "d")]).unwrap();
        let (genre, cast): (String, String) = conn
            .query_row("SELECT genre, \"cast\" FROM movies", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(genre, "Action, Adventure");
        assert_eq!(cast, "Timothée Chalamet, Rebecca Ferguson");
    }

    #[test]
    fn titleless_record_is_skipped_not_fatal() {
        let conn = test_conn();
        let mut partial = MovieRecord::empty("https://www.imdb.com/title/tt0000000/");
        partial.year = Some(1999);
        let counts = upsert_movies(&conn, &[partial, dune(8.0, "d")]).unwrap();
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.written, 1);
    }

    #[test]
    fn partial_record_stores_nulls() {
        let conn = test_conn();
        let mut partial = MovieRecord::empty("u");
        partial.title = Some("Obscure".into());
        upsert_movies(&conn, &[partial]).unwrap();

        let (runtime, directors): (Option<i64>, Option<String>) = conn
            .query_row(
                "SELECT runtime, directors FROM movies WHERE title = 'Obscure'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert!(runtime.is_none());
        assert!(directors.is_none());
    }

    #[test]
    fn stats_count_absent_fields() {
        let conn = test_conn();
        let mut partial = MovieRecord::empty("u");
        partial.title = Some("Obscure".into());
        upsert_movies(&conn, &[dune(8.0, "d"), partial]).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.rated, 1);
        assert_eq!(stats.missing_runtime, 1);
        assert_eq!(stats.missing_credits, 1);
        assert_eq!(stats.distinct_years, 1);
    }
}
