use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

const DB_FILE: &str = "crawl.sqlite";

/// Open (or create) the crawl ledger inside the output directory.
pub fn connect(output_dir: &Path) -> Result<Connection> {
    let conn = Connection::open(output_dir.join(DB_FILE))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id           INTEGER PRIMARY KEY,
            category_url TEXT NOT NULL,
            started_at   TEXT NOT NULL DEFAULT (datetime('now')),
            finished_at  TEXT,
            pages        INTEGER NOT NULL DEFAULT 0,
            emitted      INTEGER NOT NULL DEFAULT 0,
            skipped      INTEGER NOT NULL DEFAULT 0,
            error        TEXT
        );

        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            run_id     INTEGER NOT NULL REFERENCES runs(id),
            url        TEXT NOT NULL,
            products   INTEGER NOT NULL,
            emitted    INTEGER NOT NULL,
            scraped_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_run ON pages(run_id);

        -- Durable seen-set; only consulted when a run starts with --resume.
        CREATE TABLE IF NOT EXISTS seen_urls (
            url        TEXT PRIMARY KEY,
            run_id     INTEGER NOT NULL REFERENCES runs(id),
            first_seen TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Runs ──

pub fn start_run(conn: &Connection, category_url: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO runs (category_url) VALUES (?1)",
        rusqlite::params![category_url],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(
    conn: &Connection,
    run_id: i64,
    pages: usize,
    emitted: usize,
    skipped: usize,
    error: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE runs
         SET finished_at = datetime('now'), pages = ?2, emitted = ?3, skipped = ?4, error = ?5
         WHERE id = ?1",
        rusqlite::params![run_id, pages, emitted, skipped, error],
    )?;
    Ok(())
}

// ── Pages ──

/// Record one traversed page and its emitted URLs in a single
/// transaction.
pub fn record_page(
    conn: &Connection,
    run_id: i64,
    url: &str,
    products: usize,
    emitted_urls: &[String],
) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO pages (run_id, url, products, emitted) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![run_id, url, products, emitted_urls.len()],
    )?;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO seen_urls (url, run_id) VALUES (?1, ?2)")?;
        for u in emitted_urls {
            stmt.execute(rusqlite::params![u, run_id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Every URL emitted by any previous run, for seeding the dedup filter.
pub fn load_seen(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM seen_urls")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub runs: usize,
    pub completed_runs: usize,
    pub pages: usize,
    pub products: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let completed_runs: usize = conn.query_row(
        "SELECT COUNT(*) FROM runs WHERE finished_at IS NOT NULL AND error IS NULL",
        [],
        |r| r.get(0),
    )?;
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let products: usize = conn.query_row("SELECT COUNT(*) FROM seen_urls", [], |r| r.get(0))?;
    Ok(Stats {
        runs,
        completed_runs,
        pages,
        products,
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

    #[test]
    fn run_lifecycle_is_recorded() {
        let conn = test_conn();
        let run_id = start_run(&conn, "https://www.daraz.pk/washers-dryers").unwrap();
        record_page(
            &conn,
            run_id,
            "https://www.daraz.pk/washers-dryers?page=1",
            3,
            &["https://a/p/1".to_string(), "https://a/p/2".to_string()],
        )
        .unwrap();
        finish_run(&conn, run_id, 1, 2, 1, None).unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.completed_runs, 1);
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.products, 2);
    }

    #[test]
    fn seen_urls_survive_for_resume() {
        let conn = test_conn();
        let run_id = start_run(&conn, "https://www.daraz.pk/washers-dryers").unwrap();
        record_page(&conn, run_id, "p1", 1, &["https://a/p/1".to_string()]).unwrap();
        // A later run re-emitting the same url is a no-op in the ledger.
        let run2 = start_run(&conn, "https://www.daraz.pk/washers-dryers").unwrap();
        record_page(&conn, run2, "p1", 1, &["https://a/p/1".to_string()]).unwrap();

        let seen = load_seen(&conn).unwrap();
        assert_eq!(seen, vec!["https://a/p/1".to_string()]);
    }

    #[test]
    fn failed_run_keeps_its_error() {
        let conn = test_conn();
        let run_id = start_run(&conn, "https://www.daraz.pk/x").unwrap();
        finish_run(&conn, run_id, 0, 0, 0, Some("navigation timed out")).unwrap();
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.completed_runs, 0);
    }
}
