//! SQLite schema definition

/// SQL schema for the search index database
pub const SCHEMA_SQL: &str = r#"
-- Sites: configured crawl roots and their indexing status
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    status_time TEXT NOT NULL,
    last_error TEXT
);

-- Pages: one row per fetch attempt target, unique per (site, path)
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    response_code INTEGER NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    UNIQUE(site_id, path)
);

-- Lemmas: per-site dictionary forms with running rank totals
CREATE TABLE IF NOT EXISTS lemmas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    lemma TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0,
    UNIQUE(site_id, lemma)
);

-- Page/lemma associations: occurrence count of a lemma on one page
CREATE TABLE IF NOT EXISTS page_lemmas (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    lemma_id INTEGER NOT NULL REFERENCES lemmas(id) ON DELETE CASCADE,
    rank INTEGER NOT NULL,
    UNIQUE(page_id, lemma_id)
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_pages_site ON pages(site_id);
CREATE INDEX IF NOT EXISTS idx_lemmas_site ON lemmas(site_id);
CREATE INDEX IF NOT EXISTS idx_lemmas_text ON lemmas(lemma);
CREATE INDEX IF NOT EXISTS idx_page_lemmas_page ON page_lemmas(page_id);
CREATE INDEX IF NOT EXISTS idx_page_lemmas_lemma ON page_lemmas(lemma_id);
"#;
