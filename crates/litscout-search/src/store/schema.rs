//! SQLite schema for the article database and the related-article cache.
//!
//! `sources` and `articles` are written by the ingestion pipeline; the engine
//! only reads them. `related_article_cache` is owned by the engine.

/// Schema version stored in `schema_metadata`
pub const SCHEMA_VERSION: &str = "1";

/// Feed sources. Tenant ownership lives here.
pub const SCHEMA_CREATE_SOURCES: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    url TEXT
)
"#;

/// Ingested articles.
pub const SCHEMA_CREATE_ARTICLES: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    title TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    content TEXT,
    cleaned_content TEXT,
    summary TEXT,
    -- RFC 3339 text, NULL when the feed had no date
    published_at TEXT,
    -- pending | passed | rejected
    filter_status TEXT NOT NULL DEFAULT 'pending',
    -- pending | completed | failed
    process_status TEXT NOT NULL DEFAULT 'pending'
)
"#;

/// Persisted related-article lists, one row per (tenant, source, related).
///
/// `rank` keeps the computed order so cached reads replay it exactly.
pub const SCHEMA_CREATE_RELATED_CACHE: &str = r#"
CREATE TABLE IF NOT EXISTS related_article_cache (
    user_id INTEGER NOT NULL,
    source_article_id INTEGER NOT NULL,
    related_article_id INTEGER NOT NULL,
    rank INTEGER NOT NULL,
    score REAL NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (user_id, source_article_id, related_article_id)
)
"#;

pub const SCHEMA_CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_metadata (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
)
"#;

pub const SCHEMA_CREATE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_sources_user ON sources(user_id);
CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source_id);
CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published_at);
CREATE INDEX IF NOT EXISTS idx_related_source
    ON related_article_cache(user_id, source_article_id, rank);
"#;

/// Article filter status the engine reads
pub const FILTER_PASSED: &str = "passed";

/// Article process status required for related results
pub const PROCESS_COMPLETED: &str = "completed";

/// Metadata columns, joined as `a` (articles) and `s` (sources)
pub const METADATA_COLUMNS: &str = "a.id, a.title, a.url, a.summary, a.published_at, s.name";
