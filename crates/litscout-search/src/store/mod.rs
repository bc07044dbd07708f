//! SQLite access for article metadata and the related-article cache.
//!
//! `ArticleStore` wraps a single connection behind a mutex. Every public call
//! runs on the blocking pool so async callers never hold the lock across an
//! await point.

mod schema;

pub use schema::{FILTER_PASSED, PROCESS_COMPLETED, SCHEMA_VERSION};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::schema::{ArticleId, ArticleMetadata, RelatedCacheEntry, TenantId};
use schema::{
    METADATA_COLUMNS, SCHEMA_CREATE_ARTICLES, SCHEMA_CREATE_INDEXES, SCHEMA_CREATE_METADATA,
    SCHEMA_CREATE_RELATED_CACHE, SCHEMA_CREATE_SOURCES,
};

/// Text used to build the related-article query document
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub title: String,
    pub content: Option<String>,
    pub cleaned_content: Option<String>,
}

/// Keyword match row: article id plus display metadata
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRow {
    pub article_id: ArticleId,
    pub metadata: ArticleMetadata,
}

/// Article row as written by the ingestion pipeline
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub source_id: i64,
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub cleaned_content: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub filter_status: String,
    pub process_status: String,
}

/// Shared handle to the article database
#[derive(Clone)]
pub struct ArticleStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for ArticleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArticleStore").finish_non_exhaustive()
    }
}

impl ArticleStore {
    /// Open an article database. Call [`ArticleStore::initialize`] before
    /// first use of a fresh file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SearchError::Connection(format!(
                        "Failed to create database directory {:?}: {}",
                        parent, e
                    ))
                })?;
            }
        }

        debug!("Opening article database at {:?}", path);
        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an initialized in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        Self::create_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure_connection(conn: &Connection) -> SqliteResult<()> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        Ok(())
    }

    fn create_schema(conn: &Connection) -> SqliteResult<()> {
        conn.execute(SCHEMA_CREATE_SOURCES, [])?;
        conn.execute(SCHEMA_CREATE_ARTICLES, [])?;
        conn.execute(SCHEMA_CREATE_RELATED_CACHE, [])?;
        conn.execute(SCHEMA_CREATE_METADATA, [])?;
        conn.execute_batch(SCHEMA_CREATE_INDEXES)?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_metadata (key, value) VALUES ('schema_version', ?1)",
            [SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Create any missing tables and indexes.
    pub async fn initialize(&self) -> Result<()> {
        self.with_conn(|conn| {
            Self::create_schema(conn)?;
            info!("Article database schema ready (version {})", SCHEMA_VERSION);
            Ok(())
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await?
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Stored schema version, if the schema was initialized.
    pub async fn schema_version(&self) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let version = conn
                .query_row(
                    "SELECT value FROM schema_metadata WHERE key = 'schema_version'",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(version)
        })
        .await
    }

    /// Tenant-owned, passed articles whose title or content contains any of
    /// `terms` (case-insensitive), newest first.
    pub async fn keyword_candidates(
        &self,
        tenant: TenantId,
        terms: Vec<String>,
        limit: usize,
    ) -> Result<Vec<KeywordRow>> {
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        self.with_conn(move |conn| {
            let mut values = vec![
                Value::Integer(tenant.0),
                Value::Text(FILTER_PASSED.to_string()),
            ];
            let mut clauses = Vec::with_capacity(terms.len());
            for term in &terms {
                values.push(Value::Text(format!("%{}%", escape_like(term))));
                let n = values.len();
                clauses.push(format!(
                    "a.title LIKE ?{n} ESCAPE '\\' OR a.content LIKE ?{n} ESCAPE '\\'"
                ));
            }
            values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            let limit_param = values.len();

            let sql = format!(
                r#"
                SELECT {METADATA_COLUMNS}
                FROM articles a JOIN sources s ON s.id = a.source_id
                WHERE s.user_id = ?1 AND a.filter_status = ?2 AND ({})
                ORDER BY a.published_at DESC, a.id DESC
                LIMIT ?{limit_param}
                "#,
                clauses.join(" OR ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), row_to_keyword)?
                .collect::<SqliteResult<Vec<_>>>()?;

            debug!(
                "Keyword SQL matched {} rows for tenant {} ({} terms)",
                rows.len(),
                tenant,
                terms.len()
            );
            Ok(rows)
        })
        .await
    }

    /// Display metadata for the given ids, restricted to tenant-owned passed
    /// articles. With `require_completed`, also `process_status = completed`.
    ///
    /// Ids that do not qualify are absent from the map.
    pub async fn article_metadata(
        &self,
        tenant: TenantId,
        ids: Vec<ArticleId>,
        require_completed: bool,
    ) -> Result<HashMap<ArticleId, ArticleMetadata>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(move |conn| {
            let mut values = vec![
                Value::Integer(tenant.0),
                Value::Text(FILTER_PASSED.to_string()),
            ];
            let placeholders: Vec<String> = ids
                .iter()
                .map(|id| {
                    values.push(Value::Integer(*id));
                    format!("?{}", values.len())
                })
                .collect();

            let mut sql = format!(
                r#"
                SELECT {METADATA_COLUMNS}
                FROM articles a JOIN sources s ON s.id = a.source_id
                WHERE s.user_id = ?1 AND a.filter_status = ?2 AND a.id IN ({})
                "#,
                placeholders.join(", ")
            );
            if require_completed {
                values.push(Value::Text(PROCESS_COMPLETED.to_string()));
                sql.push_str(&format!(" AND a.process_status = ?{}", values.len()));
            }

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), row_to_keyword)?
                .collect::<SqliteResult<Vec<_>>>()?;

            Ok(rows
                .into_iter()
                .map(|row| (row.article_id, row.metadata))
                .collect())
        })
        .await
    }

    /// Title and content of an article owned by the tenant.
    pub async fn source_document(
        &self,
        tenant: TenantId,
        article_id: ArticleId,
    ) -> Result<Option<SourceDocument>> {
        self.with_conn(move |conn| {
            let doc = conn
                .query_row(
                    r#"
                    SELECT a.title, a.content, a.cleaned_content
                    FROM articles a JOIN sources s ON s.id = a.source_id
                    WHERE a.id = ?1 AND s.user_id = ?2
                    "#,
                    params![article_id, tenant.0],
                    |row| {
                        Ok(SourceDocument {
                            title: row.get(0)?,
                            content: row.get(1)?,
                            cleaned_content: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(doc)
        })
        .await
    }

    /// Number of passed articles owned by the tenant.
    pub async fn article_count(&self, tenant: TenantId) -> Result<usize> {
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                r#"
                SELECT COUNT(*) FROM articles a JOIN sources s ON s.id = a.source_id
                WHERE s.user_id = ?1 AND a.filter_status = ?2
                "#,
                params![tenant.0, FILTER_PASSED],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }

    // =========================================================================
    // Related cache
    // =========================================================================

    /// Cached related list for a source article, in computed order.
    pub async fn read_related_cache(
        &self,
        tenant: TenantId,
        source_article_id: ArticleId,
    ) -> Result<Vec<RelatedCacheEntry>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT source_article_id, related_article_id, score, created_at
                FROM related_article_cache
                WHERE user_id = ?1 AND source_article_id = ?2
                ORDER BY rank ASC
                "#,
            )?;
            let entries = stmt
                .query_map(params![tenant.0, source_article_id], |row| {
                    Ok(RelatedCacheEntry {
                        source_article_id: row.get(0)?,
                        related_article_id: row.get(1)?,
                        score: row.get::<_, f64>(2)? as f32,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<SqliteResult<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    /// Replace the cached list for a source article with `related`.
    ///
    /// Deletes every existing row for the source and inserts the new list in
    /// one transaction. An empty list leaves zero rows.
    pub async fn replace_related_cache(
        &self,
        tenant: TenantId,
        source_article_id: ArticleId,
        related: Vec<(ArticleId, f32)>,
    ) -> Result<usize> {
        self.with_conn(move |conn| {
            let created_at = Utc::now();
            let tx = conn.unchecked_transaction()?;

            let removed = tx.execute(
                "DELETE FROM related_article_cache WHERE user_id = ?1 AND source_article_id = ?2",
                params![tenant.0, source_article_id],
            )?;

            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT OR REPLACE INTO related_article_cache
                        (user_id, source_article_id, related_article_id, rank, score, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                )?;
                for (rank, (related_id, score)) in related.iter().enumerate() {
                    stmt.execute(params![
                        tenant.0,
                        source_article_id,
                        related_id,
                        rank as i64,
                        *score as f64,
                        created_at,
                    ])?;
                }
            }

            tx.commit()?;
            debug!(
                "Replaced related cache for article {} (tenant {}): {} removed, {} inserted",
                source_article_id,
                tenant,
                removed,
                related.len()
            );
            Ok(related.len())
        })
        .await
    }

    // =========================================================================
    // Ingestion-side writes (used by tooling and tests)
    // =========================================================================

    /// Insert a feed source for a tenant.
    pub async fn insert_source(&self, tenant: TenantId, name: impl Into<String>) -> Result<i64> {
        let name = name.into();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sources (user_id, name) VALUES (?1, ?2)",
                params![tenant.0, name],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Insert an article, keeping the given id when provided.
    pub async fn insert_article(&self, id: Option<ArticleId>, article: NewArticle) -> Result<i64> {
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO articles
                    (id, source_id, title, url, content, cleaned_content, summary,
                     published_at, filter_status, process_status)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    id,
                    article.source_id,
                    article.title,
                    article.url,
                    article.content,
                    article.cleaned_content,
                    article.summary,
                    article.published_at,
                    article.filter_status,
                    article.process_status,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }
}

fn row_to_keyword(row: &rusqlite::Row<'_>) -> SqliteResult<KeywordRow> {
    Ok(KeywordRow {
        article_id: row.get(0)?,
        metadata: ArticleMetadata {
            title: row.get(1)?,
            url: row.get(2)?,
            summary: row.get(3)?,
            published_at: row.get(4)?,
            source_name: row.get(5)?,
        },
    })
}

/// Escape LIKE wildcards so terms match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(source_id: i64, title: &str, day: u32) -> NewArticle {
        NewArticle {
            source_id,
            title: title.to_string(),
            url: format!("https://example.org/{}", day),
            content: Some(format!("Body of {}", title)),
            published_at: Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()),
            filter_status: FILTER_PASSED.to_string(),
            process_status: PROCESS_COMPLETED.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    async fn test_in_memory_has_schema_version() {
        let store = ArticleStore::in_memory().unwrap();
        assert_eq!(
            store.schema_version().await.unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );
    }

    #[tokio::test]
    async fn test_open_file_creates_parent_and_persists() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("data").join("articles.db");

        let store = ArticleStore::open(&path).unwrap();
        store.initialize().await.unwrap();
        let source = store.insert_source(TenantId(1), "arXiv").await.unwrap();
        store
            .insert_article(Some(11), article(source, "GPT on disk", 1))
            .await
            .unwrap();
        drop(store);

        assert!(path.exists());
        let reopened = ArticleStore::open(&path).unwrap();
        reopened.initialize().await.unwrap();
        assert_eq!(
            reopened.schema_version().await.unwrap().as_deref(),
            Some(SCHEMA_VERSION)
        );

        let rows = reopened
            .keyword_candidates(TenantId(1), vec!["gpt".to_string()], 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].article_id, 11);
    }

    #[tokio::test]
    async fn test_keyword_candidates_scoped_and_newest_first() {
        let store = ArticleStore::in_memory().unwrap();
        let mine = store.insert_source(TenantId(1), "arXiv").await.unwrap();
        let theirs = store.insert_source(TenantId(2), "Other").await.unwrap();

        store
            .insert_article(Some(1), article(mine, "GPT scaling laws", 1))
            .await
            .unwrap();
        store
            .insert_article(Some(2), article(mine, "Diffusion models", 2))
            .await
            .unwrap();
        store
            .insert_article(Some(3), article(mine, "gpt in the wild", 3))
            .await
            .unwrap();
        store
            .insert_article(Some(4), article(theirs, "GPT elsewhere", 4))
            .await
            .unwrap();
        let mut rejected = article(mine, "GPT rejected", 5);
        rejected.filter_status = "rejected".to_string();
        store.insert_article(Some(5), rejected).await.unwrap();

        let rows = store
            .keyword_candidates(TenantId(1), vec!["GPT".to_string()], 10)
            .await
            .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.article_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(rows[0].metadata.source_name, "arXiv");
    }

    #[tokio::test]
    async fn test_keyword_candidates_match_content() {
        let store = ArticleStore::in_memory().unwrap();
        let src = store.insert_source(TenantId(1), "feed").await.unwrap();
        let mut a = article(src, "Untitled", 1);
        a.content = Some("A study of sparse attention".to_string());
        store.insert_article(Some(9), a).await.unwrap();

        let rows = store
            .keyword_candidates(TenantId(1), vec!["attention".to_string()], 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].article_id, 9);
    }

    #[tokio::test]
    async fn test_article_metadata_filters() {
        let store = ArticleStore::in_memory().unwrap();
        let src = store.insert_source(TenantId(1), "feed").await.unwrap();
        store
            .insert_article(Some(1), article(src, "done", 1))
            .await
            .unwrap();
        let mut pending = article(src, "pending", 2);
        pending.process_status = "pending".to_string();
        store.insert_article(Some(2), pending).await.unwrap();

        let all = store
            .article_metadata(TenantId(1), vec![1, 2, 99], false)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let completed = store
            .article_metadata(TenantId(1), vec![1, 2], true)
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed.contains_key(&1));

        let other_tenant = store
            .article_metadata(TenantId(2), vec![1, 2], false)
            .await
            .unwrap();
        assert!(other_tenant.is_empty());
    }

    #[tokio::test]
    async fn test_source_document_requires_ownership() {
        let store = ArticleStore::in_memory().unwrap();
        let src = store.insert_source(TenantId(1), "feed").await.unwrap();
        store
            .insert_article(Some(42), article(src, "Attention", 1))
            .await
            .unwrap();

        assert!(store
            .source_document(TenantId(1), 42)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .source_document(TenantId(2), 42)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_replace_related_cache() {
        let store = ArticleStore::in_memory().unwrap();

        store
            .replace_related_cache(TenantId(1), 42, vec![(7, 0.9), (3, 0.8), (5, 0.7)])
            .await
            .unwrap();
        let entries = store.read_related_cache(TenantId(1), 42).await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.related_article_id).collect();
        assert_eq!(ids, vec![7, 3, 5]);

        store
            .replace_related_cache(TenantId(1), 42, vec![(8, 0.6)])
            .await
            .unwrap();
        let entries = store.read_related_cache(TenantId(1), 42).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].related_article_id, 8);

        store
            .replace_related_cache(TenantId(1), 42, Vec::new())
            .await
            .unwrap();
        assert!(store
            .read_related_cache(TenantId(1), 42)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_related_cache_is_tenant_scoped() {
        let store = ArticleStore::in_memory().unwrap();
        store
            .replace_related_cache(TenantId(1), 42, vec![(7, 0.9)])
            .await
            .unwrap();
        store
            .replace_related_cache(TenantId(2), 42, Vec::new())
            .await
            .unwrap();

        assert_eq!(
            store.read_related_cache(TenantId(1), 42).await.unwrap().len(),
            1
        );
    }
}
