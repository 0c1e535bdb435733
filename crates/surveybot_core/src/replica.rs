use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::{info, warn};

use crate::api::MediaWikiClient;
use crate::config::SurveyConfig;

/// Looks up page ids by title.
#[async_trait]
pub trait PageIdLookup: Send + Sync {
    async fn page_id(&self, title: &str) -> Result<Option<i64>>;
}

/// Counts distinct editors of a page.
#[async_trait]
pub trait EditorCountLookup: Send + Sync {
    async fn distinct_editors(&self, page_id: i64) -> Result<u64>;
}

/// Read-only view of a database replica holding the MediaWiki `page` and
/// `revision` tables.
#[derive(Debug, Clone)]
pub struct SqliteReplica {
    db_path: PathBuf,
    namespace: i32,
}

impl SqliteReplica {
    pub fn new(db_path: &Path, namespace: i32) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            namespace,
        }
    }

    fn open(&self) -> Result<Connection> {
        let connection = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open replica {}", self.db_path.display()))?;
        connection
            .busy_timeout(Duration::from_secs(5))
            .context("failed to set sqlite busy timeout")?;
        Ok(connection)
    }

    fn query_page_id(&self, db_title: &str) -> Result<Option<i64>> {
        let connection = self.open()?;
        connection
            .query_row(
                "SELECT page_id FROM page WHERE page_title = ?1 AND page_namespace = ?2",
                params![db_title, self.namespace],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to look up page id of {db_title}"))
    }

    fn query_distinct_editors(&self, page_id: i64) -> Result<u64> {
        let connection = self.open()?;
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(DISTINCT rev_actor) FROM revision WHERE rev_page = ?1",
                params![page_id],
                |row| row.get(0),
            )
            .with_context(|| format!("failed to count editors of page {page_id}"))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl PageIdLookup for SqliteReplica {
    async fn page_id(&self, title: &str) -> Result<Option<i64>> {
        let replica = self.clone();
        let db_title = db_key(title);
        tokio::task::spawn_blocking(move || replica.query_page_id(&db_title))
            .await
            .context("replica lookup task failed")?
    }
}

#[async_trait]
impl EditorCountLookup for SqliteReplica {
    async fn distinct_editors(&self, page_id: i64) -> Result<u64> {
        let replica = self.clone();
        tokio::task::spawn_blocking(move || replica.query_distinct_editors(page_id))
            .await
            .context("replica count task failed")?
    }
}

#[async_trait]
impl PageIdLookup for MediaWikiClient {
    async fn page_id(&self, title: &str) -> Result<Option<i64>> {
        MediaWikiClient::page_id(self, title).await
    }
}

/// Page ids of the category pages, built once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageIdCache {
    ids: BTreeMap<String, i64>,
}

impl PageIdCache {
    pub fn get(&self, category: &str) -> Option<i64> {
        self.ids.get(category).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Look up every configured category concurrently and wait for all of them.
pub async fn build_page_id_cache(
    lookup: &dyn PageIdLookup,
    survey: &SurveyConfig,
) -> Result<PageIdCache> {
    info!(categories = survey.categories.len(), "building cache of page ids");
    let lookups = survey.categories.iter().map(|category| async move {
        let path = survey.category_path(category);
        let id = lookup
            .page_id(&path)
            .await
            .with_context(|| format!("page id lookup failed for {path}"))?;
        Ok::<_, anyhow::Error>((category.clone(), id))
    });

    let mut ids = BTreeMap::new();
    for (category, id) in try_join_all(lookups).await? {
        match id {
            Some(id) => {
                ids.insert(category, id);
            }
            None => warn!(category = %category, "category page not found; no page id cached"),
        }
    }
    Ok(PageIdCache { ids })
}

/// Database key form of a title.
pub fn db_key(title: &str) -> String {
    title.trim().replace(' ', "_")
}
