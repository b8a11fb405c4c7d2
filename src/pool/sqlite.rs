use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension as _, params};
use serde_json::Value;

use super::cache::SwapCache;
use crate::error::{Result, SwapError};

/// Cache persisted in SQLite. Expiry is stored as unix milliseconds and
/// checked on read.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteCache {
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create cache dir {}", dir.display()))?;
        }

        let conn =
            Connection::open(&path).with_context(|| format!("open sqlite {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set sqlite busy_timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .context("configure sqlite pragmas")?;

        migrate(&conn).context("migrate sqlite schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| SwapError::cache("sqlite connection poisoned"))?;
            f(&conn).map_err(|e| SwapError::cache(e.to_string()))
        })
        .await
        .map_err(|e| SwapError::cache(format!("sqlite task: {e}")))?
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn expiry_millis(ttl: Duration) -> i64 {
    now_millis().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
}

fn decode_value(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| SwapError::cache(format!("decode cached value: {e}")))
}

#[async_trait]
impl SwapCache for SqliteCache {
    async fn get(&self, kind: &str, key: &str) -> Result<Option<Value>> {
        let (kind, key) = (kind.to_string(), key.to_string());
        let raw = self
            .with_conn(move |conn| {
                conn.query_row(
                    r#"
SELECT value FROM cache_values
WHERE kind = ?1 AND key = ?2 AND expires_at > ?3
"#,
                    params![kind, key, now_millis()],
                    |row| row.get::<_, String>(0),
                )
                .optional()
            })
            .await?;
        raw.as_deref().map(decode_value).transpose()
    }

    async fn set(&self, kind: &str, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let (kind, key) = (kind.to_string(), key.to_string());
        let raw = value.to_string();
        let expires_at = expiry_millis(ttl);
        self.with_conn(move |conn| {
            conn.execute(
                r#"
INSERT INTO cache_values (kind, key, value, expires_at) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(kind, key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
"#,
                params![kind, key, raw, expires_at],
            )
            .map(|_| ())
        })
        .await
    }

    async fn remove(&self, kind: &str, key: &str) -> Result<()> {
        let (kind, key) = (kind.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM cache_values WHERE kind = ?1 AND key = ?2",
                params![kind, key],
            )?;
            conn.execute(
                "DELETE FROM cache_sets WHERE kind = ?1 AND key = ?2",
                params![kind, key],
            )?;
            conn.execute(
                "DELETE FROM cache_set_members WHERE kind = ?1 AND key = ?2",
                params![kind, key],
            )?;
            Ok(())
        })
        .await
    }

    async fn add_to_ordered_set(
        &self,
        kind: &str,
        key: &str,
        sort_key: &str,
        value: Value,
        ttl: Duration,
    ) -> Result<()> {
        let (kind, key, sort_key) = (kind.to_string(), key.to_string(), sort_key.to_string());
        let raw = value.to_string();
        let expires_at = expiry_millis(ttl);
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
DELETE FROM cache_set_members
WHERE kind = ?1 AND key = ?2
  AND EXISTS (
    SELECT 1 FROM cache_sets s
    WHERE s.kind = ?1 AND s.key = ?2 AND s.expires_at <= ?3
  )
"#,
                params![kind, key, now_millis()],
            )?;
            tx.execute(
                r#"
INSERT INTO cache_sets (kind, key, expires_at) VALUES (?1, ?2, ?3)
ON CONFLICT(kind, key) DO UPDATE SET expires_at = excluded.expires_at
"#,
                params![kind, key, expires_at],
            )?;
            tx.execute(
                r#"
INSERT INTO cache_set_members (kind, key, sort_key, value) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT(kind, key, sort_key) DO UPDATE SET value = excluded.value
"#,
                params![kind, key, sort_key, raw],
            )?;
            tx.commit()
        })
        .await
    }

    async fn get_ordered_set(&self, kind: &str, key: &str) -> Result<Vec<Value>> {
        let (kind, key) = (kind.to_string(), key.to_string());
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
SELECT m.value
FROM cache_set_members m
JOIN cache_sets s ON s.kind = m.kind AND s.key = m.key
WHERE m.kind = ?1 AND m.key = ?2 AND s.expires_at > ?3
ORDER BY m.sort_key
"#,
                )?;
                let rows = stmt.query_map(params![kind, key, now_millis()], |row| {
                    row.get::<_, String>(0)
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await?;
        rows.iter().map(|raw| decode_value(raw)).collect()
    }
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS cache_values (
  kind TEXT NOT NULL,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  expires_at INTEGER NOT NULL,
  PRIMARY KEY (kind, key)
);
CREATE TABLE IF NOT EXISTS cache_sets (
  kind TEXT NOT NULL,
  key TEXT NOT NULL,
  expires_at INTEGER NOT NULL,
  PRIMARY KEY (kind, key)
);
CREATE TABLE IF NOT EXISTS cache_set_members (
  kind TEXT NOT NULL,
  key TEXT NOT NULL,
  sort_key TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (kind, key, sort_key)
);
"#,
    )
    .context("create tables")?;
    Ok(())
}
