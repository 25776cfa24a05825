use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const VENDOR_DATA_KEY: &str = "vendorData";
pub const VENDOR_ID_KEY: &str = "vendorId";

const SESSION_KEYS: [&str; 3] = [AUTH_TOKEN_KEY, VENDOR_DATA_KEY, VENDOR_ID_KEY];

/// Raw persisted session entries, exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSession {
    pub token: Option<String>,
    pub vendor_json: Option<String>,
    pub vendor_id: Option<String>,
}

impl PersistedSession {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.vendor_json.is_none() && self.vendor_id.is_none()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self) -> Result<PersistedSession>;
    /// Writes token, vendor profile and vendor id as one unit: either all
    /// three are stored or none are.
    async fn save_session(&self, token: &str, vendor_json: &str, vendor_id: &str) -> Result<()>;
    async fn save_vendor(&self, vendor_json: &str, vendor_id: &str) -> Result<()>;
    async fn clear_session(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // A single connection keeps `sqlite::memory:` databases shared across calls.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;
        let storage = Self { pool };
        storage.ensure_kv_table().await?;
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_kv_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS client_kv (
                key        TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure client_kv table exists")?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM client_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read key '{key}'"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO client_kv (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write key '{key}'"))?;
        Ok(())
    }

    async fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                "INSERT INTO client_kv (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            )
            .bind(*key)
            .bind(*value)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write key '{key}'"))?;
        }
        tx.commit().await.context("failed to commit session write")?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for Storage {
    async fn load_session(&self) -> Result<PersistedSession> {
        Ok(PersistedSession {
            token: self.get(AUTH_TOKEN_KEY).await?,
            vendor_json: self.get(VENDOR_DATA_KEY).await?,
            vendor_id: self.get(VENDOR_ID_KEY).await?,
        })
    }

    async fn save_session(&self, token: &str, vendor_json: &str, vendor_id: &str) -> Result<()> {
        self.set_many(&[
            (AUTH_TOKEN_KEY, token),
            (VENDOR_DATA_KEY, vendor_json),
            (VENDOR_ID_KEY, vendor_id),
        ])
        .await
    }

    async fn save_vendor(&self, vendor_json: &str, vendor_id: &str) -> Result<()> {
        self.set_many(&[(VENDOR_DATA_KEY, vendor_json), (VENDOR_ID_KEY, vendor_id)])
            .await
    }

    async fn clear_session(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for key in SESSION_KEYS {
            sqlx::query("DELETE FROM client_kv WHERE key = ?")
                .bind(key)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to remove key '{key}'"))?;
        }
        tx.commit().await.context("failed to commit session clear")?;
        Ok(())
    }
}

/// Process-local store for ephemeral sessions and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        Ok(f(&mut entries))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(&self) -> Result<PersistedSession> {
        self.with_entries(|entries| PersistedSession {
            token: entries.get(AUTH_TOKEN_KEY).cloned(),
            vendor_json: entries.get(VENDOR_DATA_KEY).cloned(),
            vendor_id: entries.get(VENDOR_ID_KEY).cloned(),
        })
    }

    async fn save_session(&self, token: &str, vendor_json: &str, vendor_id: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(AUTH_TOKEN_KEY.to_string(), token.to_string());
            entries.insert(VENDOR_DATA_KEY.to_string(), vendor_json.to_string());
            entries.insert(VENDOR_ID_KEY.to_string(), vendor_id.to_string());
        })
    }

    async fn save_vendor(&self, vendor_json: &str, vendor_id: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(VENDOR_DATA_KEY.to_string(), vendor_json.to_string());
            entries.insert(VENDOR_ID_KEY.to_string(), vendor_id.to_string());
        })
    }

    async fn clear_session(&self) -> Result<()> {
        self.with_entries(|entries| {
            for key in SESSION_KEYS {
                entries.remove(key);
            }
        })
    }
}

/// Normalizes a user-supplied database location into a sqlite URL.
pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
