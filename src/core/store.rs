//! Identity store.
//!
//! sqlite-backed storage for the single operator identity. Server workers
//! share the database file but not memory, so "create on first use" relies
//! on the UNIQUE username constraint rather than an in-process lock.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::core::constants::{OPERATOR_EMAIL, OPERATOR_USERNAME};
use crate::error::StoreError;

pub type DbPool = SqlitePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    /// Created by soloist itself rather than imported or added by hand.
    pub system_managed: bool,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Whether a password login could ever succeed for this identity.
    pub fn has_usable_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// Backing store for the operator identity.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// The first identity by creation order, if any.
    async fn first(&self) -> Result<Option<Identity>, StoreError>;

    /// Return the first identity, creating the operator if there is none.
    ///
    /// Concurrent callers, including ones in other processes, must all
    /// observe the same identity.
    async fn resolve_operator(&self) -> Result<Identity, StoreError>;
}

/// Open (creating if needed) the sqlite database at `path`.
///
/// # Errors
///
/// Returns `StoreError` if the parent directory or the database cannot be
/// created.
pub async fn connect(path: &Path, max_connections: u32) -> Result<DbPool, StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await?;

    debug!(path = %path.display(), "database connected");
    Ok(pool)
}

/// Apply pending schema migrations. Safe to run any number of times.
///
/// # Errors
///
/// Returns `StoreError::Migrate` on any failure; callers must not continue
/// with an unknown schema.
pub async fn migrate(pool: &DbPool) -> Result<(), StoreError> {
    info!("running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// [`IdentityStore`] over a sqlite pool.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    pool: DbPool,
}

impl SqliteIdentityStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Total number of identities.
    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Insert an identity that was not created by soloist.
    pub async fn insert(&self, username: &str, email: &str) -> Result<Identity, StoreError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO identities (username, email, password_hash, system_managed, created_at)
            VALUES (?, ?, NULL, 0, ?)
            RETURNING id, username, email, password_hash, system_managed, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(identity)
    }
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn first(&self) -> Result<Option<Identity>, StoreError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, username, email, password_hash, system_managed, created_at
            FROM identities
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn resolve_operator(&self) -> Result<Identity, StoreError> {
        if let Some(identity) = self.first().await? {
            return Ok(identity);
        }

        // Losers of a concurrent insert hit the UNIQUE constraint and fall
        // through to the re-read below.
        let inserted = sqlx::query(
            r#"
            INSERT INTO identities (username, email, password_hash, system_managed, created_at)
            VALUES (?, ?, NULL, 1, ?)
            ON CONFLICT(username) DO NOTHING
            "#,
        )
        .bind(OPERATOR_USERNAME)
        .bind(OPERATOR_EMAIL)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!(username = OPERATOR_USERNAME, "created operator identity");
        }

        self.first().await?.ok_or(StoreError::IdentityMissing)
    }
}
