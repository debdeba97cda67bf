//! Collection and contribution persistence.
//!
//! [`SqlStorage`] is implemented by [`PgStorage`] (PostgreSQL through sqlx)
//! and [`MockSqlStorage`] (in-memory, for tests).

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;

use crate::config::Config;

mod mock;
mod pg;

pub use mock::MockSqlStorage;
pub use pg::PgStorage;

/// Initialize a PostgreSQL connection pool
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new().connect(config.database_url()).await?;

    tracing::info!("Database connection pool established");

    Ok(pool)
}

/// Apply pending migrations from `services/migrations`.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    tracing::info!("Database migrations applied");

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SqlStorageError {
    #[error("Database error: {0}")]
    Db(String),
}

impl From<sqlx::Error> for SqlStorageError {
    fn from(e: sqlx::Error) -> Self {
        SqlStorageError::Db(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CollectionRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CollectionCreate {
    pub name: String,
    pub description: Option<String>,
    pub created_by: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionsSearchParams {
    /// Case-insensitive substring of the name; `None` matches everything.
    pub query: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ContributionRow {
    pub id: i64,
    pub collection_id: i64,
    pub user_id: i64,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ContributionInsert {
    pub collection_id: i64,
    pub user_id: i64,
    pub file_url: String,
}

pub trait SqlStorage: Clone + Send + Sync + 'static {
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    fn collections_create(
        &self,
        input: CollectionCreate,
    ) -> impl Future<Output = Result<CollectionRow, SqlStorageError>> + Send;

    fn collections_get(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<CollectionRow>, SqlStorageError>> + Send;

    /// Newest first.
    fn collections_search(
        &self,
        params: CollectionsSearchParams,
    ) -> impl Future<Output = Result<Vec<CollectionRow>, SqlStorageError>> + Send;

    fn collections_count(
        &self,
        query: Option<String>,
    ) -> impl Future<Output = Result<i64, SqlStorageError>> + Send;

    /// Newest first.
    fn collections_list_owned(
        &self,
        owner_id: i64,
    ) -> impl Future<Output = Result<Vec<CollectionRow>, SqlStorageError>> + Send;

    /// Delete a collection owned by `owner_id` together with its
    /// contributions, atomically.
    ///
    /// Returns the object references of the removed contributions, or `None`
    /// when the collection does not exist or belongs to someone else.
    fn collections_delete(
        &self,
        id: i64,
        owner_id: i64,
    ) -> impl Future<Output = Result<Option<Vec<String>>, SqlStorageError>> + Send;

    fn contributions_insert(
        &self,
        input: ContributionInsert,
    ) -> impl Future<Output = Result<ContributionRow, SqlStorageError>> + Send;

    /// In insertion order.
    fn contributions_list_by_collection(
        &self,
        collection_id: i64,
    ) -> impl Future<Output = Result<Vec<ContributionRow>, SqlStorageError>> + Send;

    fn contributions_count(
        &self,
        collection_id: i64,
    ) -> impl Future<Output = Result<i64, SqlStorageError>> + Send;
}
