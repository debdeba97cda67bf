//! Mock SQL storage for testing.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use super::{
    CollectionCreate, CollectionRow, CollectionsSearchParams, ContributionInsert, ContributionRow,
    SqlStorage, SqlStorageError,
};

#[derive(Default)]
struct Tables {
    collections: Vec<CollectionRow>,
    contributions: Vec<ContributionRow>,
    next_collection_id: i64,
    next_contribution_id: i64,
}

/// In-memory implementation of `SqlStorage` for testing.
///
/// Every trait call is counted so tests can assert that a request was
/// rejected before touching the database.
#[derive(Clone)]
pub struct MockSqlStorage {
    tables: Arc<RwLock<Tables>>,
    is_connected: bool,
    fail_contribution_inserts: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockSqlStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSqlStorage {
    pub fn new() -> Self {
        Self {
            tables: Arc::default(),
            is_connected: true,
            fail_contribution_inserts: Arc::default(),
            calls: Arc::default(),
        }
    }

    /// Simulates a database that is down.
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            ..Self::new()
        }
    }

    /// Make every following `contributions_insert` fail.
    pub fn fail_contribution_inserts(&self, fail: bool) {
        self.fail_contribution_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of `SqlStorage` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Insert a collection directly, bypassing the call counter.
    pub fn seed_collection(&self, name: &str, owner_id: i64) -> CollectionRow {
        let mut tables = self.tables.write().expect("lock poisoned");
        tables.next_collection_id += 1;
        let row = CollectionRow {
            id: tables.next_collection_id,
            name: name.to_owned(),
            description: None,
            created_by: owner_id,
            created_at: Utc::now(),
        };
        tables.collections.push(row.clone());
        row
    }

    pub fn collections_len(&self) -> usize {
        self.tables.read().expect("lock poisoned").collections.len()
    }

    pub fn contributions(&self) -> Vec<ContributionRow> {
        self.tables
            .read()
            .expect("lock poisoned")
            .contributions
            .clone()
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn newest_first(rows: &mut [CollectionRow]) {
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

fn name_matches(row: &CollectionRow, query: Option<&str>) -> bool {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => row.name.to_lowercase().contains(&q.to_lowercase()),
        None => true,
    }
}

impl SqlStorage for MockSqlStorage {
    async fn is_connected(&self) -> bool {
        self.touch();
        self.is_connected
    }

    async fn collections_create(
        &self,
        input: CollectionCreate,
    ) -> Result<CollectionRow, SqlStorageError> {
        self.touch();
        let mut tables = self.tables.write().expect("lock poisoned");
        tables.next_collection_id += 1;
        let row = CollectionRow {
            id: tables.next_collection_id,
            name: input.name,
            description: input.description,
            created_by: input.created_by,
            created_at: Utc::now(),
        };
        tables.collections.push(row.clone());
        Ok(row)
    }

    async fn collections_get(&self, id: i64) -> Result<Option<CollectionRow>, SqlStorageError> {
        self.touch();
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.collections.iter().find(|c| c.id == id).cloned())
    }

    async fn collections_search(
        &self,
        params: CollectionsSearchParams,
    ) -> Result<Vec<CollectionRow>, SqlStorageError> {
        self.touch();
        let tables = self.tables.read().expect("lock poisoned");
        let mut rows: Vec<CollectionRow> = tables
            .collections
            .iter()
            .filter(|c| name_matches(c, params.query.as_deref()))
            .cloned()
            .collect();
        newest_first(&mut rows);

        Ok(rows
            .into_iter()
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect())
    }

    async fn collections_count(&self, query: Option<String>) -> Result<i64, SqlStorageError> {
        self.touch();
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .collections
            .iter()
            .filter(|c| name_matches(c, query.as_deref()))
            .count() as i64)
    }

    async fn collections_list_owned(
        &self,
        owner_id: i64,
    ) -> Result<Vec<CollectionRow>, SqlStorageError> {
        self.touch();
        let tables = self.tables.read().expect("lock poisoned");
        let mut rows: Vec<CollectionRow> = tables
            .collections
            .iter()
            .filter(|c| c.created_by == owner_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }

    async fn collections_delete(
        &self,
        id: i64,
        owner_id: i64,
    ) -> Result<Option<Vec<String>>, SqlStorageError> {
        self.touch();
        let mut tables = self.tables.write().expect("lock poisoned");
        let before = tables.collections.len();
        tables
            .collections
            .retain(|c| !(c.id == id && c.created_by == owner_id));
        if tables.collections.len() == before {
            return Ok(None);
        }

        let (removed, kept): (Vec<ContributionRow>, Vec<ContributionRow>) =
            std::mem::take(&mut tables.contributions)
                .into_iter()
                .partition(|c| c.collection_id == id);
        tables.contributions = kept;
        Ok(Some(removed.into_iter().map(|c| c.file_url).collect()))
    }

    async fn contributions_insert(
        &self,
        input: ContributionInsert,
    ) -> Result<ContributionRow, SqlStorageError> {
        self.touch();
        if self.fail_contribution_inserts.load(Ordering::SeqCst) {
            return Err(SqlStorageError::Db(
                "MockSqlStorage.contributions_insert: injected failure".to_owned(),
            ));
        }

        let mut tables = self.tables.write().expect("lock poisoned");
        if !tables
            .collections
            .iter()
            .any(|c| c.id == input.collection_id)
        {
            return Err(SqlStorageError::Db(format!(
                "foreign key violation: collection {} does not exist",
                input.collection_id
            )));
        }

        tables.next_contribution_id += 1;
        let row = ContributionRow {
            id: tables.next_contribution_id,
            collection_id: input.collection_id,
            user_id: input.user_id,
            file_url: input.file_url,
            created_at: Utc::now(),
        };
        tables.contributions.push(row.clone());
        Ok(row)
    }

    async fn contributions_list_by_collection(
        &self,
        collection_id: i64,
    ) -> Result<Vec<ContributionRow>, SqlStorageError> {
        self.touch();
        let tables = self.tables.read().expect("lock poisoned");
        let mut rows: Vec<ContributionRow> = tables
            .contributions
            .iter()
            .filter(|c| c.collection_id == collection_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    async fn contributions_count(&self, collection_id: i64) -> Result<i64, SqlStorageError> {
        self.touch();
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables
            .contributions
            .iter()
            .filter(|c| c.collection_id == collection_id)
            .count() as i64)
    }
}
