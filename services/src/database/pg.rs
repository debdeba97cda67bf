use sqlx::postgres::PgPool;

use super::{
    CollectionCreate, CollectionRow, CollectionsSearchParams, ContributionInsert, ContributionRow,
    SqlStorage, SqlStorageError,
};

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `ILIKE` pattern matching `query` anywhere in the value, with the
/// wildcard characters of the query itself escaped.
fn contains_pattern(query: Option<&str>) -> Option<String> {
    let query = query.map(str::trim).filter(|q| !q.is_empty())?;
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    Some(pattern)
}

impl SqlStorage for PgStorage {
    async fn is_connected(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    async fn collections_create(
        &self,
        input: CollectionCreate,
    ) -> Result<CollectionRow, SqlStorageError> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r#"
            INSERT INTO collections (name, description, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, created_by, created_at
            "#,
        )
        .bind(input.name)
        .bind(input.description)
        .bind(input.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn collections_get(&self, id: i64) -> Result<Option<CollectionRow>, SqlStorageError> {
        let row = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT id, name, description, created_by, created_at
            FROM collections
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn collections_search(
        &self,
        params: CollectionsSearchParams,
    ) -> Result<Vec<CollectionRow>, SqlStorageError> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT id, name, description, created_by, created_at
            FROM collections
            WHERE $1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\'
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(contains_pattern(params.query.as_deref()))
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn collections_count(&self, query: Option<String>) -> Result<i64, SqlStorageError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM collections
            WHERE $1::TEXT IS NULL OR name ILIKE $1 ESCAPE '\'
            "#,
        )
        .bind(contains_pattern(query.as_deref()))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn collections_list_owned(
        &self,
        owner_id: i64,
    ) -> Result<Vec<CollectionRow>, SqlStorageError> {
        let rows = sqlx::query_as::<_, CollectionRow>(
            r#"
            SELECT id, name, description, created_by, created_at
            FROM collections
            WHERE created_by = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn collections_delete(
        &self,
        id: i64,
        owner_id: i64,
    ) -> Result<Option<Vec<String>>, SqlStorageError> {
        let mut tx = self.pool.begin().await?;

        // Row lock blocks concurrent contribution inserts on their FK check.
        let owned = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM collections WHERE id = $1 AND created_by = $2 FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;

        if owned.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let references = sqlx::query_scalar::<_, String>(
            r#"
            DELETE FROM contributions WHERE collection_id = $1 RETURNING file_url
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM collections WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(references))
    }

    async fn contributions_insert(
        &self,
        input: ContributionInsert,
    ) -> Result<ContributionRow, SqlStorageError> {
        let row = sqlx::query_as::<_, ContributionRow>(
            r#"
            INSERT INTO contributions (collection_id, user_id, file_url)
            VALUES ($1, $2, $3)
            RETURNING id, collection_id, user_id, file_url, created_at
            "#,
        )
        .bind(input.collection_id)
        .bind(input.user_id)
        .bind(input.file_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn contributions_list_by_collection(
        &self,
        collection_id: i64,
    ) -> Result<Vec<ContributionRow>, SqlStorageError> {
        let rows = sqlx::query_as::<_, ContributionRow>(
            r#"
            SELECT id, collection_id, user_id, file_url, created_at
            FROM contributions
            WHERE collection_id = $1
            ORDER BY id
            "#,
        )
        .bind(collection_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn contributions_count(&self, collection_id: i64) -> Result<i64, SqlStorageError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM contributions WHERE collection_id = $1")
                .bind(collection_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_and_escapes() {
        assert_eq!(contains_pattern(Some("cats")).as_deref(), Some("%cats%"));
        assert_eq!(
            contains_pattern(Some("100%_a\\b")).as_deref(),
            Some("%100\\%\\_a\\\\b%")
        );
    }

    #[test]
    fn blank_query_matches_everything() {
        assert_eq!(contains_pattern(None), None);
        assert_eq!(contains_pattern(Some("   ")), None);
    }
}
