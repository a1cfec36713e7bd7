use std::collections::HashSet;

use marquee_core::models::{
    MediaAsset, MediaFilter, MediaKind, MediaRow, NewMediaAsset, PageRequest,
};
use marquee_core::AppError;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::search::{like_pattern, normalized_term};

const MEDIA_COLUMNS: &str = "id, display_name, kind, storage_type, locator, stored_name, \
                             content_type, file_size, created_at, updated_at";

/// Media registry persistence
#[async_trait::async_trait]
pub trait MediaRepositoryTrait: Send + Sync {
    async fn insert(&self, asset: NewMediaAsset) -> Result<MediaAsset, AppError>;

    async fn get(&self, id: i64) -> Result<Option<MediaAsset>, AppError>;

    /// One page ordered by `updated_at` desc then `id` desc, plus the total
    /// count under the same predicate.
    async fn list(
        &self,
        filter: &MediaFilter,
        page: PageRequest,
    ) -> Result<(Vec<MediaAsset>, i64), AppError>;

    /// Returns false when no row had this id.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    /// The subset of `ids` that currently exist.
    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, AppError>;

    /// The subset of `names` registered as managed files of `kind`.
    async fn known_stored_names(
        &self,
        kind: MediaKind,
        names: &[String],
    ) -> Result<HashSet<String>, AppError>;
}

#[derive(Clone)]
pub struct PostgresMediaRepository {
    pool: PgPool,
}

impl PostgresMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_media_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &MediaFilter) {
    qb.push(" WHERE 1=1");

    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ");
        qb.push_bind(kind);
    }

    if let Some(term) = normalized_term(filter.search.as_deref()) {
        qb.push(" AND display_name ILIKE ");
        qb.push_bind(like_pattern(term));
        qb.push(" ESCAPE '\\'");
    }
}

#[async_trait::async_trait]
impl MediaRepositoryTrait for PostgresMediaRepository {
    #[tracing::instrument(skip(self, asset), fields(db.table = "media_assets", db.operation = "insert", kind = %asset.kind))]
    async fn insert(&self, asset: NewMediaAsset) -> Result<MediaAsset, AppError> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            r#"
            INSERT INTO media_assets (
                display_name, kind, storage_type, locator, stored_name, content_type, file_size
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            MEDIA_COLUMNS
        ))
        .bind(&asset.display_name)
        .bind(asset.kind)
        .bind(asset.locator.storage_type())
        .bind(asset.locator.url())
        .bind(asset.locator.stored_name())
        .bind(&asset.content_type)
        .bind(asset.file_size)
        .fetch_one(&self.pool)
        .await?;

        row.into_asset()
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: i64) -> Result<Option<MediaAsset>, AppError> {
        let row = sqlx::query_as::<Postgres, MediaRow>(&format!(
            "SELECT {} FROM media_assets WHERE id = $1",
            MEDIA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MediaRow::into_asset).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "select"))]
    async fn list(
        &self,
        filter: &MediaFilter,
        page: PageRequest,
    ) -> Result<(Vec<MediaAsset>, i64), AppError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM media_assets");
        push_media_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM media_assets",
            MEDIA_COLUMNS
        ));
        push_media_filter(&mut qb, filter);
        qb.push(" ORDER BY updated_at DESC, id DESC LIMIT ");
        qb.push_bind(page.limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows = qb
            .build_query_as::<MediaRow>()
            .fetch_all(&self.pool)
            .await?;

        let assets = rows
            .into_iter()
            .map(MediaRow::into_asset)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((assets, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_assets", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM media_assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self, ids), fields(db.table = "media_assets", db.operation = "select", count = ids.len()))]
    async fn existing_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, AppError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let found = sqlx::query_scalar::<Postgres, i64>(
            "SELECT id FROM media_assets WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(found.into_iter().collect())
    }

    #[tracing::instrument(skip(self, names), fields(db.table = "media_assets", db.operation = "select", count = names.len()))]
    async fn known_stored_names(
        &self,
        kind: MediaKind,
        names: &[String],
    ) -> Result<HashSet<String>, AppError> {
        if names.is_empty() {
            return Ok(HashSet::new());
        }

        let found = sqlx::query_scalar::<Postgres, String>(
            "SELECT stored_name FROM media_assets WHERE kind = $1 AND stored_name = ANY($2)",
        )
        .bind(kind)
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        Ok(found.into_iter().collect())
    }
}
