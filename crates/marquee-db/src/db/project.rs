use marquee_core::models::{
    ColumnSet, ColumnValue, MediaGuard, MediaKind, MediaReference, PageRequest, Project,
    ProjectFilter,
};
use marquee_core::AppError;
use sqlx::postgres::PgDatabaseError;
use sqlx::query_builder::Separated;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use super::search::{like_pattern, normalized_term};
use super::transaction::WriteTransaction;

const PROJECT_COLUMNS: &str = "id, title, client, category, description, year, status, \
                               sort_order, thumbnail_media_id, video_media_id, created_at, updated_at";

/// SQLSTATE for not_null_violation.
const NOT_NULL_VIOLATION: &str = "23502";

/// Insert failures the service layer reacts to.
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    /// The table's `id` column has no default, so an insert without an explicit id failed.
    #[error("{table}.id has no identity default")]
    MissingIdentity { table: &'static str },

    #[error(transparent)]
    Other(#[from] AppError),
}

impl From<InsertError> for AppError {
    fn from(err: InsertError) -> Self {
        match err {
            InsertError::MissingIdentity { table } => {
                AppError::Internal(format!("{}.id has no identity default", table))
            }
            InsertError::Other(e) => e,
        }
    }
}

/// True when `err` is Postgres rejecting a NULL `id`, i.e. the identity default is gone.
pub fn is_missing_identity_default(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    if db.code().as_deref() != Some(NOT_NULL_VIOLATION) {
        return false;
    }
    match db.try_downcast_ref::<PgDatabaseError>() {
        Some(pg) => pg.column() == Some("id"),
        None => db.message().contains("\"id\""),
    }
}

/// Project persistence
#[async_trait::async_trait]
pub trait ProjectRepositoryTrait: Send + Sync {
    /// Insert only the given columns. `explicit_id` bypasses the identity default.
    async fn insert(
        &self,
        columns: &ColumnSet,
        explicit_id: Option<i64>,
        guards: &[MediaGuard],
    ) -> Result<Project, InsertError>;

    /// `max(id) + 1`, or 1 for an empty table.
    async fn next_id(&self) -> Result<i64, AppError>;

    async fn get(&self, id: i64) -> Result<Option<Project>, AppError>;

    /// Returns `None` when no row had this id.
    async fn update(
        &self,
        id: i64,
        columns: &ColumnSet,
        guards: &[MediaGuard],
    ) -> Result<Option<Project>, AppError>;

    async fn delete(&self, id: i64) -> Result<bool, AppError>;

    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<(Vec<Project>, i64), AppError>;

    /// Every non-null media reference, optionally only those pointing at `media_id`.
    async fn media_references(
        &self,
        media_id: Option<i64>,
    ) -> Result<Vec<MediaReference>, AppError>;
}

#[derive(Clone)]
pub struct PostgresProjectRepository {
    pool: PgPool,
}

impl PostgresProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_value(sep: &mut Separated<'_, '_, Postgres, &'static str>, value: &ColumnValue) {
    match value {
        ColumnValue::Text(v) => sep.push_bind(v.clone()),
        ColumnValue::Int(v) => sep.push_bind(*v),
        ColumnValue::BigInt(v) => sep.push_bind(*v),
        ColumnValue::Status(v) => sep.push_bind(*v),
        ColumnValue::Timestamp(v) => sep.push_bind(*v),
    };
}

/// Same as `push_value` but directly after the `column = ` fragment.
fn push_assigned_value(sep: &mut Separated<'_, '_, Postgres, &'static str>, value: &ColumnValue) {
    match value {
        ColumnValue::Text(v) => sep.push_bind_unseparated(v.clone()),
        ColumnValue::Int(v) => sep.push_bind_unseparated(*v),
        ColumnValue::BigInt(v) => sep.push_bind_unseparated(*v),
        ColumnValue::Status(v) => sep.push_bind_unseparated(*v),
        ColumnValue::Timestamp(v) => sep.push_bind_unseparated(*v),
    };
}

fn push_project_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProjectFilter) {
    qb.push(" WHERE 1=1");

    if let Some(term) = normalized_term(filter.search.as_deref()) {
        let like = like_pattern(term);
        qb.push(" AND (");
        for (i, column) in ["title", "client", "category", "description"]
            .iter()
            .enumerate()
        {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push(*column);
            qb.push(" ILIKE ");
            qb.push_bind(like.clone());
            qb.push(" ESCAPE '\\'");
        }
        qb.push(")");
    }

    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }

    if let Some(category) = filter.category.as_ref() {
        qb.push(" AND category = ");
        qb.push_bind(category.clone());
    }

    if let Some(year) = filter.year {
        qb.push(" AND year = ");
        qb.push_bind(year);
    }
}

/// Re-validate media references with the rows share-locked until commit, so a
/// concurrent delete cannot slip between the check and the write.
async fn lock_media_guards(
    conn: &mut PgConnection,
    guards: &[MediaGuard],
) -> Result<(), AppError> {
    for guard in guards {
        let kind = sqlx::query_scalar::<Postgres, MediaKind>(
            "SELECT kind FROM media_assets WHERE id = $1 FOR SHARE",
        )
        .bind(guard.media_id)
        .fetch_optional(&mut *conn)
        .await?;

        match kind {
            None => return Err(guard.missing_error()),
            Some(actual) if actual != guard.field.expected_kind() => {
                return Err(guard.kind_error(actual))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl ProjectRepositoryTrait for PostgresProjectRepository {
    #[tracing::instrument(skip(self, columns, guards), fields(db.table = "projects", db.operation = "insert", explicit_id = ?explicit_id))]
    async fn insert(
        &self,
        columns: &ColumnSet,
        explicit_id: Option<i64>,
        guards: &[MediaGuard],
    ) -> Result<Project, InsertError> {
        let mut tx = WriteTransaction::begin(&self.pool, "projects").await?;

        lock_media_guards(tx.conn(), guards).await?;

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO projects ");
        if columns.is_empty() && explicit_id.is_none() {
            qb.push("DEFAULT VALUES");
        } else {
            qb.push("(");
            {
                let mut names = qb.separated(", ");
                if explicit_id.is_some() {
                    names.push("id");
                }
                for (column, _) in columns.iter() {
                    names.push(column.as_str());
                }
            }
            qb.push(") VALUES (");
            {
                let mut values = qb.separated(", ");
                if let Some(id) = explicit_id {
                    values.push_bind(id);
                }
                for (_, value) in columns.iter() {
                    push_value(&mut values, value);
                }
            }
            qb.push(")");
        }
        qb.push(" RETURNING ");
        qb.push(PROJECT_COLUMNS);

        let result = qb
            .build_query_as::<Project>()
            .fetch_one(tx.conn())
            .await;

        match result {
            Ok(project) => {
                tx.commit().await?;
                Ok(project)
            }
            Err(e) if explicit_id.is_none() && is_missing_identity_default(&e) => {
                tx.abort("identity default missing").await;
                Err(InsertError::MissingIdentity { table: "projects" })
            }
            Err(e) => {
                tx.abort("insert failed").await;
                Err(InsertError::Other(e.into()))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select"))]
    async fn next_id(&self) -> Result<i64, AppError> {
        let next = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COALESCE(MAX(id), 0) + 1 FROM projects",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(next)
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: i64) -> Result<Option<Project>, AppError> {
        let project = sqlx::query_as::<Postgres, Project>(&format!(
            "SELECT {} FROM projects WHERE id = $1",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(project)
    }

    #[tracing::instrument(skip(self, columns, guards), fields(db.table = "projects", db.operation = "update", db.record_id = %id))]
    async fn update(
        &self,
        id: i64,
        columns: &ColumnSet,
        guards: &[MediaGuard],
    ) -> Result<Option<Project>, AppError> {
        if columns.is_empty() {
            return self.get(id).await;
        }

        let mut tx = WriteTransaction::begin(&self.pool, "projects").await?;

        lock_media_guards(tx.conn(), guards).await?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE projects SET ");
        {
            let mut assignments = qb.separated(", ");
            for (column, value) in columns.iter() {
                assignments.push(format!("{} = ", column.as_str()));
                push_assigned_value(&mut assignments, value);
            }
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        qb.push(" RETURNING ");
        qb.push(PROJECT_COLUMNS);

        let project = qb
            .build_query_as::<Project>()
            .fetch_optional(tx.conn())
            .await?;

        tx.commit().await?;
        Ok(project)
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select"))]
    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<(Vec<Project>, i64), AppError> {
        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects");
        push_project_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM projects",
            PROJECT_COLUMNS
        ));
        push_project_filter(&mut qb, filter);
        qb.push(" ORDER BY updated_at DESC, id DESC LIMIT ");
        qb.push_bind(page.limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let projects = qb
            .build_query_as::<Project>()
            .fetch_all(&self.pool)
            .await?;

        Ok((projects, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.operation = "select"))]
    async fn media_references(
        &self,
        media_id: Option<i64>,
    ) -> Result<Vec<MediaReference>, AppError> {
        let rows = sqlx::query_as::<Postgres, (i64, Option<i64>, Option<i64>)>(
            r#"
            SELECT id, thumbnail_media_id, video_media_id
            FROM projects
            WHERE (thumbnail_media_id IS NOT NULL OR video_media_id IS NOT NULL)
              AND ($1::BIGINT IS NULL OR thumbnail_media_id = $1 OR video_media_id = $1)
            ORDER BY id
            "#,
        )
        .bind(media_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .flat_map(|(project_id, thumbnail, video)| {
                MediaReference::from_columns(project_id, thumbnail, video)
            })
            .filter(|r| media_id.map_or(true, |m| r.media_id == m))
            .collect())
    }
}
