//! Write transactions for the project table.

use std::time::Instant;

use marquee_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// One write on `table`, with its media row locks held until it ends.
///
/// Dropping it without `commit` rolls back, since sqlx queues the rollback
/// when the inner transaction drops. `abort` does the same eagerly.
pub struct WriteTransaction<'a> {
    table: &'static str,
    started: Instant,
    inner: Transaction<'a, Postgres>,
}

impl<'a> WriteTransaction<'a> {
    pub async fn begin(pool: &'a PgPool, table: &'static str) -> Result<Self, AppError> {
        let inner = pool.begin().await?;
        Ok(Self {
            table,
            started: Instant::now(),
            inner,
        })
    }

    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.inner
    }

    pub async fn commit(self) -> Result<(), AppError> {
        self.inner.commit().await?;
        tracing::debug!(
            db.table = self.table,
            duration_ms = self.started.elapsed().as_secs_f64() * 1000.0,
            "Write committed"
        );
        Ok(())
    }

    /// Roll back now. A failed rollback is only logged: the connection is
    /// discarded and Postgres ends the transaction anyway.
    pub async fn abort(self, reason: &str) {
        if let Err(e) = self.inner.rollback().await {
            tracing::warn!(db.table = self.table, error = %e, reason, "Rollback failed");
        } else {
            tracing::debug!(db.table = self.table, reason, "Write rolled back");
        }
    }
}
