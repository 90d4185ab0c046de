//! Write transactions that take the SQLite write lock up front
//!
//! `BEGIN IMMEDIATE` acquires the RESERVED lock before the first read, so a
//! ledger write reads the chain it is about to extend under the same lock it
//! commits with. A second writer waits (busy_timeout) instead of reading a
//! stale latest revision. This is the SQLite counterpart of locking the
//! asset row for update.

use crate::{Error, Result};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

/// An open `BEGIN IMMEDIATE` transaction on a pooled connection
///
/// Must be finished with [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). If dropped while still open (for example
/// when the request future is cancelled) the connection is detached from the
/// pool and closed, which makes SQLite roll the transaction back.
pub struct ImmediateTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl ImmediateTransaction {
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    pub fn conn(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| Error::Internal("transaction already finished".to_string()))
    }

    pub async fn commit(mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    /// Commit on `Ok`, roll back on `Err`, and pass the outcome through
    ///
    /// A rollback failure is logged; the original error is what the caller sees.
    pub async fn finish_with<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed after ledger error");
                }
                Err(err)
            }
        }
    }

    async fn finish(&mut self, statement: &'static str) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        if let Err(e) = sqlx::query(statement).execute(&mut *conn).await {
            // A failed COMMIT (e.g. SQLITE_BUSY) leaves the transaction open;
            // never hand such a connection back to the pool.
            drop(conn.detach());
            return Err(e.into());
        }

        Ok(())
    }
}

impl Drop for ImmediateTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Write transaction dropped while open; closing connection");
            drop(conn.detach());
        }
    }
}
