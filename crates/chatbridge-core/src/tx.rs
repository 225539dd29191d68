//! Transaction Manager (C2, §4.1, §9 "ambient transaction").
//!
//! `with_transaction` runs `fn` with an ambient transactional context: every
//! repository call made from inside `fn` (directly or through further nested
//! `with_transaction` calls) participates in the same underlying connection.
//! Nesting uses savepoints rather than a new transaction. Rollback happens on
//! any `Err` return; commit (or, for a nested call, `RELEASE SAVEPOINT`)
//! otherwise.
//!
//! Repositories consult [`current`] (via the `execute`/`fetch_optional`/
//! `fetch_all` helpers below) before falling back to the pool, which is what
//! makes a repository method transaction-agnostic: the same method runs
//! autocommit or inside a caller's transaction without any API change.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sqlx::sqlite::{SqliteArguments, SqliteQueryResult, SqliteRow};
use sqlx::{Sqlite, Transaction};
use tokio::sync::Mutex;

use crate::database::Database;
use crate::error::Result;

#[derive(Clone)]
pub(crate) struct TxState {
    pub(crate) tx: Arc<Mutex<Transaction<'static, Sqlite>>>,
    depth: Arc<AtomicU32>,
}

tokio::task_local! {
    static CURRENT_TX: TxState;
}

/// The ambient transaction for the current task, if any.
pub(crate) fn current() -> Option<TxState> {
    CURRENT_TX.try_with(Clone::clone).ok()
}

/// Run `f` with an ambient transaction. Nested calls (an ambient transaction
/// already present on this task) open a savepoint instead of a new
/// transaction; the outermost call commits/rolls back the real transaction.
pub async fn with_transaction<T, F, Fut>(db: &Database, f: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if let Some(state) = current() {
        let depth = state.depth.fetch_add(1, Ordering::SeqCst) + 1;
        let savepoint = format!("sp_{depth}");
        {
            let mut guard = state.tx.lock().await;
            sqlx::query(&format!("SAVEPOINT {savepoint}"))
                .execute(&mut *guard)
                .await?;
        }

        let result = f().await;

        let mut guard = state.tx.lock().await;
        match &result {
            Ok(_) => {
                sqlx::query(&format!("RELEASE SAVEPOINT {savepoint}"))
                    .execute(&mut *guard)
                    .await?;
            }
            Err(_) => {
                sqlx::query(&format!("ROLLBACK TO SAVEPOINT {savepoint}"))
                    .execute(&mut *guard)
                    .await?;
            }
        }
        result
    } else {
        let tx = db.pool().begin().await?;
        let state = TxState {
            tx: Arc::new(Mutex::new(tx)),
            depth: Arc::new(AtomicU32::new(0)),
        };
        let tx_handle = state.tx.clone();

        let result = CURRENT_TX.scope(state, f()).await;

        let tx = Arc::try_unwrap(tx_handle)
            .unwrap_or_else(|_| panic!("transaction still borrowed after scope exit"))
            .into_inner();
        match result {
            Ok(v) => {
                tx.commit().await?;
                Ok(v)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }
}

/// Run an `INSERT`/`UPDATE`/`DELETE` against the ambient transaction if one
/// is active for this task, otherwise against the pool (autocommit).
pub(crate) async fn execute<'q>(
    db: &Database,
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
) -> Result<SqliteQueryResult> {
    match current() {
        Some(state) => {
            let mut guard = state.tx.lock().await;
            Ok(query.execute(&mut *guard).await?)
        }
        None => Ok(query.execute(db.pool()).await?),
    }
}

pub(crate) async fn fetch_optional<'q, O>(
    db: &Database,
    query: sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
) -> Result<Option<O>>
where
    O: Send + Unpin + for<'r> sqlx::FromRow<'r, SqliteRow>,
{
    match current() {
        Some(state) => {
            let mut guard = state.tx.lock().await;
            Ok(query.fetch_optional(&mut *guard).await?)
        }
        None => Ok(query.fetch_optional(db.pool()).await?),
    }
}

pub(crate) async fn fetch_all<'q, O>(
    db: &Database,
    query: sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
) -> Result<Vec<O>>
where
    O: Send + Unpin + for<'r> sqlx::FromRow<'r, SqliteRow>,
{
    match current() {
        Some(state) => {
            let mut guard = state.tx.lock().await;
            Ok(query.fetch_all(&mut *guard).await?)
        }
        None => Ok(query.fetch_all(db.pool()).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    async fn insert_org(db: &Database, id: &str) -> Result<()> {
        execute(
            db,
            sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?1, ?1, '2024-01-01T00:00:00Z')")
                .bind(id),
        )
        .await
        .map(|_| ())
    }

    async fn org_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn commits_on_ok() {
        let db = Database::in_memory().await.unwrap();
        with_transaction(&db, || async { insert_org(&db, "org_x").await }).await.unwrap();
        assert_eq!(org_count(&db).await, 1);
    }

    #[tokio::test]
    async fn rolls_back_on_err() {
        let db = Database::in_memory().await.unwrap();
        let result: Result<()> = with_transaction(&db, || async {
            insert_org(&db, "org_y").await?;
            Err(Error::Validation("boom".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(org_count(&db).await, 0);
    }

    #[tokio::test]
    async fn nested_savepoint_rolls_back_independently() {
        let db = Database::in_memory().await.unwrap();
        with_transaction(&db, || async {
            insert_org(&db, "org_outer").await?;

            let inner: Result<()> = with_transaction(&db, || async {
                insert_org(&db, "org_inner").await?;
                Err(Error::Validation("inner boom".into()))
            })
            .await;
            assert!(inner.is_err());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(
            org_count(&db).await,
            1,
            "outer commit survives, inner savepoint rolled back"
        );
    }
}
