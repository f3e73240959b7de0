//! Write transactions that take the SQLite write lock up front.
//!
//! A deferred transaction that reads before it writes has to upgrade its
//! lock later, and in WAL mode that upgrade fails with `SQLITE_BUSY` as soon
//! as another connection committed in between, without waiting on the busy
//! timeout. `BEGIN IMMEDIATE` queues on the busy timeout instead.

use std::ops::{Deref, DerefMut};

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

/// An open `BEGIN IMMEDIATE` transaction on a pooled connection.
///
/// Dropping it without [`WriteTransaction::commit`] rolls the work back.
pub struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    pub async fn commit(mut self) -> Result<(), sqlx::Error> {
        self.finish("COMMIT").await
    }

    pub async fn rollback(mut self) -> Result<(), sqlx::Error> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, statement: &'static str) -> Result<(), sqlx::Error> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };
        match sqlx::query(statement).execute(&mut *conn).await {
            Ok(_) => Ok(()),
            Err(err) => {
                // the transaction state is unknown, so the connection must not go back
                drop(conn.detach());
                Err(err)
            }
        }
    }

    fn connection(&self) -> &PoolConnection<Sqlite> {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("transaction used after commit or rollback"),
        }
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &SqliteConnection {
        self.connection()
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut SqliteConnection {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("transaction used after commit or rollback"),
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        warn!(error = %err, "rollback of abandoned transaction failed");
                        drop(conn.detach());
                    }
                });
            }
            // closing the connection rolls the transaction back
            Err(_) => drop(conn.detach()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialize_database;
    use tempfile::TempDir;
    use wellzo_config::DatabaseConfig;

    async fn file_pool(max_connections: u32) -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("tx.db").display()),
            max_connections,
        };
        (initialize_database(&config).await.unwrap(), temp_dir)
    }

    async fn count_users(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn insert_user(conn: &mut SqliteConnection, email: &str) {
        sqlx::query(
            "INSERT INTO users (public_id, email, name, created_at, updated_at) \
             VALUES (?, ?, 'Tx', '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z')",
        )
        .bind(email)
        .bind(email)
        .execute(conn)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn commit_persists_and_drop_rolls_back() {
        let (pool, _temp_dir) = file_pool(2).await;

        let mut tx = WriteTransaction::begin(&pool).await.unwrap();
        insert_user(&mut tx, "kept@wellzo.test").await;
        tx.commit().await.unwrap();

        {
            let mut tx = WriteTransaction::begin(&pool).await.unwrap();
            insert_user(&mut tx, "dropped@wellzo.test").await;
        }

        // the next immediate transaction waits until the abandoned one is rolled back
        let tx = WriteTransaction::begin(&pool).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(count_users(&pool).await, 1);
    }
}
