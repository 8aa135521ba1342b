//! SQLite repository adapter.
//!
//! SQLite has no row locks, so every write transaction opens with its first
//! write statement. That takes the database write lock up front and keeps two
//! deferred readers from deadlocking on the upgrade.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;

use wallet_types::{
    Currency, DomainError, LedgerRepository, RepoError, StatusTransition, Transaction,
    TransactionId, UserId, Wallet, WalletId,
};

use crate::types::{DbBalance, DbTransaction, DbWallet, is_unique_violation};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePool::connect_with(options).await?;

        let repo = Self { pool };
        repo.create_schema().await?;
        tracing::info!("SQLite store ready");
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Creates the database schema (idempotent).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        sqlx::query(include_str!("../migrations/0001_create_wallets.sql"))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(include_str!("../migrations/0002_create_transactions.sql"))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement helpers shared by the atomic operations
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_transaction(conn: &mut SqliteConnection, tx: &Transaction) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO transactions (id, wallet_id, transaction_type, status, amount, currency,
                                     payment_method, related_transaction_id, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(tx.id.to_string())
    .bind(tx.wallet_id.to_string())
    .bind(tx.transaction_type.to_string())
    .bind(tx.status.to_string())
    .bind(tx.amount.amount())
    .bind(tx.amount.currency().to_string())
    .bind(tx.payment_method.as_ref().map(|m| m.as_str().to_string()))
    .bind(tx.related_transaction_id.map(|id| id.to_string()))
    .bind(timestamp(tx.created_at))
    .bind(timestamp(tx.updated_at))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RepoError::DuplicateTransaction(tx.id)
        } else {
            db_err(e)
        }
    })?;

    Ok(())
}

/// Debits `amount` only if the balance covers it.
async fn debit_if_covered(
    conn: &mut SqliteConnection,
    wallet_id: WalletId,
    amount: i64,
) -> Result<(), RepoError> {
    let id_str = wallet_id.to_string();

    let result = sqlx::query(
        r#"UPDATE wallets SET balance = balance - ?, updated_at = ? WHERE id = ? AND balance >= ?"#,
    )
    .bind(amount)
    .bind(timestamp(Utc::now()))
    .bind(&id_str)
    .bind(amount)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        let row: Option<DbBalance> = sqlx::query_as(r#"SELECT balance FROM wallets WHERE id = ?"#)
            .bind(&id_str)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;

        return match row {
            None => Err(RepoError::NotFound),
            Some(row) => Err(RepoError::Domain(DomainError::InsufficientFunds {
                available: row.balance,
                requested: amount,
            })),
        };
    }

    Ok(())
}

async fn credit(conn: &mut SqliteConnection, wallet_id: WalletId, amount: i64) -> Result<(), RepoError> {
    let result =
        sqlx::query(r#"UPDATE wallets SET balance = balance + ?, updated_at = ? WHERE id = ?"#)
            .bind(amount)
            .bind(timestamp(Utc::now()))
            .bind(wallet_id.to_string())
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for SqliteRepo {
    async fn create_wallet(&self, user_id: UserId, currency: Currency) -> Result<Wallet, RepoError> {
        let wallet = Wallet::open(user_id, currency);

        sqlx::query(
            r#"INSERT INTO wallets (id, user_id, currency, balance, status, created_at, updated_at)
               VALUES (?, ?, ?, 0, ?, ?, ?)"#,
        )
        .bind(wallet.id.to_string())
        .bind(user_id.value())
        .bind(currency.to_string())
        .bind(wallet.status.to_string())
        .bind(timestamp(wallet.created_at))
        .bind(timestamp(wallet.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::Conflict(format!("User {} already has a wallet", user_id))
            } else {
                db_err(e)
            }
        })?;

        Ok(wallet)
    }

    async fn get_wallet(&self, user_id: UserId) -> Result<Option<Wallet>, RepoError> {
        let row: Option<DbWallet> = sqlx::query_as(
            r#"SELECT id, user_id, currency, balance, status, created_at, updated_at
               FROM wallets WHERE user_id = ?"#,
        )
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(DbWallet::into_domain).transpose()
    }

    async fn get_wallet_by_id(&self, id: WalletId) -> Result<Option<Wallet>, RepoError> {
        let row: Option<DbWallet> = sqlx::query_as(
            r#"SELECT id, user_id, currency, balance, status, created_at, updated_at
               FROM wallets WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(DbWallet::into_domain).transpose()
    }

    async fn create_transaction(&self, tx: &Transaction) -> Result<(), RepoError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        insert_transaction(&mut conn, tx).await
    }

    async fn create_withdrawal(&self, tx: &Transaction) -> Result<Wallet, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        insert_transaction(&mut db_tx, tx).await?;
        // Dropping `db_tx` on the error path rolls the insert back.
        debit_if_covered(&mut db_tx, tx.wallet_id, tx.amount.amount()).await?;

        let row: DbWallet = sqlx::query_as(
            r#"SELECT id, user_id, currency, balance, status, created_at, updated_at
               FROM wallets WHERE id = ?"#,
        )
        .bind(tx.wallet_id.to_string())
        .fetch_one(&mut *db_tx)
        .await
        .map_err(db_err)?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        row.into_domain()
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        let row: Option<DbTransaction> = sqlx::query_as(
            r#"SELECT id, wallet_id, transaction_type, status, amount, currency,
                      payment_method, related_transaction_id, created_at, updated_at
               FROM transactions WHERE id = ?"#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn update_status_conditional(
        &self,
        transition: &StatusTransition,
    ) -> Result<u64, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE transactions SET status = ?, updated_at = ? WHERE id = ? AND status = ?"#,
        )
        .bind(transition.to.to_string())
        .bind(timestamp(Utc::now()))
        .bind(transition.transaction_id.to_string())
        .bind(transition.from.to_string())
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Ok(0);
        }

        if let Some(amount) = transition.credit {
            credit(&mut db_tx, transition.wallet_id, amount.amount()).await?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn create_transfer_pair(
        &self,
        transfer_out: &Transaction,
        transfer_in: &Transaction,
    ) -> Result<(), RepoError> {
        let amount = transfer_out.amount.amount();

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        insert_transaction(&mut db_tx, transfer_out).await?;
        insert_transaction(&mut db_tx, transfer_in).await?;
        debit_if_covered(&mut db_tx, transfer_out.wallet_id, amount).await?;
        credit(&mut db_tx, transfer_in.wallet_id, amount).await?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(())
    }

    async fn list_transactions_for_wallet(
        &self,
        wallet_id: WalletId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, RepoError> {
        let rows: Vec<DbTransaction> = sqlx::query_as(
            r#"SELECT id, wallet_id, transaction_type, status, amount, currency,
                      payment_method, related_transaction_id, created_at, updated_at
               FROM transactions
               WHERE wallet_id = ? AND created_at >= ?
               ORDER BY created_at DESC"#,
        )
        .bind(wallet_id.to_string())
        .bind(timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbTransaction::into_domain).collect()
    }
}
