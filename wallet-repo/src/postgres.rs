//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use wallet_types::{
    Currency, DomainError, LedgerRepository, RepoError, StatusTransition, Transaction,
    TransactionId, UserId, Wallet, WalletId,
};

use crate::types::{DbBalance, DbTransaction, DbWallet, is_unique_violation};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with row-level locking.
#[derive(Clone)]
pub struct PostgresRepo {
    pool: PgPool,
}

fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    tracing::debug!(migration = name, "migration applied");
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_wallets_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_transactions_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        tracing::info!("PostgreSQL store ready");
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Creates the database schema (for testing with existing pool).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_transaction(conn: &mut PgConnection, tx: &Transaction) -> Result<(), RepoError> {
    sqlx::query(
        r#"INSERT INTO transactions (id, wallet_id, transaction_type, status, amount, currency,
                                     payment_method, related_transaction_id, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
    )
    .bind(tx.id.into_uuid())
    .bind(tx.wallet_id.into_uuid())
    .bind(tx.transaction_type.as_ref())
    .bind(tx.status.as_ref())
    .bind(tx.amount.amount())
    .bind(tx.amount.currency().to_string())
    .bind(tx.payment_method.as_ref().map(|m| m.as_str()))
    .bind(tx.related_transaction_id.map(|id| id.into_uuid()))
    .bind(tx.created_at)
    .bind(tx.updated_at)
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

/// Conditional debit. The row lock taken by the UPDATE serializes concurrent
/// debits, and each one re-checks `balance >= amount` after the wait.
async fn debit_if_covered(
    conn: &mut PgConnection,
    wallet_id: WalletId,
    amount: i64,
) -> Result<(), RepoError> {
    let result = sqlx::query(
        r#"UPDATE wallets SET balance = balance - $1, updated_at = $2
           WHERE id = $3 AND balance >= $1"#,
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(wallet_id.into_uuid())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        let row: Option<DbBalance> = sqlx::query_as(r#"SELECT balance FROM wallets WHERE id = $1"#)
            .bind(wallet_id.into_uuid())
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

async fn credit(conn: &mut PgConnection, wallet_id: WalletId, amount: i64) -> Result<(), RepoError> {
    let result =
        sqlx::query(r#"UPDATE wallets SET balance = balance + $1, updated_at = $2 WHERE id = $3"#)
            .bind(amount)
            .bind(Utc::now())
            .bind(wallet_id.into_uuid())
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
impl LedgerRepository for PostgresRepo {
    async fn create_wallet(&self, user_id: UserId, currency: Currency) -> Result<Wallet, RepoError> {
        let wallet = Wallet::open(user_id, currency);

        sqlx::query(
            r#"INSERT INTO wallets (id, user_id, currency, balance, status, created_at, updated_at)
               VALUES ($1, $2, $3, 0, $4, $5, $6)"#,
        )
        .bind(wallet.id.into_uuid())
        .bind(user_id.value())
        .bind(currency.to_string())
        .bind(wallet.status.as_ref())
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
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
               FROM wallets WHERE user_id = $1"#,
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
               FROM wallets WHERE id = $1"#,
        )
        .bind(id.into_uuid())
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
        debit_if_covered(&mut db_tx, tx.wallet_id, tx.amount.amount()).await?;

        let row: DbWallet = sqlx::query_as(
            r#"SELECT id, user_id, currency, balance, status, created_at, updated_at
               FROM wallets WHERE id = $1"#,
        )
        .bind(tx.wallet_id.into_uuid())
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
               FROM transactions WHERE id = $1"#,
        )
        .bind(id.into_uuid())
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

        // A concurrent settler blocks on the row lock, then re-evaluates the
        // status predicate and matches nothing.
        let result = sqlx::query(
            r#"UPDATE transactions SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4"#,
        )
        .bind(transition.to.as_ref())
        .bind(Utc::now())
        .bind(transition.transaction_id.into_uuid())
        .bind(transition.from.as_ref())
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
        let sender = transfer_out.wallet_id;
        let recipient = transfer_in.wallet_id;

        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        // Lock wallets in consistent order to prevent deadlocks
        let (first, second) = if sender.as_uuid() < recipient.as_uuid() {
            (sender, recipient)
        } else {
            (recipient, sender)
        };

        for id in [first, second] {
            let locked: Option<DbBalance> =
                sqlx::query_as(r#"SELECT balance FROM wallets WHERE id = $1 FOR UPDATE"#)
                    .bind(id.into_uuid())
                    .fetch_optional(&mut *db_tx)
                    .await
                    .map_err(db_err)?;

            if locked.is_none() {
                return Err(RepoError::NotFound);
            }
        }

        insert_transaction(&mut db_tx, transfer_out).await?;
        insert_transaction(&mut db_tx, transfer_in).await?;
        debit_if_covered(&mut db_tx, sender, amount).await?;
        credit(&mut db_tx, recipient, amount).await?;

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
               WHERE wallet_id = $1 AND created_at >= $2
               ORDER BY created_at DESC"#,
        )
        .bind(wallet_id.into_uuid())
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbTransaction::into_domain).collect()
    }
}
