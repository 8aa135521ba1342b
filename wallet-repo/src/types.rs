//! Shared database types with feature-gated fields for SQLite and PostgreSQL.

use sqlx::FromRow;

use wallet_types::{
    Currency, DomainError, Money, PaymentMethod, RepoError, Transaction, TransactionId,
    TransactionStatus, TransactionType, UserId, Wallet, WalletId, WalletStatus,
};

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
#[cfg(not(feature = "sqlite"))]
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Wallet row from database.
#[derive(FromRow)]
pub struct DbWallet {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub user_id: i64,
    pub currency: String,
    pub balance: i64,
    pub status: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub updated_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub updated_at: String,
}

/// Transaction row from database.
#[derive(FromRow)]
pub struct DbTransaction {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    #[cfg(not(feature = "sqlite"))]
    pub wallet_id: Uuid,
    #[cfg(feature = "sqlite")]
    pub wallet_id: String,

    pub transaction_type: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub payment_method: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub related_transaction_id: Option<Uuid>,
    #[cfg(feature = "sqlite")]
    pub related_transaction_id: Option<String>,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub updated_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub updated_at: String,
}

/// Balance-only row for queries.
#[derive(FromRow)]
pub struct DbBalance {
    pub balance: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

/// A stored value the domain cannot read back is a ledger defect, not a
/// transient database failure.
fn defect(column: &str, err: impl std::fmt::Display) -> RepoError {
    RepoError::Domain(DomainError::IntegrityDefect(format!(
        "unreadable {} column: {}",
        column, err
    )))
}

pub fn parse_currency(s: &str) -> Result<Currency, RepoError> {
    s.parse().map_err(|e| defect("currency", e))
}

pub fn parse_transaction_type(s: &str) -> Result<TransactionType, RepoError> {
    s.parse().map_err(|e| defect("transaction_type", e))
}

pub fn parse_transaction_status(s: &str) -> Result<TransactionStatus, RepoError> {
    s.parse().map_err(|e| defect("status", e))
}

pub fn parse_wallet_status(s: &str) -> Result<WalletStatus, RepoError> {
    s.parse().map_err(|e| defect("wallet status", e))
}

#[cfg(feature = "sqlite")]
fn parse_uuid(s: &str) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(s).map_err(|e| RepoError::Database(e.to_string()))
}

#[cfg(feature = "sqlite")]
fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    Ok(chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| RepoError::Database(e.to_string()))?
        .with_timezone(&chrono::Utc))
}

/// Whether an insert failed on a primary key or unique constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain conversion (feature-gated implementations)
// ─────────────────────────────────────────────────────────────────────────────

impl DbWallet {
    /// Convert database row to domain Wallet.
    pub fn into_domain(self) -> Result<Wallet, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let balance = Money::new(self.balance, currency).map_err(RepoError::Domain)?;
        let status = parse_wallet_status(&self.status)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, created_at, updated_at) = (
            WalletId::from_uuid(self.id),
            self.created_at,
            self.updated_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, created_at, updated_at) = (
            WalletId::from_uuid(parse_uuid(&self.id)?),
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.updated_at)?,
        );

        Ok(Wallet::from_parts(
            id,
            UserId::new(self.user_id),
            balance,
            status,
            created_at,
            updated_at,
        ))
    }
}

impl DbTransaction {
    /// Convert database row to domain Transaction.
    pub fn into_domain(self) -> Result<Transaction, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let transaction_type = parse_transaction_type(&self.transaction_type)?;
        let status = parse_transaction_status(&self.status)?;
        let amount = Money::new(self.amount, currency).map_err(RepoError::Domain)?;
        let payment_method = self.payment_method.map(PaymentMethod::new);

        #[cfg(not(feature = "sqlite"))]
        let (id, wallet_id, related, created_at, updated_at) = (
            TransactionId::from_uuid(self.id),
            WalletId::from_uuid(self.wallet_id),
            self.related_transaction_id.map(TransactionId::from_uuid),
            self.created_at,
            self.updated_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, wallet_id, related, created_at, updated_at) = {
            let related = self
                .related_transaction_id
                .as_deref()
                .map(parse_uuid)
                .transpose()?
                .map(TransactionId::from_uuid);

            (
                TransactionId::from_uuid(parse_uuid(&self.id)?),
                WalletId::from_uuid(parse_uuid(&self.wallet_id)?),
                related,
                parse_timestamp(&self.created_at)?,
                parse_timestamp(&self.updated_at)?,
            )
        };

        Ok(Transaction::from_parts(
            id,
            wallet_id,
            transaction_type,
            status,
            amount,
            payment_method,
            related,
            created_at,
            updated_at,
        ))
    }
}
