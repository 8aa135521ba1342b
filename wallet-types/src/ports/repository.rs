//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory test doubles) implement this trait.

use chrono::{DateTime, Utc};

use crate::domain::{
    Currency, StatusTransition, Transaction, TransactionId, UserId, Wallet, WalletId,
};
use crate::error::RepoError;

/// Storage contract for wallets and the transaction log.
///
/// Balances are only ever changed by relative, conditional updates inside
/// the same database transaction as the row they belong to. Implementations
/// never write an absolute balance computed by the caller.
#[async_trait::async_trait]
pub trait LedgerRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Wallet Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates the wallet of a user with zero balance.
    ///
    /// Fails with `RepoError::Conflict` if the user already owns one.
    async fn create_wallet(&self, user_id: UserId, currency: Currency)
    -> Result<Wallet, RepoError>;

    /// Gets the wallet owned by a user.
    async fn get_wallet(&self, user_id: UserId) -> Result<Option<Wallet>, RepoError>;

    /// Gets a wallet by its ID.
    async fn get_wallet_by_id(&self, id: WalletId) -> Result<Option<Wallet>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Transaction Operations (MUST be atomic)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a new transaction row.
    ///
    /// Fails with `RepoError::DuplicateTransaction` when the id is taken.
    async fn create_transaction(&self, tx: &Transaction) -> Result<(), RepoError>;

    /// Inserts a withdrawal and reserves its amount in one unit.
    ///
    /// The debit is `balance = balance - amount WHERE balance >= amount`; if
    /// it matches no row the insert is rolled back and
    /// `DomainError::InsufficientFunds` is returned. Returns the wallet after
    /// the reservation.
    async fn create_withdrawal(&self, tx: &Transaction) -> Result<Wallet, RepoError>;

    /// Gets a transaction by ID.
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError>;

    /// Applies a status transition only if the stored status still equals
    /// `transition.from`, crediting the wallet in the same unit.
    ///
    /// Returns the number of transaction rows updated: `0` means another
    /// writer got there first and nothing was changed.
    async fn update_status_conditional(
        &self,
        transition: &StatusTransition,
    ) -> Result<u64, RepoError>;

    /// Writes both legs of a transfer and both balance changes atomically.
    ///
    /// The sender debit is conditional on sufficient funds; a duplicate
    /// `transfer_out` id fails with `RepoError::DuplicateTransaction`.
    async fn create_transfer_pair(
        &self,
        transfer_out: &Transaction,
        transfer_in: &Transaction,
    ) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────────

    /// Lists a wallet's transactions created at or after `since`, newest first.
    async fn list_transactions_for_wallet(
        &self,
        wallet_id: WalletId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, RepoError>;
}
