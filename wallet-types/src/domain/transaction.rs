//! Transaction domain model and its lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;
use super::wallet::WalletId;
use crate::error::DomainError;

/// Unique identifier for a Transaction.
///
/// Doubles as the idempotency key: deposits, withdrawals and the outgoing leg
/// of a transfer use the id supplied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Creates a new random TransactionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a TransactionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TransactionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The type/direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money coming into a wallet from a PSP
    Deposit,
    /// Money leaving a wallet through a PSP
    Withdrawal,
    /// Incoming leg of a wallet-to-wallet transfer
    TransferIn,
    /// Outgoing leg of a wallet-to-wallet transfer
    TransferOut,
}

impl AsRef<str> for TransactionType {
    fn as_ref(&self) -> &str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TransferIn => "TRANSFER_IN",
            TransactionType::TransferOut => "TRANSFER_OUT",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            "TRANSFER_IN" => Ok(TransactionType::TransferIn),
            "TRANSFER_OUT" => Ok(TransactionType::TransferOut),
            other => Err(DomainError::IntegrityDefect(format!(
                "unknown transaction type: {}",
                other
            ))),
        }
    }
}

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Canceled,
    /// Reserved for failures detected by the ledger itself.
    Failed,
}

impl TransactionStatus {
    /// Terminal statuses absorb every further transition attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl AsRef<str> for TransactionStatus {
    fn as_ref(&self) -> &str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Canceled => "CANCELED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "CANCELED" => Ok(TransactionStatus::Canceled),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(DomainError::IntegrityDefect(format!(
                "unknown transaction status: {}",
                other
            ))),
        }
    }
}

/// Tag selecting the PSP that carries a deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethod(String);

impl PaymentMethod {
    pub const FAKE_PAY: &'static str = "FakePay";
    pub const BANK_TRANSFER: &'static str = "BankTransfer";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A conditional status change computed by [`Transaction::transition`].
///
/// The store applies it as one unit: move `transaction_id` from `from` to
/// `to` only if the stored status still equals `from`, and when that succeeds
/// add `credit` (if any) to `wallet_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub transaction_id: TransactionId,
    pub wallet_id: WalletId,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
    pub credit: Option<Money>,
}

/// A recorded monetary movement against one wallet.
///
/// Everything but `status` and `updated_at` is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Money,
    pub payment_method: Option<PaymentMethod>,
    /// The other leg of a transfer; `None` for deposits and withdrawals.
    pub related_transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Creates a pending deposit awaiting PSP confirmation.
    pub fn deposit(
        id: TransactionId,
        wallet_id: WalletId,
        amount: Money,
        payment_method: PaymentMethod,
    ) -> Self {
        Self::pending(
            id,
            wallet_id,
            TransactionType::Deposit,
            amount,
            payment_method,
        )
    }

    /// Creates a pending withdrawal awaiting PSP settlement.
    pub fn withdrawal(
        id: TransactionId,
        wallet_id: WalletId,
        amount: Money,
        payment_method: PaymentMethod,
    ) -> Self {
        Self::pending(
            id,
            wallet_id,
            TransactionType::Withdrawal,
            amount,
            payment_method,
        )
    }

    /// Creates the two linked, already completed legs of a transfer.
    ///
    /// The outgoing leg keeps the client-supplied id; the incoming leg gets a
    /// fresh one. Returns `(transfer_out, transfer_in)`.
    pub fn transfer_pair(
        id: TransactionId,
        sender: WalletId,
        recipient: WalletId,
        amount: Money,
    ) -> (Self, Self) {
        let now = Utc::now();
        let in_id = TransactionId::new();

        let transfer_out = Self {
            id,
            wallet_id: sender,
            transaction_type: TransactionType::TransferOut,
            status: TransactionStatus::Completed,
            amount,
            payment_method: None,
            related_transaction_id: Some(in_id),
            created_at: now,
            updated_at: now,
        };

        let transfer_in = Self {
            id: in_id,
            wallet_id: recipient,
            transaction_type: TransactionType::TransferIn,
            status: TransactionStatus::Completed,
            amount,
            payment_method: None,
            related_transaction_id: Some(id),
            created_at: now,
            updated_at: now,
        };

        (transfer_out, transfer_in)
    }

    fn pending(
        id: TransactionId,
        wallet_id: WalletId,
        transaction_type: TransactionType,
        amount: Money,
        payment_method: PaymentMethod,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            wallet_id,
            transaction_type,
            status: TransactionStatus::Pending,
            amount,
            payment_method: Some(payment_method),
            related_transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a transaction from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TransactionId,
        wallet_id: WalletId,
        transaction_type: TransactionType,
        status: TransactionStatus,
        amount: Money,
        payment_method: Option<PaymentMethod>,
        related_transaction_id: Option<TransactionId>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            wallet_id,
            transaction_type,
            status,
            amount,
            payment_method,
            related_transaction_id,
            created_at,
            updated_at,
        }
    }

    /// Computes the status change and balance effect of moving to `target`.
    ///
    /// Returns `Ok(None)` when the transaction is already terminal: the
    /// request is absorbed as a no-op. Only `COMPLETED` and `CANCELED` are
    /// valid targets. A pending transfer leg has no defined settlement and is
    /// reported as an integrity defect.
    ///
    /// | Type       | COMPLETED       | CANCELED        |
    /// |------------|-----------------|-----------------|
    /// | DEPOSIT    | credit amount   | -               |
    /// | WITHDRAWAL | -               | credit (refund) |
    pub fn transition(
        &self,
        target: TransactionStatus,
    ) -> Result<Option<StatusTransition>, DomainError> {
        if self.status.is_terminal() {
            return Ok(None);
        }

        if !matches!(
            target,
            TransactionStatus::Completed | TransactionStatus::Canceled
        ) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        let credit = match (self.transaction_type, target) {
            (TransactionType::Deposit, TransactionStatus::Completed) => Some(self.amount),
            (TransactionType::Withdrawal, TransactionStatus::Canceled) => Some(self.amount),
            (TransactionType::Deposit, _) | (TransactionType::Withdrawal, _) => None,
            (TransactionType::TransferIn, _) | (TransactionType::TransferOut, _) => {
                return Err(DomainError::IntegrityDefect(format!(
                    "transaction {} of type {} cannot be settled",
                    self.id, self.transaction_type
                )));
            }
        };

        Ok(Some(StatusTransition {
            transaction_id: self.id,
            wallet_id: self.wallet_id,
            from: self.status,
            to: target,
            credit,
        }))
    }
}
