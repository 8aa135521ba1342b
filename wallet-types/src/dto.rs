//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Currency, PaymentMethod, Transaction, TransactionId, TransactionStatus, TransactionType,
    UserId, Wallet, WalletId, WalletStatus,
};

// ─────────────────────────────────────────────────────────────────────────────
// Wallet DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to open the caller's wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWalletRequest {
    #[serde(default = "default_currency")]
    pub currency: Currency,
}

fn default_currency() -> Currency {
    Currency::TWD
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub id: WalletId,
    pub user_id: UserId,
    /// Current balance in minor units
    pub balance: i64,
    pub currency: Currency,
    pub status: WalletStatus,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            id: wallet.id,
            user_id: wallet.user_id,
            balance: wallet.balance.amount(),
            currency: wallet.currency(),
            status: wallet.status,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payment DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to deposit money through a PSP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Client-generated idempotency key; becomes the transaction id
    pub uuid: TransactionId,
    /// Amount in minor units of the wallet currency
    pub amount: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositResponse {
    pub transaction_id: TransactionId,
    /// Where the payer completes the payment
    pub redirect_url: String,
}

/// Request to withdraw money through a PSP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub uuid: TransactionId,
    pub amount: i64,
    pub payment_method: PaymentMethod,
}

/// Request to move money to another user's wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub uuid: TransactionId,
    pub recipient_user_id: UserId,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub transfer_out: TransactionResponse,
    pub transfer_in: TransactionResponse,
}

/// Body of the PSP confirm and cancel callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRequest {
    pub transaction_id: TransactionId,
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub uuid: TransactionId,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// Amount in minor units
    pub amount: i64,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_transaction_id: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            uuid: tx.id,
            transaction_type: tx.transaction_type,
            status: tx.status,
            amount: tx.amount.amount(),
            currency: tx.amount.currency(),
            payment_method: tx.payment_method,
            related_transaction_id: tx.related_transaction_id,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

/// Optional filters for transaction history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(rename = "type", default)]
    pub transaction_type: Option<TransactionType>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        self.transaction_type
            .is_none_or(|t| t == tx.transaction_type)
            && self.status.is_none_or(|s| s == tx.status)
    }
}
