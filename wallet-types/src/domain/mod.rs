//! Domain models for the wallet ledger.

pub mod money;
pub mod transaction;
pub mod wallet;

pub use money::{Currency, Money};
pub use transaction::{
    PaymentMethod, StatusTransition, Transaction, TransactionId, TransactionStatus,
    TransactionType,
};
pub use wallet::{UserId, Wallet, WalletId, WalletStatus};
