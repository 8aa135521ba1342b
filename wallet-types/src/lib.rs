//! # Wallet Types
//!
//! Domain types and port traits for the wallet ledger.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Wallet, Transaction state machine)
//! - `limits` - Amount bounds checked at initiation
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto` - Data Transfer Objects for API boundaries
//! - `error` - Domain, repository, provider and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod limits;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Currency, Money, PaymentMethod, StatusTransition, Transaction, TransactionId,
    TransactionStatus, TransactionType, UserId, Wallet, WalletId, WalletStatus,
};
pub use dto::*;
pub use error::{AppError, DomainError, PspError, RepoError};
pub use ports::{
    LedgerRepository, PayInRequest, PayInResponse, PayOutRequest, PayOutResponse, PspGateway,
};
