//! Error types for the wallet ledger.

use crate::domain::{Currency, TransactionId, TransactionStatus};

/// Domain-level errors (business logic violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Amount {amount} is outside the allowed range [{min}, {max}]")]
    AmountOutOfRange { amount: i64, min: i64, max: i64 },

    #[error("Cannot transfer between wallets with different currencies")]
    CrossCurrencyTransfer,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// The stored data and the ledger's rules disagree. Never caused by a
    /// client request; needs an operator.
    #[error("Integrity defect: {0}")]
    IntegrityDefect(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A transaction with this id already exists (idempotency key collision).
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(TransactionId),
}

/// Errors reported by a payment service provider.
#[derive(Debug, thiserror::Error)]
pub enum PspError {
    #[error("Payment method '{0}' is not supported")]
    UnsupportedMethod(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Duplicate request: {0}")]
    Duplicate(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Integrity defect: {0}")]
    IntegrityDefect(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InsufficientFunds {
                available,
                requested,
            } => AppError::InsufficientFunds {
                available,
                requested,
            },
            DomainError::ValidationError(msg) => AppError::BadRequest(msg),
            DomainError::IntegrityDefect(msg) => AppError::IntegrityDefect(msg),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(e) => e.into(),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
            RepoError::DuplicateTransaction(id) => {
                AppError::Duplicate(format!("Transaction {} already exists", id))
            }
        }
    }
}

impl From<PspError> for AppError {
    fn from(err: PspError) -> Self {
        match err {
            PspError::UnsupportedMethod(_) => AppError::BadRequest(err.to_string()),
            e => AppError::Provider(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_maps_to_duplicate() {
        let err: AppError = RepoError::DuplicateTransaction(TransactionId::new()).into();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[test]
    fn test_domain_errors_map_through_repo() {
        let err: AppError = RepoError::Domain(DomainError::InsufficientFunds {
            available: 10,
            requested: 20,
        })
        .into();
        assert!(matches!(
            err,
            AppError::InsufficientFunds {
                available: 10,
                requested: 20
            }
        ));

        let err: AppError = RepoError::Domain(DomainError::IntegrityDefect("x".into())).into();
        assert!(matches!(err, AppError::IntegrityDefect(_)));

        let err: AppError = DomainError::CrossCurrencyTransfer.into();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_psp_errors() {
        let err: AppError = PspError::UnsupportedMethod("AnyPay".into()).into();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err: AppError = PspError::Unavailable("timeout".into()).into();
        assert!(matches!(err, AppError::Provider(_)));
    }
}
