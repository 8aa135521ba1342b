//! Amount limits enforced at initiation time.
//!
//! All amounts are in minor units of the wallet currency.

use crate::error::DomainError;

/// 1.00
pub const MIN_DEPOSIT_AMOUNT: i64 = 100;
/// 100,000.00
pub const MAX_DEPOSIT_AMOUNT: i64 = 10_000_000;
/// 1.00
pub const MIN_TRANSFER_AMOUNT: i64 = 100;
/// 100,000.00
pub const MAX_TRANSFER_AMOUNT: i64 = 10_000_000;

/// How far back the transaction history endpoint looks.
pub const TRANSACTION_HISTORY_MONTHS: u32 = 6;

pub fn validate_deposit_amount(amount: i64) -> Result<(), DomainError> {
    check_range(amount, MIN_DEPOSIT_AMOUNT, MAX_DEPOSIT_AMOUNT)
}

pub fn validate_transfer_amount(amount: i64) -> Result<(), DomainError> {
    check_range(amount, MIN_TRANSFER_AMOUNT, MAX_TRANSFER_AMOUNT)
}

/// Withdrawals are bounded by the wallet balance only.
pub fn validate_withdrawal_amount(amount: i64) -> Result<(), DomainError> {
    if amount <= 0 {
        return Err(DomainError::ValidationError(
            "Amount must be positive".into(),
        ));
    }
    Ok(())
}

fn check_range(amount: i64, min: i64, max: i64) -> Result<(), DomainError> {
    if !(min..=max).contains(&amount) {
        return Err(DomainError::AmountOutOfRange { amount, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deposit_bounds_are_inclusive() {
        assert!(validate_deposit_amount(MIN_DEPOSIT_AMOUNT).is_ok());
        assert!(validate_deposit_amount(MAX_DEPOSIT_AMOUNT).is_ok());
        assert!(validate_deposit_amount(MIN_DEPOSIT_AMOUNT - 1).is_err());
        assert!(validate_deposit_amount(MAX_DEPOSIT_AMOUNT + 1).is_err());
    }

    #[test]
    fn test_transfer_bounds() {
        assert!(validate_transfer_amount(50).is_err());
        assert!(validate_transfer_amount(15_000_000).is_err());
        assert!(matches!(
            validate_transfer_amount(0),
            Err(DomainError::AmountOutOfRange { amount: 0, .. })
        ));
    }

    #[test]
    fn test_withdrawal_must_be_positive() {
        assert!(validate_withdrawal_amount(1).is_ok());
        assert!(validate_withdrawal_amount(0).is_err());
        assert!(validate_withdrawal_amount(-5).is_err());
    }
}
