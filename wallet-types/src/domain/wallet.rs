//! Wallet domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::{Currency, Money};
use crate::error::DomainError;

/// Identifier of a user, owned by the user service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

/// Unique identifier for a Wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Creates a new random WalletId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a WalletId from an existing UUID.
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

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Administrative state of a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletStatus {
    #[default]
    Active,
    Suspended,
}

impl AsRef<str> for WalletStatus {
    fn as_ref(&self) -> &str {
        match self {
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl std::str::FromStr for WalletStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            other => Err(DomainError::ValidationError(format!(
                "Unknown wallet status: {}",
                other
            ))),
        }
    }
}

/// A user's wallet. Exactly one per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    /// Current balance (includes currency information)
    pub balance: Money,
    pub status: WalletStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Opens an empty, active wallet for a user.
    pub fn open(user_id: UserId, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::new(),
            user_id,
            balance: Money::zero(currency),
            status: WalletStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a wallet with all fields specified (for database reconstruction).
    pub fn from_parts(
        id: WalletId,
        user_id: UserId,
        balance: Money,
        status: WalletStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            balance,
            status,
            created_at,
            updated_at,
        }
    }

    /// Returns the currency of this wallet.
    pub fn currency(&self) -> Currency {
        self.balance.currency()
    }

    /// Credits (adds) money to the wallet.
    pub fn credit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balance = self.balance.checked_add(amount)?;
        Ok(())
    }

    /// Debits (subtracts) money from the wallet.
    pub fn debit(&mut self, amount: Money) -> Result<(), DomainError> {
        self.balance = self.balance.checked_sub(amount)?;
        Ok(())
    }

    /// Checks if the wallet has sufficient funds for a debit.
    pub fn has_sufficient_funds(&self, amount: &Money) -> bool {
        self.balance.covers(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_wallet() {
        let wallet = Wallet::open(UserId::new(7), Currency::TWD);
        assert_eq!(wallet.user_id, UserId::new(7));
        assert_eq!(wallet.balance.amount(), 0);
        assert_eq!(wallet.currency(), Currency::TWD);
        assert_eq!(wallet.status, WalletStatus::Active);
    }

    #[test]
    fn test_wallet_credit_and_debit() {
        let mut wallet = Wallet::open(UserId::new(1), Currency::TWD);
        wallet.credit(Money::new(1000, Currency::TWD).unwrap()).unwrap();
        wallet.debit(Money::new(300, Currency::TWD).unwrap()).unwrap();
        assert_eq!(wallet.balance.amount(), 700);
    }

    #[test]
    fn test_insufficient_funds() {
        let mut wallet = Wallet::open(UserId::new(1), Currency::TWD);
        wallet.credit(Money::new(100, Currency::TWD).unwrap()).unwrap();

        let request = Money::new(200, Currency::TWD).unwrap();
        assert!(!wallet.has_sufficient_funds(&request));
        assert!(matches!(
            wallet.debit(request),
            Err(DomainError::InsufficientFunds { .. })
        ));
        assert_eq!(wallet.balance.amount(), 100);
    }

    #[test]
    fn test_user_id_parse() {
        assert_eq!(" 42".parse::<UserId>().unwrap(), UserId::new(42));
        assert!("abc".parse::<UserId>().is_err());
    }
}
