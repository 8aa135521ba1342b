//! Outbound adapters driven by the ledger service.

pub mod psp;

pub use psp::{BankTransfer, FakePay, PaymentProvider, ProviderRegistry};
