//! Port traits (interfaces for adapters).
//!
//! These are the contracts that adapters must implement.
//! The ledger engine depends on these traits, not concrete implementations.

mod psp;
mod repository;

pub use psp::{PayInRequest, PayInResponse, PayOutRequest, PayOutResponse, PspGateway};
pub use repository::LedgerRepository;
