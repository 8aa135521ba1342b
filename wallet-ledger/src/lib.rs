//! # Wallet Ledger
//!
//! Ledger engine, PSP adapters and HTTP adapter for the wallet service.
//!
//! ## Architecture
//!
//! - `service` - Application service (deposit, withdraw, transfer, PSP callbacks)
//! - `outbound/` - Payment service provider adapters
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `R: LedgerRepository` and `P: PspGateway`,
//! allowing different store and provider implementations to be injected.

pub mod inbound;
pub mod outbound;
pub mod service;


pub use service::{CallbackUrls, LedgerService, SettlementOutcome};
