//! Payment service provider port.
//!
//! The ledger only consumes this contract. Adapters decide how a payment
//! method tag maps to a concrete provider.

use crate::domain::{Money, PaymentMethod, TransactionId};
use crate::error::PspError;

/// Pay-in (deposit) request handed to a provider.
#[derive(Debug, Clone)]
pub struct PayInRequest {
    pub transaction_id: TransactionId,
    pub amount: Money,
    pub confirm_callback_url: String,
    pub cancel_callback_url: String,
}

/// Provider answer to a pay-in: where to send the payer next.
#[derive(Debug, Clone)]
pub struct PayInResponse {
    pub provider_transaction_id: String,
    pub redirect_url: String,
}

/// Pay-out (withdrawal) request handed to a provider.
#[derive(Debug, Clone)]
pub struct PayOutRequest {
    pub transaction_id: TransactionId,
    pub amount: Money,
}

/// Provider acknowledgement of a pay-out.
#[derive(Debug, Clone)]
pub struct PayOutResponse {
    pub provider_transaction_id: String,
}

/// Port trait for the PSP gateway.
///
/// Results of a pay-in or pay-out arrive later through the confirm/cancel
/// callbacks, never through these return values.
#[async_trait::async_trait]
pub trait PspGateway: Send + Sync + 'static {
    /// Whether a provider is registered for this payment method.
    fn supports(&self, method: &PaymentMethod) -> bool;

    /// Starts a deposit with the provider selected by `method`.
    async fn pay_in(
        &self,
        method: &PaymentMethod,
        req: PayInRequest,
    ) -> Result<PayInResponse, PspError>;

    /// Starts a withdrawal with the provider selected by `method`.
    async fn pay_out(
        &self,
        method: &PaymentMethod,
        req: PayOutRequest,
    ) -> Result<PayOutResponse, PspError>;
}
