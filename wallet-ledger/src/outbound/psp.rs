//! Payment service provider adapters.
//!
//! Each provider simulates a third party: it accepts the request and the
//! real outcome arrives later through the confirm/cancel callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use wallet_types::{
    PayInRequest, PayInResponse, PayOutRequest, PayOutResponse, PaymentMethod, PspError,
    PspGateway,
};

/// A single provider behind a payment method tag.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn pay_in(&self, req: PayInRequest) -> Result<PayInResponse, PspError>;

    async fn pay_out(&self, req: PayOutRequest) -> Result<PayOutResponse, PspError>;
}

/// Hosted payment page: the payer is redirected to the provider.
#[derive(Debug, Clone)]
pub struct FakePay {
    provider_url: String,
}

impl FakePay {
    pub fn new(provider_url: impl Into<String>) -> Self {
        Self {
            provider_url: provider_url.into(),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakePay {
    async fn pay_in(&self, req: PayInRequest) -> Result<PayInResponse, PspError> {
        debug!(transaction_id = %req.transaction_id, "simulating hosted pay-in");

        let redirect_url = format!(
            "{}/payin/{}?merchant=MH&amount={}&confirm_callback={}&cancel_callback={}",
            self.provider_url.trim_end_matches('/'),
            req.transaction_id,
            req.amount.to_decimal_string(),
            query_escape(&req.confirm_callback_url),
            query_escape(&req.cancel_callback_url),
        );

        Ok(PayInResponse {
            provider_transaction_id: req.transaction_id.to_string(),
            redirect_url,
        })
    }

    async fn pay_out(&self, req: PayOutRequest) -> Result<PayOutResponse, PspError> {
        debug!(transaction_id = %req.transaction_id, "simulating hosted pay-out");
        Ok(PayOutResponse {
            provider_transaction_id: req.transaction_id.to_string(),
        })
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set, byte by
/// byte, so a value cannot end or extend the query string it is placed in.
fn query_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Bank transfer: acknowledged without a redirect.
#[derive(Debug, Clone, Default)]
pub struct BankTransfer;

#[async_trait]
impl PaymentProvider for BankTransfer {
    async fn pay_in(&self, req: PayInRequest) -> Result<PayInResponse, PspError> {
        debug!(transaction_id = %req.transaction_id, "simulating bank transfer pay-in");
        Ok(PayInResponse {
            provider_transaction_id: req.transaction_id.to_string(),
            redirect_url: String::new(),
        })
    }

    async fn pay_out(&self, req: PayOutRequest) -> Result<PayOutResponse, PspError> {
        debug!(transaction_id = %req.transaction_id, "simulating bank transfer pay-out");
        Ok(PayOutResponse {
            provider_transaction_id: req.transaction_id.to_string(),
        })
    }
}

/// Maps payment method tags to providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<PaymentMethod, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` for `method`, replacing any previous one.
    pub fn with_provider(
        mut self,
        method: PaymentMethod,
        provider: impl PaymentProvider + 'static,
    ) -> Self {
        self.providers.insert(method, Arc::new(provider));
        self
    }

    /// `FakePay` and `BankTransfer`.
    pub fn with_defaults(fake_pay_url: impl Into<String>) -> Self {
        Self::new()
            .with_provider(
                PaymentMethod::new(PaymentMethod::FAKE_PAY),
                FakePay::new(fake_pay_url),
            )
            .with_provider(
                PaymentMethod::new(PaymentMethod::BANK_TRANSFER),
                BankTransfer,
            )
    }

    fn provider(&self, method: &PaymentMethod) -> Result<&Arc<dyn PaymentProvider>, PspError> {
        self.providers
            .get(method)
            .ok_or_else(|| PspError::UnsupportedMethod(method.to_string()))
    }
}

#[async_trait]
impl PspGateway for ProviderRegistry {
    fn supports(&self, method: &PaymentMethod) -> bool {
        self.providers.contains_key(method)
    }

    async fn pay_in(
        &self,
        method: &PaymentMethod,
        req: PayInRequest,
    ) -> Result<PayInResponse, PspError> {
        self.provider(method)?.pay_in(req).await
    }

    async fn pay_out(
        &self,
        method: &PaymentMethod,
        req: PayOutRequest,
    ) -> Result<PayOutResponse, PspError> {
        self.provider(method)?.pay_out(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_types::{Currency, Money, TransactionId};

    fn pay_in_request(id: TransactionId, minor: i64) -> PayInRequest {
        PayInRequest {
            transaction_id: id,
            amount: Money::new(minor, Currency::TWD).unwrap(),
            confirm_callback_url: "http://ledger/api/v1/payments/confirm".into(),
            cancel_callback_url: "http://ledger/api/v1/payments/cancel".into(),
        }
    }

    #[tokio::test]
    async fn test_fake_pay_redirect_format() {
        let id = TransactionId::new();
        let provider = FakePay::new("https://pay.example/");

        let response = provider.pay_in(pay_in_request(id, 10050)).await.unwrap();

        assert_eq!(
            response.redirect_url,
            format!(
                "https://pay.example/payin/{}?merchant=MH&amount=100.50\
                 &confirm_callback=http%3A%2F%2Fledger%2Fapi%2Fv1%2Fpayments%2Fconfirm\
                 &cancel_callback=http%3A%2F%2Fledger%2Fapi%2Fv1%2Fpayments%2Fcancel",
                id
            )
        );
        assert_eq!(response.provider_transaction_id, id.to_string());
    }

    #[tokio::test]
    async fn test_fake_pay_callbacks_cannot_break_query() {
        let id = TransactionId::new();
        let mut req = pay_in_request(id, 500);
        req.confirm_callback_url = "http://ledger/confirm?tenant=a&merchant=EVIL".into();
        req.cancel_callback_url = "http://ledger/cancel#frag".into();

        let response = FakePay::new("https://pay.example").pay_in(req).await.unwrap();
        let query = response.redirect_url.split_once('?').unwrap().1;
        let params: Vec<&str> = query.split('&').collect();

        assert_eq!(params.len(), 4);
        assert_eq!(params[0], "merchant=MH");
        assert_eq!(
            params[2],
            "confirm_callback=http%3A%2F%2Fledger%2Fconfirm%3Ftenant%3Da%26merchant%3DEVIL"
        );
        assert_eq!(params[3], "cancel_callback=http%3A%2F%2Fledger%2Fcancel%23frag");
        assert!(!response.redirect_url.contains('#'));
    }

    #[test]
    fn test_query_escape() {
        assert_eq!(query_escape("Az09-_.~"), "Az09-_.~");
        assert_eq!(query_escape("a b/c"), "a%20b%2Fc");
        assert_eq!(query_escape("é"), "%C3%A9");
    }

    #[tokio::test]
    async fn test_bank_transfer_has_no_redirect() {
        let response = BankTransfer
            .pay_in(pay_in_request(TransactionId::new(), 500))
            .await
            .unwrap();

        assert!(response.redirect_url.is_empty());
    }

    #[tokio::test]
    async fn test_registry_rejects_unknown_method() {
        let registry = ProviderRegistry::with_defaults("http://localhost:4000");
        let card = PaymentMethod::new("CreditCard");

        assert!(registry.supports(&PaymentMethod::new(PaymentMethod::FAKE_PAY)));
        assert!(!registry.supports(&card));

        let result = registry
            .pay_in(&card, pay_in_request(TransactionId::new(), 500))
            .await;
        assert!(matches!(result, Err(PspError::UnsupportedMethod(m)) if m == "CreditCard"));
    }
}
