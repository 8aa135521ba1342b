//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;

use wallet_types::{
    AppError, CallbackRequest, DepositRequest, LedgerRepository, OpenWalletRequest, PspGateway,
    TransactionFilter, TransactionId, TransactionResponse, TransactionStatus, TransferRequest,
    TransferResponse, UserId, WalletResponse, WithdrawRequest,
};

use super::auth::AuthenticatedUser;
use crate::service::{LedgerService, SettlementOutcome, history_since};

/// Application state shared across handlers.
pub struct AppState<R: LedgerRepository, P: PspGateway> {
    pub service: LedgerService<R, P>,
    /// SHA-256 hex digest of the PSP shared secret.
    pub psp_key_hash: String,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::BadRequest(_) | AppError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::IntegrityDefect(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self.0 {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Duplicate(msg)
            | AppError::Unauthorized(msg)
            | AppError::Provider(msg) => msg.clone(),
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Body returned by the confirm and cancel callbacks.
#[derive(Debug, Serialize)]
pub struct SettlementResponse {
    pub transaction_id: TransactionId,
    /// `applied`, `already_settled` or `superseded`
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
}

impl SettlementResponse {
    fn new(transaction_id: TransactionId, outcome: SettlementOutcome) -> Self {
        let (outcome, status) = match outcome {
            SettlementOutcome::Applied(status) => ("applied", Some(status)),
            SettlementOutcome::AlreadySettled(status) => ("already_settled", Some(status)),
            SettlementOutcome::Superseded => ("superseded", None),
        };
        Self {
            transaction_id,
            outcome,
            status,
        }
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Wallets
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn open_wallet<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    user: AuthenticatedUser,
    Json(req): Json<OpenWalletRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.service.open_wallet(user.0, req.currency).await?;
    Ok((StatusCode::CREATED, Json(WalletResponse::from(wallet))))
}

#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn get_wallet<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let wallet = state.service.get_wallet(user.0).await?;
    Ok(Json(WalletResponse::from(wallet)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Payments
// ─────────────────────────────────────────────────────────────────────────────

/// Starts a deposit; the client follows `redirect_url` to pay.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn deposit<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    user: AuthenticatedUser,
    Json(req): Json<DepositRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.service.deposit(user.0, req).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn withdraw<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    user: AuthenticatedUser,
    Json(req): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tx = state.service.withdraw(user.0, req).await?;
    Ok(Json(TransactionResponse::from(tx)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn transfer<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    user: AuthenticatedUser,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (transfer_out, transfer_in) = state.service.transfer(user.0, req).await?;
    Ok(Json(TransferResponse {
        transfer_out: transfer_out.into(),
        transfer_in: transfer_in.into(),
    }))
}

/// PSP success callback. Already-settled transactions still answer 200.
#[tracing::instrument(skip(state), fields(transaction_id = %req.transaction_id))]
pub async fn confirm<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Json(req): Json<CallbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.confirm(req.transaction_id).await?;
    Ok(Json(SettlementResponse::new(req.transaction_id, outcome)))
}

/// PSP failure callback. Already-settled transactions still answer 200.
#[tracing::instrument(skip(state), fields(transaction_id = %req.transaction_id))]
pub async fn cancel<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Json(req): Json<CallbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.cancel(req.transaction_id).await?;
    Ok(Json(SettlementResponse::new(req.transaction_id, outcome)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state), fields(user_id = %user.0, transaction_id = %id))]
pub async fn get_transaction<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let transaction_id: TransactionId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid transaction ID".into()))?;

    let tx = state
        .service
        .get_user_transaction(user.0, transaction_id)
        .await?;
    Ok(Json(TransactionResponse::from(tx)))
}

/// Last six months of a user's transactions, optionally filtered by
/// `type` and `status`.
#[tracing::instrument(skip(state))]
pub async fn list_user_transactions<R: LedgerRepository, P: PspGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(user_id): Path<String>,
    Query(filter): Query<TransactionFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid user ID".into()))?;

    let transactions = state
        .service
        .list_transactions(user_id, history_since(Utc::now()), &filter)
        .await?;

    let body: Vec<TransactionResponse> = transactions.into_iter().map(Into::into).collect();
    Ok(Json(body))
}
