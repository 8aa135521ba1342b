//! Ledger Application Service
//!
//! Orchestrates domain operations through the repository and PSP ports.
//! Contains NO infrastructure logic - pure business orchestration.

use chrono::{DateTime, Months, Utc};
use tracing::{debug, error, info, warn};

use wallet_types::limits::{self, TRANSACTION_HISTORY_MONTHS};
use wallet_types::{
    AppError, Currency, DepositRequest, DepositResponse, DomainError, LedgerRepository, Money,
    PayInRequest, PayOutRequest, PaymentMethod, PspError, PspGateway, RepoError, Transaction,
    TransactionFilter, TransactionId, TransactionStatus, TransferRequest, UserId, Wallet,
    WithdrawRequest,
};

/// Where the PSP reports the outcome of a pay-in.
#[derive(Debug, Clone)]
pub struct CallbackUrls {
    pub confirm: String,
    pub cancel: String,
}

impl CallbackUrls {
    /// Builds the confirm and cancel URLs served by this process under `base`.
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            confirm: format!("{}/api/v1/payments/confirm", base),
            cancel: format!("{}/api/v1/payments/cancel", base),
        }
    }
}

/// Result of a confirm or cancel callback. Every variant is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call moved the transaction to the given status.
    Applied(TransactionStatus),
    /// The transaction was already terminal when read.
    AlreadySettled(TransactionStatus),
    /// A concurrent callback won the conditional update.
    Superseded,
}

/// Start of the window served by the transaction history endpoint.
pub fn history_since(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(TRANSACTION_HISTORY_MONTHS))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Application service for wallet operations.
///
/// Generic over the store and the PSP gateway - both adapters are injected
/// at compile time. The service holds no mutable state of its own: every
/// race between requests is decided by the store.
pub struct LedgerService<R: LedgerRepository, P: PspGateway> {
    repo: R,
    psp: P,
    callbacks: CallbackUrls,
}

impl<R: LedgerRepository, P: PspGateway> LedgerService<R, P> {
    pub fn new(repo: R, psp: P, callbacks: CallbackUrls) -> Self {
        Self {
            repo,
            psp,
            callbacks,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Wallet Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Opens the wallet of a newly registered user.
    #[tracing::instrument(skip(self))]
    pub async fn open_wallet(&self, user_id: UserId, currency: Currency) -> Result<Wallet, AppError> {
        let wallet = self.repo.create_wallet(user_id, currency).await?;
        info!(wallet_id = %wallet.id, "wallet opened");
        Ok(wallet)
    }

    /// Gets the wallet owned by a user.
    pub async fn get_wallet(&self, user_id: UserId) -> Result<Wallet, AppError> {
        self.repo
            .get_wallet(user_id)
            .await
            .map_err(Into::into)
            .and_then(|opt| {
                opt.ok_or_else(|| AppError::NotFound(format!("Wallet for user {}", user_id)))
            })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payment Operations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Records a pending deposit and hands it to the PSP.
    ///
    /// The balance is untouched until the PSP confirms. Only the caller that
    /// inserted the row reaches the PSP; a reused id fails before that.
    #[tracing::instrument(
        skip(self, req),
        fields(transaction_id = %req.uuid, amount = req.amount, method = %req.payment_method)
    )]
    pub async fn deposit(
        &self,
        user_id: UserId,
        req: DepositRequest,
    ) -> Result<DepositResponse, AppError> {
        limits::validate_deposit_amount(req.amount)?;
        self.ensure_supported(&req.payment_method)?;

        let wallet = self.get_wallet(user_id).await?;
        let amount = Money::new(req.amount, wallet.currency())?;
        let method = req.payment_method.clone();
        let tx = Transaction::deposit(req.uuid, wallet.id, amount, req.payment_method);

        self.repo
            .create_transaction(&tx)
            .await
            .inspect_err(log_duplicate)?;

        let pay_in = PayInRequest {
            transaction_id: tx.id,
            amount,
            confirm_callback_url: self.callbacks.confirm.clone(),
            cancel_callback_url: self.callbacks.cancel.clone(),
        };

        let response = self.psp.pay_in(&method, pay_in).await.map_err(|e| {
            error!(error = %e, "pay-in failed; deposit stays pending");
            AppError::Provider(e.to_string())
        })?;

        debug!(provider_id = %response.provider_transaction_id, "pay-in accepted");

        Ok(DepositResponse {
            transaction_id: tx.id,
            redirect_url: response.redirect_url,
        })
    }

    /// Records a pending withdrawal, reserves its funds and asks the PSP to
    /// pay out.
    #[tracing::instrument(
        skip(self, req),
        fields(transaction_id = %req.uuid, amount = req.amount, method = %req.payment_method)
    )]
    pub async fn withdraw(
        &self,
        user_id: UserId,
        req: WithdrawRequest,
    ) -> Result<Transaction, AppError> {
        limits::validate_withdrawal_amount(req.amount)?;
        self.ensure_supported(&req.payment_method)?;

        let wallet = self.get_wallet(user_id).await?;
        let amount = Money::new(req.amount, wallet.currency())?;

        // Fast path only; the store re-checks inside the reservation.
        if !wallet.has_sufficient_funds(&amount) {
            return Err(insufficient(&wallet, req.amount));
        }

        let method = req.payment_method.clone();
        let tx = Transaction::withdrawal(req.uuid, wallet.id, amount, req.payment_method);

        let reserved = self
            .repo
            .create_withdrawal(&tx)
            .await
            .inspect_err(log_duplicate)?;
        debug!(balance = reserved.balance.amount(), "funds reserved");

        let pay_out = PayOutRequest {
            transaction_id: tx.id,
            amount,
        };

        let response = self.psp.pay_out(&method, pay_out).await.map_err(|e| {
            error!(
                error = %e,
                "pay-out failed; funds stay reserved until the withdrawal is canceled"
            );
            AppError::Provider(e.to_string())
        })?;

        debug!(provider_id = %response.provider_transaction_id, "pay-out accepted");
        Ok(tx)
    }

    /// Moves funds between two users' wallets as a completed, linked pair.
    ///
    /// Returns `(transfer_out, transfer_in)`.
    #[tracing::instrument(
        skip(self, req),
        fields(transaction_id = %req.uuid, recipient = %req.recipient_user_id, amount = req.amount)
    )]
    pub async fn transfer(
        &self,
        sender: UserId,
        req: TransferRequest,
    ) -> Result<(Transaction, Transaction), AppError> {
        limits::validate_transfer_amount(req.amount)?;

        if sender == req.recipient_user_id {
            return Err(AppError::BadRequest(
                "Cannot transfer to your own wallet".into(),
            ));
        }

        let from = self.get_wallet(sender).await?;
        let to = self.get_wallet(req.recipient_user_id).await?;

        if from.currency() != to.currency() {
            return Err(DomainError::CrossCurrencyTransfer.into());
        }

        let amount = Money::new(req.amount, from.currency())?;
        if !from.has_sufficient_funds(&amount) {
            return Err(insufficient(&from, req.amount));
        }

        let (transfer_out, transfer_in) =
            Transaction::transfer_pair(req.uuid, from.id, to.id, amount);

        self.repo
            .create_transfer_pair(&transfer_out, &transfer_in)
            .await
            .inspect_err(log_duplicate)?;

        info!(transfer_in = %transfer_in.id, "transfer completed");
        Ok((transfer_out, transfer_in))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // PSP Callbacks
    // ─────────────────────────────────────────────────────────────────────────────

    /// Handles the PSP's success callback.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, id: TransactionId) -> Result<SettlementOutcome, AppError> {
        self.settle(id, TransactionStatus::Completed).await
    }

    /// Handles the PSP's failure callback.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: TransactionId) -> Result<SettlementOutcome, AppError> {
        self.settle(id, TransactionStatus::Canceled).await
    }

    async fn settle(
        &self,
        id: TransactionId,
        target: TransactionStatus,
    ) -> Result<SettlementOutcome, AppError> {
        let tx = self.get_transaction(id).await?;

        let transition = match tx.transition(target) {
            Ok(Some(transition)) => transition,
            Ok(None) => {
                info!(status = %tx.status, "transaction already settled; callback ignored");
                return Ok(SettlementOutcome::AlreadySettled(tx.status));
            }
            Err(DomainError::IntegrityDefect(msg)) => {
                error!(defect = %msg, "ledger integrity defect");
                return Err(AppError::IntegrityDefect(msg));
            }
            Err(e) => return Err(e.into()),
        };

        match self.repo.update_status_conditional(&transition).await? {
            0 => {
                info!("concurrent callback settled the transaction first");
                Ok(SettlementOutcome::Superseded)
            }
            _ => {
                info!(status = %target, credit = ?transition.credit.map(|m| m.amount()), "transaction settled");
                Ok(SettlementOutcome::Applied(target))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transaction History
    // ─────────────────────────────────────────────────────────────────────────────

    /// Gets a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await
            .map_err(Into::into)
            .and_then(|opt| opt.ok_or_else(|| AppError::NotFound(format!("Transaction {}", id))))
    }

    /// Gets a transaction only if it belongs to `user_id`'s wallet.
    ///
    /// Another user's transaction is reported as not found.
    pub async fn get_user_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Transaction, AppError> {
        let wallet = self.get_wallet(user_id).await?;
        let tx = self.get_transaction(id).await?;
        if tx.wallet_id != wallet.id {
            return Err(AppError::NotFound(format!("Transaction {}", id)));
        }
        Ok(tx)
    }

    /// Lists a user's transactions created at or after `since`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_transactions(
        &self,
        user_id: UserId,
        since: DateTime<Utc>,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, AppError> {
        let wallet = self.get_wallet(user_id).await?;

        let transactions = self
            .repo
            .list_transactions_for_wallet(wallet.id, since)
            .await?;

        Ok(transactions
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect())
    }

    /// Rejects an unknown payment method before any row is written.
    fn ensure_supported(&self, method: &PaymentMethod) -> Result<(), AppError> {
        if !self.psp.supports(method) {
            warn!(method = %method, "unsupported payment method");
            return Err(PspError::UnsupportedMethod(method.to_string()).into());
        }
        Ok(())
    }
}

fn insufficient(wallet: &Wallet, requested: i64) -> AppError {
    AppError::InsufficientFunds {
        available: wallet.balance.amount(),
        requested,
    }
}

fn log_duplicate(err: &RepoError) {
    if let RepoError::DuplicateTransaction(id) = err {
        warn!(transaction_id = %id, "duplicate request rejected");
    }
}
