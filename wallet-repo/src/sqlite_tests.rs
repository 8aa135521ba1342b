//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use wallet_types::{
        Currency, DomainError, LedgerRepository, Money, PaymentMethod, RepoError, Transaction,
        TransactionId, TransactionStatus, TransactionType, UserId, Wallet,
    };

    use crate::SqliteRepo;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    /// On-disk database so concurrent connections contend for real locks.
    async fn setup_file_repo() -> (SqliteRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("wallet.db").display());
        (SqliteRepo::new(&url).await.unwrap(), dir)
    }

    fn twd(minor: i64) -> Money {
        Money::new(minor, Currency::TWD).unwrap()
    }

    fn fake_pay() -> PaymentMethod {
        PaymentMethod::new(PaymentMethod::FAKE_PAY)
    }

    async fn settle(repo: &SqliteRepo, id: TransactionId, target: TransactionStatus) -> u64 {
        let tx = repo.get_transaction(id).await.unwrap().unwrap();
        match tx.transition(target).unwrap() {
            Some(transition) => repo.update_status_conditional(&transition).await.unwrap(),
            None => 0,
        }
    }

    /// Opens a wallet and completes a deposit of `balance` into it.
    async fn funded_wallet(repo: &SqliteRepo, user: i64, balance: i64) -> Wallet {
        let wallet = repo
            .create_wallet(UserId::new(user), Currency::TWD)
            .await
            .unwrap();
        if balance > 0 {
            let deposit = Transaction::deposit(TransactionId::new(), wallet.id, twd(balance), fake_pay());
            repo.create_transaction(&deposit).await.unwrap();
            settle(repo, deposit.id, TransactionStatus::Completed).await;
        }
        repo.get_wallet_by_id(wallet.id).await.unwrap().unwrap()
    }

    async fn balance_of(repo: &SqliteRepo, user: i64) -> i64 {
        repo.get_wallet(UserId::new(user))
            .await
            .unwrap()
            .unwrap()
            .balance
            .amount()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wallets
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_and_get_wallet() {
        let repo = setup_repo().await;

        let created = repo
            .create_wallet(UserId::new(7), Currency::USD)
            .await
            .unwrap();
        let fetched = repo.get_wallet(UserId::new(7)).await.unwrap().unwrap();

        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.user_id, UserId::new(7));
        assert_eq!(fetched.balance.amount(), 0);
        assert_eq!(fetched.currency(), Currency::USD);
    }

    #[tokio::test]
    async fn test_second_wallet_for_user_conflicts() {
        let repo = setup_repo().await;
        repo.create_wallet(UserId::new(1), Currency::TWD)
            .await
            .unwrap();

        let result = repo.create_wallet(UserId::new(1), Currency::TWD).await;

        assert!(matches!(result, Err(RepoError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_get_wallet_not_found() {
        let repo = setup_repo().await;

        assert!(repo.get_wallet(UserId::new(404)).await.unwrap().is_none());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions and settlement
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_transaction_round_trips_fields() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 0).await;
        let deposit = Transaction::deposit(TransactionId::new(), wallet.id, twd(1500), fake_pay());

        repo.create_transaction(&deposit).await.unwrap();
        let stored = repo.get_transaction(deposit.id).await.unwrap().unwrap();

        assert_eq!(stored.wallet_id, wallet.id);
        assert_eq!(stored.transaction_type, TransactionType::Deposit);
        assert_eq!(stored.status, TransactionStatus::Pending);
        assert_eq!(stored.amount, twd(1500));
        assert_eq!(stored.payment_method, Some(fake_pay()));
        assert_eq!(stored.related_transaction_id, None);
    }

    #[tokio::test]
    async fn test_duplicate_transaction_id_rejected() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 0).await;
        let id = TransactionId::new();

        repo.create_transaction(&Transaction::deposit(id, wallet.id, twd(100), fake_pay()))
            .await
            .unwrap();
        let result = repo
            .create_transaction(&Transaction::deposit(id, wallet.id, twd(999), fake_pay()))
            .await;

        assert!(matches!(result, Err(RepoError::DuplicateTransaction(dup)) if dup == id));
        let stored = repo.get_transaction(id).await.unwrap().unwrap();
        assert_eq!(stored.amount, twd(100));
    }

    #[tokio::test]
    async fn test_confirm_deposit_credits_once() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 0).await;
        let deposit = Transaction::deposit(TransactionId::new(), wallet.id, twd(2500), fake_pay());
        repo.create_transaction(&deposit).await.unwrap();

        let transition = deposit
            .transition(TransactionStatus::Completed)
            .unwrap()
            .unwrap();

        assert_eq!(repo.update_status_conditional(&transition).await.unwrap(), 1);
        // Same precondition again: the stored status no longer matches.
        assert_eq!(repo.update_status_conditional(&transition).await.unwrap(), 0);

        assert_eq!(balance_of(&repo, 1).await, 2500);
        let stored = repo.get_transaction(deposit.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_deposit_leaves_balance() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 0).await;
        let deposit = Transaction::deposit(TransactionId::new(), wallet.id, twd(2500), fake_pay());
        repo.create_transaction(&deposit).await.unwrap();

        assert_eq!(settle(&repo, deposit.id, TransactionStatus::Canceled).await, 1);
        assert_eq!(settle(&repo, deposit.id, TransactionStatus::Completed).await, 0);

        assert_eq!(balance_of(&repo, 1).await, 0);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Withdrawals
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_withdrawal_reserves_funds() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 10_000).await;
        let withdrawal = Transaction::withdrawal(TransactionId::new(), wallet.id, twd(4000), fake_pay());

        let after = repo.create_withdrawal(&withdrawal).await.unwrap();

        assert_eq!(after.balance.amount(), 6000);
        let stored = repo.get_transaction(withdrawal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Pending);

        // Completing consumes the reservation without touching the balance.
        settle(&repo, withdrawal.id, TransactionStatus::Completed).await;
        assert_eq!(balance_of(&repo, 1).await, 6000);
    }

    #[tokio::test]
    async fn test_withdrawal_insufficient_funds_rolls_back() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 1000).await;
        let withdrawal = Transaction::withdrawal(TransactionId::new(), wallet.id, twd(1001), fake_pay());

        let result = repo.create_withdrawal(&withdrawal).await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::InsufficientFunds {
                available: 1000,
                requested: 1001
            }))
        ));
        assert!(repo.get_transaction(withdrawal.id).await.unwrap().is_none());
        assert_eq!(balance_of(&repo, 1).await, 1000);
    }

    #[tokio::test]
    async fn test_canceled_withdrawal_refunds() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 5000).await;
        let withdrawal = Transaction::withdrawal(TransactionId::new(), wallet.id, twd(5000), fake_pay());
        repo.create_withdrawal(&withdrawal).await.unwrap();
        assert_eq!(balance_of(&repo, 1).await, 0);

        settle(&repo, withdrawal.id, TransactionStatus::Canceled).await;
        settle(&repo, withdrawal.id, TransactionStatus::Canceled).await;

        assert_eq!(balance_of(&repo, 1).await, 5000);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transfers
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_transfer_pair_moves_funds_and_links_legs() {
        let repo = setup_repo().await;
        let alice = funded_wallet(&repo, 1, 10_000).await;
        let bob = funded_wallet(&repo, 2, 0).await;
        let (out, inc) = Transaction::transfer_pair(TransactionId::new(), alice.id, bob.id, twd(3000));

        repo.create_transfer_pair(&out, &inc).await.unwrap();

        assert_eq!(balance_of(&repo, 1).await, 7000);
        assert_eq!(balance_of(&repo, 2).await, 3000);

        let stored_out = repo.get_transaction(out.id).await.unwrap().unwrap();
        let stored_in = repo.get_transaction(inc.id).await.unwrap().unwrap();
        assert_eq!(stored_out.transaction_type, TransactionType::TransferOut);
        assert_eq!(stored_in.transaction_type, TransactionType::TransferIn);
        assert_eq!(stored_out.status, TransactionStatus::Completed);
        assert_eq!(stored_out.related_transaction_id, Some(inc.id));
        assert_eq!(stored_in.related_transaction_id, Some(out.id));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_writes_nothing() {
        let repo = setup_repo().await;
        let alice = funded_wallet(&repo, 1, 500).await;
        let bob = funded_wallet(&repo, 2, 0).await;
        let (out, inc) = Transaction::transfer_pair(TransactionId::new(), alice.id, bob.id, twd(600));

        let result = repo.create_transfer_pair(&out, &inc).await;

        assert!(matches!(
            result,
            Err(RepoError::Domain(DomainError::InsufficientFunds { .. }))
        ));
        assert!(repo.get_transaction(out.id).await.unwrap().is_none());
        assert!(repo.get_transaction(inc.id).await.unwrap().is_none());
        assert_eq!(balance_of(&repo, 1).await, 500);
        assert_eq!(balance_of(&repo, 2).await, 0);
    }

    #[tokio::test]
    async fn test_transfer_reused_id_rejected() {
        let repo = setup_repo().await;
        let alice = funded_wallet(&repo, 1, 10_000).await;
        let bob = funded_wallet(&repo, 2, 0).await;
        let id = TransactionId::new();

        let (out, inc) = Transaction::transfer_pair(id, alice.id, bob.id, twd(1000));
        repo.create_transfer_pair(&out, &inc).await.unwrap();
        let (out2, inc2) = Transaction::transfer_pair(id, alice.id, bob.id, twd(1000));
        let result = repo.create_transfer_pair(&out2, &inc2).await;

        assert!(matches!(result, Err(RepoError::DuplicateTransaction(_))));
        assert_eq!(balance_of(&repo, 1).await, 9000);
        assert_eq!(balance_of(&repo, 2).await, 1000);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // History
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_transactions_since_newest_first() {
        let repo = setup_repo().await;
        let wallet = funded_wallet(&repo, 1, 0).await;
        let now = Utc::now();

        let old = Transaction::from_parts(
            TransactionId::new(),
            wallet.id,
            TransactionType::Deposit,
            TransactionStatus::Completed,
            twd(100),
            Some(fake_pay()),
            None,
            now - Duration::days(200),
            now - Duration::days(200),
        );
        let mut older = Transaction::deposit(TransactionId::new(), wallet.id, twd(200), fake_pay());
        older.created_at = now - Duration::days(10);
        let newer = Transaction::deposit(TransactionId::new(), wallet.id, twd(300), fake_pay());

        for tx in [&old, &older, &newer] {
            repo.create_transaction(tx).await.unwrap();
        }

        let listed = repo
            .list_transactions_for_wallet(wallet.id, now - Duration::days(180))
            .await
            .unwrap();

        let ids: Vec<_> = listed.iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Concurrency
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirms_credit_exactly_once() {
        let (repo, _dir) = setup_file_repo().await;
        let wallet = funded_wallet(&repo, 1, 0).await;
        let deposit = Transaction::deposit(TransactionId::new(), wallet.id, twd(1000), fake_pay());
        repo.create_transaction(&deposit).await.unwrap();
        let transition = deposit
            .transition(TransactionStatus::Completed)
            .unwrap()
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            let transition = transition.clone();
            handles.push(tokio::spawn(async move {
                repo.update_status_conditional(&transition).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            applied += handle.await.unwrap();
        }

        assert_eq!(applied, 1);
        assert_eq!(balance_of(&repo, 1).await, 1000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_withdrawals_never_overdraw() {
        let (repo, _dir) = setup_file_repo().await;
        let wallet = funded_wallet(&repo, 1, 1000).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            let wallet_id = wallet.id;
            handles.push(tokio::spawn(async move {
                let tx = Transaction::withdrawal(TransactionId::new(), wallet_id, twd(300), fake_pay());
                repo.create_withdrawal(&tx).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(RepoError::Domain(DomainError::InsufficientFunds { .. })) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, 3);
        assert_eq!(balance_of(&repo, 1).await, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_id_withdrawals_reserve_once() {
        let (repo, _dir) = setup_file_repo().await;
        let wallet = funded_wallet(&repo, 1, 20_000).await;
        let id = TransactionId::new();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            let wallet_id = wallet.id;
            handles.push(tokio::spawn(async move {
                let tx = Transaction::withdrawal(id, wallet_id, twd(5000), fake_pay());
                repo.create_withdrawal(&tx).await
            }));
        }

        let mut succeeded = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(RepoError::DuplicateTransaction(dup)) => {
                    assert_eq!(dup, id);
                    duplicates += 1;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(duplicates, 9);
        assert_eq!(balance_of(&repo, 1).await, 15_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_id_transfers_move_funds_once() {
        let (repo, _dir) = setup_file_repo().await;
        let sender = funded_wallet(&repo, 1, 10_000).await;
        let recipient = funded_wallet(&repo, 2, 500).await;
        let id = TransactionId::new();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let repo = repo.clone();
            let (from, to) = (sender.id, recipient.id);
            handles.push(tokio::spawn(async move {
                let (out, inc) = Transaction::transfer_pair(id, from, to, twd(1000));
                repo.create_transfer_pair(&out, &inc).await
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(RepoError::DuplicateTransaction(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(balance_of(&repo, 1).await, 9000);
        assert_eq!(balance_of(&repo, 2).await, 1500);
        let incoming = repo
            .list_transactions_for_wallet(recipient.id, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(
            incoming
                .iter()
                .filter(|tx| tx.transaction_type == TransactionType::TransferIn)
                .count(),
            1
        );
    }
}
