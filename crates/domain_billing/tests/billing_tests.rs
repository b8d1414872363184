//! Tests for the ledger engine running against the in-memory store

use rust_decimal_macros::dec;

use core_kernel::Amount;

use domain_billing::{
    Balances, BillingEngine, EngineSettings, InMemoryLedgerStore, LedgerCommand, LedgerError,
    TransactionType,
};

fn engine() -> BillingEngine<InMemoryLedgerStore> {
    BillingEngine::new(InMemoryLedgerStore::new())
}

fn amt(value: rust_decimal::Decimal) -> Amount {
    Amount::new(value)
}

/// Brings a fresh chat to the given state; only one balance may be non-zero
async fn seed(
    engine: &BillingEngine<InMemoryLedgerStore>,
    chat_id: &str,
    rate: Amount,
    reserve: Amount,
    pending: Amount,
) {
    if reserve.is_positive() {
        engine
            .reduce_pending(LedgerCommand::new(chat_id, reserve))
            .await
            .unwrap();
    }
    if pending.is_positive() {
        engine
            .credit_pending(LedgerCommand::new(chat_id, pending))
            .await
            .unwrap();
    }
    engine
        .set_service_rate(LedgerCommand::new(chat_id, rate))
        .await
        .unwrap();
}

// ============================================================================
// Operation Tests
// ============================================================================

mod operation_tests {
    use super::*;

    #[tokio::test]
    async fn test_credit_pending_on_empty_account() {
        let engine = engine();
        seed(&engine, "-100", amt(dec!(0.05)), Amount::ZERO, Amount::ZERO).await;

        let outcome = engine
            .credit_pending(LedgerCommand::new("-100", amt(dec!(100))))
            .await
            .unwrap();

        assert_eq!(outcome.service_fee, amt(dec!(5)));
        assert_eq!(outcome.total, amt(dec!(105)));
        assert_eq!(outcome.account.pending, amt(dec!(105)));
        assert_eq!(outcome.account.reserve, Amount::ZERO);
        assert_eq!(outcome.recharge_principal, amt(dec!(100)));
    }

    #[tokio::test]
    async fn test_credit_pending_absorbed_by_reserve() {
        let engine = engine();
        seed(&engine, "-101", amt(dec!(0.05)), amt(dec!(200)), Amount::ZERO).await;

        let outcome = engine
            .credit_pending(LedgerCommand::new("-101", amt(dec!(100))))
            .await
            .unwrap();

        assert_eq!(outcome.account.reserve, amt(dec!(95)));
        assert_eq!(outcome.account.pending, Amount::ZERO);
        assert_eq!(outcome.recharge_principal, Amount::ZERO);
        assert_eq!(outcome.reserve_before, amt(dec!(200)));
        assert_eq!(outcome.reserve_delta, amt(dec!(-105)));
    }

    #[tokio::test]
    async fn test_negative_credit_pays_pending_then_reserve() {
        let engine = engine();
        seed(&engine, "-102", Amount::ZERO, Amount::ZERO, amt(dec!(30))).await;

        let outcome = engine
            .credit_pending(LedgerCommand::new("-102", amt(dec!(-50))))
            .await
            .unwrap();

        assert_eq!(outcome.account.pending, Amount::ZERO);
        assert_eq!(outcome.account.reserve, amt(dec!(20)));
        assert_eq!(outcome.record.unwrap().kind(), TransactionType::PendingAdd);
    }

    #[tokio::test]
    async fn test_reduce_pending_overpay_goes_to_reserve() {
        let engine = engine();
        seed(&engine, "-103", Amount::ZERO, Amount::ZERO, amt(dec!(30))).await;

        let outcome = engine
            .reduce_pending(LedgerCommand::new("-103", amt(dec!(50))))
            .await
            .unwrap();

        assert_eq!(outcome.pending_before, amt(dec!(30)));
        assert_eq!(outcome.account.pending, Amount::ZERO);
        assert_eq!(outcome.account.reserve, amt(dec!(20)));
        assert_eq!(outcome.reserve_delta, amt(dec!(20)));
    }

    #[tokio::test]
    async fn test_deposit_with_insufficient_pending_changes_nothing() {
        let engine = engine();
        seed(&engine, "-104", amt(dec!(0.05)), Amount::ZERO, amt(dec!(50))).await;
        let before = engine.account("-104").await.unwrap();
        let history_before = engine.history("-104", None).await.unwrap().len();

        let result = engine
            .deposit_to_reserve(LedgerCommand::new("-104", amt(dec!(100))))
            .await;

        match result {
            Err(LedgerError::InsufficientPending { pending, required }) => {
                assert_eq!(pending, amt(dec!(50)));
                assert_eq!(required, amt(dec!(105)));
            }
            other => panic!("Expected InsufficientPending, got {:?}", other),
        }
        let after = engine.account("-104").await.unwrap();
        assert_eq!(after.balances(), before.balances());
        assert_eq!(engine.history("-104", None).await.unwrap().len(), history_before);
    }

    #[tokio::test]
    async fn test_deposit_clears_principal_and_fee() {
        let engine = engine();
        seed(&engine, "-105", amt(dec!(0.05)), Amount::ZERO, amt(dec!(210))).await;

        let outcome = engine
            .deposit_to_reserve(LedgerCommand::new("-105", amt(dec!(100))))
            .await
            .unwrap();

        assert_eq!(outcome.account.reserve, amt(dec!(100)));
        assert_eq!(outcome.account.pending, amt(dec!(105)));
        assert_eq!(outcome.record.unwrap().kind(), TransactionType::Deposit);
    }

    #[tokio::test]
    async fn test_withdraw_shortfall_moves_to_pending() {
        let engine = engine();
        seed(&engine, "-106", amt(dec!(0.05)), amt(dec!(100)), Amount::ZERO).await;

        let outcome = engine
            .withdraw_from_reserve(LedgerCommand::new("-106", amt(dec!(150))))
            .await
            .unwrap();

        assert_eq!(outcome.account.reserve, Amount::ZERO);
        assert_eq!(outcome.account.pending, amt(dec!(50)));
        assert_eq!(outcome.recharge_principal, amt(dec!(50)));
        assert_eq!(outcome.service_fee, Amount::ZERO);
    }

    #[tokio::test]
    async fn test_rejected_amounts() {
        let engine = engine();

        for result in [
            engine.credit_pending(LedgerCommand::new("-107", Amount::ZERO)).await,
            engine.reduce_pending(LedgerCommand::new("-107", amt(dec!(-1)))).await,
            engine.deposit_to_reserve(LedgerCommand::new("-107", amt(dec!(-1)))).await,
            engine.withdraw_from_reserve(LedgerCommand::new("-107", amt(dec!(-1)))).await,
            engine.set_service_rate(LedgerCommand::new("-107", amt(dec!(-0.01)))).await,
            engine.credit_pending(LedgerCommand::new("-107", amt(dec!(0.0000001)))).await,
        ] {
            assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
        }
        assert!(matches!(
            engine.account("-107").await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_balances_stay_exact_at_the_range_limit() {
        let engine = engine();
        let chat = "-109";

        assert!(matches!(
            engine.set_service_rate(LedgerCommand::new(chat, amt(dec!(100000)))).await,
            Err(LedgerError::InvalidAmount(_))
        ));

        seed(&engine, chat, amt(dec!(100)), Amount::ZERO, Amount::ZERO).await;
        let mut rejected = None;
        for _ in 0..20 {
            match engine
                .credit_pending(LedgerCommand::new(chat, amt(dec!(1000000000000000000))))
                .await
            {
                Ok(_) => continue,
                Err(error) => {
                    rejected = Some(error);
                    break;
                }
            }
        }
        assert!(matches!(rejected, Some(LedgerError::InvalidAmount(_))));

        let before = engine.account(chat).await.unwrap();
        assert_eq!(before.pending, amt(dec!(909000000000000000000)));
        let records = engine.history(chat, Some(500)).await.unwrap().len();

        engine
            .set_service_rate(LedgerCommand::new(chat, Amount::ZERO))
            .await
            .unwrap();
        let outcome = engine
            .credit_pending(LedgerCommand::new(chat, amt(dec!(0.000001))))
            .await
            .unwrap();

        assert_eq!(outcome.account.pending - before.pending, amt(dec!(0.000001)));
        assert_eq!(
            engine.history(chat, Some(500)).await.unwrap().len(),
            records + 2
        );
        engine.verify_history(chat, Some(500)).await.unwrap();
    }

    #[tokio::test]
    async fn test_amounts_are_normalized_to_storage_scale() {
        let engine = engine();

        let outcome = engine
            .credit_pending(LedgerCommand::new("-108", amt(dec!(1.0000005))))
            .await
            .unwrap();

        assert_eq!(outcome.amount.to_storage_string(), "1.000001");
        assert_eq!(outcome.record.unwrap().amount(), amt(dec!(1.000001)));
    }
}

// ============================================================================
// Service Rate Tests
// ============================================================================

mod service_rate_tests {
    use super::*;

    #[tokio::test]
    async fn test_same_rate_twice_writes_one_record() {
        let engine = engine();

        let first = engine
            .set_service_rate(LedgerCommand::new("-200", amt(dec!(0.05))))
            .await
            .unwrap();
        let second = engine
            .set_service_rate(LedgerCommand::new("-200", amt(dec!(0.050000))))
            .await
            .unwrap();

        assert!(first.record.is_some());
        assert!(second.record.is_none());
        assert_eq!(second.account.service_rate, amt(dec!(0.05)));

        let history = engine.history("-200", None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind(), TransactionType::ServiceRateUpdate);
        assert_eq!(history[0].amount(), Amount::ZERO);
        assert_eq!(history[0].note(), "service rate 0.00% -> 5.00%");
    }

    #[tokio::test]
    async fn test_zero_rate_on_new_chat_creates_account_without_record() {
        let engine = engine();

        let outcome = engine
            .set_service_rate(LedgerCommand::new("-201", Amount::ZERO).with_title("Night Shift"))
            .await
            .unwrap();

        assert!(outcome.record.is_none());
        let account = engine.account("-201").await.unwrap();
        assert_eq!(account.chat_title.as_deref(), Some("Night Shift"));
        assert!(engine.history("-201", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_change_does_not_move_balances() {
        let engine = engine();
        seed(&engine, "-202", Amount::ZERO, amt(dec!(10)), Amount::ZERO).await;

        let outcome = engine
            .set_service_rate(LedgerCommand::new("-202", amt(dec!(0.1))))
            .await
            .unwrap();

        assert_eq!(outcome.account.balances(), Balances::new(amt(dec!(10)), Amount::ZERO));
        assert_eq!(outcome.reserve_delta, Amount::ZERO);
    }
}

// ============================================================================
// Atomicity Tests
// ============================================================================

mod atomicity_tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_append_rolls_back_balances() {
        let store = InMemoryLedgerStore::new();
        let engine = BillingEngine::new(store.clone());
        engine
            .credit_pending(LedgerCommand::new("-300", amt(dec!(10))))
            .await
            .unwrap();

        store.set_append_failure(true);
        let result = engine
            .credit_pending(LedgerCommand::new("-300", amt(dec!(25))))
            .await;
        store.set_append_failure(false);

        let error = result.unwrap_err();
        assert!(error.is_transient());
        let account = engine.account("-300").await.unwrap();
        assert_eq!(account.pending, amt(dec!(10)));
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_first_operation_creates_no_account() {
        let store = InMemoryLedgerStore::new();
        let engine = BillingEngine::new(store.clone());

        store.set_append_failure(true);
        let result = engine
            .reduce_pending(LedgerCommand::new("-301", amt(dec!(5))).with_title("Lost"))
            .await;

        assert!(matches!(result, Err(LedgerError::StoreUnavailable(_))));
        assert_eq!(store.account_count().await, 0);
    }

    #[tokio::test]
    async fn test_record_snapshot_matches_committed_account() {
        let engine = engine();
        seed(&engine, "-302", amt(dec!(0.03)), amt(dec!(40)), Amount::ZERO).await;

        let outcome = engine
            .credit_pending(LedgerCommand::new("-302", amt(dec!(75))))
            .await
            .unwrap();
        let account = engine.account("-302").await.unwrap();
        let latest = engine.history("-302", Some(1)).await.unwrap();

        assert_eq!(latest[0].balances_after(), account.balances());
        assert_eq!(outcome.record.unwrap().id(), latest[0].id());
    }
}

// ============================================================================
// Query Tests
// ============================================================================

mod query_tests {
    use super::*;

    #[tokio::test]
    async fn test_history_is_newest_first_and_limited() {
        let engine = engine();
        for value in [dec!(1), dec!(2), dec!(3), dec!(4)] {
            engine
                .credit_pending(LedgerCommand::new("-400", amt(value)))
                .await
                .unwrap();
        }

        let history = engine.history("-400", Some(3)).await.unwrap();
        let amounts: Vec<Amount> = history.iter().map(|r| r.amount()).collect();
        assert_eq!(amounts, vec![amt(dec!(4)), amt(dec!(3)), amt(dec!(2))]);
    }

    #[tokio::test]
    async fn test_history_limit_is_clamped() {
        let settings = EngineSettings {
            default_history_limit: 2,
            max_history_limit: 3,
        };
        let engine = BillingEngine::with_settings(InMemoryLedgerStore::new(), settings);
        for _ in 0..5 {
            engine
                .credit_pending(LedgerCommand::new("-401", amt(dec!(1))))
                .await
                .unwrap();
        }

        assert_eq!(engine.history("-401", None).await.unwrap().len(), 2);
        assert_eq!(engine.history("-401", Some(100)).await.unwrap().len(), 3);
        assert_eq!(engine.history("-401", Some(0)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_for_unknown_chat() {
        let engine = engine();
        assert!(matches!(
            engine.history("-402", None).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_title_refresh_keeps_latest() {
        let engine = engine();
        engine
            .credit_pending(LedgerCommand::new("-403", amt(dec!(1))).with_title("Old"))
            .await
            .unwrap();
        engine
            .credit_pending(LedgerCommand::new("-403", amt(dec!(1))))
            .await
            .unwrap();
        assert_eq!(
            engine.account("-403").await.unwrap().chat_title.as_deref(),
            Some("Old")
        );

        engine
            .reduce_pending(LedgerCommand::new("-403", amt(dec!(1))).with_title("New"))
            .await
            .unwrap();
        assert_eq!(
            engine.account("-403").await.unwrap().chat_title.as_deref(),
            Some("New")
        );
    }

    #[tokio::test]
    async fn test_verify_history_matches_live_account() {
        let engine = engine();
        seed(&engine, "-404", amt(dec!(0.05)), amt(dec!(30)), Amount::ZERO).await;
        engine
            .credit_pending(LedgerCommand::new("-404", amt(dec!(100))).with_actor("42"))
            .await
            .unwrap();

        let timeline = engine.verify_history("-404", None).await.unwrap();
        let account = engine.account("-404").await.unwrap();
        assert_eq!(timeline.last().unwrap().balances, account.balances());
    }

    #[tokio::test]
    async fn test_health_follows_store() {
        let store = InMemoryLedgerStore::new();
        let engine = BillingEngine::new(store.clone());
        assert!(engine.health().await.is_healthy());

        store.set_append_failure(true);
        assert!(!engine.health().await.is_healthy());
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_creates_one_account() {
        let store = InMemoryLedgerStore::new();
        let engine = BillingEngine::new(store.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .credit_pending(LedgerCommand::new("-500", amt(dec!(2.5))))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.account_count().await, 1);
        assert_eq!(store.record_count().await, 16);
        let account = engine.account("-500").await.unwrap();
        assert_eq!(account.pending, amt(dec!(40)));
        engine.verify_history("-500", None).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mixed_operations_keep_balances_valid() {
        let engine = engine();
        engine
            .credit_pending(LedgerCommand::new("-501", amt(dec!(100))))
            .await
            .unwrap();

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    let command = LedgerCommand::new("-501", amt(dec!(7)));
                    match i % 4 {
                        0 => engine.credit_pending(command).await,
                        1 => engine.reduce_pending(command).await,
                        2 => engine.withdraw_from_reserve(command).await,
                        _ => engine.deposit_to_reserve(command).await,
                    }
                })
            })
            .collect();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) => assert!(outcome.account.balances().is_valid()),
                Err(LedgerError::InsufficientPending { .. }) => {}
                Err(other) => panic!("Unexpected error: {}", other),
            }
        }

        let account = engine.account("-501").await.unwrap();
        assert!(account.balances().is_valid());
        engine.verify_history("-501", Some(500)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_chats_do_not_interfere() {
        let store = InMemoryLedgerStore::new();
        let engine = BillingEngine::new(store.clone());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    engine
                        .reduce_pending(LedgerCommand::new(format!("-6{}", i), amt(dec!(1))))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.account_count().await, 8);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Credit(i64),
        Reduce(i64),
        Deposit(i64),
        Withdraw(i64),
        Rate(i64),
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            (-50_000_000i64..100_000_000).prop_map(Step::Credit),
            (1i64..100_000_000).prop_map(Step::Reduce),
            (1i64..100_000_000).prop_map(Step::Deposit),
            (1i64..100_000_000).prop_map(Step::Withdraw),
            (0i64..250_000).prop_map(Step::Rate),
        ]
    }

    async fn run(engine: &BillingEngine<InMemoryLedgerStore>, step: Step) -> Result<(), LedgerError> {
        let command = |micros| LedgerCommand::new("-700", Amount::from_micros(micros));
        let outcome = match step {
            Step::Credit(m) => engine.credit_pending(command(m)).await,
            Step::Reduce(m) => engine.reduce_pending(command(m)).await,
            Step::Deposit(m) => engine.deposit_to_reserve(command(m)).await,
            Step::Withdraw(m) => engine.withdraw_from_reserve(command(m)).await,
            Step::Rate(m) => engine.set_service_rate(command(m)).await,
        }?;

        let account = engine.account("-700").await?;
        assert_eq!(outcome.account.balances(), account.balances());
        if let Some(record) = outcome.record {
            assert_eq!(record.balances_after(), account.balances());
        }
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn balances_never_go_negative(steps in prop::collection::vec(step_strategy(), 1..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let engine = engine();
                for step in steps {
                    match run(&engine, step).await {
                        Ok(()) => {}
                        Err(LedgerError::InsufficientPending { .. }) => {}
                        Err(LedgerError::InvalidAmount(_)) => {}
                        Err(other) => panic!("Unexpected error: {}", other),
                    }
                    if let Ok(account) = engine.account("-700").await {
                        assert!(account.balances().is_valid());
                    }
                }
                if engine.account("-700").await.is_ok() {
                    engine.verify_history("-700", Some(500)).await.unwrap();
                }
            });
        }
    }
}
