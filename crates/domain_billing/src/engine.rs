//! Billing engine
//!
//! Runs the ledger operations against a [`LedgerStore`]. Each mutating call
//! is one unit of work: load-or-create the account, compute the transition,
//! save the account, append one record. Any failure rolls all of it back.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingEngine, LedgerCommand, InMemoryLedgerStore};
//!
//! let engine = BillingEngine::new(InMemoryLedgerStore::new());
//! let outcome = engine
//!     .credit_pending(LedgerCommand::new("-100123", amount).with_title("Ops"))
//!     .await?;
//! println!("pending is now {}", outcome.account.pending);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use core_kernel::{Amount, HealthCheckResult, HealthCheckable};

use crate::account::{Account, Balances};
use crate::error::LedgerError;
use crate::operations::{self, LedgerOperation, Transition};
use crate::replay::{self, ReplayedBalances};
use crate::store::{LedgerStore, LedgerStoreExt, LedgerTransaction};
use crate::transaction::{NewTransactionRecord, TransactionRecord, TransactionType};

/// Tunables for read-only queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// History length used when the caller gives none
    pub default_history_limit: u32,
    /// Upper bound for any history request
    pub max_history_limit: u32,
}

impl EngineSettings {
    /// Resolves a requested history length to `[1, max_history_limit]`
    pub fn history_limit(&self, requested: Option<u32>) -> u32 {
        let max = self.max_history_limit.max(1);
        requested
            .unwrap_or(self.default_history_limit)
            .clamp(1, max)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_history_limit: 50,
            max_history_limit: 500,
        }
    }
}

/// Input of one ledger operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerCommand {
    /// External chat identifier
    pub chat_id: String,
    /// Chat title to store, if the caller knows it
    pub chat_title: Option<String>,
    /// Principal, payment, usage, or new rate depending on the operation
    pub amount: Amount,
    /// Who triggered the operation
    pub actor_id: Option<String>,
}

impl LedgerCommand {
    /// Creates a command for a chat
    pub fn new(chat_id: impl Into<String>, amount: Amount) -> Self {
        Self {
            chat_id: chat_id.into(),
            chat_title: None,
            amount,
            actor_id: None,
        }
    }

    /// Sets the chat title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.chat_title = Some(title.into());
        self
    }

    /// Sets the acting user
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Result of a committed ledger operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    /// Account state after the operation
    pub account: Account,
    /// Amount the operation was evaluated with (storage scale)
    pub amount: Amount,
    pub service_fee: Amount,
    pub total: Amount,
    pub recharge_principal: Amount,
    pub pending_before: Amount,
    pub reserve_before: Amount,
    /// `reserve_after - reserve_before`
    pub reserve_delta: Amount,
    /// Record appended by the operation, absent for no-op rate updates
    pub record: Option<TransactionRecord>,
}

impl LedgerOutcome {
    fn from_transition(
        account: Account,
        amount: Amount,
        before: Balances,
        transition: Transition,
        record: Option<TransactionRecord>,
    ) -> Self {
        Self {
            reserve_delta: account.reserve - before.reserve,
            account,
            amount,
            service_fee: transition.service_fee,
            total: transition.total,
            recharge_principal: transition.recharge_principal,
            pending_before: before.pending,
            reserve_before: before.reserve,
            record,
        }
    }

    fn unchanged(account: Account, amount: Amount, record: Option<TransactionRecord>) -> Self {
        Self {
            pending_before: account.pending,
            reserve_before: account.reserve,
            account,
            amount,
            service_fee: Amount::ZERO,
            total: Amount::ZERO,
            recharge_principal: Amount::ZERO,
            reserve_delta: Amount::ZERO,
            record,
        }
    }
}

/// The ledger engine
pub struct BillingEngine<S> {
    store: Arc<S>,
    settings: EngineSettings,
}

impl<S> Clone for BillingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: self.settings,
        }
    }
}

impl<S: LedgerStore> BillingEngine<S> {
    /// Creates an engine with default settings
    pub fn new(store: S) -> Self {
        Self::with_settings(store, EngineSettings::default())
    }

    /// Creates an engine with explicit settings
    pub fn with_settings(store: S, settings: EngineSettings) -> Self {
        Self {
            store: Arc::new(store),
            settings,
        }
    }

    /// Returns the backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Adds a debit (or, for a negative amount, a credit) to the chat
    ///
    /// The fee is charged on the principal. Reserve absorbs a debit first;
    /// a credit pays pending down first.
    #[instrument(skip(self, command), fields(chat_id = %command.chat_id, operation = "credit_pending"))]
    pub async fn credit_pending(&self, command: LedgerCommand) -> Result<LedgerOutcome, LedgerError> {
        self.execute(LedgerOperation::CreditPending, command).await
    }

    /// Records a payment against pending; overpayment becomes reserve
    #[instrument(skip(self, command), fields(chat_id = %command.chat_id, operation = "reduce_pending"))]
    pub async fn reduce_pending(&self, command: LedgerCommand) -> Result<LedgerOutcome, LedgerError> {
        self.execute(LedgerOperation::ReducePending, command).await
    }

    /// Deposits into reserve, clearing principal plus fee from pending
    ///
    /// # Errors
    ///
    /// `InsufficientPending` if pending is smaller than principal plus fee.
    #[instrument(skip(self, command), fields(chat_id = %command.chat_id, operation = "deposit_to_reserve"))]
    pub async fn deposit_to_reserve(&self, command: LedgerCommand) -> Result<LedgerOutcome, LedgerError> {
        self.execute(LedgerOperation::DepositToReserve, command).await
    }

    /// Charges usage to reserve; a shortfall is added to pending without fee
    #[instrument(skip(self, command), fields(chat_id = %command.chat_id, operation = "withdraw_from_reserve"))]
    pub async fn withdraw_from_reserve(&self, command: LedgerCommand) -> Result<LedgerOutcome, LedgerError> {
        self.execute(LedgerOperation::WithdrawFromReserve, command).await
    }

    /// Sets the service rate; `command.amount` is the new rate
    ///
    /// Setting the current rate again succeeds without writing a record.
    #[instrument(skip(self, command), fields(chat_id = %command.chat_id, operation = "set_service_rate"))]
    pub async fn set_service_rate(&self, command: LedgerCommand) -> Result<LedgerOutcome, LedgerError> {
        let rate = match operations::validate_rate(command.amount) {
            Ok(rate) => rate,
            Err(error) => {
                warn!(error = %error, "Rejected service rate");
                return Err(error);
            }
        };
        let LedgerCommand {
            chat_id,
            chat_title,
            actor_id,
            ..
        } = command;

        let result = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut account = tx
                        .load_or_create_account(&chat_id, chat_title.as_deref())
                        .await?;
                    let previous = account.service_rate;

                    if previous == rate {
                        // Title refresh or first use still needs to persist
                        tx.save_account(&account).await?;
                        return Ok(LedgerOutcome::unchanged(account, rate, None));
                    }

                    account.set_service_rate(rate);
                    tx.save_account(&account).await?;
                    let record = tx
                        .append_transaction(NewTransactionRecord {
                            account_id: account.id,
                            kind: TransactionType::ServiceRateUpdate,
                            amount: Amount::ZERO,
                            reserve_after: account.reserve,
                            pending_after: account.pending,
                            note: operations::rate_change_note(previous, rate),
                            actor_id,
                        })
                        .await?;

                    Ok::<_, LedgerError>(LedgerOutcome::unchanged(account, rate, Some(record)))
                })
            })
            .await;

        match &result {
            Ok(outcome) if outcome.record.is_some() => {
                info!(rate = %rate.to_percent_string(), "Service rate updated")
            }
            Ok(_) => info!("Service rate unchanged"),
            Err(error) => warn!(error = %error, "Service rate update failed"),
        }
        result
    }

    /// Returns the committed account for a chat
    ///
    /// # Errors
    ///
    /// `AccountNotFound` if the chat never ran an operation.
    #[instrument(skip(self))]
    pub async fn account(&self, chat_id: &str) -> Result<Account, LedgerError> {
        self.store
            .find_account(chat_id)
            .await?
            .ok_or_else(|| LedgerError::account_not_found(chat_id))
    }

    /// Most recent records for a chat, newest first
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        chat_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        let limit = self.settings.history_limit(limit);
        self.store.list_transactions(chat_id, limit).await
    }

    /// Replays recent history and checks it ends at the live balances
    #[instrument(skip(self))]
    pub async fn verify_history(
        &self,
        chat_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ReplayedBalances>, LedgerError> {
        let account = self.account(chat_id).await?;
        let records = self.history(chat_id, limit).await?;
        let timeline = replay::replay(&records)
            .map_err(|error| LedgerError::InconsistentHistory(error.to_string()))?;

        if let Some(last) = timeline.last() {
            if last.balances != account.balances() {
                return Err(LedgerError::InconsistentHistory(format!(
                    "record {} ends at reserve {} / pending {} but account holds {} / {}",
                    last.record_id,
                    last.balances.reserve,
                    last.balances.pending,
                    account.reserve,
                    account.pending
                )));
            }
        }

        Ok(timeline)
    }

    /// Reports the health of the backing store
    pub async fn health(&self) -> HealthCheckResult {
        self.store.health_check().await
    }

    async fn execute(
        &self,
        operation: LedgerOperation,
        command: LedgerCommand,
    ) -> Result<LedgerOutcome, LedgerError> {
        let amount = match operations::validate_principal(operation, command.amount) {
            Ok(amount) => amount,
            Err(error) => {
                warn!(error = %error, "Rejected ledger amount");
                return Err(error);
            }
        };
        let LedgerCommand {
            chat_id,
            chat_title,
            actor_id,
            ..
        } = command;

        let result = self
            .store
            .with_transaction(move |tx| {
                Box::pin(async move {
                    let mut account = tx
                        .load_or_create_account(&chat_id, chat_title.as_deref())
                        .await?;
                    let before = account.balances();
                    let transition = operation.apply(before, account.service_rate, amount)?;

                    account.set_balances(transition.balances);
                    tx.save_account(&account).await?;
                    let record = tx
                        .append_transaction(NewTransactionRecord {
                            account_id: account.id,
                            kind: operation.record_type(),
                            amount,
                            reserve_after: account.reserve,
                            pending_after: account.pending,
                            note: transition.note.clone(),
                            actor_id,
                        })
                        .await?;

                    Ok::<_, LedgerError>(LedgerOutcome::from_transition(
                        account,
                        amount,
                        before,
                        transition,
                        Some(record),
                    ))
                })
            })
            .await;

        match &result {
            Ok(outcome) => info!(
                amount = %outcome.amount,
                reserve_before = %outcome.reserve_before,
                reserve_after = %outcome.account.reserve,
                pending_before = %outcome.pending_before,
                pending_after = %outcome.account.pending,
                "Ledger operation committed"
            ),
            Err(error) => warn!(error = %error, "Ledger operation rolled back"),
        }
        result
    }
}
