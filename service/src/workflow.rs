// Handle workflow
// Runs one ordered transaction end to end: payer and signature checks,
// fee charging, the handler against a savepoint, record finalization and
// commit. A failing handler keeps the fee and loses everything else.

use log::{debug, warn};

use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::error::{HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, Timestamp};
use tokenledger_common::record::{RecordKind, TransactionRecord};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::store::{StateSavepoint, TokenServiceState};
use tokenledger_common::transaction::{Functionality, Transaction};

use crate::context::{DispatchOutput, HandleContext, PreHandleContext, WarmupContext};
use crate::fees::{FeeContext, Fees};
use crate::finalize::RecordFinalizer;
use crate::handlers::TransactionHandlers;

/// Records produced by one transaction: preceding, user, then children
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub records: Vec<TransactionRecord>,
}

impl TransactionOutcome {
    /// The record of the user transaction itself
    pub fn user_record(&self) -> Option<&TransactionRecord> {
        self.records.iter().find(|r| r.kind == RecordKind::User)
    }

    pub fn status(&self) -> Option<ResponseCode> {
        self.user_record().map(|r| r.status)
    }
}

pub struct HandleWorkflow {
    config: TokenServiceConfig,
    handlers: TransactionHandlers,
}

impl HandleWorkflow {
    pub fn new(config: TokenServiceConfig) -> Self {
        Self {
            config,
            handlers: TransactionHandlers::new(),
        }
    }

    pub fn config(&self) -> &TokenServiceConfig {
        &self.config
    }

    /// Handle one transaction at `consensus_time`
    ///
    /// A pre-check failure returns `Err` and leaves state untouched. A
    /// handler failure is reported in the returned record; the fee stays
    /// charged. An `Err` with a handle code means finalization found the
    /// state inconsistent and the whole transaction was rolled back.
    pub fn handle_transaction(
        &self,
        state: &mut TokenServiceState,
        transaction: &Transaction,
        consensus_time: Timestamp,
    ) -> HandlerResult<TransactionOutcome> {
        let functionality = transaction.body.functionality();
        let result = self.run(state, transaction, consensus_time, functionality);
        match &result {
            Ok(outcome) => {
                let status: &'static str = outcome.status().unwrap_or(ResponseCode::FailInvalid).into();
                metrics::counter!(
                    "tokenledger_transactions_total",
                    "functionality" => <&'static str>::from(functionality),
                    "status" => status
                )
                .increment(1);
            }
            Err(err) if err.is_pre_check() => {
                metrics::counter!(
                    "tokenledger_precheck_failures_total",
                    "functionality" => <&'static str>::from(functionality)
                )
                .increment(1);
            }
            Err(err) => {
                let status: &'static str = err.code().into();
                metrics::counter!(
                    "tokenledger_transactions_total",
                    "functionality" => <&'static str>::from(functionality),
                    "status" => status
                )
                .increment(1);
            }
        }
        result
    }

    fn run(
        &self,
        state: &mut TokenServiceState,
        transaction: &Transaction,
        consensus_time: Timestamp,
        functionality: Functionality,
    ) -> HandlerResult<TransactionOutcome> {
        let payer = transaction.payer;
        let handler = self.handlers.handler_for(functionality);

        // Step 1: Payer
        let payer_key = match state.accounts.get(&payer) {
            None => return Err(HandlerError::PreCheck(ResponseCode::PayerAccountNotFound)),
            Some(account) if account.deleted => return Err(HandlerError::PreCheck(ResponseCode::AccountDeleted)),
            Some(account) => account.key.clone(),
        };

        // Step 2: Body alone
        handler.pure_checks(&transaction.body).map_err(|err| {
            if log::log_enabled!(log::Level::Debug) {
                debug!("Pure checks of {} failed with {}", functionality, err.code());
            }
            HandlerError::PreCheck(err.code())
        })?;

        // Step 3: Required keys
        let required_keys = {
            let mut ctx = PreHandleContext::new(state, &self.config, payer, &transaction.body);
            handler
                .pre_handle(&mut ctx)
                .map_err(|err| HandlerError::PreCheck(err.code()))?;
            ctx.into_required_keys()
        };
        let payer_signed = payer_key
            .as_ref()
            .is_some_and(|key| key.is_satisfied_by(&transaction.signatories));
        if !payer_signed {
            return Err(HandlerError::PreCheck(ResponseCode::InvalidSignature));
        }
        handler.warm(&WarmupContext::new(state, &transaction.body));

        let start = state.savepoint();
        let mut record = TransactionRecord::new(RecordKind::User, payer, consensus_time);

        // Step 4: Fees
        let fees = handler.calculate_fees(&FeeContext::new(state, &self.config, &transaction.body, payer));
        record.transaction_fee = fees.total();
        if let Err(code) = self.charge_fees(state, payer, fees) {
            record.transaction_fee = 0;
            record.status = code;
            return self.finish(state, &start, record, Vec::new(), Vec::new());
        }

        // Step 5: Other signatures
        let missing_signature = required_keys
            .iter()
            .any(|key| !key.is_satisfied_by(&transaction.signatories));
        if missing_signature {
            record.status = ResponseCode::InvalidSignature;
            return self.finish(state, &start, record, Vec::new(), Vec::new());
        }

        // Step 6: Handle
        let handle_savepoint = state.savepoint();
        let (result, output) = {
            let mut ctx = HandleContext::new(
                state,
                &self.config,
                &self.handlers,
                payer,
                consensus_time,
                &transaction.body,
                &transaction.signatories,
                RecordKind::User,
            );
            let result = handler.handle(&mut ctx);
            (result, ctx.into_output())
        };
        let DispatchOutput {
            record: handled,
            preceding_records,
            child_records,
        } = output;

        match result {
            Ok(()) => {
                let mut handled = handled;
                handled.status = ResponseCode::Success;
                handled.transaction_fee = record.transaction_fee;
                self.finish(state, &start, handled, preceding_records, child_records)
            }
            Err(err) => {
                if log::log_enabled!(log::Level::Debug) {
                    debug!("{} paid by {} failed with {}", functionality, payer, err.code());
                }
                state.rollback_to(handle_savepoint);
                record.status = err.code();
                self.finish(state, &start, record, Vec::new(), Vec::new())
            }
        }
    }

    fn charge_fees(&self, state: &mut TokenServiceState, payer: AccountId, fees: Fees) -> Result<(), ResponseCode> {
        let total = fees.total();
        if total == 0 {
            return Ok(());
        }
        let funding = self.config.ledger.funding_account;
        let mut payer_account = state
            .accounts
            .get(&payer)
            .cloned()
            .ok_or(ResponseCode::PayerAccountNotFound)?;
        if payer_account.tinybar_balance < total {
            return Err(ResponseCode::InsufficientPayerBalance);
        }
        if payer == funding {
            return Ok(());
        }
        let mut funding_account = state
            .accounts
            .get(&funding)
            .cloned()
            .ok_or(ResponseCode::FailInvalid)?;
        payer_account.tinybar_balance -= total;
        funding_account.tinybar_balance = funding_account.tinybar_balance.saturating_add(total);
        state.accounts.put(payer_account);
        state.accounts.put(funding_account);
        Ok(())
    }

    /// Step 7 and 8: finalize the user record against the transaction start, then commit
    fn finish(
        &self,
        state: &mut TokenServiceState,
        start: &StateSavepoint,
        mut record: TransactionRecord,
        preceding: Vec<TransactionRecord>,
        children: Vec<TransactionRecord>,
    ) -> HandlerResult<TransactionOutcome> {
        let nested: Vec<TransactionRecord> = preceding.iter().chain(children.iter()).cloned().collect();
        if let Err(err) =
            RecordFinalizer::new(&self.config.records).finalize_parent_record(state, start, &mut record, &nested)
        {
            warn!("Finalizing the record of {} failed with {}, rolling back", record.payer, err.code());
            state.rollback_to(start.clone());
            return Err(err.into_handle());
        }
        state.commit();

        let mut records = preceding;
        records.push(record);
        records.extend(children);
        Ok(TransactionOutcome { records })
    }
}
