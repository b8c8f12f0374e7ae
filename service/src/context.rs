// Handler contexts
// PreHandleContext is read-only and collects the keys a transaction must
// be signed with. HandleContext owns the mutable state borrow for one
// transaction, its record, and the records of dispatched children.

use log::debug;
use std::collections::BTreeSet;

use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::error::{HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, AccountRef, Timestamp};
use tokenledger_common::key::Key;
use tokenledger_common::record::{RecordKind, TransactionRecord};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::TransactionBody;

use crate::finalize::RecordFinalizer;
use crate::handlers::TransactionHandlers;

// ========================================
// Pre-handle
// ========================================

pub struct PreHandleContext<'a> {
    state: &'a TokenServiceState,
    config: &'a TokenServiceConfig,
    payer: AccountId,
    body: &'a TransactionBody,
    required_keys: Vec<Key>,
}

impl<'a> PreHandleContext<'a> {
    pub fn new(
        state: &'a TokenServiceState,
        config: &'a TokenServiceConfig,
        payer: AccountId,
        body: &'a TransactionBody,
    ) -> Self {
        Self {
            state,
            config,
            payer,
            body,
            required_keys: Vec::new(),
        }
    }

    pub fn state(&self) -> &'a TokenServiceState {
        self.state
    }

    pub fn config(&self) -> &'a TokenServiceConfig {
        self.config
    }

    pub fn payer(&self) -> AccountId {
        self.payer
    }

    pub fn body(&self) -> &'a TransactionBody {
        self.body
    }

    pub fn require_key(&mut self, key: &Key) {
        if !self.required_keys.contains(key) {
            self.required_keys.push(key.clone());
        }
    }

    /// Require an optional entity key, failing with `code` when it is absent
    pub fn require_key_or(&mut self, key: Option<&Key>, code: ResponseCode) -> HandlerResult<()> {
        let key = key.ok_or(HandlerError::PreCheck(code))?;
        self.require_key(key);
        Ok(())
    }

    /// Require the key of an existing account
    pub fn require_account_key(&mut self, account_id: &AccountId, missing_code: ResponseCode) -> HandlerResult<()> {
        let account = self
            .state
            .accounts
            .get(account_id)
            .ok_or(HandlerError::PreCheck(missing_code))?;
        if account.deleted {
            return Err(HandlerError::PreCheck(ResponseCode::AccountDeleted));
        }
        let key = account
            .key
            .as_ref()
            .ok_or(HandlerError::PreCheck(ResponseCode::InvalidSignature))?;
        self.require_key(key);
        Ok(())
    }

    pub fn require_account_key_by_ref(&mut self, account: &AccountRef, missing_code: ResponseCode) -> HandlerResult<()> {
        let account_id = self
            .state
            .accounts
            .resolve(account)
            .ok_or(HandlerError::PreCheck(missing_code))?;
        self.require_account_key(&account_id, missing_code)
    }

    /// Receivers that opted into signing credits; unknown receivers need nothing
    pub fn require_receiver_signature(&mut self, account: &AccountRef) {
        let key = self
            .state
            .accounts
            .get_by_ref(account)
            .filter(|a| a.receiver_sig_required)
            .and_then(|a| a.key.clone());
        if let Some(key) = key {
            self.require_key(&key);
        }
    }

    pub fn into_required_keys(self) -> Vec<Key> {
        self.required_keys
    }
}

// ========================================
// Warm-up
// ========================================

pub struct WarmupContext<'a> {
    state: &'a TokenServiceState,
    body: &'a TransactionBody,
}

impl<'a> WarmupContext<'a> {
    pub fn new(state: &'a TokenServiceState, body: &'a TransactionBody) -> Self {
        Self { state, body }
    }

    pub fn state(&self) -> &'a TokenServiceState {
        self.state
    }

    pub fn body(&self) -> &'a TransactionBody {
        self.body
    }
}

// ========================================
// Handle
// ========================================

/// Records left behind by one handled transaction
#[derive(Debug, Clone)]
pub struct DispatchOutput {
    pub record: TransactionRecord,
    pub preceding_records: Vec<TransactionRecord>,
    pub child_records: Vec<TransactionRecord>,
}

pub struct HandleContext<'a> {
    state: &'a mut TokenServiceState,
    config: &'a TokenServiceConfig,
    handlers: &'a TransactionHandlers,
    payer: AccountId,
    consensus_time: Timestamp,
    body: &'a TransactionBody,
    signatories: &'a BTreeSet<Key>,
    record: TransactionRecord,
    preceding_records: Vec<TransactionRecord>,
    child_records: Vec<TransactionRecord>,
}

impl<'a> HandleContext<'a> {
    pub fn new(
        state: &'a mut TokenServiceState,
        config: &'a TokenServiceConfig,
        handlers: &'a TransactionHandlers,
        payer: AccountId,
        consensus_time: Timestamp,
        body: &'a TransactionBody,
        signatories: &'a BTreeSet<Key>,
        kind: RecordKind,
    ) -> Self {
        Self {
            state,
            config,
            handlers,
            payer,
            consensus_time,
            body,
            signatories,
            record: TransactionRecord::new(kind, payer, consensus_time),
            preceding_records: Vec::new(),
            child_records: Vec::new(),
        }
    }

    pub fn state(&self) -> &TokenServiceState {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut TokenServiceState {
        &mut *self.state
    }

    pub fn config(&self) -> &'a TokenServiceConfig {
        self.config
    }

    pub fn payer(&self) -> AccountId {
        self.payer
    }

    pub fn consensus_time(&self) -> Timestamp {
        self.consensus_time
    }

    pub fn body(&self) -> &'a TransactionBody {
        self.body
    }

    pub fn signatories(&self) -> &'a BTreeSet<Key> {
        self.signatories
    }

    pub fn record(&self) -> &TransactionRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut TransactionRecord {
        &mut self.record
    }

    /// Dispatch a child whose record precedes this transaction's record
    pub fn dispatch_preceding(&mut self, body: TransactionBody) -> HandlerResult<TransactionRecord> {
        self.dispatch(body, RecordKind::Preceding)
    }

    /// Dispatch a child whose record follows this transaction's record
    pub fn dispatch_child(&mut self, body: TransactionBody) -> HandlerResult<TransactionRecord> {
        self.dispatch(body, RecordKind::Child)
    }

    fn dispatch(&mut self, body: TransactionBody, kind: RecordKind) -> HandlerResult<TransactionRecord> {
        let functionality = body.functionality();
        let handlers = self.handlers;
        let handler = handlers.handler_for(functionality);
        handler.pure_checks(&body).map_err(HandlerError::into_handle)?;

        let savepoint = self.state.savepoint();
        let (result, output) = {
            let mut child = HandleContext::new(
                &mut *self.state,
                self.config,
                handlers,
                self.payer,
                self.consensus_time,
                &body,
                self.signatories,
                kind,
            );
            let result = handler.handle(&mut child);
            (result, child.into_output())
        };

        if let Err(err) = result {
            if log::log_enabled!(log::Level::Debug) {
                debug!("Dispatched {} failed with {}", functionality, err.code());
            }
            self.state.rollback_to(savepoint);
            return Err(err.into_handle());
        }

        let DispatchOutput {
            mut record,
            preceding_records,
            child_records,
        } = output;
        record.status = ResponseCode::Success;
        let nested: Vec<TransactionRecord> = preceding_records
            .iter()
            .chain(child_records.iter())
            .cloned()
            .collect();
        RecordFinalizer::new(&self.config.records).finalize_child_record(
            &*self.state,
            &savepoint,
            &mut record,
            &nested,
        )?;

        let target = match kind {
            RecordKind::Preceding => &mut self.preceding_records,
            _ => &mut self.child_records,
        };
        target.extend(preceding_records);
        target.push(record.clone());
        target.extend(child_records);
        Ok(record)
    }

    pub fn into_output(self) -> DispatchOutput {
        DispatchOutput {
            record: self.record,
            preceding_records: self.preceding_records,
            child_records: self.child_records,
        }
    }
}
