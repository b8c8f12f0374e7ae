// Shared fixtures for the workflow scenario tests
//
// A `Ledger` owns a committed state and the handle workflow. Transactions
// are submitted with explicit signers; the payer always signs.

#![allow(dead_code)]

use tokenledger_common::config::{TokenServiceConfig, DEFAULT_FUNDING_ACCOUNT};
use tokenledger_common::error::HandlerResult;
use tokenledger_common::ids::{AccountId, Alias, TokenId, Timestamp};
use tokenledger_common::key::Key;
use tokenledger_common::record::TransactionRecord;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Account, CustomFee, TokenType};
use tokenledger_common::store::{StateSnapshot, TokenServiceState};
use tokenledger_common::transaction::{
    AccountAmount, CryptoTransferBody, NftTransfer, TokenAssociationBody, TokenCreateBody, TokenMintBody,
    TokenTransferList, Transaction, TransactionBody,
};
use tokenledger_service::workflow::{HandleWorkflow, TransactionOutcome};

pub const PAYER: u64 = 1001;
pub const TREASURY: u64 = 1002;
pub const ALICE: u64 = 1003;
pub const BOB: u64 = 1004;
pub const CAROL: u64 = 1005;
pub const COLLECTOR: u64 = 1007;

pub const ADMIN_KEY_SEED: u64 = 200;
pub const SUPPLY_KEY_SEED: u64 = 201;
pub const WIPE_KEY_SEED: u64 = 202;

pub const INITIAL_BALANCE: u64 = 10_000_000_000;
pub const START_SECOND: i64 = 1_700_000_000;

pub fn id(num: u64) -> AccountId {
    AccountId::from_num(num)
}

pub fn key(seed: u64) -> Key {
    Key::Ed25519(vec![(seed % 251) as u8; 32])
}

/// Alias made of an ed25519 key that no account owns yet
pub fn fresh_key_alias(seed: u8) -> (Alias, Key) {
    let bytes = vec![seed; 32];
    (Alias::new(bytes.clone()), Key::Ed25519(bytes))
}

pub struct Ledger {
    pub state: TokenServiceState,
    pub workflow: HandleWorkflow,
    transactions: u32,
}

impl Ledger {
    pub fn new(accounts: &[u64]) -> Self {
        Self::with_config(TokenServiceConfig::default(), accounts)
    }

    pub fn with_config(config: TokenServiceConfig, accounts: &[u64]) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut genesis = StateSnapshot::default();
        genesis.accounts.push(Account::new(DEFAULT_FUNDING_ACCOUNT));
        for num in accounts {
            genesis.accounts.push(
                Account::new(id(*num))
                    .with_key(key(*num))
                    .with_balance(INITIAL_BALANCE),
            );
        }
        Self {
            state: TokenServiceState::from_snapshot(genesis),
            workflow: HandleWorkflow::new(config),
            transactions: 0,
        }
    }

    fn next_time(&mut self) -> Timestamp {
        self.transactions += 1;
        Timestamp::new(START_SECOND, self.transactions)
    }

    /// Submit `body` paid by `payer` and signed by the payer plus `signers`
    pub fn submit(&mut self, payer: u64, body: TransactionBody, signers: &[Key]) -> HandlerResult<TransactionOutcome> {
        let mut transaction = Transaction::new(id(payer), body).signed_by(key(payer));
        for signer in signers {
            transaction = transaction.signed_by(signer.clone());
        }
        let consensus_time = self.next_time();
        self.workflow
            .handle_transaction(&mut self.state, &transaction, consensus_time)
    }

    /// Submit and require success, returning the user record
    pub fn submit_ok(&mut self, payer: u64, body: TransactionBody, signers: &[Key]) -> TransactionRecord {
        let outcome = self.submit(payer, body, signers).expect("pre-check failed");
        let record = outcome.user_record().cloned().expect("no user record");
        assert_eq!(record.status, ResponseCode::Success, "unexpected status");
        record
    }

    /// Submit and return the failing status of the user record
    pub fn submit_status(&mut self, payer: u64, body: TransactionBody, signers: &[Key]) -> ResponseCode {
        let outcome = self.submit(payer, body, signers).expect("pre-check failed");
        outcome.status().expect("no user record")
    }

    pub fn create_token(&mut self, body: TokenCreateBody) -> TokenId {
        let treasury_key = self
            .state
            .accounts
            .get(&body.treasury)
            .and_then(|a| a.key.clone())
            .expect("treasury without key");
        let record = self.submit_ok(
            PAYER,
            TransactionBody::TokenCreate(body),
            &[treasury_key, key(ADMIN_KEY_SEED)],
        );
        record.created_token_id.expect("no created token")
    }

    pub fn create_fungible(&mut self, treasury: u64, supply: u64, custom_fees: Vec<CustomFee>) -> TokenId {
        self.create_token(TokenCreateBody {
            name: "Scenario Dollar".to_string(),
            symbol: "SCD".to_string(),
            decimals: 2,
            initial_supply: supply,
            treasury: id(treasury),
            admin_key: Some(key(ADMIN_KEY_SEED)),
            supply_key: Some(key(SUPPLY_KEY_SEED)),
            custom_fees,
            ..Default::default()
        })
    }

    pub fn create_nft(&mut self, treasury: u64, custom_fees: Vec<CustomFee>) -> TokenId {
        self.create_token(TokenCreateBody {
            name: "Scenario Art".to_string(),
            symbol: "ART".to_string(),
            token_type: TokenType::NonFungibleUnique,
            treasury: id(treasury),
            admin_key: Some(key(ADMIN_KEY_SEED)),
            supply_key: Some(key(SUPPLY_KEY_SEED)),
            custom_fees,
            ..Default::default()
        })
    }

    pub fn mint_nfts(&mut self, token_id: TokenId, count: u8) -> Vec<u64> {
        let record = self.submit_ok(
            PAYER,
            TransactionBody::TokenMint(TokenMintBody {
                token_id,
                amount: 0,
                metadata: (1..=count).map(|n| vec![n]).collect(),
            }),
            &[key(SUPPLY_KEY_SEED)],
        );
        record.serial_numbers
    }

    pub fn associate(&mut self, account: u64, token_ids: &[TokenId]) {
        self.submit_ok(
            PAYER,
            TransactionBody::TokenAssociateToAccount(TokenAssociationBody {
                account_id: id(account),
                token_ids: token_ids.to_vec(),
            }),
            &[key(account)],
        );
    }

    pub fn send_tokens(&mut self, token_id: TokenId, from: u64, to: u64, amount: i64) -> TransactionRecord {
        self.submit_ok(
            PAYER,
            TransactionBody::CryptoTransfer(CryptoTransferBody {
                transfers: Vec::new(),
                token_transfers: vec![TokenTransferList::fungible(
                    token_id,
                    vec![AccountAmount::new(id(from), -amount), AccountAmount::new(id(to), amount)],
                )],
            }),
            &[key(from)],
        )
    }

    pub fn send_nft(&mut self, token_id: TokenId, from: u64, to: u64, serial: i64) -> TransactionRecord {
        self.submit_ok(
            PAYER,
            TransactionBody::CryptoTransfer(CryptoTransferBody {
                transfers: Vec::new(),
                token_transfers: vec![TokenTransferList::nfts(token_id, vec![NftTransfer::new(id(from), id(to), serial)])],
            }),
            &[key(from)],
        )
    }

    pub fn hbar(&self, account: u64) -> u64 {
        self.hbar_of(id(account))
    }

    pub fn hbar_of(&self, account_id: AccountId) -> u64 {
        self.state
            .accounts
            .get(&account_id)
            .map(|a| a.tinybar_balance)
            .unwrap_or(0)
    }

    pub fn token_balance(&self, account: u64, token_id: TokenId) -> Option<u64> {
        self.state
            .token_relations
            .get(&id(account), &token_id)
            .map(|rel| rel.balance)
    }
}
