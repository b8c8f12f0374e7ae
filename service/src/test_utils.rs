// Shared fixtures for the unit tests of this crate

use std::collections::BTreeSet;

use tokenledger_common::config::{TokenServiceConfig, DEFAULT_FUNDING_ACCOUNT};
use tokenledger_common::error::HandlerResult;
use tokenledger_common::ids::{AccountId, NftId, TokenId, Timestamp};
use tokenledger_common::key::Key;
use tokenledger_common::record::RecordKind;
use tokenledger_common::state::{Account, Nft, Token, TokenRelation, TokenType};
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::TransactionBody;

use crate::context::{DispatchOutput, HandleContext};
use crate::handlers::TransactionHandlers;
use crate::ledger::nft_chain::link_owned_nft;
use crate::ledger::token_rels::{create_and_link_token_rels, NewRelation};
use crate::ledger::update_positive_balances;

pub const PAYER: u64 = 1001;
pub const TREASURY: u64 = 1002;
pub const ALICE: u64 = 1003;
pub const BOB: u64 = 1004;
pub const CAROL: u64 = 1005;
pub const DAVE: u64 = 1006;
pub const COLLECTOR: u64 = 1007;

pub const TOKEN: u64 = 2001;
pub const NFT_TOKEN: u64 = 2002;
pub const FEE_TOKEN: u64 = 2003;

pub const INITIAL_BALANCE: u64 = 10_000_000_000;
pub const CONSENSUS_TIME: Timestamp = Timestamp::from_seconds(1_700_000_000);

pub fn id(num: u64) -> AccountId {
    AccountId::from_num(num)
}

pub fn tid(num: u64) -> TokenId {
    TokenId::from_num(num)
}

pub fn nft_id(token: u64, serial: u64) -> NftId {
    NftId::new(tid(token), serial)
}

pub fn key(seed: u64) -> Key {
    Key::Ed25519(vec![(seed % 251) as u8; 32])
}

pub fn account(num: u64) -> Account {
    Account::new(id(num))
        .with_key(key(num))
        .with_balance(INITIAL_BALANCE)
}

/// Committed state holding the funding account and the given accounts
pub fn state_with_accounts(nums: &[u64]) -> TokenServiceState {
    let mut state = TokenServiceState::default();
    state
        .accounts
        .put(Account::new(DEFAULT_FUNDING_ACCOUNT));
    for num in nums {
        state.accounts.put(account(*num));
    }
    state.commit();
    state
}

pub fn fungible_token(num: u64, treasury: u64) -> Token {
    Token {
        token_id: tid(num),
        token_type: TokenType::FungibleCommon,
        name: "Fungible".to_string(),
        symbol: "FUN".to_string(),
        decimals: 2,
        treasury_account_id: id(treasury),
        admin_key: Some(key(200)),
        supply_key: Some(key(201)),
        wipe_key: Some(key(202)),
        ..Default::default()
    }
}

pub fn nft_token(num: u64, treasury: u64) -> Token {
    Token {
        token_type: TokenType::NonFungibleUnique,
        name: "Unique".to_string(),
        symbol: "UNQ".to_string(),
        decimals: 0,
        ..fungible_token(num, treasury)
    }
}

pub fn relation(account: u64, token: u64, balance: u64) -> TokenRelation {
    TokenRelation {
        account_id: id(account),
        token_id: tid(token),
        balance,
        kyc_granted: true,
        ..Default::default()
    }
}

/// Link a relation for `account` and give it `balance`
pub fn associate(state: &mut TokenServiceState, account: u64, token: u64, balance: u64) {
    let new = NewRelation {
        token_id: tid(token),
        frozen: false,
        kyc_granted: true,
        automatic_association: false,
    };
    let mut rel = create_and_link_token_rels(state, id(account), &[new])
        .unwrap()
        .remove(0);
    let mut holder = state.accounts.get(&id(account)).cloned().unwrap();
    update_positive_balances(&mut holder, 0, balance);
    rel.balance = balance;
    state.accounts.put(holder);
    state.token_relations.put(rel);
}

/// Put a token whose treasury holds its whole supply
pub fn create_token(state: &mut TokenServiceState, mut token: Token, supply: u64) {
    token.total_supply = supply;
    let treasury = token.treasury_account_id;
    let mut treasury_account = state.accounts.get(&treasury).cloned().unwrap();
    treasury_account.number_treasury_titles += 1;
    state.accounts.put(treasury_account);
    let token_num = token.token_id.num;
    state.tokens.put(token);
    associate(state, treasury.num, token_num, if supply > 0 { supply } else { 0 });
}

/// Mint serials `1..=count` of an NFT token into its treasury
pub fn mint_nfts(state: &mut TokenServiceState, token: u64, count: u64) {
    let mut token = state.tokens.get(&tid(token)).cloned().unwrap();
    let treasury = token.treasury_account_id;
    let mut treasury_account = state.accounts.get(&treasury).cloned().unwrap();
    for serial in token.last_used_serial_number + 1..=token.last_used_serial_number + count {
        let mut nft = Nft {
            nft_id: NftId::new(token.token_id, serial),
            metadata: vec![serial as u8],
            mint_time: Some(CONSENSUS_TIME),
            ..Default::default()
        };
        link_owned_nft(state, &mut treasury_account, &mut nft);
        state.nfts.put(nft);
    }
    let mut rel = state
        .token_relations
        .get(&treasury, &token.token_id)
        .cloned()
        .unwrap();
    update_positive_balances(&mut treasury_account, rel.balance, rel.balance + count);
    rel.balance += count;
    treasury_account.number_owned_nfts += count;
    token.total_supply += count;
    token.last_used_serial_number += count;
    state.token_relations.put(rel);
    state.accounts.put(treasury_account);
    state.tokens.put(token);
}

/// Run pure checks and handle of one body directly, without the workflow
pub fn run_handler(
    state: &mut TokenServiceState,
    config: &TokenServiceConfig,
    payer: u64,
    body: TransactionBody,
) -> HandlerResult<DispatchOutput> {
    let handlers = TransactionHandlers::new();
    let handler = handlers.handler_for(body.functionality());
    handler.pure_checks(&body)?;
    let signatories = BTreeSet::new();
    let mut ctx = HandleContext::new(
        state,
        config,
        &handlers,
        id(payer),
        CONSENSUS_TIME,
        &body,
        &signatories,
        RecordKind::User,
    );
    handler.handle(&mut ctx)?;
    Ok(ctx.into_output())
}
