//! Property-based tests over random transaction sequences
//!
//! Properties checked after every transaction, whatever its outcome:
//! - Fungible supply equals the sum of relation balances
//! - NFT supply equals the live serials and the sum of relation balances
//! - Owned NFT chains are acyclic and as long as the owned counts
//! - Positive balance counters match the relations
//! - Association counters match the linked relation chains
//! - Hbar is conserved across fees and transfers

mod fixtures;

use std::collections::BTreeSet;

use fixtures::*;
use proptest::prelude::*;

use tokenledger_common::ids::TokenId;
use tokenledger_common::state::TokenType;
use tokenledger_common::transaction::{
    AccountAmount, CryptoTransferBody, NftTransfer, TokenAssociationBody, TokenBurnBody, TokenCreateBody,
    TokenMintBody, TokenTransferList, TokenWipeBody, TransactionBody,
};

const HOLDERS: [u64; 4] = [TREASURY, ALICE, BOB, CAROL];
const GENESIS: [u64; 5] = [PAYER, TREASURY, ALICE, BOB, CAROL];

#[derive(Debug, Clone, Copy)]
struct Tokens {
    fungible: TokenId,
    nft: TokenId,
}

impl Tokens {
    fn pick(&self, nft: bool) -> TokenId {
        if nft {
            self.nft
        } else {
            self.fungible
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    TokenTransfer { from: usize, to: usize, amount: i64 },
    HbarTransfer { from: usize, to: usize, amount: i64 },
    Mint(i64),
    Burn(i64),
    NftMint(u8),
    NftBurn(i64),
    NftWipe { holder: usize, serial: i64 },
    NftTransfer { from: usize, to: usize, serial: i64 },
    Associate { holder: usize, nft: bool },
    Dissociate { holder: usize, nft: bool },
}

impl Op {
    /// Signers beyond the payer, as key seeds
    fn signers(&self) -> Vec<u64> {
        match *self {
            Op::TokenTransfer { from, .. } | Op::HbarTransfer { from, .. } | Op::NftTransfer { from, .. } => {
                vec![HOLDERS[from]]
            }
            Op::Mint(_) | Op::Burn(_) | Op::NftMint(_) | Op::NftBurn(_) => vec![SUPPLY_KEY_SEED],
            Op::NftWipe { .. } => vec![WIPE_KEY_SEED],
            Op::Associate { holder, .. } | Op::Dissociate { holder, .. } => vec![HOLDERS[holder]],
        }
    }
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..HOLDERS.len(), 0..HOLDERS.len(), 1i64..2_000)
            .prop_map(|(from, to, amount)| Op::TokenTransfer { from, to, amount }),
        2 => (0..HOLDERS.len(), 0..HOLDERS.len(), 1i64..1_000_000)
            .prop_map(|(from, to, amount)| Op::HbarTransfer { from, to, amount }),
        1 => (1i64..5_000).prop_map(Op::Mint),
        1 => (1i64..5_000).prop_map(Op::Burn),
        2 => (1u8..4).prop_map(Op::NftMint),
        1 => (1i64..12).prop_map(Op::NftBurn),
        1 => (1..HOLDERS.len(), 1i64..12).prop_map(|(holder, serial)| Op::NftWipe { holder, serial }),
        4 => (0..HOLDERS.len(), 0..HOLDERS.len(), 1i64..12)
            .prop_map(|(from, to, serial)| Op::NftTransfer { from, to, serial }),
        2 => (1..HOLDERS.len(), any::<bool>()).prop_map(|(holder, nft)| Op::Associate { holder, nft }),
        1 => (1..HOLDERS.len(), any::<bool>()).prop_map(|(holder, nft)| Op::Dissociate { holder, nft }),
    ]
}

fn body_for(op: &Op, tokens: Tokens) -> TransactionBody {
    match *op {
        Op::TokenTransfer { from, to, amount } => TransactionBody::CryptoTransfer(CryptoTransferBody {
            transfers: Vec::new(),
            token_transfers: vec![TokenTransferList::fungible(
                tokens.fungible,
                vec![
                    AccountAmount::new(id(HOLDERS[from]), -amount),
                    AccountAmount::new(id(HOLDERS[to]), amount),
                ],
            )],
        }),
        Op::HbarTransfer { from, to, amount } => TransactionBody::CryptoTransfer(CryptoTransferBody {
            transfers: vec![
                AccountAmount::new(id(HOLDERS[from]), -amount),
                AccountAmount::new(id(HOLDERS[to]), amount),
            ],
            token_transfers: Vec::new(),
        }),
        Op::Mint(amount) => TransactionBody::TokenMint(TokenMintBody {
            token_id: tokens.fungible,
            amount,
            metadata: Vec::new(),
        }),
        Op::Burn(amount) => TransactionBody::TokenBurn(TokenBurnBody {
            token_id: tokens.fungible,
            amount,
            serial_numbers: Vec::new(),
        }),
        Op::NftMint(count) => TransactionBody::TokenMint(TokenMintBody {
            token_id: tokens.nft,
            amount: 0,
            metadata: (1..=count).map(|n| vec![n]).collect(),
        }),
        Op::NftBurn(serial) => TransactionBody::TokenBurn(TokenBurnBody {
            token_id: tokens.nft,
            amount: 0,
            serial_numbers: vec![serial],
        }),
        Op::NftWipe { holder, serial } => TransactionBody::TokenAccountWipe(TokenWipeBody {
            token_id: tokens.nft,
            account_id: id(HOLDERS[holder]),
            amount: 0,
            serial_numbers: vec![serial],
        }),
        Op::NftTransfer { from, to, serial } => TransactionBody::CryptoTransfer(CryptoTransferBody {
            transfers: Vec::new(),
            token_transfers: vec![TokenTransferList::nfts(
                tokens.nft,
                vec![NftTransfer::new(id(HOLDERS[from]), id(HOLDERS[to]), serial)],
            )],
        }),
        Op::Associate { holder, nft } => TransactionBody::TokenAssociateToAccount(TokenAssociationBody {
            account_id: id(HOLDERS[holder]),
            token_ids: vec![tokens.pick(nft)],
        }),
        Op::Dissociate { holder, nft } => TransactionBody::TokenDissociateFromAccount(TokenAssociationBody {
            account_id: id(HOLDERS[holder]),
            token_ids: vec![tokens.pick(nft)],
        }),
    }
}

fn held(ledger: &Ledger, token_id: TokenId) -> u64 {
    ledger
        .state
        .token_relations
        .iter()
        .filter(|rel| rel.token_id == token_id)
        .map(|rel| rel.balance)
        .sum()
}

fn check_invariants(ledger: &Ledger, tokens: Tokens) -> Result<(), TestCaseError> {
    let state = &ledger.state;

    // Fungible supply
    let fungible = state.tokens.get(&tokens.fungible).expect("fungible token missing");
    prop_assert_eq!(fungible.total_supply, held(ledger, tokens.fungible));

    // NFT supply
    let nft_token = state.tokens.get(&tokens.nft).expect("nft token missing");
    let live = state.nfts.iter().filter(|nft| nft.nft_id.token_id == tokens.nft).count() as u64;
    prop_assert_eq!(nft_token.total_supply, live);
    prop_assert_eq!(nft_token.total_supply, held(ledger, tokens.nft));

    // Counters and chains
    for account in state.accounts.iter() {
        let relations: Vec<_> = state
            .token_relations
            .iter()
            .filter(|rel| rel.account_id == account.account_id)
            .collect();
        let positive = relations.iter().filter(|rel| rel.balance > 0).count() as u64;
        prop_assert_eq!(account.number_positive_balances, positive);
        prop_assert_eq!(account.number_associations, relations.len() as u64);

        let mut chain_len = 0usize;
        let mut cursor = account.head_token_id;
        while let Some(current) = cursor {
            prop_assert!(chain_len <= relations.len(), "relation chain of {} loops", account.account_id);
            let rel = state.token_relations.get(&account.account_id, &current);
            prop_assert!(rel.is_some(), "chain of {} points at a missing relation", account.account_id);
            chain_len += 1;
            cursor = rel.and_then(|rel| rel.next_token);
        }
        prop_assert_eq!(chain_len, relations.len());

        let mut seen = BTreeSet::new();
        let mut cursor = account.head_nft_id;
        while let Some(current) = cursor {
            prop_assert!(seen.insert(current), "owned NFT chain of {} loops", account.account_id);
            let nft = state.nfts.get(&current);
            prop_assert!(nft.is_some(), "chain of {} points at a burned NFT", account.account_id);
            let nft = nft.expect("checked above");
            let treasury = state
                .tokens
                .get(&current.token_id)
                .map(|token| token.treasury_account_id)
                .expect("token of a live NFT");
            prop_assert_eq!(nft.owner_or(treasury), account.account_id);
            cursor = nft.owner_next_nft_id;
        }
        prop_assert_eq!(seen.len() as u64, account.number_owned_nfts);
    }

    // Hbar
    let total: u64 = state.accounts.iter().map(|a| a.tinybar_balance).sum();
    prop_assert_eq!(total, INITIAL_BALANCE * GENESIS.len() as u64);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_ledger_invariants_hold(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut ledger = Ledger::new(&GENESIS);
        let fungible = ledger.create_fungible(TREASURY, 10_000, Vec::new());
        let nft = ledger.create_token(TokenCreateBody {
            name: "Scenario Art".to_string(),
            symbol: "ART".to_string(),
            token_type: TokenType::NonFungibleUnique,
            treasury: id(TREASURY),
            admin_key: Some(key(ADMIN_KEY_SEED)),
            supply_key: Some(key(SUPPLY_KEY_SEED)),
            wipe_key: Some(key(WIPE_KEY_SEED)),
            ..Default::default()
        });
        let tokens = Tokens { fungible, nft };
        ledger.mint_nfts(nft, 3);
        check_invariants(&ledger, tokens)?;

        for op in &ops {
            let keys: Vec<_> = op.signers().into_iter().map(key).collect();
            // Pre-check failures and failed records are both fine here
            let _ = ledger.submit(PAYER, body_for(op, tokens), &keys);
            check_invariants(&ledger, tokens)?;
        }
    }
}
