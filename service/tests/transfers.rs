// Transfer scenarios driven through the handle workflow with signed
// transactions: custom fees, alias auto-creation, allowances and rollback.

mod fixtures;

use fixtures::*;

use tokenledger_common::config::DEFAULT_FUNDING_ACCOUNT;
use tokenledger_common::error::HandlerError;
use tokenledger_common::ids::NftId;
use tokenledger_common::record::RecordKind;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{CustomFee, CustomFeeKind, FixedFee, FractionalFee, RoyaltyFee};
use tokenledger_common::transaction::{
    AccountAmount, CryptoApproveAllowanceBody, CryptoTransferBody, NftTransfer, TokenAllowance, TokenTransferList,
    TransactionBody,
};

fn fractional(numerator: u64, denominator: u64, collector: u64) -> CustomFee {
    CustomFee {
        fee: CustomFeeKind::Fractional(FractionalFee {
            numerator,
            denominator,
            minimum_amount: 0,
            maximum_amount: 0,
            net_of_transfers: false,
        }),
        fee_collector_account_id: id(collector),
        all_collectors_are_exempt: false,
    }
}

fn royalty_with_fallback(fallback_tinybars: u64, collector: u64) -> CustomFee {
    CustomFee {
        fee: CustomFeeKind::Royalty(RoyaltyFee {
            numerator: 1,
            denominator: 10,
            fallback_fee: Some(FixedFee {
                amount: fallback_tinybars,
                denominating_token_id: None,
            }),
        }),
        fee_collector_account_id: id(collector),
        all_collectors_are_exempt: false,
    }
}

fn hbar_transfer(from: u64, to: u64, amount: i64) -> TransactionBody {
    TransactionBody::CryptoTransfer(CryptoTransferBody {
        transfers: vec![AccountAmount::new(id(from), -amount), AccountAmount::new(id(to), amount)],
        token_transfers: Vec::new(),
    })
}

#[test]
fn test_fractional_fee_is_taken_from_the_receiver() {
    let mut ledger = Ledger::new(&[PAYER, TREASURY, ALICE, BOB, COLLECTOR]);
    let token = ledger.create_fungible(TREASURY, 10_000, vec![fractional(1, 10, COLLECTOR)]);
    assert_eq!(ledger.token_balance(COLLECTOR, token), Some(0));
    ledger.associate(ALICE, &[token]);
    ledger.associate(BOB, &[token]);

    // Treasury debits are exempt
    let funding = ledger.send_tokens(token, TREASURY, ALICE, 1_000);
    assert!(funding.assessed_custom_fees.is_empty());
    assert_eq!(ledger.token_balance(ALICE, token), Some(1_000));

    let record = ledger.send_tokens(token, ALICE, BOB, 100);
    assert_eq!(ledger.token_balance(ALICE, token), Some(900));
    assert_eq!(ledger.token_balance(BOB, token), Some(90));
    assert_eq!(ledger.token_balance(COLLECTOR, token), Some(10));

    assert_eq!(record.assessed_custom_fees.len(), 1);
    let assessed = &record.assessed_custom_fees[0];
    assert_eq!(assessed.token_id, Some(token));
    assert_eq!(assessed.fee_collector_account_id, id(COLLECTOR));
    assert_eq!(assessed.amount, 10);
    assert_eq!(record.token_change(token, id(BOB)), 90);
    assert_eq!(record.token_change(token, id(COLLECTOR)), 10);
    assert_eq!(record.token_change(token, id(ALICE)), -100);
}

#[test]
fn test_royalty_fallback_is_paid_by_the_signing_receiver() {
    let mut ledger = Ledger::new(&[PAYER, TREASURY, ALICE, BOB, COLLECTOR]);
    let token = ledger.create_nft(TREASURY, vec![royalty_with_fallback(500, COLLECTOR)]);
    let serials = ledger.mint_nfts(token, 2);
    assert_eq!(serials, vec![1, 2]);
    ledger.associate(ALICE, &[token]);
    ledger.associate(BOB, &[token]);

    // Leaving the treasury costs nothing; ALICE must sign as a fallback payer
    let sale = TransactionBody::CryptoTransfer(CryptoTransferBody {
        transfers: Vec::new(),
        token_transfers: vec![TokenTransferList::nfts(token, vec![NftTransfer::new(id(TREASURY), id(ALICE), 1)])],
    });
    let record = ledger.submit_ok(PAYER, sale, &[key(TREASURY), key(ALICE)]);
    assert!(record.assessed_custom_fees.is_empty());

    // A gift without the receiver's signature never reaches the handler
    let gift = TransactionBody::CryptoTransfer(CryptoTransferBody {
        transfers: Vec::new(),
        token_transfers: vec![TokenTransferList::nfts(token, vec![NftTransfer::new(id(ALICE), id(BOB), 1)])],
    });
    let status = ledger.submit_status(PAYER, gift.clone(), &[key(ALICE)]);
    assert_eq!(status, ResponseCode::InvalidSignature);
    assert_eq!(ledger.state.nfts.get(&NftId::new(token, 1)).unwrap().owner_id, Some(id(ALICE)));

    let bob_before = ledger.hbar(BOB);
    let collector_before = ledger.hbar(COLLECTOR);
    let record = ledger.submit_ok(PAYER, gift, &[key(ALICE), key(BOB)]);
    assert_eq!(record.assessed_custom_fees.len(), 1);
    assert_eq!(record.assessed_custom_fees[0].token_id, None);
    assert_eq!(record.assessed_custom_fees[0].amount, 500);
    assert_eq!(ledger.hbar(BOB), bob_before - 500);
    assert_eq!(ledger.hbar(COLLECTOR), collector_before + 500);
}

#[test]
fn test_royalty_is_taken_from_the_value_exchanged() {
    let mut ledger = Ledger::new(&[PAYER, TREASURY, ALICE, BOB, COLLECTOR]);
    let token = ledger.create_nft(TREASURY, vec![royalty_with_fallback(500, COLLECTOR)]);
    ledger.mint_nfts(token, 1);
    ledger.associate(ALICE, &[token]);
    ledger.associate(BOB, &[token]);
    ledger.submit_ok(
        PAYER,
        TransactionBody::CryptoTransfer(CryptoTransferBody {
            transfers: Vec::new(),
            token_transfers: vec![TokenTransferList::nfts(token, vec![NftTransfer::new(id(TREASURY), id(ALICE), 1)])],
        }),
        &[key(TREASURY), key(ALICE)],
    );

    // BOB buys the NFT for 10_000 tinybars; ALICE pays a tenth of it
    let alice_before = ledger.hbar(ALICE);
    let collector_before = ledger.hbar(COLLECTOR);
    let trade = TransactionBody::CryptoTransfer(CryptoTransferBody {
        transfers: vec![AccountAmount::new(id(BOB), -10_000), AccountAmount::new(id(ALICE), 10_000)],
        token_transfers: vec![TokenTransferList::nfts(token, vec![NftTransfer::new(id(ALICE), id(BOB), 1)])],
    });
    let record = ledger.submit_ok(PAYER, trade, &[key(ALICE), key(BOB)]);

    assert_eq!(record.assessed_custom_fees.len(), 1);
    assert_eq!(record.assessed_custom_fees[0].amount, 1_000);
    assert_eq!(ledger.hbar(ALICE), alice_before + 9_000);
    assert_eq!(ledger.hbar(COLLECTOR), collector_before + 1_000);
}

#[test]
fn test_unknown_alias_receiver_gets_an_account() {
    let mut ledger = Ledger::new(&[PAYER, ALICE]);
    let (alias, alias_key) = fresh_key_alias(77);
    let body = TransactionBody::CryptoTransfer(CryptoTransferBody {
        transfers: vec![AccountAmount::new(id(ALICE), -5_000), AccountAmount::new(alias.clone(), 5_000)],
        token_transfers: Vec::new(),
    });
    let outcome = ledger.submit(PAYER, body, &[key(ALICE)]).unwrap();

    assert_eq!(outcome.status(), Some(ResponseCode::Success));
    assert_eq!(outcome.records.len(), 2);
    let preceding = &outcome.records[0];
    assert_eq!(preceding.kind, RecordKind::Preceding);
    let created = preceding.created_account_id.expect("no created account");

    let account = ledger.state.accounts.get(&created).unwrap();
    assert_eq!(account.tinybar_balance, 5_000);
    assert_eq!(account.key, Some(alias_key));
    assert_eq!(ledger.state.accounts.get_alias_id(&alias), Some(created));
    assert_eq!(outcome.user_record().unwrap().hbar_change(created), 5_000);

    // The alias now resolves to the same account
    let again = TransactionBody::CryptoTransfer(CryptoTransferBody {
        transfers: vec![AccountAmount::new(id(ALICE), -1_000), AccountAmount::new(alias, 1_000)],
        token_transfers: Vec::new(),
    });
    let outcome = ledger.submit(PAYER, again, &[key(ALICE)]).unwrap();
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(ledger.hbar_of(created), 6_000);
}

#[test]
fn test_spender_moves_tokens_within_allowance() {
    let mut ledger = Ledger::new(&[PAYER, TREASURY, ALICE, BOB, CAROL]);
    let token = ledger.create_fungible(TREASURY, 10_000, Vec::new());
    ledger.associate(ALICE, &[token]);
    ledger.associate(CAROL, &[token]);
    ledger.send_tokens(token, TREASURY, ALICE, 500);

    ledger.submit_ok(
        ALICE,
        TransactionBody::CryptoApproveAllowance(CryptoApproveAllowanceBody {
            token_allowances: vec![TokenAllowance {
                token_id: token,
                owner: None,
                spender: id(BOB),
                amount: 100,
            }],
            ..Default::default()
        }),
        &[],
    );

    // BOB pays and signs; ALICE does not sign the approved debit
    let spend = |amount: i64| {
        TransactionBody::CryptoTransfer(CryptoTransferBody {
            transfers: Vec::new(),
            token_transfers: vec![TokenTransferList::fungible(
                token,
                vec![AccountAmount::approved(id(ALICE), -amount), AccountAmount::new(id(CAROL), amount)],
            )],
        })
    };
    ledger.submit_ok(BOB, spend(60), &[]);
    assert_eq!(ledger.token_balance(ALICE, token), Some(440));
    assert_eq!(ledger.token_balance(CAROL, token), Some(60));
    let remaining = &ledger.state.accounts.get(&id(ALICE)).unwrap().token_allowances;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].amount, 40);

    assert_eq!(ledger.submit_status(BOB, spend(41), &[]), ResponseCode::AmountExceedsAllowance);
    ledger.submit_ok(BOB, spend(40), &[]);
    assert!(ledger.state.accounts.get(&id(ALICE)).unwrap().token_allowances.is_empty());
    assert_eq!(ledger.submit_status(BOB, spend(1), &[]), ResponseCode::SpenderDoesNotHaveAllowance);
}

#[test]
fn test_failed_transfer_keeps_only_the_fee() {
    let mut ledger = Ledger::new(&[PAYER, ALICE, BOB]);
    let funding_before = ledger.hbar_of(DEFAULT_FUNDING_ACCOUNT);

    let outcome = ledger
        .submit(PAYER, hbar_transfer(ALICE, BOB, (INITIAL_BALANCE + 1) as i64), &[key(ALICE)])
        .unwrap();
    let record = outcome.user_record().unwrap();
    assert_eq!(record.status, ResponseCode::InsufficientAccountBalance);
    assert!(record.transaction_fee > 0);

    assert_eq!(ledger.hbar(ALICE), INITIAL_BALANCE);
    assert_eq!(ledger.hbar(BOB), INITIAL_BALANCE);
    assert_eq!(ledger.hbar(PAYER), INITIAL_BALANCE - record.transaction_fee);
    assert_eq!(
        ledger.hbar_of(DEFAULT_FUNDING_ACCOUNT),
        funding_before + record.transaction_fee
    );
    assert_eq!(record.hbar_change(id(PAYER)), -(record.transaction_fee as i64));
}

#[test]
fn test_unsigned_debit_is_charged_but_not_applied() {
    let mut ledger = Ledger::new(&[PAYER, ALICE, BOB]);
    let status = ledger.submit_status(PAYER, hbar_transfer(ALICE, BOB, 1_000), &[]);
    assert_eq!(status, ResponseCode::InvalidSignature);
    assert_eq!(ledger.hbar(ALICE), INITIAL_BALANCE);
    assert!(ledger.hbar(PAYER) < INITIAL_BALANCE);

    // An unknown payer is rejected before any state change
    let err = ledger.submit(9_999, hbar_transfer(ALICE, BOB, 1_000), &[key(ALICE)]).unwrap_err();
    assert_eq!(err, HandlerError::PreCheck(ResponseCode::PayerAccountNotFound));
    assert_eq!(ledger.hbar(ALICE), INITIAL_BALANCE);
}
