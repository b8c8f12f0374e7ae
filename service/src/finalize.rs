// Record finalization
// A record's transfer lists are derived from what actually changed in
// state since the transaction (or dispatched child) started, not from
// what the body asked for. Changes already reported by nested records
// are deducted so every movement appears in exactly one record.

use log::error;
use std::collections::BTreeMap;

use tokenledger_common::config::RecordsConfig;
use tokenledger_common::error::{HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, TokenId};
use tokenledger_common::record::{AccountAdjustment, NftOwnerChange, TokenTransferRecord, TransactionRecord};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Account, Token};
use tokenledger_common::store::{StateSavepoint, TokenServiceState};

type FungibleChanges = BTreeMap<TokenId, BTreeMap<AccountId, i64>>;
type NftChanges = BTreeMap<TokenId, BTreeMap<u64, NftOwnerChange>>;

/// Net state changes since a savepoint
#[derive(Debug, Default)]
struct StateChanges {
    hbar: BTreeMap<AccountId, i64>,
    fungible: FungibleChanges,
    nfts: NftChanges,
}

pub struct RecordFinalizer {
    require_zero_parent_token_changes: bool,
}

impl RecordFinalizer {
    pub fn new(config: &RecordsConfig) -> Self {
        Self {
            require_zero_parent_token_changes: config.require_zero_parent_token_changes,
        }
    }

    /// Fill the transfer lists of a dispatched child's record
    pub fn finalize_child_record(
        &self,
        state: &TokenServiceState,
        savepoint: &StateSavepoint,
        record: &mut TransactionRecord,
        nested: &[TransactionRecord],
    ) -> HandlerResult<()> {
        let changes = self.changes_with_nested_deducted(state, savepoint, nested)?;
        write_changes(record, changes);
        Ok(())
    }

    /// Fill the transfer lists of a user transaction's record
    pub fn finalize_parent_record(
        &self,
        state: &TokenServiceState,
        savepoint: &StateSavepoint,
        record: &mut TransactionRecord,
        nested: &[TransactionRecord],
    ) -> HandlerResult<()> {
        let changes = self.changes_with_nested_deducted(state, savepoint, nested)?;
        if self.require_zero_parent_token_changes
            && !nested.is_empty()
            && (!changes.fungible.is_empty() || !changes.nfts.is_empty())
        {
            error!(
                "Parent record still has token changes after deducting {} nested records: {:?} {:?}",
                nested.len(),
                changes.fungible,
                changes.nfts
            );
            return Err(HandlerError::Handle(ResponseCode::FailInvalid));
        }
        write_changes(record, changes);
        Ok(())
    }

    fn changes_with_nested_deducted(
        &self,
        state: &TokenServiceState,
        savepoint: &StateSavepoint,
        nested: &[TransactionRecord],
    ) -> HandlerResult<StateChanges> {
        let mut changes = StateChanges {
            hbar: hbar_changes(state, savepoint)?,
            fungible: fungible_changes(state, savepoint),
            nfts: nft_changes(state, savepoint),
        };
        for record in nested {
            deduct(&mut changes, record);
        }
        Ok(changes)
    }
}

// ========================================
// Diffs
// ========================================

fn hbar_changes(state: &TokenServiceState, savepoint: &StateSavepoint) -> HandlerResult<BTreeMap<AccountId, i64>> {
    let mut changes = BTreeMap::new();
    let mut sum: i128 = 0;
    for account_id in state.accounts.modified_account_ids() {
        let before = state
            .accounts
            .get_at(savepoint.accounts(), &account_id)
            .map_or(0, |a| a.tinybar_balance);
        let after = state.accounts.get(&account_id).map_or(0, |a| a.tinybar_balance);
        let change = after as i128 - before as i128;
        if change != 0 {
            sum += change;
            let change = i64::try_from(change).map_err(|_| HandlerError::Handle(ResponseCode::FailInvalid))?;
            changes.insert(account_id, change);
        }
    }

    if sum != 0 {
        let (original, modified): (Vec<&Account>, Vec<&Account>) = changes
            .keys()
            .map(|id| {
                (
                    state.accounts.get_at(savepoint.accounts(), id),
                    state.accounts.get(id),
                )
            })
            .fold((Vec::new(), Vec::new()), |(mut original, mut modified), (before, after)| {
                original.extend(before);
                modified.extend(after);
                (original, modified)
            });
        error!(
            "Hbar changes do not sum to zero ({}); original accounts: {}; modified accounts: {}",
            sum,
            serde_json::to_string(&original).unwrap_or_default(),
            serde_json::to_string(&modified).unwrap_or_default()
        );
        return Err(HandlerError::Handle(ResponseCode::FailInvalid));
    }
    Ok(changes)
}

fn token_at<'a>(state: &'a TokenServiceState, savepoint: &'a StateSavepoint, token_id: &TokenId) -> Option<&'a Token> {
    state
        .tokens
        .get(token_id)
        .or_else(|| state.tokens.get_at(savepoint.tokens(), token_id))
}

fn fungible_changes(state: &TokenServiceState, savepoint: &StateSavepoint) -> FungibleChanges {
    let mut changes: FungibleChanges = BTreeMap::new();
    for key in state.token_relations.modified_keys() {
        let is_fungible = token_at(state, savepoint, &key.token_id).is_some_and(Token::is_fungible);
        if !is_fungible {
            continue;
        }
        let before = state
            .token_relations
            .get_at(savepoint.token_relations(), &key)
            .map_or(0, |rel| rel.balance);
        let after = state.token_relations.get_by_key(&key).map_or(0, |rel| rel.balance);
        let change = after as i128 - before as i128;
        if change != 0 {
            changes
                .entry(key.token_id)
                .or_default()
                .insert(key.account_id, change as i64);
        }
    }
    changes
}

fn nft_changes(state: &TokenServiceState, savepoint: &StateSavepoint) -> NftChanges {
    let mut changes: NftChanges = BTreeMap::new();
    for nft_id in state.nfts.modified_keys() {
        let Some(token) = token_at(state, savepoint, &nft_id.token_id) else {
            continue;
        };
        let treasury = token.treasury_account_id;
        let before = state
            .nfts
            .get_at(savepoint.nfts(), &nft_id)
            .map(|nft| nft.owner_or(treasury));
        let after = state.nfts.get(&nft_id).map(|nft| nft.owner_or(treasury));
        let (sender_id, receiver_id) = match (before, after) {
            (None, None) => continue,
            (before, after) if before == after => continue,
            (before, after) => (
                before.unwrap_or(AccountId::MISSING),
                after.unwrap_or(AccountId::MISSING),
            ),
        };
        changes.entry(nft_id.token_id).or_default().insert(
            nft_id.serial_number,
            NftOwnerChange {
                serial_number: nft_id.serial_number,
                sender_id,
                receiver_id,
            },
        );
    }
    changes
}

// ========================================
// Nested records
// ========================================

fn deduct(changes: &mut StateChanges, nested: &TransactionRecord) {
    for adjustment in &nested.transfer_list {
        subtract(&mut changes.hbar, adjustment);
    }
    for list in &nested.token_transfer_lists {
        if !list.adjustments.is_empty() {
            let token_changes = changes.fungible.entry(list.token_id).or_default();
            for adjustment in &list.adjustments {
                subtract(token_changes, adjustment);
            }
            if token_changes.is_empty() {
                changes.fungible.remove(&list.token_id);
            }
        }

        if let Some(parent) = changes.nfts.get_mut(&list.token_id) {
            for child in &list.nft_transfers {
                let Some(entry) = parent.get_mut(&child.serial_number) else {
                    continue;
                };
                if entry.receiver_id == child.receiver_id {
                    parent.remove(&child.serial_number);
                } else {
                    entry.sender_id = child.receiver_id;
                }
            }
            if parent.is_empty() {
                changes.nfts.remove(&list.token_id);
            }
        }
    }
}

fn subtract(changes: &mut BTreeMap<AccountId, i64>, adjustment: &AccountAdjustment) {
    let entry = changes.entry(adjustment.account_id).or_insert(0);
    *entry = entry.saturating_sub(adjustment.amount);
    if *entry == 0 {
        changes.remove(&adjustment.account_id);
    }
}

/// Replace the record's transfer lists, sorted by id
fn write_changes(record: &mut TransactionRecord, changes: StateChanges) {
    record.transfer_list = changes
        .hbar
        .into_iter()
        .map(|(account_id, amount)| AccountAdjustment { account_id, amount })
        .collect();

    let mut lists: BTreeMap<TokenId, TokenTransferRecord> = BTreeMap::new();
    for (token_id, adjustments) in changes.fungible {
        lists
            .entry(token_id)
            .or_insert_with(|| empty_list(token_id))
            .adjustments = adjustments
            .into_iter()
            .map(|(account_id, amount)| AccountAdjustment { account_id, amount })
            .collect();
    }
    for (token_id, nfts) in changes.nfts {
        lists
            .entry(token_id)
            .or_insert_with(|| empty_list(token_id))
            .nft_transfers = nfts.into_values().collect();
    }
    record.token_transfer_lists = lists.into_values().collect();
}

fn empty_list(token_id: TokenId) -> TokenTransferRecord {
    TokenTransferRecord {
        token_id,
        adjustments: Vec::new(),
        nft_transfers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use tokenledger_common::record::RecordKind;
    use tokenledger_common::state::Nft;

    fn finalizer(strict: bool) -> RecordFinalizer {
        RecordFinalizer::new(&RecordsConfig {
            require_zero_parent_token_changes: strict,
        })
    }

    fn move_hbar(state: &mut TokenServiceState, from: u64, to: u64, amount: u64) {
        let mut sender = state.accounts.get(&id(from)).cloned().unwrap();
        let mut receiver = state.accounts.get(&id(to)).cloned().unwrap();
        sender.tinybar_balance -= amount;
        receiver.tinybar_balance += amount;
        state.accounts.put(sender);
        state.accounts.put(receiver);
    }

    fn record() -> TransactionRecord {
        TransactionRecord::new(RecordKind::User, id(PAYER), CONSENSUS_TIME)
    }

    #[test]
    fn test_hbar_changes_are_sorted() {
        let mut state = state_with_accounts(&[ALICE, BOB, CAROL]);
        let savepoint = state.savepoint();
        move_hbar(&mut state, CAROL, ALICE, 30);
        move_hbar(&mut state, CAROL, BOB, 20);

        let mut record = record();
        finalizer(false)
            .finalize_parent_record(&state, &savepoint, &mut record, &[])
            .unwrap();
        assert_eq!(
            record.transfer_list,
            vec![
                AccountAdjustment { account_id: id(ALICE), amount: 30 },
                AccountAdjustment { account_id: id(BOB), amount: 20 },
                AccountAdjustment { account_id: id(CAROL), amount: -50 },
            ]
        );
    }

    #[test]
    fn test_unbalanced_hbar_fails_invalid() {
        let mut state = state_with_accounts(&[ALICE]);
        let savepoint = state.savepoint();
        let mut alice = state.accounts.get(&id(ALICE)).cloned().unwrap();
        alice.tinybar_balance += 1;
        state.accounts.put(alice);

        let result = finalizer(false).finalize_parent_record(&state, &savepoint, &mut record(), &[]);
        assert_eq!(result, Err(HandlerError::Handle(ResponseCode::FailInvalid)));
    }

    #[test]
    fn test_fungible_and_nft_changes() {
        let mut state = state_with_accounts(&[TREASURY, ALICE]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 1_000);
        create_token(&mut state, nft_token(NFT_TOKEN, TREASURY), 0);
        mint_nfts(&mut state, NFT_TOKEN, 2);
        state.commit();
        let savepoint = state.savepoint();

        // Minted serial 3, serial 1 burned
        state.nfts.put(Nft {
            nft_id: nft_id(NFT_TOKEN, 3),
            ..Default::default()
        });
        state.nfts.remove(&nft_id(NFT_TOKEN, 1));
        // Relation removed while holding a balance
        associate(&mut state, ALICE, TOKEN, 0);
        state.token_relations.remove(&id(TREASURY), &tid(TOKEN));

        let mut record = record();
        finalizer(false)
            .finalize_parent_record(&state, &savepoint, &mut record, &[])
            .unwrap();
        assert_eq!(record.token_change(tid(TOKEN), id(TREASURY)), -1_000);
        assert_eq!(record.token_change(tid(TOKEN), id(ALICE)), 0);
        assert_eq!(
            record.nft_changes(tid(NFT_TOKEN)),
            &[
                NftOwnerChange {
                    serial_number: 1,
                    sender_id: id(TREASURY),
                    receiver_id: AccountId::MISSING,
                },
                NftOwnerChange {
                    serial_number: 3,
                    sender_id: AccountId::MISSING,
                    receiver_id: id(TREASURY),
                },
            ]
        );
    }

    #[test]
    fn test_child_transfer_fully_deducted() {
        let mut state = state_with_accounts(&[ALICE, BOB]);
        let savepoint = state.savepoint();
        move_hbar(&mut state, ALICE, BOB, 100);

        let mut child = record();
        child.kind = RecordKind::Child;
        child.transfer_list = vec![
            AccountAdjustment { account_id: id(ALICE), amount: -100 },
            AccountAdjustment { account_id: id(BOB), amount: 100 },
        ];

        let mut parent = record();
        finalizer(true)
            .finalize_parent_record(&state, &savepoint, &mut parent, &[child])
            .unwrap();
        assert!(parent.transfer_list.is_empty());
        assert!(parent.token_transfer_lists.is_empty());
    }

    #[test]
    fn test_child_token_transfer_fully_deducted() {
        let mut state = state_with_accounts(&[TREASURY, ALICE, BOB]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 1_000);
        associate(&mut state, ALICE, TOKEN, 10);
        associate(&mut state, BOB, TOKEN, 0);
        state.commit();
        let savepoint = state.savepoint();

        let mut alice = state.token_relations.get(&id(ALICE), &tid(TOKEN)).cloned().unwrap();
        let mut bob = state.token_relations.get(&id(BOB), &tid(TOKEN)).cloned().unwrap();
        alice.balance = 0;
        bob.balance = 10;
        state.token_relations.put(alice);
        state.token_relations.put(bob);

        let mut child = record();
        child.kind = RecordKind::Child;
        child.token_transfer_lists = vec![TokenTransferRecord {
            token_id: tid(TOKEN),
            adjustments: vec![
                AccountAdjustment { account_id: id(ALICE), amount: -10 },
                AccountAdjustment { account_id: id(BOB), amount: 10 },
            ],
            nft_transfers: Vec::new(),
        }];

        // Without the child the parent would report the move itself
        let mut unreduced = record();
        finalizer(false)
            .finalize_parent_record(&state, &savepoint, &mut unreduced, &[])
            .unwrap();
        assert_eq!(unreduced.token_change(tid(TOKEN), id(BOB)), 10);

        let mut parent = record();
        finalizer(true)
            .finalize_parent_record(&state, &savepoint, &mut parent, &[child])
            .unwrap();
        assert!(parent.token_transfer_lists.is_empty());
        assert!(parent.transfer_list.is_empty());
    }

    #[test]
    fn test_nft_deduction_moves_sender_forward() {
        let mut changes = StateChanges::default();
        changes.nfts.entry(tid(NFT_TOKEN)).or_default().insert(
            1,
            NftOwnerChange {
                serial_number: 1,
                sender_id: id(TREASURY),
                receiver_id: id(BOB),
            },
        );
        let mut child = record();
        child.token_transfer_lists = vec![TokenTransferRecord {
            token_id: tid(NFT_TOKEN),
            adjustments: Vec::new(),
            nft_transfers: vec![NftOwnerChange {
                serial_number: 1,
                sender_id: id(TREASURY),
                receiver_id: id(ALICE),
            }],
        }];

        deduct(&mut changes, &child);
        let entry = changes.nfts[&tid(NFT_TOKEN)][&1u64];
        assert_eq!(entry.sender_id, id(ALICE));
        assert_eq!(entry.receiver_id, id(BOB));

        child.token_transfer_lists[0].nft_transfers[0].receiver_id = id(BOB);
        deduct(&mut changes, &child);
        assert!(changes.nfts.is_empty());
    }

    #[test]
    fn test_strict_mode_rejects_leftover_token_changes() {
        let mut state = state_with_accounts(&[TREASURY, ALICE]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 100);
        associate(&mut state, ALICE, TOKEN, 0);
        state.commit();
        let savepoint = state.savepoint();

        let mut treasury_rel = state.token_relations.get(&id(TREASURY), &tid(TOKEN)).cloned().unwrap();
        let mut alice_rel = state.token_relations.get(&id(ALICE), &tid(TOKEN)).cloned().unwrap();
        treasury_rel.balance -= 5;
        alice_rel.balance += 5;
        state.token_relations.put(treasury_rel);
        state.token_relations.put(alice_rel);

        let child = record();
        let result = finalizer(true).finalize_parent_record(&state, &savepoint, &mut record(), &[child.clone()]);
        assert_eq!(result, Err(HandlerError::Handle(ResponseCode::FailInvalid)));

        let mut lenient = record();
        finalizer(false)
            .finalize_parent_record(&state, &savepoint, &mut lenient, &[child])
            .unwrap();
        assert_eq!(lenient.token_change(tid(TOKEN), id(ALICE)), 5);
    }
}
