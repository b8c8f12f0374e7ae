// Pending airdrop claim and cancel
// Both take a list of pending airdrop references whose accounts may be
// given by alias. References are standardized to ids before any lookup so
// that an alias and an id naming the same airdrop count as a repeat.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::{AccountId, AccountRef, PendingAirdropId, TokenId, TokenReference};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::{body_of, PendingAirdropRef, PendingAirdropsBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::airdrops::remove_pending_airdrop;
use crate::ledger::token_rels::{create_and_link_token_rels, ensure_association_capacity, NewRelation};
use crate::transfer::{ResolvedAdjustment, ResolvedNftTransfer, ResolvedTransfers, TransferExecutor, TransferOptions};

use super::TransactionHandler;

/// Receivers take their pending airdrops
pub struct TokenClaimAirdropHandler;

/// Senders withdraw pending airdrops
pub struct TokenCancelAirdropHandler;

fn check_pending_refs(body: &TransactionBody) -> HandlerResult<()> {
    let op: &PendingAirdropsBody = body_of(body)?;
    ensure_pre_check(
        !op.pending_airdrops.is_empty(),
        ResponseCode::EmptyPendingAirdropIdList,
    )?;
    let mut seen = BTreeSet::new();
    for pending in &op.pending_airdrops {
        ensure_pre_check(
            seen.insert((&pending.sender, &pending.receiver, &pending.token_reference)),
            ResponseCode::PendingAirdropIdRepeated,
        )?;
        if let TokenReference::Nft(nft_id) = &pending.token_reference {
            ensure_pre_check(
                nft_id.serial_number > 0,
                ResponseCode::InvalidTokenNftSerialNumber,
            )?;
        }
    }
    Ok(())
}

/// Resolve every reference to an existing pending airdrop id
fn standardize(
    state: &TokenServiceState,
    refs: &[PendingAirdropRef],
    max_len: usize,
) -> HandlerResult<Vec<PendingAirdropId>> {
    ensure(refs.len() <= max_len, ResponseCode::PendingAirdropIdListTooLong)?;
    let mut ids = Vec::with_capacity(refs.len());
    let mut seen = BTreeSet::new();
    for pending in refs {
        let resolve = |account: &AccountRef| {
            state
                .accounts
                .resolve(account)
                .ok_or(HandlerError::Handle(ResponseCode::InvalidPendingAirdropId))
        };
        let id = PendingAirdropId::new(
            resolve(&pending.sender)?,
            resolve(&pending.receiver)?,
            pending.token_reference,
        );
        ensure(seen.insert(id), ResponseCode::PendingAirdropIdRepeated)?;
        ensure(state.airdrops.exists(&id), ResponseCode::InvalidPendingAirdropId)?;
        ids.push(id);
    }
    Ok(ids)
}

/// Remove `id` from its sender's list and return the parked value
fn take_pending_airdrop(state: &mut TokenServiceState, id: &PendingAirdropId) -> HandlerResult<Option<u64>> {
    let mut sender = state
        .accounts
        .get(&id.sender_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
    let removed = remove_pending_airdrop(state, &mut sender, id)?;
    state.accounts.put(sender);
    Ok(removed.pending_airdrop_value)
}

/// Explicitly associate every claimed token a receiver does not hold yet
fn associate_receivers(ctx: &mut HandleContext, ids: &[PendingAirdropId]) -> HandlerResult<()> {
    let mut missing: BTreeMap<AccountId, BTreeSet<TokenId>> = BTreeMap::new();
    for id in ids {
        ctx.state().accounts.get_if_usable(&id.receiver_id).or_handle()?;
        let token_id = id.token_id();
        if ctx.state().token_relations.get(&id.receiver_id, &token_id).is_none() {
            missing.entry(id.receiver_id).or_default().insert(token_id);
        }
    }

    for (receiver_id, token_ids) in missing {
        let mut new_relations = Vec::with_capacity(token_ids.len());
        for token_id in &token_ids {
            let token = ctx.state().tokens.get_if_usable(token_id).or_handle()?;
            new_relations.push(NewRelation::for_token(token, false));
        }
        let receiver = ctx
            .state()
            .accounts
            .get(&receiver_id)
            .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
        ensure_association_capacity(ctx.state(), ctx.config(), receiver, new_relations.len())?;
        create_and_link_token_rels(ctx.state_mut(), receiver_id, &new_relations)?;
        if log::log_enabled!(log::Level::Debug) {
            debug!("Associated {} claimed tokens to {}", token_ids.len(), receiver_id);
        }
    }
    Ok(())
}

impl TransactionHandler for TokenClaimAirdropHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_pending_refs(body)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &PendingAirdropsBody = body_of(ctx.body())?;
        for pending in &op.pending_airdrops {
            ctx.require_account_key_by_ref(&pending.receiver, ResponseCode::InvalidPendingAirdropId)?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &PendingAirdropsBody = body_of(ctx.body())?;
        let config = ctx.config();
        ensure(config.tokens.airdrops_claim_enabled, ResponseCode::NotSupported)?;
        let ids = standardize(
            ctx.state(),
            &op.pending_airdrops,
            config.tokens.max_allowed_pending_airdrops_to_claim,
        )?;

        // Step 1: Receivers hold every claimed token
        associate_receivers(ctx, &ids)?;

        // Step 2: Remove the entries and build the transfer they stand for
        let mut transfers = ResolvedTransfers::default();
        for id in &ids {
            let value = take_pending_airdrop(ctx.state_mut(), id)?;
            let list = transfers.token_list_mut(id.token_id());
            match id.token_reference {
                TokenReference::Fungible(_) => {
                    let amount = i64::try_from(value.unwrap_or(0))
                        .map_err(|_| HandlerError::Handle(ResponseCode::InvalidPendingAirdropId))?;
                    list.adjustments.push(ResolvedAdjustment::new(id.sender_id, -amount));
                    list.adjustments.push(ResolvedAdjustment::new(id.receiver_id, amount));
                }
                TokenReference::Nft(nft_id) => list.nft_transfers.push(ResolvedNftTransfer {
                    sender_id: id.sender_id,
                    receiver_id: id.receiver_id,
                    serial_number: nft_id.serial_number,
                    is_approval: false,
                }),
            }
        }

        // Step 3: Fees were prepaid by the airdrop
        TransferExecutor::execute_resolved(ctx, transfers, TransferOptions::WITHOUT_CUSTOM_FEES)?;
        if log::log_enabled!(log::Level::Debug) {
            debug!("Claimed {} pending airdrops", ids.len());
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<PendingAirdropsBody>(ctx.body()) {
            Ok(op) => ctx.fees_with_items(op.pending_airdrops.len()),
            Err(_) => ctx.base_fees(),
        }
    }
}

impl TransactionHandler for TokenCancelAirdropHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_pending_refs(body)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &PendingAirdropsBody = body_of(ctx.body())?;
        for pending in &op.pending_airdrops {
            ctx.require_account_key_by_ref(&pending.sender, ResponseCode::InvalidPendingAirdropId)?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &PendingAirdropsBody = body_of(ctx.body())?;
        let config = ctx.config();
        ensure(config.tokens.airdrops_cancel_enabled, ResponseCode::NotSupported)?;
        let ids = standardize(
            ctx.state(),
            &op.pending_airdrops,
            config.tokens.max_allowed_pending_airdrops_to_cancel,
        )?;
        for id in &ids {
            take_pending_airdrop(ctx.state_mut(), id)?;
        }
        if log::log_enabled!(log::Level::Debug) {
            debug!("Cancelled {} pending airdrops", ids.len());
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<PendingAirdropsBody>(ctx.body()) {
            Ok(op) => ctx.fees_with_items(op.pending_airdrops.len()),
            Err(_) => ctx.base_fees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use tokenledger_common::config::TokenServiceConfig;
    use tokenledger_common::ids::{Alias, NftId};
    use tokenledger_common::state::AccountPendingAirdrop;
    use tokenledger_common::transaction::{AccountAmount, NftTransfer, TokenAirdropBody, TokenTransferList};

    fn park_fungible(state: &mut TokenServiceState, receiver: u64, amount: i64) {
        let body = TransactionBody::TokenAirdrop(TokenAirdropBody {
            token_transfers: vec![TokenTransferList::fungible(
                tid(TOKEN),
                vec![AccountAmount::new(id(TREASURY), -amount), AccountAmount::new(id(receiver), amount)],
            )],
        });
        run_handler(state, &TokenServiceConfig::default(), TREASURY, body).unwrap();
    }

    fn pending_ref(sender: impl Into<AccountRef>, receiver: impl Into<AccountRef>, reference: TokenReference) -> PendingAirdropRef {
        PendingAirdropRef {
            sender: sender.into(),
            receiver: receiver.into(),
            token_reference: reference,
        }
    }

    fn claim(refs: Vec<PendingAirdropRef>) -> TransactionBody {
        TransactionBody::TokenClaimAirdrop(PendingAirdropsBody { pending_airdrops: refs })
    }

    fn cancel(refs: Vec<PendingAirdropRef>) -> TransactionBody {
        TransactionBody::TokenCancelAirdrop(PendingAirdropsBody { pending_airdrops: refs })
    }

    fn setup() -> TokenServiceState {
        let mut state = state_with_accounts(&[TREASURY, BOB, CAROL]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 1_000);
        state
    }

    #[test]
    fn test_claim_associates_and_transfers() {
        let mut state = setup();
        park_fungible(&mut state, BOB, 25);
        let fungible = TokenReference::Fungible(tid(TOKEN));

        run_handler(
            &mut state,
            &TokenServiceConfig::default(),
            BOB,
            claim(vec![pending_ref(id(TREASURY), id(BOB), fungible)]),
        )
        .unwrap();

        let rel = state.token_relations.get(&id(BOB), &tid(TOKEN)).unwrap();
        assert_eq!(rel.balance, 25);
        assert!(!rel.automatic_association);
        assert_eq!(state.token_relations.get(&id(TREASURY), &tid(TOKEN)).unwrap().balance, 975);
        assert!(!state
            .airdrops
            .exists(&PendingAirdropId::new(id(TREASURY), id(BOB), fungible)));
        let treasury = state.accounts.get(&id(TREASURY)).unwrap();
        assert_eq!(treasury.number_pending_airdrops, 0);
        assert_eq!(treasury.head_pending_airdrop_id, None);
        assert_eq!(state.accounts.get(&id(BOB)).unwrap().number_associations, 1);
    }

    #[test]
    fn test_claim_nft_moves_ownership() {
        let mut state = state_with_accounts(&[TREASURY, BOB]);
        create_token(&mut state, nft_token(NFT_TOKEN, TREASURY), 0);
        mint_nfts(&mut state, NFT_TOKEN, 1);
        let body = TransactionBody::TokenAirdrop(TokenAirdropBody {
            token_transfers: vec![TokenTransferList::nfts(
                tid(NFT_TOKEN),
                vec![NftTransfer::new(id(TREASURY), id(BOB), 1)],
            )],
        });
        let config = TokenServiceConfig::default();
        run_handler(&mut state, &config, TREASURY, body).unwrap();

        let reference = TokenReference::Nft(NftId::new(tid(NFT_TOKEN), 1));
        run_handler(&mut state, &config, BOB, claim(vec![pending_ref(id(TREASURY), id(BOB), reference)])).unwrap();

        assert_eq!(state.nfts.get(&nft_id(NFT_TOKEN, 1)).unwrap().owner_id, Some(id(BOB)));
        assert_eq!(state.accounts.get(&id(BOB)).unwrap().number_owned_nfts, 1);
        assert_eq!(state.accounts.get(&id(BOB)).unwrap().head_nft_id, Some(nft_id(NFT_TOKEN, 1)));
    }

    #[test]
    fn test_cancel_removes_entry_only() {
        let mut state = setup();
        park_fungible(&mut state, BOB, 25);
        park_fungible(&mut state, CAROL, 5);
        let fungible = TokenReference::Fungible(tid(TOKEN));

        run_handler(
            &mut state,
            &TokenServiceConfig::default(),
            TREASURY,
            cancel(vec![pending_ref(id(TREASURY), id(BOB), fungible)]),
        )
        .unwrap();

        assert!(state.token_relations.get(&id(BOB), &tid(TOKEN)).is_none());
        assert_eq!(state.token_relations.get(&id(TREASURY), &tid(TOKEN)).unwrap().balance, 1_000);
        let carol_id = PendingAirdropId::new(id(TREASURY), id(CAROL), fungible);
        let treasury = state.accounts.get(&id(TREASURY)).unwrap();
        assert_eq!(treasury.number_pending_airdrops, 1);
        assert_eq!(treasury.head_pending_airdrop_id, Some(carol_id));
        let remaining = state.airdrops.get(&carol_id).unwrap();
        assert_eq!(remaining.previous_airdrop, None);
        assert_eq!(remaining.next_airdrop, None);
    }

    #[test]
    fn test_pending_id_validation() {
        let mut state = setup();
        park_fungible(&mut state, BOB, 25);
        let alias = Alias::new(vec![77; 32]);
        let mut bob = state.accounts.get(&id(BOB)).cloned().unwrap();
        bob.alias = Some(alias.clone());
        state.accounts.put(bob);
        let config = TokenServiceConfig::default();
        let fungible = TokenReference::Fungible(tid(TOKEN));

        let err = run_handler(&mut state, &config, BOB, claim(Vec::new())).unwrap_err();
        assert_eq!(err, HandlerError::PreCheck(ResponseCode::EmptyPendingAirdropIdList));

        let by_id_and_alias = claim(vec![
            pending_ref(id(TREASURY), id(BOB), fungible),
            pending_ref(id(TREASURY), alias, fungible),
        ]);
        let err = run_handler(&mut state, &config, BOB, by_id_and_alias).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::PendingAirdropIdRepeated));

        let err = run_handler(
            &mut state,
            &config,
            CAROL,
            claim(vec![pending_ref(id(TREASURY), id(CAROL), fungible)]),
        )
        .unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::InvalidPendingAirdropId));

        let mut short = TokenServiceConfig::default();
        short.tokens.max_allowed_pending_airdrops_to_cancel = 1;
        let two = cancel(vec![
            pending_ref(id(TREASURY), id(BOB), fungible),
            pending_ref(id(TREASURY), id(CAROL), fungible),
        ]);
        let err = run_handler(&mut state, &short, TREASURY, two).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::PendingAirdropIdListTooLong));
    }

    #[test]
    fn test_claim_value_outside_signed_range() {
        let mut state = setup();
        let fungible = TokenReference::Fungible(tid(TOKEN));
        let pending_id = PendingAirdropId::new(id(TREASURY), id(BOB), fungible);
        state.airdrops.put(
            pending_id,
            AccountPendingAirdrop {
                pending_airdrop_value: Some(u64::MAX - 1),
                ..Default::default()
            },
        );
        let mut treasury = state.accounts.get(&id(TREASURY)).cloned().unwrap();
        treasury.head_pending_airdrop_id = Some(pending_id);
        treasury.number_pending_airdrops = 1;
        state.accounts.put(treasury);

        let err = run_handler(
            &mut state,
            &TokenServiceConfig::default(),
            BOB,
            claim(vec![pending_ref(id(TREASURY), id(BOB), fungible)]),
        )
        .unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::InvalidPendingAirdropId));
        assert_eq!(state.token_relations.get(&id(TREASURY), &tid(TOKEN)).unwrap().balance, 1_000);
    }
}
