// Token airdrops
// A credit executes at once when the receiver already holds the token, can
// take it through a free automatic association slot, or is an unknown alias
// that the transfer will create. Every other credit is parked in the
// sender's pending airdrop list until the receiver claims it. Senders
// prepay the custom fees of what they park.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::{AccountId, AccountRef, NftId, PendingAirdropId, TokenId, TokenReference};
use tokenledger_common::record::PendingAirdropRecord;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::{
    body_of, AccountAmount, CryptoTransferBody, TokenAirdropBody, TokenTransferList, TransactionBody,
};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::airdrops::insert_pending_airdrop;
use crate::ledger::token_rels::has_free_auto_association_slot;
use crate::transfer::validation::check_token_transfers;
use crate::transfer::{
    apply_charges, assessed_fees, CustomFeeAssessor, FeeCharge, ResolvedTransfers, TransferExecutor,
    TransferOptions,
};

use super::crypto_transfer::{custom_fee_surcharge, transfer_count};
use super::TransactionHandler;

pub struct TokenAirdropHandler;

/// A credit that waits for its receiver
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingCredit {
    sender_id: AccountId,
    receiver_id: AccountId,
    token_reference: TokenReference,
    /// `None` for an NFT
    value: Option<u64>,
}

impl PendingCredit {
    fn id(&self) -> PendingAirdropId {
        PendingAirdropId::new(self.sender_id, self.receiver_id, self.token_reference)
    }
}

/// Splits the credits of an airdrop into executable and pending ones
struct AirdropPlanner<'a> {
    state: &'a TokenServiceState,
    /// Associations the executable part will create, per receiver
    granted: BTreeMap<AccountId, BTreeSet<TokenId>>,
}

impl<'a> AirdropPlanner<'a> {
    fn new(state: &'a TokenServiceState) -> Self {
        Self {
            state,
            granted: BTreeMap::new(),
        }
    }

    /// Id of the receiver when the credit must be parked
    fn parked_receiver(&mut self, receiver: &AccountRef, token_id: TokenId) -> Option<AccountId> {
        let receiver_id = self.state.accounts.resolve(receiver)?;
        if self.state.token_relations.get(&receiver_id, &token_id).is_some() {
            return None;
        }
        let account = self.state.accounts.get(&receiver_id)?;
        let granted = self.granted.entry(receiver_id).or_default();
        if granted.contains(&token_id) {
            return None;
        }
        let mut projected = account.clone();
        projected.used_auto_associations += granted.len() as u32;
        if has_free_auto_association_slot(&projected) {
            granted.insert(token_id);
            None
        } else {
            Some(receiver_id)
        }
    }

    fn sender_id(&self, sender: &AccountRef) -> HandlerResult<AccountId> {
        self.state
            .accounts
            .resolve(sender)
            .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))
    }

    /// Transfer to execute now, and the credits to park
    fn plan(mut self, op: &TokenAirdropBody) -> HandlerResult<(CryptoTransferBody, Vec<PendingCredit>)> {
        let mut immediate = CryptoTransferBody::default();
        let mut pending = Vec::new();

        for list in &op.token_transfers {
            if let Some(debit) = list.transfers.iter().find(|t| t.amount < 0) {
                let mut credits_now: Vec<AccountAmount> = Vec::new();
                let mut moved_now: i64 = 0;
                for credit in list.transfers.iter().filter(|t| t.amount > 0) {
                    match self.parked_receiver(&credit.account, list.token_id) {
                        None => {
                            moved_now += credit.amount;
                            credits_now.push(credit.clone());
                        }
                        Some(receiver_id) => pending.push(PendingCredit {
                            sender_id: self.sender_id(&debit.account)?,
                            receiver_id,
                            token_reference: TokenReference::Fungible(list.token_id),
                            value: Some(credit.amount as u64),
                        }),
                    }
                }
                if !credits_now.is_empty() {
                    let mut transfers = vec![AccountAmount {
                        amount: -moved_now,
                        ..debit.clone()
                    }];
                    transfers.extend(credits_now);
                    immediate.token_transfers.push(TokenTransferList {
                        token_id: list.token_id,
                        expected_decimals: list.expected_decimals,
                        transfers,
                        nft_transfers: Vec::new(),
                    });
                }
            }

            let mut nfts_now = Vec::new();
            for nft in &list.nft_transfers {
                match self.parked_receiver(&nft.receiver, list.token_id) {
                    None => nfts_now.push(nft.clone()),
                    Some(receiver_id) => pending.push(PendingCredit {
                        sender_id: self.sender_id(&nft.sender)?,
                        receiver_id,
                        token_reference: TokenReference::Nft(NftId::new(list.token_id, nft.serial_number as u64)),
                        value: None,
                    }),
                }
            }
            if !nfts_now.is_empty() {
                immediate
                    .token_transfers
                    .push(TokenTransferList::nfts(list.token_id, nfts_now));
            }
        }
        Ok((immediate, pending))
    }
}

/// Check the senders can cover what they park and price the fees they prepay
fn validate_pending(
    state: &TokenServiceState,
    assessor: &CustomFeeAssessor,
    pending: &[PendingCredit],
) -> HandlerResult<Vec<FeeCharge>> {
    let mut owed: BTreeMap<(AccountId, TokenId), u64> = BTreeMap::new();
    let mut charges = Vec::new();
    for credit in pending {
        let token = state
            .tokens
            .get_if_usable(&credit.token_reference.token_id())
            .or_handle()?;
        match credit.token_reference {
            TokenReference::Fungible(token_id) => {
                ensure(
                    token.is_fungible(),
                    ResponseCode::AccountAmountTransfersOnlyAllowedForFungibleCommon,
                )?;
                let total = owed.entry((credit.sender_id, token_id)).or_insert(0);
                *total = total
                    .checked_add(credit.value.unwrap_or(0))
                    .ok_or(HandlerError::Handle(ResponseCode::InsufficientTokenBalance))?;
            }
            TokenReference::Nft(nft_id) => {
                ensure(!token.is_fungible(), ResponseCode::InvalidNftId)?;
                let nft = state
                    .nfts
                    .get(&nft_id)
                    .ok_or(HandlerError::Handle(ResponseCode::InvalidNftId))?;
                ensure(
                    nft.owner_or(token.treasury_account_id) == credit.sender_id,
                    ResponseCode::SenderDoesNotOwnNftSerialNo,
                )?;
            }
        }
        charges.extend(assessor.prepaid_fees(token, credit.sender_id, credit.value)?);
    }

    for ((sender_id, token_id), amount) in owed {
        let rel = state
            .token_relations
            .get(&sender_id, &token_id)
            .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
        ensure(!rel.frozen, ResponseCode::AccountFrozenForToken)?;
        ensure(rel.balance >= amount, ResponseCode::InsufficientTokenBalance)?;
    }
    Ok(charges)
}

fn as_transfer_body(op: &TokenAirdropBody) -> CryptoTransferBody {
    CryptoTransferBody {
        transfers: Vec::new(),
        token_transfers: op.token_transfers.clone(),
    }
}

impl TransactionHandler for TokenAirdropHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenAirdropBody = body_of(body)?;
        ensure_pre_check(!op.token_transfers.is_empty(), ResponseCode::EmptyTokenTransferBody)?;
        check_token_transfers(&op.token_transfers)?;
        for list in op.token_transfers.iter().filter(|l| !l.transfers.is_empty()) {
            let senders = list.transfers.iter().filter(|t| t.amount < 0).count();
            ensure_pre_check(senders == 1, ResponseCode::InvalidTransactionBody)?;
        }
        Ok(())
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenAirdropBody = body_of(ctx.body())?;
        for list in &op.token_transfers {
            for debit in list.transfers.iter().filter(|t| t.amount < 0 && !t.is_approval) {
                ctx.require_account_key_by_ref(&debit.account, ResponseCode::InvalidAccountId)?;
            }
            for nft in list.nft_transfers.iter().filter(|n| !n.is_approval) {
                ctx.require_account_key_by_ref(&nft.sender, ResponseCode::InvalidAccountId)?;
            }
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenAirdropBody = body_of(ctx.body())?;
        let config = ctx.config();
        ensure(config.tokens.airdrops_enabled, ResponseCode::NotSupported)?;
        ensure(
            transfer_count(&as_transfer_body(op)) <= config.tokens.max_allowed_airdrop_transfers_per_tx,
            ResponseCode::BatchSizeLimitExceeded,
        )?;

        // Step 1: Split the credits
        let (immediate, pending) = AirdropPlanner::new(ctx.state()).plan(op)?;

        // Step 2: Execute what receivers can take now
        if !immediate.token_transfers.is_empty() {
            TransferExecutor::execute(ctx, &immediate, TransferOptions::WITH_CUSTOM_FEES)?;
        }
        if pending.is_empty() {
            return Ok(());
        }

        // Step 3: Senders must cover what they park
        let charges = validate_pending(
            ctx.state(),
            &CustomFeeAssessor::new(ctx.state(), config),
            &pending,
        )?;

        // Step 4: Park the rest
        for credit in &pending {
            let id = credit.id();
            let mut sender = ctx
                .state()
                .accounts
                .get(&credit.sender_id)
                .cloned()
                .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
            let stored = insert_pending_airdrop(ctx.state_mut(), &mut sender, id, credit.value)?;
            ctx.state_mut().accounts.put(sender);
            ctx.record_mut().pending_airdrop_records.push(PendingAirdropRecord {
                pending_airdrop_id: id,
                pending_airdrop_value: stored.pending_airdrop_value,
            });
            if log::log_enabled!(log::Level::Debug) {
                debug!("Parked airdrop {} with value {:?}", id, stored.pending_airdrop_value);
            }
        }

        // Step 5: Prepay the custom fees of the parked value
        if !charges.is_empty() {
            let mut fee_transfers = ResolvedTransfers::default();
            apply_charges(&mut fee_transfers, &charges);
            TransferExecutor::execute_resolved(ctx, fee_transfers, TransferOptions::WITHOUT_CUSTOM_FEES)?;
            ctx.record_mut()
                .assessed_custom_fees
                .extend(assessed_fees(&charges));
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        let Ok(op) = body_of::<TokenAirdropBody>(ctx.body()) else {
            return ctx.base_fees();
        };
        let view = as_transfer_body(op);
        ctx.fees_with_transfers(transfer_count(&view))
            .plus_service(custom_fee_surcharge(ctx, &view))
    }
}
