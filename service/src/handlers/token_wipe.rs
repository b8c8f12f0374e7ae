// Account wipe
// Removes units or serials held by a non-treasury account from
// circulation. NFT ownership is verified for every serial before the
// first write so a failed wipe leaves state untouched.

use std::collections::BTreeSet;

use log::debug;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::NftId;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Token, TokenRelation};
use tokenledger_common::transaction::{body_of, TokenWipeBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::nft_chain::unlink_owned_nft;
use crate::ledger::supply::wipe_supply;

use super::TransactionHandler;

pub struct TokenAccountWipeHandler;

impl TokenAccountWipeHandler {
    fn wipe_nfts(
        &self,
        ctx: &mut HandleContext,
        token: &Token,
        holder_rel: &TokenRelation,
        serial_numbers: &[i64],
    ) -> HandlerResult<()> {
        let holder_id = holder_rel.account_id;
        let serials: BTreeSet<u64> = serial_numbers.iter().map(|s| *s as u64).collect();

        // Step 1: Ownership of every serial
        let mut nfts = Vec::with_capacity(serials.len());
        for serial in &serials {
            let nft = ctx
                .state()
                .nfts
                .get(&NftId::new(token.token_id, *serial))
                .cloned()
                .ok_or(HandlerError::Handle(ResponseCode::InvalidNftId))?;
            ensure(nft.owner_id == Some(holder_id), ResponseCode::AccountDoesNotOwnWipedNft)?;
            nfts.push(nft);
        }

        // Step 2: Supply and holder balance
        let new_total_supply = wipe_supply(ctx.state_mut(), token, holder_rel, serials.len() as u64)?;

        // Step 3: Out of the holder's chain and out of state
        let mut holder = ctx
            .state()
            .accounts
            .get(&holder_id)
            .cloned()
            .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
        for nft in nfts {
            let mut nft = ctx.state().nfts.get(&nft.nft_id).cloned().unwrap_or(nft);
            unlink_owned_nft(ctx.state_mut(), &mut holder, &mut nft);
            ctx.state_mut().nfts.remove(&nft.nft_id);
        }
        holder.number_owned_nfts = holder.number_owned_nfts.saturating_sub(serials.len() as u64);
        ctx.state_mut().accounts.put(holder);

        let record = ctx.record_mut();
        record.new_total_supply = Some(new_total_supply);
        record.serial_numbers = serials.into_iter().collect();
        Ok(())
    }
}

impl TransactionHandler for TokenAccountWipeHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenWipeBody = body_of(body)?;
        ensure_pre_check(op.token_id.num != 0, ResponseCode::InvalidTokenId)?;
        ensure_pre_check(!op.account_id.is_missing(), ResponseCode::InvalidAccountId)?;
        ensure_pre_check(
            op.amount == 0 || op.serial_numbers.is_empty(),
            ResponseCode::InvalidTransactionBody,
        )?;
        for serial in &op.serial_numbers {
            ensure_pre_check(*serial > 0, ResponseCode::InvalidNftId)?;
        }
        ensure_pre_check(
            op.amount > 0 || !op.serial_numbers.is_empty(),
            ResponseCode::InvalidWipingAmount,
        )
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenWipeBody = body_of(ctx.body())?;
        let token = ctx
            .state()
            .tokens
            .get(&op.token_id)
            .ok_or(HandlerError::PreCheck(ResponseCode::InvalidTokenId))?;
        ctx.require_key_or(token.wipe_key.as_ref(), ResponseCode::TokenHasNoWipeKey)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenWipeBody = body_of(ctx.body())?;
        ensure(
            op.serial_numbers.len() <= ctx.config().tokens.nfts.max_batch_size_wipe,
            ResponseCode::BatchSizeLimitExceeded,
        )?;
        let token = ctx
            .state()
            .tokens
            .get_if_usable(&op.token_id)
            .or_handle()?
            .clone();
        ensure(token.wipe_key.is_some(), ResponseCode::TokenHasNoWipeKey)?;
        ctx.state().accounts.get_if_usable(&op.account_id).or_handle()?;
        let holder_rel = ctx
            .state()
            .token_relations
            .get(&op.account_id, &op.token_id)
            .cloned()
            .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
        ensure(
            op.account_id != token.treasury_account_id,
            ResponseCode::CannotWipeTokenTreasuryAccount,
        )?;

        if token.is_fungible() {
            ensure(op.serial_numbers.is_empty(), ResponseCode::InvalidTransactionBody)?;
            let new_total_supply = wipe_supply(ctx.state_mut(), &token, &holder_rel, op.amount)?;
            ctx.record_mut().new_total_supply = Some(new_total_supply);
        } else {
            ensure(op.amount == 0, ResponseCode::InvalidTransactionBody)?;
            self.wipe_nfts(ctx, &token, &holder_rel, &op.serial_numbers)?;
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Wiped token {} from {}: amount {}, serials {:?}",
                token.token_id, op.account_id, op.amount, op.serial_numbers
            );
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<TokenWipeBody>(ctx.body()) {
            Ok(op) if !op.serial_numbers.is_empty() => ctx.fees_with_items(op.serial_numbers.len()),
            _ => ctx.base_fees(),
        }
    }
}
