use std::collections::BTreeSet;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::NftId;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::Token;
use tokenledger_common::transaction::{body_of, TokenBurnBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::nft_chain::unlink_owned_nft;
use crate::ledger::supply::change_supply;

use super::token_mint::treasury_relation;
use super::TransactionHandler;

/// Burns fungible units or treasury-owned serials
pub struct TokenBurnHandler;

impl TokenBurnHandler {
    fn burn_nfts(&self, ctx: &mut HandleContext, token: &Token, serial_numbers: &[i64]) -> HandlerResult<()> {
        ensure(
            serial_numbers.len() <= ctx.config().tokens.nfts.max_batch_size_burn,
            ResponseCode::BatchSizeLimitExceeded,
        )?;
        let serials: BTreeSet<u64> = serial_numbers.iter().map(|s| *s as u64).collect();

        // Step 1: Every serial exists and sits in the treasury
        let mut nfts = Vec::with_capacity(serials.len());
        for serial in &serials {
            let nft = ctx
                .state()
                .nfts
                .get(&NftId::new(token.token_id, *serial))
                .cloned()
                .ok_or(HandlerError::Handle(ResponseCode::InvalidNftId))?;
            ensure(nft.owner_id.is_none(), ResponseCode::TreasuryMustOwnBurnedNft)?;
            nfts.push(nft);
        }

        // Step 2: Supply and treasury balance
        let treasury_rel = treasury_relation(ctx.state(), token)?;
        let new_total_supply = change_supply(
            ctx.state_mut(),
            token,
            &treasury_rel,
            -(serials.len() as i64),
            ResponseCode::InvalidTokenBurnAmount,
        )?;

        // Step 3: Out of the treasury chain and out of state
        let mut treasury = ctx
            .state()
            .accounts
            .get(&token.treasury_account_id)
            .cloned()
            .ok_or(HandlerError::Handle(ResponseCode::InvalidTreasuryAccountForToken))?;
        for nft in nfts {
            // Neighbours may have been rewritten by the previous unlink
            let mut nft = ctx.state().nfts.get(&nft.nft_id).cloned().unwrap_or(nft);
            unlink_owned_nft(ctx.state_mut(), &mut treasury, &mut nft);
            ctx.state_mut().nfts.remove(&nft.nft_id);
        }
        treasury.number_owned_nfts = treasury.number_owned_nfts.saturating_sub(serials.len() as u64);
        ctx.state_mut().accounts.put(treasury);

        let record = ctx.record_mut();
        record.new_total_supply = Some(new_total_supply);
        record.serial_numbers = serials.into_iter().collect();
        Ok(())
    }
}

impl TransactionHandler for TokenBurnHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenBurnBody = body_of(body)?;
        ensure_pre_check(op.token_id.num != 0, ResponseCode::InvalidTokenId)?;
        ensure_pre_check(op.amount >= 0, ResponseCode::InvalidTokenBurnAmount)?;
        for serial in &op.serial_numbers {
            ensure_pre_check(*serial > 0, ResponseCode::InvalidNftId)?;
        }
        ensure_pre_check(
            op.amount == 0 || op.serial_numbers.is_empty(),
            ResponseCode::InvalidTransactionBody,
        )
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenBurnBody = body_of(ctx.body())?;
        let token = ctx
            .state()
            .tokens
            .get(&op.token_id)
            .ok_or(HandlerError::PreCheck(ResponseCode::InvalidTokenId))?;
        ctx.require_key_or(token.supply_key.as_ref(), ResponseCode::TokenHasNoSupplyKey)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenBurnBody = body_of(ctx.body())?;
        let token = ctx
            .state()
            .tokens
            .get_if_usable(&op.token_id)
            .or_handle()?
            .clone();
        ensure(token.supply_key.is_some(), ResponseCode::TokenHasNoSupplyKey)?;

        if token.is_fungible() {
            ensure(op.serial_numbers.is_empty(), ResponseCode::InvalidTransactionBody)?;
            let treasury_rel = treasury_relation(ctx.state(), &token)?;
            let new_total_supply = change_supply(
                ctx.state_mut(),
                &token,
                &treasury_rel,
                -op.amount,
                ResponseCode::InvalidTokenBurnAmount,
            )?;
            ctx.record_mut().new_total_supply = Some(new_total_supply);
            Ok(())
        } else {
            ensure(op.amount == 0, ResponseCode::InvalidTokenBurnAmount)?;
            ensure(!op.serial_numbers.is_empty(), ResponseCode::InvalidTokenBurnMetadata)?;
            self.burn_nfts(ctx, &token, &op.serial_numbers)
        }
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<TokenBurnBody>(ctx.body()) {
            Ok(op) if !op.serial_numbers.is_empty() => ctx.fees_with_items(op.serial_numbers.len()),
            _ => ctx.base_fees(),
        }
    }
}
