// Token minting
// Fungible mints grow the treasury balance; NFT mints create serials
// owned by the treasury and threaded onto the head of its owned chain.

use log::debug;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::NftId;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Nft, Token, TokenRelation};
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::{body_of, TokenMintBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::nft_chain::link_owned_nft;
use crate::ledger::supply::change_supply;
use crate::ledger::MAX_SERIAL_NUMBER;

use super::TransactionHandler;

pub struct TokenMintHandler;

/// Relation of a token with its treasury
pub(crate) fn treasury_relation(state: &TokenServiceState, token: &Token) -> HandlerResult<TokenRelation> {
    state
        .token_relations
        .get(&token.treasury_account_id, &token.token_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidTreasuryAccountForToken))
}

impl TokenMintHandler {
    fn mint_nfts(&self, ctx: &mut HandleContext, token: &Token, metadata: &[Vec<u8>]) -> HandlerResult<()> {
        let nfts_config = &ctx.config().tokens.nfts;
        let count = metadata.len() as u64;

        // Step 1: Limits, all before any write
        ensure(nfts_config.are_enabled, ResponseCode::NotSupported)?;
        ensure(
            metadata.len() <= nfts_config.max_batch_size_mint,
            ResponseCode::BatchSizeLimitExceeded,
        )?;
        ensure(
            metadata.iter().all(|m| m.len() <= nfts_config.max_metadata_bytes),
            ResponseCode::MetadataTooLong,
        )?;
        ensure(
            token.last_used_serial_number + count <= MAX_SERIAL_NUMBER,
            ResponseCode::SerialNumberLimitReached,
        )?;
        ensure(
            ctx.state().nfts.size_of_state() as u64 + count <= nfts_config.max_allowed_mints,
            ResponseCode::MaxNftsInPriceRegimeHaveBeenMinted,
        )?;

        // Step 2: Supply and treasury balance
        let treasury_rel = treasury_relation(ctx.state(), token)?;
        let new_total_supply = change_supply(
            ctx.state_mut(),
            token,
            &treasury_rel,
            count as i64,
            ResponseCode::InvalidTokenMintAmount,
        )?;

        // Step 3: New serials onto the treasury chain
        let mut treasury = ctx
            .state()
            .accounts
            .get(&token.treasury_account_id)
            .cloned()
            .ok_or(HandlerError::Handle(ResponseCode::InvalidTreasuryAccountForToken))?;
        let consensus_time = ctx.consensus_time();
        let first_serial = token.last_used_serial_number + 1;
        let mut serial_numbers = Vec::with_capacity(metadata.len());
        for (offset, bytes) in metadata.iter().enumerate() {
            let serial_number = first_serial + offset as u64;
            let mut nft = Nft {
                nft_id: NftId::new(token.token_id, serial_number),
                owner_id: None,
                spender_id: None,
                metadata: bytes.clone(),
                mint_time: Some(consensus_time),
                owner_previous_nft_id: None,
                owner_next_nft_id: None,
            };
            link_owned_nft(ctx.state_mut(), &mut treasury, &mut nft);
            ctx.state_mut().nfts.put(nft);
            serial_numbers.push(serial_number);
        }
        treasury.number_owned_nfts += count;
        ctx.state_mut().accounts.put(treasury);

        let mut token = ctx
            .state()
            .tokens
            .get(&token.token_id)
            .cloned()
            .ok_or(HandlerError::Handle(ResponseCode::InvalidTokenId))?;
        token.last_used_serial_number += count;
        ctx.state_mut().tokens.put(token);

        let record = ctx.record_mut();
        record.new_total_supply = Some(new_total_supply);
        record.serial_numbers = serial_numbers;
        Ok(())
    }
}

impl TransactionHandler for TokenMintHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenMintBody = body_of(body)?;
        ensure_pre_check(op.token_id.num != 0, ResponseCode::InvalidTokenId)?;
        ensure_pre_check(op.amount >= 0, ResponseCode::InvalidTokenMintAmount)?;
        ensure_pre_check(
            op.amount == 0 || op.metadata.is_empty(),
            ResponseCode::InvalidTransactionBody,
        )
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenMintBody = body_of(ctx.body())?;
        let token = ctx
            .state()
            .tokens
            .get(&op.token_id)
            .ok_or(HandlerError::PreCheck(ResponseCode::InvalidTokenId))?;
        ctx.require_key_or(token.supply_key.as_ref(), ResponseCode::TokenHasNoSupplyKey)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenMintBody = body_of(ctx.body())?;
        let token = ctx
            .state()
            .tokens
            .get_if_usable(&op.token_id)
            .or_handle()?
            .clone();
        ensure(token.supply_key.is_some(), ResponseCode::TokenHasNoSupplyKey)?;

        if token.is_fungible() {
            ensure(op.metadata.is_empty(), ResponseCode::InvalidTokenMintMetadata)?;
            let treasury_rel = treasury_relation(ctx.state(), &token)?;
            let new_total_supply = change_supply(
                ctx.state_mut(),
                &token,
                &treasury_rel,
                op.amount,
                ResponseCode::InvalidTokenMintAmount,
            )?;
            ctx.record_mut().new_total_supply = Some(new_total_supply);
        } else {
            ensure(op.amount == 0, ResponseCode::InvalidTokenMintAmount)?;
            ensure(!op.metadata.is_empty(), ResponseCode::InvalidTokenMintMetadata)?;
            self.mint_nfts(ctx, &token, &op.metadata)?;
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Minted token {}: amount {}, serials {:?}",
                token.token_id,
                op.amount,
                ctx.record().serial_numbers
            );
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<TokenMintBody>(ctx.body()) {
            Ok(op) if !op.metadata.is_empty() => ctx.fees_with_items(op.metadata.len()),
            _ => ctx.base_fees(),
        }
    }
}
