use std::collections::BTreeSet;

use log::debug;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::TokenReference;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::transaction::{body_of, TokenRejectBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::transfer::{ResolvedAdjustment, ResolvedNftTransfer, ResolvedTransfers, TransferExecutor, TransferOptions};

use super::TransactionHandler;

/// Returns unwanted tokens and NFTs to their treasuries, free of custom fees
pub struct TokenRejectHandler;

impl TransactionHandler for TokenRejectHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenRejectBody = body_of(body)?;
        ensure_pre_check(!op.rejections.is_empty(), ResponseCode::EmptyTokenReferenceList)?;
        if let Some(owner) = &op.owner {
            ensure_pre_check(!owner.is_missing(), ResponseCode::InvalidOwnerId)?;
        }
        let mut seen = BTreeSet::new();
        for reference in &op.rejections {
            ensure_pre_check(seen.insert(reference), ResponseCode::TokenReferenceRepeated)?;
            match reference {
                TokenReference::Fungible(token_id) => {
                    ensure_pre_check(token_id.num != 0, ResponseCode::InvalidTokenId)?;
                }
                TokenReference::Nft(nft_id) => {
                    ensure_pre_check(nft_id.serial_number > 0, ResponseCode::InvalidTokenNftSerialNumber)?;
                }
            }
        }
        Ok(())
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenRejectBody = body_of(ctx.body())?;
        if let Some(owner) = op.owner {
            ctx.require_account_key(&owner, ResponseCode::InvalidOwnerId)?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenRejectBody = body_of(ctx.body())?;
        let config = ctx.config();
        ensure(config.tokens.reject_enabled, ResponseCode::NotSupported)?;
        ensure(
            op.rejections.len() <= config.tokens.max_allowed_token_rejections,
            ResponseCode::TokenReferenceListSizeLimitExceeded,
        )?;
        let owner_id = op.owner.unwrap_or_else(|| ctx.payer());
        ctx.state()
            .accounts
            .get_if_usable(&owner_id)
            .map_err(|_| HandlerError::Handle(ResponseCode::InvalidOwnerId))?;

        // Step 1: Every rejection moves the owner's holding back to the treasury
        let state = ctx.state();
        let mut transfers = ResolvedTransfers::default();
        for reference in &op.rejections {
            let token = state.tokens.get_if_usable(&reference.token_id()).or_handle()?;
            let treasury_id = token.treasury_account_id;
            ensure(owner_id != treasury_id, ResponseCode::AccountIsTreasury)?;
            match reference {
                TokenReference::Fungible(token_id) => {
                    ensure(
                        token.is_fungible(),
                        ResponseCode::AccountAmountTransfersOnlyAllowedForFungibleCommon,
                    )?;
                    let rel = state
                        .token_relations
                        .get(&owner_id, token_id)
                        .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
                    ensure(rel.balance > 0, ResponseCode::InsufficientTokenBalance)?;
                    let amount = i64::try_from(rel.balance)
                        .map_err(|_| HandlerError::Handle(ResponseCode::InsufficientTokenBalance))?;
                    let list = transfers.token_list_mut(*token_id);
                    list.adjustments.push(ResolvedAdjustment::new(owner_id, -amount));
                    list.adjustments.push(ResolvedAdjustment::new(treasury_id, amount));
                }
                TokenReference::Nft(nft_id) => {
                    ensure(!token.is_fungible(), ResponseCode::InvalidNftId)?;
                    let nft = state
                        .nfts
                        .get(nft_id)
                        .ok_or(HandlerError::Handle(ResponseCode::InvalidNftId))?;
                    ensure(nft.owner_id == Some(owner_id), ResponseCode::InvalidOwnerId)?;
                    transfers
                        .token_list_mut(nft_id.token_id)
                        .nft_transfers
                        .push(ResolvedNftTransfer {
                            sender_id: owner_id,
                            receiver_id: treasury_id,
                            serial_number: nft_id.serial_number,
                            is_approval: false,
                        });
                }
            }
        }

        // Step 2: Treasuries take it back without custom fees
        TransferExecutor::execute_resolved(ctx, transfers, TransferOptions::WITHOUT_CUSTOM_FEES)?;
        if log::log_enabled!(log::Level::Debug) {
            debug!("{} rejected {} token references", owner_id, op.rejections.len());
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<TokenRejectBody>(ctx.body()) {
            Ok(op) => ctx.fees_with_items(op.rejections.len()),
            Err(_) => ctx.base_fees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use tokenledger_common::config::TokenServiceConfig;
    use tokenledger_common::ids::NftId;
    use tokenledger_common::state::CustomFee;
    use tokenledger_common::transaction::{CryptoTransferBody, NftTransfer, TokenTransferList};

    fn reject(owner: Option<u64>, rejections: Vec<TokenReference>) -> TransactionBody {
        TransactionBody::TokenReject(TokenRejectBody {
            owner: owner.map(id),
            rejections,
        })
    }

    #[test]
    fn test_reject_fungible_skips_custom_fees() {
        let mut state = state_with_accounts(&[TREASURY, ALICE, COLLECTOR]);
        let mut token = fungible_token(TOKEN, TREASURY);
        token.custom_fees = vec![CustomFee::fixed_hbar(50, id(COLLECTOR))];
        create_token(&mut state, token, 1_000);
        associate(&mut state, ALICE, TOKEN, 40);

        run_handler(
            &mut state,
            &TokenServiceConfig::default(),
            ALICE,
            reject(None, vec![TokenReference::Fungible(tid(TOKEN))]),
        )
        .unwrap();

        assert_eq!(state.token_relations.get(&id(ALICE), &tid(TOKEN)).unwrap().balance, 0);
        assert_eq!(state.token_relations.get(&id(TREASURY), &tid(TOKEN)).unwrap().balance, 1_040);
        assert_eq!(state.accounts.get(&id(ALICE)).unwrap().number_positive_balances, 0);
        assert_eq!(state.accounts.get(&id(ALICE)).unwrap().tinybar_balance, INITIAL_BALANCE);
        assert_eq!(state.accounts.get(&id(COLLECTOR)).unwrap().tinybar_balance, INITIAL_BALANCE);
    }

    #[test]
    fn test_reject_nft_returns_it_to_treasury() {
        let mut state = state_with_accounts(&[TREASURY, ALICE]);
        create_token(&mut state, nft_token(NFT_TOKEN, TREASURY), 0);
        mint_nfts(&mut state, NFT_TOKEN, 2);
        associate(&mut state, ALICE, NFT_TOKEN, 0);
        let config = TokenServiceConfig::default();
        let sale = TransactionBody::CryptoTransfer(CryptoTransferBody {
            transfers: Vec::new(),
            token_transfers: vec![TokenTransferList::nfts(
                tid(NFT_TOKEN),
                vec![NftTransfer::new(id(TREASURY), id(ALICE), 2)],
            )],
        });
        run_handler(&mut state, &config, TREASURY, sale).unwrap();

        let rejected = TokenReference::Nft(NftId::new(tid(NFT_TOKEN), 2));
        let err = run_handler(
            &mut state,
            &config,
            ALICE,
            reject(None, vec![TokenReference::Nft(NftId::new(tid(NFT_TOKEN), 1))]),
        )
        .unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::InvalidOwnerId));

        run_handler(&mut state, &config, PAYER, reject(Some(ALICE), vec![rejected])).unwrap();
        assert_eq!(state.nfts.get(&nft_id(NFT_TOKEN, 2)).unwrap().owner_id, None);
        let alice = state.accounts.get(&id(ALICE)).unwrap();
        assert_eq!(alice.number_owned_nfts, 0);
        assert_eq!(alice.head_nft_id, None);
        assert_eq!(state.token_relations.get(&id(TREASURY), &tid(NFT_TOKEN)).unwrap().balance, 2);
    }

    #[test]
    fn test_reject_rejections() {
        let mut state = state_with_accounts(&[TREASURY, ALICE, PAYER]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 1_000);
        associate(&mut state, ALICE, TOKEN, 0);
        let config = TokenServiceConfig::default();
        let fungible = TokenReference::Fungible(tid(TOKEN));

        let err = run_handler(&mut state, &config, ALICE, reject(None, Vec::new())).unwrap_err();
        assert_eq!(err, HandlerError::PreCheck(ResponseCode::EmptyTokenReferenceList));
        let err = run_handler(&mut state, &config, ALICE, reject(None, vec![fungible, fungible])).unwrap_err();
        assert_eq!(err, HandlerError::PreCheck(ResponseCode::TokenReferenceRepeated));
        let err = run_handler(&mut state, &config, ALICE, reject(None, vec![fungible])).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::InsufficientTokenBalance));
        let err = run_handler(&mut state, &config, TREASURY, reject(None, vec![fungible])).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::AccountIsTreasury));
        let err = run_handler(&mut state, &config, PAYER, reject(Some(9_999), vec![fungible])).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::InvalidOwnerId));

        let mut limited = TokenServiceConfig::default();
        limited.tokens.max_allowed_token_rejections = 1;
        let two = reject(
            None,
            vec![fungible, TokenReference::Nft(NftId::new(tid(NFT_TOKEN), 1))],
        );
        let err = run_handler(&mut state, &limited, ALICE, two).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::TokenReferenceListSizeLimitExceeded));
    }

    #[test]
    fn test_reject_balance_outside_signed_range() {
        let mut state = state_with_accounts(&[TREASURY, ALICE]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 0);
        associate(&mut state, ALICE, TOKEN, i64::MAX as u64 + 1);

        let err = run_handler(
            &mut state,
            &TokenServiceConfig::default(),
            ALICE,
            reject(None, vec![TokenReference::Fungible(tid(TOKEN))]),
        )
        .unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::InsufficientTokenBalance));
        assert_eq!(state.token_relations.get(&id(TREASURY), &tid(TOKEN)).unwrap().balance, 0);
    }
}
