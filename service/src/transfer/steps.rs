// Transfer steps
// Each step applies one concern of a resolved transfer. Steps write
// through the state as they go; a failing step leaves partial writes
// that the enclosing savepoint rolls back.

use indexmap::IndexMap;
use log::trace;

use tokenledger_common::error::{ensure, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::{AccountId, NftId};
use tokenledger_common::record::TokenAssociation;
use tokenledger_common::response::ResponseCode;

use crate::ledger::allowances::{use_crypto_allowance, use_token_allowance};
use crate::ledger::nft_chain::change_nft_owner;
use crate::ledger::token_rels::auto_associate;
use crate::ledger::update_positive_balances;

use super::executor::TransferContext;
use super::{net_changes, ResolvedTransfers};

pub trait TransferStep {
    fn do_in(&self, ctx: &mut TransferContext, transfers: &ResolvedTransfers) -> HandlerResult<()>;
}

// ========================================
// Association
// ========================================

/// Make sure every account touched by a token list has a usable relation,
/// auto-associating receivers that have none
pub struct AssociateTokenRecipients;

impl TransferStep for AssociateTokenRecipients {
    fn do_in(&self, ctx: &mut TransferContext, transfers: &ResolvedTransfers) -> HandlerResult<()> {
        for list in &transfers.tokens {
            let token = ctx
                .state()
                .tokens
                .get_if_usable(&list.token_id)
                .or_handle()?
                .clone();

            // Accounts in first-seen order, flagged when they receive anything
            let mut touched: IndexMap<AccountId, bool> = IndexMap::new();
            for adjustment in &list.adjustments {
                *touched.entry(adjustment.account_id).or_insert(false) |= adjustment.amount > 0;
            }
            for nft in &list.nft_transfers {
                touched.entry(nft.sender_id).or_insert(false);
                *touched.entry(nft.receiver_id).or_insert(false) = true;
            }

            for (account_id, receives) in touched {
                ctx.state().accounts.get_if_usable(&account_id).or_handle()?;
                let existing = ctx
                    .state()
                    .token_relations
                    .get(&account_id, &token.token_id)
                    .cloned();
                let rel = match existing {
                    Some(rel) => rel,
                    None if receives => {
                        let config = ctx.config();
                        let rel = auto_associate(ctx.state_mut(), config, account_id, &token)?;
                        ctx.add_automatic_association(TokenAssociation {
                            token_id: token.token_id,
                            account_id,
                        });
                        rel
                    }
                    None => return Err(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount)),
                };
                ensure(!rel.frozen, ResponseCode::AccountFrozenForToken)?;
                ensure(rel.kyc_granted, ResponseCode::AccountKycNotGrantedForToken)?;
            }
        }
        Ok(())
    }
}

// ========================================
// Hbar
// ========================================

pub struct AdjustHbarChanges;

impl TransferStep for AdjustHbarChanges {
    fn do_in(&self, ctx: &mut TransferContext, transfers: &ResolvedTransfers) -> HandlerResult<()> {
        if transfers.hbar.is_empty() {
            return Ok(());
        }
        let spender = ctx.payer();

        // Step 1: Approved debits spend the owner's allowance to the payer
        for debit in transfers.hbar.iter().filter(|a| a.is_approval && a.amount < 0) {
            let mut owner = ctx
                .state()
                .accounts
                .get_if_usable(&debit.account_id)
                .or_handle()?
                .clone();
            use_crypto_allowance(&mut owner, spender, debit.amount.unsigned_abs())?;
            ctx.state_mut().accounts.put(owner);
        }

        // Step 2: Net balances
        for (account_id, change) in net_changes(&transfers.hbar)? {
            let mut account = ctx
                .state()
                .accounts
                .get_if_usable(&account_id)
                .or_handle()?
                .clone();
            let balance = account.tinybar_balance as i128 + change as i128;
            ensure(balance >= 0, ResponseCode::InsufficientAccountBalance)?;
            account.tinybar_balance =
                u64::try_from(balance).map_err(|_| HandlerError::Handle(ResponseCode::InvalidAccountAmounts))?;
            ctx.state_mut().accounts.put(account);
        }
        Ok(())
    }
}

// ========================================
// Fungible tokens
// ========================================

pub struct AdjustFungibleTokenChanges;

impl TransferStep for AdjustFungibleTokenChanges {
    fn do_in(&self, ctx: &mut TransferContext, transfers: &ResolvedTransfers) -> HandlerResult<()> {
        let spender = ctx.payer();
        for list in transfers.tokens.iter().filter(|l| !l.adjustments.is_empty()) {
            let token = ctx
                .state()
                .tokens
                .get_if_usable(&list.token_id)
                .or_handle()?
                .clone();
            ensure(
                token.is_fungible(),
                ResponseCode::AccountAmountTransfersOnlyAllowedForFungibleCommon,
            )?;
            if let Some(decimals) = list.expected_decimals {
                ensure(decimals == token.decimals, ResponseCode::UnexpectedTokenDecimals)?;
            }

            for debit in list.adjustments.iter().filter(|a| a.is_approval && a.amount < 0) {
                let mut owner = ctx
                    .state()
                    .accounts
                    .get_if_usable(&debit.account_id)
                    .or_handle()?
                    .clone();
                use_token_allowance(&mut owner, token.token_id, spender, debit.amount.unsigned_abs())?;
                ctx.state_mut().accounts.put(owner);
            }

            for (account_id, change) in net_changes(&list.adjustments)? {
                if change == 0 {
                    continue;
                }
                let mut rel = ctx
                    .state()
                    .token_relations
                    .get(&account_id, &token.token_id)
                    .cloned()
                    .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
                let balance = rel.balance as i128 + change as i128;
                ensure(balance >= 0, ResponseCode::InsufficientTokenBalance)?;
                let balance = u64::try_from(balance)
                    .map_err(|_| HandlerError::Handle(ResponseCode::InvalidAccountAmounts))?;

                let mut account = ctx
                    .state()
                    .accounts
                    .get(&account_id)
                    .cloned()
                    .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
                update_positive_balances(&mut account, rel.balance, balance);
                rel.balance = balance;
                ctx.state_mut().accounts.put(account);
                ctx.state_mut().token_relations.put(rel);
            }
        }
        Ok(())
    }
}

// ========================================
// NFTs
// ========================================

pub struct NftOwnersChange;

impl TransferStep for NftOwnersChange {
    fn do_in(&self, ctx: &mut TransferContext, transfers: &ResolvedTransfers) -> HandlerResult<()> {
        let spender = ctx.payer();
        for list in transfers.tokens.iter().filter(|l| !l.nft_transfers.is_empty()) {
            let token = ctx
                .state()
                .tokens
                .get_if_usable(&list.token_id)
                .or_handle()?
                .clone();
            ensure(!token.is_fungible(), ResponseCode::InvalidNftId)?;
            if let Some(decimals) = list.expected_decimals {
                ensure(decimals == token.decimals, ResponseCode::UnexpectedTokenDecimals)?;
            }

            for transfer in &list.nft_transfers {
                let nft_id = NftId::new(token.token_id, transfer.serial_number);
                let nft = ctx
                    .state()
                    .nfts
                    .get(&nft_id)
                    .cloned()
                    .ok_or(HandlerError::Handle(ResponseCode::InvalidNftId))?;
                ensure(
                    nft.owner_or(token.treasury_account_id) == transfer.sender_id,
                    ResponseCode::SenderDoesNotOwnNftSerialNo,
                )?;
                if transfer.is_approval {
                    let approved_for_all = ctx
                        .state()
                        .accounts
                        .get(&transfer.sender_id)
                        .is_some_and(|owner| owner.is_approved_for_all(token.token_id, spender));
                    ensure(
                        nft.spender_id == Some(spender) || approved_for_all,
                        ResponseCode::SpenderDoesNotHaveAllowance,
                    )?;
                }
                if log::log_enabled!(log::Level::Trace) {
                    trace!(
                        "Moving NFT {} from {} to {}",
                        nft_id,
                        transfer.sender_id,
                        transfer.receiver_id
                    );
                }
                change_nft_owner(
                    ctx.state_mut(),
                    &token,
                    nft,
                    transfer.sender_id,
                    transfer.receiver_id,
                )?;
            }
        }
        Ok(())
    }
}
