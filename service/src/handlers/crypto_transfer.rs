use tokenledger_common::error::HandlerResult;
use tokenledger_common::ids::{AccountRef, TokenId};
use tokenledger_common::key::Key;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::CustomFeeKind;
use tokenledger_common::transaction::{body_of, AccountAmount, CryptoTransferBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext, WarmupContext};
use crate::fees::{FeeContext, Fees};
use crate::transfer::validation::check_transfer_body;
use crate::transfer::{TransferExecutor, TransferOptions};

use super::TransactionHandler;

/// Hbar, fungible and NFT transfers between accounts
pub struct CryptoTransferHandler;

/// Debited accounts sign unless the debit spends an allowance; credited
/// accounts sign only when they require it
pub(crate) fn require_adjustment_keys(ctx: &mut PreHandleContext, transfers: &[AccountAmount]) -> HandlerResult<()> {
    for transfer in transfers {
        if transfer.amount < 0 && !transfer.is_approval {
            ctx.require_account_key_by_ref(&transfer.account, ResponseCode::InvalidAccountId)?;
        } else if transfer.amount > 0 {
            ctx.require_receiver_signature(&transfer.account);
        }
    }
    Ok(())
}

/// Key of an NFT receiver that may owe a royalty fallback fee, unless exempt
fn fallback_fee_payer_key(ctx: &PreHandleContext, token_id: &TokenId, receiver: &AccountRef) -> Option<Key> {
    let state = ctx.state();
    let token = state.tokens.get(token_id)?;
    let account = state.accounts.get_by_ref(receiver)?;
    let receiver_id = account.account_id;
    let may_owe_fallback = token.custom_fees.iter().any(|fee| match &fee.fee {
        CustomFeeKind::Royalty(royalty) => {
            royalty.fallback_fee.is_some()
                && receiver_id != token.treasury_account_id
                && receiver_id != fee.fee_collector_account_id
                && !(fee.all_collectors_are_exempt && token.is_fee_collector(receiver_id))
        }
        _ => false,
    });
    if may_owe_fallback {
        account.key.clone()
    } else {
        None
    }
}

/// Number of balance changes and NFT movements priced per transfer
pub(crate) fn transfer_count(body: &CryptoTransferBody) -> usize {
    body.transfers.len()
        + body
            .token_transfers
            .iter()
            .map(|l| l.transfers.len() + l.nft_transfers.len())
            .sum::<usize>()
}

/// Surcharge for every transferred token that carries custom fees
pub(crate) fn custom_fee_surcharge(ctx: &FeeContext, body: &CryptoTransferBody) -> u64 {
    let charged = body
        .token_transfers
        .iter()
        .filter(|list| {
            ctx.state()
                .tokens
                .get(&list.token_id)
                .is_some_and(|token| !token.custom_fees.is_empty())
        })
        .count() as u64;
    ctx.fees_config().custom_fee_surcharge.saturating_mul(charged)
}

impl TransactionHandler for CryptoTransferHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &CryptoTransferBody = body_of(body)?;
        check_transfer_body(op)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &CryptoTransferBody = body_of(ctx.body())?;
        require_adjustment_keys(ctx, &op.transfers)?;
        for list in &op.token_transfers {
            require_adjustment_keys(ctx, &list.transfers)?;
            for nft in &list.nft_transfers {
                if !nft.is_approval {
                    ctx.require_account_key_by_ref(&nft.sender, ResponseCode::InvalidAccountId)?;
                }
                ctx.require_receiver_signature(&nft.receiver);
                if let Some(key) = fallback_fee_payer_key(ctx, &list.token_id, &nft.receiver) {
                    ctx.require_key(&key);
                }
            }
        }
        Ok(())
    }

    fn warm(&self, ctx: &WarmupContext) {
        let Ok(op) = body_of::<CryptoTransferBody>(ctx.body()) else {
            return;
        };
        let state = ctx.state();
        for transfer in &op.transfers {
            state.accounts.warm(&transfer.account);
        }
        for list in &op.token_transfers {
            state.tokens.warm(&list.token_id);
            for transfer in &list.transfers {
                state.accounts.warm(&transfer.account);
            }
        }
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &CryptoTransferBody = body_of(ctx.body())?;
        TransferExecutor::execute(ctx, op, TransferOptions::WITH_CUSTOM_FEES)
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        let Ok(op) = body_of::<CryptoTransferBody>(ctx.body()) else {
            return ctx.base_fees();
        };
        ctx.fees_with_transfers(transfer_count(op))
            .plus_service(custom_fee_surcharge(ctx, op))
    }
}
