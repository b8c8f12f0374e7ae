// Allowance handlers
// Approve grants hbar, fungible and NFT allowances; delete clears the
// spender of individual NFT serials. Entries without an owner, or naming
// the payer, act on the payer's own account.

use log::debug;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::{AccountId, NftId, TokenId};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Account, Token};
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::{
    body_of, CryptoApproveAllowanceBody, CryptoDeleteAllowanceBody, NftAllowance, TransactionBody,
};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::allowances::{update_approve_for_all, update_crypto_allowance, update_token_allowance};

use super::TransactionHandler;

pub struct CryptoApproveAllowanceHandler;

pub struct CryptoDeleteAllowanceHandler;

/// Owner named by an entry, or the payer
fn resolve_owner(state: &TokenServiceState, payer: AccountId, owner: Option<AccountId>) -> HandlerResult<Account> {
    let owner_id = owner.unwrap_or(payer);
    state
        .accounts
        .get_if_usable(&owner_id)
        .cloned()
        .map_err(|_| HandlerError::Handle(ResponseCode::InvalidAllowanceOwnerId))
}

fn require_owner_key(ctx: &mut PreHandleContext, owner: Option<AccountId>) -> HandlerResult<()> {
    match owner {
        Some(owner) if owner != ctx.payer() => {
            ctx.require_account_key(&owner, ResponseCode::InvalidAllowanceOwnerId)
        }
        _ => Ok(()),
    }
}

fn check_spender(state: &TokenServiceState, owner: &Account, spender: AccountId) -> HandlerResult<()> {
    ensure(spender != owner.account_id, ResponseCode::SpenderAccountSameAsOwner)?;
    state
        .accounts
        .get_if_usable(&spender)
        .map_err(|_| HandlerError::Handle(ResponseCode::InvalidAllowanceSpenderId))?;
    Ok(())
}

fn ensure_associated(state: &TokenServiceState, owner: &Account, token_id: TokenId) -> HandlerResult<()> {
    ensure(
        state.token_relations.get(&owner.account_id, &token_id).is_some(),
        ResponseCode::TokenNotAssociatedToAccount,
    )
}

/// Serials of `token` must exist and belong to `owner`
fn owned_serials(
    state: &TokenServiceState,
    token: &Token,
    owner: AccountId,
    serial_numbers: &[i64],
) -> HandlerResult<Vec<NftId>> {
    serial_numbers
        .iter()
        .map(|serial| {
            let nft_id = NftId::new(token.token_id, *serial as u64);
            let nft = state
                .nfts
                .get(&nft_id)
                .ok_or(HandlerError::Handle(ResponseCode::InvalidNftId))?;
            ensure(
                nft.owner_or(token.treasury_account_id) == owner,
                ResponseCode::SenderDoesNotOwnNftSerialNo,
            )?;
            Ok(nft_id)
        })
        .collect()
}

fn check_serials(serial_numbers: &[i64]) -> HandlerResult<()> {
    for serial in serial_numbers {
        ensure_pre_check(*serial > 0, ResponseCode::InvalidTokenNftSerialNumber)?;
    }
    Ok(())
}

// ========================================
// Approve
// ========================================

impl CryptoApproveAllowanceHandler {
    fn approve_nft(&self, ctx: &mut HandleContext, allowance: &NftAllowance) -> HandlerResult<()> {
        let max_account_limit = ctx.config().allowances.max_account_limit;
        let mut owner = resolve_owner(ctx.state(), ctx.payer(), allowance.owner)?;
        let token = ctx
            .state()
            .tokens
            .get_if_usable(&allowance.token_id)
            .or_handle()?
            .clone();
        ensure(!token.is_fungible(), ResponseCode::FungibleTokenInNftAllowances)?;
        check_spender(ctx.state(), &owner, allowance.spender)?;
        ensure_associated(ctx.state(), &owner, token.token_id)?;

        if let Some(delegating) = allowance.delegating_spender {
            ensure(
                allowance.approved_for_all != Some(true),
                ResponseCode::DelegatingSpenderCannotGrantApproveForAll,
            )?;
            ensure(
                owner.is_approved_for_all(token.token_id, delegating),
                ResponseCode::DelegatingSpenderDoesNotHaveApproveForAll,
            )?;
        }

        let serials = owned_serials(ctx.state(), &token, owner.account_id, &allowance.serial_numbers)?;
        for nft_id in serials {
            if let Some(mut nft) = ctx.state().nfts.get(&nft_id).cloned() {
                nft.spender_id = Some(allowance.spender);
                ctx.state_mut().nfts.put(nft);
            }
        }
        if let Some(approved) = allowance.approved_for_all {
            update_approve_for_all(
                &mut owner,
                token.token_id,
                allowance.spender,
                approved,
                max_account_limit,
            )?;
            ctx.state_mut().accounts.put(owner);
        }
        Ok(())
    }
}

impl TransactionHandler for CryptoApproveAllowanceHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &CryptoApproveAllowanceBody = body_of(body)?;
        ensure_pre_check(op.total_entries() > 0, ResponseCode::EmptyAllowances)?;
        for allowance in &op.crypto_allowances {
            ensure_pre_check(allowance.amount >= 0, ResponseCode::NegativeAllowanceAmount)?;
        }
        for allowance in &op.token_allowances {
            ensure_pre_check(allowance.amount >= 0, ResponseCode::NegativeAllowanceAmount)?;
        }
        for allowance in &op.nft_allowances {
            check_serials(&allowance.serial_numbers)?;
        }
        Ok(())
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &CryptoApproveAllowanceBody = body_of(ctx.body())?;
        for allowance in &op.crypto_allowances {
            require_owner_key(ctx, allowance.owner)?;
        }
        for allowance in &op.token_allowances {
            require_owner_key(ctx, allowance.owner)?;
        }
        for allowance in &op.nft_allowances {
            match allowance.delegating_spender {
                Some(delegating) if delegating != ctx.payer() => {
                    ctx.require_account_key(&delegating, ResponseCode::InvalidAllowanceSpenderId)?
                }
                Some(_) => {}
                None => require_owner_key(ctx, allowance.owner)?,
            }
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &CryptoApproveAllowanceBody = body_of(ctx.body())?;
        let config = &ctx.config().allowances;
        ensure(config.is_enabled, ResponseCode::NotSupported)?;
        ensure(
            op.total_entries() <= config.max_transaction_limit,
            ResponseCode::MaxAllowancesExceeded,
        )?;

        // Step 1: Hbar
        for allowance in &op.crypto_allowances {
            let mut owner = resolve_owner(ctx.state(), ctx.payer(), allowance.owner)?;
            check_spender(ctx.state(), &owner, allowance.spender)?;
            update_crypto_allowance(
                &mut owner,
                allowance.spender,
                allowance.amount as u64,
                config.max_account_limit,
            )?;
            ctx.state_mut().accounts.put(owner);
        }

        // Step 2: Fungible tokens
        for allowance in &op.token_allowances {
            let mut owner = resolve_owner(ctx.state(), ctx.payer(), allowance.owner)?;
            let token = ctx
                .state()
                .tokens
                .get_if_usable(&allowance.token_id)
                .or_handle()?
                .clone();
            ensure(token.is_fungible(), ResponseCode::NftInFungibleTokenAllowances)?;
            if token.is_finite() {
                ensure(
                    allowance.amount as u64 <= token.max_supply,
                    ResponseCode::AmountExceedsTokenMaxSupply,
                )?;
            }
            check_spender(ctx.state(), &owner, allowance.spender)?;
            ensure_associated(ctx.state(), &owner, token.token_id)?;
            update_token_allowance(
                &mut owner,
                token.token_id,
                allowance.spender,
                allowance.amount as u64,
                config.max_account_limit,
            )?;
            ctx.state_mut().accounts.put(owner);
        }

        // Step 3: NFTs
        for allowance in &op.nft_allowances {
            self.approve_nft(ctx, allowance)?;
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!("Approved {} allowance entries for payer {}", op.total_entries(), ctx.payer());
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<CryptoApproveAllowanceBody>(ctx.body()) {
            Ok(op) => ctx.fees_with_items(op.total_entries()),
            Err(_) => ctx.base_fees(),
        }
    }
}

// ========================================
// Delete
// ========================================

impl TransactionHandler for CryptoDeleteAllowanceHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &CryptoDeleteAllowanceBody = body_of(body)?;
        ensure_pre_check(!op.nft_allowances.is_empty(), ResponseCode::EmptyAllowances)?;
        for allowance in &op.nft_allowances {
            ensure_pre_check(!allowance.serial_numbers.is_empty(), ResponseCode::EmptyAllowances)?;
            check_serials(&allowance.serial_numbers)?;
        }
        Ok(())
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &CryptoDeleteAllowanceBody = body_of(ctx.body())?;
        for allowance in &op.nft_allowances {
            require_owner_key(ctx, allowance.owner)?;
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &CryptoDeleteAllowanceBody = body_of(ctx.body())?;
        let config = &ctx.config().allowances;
        ensure(config.is_enabled, ResponseCode::NotSupported)?;
        let serial_count: usize = op.nft_allowances.iter().map(|a| a.serial_numbers.len()).sum();
        ensure(
            serial_count <= config.max_transaction_limit,
            ResponseCode::MaxAllowancesExceeded,
        )?;

        for allowance in &op.nft_allowances {
            let owner = resolve_owner(ctx.state(), ctx.payer(), allowance.owner)?;
            let token = ctx
                .state()
                .tokens
                .get_if_usable(&allowance.token_id)
                .or_handle()?
                .clone();
            ensure(!token.is_fungible(), ResponseCode::FungibleTokenInNftAllowances)?;
            let serials = owned_serials(ctx.state(), &token, owner.account_id, &allowance.serial_numbers)?;
            for nft_id in serials {
                if let Some(mut nft) = ctx.state().nfts.get(&nft_id).cloned() {
                    nft.spender_id = None;
                    ctx.state_mut().nfts.put(nft);
                }
            }
        }
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<CryptoDeleteAllowanceBody>(ctx.body()) {
            Ok(op) => ctx.fees_with_items(op.nft_allowances.iter().map(|a| a.serial_numbers.len()).sum()),
            Err(_) => ctx.base_fees(),
        }
    }
}
