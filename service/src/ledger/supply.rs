// Supply changes
// Mint, burn and wipe all move a token's total supply together with the
// balance of exactly one relation: the treasury's for mint and burn, the
// wiped holder's for wipe.

use log::error;

use tokenledger_common::error::{ensure, HandlerError, HandlerResult};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Token, TokenRelation};
use tokenledger_common::store::TokenServiceState;

use super::update_positive_balances;

/// Change the total supply of a token through its treasury relation
///
/// # Parameters
/// - `state`: Token service state
/// - `token`: Token whose supply changes
/// - `treasury_rel`: Relation between the token and its treasury
/// - `amount`: Signed change, positive for mint, negative for burn
/// - `invalid_supply_code`: Code raised when the supply would go negative
///   or leave the signed 64-bit range
///
/// # Returns
/// - `Ok(u64)`: The new total supply
/// - `Err(HandlerError)`: `invalid_supply_code`, `TOKEN_MAX_SUPPLY_REACHED`
///   or `INSUFFICIENT_TOKEN_BALANCE`
pub fn change_supply(
    state: &mut TokenServiceState,
    token: &Token,
    treasury_rel: &TokenRelation,
    amount: i64,
    invalid_supply_code: ResponseCode,
) -> HandlerResult<u64> {
    if treasury_rel.account_id != token.treasury_account_id || treasury_rel.token_id != token.token_id {
        error!(
            "Supply change for token {} given relation {} of a non-treasury account",
            token.token_id,
            treasury_rel.key()
        );
        return Err(HandlerError::Handle(ResponseCode::FailInvalid));
    }
    apply_supply_change(
        state,
        token,
        treasury_rel,
        amount,
        invalid_supply_code,
        ResponseCode::InsufficientTokenBalance,
    )
}

/// Remove `amount` units held by a non-treasury account from circulation
pub fn wipe_supply(
    state: &mut TokenServiceState,
    token: &Token,
    holder_rel: &TokenRelation,
    amount: u64,
) -> HandlerResult<u64> {
    if holder_rel.account_id == token.treasury_account_id || holder_rel.token_id != token.token_id {
        error!(
            "Wipe of token {} given relation {} of its treasury",
            token.token_id,
            holder_rel.key()
        );
        return Err(HandlerError::Handle(ResponseCode::FailInvalid));
    }
    let amount = i64::try_from(amount).map_err(|_| HandlerError::Handle(ResponseCode::InvalidWipingAmount))?;
    apply_supply_change(
        state,
        token,
        holder_rel,
        -amount,
        ResponseCode::InvalidWipingAmount,
        ResponseCode::InvalidWipingAmount,
    )
}

fn apply_supply_change(
    state: &mut TokenServiceState,
    token: &Token,
    rel: &TokenRelation,
    amount: i64,
    invalid_supply_code: ResponseCode,
    insufficient_balance_code: ResponseCode,
) -> HandlerResult<u64> {
    // Step 1: New total supply stays within [0, max supply] and the signed 64-bit range
    let new_total_supply = token.total_supply as i128 + amount as i128;
    ensure(new_total_supply >= 0, invalid_supply_code)?;
    ensure(new_total_supply <= i64::MAX as i128, invalid_supply_code)?;
    if token.is_finite() {
        ensure(
            new_total_supply <= token.max_supply as i128,
            ResponseCode::TokenMaxSupplyReached,
        )?;
    }
    let new_total_supply = u64::try_from(new_total_supply)
        .map_err(|_| HandlerError::Handle(ResponseCode::TokenMaxSupplyReached))?;

    // Step 2: Relation balance never goes negative
    let new_balance = rel.balance as i128 + amount as i128;
    ensure(new_balance >= 0, insufficient_balance_code)?;
    ensure(new_balance <= i64::MAX as i128, invalid_supply_code)?;
    let new_balance =
        u64::try_from(new_balance).map_err(|_| HandlerError::Handle(ResponseCode::FailInvalid))?;

    // Step 3: Positive balance counter of the holder
    let mut account = state
        .accounts
        .get(&rel.account_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
    update_positive_balances(&mut account, rel.balance, new_balance);

    // Step 4: Write back token, account and relation
    let mut token = token.clone();
    token.total_supply = new_total_supply;
    let mut rel = rel.clone();
    rel.balance = new_balance;
    state.tokens.put(token);
    state.accounts.put(account);
    state.token_relations.put(rel);

    Ok(new_total_supply)
}
