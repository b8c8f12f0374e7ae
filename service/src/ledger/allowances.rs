// Allowance bookkeeping
// Allowances live on the owner account as plain lists scanned by key.
// Approving zero removes an entry; the per-account ceiling is only
// checked when a new entry is appended.

use tokenledger_common::error::{ensure, HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, TokenId};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{
    Account, AccountApprovalForAllAllowance, AccountCryptoAllowance, AccountFungibleTokenAllowance,
};

fn ensure_room_for_one_more(owner: &Account, max_account_limit: usize) -> HandlerResult<()> {
    ensure(
        owner.total_allowances() < max_account_limit,
        ResponseCode::MaxAllowancesExceeded,
    )
}

/// Add, replace or remove the hbar allowance of `spender`
pub fn update_crypto_allowance(
    owner: &mut Account,
    spender_id: AccountId,
    amount: u64,
    max_account_limit: usize,
) -> HandlerResult<()> {
    let position = owner
        .crypto_allowances
        .iter()
        .position(|a| a.spender_id == spender_id);
    match (position, amount) {
        (Some(i), 0) => {
            owner.crypto_allowances.remove(i);
        }
        (Some(i), amount) => owner.crypto_allowances[i].amount = amount,
        (None, 0) => {}
        (None, amount) => {
            ensure_room_for_one_more(owner, max_account_limit)?;
            owner
                .crypto_allowances
                .push(AccountCryptoAllowance { spender_id, amount });
        }
    }
    Ok(())
}

/// Add, replace or remove the fungible allowance of `spender` on `token_id`
pub fn update_token_allowance(
    owner: &mut Account,
    token_id: TokenId,
    spender_id: AccountId,
    amount: u64,
    max_account_limit: usize,
) -> HandlerResult<()> {
    let position = owner
        .token_allowances
        .iter()
        .position(|a| a.token_id == token_id && a.spender_id == spender_id);
    match (position, amount) {
        (Some(i), 0) => {
            owner.token_allowances.remove(i);
        }
        (Some(i), amount) => owner.token_allowances[i].amount = amount,
        (None, 0) => {}
        (None, amount) => {
            ensure_room_for_one_more(owner, max_account_limit)?;
            owner.token_allowances.push(AccountFungibleTokenAllowance {
                token_id,
                spender_id,
                amount,
            });
        }
    }
    Ok(())
}

/// Grant or revoke approve-for-all of `spender` on `token_id`
pub fn update_approve_for_all(
    owner: &mut Account,
    token_id: TokenId,
    spender_id: AccountId,
    approved: bool,
    max_account_limit: usize,
) -> HandlerResult<()> {
    let position = owner
        .approve_for_all_nft_allowances
        .iter()
        .position(|a| a.token_id == token_id && a.spender_id == spender_id);
    match (position, approved) {
        (Some(i), false) => {
            owner.approve_for_all_nft_allowances.remove(i);
        }
        (None, true) => {
            ensure_room_for_one_more(owner, max_account_limit)?;
            owner
                .approve_for_all_nft_allowances
                .push(AccountApprovalForAllAllowance { token_id, spender_id });
        }
        _ => {}
    }
    Ok(())
}

/// Spend `amount` tinybars of the owner's allowance to `spender`
pub fn use_crypto_allowance(owner: &mut Account, spender_id: AccountId, amount: u64) -> HandlerResult<()> {
    let position = owner
        .crypto_allowances
        .iter()
        .position(|a| a.spender_id == spender_id)
        .ok_or(HandlerError::Handle(ResponseCode::SpenderDoesNotHaveAllowance))?;
    let remaining = owner.crypto_allowances[position]
        .amount
        .checked_sub(amount)
        .ok_or(HandlerError::Handle(ResponseCode::AmountExceedsAllowance))?;
    if remaining == 0 {
        owner.crypto_allowances.remove(position);
    } else {
        owner.crypto_allowances[position].amount = remaining;
    }
    Ok(())
}

/// Spend `amount` units of the owner's `token_id` allowance to `spender`
pub fn use_token_allowance(
    owner: &mut Account,
    token_id: TokenId,
    spender_id: AccountId,
    amount: u64,
) -> HandlerResult<()> {
    let position = owner
        .token_allowances
        .iter()
        .position(|a| a.token_id == token_id && a.spender_id == spender_id)
        .ok_or(HandlerError::Handle(ResponseCode::SpenderDoesNotHaveAllowance))?;
    let remaining = owner.token_allowances[position]
        .amount
        .checked_sub(amount)
        .ok_or(HandlerError::Handle(ResponseCode::AmountExceedsAllowance))?;
    if remaining == 0 {
        owner.token_allowances.remove(position);
    } else {
        owner.token_allowances[position].amount = remaining;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_crypto_allowance_add_replace_remove() {
        let mut owner = account(ALICE);
        update_crypto_allowance(&mut owner, id(BOB), 50, 100).unwrap();
        assert_eq!(owner.crypto_allowances.len(), 1);
        assert_eq!(owner.crypto_allowances[0].amount, 50);

        update_crypto_allowance(&mut owner, id(BOB), 80, 100).unwrap();
        assert_eq!(owner.crypto_allowances.len(), 1);
        assert_eq!(owner.crypto_allowances[0].amount, 80);

        update_crypto_allowance(&mut owner, id(BOB), 0, 100).unwrap();
        assert!(owner.crypto_allowances.is_empty());

        update_crypto_allowance(&mut owner, id(BOB), 0, 100).unwrap();
        assert!(owner.crypto_allowances.is_empty());
    }

    #[test]
    fn test_account_limit_only_on_add() {
        let mut owner = account(ALICE);
        update_token_allowance(&mut owner, tid(TOKEN), id(BOB), 5, 1).unwrap();

        let err = update_crypto_allowance(&mut owner, id(BOB), 5, 1).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::MaxAllowancesExceeded));

        update_token_allowance(&mut owner, tid(TOKEN), id(BOB), 9, 1).unwrap();
        assert_eq!(owner.token_allowances[0].amount, 9);
    }

    #[test]
    fn test_approve_for_all_toggle() {
        let mut owner = account(ALICE);
        update_approve_for_all(&mut owner, tid(NFT_TOKEN), id(BOB), true, 10).unwrap();
        update_approve_for_all(&mut owner, tid(NFT_TOKEN), id(BOB), true, 10).unwrap();
        assert!(owner.is_approved_for_all(tid(NFT_TOKEN), id(BOB)));
        assert_eq!(owner.approve_for_all_nft_allowances.len(), 1);

        update_approve_for_all(&mut owner, tid(NFT_TOKEN), id(BOB), false, 10).unwrap();
        assert!(!owner.is_approved_for_all(tid(NFT_TOKEN), id(BOB)));
    }

    #[test]
    fn test_spending_allowances() {
        let mut owner = account(ALICE);
        update_crypto_allowance(&mut owner, id(BOB), 30, 10).unwrap();
        use_crypto_allowance(&mut owner, id(BOB), 10).unwrap();
        assert_eq!(owner.crypto_allowances[0].amount, 20);

        let err = use_crypto_allowance(&mut owner, id(BOB), 21).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::AmountExceedsAllowance));
        let err = use_crypto_allowance(&mut owner, id(CAROL), 1).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::SpenderDoesNotHaveAllowance));

        use_crypto_allowance(&mut owner, id(BOB), 20).unwrap();
        assert!(owner.crypto_allowances.is_empty());

        update_token_allowance(&mut owner, tid(TOKEN), id(BOB), 4, 10).unwrap();
        use_token_allowance(&mut owner, tid(TOKEN), id(BOB), 4).unwrap();
        assert!(owner.token_allowances.is_empty());
    }
}
