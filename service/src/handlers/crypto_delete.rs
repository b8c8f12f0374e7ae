use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::transaction::{body_of, CryptoDeleteBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};

use super::TransactionHandler;

/// Marks an account deleted, sweeping its hbar into the transfer account
pub struct CryptoDeleteHandler;

impl TransactionHandler for CryptoDeleteHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &CryptoDeleteBody = body_of(body)?;
        ensure_pre_check(!op.delete_account_id.is_missing(), ResponseCode::InvalidAccountId)?;
        ensure_pre_check(
            !op.transfer_account_id.is_missing(),
            ResponseCode::InvalidTransferAccountId,
        )?;
        ensure_pre_check(
            op.delete_account_id != op.transfer_account_id,
            ResponseCode::TransferAccountSameAsDeleteAccount,
        )
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &CryptoDeleteBody = body_of(ctx.body())?;
        ctx.require_account_key(&op.delete_account_id, ResponseCode::InvalidAccountId)?;
        ctx.require_receiver_signature(&op.transfer_account_id.into());
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &CryptoDeleteBody = body_of(ctx.body())?;
        let mut deleted = ctx
            .state()
            .accounts
            .get_if_usable(&op.delete_account_id)
            .or_handle()?
            .clone();
        let mut beneficiary = ctx
            .state()
            .accounts
            .get_if_usable(&op.transfer_account_id)
            .map_err(|_| HandlerError::Handle(ResponseCode::InvalidTransferAccountId))?
            .clone();

        ensure(deleted.number_treasury_titles == 0, ResponseCode::AccountIsTreasury)?;
        ensure(
            deleted.number_positive_balances == 0,
            ResponseCode::TransactionRequiresZeroTokenBalances,
        )?;

        beneficiary.tinybar_balance = beneficiary
            .tinybar_balance
            .checked_add(deleted.tinybar_balance)
            .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountAmounts))?;
        deleted.tinybar_balance = 0;
        deleted.deleted = true;
        ctx.state_mut().accounts.put(beneficiary);
        ctx.state_mut().accounts.put(deleted);
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use tokenledger_common::config::TokenServiceConfig;

    fn delete(account: u64, beneficiary: u64) -> TransactionBody {
        TransactionBody::CryptoDelete(CryptoDeleteBody {
            delete_account_id: id(account),
            transfer_account_id: id(beneficiary),
        })
    }

    #[test]
    fn test_delete_sweeps_balance() {
        let mut state = state_with_accounts(&[ALICE, BOB]);
        run_handler(&mut state, &TokenServiceConfig::default(), ALICE, delete(ALICE, BOB)).unwrap();

        let alice = state.accounts.get(&id(ALICE)).unwrap();
        assert!(alice.deleted);
        assert_eq!(alice.tinybar_balance, 0);
        assert_eq!(state.accounts.get(&id(BOB)).unwrap().tinybar_balance, 2 * INITIAL_BALANCE);
        assert_eq!(
            state.accounts.get_if_usable(&id(ALICE)).unwrap_err(),
            ResponseCode::AccountDeleted
        );
    }

    #[test]
    fn test_treasury_and_token_holders_cannot_be_deleted() {
        let mut state = state_with_accounts(&[TREASURY, ALICE, BOB]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 100);
        associate(&mut state, ALICE, TOKEN, 5);

        let err = run_handler(&mut state, &TokenServiceConfig::default(), TREASURY, delete(TREASURY, BOB)).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::AccountIsTreasury));

        let err = run_handler(&mut state, &TokenServiceConfig::default(), ALICE, delete(ALICE, BOB)).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::TransactionRequiresZeroTokenBalances));

        let err = run_handler(&mut state, &TokenServiceConfig::default(), BOB, delete(BOB, BOB)).unwrap_err();
        assert_eq!(err, HandlerError::PreCheck(ResponseCode::TransferAccountSameAsDeleteAccount));
    }
}
