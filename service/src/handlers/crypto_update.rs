use tokenledger_common::error::{ensure, ensure_pre_check, HandlerResult, ResponseCodeExt};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::UNLIMITED_AUTO_ASSOCIATIONS;
use tokenledger_common::transaction::{body_of, CryptoUpdateBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};

use super::crypto_create::check_max_auto_associations;
use super::TransactionHandler;

pub struct CryptoUpdateHandler;

impl TransactionHandler for CryptoUpdateHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &CryptoUpdateBody = body_of(body)?;
        ensure_pre_check(!op.account_id.is_missing(), ResponseCode::InvalidAccountId)?;
        if let Some(key) = &op.key {
            ensure_pre_check(key.is_valid(), ResponseCode::BadEncoding)?;
        }
        if let Some(max) = op.max_automatic_token_associations {
            ensure_pre_check(max >= UNLIMITED_AUTO_ASSOCIATIONS, ResponseCode::InvalidMaxAutoAssociations)?;
        }
        Ok(())
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &CryptoUpdateBody = body_of(ctx.body())?;
        ctx.require_account_key(&op.account_id, ResponseCode::InvalidAccountId)?;
        if let Some(key) = &op.key {
            ctx.require_key(key);
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &CryptoUpdateBody = body_of(ctx.body())?;
        let config = ctx.config();
        let mut account = ctx
            .state()
            .accounts
            .get_if_usable(&op.account_id)
            .or_handle()?
            .clone();

        if let Some(memo) = &op.memo {
            ensure(memo.len() <= config.entities.max_memo_utf8_bytes, ResponseCode::MemoTooLong)?;
            account.memo = memo.clone();
        }
        if let Some(expiration_second) = op.expiration_second {
            ensure(
                expiration_second >= account.expiration_second,
                ResponseCode::ExpirationReductionNotAllowed,
            )?;
            account.expiration_second = expiration_second;
        }
        if let Some(max) = op.max_automatic_token_associations {
            check_max_auto_associations(config, max)?;
            if max != UNLIMITED_AUTO_ASSOCIATIONS {
                ensure(
                    account.used_auto_associations as i64 <= max as i64,
                    ResponseCode::ExistingAutomaticAssociationsExceedGivenLimit,
                )?;
            }
            account.max_auto_associations = max;
        }
        if let Some(required) = op.receiver_sig_required {
            account.receiver_sig_required = required;
        }
        if let Some(key) = &op.key {
            account.key = Some(key.clone());
        }
        ctx.state_mut().accounts.put(account);
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}
