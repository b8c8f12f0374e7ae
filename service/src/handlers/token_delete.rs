use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::transaction::{body_of, TokenDeleteBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};

use super::TransactionHandler;

/// Marks a token deleted; its treasury gives up one treasury title
pub struct TokenDeleteHandler;

impl TransactionHandler for TokenDeleteHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenDeleteBody = body_of(body)?;
        ensure_pre_check(op.token_id.num != 0, ResponseCode::InvalidTokenId)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenDeleteBody = body_of(ctx.body())?;
        let token = ctx
            .state()
            .tokens
            .get(&op.token_id)
            .ok_or(HandlerError::PreCheck(ResponseCode::InvalidTokenId))?;
        ctx.require_key_or(token.admin_key.as_ref(), ResponseCode::TokenIsImmutable)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenDeleteBody = body_of(ctx.body())?;
        let mut token = ctx
            .state()
            .tokens
            .get_if_usable(&op.token_id)
            .or_handle()?
            .clone();
        ensure(token.admin_key.is_some(), ResponseCode::TokenIsImmutable)?;

        if let Some(mut treasury) = ctx.state().accounts.get(&token.treasury_account_id).cloned() {
            treasury.number_treasury_titles = treasury.number_treasury_titles.saturating_sub(1);
            ctx.state_mut().accounts.put(treasury);
        }
        token.deleted = true;
        ctx.state_mut().tokens.put(token);
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}
