use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::key::Key;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Token, TokenRelation};
use tokenledger_common::transaction::{body_of, TokenRelationBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};

use super::TransactionHandler;

pub struct TokenFreezeAccountHandler;

pub struct TokenUnfreezeAccountHandler;

pub(crate) fn check_relation_body(op: &TokenRelationBody) -> HandlerResult<()> {
    ensure_pre_check(op.token_id.num != 0, ResponseCode::InvalidTokenId)?;
    ensure_pre_check(!op.account_id.is_missing(), ResponseCode::InvalidAccountId)
}

/// Require the token key a relation toggle is authorized by
pub(crate) fn require_token_key(
    ctx: &mut PreHandleContext,
    op: &TokenRelationBody,
    key_of: fn(&Token) -> Option<&Key>,
    missing_code: ResponseCode,
) -> HandlerResult<()> {
    let token = ctx
        .state()
        .tokens
        .get(&op.token_id)
        .ok_or(HandlerError::PreCheck(ResponseCode::InvalidTokenId))?;
    ctx.require_key_or(key_of(token), missing_code)
}

/// Load, check and rewrite the relation named by the body
pub(crate) fn update_relation(
    ctx: &mut HandleContext,
    op: &TokenRelationBody,
    key_of: fn(&Token) -> Option<&Key>,
    missing_code: ResponseCode,
    update: impl FnOnce(&mut TokenRelation),
) -> HandlerResult<()> {
    let token = ctx.state().tokens.get_if_usable(&op.token_id).or_handle()?;
    ensure(key_of(token).is_some(), missing_code)?;
    ctx.state().accounts.get_if_usable(&op.account_id).or_handle()?;
    let mut rel = ctx
        .state()
        .token_relations
        .get(&op.account_id, &op.token_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
    update(&mut rel);
    ctx.state_mut().token_relations.put(rel);
    Ok(())
}

fn freeze_key(token: &Token) -> Option<&Key> {
    token.freeze_key.as_ref()
}

fn set_frozen(ctx: &mut HandleContext, frozen: bool) -> HandlerResult<()> {
    let op: &TokenRelationBody = body_of(ctx.body())?;
    update_relation(ctx, op, freeze_key, ResponseCode::TokenHasNoFreezeKey, |rel| {
        rel.frozen = frozen
    })
}

impl TransactionHandler for TokenFreezeAccountHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_relation_body(body_of(body)?)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenRelationBody = body_of(ctx.body())?;
        require_token_key(ctx, op, freeze_key, ResponseCode::TokenHasNoFreezeKey)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        set_frozen(ctx, true)
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}

impl TransactionHandler for TokenUnfreezeAccountHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_relation_body(body_of(body)?)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenRelationBody = body_of(ctx.body())?;
        require_token_key(ctx, op, freeze_key, ResponseCode::TokenHasNoFreezeKey)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        set_frozen(ctx, false)
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}
