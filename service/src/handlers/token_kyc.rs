use tokenledger_common::error::HandlerResult;
use tokenledger_common::key::Key;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::Token;
use tokenledger_common::transaction::{body_of, TokenRelationBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};

use super::token_freeze::{check_relation_body, require_token_key, update_relation};
use super::TransactionHandler;

pub struct TokenGrantKycToAccountHandler;

pub struct TokenRevokeKycFromAccountHandler;

fn kyc_key(token: &Token) -> Option<&Key> {
    token.kyc_key.as_ref()
}

fn set_kyc(ctx: &mut HandleContext, granted: bool) -> HandlerResult<()> {
    let op: &TokenRelationBody = body_of(ctx.body())?;
    update_relation(ctx, op, kyc_key, ResponseCode::TokenHasNoKycKey, |rel| {
        rel.kyc_granted = granted
    })
}

impl TransactionHandler for TokenGrantKycToAccountHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_relation_body(body_of(body)?)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenRelationBody = body_of(ctx.body())?;
        require_token_key(ctx, op, kyc_key, ResponseCode::TokenHasNoKycKey)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        set_kyc(ctx, true)
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}

impl TransactionHandler for TokenRevokeKycFromAccountHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_relation_body(body_of(body)?)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenRelationBody = body_of(ctx.body())?;
        require_token_key(ctx, op, kyc_key, ResponseCode::TokenHasNoKycKey)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        set_kyc(ctx, false)
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}
