use std::collections::BTreeSet;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::TokenId;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::transaction::{body_of, TokenAssociationBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::token_rels::{create_and_link_token_rels, ensure_association_capacity, NewRelation};

use super::TransactionHandler;

/// Explicitly associates tokens with an account
pub struct TokenAssociateToAccountHandler;

/// Shared by associate and dissociate
pub(crate) fn check_association_body(op: &TokenAssociationBody) -> HandlerResult<()> {
    ensure_pre_check(!op.account_id.is_missing(), ResponseCode::InvalidAccountId)?;
    let unique: BTreeSet<&TokenId> = op.token_ids.iter().collect();
    ensure_pre_check(
        unique.len() == op.token_ids.len(),
        ResponseCode::TokenIdRepeatedInTokenList,
    )
}

impl TransactionHandler for TokenAssociateToAccountHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenAssociationBody = body_of(body)?;
        check_association_body(op)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenAssociationBody = body_of(ctx.body())?;
        ctx.require_account_key(&op.account_id, ResponseCode::InvalidAccountId)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenAssociationBody = body_of(ctx.body())?;
        let account = ctx
            .state()
            .accounts
            .get_if_usable(&op.account_id)
            .or_handle()?
            .clone();

        let mut new_relations = Vec::with_capacity(op.token_ids.len());
        for token_id in &op.token_ids {
            let token = ctx.state().tokens.get_ignoring_pause(token_id).or_handle()?;
            ensure(
                ctx.state().token_relations.get(&account.account_id, token_id).is_none(),
                ResponseCode::TokenAlreadyAssociatedToAccount,
            )?;
            new_relations.push(NewRelation::for_token(token, false));
        }
        ensure_association_capacity(ctx.state(), ctx.config(), &account, new_relations.len())?;
        create_and_link_token_rels(ctx.state_mut(), account.account_id, &new_relations)?;
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<TokenAssociationBody>(ctx.body()) {
            Ok(op) => ctx.fees_with_items(op.token_ids.len()),
            Err(_) => ctx.base_fees(),
        }
    }
}
