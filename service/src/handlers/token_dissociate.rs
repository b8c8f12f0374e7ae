// Token dissociation
// Every relation is validated before the first one is unspliced. Each
// unsplice works on the same live copy of the account and re-reads its
// neighbouring relations from the store.

use log::debug;

use tokenledger_common::error::{ensure, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::TokenRelation;
use tokenledger_common::transaction::{body_of, TokenAssociationBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::token_rels::unlink_token_relation;
use crate::ledger::update_positive_balances;

use super::token_associate::check_association_body;
use super::TransactionHandler;

pub struct TokenDissociateFromAccountHandler;

/// Relation about to be removed, with what its removal releases
struct Dissociation {
    rel: TokenRelation,
    token_deleted: bool,
    is_fungible: bool,
}

impl TransactionHandler for TokenDissociateFromAccountHandler {
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
        let mut account = ctx
            .state()
            .accounts
            .get_if_usable(&op.account_id)
            .or_handle()?
            .clone();

        // Step 1: Validate every relation
        let mut dissociations = Vec::with_capacity(op.token_ids.len());
        for token_id in &op.token_ids {
            let rel = ctx
                .state()
                .token_relations
                .get(&account.account_id, token_id)
                .cloned()
                .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
            let token = ctx.state().tokens.get(token_id);
            let token_deleted = token.map_or(true, |t| t.deleted);
            let is_fungible = token.map_or(true, |t| t.is_fungible());
            if let Some(token) = token.filter(|t| !t.deleted) {
                ensure(
                    token.treasury_account_id != account.account_id,
                    ResponseCode::AccountIsTreasury,
                )?;
                ensure(!token.paused, ResponseCode::TokenIsPaused)?;
                ensure(!rel.frozen, ResponseCode::AccountFrozenForToken)?;
                if rel.balance > 0 {
                    return Err(HandlerError::Handle(if is_fungible {
                        ResponseCode::TransactionRequiresZeroTokenBalances
                    } else {
                        ResponseCode::AccountStillOwnsNfts
                    }));
                }
            }
            dissociations.push(Dissociation {
                rel,
                token_deleted,
                is_fungible,
            });
        }

        // Step 2: Release balances of deleted tokens and unsplice
        for Dissociation {
            rel,
            token_deleted,
            is_fungible,
        } in dissociations
        {
            if token_deleted && rel.balance > 0 {
                update_positive_balances(&mut account, rel.balance, 0);
                if !is_fungible {
                    account.number_owned_nfts = account.number_owned_nfts.saturating_sub(rel.balance);
                }
            }
            if rel.automatic_association {
                account.used_auto_associations = account.used_auto_associations.saturating_sub(1);
            }
            unlink_token_relation(ctx.state_mut(), &mut account, rel.token_id)?;
            if log::log_enabled!(log::Level::Debug) {
                debug!(
                    "Dissociated {} from {} discarding balance {}",
                    rel.token_id, account.account_id, rel.balance
                );
            }
        }
        ctx.state_mut().accounts.put(account);
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        match body_of::<TokenAssociationBody>(ctx.body()) {
            Ok(op) => ctx.fees_with_items(op.token_ids.len()),
            Err(_) => ctx.base_fees(),
        }
    }
}
