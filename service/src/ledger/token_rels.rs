// Token relation list
// Each account heads a doubly-linked list of its token relations, threaded
// through `previous_token` / `next_token` and rooted at `head_token_id`.
// New relations are spliced in front of the current head.

use log::{debug, error};

use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::error::{ensure, HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, TokenId};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Account, Token, TokenRelation};
use tokenledger_common::store::TokenServiceState;

/// Relation to be created for an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRelation {
    pub token_id: TokenId,
    pub frozen: bool,
    pub kyc_granted: bool,
    pub automatic_association: bool,
}

impl NewRelation {
    /// Relation with the token's default freeze and KYC status
    pub fn for_token(token: &Token, automatic_association: bool) -> Self {
        Self {
            token_id: token.token_id,
            frozen: token.relation_starts_frozen(),
            kyc_granted: token.relation_starts_kyc_granted(),
            automatic_association,
        }
    }
}

/// Create relations for `account_id` and splice them, in input order, in
/// front of the account's current head
///
/// Returns the relations as written.
pub fn create_and_link_token_rels(
    state: &mut TokenServiceState,
    account_id: AccountId,
    new_relations: &[NewRelation],
) -> HandlerResult<Vec<TokenRelation>> {
    if new_relations.is_empty() {
        return Ok(Vec::new());
    }
    let mut account = state
        .accounts
        .get(&account_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;

    // Step 1: Old head, if it can still be found
    let old_head = match account.head_token_id {
        Some(head_token_id) => match state.token_relations.get(&account_id, &head_token_id) {
            Some(rel) => Some(rel.clone()),
            None => {
                error!(
                    "Head token relation {} of account {} is missing, new relations are not linked to it",
                    head_token_id, account_id
                );
                None
            }
        },
        None => None,
    };

    // Step 2: Build the new run, each node pointing at its neighbours
    let last = new_relations.len() - 1;
    let relations: Vec<TokenRelation> = new_relations
        .iter()
        .enumerate()
        .map(|(i, new)| TokenRelation {
            account_id,
            token_id: new.token_id,
            balance: 0,
            frozen: new.frozen,
            kyc_granted: new.kyc_granted,
            automatic_association: new.automatic_association,
            previous_token: (i > 0).then(|| new_relations[i - 1].token_id),
            next_token: if i < last {
                Some(new_relations[i + 1].token_id)
            } else {
                old_head.as_ref().map(|rel| rel.token_id)
            },
        })
        .collect();

    // Step 3: Old head now points back at the end of the run
    if let Some(mut old_head) = old_head {
        old_head.previous_token = Some(new_relations[last].token_id);
        state.token_relations.put(old_head);
    }

    account.head_token_id = Some(new_relations[0].token_id);
    account.number_associations += new_relations.len() as u64;
    state.accounts.put(account);
    for rel in &relations {
        state.token_relations.put(rel.clone());
    }

    if log::log_enabled!(log::Level::Debug) {
        debug!(
            "Linked {} token relations for account {}",
            relations.len(),
            account_id
        );
    }
    Ok(relations)
}

/// Check the aggregate and per-account association ceilings before adding
/// `additional` relations to `account`
pub fn ensure_association_capacity(
    state: &TokenServiceState,
    config: &TokenServiceConfig,
    account: &Account,
    additional: usize,
) -> HandlerResult<()> {
    let additional = additional as u64;
    ensure(
        state.token_relations.size_of_state() as u64 + additional <= config.tokens.max_aggregate_rels,
        ResponseCode::MaxEntitiesInPriceRegimeHaveBeenCreated,
    )?;
    if config.tokens.limit_token_associations {
        ensure(
            account.number_associations + additional <= config.tokens.max_per_account,
            ResponseCode::TokensPerAccountLimitExceeded,
        )?;
    }
    Ok(())
}

/// Whether the account can take one more automatic association
pub fn has_free_auto_association_slot(account: &Account) -> bool {
    account.has_unlimited_auto_associations()
        || (account.max_auto_associations > 0
            && account.used_auto_associations < account.max_auto_associations as u32)
}

/// Associate `token` to an account that receives it without having asked for it
pub fn auto_associate(
    state: &mut TokenServiceState,
    config: &TokenServiceConfig,
    account_id: AccountId,
    token: &Token,
) -> HandlerResult<TokenRelation> {
    ensure(
        state.token_relations.get(&account_id, &token.token_id).is_none(),
        ResponseCode::TokenAlreadyAssociatedToAccount,
    )?;
    let account = state
        .accounts
        .get(&account_id)
        .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
    ensure_association_capacity(state, config, account, 1)?;
    ensure(
        has_free_auto_association_slot(account),
        ResponseCode::NoRemainingAutomaticAssociations,
    )?;

    let mut relations =
        create_and_link_token_rels(state, account_id, &[NewRelation::for_token(token, true)])?;
    let mut account = state
        .accounts
        .get(&account_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
    account.used_auto_associations += 1;
    state.accounts.put(account);

    relations
        .pop()
        .ok_or(HandlerError::Handle(ResponseCode::FailInvalid))
}

/// Unsplice the relation of `account` with `token_id` and remove it
///
/// `account` is the caller's working copy: its head and association count
/// are updated here and the caller puts it back. Neighbours are re-read
/// from the store.
pub fn unlink_token_relation(
    state: &mut TokenServiceState,
    account: &mut Account,
    token_id: TokenId,
) -> HandlerResult<TokenRelation> {
    let account_id = account.account_id;
    let rel = state
        .token_relations
        .get(&account_id, &token_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;

    if let Some(previous_token) = rel.previous_token {
        match state.token_relations.get(&account_id, &previous_token).cloned() {
            Some(mut previous) => {
                previous.next_token = rel.next_token;
                state.token_relations.put(previous);
            }
            None => error!(
                "Previous relation {} of {} for account {} is missing",
                previous_token, token_id, account_id
            ),
        }
    }
    if let Some(next_token) = rel.next_token {
        match state.token_relations.get(&account_id, &next_token).cloned() {
            Some(mut next) => {
                next.previous_token = rel.previous_token;
                state.token_relations.put(next);
            }
            None => error!(
                "Next relation {} of {} for account {} is missing",
                next_token, token_id, account_id
            ),
        }
    }

    if account.head_token_id == Some(token_id) {
        account.head_token_id = rel.next_token;
    }
    account.number_associations = account.number_associations.saturating_sub(1);
    state.token_relations.remove(&account_id, &token_id);
    Ok(rel)
}

/// Token ids of an account's relations, walking from the head
pub fn token_chain(state: &TokenServiceState, account_id: AccountId) -> Vec<TokenId> {
    let mut chain = Vec::new();
    let mut cursor = state.accounts.get(&account_id).and_then(|a| a.head_token_id);
    while let Some(token_id) = cursor {
        if chain.contains(&token_id) {
            break;
        }
        chain.push(token_id);
        cursor = state
            .token_relations
            .get(&account_id, &token_id)
            .and_then(|rel| rel.next_token);
    }
    chain
}
