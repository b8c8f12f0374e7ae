// Owned NFT chain
// Every account threads the NFTs it owns through `owner_previous_nft_id` /
// `owner_next_nft_id`, rooted at `head_nft_id`. The treasury owns its NFTs
// through the same chain even though their stored owner is `None`.

use log::error;

use tokenledger_common::error::{ensure, HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, NftId};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Account, Nft, Token};
use tokenledger_common::store::TokenServiceState;

use super::update_positive_balances;

/// Insert `nft` at the head of `owner`'s chain
///
/// Both `owner` and `nft` are working copies the caller puts back.
pub fn link_owned_nft(state: &mut TokenServiceState, owner: &mut Account, nft: &mut Nft) {
    nft.owner_previous_nft_id = None;
    nft.owner_next_nft_id = owner.head_nft_id.filter(|head| *head != nft.nft_id);

    if let Some(head_id) = nft.owner_next_nft_id {
        match state.nfts.get(&head_id).cloned() {
            Some(mut head) => {
                head.owner_previous_nft_id = Some(nft.nft_id);
                state.nfts.put(head);
            }
            None => {
                error!(
                    "Head NFT {} of account {} is missing",
                    head_id, owner.account_id
                );
                nft.owner_next_nft_id = None;
            }
        }
    }
    owner.head_nft_id = Some(nft.nft_id);
}

/// Remove `nft` from `owner`'s chain, rewiring its neighbours
pub fn unlink_owned_nft(state: &mut TokenServiceState, owner: &mut Account, nft: &mut Nft) {
    let previous = nft.owner_previous_nft_id.take();
    let next = nft.owner_next_nft_id.take();

    if let Some(previous_id) = previous {
        relink(state, previous_id, owner.account_id, |n| n.owner_next_nft_id = next);
    }
    if let Some(next_id) = next {
        relink(state, next_id, owner.account_id, |n| n.owner_previous_nft_id = previous);
    }
    if owner.head_nft_id == Some(nft.nft_id) {
        owner.head_nft_id = next;
    }
}

fn relink(state: &mut TokenServiceState, nft_id: NftId, owner_id: AccountId, update: impl FnOnce(&mut Nft)) {
    match state.nfts.get(&nft_id).cloned() {
        Some(mut neighbour) => {
            update(&mut neighbour);
            state.nfts.put(neighbour);
        }
        None => error!("Neighbour NFT {} in the chain of {} is missing", nft_id, owner_id),
    }
}

/// Move one NFT between two associated accounts
///
/// Relation balances, owned counts and both owner chains follow the NFT;
/// its spender is cleared. The treasury is stored as owner `None`.
pub fn change_nft_owner(
    state: &mut TokenServiceState,
    token: &Token,
    mut nft: Nft,
    from: AccountId,
    to: AccountId,
) -> HandlerResult<()> {
    let token_id = token.token_id;
    let mut from_rel = state
        .token_relations
        .get(&from, &token_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
    let mut to_rel = state
        .token_relations
        .get(&to, &token_id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::TokenNotAssociatedToAccount))?;
    ensure(from_rel.balance > 0, ResponseCode::InsufficientTokenBalance)?;

    // Step 1: Out of the sender's chain
    let mut from_account = state
        .accounts
        .get(&from)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
    unlink_owned_nft(state, &mut from_account, &mut nft);
    update_positive_balances(&mut from_account, from_rel.balance, from_rel.balance - 1);
    from_rel.balance -= 1;
    from_account.number_owned_nfts = from_account.number_owned_nfts.saturating_sub(1);
    state.accounts.put(from_account);
    state.token_relations.put(from_rel);

    // Step 2: Into the receiver's chain
    let mut to_account = state
        .accounts
        .get(&to)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId))?;
    link_owned_nft(state, &mut to_account, &mut nft);
    update_positive_balances(&mut to_account, to_rel.balance, to_rel.balance + 1);
    to_rel.balance += 1;
    to_account.number_owned_nfts += 1;
    state.accounts.put(to_account);
    state.token_relations.put(to_rel);

    nft.owner_id = (to != token.treasury_account_id).then_some(to);
    nft.spender_id = None;
    state.nfts.put(nft);
    Ok(())
}

/// NFT ids owned by an account, walking from the head
pub fn owned_nft_chain(state: &TokenServiceState, account_id: AccountId) -> Vec<NftId> {
    let mut chain = Vec::new();
    let mut cursor = state.accounts.get(&account_id).and_then(|a| a.head_nft_id);
    while let Some(nft_id) = cursor {
        if chain.contains(&nft_id) {
            break;
        }
        chain.push(nft_id);
        cursor = state.nfts.get(&nft_id).and_then(|n| n.owner_next_nft_id);
    }
    chain
}
