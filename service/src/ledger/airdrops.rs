// Pending airdrop list
// Pending airdrops are linked per sender from `head_pending_airdrop_id`.
// A second fungible airdrop for the same id merges into the existing entry.

use log::error;

use tokenledger_common::error::{HandlerError, HandlerResult};
use tokenledger_common::ids::PendingAirdropId;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Account, AccountPendingAirdrop};
use tokenledger_common::store::TokenServiceState;

/// Insert a pending airdrop for `sender`, or merge a fungible value into an
/// existing one
///
/// `sender` is the caller's working copy. Returns the stored entry.
pub fn insert_pending_airdrop(
    state: &mut TokenServiceState,
    sender: &mut Account,
    id: PendingAirdropId,
    value: Option<u64>,
) -> HandlerResult<AccountPendingAirdrop> {
    if let Some(existing) = state.airdrops.get(&id).cloned() {
        if id.is_nft() {
            return Err(HandlerError::Handle(ResponseCode::PendingNftAirdropAlreadyExists));
        }
        let merged = signed_value(existing.pending_airdrop_value)?
            .checked_add(signed_value(value)?)
            .ok_or(HandlerError::Handle(ResponseCode::InsufficientTokenBalance))?;
        let merged = merged as u64;
        let updated = AccountPendingAirdrop {
            pending_airdrop_value: Some(merged),
            ..existing
        };
        state.airdrops.put(id, updated.clone());
        return Ok(updated);
    }

    let value = match value {
        Some(_) if !id.is_nft() => Some(signed_value(value)? as u64),
        _ => None,
    };

    let mut next = sender.head_pending_airdrop_id;
    if let Some(head_id) = next {
        match state.airdrops.get(&head_id).cloned() {
            Some(mut head) => {
                head.previous_airdrop = Some(id);
                state.airdrops.put(head_id, head);
            }
            None => {
                error!(
                    "Head pending airdrop {} of account {} is missing",
                    head_id, sender.account_id
                );
                next = None;
            }
        }
    }

    let airdrop = AccountPendingAirdrop {
        pending_airdrop_value: value,
        previous_airdrop: None,
        next_airdrop: next,
    };
    state.airdrops.put(id, airdrop.clone());
    sender.head_pending_airdrop_id = Some(id);
    sender.number_pending_airdrops += 1;
    Ok(airdrop)
}

// Pending values stay within the signed 64-bit range
fn signed_value(value: Option<u64>) -> HandlerResult<i64> {
    i64::try_from(value.unwrap_or(0)).map_err(|_| HandlerError::Handle(ResponseCode::InsufficientTokenBalance))
}

/// Remove a pending airdrop from its sender's list
pub fn remove_pending_airdrop(
    state: &mut TokenServiceState,
    sender: &mut Account,
    id: &PendingAirdropId,
) -> HandlerResult<AccountPendingAirdrop> {
    let airdrop = state
        .airdrops
        .get(id)
        .cloned()
        .ok_or(HandlerError::Handle(ResponseCode::InvalidPendingAirdropId))?;

    if let Some(previous_id) = airdrop.previous_airdrop {
        if let Some(mut previous) = state.airdrops.get(&previous_id).cloned() {
            previous.next_airdrop = airdrop.next_airdrop;
            state.airdrops.put(previous_id, previous);
        } else {
            error!("Previous pending airdrop {} of {} is missing", previous_id, id);
        }
    }
    if let Some(next_id) = airdrop.next_airdrop {
        if let Some(mut next) = state.airdrops.get(&next_id).cloned() {
            next.previous_airdrop = airdrop.previous_airdrop;
            state.airdrops.put(next_id, next);
        } else {
            error!("Next pending airdrop {} of {} is missing", next_id, id);
        }
    }
    if sender.head_pending_airdrop_id.as_ref() == Some(id) {
        sender.head_pending_airdrop_id = airdrop.next_airdrop;
    }
    sender.number_pending_airdrops = sender.number_pending_airdrops.saturating_sub(1);
    state.airdrops.remove(id);
    Ok(airdrop)
}
