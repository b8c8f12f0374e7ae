// Alias replacement
// Account references given as aliases are resolved to ids. An alias that
// is unknown and only receives value gets an account created for it by a
// preceding dispatched CryptoCreate.

use indexmap::IndexMap;
use log::debug;
use std::collections::BTreeSet;

use tokenledger_common::error::{ensure, HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, AccountRef, Alias, TokenId};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::UNLIMITED_AUTO_ASSOCIATIONS;
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::{CryptoCreateBody, CryptoTransferBody, TransactionBody};

use crate::context::HandleContext;

use super::{ResolvedAdjustment, ResolvedNftTransfer, ResolvedTokenTransfers, ResolvedTransfers};

const AUTO_CREATED_MEMO: &str = "auto-created account";
const AUTO_RENEW_PERIOD_SECONDS: i64 = 7_776_000;

#[derive(Default)]
struct UnknownAlias {
    credited_tokens: BTreeSet<TokenId>,
    debited: bool,
}

/// Resolve every reference of `body`, auto-creating accounts for unknown
/// aliases that only receive value
pub fn replace_aliases(ctx: &mut HandleContext, body: &CryptoTransferBody) -> HandlerResult<ResolvedTransfers> {
    // Step 1: Unknown aliases, in order of first appearance
    let unknown = collect_unknown_aliases(ctx.state(), body);

    // Step 2: Create an account for each of them
    if !unknown.is_empty() {
        ensure(
            ctx.config().ledger.auto_creation_enabled,
            ResponseCode::NotSupported,
        )?;
        for usage in unknown.values() {
            ensure(!usage.debited, ResponseCode::InvalidAccountId)?;
        }
        let unlimited = ctx.config().entities.unlimited_auto_associations_enabled;
        for (alias, usage) in unknown {
            let max_automatic_token_associations = if unlimited {
                UNLIMITED_AUTO_ASSOCIATIONS
            } else {
                usage.credited_tokens.len() as i32
            };
            let create = TransactionBody::CryptoCreate(CryptoCreateBody {
                key: None,
                alias: Some(alias.clone()),
                initial_balance: 0,
                memo: AUTO_CREATED_MEMO.to_string(),
                receiver_sig_required: false,
                max_automatic_token_associations,
                auto_renew_period_seconds: AUTO_RENEW_PERIOD_SECONDS,
            });
            let record = ctx.dispatch_preceding(create)?;
            let created = record
                .created_account_id
                .ok_or(HandlerError::Handle(ResponseCode::FailInvalid))?;
            if log::log_enabled!(log::Level::Debug) {
                debug!("Auto-created account {} for alias {}", created, alias);
            }
        }
    }

    // Step 3: Every reference now resolves
    let state = ctx.state();
    let resolve = |account: &AccountRef| -> HandlerResult<AccountId> {
        match account {
            AccountRef::Id(id) => Ok(*id),
            AccountRef::Alias(alias) => state
                .accounts
                .get_alias_id(alias)
                .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountId)),
        }
    };

    let mut resolved = ResolvedTransfers::default();
    for transfer in &body.transfers {
        resolved.hbar.push(ResolvedAdjustment {
            account_id: resolve(&transfer.account)?,
            amount: transfer.amount,
            is_approval: transfer.is_approval,
        });
    }
    for list in &body.token_transfers {
        let mut token_list = ResolvedTokenTransfers::new(list.token_id);
        token_list.expected_decimals = list.expected_decimals;
        for transfer in &list.transfers {
            token_list.adjustments.push(ResolvedAdjustment {
                account_id: resolve(&transfer.account)?,
                amount: transfer.amount,
                is_approval: transfer.is_approval,
            });
        }
        for nft in &list.nft_transfers {
            token_list.nft_transfers.push(ResolvedNftTransfer {
                sender_id: resolve(&nft.sender)?,
                receiver_id: resolve(&nft.receiver)?,
                serial_number: nft.serial_number as u64,
                is_approval: nft.is_approval,
            });
        }
        resolved.tokens.push(token_list);
    }
    Ok(resolved)
}

fn collect_unknown_aliases(state: &TokenServiceState, body: &CryptoTransferBody) -> IndexMap<Alias, UnknownAlias> {
    let mut unknown: IndexMap<Alias, UnknownAlias> = IndexMap::new();
    let mut note = |account: &AccountRef, credited_token: Option<TokenId>, debited: bool| {
        if let AccountRef::Alias(alias) = account {
            if state.accounts.get_alias_id(alias).is_none() {
                let usage = unknown.entry(alias.clone()).or_default();
                usage.debited |= debited;
                if let Some(token_id) = credited_token {
                    usage.credited_tokens.insert(token_id);
                }
            }
        }
    };

    for transfer in &body.transfers {
        note(&transfer.account, None, transfer.amount < 0);
    }
    for list in &body.token_transfers {
        for transfer in &list.transfers {
            let credited = (transfer.amount > 0).then_some(list.token_id);
            note(&transfer.account, credited, transfer.amount < 0);
        }
        for nft in &list.nft_transfers {
            note(&nft.sender, None, true);
            note(&nft.receiver, Some(list.token_id), false);
        }
    }
    unknown
}
