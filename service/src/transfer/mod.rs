//! Transfer execution pipeline.
//!
//! A transfer body is resolved to concrete account ids (auto-creating
//! accounts for unknown aliases that only receive value), charged its
//! custom fees, and then applied by a fixed sequence of steps:
//! recipient association, hbar adjustment, fungible adjustment and NFT
//! owner change.

mod aliases;
mod custom_fees;
mod executor;
mod steps;
pub mod validation;

pub use aliases::replace_aliases;
pub use custom_fees::{apply_charges, assessed_fees, CustomFeeAssessor, FeeCharge};
pub use executor::{TransferContext, TransferExecutor, TransferOptions};
pub use steps::{
    AdjustFungibleTokenChanges, AdjustHbarChanges, AssociateTokenRecipients, NftOwnersChange, TransferStep,
};

use indexmap::IndexMap;

use tokenledger_common::error::{HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, TokenId};
use tokenledger_common::response::ResponseCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAdjustment {
    pub account_id: AccountId,
    pub amount: i64,
    pub is_approval: bool,
}

impl ResolvedAdjustment {
    pub fn new(account_id: AccountId, amount: i64) -> Self {
        Self {
            account_id,
            amount,
            is_approval: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedNftTransfer {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub serial_number: u64,
    pub is_approval: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTokenTransfers {
    pub token_id: TokenId,
    pub expected_decimals: Option<u32>,
    pub adjustments: Vec<ResolvedAdjustment>,
    pub nft_transfers: Vec<ResolvedNftTransfer>,
}

impl ResolvedTokenTransfers {
    pub fn new(token_id: TokenId) -> Self {
        Self {
            token_id,
            expected_decimals: None,
            adjustments: Vec::new(),
            nft_transfers: Vec::new(),
        }
    }
}

/// Transfers with every account reference resolved to an id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTransfers {
    pub hbar: Vec<ResolvedAdjustment>,
    pub tokens: Vec<ResolvedTokenTransfers>,
}

impl ResolvedTransfers {
    /// List of `token_id`, appended when absent
    pub fn token_list_mut(&mut self, token_id: TokenId) -> &mut ResolvedTokenTransfers {
        let index = match self.tokens.iter().position(|list| list.token_id == token_id) {
            Some(index) => index,
            None => {
                self.tokens.push(ResolvedTokenTransfers::new(token_id));
                self.tokens.len() - 1
            }
        };
        &mut self.tokens[index]
    }

    pub fn is_empty(&self) -> bool {
        self.hbar.is_empty()
            && self
                .tokens
                .iter()
                .all(|list| list.adjustments.is_empty() && list.nft_transfers.is_empty())
    }

    /// Distinct accounts whose hbar or fungible balance changes
    pub fn balance_change_count(&self) -> usize {
        let hbar = net_changes(&self.hbar).map(|m| m.len()).unwrap_or(self.hbar.len());
        let tokens: usize = self
            .tokens
            .iter()
            .map(|list| {
                net_changes(&list.adjustments)
                    .map(|m| m.len())
                    .unwrap_or(list.adjustments.len())
            })
            .sum();
        hbar + tokens
    }
}

/// Net change per account, in first-seen order
pub fn net_changes(adjustments: &[ResolvedAdjustment]) -> HandlerResult<IndexMap<AccountId, i64>> {
    let mut net: IndexMap<AccountId, i64> = IndexMap::new();
    for adjustment in adjustments {
        let entry = net.entry(adjustment.account_id).or_insert(0);
        *entry = entry
            .checked_add(adjustment.amount)
            .ok_or(HandlerError::Handle(ResponseCode::InvalidAccountAmounts))?;
    }
    Ok(net)
}
