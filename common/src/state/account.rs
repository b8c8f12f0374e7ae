use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, Alias, NftId, PendingAirdropId, TokenId};
use crate::key::Key;

/// Unlimited automatic associations marker for `max_auto_associations`
pub const UNLIMITED_AUTO_ASSOCIATIONS: i32 = -1;

/// Hbar allowance granted by the owning account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCryptoAllowance {
    pub spender_id: AccountId,
    pub amount: u64,
}

/// Fungible token allowance granted by the owning account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFungibleTokenAllowance {
    pub token_id: TokenId,
    pub spender_id: AccountId,
    pub amount: u64,
}

/// Approval of a spender for every serial of an NFT type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountApprovalForAllAllowance {
    pub token_id: TokenId,
    pub spender_id: AccountId,
}

/// Account state
///
/// Accounts are values: handlers clone them out of the store, modify the
/// copy and put it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    #[serde(default)]
    pub alias: Option<Alias>,
    /// `None` for hollow accounts created from an EVM address alias
    #[serde(default)]
    pub key: Option<Key>,
    #[serde(default)]
    pub expiration_second: i64,
    #[serde(default)]
    pub auto_renew_seconds: i64,
    #[serde(default)]
    pub tinybar_balance: u64,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub expired_and_pending_removal: bool,
    #[serde(default)]
    pub receiver_sig_required: bool,

    // Token relation bookkeeping
    #[serde(default)]
    pub number_associations: u64,
    #[serde(default)]
    pub number_positive_balances: u64,
    #[serde(default)]
    pub number_owned_nfts: u64,
    #[serde(default)]
    pub number_treasury_titles: u64,
    #[serde(default)]
    pub number_pending_airdrops: u64,
    #[serde(default)]
    pub used_auto_associations: u32,
    #[serde(default)]
    pub max_auto_associations: i32,

    // Heads of the per-account linked lists
    #[serde(default)]
    pub head_token_id: Option<TokenId>,
    #[serde(default)]
    pub head_nft_id: Option<NftId>,
    #[serde(default)]
    pub head_pending_airdrop_id: Option<PendingAirdropId>,

    #[serde(default)]
    pub crypto_allowances: Vec<AccountCryptoAllowance>,
    #[serde(default)]
    pub token_allowances: Vec<AccountFungibleTokenAllowance>,
    #[serde(default)]
    pub approve_for_all_nft_allowances: Vec<AccountApprovalForAllAllowance>,
}

impl Account {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_balance(mut self, tinybars: u64) -> Self {
        self.tinybar_balance = tinybars;
        self
    }

    pub fn with_max_auto_associations(mut self, max: i32) -> Self {
        self.max_auto_associations = max;
        self
    }

    pub fn is_hollow(&self) -> bool {
        self.key.is_none()
    }

    pub fn has_unlimited_auto_associations(&self) -> bool {
        self.max_auto_associations == UNLIMITED_AUTO_ASSOCIATIONS
    }

    /// Number of allowance entries counted against the per-account ceiling
    pub fn total_allowances(&self) -> usize {
        self.crypto_allowances.len()
            + self.token_allowances.len()
            + self.approve_for_all_nft_allowances.len()
    }

    pub fn is_approved_for_all(&self, token_id: TokenId, spender_id: AccountId) -> bool {
        self.approve_for_all_nft_allowances
            .iter()
            .any(|a| a.token_id == token_id && a.spender_id == spender_id)
    }
}
