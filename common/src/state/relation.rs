use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, EntityIdPair, NftId, PendingAirdropId, TokenId, Timestamp};

/// Association edge between one account and one token
///
/// `previous_token` and `next_token` link the relations of one account into
/// a doubly-linked list whose head is `Account::head_token_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRelation {
    pub account_id: AccountId,
    pub token_id: TokenId,
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub kyc_granted: bool,
    #[serde(default)]
    pub automatic_association: bool,
    #[serde(default)]
    pub previous_token: Option<TokenId>,
    #[serde(default)]
    pub next_token: Option<TokenId>,
}

impl TokenRelation {
    pub fn key(&self) -> EntityIdPair {
        EntityIdPair::new(self.account_id, self.token_id)
    }
}

/// One NFT instance
///
/// An owner of `None` means the token's treasury holds it. Treasury owned
/// NFTs are still linked into the treasury's owner chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    pub nft_id: NftId,
    #[serde(default)]
    pub owner_id: Option<AccountId>,
    #[serde(default)]
    pub spender_id: Option<AccountId>,
    #[serde(default, with = "hex::serde")]
    pub metadata: Vec<u8>,
    #[serde(default)]
    pub mint_time: Option<Timestamp>,
    #[serde(default)]
    pub owner_previous_nft_id: Option<NftId>,
    #[serde(default)]
    pub owner_next_nft_id: Option<NftId>,
}

impl Nft {
    pub fn owner_or(&self, treasury_id: AccountId) -> AccountId {
        self.owner_id.unwrap_or(treasury_id)
    }
}

/// Pending airdrop node, linked per sender from `Account::head_pending_airdrop_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPendingAirdrop {
    /// Fungible amount; `None` for NFT airdrops
    #[serde(default)]
    pub pending_airdrop_value: Option<u64>,
    #[serde(default)]
    pub previous_airdrop: Option<PendingAirdropId>,
    #[serde(default)]
    pub next_airdrop: Option<PendingAirdropId>,
}
