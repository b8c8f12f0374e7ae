// Entity identifiers
// Accounts, tokens, NFTs, token relations and pending airdrops are all
// addressed by small copyable ids. Every id orders by (shard, realm, num)
// so that record lists built from maps come out sorted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier `shard.realm.num`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AccountId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl AccountId {
    /// Sentinel used as the sender of minted NFTs and the receiver of burned ones
    pub const MISSING: AccountId = AccountId::new(0, 0, 0);

    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }

    pub fn is_missing(&self) -> bool {
        self.num == 0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

/// Token identifier `shard.realm.num`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TokenId {
    pub shard: u64,
    pub realm: u64,
    pub num: u64,
}

impl TokenId {
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }

    pub const fn from_num(num: u64) -> Self {
        Self::new(0, 0, num)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

/// A single NFT instance: token type plus serial number
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NftId {
    pub token_id: TokenId,
    pub serial_number: u64,
}

impl NftId {
    pub const fn new(token_id: TokenId, serial_number: u64) -> Self {
        Self {
            token_id,
            serial_number,
        }
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.token_id, self.serial_number)
    }
}

/// Key of a token relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityIdPair {
    pub account_id: AccountId,
    pub token_id: TokenId,
}

impl EntityIdPair {
    pub const fn new(account_id: AccountId, token_id: TokenId) -> Self {
        Self {
            account_id,
            token_id,
        }
    }
}

impl fmt::Display for EntityIdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account_id, self.token_id)
    }
}

/// Account alias: either a serialized public key or a 20-byte EVM address
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Alias(#[serde(with = "hex::serde")] Vec<u8>);

impl Alias {
    pub const EVM_ADDRESS_LEN: usize = 20;

    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_evm_address(&self) -> bool {
        self.0.len() == Self::EVM_ADDRESS_LEN
    }
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Alias({})", hex::encode(&self.0))
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Reference to an account as written in a transaction body
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountRef {
    Id(AccountId),
    Alias(Alias),
}

impl AccountRef {
    pub fn as_id(&self) -> Option<AccountId> {
        match self {
            AccountRef::Id(id) => Some(*id),
            AccountRef::Alias(_) => None,
        }
    }
}

impl From<AccountId> for AccountRef {
    fn from(id: AccountId) -> Self {
        AccountRef::Id(id)
    }
}

impl From<Alias> for AccountRef {
    fn from(alias: Alias) -> Self {
        AccountRef::Alias(alias)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => id.fmt(f),
            AccountRef::Alias(alias) => write!(f, "alias:{}", alias),
        }
    }
}

/// What a pending airdrop or a rejection refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TokenReference {
    Fungible(TokenId),
    Nft(NftId),
}

impl TokenReference {
    pub fn token_id(&self) -> TokenId {
        match self {
            TokenReference::Fungible(token_id) => *token_id,
            TokenReference::Nft(nft_id) => nft_id.token_id,
        }
    }
}

/// Pending airdrop key: sender, receiver and the token reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingAirdropId {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub token_reference: TokenReference,
}

impl PendingAirdropId {
    pub fn new(sender_id: AccountId, receiver_id: AccountId, token_reference: TokenReference) -> Self {
        Self {
            sender_id,
            receiver_id,
            token_reference,
        }
    }

    pub fn token_id(&self) -> TokenId {
        self.token_reference.token_id()
    }

    pub fn is_nft(&self) -> bool {
        matches!(self.token_reference, TokenReference::Nft(_))
    }
}

impl fmt::Display for PendingAirdropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token_reference {
            TokenReference::Fungible(token_id) => {
                write!(f, "{} -> {} ({})", self.sender_id, self.receiver_id, token_id)
            }
            TokenReference::Nft(nft_id) => {
                write!(f, "{} -> {} ({})", self.sender_id, self.receiver_id, nft_id)
            }
        }
    }
}

/// Consensus timestamp
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self::new(seconds, 0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanos)
    }
}
