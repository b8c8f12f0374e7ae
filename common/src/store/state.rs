use serde::{Deserialize, Serialize};

use crate::ids::{EntityIdPair, NftId, PendingAirdropId, TokenId};
use crate::state::{Account, AccountPendingAirdrop, Nft, Token, TokenRelation};

use super::accounts::{AccountStoreSavepoint, WritableAccountStore};
use super::kv::KvSavepoint;
use super::tokens::{WritableAirdropStore, WritableNftStore, WritableTokenRelationStore, WritableTokenStore};

/// First entity number handed out when a state starts empty
pub const FIRST_USER_ENTITY: u64 = 1001;

/// Savepoint across every store of the token service
#[derive(Debug, Clone)]
pub struct StateSavepoint {
    pub(crate) accounts: AccountStoreSavepoint,
    pub(crate) tokens: KvSavepoint<TokenId, Token>,
    pub(crate) token_relations: KvSavepoint<EntityIdPair, TokenRelation>,
    pub(crate) nfts: KvSavepoint<NftId, Nft>,
    pub(crate) airdrops: KvSavepoint<PendingAirdropId, AccountPendingAirdrop>,
    next_entity_num: u64,
}

impl StateSavepoint {
    pub fn accounts(&self) -> &AccountStoreSavepoint {
        &self.accounts
    }

    pub fn tokens(&self) -> &KvSavepoint<TokenId, Token> {
        &self.tokens
    }

    pub fn token_relations(&self) -> &KvSavepoint<EntityIdPair, TokenRelation> {
        &self.token_relations
    }

    pub fn nfts(&self) -> &KvSavepoint<NftId, Nft> {
        &self.nfts
    }
}

/// Every store the token service handlers read and write
#[derive(Debug, Clone)]
pub struct TokenServiceState {
    pub accounts: WritableAccountStore,
    pub tokens: WritableTokenStore,
    pub token_relations: WritableTokenRelationStore,
    pub nfts: WritableNftStore,
    pub airdrops: WritableAirdropStore,
    next_entity_num: u64,
    committed_entity_num: u64,
}

impl Default for TokenServiceState {
    fn default() -> Self {
        Self::from_snapshot(StateSnapshot::default())
    }
}

impl TokenServiceState {
    pub fn from_snapshot(snapshot: StateSnapshot) -> Self {
        let highest = snapshot
            .accounts
            .iter()
            .map(|a| a.account_id.num)
            .chain(snapshot.tokens.iter().map(|t| t.token_id.num))
            .max()
            .unwrap_or(0);
        let next_entity_num = snapshot
            .next_entity_num
            .unwrap_or_else(|| (highest + 1).max(FIRST_USER_ENTITY));
        Self {
            accounts: WritableAccountStore::with_accounts(snapshot.accounts),
            tokens: WritableTokenStore::with_tokens(snapshot.tokens),
            token_relations: WritableTokenRelationStore::with_relations(snapshot.token_relations),
            nfts: WritableNftStore::with_nfts(snapshot.nfts),
            airdrops: WritableAirdropStore::with_airdrops(
                snapshot
                    .pending_airdrops
                    .into_iter()
                    .map(|entry| (entry.id, entry.airdrop)),
            ),
            next_entity_num,
            committed_entity_num: next_entity_num,
        }
    }

    /// Committed and uncommitted entities as a serializable snapshot
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            accounts: self.accounts.iter().cloned().collect(),
            tokens: self.tokens.iter().cloned().collect(),
            token_relations: self.token_relations.iter().cloned().collect(),
            nfts: self.nfts.iter().cloned().collect(),
            pending_airdrops: self
                .airdrops
                .iter()
                .map(|(id, airdrop)| PendingAirdropEntry {
                    id: *id,
                    airdrop: airdrop.clone(),
                })
                .collect(),
            next_entity_num: Some(self.next_entity_num),
        }
    }

    /// Allocate the number of a new account or token
    pub fn next_entity_num(&mut self) -> u64 {
        let num = self.next_entity_num;
        self.next_entity_num += 1;
        num
    }

    pub fn peek_next_entity_num(&self) -> u64 {
        self.next_entity_num
    }

    pub fn savepoint(&self) -> StateSavepoint {
        StateSavepoint {
            accounts: self.accounts.savepoint(),
            tokens: self.tokens.savepoint(),
            token_relations: self.token_relations.savepoint(),
            nfts: self.nfts.savepoint(),
            airdrops: self.airdrops.savepoint(),
            next_entity_num: self.next_entity_num,
        }
    }

    pub fn rollback_to(&mut self, savepoint: StateSavepoint) {
        self.accounts.rollback_to(savepoint.accounts);
        self.tokens.rollback_to(savepoint.tokens);
        self.token_relations.rollback_to(savepoint.token_relations);
        self.nfts.rollback_to(savepoint.nfts);
        self.airdrops.rollback_to(savepoint.airdrops);
        self.next_entity_num = savepoint.next_entity_num;
    }

    /// Drop every uncommitted write
    pub fn discard(&mut self) {
        self.accounts.discard();
        self.tokens.discard();
        self.token_relations.discard();
        self.nfts.discard();
        self.airdrops.discard();
        self.next_entity_num = self.committed_entity_num;
    }

    pub fn commit(&mut self) {
        self.accounts.commit();
        self.tokens.commit();
        self.token_relations.commit();
        self.nfts.commit();
        self.airdrops.commit();
        self.committed_entity_num = self.next_entity_num;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAirdropEntry {
    pub id: PendingAirdropId,
    pub airdrop: AccountPendingAirdrop,
}

/// Serializable form of the whole state, used for genesis files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub token_relations: Vec<TokenRelation>,
    #[serde(default)]
    pub nfts: Vec<Nft>,
    #[serde(default)]
    pub pending_airdrops: Vec<PendingAirdropEntry>,
    #[serde(default)]
    pub next_entity_num: Option<u64>,
}
