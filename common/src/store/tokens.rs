use crate::ids::{AccountId, EntityIdPair, NftId, PendingAirdropId, TokenId};
use crate::response::ResponseCode;
use crate::state::{AccountPendingAirdrop, Nft, Token, TokenRelation};

use super::kv::{KvSavepoint, WritableKvState};

pub const TOKENS_KEY: &str = "TOKENS";
pub const TOKEN_RELS_KEY: &str = "TOKEN_RELS";
pub const NFTS_KEY: &str = "NFTS";
pub const PENDING_AIRDROPS_KEY: &str = "PENDING_AIRDROPS";

// ========================================
// Tokens
// ========================================

#[derive(Debug, Clone)]
pub struct WritableTokenStore {
    tokens: WritableKvState<TokenId, Token>,
}

impl Default for WritableTokenStore {
    fn default() -> Self {
        Self::with_tokens(Vec::new())
    }
}

impl WritableTokenStore {
    pub fn with_tokens<I: IntoIterator<Item = Token>>(tokens: I) -> Self {
        Self {
            tokens: WritableKvState::with_committed(
                TOKENS_KEY,
                tokens.into_iter().map(|t| (t.token_id, t)),
            ),
        }
    }

    pub fn get(&self, id: &TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    pub fn get_at<'a>(&'a self, savepoint: &'a KvSavepoint<TokenId, Token>, id: &TokenId) -> Option<&'a Token> {
        self.tokens.get_at(savepoint, id)
    }

    /// Token that exists, is not deleted and is not paused
    pub fn get_if_usable(&self, id: &TokenId) -> Result<&Token, ResponseCode> {
        let token = self.get_ignoring_pause(id)?;
        if token.paused {
            return Err(ResponseCode::TokenIsPaused);
        }
        Ok(token)
    }

    /// Token that exists and is not deleted; pause handlers use this
    pub fn get_ignoring_pause(&self, id: &TokenId) -> Result<&Token, ResponseCode> {
        let token = self.get(id).ok_or(ResponseCode::InvalidTokenId)?;
        if token.deleted {
            return Err(ResponseCode::TokenWasDeleted);
        }
        Ok(token)
    }

    pub fn put(&mut self, token: Token) {
        self.tokens.put(token.token_id, token);
    }

    pub fn warm(&self, id: &TokenId) {
        self.tokens.warm(id);
    }

    pub fn size_of_state(&self) -> usize {
        self.tokens.size()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter().map(|(_, token)| token)
    }

    pub fn savepoint(&self) -> KvSavepoint<TokenId, Token> {
        self.tokens.savepoint()
    }

    pub fn rollback_to(&mut self, savepoint: KvSavepoint<TokenId, Token>) {
        self.tokens.rollback_to(savepoint);
    }

    pub fn discard(&mut self) {
        self.tokens.discard();
    }

    pub fn commit(&mut self) {
        self.tokens.commit();
    }
}

// ========================================
// Token relations
// ========================================

#[derive(Debug, Clone)]
pub struct WritableTokenRelationStore {
    relations: WritableKvState<EntityIdPair, TokenRelation>,
}

impl Default for WritableTokenRelationStore {
    fn default() -> Self {
        Self::with_relations(Vec::new())
    }
}

impl WritableTokenRelationStore {
    pub fn with_relations<I: IntoIterator<Item = TokenRelation>>(relations: I) -> Self {
        Self {
            relations: WritableKvState::with_committed(
                TOKEN_RELS_KEY,
                relations.into_iter().map(|r| (r.key(), r)),
            ),
        }
    }

    pub fn get(&self, account_id: &AccountId, token_id: &TokenId) -> Option<&TokenRelation> {
        self.relations.get(&EntityIdPair::new(*account_id, *token_id))
    }

    pub fn get_by_key(&self, key: &EntityIdPair) -> Option<&TokenRelation> {
        self.relations.get(key)
    }

    pub fn get_at<'a>(
        &'a self,
        savepoint: &'a KvSavepoint<EntityIdPair, TokenRelation>,
        key: &EntityIdPair,
    ) -> Option<&'a TokenRelation> {
        self.relations.get_at(savepoint, key)
    }

    pub fn put(&mut self, relation: TokenRelation) {
        self.relations.put(relation.key(), relation);
    }

    pub fn remove(&mut self, account_id: &AccountId, token_id: &TokenId) {
        self.relations.remove(&EntityIdPair::new(*account_id, *token_id));
    }

    pub fn warm(&self, account_id: &AccountId, token_id: &TokenId) {
        self.relations.warm(&EntityIdPair::new(*account_id, *token_id));
    }

    pub fn size_of_state(&self) -> usize {
        self.relations.size()
    }

    pub fn modified_keys(&self) -> Vec<EntityIdPair> {
        self.relations.modified_keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenRelation> {
        self.relations.iter().map(|(_, rel)| rel)
    }

    pub fn savepoint(&self) -> KvSavepoint<EntityIdPair, TokenRelation> {
        self.relations.savepoint()
    }

    pub fn rollback_to(&mut self, savepoint: KvSavepoint<EntityIdPair, TokenRelation>) {
        self.relations.rollback_to(savepoint);
    }

    pub fn discard(&mut self) {
        self.relations.discard();
    }

    pub fn commit(&mut self) {
        self.relations.commit();
    }
}

// ========================================
// NFTs
// ========================================

#[derive(Debug, Clone)]
pub struct WritableNftStore {
    nfts: WritableKvState<NftId, Nft>,
}

impl Default for WritableNftStore {
    fn default() -> Self {
        Self::with_nfts(Vec::new())
    }
}

impl WritableNftStore {
    pub fn with_nfts<I: IntoIterator<Item = Nft>>(nfts: I) -> Self {
        Self {
            nfts: WritableKvState::with_committed(NFTS_KEY, nfts.into_iter().map(|n| (n.nft_id, n))),
        }
    }

    pub fn get(&self, id: &NftId) -> Option<&Nft> {
        self.nfts.get(id)
    }

    pub fn get_at<'a>(&'a self, savepoint: &'a KvSavepoint<NftId, Nft>, id: &NftId) -> Option<&'a Nft> {
        self.nfts.get_at(savepoint, id)
    }

    pub fn put(&mut self, nft: Nft) {
        self.nfts.put(nft.nft_id, nft);
    }

    pub fn remove(&mut self, id: &NftId) {
        self.nfts.remove(id);
    }

    pub fn warm(&self, id: &NftId) {
        self.nfts.warm(id);
    }

    pub fn size_of_state(&self) -> usize {
        self.nfts.size()
    }

    pub fn modified_keys(&self) -> Vec<NftId> {
        self.nfts.modified_keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nft> {
        self.nfts.iter().map(|(_, nft)| nft)
    }

    pub fn savepoint(&self) -> KvSavepoint<NftId, Nft> {
        self.nfts.savepoint()
    }

    pub fn rollback_to(&mut self, savepoint: KvSavepoint<NftId, Nft>) {
        self.nfts.rollback_to(savepoint);
    }

    pub fn discard(&mut self) {
        self.nfts.discard();
    }

    pub fn commit(&mut self) {
        self.nfts.commit();
    }
}

// ========================================
// Pending airdrops
// ========================================

#[derive(Debug, Clone)]
pub struct WritableAirdropStore {
    airdrops: WritableKvState<PendingAirdropId, AccountPendingAirdrop>,
}

impl Default for WritableAirdropStore {
    fn default() -> Self {
        Self::with_airdrops(Vec::new())
    }
}

impl WritableAirdropStore {
    pub fn with_airdrops<I: IntoIterator<Item = (PendingAirdropId, AccountPendingAirdrop)>>(
        airdrops: I,
    ) -> Self {
        Self {
            airdrops: WritableKvState::with_committed(PENDING_AIRDROPS_KEY, airdrops),
        }
    }

    pub fn get(&self, id: &PendingAirdropId) -> Option<&AccountPendingAirdrop> {
        self.airdrops.get(id)
    }

    pub fn exists(&self, id: &PendingAirdropId) -> bool {
        self.airdrops.contains(id)
    }

    pub fn put(&mut self, id: PendingAirdropId, airdrop: AccountPendingAirdrop) {
        self.airdrops.put(id, airdrop);
    }

    pub fn remove(&mut self, id: &PendingAirdropId) {
        self.airdrops.remove(id);
    }

    pub fn size_of_state(&self) -> usize {
        self.airdrops.size()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PendingAirdropId, &AccountPendingAirdrop)> {
        self.airdrops.iter()
    }

    pub fn savepoint(&self) -> KvSavepoint<PendingAirdropId, AccountPendingAirdrop> {
        self.airdrops.savepoint()
    }

    pub fn rollback_to(&mut self, savepoint: KvSavepoint<PendingAirdropId, AccountPendingAirdrop>) {
        self.airdrops.rollback_to(savepoint);
    }

    pub fn discard(&mut self) {
        self.airdrops.discard();
    }

    pub fn commit(&mut self) {
        self.airdrops.commit();
    }
}
