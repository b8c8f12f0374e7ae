//! Transaction records exported to the record stream.

use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, PendingAirdropId, TokenId, Timestamp};
use crate::response::ResponseCode;

/// Net hbar or fungible change of one account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAdjustment {
    pub account_id: AccountId,
    pub amount: i64,
}

/// NFT movement; `AccountId::MISSING` stands for mint (sender) or burn (receiver)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftOwnerChange {
    pub serial_number: u64,
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferRecord {
    pub token_id: TokenId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adjustments: Vec<AccountAdjustment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nft_transfers: Vec<NftOwnerChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessedCustomFee {
    /// `None` for hbar
    pub token_id: Option<TokenId>,
    pub fee_collector_account_id: AccountId,
    pub amount: u64,
    pub effective_payer_account_ids: Vec<AccountId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAssociation {
    pub token_id: TokenId,
    pub account_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAirdropRecord {
    pub pending_airdrop_id: PendingAirdropId,
    /// Amount now pending for the id after merging; `None` for NFTs
    pub pending_airdrop_value: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    #[default]
    User,
    Preceding,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub kind: RecordKind,
    pub status: ResponseCode,
    pub consensus_time: Timestamp,
    pub payer: AccountId,
    pub transaction_fee: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transfer_list: Vec<AccountAdjustment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub token_transfer_lists: Vec<TokenTransferRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assessed_custom_fees: Vec<AssessedCustomFee>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub automatic_token_associations: Vec<TokenAssociation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_airdrop_records: Vec<PendingAirdropRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_total_supply: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub serial_numbers: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_token_id: Option<TokenId>,
}

impl TransactionRecord {
    pub fn new(kind: RecordKind, payer: AccountId, consensus_time: Timestamp) -> Self {
        Self {
            kind,
            status: ResponseCode::Ok,
            consensus_time,
            payer,
            transaction_fee: 0,
            transfer_list: Vec::new(),
            token_transfer_lists: Vec::new(),
            assessed_custom_fees: Vec::new(),
            automatic_token_associations: Vec::new(),
            pending_airdrop_records: Vec::new(),
            new_total_supply: None,
            serial_numbers: Vec::new(),
            created_account_id: None,
            created_token_id: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseCode::Success
    }

    /// Net hbar change reported for an account, zero when absent
    pub fn hbar_change(&self, account_id: AccountId) -> i64 {
        self.transfer_list
            .iter()
            .find(|a| a.account_id == account_id)
            .map(|a| a.amount)
            .unwrap_or(0)
    }

    /// Net fungible change reported for an account, zero when absent
    pub fn token_change(&self, token_id: TokenId, account_id: AccountId) -> i64 {
        self.token_transfer_lists
            .iter()
            .filter(|list| list.token_id == token_id)
            .flat_map(|list| list.adjustments.iter())
            .find(|a| a.account_id == account_id)
            .map(|a| a.amount)
            .unwrap_or(0)
    }

    pub fn nft_changes(&self, token_id: TokenId) -> &[NftOwnerChange] {
        self.token_transfer_lists
            .iter()
            .find(|list| list.token_id == token_id)
            .map(|list| list.nft_transfers.as_slice())
            .unwrap_or(&[])
    }
}
