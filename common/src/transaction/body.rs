use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, AccountRef, Alias, TokenId, TokenReference};
use crate::key::Key;
use crate::state::{CustomFee, TokenSupplyType, TokenType};

// ========================================
// Transfers
// ========================================

/// Hbar or fungible token adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAmount {
    pub account: AccountRef,
    pub amount: i64,
    /// Debit spends an allowance granted to the payer
    #[serde(default)]
    pub is_approval: bool,
}

impl AccountAmount {
    pub fn new(account: impl Into<AccountRef>, amount: i64) -> Self {
        Self {
            account: account.into(),
            amount,
            is_approval: false,
        }
    }

    pub fn approved(account: impl Into<AccountRef>, amount: i64) -> Self {
        Self {
            is_approval: true,
            ..Self::new(account, amount)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTransfer {
    pub sender: AccountRef,
    pub receiver: AccountRef,
    pub serial_number: i64,
    #[serde(default)]
    pub is_approval: bool,
}

impl NftTransfer {
    pub fn new(sender: impl Into<AccountRef>, receiver: impl Into<AccountRef>, serial_number: i64) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            serial_number,
            is_approval: false,
        }
    }
}

/// Movements of one token: fungible adjustments or NFT transfers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferList {
    pub token_id: TokenId,
    #[serde(default)]
    pub expected_decimals: Option<u32>,
    #[serde(default)]
    pub transfers: Vec<AccountAmount>,
    #[serde(default)]
    pub nft_transfers: Vec<NftTransfer>,
}

impl TokenTransferList {
    pub fn fungible(token_id: TokenId, transfers: Vec<AccountAmount>) -> Self {
        Self {
            token_id,
            expected_decimals: None,
            transfers,
            nft_transfers: Vec::new(),
        }
    }

    pub fn nfts(token_id: TokenId, nft_transfers: Vec<NftTransfer>) -> Self {
        Self {
            token_id,
            expected_decimals: None,
            transfers: Vec::new(),
            nft_transfers,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoTransferBody {
    #[serde(default)]
    pub transfers: Vec<AccountAmount>,
    #[serde(default)]
    pub token_transfers: Vec<TokenTransferList>,
}

// ========================================
// Accounts
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoCreateBody {
    #[serde(default)]
    pub key: Option<Key>,
    #[serde(default)]
    pub alias: Option<Alias>,
    #[serde(default)]
    pub initial_balance: u64,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub receiver_sig_required: bool,
    #[serde(default)]
    pub max_automatic_token_associations: i32,
    #[serde(default)]
    pub auto_renew_period_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoUpdateBody {
    pub account_id: AccountId,
    #[serde(default)]
    pub key: Option<Key>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub receiver_sig_required: Option<bool>,
    #[serde(default)]
    pub max_automatic_token_associations: Option<i32>,
    #[serde(default)]
    pub expiration_second: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoDeleteBody {
    pub delete_account_id: AccountId,
    pub transfer_account_id: AccountId,
}

// ========================================
// Allowances
// ========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoAllowance {
    #[serde(default)]
    pub owner: Option<AccountId>,
    pub spender: AccountId,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllowance {
    pub token_id: TokenId,
    #[serde(default)]
    pub owner: Option<AccountId>,
    pub spender: AccountId,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftAllowance {
    pub token_id: TokenId,
    #[serde(default)]
    pub owner: Option<AccountId>,
    pub spender: AccountId,
    #[serde(default)]
    pub serial_numbers: Vec<i64>,
    #[serde(default)]
    pub approved_for_all: Option<bool>,
    /// Spender with approve-for-all granting serial allowances on the owner's behalf
    #[serde(default)]
    pub delegating_spender: Option<AccountId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoApproveAllowanceBody {
    #[serde(default)]
    pub crypto_allowances: Vec<CryptoAllowance>,
    #[serde(default)]
    pub token_allowances: Vec<TokenAllowance>,
    #[serde(default)]
    pub nft_allowances: Vec<NftAllowance>,
}

impl CryptoApproveAllowanceBody {
    pub fn total_entries(&self) -> usize {
        self.crypto_allowances.len()
            + self.token_allowances.len()
            + self
                .nft_allowances
                .iter()
                .map(|a| a.serial_numbers.len().max(1))
                .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftRemoveAllowance {
    pub token_id: TokenId,
    #[serde(default)]
    pub owner: Option<AccountId>,
    pub serial_numbers: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoDeleteAllowanceBody {
    pub nft_allowances: Vec<NftRemoveAllowance>,
}

// ========================================
// Tokens
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCreateBody {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub initial_supply: u64,
    pub treasury: AccountId,
    #[serde(default)]
    pub token_type: TokenType,
    #[serde(default)]
    pub supply_type: TokenSupplyType,
    #[serde(default)]
    pub max_supply: u64,
    #[serde(default)]
    pub admin_key: Option<Key>,
    #[serde(default)]
    pub supply_key: Option<Key>,
    #[serde(default)]
    pub wipe_key: Option<Key>,
    #[serde(default)]
    pub freeze_key: Option<Key>,
    #[serde(default)]
    pub kyc_key: Option<Key>,
    #[serde(default)]
    pub pause_key: Option<Key>,
    #[serde(default)]
    pub fee_schedule_key: Option<Key>,
    #[serde(default)]
    pub metadata_key: Option<Key>,
    #[serde(default)]
    pub freeze_default: bool,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub custom_fees: Vec<CustomFee>,
    #[serde(default)]
    pub expiration_second: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDeleteBody {
    pub token_id: TokenId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMintBody {
    pub token_id: TokenId,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub metadata: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBurnBody {
    pub token_id: TokenId,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub serial_numbers: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWipeBody {
    pub token_id: TokenId,
    pub account_id: AccountId,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub serial_numbers: Vec<i64>,
}

/// Account and a list of tokens to associate or dissociate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAssociationBody {
    pub account_id: AccountId,
    pub token_ids: Vec<TokenId>,
}

/// Freeze, unfreeze, grant KYC and revoke KYC target one relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRelationBody {
    pub token_id: TokenId,
    pub account_id: AccountId,
}

/// Pause and unpause target one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPauseBody {
    pub token_id: TokenId,
}

// ========================================
// Airdrops and rejections
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAirdropBody {
    pub token_transfers: Vec<TokenTransferList>,
}

/// Pending airdrop as referenced in a body; accounts may be aliases
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingAirdropRef {
    pub sender: AccountRef,
    pub receiver: AccountRef,
    pub token_reference: TokenReference,
}

/// Claim and cancel both list pending airdrops
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAirdropsBody {
    pub pending_airdrops: Vec<PendingAirdropRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRejectBody {
    #[serde(default)]
    pub owner: Option<AccountId>,
    pub rejections: Vec<TokenReference>,
}
