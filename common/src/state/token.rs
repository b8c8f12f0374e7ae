use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, TokenId};
use crate::key::Key;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[default]
    FungibleCommon,
    NonFungibleUnique,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSupplyType {
    #[default]
    Infinite,
    Finite,
}

/// Fixed fee; `denominating_token_id` of `None` means hbar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedFee {
    pub amount: u64,
    #[serde(default)]
    pub denominating_token_id: Option<TokenId>,
}

/// Fraction of the units transferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractionalFee {
    pub numerator: u64,
    pub denominator: u64,
    #[serde(default)]
    pub minimum_amount: u64,
    /// Zero means uncapped
    #[serde(default)]
    pub maximum_amount: u64,
    #[serde(default)]
    pub net_of_transfers: bool,
}

/// Fraction of the value exchanged for an NFT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltyFee {
    pub numerator: u64,
    pub denominator: u64,
    #[serde(default)]
    pub fallback_fee: Option<FixedFee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomFeeKind {
    Fixed(FixedFee),
    Fractional(FractionalFee),
    Royalty(RoyaltyFee),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFee {
    pub fee: CustomFeeKind,
    pub fee_collector_account_id: AccountId,
    #[serde(default)]
    pub all_collectors_are_exempt: bool,
}

impl CustomFee {
    pub fn fixed_hbar(amount: u64, collector: AccountId) -> Self {
        Self {
            fee: CustomFeeKind::Fixed(FixedFee {
                amount,
                denominating_token_id: None,
            }),
            fee_collector_account_id: collector,
            all_collectors_are_exempt: false,
        }
    }

    pub fn fixed_fee(&self) -> Option<&FixedFee> {
        match &self.fee {
            CustomFeeKind::Fixed(fixed) => Some(fixed),
            _ => None,
        }
    }
}

/// Token state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_id: TokenId,
    #[serde(default)]
    pub token_type: TokenType,
    #[serde(default)]
    pub supply_type: TokenSupplyType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub total_supply: u64,
    #[serde(default)]
    pub max_supply: u64,
    pub treasury_account_id: AccountId,

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
    pub last_used_serial_number: u64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub accounts_frozen_by_default: bool,
    #[serde(default)]
    pub accounts_kyc_granted_by_default: bool,
    #[serde(default)]
    pub expiration_second: i64,
    #[serde(default)]
    pub custom_fees: Vec<CustomFee>,
}

impl Token {
    pub fn is_fungible(&self) -> bool {
        self.token_type == TokenType::FungibleCommon
    }

    pub fn is_finite(&self) -> bool {
        self.supply_type == TokenSupplyType::Finite
    }

    pub fn has_freeze_key(&self) -> bool {
        self.freeze_key.is_some()
    }

    pub fn has_kyc_key(&self) -> bool {
        self.kyc_key.is_some()
    }

    /// Frozen flag a freshly created relation starts with
    pub fn relation_starts_frozen(&self) -> bool {
        self.has_freeze_key() && self.accounts_frozen_by_default
    }

    /// KYC flag a freshly created relation starts with
    pub fn relation_starts_kyc_granted(&self) -> bool {
        !self.has_kyc_key() || self.accounts_kyc_granted_by_default
    }

    pub fn is_fee_collector(&self, account_id: AccountId) -> bool {
        self.custom_fees
            .iter()
            .any(|fee| fee.fee_collector_account_id == account_id)
    }
}
