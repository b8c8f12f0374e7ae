//! Typed configuration consumed by the token service handlers.
//!
//! Every section deserializes from JSON with per-field defaults, so a
//! config file only needs to mention the values it changes.

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ids::AccountId;

/// Account receiving transaction fees
pub const DEFAULT_FUNDING_ACCOUNT: AccountId = AccountId::from_num(98);

const fn default_true() -> bool {
    true
}

// ========================================
// Tokens
// ========================================

const fn default_max_per_account() -> u64 {
    1_000
}

const fn default_max_aggregate_rels() -> u64 {
    10_000_000
}

const fn default_max_tokens() -> u64 {
    1_000_000
}

const fn default_max_name_bytes() -> usize {
    100
}

const fn default_max_custom_fees() -> usize {
    10
}

const fn default_max_allowed_airdrop_transfers() -> usize {
    10
}

const fn default_max_pending_airdrop_ids() -> usize {
    10
}

const fn default_max_allowed_token_rejections() -> usize {
    10
}

/// NFT limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftsConfig {
    #[serde(default = "default_true")]
    pub are_enabled: bool,
    #[serde(default = "NftsConfig::default_batch_size")]
    pub max_batch_size_mint: usize,
    #[serde(default = "NftsConfig::default_batch_size")]
    pub max_batch_size_burn: usize,
    #[serde(default = "NftsConfig::default_batch_size")]
    pub max_batch_size_wipe: usize,
    #[serde(default = "NftsConfig::default_metadata_bytes")]
    pub max_metadata_bytes: usize,
    /// Ceiling on the number of NFTs in state
    #[serde(default = "NftsConfig::default_max_allowed_mints")]
    pub max_allowed_mints: u64,
}

impl NftsConfig {
    const fn default_batch_size() -> usize {
        10
    }

    const fn default_metadata_bytes() -> usize {
        100
    }

    const fn default_max_allowed_mints() -> u64 {
        10_000_000
    }
}

impl Default for NftsConfig {
    fn default() -> Self {
        Self {
            are_enabled: true,
            max_batch_size_mint: Self::default_batch_size(),
            max_batch_size_burn: Self::default_batch_size(),
            max_batch_size_wipe: Self::default_batch_size(),
            max_metadata_bytes: Self::default_metadata_bytes(),
            max_allowed_mints: Self::default_max_allowed_mints(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensConfig {
    /// Per-account association ceiling, enforced when `limit_token_associations`
    #[serde(default = "default_max_per_account")]
    pub max_per_account: u64,
    #[serde(default)]
    pub limit_token_associations: bool,
    /// Ceiling on the number of token relations in state
    #[serde(default = "default_max_aggregate_rels")]
    pub max_aggregate_rels: u64,
    #[serde(default = "default_max_tokens")]
    pub max_number: u64,
    #[serde(default = "default_max_name_bytes")]
    pub max_token_name_utf8_bytes: usize,
    #[serde(default = "default_max_name_bytes")]
    pub max_symbol_utf8_bytes: usize,
    #[serde(default = "default_max_custom_fees")]
    pub max_custom_fees_allowed: usize,
    #[serde(default)]
    pub nfts: NftsConfig,
    #[serde(default = "default_true")]
    pub airdrops_enabled: bool,
    #[serde(default = "default_true")]
    pub airdrops_claim_enabled: bool,
    #[serde(default = "default_true")]
    pub airdrops_cancel_enabled: bool,
    #[serde(default = "default_max_allowed_airdrop_transfers")]
    pub max_allowed_airdrop_transfers_per_tx: usize,
    #[serde(default = "default_max_pending_airdrop_ids")]
    pub max_allowed_pending_airdrops_to_claim: usize,
    #[serde(default = "default_max_pending_airdrop_ids")]
    pub max_allowed_pending_airdrops_to_cancel: usize,
    #[serde(default = "default_true")]
    pub reject_enabled: bool,
    #[serde(default = "default_max_allowed_token_rejections")]
    pub max_allowed_token_rejections: usize,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            max_per_account: default_max_per_account(),
            limit_token_associations: false,
            max_aggregate_rels: default_max_aggregate_rels(),
            max_number: default_max_tokens(),
            max_token_name_utf8_bytes: default_max_name_bytes(),
            max_symbol_utf8_bytes: default_max_name_bytes(),
            max_custom_fees_allowed: default_max_custom_fees(),
            nfts: NftsConfig::default(),
            airdrops_enabled: true,
            airdrops_claim_enabled: true,
            airdrops_cancel_enabled: true,
            max_allowed_airdrop_transfers_per_tx: default_max_allowed_airdrop_transfers(),
            max_allowed_pending_airdrops_to_claim: default_max_pending_airdrop_ids(),
            max_allowed_pending_airdrops_to_cancel: default_max_pending_airdrop_ids(),
            reject_enabled: true,
            max_allowed_token_rejections: default_max_allowed_token_rejections(),
        }
    }
}

// ========================================
// Ledger
// ========================================

const fn default_transfers_max_len() -> usize {
    10
}

const fn default_xfer_bal_changes_max_len() -> usize {
    20
}

const fn default_funding_account() -> AccountId {
    DEFAULT_FUNDING_ACCOUNT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_transfers_max_len")]
    pub transfers_max_len: usize,
    #[serde(default = "default_transfers_max_len")]
    pub token_transfers_max_len: usize,
    #[serde(default = "default_transfers_max_len")]
    pub nft_transfers_max_len: usize,
    /// Ceiling on balance changes once custom fees are added
    #[serde(default = "default_xfer_bal_changes_max_len")]
    pub xfer_bal_changes_max_len: usize,
    #[serde(default = "default_funding_account")]
    pub funding_account: AccountId,
    #[serde(default = "default_true")]
    pub auto_creation_enabled: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            transfers_max_len: default_transfers_max_len(),
            token_transfers_max_len: default_transfers_max_len(),
            nft_transfers_max_len: default_transfers_max_len(),
            xfer_bal_changes_max_len: default_xfer_bal_changes_max_len(),
            funding_account: DEFAULT_FUNDING_ACCOUNT,
            auto_creation_enabled: true,
        }
    }
}

// ========================================
// Entities
// ========================================

const fn default_max_accounts() -> u64 {
    20_000_000
}

const fn default_max_auto_associations() -> i32 {
    5_000
}

const fn default_max_memo_bytes() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitiesConfig {
    #[serde(default = "default_max_accounts")]
    pub max_accounts: u64,
    /// Whether `max_auto_associations = -1` is accepted
    #[serde(default = "default_true")]
    pub unlimited_auto_associations_enabled: bool,
    /// Ceiling on a finite `max_auto_associations`
    #[serde(default = "default_max_auto_associations")]
    pub max_auto_associations: i32,
    #[serde(default = "default_max_memo_bytes")]
    pub max_memo_utf8_bytes: usize,
}

impl Default for EntitiesConfig {
    fn default() -> Self {
        Self {
            max_accounts: default_max_accounts(),
            unlimited_auto_associations_enabled: true,
            max_auto_associations: default_max_auto_associations(),
            max_memo_utf8_bytes: default_max_memo_bytes(),
        }
    }
}

// ========================================
// Allowances
// ========================================

const fn default_max_transaction_allowances() -> usize {
    20
}

const fn default_max_account_allowances() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowancesConfig {
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    /// Ceiling on allowance entries in one transaction
    #[serde(default = "default_max_transaction_allowances")]
    pub max_transaction_limit: usize,
    /// Ceiling on allowance entries stored on one account
    #[serde(default = "default_max_account_allowances")]
    pub max_account_limit: usize,
}

impl Default for AllowancesConfig {
    fn default() -> Self {
        Self {
            is_enabled: true,
            max_transaction_limit: default_max_transaction_allowances(),
            max_account_limit: default_max_account_allowances(),
        }
    }
}

// ========================================
// Fees
// ========================================

/// Flat fee components in tinybars
///
/// Pricing tables are not modelled; handlers combine these components
/// deterministically from the body and the state they read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeesConfig {
    #[serde(default = "FeesConfig::default_node_fee")]
    pub node_fee: u64,
    #[serde(default = "FeesConfig::default_network_fee")]
    pub network_fee: u64,
    #[serde(default = "FeesConfig::default_service_fee")]
    pub service_fee: u64,
    /// Added per balance change or NFT movement
    #[serde(default = "FeesConfig::default_per_transfer_fee")]
    pub per_transfer_fee: u64,
    /// Added per serial minted, burned or wiped and per token referenced
    #[serde(default = "FeesConfig::default_per_item_fee")]
    pub per_item_fee: u64,
    /// Added when a transferred token carries custom fees
    #[serde(default = "FeesConfig::default_custom_fee_surcharge")]
    pub custom_fee_surcharge: u64,
    /// Service fee for creating an account or a token
    #[serde(default = "FeesConfig::default_entity_creation_fee")]
    pub entity_creation_fee: u64,
}

impl FeesConfig {
    const fn default_node_fee() -> u64 {
        10_000
    }

    const fn default_network_fee() -> u64 {
        20_000
    }

    const fn default_service_fee() -> u64 {
        50_000
    }

    const fn default_per_transfer_fee() -> u64 {
        5_000
    }

    const fn default_per_item_fee() -> u64 {
        10_000
    }

    const fn default_custom_fee_surcharge() -> u64 {
        25_000
    }

    const fn default_entity_creation_fee() -> u64 {
        1_000_000
    }
}

impl Default for FeesConfig {
    fn default() -> Self {
        Self {
            node_fee: Self::default_node_fee(),
            network_fee: Self::default_network_fee(),
            service_fee: Self::default_service_fee(),
            per_transfer_fee: Self::default_per_transfer_fee(),
            per_item_fee: Self::default_per_item_fee(),
            custom_fee_surcharge: Self::default_custom_fee_surcharge(),
            entity_creation_fee: Self::default_entity_creation_fee(),
        }
    }
}

// ========================================
// Records
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Fail a user transaction with children whose own record still
    /// carries token changes once the children are deducted
    #[serde(default)]
    pub require_zero_parent_token_changes: bool,
}

// ========================================
// Aggregate
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenServiceConfig {
    #[serde(default)]
    pub tokens: TokensConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub entities: EntitiesConfig,
    #[serde(default)]
    pub allowances: AllowancesConfig,
    #[serde(default)]
    pub fees: FeesConfig,
    #[serde(default)]
    pub records: RecordsConfig,
}

impl TokenServiceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Error while parsing token service config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Error while reading config file {}", path.display()))?;
        let config = Self::from_json_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded token service config from {}", path.display());
        Ok(config)
    }

    /// Reject limits no transaction could ever satisfy
    pub fn validate(&self) -> Result<()> {
        if self.ledger.transfers_max_len == 0 {
            bail!("ledger.transfers_max_len must be positive");
        }
        if self.ledger.xfer_bal_changes_max_len < self.ledger.transfers_max_len {
            bail!("ledger.xfer_bal_changes_max_len must be at least ledger.transfers_max_len");
        }
        if self.ledger.funding_account.is_missing() {
            bail!("ledger.funding_account must be a real account");
        }
        if self.entities.max_auto_associations < 0 {
            bail!("entities.max_auto_associations must not be negative");
        }
        if self.tokens.nfts.max_batch_size_mint == 0 {
            bail!("tokens.nfts.max_batch_size_mint must be positive");
        }
        Ok(())
    }
}
