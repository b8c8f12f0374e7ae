// Response codes
// The identifiers are part of the wire protocol: their string form is
// the SCREAMING_SNAKE_CASE variant name and must never be renamed.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    // ========================================
    // General
    // ========================================
    Ok,
    Success,
    FailInvalid,
    NotSupported,
    InvalidTransactionBody,
    InvalidSignature,
    KeyRequired,
    BadEncoding,
    MemoTooLong,
    InvalidExpirationTime,
    BatchSizeLimitExceeded,
    MaxEntitiesInPriceRegimeHaveBeenCreated,

    // ========================================
    // Payer and accounts
    // ========================================
    PayerAccountNotFound,
    InvalidPayerAccountId,
    InsufficientPayerBalance,
    InvalidAccountId,
    AccountDeleted,
    AccountExpiredAndPendingRemoval,
    AccountIdDoesNotExist,
    InsufficientAccountBalance,
    AliasAlreadyAssigned,
    InvalidAliasKey,
    InvalidMaxAutoAssociations,
    RequestedNumAutomaticAssociationsExceedsAssociationLimit,
    ExistingAutomaticAssociationsExceedGivenLimit,
    ExpirationReductionNotAllowed,
    TransferAccountSameAsDeleteAccount,
    InvalidTransferAccountId,
    NoRemainingAutomaticAssociations,

    // ========================================
    // Transfers
    // ========================================
    InvalidAccountAmounts,
    AccountRepeatedInAccountAmounts,
    TransferListSizeLimitExceeded,
    TokenTransferListSizeLimitExceeded,
    EmptyTokenTransferBody,
    EmptyTokenTransferAccountAmounts,
    TransfersNotZeroSumForToken,
    TokenIdRepeatedInTokenList,
    InvalidTokenNftSerialNumber,
    SenderDoesNotOwnNftSerialNo,
    UnexpectedTokenDecimals,
    AccountAmountTransfersOnlyAllowedForFungibleCommon,

    // ========================================
    // Tokens
    // ========================================
    InvalidTokenId,
    TokenWasDeleted,
    TokenIsPaused,
    TokenIsImmutable,
    TokenHasNoSupplyKey,
    TokenHasNoWipeKey,
    TokenHasNoFreezeKey,
    TokenHasNoKycKey,
    TokenHasNoPauseKey,
    TokenNotAssociatedToAccount,
    TokenAlreadyAssociatedToAccount,
    TokensPerAccountLimitExceeded,
    AccountFrozenForToken,
    AccountKycNotGrantedForToken,
    AccountIsTreasury,
    TransactionRequiresZeroTokenBalances,
    AccountStillOwnsNfts,
    InsufficientTokenBalance,
    TokenMaxSupplyReached,
    InvalidTokenMintAmount,
    InvalidTokenBurnAmount,
    InvalidTokenMintMetadata,
    InvalidTokenBurnMetadata,
    InvalidWipingAmount,
    InvalidNftId,
    AccountDoesNotOwnWipedNft,
    TreasuryMustOwnBurnedNft,
    CannotWipeTokenTreasuryAccount,
    SerialNumberLimitReached,
    MetadataTooLong,
    MaxNftsInPriceRegimeHaveBeenMinted,
    MissingTokenName,
    MissingTokenSymbol,
    TokenNameTooLong,
    TokenSymbolTooLong,
    InvalidTokenDecimals,
    InvalidTokenInitialSupply,
    InvalidTokenMaxSupply,
    InvalidTreasuryAccountForToken,

    // ========================================
    // Custom fees
    // ========================================
    CustomFeesListTooLong,
    InvalidCustomFeeCollector,
    InvalidTokenIdInCustomFees,
    TokenNotAssociatedToFeeCollector,
    CustomFeeMustBePositive,
    FractionDividesByZero,
    FractionalFeeMaxAmountLessThanMinAmount,
    CustomFractionalFeeOnlyAllowedForFungibleCommon,
    CustomRoyaltyFeeOnlyAllowedForNonFungibleUnique,
    RoyaltyFractionCannotExceedOne,
    CustomFeeDenominationMustBeFungibleCommon,
    InsufficientSenderAccountBalanceForCustomFee,
    CustomFeeChargingExceededMaxAccountAmounts,

    // ========================================
    // Allowances
    // ========================================
    EmptyAllowances,
    MaxAllowancesExceeded,
    SpenderAccountSameAsOwner,
    InvalidAllowanceOwnerId,
    InvalidAllowanceSpenderId,
    NftInFungibleTokenAllowances,
    FungibleTokenInNftAllowances,
    AmountExceedsTokenMaxSupply,
    NegativeAllowanceAmount,
    DelegatingSpenderDoesNotHaveApproveForAll,
    DelegatingSpenderCannotGrantApproveForAll,
    SpenderDoesNotHaveAllowance,
    AmountExceedsAllowance,

    // ========================================
    // Airdrops and rejections
    // ========================================
    PendingNftAirdropAlreadyExists,
    TokenAirdropWithFallbackRoyalty,
    EmptyPendingAirdropIdList,
    PendingAirdropIdListTooLong,
    PendingAirdropIdRepeated,
    InvalidPendingAirdropId,
    EmptyTokenReferenceList,
    TokenReferenceListSizeLimitExceeded,
    TokenReferenceRepeated,
    InvalidOwnerId,
}

impl ResponseCode {
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseCode::Ok | ResponseCode::Success)
    }
}
