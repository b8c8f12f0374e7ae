use tokenledger_common::transaction::Functionality;

use super::*;

/// One handler per functionality, built by explicit construction
pub struct TransactionHandlers {
    crypto_create: CryptoCreateHandler,
    crypto_update: CryptoUpdateHandler,
    crypto_delete: CryptoDeleteHandler,
    crypto_transfer: CryptoTransferHandler,
    crypto_approve_allowance: CryptoApproveAllowanceHandler,
    crypto_delete_allowance: CryptoDeleteAllowanceHandler,
    token_create: TokenCreateHandler,
    token_delete: TokenDeleteHandler,
    token_mint: TokenMintHandler,
    token_burn: TokenBurnHandler,
    token_account_wipe: TokenAccountWipeHandler,
    token_associate: TokenAssociateToAccountHandler,
    token_dissociate: TokenDissociateFromAccountHandler,
    token_freeze: TokenFreezeAccountHandler,
    token_unfreeze: TokenUnfreezeAccountHandler,
    token_grant_kyc: TokenGrantKycToAccountHandler,
    token_revoke_kyc: TokenRevokeKycFromAccountHandler,
    token_pause: TokenPauseHandler,
    token_unpause: TokenUnpauseHandler,
    token_airdrop: TokenAirdropHandler,
    token_claim_airdrop: TokenClaimAirdropHandler,
    token_cancel_airdrop: TokenCancelAirdropHandler,
    token_reject: TokenRejectHandler,
}

impl Default for TransactionHandlers {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionHandlers {
    pub fn new() -> Self {
        Self {
            crypto_create: CryptoCreateHandler,
            crypto_update: CryptoUpdateHandler,
            crypto_delete: CryptoDeleteHandler,
            crypto_transfer: CryptoTransferHandler,
            crypto_approve_allowance: CryptoApproveAllowanceHandler,
            crypto_delete_allowance: CryptoDeleteAllowanceHandler,
            token_create: TokenCreateHandler,
            token_delete: TokenDeleteHandler,
            token_mint: TokenMintHandler,
            token_burn: TokenBurnHandler,
            token_account_wipe: TokenAccountWipeHandler,
            token_associate: TokenAssociateToAccountHandler,
            token_dissociate: TokenDissociateFromAccountHandler,
            token_freeze: TokenFreezeAccountHandler,
            token_unfreeze: TokenUnfreezeAccountHandler,
            token_grant_kyc: TokenGrantKycToAccountHandler,
            token_revoke_kyc: TokenRevokeKycFromAccountHandler,
            token_pause: TokenPauseHandler,
            token_unpause: TokenUnpauseHandler,
            token_airdrop: TokenAirdropHandler,
            token_claim_airdrop: TokenClaimAirdropHandler,
            token_cancel_airdrop: TokenCancelAirdropHandler,
            token_reject: TokenRejectHandler,
        }
    }

    pub fn handler_for(&self, functionality: Functionality) -> &dyn TransactionHandler {
        match functionality {
            Functionality::CryptoCreate => &self.crypto_create,
            Functionality::CryptoUpdate => &self.crypto_update,
            Functionality::CryptoDelete => &self.crypto_delete,
            Functionality::CryptoTransfer => &self.crypto_transfer,
            Functionality::CryptoApproveAllowance => &self.crypto_approve_allowance,
            Functionality::CryptoDeleteAllowance => &self.crypto_delete_allowance,
            Functionality::TokenCreate => &self.token_create,
            Functionality::TokenDelete => &self.token_delete,
            Functionality::TokenMint => &self.token_mint,
            Functionality::TokenBurn => &self.token_burn,
            Functionality::TokenAccountWipe => &self.token_account_wipe,
            Functionality::TokenAssociateToAccount => &self.token_associate,
            Functionality::TokenDissociateFromAccount => &self.token_dissociate,
            Functionality::TokenFreezeAccount => &self.token_freeze,
            Functionality::TokenUnfreezeAccount => &self.token_unfreeze,
            Functionality::TokenGrantKycToAccount => &self.token_grant_kyc,
            Functionality::TokenRevokeKycFromAccount => &self.token_revoke_kyc,
            Functionality::TokenPause => &self.token_pause,
            Functionality::TokenUnpause => &self.token_unpause,
            Functionality::TokenAirdrop => &self.token_airdrop,
            Functionality::TokenClaimAirdrop => &self.token_claim_airdrop,
            Functionality::TokenCancelAirdrop => &self.token_cancel_airdrop,
            Functionality::TokenReject => &self.token_reject,
        }
    }
}
