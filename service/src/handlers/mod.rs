//! Transaction handlers of the token service.
//!
//! Every functionality has one handler implementing [`TransactionHandler`].
//! The phases run in order: `pure_checks` on the body alone, `pre_handle`
//! against read-only state to collect the required keys, `warm` as a
//! read-ahead hint, then `handle` which mutates state. `calculate_fees`
//! prices the transaction from the body and the state before it applies.

mod crypto_allowance;
mod crypto_create;
mod crypto_delete;
mod crypto_transfer;
mod crypto_update;
mod registry;
mod token_airdrop;
mod token_associate;
mod token_burn;
mod token_claim_airdrop;
mod token_create;
mod token_delete;
mod token_dissociate;
mod token_freeze;
mod token_kyc;
mod token_mint;
mod token_pause;
mod token_reject;
mod token_wipe;

pub use crypto_allowance::{CryptoApproveAllowanceHandler, CryptoDeleteAllowanceHandler};
pub use crypto_create::CryptoCreateHandler;
pub use crypto_delete::CryptoDeleteHandler;
pub use crypto_transfer::CryptoTransferHandler;
pub use crypto_update::CryptoUpdateHandler;
pub use registry::TransactionHandlers;
pub use token_airdrop::TokenAirdropHandler;
pub use token_associate::TokenAssociateToAccountHandler;
pub use token_burn::TokenBurnHandler;
pub use token_claim_airdrop::{TokenCancelAirdropHandler, TokenClaimAirdropHandler};
pub use token_create::TokenCreateHandler;
pub use token_delete::TokenDeleteHandler;
pub use token_dissociate::TokenDissociateFromAccountHandler;
pub use token_freeze::{TokenFreezeAccountHandler, TokenUnfreezeAccountHandler};
pub use token_kyc::{TokenGrantKycToAccountHandler, TokenRevokeKycFromAccountHandler};
pub use token_mint::TokenMintHandler;
pub use token_pause::{TokenPauseHandler, TokenUnpauseHandler};
pub use token_reject::TokenRejectHandler;
pub use token_wipe::TokenAccountWipeHandler;

use tokenledger_common::error::HandlerResult;
use tokenledger_common::transaction::TransactionBody;

use crate::context::{HandleContext, PreHandleContext, WarmupContext};
use crate::fees::{FeeContext, Fees};

pub trait TransactionHandler: Send + Sync {
    /// Checks that need nothing but the body
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()>;

    /// Read-only validation that also collects the keys that must sign
    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()>;

    /// Touch the entities `handle` will read
    fn warm(&self, _ctx: &WarmupContext) {}

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()>;

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees;
}
