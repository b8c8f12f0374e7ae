//! Transactions as seen by the handlers: a payer, an operation body and
//! the keys that signed it.

mod body;

pub use body::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, IntoStaticStr};

use crate::error::{HandlerError, HandlerResult};
use crate::ids::AccountId;
use crate::key::Key;
use crate::response::ResponseCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, IntoStaticStr)]
pub enum Functionality {
    CryptoCreate,
    CryptoUpdate,
    CryptoDelete,
    CryptoTransfer,
    CryptoApproveAllowance,
    CryptoDeleteAllowance,
    TokenCreate,
    TokenDelete,
    TokenMint,
    TokenBurn,
    TokenAccountWipe,
    TokenAssociateToAccount,
    TokenDissociateFromAccount,
    TokenFreezeAccount,
    TokenUnfreezeAccount,
    TokenGrantKycToAccount,
    TokenRevokeKycFromAccount,
    TokenPause,
    TokenUnpause,
    TokenAirdrop,
    TokenClaimAirdrop,
    TokenCancelAirdrop,
    TokenReject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionBody {
    CryptoCreate(CryptoCreateBody),
    CryptoUpdate(CryptoUpdateBody),
    CryptoDelete(CryptoDeleteBody),
    CryptoTransfer(CryptoTransferBody),
    CryptoApproveAllowance(CryptoApproveAllowanceBody),
    CryptoDeleteAllowance(CryptoDeleteAllowanceBody),
    TokenCreate(TokenCreateBody),
    TokenDelete(TokenDeleteBody),
    TokenMint(TokenMintBody),
    TokenBurn(TokenBurnBody),
    TokenAccountWipe(TokenWipeBody),
    TokenAssociateToAccount(TokenAssociationBody),
    TokenDissociateFromAccount(TokenAssociationBody),
    TokenFreezeAccount(TokenRelationBody),
    TokenUnfreezeAccount(TokenRelationBody),
    TokenGrantKycToAccount(TokenRelationBody),
    TokenRevokeKycFromAccount(TokenRelationBody),
    TokenPause(TokenPauseBody),
    TokenUnpause(TokenPauseBody),
    TokenAirdrop(TokenAirdropBody),
    TokenClaimAirdrop(PendingAirdropsBody),
    TokenCancelAirdrop(PendingAirdropsBody),
    TokenReject(TokenRejectBody),
}

impl TransactionBody {
    pub fn functionality(&self) -> Functionality {
        match self {
            TransactionBody::CryptoCreate(_) => Functionality::CryptoCreate,
            TransactionBody::CryptoUpdate(_) => Functionality::CryptoUpdate,
            TransactionBody::CryptoDelete(_) => Functionality::CryptoDelete,
            TransactionBody::CryptoTransfer(_) => Functionality::CryptoTransfer,
            TransactionBody::CryptoApproveAllowance(_) => Functionality::CryptoApproveAllowance,
            TransactionBody::CryptoDeleteAllowance(_) => Functionality::CryptoDeleteAllowance,
            TransactionBody::TokenCreate(_) => Functionality::TokenCreate,
            TransactionBody::TokenDelete(_) => Functionality::TokenDelete,
            TransactionBody::TokenMint(_) => Functionality::TokenMint,
            TransactionBody::TokenBurn(_) => Functionality::TokenBurn,
            TransactionBody::TokenAccountWipe(_) => Functionality::TokenAccountWipe,
            TransactionBody::TokenAssociateToAccount(_) => Functionality::TokenAssociateToAccount,
            TransactionBody::TokenDissociateFromAccount(_) => {
                Functionality::TokenDissociateFromAccount
            }
            TransactionBody::TokenFreezeAccount(_) => Functionality::TokenFreezeAccount,
            TransactionBody::TokenUnfreezeAccount(_) => Functionality::TokenUnfreezeAccount,
            TransactionBody::TokenGrantKycToAccount(_) => Functionality::TokenGrantKycToAccount,
            TransactionBody::TokenRevokeKycFromAccount(_) => {
                Functionality::TokenRevokeKycFromAccount
            }
            TransactionBody::TokenPause(_) => Functionality::TokenPause,
            TransactionBody::TokenUnpause(_) => Functionality::TokenUnpause,
            TransactionBody::TokenAirdrop(_) => Functionality::TokenAirdrop,
            TransactionBody::TokenClaimAirdrop(_) => Functionality::TokenClaimAirdrop,
            TransactionBody::TokenCancelAirdrop(_) => Functionality::TokenCancelAirdrop,
            TransactionBody::TokenReject(_) => Functionality::TokenReject,
        }
    }
}

/// Typed access to the operation carried by a body
pub trait OpBody: Sized {
    fn from_body(body: &TransactionBody) -> Option<&Self>;
}

macro_rules! op_bodies {
    ($($ty:ty => $($variant:ident)|+;)*) => {
        $(
            impl OpBody for $ty {
                fn from_body(body: &TransactionBody) -> Option<&Self> {
                    match body {
                        $(TransactionBody::$variant(op))|+ => Some(op),
                        _ => None,
                    }
                }
            }
        )*
    };
}

op_bodies! {
    CryptoCreateBody => CryptoCreate;
    CryptoUpdateBody => CryptoUpdate;
    CryptoDeleteBody => CryptoDelete;
    CryptoTransferBody => CryptoTransfer;
    CryptoApproveAllowanceBody => CryptoApproveAllowance;
    CryptoDeleteAllowanceBody => CryptoDeleteAllowance;
    TokenCreateBody => TokenCreate;
    TokenDeleteBody => TokenDelete;
    TokenMintBody => TokenMint;
    TokenBurnBody => TokenBurn;
    TokenWipeBody => TokenAccountWipe;
    TokenAssociationBody => TokenAssociateToAccount | TokenDissociateFromAccount;
    TokenRelationBody => TokenFreezeAccount | TokenUnfreezeAccount | TokenGrantKycToAccount | TokenRevokeKycFromAccount;
    TokenPauseBody => TokenPause | TokenUnpause;
    TokenAirdropBody => TokenAirdrop;
    PendingAirdropsBody => TokenClaimAirdrop | TokenCancelAirdrop;
    TokenRejectBody => TokenReject;
}

/// Operation body of the expected type, or `INVALID_TRANSACTION_BODY`
pub fn body_of<T: OpBody>(body: &TransactionBody) -> HandlerResult<&T> {
    T::from_body(body).ok_or(HandlerError::PreCheck(ResponseCode::InvalidTransactionBody))
}

/// An ordered, authorized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub payer: AccountId,
    pub body: TransactionBody,
    /// Primitive keys whose signatures verified
    #[serde(default)]
    pub signatories: BTreeSet<Key>,
    #[serde(default)]
    pub memo: String,
}

impl Transaction {
    pub fn new(payer: AccountId, body: TransactionBody) -> Self {
        Self {
            payer,
            body,
            signatories: BTreeSet::new(),
            memo: String::new(),
        }
    }

    pub fn signed_by(mut self, key: Key) -> Self {
        self.signatories.insert(key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TokenId;

    #[test]
    fn test_body_of_matches_variant() {
        let body = TransactionBody::TokenUnfreezeAccount(TokenRelationBody {
            token_id: TokenId::from_num(5),
            account_id: AccountId::from_num(1001),
        });
        assert_eq!(body.functionality(), Functionality::TokenUnfreezeAccount);
        let op: &TokenRelationBody = body_of(&body).unwrap();
        assert_eq!(op.token_id, TokenId::from_num(5));
        assert_eq!(
            body_of::<TokenMintBody>(&body).err(),
            Some(HandlerError::PreCheck(ResponseCode::InvalidTransactionBody))
        );
    }

    #[test]
    fn test_functionality_names() {
        let name: &'static str = Functionality::TokenAccountWipe.into();
        assert_eq!(name, "TokenAccountWipe");
        assert_eq!(Functionality::CryptoTransfer.to_string(), "CryptoTransfer");
    }
}
