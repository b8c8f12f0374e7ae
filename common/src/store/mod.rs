//! Writable stores backing the token service.
//!
//! Each store is a typed view over a [`WritableKvState`]; the
//! [`TokenServiceState`] bundles them and takes savepoints across all of
//! them at once.

mod accounts;
mod kv;
mod state;
mod tokens;

pub use accounts::{AccountStoreSavepoint, WritableAccountStore};
pub use kv::{KvSavepoint, WritableKvState};
pub use state::{PendingAirdropEntry, StateSavepoint, StateSnapshot, TokenServiceState, FIRST_USER_ENTITY};
pub use tokens::{WritableAirdropStore, WritableNftStore, WritableTokenRelationStore, WritableTokenStore};
