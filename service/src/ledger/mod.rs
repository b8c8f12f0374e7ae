//! Ledger primitives shared by the handlers and the transfer pipeline.
//!
//! Everything here reads and writes through the [`TokenServiceState`]
//! stores. Linked-list neighbours are always re-fetched from the store
//! before they are rewritten.
//!
//! [`TokenServiceState`]: tokenledger_common::store::TokenServiceState

pub mod airdrops;
pub mod allowances;
pub mod nft_chain;
pub mod supply;
pub mod token_rels;

use tokenledger_common::state::Account;

/// Highest serial number a token may ever mint
pub const MAX_SERIAL_NUMBER: u64 = 0xFFFF_FFFF;

/// Move `number_positive_balances` across the zero boundary of one relation
pub fn update_positive_balances(account: &mut Account, old_balance: u64, new_balance: u64) {
    if old_balance == 0 && new_balance > 0 {
        account.number_positive_balances += 1;
    } else if old_balance > 0 && new_balance == 0 {
        account.number_positive_balances = account.number_positive_balances.saturating_sub(1);
    }
}
