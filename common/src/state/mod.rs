//! Ledger entities stored in the token service state.

mod account;
mod relation;
mod token;

pub use account::*;
pub use relation::*;
pub use token::*;
