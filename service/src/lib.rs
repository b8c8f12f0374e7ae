#![allow(clippy::too_many_arguments)]

pub mod context;
pub mod fees;
pub mod finalize;
pub mod handlers;
pub mod ledger;
pub mod transfer;
pub mod workflow;

#[cfg(test)]
mod test_utils;
