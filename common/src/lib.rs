#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod error;
pub mod ids;
pub mod key;
pub mod record;
pub mod response;
pub mod state;
pub mod store;
pub mod transaction;
