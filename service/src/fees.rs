// Fee metering
// Fees are a pure function of the body and the state read before the
// transaction applies; nothing here mutates state.

use serde::{Deserialize, Serialize};

use tokenledger_common::config::{FeesConfig, TokenServiceConfig};
use tokenledger_common::ids::AccountId;
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::TransactionBody;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    pub node_fee: u64,
    pub network_fee: u64,
    pub service_fee: u64,
}

impl Fees {
    pub const FREE: Fees = Fees {
        node_fee: 0,
        network_fee: 0,
        service_fee: 0,
    };

    pub fn total(&self) -> u64 {
        self.node_fee
            .saturating_add(self.network_fee)
            .saturating_add(self.service_fee)
    }

    pub fn plus_service(mut self, extra: u64) -> Self {
        self.service_fee = self.service_fee.saturating_add(extra);
        self
    }
}

pub struct FeeContext<'a> {
    state: &'a TokenServiceState,
    config: &'a TokenServiceConfig,
    body: &'a TransactionBody,
    payer: AccountId,
}

impl<'a> FeeContext<'a> {
    pub fn new(
        state: &'a TokenServiceState,
        config: &'a TokenServiceConfig,
        body: &'a TransactionBody,
        payer: AccountId,
    ) -> Self {
        Self {
            state,
            config,
            body,
            payer,
        }
    }

    pub fn state(&self) -> &'a TokenServiceState {
        self.state
    }

    pub fn config(&self) -> &'a TokenServiceConfig {
        self.config
    }

    pub fn fees_config(&self) -> &'a FeesConfig {
        &self.config.fees
    }

    pub fn body(&self) -> &'a TransactionBody {
        self.body
    }

    pub fn payer(&self) -> AccountId {
        self.payer
    }

    /// Node, network and service components every transaction pays
    pub fn base_fees(&self) -> Fees {
        let fees = self.fees_config();
        Fees {
            node_fee: fees.node_fee,
            network_fee: fees.network_fee,
            service_fee: fees.service_fee,
        }
    }

    /// Base fees plus a per-transfer charge
    pub fn fees_with_transfers(&self, transfers: usize) -> Fees {
        self.base_fees()
            .plus_service(self.fees_config().per_transfer_fee.saturating_mul(transfers as u64))
    }

    /// Base fees plus a per-item charge
    pub fn fees_with_items(&self, items: usize) -> Fees {
        self.base_fees()
            .plus_service(self.fees_config().per_item_fee.saturating_mul(items as u64))
    }
}
