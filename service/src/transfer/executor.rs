use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::error::HandlerResult;
use tokenledger_common::ids::AccountId;
use tokenledger_common::record::TokenAssociation;
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::CryptoTransferBody;

use crate::context::HandleContext;

use super::aliases::replace_aliases;
use super::custom_fees::CustomFeeAssessor;
use super::steps::{
    AdjustFungibleTokenChanges, AdjustHbarChanges, AssociateTokenRecipients, NftOwnersChange, TransferStep,
};
use super::validation::check_transfer_limits;
use super::ResolvedTransfers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub charge_custom_fees: bool,
}

impl TransferOptions {
    pub const WITH_CUSTOM_FEES: TransferOptions = TransferOptions {
        charge_custom_fees: true,
    };
    pub const WITHOUT_CUSTOM_FEES: TransferOptions = TransferOptions {
        charge_custom_fees: false,
    };
}

/// State and record access for the transfer steps
pub struct TransferContext<'a, 'b> {
    handle: &'a mut HandleContext<'b>,
    automatic_associations: Vec<TokenAssociation>,
}

impl<'a, 'b> TransferContext<'a, 'b> {
    pub fn new(handle: &'a mut HandleContext<'b>) -> Self {
        Self {
            handle,
            automatic_associations: Vec::new(),
        }
    }

    pub fn state(&self) -> &TokenServiceState {
        self.handle.state()
    }

    pub fn state_mut(&mut self) -> &mut TokenServiceState {
        self.handle.state_mut()
    }

    pub fn config(&self) -> &'b TokenServiceConfig {
        self.handle.config()
    }

    pub fn payer(&self) -> AccountId {
        self.handle.payer()
    }

    pub fn add_automatic_association(&mut self, association: TokenAssociation) {
        self.automatic_associations.push(association);
    }

    /// Hand the automatic associations over to the record
    fn finish(self) {
        self.handle
            .record_mut()
            .automatic_token_associations
            .extend(self.automatic_associations);
    }
}

pub struct TransferExecutor;

impl TransferExecutor {
    /// Validate limits, resolve aliases, then apply the transfer
    pub fn execute(ctx: &mut HandleContext, body: &CryptoTransferBody, options: TransferOptions) -> HandlerResult<()> {
        check_transfer_limits(ctx.config(), body)?;
        let transfers = replace_aliases(ctx, body)?;
        Self::execute_resolved(ctx, transfers, options)
    }

    /// Apply transfers whose accounts are already resolved
    pub fn execute_resolved(
        ctx: &mut HandleContext,
        mut transfers: ResolvedTransfers,
        options: TransferOptions,
    ) -> HandlerResult<()> {
        if options.charge_custom_fees {
            let assessed = CustomFeeAssessor::new(ctx.state(), ctx.config()).assess(&mut transfers)?;
            ctx.record_mut().assessed_custom_fees.extend(assessed);
        }

        let steps: [&dyn TransferStep; 4] = [
            &AssociateTokenRecipients,
            &AdjustHbarChanges,
            &AdjustFungibleTokenChanges,
            &NftOwnersChange,
        ];
        let mut transfer_ctx = TransferContext::new(ctx);
        for step in steps {
            step.do_in(&mut transfer_ctx, &transfers)?;
        }
        transfer_ctx.finish();
        Ok(())
    }
}
