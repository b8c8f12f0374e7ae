// Custom fee assessment
// Fees are assessed one level deep: fee adjustments added here never
// trigger further custom fees. Fixed and fractional fees are charged per
// fungible debit; fixed and royalty fees per NFT movement.

use std::collections::BTreeSet;

use log::debug;

use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::error::{ensure, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::ids::{AccountId, TokenId};
use tokenledger_common::record::AssessedCustomFee;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{CustomFee, CustomFeeKind, FixedFee, FractionalFee, Token};
use tokenledger_common::store::TokenServiceState;

use super::{net_changes, ResolvedAdjustment, ResolvedTransfers};

/// One fee movement from a payer to a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeCharge {
    /// `None` for hbar
    pub denomination: Option<TokenId>,
    pub payer: AccountId,
    pub collector: AccountId,
    pub amount: u64,
}

pub struct CustomFeeAssessor<'a> {
    state: &'a TokenServiceState,
    config: &'a TokenServiceConfig,
}

impl<'a> CustomFeeAssessor<'a> {
    pub fn new(state: &'a TokenServiceState, config: &'a TokenServiceConfig) -> Self {
        Self { state, config }
    }

    /// Assess the custom fees of every token moved by `transfers` and add
    /// the resulting adjustments to it
    pub fn assess(&self, transfers: &mut ResolvedTransfers) -> HandlerResult<Vec<AssessedCustomFee>> {
        let original = transfers.clone();
        let mut charges: Vec<FeeCharge> = Vec::new();
        let mut assessed: Vec<AssessedCustomFee> = Vec::new();
        let mut royalties_charged: BTreeSet<(AccountId, TokenId, usize)> = BTreeSet::new();

        for list in &original.tokens {
            let token = self.state.tokens.get_if_usable(&list.token_id).or_handle()?;
            if token.custom_fees.is_empty() {
                continue;
            }

            // Step 1: Fungible debits pay fixed and fractional fees
            for debit in list.adjustments.iter().filter(|a| a.amount < 0) {
                let sender = debit.account_id;
                let units = debit.amount.unsigned_abs();
                for fee in &token.custom_fees {
                    if is_exempt(token, fee, sender) {
                        continue;
                    }
                    match &fee.fee {
                        CustomFeeKind::Fixed(fixed) => {
                            charges.push(fixed_charge(token, fixed, sender, fee.fee_collector_account_id));
                        }
                        CustomFeeKind::Fractional(fractional) => {
                            let amount = fractional_amount(fractional, units)?;
                            if amount == 0 {
                                continue;
                            }
                            if fractional.net_of_transfers {
                                charges.push(FeeCharge {
                                    denomination: Some(token.token_id),
                                    payer: sender,
                                    collector: fee.fee_collector_account_id,
                                    amount,
                                });
                            } else {
                                assessed.push(reclaim_from_credits(
                                    transfers,
                                    token.token_id,
                                    fee.fee_collector_account_id,
                                    amount,
                                )?);
                            }
                        }
                        CustomFeeKind::Royalty(_) => {}
                    }
                }
            }

            // Step 2: NFT movements pay fixed and royalty fees
            for nft in &list.nft_transfers {
                for (index, fee) in token.custom_fees.iter().enumerate() {
                    match &fee.fee {
                        CustomFeeKind::Fixed(fixed) => {
                            if !is_exempt(token, fee, nft.sender_id) {
                                charges.push(fixed_charge(
                                    token,
                                    fixed,
                                    nft.sender_id,
                                    fee.fee_collector_account_id,
                                ));
                            }
                        }
                        CustomFeeKind::Royalty(royalty) => {
                            if is_exempt(token, fee, nft.sender_id) {
                                continue;
                            }
                            let exchanges = value_received(&original, nft.sender_id, token.token_id);
                            if exchanges.is_empty() {
                                if let Some(fallback) = &royalty.fallback_fee {
                                    if !is_exempt(token, fee, nft.receiver_id) {
                                        charges.push(fixed_charge(
                                            token,
                                            fallback,
                                            nft.receiver_id,
                                            fee.fee_collector_account_id,
                                        ));
                                    }
                                }
                            } else if royalties_charged.insert((nft.sender_id, token.token_id, index)) {
                                for (denomination, value) in exchanges {
                                    let amount = fraction_of(value, royalty.numerator, royalty.denominator)?;
                                    if amount > 0 {
                                        charges.push(FeeCharge {
                                            denomination,
                                            payer: nft.sender_id,
                                            collector: fee.fee_collector_account_id,
                                            amount,
                                        });
                                    }
                                }
                            }
                        }
                        CustomFeeKind::Fractional(_) => {}
                    }
                }
            }
        }

        if charges.is_empty() && assessed.is_empty() {
            return Ok(Vec::new());
        }

        // Step 3: Apply the charges and check their limits
        apply_charges(transfers, &charges);
        ensure(
            transfers.balance_change_count() <= self.config.ledger.xfer_bal_changes_max_len,
            ResponseCode::CustomFeeChargingExceededMaxAccountAmounts,
        )?;
        self.check_fee_payers_can_pay(transfers, &charges)?;

        assessed.extend(assessed_fees(&charges));
        if log::log_enabled!(log::Level::Debug) {
            debug!("Assessed {} custom fees", assessed.len());
        }
        Ok(assessed)
    }

    /// Fees a sender prepays for value that stays pending
    ///
    /// `value` is `None` for an NFT.
    pub fn prepaid_fees(&self, token: &Token, sender: AccountId, value: Option<u64>) -> HandlerResult<Vec<FeeCharge>> {
        let mut charges = Vec::new();
        for fee in &token.custom_fees {
            if let CustomFeeKind::Royalty(royalty) = &fee.fee {
                ensure(
                    royalty.fallback_fee.is_none(),
                    ResponseCode::TokenAirdropWithFallbackRoyalty,
                )?;
            }
            if is_exempt(token, fee, sender) {
                continue;
            }
            match (&fee.fee, value) {
                (CustomFeeKind::Fixed(fixed), _) => {
                    charges.push(fixed_charge(token, fixed, sender, fee.fee_collector_account_id));
                }
                (CustomFeeKind::Fractional(fractional), Some(units)) => {
                    let amount = fractional_amount(fractional, units)?;
                    if amount > 0 {
                        charges.push(FeeCharge {
                            denomination: Some(token.token_id),
                            payer: sender,
                            collector: fee.fee_collector_account_id,
                            amount,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(charges)
    }

    fn check_fee_payers_can_pay(&self, transfers: &ResolvedTransfers, charges: &[FeeCharge]) -> HandlerResult<()> {
        let payers: BTreeSet<(Option<TokenId>, AccountId)> =
            charges.iter().map(|c| (c.denomination, c.payer)).collect();
        for (denomination, payer) in payers {
            let (balance, change) = match denomination {
                None => (
                    self.state
                        .accounts
                        .get(&payer)
                        .map(|a| a.tinybar_balance)
                        .unwrap_or(0),
                    net_changes(&transfers.hbar)?.get(&payer).copied().unwrap_or(0),
                ),
                Some(token_id) => (
                    self.state
                        .token_relations
                        .get(&payer, &token_id)
                        .map(|rel| rel.balance)
                        .unwrap_or(0),
                    transfers
                        .tokens
                        .iter()
                        .filter(|list| list.token_id == token_id)
                        .map(|list| net_changes(&list.adjustments))
                        .collect::<HandlerResult<Vec<_>>>()?
                        .iter()
                        .filter_map(|net| net.get(&payer))
                        .sum::<i64>(),
                ),
            };
            ensure(
                balance as i128 + change as i128 >= 0,
                ResponseCode::InsufficientSenderAccountBalanceForCustomFee,
            )?;
        }
        Ok(())
    }
}

/// Treasury, the fee's own collector, and any collector of a fee that
/// exempts all collectors pay nothing
fn is_exempt(token: &Token, fee: &CustomFee, account: AccountId) -> bool {
    account == token.treasury_account_id
        || account == fee.fee_collector_account_id
        || (fee.all_collectors_are_exempt && token.is_fee_collector(account))
}

fn fixed_charge(token: &Token, fixed: &FixedFee, payer: AccountId, collector: AccountId) -> FeeCharge {
    // A denominating token numbered zero stands for the token itself
    let denomination = fixed
        .denominating_token_id
        .map(|id| if id.num == 0 { token.token_id } else { id });
    FeeCharge {
        denomination,
        payer,
        collector,
        amount: fixed.amount,
    }
}

fn fraction_of(units: u64, numerator: u64, denominator: u64) -> HandlerResult<u64> {
    ensure(denominator != 0, ResponseCode::FractionDividesByZero)?;
    let amount = units as u128 * numerator as u128 / denominator as u128;
    u64::try_from(amount).map_err(|_| HandlerError::Handle(ResponseCode::CustomFeeChargingExceededMaxAccountAmounts))
}

/// Fractional fee clamped to its bounds; a zero maximum means uncapped
fn fractional_amount(fee: &FractionalFee, units: u64) -> HandlerResult<u64> {
    let mut amount = fraction_of(units, fee.numerator, fee.denominator)?.max(fee.minimum_amount);
    if fee.maximum_amount > 0 {
        amount = amount.min(fee.maximum_amount);
    }
    Ok(amount)
}

/// Fungible value `account` receives outside the NFT token itself
fn value_received(transfers: &ResolvedTransfers, account: AccountId, nft_token: TokenId) -> Vec<(Option<TokenId>, u64)> {
    let credited = |adjustments: &[ResolvedAdjustment]| -> u64 {
        adjustments
            .iter()
            .filter(|a| a.account_id == account && a.amount > 0)
            .map(|a| a.amount as u64)
            .sum()
    };
    let mut exchanges = Vec::new();
    let hbar = credited(&transfers.hbar);
    if hbar > 0 {
        exchanges.push((None, hbar));
    }
    for list in transfers.tokens.iter().filter(|l| l.token_id != nft_token) {
        let units = credited(&list.adjustments);
        if units > 0 {
            exchanges.push((Some(list.token_id), units));
        }
    }
    exchanges
}

/// Take a fractional fee out of the credits of a fungible list in
/// proportion to each credit
fn reclaim_from_credits(
    transfers: &mut ResolvedTransfers,
    token_id: TokenId,
    collector: AccountId,
    amount: u64,
) -> HandlerResult<AssessedCustomFee> {
    let list = transfers.token_list_mut(token_id);
    let credits: Vec<usize> = list
        .adjustments
        .iter()
        .enumerate()
        .filter(|(_, a)| a.amount > 0 && a.account_id != collector)
        .map(|(i, _)| i)
        .collect();
    let total: u128 = credits.iter().map(|i| list.adjustments[*i].amount as u128).sum();
    ensure(total > 0, ResponseCode::InsufficientSenderAccountBalanceForCustomFee)?;
    let amount = (amount as u128).min(total);

    let mut remaining = amount;
    let mut payers = Vec::new();
    for (n, i) in credits.iter().enumerate() {
        let credit = list.adjustments[*i].amount as u128;
        let share = if n + 1 == credits.len() {
            remaining
        } else {
            amount * credit / total
        };
        remaining -= share;
        if share > 0 {
            list.adjustments[*i].amount -= share as i64;
            payers.push(list.adjustments[*i].account_id);
        }
    }
    list.adjustments.push(ResolvedAdjustment::new(collector, amount as i64));

    Ok(AssessedCustomFee {
        token_id: Some(token_id),
        fee_collector_account_id: collector,
        amount: amount as u64,
        effective_payer_account_ids: payers,
    })
}

/// Add a debit of the payer and a credit of the collector for each charge
pub fn apply_charges(transfers: &mut ResolvedTransfers, charges: &[FeeCharge]) {
    for charge in charges {
        let amount = charge.amount as i64;
        let adjustments = match charge.denomination {
            None => &mut transfers.hbar,
            Some(token_id) => &mut transfers.token_list_mut(token_id).adjustments,
        };
        adjustments.push(ResolvedAdjustment::new(charge.payer, -amount));
        adjustments.push(ResolvedAdjustment::new(charge.collector, amount));
    }
}

pub fn assessed_fees(charges: &[FeeCharge]) -> Vec<AssessedCustomFee> {
    charges
        .iter()
        .map(|charge| AssessedCustomFee {
            token_id: charge.denomination,
            fee_collector_account_id: charge.collector,
            amount: charge.amount,
            effective_payer_account_ids: vec![charge.payer],
        })
        .collect()
}
