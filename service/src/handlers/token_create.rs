// Token creation
// The treasury and the collectors of fees charged in the new token itself
// are associated in the same transaction; the initial supply is minted
// straight into the treasury.

use log::debug;

use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult};
use tokenledger_common::ids::{AccountId, TokenId};
use tokenledger_common::key::Key;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{CustomFee, CustomFeeKind, FixedFee, Token, TokenSupplyType};
use tokenledger_common::store::TokenServiceState;
use tokenledger_common::transaction::{body_of, TokenCreateBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};
use crate::ledger::supply::change_supply;
use crate::ledger::token_rels::{create_and_link_token_rels, ensure_association_capacity, NewRelation};

use super::TransactionHandler;

/// Expiry given to tokens created without one
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 7_776_000;

pub struct TokenCreateHandler;

fn keys(op: &TokenCreateBody) -> impl Iterator<Item = &Key> {
    [
        &op.admin_key,
        &op.supply_key,
        &op.wipe_key,
        &op.freeze_key,
        &op.kyc_key,
        &op.pause_key,
        &op.fee_schedule_key,
        &op.metadata_key,
    ]
    .into_iter()
    .flatten()
}

/// Denomination `None` is hbar; token number zero stands for the new token
fn is_self_denominated(fixed: &FixedFee) -> bool {
    fixed.denominating_token_id.is_some_and(|id| id.num == 0)
}

/// Validates a custom fee schedule for a token about to be created
struct FeeScheduleValidator<'a> {
    state: &'a TokenServiceState,
    token: &'a Token,
}

impl<'a> FeeScheduleValidator<'a> {
    /// Returns the collectors that must be associated with the new token
    fn validate(&self, fees: &[CustomFee], max_fees: usize) -> HandlerResult<Vec<AccountId>> {
        ensure(fees.len() <= max_fees, ResponseCode::CustomFeesListTooLong)?;
        let mut collectors = Vec::new();
        for fee in fees {
            let collector = fee.fee_collector_account_id;
            self.state
                .accounts
                .get_if_usable(&collector)
                .map_err(|_| HandlerError::Handle(ResponseCode::InvalidCustomFeeCollector))?;

            let needs_association = match &fee.fee {
                CustomFeeKind::Fixed(fixed) => self.validate_fixed(fixed, collector)?,
                CustomFeeKind::Fractional(fractional) => {
                    ensure(
                        self.token.is_fungible(),
                        ResponseCode::CustomFractionalFeeOnlyAllowedForFungibleCommon,
                    )?;
                    ensure(fractional.denominator != 0, ResponseCode::FractionDividesByZero)?;
                    ensure(fractional.numerator > 0, ResponseCode::CustomFeeMustBePositive)?;
                    ensure(
                        fractional.maximum_amount == 0 || fractional.maximum_amount >= fractional.minimum_amount,
                        ResponseCode::FractionalFeeMaxAmountLessThanMinAmount,
                    )?;
                    true
                }
                CustomFeeKind::Royalty(royalty) => {
                    ensure(
                        !self.token.is_fungible(),
                        ResponseCode::CustomRoyaltyFeeOnlyAllowedForNonFungibleUnique,
                    )?;
                    ensure(royalty.denominator != 0, ResponseCode::FractionDividesByZero)?;
                    ensure(royalty.numerator > 0, ResponseCode::CustomFeeMustBePositive)?;
                    ensure(
                        royalty.numerator <= royalty.denominator,
                        ResponseCode::RoyaltyFractionCannotExceedOne,
                    )?;
                    match &royalty.fallback_fee {
                        Some(fallback) => self.validate_fixed(fallback, collector)?,
                        None => false,
                    }
                }
            };
            if needs_association
                && collector != self.token.treasury_account_id
                && !collectors.contains(&collector)
            {
                collectors.push(collector);
            }
        }
        Ok(collectors)
    }

    /// True when the fee is charged in the new token itself
    fn validate_fixed(&self, fixed: &FixedFee, collector: AccountId) -> HandlerResult<bool> {
        ensure(fixed.amount > 0, ResponseCode::CustomFeeMustBePositive)?;
        let Some(denomination) = fixed.denominating_token_id else {
            return Ok(false);
        };
        if is_self_denominated(fixed) {
            ensure(
                self.token.is_fungible(),
                ResponseCode::CustomFeeDenominationMustBeFungibleCommon,
            )?;
            return Ok(true);
        }
        let denominating = self
            .state
            .tokens
            .get_ignoring_pause(&denomination)
            .map_err(|_| HandlerError::Handle(ResponseCode::InvalidTokenIdInCustomFees))?;
        ensure(
            denominating.is_fungible(),
            ResponseCode::CustomFeeDenominationMustBeFungibleCommon,
        )?;
        ensure(
            self.state.token_relations.get(&collector, &denomination).is_some(),
            ResponseCode::TokenNotAssociatedToFeeCollector,
        )?;
        Ok(false)
    }
}

/// Replace the zero-numbered self denomination with the created id
fn bind_self_denomination(fees: &mut [CustomFee], token_id: TokenId) {
    let bind = |fixed: &mut FixedFee| {
        if is_self_denominated(fixed) {
            fixed.denominating_token_id = Some(token_id);
        }
    };
    for fee in fees {
        match &mut fee.fee {
            CustomFeeKind::Fixed(fixed) => bind(fixed),
            CustomFeeKind::Royalty(royalty) => {
                if let Some(fallback) = royalty.fallback_fee.as_mut() {
                    bind(fallback);
                }
            }
            CustomFeeKind::Fractional(_) => {}
        }
    }
}

impl TransactionHandler for TokenCreateHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &TokenCreateBody = body_of(body)?;
        ensure_pre_check(!op.name.is_empty(), ResponseCode::MissingTokenName)?;
        ensure_pre_check(!op.symbol.is_empty(), ResponseCode::MissingTokenSymbol)?;
        ensure_pre_check(
            !op.treasury.is_missing(),
            ResponseCode::InvalidTreasuryAccountForToken,
        )?;
        for key in keys(op) {
            ensure_pre_check(key.is_valid(), ResponseCode::BadEncoding)?;
        }

        if op.token_type == tokenledger_common::state::TokenType::NonFungibleUnique {
            ensure_pre_check(op.decimals == 0, ResponseCode::InvalidTokenDecimals)?;
            ensure_pre_check(op.initial_supply == 0, ResponseCode::InvalidTokenInitialSupply)?;
            ensure_pre_check(op.supply_key.is_some(), ResponseCode::TokenHasNoSupplyKey)?;
        }
        ensure_pre_check(
            i64::try_from(op.initial_supply).is_ok(),
            ResponseCode::InvalidTokenInitialSupply,
        )?;
        match op.supply_type {
            TokenSupplyType::Finite => {
                ensure_pre_check(op.max_supply > 0, ResponseCode::InvalidTokenMaxSupply)?;
                ensure_pre_check(
                    op.initial_supply <= op.max_supply,
                    ResponseCode::InvalidTokenInitialSupply,
                )?;
            }
            TokenSupplyType::Infinite => {
                ensure_pre_check(op.max_supply == 0, ResponseCode::InvalidTokenMaxSupply)?;
            }
        }
        ensure_pre_check(
            !op.freeze_default || op.freeze_key.is_some(),
            ResponseCode::TokenHasNoFreezeKey,
        )
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &TokenCreateBody = body_of(ctx.body())?;
        ctx.require_account_key(&op.treasury, ResponseCode::InvalidTreasuryAccountForToken)?;
        if let Some(admin_key) = &op.admin_key {
            ctx.require_key(admin_key);
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &TokenCreateBody = body_of(ctx.body())?;
        let config = ctx.config();

        // Step 1: Body against configuration
        ensure(
            op.name.len() <= config.tokens.max_token_name_utf8_bytes,
            ResponseCode::TokenNameTooLong,
        )?;
        ensure(
            op.symbol.len() <= config.tokens.max_symbol_utf8_bytes,
            ResponseCode::TokenSymbolTooLong,
        )?;
        ensure(
            op.memo.len() <= config.entities.max_memo_utf8_bytes,
            ResponseCode::MemoTooLong,
        )?;
        if op.token_type == tokenledger_common::state::TokenType::NonFungibleUnique {
            ensure(config.tokens.nfts.are_enabled, ResponseCode::NotSupported)?;
        }
        ensure(
            (ctx.state().tokens.size_of_state() as u64) < config.tokens.max_number,
            ResponseCode::MaxEntitiesInPriceRegimeHaveBeenCreated,
        )?;
        let treasury = ctx
            .state()
            .accounts
            .get_if_usable(&op.treasury)
            .map_err(|_| HandlerError::Handle(ResponseCode::InvalidTreasuryAccountForToken))?
            .clone();

        // Step 2: Token and its fee schedule
        let expiration_second = if op.expiration_second > 0 {
            op.expiration_second
        } else {
            ctx.consensus_time().seconds + DEFAULT_TOKEN_LIFETIME_SECONDS
        };
        let mut token = Token {
            token_id: TokenId::from_num(ctx.state().peek_next_entity_num()),
            token_type: op.token_type,
            supply_type: op.supply_type,
            name: op.name.clone(),
            symbol: op.symbol.clone(),
            decimals: op.decimals,
            memo: op.memo.clone(),
            total_supply: 0,
            max_supply: op.max_supply,
            treasury_account_id: treasury.account_id,
            admin_key: op.admin_key.clone(),
            supply_key: op.supply_key.clone(),
            wipe_key: op.wipe_key.clone(),
            freeze_key: op.freeze_key.clone(),
            kyc_key: op.kyc_key.clone(),
            pause_key: op.pause_key.clone(),
            fee_schedule_key: op.fee_schedule_key.clone(),
            metadata_key: op.metadata_key.clone(),
            accounts_frozen_by_default: op.freeze_default,
            expiration_second,
            custom_fees: op.custom_fees.clone(),
            ..Default::default()
        };
        let collectors = FeeScheduleValidator {
            state: ctx.state(),
            token: &token,
        }
        .validate(&op.custom_fees, config.tokens.max_custom_fees_allowed)?;
        ensure_association_capacity(ctx.state(), config, &treasury, 1)?;
        for collector_id in &collectors {
            if let Some(collector) = ctx.state().accounts.get(collector_id) {
                ensure_association_capacity(ctx.state(), config, collector, 1)?;
            }
        }

        let token_id = TokenId::from_num(ctx.state_mut().next_entity_num());
        token.token_id = token_id;
        bind_self_denomination(&mut token.custom_fees, token_id);
        ctx.state_mut().tokens.put(token.clone());

        // Step 3: Treasury relation starts unfrozen with KYC granted
        let treasury_relation = NewRelation {
            token_id,
            frozen: false,
            kyc_granted: true,
            automatic_association: false,
        };
        let treasury_rel = create_and_link_token_rels(ctx.state_mut(), treasury.account_id, &[treasury_relation])?
            .pop()
            .ok_or(HandlerError::Handle(ResponseCode::FailInvalid))?;
        for collector_id in collectors {
            create_and_link_token_rels(ctx.state_mut(), collector_id, &[NewRelation::for_token(&token, false)])?;
        }
        let mut treasury = ctx
            .state()
            .accounts
            .get(&treasury.account_id)
            .cloned()
            .ok_or(HandlerError::Handle(ResponseCode::InvalidTreasuryAccountForToken))?;
        treasury.number_treasury_titles += 1;
        ctx.state_mut().accounts.put(treasury);

        // Step 4: Initial supply
        if op.initial_supply > 0 {
            let amount = i64::try_from(op.initial_supply)
                .map_err(|_| HandlerError::Handle(ResponseCode::InvalidTokenInitialSupply))?;
            change_supply(
                ctx.state_mut(),
                &token,
                &treasury_rel,
                amount,
                ResponseCode::InvalidTokenInitialSupply,
            )?;
        }

        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Created token {} ({}) with treasury {} and supply {}",
                token_id, op.symbol, op.treasury, op.initial_supply
            );
        }
        ctx.record_mut().created_token_id = Some(token_id);
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        let fees = ctx.base_fees().plus_service(ctx.fees_config().entity_creation_fee);
        match body_of::<TokenCreateBody>(ctx.body()) {
            Ok(op) if !op.custom_fees.is_empty() => fees.plus_service(ctx.fees_config().custom_fee_surcharge),
            _ => fees,
        }
    }
}
