use log::debug;

use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult};
use tokenledger_common::ids::AccountId;
use tokenledger_common::key::Key;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::state::{Account, UNLIMITED_AUTO_ASSOCIATIONS};
use tokenledger_common::transaction::{body_of, CryptoCreateBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};

use super::TransactionHandler;

/// Creates an account, or an auto-created account for an alias
pub struct CryptoCreateHandler;

/// Validate a requested `max_auto_associations` against configuration
pub(crate) fn check_max_auto_associations(config: &TokenServiceConfig, max: i32) -> HandlerResult<()> {
    if max == UNLIMITED_AUTO_ASSOCIATIONS {
        return ensure(
            config.entities.unlimited_auto_associations_enabled,
            ResponseCode::InvalidMaxAutoAssociations,
        );
    }
    ensure(max >= 0, ResponseCode::InvalidMaxAutoAssociations)?;
    ensure(
        max <= config.entities.max_auto_associations,
        ResponseCode::RequestedNumAutomaticAssociationsExceedsAssociationLimit,
    )?;
    if config.tokens.limit_token_associations {
        ensure(
            max as u64 <= config.tokens.max_per_account,
            ResponseCode::RequestedNumAutomaticAssociationsExceedsAssociationLimit,
        )?;
    }
    Ok(())
}

impl TransactionHandler for CryptoCreateHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        let op: &CryptoCreateBody = body_of(body)?;
        match (&op.key, &op.alias) {
            (Some(key), _) => ensure_pre_check(key.is_valid(), ResponseCode::BadEncoding)?,
            (None, Some(alias)) => ensure_pre_check(
                alias.is_evm_address() || Key::from_alias_bytes(alias.as_bytes()).is_some(),
                ResponseCode::InvalidAliasKey,
            )?,
            (None, None) => return Err(HandlerError::PreCheck(ResponseCode::KeyRequired)),
        }
        ensure_pre_check(
            op.max_automatic_token_associations >= UNLIMITED_AUTO_ASSOCIATIONS,
            ResponseCode::InvalidMaxAutoAssociations,
        )
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        let op: &CryptoCreateBody = body_of(ctx.body())?;
        if let Some(key) = &op.key {
            if op.receiver_sig_required {
                ctx.require_key(key);
            }
        }
        Ok(())
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        let op: &CryptoCreateBody = body_of(ctx.body())?;
        let config = ctx.config();

        // Step 1: Body against configuration
        ensure(
            op.memo.len() <= config.entities.max_memo_utf8_bytes,
            ResponseCode::MemoTooLong,
        )?;
        check_max_auto_associations(config, op.max_automatic_token_associations)?;

        // Step 2: Alias and capacity
        if let Some(alias) = &op.alias {
            ensure(
                ctx.state().accounts.get_alias_id(alias).is_none(),
                ResponseCode::AliasAlreadyAssigned,
            )?;
        }
        ensure(
            (ctx.state().accounts.size_of_state() as u64) < config.entities.max_accounts,
            ResponseCode::MaxEntitiesInPriceRegimeHaveBeenCreated,
        )?;

        // Step 3: Initial balance from the payer
        let payer_id = ctx.payer();
        if op.initial_balance > 0 {
            let mut payer = ctx
                .state()
                .accounts
                .get(&payer_id)
                .cloned()
                .ok_or(HandlerError::Handle(ResponseCode::InvalidPayerAccountId))?;
            ensure(
                payer.tinybar_balance >= op.initial_balance,
                ResponseCode::InsufficientPayerBalance,
            )?;
            payer.tinybar_balance -= op.initial_balance;
            ctx.state_mut().accounts.put(payer);
        }

        // Step 4: The account itself
        let key = op.key.clone().or_else(|| {
            op.alias
                .as_ref()
                .and_then(|alias| Key::from_alias_bytes(alias.as_bytes()))
        });
        let num = ctx.state_mut().next_entity_num();
        let account_id = AccountId::from_num(num);
        let account = Account {
            account_id,
            alias: op.alias.clone(),
            key,
            expiration_second: ctx.consensus_time().seconds + op.auto_renew_period_seconds,
            auto_renew_seconds: op.auto_renew_period_seconds,
            tinybar_balance: op.initial_balance,
            memo: op.memo.clone(),
            receiver_sig_required: op.receiver_sig_required,
            max_auto_associations: op.max_automatic_token_associations,
            ..Default::default()
        };
        if log::log_enabled!(log::Level::Debug) {
            debug!(
                "Creating account {} (hollow: {}) with {} tinybars",
                account_id,
                account.is_hollow(),
                op.initial_balance
            );
        }
        ctx.state_mut().accounts.put(account);
        ctx.record_mut().created_account_id = Some(account_id);
        Ok(())
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
            .plus_service(ctx.fees_config().entity_creation_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use tokenledger_common::ids::Alias;

    fn create(key: Option<Key>, alias: Option<Alias>, initial_balance: u64) -> TransactionBody {
        TransactionBody::CryptoCreate(CryptoCreateBody {
            key,
            alias,
            initial_balance,
            max_automatic_token_associations: 0,
            auto_renew_period_seconds: 7_776_000,
            ..Default::default()
        })
    }

    #[test]
    fn test_create_moves_initial_balance() {
        let mut state = state_with_accounts(&[PAYER]);
        let output = run_handler(
            &mut state,
            &TokenServiceConfig::default(),
            PAYER,
            create(Some(key(9)), None, 1_000),
        )
        .unwrap();
        let created = output.record.created_account_id.unwrap();
        assert_eq!(state.accounts.get(&created).unwrap().tinybar_balance, 1_000);
        assert_eq!(state.accounts.get(&id(PAYER)).unwrap().tinybar_balance, INITIAL_BALANCE - 1_000);
    }

    #[test]
    fn test_key_required_without_alias() {
        let mut state = state_with_accounts(&[PAYER]);
        let err = run_handler(&mut state, &TokenServiceConfig::default(), PAYER, create(None, None, 0)).unwrap_err();
        assert_eq!(err, HandlerError::PreCheck(ResponseCode::KeyRequired));

        let bad_alias = create(None, Some(Alias::new(vec![1; 7])), 0);
        let err = run_handler(&mut state, &TokenServiceConfig::default(), PAYER, bad_alias).unwrap_err();
        assert_eq!(err, HandlerError::PreCheck(ResponseCode::InvalidAliasKey));
    }

    #[test]
    fn test_evm_alias_creates_hollow_account() {
        let mut state = state_with_accounts(&[PAYER]);
        let alias = Alias::new(vec![0xaa; 20]);
        let output = run_handler(
            &mut state,
            &TokenServiceConfig::default(),
            PAYER,
            create(None, Some(alias.clone()), 0),
        )
        .unwrap();
        let created = output.record.created_account_id.unwrap();
        assert!(state.accounts.get(&created).unwrap().is_hollow());

        let err = run_handler(&mut state, &TokenServiceConfig::default(), PAYER, create(None, Some(alias), 0))
            .unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::AliasAlreadyAssigned));
    }

    #[test]
    fn test_limits() {
        let mut state = state_with_accounts(&[PAYER]);
        let mut config = TokenServiceConfig::default();
        config.entities.max_auto_associations = 10;

        let mut body = CryptoCreateBody {
            key: Some(key(9)),
            max_automatic_token_associations: 11,
            ..Default::default()
        };
        let err = run_handler(&mut state, &config, PAYER, TransactionBody::CryptoCreate(body.clone())).unwrap_err();
        assert_eq!(
            err,
            HandlerError::Handle(ResponseCode::RequestedNumAutomaticAssociationsExceedsAssociationLimit)
        );

        body.max_automatic_token_associations = -2;
        let err = run_handler(&mut state, &config, PAYER, TransactionBody::CryptoCreate(body.clone())).unwrap_err();
        assert_eq!(err, HandlerError::PreCheck(ResponseCode::InvalidMaxAutoAssociations));

        body.max_automatic_token_associations = 0;
        body.initial_balance = INITIAL_BALANCE + 1;
        let err = run_handler(&mut state, &config, PAYER, TransactionBody::CryptoCreate(body)).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::InsufficientPayerBalance));
    }
}
