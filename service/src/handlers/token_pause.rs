use tokenledger_common::error::{ensure, ensure_pre_check, HandlerError, HandlerResult, ResponseCodeExt};
use tokenledger_common::response::ResponseCode;
use tokenledger_common::transaction::{body_of, TokenPauseBody, TransactionBody};

use crate::context::{HandleContext, PreHandleContext};
use crate::fees::{FeeContext, Fees};

use super::TransactionHandler;

pub struct TokenPauseHandler;

pub struct TokenUnpauseHandler;

fn check_pause_body(body: &TransactionBody) -> HandlerResult<()> {
    let op: &TokenPauseBody = body_of(body)?;
    ensure_pre_check(op.token_id.num != 0, ResponseCode::InvalidTokenId)
}

fn require_pause_key(ctx: &mut PreHandleContext) -> HandlerResult<()> {
    let op: &TokenPauseBody = body_of(ctx.body())?;
    let token = ctx
        .state()
        .tokens
        .get(&op.token_id)
        .ok_or(HandlerError::PreCheck(ResponseCode::InvalidTokenId))?;
    ctx.require_key_or(token.pause_key.as_ref(), ResponseCode::TokenHasNoPauseKey)
}

/// Paused tokens must still load here, or they could never be unpaused
fn set_paused(ctx: &mut HandleContext, paused: bool) -> HandlerResult<()> {
    let op: &TokenPauseBody = body_of(ctx.body())?;
    let mut token = ctx
        .state()
        .tokens
        .get_ignoring_pause(&op.token_id)
        .or_handle()?
        .clone();
    ensure(token.pause_key.is_some(), ResponseCode::TokenHasNoPauseKey)?;
    token.paused = paused;
    ctx.state_mut().tokens.put(token);
    Ok(())
}

impl TransactionHandler for TokenPauseHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_pause_body(body)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        require_pause_key(ctx)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        set_paused(ctx, true)
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}

impl TransactionHandler for TokenUnpauseHandler {
    fn pure_checks(&self, body: &TransactionBody) -> HandlerResult<()> {
        check_pause_body(body)
    }

    fn pre_handle(&self, ctx: &mut PreHandleContext) -> HandlerResult<()> {
        require_pause_key(ctx)
    }

    fn handle(&self, ctx: &mut HandleContext) -> HandlerResult<()> {
        set_paused(ctx, false)
    }

    fn calculate_fees(&self, ctx: &FeeContext) -> Fees {
        ctx.base_fees()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use tokenledger_common::config::TokenServiceConfig;
    use tokenledger_common::transaction::TokenMintBody;

    #[test]
    fn test_pause_blocks_then_unpause_restores() {
        let mut state = state_with_accounts(&[TREASURY]);
        let mut token = fungible_token(TOKEN, TREASURY);
        token.pause_key = Some(key(205));
        create_token(&mut state, token, 0);
        let config = TokenServiceConfig::default();
        let pause = TokenPauseBody { token_id: tid(TOKEN) };
        let mint = TransactionBody::TokenMint(TokenMintBody {
            token_id: tid(TOKEN),
            amount: 5,
            metadata: Vec::new(),
        });

        run_handler(&mut state, &config, TREASURY, TransactionBody::TokenPause(pause.clone())).unwrap();
        assert!(state.tokens.get(&tid(TOKEN)).unwrap().paused);
        let err = run_handler(&mut state, &config, TREASURY, mint.clone()).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::TokenIsPaused));

        run_handler(&mut state, &config, TREASURY, TransactionBody::TokenUnpause(pause)).unwrap();
        run_handler(&mut state, &config, TREASURY, mint).unwrap();
        assert_eq!(state.tokens.get(&tid(TOKEN)).unwrap().total_supply, 5);
    }

    #[test]
    fn test_pause_requires_pause_key() {
        let mut state = state_with_accounts(&[TREASURY]);
        create_token(&mut state, fungible_token(TOKEN, TREASURY), 0);
        let body = TransactionBody::TokenPause(TokenPauseBody { token_id: tid(TOKEN) });
        let err = run_handler(&mut state, &TokenServiceConfig::default(), TREASURY, body).unwrap_err();
        assert_eq!(err, HandlerError::Handle(ResponseCode::TokenHasNoPauseKey));
    }
}
