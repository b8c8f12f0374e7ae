use thiserror::Error;

use crate::response::ResponseCode;

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Failure raised by a transaction handler
///
/// A `PreCheck` failure happens before any consensus state is touched and
/// is reported back to the submitter. A `Handle` failure happens while
/// applying the transaction and must be raised identically on every node;
/// the workflow reverts all state changes of the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("pre-check failed: {0}")]
    PreCheck(ResponseCode),

    #[error("handle failed: {0}")]
    Handle(ResponseCode),
}

impl HandlerError {
    pub fn code(&self) -> ResponseCode {
        match self {
            HandlerError::PreCheck(code) | HandlerError::Handle(code) => *code,
        }
    }

    pub fn is_pre_check(&self) -> bool {
        matches!(self, HandlerError::PreCheck(_))
    }

    /// Re-raise as a handle failure with the same code
    pub fn into_handle(self) -> Self {
        HandlerError::Handle(self.code())
    }
}

/// Fail with a handle error if the condition does not hold
#[inline]
pub fn ensure(condition: bool, code: ResponseCode) -> HandlerResult<()> {
    if condition {
        Ok(())
    } else {
        Err(HandlerError::Handle(code))
    }
}

/// Fail with a pre-check error if the condition does not hold
#[inline]
pub fn ensure_pre_check(condition: bool, code: ResponseCode) -> HandlerResult<()> {
    if condition {
        Ok(())
    } else {
        Err(HandlerError::PreCheck(code))
    }
}

/// Converts store lookups failing with a bare response code
pub trait ResponseCodeExt<T> {
    fn or_handle(self) -> HandlerResult<T>;
    fn or_pre_check(self) -> HandlerResult<T>;
}

impl<T> ResponseCodeExt<T> for Result<T, ResponseCode> {
    fn or_handle(self) -> HandlerResult<T> {
        self.map_err(HandlerError::Handle)
    }

    fn or_pre_check(self) -> HandlerResult<T> {
        self.map_err(HandlerError::PreCheck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_variants() {
        assert!(ensure(true, ResponseCode::InvalidTokenId).is_ok());
        assert_eq!(
            ensure(false, ResponseCode::InvalidTokenId),
            Err(HandlerError::Handle(ResponseCode::InvalidTokenId))
        );
        assert_eq!(
            ensure_pre_check(false, ResponseCode::InvalidAccountId),
            Err(HandlerError::PreCheck(ResponseCode::InvalidAccountId))
        );
    }

    #[test]
    fn test_code_and_conversion() {
        let err = HandlerError::PreCheck(ResponseCode::InvalidNftId);
        assert!(err.is_pre_check());
        assert_eq!(err.code(), ResponseCode::InvalidNftId);
        assert_eq!(
            err.into_handle(),
            HandlerError::Handle(ResponseCode::InvalidNftId)
        );

        let lookup: Result<u64, ResponseCode> = Err(ResponseCode::TokenWasDeleted);
        assert_eq!(
            lookup.or_handle(),
            Err(HandlerError::Handle(ResponseCode::TokenWasDeleted))
        );
    }

    #[test]
    fn test_error_message_uses_wire_name() {
        let err = HandlerError::Handle(ResponseCode::TokenIsPaused);
        assert_eq!(err.to_string(), "handle failed: TOKEN_IS_PAUSED");
    }
}
