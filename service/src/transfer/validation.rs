// Transfer list validation
// Structural checks run as pure checks on the body; size limits depend on
// configuration and run while handling.

use std::collections::BTreeSet;

use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::error::{ensure, ensure_pre_check, HandlerResult};
use tokenledger_common::ids::AccountRef;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::transaction::{AccountAmount, CryptoTransferBody, TokenTransferList};

/// Hbar list: zero sum and no repeated account
pub fn check_hbar_transfers(transfers: &[AccountAmount]) -> HandlerResult<()> {
    check_account_amounts(transfers, ResponseCode::InvalidAccountAmounts)
}

fn check_account_amounts(transfers: &[AccountAmount], not_zero_sum: ResponseCode) -> HandlerResult<()> {
    let mut seen: BTreeSet<(&AccountRef, bool)> = BTreeSet::new();
    let mut sum: i128 = 0;
    for transfer in transfers {
        ensure_pre_check(
            seen.insert((&transfer.account, transfer.is_approval)),
            ResponseCode::AccountRepeatedInAccountAmounts,
        )?;
        sum += transfer.amount as i128;
    }
    ensure_pre_check(sum == 0, not_zero_sum)
}

/// Token lists: each token once, each list non-empty and either fungible
/// or NFT, fungible lists zero-sum, NFT serials positive
pub fn check_token_transfers(token_transfers: &[TokenTransferList]) -> HandlerResult<()> {
    let mut tokens = BTreeSet::new();
    for list in token_transfers {
        ensure_pre_check(
            tokens.insert(list.token_id),
            ResponseCode::TokenIdRepeatedInTokenList,
        )?;
        let has_fungible = !list.transfers.is_empty();
        let has_nfts = !list.nft_transfers.is_empty();
        ensure_pre_check(
            has_fungible || has_nfts,
            ResponseCode::EmptyTokenTransferAccountAmounts,
        )?;
        ensure_pre_check(!(has_fungible && has_nfts), ResponseCode::InvalidAccountAmounts)?;

        if has_fungible {
            check_account_amounts(&list.transfers, ResponseCode::TransfersNotZeroSumForToken)?;
        }
        for nft in &list.nft_transfers {
            ensure_pre_check(
                nft.serial_number > 0,
                ResponseCode::InvalidTokenNftSerialNumber,
            )?;
            ensure_pre_check(
                nft.sender != nft.receiver,
                ResponseCode::AccountRepeatedInAccountAmounts,
            )?;
        }
    }
    Ok(())
}

pub fn check_transfer_body(body: &CryptoTransferBody) -> HandlerResult<()> {
    check_hbar_transfers(&body.transfers)?;
    check_token_transfers(&body.token_transfers)
}

/// Configured limits on the number of adjustments and NFT movements
pub fn check_transfer_limits(config: &TokenServiceConfig, body: &CryptoTransferBody) -> HandlerResult<()> {
    ensure(
        body.transfers.len() <= config.ledger.transfers_max_len,
        ResponseCode::TransferListSizeLimitExceeded,
    )?;
    let fungible: usize = body.token_transfers.iter().map(|l| l.transfers.len()).sum();
    ensure(
        fungible <= config.ledger.token_transfers_max_len,
        ResponseCode::TokenTransferListSizeLimitExceeded,
    )?;
    let nfts: usize = body.token_transfers.iter().map(|l| l.nft_transfers.len()).sum();
    if nfts > 0 {
        ensure(config.tokens.nfts.are_enabled, ResponseCode::NotSupported)?;
    }
    ensure(
        nfts <= config.ledger.nft_transfers_max_len,
        ResponseCode::BatchSizeLimitExceeded,
    )
}
