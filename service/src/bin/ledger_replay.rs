// Ledger replay tool
//
// Loads a genesis state and replays an ordered list of transactions through
// the handle workflow, printing every record as JSON lines. Each transaction
// is handled one nanosecond after the previous one.
//
// Usage:
//   ledger-replay --genesis genesis.json --transactions txs.json [--config config.json]

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use tokenledger_common::config::TokenServiceConfig;
use tokenledger_common::ids::Timestamp;
use tokenledger_common::record::TransactionRecord;
use tokenledger_common::response::ResponseCode;
use tokenledger_common::store::{StateSnapshot, TokenServiceState};
use tokenledger_common::transaction::Transaction;
use tokenledger_service::workflow::HandleWorkflow;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "ledger-replay")]
#[command(about = "Replay token service transactions against a genesis state", long_about = None)]
struct Args {
    /// Genesis state snapshot (JSON)
    #[arg(short, long)]
    genesis: PathBuf,

    /// Ordered transactions (JSON array)
    #[arg(short, long)]
    transactions: PathBuf,

    /// Token service configuration (JSON), defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Consensus second of the first transaction
    #[arg(long, default_value_t = 1_700_000_000)]
    start_second: i64,

    /// Write the final state snapshot here
    #[arg(long)]
    final_state: Option<PathBuf>,
}

/// One line of output
#[derive(Serialize)]
struct ReplayLine<'a> {
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    precheck_failure: Option<ResponseCode>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    records: &'a [TransactionRecord],
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf, what: &str) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("Error while reading {} {}", what, path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Error while parsing {} {}", what, path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TokenServiceConfig::load(path)?,
        None => TokenServiceConfig::default(),
    };
    let genesis: StateSnapshot = read_json(&args.genesis, "genesis")?;
    let transactions: Vec<Transaction> = read_json(&args.transactions, "transactions")?;
    info!(
        "Replaying {} transactions over {} accounts and {} tokens",
        transactions.len(),
        genesis.accounts.len(),
        genesis.tokens.len()
    );

    let mut state = TokenServiceState::from_snapshot(genesis);
    let workflow = HandleWorkflow::new(config);
    let mut failures = 0usize;
    for (index, transaction) in transactions.iter().enumerate() {
        let consensus_time = Timestamp::new(args.start_second, index as u32);
        let line = match workflow.handle_transaction(&mut state, transaction, consensus_time) {
            Ok(outcome) => {
                if outcome.status() != Some(ResponseCode::Success) {
                    failures += 1;
                }
                serde_json::to_string(&ReplayLine {
                    index,
                    precheck_failure: None,
                    records: &outcome.records,
                })?
            }
            Err(err) => {
                failures += 1;
                warn!("Transaction {} rejected: {}", index, err);
                serde_json::to_string(&ReplayLine {
                    index,
                    precheck_failure: Some(err.code()),
                    records: &[],
                })?
            }
        };
        println!("{}", line);
    }
    info!("Replay done, {} of {} transactions did not succeed", failures, transactions.len());

    if let Some(path) = &args.final_state {
        let snapshot = serde_json::to_string_pretty(&state.snapshot())?;
        fs::write(path, snapshot).with_context(|| format!("Error while writing final state {}", path.display()))?;
    }
    Ok(())
}
