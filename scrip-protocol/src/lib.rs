//! Deterministic replay of protocol messages against the ledger
//!
//! One module per message kind, mirroring the wire codecs. Each parser
//! decodes, validates, and only then mutates the ledger; every domain
//! problem ends up in the row's `validity` column rather than in a Rust
//! error. Expirations run at the head of every block, before transaction
//! dispatch.

pub mod bet;
pub mod broadcast;
pub mod btcpay;
pub mod burn;
pub mod callback;
pub mod cancel;
pub mod dividend;
pub mod issuance;
pub mod order;
pub mod send;

use scrip_ledger::{schema, Ledger, Store, TransactionRow, DB_VERSION_MINOR};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Ledger(#[from] scrip_ledger::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// Consensus parameters the parsers need; fixed per network.
#[derive(Debug, Clone)]
pub struct ProtocolParams {
    /// Burn-sink address; transactions paying it are burns.
    pub unspendable: String,
    pub burn_start: u32,
    pub burn_end: u32,
}

pub(crate) const VALID: &str = "valid";
pub(crate) const INVALID_UNPACK: &str = "invalid: could not unpack";
pub(crate) const INVALID_FUNDS: &str = "invalid: insufficient funds";

pub(crate) fn invalid(problems: &[&str]) -> String {
    format!("invalid: {}", problems.join(";"))
}

/// Decoded quantities are clamped into the signed 64-bit range before any
/// validation touches them.
pub(crate) fn clamp(value: u64) -> i64 {
    value.min(scrip_messages::MAX_INT as u64) as i64
}

/// Integer division rounding half to even; both operands must be positive.
pub(crate) fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    debug_assert!(denominator > 0);
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    match (2 * remainder).cmp(&denominator) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => {
            if quotient % 2 == 0 {
                quotient
            } else {
                quotient + 1
            }
        }
    }
}

/// Applies expirations for a block, then replays its transactions in
/// `tx_index` order. Runs inside the caller's store transaction.
pub fn parse_block(
    ledger: &Ledger,
    params: &ProtocolParams,
    block_index: u32,
    block_time: u32,
) -> Result<(), Error> {
    order::expire(ledger, block_index)?;
    bet::expire(ledger, block_index, block_time)?;

    for tx in ledger.transactions_in_block(block_index)? {
        parse_tx(ledger, params, &tx)?;
    }
    Ok(())
}

/// Dispatches one stored transaction to its parser.
pub fn parse_tx(ledger: &Ledger, params: &ProtocolParams, tx: &TransactionRow) -> Result<(), Error> {
    if tx.destination.as_deref() == Some(params.unspendable.as_str()) {
        return burn::parse(ledger, params, tx);
    }

    let type_id = scrip_messages::type_id(&tx.data);
    let message = tx.data.get(scrip_messages::TYPE_ID_LENGTH..).unwrap_or(&[]);

    match type_id {
        Some(scrip_messages::send::ID) => send::parse(ledger, tx, message)?,
        Some(scrip_messages::order::ID) => order::parse(ledger, tx, message)?,
        Some(scrip_messages::btcpay::ID) => btcpay::parse(ledger, tx, message)?,
        Some(scrip_messages::issuance::ID) => issuance::parse(ledger, tx, message)?,
        Some(scrip_messages::callback::ID) => callback::parse(ledger, tx, message)?,
        Some(scrip_messages::broadcast::ID) => broadcast::parse(ledger, tx, message)?,
        Some(scrip_messages::bet::ID) => bet::parse(ledger, tx, message)?,
        Some(scrip_messages::dividend::ID) => dividend::parse(ledger, tx, message)?,
        Some(scrip_messages::cancel::ID) => cancel::parse(ledger, tx, message)?,
        _ => {
            ledger.set_tx_unsupported(&tx.tx_hash)?;
            info!(tx_hash = %tx.tx_hash, ?type_id, "unsupported transaction");
        }
    }
    Ok(())
}

/// Drops all derived state and replays every stored block under the current
/// parsing rules, then stamps the minor version. With `rollback_to` set,
/// chain data above that height is deleted first; the whole operation is
/// one store transaction.
pub fn reparse(
    store: &mut Store,
    params: &ProtocolParams,
    rollback_to: Option<u32>,
) -> Result<(), Error> {
    info!(?rollback_to, "reparsing all transactions");

    let txn = store.block_transaction()?;
    {
        if let Some(height) = rollback_to {
            Ledger::new(&txn).delete_above(height)?;
        }

        schema::drop_derived(&txn)?;
        schema::initialise(&txn)?;

        let ledger = Ledger::new(&txn);
        for block in ledger.all_blocks()? {
            debug!(block = block.block_index, "block (re-parse)");
            parse_block(&ledger, params, block.block_index, block.block_time)?;
        }
    }
    txn.commit()?;

    store.set_minor_version(DB_VERSION_MINOR)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::div_round_half_even;

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(div_round_half_even(5, 2), 2);
        assert_eq!(div_round_half_even(7, 2), 4);
        assert_eq!(div_round_half_even(6, 4), 2);
        assert_eq!(div_round_half_even(10, 4), 2);
        assert_eq!(div_round_half_even(14, 4), 4);
        assert_eq!(div_round_half_even(9, 3), 3);
    }
}
