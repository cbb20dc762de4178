//! Plain asset transfer between two addresses.

use scrip_ledger::{Ledger, SendRow, TransactionRow};
use scrip_messages::{assets, send::Send};

use crate::{clamp, invalid, Error, INVALID_FUNDS, INVALID_UNPACK, VALID};

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let (asset, amount) = match Send::unpack(message) {
        Ok(msg) => (msg.asset, clamp(msg.amount)),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            (String::new(), 0)
        }
    };

    if validity == VALID {
        let mut problems = vec![];
        if asset == assets::BTC {
            problems.push("cannot send bitcoins");
        }
        if amount <= 0 {
            problems.push("non-positive amount");
        }
        if tx.destination.is_none() {
            problems.push("no destination");
        }
        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    if validity == VALID {
        match ledger.debit(tx.block_index, &tx.source, &asset, amount, "send", &tx.tx_hash) {
            Err(scrip_ledger::Error::Balance { .. }) => validity = INVALID_FUNDS.to_owned(),
            other => other?,
        }
    }

    if validity == VALID {
        if let Some(destination) = &tx.destination {
            ledger.credit(tx.block_index, destination, &asset, amount, "send", &tx.tx_hash)?;
        }
    }

    ledger.insert_send(&SendRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        destination: tx.destination.clone(),
        asset,
        amount,
        validity,
    })?;

    Ok(())
}
