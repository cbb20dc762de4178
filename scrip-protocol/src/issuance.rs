//! Asset issuance, re-issuance, locking and ownership transfer.
//!
//! Every valid issuance destroys a flat XCP fee. An issuance of zero with
//! no transfer destination locks the asset against further supply.

use scrip_ledger::{IssuanceRow, Ledger, TransactionRow};
use scrip_messages::{assets, issuance::Issuance, UNIT};
use tracing::info;

use crate::{clamp, invalid, Error, INVALID_FUNDS, INVALID_UNPACK, VALID};

/// XCP destroyed by each valid issuance.
pub const ISSUANCE_FEE: i64 = UNIT / 2;

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let decoded = match Issuance::unpack(message) {
        Ok(msg) => Some(msg),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            None
        }
    };

    let (asset, amount, divisible, callable, mut call_date, mut call_price, description) =
        decoded
            .map(|m| {
                (
                    m.asset,
                    clamp(m.amount),
                    m.divisible,
                    m.callable,
                    m.call_date as i64,
                    m.call_price as f64,
                    m.description,
                )
            })
            .unwrap_or_default();

    if !callable {
        call_date = 0;
        call_price = 0.0;
    }

    let transfer = tx.destination.is_some();

    if validity == VALID {
        let mut problems = vec![];

        if asset == assets::BTC || asset == assets::XCP {
            problems.push("cannot issue BTC or XCP");
        }
        if transfer && amount != 0 {
            problems.push("cannot issue units and transfer ownership simultaneously");
        }

        let prior = ledger.valid_issuances(&asset)?;
        if let Some(last) = prior.last() {
            if last.issuer != tx.source {
                problems.push("asset belongs to another address");
            }
            if prior.iter().any(|row| row.locked) {
                problems.push("locked asset");
            }
            if last.divisible != divisible {
                problems.push("cannot change divisibility");
            }
        }

        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    let mut fee_paid = 0;
    if validity == VALID {
        match ledger.debit(
            tx.block_index,
            &tx.source,
            assets::XCP,
            ISSUANCE_FEE,
            "issuance fee",
            &tx.tx_hash,
        ) {
            Err(scrip_ledger::Error::Balance { .. }) => validity = INVALID_FUNDS.to_owned(),
            other => {
                other?;
                fee_paid = ISSUANCE_FEE;
            }
        }
    }

    if validity == VALID && amount > 0 {
        ledger.credit(
            tx.block_index,
            &tx.source,
            &asset,
            amount,
            "issuance",
            &tx.tx_hash,
        )?;
    }

    let issuer = match (&tx.destination, transfer && validity == VALID) {
        (Some(destination), true) => destination.clone(),
        _ => tx.source.clone(),
    };

    if validity == VALID {
        info!(%asset, amount, %issuer, "issuance");
    }

    ledger.insert_issuance(&IssuanceRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        asset,
        amount,
        divisible,
        issuer,
        transfer,
        callable,
        call_date,
        call_price,
        description,
        fee_paid,
        locked: validity == VALID && amount == 0 && !transfer,
        validity,
    })?;

    Ok(())
}
