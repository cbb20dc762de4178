//! Pro-rata call-back of a callable asset at its issuance call price.
//!
//! The issuer reclaims a fraction of every other holder's position once the
//! call date has passed, paying each holder in XCP at `call_price` per
//! whole unit.

use scrip_ledger::{CallbackRow, Ledger, TransactionRow};
use scrip_messages::{assets, callback::Callback};
use tracing::info;

use crate::{invalid, Error, INVALID_FUNDS, INVALID_UNPACK, VALID};

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let (fraction, asset) = match Callback::unpack(message) {
        Ok(msg) => (msg.fraction, msg.asset),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            (0.0, String::new())
        }
    };

    let mut call_price = 0.0;
    if validity == VALID {
        let mut problems = vec![];

        if asset == assets::BTC || asset == assets::XCP {
            problems.push("cannot call back BTC or XCP");
        }
        if !(fraction > 0.0 && fraction <= 1.0) {
            problems.push("fraction not in (0, 1]");
        }

        let issuances = ledger.valid_issuances(&asset)?;
        match issuances.last() {
            None => problems.push("no such asset"),
            Some(last) => {
                if !last.callable {
                    problems.push("asset is not callable");
                } else {
                    if last.issuer != tx.source {
                        problems.push("only the issuer can call back");
                    }
                    if (tx.block_time as i64) < last.call_date {
                        problems.push("before the call date");
                    }
                    call_price = last.call_price;
                }
            }
        }

        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    if validity == VALID {
        // Snapshot the non-issuer holders, then compute each forfeit and
        // its XCP compensation before touching the ledger.
        let holders = ledger.holders(&asset)?;
        let callbacks: Vec<(String, i64, i64)> = holders
            .iter()
            .filter(|(address, _)| address != &tx.source)
            .map(|(address, held)| {
                let units = (*held as f64 * fraction).floor() as i64;
                let paid = (units as f64 * call_price).round_ties_even() as i64;
                (address.clone(), units, paid)
            })
            .filter(|(_, units, _)| *units > 0)
            .collect();

        let total_paid: i64 = callbacks.iter().map(|(_, _, paid)| paid).sum();

        if ledger.balance(&tx.source, assets::XCP)? < total_paid {
            validity = INVALID_FUNDS.to_owned();
        } else {
            ledger.debit(
                tx.block_index,
                &tx.source,
                assets::XCP,
                total_paid,
                "callback",
                &tx.tx_hash,
            )?;
            for (address, units, paid) in &callbacks {
                ledger.debit(
                    tx.block_index,
                    address,
                    &asset,
                    *units,
                    "called back",
                    &tx.tx_hash,
                )?;
                ledger.credit(
                    tx.block_index,
                    &tx.source,
                    &asset,
                    *units,
                    "called back",
                    &tx.tx_hash,
                )?;
                ledger.credit(
                    tx.block_index,
                    address,
                    assets::XCP,
                    *paid,
                    "callback",
                    &tx.tx_hash,
                )?;
            }
            info!(%asset, holders = callbacks.len(), total_paid, "callback");
        }
    }

    ledger.insert_callback(&CallbackRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        fraction,
        asset,
        validity,
    })?;

    Ok(())
}
