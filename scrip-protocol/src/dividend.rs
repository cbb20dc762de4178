//! XCP dividends paid pro rata to the holders of an asset.

use scrip_ledger::{DividendRow, Ledger, TransactionRow};
use scrip_messages::{assets, dividend::Dividend, UNIT};
use tracing::info;

use crate::{clamp, invalid, Error, INVALID_FUNDS, INVALID_UNPACK, VALID};

/// XCP destroyed per credited holder.
pub const FEE_PER_RECIPIENT: i64 = 20_000;

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let (amount_per_unit, asset) = match Dividend::unpack(message) {
        Ok(msg) => (clamp(msg.amount_per_unit), msg.asset),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            (0, String::new())
        }
    };

    if validity == VALID {
        let mut problems = vec![];
        if asset == assets::BTC || asset == assets::XCP {
            problems.push("cannot pay dividends on BTC or XCP");
        } else if ledger.valid_issuances(&asset)?.is_empty() {
            problems.push("no such asset");
        }
        if amount_per_unit <= 0 {
            problems.push("non-positive amount per unit");
        }
        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    if validity == VALID {
        // Snapshot holders before any ledger mutation.
        let holders = ledger.holders(&asset)?;
        let payouts: Vec<(String, i64)> = holders
            .iter()
            .map(|(address, held)| {
                let portion =
                    (*held as i128 * amount_per_unit as i128 / UNIT as i128) as i64;
                (address.clone(), portion)
            })
            .filter(|(_, portion)| *portion > 0)
            .collect();

        let dividend_total: i64 = payouts.iter().map(|(_, portion)| portion).sum();
        let fee_total = FEE_PER_RECIPIENT * payouts.len() as i64;

        if ledger.balance(&tx.source, assets::XCP)? < dividend_total + fee_total {
            validity = INVALID_FUNDS.to_owned();
        } else {
            ledger.debit(
                tx.block_index,
                &tx.source,
                assets::XCP,
                dividend_total,
                "dividend",
                &tx.tx_hash,
            )?;
            ledger.debit(
                tx.block_index,
                &tx.source,
                assets::XCP,
                fee_total,
                "dividend fee",
                &tx.tx_hash,
            )?;
            for (address, portion) in &payouts {
                ledger.credit(
                    tx.block_index,
                    address,
                    assets::XCP,
                    *portion,
                    "dividend",
                    &tx.tx_hash,
                )?;
            }
            info!(%asset, dividend_total, recipients = payouts.len(), "dividend");
        }
    }

    ledger.insert_dividend(&DividendRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        asset,
        amount_per_unit,
        validity,
    })?;

    Ok(())
}
