//! Cancellation of an open order or bet, releasing its remaining escrow.

use scrip_ledger::{CancelRow, Ledger, TransactionRow};
use scrip_messages::{assets, cancel::Cancel};
use tracing::info;

use crate::{invalid, Error, INVALID_UNPACK, VALID};

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let offer_hash = match Cancel::unpack(message) {
        Ok(msg) => msg.offer_hash,
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            String::new()
        }
    };

    if validity == VALID {
        let order = ledger.order_by_hash(&offer_hash)?;
        let bet = ledger.bet_by_hash(&offer_hash)?;

        let mut problems = vec![];
        match (&order, &bet) {
            (Some(order), _) => {
                if order.source != tx.source {
                    problems.push("offer was made by another address");
                }
                if order.validity != VALID {
                    problems.push("offer is not open");
                }
            }
            (None, Some(bet)) => {
                if bet.source != tx.source {
                    problems.push("offer was made by another address");
                }
                if bet.validity != VALID {
                    problems.push("offer is not open");
                }
            }
            (None, None) => problems.push("no open offer with that hash"),
        }

        if !problems.is_empty() {
            validity = invalid(&problems);
        } else if let Some(order) = order {
            if order.give_remaining > 0 && order.give_asset != assets::BTC {
                ledger.credit(
                    tx.block_index,
                    &order.source,
                    &order.give_asset,
                    order.give_remaining,
                    "order cancelled",
                    &tx.tx_hash,
                )?;
            }
            ledger.set_order_validity(tx.block_index, order.tx_index, "cancelled")?;
            info!(offer = %offer_hash, "order cancelled");
        } else if let Some(bet) = bet {
            if bet.wager_remaining > 0 {
                ledger.credit(
                    tx.block_index,
                    &bet.source,
                    assets::XCP,
                    bet.wager_remaining,
                    "bet cancelled",
                    &tx.tx_hash,
                )?;
            }
            ledger.set_bet_validity(tx.block_index, bet.tx_index, "cancelled")?;
            info!(offer = %offer_hash, "bet cancelled");
        }
    }

    ledger.insert_cancel(&CancelRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        offer_hash,
        validity,
    })?;

    Ok(())
}
