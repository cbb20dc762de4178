//! BTC settlement of a pending order match.

use scrip_ledger::{BtcPayRow, Ledger, TransactionRow};
use scrip_messages::{assets, btcpay::BtcPay};
use tracing::info;

use crate::{invalid, Error, INVALID_UNPACK, VALID};

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let order_match_id = match BtcPay::unpack(message) {
        Ok(msg) => msg.order_match_id(),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            String::new()
        }
    };

    let mut settled: Option<(String, String, i64)> = None; // (receiver, asset, amount)

    if validity == VALID {
        let mut problems = vec![];

        match ledger.order_match(&order_match_id)? {
            None => problems.push("no such order match"),
            Some(order_match) => {
                if order_match.validity != "pending" {
                    problems.push("order match is not awaiting payment");
                } else {
                    // The forward leg is tx0's give. Whichever leg is BTC
                    // names the payer; the other leg is the escrow released
                    // to them on payment.
                    let (payer, payee, owed, escrow_asset, escrow_amount) =
                        if order_match.forward_asset == assets::BTC {
                            (
                                order_match.tx0_address.clone(),
                                order_match.tx1_address.clone(),
                                order_match.forward_amount,
                                order_match.backward_asset.clone(),
                                order_match.backward_amount,
                            )
                        } else {
                            (
                                order_match.tx1_address.clone(),
                                order_match.tx0_address.clone(),
                                order_match.backward_amount,
                                order_match.forward_asset.clone(),
                                order_match.forward_amount,
                            )
                        };

                    if tx.source != payer {
                        problems.push("payment must come from the party owing BTC");
                    }
                    if tx.destination.as_deref() != Some(payee.as_str()) {
                        problems.push("payment must go to the party owed BTC");
                    }
                    if tx.btc_amount < owed {
                        problems.push("insufficient BTC paid");
                    }

                    if problems.is_empty() {
                        settled = Some((payer, escrow_asset, escrow_amount));
                    }
                }
            }
        }

        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    if let Some((receiver, escrow_asset, escrow_amount)) = settled {
        ledger.credit(
            tx.block_index,
            &receiver,
            &escrow_asset,
            escrow_amount,
            "btcpay",
            &tx.tx_hash,
        )?;
        ledger.set_order_match_validity(tx.block_index, &order_match_id, VALID)?;
        info!(id = %order_match_id, "order match settled by btcpay");
    }

    ledger.insert_btcpay(&BtcPayRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        destination: tx.destination.clone(),
        btc_amount: tx.btc_amount,
        order_match_id,
        validity,
    })?;

    Ok(())
}
