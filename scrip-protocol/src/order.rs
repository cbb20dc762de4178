//! Exchange orders: book insertion, FIFO matching, expiry.
//!
//! Non-BTC give amounts are escrowed when the order is recorded. BTC legs
//! are never escrowed; a match touching BTC stays `pending` until a btcpay
//! settles it or the match expires.

use scrip_ledger::{Ledger, OrderMatchRow, OrderRow, TransactionRow};
use scrip_messages::{assets, order::Order};
use tracing::{debug, info};

use crate::{clamp, invalid, Error, INVALID_FUNDS, INVALID_UNPACK, VALID};

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let decoded = match Order::unpack(message) {
        Ok(msg) => Some(msg),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            None
        }
    };

    let (give_asset, give_amount, get_asset, get_amount, expiration, fee_required) = decoded
        .map(|m| {
            (
                m.give_asset,
                clamp(m.give_amount),
                m.get_asset,
                clamp(m.get_amount),
                m.expiration as i64,
                clamp(m.fee_required),
            )
        })
        .unwrap_or_default();

    if validity == VALID {
        let mut problems = vec![];
        if give_asset == get_asset {
            problems.push("trading an asset for itself");
        }
        if give_amount <= 0 || get_amount <= 0 {
            problems.push("non-positive amounts");
        }
        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    // Escrow the give side; BTC is paid on settlement instead.
    if validity == VALID && give_asset != assets::BTC {
        match ledger.debit(
            tx.block_index,
            &tx.source,
            &give_asset,
            give_amount,
            "order",
            &tx.tx_hash,
        ) {
            Err(scrip_ledger::Error::Balance { .. }) => validity = INVALID_FUNDS.to_owned(),
            other => other?,
        }
    }

    let row = OrderRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        give_asset,
        give_amount,
        give_remaining: give_amount,
        get_asset,
        get_amount,
        get_remaining: get_amount,
        expiration,
        expire_index: tx.block_index as i64 + expiration,
        fee_required,
        fee_provided: tx.fee,
        validity: validity.clone(),
    };
    ledger.insert_order(&row)?;

    if validity == VALID {
        match_order(ledger, row)?;
    }
    Ok(())
}

/// Walks the inverse side of the book in strict `tx_index` order and pairs
/// the new order against every acceptable counter-offer.
fn match_order(ledger: &Ledger, mut tx1: OrderRow) -> Result<(), Error> {
    let block_index = tx1.block_index;
    let candidates = ledger.open_orders(&tx1.get_asset, &tx1.give_asset)?;

    for mut tx0 in candidates {
        if tx1.give_remaining <= 0 || tx1.get_remaining <= 0 {
            break;
        }
        if tx0.give_remaining <= 0 || tx0.get_remaining <= 0 {
            continue;
        }

        // A BTC giver must have provided the fee its counterparty demanded.
        if tx0.give_asset == assets::BTC && tx0.fee_provided < tx1.fee_required {
            continue;
        }
        if tx1.give_asset == assets::BTC && tx1.fee_provided < tx0.fee_required {
            continue;
        }

        // Acceptable iff price(tx0) <= 1/price(tx1), cross-multiplied.
        let lhs = tx0.get_amount as i128 * tx1.get_amount as i128;
        let rhs = tx0.give_amount as i128 * tx1.give_amount as i128;
        if lhs > rhs {
            continue;
        }

        let forward_amount = tx0.give_remaining.min(tx1.get_remaining);
        let backward_amount = (forward_amount as i128 * tx0.get_amount as i128
            / tx0.give_amount as i128) as i64;
        if forward_amount <= 0 || backward_amount <= 0 {
            continue;
        }
        if backward_amount > tx1.give_remaining {
            continue;
        }

        let id = format!("{}{}", tx0.tx_hash, tx1.tx_hash);
        debug!(
            %id,
            forward_amount,
            backward_amount,
            "order match"
        );

        let btc_involved =
            tx0.give_asset == assets::BTC || tx1.give_asset == assets::BTC;

        // Non-BTC pairs settle instantly out of escrow; BTC pairs await a
        // btcpay from the party who owes the coin.
        if !btc_involved {
            ledger.credit(
                block_index,
                &tx1.source,
                &tx0.give_asset,
                forward_amount,
                "order match",
                &id,
            )?;
            ledger.credit(
                block_index,
                &tx0.source,
                &tx1.give_asset,
                backward_amount,
                "order match",
                &id,
            )?;
        }

        tx0.give_remaining -= forward_amount;
        tx0.get_remaining -= backward_amount;
        ledger.update_order_remaining(
            block_index,
            tx0.tx_index,
            tx0.give_remaining,
            tx0.get_remaining,
        )?;

        tx1.give_remaining -= backward_amount;
        tx1.get_remaining -= forward_amount;
        ledger.update_order_remaining(
            block_index,
            tx1.tx_index,
            tx1.give_remaining,
            tx1.get_remaining,
        )?;

        ledger.insert_order_match(&OrderMatchRow {
            id,
            tx0_index: tx0.tx_index,
            tx0_hash: tx0.tx_hash.clone(),
            tx0_address: tx0.source.clone(),
            tx1_index: tx1.tx_index,
            tx1_hash: tx1.tx_hash.clone(),
            tx1_address: tx1.source.clone(),
            forward_asset: tx0.give_asset.clone(),
            forward_amount,
            backward_asset: tx1.give_asset.clone(),
            backward_amount,
            tx0_block_index: tx0.block_index,
            tx1_block_index: block_index,
            tx0_expiration: tx0.expiration,
            tx1_expiration: tx1.expiration,
            match_expire_index: block_index as i64 + tx0.expiration.min(tx1.expiration),
            validity: if btc_involved { "pending" } else { VALID }.to_owned(),
        })?;
    }

    Ok(())
}

/// Expires open orders and pending matches whose height has arrived,
/// releasing whatever is still in escrow.
pub(crate) fn expire(ledger: &Ledger, block_index: u32) -> Result<(), Error> {
    for order in ledger.orders_expiring(block_index)? {
        if order.give_remaining > 0 && order.give_asset != assets::BTC {
            ledger.credit(
                block_index,
                &order.source,
                &order.give_asset,
                order.give_remaining,
                "order expired",
                &order.tx_hash,
            )?;
        }
        ledger.set_order_validity(block_index, order.tx_index, "expired")?;
        ledger.insert_order_expiration(&order, block_index)?;
        info!(order = %order.tx_hash, "order expired");
    }

    for order_match in ledger.pending_order_matches_expiring(block_index)? {
        if order_match.forward_asset != assets::BTC {
            ledger.credit(
                block_index,
                &order_match.tx0_address,
                &order_match.forward_asset,
                order_match.forward_amount,
                "order match expired",
                &order_match.id,
            )?;
        }
        if order_match.backward_asset != assets::BTC {
            ledger.credit(
                block_index,
                &order_match.tx1_address,
                &order_match.backward_asset,
                order_match.backward_amount,
                "order match expired",
                &order_match.id,
            )?;
        }
        ledger.set_order_match_validity(block_index, &order_match.id, "expired")?;
        ledger.insert_order_match_expiration(&order_match, block_index)?;
        info!(id = %order_match.id, "order match expired");
    }

    Ok(())
}
