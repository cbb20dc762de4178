//! Feed broadcasts and the settlement they drive.
//!
//! An address is a feed of broadcasts with strictly increasing timestamps.
//! A broadcast whose text is `lock` terminates the feed. Every other valid
//! broadcast with a non-negative value walks the feed's open bet matches:
//! CFDs force-liquidate when one side's credit exhausts the pot and settle
//! at their deadline; Equal/NotEqual matches settle at the deadline only.
//! The feed's fee comes out of the pot before any credit.

use scrip_ledger::{BetMatchRow, BroadcastRow, Ledger, TransactionRow};
use scrip_messages::{assets, bet::LEVERAGE_UNIT, broadcast::Broadcast, UNIT};
use tracing::info;

use crate::{div_round_half_even, invalid, Error, INVALID_UNPACK, VALID};

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let decoded = match Broadcast::unpack(message) {
        Ok(msg) => Some(msg),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            None
        }
    };

    if validity == VALID {
        let mut problems = vec![];
        if let Some(prior) = ledger.last_valid_broadcast(&tx.source)? {
            if prior.locked {
                problems.push("locked feed");
            } else if let (Some(msg), Some(prior_timestamp)) = (&decoded, prior.timestamp) {
                if (msg.timestamp as i64) <= prior_timestamp {
                    problems.push("feed timestamps not monotonically increasing");
                }
            }
        }
        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    let lock = decoded.as_ref().map(Broadcast::is_lock).unwrap_or(false);

    let row = match (&decoded, lock) {
        // A lock clears the numeric fields for good.
        (Some(_), true) | (None, _) => BroadcastRow {
            tx_index: tx.tx_index,
            tx_hash: tx.tx_hash.clone(),
            block_index: tx.block_index,
            source: tx.source.clone(),
            timestamp: None,
            value: None,
            fee_fraction_int: None,
            text: None,
            locked: lock && validity == VALID,
            validity: validity.clone(),
        },
        (Some(msg), false) => BroadcastRow {
            tx_index: tx.tx_index,
            tx_hash: tx.tx_hash.clone(),
            block_index: tx.block_index,
            source: tx.source.clone(),
            timestamp: Some(msg.timestamp as i64),
            value: Some(msg.value),
            fee_fraction_int: Some(msg.fee_fraction_int as i64),
            text: Some(msg.text.clone()),
            locked: false,
            validity: validity.clone(),
        },
    };
    ledger.insert_broadcast(&row)?;

    if validity != VALID || lock {
        return Ok(());
    }

    // Only priced broadcasts drive settlement.
    let msg = match decoded {
        Some(msg) if msg.value >= 0.0 => msg,
        _ => return Ok(()),
    };

    for bet_match in ledger.bet_matches_on_feed(&tx.source)? {
        settle_match(ledger, tx, &bet_match, msg.timestamp as i64, msg.value)?;
    }

    Ok(())
}

/// Bull is whichever side holds the lower bet type id; same rule picks the
/// Equal side.
fn orient(bet_match: &BetMatchRow) -> (String, String, i64, i64) {
    if bet_match.tx0_bet_type < bet_match.tx1_bet_type {
        (
            bet_match.tx0_address.clone(),
            bet_match.tx1_address.clone(),
            bet_match.forward_amount,
            bet_match.backward_amount,
        )
    } else {
        (
            bet_match.tx1_address.clone(),
            bet_match.tx0_address.clone(),
            bet_match.backward_amount,
            bet_match.forward_amount,
        )
    }
}

fn settle_match(
    ledger: &Ledger,
    tx: &TransactionRow,
    bet_match: &BetMatchRow,
    timestamp: i64,
    value: f64,
) -> Result<(), Error> {
    let block_index = tx.block_index;
    let total_escrow = bet_match.forward_amount + bet_match.backward_amount;
    let fee = div_round_half_even(
        total_escrow as i128 * bet_match.fee_fraction_int as i128,
        UNIT as i128,
    ) as i64;
    let escrow_less_fee = total_escrow - fee;

    // 0 + 1: a bull/bear CFD pair; 2 + 3: Equal against NotEqual.
    let pair_id = bet_match.tx0_bet_type + bet_match.tx1_bet_type;

    if pair_id == 1 {
        let (bull_address, bear_address, _bull_escrow, bear_escrow) = orient(bet_match);

        let leverage = bet_match.leverage as f64 / LEVERAGE_UNIT as f64;
        let bear_credit_raw = bear_escrow as f64
            - (value - bet_match.initial_value) * leverage * UNIT as f64;
        let bear_credit = bear_credit_raw.round_ties_even() as i64;
        let bull_credit = escrow_less_fee - bear_credit;

        let outcome = if bull_credit >= escrow_less_fee {
            ledger.credit(
                block_index,
                &bull_address,
                assets::XCP,
                escrow_less_fee,
                "bet settled",
                &bet_match.id,
            )?;
            Some("Force-Liquidated Bear")
        } else if bull_credit <= 0 {
            ledger.credit(
                block_index,
                &bear_address,
                assets::XCP,
                escrow_less_fee,
                "bet settled",
                &bet_match.id,
            )?;
            Some("Force-Liquidated Bull")
        } else if timestamp >= bet_match.deadline {
            ledger.credit(
                block_index,
                &bull_address,
                assets::XCP,
                bull_credit,
                "bet settled",
                &bet_match.id,
            )?;
            ledger.credit(
                block_index,
                &bear_address,
                assets::XCP,
                bear_credit,
                "bet settled",
                &bet_match.id,
            )?;
            Some("Settled (CFD)")
        } else {
            None
        };

        if let Some(outcome) = outcome {
            ledger.credit(
                block_index,
                &bet_match.feed_address,
                assets::XCP,
                fee,
                "feed fee",
                &bet_match.id,
            )?;
            ledger.set_bet_match_validity(block_index, &bet_match.id, outcome)?;
            info!(id = %bet_match.id, outcome, "bet match resolved");
        }
    } else if pair_id == 5 && timestamp >= bet_match.deadline {
        let (equal_address, notequal_address, _, _) = orient(bet_match);

        let (winner_address, outcome) = if value == bet_match.target_value {
            (equal_address, "Settled for Equal")
        } else {
            (notequal_address, "Settled for NotEqual")
        };

        ledger.credit(
            block_index,
            &winner_address,
            assets::XCP,
            escrow_less_fee,
            "bet settled",
            &bet_match.id,
        )?;
        ledger.credit(
            block_index,
            &bet_match.feed_address,
            assets::XCP,
            fee,
            "feed fee",
            &bet_match.id,
        )?;
        ledger.set_bet_match_validity(block_index, &bet_match.id, outcome)?;
        info!(id = %bet_match.id, outcome, "bet match resolved");
    }

    Ok(())
}
