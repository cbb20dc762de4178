//! Wagers against a feed: book insertion, pairing, expiry.
//!
//! A bet is sent to the feed address it wagers on. The wager is escrowed in
//! XCP at insertion; matches pair bulls with bears (or Equal with NotEqual)
//! at the same deadline, target and leverage.

use scrip_ledger::{BetMatchRow, BetRow, Ledger, TransactionRow};
use scrip_messages::{
    assets,
    bet::{Bet, BetType, LEVERAGE_UNIT},
};
use tracing::{debug, info};

use crate::{clamp, invalid, Error, INVALID_FUNDS, INVALID_UNPACK, VALID};

pub(crate) fn parse(ledger: &Ledger, tx: &TransactionRow, message: &[u8]) -> Result<(), Error> {
    let mut validity = VALID.to_owned();

    let decoded = match Bet::unpack(message) {
        Ok(msg) => Some(msg),
        Err(_) => {
            validity = INVALID_UNPACK.to_owned();
            None
        }
    };

    let (bet_type, deadline, wager, counterwager, target_value, leverage, expiration) = decoded
        .map(|m| {
            (
                m.bet_type as i64,
                m.deadline as i64,
                clamp(m.wager_amount),
                clamp(m.counterwager_amount),
                m.target_value,
                m.leverage as i64,
                m.expiration as i64,
            )
        })
        .unwrap_or_default();

    let feed_address = tx.destination.clone().unwrap_or_default();
    let mut fee_fraction_int = 0;

    if validity == VALID {
        let mut problems = vec![];

        let kind = BetType::from_id(bet_type as u16);
        match kind {
            None => problems.push("unknown bet type"),
            Some(kind) => {
                if kind.is_cfd() && target_value != 0.0 {
                    problems.push("CFD bets have no target value");
                }
                if !kind.is_cfd() && leverage != LEVERAGE_UNIT as i64 {
                    problems.push("leverage used with an Equal/NotEqual bet");
                }
            }
        }
        if wager <= 0 || counterwager <= 0 {
            problems.push("non-positive amounts");
        }
        if tx.destination.is_none() {
            problems.push("no feed address");
        } else {
            match ledger.last_valid_broadcast(&feed_address)? {
                None => problems.push("feed does not exist"),
                Some(broadcast) => {
                    if broadcast.locked {
                        problems.push("locked feed");
                    }
                    fee_fraction_int = broadcast.fee_fraction_int.unwrap_or(0);
                }
            }
        }

        if !problems.is_empty() {
            validity = invalid(&problems);
        }
    }

    if validity == VALID {
        match ledger.debit(
            tx.block_index,
            &tx.source,
            assets::XCP,
            wager,
            "bet",
            &tx.tx_hash,
        ) {
            Err(scrip_ledger::Error::Balance { .. }) => validity = INVALID_FUNDS.to_owned(),
            other => other?,
        }
    }

    let row = BetRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        feed_address,
        bet_type,
        deadline,
        wager_amount: wager,
        wager_remaining: wager,
        counterwager_amount: counterwager,
        counterwager_remaining: counterwager,
        target_value,
        leverage,
        expiration,
        expire_index: tx.block_index as i64 + expiration,
        fee_fraction_int,
        validity: validity.clone(),
    };
    ledger.insert_bet(&row)?;

    if validity == VALID {
        match_bet(ledger, row)?;
    }
    Ok(())
}

/// Pairs the new bet against open counter-bets on the same feed in strict
/// `tx_index` order.
fn match_bet(ledger: &Ledger, mut tx1: BetRow) -> Result<(), Error> {
    let block_index = tx1.block_index;

    let counter_type = match BetType::from_id(tx1.bet_type as u16) {
        Some(kind) => kind.counter().id() as i64,
        None => return Ok(()),
    };

    let initial_value = ledger
        .last_valid_broadcast(&tx1.feed_address)?
        .and_then(|b| b.value)
        .unwrap_or_default();

    let candidates = ledger.open_bets(&tx1.feed_address, counter_type)?;
    for mut tx0 in candidates {
        if tx1.wager_remaining <= 0 || tx1.counterwager_remaining <= 0 {
            break;
        }
        if tx0.wager_remaining <= 0 || tx0.counterwager_remaining <= 0 {
            continue;
        }
        if tx0.deadline != tx1.deadline
            || tx0.target_value != tx1.target_value
            || tx0.leverage != tx1.leverage
        {
            continue;
        }

        // The new wager must cover the odds the old bet asked for.
        let lhs = tx1.wager_amount as i128 * tx0.wager_amount as i128;
        let rhs = tx1.counterwager_amount as i128 * tx0.counterwager_amount as i128;
        if lhs < rhs {
            continue;
        }

        let forward_amount = tx0.wager_remaining.min(tx1.counterwager_remaining);
        let backward_amount = (forward_amount as i128 * tx0.counterwager_amount as i128
            / tx0.wager_amount as i128) as i64;
        if forward_amount <= 0 || backward_amount <= 0 {
            continue;
        }
        if backward_amount > tx1.wager_remaining {
            continue;
        }

        let id = format!("{}{}", tx0.tx_hash, tx1.tx_hash);
        debug!(%id, forward_amount, backward_amount, "bet match");

        tx0.wager_remaining -= forward_amount;
        tx0.counterwager_remaining -= backward_amount;
        ledger.update_bet_remaining(
            block_index,
            tx0.tx_index,
            tx0.wager_remaining,
            tx0.counterwager_remaining,
        )?;

        tx1.wager_remaining -= backward_amount;
        tx1.counterwager_remaining -= forward_amount;
        ledger.update_bet_remaining(
            block_index,
            tx1.tx_index,
            tx1.wager_remaining,
            tx1.counterwager_remaining,
        )?;

        ledger.insert_bet_match(&BetMatchRow {
            id,
            tx0_index: tx0.tx_index,
            tx0_hash: tx0.tx_hash.clone(),
            tx0_address: tx0.source.clone(),
            tx1_index: tx1.tx_index,
            tx1_hash: tx1.tx_hash.clone(),
            tx1_address: tx1.source.clone(),
            tx0_bet_type: tx0.bet_type,
            tx1_bet_type: tx1.bet_type,
            feed_address: tx1.feed_address.clone(),
            initial_value,
            deadline: tx0.deadline,
            target_value: tx0.target_value,
            leverage: tx0.leverage,
            forward_amount,
            backward_amount,
            tx0_block_index: tx0.block_index,
            tx1_block_index: block_index,
            tx0_expiration: tx0.expiration,
            tx1_expiration: tx1.expiration,
            match_expire_index: block_index as i64 + tx0.expiration.min(tx1.expiration),
            fee_fraction_int: tx1.fee_fraction_int,
            validity: VALID.to_owned(),
        })?;
    }

    Ok(())
}

/// Expires open bets and unsettled matches, returning escrow. Bets expire
/// by height only; the broadcast deadline merely gates settlement.
pub(crate) fn expire(ledger: &Ledger, block_index: u32, _block_time: u32) -> Result<(), Error> {
    for bet in ledger.bets_expiring(block_index)? {
        if bet.wager_remaining > 0 {
            ledger.credit(
                block_index,
                &bet.source,
                assets::XCP,
                bet.wager_remaining,
                "bet expired",
                &bet.tx_hash,
            )?;
        }
        ledger.set_bet_validity(block_index, bet.tx_index, "expired")?;
        ledger.insert_bet_expiration(&bet, block_index)?;
        info!(bet = %bet.tx_hash, "bet expired");
    }

    for bet_match in ledger.bet_matches_expiring(block_index)? {
        ledger.credit(
            block_index,
            &bet_match.tx0_address,
            assets::XCP,
            bet_match.forward_amount,
            "bet match expired",
            &bet_match.id,
        )?;
        ledger.credit(
            block_index,
            &bet_match.tx1_address,
            assets::XCP,
            bet_match.backward_amount,
            "bet match expired",
            &bet_match.id,
        )?;
        ledger.set_bet_match_validity(block_index, &bet_match.id, "expired")?;
        ledger.insert_bet_match_expiration(&bet_match, block_index)?;
        info!(id = %bet_match.id, "bet match expired");
    }

    Ok(())
}
