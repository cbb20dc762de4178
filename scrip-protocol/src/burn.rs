//! Proof-of-burn: BTC paid to the unspendable sink earns XCP.
//!
//! The earning rate falls linearly from 1500 to 1000 XCP per BTC across the
//! burn window. An address may burn at most one BTC over its lifetime;
//! anything above the cap is ignored.

use scrip_ledger::{BurnRow, Ledger, TransactionRow};
use scrip_messages::{assets, UNIT};
use tracing::info;

use crate::{div_round_half_even, invalid, Error, ProtocolParams, VALID};

/// Lifetime burn cap per address, in base units.
pub const MAX_BURN: i64 = UNIT;

/// XCP earned for burning `burned` base units at the given height.
fn earned(burned: i64, block_index: u32, params: &ProtocolParams) -> i64 {
    let total_time = (params.burn_end - params.burn_start) as i128;
    let partial_time = (params.burn_end - block_index) as i128;

    // multiplier = 1000 * (1 + partial/total/2), in rationals
    let numerator = burned as i128 * (1000 * total_time + 500 * partial_time);
    div_round_half_even(numerator, total_time) as i64
}

pub(crate) fn parse(
    ledger: &Ledger,
    params: &ProtocolParams,
    tx: &TransactionRow,
) -> Result<(), Error> {
    let mut problems = vec![];
    let sent = tx.btc_amount.max(0);

    if tx.block_index < params.burn_start || tx.block_index > params.burn_end {
        problems.push("not in burn period");
    }
    if sent == 0 {
        problems.push("no BTC burned");
    }

    let mut burned = sent;
    let mut earned_xcp = 0;
    if problems.is_empty() {
        let already = ledger.burned_by(&tx.source)?;
        burned = sent.min(MAX_BURN - already);
        if burned <= 0 {
            burned = 0;
            problems.push("maximum burn reached");
        } else {
            earned_xcp = earned(burned, tx.block_index, params);
        }
    }

    let validity = if problems.is_empty() {
        VALID.to_owned()
    } else {
        invalid(&problems)
    };

    if validity == VALID {
        ledger.credit(
            tx.block_index,
            &tx.source,
            assets::XCP,
            earned_xcp,
            "burn",
            &tx.tx_hash,
        )?;
        info!(
            source = %tx.source,
            burned,
            earned = earned_xcp,
            "burn"
        );
    }

    ledger.insert_burn(&BurnRow {
        tx_index: tx.tx_index,
        tx_hash: tx.tx_hash.clone(),
        block_index: tx.block_index,
        source: tx.source.clone(),
        burned: if validity == VALID { burned } else { sent },
        earned: earned_xcp,
        validity,
    })?;

    Ok(())
}
