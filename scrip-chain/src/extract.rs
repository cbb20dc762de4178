//! Turns a chain transaction into the protocol tuple
//! `(source, destination, btc_amount, fee, data)`.
//!
//! The destination, if any, always comes before the data outputs; change
//! outputs come after and are ignored. Transactions with a coinbase input,
//! with inputs from more than one address, or with any non-P2PKH input are
//! not protocol transactions.

use scrip_messages::UNIT;

use crate::client::{ChainRpc, RawTransaction};
use crate::script::{classify, DecodedScript};
use crate::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInfo {
    pub source: String,
    pub destination: Option<String>,
    pub btc_amount: i64,
    pub fee: i64,
    /// Payload with the protocol prefix already stripped (burns excepted).
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ExtractParams {
    pub prefix: Vec<u8>,
    pub unspendable: String,
    pub address_version: u8,
}

/// Whole-coin value to base units, round half to even.
pub fn to_base_units(value: f64) -> i64 {
    (value * UNIT as f64).round_ties_even() as i64
}

/// Extracts the protocol tuple, or `None` for non-protocol transactions.
pub fn extract(
    chain: &dyn ChainRpc,
    tx: &RawTransaction,
    params: &ExtractParams,
) -> Result<Option<TxInfo>, Error> {
    let mut destination: Option<String> = None;
    let mut btc_amount: i64 = 0;
    let mut data: Vec<u8> = vec![];
    let mut fee: i64 = 0;

    for vout in &tx.vout {
        fee -= to_base_units(vout.value);

        match classify(&vout.script_pub_key.asm, params.address_version) {
            DecodedScript::DataChunk(chunk) => data.extend_from_slice(&chunk),
            DecodedScript::Destination(address) => {
                // First P2PKH before any data output is the destination.
                if destination.is_none() && data.is_empty() {
                    btc_amount = to_base_units(vout.value);
                    destination = Some(address);
                }
            }
            DecodedScript::Unknown => {}
        }
    }

    let is_burn = destination.as_deref() == Some(params.unspendable.as_str());

    // Strip the prefix, except for burns, which need none.
    if !is_burn {
        if data.starts_with(&params.prefix) {
            data.drain(..params.prefix.len());
        } else {
            return Ok(None);
        }
        if data.is_empty() {
            return Ok(None);
        }
    }

    // All inputs must be plain P2PKH spends from a single address.
    let mut sources: Vec<String> = vec![];
    for vin in &tx.vin {
        if vin.coinbase.is_some() {
            return Ok(None);
        }
        let (txid, n) = match (&vin.txid, vin.vout) {
            (Some(txid), Some(n)) => (txid, n as usize),
            _ => return Ok(None),
        };

        let prev = chain.get_raw_transaction(txid)?;
        let prev_out = match prev.vout.get(n) {
            Some(out) => out,
            None => return Ok(None),
        };
        fee += to_base_units(prev_out.value);

        match classify(&prev_out.script_pub_key.asm, params.address_version) {
            DecodedScript::Destination(address) => sources.push(address),
            _ => return Ok(None),
        }
    }

    let source = match sources.first() {
        Some(first) if sources.iter().all(|s| s == first) => first.clone(),
        _ => return Ok(None),
    };

    Ok(Some(TxInfo {
        source,
        destination,
        btc_amount,
        fee,
        data,
    }))
}
