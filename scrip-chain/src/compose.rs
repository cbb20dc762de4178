//! Builds unsigned transactions embedding a protocol payload.
//!
//! The composer emits outputs only: a destination P2PKH output first where
//! the message calls for one, then the payload as a single OP_RETURN output
//! or a run of 1-of-1 bare multisig outputs. Funding the inputs and signing
//! are wallet territory and stay outside the engine.

use crate::{address, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    Multisig,
    OpReturn,
}

#[derive(Debug, Clone)]
pub struct ComposeParams {
    pub prefix: Vec<u8>,
    pub address_version: u8,
}

/// Smallest output value the network relays for a P2PKH destination.
pub const REGULAR_DUST_SIZE: i64 = 5430;

/// Slightly larger dust for data-carrying multisig outputs.
pub const MULTISIG_DUST_SIZE: i64 = 7800;

/// Relay limit for a single OP_RETURN push.
pub const OP_RETURN_MAX: usize = 80;

/// Data bytes per multisig key: 33-byte key minus length byte, minus one
/// byte of mandatory padding headroom.
const MULTISIG_CHUNK: usize = 31;

/// Serialized unsigned transaction, hex encoded.
pub fn unsigned_transaction(
    destination: Option<(&str, i64)>,
    payload: &[u8],
    encoding: DataEncoding,
    params: &ComposeParams,
) -> Result<String, Error> {
    let mut outputs: Vec<(i64, Vec<u8>)> = vec![];

    if let Some((dest, value)) = destination {
        let hash = address::decode(dest, params.address_version)?;
        outputs.push((value.max(REGULAR_DUST_SIZE), p2pkh_script(&hash)));
    }

    if !payload.is_empty() {
        let mut data = params.prefix.clone();
        data.extend_from_slice(payload);

        match encoding {
            DataEncoding::OpReturn => {
                if data.len() > OP_RETURN_MAX {
                    return Err(Error::PayloadTooLarge);
                }
                outputs.push((0, op_return_script(&data)));
            }
            DataEncoding::Multisig => {
                for chunk in data.chunks(MULTISIG_CHUNK) {
                    outputs.push((MULTISIG_DUST_SIZE, multisig_script(chunk)));
                }
            }
        }
    }

    Ok(hex::encode(serialize(&outputs)))
}

fn p2pkh_script(hash: &[u8; 20]) -> Vec<u8> {
    let mut script = vec![0x76, 0xa9, 0x14];
    script.extend_from_slice(hash);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

fn op_return_script(data: &[u8]) -> Vec<u8> {
    let mut script = vec![0x6a];
    push_data(&mut script, data);
    script
}

/// 1-of-1 bare multisig holding the data key `len ‖ chunk ‖ padding`.
fn multisig_script(chunk: &[u8]) -> Vec<u8> {
    let mut key = vec![chunk.len() as u8];
    key.extend_from_slice(chunk);
    key.resize(33, 0);

    let mut script = vec![0x51];
    push_data(&mut script, &key);
    script.push(0x51);
    script.push(0xae);
    script
}

fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    debug_assert!(data.len() <= OP_RETURN_MAX);
    if data.len() <= 75 {
        script.push(data.len() as u8);
    } else {
        script.push(0x4c);
        script.push(data.len() as u8);
    }
    script.extend_from_slice(data);
}

fn serialize(outputs: &[(i64, Vec<u8>)]) -> Vec<u8> {
    let mut raw = vec![];
    raw.extend_from_slice(&1u32.to_le_bytes()); // version
    write_varint(&mut raw, 0); // inputs: left for the funding wallet
    write_varint(&mut raw, outputs.len() as u64);
    for (value, script) in outputs {
        raw.extend_from_slice(&value.to_le_bytes());
        write_varint(&mut raw, script.len() as u64);
        raw.extend_from_slice(script);
    }
    raw.extend_from_slice(&0u32.to_le_bytes()); // locktime
    raw
}

fn write_varint(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x10000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}
