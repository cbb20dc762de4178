//! Decoder for the two recognised output script shapes.
//!
//! Works over the `asm` rendering the chain node already produces, so no
//! script interpreter is needed: pay-to-pubkey-hash yields a destination
//! address, OP_RETURN and 1-of-N bare multisig yield embedded data chunks.

use crate::address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedScript {
    /// P2PKH output; carries the base58check address.
    Destination(String),
    /// Data-carrying output; the chunk is already stripped of its length
    /// prefix for multisig keys.
    DataChunk(Vec<u8>),
    /// Anything else; ignored by the extractor.
    Unknown,
}

pub fn classify(asm: &str, address_version: u8) -> DecodedScript {
    let tokens: Vec<&str> = asm.split_whitespace().collect();

    if let Some(addr) = as_pubkey_hash(&tokens, address_version) {
        return DecodedScript::Destination(addr);
    }
    if let Some(chunk) = as_op_return(&tokens) {
        return DecodedScript::DataChunk(chunk);
    }
    if let Some(chunk) = as_bare_multisig(&tokens) {
        return DecodedScript::DataChunk(chunk);
    }

    DecodedScript::Unknown
}

fn as_pubkey_hash(tokens: &[&str], address_version: u8) -> Option<String> {
    if tokens.len() != 5
        || tokens[0] != "OP_DUP"
        || tokens[1] != "OP_HASH160"
        || tokens[3] != "OP_EQUALVERIFY"
        || tokens[4] != "OP_CHECKSIG"
    {
        return None;
    }

    let hash: [u8; 20] = hex::decode(tokens[2]).ok()?.try_into().ok()?;
    Some(address::encode(address_version, &hash))
}

fn as_op_return(tokens: &[&str]) -> Option<Vec<u8>> {
    if tokens.len() != 2 || tokens[0] != "OP_RETURN" {
        return None;
    }
    hex::decode(tokens[1]).ok()
}

/// 1-of-N bare multisig; the first pushed key is `len ‖ data ‖ padding`.
fn as_bare_multisig(tokens: &[&str]) -> Option<Vec<u8>> {
    if tokens.len() < 4 || tokens[0] != "1" || *tokens.last()? != "OP_CHECKMULTISIG" {
        return None;
    }

    let key_count: usize = tokens[tokens.len() - 2].parse().ok()?;
    if key_count == 0 || key_count != tokens.len() - 3 {
        return None;
    }

    let data_key = hex::decode(tokens[1]).ok()?;
    let chunk_length = *data_key.first()? as usize;
    data_key.get(1..1 + chunk_length).map(|c| c.to_vec())
}
