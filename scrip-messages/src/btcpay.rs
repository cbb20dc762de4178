//! BTC settlement of a pending order match.
//!
//! The wire form carries the two raw transaction hashes of the matched
//! orders; everywhere else the match id is the concatenation of their hex
//! encodings.

use crate::{Error, Reader};

pub const ID: u32 = 11;
pub const LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtcPay {
    pub tx0_hash: String,
    pub tx1_hash: String,
}

impl BtcPay {
    /// The database id of the referenced order match.
    pub fn order_match_id(&self) -> String {
        format!("{}{}", self.tx0_hash, self.tx1_hash)
    }

    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(LENGTH);
        out.extend_from_slice(&decode_hash(&self.tx0_hash)?);
        out.extend_from_slice(&decode_hash(&self.tx1_hash)?);
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        Ok(BtcPay {
            tx0_hash: hex::encode(rd.bytes(32)?),
            tx1_hash: hex::encode(rd.bytes(32)?),
        })
    }
}

fn decode_hash(hash: &str) -> Result<[u8; 32], Error> {
    let raw = hex::decode(hash).map_err(|_| Error::BadHash)?;
    raw.try_into().map_err(|_| Error::BadHash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let msg = BtcPay {
            tx0_hash: "aa".repeat(32),
            tx1_hash: "bb".repeat(32),
        };
        let packed = msg.pack().unwrap();
        assert_eq!(packed.len(), LENGTH);
        assert_eq!(BtcPay::unpack(&packed).unwrap(), msg);
    }

    #[test]
    fn match_id_concatenates_hex() {
        let msg = BtcPay {
            tx0_hash: "aa".repeat(32),
            tx1_hash: "bb".repeat(32),
        };
        assert_eq!(msg.order_match_id().len(), 128);
    }

    #[test]
    fn rejects_short_hash() {
        let msg = BtcPay {
            tx0_hash: "aa".into(),
            tx1_hash: "bb".repeat(32),
        };
        assert!(matches!(msg.pack(), Err(Error::BadHash)));
    }
}
