//! Cancellation of an open order or bet by its offer hash.

use crate::{Error, Reader};

pub const ID: u32 = 70;
pub const LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancel {
    pub offer_hash: String,
}

impl Cancel {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let raw = hex::decode(&self.offer_hash).map_err(|_| Error::BadHash)?;
        if raw.len() != LENGTH {
            return Err(Error::BadHash);
        }
        Ok(raw)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        Ok(Cancel {
            offer_hash: hex::encode(rd.bytes(LENGTH)?),
        })
    }
}
