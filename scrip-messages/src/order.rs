//! Exchange offer of one asset for another.

use crate::{assets, Error, Reader};

pub const ID: u32 = 10;
pub const LENGTH: usize = 42;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub give_asset: String,
    pub give_amount: u64,
    pub get_asset: String,
    pub get_amount: u64,
    /// Blocks the offer stays on the book.
    pub expiration: u16,
    /// Minimum miners' fee the counterparty must have provided on BTC pairs.
    pub fee_required: u64,
}

impl Order {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(LENGTH);
        out.extend_from_slice(&assets::id(&self.give_asset)?.to_be_bytes());
        out.extend_from_slice(&self.give_amount.to_be_bytes());
        out.extend_from_slice(&assets::id(&self.get_asset)?.to_be_bytes());
        out.extend_from_slice(&self.get_amount.to_be_bytes());
        out.extend_from_slice(&self.expiration.to_be_bytes());
        out.extend_from_slice(&self.fee_required.to_be_bytes());
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        Ok(Order {
            give_asset: assets::name(rd.u64()?)?,
            give_amount: rd.u64()?,
            get_asset: assets::name(rd.u64()?)?,
            get_amount: rd.u64()?,
            expiration: rd.u16()?,
            fee_required: rd.u64()?,
        })
    }
}
