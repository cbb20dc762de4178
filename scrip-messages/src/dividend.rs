//! XCP dividend paid to the holders of an asset.

use crate::{assets, Error, Reader};

pub const ID: u32 = 50;
pub const LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dividend {
    /// XCP base units paid per whole unit of the asset held.
    pub amount_per_unit: u64,
    pub asset: String,
}

impl Dividend {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(LENGTH);
        out.extend_from_slice(&self.amount_per_unit.to_be_bytes());
        out.extend_from_slice(&assets::id(&self.asset)?.to_be_bytes());
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        Ok(Dividend {
            amount_per_unit: rd.u64()?,
            asset: assets::name(rd.u64()?)?,
        })
    }
}
