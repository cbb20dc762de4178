//! Pro-rata call-back of an outstanding callable asset by its issuer.

use crate::{assets, Error, Reader};

pub const ID: u32 = 21;
pub const LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct Callback {
    /// Fraction of each holder's position called back, in (0, 1].
    pub fraction: f64,
    pub asset: String,
}

impl Callback {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(LENGTH);
        out.extend_from_slice(&self.fraction.to_be_bytes());
        out.extend_from_slice(&assets::id(&self.asset)?.to_be_bytes());
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        Ok(Callback {
            fraction: rd.f64()?,
            asset: assets::name(rd.u64()?)?,
        })
    }
}
