//! Feed broadcast: a timestamped value published by an address.

use crate::{write_text_field, Error, Reader, TEXT_FIELD_LENGTH};

pub const ID: u32 = 30;
pub const LENGTH: usize = 16 + TEXT_FIELD_LENGTH;

#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    pub timestamp: u32,
    pub value: f64,
    /// Fee taken by the feed on settlement, in hundred-millionths.
    pub fee_fraction_int: u32,
    pub text: String,
}

impl Broadcast {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(LENGTH);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.value.to_be_bytes());
        out.extend_from_slice(&self.fee_fraction_int.to_be_bytes());
        write_text_field(&mut out, &self.text)?;
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        Ok(Broadcast {
            timestamp: rd.u32()?,
            value: rd.f64()?,
            fee_fraction_int: rd.u32()?,
            text: rd.text_field()?,
        })
    }

    /// A broadcast whose text is `lock` (case-insensitive) terminates the feed.
    pub fn is_lock(&self) -> bool {
        self.text.eq_ignore_ascii_case("lock")
    }
}
