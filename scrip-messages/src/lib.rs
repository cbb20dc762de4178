//! Wire codecs for the protocol messages embedded in chain transactions
//!
//! Every message is a fixed-width big-endian struct, optionally followed by
//! a length-prefixed text field padded to a fixed size. The first four bytes
//! of a stripped payload are the message type id; the per-kind codecs in
//! this crate cover the remainder.

pub mod assets;
pub mod bet;
pub mod broadcast;
pub mod btcpay;
pub mod callback;
pub mod cancel;
pub mod dividend;
pub mod issuance;
pub mod order;
pub mod send;

use byteorder::{BigEndian, ReadBytesExt};
use thiserror::Error;

/// Base units per whole token.
pub const UNIT: i64 = 100_000_000;

/// Largest value any decoded quantity is clamped to before validation.
pub const MAX_INT: i64 = i64::MAX;

/// Width of the message type id at the head of every payload.
pub const TYPE_ID_LENGTH: usize = 4;

/// On-wire size of a length-prefixed text field (one length byte plus up to
/// [`TEXT_CONTENT_MAX`] content bytes, zero padded).
pub const TEXT_FIELD_LENGTH: usize = 52;

/// Maximum content bytes inside a text field.
pub const TEXT_CONTENT_MAX: usize = TEXT_FIELD_LENGTH - 1;

#[derive(Error, Debug)]
pub enum Error {
    #[error("message is {0} bytes, expected {1}")]
    BadLength(usize, usize),

    #[error("message truncated")]
    Truncated,

    #[error("text field longer than {TEXT_CONTENT_MAX} bytes")]
    TextTooLong,

    #[error("text field is not valid utf-8")]
    BadText,

    #[error("invalid asset name {0}")]
    BadAssetName(String),

    #[error("asset id {0} outside the ordinary range")]
    BadAssetId(u64),

    #[error("hash field is not a 32-byte hex string")]
    BadHash,
}

/// Reads the message type id off the head of a stripped payload.
pub fn type_id(data: &[u8]) -> Option<u32> {
    let head: [u8; TYPE_ID_LENGTH] = data.get(..TYPE_ID_LENGTH)?.try_into().ok()?;
    Some(u32::from_be_bytes(head))
}

/// Sequential reader over a fixed-layout message body.
pub(crate) struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Reader(data)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, Error> {
        self.0.read_u16::<BigEndian>().map_err(|_| Error::Truncated)
    }

    pub(crate) fn u32(&mut self) -> Result<u32, Error> {
        self.0.read_u32::<BigEndian>().map_err(|_| Error::Truncated)
    }

    pub(crate) fn u64(&mut self) -> Result<u64, Error> {
        self.0.read_u64::<BigEndian>().map_err(|_| Error::Truncated)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, Error> {
        ReadBytesExt::read_u8(&mut self.0).map_err(|_| Error::Truncated)
    }

    pub(crate) fn f32(&mut self) -> Result<f32, Error> {
        self.0.read_f32::<BigEndian>().map_err(|_| Error::Truncated)
    }

    pub(crate) fn f64(&mut self) -> Result<f64, Error> {
        self.0.read_f64::<BigEndian>().map_err(|_| Error::Truncated)
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.0.len() < n {
            return Err(Error::Truncated);
        }
        let data: &'a [u8] = self.0;
        let (head, rest) = data.split_at(n);
        self.0 = rest;
        Ok(head)
    }

    pub(crate) fn text_field(&mut self) -> Result<String, Error> {
        let raw = self.bytes(TEXT_FIELD_LENGTH)?;
        let len = raw[0] as usize;
        if len > TEXT_CONTENT_MAX {
            return Err(Error::TextTooLong);
        }
        String::from_utf8(raw[1..1 + len].to_vec()).map_err(|_| Error::BadText)
    }
}

pub(crate) fn write_text_field(out: &mut Vec<u8>, text: &str) -> Result<(), Error> {
    let bytes = text.as_bytes();
    if bytes.len() > TEXT_CONTENT_MAX {
        return Err(Error::TextTooLong);
    }
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
    out.extend(std::iter::repeat(0u8).take(TEXT_CONTENT_MAX - bytes.len()));
    Ok(())
}
