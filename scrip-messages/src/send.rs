//! Simple asset transfer.

use crate::{assets, Error, Reader};

pub const ID: u32 = 0;
pub const LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Send {
    pub asset: String,
    pub amount: u64,
}

impl Send {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(LENGTH);
        out.extend_from_slice(&assets::id(&self.asset)?.to_be_bytes());
        out.extend_from_slice(&self.amount.to_be_bytes());
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        let asset = assets::name(rd.u64()?)?;
        let amount = rd.u64()?;
        Ok(Send { asset, amount })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let msg = Send {
            asset: "XCP".into(),
            amount: 30 * crate::UNIT as u64,
        };
        assert_eq!(Send::unpack(&msg.pack().unwrap()).unwrap(), msg);
    }

    #[test]
    fn known_bytes() {
        let msg = Send {
            asset: "XCP".into(),
            amount: 1,
        };
        let packed = msg.pack().unwrap();
        assert_eq!(
            packed,
            [0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            Send::unpack(&[0u8; 15]),
            Err(Error::BadLength(15, LENGTH))
        ));
    }

    #[test]
    fn rejects_reserved_gap_asset_id() {
        let mut data = vec![0u8; 16];
        data[7] = 2; // id 2 is neither reserved nor ordinary
        assert!(Send::unpack(&data).is_err());
    }
}
