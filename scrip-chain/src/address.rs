//! Base58check pay-to-pubkey-hash addresses.

use crate::Error;

/// Address string for a 20-byte pubkey hash under the given version byte.
pub fn encode(version: u8, hash: &[u8; 20]) -> String {
    bs58::encode(hash).with_check_version(version).into_string()
}

/// Pubkey hash behind an address, verifying checksum and version byte.
pub fn decode(address: &str, version: u8) -> Result<[u8; 20], Error> {
    let raw = bs58::decode(address)
        .with_check(Some(version))
        .into_vec()
        .map_err(|_| Error::BadAddress)?;

    // with_check keeps the version byte at the front
    if raw.len() != 21 {
        return Err(Error::BadAddress);
    }
    raw[1..].try_into().map_err(|_| Error::BadAddress)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let hash = [0x1fu8; 20];
        let addr = encode(0x00, &hash);
        assert_eq!(decode(&addr, 0x00).unwrap(), hash);
    }

    #[test]
    fn zero_hash_mainnet_sink() {
        // Pay-to-zero-hash under version 0x00 is the canonical burn sink.
        assert_eq!(
            encode(0x00, &[0u8; 20]),
            "1111111111111111111114oLvT2"
        );
    }

    #[test]
    fn wrong_version_rejected() {
        let addr = encode(0x00, &[7u8; 20]);
        assert!(decode(&addr, 0x6f).is_err());
    }

    #[test]
    fn garbage_rejected() {
        assert!(decode("not an address", 0x00).is_err());
    }
}
