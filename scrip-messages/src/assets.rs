//! Base-26 asset identifiers
//!
//! `BTC` and `XCP` are reserved ids 0 and 1. Every other asset name is four
//! to twelve uppercase letters interpreted as a base-26 numeral (`A` = 0)
//! with no leading `A`, which keeps all ordinary ids at or above 26³.

use crate::Error;

pub const BTC: &str = "BTC";
pub const XCP: &str = "XCP";

/// Smallest ordinary asset id (four-letter names start here).
pub const ASSET_ID_MIN: u64 = 26u64.pow(3);

/// Ordinary ids are below this bound (names up to twelve letters).
pub const ASSET_ID_MAX: u64 = 26u64.pow(12);

/// Numeric id for an asset name.
pub fn id(name: &str) -> Result<u64, Error> {
    match name {
        BTC => return Ok(0),
        XCP => return Ok(1),
        _ => {}
    }

    if name.len() < 4 || name.len() > 12 || name.starts_with('A') {
        return Err(Error::BadAssetName(name.to_owned()));
    }

    let mut n: u64 = 0;
    for c in name.chars() {
        if !c.is_ascii_uppercase() {
            return Err(Error::BadAssetName(name.to_owned()));
        }
        n = n * 26 + (c as u64 - 'A' as u64);
    }

    debug_assert!(n >= ASSET_ID_MIN);
    Ok(n)
}

/// Asset name for a numeric id.
pub fn name(id: u64) -> Result<String, Error> {
    match id {
        0 => return Ok(BTC.to_owned()),
        1 => return Ok(XCP.to_owned()),
        _ => {}
    }

    if !(ASSET_ID_MIN..ASSET_ID_MAX).contains(&id) {
        return Err(Error::BadAssetId(id));
    }

    let mut digits = vec![];
    let mut n = id;
    while n > 0 {
        digits.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    digits.reverse();

    // Safe: digits are ascii uppercase by construction.
    Ok(String::from_utf8(digits).map_err(|_| Error::BadAssetId(id))?)
}
