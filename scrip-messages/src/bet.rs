//! Wager against a feed.

use crate::{Error, Reader};

pub const ID: u32 = 40;
pub const LENGTH: usize = 34;

/// The four wager kinds. CFDs pair bull against bear; Equal pairs against
/// NotEqual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BetType {
    BullCfd = 0,
    BearCfd = 1,
    Equal = 2,
    NotEqual = 3,
}

impl BetType {
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(BetType::BullCfd),
            1 => Some(BetType::BearCfd),
            2 => Some(BetType::Equal),
            3 => Some(BetType::NotEqual),
            _ => None,
        }
    }

    pub fn id(self) -> u16 {
        self as u16
    }

    /// The type this one matches against.
    pub fn counter(self) -> Self {
        match self {
            BetType::BullCfd => BetType::BearCfd,
            BetType::BearCfd => BetType::BullCfd,
            BetType::Equal => BetType::NotEqual,
            BetType::NotEqual => BetType::Equal,
        }
    }

    pub fn is_cfd(self) -> bool {
        matches!(self, BetType::BullCfd | BetType::BearCfd)
    }
}

/// Unit leverage for CFD wagers; Equal/NotEqual bets must use exactly this.
pub const LEVERAGE_UNIT: u16 = 5040;

#[derive(Debug, Clone, PartialEq)]
pub struct Bet {
    pub bet_type: u16,
    /// Feed timestamp after which the wager settles.
    pub deadline: u32,
    pub wager_amount: u64,
    pub counterwager_amount: u64,
    pub target_value: f64,
    pub leverage: u16,
    pub expiration: u16,
}

impl Bet {
    pub fn pack(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(LENGTH);
        out.extend_from_slice(&self.bet_type.to_be_bytes());
        out.extend_from_slice(&self.deadline.to_be_bytes());
        out.extend_from_slice(&self.wager_amount.to_be_bytes());
        out.extend_from_slice(&self.counterwager_amount.to_be_bytes());
        out.extend_from_slice(&self.target_value.to_be_bytes());
        out.extend_from_slice(&self.leverage.to_be_bytes());
        out.extend_from_slice(&self.expiration.to_be_bytes());
        Ok(out)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, Error> {
        if data.len() != LENGTH {
            return Err(Error::BadLength(data.len(), LENGTH));
        }
        let mut rd = Reader::new(data);
        Ok(Bet {
            bet_type: rd.u16()?,
            deadline: rd.u32()?,
            wager_amount: rd.u64()?,
            counterwager_amount: rd.u64()?,
            target_value: rd.f64()?,
            leverage: rd.u16()?,
            expiration: rd.u16()?,
        })
    }
}
