//! Adapter for the underlying proof-of-work chain
//!
//! Everything the engine knows about the settlement chain passes through
//! here: a thin JSON-RPC client behind the [`ChainRpc`] trait, the script
//! decoder for the two recognised output shapes, the transaction extractor
//! that turns a chain transaction into a protocol tuple, and the composer
//! that builds unsigned transactions embedding a payload.

pub mod address;
pub mod client;
pub mod compose;
pub mod extract;
pub mod script;

use thiserror::Error;

pub use client::{Block, ChainRpc, HttpClient, RawTransaction, ScriptPubKey, TxIn, TxOut};
pub use extract::{extract, ExtractParams, TxInfo};

#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chain rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed chain response: {0}")]
    BadResponse(#[from] serde_json::Error),

    #[error("chain response carried no result")]
    MissingResult,

    #[error("bad base58check address")]
    BadAddress,

    #[error("payload does not fit the requested encoding")]
    PayloadTooLarge,
}
