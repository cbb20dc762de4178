//! Rust-native building blocks for the scrip embedded protocol
//!
//! This crate doesn't provide any particular application; it re-exports the
//! engine's layers for use by explorers, wallets and other tooling. The
//! node binary lives in `scrip-node`.

#[doc(inline)]
pub use scrip_messages as messages;

#[doc(inline)]
pub use scrip_chain as chain;

#[doc(inline)]
pub use scrip_ledger as ledger;

#[doc(inline)]
pub use scrip_protocol as protocol;
