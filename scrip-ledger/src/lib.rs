//! The engine's single durable store
//!
//! One SQLite file holds the whole ledger: the followed chain (`blocks`,
//! `transactions`), the append-only journals (`credits`, `debits`,
//! `messages`), the mutable `balances`, and one table per message kind.
//! There is exactly one writer; readers open the file read-only and see
//! state at block boundaries (WAL journal mode).

pub mod query;
pub mod rows;
pub mod schema;

use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::json;
use thiserror::Error;
use tracing::info;

pub use rows::*;

/// Schema-breaking version; a mismatch requires rebuilding from scratch.
pub const DB_VERSION_MAJOR: u32 = 1;

/// Parsing-rules version; a mismatch triggers a reparse of stored blocks.
pub const DB_VERSION_MINOR: u32 = 3;

#[derive(Error, Debug)]
pub enum Error {
    #[error("store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{address} holds less than {amount} {asset}")]
    Balance {
        address: String,
        asset: String,
        amount: i64,
    },

    #[error(
        "database major version {found} does not match client {expected}; \
         delete the database file and refollow from scratch"
    )]
    MajorVersionMismatch { found: u32, expected: u32 },

    #[error("unknown entity {0}")]
    UnknownEntity(String),

    #[error("field {field} cannot be used to filter {entity}")]
    FieldNotAllowed { entity: String, field: String },

    #[error("unsupported filter value for field {0}")]
    BadFilterValue(String),
}

fn pack_version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor & 0xffff)
}

/// Owner of a database handle.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (creating if missing) the store for writing and verifies the
    /// major schema version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        Self::setup(conn, false)
    }

    /// Read-only handle for the API surface.
    pub fn open_readonly(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Self::setup(conn, true)
    }

    /// In-memory store, already initialised; used by tests.
    pub fn open_in_memory() -> Result<Self, Error> {
        let store = Self::setup(Connection::open_in_memory()?, false)?;
        schema::initialise(store.conn())?;
        Ok(store)
    }

    fn setup(conn: Connection, readonly: bool) -> Result<Self, Error> {
        if !readonly {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }

        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            if !readonly {
                conn.pragma_update(
                    None,
                    "user_version",
                    pack_version(DB_VERSION_MAJOR, DB_VERSION_MINOR),
                )?;
            }
        } else {
            let major = version >> 16;
            if major != DB_VERSION_MAJOR {
                return Err(Error::MajorVersionMismatch {
                    found: major,
                    expected: DB_VERSION_MAJOR,
                });
            }
        }

        Ok(Store { conn })
    }

    /// Minor (parsing-rules) version stamped in the file.
    pub fn minor_version(&self) -> Result<u32, Error> {
        let version: u32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        Ok(version & 0xffff)
    }

    pub fn set_minor_version(&self, minor: u32) -> Result<(), Error> {
        self.conn
            .pragma_update(None, "user_version", pack_version(DB_VERSION_MAJOR, minor))?;
        info!(minor, "database minor version stamped");
        Ok(())
    }

    /// Starts the atomic unit covering one block's ingestion and parse.
    pub fn block_transaction(&mut self) -> Result<rusqlite::Transaction<'_>, Error> {
        Ok(self.conn.transaction()?)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Ledger operations over a live connection; constructed either from a
/// [`Store`] directly or from the transaction covering a block.
pub struct Ledger<'a> {
    conn: &'a Connection,
}

impl<'a> Ledger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Ledger { conn }
    }

    pub fn conn(&self) -> &Connection {
        self.conn
    }

    // ------------------------------------------------------------------
    // balance primitives

    /// Current balance, zero when the row does not exist.
    pub fn balance(&self, address: &str, asset: &str) -> Result<i64, Error> {
        let amount = self
            .conn
            .query_row(
                "SELECT amount FROM balances WHERE address = ?1 AND asset = ?2",
                (address, asset),
                |row| row.get(0),
            )
            .optional()?;
        Ok(amount.unwrap_or(0))
    }

    /// Appends to `credits`, upserts `balances` and journals the action.
    pub fn credit(
        &self,
        block_index: u32,
        address: &str,
        asset: &str,
        amount: i64,
        calling_function: &str,
        event: &str,
    ) -> Result<(), Error> {
        debug_assert!(amount >= 0);

        let updated = self.conn.execute(
            "UPDATE balances SET amount = amount + ?1 WHERE address = ?2 AND asset = ?3",
            (amount, address, asset),
        )?;
        if updated == 0 {
            self.conn.execute(
                "INSERT INTO balances (address, asset, amount) VALUES (?1, ?2, ?3)",
                (address, asset, amount),
            )?;
        }

        self.conn.execute(
            "INSERT INTO credits (block_index, address, asset, amount, calling_function, event) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (block_index, address, asset, amount, calling_function, event),
        )?;

        self.journal(
            block_index,
            "insert",
            "credits",
            json!({
                "block_index": block_index,
                "address": address,
                "asset": asset,
                "amount": amount,
                "calling_function": calling_function,
                "event": event,
            }),
        )
    }

    /// Appends to `debits` after checking funds; the whole debit fails on a
    /// short balance.
    pub fn debit(
        &self,
        block_index: u32,
        address: &str,
        asset: &str,
        amount: i64,
        action: &str,
        event: &str,
    ) -> Result<(), Error> {
        debug_assert!(amount >= 0);

        let held = self.balance(address, asset)?;
        if held < amount {
            return Err(Error::Balance {
                address: address.to_owned(),
                asset: asset.to_owned(),
                amount,
            });
        }

        self.conn.execute(
            "UPDATE balances SET amount = amount - ?1 WHERE address = ?2 AND asset = ?3",
            (amount, address, asset),
        )?;

        self.conn.execute(
            "INSERT INTO debits (block_index, address, asset, amount, action, event) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (block_index, address, asset, amount, action, event),
        )?;

        self.journal(
            block_index,
            "insert",
            "debits",
            json!({
                "block_index": block_index,
                "address": address,
                "asset": asset,
                "amount": amount,
                "action": action,
                "event": event,
            }),
        )
    }

    /// Non-zero holders of an asset, address order.
    pub fn holders(&self, asset: &str) -> Result<Vec<(String, i64)>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT address, amount FROM balances \
             WHERE asset = ?1 AND amount > 0 ORDER BY address",
        )?;
        let rows = stmt
            .query_map([asset], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // message journal

    pub(crate) fn journal(
        &self,
        block_index: u32,
        command: &str,
        category: &str,
        bindings: serde_json::Value,
    ) -> Result<(), Error> {
        self.conn.execute(
            "INSERT INTO messages (block_index, command, category, bindings) \
             VALUES (?1, ?2, ?3, ?4)",
            (block_index, command, category, bindings.to_string()),
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // supply accounting

    /// XCP ever created by burns, minus XCP destroyed by fees.
    pub fn xcp_supply(&self) -> Result<i64, Error> {
        let earned: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(earned), 0) FROM burns WHERE validity = 'valid'",
            [],
            |row| row.get(0),
        )?;
        let destroyed: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM debits \
             WHERE action IN ('issuance fee', 'dividend fee')",
            [],
            |row| row.get(0),
        )?;
        Ok(earned - destroyed)
    }

    /// Total issued amount across valid issuances of an asset.
    pub fn asset_issued(&self, asset: &str) -> Result<i64, Error> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM issuances \
             WHERE validity = 'valid' AND asset = ?1",
            [asset],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn asset_names(&self) -> Result<Vec<String>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT asset FROM issuances WHERE validity = 'valid' ORDER BY asset ASC",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    pub fn element_counts(&self) -> Result<Vec<(String, i64)>, Error> {
        let mut counts = vec![];
        for table in schema::ALL_TABLES {
            let count: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
            counts.push((table.to_string(), count));
        }
        Ok(counts)
    }
}
