//! Typed rows and the insert/lookup/update surface the parsers drive.
//!
//! Every insert or update of derived state journals itself into `messages`;
//! `blocks` and `transactions` are chain data, not derived state, and are
//! not journalled.

use rusqlite::{OptionalExtension, Row};
use serde::Serialize;
use serde_json::json;

use crate::{Error, Ledger};

#[derive(Debug, Clone, Serialize)]
pub struct BlockRow {
    pub block_index: u32,
    pub block_hash: String,
    pub block_time: u32,
}

#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub block_time: u32,
    pub source: String,
    pub destination: Option<String>,
    pub btc_amount: i64,
    pub fee: i64,
    pub data: Vec<u8>,
    pub supported: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub destination: Option<String>,
    pub asset: String,
    pub amount: i64,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub give_asset: String,
    pub give_amount: i64,
    pub give_remaining: i64,
    pub get_asset: String,
    pub get_amount: i64,
    pub get_remaining: i64,
    pub expiration: i64,
    pub expire_index: i64,
    pub fee_required: i64,
    pub fee_provided: i64,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderMatchRow {
    pub id: String,
    pub tx0_index: i64,
    pub tx0_hash: String,
    pub tx0_address: String,
    pub tx1_index: i64,
    pub tx1_hash: String,
    pub tx1_address: String,
    pub forward_asset: String,
    pub forward_amount: i64,
    pub backward_asset: String,
    pub backward_amount: i64,
    pub tx0_block_index: u32,
    pub tx1_block_index: u32,
    pub tx0_expiration: i64,
    pub tx1_expiration: i64,
    pub match_expire_index: i64,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BtcPayRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub destination: Option<String>,
    pub btc_amount: i64,
    pub order_match_id: String,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuanceRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub asset: String,
    pub amount: i64,
    pub divisible: bool,
    pub issuer: String,
    pub transfer: bool,
    pub callable: bool,
    pub call_date: i64,
    pub call_price: f64,
    pub description: String,
    pub fee_paid: i64,
    pub locked: bool,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub timestamp: Option<i64>,
    pub value: Option<f64>,
    pub fee_fraction_int: Option<i64>,
    pub text: Option<String>,
    pub locked: bool,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BetRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub feed_address: String,
    pub bet_type: i64,
    pub deadline: i64,
    pub wager_amount: i64,
    pub wager_remaining: i64,
    pub counterwager_amount: i64,
    pub counterwager_remaining: i64,
    pub target_value: f64,
    pub leverage: i64,
    pub expiration: i64,
    pub expire_index: i64,
    pub fee_fraction_int: i64,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BetMatchRow {
    pub id: String,
    pub tx0_index: i64,
    pub tx0_hash: String,
    pub tx0_address: String,
    pub tx1_index: i64,
    pub tx1_hash: String,
    pub tx1_address: String,
    pub tx0_bet_type: i64,
    pub tx1_bet_type: i64,
    pub feed_address: String,
    pub initial_value: f64,
    pub deadline: i64,
    pub target_value: f64,
    pub leverage: i64,
    pub forward_amount: i64,
    pub backward_amount: i64,
    pub tx0_block_index: u32,
    pub tx1_block_index: u32,
    pub tx0_expiration: i64,
    pub tx1_expiration: i64,
    pub match_expire_index: i64,
    pub fee_fraction_int: i64,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DividendRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub asset: String,
    pub amount_per_unit: i64,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BurnRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub burned: i64,
    pub earned: i64,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub offer_hash: String,
    pub validity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallbackRow {
    pub tx_index: i64,
    pub tx_hash: String,
    pub block_index: u32,
    pub source: String,
    pub fraction: f64,
    pub asset: String,
    pub validity: String,
}

impl BlockRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BlockRow {
            block_index: row.get("block_index")?,
            block_hash: row.get("block_hash")?,
            block_time: row.get("block_time")?,
        })
    }
}

impl TransactionRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TransactionRow {
            tx_index: row.get("tx_index")?,
            tx_hash: row.get("tx_hash")?,
            block_index: row.get("block_index")?,
            block_time: row.get("block_time")?,
            source: row.get("source")?,
            destination: row.get("destination")?,
            btc_amount: row.get("btc_amount")?,
            fee: row.get("fee")?,
            data: row.get("data")?,
            supported: row.get("supported")?,
        })
    }
}

impl OrderRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderRow {
            tx_index: row.get("tx_index")?,
            tx_hash: row.get("tx_hash")?,
            block_index: row.get("block_index")?,
            source: row.get("source")?,
            give_asset: row.get("give_asset")?,
            give_amount: row.get("give_amount")?,
            give_remaining: row.get("give_remaining")?,
            get_asset: row.get("get_asset")?,
            get_amount: row.get("get_amount")?,
            get_remaining: row.get("get_remaining")?,
            expiration: row.get("expiration")?,
            expire_index: row.get("expire_index")?,
            fee_required: row.get("fee_required")?,
            fee_provided: row.get("fee_provided")?,
            validity: row.get("validity")?,
        })
    }
}

impl OrderMatchRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(OrderMatchRow {
            id: row.get("id")?,
            tx0_index: row.get("tx0_index")?,
            tx0_hash: row.get("tx0_hash")?,
            tx0_address: row.get("tx0_address")?,
            tx1_index: row.get("tx1_index")?,
            tx1_hash: row.get("tx1_hash")?,
            tx1_address: row.get("tx1_address")?,
            forward_asset: row.get("forward_asset")?,
            forward_amount: row.get("forward_amount")?,
            backward_asset: row.get("backward_asset")?,
            backward_amount: row.get("backward_amount")?,
            tx0_block_index: row.get("tx0_block_index")?,
            tx1_block_index: row.get("tx1_block_index")?,
            tx0_expiration: row.get("tx0_expiration")?,
            tx1_expiration: row.get("tx1_expiration")?,
            match_expire_index: row.get("match_expire_index")?,
            validity: row.get("validity")?,
        })
    }
}

impl IssuanceRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(IssuanceRow {
            tx_index: row.get("tx_index")?,
            tx_hash: row.get("tx_hash")?,
            block_index: row.get("block_index")?,
            asset: row.get("asset")?,
            amount: row.get("amount")?,
            divisible: row.get("divisible")?,
            issuer: row.get("issuer")?,
            transfer: row.get("transfer")?,
            callable: row.get("callable")?,
            call_date: row.get("call_date")?,
            call_price: row.get("call_price")?,
            description: row.get("description")?,
            fee_paid: row.get("fee_paid")?,
            locked: row.get("locked")?,
            validity: row.get("validity")?,
        })
    }
}

impl BroadcastRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BroadcastRow {
            tx_index: row.get("tx_index")?,
            tx_hash: row.get("tx_hash")?,
            block_index: row.get("block_index")?,
            source: row.get("source")?,
            timestamp: row.get("timestamp")?,
            value: row.get("value")?,
            fee_fraction_int: row.get("fee_fraction_int")?,
            text: row.get("text")?,
            locked: row.get("locked")?,
            validity: row.get("validity")?,
        })
    }
}

impl BetRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BetRow {
            tx_index: row.get("tx_index")?,
            tx_hash: row.get("tx_hash")?,
            block_index: row.get("block_index")?,
            source: row.get("source")?,
            feed_address: row.get("feed_address")?,
            bet_type: row.get("bet_type")?,
            deadline: row.get("deadline")?,
            wager_amount: row.get("wager_amount")?,
            wager_remaining: row.get("wager_remaining")?,
            counterwager_amount: row.get("counterwager_amount")?,
            counterwager_remaining: row.get("counterwager_remaining")?,
            target_value: row.get("target_value")?,
            leverage: row.get("leverage")?,
            expiration: row.get("expiration")?,
            expire_index: row.get("expire_index")?,
            fee_fraction_int: row.get("fee_fraction_int")?,
            validity: row.get("validity")?,
        })
    }
}

impl BetMatchRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(BetMatchRow {
            id: row.get("id")?,
            tx0_index: row.get("tx0_index")?,
            tx0_hash: row.get("tx0_hash")?,
            tx0_address: row.get("tx0_address")?,
            tx1_index: row.get("tx1_index")?,
            tx1_hash: row.get("tx1_hash")?,
            tx1_address: row.get("tx1_address")?,
            tx0_bet_type: row.get("tx0_bet_type")?,
            tx1_bet_type: row.get("tx1_bet_type")?,
            feed_address: row.get("feed_address")?,
            initial_value: row.get("initial_value")?,
            deadline: row.get("deadline")?,
            target_value: row.get("target_value")?,
            leverage: row.get("leverage")?,
            forward_amount: row.get("forward_amount")?,
            backward_amount: row.get("backward_amount")?,
            tx0_block_index: row.get("tx0_block_index")?,
            tx1_block_index: row.get("tx1_block_index")?,
            tx0_expiration: row.get("tx0_expiration")?,
            tx1_expiration: row.get("tx1_expiration")?,
            match_expire_index: row.get("match_expire_index")?,
            fee_fraction_int: row.get("fee_fraction_int")?,
            validity: row.get("validity")?,
        })
    }
}

fn bindings_of<T: Serialize>(row: &T) -> serde_json::Value {
    serde_json::to_value(row).unwrap_or_default()
}

impl Ledger<'_> {
    // ------------------------------------------------------------------
    // chain data

    pub fn insert_block(&self, block: &BlockRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO blocks (block_index, block_hash, block_time) VALUES (?1, ?2, ?3)",
            (block.block_index, &block.block_hash, block.block_time),
        )?;
        Ok(())
    }

    pub fn last_block(&self) -> Result<Option<BlockRow>, Error> {
        let row = self
            .conn()
            .query_row(
                "SELECT * FROM blocks ORDER BY block_index DESC LIMIT 1",
                [],
                BlockRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn block_at(&self, block_index: u32) -> Result<Option<BlockRow>, Error> {
        let row = self
            .conn()
            .query_row(
                "SELECT * FROM blocks WHERE block_index = ?1",
                [block_index],
                BlockRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn all_blocks(&self) -> Result<Vec<BlockRow>, Error> {
        let mut stmt = self
            .conn()
            .prepare("SELECT * FROM blocks ORDER BY block_index ASC")?;
        let rows = stmt
            .query_map([], BlockRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Removes blocks and transactions above the given height (rollback).
    pub fn delete_above(&self, block_index: u32) -> Result<(), Error> {
        self.conn()
            .execute("DELETE FROM blocks WHERE block_index > ?1", [block_index])?;
        self.conn().execute(
            "DELETE FROM transactions WHERE block_index > ?1",
            [block_index],
        )?;
        Ok(())
    }

    pub fn has_transaction(&self, tx_hash: &str) -> Result<bool, Error> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM transactions WHERE tx_hash = ?1",
                [tx_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn next_tx_index(&self) -> Result<i64, Error> {
        let max: Option<i64> = self
            .conn()
            .query_row("SELECT MAX(tx_index) FROM transactions", [], |row| {
                row.get(0)
            })?;
        Ok(max.map(|m| m + 1).unwrap_or(0))
    }

    pub fn insert_transaction(&self, tx: &TransactionRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO transactions (tx_index, tx_hash, block_index, block_time, source, \
             destination, btc_amount, fee, data, supported) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            (
                tx.tx_index,
                &tx.tx_hash,
                tx.block_index,
                tx.block_time,
                &tx.source,
                &tx.destination,
                tx.btc_amount,
                tx.fee,
                &tx.data,
                tx.supported,
            ),
        )?;
        Ok(())
    }

    pub fn transactions_in_block(&self, block_index: u32) -> Result<Vec<TransactionRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM transactions WHERE block_index = ?1 ORDER BY tx_index ASC",
        )?;
        let rows = stmt
            .query_map([block_index], TransactionRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_tx_unsupported(&self, tx_hash: &str) -> Result<(), Error> {
        self.conn().execute(
            "UPDATE transactions SET supported = 0 WHERE tx_hash = ?1",
            [tx_hash],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // typed rows

    pub fn insert_send(&self, row: &SendRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO sends (tx_index, tx_hash, block_index, source, destination, asset, \
             amount, validity) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                &row.destination,
                &row.asset,
                row.amount,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "sends", bindings_of(row))
    }

    pub fn insert_order(&self, row: &OrderRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO orders (tx_index, tx_hash, block_index, source, give_asset, \
             give_amount, give_remaining, get_asset, get_amount, get_remaining, expiration, \
             expire_index, fee_required, fee_provided, validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                &row.give_asset,
                row.give_amount,
                row.give_remaining,
                &row.get_asset,
                row.get_amount,
                row.get_remaining,
                row.expiration,
                row.expire_index,
                row.fee_required,
                row.fee_provided,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "orders", bindings_of(row))
    }

    pub fn insert_order_match(&self, row: &OrderMatchRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO order_matches (id, tx0_index, tx0_hash, tx0_address, tx1_index, \
             tx1_hash, tx1_address, forward_asset, forward_amount, backward_asset, \
             backward_amount, tx0_block_index, tx1_block_index, tx0_expiration, \
             tx1_expiration, match_expire_index, validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            rusqlite::params![
                &row.id,
                row.tx0_index,
                &row.tx0_hash,
                &row.tx0_address,
                row.tx1_index,
                &row.tx1_hash,
                &row.tx1_address,
                &row.forward_asset,
                row.forward_amount,
                &row.backward_asset,
                row.backward_amount,
                row.tx0_block_index,
                row.tx1_block_index,
                row.tx0_expiration,
                row.tx1_expiration,
                row.match_expire_index,
                &row.validity,
            ],
        )?;
        self.journal(row.tx1_block_index, "insert", "order_matches", bindings_of(row))
    }

    pub fn insert_btcpay(&self, row: &BtcPayRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO btcpays (tx_index, tx_hash, block_index, source, destination, \
             btc_amount, order_match_id, validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                &row.destination,
                row.btc_amount,
                &row.order_match_id,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "btcpays", bindings_of(row))
    }

    pub fn insert_issuance(&self, row: &IssuanceRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO issuances (tx_index, tx_hash, block_index, asset, amount, divisible, \
             issuer, transfer, callable, call_date, call_price, description, fee_paid, locked, \
             validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.asset,
                row.amount,
                row.divisible,
                &row.issuer,
                row.transfer,
                row.callable,
                row.call_date,
                row.call_price,
                &row.description,
                row.fee_paid,
                row.locked,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "issuances", bindings_of(row))
    }

    pub fn insert_broadcast(&self, row: &BroadcastRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO broadcasts (tx_index, tx_hash, block_index, source, timestamp, value, \
             fee_fraction_int, text, locked, validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                row.timestamp,
                row.value,
                row.fee_fraction_int,
                &row.text,
                row.locked,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "broadcasts", bindings_of(row))
    }

    pub fn insert_bet(&self, row: &BetRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO bets (tx_index, tx_hash, block_index, source, feed_address, bet_type, \
             deadline, wager_amount, wager_remaining, counterwager_amount, \
             counterwager_remaining, target_value, leverage, expiration, expire_index, \
             fee_fraction_int, validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            rusqlite::params![
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                &row.feed_address,
                row.bet_type,
                row.deadline,
                row.wager_amount,
                row.wager_remaining,
                row.counterwager_amount,
                row.counterwager_remaining,
                row.target_value,
                row.leverage,
                row.expiration,
                row.expire_index,
                row.fee_fraction_int,
                &row.validity,
            ],
        )?;
        self.journal(row.block_index, "insert", "bets", bindings_of(row))
    }

    pub fn insert_bet_match(&self, row: &BetMatchRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO bet_matches (id, tx0_index, tx0_hash, tx0_address, tx1_index, \
             tx1_hash, tx1_address, tx0_bet_type, tx1_bet_type, feed_address, initial_value, \
             deadline, target_value, leverage, forward_amount, backward_amount, \
             tx0_block_index, tx1_block_index, tx0_expiration, tx1_expiration, \
             match_expire_index, fee_fraction_int, validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
            rusqlite::params![
                &row.id,
                row.tx0_index,
                &row.tx0_hash,
                &row.tx0_address,
                row.tx1_index,
                &row.tx1_hash,
                &row.tx1_address,
                row.tx0_bet_type,
                row.tx1_bet_type,
                &row.feed_address,
                row.initial_value,
                row.deadline,
                row.target_value,
                row.leverage,
                row.forward_amount,
                row.backward_amount,
                row.tx0_block_index,
                row.tx1_block_index,
                row.tx0_expiration,
                row.tx1_expiration,
                row.match_expire_index,
                row.fee_fraction_int,
                &row.validity,
            ],
        )?;
        self.journal(row.tx1_block_index, "insert", "bet_matches", bindings_of(row))
    }

    pub fn insert_dividend(&self, row: &DividendRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO dividends (tx_index, tx_hash, block_index, source, asset, \
             amount_per_unit, validity) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                &row.asset,
                row.amount_per_unit,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "dividends", bindings_of(row))
    }

    pub fn insert_burn(&self, row: &BurnRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO burns (tx_index, tx_hash, block_index, source, burned, earned, \
             validity) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                row.burned,
                row.earned,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "burns", bindings_of(row))
    }

    pub fn insert_cancel(&self, row: &CancelRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO cancels (tx_index, tx_hash, block_index, source, offer_hash, validity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                &row.offer_hash,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "cancels", bindings_of(row))
    }

    pub fn insert_callback(&self, row: &CallbackRow) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO callbacks (tx_index, tx_hash, block_index, source, fraction, asset, \
             validity) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                row.tx_index,
                &row.tx_hash,
                row.block_index,
                &row.source,
                row.fraction,
                &row.asset,
                &row.validity,
            ),
        )?;
        self.journal(row.block_index, "insert", "callbacks", bindings_of(row))
    }

    // ------------------------------------------------------------------
    // expirations

    pub fn insert_order_expiration(
        &self,
        order: &OrderRow,
        block_index: u32,
    ) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO order_expirations (order_index, order_hash, source, block_index) \
             VALUES (?1, ?2, ?3, ?4)",
            (order.tx_index, &order.tx_hash, &order.source, block_index),
        )?;
        self.journal(
            block_index,
            "insert",
            "order_expirations",
            json!({
                "order_index": order.tx_index,
                "order_hash": order.tx_hash,
                "source": order.source,
                "block_index": block_index,
            }),
        )
    }

    pub fn insert_bet_expiration(&self, bet: &BetRow, block_index: u32) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO bet_expirations (bet_index, bet_hash, source, block_index) \
             VALUES (?1, ?2, ?3, ?4)",
            (bet.tx_index, &bet.tx_hash, &bet.source, block_index),
        )?;
        self.journal(
            block_index,
            "insert",
            "bet_expirations",
            json!({
                "bet_index": bet.tx_index,
                "bet_hash": bet.tx_hash,
                "source": bet.source,
                "block_index": block_index,
            }),
        )
    }

    pub fn insert_order_match_expiration(
        &self,
        order_match: &OrderMatchRow,
        block_index: u32,
    ) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO order_match_expirations (order_match_id, tx0_address, tx1_address, \
             block_index) VALUES (?1, ?2, ?3, ?4)",
            (
                &order_match.id,
                &order_match.tx0_address,
                &order_match.tx1_address,
                block_index,
            ),
        )?;
        self.journal(
            block_index,
            "insert",
            "order_match_expirations",
            json!({
                "order_match_id": order_match.id,
                "tx0_address": order_match.tx0_address,
                "tx1_address": order_match.tx1_address,
                "block_index": block_index,
            }),
        )
    }

    pub fn insert_bet_match_expiration(
        &self,
        bet_match: &BetMatchRow,
        block_index: u32,
    ) -> Result<(), Error> {
        self.conn().execute(
            "INSERT INTO bet_match_expirations (bet_match_id, tx0_address, tx1_address, \
             block_index) VALUES (?1, ?2, ?3, ?4)",
            (
                &bet_match.id,
                &bet_match.tx0_address,
                &bet_match.tx1_address,
                block_index,
            ),
        )?;
        self.journal(
            block_index,
            "insert",
            "bet_match_expirations",
            json!({
                "bet_match_id": bet_match.id,
                "tx0_address": bet_match.tx0_address,
                "tx1_address": bet_match.tx1_address,
                "block_index": block_index,
            }),
        )
    }

    // ------------------------------------------------------------------
    // order book

    /// Open orders on the given pair, oldest first (strict FIFO).
    pub fn open_orders(&self, give_asset: &str, get_asset: &str) -> Result<Vec<OrderRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM orders WHERE give_asset = ?1 AND get_asset = ?2 \
             AND validity = 'valid' ORDER BY tx_index ASC",
        )?;
        let rows = stmt
            .query_map((give_asset, get_asset), OrderRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn order_by_hash(&self, tx_hash: &str) -> Result<Option<OrderRow>, Error> {
        let row = self
            .conn()
            .query_row(
                "SELECT * FROM orders WHERE tx_hash = ?1",
                [tx_hash],
                OrderRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn update_order_remaining(
        &self,
        block_index: u32,
        tx_index: i64,
        give_remaining: i64,
        get_remaining: i64,
    ) -> Result<(), Error> {
        self.conn().execute(
            "UPDATE orders SET give_remaining = ?1, get_remaining = ?2 WHERE tx_index = ?3",
            (give_remaining, get_remaining, tx_index),
        )?;
        self.journal(
            block_index,
            "update",
            "orders",
            json!({
                "tx_index": tx_index,
                "give_remaining": give_remaining,
                "get_remaining": get_remaining,
            }),
        )
    }

    pub fn set_order_validity(
        &self,
        block_index: u32,
        tx_index: i64,
        validity: &str,
    ) -> Result<(), Error> {
        self.conn().execute(
            "UPDATE orders SET validity = ?1 WHERE tx_index = ?2",
            (validity, tx_index),
        )?;
        self.journal(
            block_index,
            "update",
            "orders",
            json!({ "tx_index": tx_index, "validity": validity }),
        )
    }

    /// Valid orders whose expiry height has arrived.
    pub fn orders_expiring(&self, block_index: u32) -> Result<Vec<OrderRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM orders WHERE validity = 'valid' AND expire_index <= ?1 \
             ORDER BY tx_index ASC",
        )?;
        let rows = stmt
            .query_map([block_index], OrderRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn order_match(&self, id: &str) -> Result<Option<OrderMatchRow>, Error> {
        let row = self
            .conn()
            .query_row(
                "SELECT * FROM order_matches WHERE id = ?1",
                [id],
                OrderMatchRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn pending_order_matches_expiring(
        &self,
        block_index: u32,
    ) -> Result<Vec<OrderMatchRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM order_matches WHERE validity = 'pending' \
             AND match_expire_index <= ?1 ORDER BY tx1_index ASC",
        )?;
        let rows = stmt
            .query_map([block_index], OrderMatchRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_order_match_validity(
        &self,
        block_index: u32,
        id: &str,
        validity: &str,
    ) -> Result<(), Error> {
        self.conn().execute(
            "UPDATE order_matches SET validity = ?1 WHERE id = ?2",
            (validity, id),
        )?;
        self.journal(
            block_index,
            "update",
            "order_matches",
            json!({ "id": id, "validity": validity }),
        )
    }

    // ------------------------------------------------------------------
    // bets

    /// Open bets of one type on a feed, oldest first.
    pub fn open_bets(&self, feed_address: &str, bet_type: i64) -> Result<Vec<BetRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM bets WHERE feed_address = ?1 AND bet_type = ?2 \
             AND validity = 'valid' ORDER BY tx_index ASC",
        )?;
        let rows = stmt
            .query_map((feed_address, bet_type), BetRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn bet_by_hash(&self, tx_hash: &str) -> Result<Option<BetRow>, Error> {
        let row = self
            .conn()
            .query_row(
                "SELECT * FROM bets WHERE tx_hash = ?1",
                [tx_hash],
                BetRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn update_bet_remaining(
        &self,
        block_index: u32,
        tx_index: i64,
        wager_remaining: i64,
        counterwager_remaining: i64,
    ) -> Result<(), Error> {
        self.conn().execute(
            "UPDATE bets SET wager_remaining = ?1, counterwager_remaining = ?2 \
             WHERE tx_index = ?3",
            (wager_remaining, counterwager_remaining, tx_index),
        )?;
        self.journal(
            block_index,
            "update",
            "bets",
            json!({
                "tx_index": tx_index,
                "wager_remaining": wager_remaining,
                "counterwager_remaining": counterwager_remaining,
            }),
        )
    }

    pub fn set_bet_validity(
        &self,
        block_index: u32,
        tx_index: i64,
        validity: &str,
    ) -> Result<(), Error> {
        self.conn().execute(
            "UPDATE bets SET validity = ?1 WHERE tx_index = ?2",
            (validity, tx_index),
        )?;
        self.journal(
            block_index,
            "update",
            "bets",
            json!({ "tx_index": tx_index, "validity": validity }),
        )
    }

    pub fn bets_expiring(&self, block_index: u32) -> Result<Vec<BetRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM bets WHERE validity = 'valid' AND expire_index <= ?1 \
             ORDER BY tx_index ASC",
        )?;
        let rows = stmt
            .query_map([block_index], BetRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn bet_matches_expiring(&self, block_index: u32) -> Result<Vec<BetMatchRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM bet_matches WHERE validity = 'valid' \
             AND match_expire_index <= ?1 ORDER BY tx1_index ASC",
        )?;
        let rows = stmt
            .query_map([block_index], BetMatchRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Open bet matches settling against a feed, in deterministic
    /// `(tx1_index, tx0_index)` order.
    pub fn bet_matches_on_feed(&self, feed_address: &str) -> Result<Vec<BetMatchRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM bet_matches WHERE validity = 'valid' AND feed_address = ?1 \
             ORDER BY tx1_index ASC, tx0_index ASC",
        )?;
        let rows = stmt
            .query_map([feed_address], BetMatchRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn set_bet_match_validity(
        &self,
        block_index: u32,
        id: &str,
        validity: &str,
    ) -> Result<(), Error> {
        self.conn().execute(
            "UPDATE bet_matches SET validity = ?1 WHERE id = ?2",
            (validity, id),
        )?;
        self.journal(
            block_index,
            "update",
            "bet_matches",
            json!({ "id": id, "validity": validity }),
        )
    }

    // ------------------------------------------------------------------
    // feeds, issuances, burns

    pub fn last_valid_broadcast(&self, source: &str) -> Result<Option<BroadcastRow>, Error> {
        let row = self
            .conn()
            .query_row(
                "SELECT * FROM broadcasts WHERE source = ?1 AND validity = 'valid' \
                 ORDER BY tx_index DESC LIMIT 1",
                [source],
                BroadcastRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Valid issuances of an asset, oldest first.
    pub fn valid_issuances(&self, asset: &str) -> Result<Vec<IssuanceRow>, Error> {
        let mut stmt = self.conn().prepare(
            "SELECT * FROM issuances WHERE validity = 'valid' AND asset = ?1 \
             ORDER BY tx_index ASC",
        )?;
        let rows = stmt
            .query_map([asset], IssuanceRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Total BTC an address has burned so far.
    pub fn burned_by(&self, source: &str) -> Result<i64, Error> {
        let total: i64 = self.conn().query_row(
            "SELECT COALESCE(SUM(burned), 0) FROM burns \
             WHERE validity = 'valid' AND source = ?1",
            [source],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
