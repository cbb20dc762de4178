//! Fixture helpers shared by the scenario tests: an in-memory store, a
//! block builder, and payload constructors.

use scrip_ledger::{BlockRow, Ledger, Store, TransactionRow};
use scrip_messages::{assets, TYPE_ID_LENGTH, UNIT};
use scrip_protocol::{parse_block, ProtocolParams};

pub const BURN_START: u32 = 278_310;
pub const BURN_END: u32 = 283_810;
pub const SINK: &str = "1BurnSinkXXXXXXXXXXXXXXXXXXXXXXXXX";

pub fn params() -> ProtocolParams {
    ProtocolParams {
        unspendable: SINK.to_owned(),
        burn_start: BURN_START,
        burn_end: BURN_END,
    }
}

pub fn xcp(amount: i64) -> i64 {
    amount * UNIT
}

/// A payload as it sits in the `transactions` table: type id plus body,
/// prefix already stripped by the extractor.
pub fn payload(type_id: u32, body: &[u8]) -> Vec<u8> {
    let mut data = type_id.to_be_bytes().to_vec();
    data.extend_from_slice(body);
    debug_assert_eq!(data.len(), TYPE_ID_LENGTH + body.len());
    data
}

/// Accumulates transactions and applies them block by block, the way the
/// follower would.
pub struct Harness {
    pub store: Store,
    pub params: ProtocolParams,
    next_tx_index: i64,
}

impl Harness {
    pub fn new() -> Self {
        Harness {
            store: Store::open_in_memory().unwrap(),
            params: params(),
            next_tx_index: 0,
        }
    }

    pub fn ledger(&self) -> Ledger<'_> {
        Ledger::new(self.store.conn())
    }

    /// Applies one block containing the given protocol tuples, in order.
    /// Each tuple is `(source, destination, btc_amount, data)`.
    pub fn apply_block(
        &mut self,
        block_index: u32,
        block_time: u32,
        txs: &[(&str, Option<&str>, i64, Vec<u8>)],
    ) {
        let ledger = Ledger::new(self.store.conn());
        ledger
            .insert_block(&BlockRow {
                block_index,
                block_hash: format!("{block_index:064x}"),
                block_time,
            })
            .unwrap();

        for (source, destination, btc_amount, data) in txs {
            let tx_index = self.next_tx_index;
            self.next_tx_index += 1;
            ledger
                .insert_transaction(&TransactionRow {
                    tx_index,
                    tx_hash: format!("{tx_index:064x}"),
                    block_index,
                    block_time,
                    source: (*source).to_owned(),
                    destination: destination.map(|d| d.to_owned()),
                    btc_amount: *btc_amount,
                    fee: 10_000,
                    data: data.clone(),
                    supported: true,
                })
                .unwrap();
        }

        parse_block(&ledger, &self.params, block_index, block_time).unwrap();
    }

    /// Hash assigned to the n-th transaction fed through the harness.
    pub fn tx_hash(&self, tx_index: i64) -> String {
        format!("{tx_index:064x}")
    }

    pub fn balance(&self, address: &str, asset: &str) -> i64 {
        self.ledger().balance(address, asset).unwrap()
    }

    /// Funds an address with XCP through a real burn, keeping the supply
    /// invariants intact.
    pub fn fund_via_burn(&mut self, block_index: u32, address: &str, btc: i64) {
        self.apply_block(block_index, 1_390_000_000, &[(address, Some(SINK), btc, vec![])]);
    }

    /// Sum of XCP sitting in balances.
    pub fn xcp_in_balances(&self) -> i64 {
        self.store
            .conn()
            .query_row(
                "SELECT COALESCE(SUM(amount), 0) FROM balances WHERE asset = ?1",
                [assets::XCP],
                |row| row.get(0),
            )
            .unwrap()
    }
}

/// XCP held open in order escrow (give side of open XCP orders).
pub fn xcp_in_order_escrow(harness: &Harness) -> i64 {
    harness
        .store
        .conn()
        .query_row(
            "SELECT COALESCE(SUM(give_remaining), 0) FROM orders \
             WHERE validity = 'valid' AND give_asset = 'XCP'",
            [],
            |row| row.get(0),
        )
        .unwrap()
}

/// XCP escrowed in open bets and unsettled bet matches, plus pending order
/// match legs denominated in XCP.
pub fn xcp_in_bet_escrow(harness: &Harness) -> i64 {
    let conn = harness.store.conn();
    let bets: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(wager_remaining), 0) FROM bets WHERE validity = 'valid'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let matches: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(forward_amount + backward_amount), 0) FROM bet_matches \
             WHERE validity = 'valid'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let pending_orders: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(CASE WHEN forward_asset = 'XCP' THEN forward_amount \
             WHEN backward_asset = 'XCP' THEN backward_amount ELSE 0 END), 0) \
             FROM order_matches WHERE validity = 'pending'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    bets + matches + pending_orders
}
