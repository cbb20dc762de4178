//! Table and index creation, plus the derived-table reset used by reparse.

use rusqlite::Connection;

use crate::Error;

/// Every table in the store, in creation order.
pub const ALL_TABLES: &[&str] = &[
    "blocks",
    "transactions",
    "debits",
    "credits",
    "balances",
    "sends",
    "orders",
    "order_matches",
    "btcpays",
    "issuances",
    "broadcasts",
    "bets",
    "bet_matches",
    "dividends",
    "burns",
    "cancels",
    "callbacks",
    "order_expirations",
    "bet_expirations",
    "order_match_expirations",
    "bet_match_expirations",
    "messages",
];

/// Tables rebuilt from `blocks`/`transactions` by a reparse.
pub const DERIVED_TABLES: &[&str] = &[
    "debits",
    "credits",
    "balances",
    "sends",
    "orders",
    "order_matches",
    "btcpays",
    "issuances",
    "broadcasts",
    "bets",
    "bet_matches",
    "dividends",
    "burns",
    "cancels",
    "callbacks",
    "order_expirations",
    "bet_expirations",
    "order_match_expirations",
    "bet_match_expirations",
    "messages",
];

pub fn initialise(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS blocks(
            block_index INTEGER PRIMARY KEY,
            block_hash TEXT UNIQUE,
            block_time INTEGER);
        CREATE INDEX IF NOT EXISTS blocks_index_idx ON blocks (block_index);

        CREATE TABLE IF NOT EXISTS transactions(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            block_time INTEGER,
            source TEXT,
            destination TEXT,
            btc_amount INTEGER,
            fee INTEGER,
            data BLOB,
            supported BOOL DEFAULT 1);
        CREATE INDEX IF NOT EXISTS transactions_block_index_idx ON transactions (block_index);
        CREATE INDEX IF NOT EXISTS transactions_tx_hash_idx ON transactions (tx_hash);

        CREATE TABLE IF NOT EXISTS debits(
            block_index INTEGER,
            address TEXT,
            asset TEXT,
            amount INTEGER,
            action TEXT,
            event TEXT);
        CREATE INDEX IF NOT EXISTS debits_address_idx ON debits (address);

        CREATE TABLE IF NOT EXISTS credits(
            block_index INTEGER,
            address TEXT,
            asset TEXT,
            amount INTEGER,
            calling_function TEXT,
            event TEXT);
        CREATE INDEX IF NOT EXISTS credits_address_idx ON credits (address);

        CREATE TABLE IF NOT EXISTS balances(
            address TEXT,
            asset TEXT,
            amount INTEGER);
        CREATE INDEX IF NOT EXISTS balances_address_asset_idx ON balances (address, asset);

        CREATE TABLE IF NOT EXISTS sends(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            destination TEXT,
            asset TEXT,
            amount INTEGER,
            validity TEXT,
            FOREIGN KEY (tx_index) REFERENCES transactions(tx_index));
        CREATE INDEX IF NOT EXISTS sends_block_index_idx ON sends (block_index);

        CREATE TABLE IF NOT EXISTS orders(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            give_asset TEXT,
            give_amount INTEGER,
            give_remaining INTEGER,
            get_asset TEXT,
            get_amount INTEGER,
            get_remaining INTEGER,
            expiration INTEGER,
            expire_index INTEGER,
            fee_required INTEGER,
            fee_provided INTEGER,
            validity TEXT,
            FOREIGN KEY (tx_index) REFERENCES transactions(tx_index));
        CREATE INDEX IF NOT EXISTS orders_block_index_idx ON orders (block_index);
        CREATE INDEX IF NOT EXISTS orders_expire_idx ON orders (validity, expire_index);
        CREATE INDEX IF NOT EXISTS orders_give_get_valid_idx
            ON orders (give_asset, get_asset, validity);

        CREATE TABLE IF NOT EXISTS order_matches(
            id TEXT PRIMARY KEY,
            tx0_index INTEGER,
            tx0_hash TEXT,
            tx0_address TEXT,
            tx1_index INTEGER,
            tx1_hash TEXT,
            tx1_address TEXT,
            forward_asset TEXT,
            forward_amount INTEGER,
            backward_asset TEXT,
            backward_amount INTEGER,
            tx0_block_index INTEGER,
            tx1_block_index INTEGER,
            tx0_expiration INTEGER,
            tx1_expiration INTEGER,
            match_expire_index INTEGER,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS order_matches_expire_idx
            ON order_matches (validity, match_expire_index);

        CREATE TABLE IF NOT EXISTS btcpays(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            destination TEXT,
            btc_amount INTEGER,
            order_match_id TEXT,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS btcpays_block_index_idx ON btcpays (block_index);

        CREATE TABLE IF NOT EXISTS issuances(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            asset TEXT,
            amount INTEGER,
            divisible BOOL,
            issuer TEXT,
            transfer BOOL,
            callable BOOL,
            call_date INTEGER,
            call_price REAL,
            description TEXT,
            fee_paid INTEGER,
            locked BOOL,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS issuances_block_index_idx ON issuances (block_index);
        CREATE INDEX IF NOT EXISTS issuances_valid_asset_idx ON issuances (validity, asset);

        CREATE TABLE IF NOT EXISTS broadcasts(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            timestamp INTEGER,
            value REAL,
            fee_fraction_int INTEGER,
            text TEXT,
            locked BOOL,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS broadcasts_block_index_idx ON broadcasts (block_index);
        CREATE INDEX IF NOT EXISTS broadcasts_feed_valid_idx ON broadcasts (source, validity);

        CREATE TABLE IF NOT EXISTS bets(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            feed_address TEXT,
            bet_type INTEGER,
            deadline INTEGER,
            wager_amount INTEGER,
            wager_remaining INTEGER,
            counterwager_amount INTEGER,
            counterwager_remaining INTEGER,
            target_value REAL,
            leverage INTEGER,
            expiration INTEGER,
            expire_index INTEGER,
            fee_fraction_int INTEGER,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS bets_block_index_idx ON bets (block_index);
        CREATE INDEX IF NOT EXISTS bets_expire_idx ON bets (validity, expire_index);
        CREATE INDEX IF NOT EXISTS bets_feed_valid_bettype_idx
            ON bets (feed_address, validity, bet_type);

        CREATE TABLE IF NOT EXISTS bet_matches(
            id TEXT PRIMARY KEY,
            tx0_index INTEGER,
            tx0_hash TEXT,
            tx0_address TEXT,
            tx1_index INTEGER,
            tx1_hash TEXT,
            tx1_address TEXT,
            tx0_bet_type INTEGER,
            tx1_bet_type INTEGER,
            feed_address TEXT,
            initial_value REAL,
            deadline INTEGER,
            target_value REAL,
            leverage INTEGER,
            forward_amount INTEGER,
            backward_amount INTEGER,
            tx0_block_index INTEGER,
            tx1_block_index INTEGER,
            tx0_expiration INTEGER,
            tx1_expiration INTEGER,
            match_expire_index INTEGER,
            fee_fraction_int INTEGER,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS bet_matches_expire_idx
            ON bet_matches (validity, match_expire_index);
        CREATE INDEX IF NOT EXISTS bet_matches_valid_feed_idx
            ON bet_matches (validity, feed_address);

        CREATE TABLE IF NOT EXISTS dividends(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            asset TEXT,
            amount_per_unit INTEGER,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS dividends_block_index_idx ON dividends (block_index);

        CREATE TABLE IF NOT EXISTS burns(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            burned INTEGER,
            earned INTEGER,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS burns_validity_idx ON burns (validity);
        CREATE INDEX IF NOT EXISTS burns_source_idx ON burns (source);

        CREATE TABLE IF NOT EXISTS cancels(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            offer_hash TEXT,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS cancels_block_index_idx ON cancels (block_index);

        CREATE TABLE IF NOT EXISTS callbacks(
            tx_index INTEGER PRIMARY KEY,
            tx_hash TEXT UNIQUE,
            block_index INTEGER,
            source TEXT,
            fraction REAL,
            asset TEXT,
            validity TEXT);
        CREATE INDEX IF NOT EXISTS callbacks_block_index_idx ON callbacks (block_index);

        CREATE TABLE IF NOT EXISTS order_expirations(
            order_index INTEGER PRIMARY KEY,
            order_hash TEXT UNIQUE,
            source TEXT,
            block_index INTEGER);
        CREATE INDEX IF NOT EXISTS order_expirations_block_index_idx
            ON order_expirations (block_index);

        CREATE TABLE IF NOT EXISTS bet_expirations(
            bet_index INTEGER PRIMARY KEY,
            bet_hash TEXT UNIQUE,
            source TEXT,
            block_index INTEGER);
        CREATE INDEX IF NOT EXISTS bet_expirations_block_index_idx
            ON bet_expirations (block_index);

        CREATE TABLE IF NOT EXISTS order_match_expirations(
            order_match_id TEXT PRIMARY KEY,
            tx0_address TEXT,
            tx1_address TEXT,
            block_index INTEGER);
        CREATE INDEX IF NOT EXISTS order_match_expirations_block_index_idx
            ON order_match_expirations (block_index);

        CREATE TABLE IF NOT EXISTS bet_match_expirations(
            bet_match_id TEXT PRIMARY KEY,
            tx0_address TEXT,
            tx1_address TEXT,
            block_index INTEGER);
        CREATE INDEX IF NOT EXISTS bet_match_expirations_block_index_idx
            ON bet_match_expirations (block_index);

        CREATE TABLE IF NOT EXISTS messages(
            message_index INTEGER PRIMARY KEY,
            block_index INTEGER,
            command TEXT,
            category TEXT,
            bindings TEXT);
        CREATE INDEX IF NOT EXISTS messages_block_index_idx ON messages (block_index);
        ",
    )?;
    Ok(())
}

/// Drops everything a reparse rebuilds, keeping `blocks` and `transactions`.
pub fn drop_derived(conn: &Connection) -> Result<(), Error> {
    for table in DERIVED_TABLES {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))?;
    }
    Ok(())
}

/// Removes chain data from before the configured first block.
pub fn purge_before(conn: &Connection, block_first: u32) -> Result<(), Error> {
    conn.execute("DELETE FROM blocks WHERE block_index < ?1", [block_first])?;
    conn.execute(
        "DELETE FROM transactions WHERE block_index < ?1",
        [block_first],
    )?;
    Ok(())
}
