pub mod common;

use common::{xcp, Harness, BURN_START, SINK};
use scrip_ledger::Ledger;
use scrip_messages::{assets, send::Send};

fn send_payload(asset: &str, amount: u64) -> Vec<u8> {
    common::payload(
        scrip_messages::send::ID,
        &Send {
            asset: asset.into(),
            amount,
        }
        .pack()
        .unwrap(),
    )
}

#[test]
fn burn_earns_on_the_published_schedule() {
    let mut harness = Harness::new();
    harness.apply_block(278_320, 1_390_000_000, &[("alice", Some(SINK), xcp(1), vec![])]);

    let conn = harness.store.conn();
    let (burned, earned, validity): (i64, i64, String) = conn
        .query_row(
            "SELECT burned, earned, validity FROM burns WHERE tx_index = 0",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();

    assert_eq!(validity, "valid");
    assert_eq!(burned, 100_000_000);
    // 1 BTC at block 278320: multiplier (1000·5500 + 500·5490)/5500
    assert_eq!(earned, 149_909_090_909);
    assert_eq!(harness.balance("alice", assets::XCP), earned);

    let credits: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM credits WHERE address = 'alice' AND asset = 'XCP'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(credits, 1);
}

#[test]
fn burn_cap_is_one_btc_per_address() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));

    // A second burn from the same address earns nothing.
    harness.apply_block(
        BURN_START + 1,
        1_390_000_060,
        &[("alice", Some(SINK), xcp(1), vec![])],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM burns WHERE tx_index = 1", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(validity, "invalid: maximum burn reached");
}

#[test]
fn burn_outside_window_is_invalid() {
    let mut harness = Harness::new();
    harness.apply_block(100, 1_390_000_000, &[("alice", Some(SINK), xcp(1), vec![])]);

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM burns WHERE tx_index = 0", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(validity, "invalid: not in burn period");
    assert_eq!(harness.balance("alice", assets::XCP), 0);
}

#[test]
fn valid_send_moves_the_balance() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    let funded = harness.balance("alice", assets::XCP);

    harness.apply_block(
        BURN_START + 1,
        1_390_000_060,
        &[("alice", Some("bob"), 5430, send_payload("XCP", xcp(30) as u64))],
    );

    assert_eq!(harness.balance("alice", assets::XCP), funded - xcp(30));
    assert_eq!(harness.balance("bob", assets::XCP), xcp(30));

    let conn = harness.store.conn();
    let debits: i64 = conn
        .query_row("SELECT COUNT(*) FROM debits WHERE address = 'alice'", [], |r| r.get(0))
        .unwrap();
    let credits: i64 = conn
        .query_row("SELECT COUNT(*) FROM credits WHERE address = 'bob'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(debits, 1);
    assert_eq!(credits, 1);
}

#[test]
fn overdrawn_send_is_recorded_invalid_and_moves_nothing() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    let funded = harness.balance("alice", assets::XCP);

    harness.apply_block(
        BURN_START + 1,
        1_390_000_060,
        &[("alice", Some("bob"), 5430, send_payload("XCP", u64::MAX / 2))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM sends WHERE tx_index = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "invalid: insufficient funds");
    assert_eq!(harness.balance("alice", assets::XCP), funded);
    assert_eq!(harness.balance("bob", assets::XCP), 0);
}

#[test]
fn send_of_btc_is_invalid() {
    let mut harness = Harness::new();
    harness.apply_block(
        100,
        1_390_000_000,
        &[("alice", Some("bob"), 5430, send_payload("BTC", 1))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM sends WHERE tx_index = 0", [], |row| row.get(0))
        .unwrap();
    assert!(validity.contains("cannot send bitcoins"));
}

#[test]
fn truncated_send_is_recorded_as_unparseable() {
    let mut harness = Harness::new();
    harness.apply_block(
        100,
        1_390_000_000,
        &[("alice", Some("bob"), 5430, common::payload(scrip_messages::send::ID, &[1, 2, 3]))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM sends WHERE tx_index = 0", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "invalid: could not unpack");
}

#[test]
fn unknown_type_id_marks_transaction_unsupported() {
    let mut harness = Harness::new();
    harness.apply_block(
        100,
        1_390_000_000,
        &[("alice", None, 0, common::payload(999, &[0u8; 8]))],
    );

    let supported: bool = harness
        .store
        .conn()
        .query_row(
            "SELECT supported FROM transactions WHERE tx_index = 0",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(!supported);
}

#[test]
fn xcp_supply_tracks_burns() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.fund_via_burn(BURN_START + 1, "bob", xcp(1) / 2);

    let ledger = Ledger::new(harness.store.conn());
    assert_eq!(ledger.xcp_supply().unwrap(), harness.xcp_in_balances());
}
