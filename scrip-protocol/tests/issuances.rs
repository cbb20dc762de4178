pub mod common;

use common::{xcp, Harness, BURN_START};
use scrip_messages::{
    callback::Callback,
    dividend::Dividend,
    issuance::Issuance,
    send::Send,
};
use scrip_protocol::issuance::ISSUANCE_FEE;

fn issue(asset: &str, amount: i64, divisible: bool) -> Vec<u8> {
    common::payload(
        scrip_messages::issuance::ID,
        &Issuance {
            asset: asset.into(),
            amount: amount as u64,
            divisible,
            callable: false,
            call_date: 0,
            call_price: 0.0,
            description: "test".into(),
        }
        .pack()
        .unwrap(),
    )
}

fn callable_issue(asset: &str, amount: i64, call_date: u32, call_price: f32) -> Vec<u8> {
    common::payload(
        scrip_messages::issuance::ID,
        &Issuance {
            asset: asset.into(),
            amount: amount as u64,
            divisible: true,
            callable: true,
            call_date,
            call_price,
            description: String::new(),
        }
        .pack()
        .unwrap(),
    )
}

#[test]
fn issuance_credits_units_and_destroys_the_fee() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    let before = harness.balance("alice", "XCP");

    harness.apply_block(BURN_START + 1, 1_390_000_060, &[("alice", None, 0, issue("BASE", xcp(100), true))]);

    assert_eq!(harness.balance("alice", "BASE"), xcp(100));
    assert_eq!(harness.balance("alice", "XCP"), before - ISSUANCE_FEE);

    let fee_paid: i64 = harness
        .store
        .conn()
        .query_row("SELECT fee_paid FROM issuances", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fee_paid, ISSUANCE_FEE);
}

#[test]
fn reissuance_by_a_stranger_is_refused() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.fund_via_burn(BURN_START + 1, "mallory", xcp(1));

    harness.apply_block(BURN_START + 2, 1_390_000_060, &[("alice", None, 0, issue("BASE", xcp(100), true))]);
    harness.apply_block(BURN_START + 3, 1_390_000_120, &[("mallory", None, 0, issue("BASE", xcp(100), true))]);

    let validity: String = harness
        .store
        .conn()
        .query_row(
            "SELECT validity FROM issuances WHERE tx_index = 3",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(validity.contains("belongs to another address"));
    assert_eq!(harness.balance("mallory", "BASE"), 0);
}

#[test]
fn zero_issuance_locks_the_asset() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));

    harness.apply_block(BURN_START + 1, 1_390_000_060, &[("alice", None, 0, issue("BASE", xcp(100), true))]);
    harness.apply_block(BURN_START + 2, 1_390_000_120, &[("alice", None, 0, issue("BASE", 0, true))]);
    harness.apply_block(BURN_START + 3, 1_390_000_180, &[("alice", None, 0, issue("BASE", xcp(1), true))]);

    let validity: String = harness
        .store
        .conn()
        .query_row(
            "SELECT validity FROM issuances WHERE tx_index = 3",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(validity.contains("locked asset"));
    assert_eq!(harness.balance("alice", "BASE"), xcp(100));
}

#[test]
fn ownership_transfer_moves_the_issuing_right() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.fund_via_burn(BURN_START + 1, "bob", xcp(1));

    harness.apply_block(BURN_START + 2, 1_390_000_060, &[("alice", None, 0, issue("BASE", xcp(100), true))]);
    // Transfer: zero amount, destination bob.
    harness.apply_block(BURN_START + 3, 1_390_000_120, &[("alice", Some("bob"), 5430, issue("BASE", 0, true))]);
    // Bob can now issue more; alice cannot.
    harness.apply_block(BURN_START + 4, 1_390_000_180, &[("bob", None, 0, issue("BASE", xcp(5), true))]);
    harness.apply_block(BURN_START + 5, 1_390_000_240, &[("alice", None, 0, issue("BASE", xcp(5), true))]);

    let bob_validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM issuances WHERE tx_index = 4", [], |r| r.get(0))
        .unwrap();
    let alice_validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM issuances WHERE tx_index = 5", [], |r| r.get(0))
        .unwrap();
    assert_eq!(bob_validity, "valid");
    assert!(alice_validity.contains("belongs to another address"));
}

#[test]
fn dividend_pays_holders_pro_rata() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.fund_via_burn(BURN_START + 1, "bob", xcp(1));

    harness.apply_block(BURN_START + 2, 1_390_000_060, &[("alice", None, 0, issue("BASE", xcp(100), true))]);

    // Spread 40 BASE to bob.
    let send = Send {
        asset: "BASE".into(),
        amount: xcp(40) as u64,
    };
    harness.apply_block(
        BURN_START + 3,
        1_390_000_120,
        &[("alice", Some("bob"), 5430, common::payload(scrip_messages::send::ID, &send.pack().unwrap()))],
    );

    let alice_before = harness.balance("alice", "XCP");
    let bob_before = harness.balance("bob", "XCP");

    // 0.1 XCP per BASE unit.
    let dividend = Dividend {
        amount_per_unit: (xcp(1) / 10) as u64,
        asset: "BASE".into(),
    };
    harness.apply_block(
        BURN_START + 4,
        1_390_000_180,
        &[("alice", None, 0, common::payload(scrip_messages::dividend::ID, &dividend.pack().unwrap()))],
    );

    // alice holds 60 BASE, bob 40: payouts 6 and 4 XCP; two recipients of
    // fee 0.0002 XCP each.
    let fee = 2 * scrip_protocol::dividend::FEE_PER_RECIPIENT;
    assert_eq!(
        harness.balance("alice", "XCP"),
        alice_before - xcp(10) - fee + xcp(6)
    );
    assert_eq!(harness.balance("bob", "XCP"), bob_before + xcp(4));
}

#[test]
fn callback_redeems_at_the_call_price() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.fund_via_burn(BURN_START + 1, "bob", xcp(1));

    // Callable from timestamp 1_390_000_150, at 2 XCP per whole unit.
    harness.apply_block(
        BURN_START + 2,
        1_390_000_060,
        &[("alice", None, 0, callable_issue("CALL", xcp(10), 1_390_000_150, 2.0))],
    );

    let send = Send {
        asset: "CALL".into(),
        amount: xcp(4) as u64,
    };
    harness.apply_block(
        BURN_START + 3,
        1_390_000_120,
        &[("alice", Some("bob"), 5430, common::payload(scrip_messages::send::ID, &send.pack().unwrap()))],
    );

    let alice_xcp = harness.balance("alice", "XCP");
    let bob_xcp = harness.balance("bob", "XCP");

    // Call back half of every outside position.
    let callback = Callback {
        fraction: 0.5,
        asset: "CALL".into(),
    };
    harness.apply_block(
        BURN_START + 4,
        1_390_000_180,
        &[("alice", None, 0, common::payload(scrip_messages::callback::ID, &callback.pack().unwrap()))],
    );

    // Bob forfeits 2 CALL and receives 4 XCP.
    assert_eq!(harness.balance("bob", "CALL"), xcp(2));
    assert_eq!(harness.balance("alice", "CALL"), xcp(6) + xcp(2));
    assert_eq!(harness.balance("bob", "XCP"), bob_xcp + xcp(4));
    assert_eq!(harness.balance("alice", "XCP"), alice_xcp - xcp(4));
}

#[test]
fn callback_before_the_call_date_is_refused() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));

    harness.apply_block(
        BURN_START + 1,
        1_390_000_060,
        &[("alice", None, 0, callable_issue("CALL", xcp(10), 1_500_000_000, 2.0))],
    );

    let callback = Callback {
        fraction: 0.5,
        asset: "CALL".into(),
    };
    harness.apply_block(
        BURN_START + 2,
        1_390_000_120,
        &[("alice", None, 0, common::payload(scrip_messages::callback::ID, &callback.pack().unwrap()))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM callbacks", [], |row| row.get(0))
        .unwrap();
    assert!(validity.contains("before the call date"));
}

#[test]
fn callback_on_a_plain_asset_is_refused() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.apply_block(BURN_START + 1, 1_390_000_060, &[("alice", None, 0, issue("BASE", xcp(10), true))]);

    let callback = Callback {
        fraction: 0.5,
        asset: "BASE".into(),
    };
    harness.apply_block(
        BURN_START + 2,
        1_390_000_120,
        &[("alice", None, 0, common::payload(scrip_messages::callback::ID, &callback.pack().unwrap()))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM callbacks", [], |row| row.get(0))
        .unwrap();
    assert!(validity.contains("not callable"));
}
