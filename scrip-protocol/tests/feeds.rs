pub mod common;

use common::{xcp, Harness, BURN_START};
use scrip_messages::{
    bet::{Bet, BetType, LEVERAGE_UNIT},
    broadcast::Broadcast,
};

fn broadcast_payload(timestamp: u32, value: f64, fee_fraction_int: u32, text: &str) -> Vec<u8> {
    common::payload(
        scrip_messages::broadcast::ID,
        &Broadcast {
            timestamp,
            value,
            fee_fraction_int,
            text: text.into(),
        }
        .pack()
        .unwrap(),
    )
}

fn bet_payload(
    bet_type: BetType,
    deadline: u32,
    wager: i64,
    counterwager: i64,
    target_value: f64,
) -> Vec<u8> {
    common::payload(
        scrip_messages::bet::ID,
        &Bet {
            bet_type: bet_type.id(),
            deadline,
            wager_amount: wager as u64,
            counterwager_amount: counterwager as u64,
            target_value,
            leverage: LEVERAGE_UNIT,
            expiration: 500,
        }
        .pack()
        .unwrap(),
    )
}

/// Feed with one priced broadcast, and two funded bettors.
fn feed_fixture() -> Harness {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.fund_via_burn(BURN_START + 1, "bob", xcp(1));
    harness.apply_block(
        BURN_START + 2,
        1_390_000_100,
        &[("feed", None, 0, broadcast_payload(100, 50.0, 0, "opening"))],
    );
    harness
}

/// Places and matches a bull/bear CFD pair of 100 XCP each, deadline 1000.
fn matched_cfd(harness: &mut Harness) {
    harness.apply_block(
        BURN_START + 3,
        1_390_000_160,
        &[(
            "alice",
            Some("feed"),
            5430,
            bet_payload(BetType::BullCfd, 1000, xcp(100), xcp(100), 0.0),
        )],
    );
    harness.apply_block(
        BURN_START + 4,
        1_390_000_220,
        &[(
            "bob",
            Some("feed"),
            5430,
            bet_payload(BetType::BearCfd, 1000, xcp(100), xcp(100), 0.0),
        )],
    );
}

#[test]
fn cfd_settles_at_the_deadline() {
    let mut harness = feed_fixture();
    matched_cfd(&mut harness);

    let alice_before = harness.balance("alice", "XCP");
    let bob_before = harness.balance("bob", "XCP");

    // Same value before the deadline: the match stays open.
    harness.apply_block(
        BURN_START + 5,
        1_390_000_280,
        &[("feed", None, 0, broadcast_payload(500, 50.0, 0, ""))],
    );
    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM bet_matches", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "valid");

    // Value 60 at the deadline: ten points in the bull's favour.
    harness.apply_block(
        BURN_START + 6,
        1_390_000_340,
        &[("feed", None, 0, broadcast_payload(1000, 60.0, 0, ""))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM bet_matches", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "Settled (CFD)");
    assert_eq!(harness.balance("alice", "XCP"), alice_before + xcp(110));
    assert_eq!(harness.balance("bob", "XCP"), bob_before + xcp(90));
}

#[test]
fn cfd_force_liquidates_the_exhausted_bear() {
    let mut harness = feed_fixture();
    matched_cfd(&mut harness);
    let alice_before = harness.balance("alice", "XCP");

    // A 150-point move wipes out the bear's escrow well before the deadline.
    harness.apply_block(
        BURN_START + 5,
        1_390_000_280,
        &[("feed", None, 0, broadcast_payload(500, 200.0, 0, ""))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM bet_matches", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "Force-Liquidated Bear");
    assert_eq!(harness.balance("alice", "XCP"), alice_before + xcp(200));
}

#[test]
fn settlement_fee_goes_to_the_feed() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));
    harness.fund_via_burn(BURN_START + 1, "bob", xcp(1));
    // 5% fee fraction.
    harness.apply_block(
        BURN_START + 2,
        1_390_000_100,
        &[("feed", None, 0, broadcast_payload(100, 50.0, 5_000_000, "opening"))],
    );
    matched_cfd(&mut harness);

    let alice_before = harness.balance("alice", "XCP");
    let bob_before = harness.balance("bob", "XCP");

    harness.apply_block(
        BURN_START + 5,
        1_390_000_280,
        &[("feed", None, 0, broadcast_payload(1000, 50.0, 5_000_000, ""))],
    );

    // Fee of 10 XCP off the 200 XCP pot. At an unmoved price the bear is
    // made whole and the fee comes out of the bull's side.
    assert_eq!(harness.balance("feed", "XCP"), xcp(10));
    assert_eq!(harness.balance("alice", "XCP"), alice_before + xcp(90));
    assert_eq!(harness.balance("bob", "XCP"), bob_before + xcp(100));
}

#[test]
fn equal_bet_settles_for_the_right_side() {
    let mut harness = feed_fixture();

    harness.apply_block(
        BURN_START + 3,
        1_390_000_160,
        &[(
            "alice",
            Some("feed"),
            5430,
            bet_payload(BetType::Equal, 1000, xcp(50), xcp(50), 42.0),
        )],
    );
    harness.apply_block(
        BURN_START + 4,
        1_390_000_220,
        &[(
            "bob",
            Some("feed"),
            5430,
            bet_payload(BetType::NotEqual, 1000, xcp(50), xcp(50), 42.0),
        )],
    );

    let alice_before = harness.balance("alice", "XCP");

    harness.apply_block(
        BURN_START + 5,
        1_390_000_280,
        &[("feed", None, 0, broadcast_payload(1000, 42.0, 0, ""))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM bet_matches", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "Settled for Equal");
    assert_eq!(harness.balance("alice", "XCP"), alice_before + xcp(100));
}

#[test]
fn locked_feed_rejects_later_broadcasts_and_bets() {
    let mut harness = feed_fixture();

    harness.apply_block(
        BURN_START + 3,
        1_390_000_160,
        &[("feed", None, 0, broadcast_payload(200, 0.0, 0, "LOCK"))],
    );

    let locked: bool = harness
        .store
        .conn()
        .query_row(
            "SELECT locked FROM broadcasts WHERE tx_index = 3",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(locked);

    harness.apply_block(
        BURN_START + 4,
        1_390_000_220,
        &[("feed", None, 0, broadcast_payload(300, 55.0, 0, ""))],
    );
    let validity: String = harness
        .store
        .conn()
        .query_row(
            "SELECT validity FROM broadcasts WHERE tx_index = 4",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(validity, "invalid: locked feed");

    // Bets on the dead feed are refused too.
    harness.apply_block(
        BURN_START + 5,
        1_390_000_280,
        &[(
            "alice",
            Some("feed"),
            5430,
            bet_payload(BetType::BullCfd, 2000, xcp(10), xcp(10), 0.0),
        )],
    );
    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM bets", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "invalid: locked feed");
}

#[test]
fn stale_timestamp_is_rejected() {
    let mut harness = feed_fixture();

    harness.apply_block(
        BURN_START + 3,
        1_390_000_160,
        &[("feed", None, 0, broadcast_payload(100, 51.0, 0, ""))],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row(
            "SELECT validity FROM broadcasts WHERE tx_index = 3",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(validity, "invalid: feed timestamps not monotonically increasing");
}

#[test]
fn bet_on_a_missing_feed_is_invalid() {
    let mut harness = Harness::new();
    harness.fund_via_burn(BURN_START, "alice", xcp(1));

    harness.apply_block(
        BURN_START + 1,
        1_390_000_100,
        &[(
            "alice",
            Some("nowhere"),
            5430,
            bet_payload(BetType::BullCfd, 1000, xcp(10), xcp(10), 0.0),
        )],
    );

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM bets", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "invalid: feed does not exist");
}

#[test]
fn expired_bet_match_returns_both_stakes() {
    let mut harness = feed_fixture();

    // Short expirations so the match lapses before any settling broadcast.
    let short_bet = |bet_type: BetType| {
        common::payload(
            scrip_messages::bet::ID,
            &Bet {
                bet_type: bet_type.id(),
                deadline: 1000,
                wager_amount: xcp(10) as u64,
                counterwager_amount: xcp(10) as u64,
                target_value: 0.0,
                leverage: LEVERAGE_UNIT,
                expiration: 2,
            }
            .pack()
            .unwrap(),
        )
    };

    harness.apply_block(
        BURN_START + 3,
        1_390_000_160,
        &[("alice", Some("feed"), 5430, short_bet(BetType::BullCfd))],
    );
    let alice_after_escrow = harness.balance("alice", "XCP");
    harness.apply_block(
        BURN_START + 4,
        1_390_000_220,
        &[("bob", Some("feed"), 5430, short_bet(BetType::BearCfd))],
    );

    for i in 5..=6 {
        harness.apply_block(BURN_START + i, 1_390_000_160 + 60 * i, &[]);
    }

    let validity: String = harness
        .store
        .conn()
        .query_row("SELECT validity FROM bet_matches", [], |row| row.get(0))
        .unwrap();
    assert_eq!(validity, "expired");
    assert_eq!(harness.balance("alice", "XCP"), alice_after_escrow + xcp(10));

    let expirations: i64 = harness
        .store
        .conn()
        .query_row("SELECT COUNT(*) FROM bet_match_expirations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(expirations, 1);
}

#[test]
fn conservation_holds_through_bets_and_settlement() {
    let mut harness = feed_fixture();
    matched_cfd(&mut harness);

    let ledger_supply = {
        let ledger = scrip_ledger::Ledger::new(harness.store.conn());
        ledger.xcp_supply().unwrap()
    };
    assert_eq!(
        ledger_supply,
        harness.xcp_in_balances()
            + common::xcp_in_bet_escrow(&harness)
            + common::xcp_in_order_escrow(&harness)
    );

    harness.apply_block(
        BURN_START + 5,
        1_390_000_280,
        &[("feed", None, 0, broadcast_payload(1000, 65.0, 0, ""))],
    );

    let ledger_supply = {
        let ledger = scrip_ledger::Ledger::new(harness.store.conn());
        ledger.xcp_supply().unwrap()
    };
    assert_eq!(
        ledger_supply,
        harness.xcp_in_balances()
            + common::xcp_in_bet_escrow(&harness)
            + common::xcp_in_order_escrow(&harness)
    );
}
