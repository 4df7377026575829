use flusso_core::{BookDelta, BookSnapshot, DeltaOp, FlussoError, OrderBook, PriceLevel, Side};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn level(price: i64, amount: i64) -> PriceLevel {
    PriceLevel::new(Decimal::from(price), Decimal::from(amount))
}

fn upsert(side: Side, price: i64, amount: i64, nonce: Option<u64>) -> BookDelta {
    BookDelta {
        op: DeltaOp::Upsert {
            side,
            price: Decimal::from(price),
            amount: Decimal::from(amount),
            id: None,
        },
        nonce,
        timestamp: None,
    }
}

fn snapshot(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>, nonce: Option<u64>) -> BookSnapshot {
    BookSnapshot {
        bids,
        asks,
        nonce,
        timestamp: Some(1_650_000_000_000),
    }
}

fn assert_sorted(book: &OrderBook) {
    let bids = book.bids();
    for pair in bids.windows(2) {
        assert!(pair[0].price > pair[1].price, "bids not strictly descending");
    }
    let asks = book.asks();
    for pair in asks.windows(2) {
        assert!(pair[0].price < pair[1].price, "asks not strictly ascending");
    }
}

proptest! {
    // Any snapshot followed by any sequence of valid sequential deltas
    // leaves both sides strictly sorted with no duplicate price.
    #[test]
    fn snapshot_plus_deltas_keeps_sides_sorted(
        raw_bids in proptest::collection::vec((1i64..500, 1i64..100), 0..30),
        raw_asks in proptest::collection::vec((500i64..1000, 1i64..100), 0..30),
        ops in proptest::collection::vec((any::<bool>(), 1i64..1000, 0i64..100), 0..100),
    ) {
        let mut book = OrderBook::new("PERP_BTC_USDC");
        book.apply_snapshot(snapshot(
            raw_bids.iter().map(|(p, a)| level(*p, *a)).collect(),
            raw_asks.iter().map(|(p, a)| level(*p, *a)).collect(),
            Some(0),
        ));
        let mut nonce = 0u64;
        for (is_bid, price, amount) in ops {
            nonce += 1;
            let side = if is_bid { Side::Bid } else { Side::Ask };
            book.apply_delta(&upsert(side, price, amount, Some(nonce))).unwrap();
            assert_sorted(&book);
        }
        prop_assert_eq!(book.nonce(), Some(nonce));
        prop_assert!(!book.is_stale());
    }
}

#[test]
fn zero_amount_removes_and_reupsert_restores() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(snapshot(vec![level(100, 1)], vec![level(101, 2)], None));
    book.apply_delta(&upsert(Side::Ask, 101, 0, None)).unwrap();
    assert!(book.asks().is_empty());
    book.apply_delta(&upsert(Side::Ask, 101, 2, None)).unwrap();
    assert_eq!(book.asks(), &[level(101, 2)]);
}

#[test]
fn delta_after_ask_removal_leaves_only_new_level() {
    // snapshot {bids:[[100,1]], asks:[[101,2]]}, delete ask 101, add ask 102.
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(snapshot(vec![level(100, 1)], vec![level(101, 2)], None));
    book.apply_delta(&upsert(Side::Ask, 101, 0, None)).unwrap();
    book.apply_delta(&upsert(Side::Ask, 102, 3, None)).unwrap();
    assert_eq!(book.asks(), &[level(102, 3)]);
    assert_eq!(book.bids(), &[level(100, 1)]);
}

#[test]
fn sequence_gap_marks_stale_until_snapshot() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(snapshot(vec![level(100, 1)], vec![level(101, 2)], Some(10)));
    book.apply_delta(&upsert(Side::Bid, 99, 1, Some(11))).unwrap();

    // 13 is not the successor of 11: gap.
    let err = book.apply_delta(&upsert(Side::Bid, 98, 1, Some(13))).unwrap_err();
    assert_eq!(
        err,
        FlussoError::Stale {
            symbol: "PERP_BTC_USDC".to_string()
        }
    );
    assert!(book.is_stale());

    // While stale, even well-sequenced deltas are discarded.
    let before = book.bids().to_vec();
    assert!(book.apply_delta(&upsert(Side::Bid, 97, 1, Some(12))).is_err());
    assert_eq!(book.bids(), before.as_slice());

    // A fresh snapshot clears staleness and accepts deltas again.
    book.apply_snapshot(snapshot(vec![level(100, 1)], vec![level(101, 2)], Some(20)));
    assert!(!book.is_stale());
    book.apply_delta(&upsert(Side::Bid, 99, 1, Some(21))).unwrap();
}

#[test]
fn deltas_before_first_snapshot_are_refused() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    assert!(book.apply_delta(&upsert(Side::Bid, 100, 1, Some(1))).is_err());
    assert!(!book.is_live());
}

#[test]
fn trade_reduces_and_removes_at_zero() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(snapshot(vec![level(100, 5)], vec![], None));
    book.apply_delta(&BookDelta {
        op: DeltaOp::Trade {
            side: Side::Bid,
            price: Decimal::from(100),
            amount: Decimal::from(2),
        },
        nonce: None,
        timestamp: None,
    })
    .unwrap();
    assert_eq!(book.bids(), &[level(100, 3)]);
    book.apply_delta(&BookDelta {
        op: DeltaOp::Trade {
            side: Side::Bid,
            price: Decimal::from(100),
            amount: Decimal::from(3),
        },
        nonce: None,
        timestamp: None,
    })
    .unwrap();
    assert!(book.bids().is_empty());
}

#[test]
fn delete_by_id_checks_both_sides() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(BookSnapshot {
        bids: vec![PriceLevel::with_id(
            Decimal::from(100),
            Decimal::from(1),
            "bid-1",
        )],
        asks: vec![PriceLevel::with_id(
            Decimal::from(101),
            Decimal::from(2),
            "ask-1",
        )],
        nonce: None,
        timestamp: None,
    });
    book.apply_delta(&BookDelta {
        op: DeltaOp::DeleteById {
            id: "ask-1".to_string(),
        },
        nonce: None,
        timestamp: None,
    })
    .unwrap();
    assert!(book.asks().is_empty());
    assert_eq!(book.bids().len(), 1);
}

#[test]
fn id_moving_to_new_price_vacates_old_level() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(BookSnapshot {
        bids: vec![PriceLevel::with_id(
            Decimal::from(100),
            Decimal::from(1),
            "o-1",
        )],
        asks: vec![],
        nonce: None,
        timestamp: None,
    });
    book.apply_delta(&BookDelta {
        op: DeltaOp::Upsert {
            side: Side::Bid,
            price: Decimal::from(99),
            amount: Decimal::from(1),
            id: Some("o-1".to_string()),
        },
        nonce: None,
        timestamp: None,
    })
    .unwrap();
    assert_eq!(book.bids().len(), 1);
    assert_eq!(book.bids()[0].price, Decimal::from(99));
}

#[test]
fn replaced_level_forgets_the_displaced_id() {
    // A new order takes over a price; deleting the displaced order's
    // id afterwards must not touch the live level.
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(BookSnapshot {
        bids: vec![PriceLevel::with_id(
            Decimal::from(100),
            Decimal::from(1),
            "x",
        )],
        asks: vec![],
        nonce: None,
        timestamp: None,
    });
    book.apply_delta(&BookDelta {
        op: DeltaOp::Upsert {
            side: Side::Bid,
            price: Decimal::from(100),
            amount: Decimal::from(2),
            id: Some("y".to_string()),
        },
        nonce: None,
        timestamp: None,
    })
    .unwrap();
    book.apply_delta(&BookDelta {
        op: DeltaOp::DeleteById {
            id: "x".to_string(),
        },
        nonce: None,
        timestamp: None,
    })
    .unwrap();
    assert_eq!(
        book.bids(),
        &[PriceLevel::with_id(
            Decimal::from(100),
            Decimal::from(2),
            "y"
        )]
    );
    // Deleting the live id still works.
    book.apply_delta(&BookDelta {
        op: DeltaOp::DeleteById {
            id: "y".to_string(),
        },
        nonce: None,
        timestamp: None,
    })
    .unwrap();
    assert!(book.bids().is_empty());
}

#[test]
fn limit_returns_top_levels_without_mutation() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(snapshot(
        vec![level(100, 1), level(99, 2), level(98, 3)],
        vec![level(101, 1), level(102, 2), level(103, 3)],
        Some(5),
    ));
    let top = book.limit(2);
    assert_eq!(top.bids, vec![level(100, 1), level(99, 2)]);
    assert_eq!(top.asks, vec![level(101, 1), level(102, 2)]);
    assert_eq!(top.nonce, Some(5));
    assert_eq!(book.bids().len(), 3);
    assert_eq!(book.asks().len(), 3);
}

#[test]
fn best_bid_ask() {
    let mut book = OrderBook::new("PERP_BTC_USDC");
    book.apply_snapshot(snapshot(
        vec![level(99, 2), level(100, 1)],
        vec![level(102, 2), level(101, 1)],
        None,
    ));
    let (bid, ask) = book.bid_ask();
    assert_eq!(bid.unwrap().price, Decimal::from(100));
    assert_eq!(ask.unwrap().price, Decimal::from(101));
}
