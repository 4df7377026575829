//! Model-based test: a random trade tape pushed through the full
//! engine must come back as a bounded FIFO per symbol, in arrival
//! order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

use flusso::{Flusso, MessageHash, SubscriptionKey};
use flusso_mock::{MockUpdate, MockVenue, pair};

const URL: &str = "wss://mock.test/ws";
const CACHE_BOUND: usize = 4;
const SYMBOLS: [&str; 2] = ["PERP_BTC_USDC", "PERP_ETH_USDC"];

proptest! {
    #![proptest_config(ProptestConfig { cases: 16, ..ProptestConfig::default() })]
    #[test]
    fn trade_tape_resolves_as_bounded_fifo_per_symbol(
        tape in proptest::collection::vec((0usize..SYMBOLS.len(), 1u32..100_000u32), 1..40)
    ) {
        tokio_test::block_on(async move {
            let (transport, mut server) = pair();
            let engine = Arc::new(
                Flusso::builder(MockVenue::new(CACHE_BOUND, 5))
                    .transport(transport)
                    .build(),
            );
            let mut peer = None;
            let mut model: HashMap<&str, VecDeque<u32>> = HashMap::new();

            for (seq, (sym_idx, price)) in tape.into_iter().enumerate() {
                let symbol = SYMBOLS[sym_idx];
                let topic = format!("{symbol}@trade");
                let waiter = {
                    let engine = Arc::clone(&engine);
                    let topic = topic.clone();
                    tokio::spawn(async move {
                        engine
                            .subscribe(
                                URL,
                                MessageHash::new(topic.clone()),
                                json!({"event": "subscribe", "topic": topic}),
                                // A unique key per frame forces a send, which
                                // doubles as the "waiter is registered" signal.
                                SubscriptionKey::new(format!("tape-{seq}")),
                            )
                            .await
                    })
                };
                let venue_side = match peer.as_mut() {
                    Some(venue_side) => venue_side,
                    None => peer.insert(
                        server.accept().await.expect("engine connects once"),
                    ),
                };
                venue_side.sent().await.expect("subscribe frame");
                venue_side.push(
                    json!({
                        "topic": topic,
                        "ts": seq as i64,
                        "data": {"price": price.to_string(), "size": "1", "side": "BUY"},
                    })
                    .to_string(),
                );

                let tail = model.entry(symbol).or_default();
                tail.push_back(price);
                if tail.len() > CACHE_BOUND {
                    tail.pop_front();
                }

                let update = tokio::time::timeout(Duration::from_secs(5), waiter)
                    .await
                    .expect("update within deadline")
                    .expect("task completes")
                    .expect("resolves");
                let MockUpdate::Trades { symbol: got, trades } = update else {
                    panic!("expected trades update");
                };
                prop_assert_eq!(got, symbol);
                let prices: Vec<Decimal> = trades.iter().map(|t| t.price).collect();
                let expected: Vec<Decimal> =
                    tail.iter().map(|p| Decimal::from(*p)).collect();
                prop_assert_eq!(prices, expected);
            }
            Ok(())
        })?;
    }
}
