//! A reference venue adapter used by the engine's integration tests.
//!
//! The dialect is the common composite-topic one: pushes arrive on
//! `SYMBOL@channel` topics (`trade`, `ticker`, `orderbook`,
//! `orderbookupdate`), request acknowledgements and auth ride `event`
//! frames, and keep-alive is the JSON `{"event":"ping"}` /
//! `{"event":"pong"}` exchange.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;

use flusso_core::{
    ArrayCache, BookDelta, BookLevels, BookSnapshot, DeltaOp, DispatchTable, ErrorRouting,
    FlussoError, HandlerCx, OrderBook, PriceLevel, Side, VenueAdapter,
};
use flusso_types::{Envelope, MessageHash, SubscriptionKey};

/// One normalized trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    /// Venue symbol, e.g. `PERP_BTC_USDC`.
    pub symbol: String,
    /// Execution price.
    pub price: Decimal,
    /// Executed amount.
    pub amount: Decimal,
    /// Taker side.
    pub side: Side,
    /// Venue timestamp in milliseconds.
    pub timestamp: i64,
}

/// One normalized ticker tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    /// Venue symbol.
    pub symbol: String,
    /// Last traded price.
    pub last: Decimal,
    /// Venue timestamp in milliseconds.
    pub timestamp: i64,
}

/// What a resolved future carries.
#[derive(Debug, Clone)]
pub enum MockUpdate {
    /// Recent trades for one symbol, oldest first.
    Trades {
        /// Venue symbol.
        symbol: String,
        /// Cache contents after the append.
        trades: Vec<Trade>,
    },
    /// A ticker tick.
    Ticker(Ticker),
    /// Top of the synchronized order book.
    Book(BookLevels),
    /// Authentication confirmed.
    Authenticated,
}

/// Per-connection caches owned by the dispatch task.
#[derive(Default)]
pub struct MockState {
    /// Rolling trade cache per symbol.
    pub trades: HashMap<String, ArrayCache<Trade>>,
    /// Synchronized book per symbol.
    pub books: HashMap<String, OrderBook>,
}

/// The reference adapter.
pub struct MockVenue {
    trade_limit: usize,
    book_depth: usize,
}

impl MockVenue {
    /// Adapter with the given trade-cache bound and book view depth.
    #[must_use]
    pub const fn new(trade_limit: usize, book_depth: usize) -> Self {
        Self {
            trade_limit,
            book_depth,
        }
    }
}

impl Default for MockVenue {
    fn default() -> Self {
        Self::new(1024, 10)
    }
}

impl VenueAdapter for MockVenue {
    type Update = MockUpdate;
    type State = MockState;

    fn name(&self) -> &'static str {
        "flusso-mock"
    }

    fn dispatch_table(&self) -> DispatchTable<Self> {
        DispatchTable::from_entries(&[
            ("trade", handle_trade),
            ("ticker", handle_ticker),
            ("orderbook", handle_snapshot),
            ("orderbookupdate", handle_delta),
            ("auth", handle_auth),
        ])
    }

    fn classify_error(&self, envelope: &Envelope) -> ErrorRouting {
        let message = envelope
            .error_msg
            .clone()
            .unwrap_or_else(|| "request failed".to_string());
        if envelope.event.as_deref() == Some("auth") || message.contains("Auth") {
            return ErrorRouting {
                error: FlussoError::authentication(message),
                reject: vec![MessageHash::new("authenticated")],
                clear_subscription: Some(SubscriptionKey::new("authenticated")),
            };
        }
        let reject = envelope
            .topic
            .as_deref()
            .map(MessageHash::from)
            .into_iter()
            .collect();
        ErrorRouting {
            error: FlussoError::protocol(self.name(), message),
            reject,
            clear_subscription: None,
        }
    }
}

fn handle_trade(
    venue: &MockVenue,
    cx: &mut dyn HandlerCx<MockUpdate>,
    state: &mut MockState,
    envelope: Envelope,
) -> Result<(), FlussoError> {
    let (topic, symbol) = composite_topic(&envelope)?;
    let data = payload(&envelope)?;
    let trade = Trade {
        symbol: symbol.clone(),
        price: dec_field(data, "price")?,
        amount: dec_field(data, "size")?,
        side: side_field(data)?,
        timestamp: envelope.ts.unwrap_or_default(),
    };
    let cache = state
        .trades
        .entry(symbol.clone())
        .or_insert_with(|| ArrayCache::new(venue.trade_limit));
    cache.append(trade);
    let trades = cache.limit(cache.len());
    cx.resolve(&MessageHash::new(topic), MockUpdate::Trades { symbol, trades });
    Ok(())
}

fn handle_ticker(
    _venue: &MockVenue,
    cx: &mut dyn HandlerCx<MockUpdate>,
    _state: &mut MockState,
    envelope: Envelope,
) -> Result<(), FlussoError> {
    let (topic, symbol) = composite_topic(&envelope)?;
    let data = payload(&envelope)?;
    let ticker = Ticker {
        symbol,
        last: dec_field(data, "last")?,
        timestamp: envelope.ts.unwrap_or_default(),
    };
    cx.resolve(&MessageHash::new(topic), MockUpdate::Ticker(ticker));
    Ok(())
}

fn handle_snapshot(
    venue: &MockVenue,
    cx: &mut dyn HandlerCx<MockUpdate>,
    state: &mut MockState,
    envelope: Envelope,
) -> Result<(), FlussoError> {
    let (topic, symbol) = composite_topic(&envelope)?;
    let data = payload(&envelope)?;
    let snapshot = BookSnapshot {
        bids: levels_field(data, "bids")?,
        asks: levels_field(data, "asks")?,
        nonce: data.get("seq").and_then(Value::as_u64),
        timestamp: envelope.ts,
    };
    let book = state
        .books
        .entry(symbol.clone())
        .or_insert_with(|| OrderBook::new(symbol));
    book.reset(snapshot);
    cx.resolve(&MessageHash::new(topic), MockUpdate::Book(book.limit(venue.book_depth)));
    Ok(())
}

fn handle_delta(
    venue: &MockVenue,
    cx: &mut dyn HandlerCx<MockUpdate>,
    state: &mut MockState,
    envelope: Envelope,
) -> Result<(), FlussoError> {
    let (_, symbol) = composite_topic(&envelope)?;
    let data = payload(&envelope)?;
    let Some(book) = state.books.get_mut(&symbol) else {
        // No snapshot yet; the delta is discarded.
        return Ok(());
    };
    let delta = BookDelta {
        op: DeltaOp::Upsert {
            side: side_field(data)?,
            price: dec_field(data, "price")?,
            amount: dec_field(data, "size")?,
            id: None,
        },
        nonce: data.get("seq").and_then(Value::as_u64),
        timestamp: envelope.ts,
    };
    match book.apply_delta(&delta) {
        Ok(()) => {
            // Book updates resolve against the snapshot topic so one
            // hash serves both frame kinds.
            let hash = MessageHash::new(format!("{symbol}@orderbook"));
            cx.resolve(&hash, MockUpdate::Book(book.limit(venue.book_depth)));
            Ok(())
        }
        // Stale books resynchronize on the next snapshot; the gap
        // itself wakes nobody.
        Err(FlussoError::Stale { .. }) => Ok(()),
        Err(error) => Err(error),
    }
}

fn handle_auth(
    _venue: &MockVenue,
    cx: &mut dyn HandlerCx<MockUpdate>,
    _state: &mut MockState,
    envelope: Envelope,
) -> Result<(), FlussoError> {
    // success:false never reaches the table; control routing rejects it
    // through classify_error first.
    if envelope.success == Some(true) {
        cx.resolve(&MessageHash::new("authenticated"), MockUpdate::Authenticated);
        return Ok(());
    }
    Err(FlussoError::malformed("auth frame without a verdict"))
}

fn composite_topic(envelope: &Envelope) -> Result<(String, String), FlussoError> {
    let topic = envelope
        .topic
        .clone()
        .ok_or_else(|| FlussoError::malformed("push frame without topic"))?;
    let symbol = topic
        .split_once('@')
        .map(|(symbol, _)| symbol.to_string())
        .ok_or_else(|| FlussoError::malformed(format!("topic {topic} is not symbol@channel")))?;
    Ok((topic, symbol))
}

fn payload(envelope: &Envelope) -> Result<&Value, FlussoError> {
    envelope
        .data
        .as_ref()
        .ok_or_else(|| FlussoError::malformed("push frame without data"))
}

fn dec_field(data: &Value, field: &str) -> Result<Decimal, FlussoError> {
    let value = data
        .get(field)
        .ok_or_else(|| FlussoError::malformed(format!("missing field {field}")))?;
    dec_value(value)
        .map_err(|_| FlussoError::malformed(format!("field {field} is not a decimal")))
}

fn side_field(data: &Value) -> Result<Side, FlussoError> {
    match data.get("side").and_then(Value::as_str) {
        Some("BUY") => Ok(Side::Bid),
        Some("SELL") => Ok(Side::Ask),
        other => Err(FlussoError::malformed(format!(
            "unknown side {other:?}"
        ))),
    }
}

fn levels_field(data: &Value, field: &str) -> Result<Vec<PriceLevel>, FlussoError> {
    let rows = data
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| FlussoError::malformed(format!("missing level array {field}")))?;
    let mut levels = Vec::with_capacity(rows.len());
    for row in rows {
        let pair = row
            .as_array()
            .filter(|pair| pair.len() == 2)
            .ok_or_else(|| FlussoError::malformed("level row is not [price, size]"))?;
        let price = dec_value(&pair[0])?;
        let amount = dec_value(&pair[1])?;
        levels.push(PriceLevel::new(price, amount));
    }
    Ok(levels)
}

fn dec_value(value: &Value) -> Result<Decimal, FlussoError> {
    let parsed = match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        _ => None,
    };
    parsed.ok_or_else(|| FlussoError::malformed("level value is not a decimal"))
}
