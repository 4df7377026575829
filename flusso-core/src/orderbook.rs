//! Live order books built from a venue snapshot followed by deltas.
//!
//! A book keeps both sides sorted at all observable points: bids
//! strictly descending, asks strictly ascending, no duplicate price
//! (or id, for per-order books). Each delta may carry a sequence
//! number; a gap marks the book stale, and every delta applied while
//! stale is discarded until a fresh snapshot arrives.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::FlussoError;

/// Order book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Buy side, sorted descending by price.
    Bid,
    /// Sell side, sorted ascending by price.
    Ask,
}

/// A single resting level: price, aggregate amount, and the venue's
/// order id where the venue publishes per-order books.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    /// Level price.
    pub price: Decimal,
    /// Aggregate resting amount at the price.
    pub amount: Decimal,
    /// Venue order id, for id-keyed books.
    pub id: Option<String>,
}

impl PriceLevel {
    /// Build a plain price/amount level.
    #[must_use]
    pub const fn new(price: Decimal, amount: Decimal) -> Self {
        Self {
            price,
            amount,
            id: None,
        }
    }

    /// Build a level carrying a venue order id.
    #[must_use]
    pub fn with_id(price: Decimal, amount: Decimal, id: impl Into<String>) -> Self {
        Self {
            price,
            amount,
            id: Some(id.into()),
        }
    }
}

/// A full book replacement at a point in time.
#[derive(Debug, Clone, Default)]
pub struct BookSnapshot {
    /// Raw bid levels, in any order.
    pub bids: Vec<PriceLevel>,
    /// Raw ask levels, in any order.
    pub asks: Vec<PriceLevel>,
    /// Venue sequence number the snapshot is valid at.
    pub nonce: Option<u64>,
    /// Venue timestamp in milliseconds.
    pub timestamp: Option<i64>,
}

/// An incremental book operation.
#[derive(Debug, Clone)]
pub enum DeltaOp {
    /// Insert-or-replace the level at its sorted position; an amount
    /// of zero removes it.
    Upsert {
        /// Side the level rests on.
        side: Side,
        /// Level price.
        price: Decimal,
        /// New absolute amount (zero removes the level).
        amount: Decimal,
        /// Venue order id, for id-keyed books.
        id: Option<String>,
    },
    /// A fill: reduce the resting level's amount by the traded amount,
    /// removing it when nothing remains.
    Trade {
        /// Side the resting order was on.
        side: Side,
        /// Price of the resting level.
        price: Decimal,
        /// Traded amount to subtract.
        amount: Decimal,
    },
    /// Remove the level with this id from whichever side holds it; the
    /// venue's delete message carries no side.
    DeleteById {
        /// Venue order id of the level to remove.
        id: String,
    },
}

/// An incremental update together with its ordering metadata.
#[derive(Debug, Clone)]
pub struct BookDelta {
    /// The operation to apply.
    pub op: DeltaOp,
    /// Venue sequence number; `None` skips the gap check.
    pub nonce: Option<u64>,
    /// Venue timestamp in milliseconds.
    pub timestamp: Option<i64>,
}

/// Top-of-book view returned by [`OrderBook::limit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLevels {
    /// Best bids, descending by price.
    pub bids: Vec<PriceLevel>,
    /// Best asks, ascending by price.
    pub asks: Vec<PriceLevel>,
    /// Sequence number the view is valid at.
    pub nonce: Option<u64>,
    /// Venue timestamp in milliseconds.
    pub timestamp: Option<i64>,
}

/// One sorted side of a book.
#[derive(Debug, Clone)]
struct BookSide {
    side: Side,
    levels: Vec<PriceLevel>,
    // id -> price, so id-keyed operations reduce to a binary search.
    ids: HashMap<String, Decimal>,
}

impl BookSide {
    fn new(side: Side) -> Self {
        Self {
            side,
            levels: Vec::new(),
            ids: HashMap::new(),
        }
    }

    /// Binary search for `price` in this side's sort order.
    fn position(&self, price: Decimal) -> Result<usize, usize> {
        match self.side {
            Side::Bid => self
                .levels
                .binary_search_by(|level| price.cmp(&level.price)),
            Side::Ask => self
                .levels
                .binary_search_by(|level| level.price.cmp(&price)),
        }
    }

    fn replace_all(&mut self, mut levels: Vec<PriceLevel>) {
        match self.side {
            Side::Bid => levels.sort_by(|a, b| b.price.cmp(&a.price)),
            Side::Ask => levels.sort_by(|a, b| a.price.cmp(&b.price)),
        }
        levels.dedup_by(|a, b| a.price == b.price);
        self.ids.clear();
        for level in &levels {
            if let Some(id) = &level.id {
                self.ids.insert(id.clone(), level.price);
            }
        }
        self.levels = levels;
    }

    fn store(&mut self, price: Decimal, amount: Decimal, id: Option<String>) {
        // A repeated id moving to a new price must vacate its old level.
        if let Some(id) = &id
            && let Some(old_price) = self.ids.get(id).copied()
            && old_price != price
            && let Ok(pos) = self.position(old_price)
        {
            self.levels.remove(pos);
            self.ids.remove(id);
        }
        if amount.is_zero() {
            if let Ok(pos) = self.position(price) {
                if let Some(id) = &self.levels[pos].id {
                    self.ids.remove(id);
                }
                self.levels.remove(pos);
            }
            return;
        }
        if let Some(id) = &id {
            self.ids.insert(id.clone(), price);
        }
        let level = PriceLevel { price, amount, id };
        match self.position(price) {
            Ok(pos) => {
                // The displaced level's id must leave the index, or a
                // later delete by that id would remove the new level.
                if let Some(old) = &self.levels[pos].id
                    && self.levels[pos].id != level.id
                {
                    self.ids.remove(old);
                }
                self.levels[pos] = level;
            }
            Err(pos) => self.levels.insert(pos, level),
        }
    }

    fn reduce(&mut self, price: Decimal, traded: Decimal) {
        if let Ok(pos) = self.position(price) {
            let remaining = self.levels[pos].amount - traded;
            if remaining > Decimal::ZERO {
                self.levels[pos].amount = remaining;
            } else {
                if let Some(id) = &self.levels[pos].id {
                    self.ids.remove(id);
                }
                self.levels.remove(pos);
            }
        }
    }

    fn delete_by_id(&mut self, id: &str) -> bool {
        let Some(price) = self.ids.remove(id) else {
            return false;
        };
        if let Ok(pos) = self.position(price) {
            self.levels.remove(pos);
        }
        true
    }

    fn top(&self, n: usize) -> Vec<PriceLevel> {
        self.levels.iter().take(n).cloned().collect()
    }
}

/// A per-symbol live book synchronized from snapshot plus deltas.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    bids: BookSide,
    asks: BookSide,
    nonce: Option<u64>,
    timestamp: Option<i64>,
    live: bool,
    stale: bool,
}

impl OrderBook {
    /// Create an uninitialized book for `symbol`; deltas are refused
    /// until the first snapshot.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
            nonce: None,
            timestamp: None,
            live: false,
            stale: false,
        }
    }

    /// Replace the book's entire state and transition to live,
    /// clearing any staleness.
    pub fn apply_snapshot(&mut self, snapshot: BookSnapshot) {
        self.bids.replace_all(snapshot.bids);
        self.asks.replace_all(snapshot.asks);
        self.nonce = snapshot.nonce;
        self.timestamp = snapshot.timestamp;
        self.live = true;
        self.stale = false;
    }

    /// Alias of [`apply_snapshot`](Self::apply_snapshot) for venues
    /// that push the full book on every tick.
    pub fn reset(&mut self, snapshot: BookSnapshot) {
        self.apply_snapshot(snapshot);
    }

    /// Apply one incremental update.
    ///
    /// # Errors
    /// Returns [`FlussoError::Stale`] when the book has no snapshot
    /// yet, is already stale, or the delta's sequence number is not
    /// the successor of the stored nonce. In the gap case the book is
    /// marked stale first; the caller must resnapshot, and every delta
    /// until then is discarded.
    pub fn apply_delta(&mut self, delta: &BookDelta) -> Result<(), FlussoError> {
        if !self.live || self.stale {
            return Err(FlussoError::stale(&self.symbol));
        }
        if let Some(incoming) = delta.nonce {
            if let Some(current) = self.nonce
                && incoming != current + 1
            {
                self.stale = true;
                tracing::warn!(
                    symbol = %self.symbol,
                    expected = current + 1,
                    received = incoming,
                    "order book sequence gap, marking stale"
                );
                return Err(FlussoError::stale(&self.symbol));
            }
            self.nonce = Some(incoming);
        }
        match &delta.op {
            DeltaOp::Upsert {
                side,
                price,
                amount,
                id,
            } => {
                self.side_mut(*side).store(*price, *amount, id.clone());
            }
            DeltaOp::Trade {
                side,
                price,
                amount,
            } => {
                self.side_mut(*side).reduce(*price, *amount);
            }
            DeltaOp::DeleteById { id } => {
                // The delete message carries no side; try both.
                if !self.bids.delete_by_id(id) {
                    self.asks.delete_by_id(id);
                }
            }
        }
        if delta.timestamp.is_some() {
            self.timestamp = delta.timestamp;
        }
        Ok(())
    }

    /// The top `n` levels per side, without mutating the book.
    #[must_use]
    pub fn limit(&self, n: usize) -> BookLevels {
        BookLevels {
            bids: self.bids.top(n),
            asks: self.asks.top(n),
            nonce: self.nonce,
            timestamp: self.timestamp,
        }
    }

    /// Best bid and best ask, either of which may be absent.
    #[must_use]
    pub fn bid_ask(&self) -> (Option<&PriceLevel>, Option<&PriceLevel>) {
        (self.bids.levels.first(), self.asks.levels.first())
    }

    /// All bid levels, descending by price.
    #[must_use]
    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids.levels
    }

    /// All ask levels, ascending by price.
    #[must_use]
    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks.levels
    }

    /// Symbol this book tracks.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Sequence number of the last applied update.
    #[must_use]
    pub const fn nonce(&self) -> Option<u64> {
        self.nonce
    }

    /// Venue timestamp of the last applied update.
    #[must_use]
    pub const fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// `true` once a snapshot has been applied.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.live
    }

    /// `true` after a sequence gap, until the next snapshot.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}
