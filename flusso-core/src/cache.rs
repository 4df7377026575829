//! Bounded, order-preserving caches for normalized records.
//!
//! Adapters accumulate trades, orders, candles, and positions into
//! these containers from handler callbacks, then resolve the awaiting
//! futures with the container's recent contents. Each variant keeps
//! insertion order, never exceeds its configured bound, and upserts in
//! place where a natural key exists:
//!
//! | Variant | Key | Insert | Eviction |
//! |---|---|---|---|
//! | [`ArrayCache`] | none | append | oldest beyond the bound |
//! | [`ArrayCacheBySymbolById`] | symbol+id | upsert in place | oldest append, index kept consistent |
//! | [`ArrayCacheByTimestamp`] | timestamp bucket | upsert in place | oldest bucket beyond the bound |
//! | [`ArrayCacheBySymbolBySide`] | symbol+side | replace | none |
//!
//! Keyed variants index entries by a monotonically increasing
//! insertion sequence rather than by position, so eviction at the
//! front never invalidates the index.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::orderbook::Side;

/// Entry carrying the symbol it belongs to.
pub trait SymbolKeyed {
    /// Unified symbol of the entry.
    fn symbol(&self) -> &str;
}

/// Entry carrying a venue-assigned identity within its symbol.
pub trait IdKeyed: SymbolKeyed {
    /// Venue id (order id, trade id) of the entry.
    fn id(&self) -> &str;
}

/// Entry keyed by a time bucket (e.g. candle open time).
pub trait Timestamped {
    /// Bucket timestamp in milliseconds.
    fn timestamp(&self) -> i64;
}

/// Entry keyed by symbol and book side (e.g. a position).
pub trait Sided: SymbolKeyed {
    /// Side of the entry.
    fn side(&self) -> Side;
}

/// Tracks which (symbol-scoped) callers have already sized their first
/// batch via `get_limit`.
#[derive(Debug, Default, Clone)]
struct FirstBatchGate {
    seen: HashSet<Option<String>>,
}

impl FirstBatchGate {
    /// First call for a symbol bounds the batch to what the cache
    /// currently holds; afterwards the requested limit passes through
    /// untouched.
    fn get_limit(&mut self, symbol: Option<&str>, requested: usize, len: usize) -> usize {
        if self.seen.insert(symbol.map(str::to_string)) {
            requested.min(len)
        } else {
            requested
        }
    }
}

/// Append-only FIFO cache with a strict size bound.
#[derive(Debug, Clone)]
pub struct ArrayCache<T> {
    bound: usize,
    entries: VecDeque<T>,
    gate: FirstBatchGate,
}

impl<T: Clone> ArrayCache<T> {
    /// Create a cache holding at most `bound` entries.
    #[must_use]
    pub fn new(bound: usize) -> Self {
        Self {
            bound,
            entries: VecDeque::with_capacity(bound.min(1024)),
            gate: FirstBatchGate::default(),
        }
    }

    /// Append at the tail, dropping the oldest entry beyond the bound.
    pub fn append(&mut self, entry: T) {
        self.entries.push_back(entry);
        if self.entries.len() > self.bound {
            self.entries.pop_front();
        }
    }

    /// The most recent `n` entries, oldest first, without mutating the
    /// container.
    #[must_use]
    pub fn limit(&self, n: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Bound the first delivered batch for `symbol` to the current
    /// size; transparent on every later call.
    pub fn get_limit(&mut self, symbol: Option<&str>, requested: usize) -> usize {
        self.gate.get_limit(symbol, requested, self.entries.len())
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

/// Cache keyed by (symbol, id): a repeated id updates the stored entry
/// in place, preserving its original position; new ids append and
/// evict FIFO.
#[derive(Debug, Clone)]
pub struct ArrayCacheBySymbolById<T> {
    bound: usize,
    entries: VecDeque<T>,
    // (symbol, id) -> absolute insertion sequence; position = seq - base.
    index: HashMap<(String, String), usize>,
    base: usize,
    gate: FirstBatchGate,
}

impl<T: IdKeyed + Clone> ArrayCacheBySymbolById<T> {
    /// Create a cache holding at most `bound` distinct (symbol, id)
    /// entries.
    #[must_use]
    pub fn new(bound: usize) -> Self {
        Self {
            bound,
            entries: VecDeque::new(),
            index: HashMap::new(),
            base: 0,
            gate: FirstBatchGate::default(),
        }
    }

    /// Upsert an entry under its (symbol, id) key.
    pub fn append(&mut self, entry: T) {
        let key = (entry.symbol().to_string(), entry.id().to_string());
        if let Some(&seq) = self.index.get(&key) {
            self.entries[seq - self.base] = entry;
            return;
        }
        let seq = self.base + self.entries.len();
        self.entries.push_back(entry);
        self.index.insert(key, seq);
        if self.entries.len() > self.bound
            && let Some(evicted) = self.entries.pop_front()
        {
            self.index
                .remove(&(evicted.symbol().to_string(), evicted.id().to_string()));
            self.base += 1;
        }
    }

    /// Look up the entry stored under (symbol, id).
    #[must_use]
    pub fn get(&self, symbol: &str, id: &str) -> Option<&T> {
        let seq = *self.index.get(&(symbol.to_string(), id.to_string()))?;
        self.entries.get(seq - self.base)
    }

    /// The most recently appended entry for `symbol`.
    #[must_use]
    pub fn latest(&self, symbol: &str) -> Option<&T> {
        self.entries.iter().rev().find(|e| e.symbol() == symbol)
    }

    /// The most recent `n` entries, oldest first.
    #[must_use]
    pub fn limit(&self, n: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Bound the first delivered batch for `symbol` to the current
    /// size; transparent on every later call.
    pub fn get_limit(&mut self, symbol: Option<&str>, requested: usize) -> usize {
        self.gate.get_limit(symbol, requested, self.entries.len())
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

/// Cache keyed by time bucket: a repeated bucket (e.g. the forming
/// candle's open time) replaces the stored entry in place; new buckets
/// append and evict FIFO.
#[derive(Debug, Clone)]
pub struct ArrayCacheByTimestamp<T> {
    bound: usize,
    entries: VecDeque<T>,
    index: HashMap<i64, usize>,
    base: usize,
    gate: FirstBatchGate,
}

impl<T: Timestamped + Clone> ArrayCacheByTimestamp<T> {
    /// Create a cache holding at most `bound` distinct buckets.
    #[must_use]
    pub fn new(bound: usize) -> Self {
        Self {
            bound,
            entries: VecDeque::new(),
            index: HashMap::new(),
            base: 0,
            gate: FirstBatchGate::default(),
        }
    }

    /// Upsert an entry under its bucket timestamp.
    pub fn append(&mut self, entry: T) {
        let bucket = entry.timestamp();
        if let Some(&seq) = self.index.get(&bucket) {
            self.entries[seq - self.base] = entry;
            return;
        }
        let seq = self.base + self.entries.len();
        self.entries.push_back(entry);
        self.index.insert(bucket, seq);
        if self.entries.len() > self.bound
            && let Some(evicted) = self.entries.pop_front()
        {
            self.index.remove(&evicted.timestamp());
            self.base += 1;
        }
    }

    /// Look up the entry stored for `bucket`.
    #[must_use]
    pub fn get(&self, bucket: i64) -> Option<&T> {
        let seq = *self.index.get(&bucket)?;
        self.entries.get(seq - self.base)
    }

    /// The most recent `n` entries, oldest first.
    #[must_use]
    pub fn limit(&self, n: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Bound the first delivered batch for `symbol` to the current
    /// size; transparent on every later call.
    pub fn get_limit(&mut self, symbol: Option<&str>, requested: usize) -> usize {
        self.gate.get_limit(symbol, requested, self.entries.len())
    }

    /// Number of cached buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

/// Cache keyed by (symbol, side): replace-only, no FIFO eviction; the
/// size equals the number of distinct symbol×side keys seen (used for
/// positions, one long and one short per symbol at most).
#[derive(Debug, Clone, Default)]
pub struct ArrayCacheBySymbolBySide<T> {
    entries: Vec<T>,
    index: HashMap<(String, Side), usize>,
    gate: FirstBatchGate,
}

impl<T: Sided + Clone> ArrayCacheBySymbolBySide<T> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            gate: FirstBatchGate::default(),
        }
    }

    /// Insert or replace the entry for the entry's (symbol, side).
    pub fn append(&mut self, entry: T) {
        let key = (entry.symbol().to_string(), entry.side());
        if let Some(&pos) = self.index.get(&key) {
            self.entries[pos] = entry;
        } else {
            self.index.insert(key, self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Look up the entry stored under (symbol, side).
    #[must_use]
    pub fn get(&self, symbol: &str, side: Side) -> Option<&T> {
        let pos = *self.index.get(&(symbol.to_string(), side))?;
        self.entries.get(pos)
    }

    /// The most recently inserted entry for `symbol` on either side.
    #[must_use]
    pub fn latest(&self, symbol: &str) -> Option<&T> {
        self.entries.iter().rev().find(|e| e.symbol() == symbol)
    }

    /// The most recent `n` entries, oldest first.
    #[must_use]
    pub fn limit(&self, n: usize) -> Vec<T> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries[skip..].to_vec()
    }

    /// Bound the first delivered batch for `symbol` to the current
    /// size; transparent on every later call.
    pub fn get_limit(&mut self, symbol: Option<&str>, requested: usize) -> usize {
        self.gate.get_limit(symbol, requested, self.entries.len())
    }

    /// Number of distinct symbol×side entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing has been inserted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
