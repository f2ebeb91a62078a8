//! Centralized candlestick history: the single source of truth every downstream component
//! (footprint aggregator, indicator dispatcher, broadcast layer) reads from instead of
//! maintaining its own parallel price history.

use chrono::{DateTime, Utc};
use market_data::Candle;
use market_instrument::{ExchangeId, Interval, Symbol};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::ops::Range;

/// Default bound on the number of closed candles retained per key.
pub const DEFAULT_BOUND: usize = 500;

/// Identifies one (provider, symbol, interval) history series.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct HistoryKey {
    pub exchange: ExchangeId,
    pub symbol: Symbol,
    pub interval: Interval,
}

impl HistoryKey {
    pub fn new(exchange: ExchangeId, symbol: Symbol, interval: Interval) -> Self {
        Self { exchange, symbol, interval }
    }
}

/// A detected discontinuity in open-times for one key: the bar count and inclusive time range
/// of the candles that were never observed.
#[derive(Debug, Clone, PartialEq)]
pub struct GapReport {
    pub key: HistoryKey,
    pub missing_open_times: Range<DateTime<Utc>>,
}

/// Outcome of [`CandleHistoryStore::add`].
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    /// The candle revised the most-recently-stored bar in place (same open-time).
    Revised,
    /// The candle was appended as the very next bar.
    Appended,
    /// The candle was appended after a detected gap.
    AppendedAfterGap(GapReport),
    /// The candle's open-time was not after the last stored bar; dropped as late.
    DroppedLate,
}

/// Per-(provider,symbol,interval) bounded buffer of closed candles, newest last.
///
/// Single-writer-per-key: callers serialize their own `add` calls per key (the market-data
/// provider only ever emits one event stream per key). Readers get a cloned snapshot so a
/// slow consumer can never hold the store's lock open across its own processing.
#[derive(Debug, Default)]
pub struct CandleHistoryStore {
    bound: usize,
    series: RwLock<HashMap<HistoryKey, VecDeque<Candle>>>,
}

impl CandleHistoryStore {
    pub fn new(bound: usize) -> Self {
        Self { bound, series: RwLock::new(HashMap::new()) }
    }

    /// Inserts `candle` under `key`, applying the revise/append/gap/drop rules from the store's
    /// invariant (strictly increasing open-time per key).
    pub fn add(&self, key: &HistoryKey, candle: Candle) -> AddOutcome {
        let mut series = self.series.write();
        let bars = series.entry(key.clone()).or_default();

        let Some(last) = bars.back().copied() else {
            bars.push_back(candle);
            return AddOutcome::Appended;
        };

        if candle.open_time == last.open_time {
            *bars.back_mut().expect("checked non-empty above") = candle;
            return AddOutcome::Revised;
        }

        if candle.open_time <= last.open_time {
            return AddOutcome::DroppedLate;
        }

        let step = key.interval.duration();
        let expected_next = last.open_time + chrono::Duration::from_std(step).unwrap_or_default();
        let outcome = if candle.open_time == expected_next {
            AddOutcome::Appended
        } else {
            AddOutcome::AppendedAfterGap(GapReport {
                key: key.clone(),
                missing_open_times: expected_next..candle.open_time,
            })
        };

        bars.push_back(candle);
        while bars.len() > self.bound {
            bars.pop_front();
        }
        outcome
    }

    /// Up to `n` most recent candles for `key`, oldest first.
    pub fn last_n(&self, key: &HistoryKey, n: usize) -> Vec<Candle> {
        let series = self.series.read();
        match series.get(key) {
            Some(bars) => bars.iter().rev().take(n).rev().copied().collect(),
            None => Vec::new(),
        }
    }

    pub fn has_enough_data(&self, key: &HistoryKey, n: usize) -> bool {
        self.series.read().get(key).map(|bars| bars.len() >= n).unwrap_or(false)
    }

    /// Inclusive slice by open-time.
    pub fn range(&self, key: &HistoryKey, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Candle> {
        let series = self.series.read();
        match series.get(key) {
            Some(bars) => bars
                .iter()
                .filter(|candle| candle.open_time >= start && candle.open_time <= end)
                .copied()
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn len(&self, key: &HistoryKey) -> usize {
        self.series.read().get(key).map(VecDeque::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::Candle;
    use market_instrument::{Price, Quantity};
    use rust_decimal_macros::dec;

    fn candle_at(minute: i64) -> Candle {
        let open_time = DateTime::<Utc>::from_timestamp(minute * 60, 0).unwrap();
        let close_time = open_time + chrono::Duration::minutes(1);
        Candle::new(
            Interval::OneMinute,
            open_time,
            close_time,
            Price::new(dec!(1)),
            Price::new(dec!(1)),
            Price::new(dec!(1)),
            Price::new(dec!(1)),
            Quantity::zero(),
            Quantity::zero(),
            0,
            true,
        )
        .unwrap()
    }

    fn key() -> HistoryKey {
        HistoryKey::new(ExchangeId::Mock, Symbol::new("BTCUSDT"), Interval::OneMinute)
    }

    #[test]
    fn appends_sequential_candles() {
        let store = CandleHistoryStore::new(DEFAULT_BOUND);
        assert_eq!(store.add(&key(), candle_at(0)), AddOutcome::Appended);
        assert_eq!(store.add(&key(), candle_at(1)), AddOutcome::Appended);
        assert_eq!(store.last_n(&key(), 2).len(), 2);
    }

    #[test]
    fn revises_same_open_time() {
        let store = CandleHistoryStore::new(DEFAULT_BOUND);
        store.add(&key(), candle_at(0));
        assert_eq!(store.add(&key(), candle_at(0)), AddOutcome::Revised);
        assert_eq!(store.len(&key()), 1);
    }

    #[test]
    fn detects_gap() {
        let store = CandleHistoryStore::new(DEFAULT_BOUND);
        store.add(&key(), candle_at(0));
        let outcome = store.add(&key(), candle_at(5));
        assert!(matches!(outcome, AddOutcome::AppendedAfterGap(_)));
    }

    #[test]
    fn drops_late_candle() {
        let store = CandleHistoryStore::new(DEFAULT_BOUND);
        store.add(&key(), candle_at(5));
        assert_eq!(store.add(&key(), candle_at(1)), AddOutcome::DroppedLate);
        assert_eq!(store.len(&key()), 1);
    }

    #[test]
    fn evicts_fifo_beyond_bound() {
        let store = CandleHistoryStore::new(3);
        for minute in 0..5 {
            store.add(&key(), candle_at(minute));
        }
        assert_eq!(store.len(&key()), 3);
        let remaining = store.last_n(&key(), 3);
        assert_eq!(remaining[0].open_time, candle_at(2).open_time);
    }
}
