//! Subscription correlation identifier and the map keyed by it.

use derive_more::Display;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Unique identifier for an active data stream (eg/ `"btcusdt@kline_1m"`), used to correlate
/// inbound exchange messages carrying no self-describing symbol/kind back to the
/// [`Subscription`](crate::Identifier) that produced them.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SubscriptionId(SmolStr);

impl SubscriptionId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<S: Into<SmolStr>> From<S> for SubscriptionId {
    fn from(id: S) -> Self {
        Self::new(id)
    }
}

/// Ordered map from [`SubscriptionId`] to whatever value the owning exchange connector needs to
/// reconstruct an event (typically the instrument `Symbol` and stream kind).
#[derive(Debug, Clone, Default)]
pub struct Map<T>(pub IndexMap<SubscriptionId, T>);

impl<T> Map<T> {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, id: SubscriptionId, value: T) {
        self.0.insert(id, value);
    }

    pub fn find(&self, id: &SubscriptionId) -> Option<&T> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_by_id() {
        let mut map = Map::new();
        map.insert(SubscriptionId::new("btcusdt@kline_1m"), "BTCUSDT");
        assert_eq!(
            map.find(&SubscriptionId::new("btcusdt@kline_1m")),
            Some(&"BTCUSDT")
        );
        assert_eq!(map.find(&SubscriptionId::new("ethusdt@kline_1m")), None);
    }
}
