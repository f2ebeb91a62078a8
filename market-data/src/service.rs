//! Provider registry plus a single global handler, so downstream components depend on the
//! normalized event stream rather than on any particular provider implementation.

use crate::event::{MarketEvent, MarketEventKind};
use crate::exchange::Connector;
use crate::provider::{Handler, MarketDataProvider};
use parking_lot::RwLock;
use std::sync::Arc;

/// Registers any number of [`MarketDataProvider`]s under a name and fans every normalized
/// event they emit out to one global handler. Carries no business logic of its own — the
/// abstraction exists purely so multiple provider implementations can coexist and downstream
/// components never depend on provider specifics.
pub struct UniversalDataService<C> {
    providers: RwLock<Vec<(&'static str, Arc<MarketDataProvider<C>>)>>,
    global_handler: Arc<RwLock<Option<Handler>>>,
}

impl<C: Connector + Send + Sync + 'static> UniversalDataService<C> {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            global_handler: Arc::new(RwLock::new(None)),
        }
    }

    /// Registers `provider` under `name`, wiring its handler to forward into this service's
    /// global handler. A handler set via [`set_handler`](Self::set_handler) before or after
    /// this call takes effect, since every registered provider forwards through the same
    /// shared cell rather than a snapshot taken at registration time.
    pub fn register(&self, name: &'static str, provider: Arc<MarketDataProvider<C>>) {
        let global_handler = Arc::clone(&self.global_handler);
        let forwarding: Handler = Arc::new(move |event: MarketEvent<MarketEventKind>| {
            if let Some(handler) = global_handler.read().clone() {
                handler(event);
            }
        });
        provider.set_handler(forwarding);
        self.providers.write().push((name, provider));
    }

    pub fn provider(&self, name: &str) -> Option<Arc<MarketDataProvider<C>>> {
        self.providers
            .read()
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, provider)| Arc::clone(provider))
    }

    /// Sets the single sink every registered provider's events are forwarded to.
    pub fn set_handler(&self, handler: Handler) {
        *self.global_handler.write() = Some(handler);
    }
}

impl<C: Connector + Send + Sync + 'static> Default for UniversalDataService<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Trade;
    use crate::exchange::binance::BinanceConnector;
    use market_instrument::Symbol;
    use parking_lot::Mutex;

    #[test]
    fn forwards_registered_provider_events_to_global_handler() {
        let service = UniversalDataService::<BinanceConnector>::new();
        let provider = Arc::new(MarketDataProvider::new(BinanceConnector));
        service.register("binance", Arc::clone(&provider));

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        service.set_handler(Arc::new(move |event: MarketEvent<MarketEventKind>| {
            received_clone.lock().push(event);
        }));

        let trade = Trade {
            id: 1,
            price: market_instrument::Price::zero(),
            quantity: market_instrument::Quantity::zero(),
            quote_quantity: market_instrument::Quantity::zero(),
            time: chrono::Utc::now(),
            buyer_is_maker: false,
            aggregate_range: None,
        };
        provider.emit_for_test(Symbol::new("BTCUSDT"), MarketEventKind::Trade(trade));

        assert_eq!(received.lock().len(), 1);
    }
}
