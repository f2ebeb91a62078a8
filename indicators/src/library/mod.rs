//! The built-in indicator library: a representative set exercising every corner of the
//! framework (trend, volume, order-flow, smart-money and forecasting categories).

pub mod absorption;
pub mod bookmap;
pub mod cvd;
pub mod echo_forecast;
pub mod order_block;
pub mod smart_money_concepts;
pub mod sma;
pub mod trama;
pub mod volume;

use crate::registry::IndicatorRegistry;

/// Registers every built-in indicator under its own id. Called once by
/// [`crate::registry::IndicatorRegistry::with_library_defaults`].
pub fn register_all(registry: &mut IndicatorRegistry) {
    registry.register(sma::Sma);
    registry.register(trama::Trama);
    registry.register(volume::Volume);
    registry.register(cvd::Cvd);
    registry.register(absorption::Absorption);
    registry.register(order_block::OrderBlock);
    registry.register(smart_money_concepts::SmartMoneyConcepts);
    registry.register(echo_forecast::EchoForecast);
    registry.register(bookmap::Bookmap);
}
