#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]
//! The indicator framework: a type-erased contract every indicator implements, a validated
//! parameter schema, a visualization-shape protocol, an id-to-factory registry, and the
//! per-instance lifecycle/dispatch layer that routes market data to live instances.

/// Parameter schema declaration and validation against caller-supplied input.
pub mod params;

/// The box/line/marker/arrow/fill visualization protocol and its deduplication rule.
pub mod shape;

/// The `Indicator`/`DynIndicator` contract, data-type declarations and result types.
pub mod contract;

/// Id-to-factory registry every indicator registers itself with.
pub mod registry;

/// Per-instance identity, state and lifecycle bookkeeping, plus the manager that creates,
/// destroys and routes events to instances.
pub mod instance;

/// Routes inbound market events to the instances that declared a need for them.
pub mod dispatcher;

/// The built-in indicator library.
pub mod library;

pub use contract::{
    Category, DataType, HistoricalPoint, Indicator, IndicatorResult, PanePlacement, PriceSource,
    RenderKind, SeriesVisual,
};
pub use dispatcher::Dispatcher;
pub use instance::{IndicatorInstance, InstanceError, InstanceKey, InstanceManager};
pub use params::{ParamError, ParamSpec, ParamType, ParamValue, Params};
pub use registry::IndicatorRegistry;
pub use shape::{dedup_shapes, Shape, ShapeDedupKey};
