//! Assembled system: every component the builder wired together, plus the event-routing glue
//! that feeds one normalized market event into history, indicator dispatch, broadcast and the
//! bot.

mod builder;

pub use builder::{EngineBuilder, EngineError, System};
