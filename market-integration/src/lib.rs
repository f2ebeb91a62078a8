#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]
//! Low-level framework for composing WebSocket and REST integrations with
//! market-data exchanges: translates raw wire messages into a generic output
//! model using exchange-specific transformers, with reconnect backoff and
//! request/response correlation provided once here rather than per exchange.

use crate::error::SocketError;
use serde::{Deserialize, Serialize};

/// Errors produced by the protocol layer.
pub mod error;

/// `StreamParser`/`RestClient` implementations for WebSocket and HTTP transports.
pub mod protocol;

/// Reconnect backoff schedule.
pub mod backoff;

/// `Tx` abstraction over channel kinds used to forward transformed events.
pub mod channel;

/// `SubscriptionId` newtype and the `Map<T>` correlation table keyed by it.
pub mod subscription;

/// [`Validator`]s are capable of determining if their internal state is satisfactory to fulfil
/// some use case defined by the implementor.
pub trait Validator {
    /// Check if `Self` is valid for some use case.
    fn validate(self) -> Result<Self, SocketError>
    where
        Self: Sized;
}

/// [`Transformer`]s are capable of transforming any `Input` into an iterator of
/// `Result<Self::Output, Self::Error>`s.
pub trait Transformer {
    type Error;
    type Input: for<'de> Deserialize<'de>;
    type Output;
    type OutputIter: IntoIterator<Item = Result<Self::Output, Self::Error>>;
    fn transform(&mut self, input: Self::Input) -> Self::OutputIter;
}

/// Identifies the value used to associate `Self` with some unique `T`, eg/ correlating an
/// inbound exchange message with the [`SubscriptionId`](subscription::SubscriptionId) it answers.
pub trait Identifier<T> {
    fn id(&self) -> T;
}

/// Determines if something is considered "unrecoverable", such as an unrecoverable error.
///
/// Note that the meaning of [`Unrecoverable`] may vary depending on the context.
pub trait Unrecoverable {
    fn is_unrecoverable(&self) -> bool;
}

/// Trait that communicates if something is terminal (eg/ requires shutdown or restart).
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}

/// Indicates a stream has ended, prompting the reconnect task to act.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize,
)]
pub struct FeedEnded;
