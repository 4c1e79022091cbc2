//! Reliability tags and versioned values.
//!
//! Every cached value carries a [`Reliability`] describing how much the cache
//! trusts it. An incoming value replaces a cached one only when its
//! reliability is at least as high as the cached reliability.

use serde::{Deserialize, Serialize};

/// Confidence level attached to a cached value.
///
/// Totally ordered: `Empty < Defaults < Current`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Placeholder inserted before any data was loaded.
    #[default]
    Empty,
    /// Values computed from defaults or detected automatically.
    Defaults,
    /// Values confirmed by the owner of the root (e.g. set explicitly).
    Current,
}

impl Reliability {
    /// Returns true if a value tagged `incoming` may replace a value tagged `self`.
    ///
    /// Equal reliability replaces; only strictly lower reliability is rejected.
    #[must_use]
    pub fn admits(self, incoming: Reliability) -> bool {
        incoming >= self
    }
}

/// A value paired with its reliability.
///
/// Never mutated in place: an accepted update replaces the whole pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The payload.
    pub value: T,
    /// How much the payload is trusted.
    pub reliability: Reliability,
}

impl<T> Versioned<T> {
    /// Creates a new versioned value.
    #[must_use]
    pub fn new(value: T, reliability: Reliability) -> Self {
        Self { value, reliability }
    }

    /// Creates a placeholder value with [`Reliability::Empty`].
    #[must_use]
    pub fn empty(value: T) -> Self {
        Self::new(value, Reliability::Empty)
    }

    /// Returns true if `incoming` may replace this value.
    #[must_use]
    pub fn accepts(&self, incoming: Reliability) -> bool {
        self.reliability.admits(incoming)
    }

    /// Maps the payload, keeping the reliability.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            value: f(self.value),
            reliability: self.reliability,
        }
    }
}
