//! Weight sources for bound items.
//!
//! A weight is the number of slots per round an item asks for. It is either a
//! fixed number validated at registration, or a function evaluated once at the
//! start of every round.

use std::fmt;
use std::sync::Arc;

use crate::core::SchedulerError;

/// Evaluator for a dynamic weight.
pub type WeightFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Current weight of one bound item.
#[derive(Clone)]
pub enum WeightSource {
    /// Fixed weight.
    Constant(f64),
    /// Weight re-evaluated every round.
    Dynamic(WeightFn),
}

impl WeightSource {
    /// Validated constant weight.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidWeight` for negative, NaN or infinite values.
    pub fn constant(weight: f64) -> Result<Self, SchedulerError> {
        if weight.is_finite() && weight >= 0.0 {
            Ok(Self::Constant(weight))
        } else {
            Err(SchedulerError::InvalidWeight { weight })
        }
    }

    /// Weight computed by `f` at the start of every round.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Whether the weight is re-evaluated every round.
    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }

    /// Evaluate the weight for the current round.
    ///
    /// Dynamic evaluators may return anything; unusable values are mapped to 0.
    #[must_use]
    pub fn evaluate(&self) -> f64 {
        match self {
            Self::Constant(w) => *w,
            Self::Dynamic(f) => effective_weight(f()),
        }
    }
}

impl fmt::Debug for WeightSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(w) => f.debug_tuple("Constant").field(w).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Clamp a raw weight to the range the allocator accepts: negative, NaN and
/// infinite weights contribute nothing.
#[must_use]
pub fn effective_weight(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        0.0
    }
}
