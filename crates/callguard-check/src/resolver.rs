//! Unit-to-function resolution.
//!
//! A call reaches the interceptor with only the compiled unit in hand. The
//! function object carrying the contracts is recovered by asking the host
//! for every live referrer of the unit and taking the first one that is a
//! function.

use std::sync::Arc;

use callguard_core::{FunctionObject, Referrer, ReferrerQuery, UnitId};

/// Recovers the function object that owns a compiled unit.
#[derive(Clone)]
pub struct Resolver {
    query: Arc<dyn ReferrerQuery>,
}

impl Resolver {
    pub fn new(query: Arc<dyn ReferrerQuery>) -> Self {
        Self { query }
    }

    /// Returns the first function object among the unit's referrers.
    ///
    /// When several functions share one unit, which one wins depends on the
    /// host's referrer order. A failed query is logged and treated as "no
    /// owner".
    pub fn resolve(&self, unit: UnitId) -> Option<Arc<FunctionObject>> {
        let referrers = match self.query.find_referrers(unit) {
            Ok(referrers) => referrers,
            Err(err) => {
                tracing::warn!(%unit, error = %err, "referrer query failed");
                return None;
            }
        };

        let owner = referrers.into_iter().find_map(|r| match r {
            Referrer::Function(function) => Some(function),
            Referrer::Other(_) => None,
        });

        match &owner {
            Some(function) => tracing::debug!(%unit, function = %function.name, "resolved owner"),
            None => tracing::debug!(%unit, "unit has no owning function"),
        }
        owner
    }
}
