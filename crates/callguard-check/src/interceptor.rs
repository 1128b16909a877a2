//! The call hook installed on every execution context.
//!
//! For each call: resolve the unit's owning function through the cache,
//! check the bound arguments against its contracts, then either delegate to
//! the host's default execution or raise a `TypeError` without running the
//! callee.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use callguard_core::{CallError, CallFrame, CallHook, CompiledUnit, DefaultCall, TypeNames, Value};

use crate::cache::ResolutionCache;
use crate::config::{CheckerConfig, UnsupportedPolicy};
use crate::contracts::check::check_call;
use crate::contracts::CheckOutcome;
use crate::resolver::Resolver;

/// Name reported by [`TypeCheckHook::name`].
pub const HOOK_NAME: &str = "callguard";

/// Running counters for one installation.
#[derive(Debug, Default)]
pub struct HookStats {
    intercepted: AtomicU64,
    unchecked: AtomicU64,
    checked: AtomicU64,
    rejected: AtomicU64,
    faults: AtomicU64,
}

/// Point-in-time copy of [`HookStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Every call that reached the hook.
    pub intercepted: u64,
    /// Calls delegated without checking: no owner, or no contracts.
    pub unchecked: u64,
    /// Calls whose contracts all held.
    pub checked: u64,
    /// Calls refused with a violation or a rejected fault.
    pub rejected: u64,
    /// Contracts that could not be checked.
    pub faults: u64,
}

impl HookStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            intercepted: self.intercepted.load(Ordering::Relaxed),
            unchecked: self.unchecked.load(Ordering::Relaxed),
            checked: self.checked.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Checks declared argument contracts before delegating to default execution.
pub struct TypeCheckHook {
    cache: Arc<ResolutionCache>,
    resolver: Resolver,
    names: Arc<dyn TypeNames>,
    config: CheckerConfig,
    stats: HookStats,
}

impl TypeCheckHook {
    pub fn new(
        cache: Arc<ResolutionCache>,
        resolver: Resolver,
        names: Arc<dyn TypeNames>,
        config: CheckerConfig,
    ) -> Self {
        Self {
            cache,
            resolver,
            names,
            config,
            stats: HookStats::default(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }
}

impl CallHook for TypeCheckHook {
    fn name(&self) -> &str {
        HOOK_NAME
    }

    fn on_call(
        &self,
        unit: &CompiledUnit,
        frame: &mut CallFrame,
        next: &dyn DefaultCall,
    ) -> Result<Value, CallError> {
        HookStats::bump(&self.stats.intercepted);

        let entry = self
            .cache
            .get_or_resolve(unit.id, || self.resolver.resolve(unit.id));

        let function = match entry.owner() {
            Some(function) if function.has_contracts() => function,
            _ => {
                HookStats::bump(&self.stats.unchecked);
                return next.execute(unit, frame);
            }
        };

        match check_call(function, unit, frame, self.names.as_ref()) {
            Ok(CheckOutcome::Pass) => {
                HookStats::bump(&self.stats.checked);
                next.execute(unit, frame)
            }
            Ok(CheckOutcome::Violation(violation)) => {
                HookStats::bump(&self.stats.rejected);
                tracing::debug!(
                    function = %function.name,
                    param = %violation.param,
                    "argument contract violated"
                );
                Err(CallError::type_error(violation.message()))
            }
            Err(fault) => {
                HookStats::bump(&self.stats.faults);
                match self.config.unsupported {
                    UnsupportedPolicy::Skip => {
                        if self.cache.mark_faulted(unit.id) {
                            tracing::warn!(
                                function = %function.name,
                                error = %fault,
                                "skipping contract check"
                            );
                        } else {
                            tracing::trace!(
                                function = %function.name,
                                "skipping contract check"
                            );
                        }
                        HookStats::bump(&self.stats.unchecked);
                        next.execute(unit, frame)
                    }
                    UnsupportedPolicy::Reject => {
                        HookStats::bump(&self.stats.rejected);
                        Err(CallError::type_error(fault.to_string()))
                    }
                }
            }
        }
    }
}
