//! Enabling and disabling argument checking on a host.
//!
//! [`TypeChecker`] owns one installation at a time: the hook, the resolution
//! cache and the observer slot the cache was registered under. Enabling is
//! idempotent. Disabling tears the installation down and drops the cache,
//! releasing every owner reference it held.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use callguard_core::{CallHook, ContextId, Host, ObserverSlot};

use crate::cache::ResolutionCache;
use crate::config::CheckerConfig;
use crate::error::CheckError;
use crate::interceptor::{StatsSnapshot, TypeCheckHook};
use crate::resolver::Resolver;

struct Installation {
    hook: Arc<TypeCheckHook>,
    slot: ObserverSlot,
}

/// Installs and removes the argument-checking hook.
pub struct TypeChecker {
    config: CheckerConfig,
    installed: Mutex<Option<Installation>>,
}

impl TypeChecker {
    pub fn new(config: CheckerConfig) -> Self {
        Self {
            config,
            installed: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Turns checking on for every execution context of `host`.
    ///
    /// The first call verifies the host's capabilities and refuses to replace
    /// another layer's hook; on any error nothing is installed. Later calls
    /// only install the hook on contexts created since.
    pub fn enable(&self, host: &dyn Host) -> Result<(), CheckError> {
        let mut installed = self.installed.lock();

        if let Some(installation) = installed.as_ref() {
            let ours: Arc<dyn CallHook> = installation.hook.clone();
            let added = install_on_contexts(host, &ours)?;
            if added > 0 {
                info!(contexts = added, "extended type checking to new contexts");
            }
            return Ok(());
        }

        let query = host.referrer_query().ok_or(CheckError::MissingReferrerQuery)?;

        // Refuse before touching anything.
        for context in host.contexts() {
            if let Some(existing) = host.call_hook(context)? {
                return Err(CheckError::HookConflict {
                    context,
                    existing: existing.name().to_string(),
                });
            }
        }

        let cache = Arc::new(ResolutionCache::new());
        let slot = host.register_unit_observer(cache.clone())?;
        let hook = Arc::new(TypeCheckHook::new(
            cache,
            Resolver::new(query),
            host.type_names(),
            self.config.clone(),
        ));

        let ours: Arc<dyn CallHook> = hook.clone();
        let contexts = match install_on_contexts(host, &ours) {
            Ok(count) => count,
            Err(err) => {
                uninstall(host, &ours);
                if let Err(unregister) = host.unregister_unit_observer(slot) {
                    tracing::warn!(error = %unregister, "failed to unregister observer");
                }
                return Err(err);
            }
        };

        info!(
            contexts,
            %slot,
            unsupported = %self.config.unsupported,
            "type checking enabled"
        );
        *installed = Some(Installation { hook, slot });
        Ok(())
    }

    /// Turns checking off, restoring default execution on every context that
    /// still runs our hook.
    pub fn disable(&self, host: &dyn Host) -> Result<(), CheckError> {
        let installation = self.installed.lock().take().ok_or(CheckError::NotEnabled)?;

        let ours: Arc<dyn CallHook> = installation.hook.clone();
        let restored = uninstall(host, &ours);
        host.unregister_unit_observer(installation.slot)?;

        info!(
            contexts = restored,
            cached = installation.hook.cache().len(),
            "type checking disabled"
        );
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.installed.lock().is_some()
    }

    /// Counters of the current installation, if enabled.
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.installed.lock().as_ref().map(|i| i.hook.stats())
    }

    /// Number of units with a cached resolution, if enabled.
    pub fn cache_len(&self) -> Option<usize> {
        self.installed.lock().as_ref().map(|i| i.hook.cache().len())
    }

    /// Number of resolutions performed, if enabled.
    pub fn resolutions(&self) -> Option<u64> {
        self.installed
            .lock()
            .as_ref()
            .map(|i| i.hook.cache().resolutions())
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new(CheckerConfig::default())
    }
}

fn is_ours(hook: &Arc<dyn CallHook>, ours: &Arc<dyn CallHook>) -> bool {
    Arc::as_ptr(hook) as *const u8 == Arc::as_ptr(ours) as *const u8
}

/// Installs `ours` on every context with no hook. Fails on a foreign hook.
fn install_on_contexts(host: &dyn Host, ours: &Arc<dyn CallHook>) -> Result<usize, CheckError> {
    let mut added = 0;
    for context in host.contexts() {
        match host.call_hook(context)? {
            Some(existing) if is_ours(&existing, ours) => {}
            Some(existing) => {
                return Err(CheckError::HookConflict {
                    context,
                    existing: existing.name().to_string(),
                });
            }
            None => {
                host.set_call_hook(context, Some(ours.clone()))?;
                added += 1;
            }
        }
    }
    Ok(added)
}

/// Removes `ours` wherever it is still installed. Returns how many contexts
/// were restored.
fn uninstall(host: &dyn Host, ours: &Arc<dyn CallHook>) -> usize {
    host.contexts()
        .into_iter()
        .filter(|&context| restore_default(host, context, ours))
        .count()
}

fn restore_default(host: &dyn Host, context: ContextId, ours: &Arc<dyn CallHook>) -> bool {
    match host.call_hook(context) {
        Ok(Some(existing)) if is_ours(&existing, ours) => {
            match host.set_call_hook(context, None) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(%context, error = %err, "failed to restore default execution");
                    false
                }
            }
        }
        Ok(_) => false,
        Err(err) => {
            tracing::warn!(%context, error = %err, "failed to read call hook");
            false
        }
    }
}
