//! Checker configuration.
//!
//! Reads configuration from environment variables:
//! - `CALLGUARD_UNSUPPORTED`: what to do with contracts that cannot be
//!   checked, `skip` (default) or `reject`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CheckError;

/// Policy for contracts the checker cannot interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedPolicy {
    /// Log the fault and run the call unchecked.
    #[default]
    Skip,
    /// Raise a `TypeError` describing the fault.
    Reject,
}

impl FromStr for UnsupportedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(UnsupportedPolicy::Skip),
            "reject" => Ok(UnsupportedPolicy::Reject),
            other => Err(format!("unknown policy '{}', expected skip or reject", other)),
        }
    }
}

impl fmt::Display for UnsupportedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedPolicy::Skip => write!(f, "skip"),
            UnsupportedPolicy::Reject => write!(f, "reject"),
        }
    }
}

/// Configuration for the argument checker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// What to do with contracts that cannot be checked. Default: skip.
    pub unsupported: UnsupportedPolicy,
}

impl CheckerConfig {
    pub const ENV_UNSUPPORTED: &'static str = "CALLGUARD_UNSUPPORTED";

    /// Builds a config from the process environment.
    pub fn from_env() -> Result<Self, CheckError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unset keys keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CheckError> {
        let mut config = CheckerConfig::default();
        if let Some(value) = lookup(Self::ENV_UNSUPPORTED) {
            config.unsupported = value.parse().map_err(|_| CheckError::InvalidConfig {
                key: Self::ENV_UNSUPPORTED.to_string(),
                value,
            })?;
        }
        Ok(config)
    }
}
