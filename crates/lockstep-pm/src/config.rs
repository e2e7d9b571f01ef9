//! Resolver configuration.
//!
//! Read from the `config` object of the root manifest and then overridden by
//! `LOCKSTEP_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::solver::SolverBudget;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub solver: SolverConfig,
    pub prefer_stable: Option<bool>,
    pub prefer_lowest: Option<bool>,
    pub ignore_platform_reqs: bool,
    pub lock_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SolverConfig {
    /// Upper bound on solver loop iterations
    pub max_steps: u64,
    /// Wall-clock limit in seconds, 0 disables it
    pub timeout_secs: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            timeout_secs: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            solver: SolverConfig::default(),
            prefer_stable: None,
            prefer_lowest: None,
            ignore_platform_reqs: false,
            lock_file: PathBuf::from("composer.lock"),
        }
    }
}

impl Config {
    /// Build a config from the manifest `config` object. Unknown keys
    /// (including `platform`) are ignored.
    pub fn from_manifest_value(value: &serde_json::Value) -> crate::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Apply `LOCKSTEP_*` overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(|key| std::env::var(key).ok());
        self
    }

    /// Apply overrides using the given variable lookup. Values that fail to
    /// parse are logged and skipped.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("LOCKSTEP_MAX_STEPS") {
            match value.trim().parse() {
                Ok(steps) => self.solver.max_steps = steps,
                Err(_) => log::warn!("Ignoring invalid LOCKSTEP_MAX_STEPS value {:?}", value),
            }
        }

        if let Some(value) = lookup("LOCKSTEP_TIMEOUT") {
            match value.trim().parse() {
                Ok(secs) => self.solver.timeout_secs = secs,
                Err(_) => log::warn!("Ignoring invalid LOCKSTEP_TIMEOUT value {:?}", value),
            }
        }

        if let Some(value) = lookup("LOCKSTEP_PREFER_LOWEST") {
            match parse_flag(&value) {
                Some(flag) => self.prefer_lowest = Some(flag),
                None => log::warn!("Ignoring invalid LOCKSTEP_PREFER_LOWEST value {:?}", value),
            }
        }
    }

    pub fn budget(&self) -> SolverBudget {
        SolverBudget {
            max_steps: self.solver.max_steps,
            time_limit: match self.solver.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
