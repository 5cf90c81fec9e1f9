//! Session configuration types

use super::state::SkipBudgetPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime knobs of the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// How long ending a session waits for the orchestrator to finish
    #[serde(default = "default_end_grace_period", with = "humantime_serde")]
    pub end_grace_period: Duration,

    /// Pause before the next request after an unobtainable or invalid map
    #[serde(default = "default_failure_cooldown", with = "humantime_serde")]
    pub failure_cooldown: Duration,

    /// Fixed RNG seed for reproducible request sequences
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub skip_budget_policy: SkipBudgetPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            end_grace_period: default_end_grace_period(),
            failure_cooldown: default_failure_cooldown(),
            seed: None,
            skip_budget_policy: SkipBudgetPolicy::default(),
        }
    }
}

fn default_end_grace_period() -> Duration {
    Duration::from_secs(5)
}

fn default_failure_cooldown() -> Duration {
    Duration::from_secs(1)
}
