//! Configuration System
//!
//! Provides hierarchical configuration loading for the runtime skew pass from:
//! - defaults (compiled in)
//! - `dynopt.toml` (optional, working-directory override)
//! - Environment variables (`DYNOPT_*` prefix)
//!
//! ## Example
//!
//! ```toml
//! # dynopt.toml
//! skewed_key_count = 5
//! ```
//!
//! Environment variable override:
//! ```bash
//! DYNOPT_SKEWED_KEY_COUNT=5
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Tunable knobs for [`crate::skew::RuntimeSkewPass`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DynamicOptimizationConfig {
    /// How many of the largest keys to flag as skewed (`identify_skewed_keys`).
    #[serde(default = "default_skewed_key_count")]
    pub skewed_key_count: usize,
}

fn default_skewed_key_count() -> usize {
    3
}

impl Default for DynamicOptimizationConfig {
    fn default() -> Self {
        DynamicOptimizationConfig {
            skewed_key_count: default_skewed_key_count(),
        }
    }
}

impl DynamicOptimizationConfig {
    /// Load configuration from the default locations.
    ///
    /// Merges in order:
    /// 1. compiled-in defaults
    /// 2. `dynopt.toml` (working-directory override)
    /// 3. Environment variables (`DYNOPT_*` prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(DynamicOptimizationConfig::default()))
            .merge(Toml::file("dynopt.toml"))
            .merge(Env::prefixed("DYNOPT_"))
            .extract()
    }

    /// Load configuration from a specific file path, still honoring env overrides.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(DynamicOptimizationConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("DYNOPT_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_skewed_key_count_is_three() {
        assert_eq!(DynamicOptimizationConfig::default().skewed_key_count, 3);
    }

    #[test]
    fn load_without_files_falls_back_to_defaults() {
        // No dynopt.toml in the test working directory, no DYNOPT_* env set.
        let config = DynamicOptimizationConfig::load().expect("figment extraction");
        assert_eq!(config.skewed_key_count, 3);
    }
}
