//! Transform configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Upper bound on the number of cursors a single cursor-set request yields.
    pub max_parallel_cursors: usize,

    /// Whether a transform may split one upstream cursor into several.
    pub split_cursors: bool,

    /// Overrides the parallelism advice when set.
    pub force_parallel: Option<bool>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_parallel_cursors: 4,
            split_cursors: true,
            force_parallel: None,
        }
    }
}

impl TransformConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ROWMAP_MAX_PARALLEL_CURSORS`: cursor-set upper bound (min 1)
    /// - `ROWMAP_SPLIT_CURSORS`: `true`/`false`
    /// - `ROWMAP_FORCE_PARALLEL`: `true`/`false`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(s) = lookup("ROWMAP_MAX_PARALLEL_CURSORS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_cursors = v.max(1);
            }
        }

        if let Some(s) = lookup("ROWMAP_SPLIT_CURSORS") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.split_cursors = v;
            }
        }

        if let Some(s) = lookup("ROWMAP_FORCE_PARALLEL") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.force_parallel = Some(v);
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_parallel_cursors == 0 {
            return Err(Error::Config("max_parallel_cursors must be at least 1".into()));
        }
        Ok(())
    }

    /// Requested cursor count clamped to `1..=max_parallel_cursors`.
    pub fn clamp_cursors(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_parallel_cursors.max(1))
    }
}
