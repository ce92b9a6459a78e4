//! Execution configuration
//!
//! Parameters are plain serde data so callers can pass them as JSON next to
//! a query. Unknown sort names and inconsistent flag combinations are only
//! rejected by [`ExecutionConfig::validate`], which runs before any
//! posting is read.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::{PartitionStrategy, SortStrategy};

/// Default number of results when `requested` is not given
pub const DEFAULT_REQUESTED: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Result limit K; negative means unbounded, 0 returns nothing
    pub requested: i64,
    /// Sentinel ordering criterion, see [`SortStrategy`]
    pub sort: String,
    /// Group dependent contributors with their anchor
    #[serde(alias = "dependence_aware", alias = "dependenceAware")]
    pub dependency_aware: bool,
    /// Expand queries with adjacent-pair window features when compiling
    #[serde(alias = "seqdep")]
    pub sequential_dependence: bool,
    /// Re-score the provisional set with exact replacements
    #[serde(alias = "twopass")]
    pub completion: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            requested: DEFAULT_REQUESTED,
            sort: SortStrategy::Length.name().to_string(),
            dependency_aware: false,
            sequential_dependence: false,
            completion: false,
        }
    }
}

impl ExecutionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn with_requested(mut self, requested: i64) -> Self {
        self.requested = requested;
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn with_dependency_aware(mut self, enabled: bool) -> Self {
        self.dependency_aware = enabled;
        self
    }

    pub fn with_sequential_dependence(mut self, enabled: bool) -> Self {
        self.sequential_dependence = enabled;
        self
    }

    pub fn with_completion(mut self, enabled: bool) -> Self {
        self.completion = enabled;
        self
    }

    /// Result limit, `None` when unbounded
    pub fn limit(&self) -> Option<usize> {
        usize::try_from(self.requested).ok()
    }

    /// Resolve the partition strategy for a query compiled with or without
    /// sequential dependence features.
    pub fn validate(&self, sequential_dependence: bool) -> Result<PartitionStrategy> {
        let sort: SortStrategy = self.sort.parse()?;
        if self.dependency_aware && !sequential_dependence {
            return Err(Error::Configuration(
                "dependency-aware ordering requires a query compiled with sequential dependence"
                    .to_string(),
            ));
        }
        Ok(PartitionStrategy {
            sort,
            dependency_aware: self.dependency_aware,
        })
    }
}
