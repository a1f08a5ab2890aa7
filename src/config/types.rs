//! Typed configuration values.

use crate::criteria::DEFAULT_SLICE;
use serde::{Deserialize, Serialize};

pub const COUNT_CAP_PATH: &str = "mshop/common/manager/maxcount";
pub const AGGREGATE_CAP_PATH: &str = "mshop/common/manager/aggregate/maxcount";
pub const SLICE_PATH: &str = "mshop/common/manager/slice";

/// Rows a total count visits at most; larger totals are reported as this value.
pub const DEFAULT_COUNT_CAP: u64 = 10_000;

/// Field rule applied before an item is saved.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    /// `email` or `date` (YYYY-MM-DD).
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

/// Manager limits read from the configuration tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub count_cap: u64,
    /// `None` counts references exactly.
    pub aggregate_cap: Option<u64>,
    /// Page size of searches created by the managers.
    pub slice_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            count_cap: DEFAULT_COUNT_CAP,
            aggregate_cap: None,
            slice_size: DEFAULT_SLICE,
        }
    }
}
