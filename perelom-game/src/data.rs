//! Static stat catalog: display names and the narrative poles each
//! attribute collapses toward at the low and high end of the scale.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::stats::StatKey;

const DEFAULT_STATS_DATA: &str = include_str!("../assets/data/stats.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatInfo {
    pub name: String,
    #[serde(default)]
    pub low: String,
    #[serde(default)]
    pub high: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatCatalog(pub HashMap<StatKey, StatInfo>);

impl StatCatalog {
    /// Load a catalog from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into valid stat data.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_STATS_DATA).unwrap_or_default()
    }

    /// Process-wide catalog built from the embedded asset.
    pub fn global() -> &'static Self {
        static CATALOG: OnceLock<StatCatalog> = OnceLock::new();
        CATALOG.get_or_init(Self::load_from_static)
    }

    #[must_use]
    pub fn get_safe(&self, key: StatKey) -> StatInfo {
        self.0.get(&key).cloned().unwrap_or_else(|| StatInfo {
            name: key.as_str().to_string(),
            ..StatInfo::default()
        })
    }
}
