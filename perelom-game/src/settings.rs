//! Player-chosen start settings and the procedurally rolled start kit.
//!
//! The rolling itself (content pools, probabilities) belongs to the content
//! layer; this module only fixes the shapes that state initialization
//! consumes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::calendar::Pace;
use crate::stats::StatKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    /// How the hero is referred to in generation prompts.
    #[must_use]
    pub const fn hero_noun(self) -> &'static str {
        match self {
            Self::Male => "a boy",
            Self::Female => "a girl",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Village,
    Town,
    #[default]
    Capital,
}

impl LocationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Village => "village",
            Self::Town => "town",
            Self::Capital => "capital",
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location already resolved against the external content tables: the
/// classification plus the display name and flavor text the prompts use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocationInfo {
    #[serde(default)]
    pub kind: LocationKind,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub desc: String,
}

/// Everything the player fixes at game creation. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSettings {
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub location: LocationInfo,
    #[serde(default)]
    pub pace: Pace,
    #[serde(default)]
    pub difficulty: crate::state::Difficulty,
    #[serde(default = "default_start_age")]
    pub start_age: i32,
}

fn default_start_age() -> i32 {
    crate::constants::DEFAULT_START_AGE
}

impl Default for StartSettings {
    fn default() -> Self {
        Self {
            gender: Gender::default(),
            location: LocationInfo::default(),
            pace: Pace::default(),
            difficulty: crate::state::Difficulty::default(),
            start_age: default_start_age(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartNpc {
    pub name: String,
    pub desc: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartItem {
    pub name: String,
    pub desc: String,
    pub stat: StatKey,
    #[serde(rename = "mod")]
    pub modifier: i32,
}

/// Output shape of the start-kit roller: companions, starting items, and
/// the aggregate stat modifiers those items contribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartKit {
    #[serde(default)]
    pub npcs: Vec<StartNpc>,
    #[serde(default)]
    pub items: Vec<StartItem>,
    #[serde(default)]
    pub stat_mods: HashMap<StatKey, i32>,
}

impl Default for StartKit {
    /// The minimal kit used when nothing was rolled: one companion, empty
    /// pockets, untouched stats.
    fn default() -> Self {
        Self {
            npcs: vec![StartNpc {
                name: "Mom".to_string(),
                desc: "Nearby, as always.".to_string(),
            }],
            items: Vec::new(),
            stat_mods: HashMap::new(),
        }
    }
}
