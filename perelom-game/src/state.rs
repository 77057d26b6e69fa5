//! The single mutable game-state container.
//!
//! `GameState` is created once from the player's start settings plus the
//! rolled start kit, mutated every turn by the engine and its resolvers,
//! and persisted whole. Every field that postdates the first save format
//! carries a serde default so older serializations load cleanly instead of
//! failing.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calendar::{self, Pace, TimePreview};
use crate::constants::{
    DEFAULT_START_AGE, DEFAULT_START_YEAR, HISTORY_LIMIT, NO_DESCRIPTION, STAT_MAX, STAT_MIN,
};
use crate::lore::LoreBook;
use crate::parse::ReplyUpdates;
use crate::settings::{Gender, LocationKind, StartKit, StartSettings};
use crate::stats::{StatKey, Stats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Normal,
    Hardcore,
}

impl Difficulty {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Hardcore => "hardcore",
        }
    }

    /// Hardcore offers one fewer option per turn.
    #[must_use]
    pub const fn choices_count(self) -> usize {
        match self {
            Self::Normal => 4,
            Self::Hardcore => 3,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "hardcore" => Ok(Self::Hardcore),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn, persisted verbatim (assistant entries keep the
/// raw reply text, JSON and all, so replays stay faithful).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One offered action: a short label plus the long-form instruction that is
/// resubmitted verbatim when the player picks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Choice {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub action: String,
}

impl Choice {
    /// The text a presentation layer should submit for this choice.
    #[must_use]
    pub fn action_text(&self) -> &str {
        if self.action.is_empty() {
            &self.text
        } else {
            &self.action
        }
    }
}

/// Structured epilogue payload, present only once the game has ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GameOverData {
    #[serde(default)]
    pub epilogue: String,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub epitaph: String,
}

fn default_true() -> bool {
    true
}

fn default_year() -> i32 {
    DEFAULT_START_YEAR
}

fn default_age() -> i32 {
    DEFAULT_START_AGE
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub location_type: LocationKind,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    /// Resolved display name of the location, e.g. "Moscow".
    #[serde(default)]
    pub location_name: String,
    /// Resolved flavor text of the location.
    #[serde(default)]
    pub location_desc: String,
    #[serde(default)]
    pub pace: Pace,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_age")]
    pub start_age: i32,
    #[serde(default = "default_year")]
    pub year: i32,
    #[serde(default)]
    pub season_idx: u8,
    #[serde(default = "default_age")]
    pub age: i32,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub inventory: LoreBook,
    #[serde(default)]
    pub npcs: LoreBook,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub game_over_data: Option<GameOverData>,
    #[serde(default)]
    pub miracle_used: bool,
    #[serde(default = "default_true")]
    pub miracle_available: bool,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub life_summary: String,
    #[serde(default)]
    pub last_summary_turn: u32,
    #[serde(default)]
    pub last_story: Option<String>,
    #[serde(default)]
    pub last_choices: Vec<Choice>,
    #[serde(default)]
    pub last_miracle: Option<String>,
    #[serde(default)]
    pub seed: u64,
    #[serde(skip)]
    pub rng: Option<ChaCha20Rng>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(&StartSettings::default(), &StartKit::default(), 0)
    }
}

impl GameState {
    /// Build a fresh state from the player's settings and the rolled kit.
    /// Stats start at the norm, then the kit's aggregate modifiers land,
    /// clamped to the scale.
    #[must_use]
    pub fn new(settings: &StartSettings, kit: &StartKit, seed: u64) -> Self {
        let mut stats = Stats::default();
        for (&key, &modifier) in &kit.stat_mods {
            stats.set(key, (stats.get(key) + modifier).clamp(STAT_MIN, STAT_MAX));
        }

        let mut npcs = LoreBook::default();
        for npc in &kit.npcs {
            npcs.add_or_ignore(&npc.name, &npc.desc);
        }
        let mut inventory = LoreBook::default();
        for item in &kit.items {
            inventory.add_or_ignore(&item.name, &item.desc);
        }

        Self {
            gender: settings.gender,
            location_type: settings.location.kind,
            region: settings.location.region.clone(),
            city: settings.location.city.clone(),
            location_name: settings.location.full_name.clone(),
            location_desc: settings.location.desc.clone(),
            pace: settings.pace,
            difficulty: settings.difficulty,
            start_age: settings.start_age,
            year: DEFAULT_START_YEAR,
            season_idx: 0,
            age: settings.start_age,
            stats,
            inventory,
            npcs,
            history: Vec::new(),
            game_over: false,
            game_over_data: None,
            miracle_used: false,
            miracle_available: matches!(settings.difficulty, Difficulty::Normal),
            turn_count: 0,
            life_summary: String::new(),
            last_summary_turn: 0,
            last_story: None,
            last_choices: Vec::new(),
            last_miracle: None,
            seed,
            rng: Some(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    /// Re-attach runtime-only fields after deserialization.
    #[must_use]
    pub fn rehydrate(mut self) -> Self {
        if self.rng.is_none() {
            self.rng = Some(ChaCha20Rng::seed_from_u64(self.seed));
        }
        self
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha20Rng {
        let seed = self.seed;
        self.rng
            .get_or_insert_with(|| ChaCha20Rng::seed_from_u64(seed))
    }

    #[must_use]
    pub const fn choices_count(&self) -> usize {
        self.difficulty.choices_count()
    }

    /// "Winter 1993" for the current period.
    #[must_use]
    pub fn date_label(&self) -> String {
        calendar::date_label(self.season_idx, self.year)
    }

    /// The period the upcoming turn will transition into.
    #[must_use]
    pub const fn peek_next_time(&self) -> TimePreview {
        calendar::peek_next(self.pace, self.season_idx, self.year)
    }

    /// Commit the time advance previewed by [`Self::peek_next_time`],
    /// aging the hero whenever the year rolls over.
    pub fn advance_time(&mut self) {
        let next = self.peek_next_time();
        if next.year > self.year {
            self.age += 1;
        }
        self.season_idx = next.season_idx;
        self.year = next.year;
    }

    /// Append a resolved exchange, discarding the oldest entries past the cap.
    pub fn push_turn_history(&mut self, action: &str, raw_reply: &str) {
        self.history.push(HistoryEntry::user(action));
        self.history.push(HistoryEntry::assistant(raw_reply));
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// Keep only the most recent `keep` entries (post-compaction truncation).
    pub fn truncate_history_to(&mut self, keep: usize) {
        if self.history.len() > keep {
            let excess = self.history.len() - keep;
            self.history.drain(..excess);
        }
    }

    /// Apply a well-formed reply's update block: stat deltas through the
    /// viscosity gate, then the entity instructions in a fixed order. Entity
    /// update stamps use the current (pre-advance) period label.
    pub fn apply_updates(&mut self, updates: &ReplyUpdates) {
        let stamp = self.date_label();

        let seed = self.seed;
        let rng = self
            .rng
            .get_or_insert_with(|| ChaCha20Rng::seed_from_u64(seed));
        for key in StatKey::ALL {
            if let Some(delta) = updates.stat_delta(key) {
                self.stats.apply_delta(key, delta, rng);
            }
        }

        if let Some(add) = &updates.add_item {
            self.inventory
                .add_or_ignore(&add.name, add.desc.as_deref().unwrap_or(NO_DESCRIPTION));
        }
        if let Some(name) = &updates.remove_item {
            self.inventory.remove(name);
        }
        if let Some(update) = &updates.update_item
            && let Some(desc) = &update.desc
        {
            self.inventory.append_update(&update.name, desc, &stamp);
        }

        if let Some(add) = &updates.add_npc {
            self.npcs
                .add_or_ignore(&add.name, add.desc.as_deref().unwrap_or(NO_DESCRIPTION));
        }
        if let Some(name) = &updates.remove_npc {
            self.npcs.remove(name);
        }
        if let Some(update) = &updates.update_npc
            && let Some(desc) = &update.desc
        {
            self.npcs.append_update(&update.name, desc, &stamp);
        }
    }
}
