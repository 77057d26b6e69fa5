//! Centralized balance and tuning constants for the Perelom turn engine.
//!
//! These values define the deterministic math for the core loop. Keeping
//! them together ensures gameplay can only be adjusted via code changes
//! reviewed in version control, rather than scattered magic numbers.

// Stat scale ---------------------------------------------------------------
pub(crate) const STAT_MIN: i32 = 0;
pub(crate) const STAT_MAX: i32 = 10;
pub(crate) const STAT_NORM: i32 = 5;
/// A single reply may move one stat by at most this much in either direction.
pub(crate) const MAX_DELTA_PER_STAT: i32 = 2;
/// Raising a stat already at or above this value is viscosity-gated.
pub(crate) const VISCOSITY_HIGH_GATE: i32 = 6;
/// Lowering a stat already at or below this value is viscosity-gated.
pub(crate) const VISCOSITY_LOW_GATE: i32 = 4;
/// Chance that a gated delta still applies.
pub(crate) const VISCOSITY_GATE_CHANCE: f64 = 0.5;

// Miracle ------------------------------------------------------------------
/// A critical-low stat rebounds to this value after the one-shot miracle.
pub(crate) const MIRACLE_LOW_RESET: i32 = 3;
/// A critical-high stat settles to this value after the one-shot miracle.
pub(crate) const MIRACLE_HIGH_RESET: i32 = 7;

// Conversation bounds ------------------------------------------------------
/// Raw history entries kept verbatim; oldest are discarded first.
pub(crate) const HISTORY_LIMIT: usize = 20;
/// Turns between life-summary compactions.
pub(crate) const SUMMARY_INTERVAL: u32 = 10;
/// Compaction only runs once this many raw entries have accumulated.
pub(crate) const SUMMARY_MIN_HISTORY: usize = 10;
/// Entries retained verbatim after a successful compaction.
pub(crate) const SUMMARY_KEEP_RECENT: usize = 6;

// Time ---------------------------------------------------------------------
pub(crate) const DEFAULT_START_YEAR: i32 = 1993;
pub(crate) const DEFAULT_START_AGE: i32 = 7;
pub(crate) const SEASONS_PER_YEAR: u8 = 4;

// Generation parameters ----------------------------------------------------
pub(crate) const DEFAULT_MODEL: &str = "glm-4.7";
pub(crate) const TURN_TEMPERATURE: f32 = 0.5;
pub(crate) const SUB_CALL_TEMPERATURE: f32 = 0.6;
pub(crate) const MAX_REPLY_TOKENS: u32 = 2500;

// Engine -------------------------------------------------------------------
pub(crate) const SAVE_SLOT: &str = "autosave";
pub(crate) const OPENING_ACTION: &str =
    "The game begins. Set the scene and introduce the hero.";
pub(crate) const NO_DESCRIPTION: &str = "No description yet.";
