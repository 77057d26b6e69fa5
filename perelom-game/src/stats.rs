//! The 8-attribute bounded stat vector and its viscosity-gated update rule.
//!
//! Attributes live on a 0..=10 scale with 5 as the norm. Values near the
//! norm move freely; skewed values resist movement in either direction with
//! a 50% gate, so entrenched situations take repeated pushes to shift.

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    MAX_DELTA_PER_STAT, STAT_MAX, STAT_MIN, STAT_NORM, VISCOSITY_GATE_CHANCE,
    VISCOSITY_HIGH_GATE, VISCOSITY_LOW_GATE,
};
use crate::data::StatInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKey {
    Mind,
    Body,
    Family,
    Friends,
    Health,
    Looks,
    Wealth,
    Authority,
}

impl StatKey {
    pub const ALL: [Self; 8] = [
        Self::Mind,
        Self::Body,
        Self::Family,
        Self::Friends,
        Self::Health,
        Self::Looks,
        Self::Wealth,
        Self::Authority,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mind => "mind",
            Self::Body => "body",
            Self::Family => "family",
            Self::Friends => "friends",
            Self::Health => "health",
            Self::Looks => "looks",
            Self::Wealth => "wealth",
            Self::Authority => "authority",
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mind" => Ok(Self::Mind),
            "body" => Ok(Self::Body),
            "family" => Ok(Self::Family),
            "friends" => Ok(Self::Friends),
            "health" => Ok(Self::Health),
            "looks" => Ok(Self::Looks),
            "wealth" => Ok(Self::Wealth),
            "authority" => Ok(Self::Authority),
            _ => Err(()),
        }
    }
}

/// The character sheet. Serializes as the flat `{"mind":5,...}` map the
/// save format documents; every field defaults to the norm so older saves
/// that predate a stat load cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default = "default_stat")]
    pub mind: i32,
    #[serde(default = "default_stat")]
    pub body: i32,
    #[serde(default = "default_stat")]
    pub family: i32,
    #[serde(default = "default_stat")]
    pub friends: i32,
    #[serde(default = "default_stat")]
    pub health: i32,
    #[serde(default = "default_stat")]
    pub looks: i32,
    #[serde(default = "default_stat")]
    pub wealth: i32,
    #[serde(default = "default_stat")]
    pub authority: i32,
}

fn default_stat() -> i32 {
    STAT_NORM
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            mind: STAT_NORM,
            body: STAT_NORM,
            family: STAT_NORM,
            friends: STAT_NORM,
            health: STAT_NORM,
            looks: STAT_NORM,
            wealth: STAT_NORM,
            authority: STAT_NORM,
        }
    }
}

impl Stats {
    #[must_use]
    pub const fn get(&self, key: StatKey) -> i32 {
        match key {
            StatKey::Mind => self.mind,
            StatKey::Body => self.body,
            StatKey::Family => self.family,
            StatKey::Friends => self.friends,
            StatKey::Health => self.health,
            StatKey::Looks => self.looks,
            StatKey::Wealth => self.wealth,
            StatKey::Authority => self.authority,
        }
    }

    pub const fn set(&mut self, key: StatKey, value: i32) {
        match key {
            StatKey::Mind => self.mind = value,
            StatKey::Body => self.body = value,
            StatKey::Family => self.family = value,
            StatKey::Friends => self.friends = value,
            StatKey::Health => self.health = value,
            StatKey::Looks => self.looks = value,
            StatKey::Wealth => self.wealth = value,
            StatKey::Authority => self.authority = value,
        }
    }

    #[must_use]
    pub fn entries(&self) -> [(StatKey, i32); 8] {
        StatKey::ALL.map(|key| (key, self.get(key)))
    }

    pub fn clamp(&mut self) {
        for key in StatKey::ALL {
            self.set(key, self.get(key).clamp(STAT_MIN, STAT_MAX));
        }
    }

    /// Apply one proposed delta under the viscosity rule.
    ///
    /// The magnitude is first clamped to ±2. A positive delta on a stat
    /// already at 6 or above, or a negative delta on a stat at 4 or below,
    /// only lands half the time; a stat sitting exactly at the norm is
    /// never gated. The result is clamped back into 0..=10.
    ///
    /// Returns whether the delta was applied.
    pub fn apply_delta(&mut self, key: StatKey, raw_delta: i32, rng: &mut ChaCha20Rng) -> bool {
        let delta = raw_delta.clamp(-MAX_DELTA_PER_STAT, MAX_DELTA_PER_STAT);
        if delta == 0 {
            return true;
        }
        let current = self.get(key);
        let gated = (delta > 0 && current >= VISCOSITY_HIGH_GATE)
            || (delta < 0 && current <= VISCOSITY_LOW_GATE);
        if gated && !rng.gen_bool(VISCOSITY_GATE_CHANCE) {
            log::debug!("viscosity held {key} at {current} (delta {delta:+})");
            return false;
        }
        self.set(key, (current + delta).clamp(STAT_MIN, STAT_MAX));
        true
    }
}

/// Qualitative reading of a single stat value, symmetric around the norm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTier {
    CollapseLow,
    TragicLow,
    ObviousLow,
    SignificantLow,
    MildLow,
    Norm,
    MildHigh,
    SignificantHigh,
    ObviousHigh,
    TragicHigh,
    CollapseHigh,
}

impl StatTier {
    #[must_use]
    pub const fn for_value(value: i32) -> Self {
        match value {
            i32::MIN..=0 => Self::CollapseLow,
            1 => Self::TragicLow,
            2 => Self::ObviousLow,
            3 => Self::SignificantLow,
            4 => Self::MildLow,
            5 => Self::Norm,
            6 => Self::MildHigh,
            7 => Self::SignificantHigh,
            8 => Self::ObviousHigh,
            9 => Self::TragicHigh,
            _ => Self::CollapseHigh,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CollapseLow | Self::CollapseHigh => "TOTAL COLLAPSE",
            Self::TragicLow | Self::TragicHigh => "TRAGEDY",
            Self::ObviousLow | Self::ObviousHigh => "OBVIOUS, SEVERE TROUBLE",
            Self::SignificantLow | Self::SignificantHigh => "SIGNIFICANT SKEW",
            Self::MildLow | Self::MildHigh => "MILD SKEW",
            Self::Norm => "THE NORM",
        }
    }

    /// Narrative guidance for this tier, drawing on the stat's low or high
    /// pole description as appropriate.
    #[must_use]
    pub fn guidance(self, info: &StatInfo) -> String {
        match self {
            Self::CollapseLow => format!("Complete ruin: {}", info.low),
            Self::TragicLow => format!(
                "On the brink, catastrophe possible at any moment: {}",
                info.low
            ),
            Self::ObviousLow => format!("Even the hero sees the trouble: {}", info.low),
            Self::SignificantLow => format!(
                "The hero calls it normal, the reader sees the problem: {}",
                info.low
            ),
            Self::MildLow => format!("Not yet a tragedy: {}", info.low),
            Self::Norm => "An average level, an ordinary life".to_string(),
            Self::MildHigh => format!(
                "Adds character, not yet a tragedy: a light taste of {}",
                info.high
            ),
            Self::SignificantHigh => format!(
                "The hero counts it a blessing, the reader sees the problem: {}",
                info.high
            ),
            Self::ObviousHigh => format!("Even the hero sees the excess: {}", info.high),
            Self::TragicHigh => format!(
                "On the edge of catastrophe at any moment: {}",
                info.high
            ),
            Self::CollapseHigh => format!("Complete ruin from excess: {}", info.high),
        }
    }
}

/// How strongly a stat at its current value resists change, by distance
/// from the norm. Fed to the generator as a per-stat instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViscosityBand {
    Free,
    Sluggish,
    Viscous,
    Frozen,
}

impl ViscosityBand {
    #[must_use]
    pub const fn for_value(value: i32) -> Self {
        let dist = (value - STAT_NORM).abs();
        match dist {
            0 | 1 => Self::Free,
            2 => Self::Sluggish,
            3 => Self::Viscous,
            _ => Self::Frozen,
        }
    }

    #[must_use]
    pub const fn prompt_hint(self) -> &'static str {
        match self {
            Self::Free => "shifts easily",
            Self::Sluggish => "harder to shift",
            Self::Viscous => "very viscous, prefers not to move",
            Self::Frozen => "almost never changes",
        }
    }
}
