//! Season/year/age progression under the two narrative paces.
//!
//! Season-pace turns step one season at a time, rolling the year over after
//! Autumn. Year-pace turns always advance a full year while stepping the
//! season label backward one slot (`(idx + 3) % 4`) — each turn is narrated
//! as spanning nine months. The regression is deliberate product flavor;
//! preserve the transition table as-is.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::SEASONS_PER_YEAR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    #[default]
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub const ALL: [Self; 4] = [Self::Winter, Self::Spring, Self::Summer, Self::Autumn];

    #[must_use]
    pub const fn from_idx(idx: u8) -> Self {
        match idx % SEASONS_PER_YEAR {
            0 => Self::Winter,
            1 => Self::Spring,
            2 => Self::Summer,
            _ => Self::Autumn,
        }
    }

    #[must_use]
    pub const fn idx(self) -> u8 {
        match self {
            Self::Winter => 0,
            Self::Spring => 1,
            Self::Summer => 2,
            Self::Autumn => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Autumn => "Autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    /// Every turn is one season.
    #[default]
    Season,
    /// Every turn jumps a full year (and regresses the season label one slot).
    Year,
}

impl Pace {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Season => "season",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pace {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "season" => Ok(Self::Season),
            "year" => Ok(Self::Year),
            _ => Err(()),
        }
    }
}

/// The `(seasonIdx, year)` pair a committed advance will produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePreview {
    pub season_idx: u8,
    pub year: i32,
}

impl TimePreview {
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", Season::from_idx(self.season_idx), self.year)
    }
}

/// Preview the next time period without mutating anything. The committed
/// advance must land on exactly this pair.
#[must_use]
pub const fn peek_next(pace: Pace, season_idx: u8, year: i32) -> TimePreview {
    let idx = season_idx % SEASONS_PER_YEAR;
    match pace {
        Pace::Year => TimePreview {
            season_idx: (idx + 3) % SEASONS_PER_YEAR,
            year: year + 1,
        },
        Pace::Season => {
            let next = idx + 1;
            if next >= SEASONS_PER_YEAR {
                TimePreview {
                    season_idx: 0,
                    year: year + 1,
                }
            } else {
                TimePreview {
                    season_idx: next,
                    year,
                }
            }
        }
    }
}

#[must_use]
pub fn date_label(season_idx: u8, year: i32) -> String {
    format!("{} {}", Season::from_idx(season_idx), year)
}
