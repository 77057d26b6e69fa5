//! Critical-state resolver.
//!
//! After every committed turn the stats are scanned for boundary values.
//! A stat at exactly 0 or 10 triggers one of two branches: the one-shot
//! miracle reprieve (normal difficulty, not yet consumed) or the terminal
//! game-over epilogue. Both branches call the generator and both carry
//! hardcoded fallbacks, so a failed call never leaves the game stuck.

use smallvec::SmallVec;

use crate::Narrator;
use crate::client::ChatRequest;
use crate::constants::{
    MAX_REPLY_TOKENS, MIRACLE_HIGH_RESET, MIRACLE_LOW_RESET, STAT_MAX, STAT_MIN,
    SUB_CALL_TEMPERATURE,
};
use crate::context;
use crate::data::StatCatalog;
use crate::parse::{parse_game_over_reply, parse_miracle_reply};
use crate::state::{Choice, Difficulty, GameOverData, GameState};
use crate::stats::{StatKey, Stats};

/// A stat sitting on a scale boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalStat {
    pub key: StatKey,
    pub value: i32,
}

impl CriticalStat {
    #[must_use]
    pub const fn is_low(self) -> bool {
        self.value <= STAT_MIN
    }
}

/// Scan all 8 stats for boundary values.
#[must_use]
pub fn find_critical(stats: &Stats) -> SmallVec<[CriticalStat; 8]> {
    StatKey::ALL
        .iter()
        .filter_map(|&key| {
            let value = stats.get(key);
            (value <= STAT_MIN || value >= STAT_MAX).then_some(CriticalStat { key, value })
        })
        .collect()
}

/// What the resolver decided this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum CriticalOutcome {
    /// No stat on a boundary; nothing happened.
    None,
    /// The one-shot reprieve fired; play continues.
    Miracle { story: String },
    /// Terminal. The epilogue payload is always fully populated.
    GameOver { data: GameOverData },
}

/// Resolve critical stats after a committed turn. At most one branch runs
/// per call, covering every critical stat at once.
pub async fn resolve<N: Narrator>(
    state: &mut GameState,
    narrator: &N,
    catalog: &StatCatalog,
    preceding_story: &str,
) -> CriticalOutcome {
    let crits = find_critical(&state.stats);
    if crits.is_empty() {
        return CriticalOutcome::None;
    }

    let miracle_eligible = state.difficulty == Difficulty::Normal
        && state.miracle_available
        && !state.miracle_used;
    if miracle_eligible {
        let story = run_miracle(state, narrator, catalog, &crits, preceding_story).await;
        CriticalOutcome::Miracle { story }
    } else {
        let data = run_game_over(state, narrator, catalog, &crits, preceding_story).await;
        CriticalOutcome::GameOver { data }
    }
}

/// Consume the miracle: partial reprieve for every critical stat, then a
/// generated continuation that treats the turn's story as canon.
async fn run_miracle<N: Narrator>(
    state: &mut GameState,
    narrator: &N,
    catalog: &StatCatalog,
    crits: &[CriticalStat],
    preceding_story: &str,
) -> String {
    state.miracle_used = true;
    state.miracle_available = false;
    for crit in crits {
        let reset = if crit.is_low() {
            MIRACLE_LOW_RESET
        } else {
            MIRACLE_HIGH_RESET
        };
        state.stats.set(crit.key, reset);
    }

    let messages = context::build_miracle_prompt(state, catalog, crits, preceding_story);
    let request = ChatRequest::json_shaped(messages, SUB_CALL_TEMPERATURE, MAX_REPLY_TOKENS);
    let reply = match narrator.complete(request).await {
        Ok(raw) => parse_miracle_reply(&raw),
        Err(err) => {
            log::warn!("miracle generation failed: {err}");
            None
        }
    };

    match reply {
        Some(reply) => {
            state.last_miracle = Some(reply.miracle_story.clone());
            if !reply.choices.is_empty() {
                state.last_choices = reply.choices.clone();
            }
            // keep future context coherent: one synthetic assistant entry
            // carrying the original story plus its continuation
            let merged = serde_json::json!({
                "story": format!(
                    "{}\n\n---\n\n**A MIRACULOUS RESCUE**\n\n{}",
                    state.last_story.as_deref().unwrap_or_default(),
                    reply.miracle_story
                ),
                "choices": state.last_choices,
            });
            state
                .history
                .push(crate::state::HistoryEntry::assistant(merged.to_string()));
            reply.miracle_story
        }
        None => {
            let story = fallback_miracle_story();
            state.last_miracle = Some(story.clone());
            state.last_choices = fallback_miracle_choices(state.choices_count());
            story
        }
    }
}

/// Enter the terminal state and populate the epilogue, from the generator
/// when possible and from the fallback synthesis otherwise. Partial
/// replies are completed field by field.
async fn run_game_over<N: Narrator>(
    state: &mut GameState,
    narrator: &N,
    catalog: &StatCatalog,
    crits: &[CriticalStat],
    preceding_story: &str,
) -> GameOverData {
    state.game_over = true;

    let messages = context::build_game_over_prompt(state, catalog, crits, preceding_story);
    let request = ChatRequest::json_shaped(messages, SUB_CALL_TEMPERATURE, MAX_REPLY_TOKENS);
    let reply = match narrator.complete(request).await {
        Ok(raw) => parse_game_over_reply(&raw),
        Err(err) => {
            log::warn!("game-over generation failed: {err}");
            None
        }
    };

    let fallback = fallback_game_over(state, catalog, crits);
    let data = match reply {
        Some(reply) => GameOverData {
            epilogue: if reply.epilogue.trim().is_empty() {
                fallback.epilogue
            } else {
                reply.epilogue
            },
            reasons: if reply.reasons.is_empty() {
                fallback.reasons
            } else {
                reply.reasons
            },
            epitaph: if reply.epitaph.trim().is_empty() {
                fallback.epitaph
            } else {
                reply.epitaph
            },
        },
        None => fallback,
    };
    state.game_over_data = Some(data.clone());
    data
}

fn fallback_miracle_story() -> String {
    "But fate relented at the last possible moment. By some miracle, everything held together..."
        .to_string()
}

fn fallback_miracle_choices(count: usize) -> Vec<Choice> {
    let mut choices = vec![
        Choice {
            text: "Try to make sense of what happened".to_string(),
            action: "The hero tries to understand what just happened and how they survived it"
                .to_string(),
        },
        Choice {
            text: "Thank whoever helped".to_string(),
            action: "The hero finds the person who helped and thanks them properly".to_string(),
        },
        Choice {
            text: "Keep moving without looking back".to_string(),
            action: "The hero decides to put the whole thing behind them and push forward"
                .to_string(),
        },
        Choice {
            text: "Take the lesson and change".to_string(),
            action: "The hero resolves to live differently after what they just survived"
                .to_string(),
        },
    ];
    choices.truncate(count);
    choices
}

fn fallback_game_over(
    state: &GameState,
    catalog: &StatCatalog,
    crits: &[CriticalStat],
) -> GameOverData {
    let place = if state.location_name.is_empty() {
        "The nineties".to_string()
    } else {
        format!("{} in the nineties", state.location_name)
    };
    GameOverData {
        epilogue: format!(
            "The story of {} ended at {} years old. {} spared no one...",
            state.gender.hero_noun(),
            state.age,
            place
        ),
        reasons: crits
            .iter()
            .map(|c| {
                format!(
                    "{} reached a critical level",
                    catalog.get_safe(c.key).name
                )
            })
            .collect(),
        epitaph: "The era of change took them early".to_string(),
    }
}
