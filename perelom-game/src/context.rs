//! Context builder: pure state → generation payload.
//!
//! Assembles the bounded conversational window (recent turns, compacted
//! life summary, current lore and stat readings) plus the per-call system
//! instructions. Performs no mutation; every function here is state in,
//! payload out.

use crate::calendar::TimePreview;
use crate::client::ChatMessage;
use crate::constants::{HISTORY_LIMIT, MIRACLE_HIGH_RESET, MIRACLE_LOW_RESET};
use crate::critical::CriticalStat;
use crate::data::StatCatalog;
use crate::state::GameState;
use crate::stats::{StatTier, ViscosityBand};

/// The payload for one main-turn generation call.
#[derive(Debug, Clone)]
pub struct TurnPrompt {
    pub messages: Vec<ChatMessage>,
    pub choices_count: usize,
    pub next_time: TimePreview,
}

/// Build the full main-turn payload: system instructions, the bounded
/// history window, and the player's action as the closing user message.
#[must_use]
pub fn build_turn_prompt(state: &GameState, catalog: &StatCatalog, action: &str) -> TurnPrompt {
    let next_time = state.peek_next_time();
    let next_label = next_time.label();
    let choices_count = state.choices_count();

    let mut messages =
        Vec::with_capacity(windowed_history(state).len() + 2);
    messages.push(ChatMessage::system(turn_system_prompt(
        state,
        catalog,
        &next_label,
        choices_count,
    )));
    messages.extend(windowed_history(state).iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(format!(
        "My choice: {action}. (Narrate the vivid outcome of the chosen action, \
         then the transition into {next_label}.)"
    )));

    TurnPrompt {
        messages,
        choices_count,
        next_time,
    }
}

/// Last `HISTORY_LIMIT` entries, oldest dropped first. The push path keeps
/// history within the cap already; this bounds it regardless.
#[must_use]
pub fn windowed_history(state: &GameState) -> &[crate::state::HistoryEntry] {
    let len = state.history.len();
    &state.history[len.saturating_sub(HISTORY_LIMIT)..]
}

/// Listing of everyone and everything around the hero, with full
/// accumulated descriptions.
#[must_use]
pub fn lore_block(state: &GameState) -> String {
    let mut block = String::from("\n=== PEOPLE around the hero ===\n");
    if state.npcs.is_empty() {
        block.push_str("No one nearby.\n");
    } else {
        for npc in &state.npcs {
            block.push_str(&format!("- {}: {}\n", npc.name, npc.desc));
        }
    }

    block.push_str("\n=== THINGS and traits of the hero ===\n");
    if state.inventory.is_empty() {
        block.push_str("Nothing at all.\n");
    } else {
        for item in &state.inventory {
            block.push_str(&format!("- {}: {}\n", item.name, item.desc));
        }
    }
    block
}

#[must_use]
pub fn summary_block(state: &GameState) -> String {
    if state.life_summary.is_empty() {
        return String::new();
    }
    format!(
        "\n=== THE HERO'S LIFE SO FAR (summary of earlier events) ===\n{}\n",
        state.life_summary
    )
}

/// One line per stat: current value, qualitative tier, and the narrative
/// guidance for that tier.
#[must_use]
pub fn stats_description(state: &GameState, catalog: &StatCatalog) -> String {
    let mut desc = String::from("CURRENT STATE OF THE HERO:\n");
    for (key, value) in state.stats.entries() {
        let info = catalog.get_safe(key);
        let tier = StatTier::for_value(value);
        desc.push_str(&format!(
            "- **{}**: {} ({}/10) — {}\n",
            info.name,
            tier.label(),
            value,
            tier.guidance(&info)
        ));
    }
    desc
}

/// Per-stat resistance instruction for this turn.
#[must_use]
pub fn viscosity_block(state: &GameState, catalog: &StatCatalog) -> String {
    let mut block = String::from(
        "STAT VISCOSITY. The odds that a stat actually moves are not equal; \
         the further a value sits from 5, the harder it resists:\n",
    );
    for (key, value) in state.stats.entries() {
        let info = catalog.get_safe(key);
        let band = ViscosityBand::for_value(value);
        block.push_str(&format!(
            "- {} at {}: {}\n",
            info.name,
            value,
            band.prompt_hint()
        ));
    }
    block.push_str(
        "Do not move a stat without a strong reason. Maximum ±2 per stat per turn. \
         The total movement across all stats this turn must not exceed 3.\n",
    );
    block
}

fn choices_schema(choices_count: usize) -> String {
    let rows: Vec<String> = (1..=choices_count)
        .map(|i| {
            format!(
                "        {{\"text\": \"Option {i}\", \"action\": \"a detailed one-to-two sentence description of action {i}\"}}"
            )
        })
        .collect();
    rows.join(",\n")
}

fn hero_block(state: &GameState) -> String {
    format!(
        "HERO: {} ({} years old)\nLOCATION: {} — {}",
        state.gender.hero_noun(),
        state.age,
        state.location_name,
        state.location_desc
    )
}

/// System instructions for the main turn call.
#[must_use]
pub fn turn_system_prompt(
    state: &GameState,
    catalog: &StatCatalog,
    next_label: &str,
    choices_count: usize,
) -> String {
    format!(
        r#"You are the game master of a dramatic, richly atmospheric text RPG about growing up in the 1990s. Social drama, realism, aching nostalgia — that is your whole register.

{hero}

Current period: {date}. Age: {age}.
Next period: {next_label}.
{summary}{lore}{stats}
!!! CRITICAL RULES !!!

1. The scale is 0-10 with 5 as the norm. BOTH extremes are trouble. High values are not simply good: they are sources of tension (dangerous money, smothering family, reckless courage). Low values are their own misery (poverty, loneliness, being nobody).
2. Ranges: 4 and 6 are light flavor; 3 and 7 are significant (the hero calls it normal, the reader sees trouble); 2 and 8 are obvious even to the hero; 1 and 9 are tragedy waiting to strike; 0 and 10 end the game — never narrate them yourself, the system handles them.
3. Respect the hero's gender, age and location in every scene.
4. Wealth shapes clothing, food, options and the ability to treat poor health. Authority decides whether peers fear, follow or walk over the hero.

!!! THINGS AND PEOPLE MATTER !!!

5. Every turn, consider the hero's things and people. New acquaintances, found objects, gifts, pets, vivid personality traits — add at most one via add_npc or add_item, and only if it appears in your story text. Otherwise enrich an existing one instead.
6. When something happens to an existing person or thing, append to its description with update_npc / update_item — never rewrite what was already known.

TASK:
1. Describe the consequences of the player's choice through the eyes of a child of that age (60% of the text).
2. Then narrate the passage of time into {next_label} (40% of the text), with consequences that correlate with the choice, small callbacks to earlier years, and changes touching up to three people from the list.

{viscosity}
EXACTLY {choices_count} options. No more, no fewer. Include at least one option that could lift the hero's weakest stats. Every option's "action" is a full 1-2 sentence description of at least 10 words — never a two-word stub. Do not reveal which stats an option would touch.

REPLY STRICTLY AS JSON (no text before or after):
{{
    "story": "The story text. Markdown.",
    "choices": [
{choices_schema}
    ],
    "updates": {{
        "mind": 0, "body": 0, "family": 0, "friends": 0, "health": 0, "looks": 0, "wealth": 0, "authority": 0,
        "add_item": {{"name": "Name", "desc": "Description"}} or null,
        "remove_item": "Item name" or null,
        "update_item": {{"name": "Existing item", "desc": "What changed"}},
        "add_npc": {{"name": "Name", "desc": "Description"}},
        "remove_npc": "Name" or null,
        "update_npc": {{"name": "Existing person", "desc": "What changed"}}
    }}
}}

Every string must be valid JSON: newlines as \n, quotes escaped."#,
        hero = hero_block(state),
        date = state.date_label(),
        age = state.age,
        summary = summary_block(state),
        lore = lore_block(state),
        stats = stats_description(state, catalog),
        viscosity = viscosity_block(state, catalog),
        choices_schema = choices_schema(choices_count),
    )
}

fn critical_lines(crits: &[CriticalStat], catalog: &StatCatalog, with_reset: bool) -> String {
    crits
        .iter()
        .map(|c| {
            let info = catalog.get_safe(c.key);
            let pole = if c.is_low() { &info.low } else { &info.high };
            if with_reset {
                let reset = if c.is_low() {
                    MIRACLE_LOW_RESET
                } else {
                    MIRACLE_HIGH_RESET
                };
                format!(
                    "- {}: {} (was {}/10, rolled back to {}/10)",
                    info.name, pole, c.value, reset
                )
            } else {
                format!("- {}: {} (value {}/10)", info.name, pole, c.value)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages for the miracle continuation call. The just-generated story is
/// canon; the continuation must not contradict it.
#[must_use]
pub fn build_miracle_prompt(
    state: &GameState,
    catalog: &StatCatalog,
    crits: &[CriticalStat],
    preceding_story: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        r#"You are the game master of a dramatic text RPG. A MIRACULOUS RESCUE has just occurred.

{hero}

=== CRITICAL STATS (should have ended the life, but a miracle intervened) ===
{crits}
{summary}{lore}
=== WHAT JUST HAPPENED (the last turn's text — this is CANON, you are CONTINUING it) ===
{preceding_story}
=== END OF LAST TURN ===

TASK: Write the CONTINUATION of the text above — the miraculous rescue, 3-4 paragraphs. Then offer {choices_count} options for what the hero does AFTER being saved.

RULES:
1. You are continuing the story above; if someone died there, they stay dead.
2. The miracle must grow plausibly out of the last turn's events: a lucky coincidence, unexpected help from a known person, a chance encounter.
3. The options must fit the NEW situation after the rescue, not the one before it.

REPLY AS JSON:
{{
    "miracle_story": "The continuation — the rescue. 3-4 paragraphs. Markdown.",
    "choices": [
{choices_schema}
    ]
}}"#,
        hero = hero_block(state),
        crits = critical_lines(crits, catalog, true),
        summary = summary_block(state),
        lore = lore_block(state),
        choices_count = state.choices_count(),
        choices_schema = choices_schema(state.choices_count()),
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(
            "Continue the story: describe the miraculous rescue and offer options for what comes after.",
        ),
    ]
}

fn transcript(state: &GameState) -> String {
    state
        .history
        .iter()
        .map(|entry| match entry.role {
            crate::state::Role::User => format!(">> Player: {}", entry.content),
            crate::state::Role::Assistant => format!("<< {}", entry.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Messages for the game-over epilogue call.
#[must_use]
pub fn build_game_over_prompt(
    state: &GameState,
    catalog: &StatCatalog,
    crits: &[CriticalStat],
    preceding_story: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        r#"You are the game master of a dramatic text RPG. The game has ended in tragedy.

{hero}

=== CRITICAL STATS (these caused the end) ===
{crits}
{summary}{lore}
=== WHAT JUST HAPPENED (the last turn's text — this is CANON, you are CONTINUING it) ===
{preceding_story}
=== END OF LAST TURN ===

=== RECENT HISTORY ===
{transcript}

TASK: Write a LONG tragic epilogue (at least 7-10 paragraphs) that CONTINUES the text above. Use only people already in the story and still alive in it. Describe the aftermath for each close person, and explain how the critical stats led here.

REPLY AS JSON:
{{
    "epilogue": "A long epilogue continuing the story. Markdown.",
    "reasons": ["A concrete cause drawn from the history", "Another cause", "..."],
    "epitaph": "A short epitaph"
}}"#,
        hero = hero_block(state),
        crits = critical_lines(crits, catalog, false),
        summary = summary_block(state),
        lore = lore_block(state),
        transcript = transcript(state),
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(
            "Continue the story: write the tragic ending that follows from the events above. Write at length.",
        ),
    ]
}

/// Messages for the life-summary compaction call.
#[must_use]
pub fn build_summary_prompt(state: &GameState) -> Vec<ChatMessage> {
    let prev_summary = if state.life_summary.is_empty() {
        String::new()
    } else {
        format!("\nPREVIOUS SUMMARY:\n{}\n", state.life_summary)
    };
    let system = format!(
        r#"You are an archivist. Compose a BRIEF SUMMARY of a character's life.

{hero}
STATS: {stats}
{prev_summary}{lore}
RECENT HISTORY:
{transcript}

TASK: Write a compressed summary (10-15 sentences) of the hero's WHOLE life: key events, how each relationship changed, significant gains and losses, emotional scars and joys, the current state of things.

Do NOT invent anything that is not in the history. Facts only.

REPLY AS JSON:
{{
    "summary": "The life summary..."
}}"#,
        hero = hero_block(state),
        stats = serde_json::to_string(&state.stats).unwrap_or_default(),
        prev_summary = prev_summary,
        lore = lore_block(state),
        transcript = transcript(state),
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user("Compose the summary."),
    ]
}
