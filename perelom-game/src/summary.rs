//! Life-summary compactor.
//!
//! Every `SUMMARY_INTERVAL` turns (once enough raw history exists) the
//! engine asks the generator to compress the hero's life into a running
//! prose digest, then truncates raw history to its most recent entries.
//! Failure is non-fatal: the summary, history and cadence marker are left
//! untouched and the enclosing turn proceeds.

use crate::Narrator;
use crate::client::ChatRequest;
use crate::constants::{
    MAX_REPLY_TOKENS, SUB_CALL_TEMPERATURE, SUMMARY_INTERVAL, SUMMARY_KEEP_RECENT,
    SUMMARY_MIN_HISTORY,
};
use crate::context::build_summary_prompt;
use crate::parse::parse_summary_reply;
use crate::state::GameState;

/// Cadence check: due by turn count and enough raw history to compress.
#[must_use]
pub fn should_compact(state: &GameState) -> bool {
    state.turn_count.saturating_sub(state.last_summary_turn) >= SUMMARY_INTERVAL
        && state.history.len() >= SUMMARY_MIN_HISTORY
}

/// Run one compaction. Returns whether the summary was replaced.
pub async fn compact<N: Narrator>(state: &mut GameState, narrator: &N) -> bool {
    let messages = build_summary_prompt(state);
    let request = ChatRequest::json_shaped(messages, SUB_CALL_TEMPERATURE, MAX_REPLY_TOKENS);
    let raw = match narrator.complete(request).await {
        Ok(raw) => raw,
        Err(err) => {
            log::warn!("life-summary generation failed: {err}");
            return false;
        }
    };
    let Some(reply) = parse_summary_reply(&raw) else {
        log::warn!("life-summary reply did not parse; keeping raw history");
        return false;
    };

    state.life_summary = reply.summary;
    state.truncate_history_to(SUMMARY_KEEP_RECENT);
    state.last_summary_turn = state.turn_count;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NarratorError;

    struct FixedNarrator(Result<String, ()>);

    impl Narrator for FixedNarrator {
        async fn complete(&self, _request: ChatRequest) -> Result<String, NarratorError> {
            self.0.clone().map_err(|()| NarratorError::EmptyReply)
        }
    }

    fn state_with_history(turns: usize) -> GameState {
        let mut state = GameState::default();
        for i in 0..turns {
            state.push_turn_history(&format!("action {i}"), &format!("reply {i}"));
        }
        state
    }

    #[test]
    fn cadence_requires_interval_and_min_history() {
        let mut state = state_with_history(6);
        state.turn_count = SUMMARY_INTERVAL;
        assert!(should_compact(&state));

        // interval not yet reached
        state.last_summary_turn = 1;
        assert!(!should_compact(&state));

        // interval reached but too little raw history
        let mut thin = state_with_history(4);
        thin.turn_count = SUMMARY_INTERVAL;
        assert!(!should_compact(&thin));
    }

    #[tokio::test]
    async fn success_replaces_summary_and_truncates() {
        let mut state = state_with_history(8);
        state.turn_count = 12;
        let narrator =
            FixedNarrator(Ok(r#"{"summary":"Twelve turns of a small life."}"#.to_string()));

        assert!(compact(&mut state, &narrator).await);
        assert_eq!(state.life_summary, "Twelve turns of a small life.");
        assert_eq!(state.history.len(), SUMMARY_KEEP_RECENT);
        assert_eq!(state.last_summary_turn, 12);
        // the newest entries survived
        assert_eq!(state.history.last().unwrap().content, "reply 7");
    }

    #[tokio::test]
    async fn transport_failure_leaves_everything_untouched() {
        let mut state = state_with_history(8);
        state.turn_count = 12;
        state.life_summary = "previous digest".to_string();
        let narrator = FixedNarrator(Err(()));

        assert!(!compact(&mut state, &narrator).await);
        assert_eq!(state.life_summary, "previous digest");
        assert_eq!(state.history.len(), 16);
        assert_eq!(state.last_summary_turn, 0);
    }

    #[tokio::test]
    async fn unparseable_reply_leaves_everything_untouched() {
        let mut state = state_with_history(8);
        state.turn_count = 12;
        let narrator = FixedNarrator(Ok("the dog ate the JSON".to_string()));

        assert!(!compact(&mut state, &narrator).await);
        assert!(state.life_summary.is_empty());
        assert_eq!(state.history.len(), 16);
    }
}
