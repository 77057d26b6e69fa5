//! The turn engine: one state machine instance owning the game state.
//!
//! `submit_action` drives the full pipeline for one player action: cadence
//! compaction, context build, the generation call, reply validation, state
//! mutation, the critical-state check, and persistence. Failures are local
//! and non-destructive — a failed turn leaves the state as it was except
//! for the turn counter, which the retry path decrements again before
//! resubmitting.
//!
//! The engine never renders anything. It emits discrete events that a
//! presentation layer subscribes to.

use crate::client::ChatRequest;
use crate::constants::{MAX_REPLY_TOKENS, OPENING_ACTION, SAVE_SLOT, TURN_TEMPERATURE};
use crate::context;
use crate::critical::{self, CriticalOutcome};
use crate::data::StatCatalog;
use crate::parse::parse_turn_reply;
use crate::state::{Choice, GameOverData, GameState};
use crate::summary;
use crate::{GameStorage, Narrator, NarratorError};

/// Discrete notifications for presentation layers.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A normal turn committed.
    TurnResolved {
        story: String,
        choices: Vec<Choice>,
    },
    /// The turn aborted without mutating the game; a retry is available.
    TurnFailed { error: String },
    /// The one-shot reprieve fired; play continues with fresh choices.
    MiracleResolved {
        story: String,
        choices: Vec<Choice>,
    },
    /// The game reached its terminal state.
    GameOverResolved { data: GameOverData },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a generation call is already in flight")]
    Busy,
    #[error("the game has ended; no further actions are accepted")]
    GameOver,
    #[error("generation failed: {0}")]
    Generation(#[from] NarratorError),
    #[error("the generator returned an unusable reply")]
    MalformedReply,
    #[error("there is no failed turn to retry")]
    NothingToRetry,
}

impl EngineError {
    /// Whether [`TurnEngine::retry_turn`] can recover from this failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Generation(_) | Self::MalformedReply)
    }
}

type EventSink = Box<dyn Fn(&TurnEvent)>;

/// One game session: the explicit state container plus its collaborators.
pub struct TurnEngine<N, S> {
    state: GameState,
    narrator: N,
    storage: S,
    catalog: &'static StatCatalog,
    busy: bool,
    pending_retry: Option<String>,
    sinks: Vec<EventSink>,
}

impl<N, S> TurnEngine<N, S>
where
    N: Narrator,
    S: GameStorage,
{
    #[must_use]
    pub fn new(state: GameState, narrator: N, storage: S) -> Self {
        Self {
            state: state.rehydrate(),
            narrator,
            storage,
            catalog: StatCatalog::global(),
            busy: false,
            pending_retry: None,
            sinks: Vec::new(),
        }
    }

    /// Resume the autosaved session if one exists, otherwise seed a fresh
    /// game from the settings and kit.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails while loading.
    pub fn resume_or_new(
        narrator: N,
        storage: S,
        settings: &crate::settings::StartSettings,
        kit: &crate::settings::StartKit,
        seed: u64,
    ) -> Result<Self, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let state = match storage.load_game(SAVE_SLOT).map_err(Into::into)? {
            Some(saved) => saved,
            None => GameState::new(settings, kit, seed),
        };
        Ok(Self::new(state, narrator, storage))
    }

    #[must_use]
    pub const fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> GameState {
        self.state
    }

    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// The action text of the last failed turn, if any.
    #[must_use]
    pub fn pending_retry(&self) -> Option<&str> {
        self.pending_retry.as_deref()
    }

    /// Register a presentation-layer observer.
    pub fn subscribe(&mut self, sink: impl Fn(&TurnEvent) + 'static) {
        self.sinks.push(Box::new(sink));
    }

    fn emit(&self, event: &TurnEvent) {
        for sink in &self.sinks {
            sink(event);
        }
    }

    /// Issue the bootstrap turn for a fresh game. Does nothing when the
    /// session already has history or has ended.
    ///
    /// # Errors
    ///
    /// Propagates the same failures as [`Self::submit_action`].
    pub async fn start_game(&mut self) -> Result<Option<TurnEvent>, EngineError> {
        if !self.state.history.is_empty() || self.state.game_over {
            return Ok(None);
        }
        self.submit_action(OPENING_ACTION).await.map(Some)
    }

    /// Resolve one player action through the full pipeline.
    ///
    /// # Errors
    ///
    /// - [`EngineError::GameOver`] — terminal state; the call is a no-op.
    /// - [`EngineError::Busy`] — another generation call is in flight.
    /// - [`EngineError::Generation`] / [`EngineError::MalformedReply`] —
    ///   the turn aborted cleanly; retry with [`Self::retry_turn`].
    pub async fn submit_action(&mut self, action: &str) -> Result<TurnEvent, EngineError> {
        if self.state.game_over {
            return Err(EngineError::GameOver);
        }
        if self.busy {
            return Err(EngineError::Busy);
        }
        self.busy = true;
        let result = self.run_turn(action).await;
        self.busy = false;

        match result {
            Ok(event) => {
                self.pending_retry = None;
                self.emit(&event);
                Ok(event)
            }
            Err(err) => {
                if err.is_retryable() {
                    self.pending_retry = Some(action.to_string());
                    self.emit(&TurnEvent::TurnFailed {
                        error: err.to_string(),
                    });
                }
                Err(err)
            }
        }
    }

    /// One-click recovery for a failed turn: undo the counted attempt and
    /// resubmit the same action text.
    ///
    /// # Errors
    ///
    /// [`EngineError::NothingToRetry`] when no turn has failed, otherwise
    /// the same failures as [`Self::submit_action`].
    pub async fn retry_turn(&mut self) -> Result<TurnEvent, EngineError> {
        let action = self
            .pending_retry
            .take()
            .ok_or(EngineError::NothingToRetry)?;
        self.state.turn_count = self.state.turn_count.saturating_sub(1);
        self.submit_action(&action).await
    }

    async fn run_turn(&mut self, action: &str) -> Result<TurnEvent, EngineError> {
        self.state.turn_count += 1;

        if summary::should_compact(&self.state) {
            // failure is non-fatal and logged inside; the turn proceeds
            summary::compact(&mut self.state, &self.narrator).await;
        }

        let prompt = context::build_turn_prompt(&self.state, self.catalog, action);
        let request =
            ChatRequest::json_shaped(prompt.messages, TURN_TEMPERATURE, MAX_REPLY_TOKENS);
        let raw = self.narrator.complete(request).await?;
        let reply = parse_turn_reply(&raw).ok_or(EngineError::MalformedReply)?;

        // the reply is well-formed: commit
        self.state.push_turn_history(action, &raw);
        if let Some(updates) = &reply.updates {
            self.state.apply_updates(updates);
        }
        self.state.last_story = Some(reply.story.clone());
        self.state.last_choices = reply.choices.clone();
        self.state.last_miracle = None;
        self.state.advance_time();

        let outcome =
            critical::resolve(&mut self.state, &self.narrator, self.catalog, &reply.story).await;

        self.persist();

        Ok(match outcome {
            CriticalOutcome::None => TurnEvent::TurnResolved {
                story: reply.story,
                choices: reply.choices,
            },
            CriticalOutcome::Miracle { story } => TurnEvent::MiracleResolved {
                story,
                choices: self.state.last_choices.clone(),
            },
            CriticalOutcome::GameOver { data } => TurnEvent::GameOverResolved { data },
        })
    }

    fn persist(&self) {
        if let Err(err) = self.storage.save_game(SAVE_SLOT, &self.state) {
            // the turn already committed in memory; losing one autosave is
            // recoverable, corrupting the session is not
            log::error!("autosave failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::field_reassign_with_default)]

    use super::*;
    use crate::state::Difficulty;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    /// Scripted narrator: pops canned results front to back.
    struct ScriptedNarrator {
        replies: RefCell<Vec<Result<String, ()>>>,
        calls: RefCell<Vec<ChatRequest>>,
    }

    impl ScriptedNarrator {
        fn new(replies: Vec<Result<String, ()>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Narrator for ScriptedNarrator {
        async fn complete(&self, request: ChatRequest) -> Result<String, NarratorError> {
            self.calls.borrow_mut().push(request);
            let mut replies = self.replies.borrow_mut();
            if replies.is_empty() {
                return Err(NarratorError::EmptyReply);
            }
            replies.remove(0).map_err(|()| NarratorError::EmptyReply)
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStorage {
        saves: Rc<RefCell<HashMap<String, GameState>>>,
    }

    impl GameStorage for MemoryStorage {
        type Error = Infallible;

        fn save_game(&self, save_name: &str, game_state: &GameState) -> Result<(), Self::Error> {
            self.saves
                .borrow_mut()
                .insert(save_name.to_string(), game_state.clone());
            Ok(())
        }

        fn load_game(&self, save_name: &str) -> Result<Option<GameState>, Self::Error> {
            Ok(self.saves.borrow().get(save_name).cloned())
        }

        fn delete_save(&self, save_name: &str) -> Result<(), Self::Error> {
            self.saves.borrow_mut().remove(save_name);
            Ok(())
        }
    }

    fn good_reply() -> String {
        r#"{
            "story": "Snow fell over the courtyard all afternoon.",
            "choices": [
                {"text": "a", "action": "help mom carry the heavy bags up from the market"},
                {"text": "b", "action": "join the boys building a fort behind the garages"},
                {"text": "c", "action": "stay home and read the atlas borrowed from school"},
                {"text": "d", "action": "go see whether the neighbor needs firewood split"}
            ],
            "updates": {"friends": 1, "add_npc": {"name": "Lyokha", "desc": "From the next block."}}
        }"#
        .to_string()
    }

    fn engine(replies: Vec<Result<String, ()>>) -> TurnEngine<ScriptedNarrator, MemoryStorage> {
        TurnEngine::new(
            GameState::default(),
            ScriptedNarrator::new(replies),
            MemoryStorage::default(),
        )
    }

    #[tokio::test]
    async fn happy_path_commits_everything() {
        let mut engine = engine(vec![Ok(good_reply())]);
        let event = engine.submit_action("go outside").await.unwrap();

        let TurnEvent::TurnResolved { story, choices } = event else {
            panic!("expected resolved turn");
        };
        assert!(story.contains("Snow fell"));
        assert_eq!(choices.len(), 4);

        let state = engine.state();
        assert_eq!(state.turn_count, 1);
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.history[0].content, "go outside");
        assert!(state.npcs.find("Lyokha").is_some());
        // Winter 1993 -> Spring 1993 under season pace
        assert_eq!(state.season_idx, 1);
        assert_eq!(state.year, 1993);
        assert_eq!(state.last_story.as_deref(), Some("Snow fell over the courtyard all afternoon."));
        assert!(engine.pending_retry().is_none());
    }

    #[tokio::test]
    async fn turn_persists_after_commit() {
        let storage = MemoryStorage::default();
        let mut engine = TurnEngine::new(
            GameState::default(),
            ScriptedNarrator::new(vec![Ok(good_reply())]),
            storage.clone(),
        );
        engine.submit_action("go outside").await.unwrap();

        let saved = storage.load_game(SAVE_SLOT).unwrap().expect("autosave");
        assert_eq!(saved.turn_count, 1);
        assert_eq!(saved.history.len(), 2);
    }

    #[tokio::test]
    async fn malformed_reply_leaves_state_untouched_except_counter() {
        let mut engine = engine(vec![Ok("not json at all".to_string())]);
        let before = engine.state().clone();

        let err = engine.submit_action("go outside").await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedReply));
        assert!(err.is_retryable());

        let state = engine.state();
        assert_eq!(state.turn_count, before.turn_count + 1);
        assert_eq!(state.history.len(), before.history.len());
        assert_eq!(state.stats, before.stats);
        assert_eq!(state.season_idx, before.season_idx);
        assert_eq!(state.year, before.year);
        assert_eq!(engine.pending_retry(), Some("go outside"));
    }

    #[tokio::test]
    async fn retry_does_not_double_count_turns() {
        let mut engine = engine(vec![Ok("garbage".to_string()), Ok(good_reply())]);

        assert!(engine.submit_action("go outside").await.is_err());
        let event = engine.retry_turn().await.unwrap();
        assert!(matches!(event, TurnEvent::TurnResolved { .. }));

        // same count as a first-try success
        assert_eq!(engine.state().turn_count, 1);
        assert!(engine.pending_retry().is_none());
    }

    #[tokio::test]
    async fn retry_without_failure_is_an_error() {
        let mut engine = engine(vec![]);
        assert!(matches!(
            engine.retry_turn().await,
            Err(EngineError::NothingToRetry)
        ));
    }

    #[tokio::test]
    async fn transport_failure_is_retryable() {
        let mut engine = engine(vec![Err(()), Ok(good_reply())]);
        let err = engine.submit_action("go outside").await.unwrap_err();
        assert!(matches!(err, EngineError::Generation(_)));
        assert!(engine.retry_turn().await.is_ok());
        assert_eq!(engine.state().turn_count, 1);
    }

    #[tokio::test]
    async fn terminal_state_rejects_actions() {
        let mut engine = engine(vec![Ok(good_reply())]);
        engine.state.game_over = true;
        assert!(matches!(
            engine.submit_action("anything").await,
            Err(EngineError::GameOver)
        ));
        assert_eq!(engine.state().turn_count, 0);
        assert_eq!(engine.narrator.call_count(), 0);
    }

    /// Routes replies by call site: the miracle/game-over prompts are
    /// recognizable from their system message.
    struct RouterNarrator {
        turn: String,
        miracle: String,
    }

    impl Narrator for RouterNarrator {
        async fn complete(&self, request: ChatRequest) -> Result<String, NarratorError> {
            let system = request
                .messages
                .first()
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            if system.contains("MIRACULOUS RESCUE") {
                Ok(self.miracle.clone())
            } else {
                Ok(self.turn.clone())
            }
        }
    }

    #[tokio::test]
    async fn critical_turn_emits_miracle_event() {
        let turn = r#"{
            "story": "The last bill went to the pharmacist.",
            "choices": [
                {"text": "a", "action": "ask grandmother whether she can spare anything at all"},
                {"text": "b", "action": "look for bottles to return behind the station kiosks"},
                {"text": "c", "action": "tell no one and skip meals until the month turns"},
                {"text": "d", "action": "offer to sweep the market stalls for a few coins"}
            ],
            "updates": {"wealth": -2}
        }"#;
        let miracle = r#"{
            "miracle_story": "An old debt to father was repaid out of nowhere.",
            "choices": [
                {"text": "a", "action": "put the money away and tell mom after dinner"},
                {"text": "b", "action": "spend a little of it on bread and hide the rest"},
                {"text": "c", "action": "ask around about who repaid it and why now"},
                {"text": "d", "action": "give half to grandmother before anyone can argue"}
            ]
        }"#;
        let mut state = GameState::default();
        state.stats.wealth = 1;
        let mut engine = TurnEngine::new(
            state,
            RouterNarrator {
                turn: turn.to_string(),
                miracle: miracle.to_string(),
            },
            MemoryStorage::default(),
        );

        // the downward delta at a low value is gated at 50%; keep taking
        // turns until the seeded sequence lets it land
        let mut event = engine.submit_action("buy medicine").await.unwrap();
        for _ in 0..64 {
            if engine.state().miracle_used {
                break;
            }
            event = engine.submit_action("buy medicine").await.unwrap();
        }

        let TurnEvent::MiracleResolved { story, choices } = event else {
            panic!("expected miracle event, got {event:?}");
        };
        assert!(story.contains("old debt"));
        assert_eq!(choices.len(), 4);
        assert_eq!(engine.state().stats.wealth, 3);
        assert!(!engine.state().game_over);
    }

    #[tokio::test]
    async fn events_reach_subscribers() {
        let seen: Rc<RefCell<Vec<String>>> = Rc::default();
        let mut engine = engine(vec![Ok("junk".to_string()), Ok(good_reply())]);
        let sink = Rc::clone(&seen);
        engine.subscribe(move |event| {
            let tag = match event {
                TurnEvent::TurnResolved { .. } => "resolved",
                TurnEvent::TurnFailed { .. } => "failed",
                TurnEvent::MiracleResolved { .. } => "miracle",
                TurnEvent::GameOverResolved { .. } => "game-over",
            };
            sink.borrow_mut().push(tag.to_string());
        });

        let _ = engine.submit_action("go outside").await;
        let _ = engine.retry_turn().await;

        assert_eq!(*seen.borrow(), vec!["failed", "resolved"]);
    }

    #[tokio::test]
    async fn compaction_runs_on_cadence_and_failure_is_tolerated() {
        // history is long enough and the interval has elapsed, but the
        // compaction reply is garbage; the turn must still succeed
        let mut state = GameState::default();
        for i in 0..6 {
            state.push_turn_history(&format!("a{i}"), &format!("r{i}"));
        }
        state.turn_count = 9; // next submit makes it 10 = SUMMARY_INTERVAL
        let mut engine = TurnEngine::new(
            state,
            ScriptedNarrator::new(vec![
                Ok("summary call garbage".to_string()),
                Ok(good_reply()),
            ]),
            MemoryStorage::default(),
        );

        let event = engine.submit_action("go outside").await.unwrap();
        assert!(matches!(event, TurnEvent::TurnResolved { .. }));
        // both the compaction call and the turn call went out
        assert_eq!(engine.narrator.call_count(), 2);
        assert!(engine.state().life_summary.is_empty());
        assert_eq!(engine.state().last_summary_turn, 0);
    }

    #[tokio::test]
    async fn successful_compaction_truncates_history() {
        let mut state = GameState::default();
        for i in 0..7 {
            state.push_turn_history(&format!("a{i}"), &format!("r{i}"));
        }
        state.turn_count = 9;
        let mut engine = TurnEngine::new(
            state,
            ScriptedNarrator::new(vec![
                Ok(r#"{"summary":"Nine turns, one childhood."}"#.to_string()),
                Ok(good_reply()),
            ]),
            MemoryStorage::default(),
        );

        engine.submit_action("go outside").await.unwrap();
        let state = engine.state();
        assert_eq!(state.life_summary, "Nine turns, one childhood.");
        assert_eq!(state.last_summary_turn, 10);
        // 6 kept by compaction + the new exchange
        assert_eq!(state.history.len(), 8);
    }

    #[tokio::test]
    async fn resume_or_new_prefers_the_autosave() {
        let storage = MemoryStorage::default();
        let mut saved = GameState::default();
        saved.turn_count = 5;
        storage.save_game(SAVE_SLOT, &saved).unwrap();

        let engine = TurnEngine::resume_or_new(
            ScriptedNarrator::new(vec![]),
            storage,
            &crate::settings::StartSettings::default(),
            &crate::settings::StartKit::default(),
            0,
        )
        .unwrap();
        assert_eq!(engine.state().turn_count, 5);

        let fresh = TurnEngine::resume_or_new(
            ScriptedNarrator::new(vec![]),
            MemoryStorage::default(),
            &crate::settings::StartSettings::default(),
            &crate::settings::StartKit::default(),
            9,
        )
        .unwrap();
        assert_eq!(fresh.state().turn_count, 0);
        assert_eq!(fresh.state().seed, 9);
    }

    #[tokio::test]
    async fn start_game_runs_only_on_fresh_sessions() {
        let mut engine = engine(vec![Ok(good_reply())]);
        let event = engine.start_game().await.unwrap();
        assert!(event.is_some());
        assert_eq!(engine.state().history[0].content, OPENING_ACTION);

        // second call is a no-op
        let event = engine.start_game().await.unwrap();
        assert!(event.is_none());
        assert_eq!(engine.narrator.call_count(), 1);
    }

    #[tokio::test]
    async fn hardcore_critical_turn_ends_the_game() {
        let reply = r#"{
            "story": "The fever would not break.",
            "choices": [
                {"text": "a", "action": "call for the district doctor even though it costs"},
                {"text": "b", "action": "sweat it out under every blanket in the flat"},
                {"text": "c", "action": "send word to grandmother in the village for help"}
            ],
            "updates": {"health": -2}
        }"#;
        let mut state = GameState::default();
        state.difficulty = Difficulty::Hardcore;
        state.miracle_available = false;
        state.stats.health = 1;
        let mut engine = TurnEngine::new(
            state,
            ScriptedNarrator::new(vec![Ok(reply.to_string())]),
            MemoryStorage::default(),
        );

        let mut result = engine.submit_action("push through it").await.unwrap();
        for _ in 0..64 {
            if engine.state().game_over {
                break;
            }
            engine
                .narrator
                .replies
                .borrow_mut()
                .push(Ok(reply.to_string()));
            result = engine.submit_action("push through it").await.unwrap();
        }
        assert!(engine.state().game_over, "health never bottomed out");

        let TurnEvent::GameOverResolved { data } = result else {
            panic!("expected game over event");
        };
        assert!(!data.epilogue.is_empty());
        assert!(!data.reasons.is_empty());
        assert!(!data.epitaph.is_empty());

        // and the terminal state now rejects everything
        assert!(matches!(
            engine.submit_action("one more day").await,
            Err(EngineError::GameOver)
        ));
    }
}
