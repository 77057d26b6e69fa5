//! Perelom Game Engine
//!
//! Platform-agnostic core of Perelom, an LLM-narrated life-simulation
//! game. This crate owns the turn-resolution state machine: it assembles a
//! bounded chat context from the game state, interprets the generator's
//! structured replies, applies bounded probabilistic stat mutations, and
//! drives the miracle/game-over branches and periodic history compaction.
//! Rendering, storage mechanics and content pools live behind traits.

pub mod calendar;
pub mod client;
pub mod constants;
pub mod context;
pub mod critical;
pub mod data;
pub mod engine;
pub mod lore;
pub mod parse;
pub mod settings;
pub mod state;
pub mod stats;
pub mod summary;

// Re-export commonly used types
pub use calendar::{Pace, Season, TimePreview, peek_next};
pub use client::{
    ChatMessage, ChatRequest, ChatResponse, HttpNarrator, NarratorError, ResponseFormat,
};
pub use context::{TurnPrompt, build_turn_prompt};
pub use critical::{CriticalOutcome, CriticalStat, find_critical};
pub use data::{StatCatalog, StatInfo};
pub use engine::{EngineError, TurnEngine, TurnEvent};
pub use lore::{Entity, LoreBook};
pub use parse::{
    EntityPatch, MiracleReply, ReplyUpdates, SummaryReply, TurnReply, parse_reply_object,
    parse_turn_reply,
};
pub use settings::{
    Gender, LocationInfo, LocationKind, StartItem, StartKit, StartNpc, StartSettings,
};
pub use state::{
    Choice, Difficulty, GameOverData, GameState, HistoryEntry, Role,
};
pub use stats::{StatKey, StatTier, Stats, ViscosityBand};

/// The external generation collaborator: role-tagged messages plus
/// parameters in, one generated text out. Any failure is recoverable at
/// the call site.
#[allow(async_fn_in_trait)]
pub trait Narrator {
    /// Run one chat-completion request to completion.
    ///
    /// # Errors
    ///
    /// Returns an error on any transport or service failure; call sites
    /// treat every error as a recoverable generation failure.
    async fn complete(&self, request: ChatRequest) -> Result<String, NarratorError>;
}

/// Trait for abstracting save/load operations.
/// Platform-specific implementations should provide this.
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be saved.
    fn save_game(&self, save_name: &str, game_state: &GameState) -> Result<(), Self::Error>;

    /// Load game state
    ///
    /// # Errors
    ///
    /// Returns an error if the game state cannot be loaded.
    fn load_game(&self, save_name: &str) -> Result<Option<GameState>, Self::Error>;

    /// Delete saved game
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

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

    #[test]
    fn storage_round_trips_state() {
        let storage = MemoryStorage::default();
        let mut state = GameState::new(&StartSettings::default(), &StartKit::default(), 0xABCD);
        state.turn_count = 3;
        state.life_summary = "Three turns in.".to_string();

        storage.save_game("slot-one", &state).unwrap();
        let loaded = storage
            .load_game("slot-one")
            .unwrap()
            .expect("save exists")
            .rehydrate();
        assert_eq!(loaded.turn_count, 3);
        assert_eq!(loaded.life_summary, "Three turns in.");
        assert!(loaded.rng.is_some());
        assert!(storage.load_game("missing-slot").unwrap().is_none());

        storage.delete_save("slot-one").unwrap();
        assert!(storage.load_game("slot-one").unwrap().is_none());
    }
}
