//! Branching detective-story narrative runtime.
//!
//! This crate provides:
//! - An entity store tracking evidence, characters, locations, deductions,
//!   and narrative flags under arbitrary player ordering
//! - A per-character dialogue-tree engine with gated choices
//! - A rule-based advisor that generates suggestions and reacts to how the
//!   player treats them
//! - A flow controller exposing the single command surface and phase machine
//!
//! # Quick Start
//!
//! ```ignore
//! use witness_core::{Game, GameEvent};
//!
//! let mut game = Game::new(my_case_provider);
//! game.bus().subscribe(|event| {
//!     if let GameEvent::AdvisorSpeaks(text) = event {
//!         println!("ADVISOR: {text}");
//!     }
//! });
//!
//! game.start_case();
//! game.begin_investigation();
//! game.travel_to(&"study".into());
//! ```

pub mod advisor;
pub mod case;
pub mod dialogue;
pub mod events;
pub mod game;
pub mod state;
pub mod testing;

// Primary public API
pub use advisor::{AdvisorEngine, Disposition, Suggestion, SuggestionId, SuggestionKind};
pub use case::{
    CaseData, CaseResult, Character, CharacterId, ChoiceId, Deduction, DeductionId,
    DialogueChoice, DialogueNode, DialogueTree, EmotionalState, Evidence, EvidenceId,
    EvidenceKind, Importance, Location, LocationId, NodeId, Tone,
};
pub use dialogue::DialogueEngine;
pub use events::{EventBus, GameEvent};
pub use game::{Game, GameError, Phase, PlayerAction};
pub use state::CaseState;
