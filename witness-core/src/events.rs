//! Notification channels for the presentation boundary.
//!
//! Every state change the core makes is announced through a single
//! [`EventBus`], synchronously and in mutation order. Observers never mutate
//! core state; they only issue the command-surface calls on [`crate::Game`].

use crate::advisor::{Disposition, Suggestion};
use crate::case::{CaseResult, CharacterId, ChoiceId, EvidenceId, LocationId, NodeId};
use crate::game::Phase;
use std::cell::RefCell;
use std::rc::Rc;

/// A state-change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    EvidenceCollected(EvidenceId),
    DeductionUnlocked(crate::case::DeductionId),
    FlagSet(String),
    LocationVisited(LocationId),
    TrustChanged { character: CharacterId, trust: i32 },
    DialogueStarted(CharacterId),
    DialogueEnded,
    NodeChanged(NodeId),
    /// The currently visible choices at the new node. Emitted even when
    /// empty so a consumer can clear a stale choice display.
    ChoicesAvailable(Vec<ChoiceId>),
    /// Evidence actually newly gained from a dialogue node, as one batch.
    EvidenceGainedFromDialogue(Vec<EvidenceId>),
    AdvisorSpeaks(String),
    SuggestionReady(Suggestion),
    DispositionChanged(Disposition),
    PhaseChanged(Phase),
    GameEnded(CaseResult),
}

type Subscriber = Box<dyn Fn(&GameEvent)>;

/// Synchronous observer list.
///
/// Emission happens inline on the caller's stack: every subscriber has seen
/// the event before the emitting operation returns.
#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn subscribe(&self, subscriber: impl Fn(&GameEvent) + 'static) {
        self.subscribers.borrow_mut().push(Box::new(subscriber));
    }

    pub fn emit(&self, event: &GameEvent) {
        for subscriber in self.subscribers.borrow().iter() {
            subscriber(event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.borrow().len())
            .finish()
    }
}
