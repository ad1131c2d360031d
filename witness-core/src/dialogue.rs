//! Per-character conversation state machine.
//!
//! The engine holds one dialogue tree per character, registered from the case
//! dataset at case-start. At most one conversation is active at a time;
//! starting a second one is rejected without disturbing the first. All
//! progress flows through the node-entry procedure, which grants evidence,
//! sets flags, and announces the node and its currently visible choices.

use crate::case::{CharacterId, ChoiceId, DialogueChoice, DialogueNode, DialogueTree, NodeId};
use crate::events::{EventBus, GameEvent};
use crate::state::CaseState;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Conversation {
    character: CharacterId,
    node: NodeId,
}

/// Drives conversations over registered dialogue trees.
#[derive(Debug)]
pub struct DialogueEngine {
    trees: HashMap<CharacterId, DialogueTree>,
    conversation: Option<Conversation>,
    bus: Rc<EventBus>,
}

impl DialogueEngine {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            trees: HashMap::new(),
            conversation: None,
            bus,
        }
    }

    /// Replace all registered trees and drop any active conversation.
    pub fn load_trees(&mut self, trees: Vec<DialogueTree>) {
        self.trees = trees
            .into_iter()
            .map(|tree| (tree.character.clone(), tree))
            .collect();
        self.conversation = None;
    }

    pub fn in_dialogue(&self) -> bool {
        self.conversation.is_some()
    }

    pub fn partner(&self) -> Option<&CharacterId> {
        self.conversation.as_ref().map(|c| &c.character)
    }

    pub fn current_node(&self) -> Option<&DialogueNode> {
        let conversation = self.conversation.as_ref()?;
        self.trees
            .get(&conversation.character)?
            .node(&conversation.node)
    }

    pub fn is_at_end_node(&self) -> bool {
        self.current_node().map(|n| n.is_end_node).unwrap_or(false)
    }

    /// The current node's choices that pass their evidence and flag gates.
    pub fn visible_choices(&self, state: &CaseState) -> Vec<&DialogueChoice> {
        self.current_node()
            .map(|node| {
                node.choices
                    .iter()
                    .filter(|choice| choice_visible(state, choice))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Open a conversation with a character.
    ///
    /// Fails if a conversation is already active or no tree is registered for
    /// the character. On success the character is marked interviewed and the
    /// tree's start node is entered.
    pub fn start_dialogue(&mut self, state: &mut CaseState, character: &CharacterId) -> bool {
        if self.conversation.is_some() {
            warn!(character = %character, "already in a conversation");
            return false;
        }
        let Some(start) = self.trees.get(character).map(|t| t.start_node.clone()) else {
            warn!(character = %character, "no dialogue tree registered");
            return false;
        };

        state.mark_interviewed(character);
        self.conversation = Some(Conversation {
            character: character.clone(),
            node: start.clone(),
        });

        debug!(character = %character, "dialogue started");
        self.bus.emit(&GameEvent::DialogueStarted(character.clone()));
        self.enter_node(state, start);
        true
    }

    /// Select one of the current node's choices by id.
    ///
    /// The selection enforces the same visibility predicate as choice
    /// display; a gated choice cannot be taken even by id. Failure leaves the
    /// conversation untouched.
    pub fn select_choice(&mut self, state: &mut CaseState, choice_id: &ChoiceId) -> bool {
        let Some(node) = self.current_node().cloned() else {
            return false;
        };
        let Some(choice) = node.choices.iter().find(|c| c.id == *choice_id) else {
            warn!(choice = %choice_id, "choice not on current node");
            return false;
        };
        if !choice_visible(state, choice) {
            warn!(choice = %choice_id, "choice requirements not met");
            return false;
        }

        // partner is present whenever current_node() was
        let partner = match self.conversation.as_ref() {
            Some(conversation) => conversation.character.clone(),
            None => return false,
        };

        if choice.trust_delta != 0 {
            state.modify_trust(&partner, choice.trust_delta);
        }
        for flag in &choice.sets_flags {
            state.set_flag(flag);
        }

        let next = choice.next_node.clone();
        self.enter_node(state, next);
        true
    }

    /// Move past a choiceless node, or end the conversation at an end node.
    ///
    /// A node with choices ignores this call; the caller must select one.
    pub fn advance(&mut self, state: &mut CaseState) {
        let Some(node) = self.current_node().cloned() else {
            return;
        };

        if node.is_end_node {
            self.finish();
            return;
        }
        if !node.choices.is_empty() {
            return;
        }
        match node.next_node {
            Some(next) => self.enter_node(state, next),
            None => self.finish(),
        }
    }

    pub fn end_dialogue(&mut self) {
        if self.conversation.is_some() {
            self.finish();
        }
    }

    /// The node-entry procedure, run on start and on every transition.
    ///
    /// An unknown node id is an implicit end of conversation. Otherwise:
    /// grant the node's evidence as one batch, set its flags, announce the
    /// node, then announce the visible choices (even when there are none, so
    /// a consumer can clear a stale choice display).
    fn enter_node(&mut self, state: &mut CaseState, node_id: NodeId) {
        let Some(conversation) = self.conversation.as_ref() else {
            return;
        };
        let node = self
            .trees
            .get(&conversation.character)
            .and_then(|tree| tree.node(&node_id))
            .cloned();
        let Some(node) = node else {
            warn!(node = %node_id, "dialogue node not found, ending conversation");
            self.finish();
            return;
        };

        if let Some(conversation) = self.conversation.as_mut() {
            conversation.node = node.id.clone();
        }

        let gained: Vec<_> = node
            .gains_evidence
            .iter()
            .filter(|id| state.collect_evidence(id))
            .cloned()
            .collect();
        if !gained.is_empty() {
            self.bus.emit(&GameEvent::EvidenceGainedFromDialogue(gained));
        }

        for flag in &node.sets_flags {
            state.set_flag(flag);
        }

        debug!(node = %node.id, "entered dialogue node");
        self.bus.emit(&GameEvent::NodeChanged(node.id.clone()));

        let visible: Vec<_> = node
            .choices
            .iter()
            .filter(|choice| choice_visible(state, choice))
            .map(|choice| choice.id.clone())
            .collect();
        self.bus.emit(&GameEvent::ChoicesAvailable(visible));
    }

    fn finish(&mut self) {
        self.conversation = None;
        debug!("dialogue ended");
        self.bus.emit(&GameEvent::DialogueEnded);
    }
}

fn choice_visible(state: &CaseState, choice: &DialogueChoice) -> bool {
    choice
        .required_evidence
        .iter()
        .all(|id| state.has_evidence(id))
        && state.has_all_flags(&choice.required_flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{CaseData, Character, DialogueChoice, DialogueNode, Evidence, EvidenceKind, Importance, Location};
    use crate::testing::EventLog;

    fn fixture() -> (DialogueEngine, CaseState, EventLog) {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);

        let case = CaseData {
            starting_location: "hall".into(),
            evidence: vec![
                Evidence::new("key", "Brass Key", EvidenceKind::Physical, Importance::Normal, "hall"),
                Evidence::new("note", "Folded Note", EvidenceKind::Document, Importance::Major, "hall"),
            ],
            characters: vec![Character::new("maid", "Agnes", "the maid", "hall")],
            locations: vec![Location::new("hall", "Entrance Hall")],
            dialogues: vec![DialogueTree::new("maid", "greet").with_nodes(vec![
                DialogueNode::new("greet", "Yes, sir?")
                    .spoken_by("maid")
                    .with_choices(vec![
                        DialogueChoice::new("ask_key", "Ask about the key.", "about_key")
                            .with_trust_delta(5),
                        DialogueChoice::new("show_note", "Show her the note.", "about_note")
                            .requires_evidence(vec!["note".into()])
                            .with_flags(vec!["note_shown".to_string()]),
                        DialogueChoice::new("ask_ghost", "Ask about the ghost.", "no_such_node"),
                    ]),
                DialogueNode::new("about_key", "She hands you a key.")
                    .spoken_by("maid")
                    .grants_evidence(vec!["key".into()])
                    .advances_to("done"),
                DialogueNode::new("about_note", "She pales at the sight of it.")
                    .spoken_by("maid")
                    .end_node(),
                DialogueNode::new("done", "That is all she knows.").end_node(),
            ])],
            ..CaseData::default()
        };

        let mut state = CaseState::new(Rc::clone(&bus));
        state.initialize_case(case.clone());
        let mut engine = DialogueEngine::new(bus);
        engine.load_trees(case.dialogues);
        (engine, state, log)
    }

    #[test]
    fn starting_marks_interviewed_and_enters_start_node() {
        let (mut engine, mut state, log) = fixture();

        assert!(engine.start_dialogue(&mut state, &"maid".into()));
        assert!(state.character(&"maid".into()).map(|c| c.interviewed).unwrap_or(false));
        assert_eq!(engine.current_node().map(|n| n.id.clone()), Some("greet".into()));

        assert_eq!(log.count(|e| matches!(e, GameEvent::DialogueStarted(_))), 1);
        assert_eq!(log.count(|e| matches!(e, GameEvent::NodeChanged(_))), 1);
        assert_eq!(log.count(|e| matches!(e, GameEvent::ChoicesAvailable(_))), 1);
    }

    #[test]
    fn second_start_is_rejected_and_leaves_the_first_untouched() {
        let (mut engine, mut state, _log) = fixture();
        engine.start_dialogue(&mut state, &"maid".into());

        assert!(!engine.start_dialogue(&mut state, &"maid".into()));
        assert_eq!(engine.current_node().map(|n| n.id.clone()), Some("greet".into()));
    }

    #[test]
    fn unregistered_character_cannot_be_talked_to() {
        let (mut engine, mut state, _log) = fixture();
        assert!(!engine.start_dialogue(&mut state, &"stranger".into()));
        assert!(!engine.in_dialogue());
    }

    #[test]
    fn gated_choice_is_hidden_and_unselectable() {
        let (mut engine, mut state, _log) = fixture();
        engine.start_dialogue(&mut state, &"maid".into());

        let visible: Vec<_> = engine
            .visible_choices(&state)
            .iter()
            .map(|c| c.id.clone())
            .collect();
        assert_eq!(visible, vec!["ask_key".into(), "ask_ghost".into()]);

        assert!(!engine.select_choice(&mut state, &"show_note".into()));
        assert_eq!(engine.current_node().map(|n| n.id.clone()), Some("greet".into()));
        assert!(!state.has_flag("note_shown"));
    }

    #[test]
    fn gated_choice_appears_once_requirements_are_met() {
        let (mut engine, mut state, _log) = fixture();
        state.collect_evidence(&"note".into());
        engine.start_dialogue(&mut state, &"maid".into());

        assert!(engine.select_choice(&mut state, &"show_note".into()));
        assert!(state.has_flag("note_shown"));
        assert!(engine.is_at_end_node());
    }

    #[test]
    fn selection_applies_trust_and_node_grants_evidence_as_a_batch() {
        let (mut engine, mut state, log) = fixture();
        engine.start_dialogue(&mut state, &"maid".into());

        assert!(engine.select_choice(&mut state, &"ask_key".into()));
        assert_eq!(state.character(&"maid".into()).map(|c| c.trust), Some(55));
        assert!(state.has_evidence(&"key".into()));

        assert_eq!(
            log.count(|e| matches!(e, GameEvent::EvidenceGainedFromDialogue(ids) if ids == &vec!["key".into()])),
            1
        );
    }

    #[test]
    fn revisiting_a_granting_node_does_not_regrant() {
        let (mut engine, mut state, log) = fixture();
        state.collect_evidence(&"key".into());
        engine.start_dialogue(&mut state, &"maid".into());
        engine.select_choice(&mut state, &"ask_key".into());

        assert_eq!(
            log.count(|e| matches!(e, GameEvent::EvidenceGainedFromDialogue(_))),
            0
        );
    }

    #[test]
    fn unknown_target_node_ends_the_conversation() {
        let (mut engine, mut state, log) = fixture();
        engine.start_dialogue(&mut state, &"maid".into());

        assert!(engine.select_choice(&mut state, &"ask_ghost".into()));
        assert!(!engine.in_dialogue());
        assert_eq!(log.count(|e| matches!(e, GameEvent::DialogueEnded)), 1);
    }

    #[test]
    fn choice_id_not_on_node_is_rejected() {
        let (mut engine, mut state, _log) = fixture();
        engine.start_dialogue(&mut state, &"maid".into());

        assert!(!engine.select_choice(&mut state, &"bribe".into()));
        assert_eq!(engine.current_node().map(|n| n.id.clone()), Some("greet".into()));
    }

    #[test]
    fn advance_ignores_nodes_with_choices_and_ends_at_end_nodes() {
        let (mut engine, mut state, log) = fixture();
        engine.start_dialogue(&mut state, &"maid".into());

        // The greeting has choices; advance must not move.
        engine.advance(&mut state);
        assert_eq!(engine.current_node().map(|n| n.id.clone()), Some("greet".into()));

        engine.select_choice(&mut state, &"ask_key".into());
        // "about_key" auto-advances to "done", which is an end node.
        engine.advance(&mut state);
        assert_eq!(engine.current_node().map(|n| n.id.clone()), Some("done".into()));
        engine.advance(&mut state);
        assert!(!engine.in_dialogue());
        assert_eq!(log.count(|e| matches!(e, GameEvent::DialogueEnded)), 1);
    }

    #[test]
    fn actions_outside_a_conversation_are_no_ops() {
        let (mut engine, mut state, log) = fixture();

        assert!(!engine.select_choice(&mut state, &"ask_key".into()));
        engine.advance(&mut state);
        engine.end_dialogue();
        assert!(log.is_empty());
    }

    #[test]
    fn choices_available_is_emitted_even_when_empty() {
        let (mut engine, mut state, log) = fixture();
        engine.start_dialogue(&mut state, &"maid".into());
        engine.select_choice(&mut state, &"ask_key".into());

        // "about_key" has no choices; the empty list must still be announced.
        assert_eq!(
            log.count(|e| matches!(e, GameEvent::ChoicesAvailable(ids) if ids.is_empty())),
            1
        );
    }
}
