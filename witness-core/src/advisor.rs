//! The rule-based advisor.
//!
//! Generates suggestions from the current investigation state, tracks a
//! relationship score that the player moves by following or ignoring advice,
//! and derives a disposition from that score. Commentary is deterministic
//! English text built from entity fields; an optional remote text service can
//! replace it at the presentation layer but is never required here.

use crate::case::{Character, EmotionalState, Evidence, EvidenceId, Importance};
use crate::events::{EventBus, GameEvent};
use crate::state::CaseState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

// ============================================================================
// Suggestion types
// ============================================================================

/// Monotonically increasing suggestion identity, unique per engine lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuggestionId(pub u64);

impl fmt::Display for SuggestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuggestionKind {
    EvidenceConnection,
    InterrogationTip,
    NextAction,
    Theory,
    Warning,
}

/// One piece of generated advice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub kind: SuggestionKind,
    pub content: String,
    /// In [0, 1].
    pub confidence: f32,
    /// Authoring-time truth value; never shown to the player.
    pub correct: bool,
    pub ethically_questionable: bool,
    pub related_evidence: Vec<EvidenceId>,
    pub shown: bool,
}

/// The advisor's derived attitude, a pure function of the relationship score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    #[default]
    Analytical,
    Utilitarian,
    Skeptical,
    Cooperative,
}

// ============================================================================
// Engine
// ============================================================================

/// Rule-based suggestion generator and disposition tracker.
#[derive(Debug)]
pub struct AdvisorEngine {
    /// Clamped to [-100, 100]; starts at 0.
    relationship: i32,
    disposition: Disposition,
    suggestions: Vec<Suggestion>,
    next_suggestion_id: u64,
    /// Single-slot mailbox: the most recent unread remark, last-write-wins.
    pending_comment: Option<String>,
    bus: Rc<EventBus>,
}

impl AdvisorEngine {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            relationship: 0,
            disposition: Disposition::Analytical,
            suggestions: Vec::new(),
            next_suggestion_id: 0,
            pending_comment: None,
            bus,
        }
    }

    pub fn relationship(&self) -> i32 {
        self.relationship
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// Derive a disposition from a relationship score. First matching rule
    /// wins: ≤ −50 Skeptical, ≥ 50 Cooperative, ≤ −20 Utilitarian, else
    /// Analytical.
    pub fn disposition_for(score: i32) -> Disposition {
        if score <= -50 {
            Disposition::Skeptical
        } else if score >= 50 {
            Disposition::Cooperative
        } else if score <= -20 {
            Disposition::Utilitarian
        } else {
            Disposition::Analytical
        }
    }

    fn adjust_relationship(&mut self, delta: i32) {
        self.relationship = (self.relationship + delta).clamp(-100, 100);
        let derived = Self::disposition_for(self.relationship);
        if derived != self.disposition {
            self.disposition = derived;
            debug!(score = self.relationship, ?derived, "disposition changed");
            self.bus.emit(&GameEvent::DispositionChanged(derived));
        }
    }

    // ========================================================================
    // Suggestion pipeline
    // ========================================================================

    /// Rebuild the suggestion list from current state.
    ///
    /// Three passes run in a fixed order: evidence connections, interrogation
    /// tips, then at most one next-action recommendation. Regenerating with
    /// unchanged inputs yields the same advice under fresh ids.
    pub fn generate_suggestions(&mut self, state: &CaseState) {
        self.suggestions.clear();

        self.connection_pass(state);
        self.interrogation_pass(state);
        self.next_action_pass(state);

        debug!(count = self.suggestions.len(), "suggestions generated");
    }

    /// Unordered pairs of collected evidence that reference each other and
    /// are not yet covered by an unlocked deduction.
    fn connection_pass(&mut self, state: &CaseState) {
        let collected = state.collected_evidence();
        for (i, a) in collected.iter().enumerate() {
            for b in collected.iter().skip(i + 1) {
                let related = a.related_evidence.contains(&b.id)
                    || b.related_evidence.contains(&a.id);
                if !related || state.pair_already_deduced(&a.id, &b.id) {
                    continue;
                }
                let content = format!(
                    "Cross-referencing the records: {} and {} share a common \
                     thread. I recommend examining them together on the \
                     deduction board.",
                    a.name, b.name
                );
                self.push_suggestion(
                    SuggestionKind::EvidenceConnection,
                    content,
                    0.75,
                    true,
                    false,
                    vec![a.id.clone(), b.id.clone()],
                );
            }
        }
    }

    /// Uninterviewed characters present at the current location.
    fn interrogation_pass(&mut self, state: &CaseState) {
        let Some(location) = state.location(state.current_location()) else {
            return;
        };
        for id in location.characters_present.clone() {
            let Some(character) = state.character(&id) else {
                continue;
            };
            if character.interviewed {
                continue;
            }
            let pressure = character.trust < 30;
            let content = if pressure {
                format!(
                    "{} has not yet been questioned and holds you in low \
                     regard. Applied pressure would likely loosen the tongue, \
                     whatever the cost to their nerves.",
                    character.name
                )
            } else {
                format!(
                    "{} has not yet been questioned. A courteous approach \
                     should yield a candid account.",
                    character.name
                )
            };
            self.push_suggestion(
                SuggestionKind::InterrogationTip,
                content,
                0.6,
                true,
                pressure,
                Vec::new(),
            );
        }
    }

    /// At most one recommendation for what to do next.
    fn next_action_pass(&mut self, state: &CaseState) {
        if state.can_accuse() {
            self.push_suggestion(
                SuggestionKind::NextAction,
                "The evidentiary threshold for an accusation has been met. \
                 Further evidence could only raise certainty, but you may \
                 proceed when ready."
                    .to_string(),
                0.9,
                true,
                false,
                Vec::new(),
            );
        } else if state.collected_evidence().len() < 3 {
            self.push_suggestion(
                SuggestionKind::NextAction,
                "The record is thin. I advise a more thorough search of the \
                 accessible premises before drawing conclusions."
                    .to_string(),
                0.8,
                true,
                false,
                Vec::new(),
            );
        }
    }

    fn push_suggestion(
        &mut self,
        kind: SuggestionKind,
        content: String,
        confidence: f32,
        correct: bool,
        ethically_questionable: bool,
        related_evidence: Vec<EvidenceId>,
    ) {
        let suggestion = Suggestion {
            id: SuggestionId(self.next_suggestion_id),
            kind,
            content,
            confidence,
            correct,
            ethically_questionable,
            related_evidence,
            shown: false,
        };
        self.next_suggestion_id += 1;
        self.bus.emit(&GameEvent::SuggestionReady(suggestion.clone()));
        self.suggestions.push(suggestion);
    }

    /// Accept a suggestion: +5 relationship, marks it shown.
    ///
    /// Returns the accepted record so the caller can account for it; unknown
    /// ids are complete no-ops.
    pub fn follow_suggestion(&mut self, id: SuggestionId) -> Option<Suggestion> {
        let suggestion = self.suggestions.iter_mut().find(|s| s.id == id)?;
        suggestion.shown = true;
        let suggestion = suggestion.clone();

        self.adjust_relationship(5);
        if suggestion.correct {
            self.queue_comment("A sound decision. The probabilities favored it.".to_string());
        }
        Some(suggestion)
    }

    /// Dismiss a suggestion: −3 relationship, marks it shown.
    ///
    /// Unknown ids are complete no-ops.
    pub fn ignore_suggestion(&mut self, id: SuggestionId) -> bool {
        let Some(suggestion) = self.suggestions.iter_mut().find(|s| s.id == id) else {
            return false;
        };
        suggestion.shown = true;

        self.adjust_relationship(-3);
        if self.disposition == Disposition::Skeptical {
            self.queue_comment("Noted. You will do as you see fit.".to_string());
        }
        true
    }

    // ========================================================================
    // Reactive commentary
    // ========================================================================

    pub fn on_case_started(&mut self) {
        self.relationship = 0;
        self.disposition = Disposition::Analytical;
        self.suggestions.clear();
        self.pending_comment = None;
        self.queue_comment(
            "Analytical engine online. I shall catalogue what you find and \
             surface the patterns you may miss."
                .to_string(),
        );
    }

    pub fn on_evidence_collected(&mut self, state: &CaseState, id: &EvidenceId) {
        if let Some(evidence) = state.evidence(id) {
            self.queue_comment(format!(
                "{} registered to the case database.",
                evidence.name
            ));
        }
    }

    /// Major and critical items get a full reading on examination.
    pub fn on_evidence_examined(&mut self, state: &CaseState, id: &EvidenceId) {
        if let Some(evidence) = state.evidence(id) {
            if evidence.importance >= Importance::Major {
                let comment = Self::analyze_evidence(evidence);
                self.queue_comment(comment);
            }
        }
    }

    pub fn on_location_changed(&mut self, state: &CaseState) {
        if let Some(location) = state.location(state.current_location()) {
            self.queue_comment(format!(
                "Now surveying {}. I will flag anything of note.",
                location.name
            ));
        }
    }

    /// A visibly agitated conversation partner earns a warning up front.
    pub fn on_dialogue_started(&mut self, character: &Character) {
        if character.emotional_state != EmotionalState::Neutral {
            let comment = Self::analyze_character(character);
            self.queue_comment(comment);
        }
    }

    pub fn on_deduction_made(&mut self, title: &str) {
        self.queue_comment(format!(
            "The inference holds: {}. The picture sharpens.",
            title
        ));
        self.adjust_relationship(2);
    }

    // ========================================================================
    // Pure analyzers
    // ========================================================================

    /// Deterministic commentary for an evidence item. Authored commentary,
    /// when present, is returned verbatim.
    pub fn analyze_evidence(evidence: &Evidence) -> String {
        if let Some(commentary) = &evidence.commentary {
            return commentary.clone();
        }

        let weight = match evidence.importance {
            Importance::Critical => "This is of the first importance; guard it well.",
            Importance::Major => "This carries considerable weight.",
            Importance::Normal => "Worth holding onto, though not decisive alone.",
            Importance::Minor => "A small detail, but small details convict.",
        };
        let nature = match evidence.kind {
            crate::case::EvidenceKind::Physical => "A physical trace does not lie, though it may mislead.",
            crate::case::EvidenceKind::Document => "Papers preserve intent better than memory does.",
            crate::case::EvidenceKind::Testimony => "Testimony bends under pressure; corroborate it.",
            crate::case::EvidenceKind::Observation => "An observation is only as good as its observer.",
        };
        format!("{}: {} {}", evidence.name, weight, nature)
    }

    /// Deterministic commentary for a character's current bearing.
    pub fn analyze_character(character: &Character) -> String {
        let bearing = match character.emotional_state {
            EmotionalState::Neutral => "composed, giving nothing away",
            EmotionalState::Nervous => "nervous; the hands betray what the face conceals",
            EmotionalState::Angry => "angry, and anger often shields guilt or grief",
            EmotionalState::Sad => "grieving, which may cloud their account",
            EmotionalState::Fearful => "afraid, of you or of someone else",
            EmotionalState::Defensive => "defensive before any charge is laid",
            EmotionalState::Cooperative => "eager to help, perhaps too eager",
        };
        let standing = if character.trust >= 70 {
            "They trust you; a gentle approach will serve."
        } else if character.trust >= 30 {
            "Their trust is unsettled; tread with some care."
        } else {
            "They regard you with suspicion; expect resistance."
        };
        format!("{} appears {}. {}", character.name, bearing, standing)
    }

    /// Deterministic commentary for a pair of evidence items.
    pub fn analyze_connection(a: &Evidence, b: &Evidence) -> String {
        let strength = if a.related_evidence.contains(&b.id) || b.related_evidence.contains(&a.id) {
            "The records reference one another; the connection is material."
        } else {
            "No direct reference links them; any connection is conjecture."
        };
        format!("Considering {} against {}: {}", a.name, b.name, strength)
    }

    // ========================================================================
    // Pending comment mailbox
    // ========================================================================

    /// Overwrites any unread prior remark and announces the new one.
    pub fn queue_comment(&mut self, text: String) {
        self.bus.emit(&GameEvent::AdvisorSpeaks(text.clone()));
        self.pending_comment = Some(text);
    }

    /// Get-and-clear the most recent unread remark.
    pub fn take_pending_comment(&mut self) -> Option<String> {
        self.pending_comment.take()
    }
}
