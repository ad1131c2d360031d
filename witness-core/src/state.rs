//! The entity store for one case session.
//!
//! Owns the full content graph plus all mutable session state: collected and
//! examined evidence, trust levels, narrative flags, visited locations, and
//! unlocked deductions. Every lookup is best-effort: unknown ids produce a
//! safe default (`false` / `None`) rather than an error, which keeps the
//! entity graph robust against content-authoring gaps.

use crate::case::{
    CaseData, CaseResult, Character, CharacterId, Deduction, DeductionId, Evidence, EvidenceId,
    Location, LocationId,
};
use crate::events::{EventBus, GameEvent};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, warn};

/// Mutable session state layered over an immutable case dataset.
#[derive(Debug)]
pub struct CaseState {
    case: CaseData,
    current_location: LocationId,
    flags: BTreeSet<String>,
    suggestions_followed: u32,
    suggestions_ignored: u32,
    ethical_violations: u32,
    bus: Rc<EventBus>,
}

impl CaseState {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            case: CaseData::default(),
            current_location: LocationId::default(),
            flags: BTreeSet::new(),
            suggestions_followed: 0,
            suggestions_ignored: 0,
            ethical_violations: 0,
            bus,
        }
    }

    /// Load a case dataset and reset all mutable state.
    pub fn initialize_case(&mut self, case: CaseData) {
        debug!(case = %case.id, "initializing case");
        self.case = case;
        self.reset();
    }

    /// Restore every mutable flag to its case-start value.
    pub fn reset(&mut self) {
        self.current_location = self.case.starting_location.clone();
        self.flags.clear();
        self.suggestions_followed = 0;
        self.suggestions_ignored = 0;
        self.ethical_violations = 0;

        for evidence in &mut self.case.evidence {
            evidence.collected = false;
            evidence.examined = false;
        }
        for character in &mut self.case.characters {
            character.interviewed = false;
            character.trust = 50;
        }
        for location in &mut self.case.locations {
            location.visited = false;
        }
        for deduction in &mut self.case.deductions {
            deduction.unlocked = false;
        }
    }

    pub fn case(&self) -> &CaseData {
        &self.case
    }

    // ========================================================================
    // Evidence
    // ========================================================================

    /// Mark an evidence item collected.
    ///
    /// Returns `false` if the id is unknown or the item was already
    /// collected; only the first successful call emits a notification.
    pub fn collect_evidence(&mut self, id: &EvidenceId) -> bool {
        let Some(evidence) = self.case.evidence.iter_mut().find(|e| e.id == *id) else {
            warn!(evidence = %id, "evidence not found");
            return false;
        };

        if evidence.collected {
            return false;
        }
        evidence.collected = true;

        debug!(evidence = %id, "evidence collected");
        self.bus.emit(&GameEvent::EvidenceCollected(id.clone()));
        true
    }

    /// Mark an evidence item examined, if it exists.
    pub fn examine_evidence(&mut self, id: &EvidenceId) {
        if let Some(evidence) = self.case.evidence.iter_mut().find(|e| e.id == *id) {
            evidence.examined = true;
        }
    }

    pub fn has_evidence(&self, id: &EvidenceId) -> bool {
        self.evidence(id).map(|e| e.collected).unwrap_or(false)
    }

    pub fn evidence(&self, id: &EvidenceId) -> Option<&Evidence> {
        self.case.evidence.iter().find(|e| e.id == *id)
    }

    pub fn collected_evidence(&self) -> Vec<&Evidence> {
        self.case.evidence.iter().filter(|e| e.collected).collect()
    }

    // ========================================================================
    // Deductions
    // ========================================================================

    /// Try to link two evidence items into a deduction.
    ///
    /// Both items must already be collected. The pair is matched order-
    /// independently. A replay against an already-unlocked deduction returns
    /// the existing record without re-applying flags or re-notifying.
    pub fn try_deduction(&mut self, a: &EvidenceId, b: &EvidenceId) -> Option<Deduction> {
        if !self.has_evidence(a) || !self.has_evidence(b) {
            warn!(a = %a, b = %b, "deduction attempted without both evidence items");
            return None;
        }

        let index = self.case.deductions.iter().position(|d| d.matches(a, b))?;

        if self.case.deductions[index].unlocked {
            debug!(deduction = %self.case.deductions[index].id, "deduction replayed");
            return Some(self.case.deductions[index].clone());
        }

        self.case.deductions[index].unlocked = true;
        let flags = self.case.deductions[index].sets_flags.clone();
        for flag in &flags {
            self.set_flag(flag);
        }

        let deduction = self.case.deductions[index].clone();
        debug!(deduction = %deduction.id, "deduction unlocked");
        self.bus
            .emit(&GameEvent::DeductionUnlocked(deduction.id.clone()));
        Some(deduction)
    }

    pub fn unlocked_deductions(&self) -> Vec<&Deduction> {
        self.case.deductions.iter().filter(|d| d.unlocked).collect()
    }

    pub fn is_deduction_unlocked(&self, id: &DeductionId) -> bool {
        self.case
            .deductions
            .iter()
            .find(|d| d.id == *id)
            .map(|d| d.unlocked)
            .unwrap_or(false)
    }

    /// Whether any unlocked deduction covers this exact unordered pair.
    pub fn pair_already_deduced(&self, a: &EvidenceId, b: &EvidenceId) -> bool {
        self.case
            .deductions
            .iter()
            .any(|d| d.unlocked && d.matches(a, b))
    }

    // ========================================================================
    // Flags
    // ========================================================================

    /// Set a narrative flag. Flags are never cleared; re-setting is a no-op
    /// and does not re-notify.
    pub fn set_flag(&mut self, name: &str) {
        if self.flags.insert(name.to_string()) {
            debug!(flag = name, "flag set");
            self.bus.emit(&GameEvent::FlagSet(name.to_string()));
        }
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn has_all_flags(&self, names: &[String]) -> bool {
        names.iter().all(|name| self.flags.contains(name))
    }

    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    // ========================================================================
    // Characters
    // ========================================================================

    pub fn character(&self, id: &CharacterId) -> Option<&Character> {
        self.case.characters.iter().find(|c| c.id == *id)
    }

    /// Apply a signed trust delta, clamped to [0, 100].
    ///
    /// Notifies whenever the character exists, even if clamping left the
    /// value unchanged (best-effort "notify on touch").
    pub fn modify_trust(&mut self, id: &CharacterId, delta: i32) {
        let Some(character) = self.case.characters.iter_mut().find(|c| c.id == *id) else {
            return;
        };

        character.trust = (character.trust + delta).clamp(0, 100);
        let trust = character.trust;

        debug!(character = %id, trust, "trust changed");
        self.bus.emit(&GameEvent::TrustChanged {
            character: id.clone(),
            trust,
        });
    }

    pub fn mark_interviewed(&mut self, id: &CharacterId) {
        if let Some(character) = self.case.characters.iter_mut().find(|c| c.id == *id) {
            character.interviewed = true;
        }
    }

    pub fn suspects(&self) -> Vec<&Character> {
        self.case.characters.iter().filter(|c| c.suspect).collect()
    }

    // ========================================================================
    // Locations
    // ========================================================================

    pub fn current_location(&self) -> &LocationId {
        &self.current_location
    }

    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        self.case.locations.iter().find(|l| l.id == *id)
    }

    pub fn accessible_locations(&self) -> Vec<&Location> {
        self.case
            .locations
            .iter()
            .filter(|l| l.accessible)
            .collect()
    }

    /// Move to a location. Fails silently if the id is unknown or the
    /// location is inaccessible. The visited flag and its notification fire
    /// on first visit only.
    pub fn travel_to(&mut self, id: &LocationId) -> bool {
        let Some(location) = self.case.locations.iter_mut().find(|l| l.id == *id) else {
            warn!(location = %id, "location not found");
            return false;
        };
        if !location.accessible {
            warn!(location = %id, "location not accessible");
            return false;
        }

        self.current_location = id.clone();

        if !location.visited {
            location.visited = true;
            self.bus.emit(&GameEvent::LocationVisited(id.clone()));
        }

        debug!(location = %id, "traveled");
        true
    }

    // ========================================================================
    // Advisor bookkeeping
    // ========================================================================

    pub fn increment_suggestions_followed(&mut self) {
        self.suggestions_followed += 1;
    }

    pub fn increment_suggestions_ignored(&mut self) {
        self.suggestions_ignored += 1;
    }

    pub fn increment_ethical_violations(&mut self) {
        self.ethical_violations += 1;
    }

    // ========================================================================
    // Accusation
    // ========================================================================

    /// Whether every evidence item the case requires for an accusation has
    /// been collected.
    pub fn can_accuse(&self) -> bool {
        self.case
            .required_evidence_for_accusation
            .iter()
            .all(|id| self.has_evidence(id))
    }

    /// Compute the case result for accusing the given character.
    ///
    /// Callable at any time; the flow controller decides when this is
    /// reachable.
    pub fn accuse(&self, accused: &CharacterId) -> CaseResult {
        let correct = self
            .case
            .true_culprit
            .as_ref()
            .map(|culprit| culprit == accused)
            .unwrap_or(false);

        let total = self.case.evidence.len();
        let collected = self.case.evidence.iter().filter(|e| e.collected).count();
        let rate = if total > 0 {
            collected as f32 / total as f32
        } else {
            0.0
        };

        let ending_narrative = if correct {
            if self.ethical_violations == 0 {
                "The truth is laid bare and justice is served. Your methods \
                 were beyond reproach."
            } else {
                "The culprit is caught. But questions linger over the methods \
                 you employed..."
            }
        } else {
            "An innocent stands accused. The true culprit walks free..."
        };

        debug!(accused = %accused, correct, "accusation made");

        CaseResult {
            accused: accused.clone(),
            correct_culprit: correct,
            suggestions_followed: self.suggestions_followed,
            suggestions_ignored: self.suggestions_ignored,
            ethical_violations: self.ethical_violations,
            evidence_collection_rate: rate,
            ending_narrative: ending_narrative.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_case, EventLog};

    fn store() -> (CaseState, EventLog) {
        let bus = EventBus::new();
        let log = EventLog::attach(&bus);
        let mut state = CaseState::new(bus);
        state.initialize_case(sample_case());
        (state, log)
    }

    #[test]
    fn collect_succeeds_exactly_once() {
        let (mut state, log) = store();
        let id: EvidenceId = "bloodstained_letter".into();

        assert!(state.collect_evidence(&id));
        assert!(!state.collect_evidence(&id));
        assert!(!state.collect_evidence(&id));

        assert_eq!(state.collected_evidence().len(), 1);
        assert_eq!(
            log.count(|e| matches!(e, GameEvent::EvidenceCollected(_))),
            1
        );
    }

    #[test]
    fn collect_unknown_evidence_fails_silently() {
        let (mut state, log) = store();
        assert!(!state.collect_evidence(&"phantom".into()));
        assert!(log.is_empty());
    }

    #[test]
    fn deduction_requires_both_items_collected() {
        let (mut state, _log) = store();
        state.collect_evidence(&"bloodstained_letter".into());

        let result = state.try_deduction(&"bloodstained_letter".into(), &"torn_photograph".into());
        assert!(result.is_none());
    }

    #[test]
    fn deduction_is_order_independent_and_replay_safe() {
        let (mut state, log) = store();
        state.collect_evidence(&"bloodstained_letter".into());
        state.collect_evidence(&"torn_photograph".into());

        let first = state.try_deduction(&"bloodstained_letter".into(), &"torn_photograph".into());
        let first = first.expect("deduction should match");
        assert!(state.has_flag("knows_affair"));

        // Reversed order matches the same deduction without re-notifying.
        let replay = state.try_deduction(&"torn_photograph".into(), &"bloodstained_letter".into());
        assert_eq!(replay.map(|d| d.id), Some(first.id));
        assert_eq!(log.count(|e| matches!(e, GameEvent::DeductionUnlocked(_))), 1);
        assert_eq!(
            log.count(|e| matches!(e, GameEvent::FlagSet(f) if f == "knows_affair")),
            1
        );
    }

    #[test]
    fn flags_are_monotonic_and_notify_once() {
        let (mut state, log) = store();
        state.set_flag("met_the_butler");
        state.set_flag("met_the_butler");

        assert!(state.has_flag("met_the_butler"));
        assert_eq!(log.count(|e| matches!(e, GameEvent::FlagSet(_))), 1);
    }

    #[test]
    fn trust_clamps_and_always_notifies_on_touch() {
        let (mut state, log) = store();
        let butler: CharacterId = "edmund_carrow".into();

        state.modify_trust(&butler, 100);
        assert_eq!(state.character(&butler).map(|c| c.trust), Some(100));

        // Clamped no-op still notifies.
        state.modify_trust(&butler, 10);
        assert_eq!(state.character(&butler).map(|c| c.trust), Some(100));
        assert_eq!(log.count(|e| matches!(e, GameEvent::TrustChanged { .. })), 2);

        state.modify_trust(&butler, -300);
        assert_eq!(state.character(&butler).map(|c| c.trust), Some(0));
    }

    #[test]
    fn travel_to_inaccessible_location_is_rejected() {
        let (mut state, log) = store();
        let before = state.current_location().clone();

        assert!(!state.travel_to(&"cellar".into()));
        assert_eq!(state.current_location(), &before);
        assert!(log.count(|e| matches!(e, GameEvent::LocationVisited(_))) == 0);
    }

    #[test]
    fn location_visited_fires_on_first_visit_only() {
        let (mut state, log) = store();

        assert!(state.travel_to(&"study".into()));
        assert!(state.travel_to(&"drawing_room".into()));
        assert!(state.travel_to(&"study".into()));

        assert_eq!(log.count(|e| matches!(e, GameEvent::LocationVisited(_))), 2);
    }

    #[test]
    fn can_accuse_requires_every_listed_item() {
        let (mut state, _log) = store();
        assert!(!state.can_accuse());

        state.collect_evidence(&"bloodstained_letter".into());
        state.collect_evidence(&"torn_photograph".into());
        assert!(!state.can_accuse());

        // A non-required item does not substitute for the missing one.
        state.collect_evidence(&"muddy_boots".into());
        assert!(!state.can_accuse());

        state.collect_evidence(&"ledger_page".into());
        assert!(state.can_accuse());
    }

    #[test]
    fn accusation_result_reflects_identity_and_collection_rate() {
        let (mut state, _log) = store();
        state.collect_evidence(&"bloodstained_letter".into());

        let result = state.accuse(&"vivian_ashford".into());
        assert!(result.correct_culprit);
        assert_eq!(result.evidence_collection_rate, 1.0 / 5.0);

        let wrong = state.accuse(&"edmund_carrow".into());
        assert!(!wrong.correct_culprit);
        assert_eq!(wrong.evidence_collection_rate, 1.0 / 5.0);
    }

    #[test]
    fn reset_restores_case_start_state() {
        let (mut state, _log) = store();
        state.collect_evidence(&"bloodstained_letter".into());
        state.set_flag("knows_affair");
        state.modify_trust(&"edmund_carrow".into(), 30);
        state.travel_to(&"study".into());

        state.reset();

        assert!(state.collected_evidence().is_empty());
        assert!(!state.has_flag("knows_affair"));
        assert_eq!(state.character(&"edmund_carrow".into()).map(|c| c.trust), Some(50));
        assert_eq!(state.current_location(), &"office".into());
        assert!(state.unlocked_deductions().is_empty());
    }
}
