//! The top-level flow controller.
//!
//! Owns the entity store, the dialogue engine, and the advisor, sequences
//! every player intent across them, and tracks the session phase. This is the
//! single command surface the presentation layer drives; it never reaches
//! into the components directly.

use crate::advisor::{AdvisorEngine, SuggestionId};
use crate::case::{CaseData, CaseResult, Character, CharacterId, ChoiceId, Deduction, Evidence, EvidenceId, LocationId};
use crate::dialogue::DialogueEngine;
use crate::events::{EventBus, GameEvent};
use crate::state::CaseState;
use std::rc::Rc;
use tracing::{debug, warn};

/// Where the session currently is in its overall flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    MainMenu,
    CaseIntro,
    Investigation,
    Dialogue,
    Advisor,
    Deduction,
    Accusation,
    Resolution,
}

/// A player intent currently worth offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerAction {
    Examine,
    TalkTo,
    ConsultAdvisor,
    OpenJournal,
    Travel,
    Accuse,
}

/// Failures crossing the optional advisory text boundary.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("no advisory text client is attached")]
    NoAdvisoryClient,
    #[error("advisory text request failed: {0}")]
    Advisory(#[from] llm::Error),
}

/// One full game session: components, phase, and the eventual result.
pub struct Game {
    bus: Rc<EventBus>,
    state: CaseState,
    dialogue: DialogueEngine,
    advisor: AdvisorEngine,
    phase: Phase,
    provider: Box<dyn Fn() -> CaseData>,
    client: Option<llm::Client>,
    result: Option<CaseResult>,
}

impl Game {
    /// Build a session around a content provider. The provider is invoked
    /// once per `start_case` call, decoupling the engine from any concrete
    /// case script.
    pub fn new(provider: impl Fn() -> CaseData + 'static) -> Self {
        let bus = EventBus::new();
        Self {
            state: CaseState::new(Rc::clone(&bus)),
            dialogue: DialogueEngine::new(Rc::clone(&bus)),
            advisor: AdvisorEngine::new(Rc::clone(&bus)),
            bus,
            phase: Phase::MainMenu,
            provider: Box::new(provider),
            client: None,
            result: None,
        }
    }

    /// Attach a remote text client for flavor commentary. Core behavior is
    /// identical without one.
    pub fn with_advisory_client(mut self, client: llm::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Subscription point for presentation observers.
    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &CaseState {
        &self.state
    }

    pub fn dialogue(&self) -> &DialogueEngine {
        &self.dialogue
    }

    pub fn advisor(&self) -> &AdvisorEngine {
        &self.advisor
    }

    pub fn result(&self) -> Option<&CaseResult> {
        self.result.as_ref()
    }

    // ========================================================================
    // Session flow
    // ========================================================================

    /// Load fresh content and reset every component.
    pub fn start_case(&mut self) {
        let case = (self.provider)();
        debug!(case = %case.id, "starting case");

        self.dialogue.load_trees(case.dialogues.clone());
        self.state.initialize_case(case);
        self.advisor.on_case_started();
        self.result = None;
        self.set_phase(Phase::CaseIntro);
    }

    /// Leave the case introduction for the investigation proper.
    pub fn begin_investigation(&mut self) {
        self.set_phase(Phase::Investigation);
    }

    pub fn travel_to(&mut self, location: &LocationId) -> bool {
        if !self.state.travel_to(location) {
            return false;
        }
        self.advisor.on_location_changed(&self.state);
        self.set_phase(Phase::Investigation);
        true
    }

    pub fn collect_evidence(&mut self, id: &EvidenceId) -> bool {
        let collected = self.state.collect_evidence(id);
        if collected {
            self.advisor.on_evidence_collected(&self.state, id);
        }
        self.set_phase(Phase::Investigation);
        collected
    }

    pub fn examine_evidence(&mut self, id: &EvidenceId) {
        self.state.examine_evidence(id);
        self.advisor.on_evidence_examined(&self.state, id);
        self.set_phase(Phase::Investigation);
    }

    // ========================================================================
    // Dialogue
    // ========================================================================

    pub fn talk_to(&mut self, character: &CharacterId) -> bool {
        if !self.dialogue.start_dialogue(&mut self.state, character) {
            return false;
        }
        if let Some(partner) = self.state.character(character) {
            self.advisor.on_dialogue_started(partner);
        }
        self.set_phase(Phase::Dialogue);
        true
    }

    pub fn select_choice(&mut self, choice: &ChoiceId) -> bool {
        let selected = self.dialogue.select_choice(&mut self.state, choice);
        if !self.dialogue.in_dialogue() {
            self.set_phase(Phase::Investigation);
        }
        selected
    }

    pub fn advance_dialogue(&mut self) {
        self.dialogue.advance(&mut self.state);
        if !self.dialogue.in_dialogue() {
            self.set_phase(Phase::Investigation);
        }
    }

    pub fn end_dialogue(&mut self) {
        self.dialogue.end_dialogue();
        self.set_phase(Phase::Investigation);
    }

    // ========================================================================
    // Advisor
    // ========================================================================

    /// Regenerate advice from current state and switch to the advisor view.
    pub fn consult_advisor(&mut self) {
        self.advisor.generate_suggestions(&self.state);
        self.set_phase(Phase::Advisor);
    }

    pub fn follow_suggestion(&mut self, id: SuggestionId) -> bool {
        let Some(suggestion) = self.advisor.follow_suggestion(id) else {
            return false;
        };
        self.state.increment_suggestions_followed();
        if suggestion.ethically_questionable {
            self.state.increment_ethical_violations();
        }
        true
    }

    pub fn ignore_suggestion(&mut self, id: SuggestionId) -> bool {
        if !self.advisor.ignore_suggestion(id) {
            return false;
        }
        self.state.increment_suggestions_ignored();
        true
    }

    pub fn take_advisor_comment(&mut self) -> Option<String> {
        self.advisor.take_pending_comment()
    }

    // ========================================================================
    // Deduction and accusation
    // ========================================================================

    pub fn open_deduction_board(&mut self) {
        self.set_phase(Phase::Deduction);
    }

    pub fn try_deduction(&mut self, a: &EvidenceId, b: &EvidenceId) -> Option<Deduction> {
        let deduction = self.state.try_deduction(a, b);
        if let Some(deduction) = &deduction {
            self.advisor.on_deduction_made(&deduction.title);
        }
        self.set_phase(Phase::Deduction);
        deduction
    }

    /// Enter the accusation phase, if the evidentiary requirements are met.
    pub fn begin_accusation(&mut self) -> bool {
        if !self.state.can_accuse() {
            warn!("accusation attempted without required evidence");
            return false;
        }
        self.set_phase(Phase::Accusation);
        true
    }

    /// Accuse a character and end the case.
    ///
    /// Requires the same evidentiary gate as `begin_accusation`; the result
    /// is computed once and the session moves to resolution.
    pub fn accuse(&mut self, character: &CharacterId) -> Option<CaseResult> {
        if !self.state.can_accuse() {
            warn!(accused = %character, "accusation rejected, required evidence missing");
            return None;
        }

        let result = self.state.accuse(character);
        self.result = Some(result.clone());
        self.bus.emit(&GameEvent::GameEnded(result.clone()));
        self.set_phase(Phase::Resolution);
        Some(result)
    }

    // ========================================================================
    // Derived queries for presentation
    // ========================================================================

    /// Uncollected evidence findable at the current location.
    pub fn examinable_evidence_here(&self) -> Vec<&Evidence> {
        let Some(location) = self.state.location(self.state.current_location()) else {
            return Vec::new();
        };
        location
            .available_evidence
            .iter()
            .filter_map(|id| self.state.evidence(id))
            .filter(|evidence| !evidence.collected)
            .collect()
    }

    /// Characters present at the current location.
    pub fn characters_here(&self) -> Vec<&Character> {
        let Some(location) = self.state.location(self.state.current_location()) else {
            return Vec::new();
        };
        location
            .characters_present
            .iter()
            .filter_map(|id| self.state.character(id))
            .collect()
    }

    /// Intents worth offering right now. Accusation appears only once its
    /// evidentiary gate is satisfied.
    pub fn available_actions(&self) -> Vec<PlayerAction> {
        let mut actions = vec![
            PlayerAction::Examine,
            PlayerAction::TalkTo,
            PlayerAction::ConsultAdvisor,
            PlayerAction::OpenJournal,
            PlayerAction::Travel,
        ];
        if self.state.can_accuse() {
            actions.push(PlayerAction::Accuse);
        }
        actions
    }

    // ========================================================================
    // Advisory text boundary
    // ========================================================================

    /// Forward a free-form prompt to the attached text client under the fixed
    /// advisor persona. Fails fast while a request is already in flight.
    pub async fn request_commentary(&self, prompt: &str) -> Result<String, GameError> {
        let client = self.client.as_ref().ok_or(GameError::NoAdvisoryClient)?;
        let text = client.generate(prompt, llm::advisor_system_prompt()).await?;
        Ok(text)
    }

    fn set_phase(&mut self, phase: Phase) {
        if phase == self.phase {
            return;
        }
        debug!(from = ?self.phase, to = ?phase, "phase changed");
        self.phase = phase;
        self.bus.emit(&GameEvent::PhaseChanged(phase));
    }
}

impl std::fmt::Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("phase", &self.phase)
            .field("state", &self.state)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_case, EventLog};

    fn session() -> (Game, EventLog) {
        let mut game = Game::new(sample_case);
        let log = EventLog::attach(game.bus());
        game.start_case();
        (game, log)
    }

    #[test]
    fn phase_changed_fires_only_on_actual_change() {
        let (mut game, log) = session();
        game.begin_investigation();
        game.begin_investigation();
        game.collect_evidence(&"ledger_page".into());

        // MainMenu -> CaseIntro -> Investigation, then nothing.
        assert_eq!(log.count(|e| matches!(e, GameEvent::PhaseChanged(_))), 2);
        assert_eq!(game.phase(), Phase::Investigation);
    }

    #[test]
    fn accusation_is_gated_on_required_evidence() {
        let (mut game, _log) = session();
        game.begin_investigation();

        assert!(!game.begin_accusation());
        assert!(game.accuse(&"vivian_ashford".into()).is_none());
        assert_eq!(game.phase(), Phase::Investigation);

        for id in ["bloodstained_letter", "torn_photograph", "ledger_page"] {
            game.collect_evidence(&id.into());
        }
        assert!(game.available_actions().contains(&PlayerAction::Accuse));
        assert!(game.begin_accusation());

        let result = game.accuse(&"vivian_ashford".into());
        assert!(result.map(|r| r.correct_culprit).unwrap_or(false));
        assert_eq!(game.phase(), Phase::Resolution);
        assert!(game.result().is_some());
    }

    #[test]
    fn dialogue_flow_returns_to_investigation_when_it_ends() {
        let (mut game, _log) = session();
        game.begin_investigation();
        game.travel_to(&"study".into());

        assert!(game.talk_to(&"edmund_carrow".into()));
        assert_eq!(game.phase(), Phase::Dialogue);

        game.end_dialogue();
        assert_eq!(game.phase(), Phase::Investigation);
    }

    #[test]
    fn suggestion_bookkeeping_reaches_the_case_result() {
        let (mut game, _log) = session();
        game.begin_investigation();
        game.consult_advisor();
        assert_eq!(game.phase(), Phase::Advisor);

        let ids: Vec<_> = game.advisor().suggestions().iter().map(|s| s.id).collect();
        assert!(!ids.is_empty());
        assert!(game.follow_suggestion(ids[0]));
        assert!(game.ignore_suggestion(ids[0]));
        assert!(!game.follow_suggestion(SuggestionId(9999)));

        for id in ["bloodstained_letter", "torn_photograph", "ledger_page"] {
            game.collect_evidence(&id.into());
        }
        let result = game.accuse(&"edmund_carrow".into());
        let result = result.expect("accusation gate satisfied");
        assert_eq!(result.suggestions_followed, 1);
        assert_eq!(result.suggestions_ignored, 1);
        assert!(!result.correct_culprit);
    }

    #[test]
    fn derived_queries_track_the_current_location() {
        let (mut game, _log) = session();
        game.begin_investigation();
        game.travel_to(&"drawing_room".into());

        let here: Vec<_> = game
            .examinable_evidence_here()
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert!(here.contains(&"torn_photograph".into()));

        game.collect_evidence(&"torn_photograph".into());
        let here: Vec<_> = game
            .examinable_evidence_here()
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert!(!here.contains(&"torn_photograph".into()));

        let people: Vec<_> = game.characters_here().iter().map(|c| c.id.clone()).collect();
        assert_eq!(people, vec!["vivian_ashford".into()]);
    }

    #[test]
    fn deduction_through_the_controller_notifies_the_advisor() {
        let (mut game, _log) = session();
        game.begin_investigation();
        game.collect_evidence(&"bloodstained_letter".into());
        game.collect_evidence(&"torn_photograph".into());
        game.take_advisor_comment();

        let deduction =
            game.try_deduction(&"bloodstained_letter".into(), &"torn_photograph".into());
        assert!(deduction.is_some());
        assert_eq!(game.phase(), Phase::Deduction);
        assert!(game.take_advisor_comment().is_some());
        assert_eq!(game.advisor().relationship(), 2);
    }

    #[test]
    fn starting_a_case_twice_resets_everything() {
        let (mut game, _log) = session();
        game.begin_investigation();
        game.collect_evidence(&"ledger_page".into());
        game.travel_to(&"study".into());

        game.start_case();
        assert_eq!(game.phase(), Phase::CaseIntro);
        assert!(game.state().collected_evidence().is_empty());
        assert_eq!(game.state().current_location(), &"office".into());
        assert!(game.result().is_none());
    }

    #[tokio::test]
    async fn commentary_without_a_client_is_an_error() {
        let (game, _log) = session();
        let err = game.request_commentary("what do you make of this?").await;
        assert!(matches!(err, Err(GameError::NoAdvisoryClient)));
    }
}
