//! Deterministic fixtures for unit and integration tests.
//!
//! `sample_case` builds a small but complete case dataset exercising every
//! content feature: gated choices, evidence granted mid-dialogue, an
//! inaccessible location, deductions, and an accusation requirement list.
//! `EventLog` records everything a bus emits so tests can assert on
//! notification counts and ordering.

use crate::case::{
    CaseData, Character, DialogueChoice, DialogueNode, DialogueTree, Deduction, EmotionalState,
    Evidence, EvidenceKind, Importance, Location, Tone,
};
use crate::events::{EventBus, GameEvent};
use std::cell::RefCell;
use std::rc::Rc;

/// A records-everything subscriber.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Rc<RefCell<Vec<GameEvent>>>,
}

impl EventLog {
    pub fn attach(bus: &Rc<EventBus>) -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        bus.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        Self { events }
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&GameEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| predicate(e)).count()
    }

    pub fn contains(&self, predicate: impl Fn(&GameEvent) -> bool) -> bool {
        self.events.borrow().iter().any(|e| predicate(e))
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

/// The death of Lord Ashford: five evidence items, three characters, five
/// locations, two deductions, and dialogue trees for both suspects.
pub fn sample_case() -> CaseData {
    CaseData {
        id: "ashford_affair".to_string(),
        title: "The Ashford Affair".to_string(),
        synopsis: "Lord Ashford lies dead in his study. The house is full of \
                   people with reasons to want him so."
            .to_string(),
        victim: Some("lord_ashford".into()),
        true_culprit: Some("vivian_ashford".into()),
        starting_location: "office".into(),
        evidence: vec![
            Evidence::new(
                "bloodstained_letter",
                "Bloodstained Letter",
                EvidenceKind::Document,
                Importance::Critical,
                "study",
            )
            .with_description("A half-finished letter, spotted with blood.")
            .with_related_evidence(vec!["torn_photograph".into()])
            .with_related_characters(vec!["vivian_ashford".into()]),
            Evidence::new(
                "torn_photograph",
                "Torn Photograph",
                EvidenceKind::Physical,
                Importance::Major,
                "drawing_room",
            )
            .with_description("A photograph torn in two; one half is missing.")
            .with_related_evidence(vec!["bloodstained_letter".into()]),
            Evidence::new(
                "ledger_page",
                "Ledger Page",
                EvidenceKind::Document,
                Importance::Major,
                "office",
            )
            .with_description("A page of debts in Lord Ashford's hand.")
            .with_related_characters(vec!["edmund_carrow".into()]),
            Evidence::new(
                "muddy_boots",
                "Muddy Boots",
                EvidenceKind::Physical,
                Importance::Minor,
                "garden",
            )
            .with_description("Boots caked with fresh garden soil."),
            Evidence::new(
                "pocket_watch",
                "Stopped Pocket Watch",
                EvidenceKind::Physical,
                Importance::Normal,
                "drawing_room",
            )
            .with_description("The hands are stopped at ten minutes past eleven.")
            .with_commentary(
                "The watch stopped at eleven ten. If it stopped in the \
                 struggle, we have our hour.",
            ),
        ],
        characters: vec![
            Character::new("vivian_ashford", "Vivian Ashford", "the widow", "drawing_room")
                .with_description("Lord Ashford's young second wife.")
                .with_emotional_state(EmotionalState::Defensive)
                .with_motive("The affair, and the will that would have cut her out."),
            Character::new("edmund_carrow", "Edmund Carrow", "the butler", "study")
                .with_description("Thirty years in service to the house.")
                .with_emotional_state(EmotionalState::Nervous)
                .with_motive("Debts entered in his master's ledger."),
            Character::new("dr_pemberton", "Dr. Pemberton", "the family physician", "office")
                .with_description("Called to the house within the hour.")
                .not_a_suspect(),
        ],
        locations: vec![
            Location::new("office", "Constabulary Office")
                .with_description("Your borrowed desk at the constabulary.")
                .with_evidence(vec!["ledger_page".into()])
                .with_characters(vec!["dr_pemberton".into()]),
            Location::new("study", "The Study")
                .with_description("Where the body was found.")
                .with_evidence(vec!["bloodstained_letter".into()])
                .with_characters(vec!["edmund_carrow".into()]),
            Location::new("drawing_room", "The Drawing Room")
                .with_description("Heavy curtains, a cold fireplace.")
                .with_evidence(vec!["torn_photograph".into(), "pocket_watch".into()])
                .with_characters(vec!["vivian_ashford".into()]),
            Location::new("garden", "The Garden")
                .with_description("Rain-soft beds beneath the study window.")
                .with_evidence(vec!["muddy_boots".into()]),
            Location::new("cellar", "The Cellar")
                .with_description("Locked since the constables arrived.")
                .inaccessible(),
        ],
        dialogues: vec![
            DialogueTree::new("edmund_carrow", "greeting").with_nodes(vec![
                DialogueNode::new("greeting", "Good evening, Inspector. A terrible business.")
                    .spoken_by("edmund_carrow")
                    .with_emotion(EmotionalState::Nervous)
                    .with_choices(vec![
                        DialogueChoice::new(
                            "ask_evening",
                            "Walk me through the evening, Mr. Carrow.",
                            "evening",
                        )
                        .with_trust_delta(5),
                        DialogueChoice::new(
                            "press_affair",
                            "I know about the affair. So did you.",
                            "affair",
                        )
                        .with_tone(Tone::Direct)
                        .requires_flags(vec!["knows_affair".to_string()])
                        .with_flags(vec!["pressed_butler".to_string()])
                        .with_trust_delta(-5),
                    ]),
                DialogueNode::new(
                    "evening",
                    "His lordship retired at ten. I found his watch beneath \
                     the desk when... when I found him. Take it.",
                )
                .spoken_by("edmund_carrow")
                .grants_evidence(vec!["pocket_watch".into()])
                .advances_to("evening_close"),
                DialogueNode::new("evening_close", "He bows and withdraws to the doorway.")
                    .end_node(),
                DialogueNode::new(
                    "affair",
                    "I kept his lordship's secrets, sir. All of them. It was \
                     not my place to do otherwise.",
                )
                .spoken_by("edmund_carrow")
                .with_emotion(EmotionalState::Fearful)
                .with_flags(vec!["butler_admitted_affair".to_string()])
                .end_node(),
            ]),
            DialogueTree::new("vivian_ashford", "vivian_intro").with_nodes(vec![
                DialogueNode::new(
                    "vivian_intro",
                    "I have already told the constables everything, Inspector.",
                )
                .spoken_by("vivian_ashford")
                .with_emotion(EmotionalState::Defensive)
                .with_choices(vec![
                    DialogueChoice::new(
                        "offer_condolences",
                        "My condolences, Lady Ashford.",
                        "vivian_warm",
                    )
                    .with_tone(Tone::Empathetic)
                    .with_trust_delta(10),
                    DialogueChoice::new(
                        "show_letter",
                        "Then explain this letter.",
                        "vivian_cornered",
                    )
                    .with_tone(Tone::Direct)
                    .requires_evidence(vec!["bloodstained_letter".into()])
                    .with_trust_delta(-15),
                ]),
                DialogueNode::new(
                    "vivian_warm",
                    "You are kinder than your colleagues. Ask what you must.",
                )
                .spoken_by("vivian_ashford")
                .end_node(),
                DialogueNode::new(
                    "vivian_cornered",
                    "Where did you... he was going to send it. He was going \
                     to ruin me.",
                )
                .spoken_by("vivian_ashford")
                .with_emotion(EmotionalState::Fearful)
                .with_flags(vec!["vivian_shaken".to_string()])
                .end_node(),
            ]),
        ],
        deductions: vec![
            Deduction::new(
                "affair_revealed",
                "The Letter and the Photograph",
                "bloodstained_letter",
                "torn_photograph",
            )
            .with_description("The letter names the person in the missing half.")
            .with_flags(vec!["knows_affair".to_string()]),
            Deduction::new(
                "time_of_death",
                "The Watch and the Boots",
                "pocket_watch",
                "muddy_boots",
            )
            .with_description("Whoever crossed the garden did so after the rain, near eleven.")
            .with_flags(vec!["knows_hour".to_string()]),
        ],
        required_evidence_for_accusation: vec![
            "bloodstained_letter".into(),
            "torn_photograph".into(),
            "ledger_page".into(),
        ],
    }
}
