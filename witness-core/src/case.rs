//! Case content types.
//!
//! Contains the full content graph for one detective case: evidence,
//! characters, locations, deductions, dialogue trees, and the case result
//! computed at accusation time. Content is authored once and loaded at
//! case-start; the mutable session flags (collected, interviewed, visited,
//! unlocked) are layered onto the same records by the entity store.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an evidence item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceId(pub String);

impl EvidenceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for EvidenceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for CharacterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(pub String);

impl LocationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for LocationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeductionId(pub String);

impl DeductionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for DeductionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for DeductionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a dialogue node within a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a dialogue choice within a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChoiceId(pub String);

impl ChoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for ChoiceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// What kind of evidence an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceKind {
    /// A physical object or trace.
    Physical,
    /// A letter, ledger, or other paper.
    Document,
    /// Something a witness said.
    Testimony,
    /// A circumstance the investigator noticed.
    Observation,
}

/// How much weight an evidence item carries. Ordered from least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Importance {
    Minor,
    Normal,
    Major,
    Critical,
}

/// A character's current emotional state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmotionalState {
    #[default]
    Neutral,
    Nervous,
    Angry,
    Sad,
    Fearful,
    Defensive,
    Cooperative,
}

/// The affect tag on a dialogue choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Polite,
    Direct,
    Intimidating,
    Empathetic,
    Cunning,
}

// ============================================================================
// Evidence
// ============================================================================

/// An evidence item: immutable content plus two mutable session flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: EvidenceId,
    pub name: String,
    pub description: String,
    pub kind: EvidenceKind,
    pub importance: Importance,
    /// Where this item can be found.
    pub found_at: LocationId,
    pub related_characters: Vec<CharacterId>,
    pub related_evidence: Vec<EvidenceId>,
    /// Authored advisor commentary, shown instead of the generated analysis.
    pub commentary: Option<String>,
    pub collected: bool,
    pub examined: bool,
}

impl Evidence {
    pub fn new(
        id: impl Into<EvidenceId>,
        name: impl Into<String>,
        kind: EvidenceKind,
        importance: Importance,
        found_at: impl Into<LocationId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind,
            importance,
            found_at: found_at.into(),
            related_characters: Vec::new(),
            related_evidence: Vec::new(),
            commentary: None,
            collected: false,
            examined: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_related_evidence(mut self, ids: Vec<EvidenceId>) -> Self {
        self.related_evidence = ids;
        self
    }

    pub fn with_related_characters(mut self, ids: Vec<CharacterId>) -> Self {
        self.related_characters = ids;
        self
    }

    pub fn with_commentary(mut self, commentary: impl Into<String>) -> Self {
        self.commentary = Some(commentary.into());
        self
    }
}

// ============================================================================
// Characters
// ============================================================================

/// A suspect or witness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    /// Role or station, e.g. "the butler".
    pub role: String,
    pub description: String,
    pub relation_to_victim: String,
    /// Revealed to the player only after discovery.
    pub motive: String,
    pub emotional_state: EmotionalState,
    /// Trust toward the investigator, clamped to [0, 100].
    pub trust: i32,
    pub interviewed: bool,
    pub suspect: bool,
    /// Where this character is normally found.
    pub location: LocationId,
}

impl Character {
    pub fn new(
        id: impl Into<CharacterId>,
        name: impl Into<String>,
        role: impl Into<String>,
        location: impl Into<LocationId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            description: String::new(),
            relation_to_victim: String::new(),
            motive: String::new(),
            emotional_state: EmotionalState::Neutral,
            trust: 50,
            interviewed: false,
            suspect: true,
            location: location.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_emotional_state(mut self, state: EmotionalState) -> Self {
        self.emotional_state = state;
        self
    }

    pub fn with_motive(mut self, motive: impl Into<String>) -> Self {
        self.motive = motive.into();
        self
    }

    pub fn not_a_suspect(mut self) -> Self {
        self.suspect = false;
        self
    }
}

// ============================================================================
// Locations
// ============================================================================

/// A place the investigator can travel to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub description: String,
    /// Evidence that can be found here.
    pub available_evidence: Vec<EvidenceId>,
    /// Characters currently present here.
    pub characters_present: Vec<CharacterId>,
    pub visited: bool,
    pub accessible: bool,
}

impl Location {
    pub fn new(id: impl Into<LocationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            available_evidence: Vec::new(),
            characters_present: Vec::new(),
            visited: false,
            accessible: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_evidence(mut self, ids: Vec<EvidenceId>) -> Self {
        self.available_evidence = ids;
        self
    }

    pub fn with_characters(mut self, ids: Vec<CharacterId>) -> Self {
        self.characters_present = ids;
        self
    }

    pub fn inaccessible(mut self) -> Self {
        self.accessible = false;
        self
    }
}

// ============================================================================
// Deductions
// ============================================================================

/// A player-triggered inference linking two evidence items.
///
/// The evidence pair is unordered: {A, B} and {B, A} name the same deduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deduction {
    pub id: DeductionId,
    pub title: String,
    /// Shown once the deduction is unlocked.
    pub description: String,
    pub evidence_a: EvidenceId,
    pub evidence_b: EvidenceId,
    /// Narrative flags set when this deduction unlocks.
    pub sets_flags: Vec<String>,
    /// Dialogue content gated behind this deduction.
    pub unlocks_dialogue: Vec<NodeId>,
    pub unlocked: bool,
}

impl Deduction {
    pub fn new(
        id: impl Into<DeductionId>,
        title: impl Into<String>,
        evidence_a: impl Into<EvidenceId>,
        evidence_b: impl Into<EvidenceId>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            evidence_a: evidence_a.into(),
            evidence_b: evidence_b.into(),
            sets_flags: Vec::new(),
            unlocks_dialogue: Vec::new(),
            unlocked: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.sets_flags = flags;
        self
    }

    /// Whether the given unordered pair matches this deduction's pair.
    pub fn matches(&self, a: &EvidenceId, b: &EvidenceId) -> bool {
        (self.evidence_a == *a && self.evidence_b == *b)
            || (self.evidence_a == *b && self.evidence_b == *a)
    }
}

// ============================================================================
// Dialogue
// ============================================================================

/// One selectable line in a dialogue node.
///
/// The required-evidence and required-flag sets are visibility gates: a
/// choice whose requirements are unmet is simply not offered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueChoice {
    pub id: ChoiceId,
    pub text: String,
    pub tone: Tone,
    pub required_evidence: Vec<EvidenceId>,
    pub required_flags: Vec<String>,
    /// Node entered when this choice is selected.
    pub next_node: NodeId,
    pub sets_flags: Vec<String>,
    /// Applied to the conversation partner's trust on selection.
    pub trust_delta: i32,
}

impl DialogueChoice {
    pub fn new(
        id: impl Into<ChoiceId>,
        text: impl Into<String>,
        next_node: impl Into<NodeId>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            tone: Tone::Polite,
            required_evidence: Vec::new(),
            required_flags: Vec::new(),
            next_node: next_node.into(),
            sets_flags: Vec::new(),
            trust_delta: 0,
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn requires_evidence(mut self, ids: Vec<EvidenceId>) -> Self {
        self.required_evidence = ids;
        self
    }

    pub fn requires_flags(mut self, flags: Vec<String>) -> Self {
        self.required_flags = flags;
        self
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.sets_flags = flags;
        self
    }

    pub fn with_trust_delta(mut self, delta: i32) -> Self {
        self.trust_delta = delta;
        self
    }
}

/// One line of dialogue, possibly with branching choices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueNode {
    pub id: NodeId,
    /// `None` means narration.
    pub speaker: Option<CharacterId>,
    pub text: String,
    pub emotion: EmotionalState,
    pub choices: Vec<DialogueChoice>,
    /// Where `advance` goes when there are no choices.
    pub next_node: Option<NodeId>,
    /// Evidence granted on arrival at this node.
    pub gains_evidence: Vec<EvidenceId>,
    /// Flags set on arrival at this node.
    pub sets_flags: Vec<String>,
    pub is_end_node: bool,
}

impl DialogueNode {
    pub fn new(id: impl Into<NodeId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            speaker: None,
            text: text.into(),
            emotion: EmotionalState::Neutral,
            choices: Vec::new(),
            next_node: None,
            gains_evidence: Vec::new(),
            sets_flags: Vec::new(),
            is_end_node: false,
        }
    }

    pub fn spoken_by(mut self, speaker: impl Into<CharacterId>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn with_emotion(mut self, emotion: EmotionalState) -> Self {
        self.emotion = emotion;
        self
    }

    pub fn with_choices(mut self, choices: Vec<DialogueChoice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn advances_to(mut self, next: impl Into<NodeId>) -> Self {
        self.next_node = Some(next.into());
        self
    }

    pub fn grants_evidence(mut self, ids: Vec<EvidenceId>) -> Self {
        self.gains_evidence = ids;
        self
    }

    pub fn with_flags(mut self, flags: Vec<String>) -> Self {
        self.sets_flags = flags;
        self
    }

    pub fn end_node(mut self) -> Self {
        self.is_end_node = true;
        self
    }
}

/// A complete conversation tree for one character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueTree {
    pub character: CharacterId,
    pub start_node: NodeId,
    pub nodes: Vec<DialogueNode>,
}

impl DialogueTree {
    pub fn new(character: impl Into<CharacterId>, start_node: impl Into<NodeId>) -> Self {
        Self {
            character: character.into(),
            start_node: start_node.into(),
            nodes: Vec::new(),
        }
    }

    pub fn with_nodes(mut self, nodes: Vec<DialogueNode>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn node(&self, id: &NodeId) -> Option<&DialogueNode> {
        self.nodes.iter().find(|n| n.id == *id)
    }
}

// ============================================================================
// Case data and result
// ============================================================================

/// The full content dataset for one case, consumed at case-start time.
///
/// Referential integrity is not validated; unknown ids encountered at
/// runtime fall back to safe defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseData {
    pub id: String,
    pub title: String,
    pub synopsis: String,
    pub victim: Option<CharacterId>,
    pub true_culprit: Option<CharacterId>,
    /// Where the investigator starts.
    pub starting_location: LocationId,
    pub evidence: Vec<Evidence>,
    pub characters: Vec<Character>,
    pub locations: Vec<Location>,
    pub dialogues: Vec<DialogueTree>,
    pub deductions: Vec<Deduction>,
    /// Every id here must be collected before an accusation can be made.
    pub required_evidence_for_accusation: Vec<EvidenceId>,
}

/// The outcome of an accusation. Computed once; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub accused: CharacterId,
    pub correct_culprit: bool,
    pub suggestions_followed: u32,
    pub suggestions_ignored: u32,
    pub ethical_violations: u32,
    /// Collected evidence count over total evidence count; 0 when the case
    /// has no evidence at all.
    pub evidence_collection_rate: f32,
    pub ending_narrative: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduction_pair_is_unordered() {
        let deduction = Deduction::new("d1", "The Letter and the Knife", "letter", "knife");

        assert!(deduction.matches(&"letter".into(), &"knife".into()));
        assert!(deduction.matches(&"knife".into(), &"letter".into()));
        assert!(!deduction.matches(&"letter".into(), &"watch".into()));
    }

    #[test]
    fn importance_tiers_are_ordered() {
        assert!(Importance::Critical > Importance::Major);
        assert!(Importance::Major > Importance::Normal);
        assert!(Importance::Normal > Importance::Minor);
    }

    #[test]
    fn tree_node_lookup() {
        let tree = DialogueTree::new("butler", "greeting").with_nodes(vec![
            DialogueNode::new("greeting", "Good evening."),
            DialogueNode::new("farewell", "Good night.").end_node(),
        ]);

        assert!(tree.node(&"greeting".into()).is_some());
        assert!(tree.node(&"missing".into()).is_none());
    }
}
