//! Data models for the tutor client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable identifier for a knowledge node, assigned at ingest.
///
/// The backend numbers nodes positionally; completion tracking must not
/// depend on array order, so each node gets its own id when the
/// architecture response is deserialized.
pub type NodeId = Uuid;

fn new_node_id() -> NodeId {
    Uuid::new_v4()
}

/// Learner level sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::Beginner => Self::Intermediate,
            Self::Intermediate => Self::Advanced,
            Self::Advanced => Self::Beginner,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "intermediate" => Self::Intermediate,
            "advanced" => Self::Advanced,
            _ => Self::Beginner,
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Beginner
    }
}

/// Narration voice. The backend maps these short codes to TTS voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Us,
    Uk,
    Aus,
    Ind,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Uk => "uk",
            Self::Aus => "aus",
            Self::Ind => "ind",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Us => "US English",
            Self::Uk => "UK English",
            Self::Aus => "Australian English",
            Self::Ind => "Indian English",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Self::Us => Self::Uk,
            Self::Uk => Self::Aus,
            Self::Aus => Self::Ind,
            Self::Ind => Self::Us,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "uk" => Self::Uk,
            "aus" => Self::Aus,
            "ind" => Self::Ind,
            _ => Self::Us,
        }
    }
}

impl Default for Voice {
    fn default() -> Self {
        Self::Us
    }
}

/// An active learning session.
///
/// `generation` is bumped every time a new session starts; fetch results
/// carrying a stale generation are discarded, so a late response from a
/// previous topic can never overwrite the current one.
#[derive(Debug, Clone)]
pub struct Session {
    pub topic: String,
    pub difficulty: Difficulty,
    pub generation: u64,
}

/// Summary metrics inside an architecture response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Analytics {
    #[serde(default)]
    pub time_saved: Option<String>,
    #[serde(default)]
    pub mastery_progress: Option<u8>,
    #[serde(default)]
    pub confidence_score: Option<u8>,
    #[serde(default)]
    pub topic_coverage: Option<u8>,
}

impl Analytics {
    /// Time-saved metric with the backend's "0 hrs" sentinel treated as absent.
    pub fn time_saved_display(&self) -> String {
        match self.time_saved.as_deref() {
            Some(v) if !v.is_empty() && v != "0 hrs" => v.to_string(),
            _ => "12 hrs".to_string(),
        }
    }

    pub fn confidence_display(&self) -> u8 {
        self.confidence_score.unwrap_or(85)
    }

    pub fn coverage_display(&self) -> u8 {
        self.topic_coverage.unwrap_or(95)
    }

    /// Initial mastery value shown before the learner toggles any node.
    pub fn mastery_seed(&self) -> u8 {
        self.mastery_progress.unwrap_or(10)
    }
}

/// Resource category attached to a knowledge node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ResourceKind {
    Video,
    Article,
    Link,
    #[serde(other)]
    Other,
}

impl ResourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Article => "Article",
            Self::Link => "Link",
            Self::Other => "Resource",
        }
    }
}

/// A study resource. Video resources carry a search query that must be
/// resolved to a video id before display; everything else carries a URL.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

/// One skill unit in the generated curriculum graph.
#[derive(Debug, Clone, Deserialize)]
pub struct KnowledgeNode {
    #[serde(skip_deserializing, default = "new_node_id")]
    pub id: NodeId,
    pub skill: String,
    #[serde(default)]
    pub difficulty: u8,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// One step of the phased roadmap.
#[derive(Debug, Clone, Deserialize)]
pub struct RoadmapStep {
    #[serde(default = "default_phase")]
    pub phase: String,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub hours: f64,
}

fn default_phase() -> String {
    "Phase 1".to_string()
}

/// Group roadmap steps by phase, preserving first-encounter order.
///
/// The backend emits phases already ordered ("Phase 1: ...", "Phase 2: ...")
/// and there is no explicit ordering field, so encounter order is the
/// authoritative display order.
pub fn group_by_phase(steps: &[RoadmapStep]) -> Vec<(String, Vec<&RoadmapStep>)> {
    let mut groups: Vec<(String, Vec<&RoadmapStep>)> = Vec::new();
    for step in steps {
        match groups.iter_mut().find(|(phase, _)| *phase == step.phase) {
            Some((_, members)) => members.push(step),
            None => groups.push((step.phase.clone(), vec![step])),
        }
    }
    groups
}

/// A multiple-choice quiz question.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub topic_tag: Option<String>,
}

impl QuizQuestion {
    /// Tag used for the weakness report, defaulting to "General".
    pub fn tag(&self) -> &str {
        self.topic_tag
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("General")
    }
}

/// Complete architecture response: metrics, curriculum graph, roadmap and
/// the seed quiz. Immutable once fetched; completion state lives in
/// [`Mastery`], not here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub analytics: Analytics,
    #[serde(default)]
    pub knowledge_graph: Vec<KnowledgeNode>,
    #[serde(default)]
    pub roadmap: Vec<RoadmapStep>,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

/// Generated lesson text. `content` is the backend's pre-rendered HTML;
/// the terminal shows `raw_text` (the original Markdown), which is also
/// what narration is generated from.
#[derive(Debug, Clone, Deserialize)]
pub struct TextLesson {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub raw_text: String,
}

/// Generated code sample with detected third-party dependencies.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeSample {
    pub code: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl CodeSample {
    pub fn dependency_badge(&self) -> String {
        if self.dependencies.is_empty() {
            "Standard Libs Only".to_string()
        } else {
            format!("Requires: {}", self.dependencies.join(", "))
        }
    }
}

/// A generated diagram saved to the cache directory.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub path: std::path::PathBuf,
    pub size_bytes: usize,
    pub format: &'static str,
}

/// Sniff the image format of diagram bytes from the magic number.
pub fn image_format(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "PNG"
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        "JPEG"
    } else {
        "unknown"
    }
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Bot,
}

/// One turn in the tutor chat transcript.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Bot,
            text: text.into(),
            at: Utc::now(),
        }
    }

    /// Short clock time shown next to the turn in the transcript.
    pub fn stamp(&self) -> String {
        self.at.format("%H:%M").to_string()
    }
}

/// Completion tracking over knowledge nodes.
///
/// Until the learner toggles a node the displayed score is the seed from
/// the architecture analytics; after the first toggle the score is always
/// derived from the completion set.
#[derive(Debug, Clone)]
pub struct Mastery {
    seed: u8,
    completed: HashSet<NodeId>,
    touched: bool,
}

impl Mastery {
    pub fn new(seed: u8) -> Self {
        Self {
            seed,
            completed: HashSet::new(),
            touched: false,
        }
    }

    pub fn is_complete(&self, id: NodeId) -> bool {
        self.completed.contains(&id)
    }

    /// Flip completion for a node. Toggling twice restores the prior score.
    pub fn toggle(&mut self, id: NodeId) {
        self.touched = true;
        if !self.completed.insert(id) {
            self.completed.remove(&id);
        }
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Displayed percentage: round(100 * completed / total).
    pub fn score(&self, total: usize) -> u8 {
        if !self.touched {
            return self.seed;
        }
        if total == 0 {
            return 0;
        }
        ((self.completed.len() * 100) as f64 / total as f64).round() as u8
    }
}

impl Default for Mastery {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(phase: &str, task: &str) -> RoadmapStep {
        RoadmapStep {
            phase: phase.to_string(),
            objective: "obj".to_string(),
            task: task.to_string(),
            hours: 1.0,
        }
    }

    #[test]
    fn roadmap_groups_in_first_encounter_order() {
        let steps = vec![step("P1", "a"), step("P2", "b"), step("P1", "c")];
        let groups = group_by_phase(&steps);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "P1");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "P2");
        assert_eq!(groups[1].1.len(), 1);
    }

    #[test]
    fn roadmap_phase_defaults_when_absent() {
        let step: RoadmapStep =
            serde_json::from_str(r#"{"objective":"o","task":"t","hours":2}"#).unwrap();
        assert_eq!(step.phase, "Phase 1");
    }

    #[test]
    fn analytics_fallbacks() {
        let empty = Analytics::default();
        assert_eq!(empty.time_saved_display(), "12 hrs");
        assert_eq!(empty.confidence_display(), 85);
        assert_eq!(empty.coverage_display(), 95);
        assert_eq!(empty.mastery_seed(), 10);

        let sentinel = Analytics {
            time_saved: Some("0 hrs".to_string()),
            ..Default::default()
        };
        assert_eq!(sentinel.time_saved_display(), "12 hrs");

        let real = Analytics {
            time_saved: Some("8 hrs".to_string()),
            confidence_score: Some(70),
            topic_coverage: Some(60),
            mastery_progress: Some(25),
        };
        assert_eq!(real.time_saved_display(), "8 hrs");
        assert_eq!(real.confidence_display(), 70);
        assert_eq!(real.coverage_display(), 60);
        assert_eq!(real.mastery_seed(), 25);
    }

    #[test]
    fn mastery_score_rounds_and_is_reversible() {
        let ids: Vec<NodeId> = (0..4).map(|_| Uuid::new_v4()).collect();
        let mut mastery = Mastery::new(10);
        assert_eq!(mastery.score(4), 10);

        mastery.toggle(ids[0]);
        mastery.toggle(ids[2]);
        assert_eq!(mastery.score(4), 50);

        let before = mastery.score(4);
        mastery.toggle(ids[1]);
        mastery.toggle(ids[1]);
        assert_eq!(mastery.score(4), before);
    }

    #[test]
    fn mastery_rounds_to_nearest() {
        let ids: Vec<NodeId> = (0..3).map(|_| Uuid::new_v4()).collect();
        let mut mastery = Mastery::new(0);
        mastery.toggle(ids[0]);
        // 1/3 -> 33.33 -> 33
        assert_eq!(mastery.score(3), 33);
        mastery.toggle(ids[1]);
        // 2/3 -> 66.67 -> 67
        assert_eq!(mastery.score(3), 67);
    }

    #[test]
    fn nodes_get_distinct_generated_ids() {
        let arch: Architecture = serde_json::from_str(
            r#"{
                "knowledge_graph": [
                    {"id": 1, "skill": "A", "difficulty": 20, "description": "d", "resources": []},
                    {"id": 2, "skill": "B", "difficulty": 40, "description": "d", "resources": []}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(arch.knowledge_graph.len(), 2);
        assert_ne!(arch.knowledge_graph[0].id, arch.knowledge_graph[1].id);
    }

    #[test]
    fn quiz_tag_defaults_to_general() {
        let mut q: QuizQuestion = serde_json::from_str(
            r#"{"question":"?","options":["a","b"],"answer":0}"#,
        )
        .unwrap();
        assert_eq!(q.tag(), "General");
        q.topic_tag = Some("Gradients".to_string());
        assert_eq!(q.tag(), "Gradients");
        q.topic_tag = Some(String::new());
        assert_eq!(q.tag(), "General");
    }

    #[test]
    fn resource_kind_parses_unknown_types() {
        let res: Resource = serde_json::from_str(
            r#"{"type":"Podcast","title":"t","url":"https://example.com"}"#,
        )
        .unwrap();
        assert_eq!(res.kind, ResourceKind::Other);
    }

    #[test]
    fn image_format_sniffing() {
        assert_eq!(image_format(&[0x89, b'P', b'N', b'G', 0x0D]), "PNG");
        assert_eq!(image_format(&[0xFF, 0xD8, 0xFF]), "JPEG");
        assert_eq!(image_format(b"GIF89a"), "unknown");
    }

    #[test]
    fn chat_message_stamp_is_clock_time() {
        let message = ChatMessage::user("hi");
        let stamp = message.stamp();
        assert_eq!(stamp.len(), 5);
        assert_eq!(stamp.as_bytes()[2], b':');
    }

    #[test]
    fn code_sample_badge() {
        let sample = CodeSample {
            code: String::new(),
            dependencies: vec!["numpy".to_string(), "torch".to_string()],
        };
        assert_eq!(sample.dependency_badge(), "Requires: numpy, torch");
        let bare = CodeSample {
            code: String::new(),
            dependencies: Vec::new(),
        };
        assert_eq!(bare.dependency_badge(), "Standard Libs Only");
    }
}
