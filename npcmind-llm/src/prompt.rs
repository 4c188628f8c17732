//! Decision prompt templates and context formatting.
//!
//! The built-in template can be replaced by a TOML file so wording can be
//! tuned without a rebuild:
//!
//! ```toml
//! [prompt]
//! version = "2"
//! max_tokens = 150
//! temperature = 0.7
//! system = "You are an NPC ..."
//! user = "You are {name} ..."
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::types::ProviderRequest;

/// System prompt shared by every tier.
pub const DECISION_SYSTEM: &str = "You are an NPC in a life simulation game. Respond only with valid JSON.";

/// User prompt carrying the agent's context.
pub const DECISION_USER: &str = r#"You are {name}, an NPC in a life simulation game.
Your personality: {personality}

Current needs:
- Hunger: {hunger}
- Sleep: {sleep}
- Social: {social}
- Fun: {fun}

Current situation: {situation}
Nearby NPCs: {nearby}
Current emotion: {emotion}
Active events: {events}
You currently feel like: {inclination}

Recent memories:
{memories}

Relationships:
{relationships}

Decide your next action. Respond in JSON format:
{{
    "action": "one of move_to, talk_to, work, rest, eat, play, attend_event",
    "target": "location or person name or event name",
    "dialogue": "what you want to say (if talking)",
    "emotion": "one of happy, sad, angry, neutral, excited",
    "reasoning": "brief explanation"
}}"#;

/// Replace `{key}` placeholders with values, then unescape `{{`/`}}`.
///
/// Unknown placeholders are left in place.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result.replace("{{", "{").replace("}}", "}")
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TomlPromptFile {
    prompt: PromptTemplate,
}

/// A loaded, ready-to-render prompt template.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    /// Template version recorded in logs.
    pub version: String,
    /// Output token limit.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt.
    pub system: String,
    /// User prompt with `{key}` placeholders.
    pub user: String,
}

impl PromptTemplate {
    /// The compiled-in template.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: "builtin".into(),
            max_tokens: 150,
            temperature: 0.7,
            system: DECISION_SYSTEM.into(),
            user: DECISION_USER.into(),
        }
    }

    /// Load a template from a TOML file with a `[prompt]` table.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the file cannot be read or
    /// parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::from_toml(&content).map_err(|e| format!("{}: {e}", path.display()))
    }

    /// Parse a template from TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML parse error as text.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        let parsed: TomlPromptFile = toml::from_str(content).map_err(|e| e.to_string())?;
        Ok(parsed.prompt)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// One relationship line: who, how much, and the band label.
#[derive(Debug, Clone)]
pub struct RelationshipLine {
    /// Other agent.
    pub name: String,
    /// Raw value in [0, 1].
    pub value: f32,
    /// Band label such as "close friend".
    pub label: String,
}

/// Everything a decision prompt mentions.
#[derive(Debug, Clone, Default)]
pub struct DecisionPrompt {
    /// Agent name.
    pub name: String,
    /// Personality summary.
    pub personality: String,
    /// Hunger, sleep, social, fun.
    pub needs: [f32; 4],
    /// Free-text situation.
    pub situation: String,
    /// Names of nearby agents, nearest first.
    pub nearby: Vec<String>,
    /// Current dominant emotion.
    pub emotion: String,
    /// Active world events.
    pub events: Vec<String>,
    /// Retrieved memories, best first.
    pub memories: Vec<String>,
    /// Strongest relationships.
    pub relationships: Vec<RelationshipLine>,
    /// State the behavior planner leans toward.
    pub inclination: String,
}

/// At most this many events, memories and relationships are rendered.
const MAX_EVENTS: usize = 3;
const MAX_MEMORIES: usize = 5;
const MAX_RELATIONSHIPS: usize = 5;

impl DecisionPrompt {
    /// Render the user prompt with `template`.
    #[must_use]
    pub fn render(&self, template: &PromptTemplate) -> String {
        let needs = self.needs.map(|n| format!("{n:.2}"));
        let nearby = if self.nearby.is_empty() {
            "None".to_string()
        } else {
            self.nearby.join(", ")
        };
        let situation = if self.situation.is_empty() {
            "wandering around"
        } else {
            self.situation.as_str()
        };
        let events = format_events(&self.events);
        let memories = format_memories(&self.memories);
        let relationships = format_relationships(&self.relationships);
        render_template(
            &template.user,
            &[
                ("name", self.name.as_str()),
                ("personality", self.personality.as_str()),
                ("hunger", needs[0].as_str()),
                ("sleep", needs[1].as_str()),
                ("social", needs[2].as_str()),
                ("fun", needs[3].as_str()),
                ("situation", situation),
                ("nearby", nearby.as_str()),
                ("emotion", self.emotion.as_str()),
                ("events", events.as_str()),
                ("inclination", self.inclination.as_str()),
                ("memories", memories.as_str()),
                ("relationships", relationships.as_str()),
            ],
        )
    }

    /// Build the provider request.
    #[must_use]
    pub fn to_request(&self, template: &PromptTemplate) -> ProviderRequest {
        ProviderRequest {
            system: template.system.clone(),
            prompt: self.render(template),
            max_tokens: template.max_tokens,
            temperature: template.temperature,
        }
    }
}

fn format_events(events: &[String]) -> String {
    if events.is_empty() {
        return "None".into();
    }
    events.iter().take(MAX_EVENTS).cloned().collect::<Vec<_>>().join("; ")
}

fn format_memories(memories: &[String]) -> String {
    if memories.is_empty() {
        return "- No recent memories".into();
    }
    memories
        .iter()
        .take(MAX_MEMORIES)
        .map(|m| format!("- {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_relationships(lines: &[RelationshipLine]) -> String {
    if lines.is_empty() {
        return "- No established relationships".into();
    }
    lines
        .iter()
        .take(MAX_RELATIONSHIPS)
        .map(|r| format!("- {}: {} ({:.2})", r.name, r.label, r.value))
        .collect::<Vec<_>>()
        .join("\n")
}
