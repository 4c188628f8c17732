//! Decision response schema and validation.
//!
//! Every tier, remote or not, must produce an object of this shape:
//!
//! ```json
//! {"action": "talk_to", "target": "B", "dialogue": "Hey!", "emotion": "happy", "reasoning": "..."}
//! ```
//!
//! All five fields are required, `action` and `emotion` must be one of the
//! enumerated values. Models like to wrap JSON in Markdown fences or chat
//! around it, so parsing first isolates the outermost `{...}` object.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// What an agent does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Walk somewhere.
    MoveTo,
    /// Start a conversation with another agent.
    TalkTo,
    /// Do a job.
    Work,
    /// Sleep or sit down.
    Rest,
    /// Get food.
    Eat,
    /// Have fun.
    Play,
    /// Join a world event.
    AttendEvent,
}

impl Action {
    /// Every action.
    pub const ALL: [Self; 7] = [
        Self::MoveTo,
        Self::TalkTo,
        Self::Work,
        Self::Rest,
        Self::Eat,
        Self::Play,
        Self::AttendEvent,
    ];

    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MoveTo => "move_to",
            Self::TalkTo => "talk_to",
            Self::Work => "work",
            Self::Rest => "rest",
            Self::Eat => "eat",
            Self::Play => "play",
            Self::AttendEvent => "attend_event",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emotion the agent declares alongside its action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    /// Happy.
    Happy,
    /// Sad.
    Sad,
    /// Angry.
    Angry,
    /// No particular feeling.
    Neutral,
    /// Excited.
    Excited,
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Neutral => "neutral",
            Self::Excited => "excited",
        })
    }
}

/// A schema-valid decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// Chosen action.
    pub action: Action,
    /// Location, agent or event the action is aimed at.
    pub target: String,
    /// Spoken line; may be empty.
    pub dialogue: String,
    /// Declared emotion.
    pub emotion: EmotionLabel,
    /// Advisory explanation; never consumed by logic.
    pub reasoning: String,
}

/// Validate raw provider text into a [`DecisionResponse`].
///
/// # Errors
///
/// Returns [`ProviderError::MalformedResponse`] if no JSON object can be
/// found, a field is missing or has the wrong type, `action`/`emotion`
/// is not an enumerated value, or `target` is blank.
pub fn parse_response(raw: &str) -> Result<DecisionResponse, ProviderError> {
    let object = extract_object(raw)
        .ok_or_else(|| ProviderError::MalformedResponse(format!("no JSON object in reply: {}", preview(raw))))?;
    let response: DecisionResponse = serde_json::from_str(object)
        .map_err(|e| ProviderError::MalformedResponse(format!("{e}; reply: {}", preview(raw))))?;
    if response.target.trim().is_empty() {
        return Err(ProviderError::MalformedResponse(format!(
            "{} without a target; reply: {}",
            response.action,
            preview(raw)
        )));
    }
    Ok(response)
}

/// Slice from the first `{` to the last `}`, ignoring fences and prose.
fn extract_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn preview(raw: &str) -> String {
    const LIMIT: usize = 120;
    let mut s: String = raw.chars().take(LIMIT).collect();
    if raw.chars().count() > LIMIT {
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"action":"talk_to","target":"B","dialogue":"Hey, how's your day?","emotion":"happy","reasoning":"lonely"}"#;

    #[test]
    fn parses_plain_object() {
        let r = parse_response(VALID).expect("valid");
        assert_eq!(r.action, Action::TalkTo);
        assert_eq!(r.target, "B");
        assert_eq!(r.emotion, EmotionLabel::Happy);
    }

    #[test]
    fn tolerates_fences_and_prose() {
        let wrapped = format!("Sure! Here is my decision:\n```json\n{VALID}\n```\nHope that helps.");
        assert_eq!(parse_response(&wrapped).expect("fenced"), parse_response(VALID).expect("plain"));
    }

    #[test]
    fn missing_field_is_malformed() {
        let raw = r#"{"action":"work","target":"farm","dialogue":"","emotion":"neutral"}"#;
        assert!(matches!(parse_response(raw), Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn unknown_action_is_malformed() {
        let raw = r#"{"action":"dance","target":"","dialogue":"","emotion":"happy","reasoning":""}"#;
        assert!(matches!(parse_response(raw), Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn blank_target_is_malformed() {
        for target in ["", "   "] {
            let raw = format!(
                r#"{{"action":"move_to","target":"{target}","dialogue":"","emotion":"neutral","reasoning":"wander"}}"#
            );
            let err = parse_response(&raw).expect_err("blank target");
            assert!(matches!(err, ProviderError::MalformedResponse(_)));
            assert!(err.to_string().contains("without a target"), "{err}");
        }
    }

    #[test]
    fn unknown_emotion_is_malformed() {
        let raw = r#"{"action":"rest","target":"home","dialogue":"","emotion":"content","reasoning":""}"#;
        assert!(parse_response(raw).is_err());
    }

    #[test]
    fn template_placeholder_action_is_malformed() {
        let raw = r#"{"action":"move_to/talk_to","target":"x","dialogue":"","emotion":"happy","reasoning":""}"#;
        assert!(parse_response(raw).is_err());
    }

    #[test]
    fn prose_without_object_is_malformed() {
        let err = parse_response("I think I will go to sleep.").expect_err("no json");
        assert!(err.to_string().contains("no JSON object"));
    }

    #[test]
    fn wire_names_round_trip_through_serde() {
        for action in Action::ALL {
            let json = serde_json::to_string(&action).expect("serialize");
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }
}
