//! Decision prompt golden set.
//!
//! Each case renders a [`DecisionPrompt`] with the built-in template and
//! checks that the agent's context made it into the text and that no
//! placeholder was left unresolved.

use npcmind_llm::prompt::{self, DecisionPrompt, PromptTemplate, RelationshipLine};

/// A golden test case for prompt rendering.
struct GoldenCase {
    /// Human-readable name.
    name: &'static str,
    /// Context to render.
    context: DecisionPrompt,
    /// Strings that MUST appear in the rendered prompt.
    must_contain: Vec<&'static str>,
    /// Strings that MUST NOT appear in the rendered prompt.
    must_not_contain: Vec<&'static str>,
}

fn rel(name: &str, value: f32, label: &str) -> RelationshipLine {
    RelationshipLine {
        name: name.into(),
        value,
        label: label.into(),
    }
}

fn golden_cases() -> Vec<GoldenCase> {
    vec![
        // ---------------------------------------------------------------
        // 1. Lonely agent with a friend nearby
        // ---------------------------------------------------------------
        GoldenCase {
            name: "lonely_with_friend_nearby",
            context: DecisionPrompt {
                name: "A".into(),
                personality: "very friendly, quite curious".into(),
                needs: [0.75, 0.82, 0.45, 0.60],
                situation: "standing in the town square".into(),
                nearby: vec!["B".into()],
                emotion: "neutral".into(),
                events: vec![],
                memories: vec!["Talked with B about the harvest".into()],
                relationships: vec![rel("B", 0.72, "close friend")],
                inclination: "socializing".into(),
            },
            must_contain: vec![
                "You are A",
                "very friendly, quite curious",
                "- Hunger: 0.75",
                "- Social: 0.45",
                "Nearby NPCs: B",
                "- B: close friend (0.72)",
                "Active events: None",
                "You currently feel like: socializing",
            ],
            must_not_contain: vec!["{name}", "{nearby}", "{{"],
        },
        // ---------------------------------------------------------------
        // 2. Exhausted loner, nothing around
        // ---------------------------------------------------------------
        GoldenCase {
            name: "exhausted_alone",
            context: DecisionPrompt {
                name: "Morwen".into(),
                personality: "not very energetic".into(),
                needs: [0.9, 0.1, 0.9, 0.5],
                situation: String::new(),
                nearby: vec![],
                emotion: "sad".into(),
                events: vec![],
                memories: vec![],
                relationships: vec![],
                inclination: "resting".into(),
            },
            must_contain: vec![
                "- Sleep: 0.10",
                "Current situation: wandering around",
                "Nearby NPCs: None",
                "- No recent memories",
                "- No established relationships",
            ],
            must_not_contain: vec!["{situation}", "{memories}", "{relationships}"],
        },
        // ---------------------------------------------------------------
        // 3. Festival day with many events
        // ---------------------------------------------------------------
        GoldenCase {
            name: "festival_events_truncated",
            context: DecisionPrompt {
                name: "Tobin".into(),
                personality: "balanced personality".into(),
                needs: [0.5; 4],
                situation: "near the bakery".into(),
                nearby: vec!["Ada".into(), "Bram".into()],
                emotion: "excited".into(),
                events: vec![
                    "harvest festival".into(),
                    "market day".into(),
                    "bard performance".into(),
                    "storm warning".into(),
                ],
                memories: vec![],
                relationships: vec![rel("Ada", 0.2, "not friendly")],
                inclination: "exploring".into(),
            },
            must_contain: vec![
                "Active events: harvest festival; market day; bard performance",
                "Nearby NPCs: Ada, Bram",
                "- Ada: not friendly (0.20)",
                "Current emotion: excited",
            ],
            must_not_contain: vec!["storm warning", "{events}"],
        },
        // ---------------------------------------------------------------
        // 4. Memory-heavy context keeps only five
        // ---------------------------------------------------------------
        GoldenCase {
            name: "memories_truncated_to_five",
            context: DecisionPrompt {
                name: "Iris".into(),
                personality: "very organized".into(),
                needs: [0.4, 0.6, 0.7, 0.2],
                situation: "at the workshop".into(),
                nearby: vec![],
                emotion: "happy".into(),
                events: vec![],
                memories: (1..=8).map(|i| format!("memory number {i}")).collect(),
                relationships: vec![],
                inclination: "working".into(),
            },
            must_contain: vec!["- memory number 1", "- memory number 5", "- Fun: 0.20"],
            must_not_contain: vec!["memory number 6", "memory number 8"],
        },
    ]
}

#[test]
fn golden_prompts_render_without_unresolved_vars() {
    let template = PromptTemplate::builtin();
    for case in golden_cases() {
        let rendered = case.context.render(&template);

        for needle in &case.must_contain {
            assert!(
                rendered.contains(needle),
                "Golden case '{}': rendered prompt must contain '{}' but doesn't.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }
        for needle in &case.must_not_contain {
            assert!(
                !rendered.contains(needle),
                "Golden case '{}': rendered prompt must NOT contain '{}' but does.\nRendered:\n{}",
                case.name,
                needle,
                rendered
            );
        }
    }
}

#[test]
fn prompt_requests_every_schema_field() {
    let rendered = DecisionPrompt::default().render(&PromptTemplate::builtin());
    for field in ["\"action\"", "\"target\"", "\"dialogue\"", "\"emotion\"", "\"reasoning\""] {
        assert!(rendered.contains(field), "prompt must ask for {field}");
    }
    for action in npcmind_llm::Action::ALL {
        assert!(rendered.contains(action.as_str()), "prompt must list {action}");
    }
}

#[test]
fn system_prompt_demands_json() {
    assert!(prompt::DECISION_SYSTEM.contains("JSON"));
    let request = DecisionPrompt::default().to_request(&PromptTemplate::builtin());
    assert_eq!(request.system, prompt::DECISION_SYSTEM);
    assert_eq!(request.max_tokens, 150);
}
