//! Deterministic rule tier.
//!
//! The last link of every tier chain. It reads only the agent's needs,
//! surroundings and the planner's inclination, performs no I/O and always
//! returns a schema-valid [`DecisionResponse`], which is what lets
//! `decide()` promise a decision no matter what the remote tiers do.
//!
//! Urgent needs win first, in order hunger, sleep, social. Otherwise the
//! intended behavior state picks the action.

use npcmind_core::{BehaviorState, Needs};
use npcmind_llm::{Action, DecisionResponse, EmotionLabel};

use crate::context::DecisionContext;

/// Opening line used when the rule tier starts a conversation.
pub const GREETING: &str = "Hey, how are you doing?";

/// Pick an action without calling any provider.
#[must_use]
pub fn decide(needs: &Needs, intended: BehaviorState, ctx: &DecisionContext) -> DecisionResponse {
    let nearest = ctx.nearest().map(|n| n.id.as_str().to_owned());

    if needs.hunger < Needs::URGENT {
        return respond(Action::Eat, "restaurant", "", EmotionLabel::Neutral, "too hungry to do anything else");
    }
    if needs.sleep < Needs::URGENT {
        return respond(Action::Rest, "home", "", EmotionLabel::Sad, "exhausted");
    }
    if needs.social < Needs::URGENT {
        if let Some(other) = &nearest {
            return respond(Action::TalkTo, other, GREETING, EmotionLabel::Happy, "lonely, someone is nearby");
        }
    }

    match intended {
        BehaviorState::Socializing => match (&nearest, ctx.events.first()) {
            (Some(other), _) => respond(Action::TalkTo, other, GREETING, EmotionLabel::Happy, "in a social mood"),
            (None, Some(event)) => respond(Action::AttendEvent, event, "", EmotionLabel::Excited, "looking for company"),
            (None, None) => respond(Action::MoveTo, "town square", "", EmotionLabel::Neutral, "looking for company"),
        },
        BehaviorState::Working => respond(Action::Work, "workplace", "", EmotionLabel::Neutral, "time to work"),
        BehaviorState::Exploring => respond(Action::MoveTo, "town square", "", EmotionLabel::Neutral, "curious about the town"),
        BehaviorState::Learning => respond(Action::Work, "library", "", EmotionLabel::Neutral, "wants to learn something"),
        BehaviorState::Helping => match &nearest {
            Some(other) => respond(Action::TalkTo, other, "Need a hand with anything?", EmotionLabel::Happy, "wants to help"),
            None => respond(Action::Work, "workplace", "", EmotionLabel::Neutral, "wants to be useful"),
        },
        BehaviorState::Planning => respond(Action::Work, "home", "", EmotionLabel::Neutral, "planning ahead"),
        BehaviorState::Resting => respond(Action::Rest, "home", "", EmotionLabel::Neutral, "taking it easy"),
    }
}

fn respond(action: Action, target: &str, dialogue: &str, emotion: EmotionLabel, reasoning: &str) -> DecisionResponse {
    DecisionResponse {
        action,
        target: target.to_owned(),
        dialogue: dialogue.to_owned(),
        emotion,
        reasoning: format!("rule tier: {reasoning}"),
    }
}
