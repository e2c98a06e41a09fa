//! Actions and views of the proverbs board application.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::json;
use serde_json::Value;

use crate::action_registry::ActionDescriptor;
use crate::action_registry::Availability;
use crate::action_registry::HandlerContext;
use crate::action_registry::HandlerResult;
use crate::error::HandlerError;
use crate::render::RenderContext;
use crate::render::View;
use crate::schema::ActionArgs;
use crate::schema::ParamSpec;
use crate::schema::SemanticType;
use crate::schema::StateSchema;
use crate::state::ApprovalStatus;
use crate::state::DisplayParams;
use crate::state::SharedState;
use crate::store::PredictedField;

pub const SET_THEME_COLOR: &str = "setThemeColor";
pub const GET_WEATHER: &str = "get_weather";
pub const GO_TO_MOON: &str = "go_to_moon";
pub const UPDATE_PROVERBS: &str = "update_proverbs";

pub const PROVERBS_FIELD: &str = "proverbs";
pub const DEFAULT_PROVERB: &str = "A kite rises highest against the wind, not with it.";

pub const DECISION_APPROVED: &str = "approved";
pub const DECISION_REJECTED: &str = "rejected";

pub fn proverbs_schema() -> StateSchema {
    StateSchema::default().field(
        PROVERBS_FIELD,
        SemanticType::StringArray,
        "Ordered list of the user's saved proverbs.",
    )
}

pub fn proverbs_predictions() -> Vec<PredictedField> {
    vec![PredictedField::new(
        PROVERBS_FIELD,
        UPDATE_PROVERBS,
        PROVERBS_FIELD,
    )]
}

pub fn proverbs_state<I, S>(items: I) -> SharedState
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let items: Vec<String> = items.into_iter().map(Into::into).collect();
    SharedState::default().with_field(PROVERBS_FIELD, json!(items))
}

pub fn initial_state() -> SharedState {
    proverbs_state([DEFAULT_PROVERB])
}

pub fn proverbs(state: &SharedState) -> Vec<String> {
    state
        .get(PROVERBS_FIELD)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn theme_color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(#[0-9a-fA-F]{3}|#[0-9a-fA-F]{6}|[a-zA-Z]{3,20})$")
            .unwrap_or_else(|err| panic!("theme color pattern: {err}"))
    })
}

pub fn is_theme_color(value: &str) -> bool {
    theme_color_pattern().is_match(value.trim())
}

fn set_theme_color(args: &ActionArgs, ctx: &mut HandlerContext<'_>) -> HandlerResult {
    let color = args.str("themeColor").unwrap_or_default().trim();
    if !is_theme_color(color) {
        return Err(HandlerError::new(format!(
            "`{color}` is not a hex color or color keyword"
        )));
    }
    ctx.display.theme_color = color.to_string();
    Ok(None)
}

pub fn set_theme_color_action() -> ActionDescriptor {
    ActionDescriptor::handler(SET_THEME_COLOR, "Set the theme color of the page.", set_theme_color)
        .param(
            ParamSpec::required("themeColor", SemanticType::String)
                .describe("The theme color to set. Make sure to pick nice colors."),
        )
}

pub fn weather_card(ctx: &RenderContext<'_>) -> View {
    let location = ctx.args.str("location").unwrap_or("the requested location");
    let view = View::new("weather", location).accent(&ctx.display.theme_color);
    match ctx.result.and_then(Value::as_str) {
        Some(summary) => view.line(summary),
        None => view.line("Checking the skies...").badge("loading"),
    }
}

pub fn get_weather_action() -> ActionDescriptor {
    ActionDescriptor::render(GET_WEATHER, "Get the weather for a given location.", weather_card)
        .param(ParamSpec::required("location", SemanticType::String))
        .available(Availability::Disabled)
}

pub fn moon_card(ctx: &RenderContext<'_>) -> View {
    let view = View::new("moon", "Mission to the moon").accent(&ctx.display.theme_color);
    match ctx.status.unwrap_or(ApprovalStatus::InProgress) {
        ApprovalStatus::InProgress => {
            let view = view.line("The crew is ready. Approve the launch?");
            match &ctx.responder {
                Some(_) => view
                    .button("Launch", DECISION_APPROVED)
                    .button("Abort", DECISION_REJECTED),
                None => view,
            }
        }
        ApprovalStatus::Executing => view
            .line("Mission control is processing your decision.")
            .badge("executing"),
        ApprovalStatus::Complete => {
            let approved = ctx.decision.and_then(Value::as_str) == Some(DECISION_APPROVED);
            let view = view.badge("complete");
            if approved {
                view.line("Liftoff. The mission is on its way to the moon.")
            } else {
                view.line("Launch aborted. The crew stays on the ground.")
            }
        }
    }
}

pub fn go_to_moon_action() -> ActionDescriptor {
    ActionDescriptor::render_and_wait(
        GO_TO_MOON,
        "Go to the moon on request. Requires human approval and renders the moon card for confirmation.",
        moon_card,
    )
    .available(Availability::Disabled)
}

pub fn update_proverbs_action() -> ActionDescriptor {
    ActionDescriptor::remote(
        UPDATE_PROVERBS,
        "Replace the entire list of proverbs with the provided values.",
    )
    .param(
        ParamSpec::required(PROVERBS_FIELD, SemanticType::StringArray)
            .describe("The complete list of proverbs, in order."),
    )
}

pub fn builtin_actions() -> Vec<ActionDescriptor> {
    vec![
        set_theme_color_action(),
        get_weather_action(),
        go_to_moon_action(),
        update_proverbs_action(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suggestion {
    pub title: &'static str,
    pub message: &'static str,
}

/// Conversation starters shown before the first message.
pub const SUGGESTIONS: &[Suggestion] = &[
    Suggestion {
        title: "Generative UI",
        message: "Get the weather in San Francisco.",
    },
    Suggestion {
        title: "Frontend Tools",
        message: "Set the theme to green.",
    },
    Suggestion {
        title: "Human In the Loop",
        message: "Please go to the moon.",
    },
    Suggestion {
        title: "Write Agent State",
        message: "Add a proverb about AI.",
    },
    Suggestion {
        title: "Update Agent State",
        message: "Please remove 1 random proverb from the list if there are any.",
    },
    Suggestion {
        title: "Read Agent State",
        message: "What are the proverbs?",
    },
];

/// Host surface that re-renders whenever the shared state changes.
pub fn proverbs_board(state: &SharedState, display: &DisplayParams) -> View {
    let items = proverbs(state);
    let mut view = View::new("proverbs", "Proverbs").accent(&display.theme_color);
    if items.is_empty() {
        view = view.line("No proverbs yet. Ask the assistant to add some!");
    }
    for (idx, item) in items.iter().enumerate() {
        view = view.line(format!("{}. {item}", idx + 1));
    }
    view
}
