use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::approval::Responder;
use crate::schema::ActionArgs;
use crate::state::ApprovalStatus;
use crate::state::DisplayParams;
use crate::state::InvocationId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewButton {
    pub label: String,
    pub decision: Value,
}

/// Deterministic description of the UI a renderer wants on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub kind: String,
    pub title: String,
    pub lines: Vec<String>,
    pub accent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ViewButton>,
}

impl View {
    pub fn new(kind: &str, title: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.into(),
            lines: Vec::new(),
            accent: String::new(),
            badge: None,
            buttons: Vec::new(),
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn accent(mut self, accent: &str) -> Self {
        self.accent = accent.to_string();
        self
    }

    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn button(mut self, label: &str, decision: impl Into<Value>) -> Self {
        self.buttons.push(ViewButton {
            label: label.to_string(),
            decision: decision.into(),
        });
        self
    }
}

/// Everything a renderer may look at. Only shared references are handed out,
/// so a renderer cannot touch the shared state.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub invocation_id: &'a InvocationId,
    pub action: &'a str,
    pub args: &'a ActionArgs,
    pub status: Option<ApprovalStatus>,
    pub responder: Option<Responder>,
    pub decision: Option<&'a Value>,
    pub result: Option<&'a Value>,
    pub display: &'a DisplayParams,
}

pub trait ActionRenderer: Send + Sync {
    fn render(&self, ctx: &RenderContext<'_>) -> View;
}

impl<F> ActionRenderer for F
where
    F: Fn(&RenderContext<'_>) -> View + Send + Sync,
{
    fn render(&self, ctx: &RenderContext<'_>) -> View {
        self(ctx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub view: View,
    pub changed: bool,
}

/// Keeps the single live view of every unresolved invocation.
#[derive(Debug, Clone, Default)]
pub struct RenderDispatcher {
    live: BTreeMap<InvocationId, View>,
}

impl RenderDispatcher {
    pub fn render(&mut self, renderer: &dyn ActionRenderer, ctx: &RenderContext<'_>) -> RenderOutcome {
        let view = renderer.render(ctx);
        let changed = self.live.get(ctx.invocation_id) != Some(&view);
        self.live.insert(ctx.invocation_id.clone(), view.clone());
        RenderOutcome { view, changed }
    }

    pub fn live(&self, id: &InvocationId) -> Option<&View> {
        self.live.get(id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn retire(&mut self, id: &InvocationId) -> Option<View> {
        self.live.remove(id)
    }

    pub fn clear(&mut self) -> Vec<InvocationId> {
        let ids = self.live.keys().cloned().collect();
        self.live.clear();
        ids
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::schema::validate_args;
    use crate::schema::ParamSpec;
    use crate::schema::SemanticType;

    fn echo(ctx: &RenderContext<'_>) -> View {
        View::new("echo", ctx.args.str("text").unwrap_or_default())
            .accent(&ctx.display.theme_color)
    }

    #[test]
    fn rerender_with_same_inputs_is_unchanged() {
        let params = vec![ParamSpec::required("text", SemanticType::String)];
        let args = validate_args(&params, &json!({ "text": "hi" })).unwrap();
        let id = InvocationId::from("call-1");
        let display = DisplayParams::default();
        let ctx = RenderContext {
            invocation_id: &id,
            action: "echo",
            args: &args,
            status: None,
            responder: None,
            decision: None,
            result: None,
            display: &display,
        };

        let mut dispatcher = RenderDispatcher::default();
        let first = dispatcher.render(&echo, &ctx);
        let second = dispatcher.render(&echo, &ctx);
        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(first.view, second.view);
        assert_eq!(dispatcher.live_count(), 1);

        assert!(dispatcher.retire(&id).is_some());
        assert_eq!(dispatcher.live_count(), 0);
    }
}
