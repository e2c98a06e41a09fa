//! Plain-text rendering of views and session effects.

use kite_core::LogEntry;
use kite_core::Notice;
use kite_core::SessionEffect;
use kite_core::View;

pub fn format_view(view: &View) -> String {
    let mut out = String::new();
    let badge = view
        .badge
        .as_deref()
        .map(|badge| format!(" [{badge}]"))
        .unwrap_or_default();
    out.push_str(&format!("+-- {} · {}{badge}\n", view.kind, view.title));
    for line in &view.lines {
        out.push_str(&format!("| {line}\n"));
    }
    if !view.buttons.is_empty() {
        let buttons: Vec<String> = view
            .buttons
            .iter()
            .enumerate()
            .map(|(idx, button)| format!("[{}] {}", idx + 1, button.label))
            .collect();
        out.push_str(&format!("| {}\n", buttons.join("  ")));
    }
    if !view.accent.is_empty() {
        out.push_str(&format!("+-- accent {}\n", view.accent));
    } else {
        out.push_str("+--\n");
    }
    out
}

pub fn format_notice(notice: &Notice) -> String {
    match &notice.invocation {
        Some(id) => format!("! {} ({id}): {}", notice.kind.label(), notice.message),
        None => format!("! {}: {}", notice.kind.label(), notice.message),
    }
}

/// Text for effects the terminal shows; `None` for the rest.
pub fn format_effect(effect: &SessionEffect) -> Option<String> {
    match effect {
        SessionEffect::Render { view, .. } => Some(format_view(view)),
        SessionEffect::Notice(notice) => Some(format_notice(notice)),
        SessionEffect::AssistantText(text) => Some(format!("assistant: {text}")),
        SessionEffect::Discard { invocation_id } => Some(format!("- discarded {invocation_id}")),
        _ => None,
    }
}

pub fn format_log(entry: &LogEntry) -> String {
    let context = entry.context.as_deref().unwrap_or("-");
    format!(
        "#{:<4} {:<5} {:<10} {}",
        entry.seq,
        entry.level.label(),
        context,
        entry.message
    )
}
