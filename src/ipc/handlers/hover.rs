use crate::hover::{HoverAction, SourceCategory, UiElement};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Executes coordinator output against the narration engine. Hover narration
/// is its own switch: it speaks even when page-level narration is off, so the
/// engine is always called with enabled=true here.
pub(crate) fn apply_hover_actions(
    state: &mut AppState,
    actions: Vec<HoverAction>,
    now_ms: u64,
) -> Vec<(String, SourceCategory)> {
    let rate = state.session.current.tts_rate;
    let locale = state.session.current.tts_voice.clone();
    let mut spoken = Vec::new();
    for action in actions {
        match action {
            HoverAction::CancelSpeech => state.engine.cancel_current(),
            HoverAction::Speak { text, category } => {
                let outcome = state.engine.speak(&text, rate, &locale, true, now_ms);
                if !matches!(
                    outcome,
                    crate::narration::SpeakOutcome::Duplicate
                        | crate::narration::SpeakOutcome::Empty
                ) {
                    spoken.push((text, category));
                }
            }
        }
    }
    spoken
}

fn resolutions_json(spoken: &[(String, SourceCategory)]) -> serde_json::Value {
    json!(spoken
        .iter()
        .map(|(text, category)| json!({ "text": text, "category": category }))
        .collect::<Vec<_>>())
}

fn handle_hover_event(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(element_value) = req.params.get("element") else {
        return err(&req.id, "bad_params", "missing element", None);
    };
    let element: UiElement = match serde_json::from_value(element_value.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid element: {}", e),
                None,
            )
        }
    };
    let at_ms = req.params.get("atMs").and_then(|v| v.as_u64()).unwrap_or(0);
    let nav_visible = req
        .params
        .get("navVisible")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let actions = state.hover.on_pointer_over(element, nav_visible, at_ms);
    let spoken = apply_hover_actions(state, actions, at_ms);

    ok(
        &req.id,
        json!({
            "active": state.hover.is_active(),
            "state": state.hover.state_name(),
            "resolutions": resolutions_json(&spoken),
        }),
    )
}

fn handle_hover_poll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let at_ms = req.params.get("atMs").and_then(|v| v.as_u64()).unwrap_or(0);

    // A held utterance whose voice wait expired goes out on the same tick.
    let _ = state.engine.poll(at_ms);

    let actions = state.hover.poll(at_ms);
    let spoken = apply_hover_actions(state, actions, at_ms);

    ok(
        &req.id,
        json!({
            "active": state.hover.is_active(),
            "state": state.hover.state_name(),
            "resolutions": resolutions_json(&spoken),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "hover.event" => Some(handle_hover_event(state, req)),
        "hover.poll" => Some(handle_hover_poll(state, req)),
        _ => None,
    }
}
