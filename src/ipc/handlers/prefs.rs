use crate::ipc::error::{err, ok};
use crate::ipc::handlers::session::notice;
use crate::ipc::types::{AppState, Request};
use crate::prefs::PrefField;
use crate::visual;
use serde_json::json;

const HOVER_INTRO_TEXT: &str = "Pointer reading mode is active. Hover over any element to \
hear it. The icon in the top left corner expands the navigation menu.";

fn handle_prefs_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.init_defaults();
    ok(
        &req.id,
        json!({
            "prefs": state.session.current.to_json(),
            "loaded": state.session.loaded,
            "identity": state.identity,
            "hoverActive": state.hover.is_active(),
            "speaking": state.engine.speaking,
        }),
    )
}

/// One control changed in the settings panel. The change applies to the
/// session immediately, autosaves when it actually differs from the stored
/// value, and its side effects (visual re-render, hover arming, narration
/// stop) land in the same response so the panel reflects them before the
/// next full page refresh.
fn handle_prefs_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(field_raw) = req.params.get("field").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing field", None);
    };
    let Some(field) = PrefField::parse(field_raw) else {
        return err(
            &req.id,
            "bad_params",
            format!("unknown preference field: {}", field_raw),
            None,
        );
    };
    let Some(value) = req.params.get("value") else {
        return err(&req.id, "bad_params", "missing value", None);
    };
    let at_ms = req.params.get("atMs").and_then(|v| v.as_u64()).unwrap_or(0);

    state.session.init_defaults();
    let previous = state.session.get(field);
    let stored = state.session.set(field, value);

    let mut notices = Vec::new();
    let persisted = match state.session.persist_if_changed(
        field,
        state.identity.as_deref(),
        state.db.as_ref(),
    ) {
        Ok(wrote) => wrote,
        Err(_) => {
            notices.push(notice(
                "store_unavailable",
                "could not save your settings",
            ));
            false
        }
    };

    let mut result = json!({
        "field": field.key(),
        "value": stored,
        "persisted": persisted,
    });

    if field.affects_visuals() {
        result["transforms"] =
            json!(visual::render_active_transforms(&state.session.current));
    }

    match field {
        PrefField::TtsEnabled => {
            if !state.session.current.tts_enabled {
                state.engine.stop();
            }
        }
        PrefField::HoverNarration => {
            if state.session.current.hover_narration {
                state.hover.activate();
                // Announce the mode once, at the moment it is switched on.
                if previous == json!(false) {
                    let rate = state.session.current.tts_rate;
                    let locale = state.session.current.tts_voice.clone();
                    let _ = state.engine.speak(HOVER_INTRO_TEXT, rate, &locale, true, at_ms);
                }
            } else {
                state.hover.deactivate();
            }
        }
        _ => {}
    }

    if state.engine.take_unsupported_notice() {
        notices.push(notice(
            "speech_unsupported",
            "voice playback unavailable; narration will be shown as text",
        ));
    }
    if !notices.is_empty() {
        result["notices"] = json!(notices);
    }
    ok(&req.id, result)
}

fn handle_prefs_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Transient narration bookkeeping (speaking flag, last-spoken dedup) is
    // engine state, deliberately untouched here.
    state.session.reset_to_defaults(&[]);
    state.hover.deactivate();
    ok(
        &req.id,
        json!({ "prefs": state.session.current.to_json() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "prefs.get" => Some(handle_prefs_get(state, req)),
        "prefs.set" => Some(handle_prefs_set(state, req)),
        "prefs.reset" => Some(handle_prefs_reset(state, req)),
        _ => None,
    }
}
