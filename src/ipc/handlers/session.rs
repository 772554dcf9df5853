use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::hover::apply_hover_actions;
use crate::ipc::types::{AppState, Request};
use crate::prefs::LoadOutcome;
use crate::visual;
use serde_json::json;

pub(crate) fn notice(code: &str, message: &str) -> serde_json::Value {
    json!({ "code": code, "message": message })
}

fn handle_identity_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let new_identity = req
        .params
        .get("identity")
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    if new_identity == state.identity {
        return ok(
            &req.id,
            json!({ "identity": state.identity, "changed": false }),
        );
    }

    // A switch or logout always silences whatever was being read first.
    state.engine.stop();

    if new_identity.is_none() {
        // Logout: back to defaults; transient narration bookkeeping lives in
        // the engine and is not part of the preference record.
        state.session.reset_to_defaults(&[]);
        state.hover.deactivate();
    }

    state.identity = new_identity;
    ok(
        &req.id,
        json!({ "identity": state.identity, "changed": true }),
    )
}

/// The once-per-render entry point: detects identity switches, hydrates the
/// preference record, re-derives the visual transforms, and keeps the hover
/// loop armed to match the current settings. Never fails the render; store
/// trouble degrades to defaults plus a dismissable notice.
fn handle_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let at_ms = req.params.get("atMs").and_then(|v| v.as_u64()).unwrap_or(0);

    state.session.init_defaults();

    let mut notices = Vec::new();
    if let Some(identity) = state.identity.clone() {
        let outcome = state
            .session
            .load_for_identity(&identity, state.db.as_ref());
        if outcome == LoadOutcome::StoreUnavailable {
            notices.push(notice(
                "store_unavailable",
                "could not load your saved settings; using defaults",
            ));
        }
    }

    let transforms = visual::render_active_transforms(&state.session.current);

    if state.session.current.hover_narration {
        state.hover.activate();
    } else if state.hover.is_active() {
        state.hover.deactivate();
    }

    let _ = state.engine.poll(at_ms);
    let actions = state.hover.poll(at_ms);
    apply_hover_actions(state, actions, at_ms);

    if state.engine.take_unsupported_notice() {
        notices.push(notice(
            "speech_unsupported",
            "voice playback unavailable; narration will be shown as text",
        ));
    }

    ok(
        &req.id,
        json!({
            "identity": state.identity,
            "loaded": state.session.loaded,
            "transforms": transforms,
            "hoverNarration": state.session.current.hover_narration,
            "notices": notices,
        }),
    )
}

fn handle_configure_hover(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(patch) = req.params.get("patch").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    state.hover.config.merge_json(patch);

    let config = match serde_json::to_value(state.hover.config) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };
    let mut persisted = false;
    if let Some(conn) = state.db.as_ref() {
        persisted = db::settings_set_json(conn, "hover.config", &config).is_ok();
    }

    ok(&req.id, json!({ "config": config, "persisted": persisted }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "identity.set" => Some(handle_identity_set(state, req)),
        "a11y.apply" => Some(handle_apply(state, req)),
        "a11y.configureHover" => Some(handle_configure_hover(state, req)),
        _ => None,
    }
}
