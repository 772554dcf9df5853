use crate::ipc::error::{err, ok};
use crate::ipc::handlers::session::notice;
use crate::ipc::types::{AppState, Request};
use crate::narration::{self, SpeakOutcome, SpeechError};
use serde_json::{json, Value};
use uuid::Uuid;

fn params_at_ms(req: &Request) -> u64 {
    req.params.get("atMs").and_then(|v| v.as_u64()).unwrap_or(0)
}

fn string_list(params: &Value, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Shared tail of every narrate.* method: run the speak contract and report
/// what happened without ever failing the request.
fn speak_response(state: &mut AppState, req: &Request, text: &str, enabled: bool) -> Value {
    let rate = state.session.current.tts_rate;
    let locale = state.session.current.tts_voice.clone();
    let outcome = state
        .engine
        .speak(text, rate, &locale, enabled, params_at_ms(req));

    let (spoken, outcome_name, utterance_id) = match &outcome {
        SpeakOutcome::Disabled => (false, "disabled", None),
        SpeakOutcome::Empty => (false, "empty", None),
        SpeakOutcome::Duplicate => (false, "duplicate", None),
        SpeakOutcome::Dispatched { utterance_id } => {
            (true, "dispatched", Some(utterance_id.clone()))
        }
        SpeakOutcome::AwaitingVoices => (true, "awaitingVoices", None),
        SpeakOutcome::FellBack => (true, "transcript", None),
        SpeakOutcome::Failed => (false, "failed", None),
    };

    let mut result = json!({
        "spoken": spoken,
        "outcome": outcome_name,
        "text": narration::normalize_speech_text(text),
    });
    if let Some(id) = utterance_id {
        result["utteranceId"] = json!(id);
    }

    let mut notices = Vec::new();
    if matches!(outcome, SpeakOutcome::FellBack) && state.engine.take_unsupported_notice() {
        notices.push(notice(
            SpeechError::Unsupported.code(),
            "voice playback unavailable; narration will be shown as text",
        ));
    }
    if matches!(outcome, SpeakOutcome::Failed) {
        notices.push(notice("speech_playback_error", "voice playback failed"));
    }
    if !notices.is_empty() {
        result["notices"] = json!(notices);
    }

    ok(&req.id, result)
}

fn handle_narrate_text(state: &mut AppState, req: &Request) -> Value {
    let Some(text) = req.params.get("text").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing text", None);
    };
    let enabled = state.session.current.tts_enabled;
    speak_response(state, req, text, enabled)
}

fn handle_narrate_table(state: &mut AppState, req: &Request) -> Value {
    let columns = string_list(&req.params, "columns");
    let note = req
        .params
        .get("note")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let limit = req
        .params
        .get("limit")
        .and_then(|v| v.as_u64())
        .unwrap_or(10) as usize;

    let rows = req
        .params
        .get("rows")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    let text = if rows.is_empty() {
        let row_count = req
            .params
            .get("rowCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;
        narration::describe_table(row_count, &columns, note)
    } else {
        narration::read_table_preview(&rows, &columns, limit)
    };

    let enabled = state.session.current.tts_enabled;
    speak_response(state, req, &text, enabled)
}

fn handle_narrate_chart(state: &mut AppState, req: &Request) -> Value {
    let kind = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .unwrap_or("chart");
    let title = req
        .params
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let stats = req.params.get("stats").cloned();
    let text = narration::describe_chart(kind, title, stats.as_ref());
    let enabled = state.session.current.tts_enabled;
    speak_response(state, req, &text, enabled)
}

fn handle_narrate_button(state: &mut AppState, req: &Request) -> Value {
    let Some(label) = req.params.get("label").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing label", None);
    };
    let action = req
        .params
        .get("action")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let text = narration::describe_button(label, action);
    let enabled = state.session.current.tts_enabled;
    speak_response(state, req, &text, enabled)
}

fn handle_narrate_dropdown(state: &mut AppState, req: &Request) -> Value {
    let Some(label) = req.params.get("label").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing label", None);
    };
    let options = string_list(&req.params, "options");
    let selected = req
        .params
        .get("selected")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let text = narration::describe_dropdown(label, &options, selected);
    let enabled = state.session.current.tts_enabled;
    speak_response(state, req, &text, enabled)
}

/// Registers an opt-in "read this" control a page can render next to its own
/// content; activating it later narrates the registered text.
fn handle_narrate_on_demand(state: &mut AppState, req: &Request) -> Value {
    let label = req
        .params
        .get("label")
        .and_then(|v| v.as_str())
        .unwrap_or("Read aloud");
    let Some(text) = req.params.get("text").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing text", None);
    };

    let control_id = Uuid::new_v4().to_string();
    state
        .reading_controls
        .insert(control_id.clone(), text.to_string());

    ok(
        &req.id,
        json!({ "controlId": control_id, "label": label }),
    )
}

fn handle_narrate_activate(state: &mut AppState, req: &Request) -> Value {
    let Some(control_id) = req.params.get("controlId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing controlId", None);
    };
    let Some(text) = state.reading_controls.get(control_id).cloned() else {
        return err(
            &req.id,
            "not_found",
            "unknown reading control",
            Some(json!({ "controlId": control_id })),
        );
    };
    let enabled = state.session.current.tts_enabled;
    speak_response(state, req, &text, enabled)
}

fn handle_narrate_stop(state: &mut AppState, req: &Request) -> Value {
    state.engine.stop();
    ok(&req.id, json!({ "stopped": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "narrate.text" => Some(handle_narrate_text(state, req)),
        "narrate.table" => Some(handle_narrate_table(state, req)),
        "narrate.chart" => Some(handle_narrate_chart(state, req)),
        "narrate.button" => Some(handle_narrate_button(state, req)),
        "narrate.dropdown" => Some(handle_narrate_dropdown(state, req)),
        "narrate.onDemand" => Some(handle_narrate_on_demand(state, req)),
        "narrate.activate" => Some(handle_narrate_activate(state, req)),
        "narrate.stop" => Some(handle_narrate_stop(state, req)),
        _ => None,
    }
}
