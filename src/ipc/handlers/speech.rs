use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::narration::{SpeechError, VoiceInfo};
use serde_json::json;

/// The host's voice inventory arrived (browsers load voices asynchronously).
/// `supported:false` declares the environment speech-incapable; narration
/// falls back to the transcript channel from then on.
fn handle_speech_voices(state: &mut AppState, req: &Request) -> serde_json::Value {
    let voices: Vec<VoiceInfo> = match req.params.get("voices") {
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(list) => list,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("invalid voices: {}", e),
                    None,
                )
            }
        },
        None => Vec::new(),
    };
    let supported = req
        .params
        .get("supported")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let count = voices.len();
    state.engine.register_voices(voices, supported);

    ok(&req.id, json!({ "count": count, "supported": supported }))
}

fn handle_speech_drain(state: &mut AppState, req: &Request) -> serde_json::Value {
    let directives = state.engine.host.drain();
    let transcript = state.engine.transcript.drain();
    ok(
        &req.id,
        json!({
            "directives": directives,
            "transcript": transcript,
        }),
    )
}

fn handle_speech_playback_result(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(utterance_id) = req.params.get("utteranceId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing utteranceId", None);
    };
    let ok_flag = req.params.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    let result = if ok_flag {
        Ok(())
    } else {
        let message = req
            .params
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("playback failed")
            .to_string();
        Err(SpeechError::Playback(message))
    };

    state.engine.on_playback_result(utterance_id, result);
    ok(&req.id, json!({ "acknowledged": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "speech.voices" => Some(handle_speech_voices(state, req)),
        "speech.drain" => Some(handle_speech_drain(state, req)),
        "speech.playbackResult" => Some(handle_speech_playback_result(state, req)),
        _ => None,
    }
}
