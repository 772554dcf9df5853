
use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn fresh_identity_gets_documented_defaults_and_values_clamp() {
    let workspace = temp_dir("accessd-defaults");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "identity.set",
        json!({ "identity": "u1" }),
    );
    let applied = request_ok(&mut stdin, &mut reader, "3", "a11y.apply", json!({ "atMs": 0 }));
    assert_eq!(applied.get("loaded").and_then(|v| v.as_bool()), Some(true));

    let prefs = request_ok(&mut stdin, &mut reader, "4", "prefs.get", json!({}));
    assert_eq!(
        prefs.pointer("/prefs/ttsEnabled").and_then(|v| v.as_bool()),
        Some(false)
    );
    assert_eq!(
        prefs
            .pointer("/prefs/textScalePercent")
            .and_then(|v| v.as_i64()),
        Some(100)
    );
    assert_eq!(
        prefs
            .pointer("/prefs/colorVisionMode")
            .and_then(|v| v.as_str()),
        Some("none")
    );
    assert_eq!(
        prefs
            .pointer("/prefs/ttsVoiceLocale")
            .and_then(|v| v.as_str()),
        Some("es-ES")
    );

    // Out-of-range writes clamp silently instead of erroring.
    let set = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "prefs.set",
        json!({ "field": "textScalePercent", "value": 500 }),
    );
    assert_eq!(set.get("value").and_then(|v| v.as_i64()), Some(150));

    let set = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "prefs.set",
        json!({ "field": "letterSpacingEm", "value": -1.0 }),
    );
    assert_eq!(set.get("value").and_then(|v| v.as_f64()), Some(0.0));

    let set = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "prefs.set",
        json!({ "field": "textScaleLoginPercent", "value": 60 }),
    );
    assert_eq!(set.get("value").and_then(|v| v.as_i64()), Some(100));

    // Unrecognized color-vision values normalize to none.
    let set = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "prefs.set",
        json!({ "field": "colorVisionMode", "value": "achromatopsia" }),
    );
    assert_eq!(set.get("value").and_then(|v| v.as_str()), Some("none"));

    // Unknown fields are rejected, not stored.
    let resp = test_support::request(
        &mut stdin,
        &mut reader,
        "9",
        "prefs.set",
        json!({ "field": "fontFamily", "value": "serif" }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
}
