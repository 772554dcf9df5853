
use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn changed_prefs_autosave_once_and_survive_a_restart() {
    let workspace = temp_dir("accessd-roundtrip");

    {
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
        let _ = request_ok(&mut stdin, &mut reader, "3", "a11y.apply", json!({}));

        // First change writes; repeating the same value does not.
        let set = request_ok(
            &mut stdin,
            &mut reader,
            "4",
            "prefs.set",
            json!({ "field": "darkMode", "value": true }),
        );
        assert_eq!(set.get("persisted").and_then(|v| v.as_bool()), Some(true));
        let transforms = set.get("transforms").and_then(|v| v.as_array()).unwrap();
        assert!(transforms
            .iter()
            .any(|t| t.get("kind").and_then(|k| k.as_str()) == Some("darkMode")));

        let set = request_ok(
            &mut stdin,
            &mut reader,
            "5",
            "prefs.set",
            json!({ "field": "darkMode", "value": true }),
        );
        assert_eq!(set.get("persisted").and_then(|v| v.as_bool()), Some(false));

        let set = request_ok(
            &mut stdin,
            &mut reader,
            "6",
            "prefs.set",
            json!({ "field": "textScalePercent", "value": 120 }),
        );
        assert_eq!(set.get("persisted").and_then(|v| v.as_bool()), Some(true));
    }

    // A brand-new session against the same workspace hydrates the record.
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
    let _ = request_ok(&mut stdin, &mut reader, "3", "a11y.apply", json!({}));

    let prefs = request_ok(&mut stdin, &mut reader, "4", "prefs.get", json!({}));
    assert_eq!(
        prefs.pointer("/prefs/darkMode").and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(
        prefs
            .pointer("/prefs/textScalePercent")
            .and_then(|v| v.as_i64()),
        Some(120)
    );
}
