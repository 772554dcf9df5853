
use serde_json::json;
use test_support::{register_voices, request, request_ok, spawn_sidecar};

fn enable_tts(
    stdin: &mut std::process::ChildStdin,
    reader: &mut std::io::BufReader<std::process::ChildStdout>,
) {
    let _ = register_voices(stdin, reader, "setup-voices");
    let _ = request_ok(
        stdin,
        reader,
        "setup-tts",
        "prefs.set",
        json!({ "field": "ttsEnabled", "value": true }),
    );
}

#[test]
fn table_narration_names_rows_then_columns() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    enable_tts(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "narrate.table",
        json!({
            "rows": [
                { "Name": "Ana", "Score": 88 },
                { "Name": "Luis", "Score": 73 },
                { "Name": "Marta", "Score": 95 }
            ],
            "columns": ["Name", "Score"]
        }),
    );
    let text = result.get("text").and_then(|v| v.as_str()).expect("text");
    let rows_at = text.find('3').expect("row count");
    let name_at = text.find("Name").expect("Name column");
    let score_at = text.find("Score").expect("Score column");
    assert!(rows_at < name_at && name_at < score_at);
    assert!(text.contains("Ana"));
}

#[test]
fn chart_narration_appends_recognized_stats_only() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    enable_tts(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "narrate.chart",
        json!({
            "kind": "histogram",
            "title": "Grade distribution",
            "stats": { "max": 98, "mean": 82.4, "count": 30, "bins": 10 }
        }),
    );
    let text = result.get("text").and_then(|v| v.as_str()).expect("text");
    assert!(text.contains("histogram"));
    assert!(text.contains("Grade distribution"));
    assert!(text.contains("Maximum value: 98"));
    assert!(text.contains("Average: 82.4"));
    assert!(text.contains("Total items: 30"));
    assert!(!text.contains("bins"));
}

#[test]
fn dropdown_narration_truncates_long_option_lists() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    enable_tts(&mut stdin, &mut reader);

    let options: Vec<String> = (1..=8).map(|i| format!("Group {}", i)).collect();
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "narrate.dropdown",
        json!({ "label": "Group", "options": options, "selected": "Group 2" }),
    );
    let text = result.get("text").and_then(|v| v.as_str()).expect("text");
    assert!(text.contains("Group 5"));
    assert!(text.contains("And 3 more options"));
    assert!(text.contains("Selected option: Group 2"));
}

#[test]
fn on_demand_controls_register_and_narrate_when_activated() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    enable_tts(&mut stdin, &mut reader);

    let control = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "narrate.onDemand",
        json!({ "label": "Read summary", "text": "Course average is 82 points." }),
    );
    let control_id = control
        .get("controlId")
        .and_then(|v| v.as_str())
        .expect("controlId")
        .to_string();
    assert_eq!(
        control.get("label").and_then(|v| v.as_str()),
        Some("Read summary")
    );

    let spoken = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "narrate.activate",
        json!({ "controlId": control_id }),
    );
    assert_eq!(
        spoken.get("outcome").and_then(|v| v.as_str()),
        Some("dispatched")
    );
    assert!(spoken
        .get("text")
        .and_then(|v| v.as_str())
        .unwrap()
        .contains("82 points"));

    let missing = request(
        &mut stdin,
        &mut reader,
        "3",
        "narrate.activate",
        json!({ "controlId": "nope" }),
    );
    assert_eq!(
        missing.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );
}
