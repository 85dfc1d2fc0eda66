mod common;

use common::{Harness, function_call};
use realtime_scribe::audio;
use realtime_scribe::sdk::BridgeBuilder;
use realtime_scribe::{Assistant, AssistantConfig, AudioEncoding, ClientEvent};
use serde_json::json;

async fn assistant(dir: &tempfile::TempDir) -> Assistant {
    let config = AssistantConfig {
        working_directory: dir.path().join("workspace"),
        scripts_directory: dir.path().join("scripts"),
        ..AssistantConfig::default()
    };
    Assistant::new(config).await.expect("assistant")
}

#[tokio::test]
async fn file_operations_over_the_bridge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assistant = assistant(&dir).await;
    let mut harness = Harness::start(assistant.bridge()).await;

    let args = json!({ "operation": "create", "filename": "draft", "content": "hello" });
    harness.push(function_call("c1", "file_operation", &args.to_string()));
    let (_, output) = harness.next_output().await;
    assert_eq!(output["success"], true);
    assert_eq!(output["message"], "Created file: draft");

    let args = json!({ "operation": "insert", "filename": "draft.md", "lineNumber": 1, "content": "# Title" });
    harness.push(function_call("c2", "file_operation", &args.to_string()));
    assert_eq!(harness.next_output().await.1["line_number"], 1);

    let args = json!({ "operation": "read", "filename": "draft" });
    harness.push(function_call("c3", "file_operation", &args.to_string()));
    assert_eq!(harness.next_output().await.1["content"], "# Title\nhello");

    let args = json!({ "operation": "replace", "filename": "draft" });
    harness.push(function_call("c4", "file_operation", &args.to_string()));
    let (_, output) = harness.next_output().await;
    assert_eq!(output["success"], false);
    assert_eq!(output["operation"], "replace");
    assert_eq!(
        output["error"],
        "Pattern and replacement are required for replace operation"
    );

    harness.finish().await.expect("clean close");
}

#[tokio::test]
async fn unknown_operation_is_rejected_softly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assistant = assistant(&dir).await;
    let mut harness = Harness::start(assistant.bridge()).await;

    harness.push(function_call("c1", "file_operation", r#"{"operation":"shred"}"#));
    let (_, output) = harness.next_output().await;
    assert_eq!(output["success"], false);
    assert_eq!(output["error_type"], "validation_error");
    harness.finish().await.expect("clean close");
}

#[tokio::test]
async fn script_walkthrough_over_the_bridge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assistant = assistant(&dir).await;
    let mut harness = Harness::start(assistant.bridge()).await;

    harness.push(function_call("c1", "load_script", r#"{"scriptName":"blog_writer"}"#));
    let (_, output) = harness.next_output().await;
    assert_eq!(output["success"], true);
    assert_eq!(output["current_stage"]["name"], "discovery");

    harness.push(function_call("c2", "advance_stage", "{}"));
    let (_, output) = harness.next_output().await;
    assert_eq!(output["stage_number"], 2);
    assert_eq!(output["current_stage"]["name"], "outline");
    assert_eq!(output["current_stage"]["actions"], json!(["create_outline", "suggest_sections"]));

    harness.push(function_call("c3", "advance_stage", "{}"));
    assert_eq!(harness.next_output().await.1["stage_number"], 3);

    harness.push(function_call("c4", "script_progress", "{}"));
    let progress = harness.next_output().await.1["progress"].clone();
    assert_eq!(progress["active"], true);
    assert_eq!(progress["current_stage"], 3);
    assert_eq!(progress["total_stages"], 3);
    assert_eq!(progress["is_complete"], false);

    harness.push(function_call("c5", "advance_stage", "{}"));
    let (_, output) = harness.next_output().await;
    assert_eq!(output["success"], false);
    assert_eq!(output["is_complete"], true);

    harness.push(function_call("c6", "reset_script", "{}"));
    assert_eq!(harness.next_output().await.1["progress"]["current_stage"], 1);

    harness.push(function_call("c7", "load_script", r#"{"script_name":"sonnet"}"#));
    let (_, output) = harness.next_output().await;
    assert_eq!(output["success"], false);
    assert_eq!(output["error"], "Script 'sonnet' not found");

    harness.finish().await.expect("clean close");
}

#[tokio::test]
async fn session_update_declares_script_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assistant = assistant(&dir).await;
    let harness = Harness::start(assistant.bridge()).await;

    let value = serde_json::to_value(&harness.session_update).expect("serialize");
    let tools = value["session"]["tools"].as_array().expect("tools");
    let load = tools
        .iter()
        .find(|tool| tool["name"] == "load_script")
        .expect("load_script declared");
    assert_eq!(load["parameters"]["properties"]["script_name"]["enum"].as_array().map(Vec::len), Some(5));
    assert_eq!(value["session"]["input_audio_format"], "pcm16");
    harness.finish().await.expect("clean close");
}

#[tokio::test]
async fn completed_text_is_appended_to_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assistant = assistant(&dir).await;
    let mut marker = common::observe(assistant.bridge(), "marker");
    let harness = Harness::start(assistant.bridge()).await;

    harness.push(json!({ "type": "response.text.done", "text": "An outline in three parts." }));
    harness.push(json!({ "type": "marker" }));
    common::recv(&mut marker).await;

    let content = assistant.files().read("output.md").await.expect("output exists");
    assert!(content.starts_with("# AI Assistant Session"));
    assert!(content.contains("AI Response:**\nAn outline in three parts.\n"));
    harness.finish().await.expect("clean close");
}

#[tokio::test]
async fn audio_pump_batches_microphone_frames() {
    let bridge = BridgeBuilder::new().audio_encoding(AudioEncoding::Hex).build();
    let mut harness = Harness::start(&bridge).await;
    let (feed, pump) = audio::microphone(bridge.clone(), 16);

    assert!(feed.push(vec![0x01; 1024]));
    assert!(feed.push(vec![0x02; 1024]));
    assert!(feed.push(vec![0x03; 16]));
    drop(feed);
    let sent = pump.run().await;
    assert_eq!(sent, 2064);

    let mut total = 0;
    while total < 2064 {
        match harness.next_event().await {
            ClientEvent::InputAudioBufferAppend { audio, .. } => {
                total += AudioEncoding::Hex.decode(&audio).expect("hex payload").len();
            }
            other => panic!("unexpected {}", other.event_type()),
        }
    }
    assert_eq!(total, 2064);
    harness.finish().await.expect("clean close");
}

#[tokio::test]
async fn audio_deltas_reach_the_speaker_queue() {
    let bridge = BridgeBuilder::new().build();
    let (queue, mut speaker) = audio::speaker(8);
    queue.attach(&bridge);
    let mut marker = common::observe(&bridge, "marker");
    let harness = Harness::start(&bridge).await;

    harness.push(json!({ "type": "response.audio.delta", "delta": AudioEncoding::Base64.encode(&[5, 6, 7]) }));
    harness.push(json!({ "type": "marker" }));
    common::recv(&mut marker).await;

    let mut out = [0u8; 4];
    assert_eq!(speaker.fill(&mut out), 3);
    assert_eq!(out, [5, 6, 7, 0]);
    harness.finish().await.expect("clean close");
}
