//! Client behavior against a mocked Shortcut API.

use httpmock::prelude::*;
use serde_json::json;

use crate::{Created, ShortcutClient, StoryPatch};

fn client_for(server: &MockServer) -> ShortcutClient {
    ShortcutClient::new(server.base_url(), "sc-token").expect("client")
}

#[tokio::test]
async fn get_story_decodes_team_and_short_name() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/stories/7")
                .header("shortcut-token", "sc-token");
            then.status(200).json_body(json!({
                "id": 7,
                "number": 7,
                "name": "Fix crash",
                "workflow_state_id": 100,
                "team": { "id": "team-uuid", "key": "TEAM" }
            }));
        })
        .await;

    let story = client_for(&server).get_story(7).await.expect("story");
    assert_eq!(story.short_name().as_deref(), Some("TEAM-7"));
}

#[tokio::test]
async fn update_story_sends_explicit_null_to_clear_priority() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/stories/7")
                .json_body(json!({ "priority": null }));
            then.status(200).json_body(json!({
                "id": 7,
                "number": 7,
                "name": "Fix crash",
                "workflow_state_id": 100
            }));
        })
        .await;

    let patch = StoryPatch {
        priority: Some(None),
        ..Default::default()
    };
    client_for(&server).update_story(7, &patch).await.expect("update");
    mock.assert_async().await;
}

#[tokio::test]
async fn default_patch_serializes_to_empty_object() {
    let rendered = serde_json::to_value(StoryPatch::default()).expect("serialize");
    assert_eq!(rendered, json!({}));
}

#[tokio::test]
async fn create_label_treats_duplicate_as_success() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/labels");
            then.status(422).json_body(json!({ "message": "name taken" }));
        })
        .await;

    let created = client_for(&server)
        .create_label("bug", "d73a4a")
        .await
        .expect("create label");
    assert_eq!(created, Created::AlreadyExists);
}

#[tokio::test]
async fn missing_story_is_reported_as_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/stories/999");
            then.status(404).json_body(json!({ "message": "not found" }));
        })
        .await;

    let error = client_for(&server).get_story(999).await.unwrap_err();
    assert!(error.is_not_found());
}
