//! Client behavior against a mocked GitHub API.

use httpmock::prelude::*;
use serde_json::json;

use crate::{Created, GithubClient};

fn client_for(server: &MockServer) -> GithubClient {
    GithubClient::new(server.base_url(), "gh-token", "org/repo, tether", "org/repo")
        .expect("client")
}

#[tokio::test]
async fn get_issue_decodes_pull_request_flag() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/org/repo/issues/42")
                .header("authorization", "Bearer gh-token");
            then.status(200).json_body(json!({
                "id": 987654,
                "number": 42,
                "title": "Fix crash",
                "body": "It crashes.",
                "pull_request": { "url": "https://example.test/pr/42" }
            }));
        })
        .await;

    let issue = client_for(&server).get_issue(42).await.expect("issue");
    mock.assert_async().await;
    assert!(issue.is_pull_request());
    assert_eq!(issue.title, "Fix crash");
}

#[tokio::test]
async fn create_label_treats_already_exists_as_success() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/repos/org/repo/labels");
            then.status(422)
                .json_body(json!({ "errors": [{ "code": "already_exists" }] }));
        })
        .await;

    let created = client_for(&server)
        .create_label("bug", "d73a4a")
        .await
        .expect("create label");
    assert_eq!(created, Created::AlreadyExists);
}

#[tokio::test]
async fn remove_label_tolerates_absent_label() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/repos/org/repo/issues/42/labels/3%20points");
            then.status(404).json_body(json!({ "message": "Not Found" }));
        })
        .await;

    let removed = client_for(&server)
        .remove_label(42, "3 points")
        .await
        .expect("remove label");
    assert!(!removed);
}

#[tokio::test]
async fn primary_path_failure_carries_status_and_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/repos/org/repo/issues");
            then.status(500).body("upstream exploded");
        })
        .await;

    let error = client_for(&server)
        .create_issue(&crate::NewIssue {
            title: "t".to_string(),
            body: "b".to_string(),
            assignee: None,
        })
        .await
        .unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.contains("status 500"));
    assert!(rendered.contains("upstream exploded"));
}

#[tokio::test]
async fn set_issue_milestone_clears_with_null() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/repos/org/repo/issues/42")
                .json_body(json!({ "milestone": null }));
            then.status(200).json_body(json!({
                "id": 987654,
                "number": 42,
                "title": "Fix crash"
            }));
        })
        .await;

    client_for(&server)
        .set_issue_milestone(42, None)
        .await
        .expect("clear milestone");
    mock.assert_async().await;
}
