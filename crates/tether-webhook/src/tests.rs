//! End-to-end handler behavior against mocked platform APIs.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;

use tether_core::CredentialOverrides;
use tether_store::{SyncConfig, SyncLink, SyncStore, UserLink};

use crate::engine::{EngineConfig, SyncEngine};
use crate::signature::sign_payload;

const WEBHOOK_SECRET: &str = "hush";

struct Harness {
    _dir: tempfile::TempDir,
    store: SyncStore,
    engine: SyncEngine,
    github_api: MockServer,
    shortcut_api: MockServer,
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SyncStore::open(dir.path().join("tether.db")).expect("store");
    let github_api = MockServer::start_async().await;
    let shortcut_api = MockServer::start_async().await;
    let engine = SyncEngine::new(
        store.clone(),
        EngineConfig {
            github_api_base: github_api.base_url(),
            shortcut_api_base: shortcut_api.base_url(),
            credentials: CredentialOverrides {
                encryption_key: None,
                shortcut_api_key: Some("sc-token".to_string()),
                github_api_key: Some("gh-token".to_string()),
                shortcut_admin_key: None,
            },
            shortcut_allowed_ips: vec!["127.0.0.1".to_string()],
        },
    );
    Harness {
        _dir: dir,
        store,
        engine,
        github_api,
        shortcut_api,
    }
}

fn seed_config(store: &SyncStore) {
    store
        .insert_config(&SyncConfig {
            github_repo_id: 1001,
            github_user_id: 500,
            shortcut_user_id: "member-uuid".to_string(),
            shortcut_team_id: "team-uuid".to_string(),
            repo_name: "org/repo".to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            shortcut_api_key: "unused".to_string(),
            shortcut_api_key_nonce: "unused".to_string(),
            github_api_key: "unused".to_string(),
            github_api_key_nonce: "unused".to_string(),
            public_label_id: 12,
            started_state_id: 100,
            done_state_id: 101,
            archived_state_id: 102,
        })
        .expect("seed config");
}

fn seed_user_link(store: &SyncStore) {
    store
        .upsert_user_link(&UserLink {
            github_user_id: 500,
            shortcut_user_id: "member-uuid".to_string(),
            github_username: "octocat".to_string(),
            shortcut_username: "octo".to_string(),
        })
        .expect("seed user link");
}

fn seed_sync_link(store: &SyncStore) {
    store
        .create_sync_link(&SyncLink {
            github_repo_id: 1001,
            github_issue_number: 42,
            github_issue_id: 987_654,
            shortcut_story_id: 7,
            shortcut_story_number: 7,
            shortcut_team_id: "team-uuid".to_string(),
        })
        .expect("seed sync link");
}

fn issue_opened_payload() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "action": "opened",
        "issue": {
            "id": 987654,
            "number": 42,
            "title": "Fix crash",
            "body": "It crashes.",
            "labels": [{ "name": "bug", "color": "d73a4a" }]
        },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 500, "login": "octocat" }
    }))
    .expect("payload")
}

fn story_json() -> serde_json::Value {
    json!({
        "id": 7,
        "number": 7,
        "name": "Fix crash",
        "description": "It crashes.",
        "workflow_state_id": 100,
        "labels": [{ "id": 12, "name": "public", "color": "#2DA54E" }],
        "owner_ids": [],
        "group_id": "team-uuid",
        "team": { "id": "team-uuid", "key": "TEAM" },
        "app_url": "https://app.shortcut.com/story/7"
    })
}

#[tokio::test]
async fn issue_opened_creates_one_story_and_replay_is_a_noop() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);

    h.shortcut_api
        .mock_async(|when, then| {
            when.method(GET).path("/labels");
            then.status(200).json_body(json!([]));
        })
        .await;
    h.shortcut_api
        .mock_async(|when, then| {
            when.method(POST).path("/labels");
            then.status(201)
                .json_body(json!({ "id": 77, "name": "bug", "color": "#d73a4a" }));
        })
        .await;
    let story_create = h
        .shortcut_api
        .mock_async(|when, then| {
            when.method(POST).path("/stories");
            then.status(201).json_body(story_json());
        })
        .await;
    h.shortcut_api
        .mock_async(|when, then| {
            when.method(POST).path("/attachments");
            then.status(201).json_body(json!({}));
        })
        .await;
    let title_patch = h
        .github_api
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/repos/org/repo/issues/42")
                .json_body_includes(r#"{ "title": "[TEAM-7] Fix crash" }"#);
            then.status(200).json_body(json!({
                "id": 987654,
                "number": 42,
                "title": "[TEAM-7] Fix crash"
            }));
        })
        .await;

    let payload = issue_opened_payload();
    let signature = sign_payload(&payload, WEBHOOK_SECRET).expect("sign");
    let outcome = h
        .engine
        .handle_github_event(&payload, &signature, "issues")
        .await
        .expect("handled");
    assert!(!outcome.is_skip());
    assert!(outcome.message().contains("TEAM-7"));

    let link = h
        .store
        .find_sync_link(1001, 42)
        .expect("find")
        .expect("link row");
    assert_eq!(link.shortcut_story_id, 7);
    assert_eq!(link.shortcut_story_number, 7);
    title_patch.assert_async().await;

    // At-least-once delivery: the identical event replays as a no-op.
    let replay = h
        .engine
        .handle_github_event(&payload, &signature, "issues")
        .await
        .expect("handled");
    assert!(replay.is_skip());
    assert!(replay.message().contains("exists as"));
    assert_eq!(story_create.hits_async().await, 1);
}

#[tokio::test]
async fn tampered_payload_fails_authentication() {
    let h = harness().await;
    seed_config(&h.store);

    let payload = issue_opened_payload();
    let signature = sign_payload(&payload, WEBHOOK_SECRET).expect("sign");
    // One byte changed inside a string field: still valid JSON, dead
    // signature.
    let tampered = String::from_utf8(payload.clone())
        .expect("utf8")
        .replace("Fix crash", "Fix crush")
        .into_bytes();

    let error = h
        .engine
        .handle_github_event(&tampered, &signature, "issues")
        .await
        .unwrap_err();
    assert_eq!(error.status(), 403);

    // The correct pair still verifies (and proceeds to skip the unsupported
    // replayed action because no mocks are set up past creation checks).
    let outcome = h
        .engine
        .handle_github_event(&payload, &signature, "unknown_event")
        .await
        .expect("handled");
    assert!(outcome.is_skip());
}

#[tokio::test]
async fn unknown_repo_is_not_found_without_admin_key() {
    let h = harness().await;

    let payload = issue_opened_payload();
    let signature = sign_payload(&payload, WEBHOOK_SECRET).expect("sign");
    let error = h
        .engine
        .handle_github_event(&payload, &signature, "issues")
        .await
        .unwrap_err();
    assert_eq!(error.status(), 404);
}

#[tokio::test]
async fn comment_edit_without_marker_never_calls_the_destination() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);
    seed_sync_link(&h.store);

    let payload = serde_json::to_vec(&json!({
        "action": "edited",
        "issue": { "id": 987654, "number": 42, "title": "[TEAM-7] Fix crash" },
        "comment": { "id": 9, "body": "edited by hand, no marker" },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 500, "login": "octocat" }
    }))
    .expect("payload");
    let signature = sign_payload(&payload, WEBHOOK_SECRET).expect("sign");

    // No comment-update mock exists; a call would fail the event.
    let outcome = h
        .engine
        .handle_github_event(&payload, &signature, "issue_comment")
        .await
        .expect("handled");
    assert!(outcome.is_skip());
    assert!(outcome.message().contains("no origin marker"));
}

#[tokio::test]
async fn own_comment_echo_is_suppressed() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);
    seed_sync_link(&h.store);

    let body = format!(
        "mirrored text{}",
        tether_core::github_comment_footer("Jo", "6021")
    );
    let payload = serde_json::to_vec(&json!({
        "action": "created",
        "issue": { "id": 987654, "number": 42, "title": "[TEAM-7] Fix crash" },
        "comment": { "id": 9, "body": body },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 500, "login": "octocat" }
    }))
    .expect("payload");
    let signature = sign_payload(&payload, WEBHOOK_SECRET).expect("sign");

    let outcome = h
        .engine
        .handle_github_event(&payload, &signature, "issue_comment")
        .await
        .expect("handled");
    assert!(outcome.is_skip());
    assert!(outcome.message().contains("caused by sync"));
}

#[tokio::test]
async fn milestone_round_trip_keeps_one_link_and_clears_membership() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);
    seed_sync_link(&h.store);

    let iteration_create = h
        .shortcut_api
        .mock_async(|when, then| {
            when.method(POST).path("/iterations");
            then.status(201).json_body(json!({
                "id": 55,
                "name": "Q3",
                "start_date": "2026-08-06",
                "end_date": "2030-01-01"
            }));
        })
        .await;
    let story_update = h
        .shortcut_api
        .mock_async(|when, then| {
            when.method(PUT).path("/stories/7");
            then.status(200).json_body(story_json());
        })
        .await;

    let milestoned = serde_json::to_vec(&json!({
        "action": "milestoned",
        "issue": {
            "id": 987654,
            "number": 42,
            "title": "[TEAM-7] Fix crash",
            "milestone": {
                "id": 3000,
                "number": 3,
                "title": "Q3",
                "description": "quarter goals",
                "due_on": "2030-01-01T00:00:00Z"
            }
        },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 500, "login": "octocat" }
    }))
    .expect("payload");
    let signature = sign_payload(&milestoned, WEBHOOK_SECRET).expect("sign");

    let outcome = h
        .engine
        .handle_github_event(&milestoned, &signature, "issues")
        .await
        .expect("handled");
    assert!(!outcome.is_skip());

    let link = h
        .store
        .find_milestone_link(3, 1001)
        .expect("find")
        .expect("milestone link");
    assert_eq!(link.shortcut_resource_id, 55);

    // Replaying the add must reuse the existing link, not create another
    // iteration.
    h.engine
        .handle_github_event(&milestoned, &signature, "issues")
        .await
        .expect("handled");
    assert_eq!(iteration_create.hits_async().await, 1);

    // Removal clears the destination association.
    let demilestoned = serde_json::to_vec(&json!({
        "action": "demilestoned",
        "issue": { "id": 987654, "number": 42, "title": "[TEAM-7] Fix crash" },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 500, "login": "octocat" }
    }))
    .expect("payload");
    let signature = sign_payload(&demilestoned, WEBHOOK_SECRET).expect("sign");
    let outcome = h
        .engine
        .handle_github_event(&demilestoned, &signature, "issues")
        .await
        .expect("handled");
    assert!(outcome.message().contains("Cleared"));
    assert!(story_update.hits_async().await >= 3);
    assert!(h
        .store
        .find_milestone_link(3, 1001)
        .expect("find")
        .is_some());
}

#[tokio::test]
async fn shortcut_delivery_from_unlisted_ip_is_rejected() {
    let h = harness().await;
    seed_config(&h.store);

    let payload = serde_json::to_vec(&json!({
        "action": "update",
        "model": "story",
        "primary_id": 7,
        "member_id": "member-uuid",
        "references": [{ "id": "team-uuid", "entity_type": "team" }]
    }))
    .expect("payload");

    let error = h
        .engine
        .handle_shortcut_event(&payload, Some("203.0.113.9"))
        .await
        .unwrap_err();
    assert_eq!(error.status(), 403);
}

#[tokio::test]
async fn estimate_change_swaps_the_points_label() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);
    seed_sync_link(&h.store);

    h.shortcut_api
        .mock_async(|when, then| {
            when.method(GET).path("/stories/7");
            then.status(200).json_body(story_json());
        })
        .await;
    let label_create = h
        .github_api
        .mock_async(|when, then| {
            when.method(POST).path("/repos/org/repo/labels");
            then.status(201)
                .json_body(json!({ "name": "5 points", "color": "666666" }));
        })
        .await;
    let label_apply = h
        .github_api
        .mock_async(|when, then| {
            when.method(POST).path("/repos/org/repo/issues/42/labels");
            then.status(200).json_body(json!([]));
        })
        .await;

    let payload = serde_json::to_vec(&json!({
        "action": "update",
        "model": "story",
        "primary_id": 7,
        "member_id": "member-uuid",
        "references": [{ "id": "team-uuid", "entity_type": "team" }],
        "changes": { "estimate": { "old": 2, "new": 5 } }
    }))
    .expect("payload");

    let outcome = h
        .engine
        .handle_shortcut_event(&payload, Some("127.0.0.1"))
        .await
        .expect("handled");
    assert!(!outcome.is_skip());
    assert!(outcome.message().contains("5 points"));
    label_create.assert_async().await;
    label_apply.assert_async().await;
}

#[tokio::test]
async fn priority_unlabel_clears_without_reapplying() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);
    seed_sync_link(&h.store);

    h.shortcut_api
        .mock_async(|when, then| {
            when.method(GET).path("/stories/7");
            then.status(200).json_body(story_json());
        })
        .await;

    // Priority dropped to "no priority": the old label comes off and no
    // label-create or label-apply call is made (none is mocked).
    let payload = serde_json::to_vec(&json!({
        "action": "update",
        "model": "story",
        "primary_id": 7,
        "member_id": "member-uuid",
        "references": [{ "id": "team-uuid", "entity_type": "team" }],
        "changes": { "priority": { "old": 2, "new": 0 } }
    }))
    .expect("payload");

    let outcome = h
        .engine
        .handle_shortcut_event(&payload, Some("127.0.0.1"))
        .await
        .expect("handled");
    assert!(outcome.message().contains("Removed priority label"));
}

#[tokio::test]
async fn story_create_is_gated_on_the_sync_label() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);

    h.shortcut_api
        .mock_async(|when, then| {
            when.method(GET).path("/stories/8");
            then.status(200).json_body(json!({
                "id": 8,
                "number": 8,
                "name": "Private story",
                "workflow_state_id": 100,
                "labels": [],
                "owner_ids": [],
                "team": { "id": "team-uuid", "key": "TEAM" }
            }));
        })
        .await;

    let payload = serde_json::to_vec(&json!({
        "action": "create",
        "model": "story",
        "primary_id": 8,
        "member_id": "member-uuid",
        "references": [{ "id": "team-uuid", "entity_type": "team" }]
    }))
    .expect("payload");

    let outcome = h
        .engine
        .handle_shortcut_event(&payload, Some("127.0.0.1"))
        .await
        .expect("handled");
    assert!(outcome.is_skip());
    assert!(outcome.message().contains("not labeled"));
}

#[tokio::test]
async fn unknown_shortcut_member_is_a_skip_not_an_error() {
    let h = harness().await;
    seed_config(&h.store);

    let payload = serde_json::to_vec(&json!({
        "action": "update",
        "model": "story",
        "primary_id": 7,
        "member_id": "nobody-uuid",
        "references": [{ "id": "team-uuid", "entity_type": "team" }]
    }))
    .expect("payload");

    let outcome = h
        .engine
        .handle_shortcut_event(&payload, Some("127.0.0.1"))
        .await
        .expect("handled");
    assert!(outcome.is_skip());
    assert!(outcome.message().contains("not found in syncs"));
}

#[tokio::test]
async fn ensure_shortcut_label_returns_one_stable_reference() {
    use tether_shortcut::ShortcutClient;

    let api = MockServer::start_async().await;
    api.mock_async(|when, then| {
        when.method(GET).path("/labels");
        then.status(200)
            .json_body(json!([{ "id": 77, "name": "Bug", "color": "#d73a4a" }]));
    })
    .await;
    let create = api
        .mock_async(|when, then| {
            when.method(POST).path("/labels");
            then.status(201)
                .json_body(json!({ "id": 999, "name": "bug", "color": "#d73a4a" }));
        })
        .await;

    let client = ShortcutClient::new(api.base_url(), "sc-token").expect("client");
    // Normalized name matching: " bug " finds the existing "Bug" both
    // times; no create call is ever issued.
    let first = crate::mapper::ensure_shortcut_label(&client, " bug ", None)
        .await
        .expect("ensure")
        .expect("label");
    let second = crate::mapper::ensure_shortcut_label(&client, "BUG", None)
        .await
        .expect("ensure")
        .expect("label");
    assert_eq!(first.id, 77);
    assert_eq!(second.id, 77);
    assert_eq!(create.hits_async().await, 0);
}

#[tokio::test]
async fn ensure_shortcut_label_creates_when_absent() {
    use tether_shortcut::ShortcutClient;

    let api = MockServer::start_async().await;
    api.mock_async(|when, then| {
        when.method(GET).path("/labels");
        then.status(200).json_body(json!([]));
    })
    .await;
    api.mock_async(|when, then| {
        when.method(POST).path("/labels");
        then.status(201)
            .json_body(json!({ "id": 88, "name": "needs-triage", "color": "#ededed" }));
    })
    .await;

    let client = ShortcutClient::new(api.base_url(), "sc-token").expect("client");
    let created = crate::mapper::ensure_shortcut_label(&client, "needs-triage", None)
        .await
        .expect("ensure")
        .expect("label");
    assert_eq!(created.id, 88);
}

#[tokio::test]
async fn priority_labels_map_to_the_priority_field_not_a_label() {
    let h = harness().await;
    seed_config(&h.store);
    seed_user_link(&h.store);
    seed_sync_link(&h.store);

    let set_priority = h
        .shortcut_api
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/stories/7")
                .json_body(json!({ "priority": 1 }));
            then.status(200).json_body(story_json());
        })
        .await;
    let clear_priority = h
        .shortcut_api
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/stories/7")
                .json_body(json!({ "priority": null }));
            then.status(200).json_body(story_json());
        })
        .await;

    let labeled = serde_json::to_vec(&json!({
        "action": "labeled",
        "issue": { "id": 987654, "number": 42, "title": "[TEAM-7] Fix crash" },
        "label": { "name": "Urgent", "color": "dc2626" },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 500, "login": "octocat" }
    }))
    .expect("payload");
    let signature = sign_payload(&labeled, WEBHOOK_SECRET).expect("sign");
    let outcome = h
        .engine
        .handle_github_event(&labeled, &signature, "issues")
        .await
        .expect("handled");
    assert!(outcome.message().contains("priority"));
    set_priority.assert_async().await;

    let unlabeled = serde_json::to_vec(&json!({
        "action": "unlabeled",
        "issue": { "id": 987654, "number": 42, "title": "[TEAM-7] Fix crash" },
        "label": { "name": "Urgent", "color": "dc2626" },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 500, "login": "octocat" }
    }))
    .expect("payload");
    let signature = sign_payload(&unlabeled, WEBHOOK_SECRET).expect("sign");
    let outcome = h
        .engine
        .handle_github_event(&unlabeled, &signature, "issues")
        .await
        .expect("handled");
    assert!(outcome.message().contains("Cleared priority"));
    clear_priority.assert_async().await;
}

#[tokio::test]
async fn anonymous_mode_substitutes_the_admin_key() {
    let h = harness().await;
    seed_config(&h.store);
    seed_sync_link(&h.store);

    // Same store, admin key configured: a sender with no sync config of
    // their own falls back to the repo-scoped config + admin credential.
    let engine = SyncEngine::new(
        h.store.clone(),
        EngineConfig {
            github_api_base: h.github_api.base_url(),
            shortcut_api_base: h.shortcut_api.base_url(),
            credentials: CredentialOverrides {
                encryption_key: None,
                shortcut_api_key: Some("sc-token".to_string()),
                github_api_key: Some("gh-token".to_string()),
                shortcut_admin_key: Some("admin-token".to_string()),
            },
            shortcut_allowed_ips: vec!["127.0.0.1".to_string()],
        },
    );

    let comment_create = h
        .shortcut_api
        .mock_async(|when, then| {
            when.method(POST)
                .path("/stories/7/comments")
                .header("shortcut-token", "admin-token");
            then.status(201).json_body(json!({
                "id": 6021,
                "text": "drive-by comment",
                "author_id": "stranger-uuid"
            }));
        })
        .await;

    let payload = serde_json::to_vec(&json!({
        "action": "created",
        "issue": { "id": 987654, "number": 42, "title": "[TEAM-7] Fix crash" },
        "comment": { "id": 9, "body": "drive-by comment" },
        "repository": { "id": 1001, "full_name": "org/repo" },
        "sender": { "id": 999, "login": "stranger" }
    }))
    .expect("payload");
    let signature = sign_payload(&payload, WEBHOOK_SECRET).expect("sign");

    let outcome = engine
        .handle_github_event(&payload, &signature, "issue_comment")
        .await
        .expect("handled");
    assert!(!outcome.is_skip());
    comment_create.assert_async().await;
}

mod dispatcher {
    use super::*;
    use crate::server::router;

    async fn serve(engine: SyncEngine) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = router(Arc::new(engine));
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn non_post_is_method_not_allowed() {
        let h = harness().await;
        let base = serve(h.engine).await;

        let response = reqwest::get(format!("{base}/webhook")).await.expect("get");
        assert_eq!(response.status().as_u16(), 405);
    }

    #[tokio::test]
    async fn github_route_returns_envelope_with_error_status() {
        let h = harness().await;
        let base = serve(h.engine).await;

        // Unknown repo, no admin key: 404 with a failure envelope.
        let payload = issue_opened_payload();
        let signature = sign_payload(&payload, WEBHOOK_SECRET).expect("sign");
        let response = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .header("x-github-event", "issues")
            .header("x-hub-signature-256", signature)
            .body(payload)
            .send()
            .await
            .expect("post");
        assert_eq!(response.status().as_u16(), 404);
        let envelope: crate::server::WebhookResponse =
            response.json().await.expect("envelope");
        assert!(!envelope.success);
        assert!(envelope.message.contains("Sync not found"));
    }

    #[tokio::test]
    async fn shortcut_route_is_selected_by_user_agent() {
        let h = harness().await;
        seed_config(&h.store);
        let base = serve(h.engine).await;

        let payload = serde_json::to_vec(&json!({
            "action": "update",
            "model": "story",
            "primary_id": 7,
            "member_id": "nobody-uuid",
            "references": [{ "id": "team-uuid", "entity_type": "team" }]
        }))
        .expect("payload");

        let response = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .header("user-agent", "Shortcut-Webhook")
            .header("x-forwarded-for", "127.0.0.1, 10.0.0.1")
            .body(payload)
            .send()
            .await
            .expect("post");
        assert_eq!(response.status().as_u16(), 200);
        let envelope: crate::server::WebhookResponse =
            response.json().await.expect("envelope");
        assert!(envelope.success);
        assert!(envelope.message.contains("not found in syncs"));
    }
}
