//! GitHub → Shortcut event handler.
//!
//! Per event: resolve the sync configuration, verify the HMAC signature,
//! suppress echoes of the engine's own writes, then apply the minimal
//! Shortcut mutation for the decoded event kind. No internal retries:
//! GitHub redelivers, so every branch checks link existence before
//! creating anything.

use anyhow::Context as _;
use tether_content::{prepare_markdown_content, upsert_user, TransformOptions};
use tether_core::{
    labels, markers, skip_reason, Platform, SyncError, SyncOutcome, SyncResult,
};
use tether_github::{GithubClient, GithubIssue, IssuePatch};
use tether_shortcut::{AttachmentRequest, NewStory, ShortcutClient, StoryPatch};
use tether_store::{StoreError, SyncConfig, SyncLink, SyncStore};

use crate::engine::SyncEngine;
use crate::github_events::{GithubEvent, GithubWebhookBody};
use crate::mapper;
use crate::signature::verify_signature;

/// Label opting a GitHub issue into sync (and batching a history import).
const SYNC_LABEL: &str = "shortcut";

struct EventContext<'a> {
    store: &'a SyncStore,
    config: &'a SyncConfig,
    github: GithubClient,
    shortcut: ShortcutClient,
    anonymous: bool,
}

impl EventContext<'_> {
    fn repo_id(&self) -> i64 {
        self.config.github_repo_id
    }

    fn find_link(&self, issue_number: i64) -> SyncResult<Option<SyncLink>> {
        Ok(self
            .store
            .find_sync_link(self.repo_id(), issue_number)
            .context("sync link lookup failed")?)
    }
}

pub(crate) async fn handle(
    engine: &SyncEngine,
    raw_body: &[u8],
    signature: &str,
    event_name: &str,
) -> SyncResult<SyncOutcome> {
    let body: GithubWebhookBody =
        serde_json::from_slice(raw_body).context("invalid github webhook payload")?;

    if body.issue.as_ref().is_some_and(GithubIssue::is_pull_request) {
        return Ok(SyncOutcome::skipped("Pull request event."));
    }

    let repository = body
        .repository
        .as_ref()
        .ok_or_else(|| SyncError::NotFound("Webhook payload carries no repository.".to_string()))?;

    let store = engine.store();
    let direct = match body.sender.as_ref() {
        Some(sender) => store
            .find_config(repository.id, sender.id)
            .context("sync config lookup failed")?,
        None => None,
    };

    let mut anonymous = false;
    let config = match direct {
        Some(config) => config,
        None => {
            if engine.config.credentials.shortcut_admin_key.is_none() {
                return Err(SyncError::NotFound(format!(
                    "Sync not found (repo: {}).",
                    repository.id
                )));
            }
            anonymous = true;
            store
                .find_config_for_repo(repository.id)
                .context("sync config lookup failed")?
                .ok_or_else(|| {
                    SyncError::NotFound(format!("Sync not found (repo: {}).", repository.id))
                })?
        }
    };

    verify_signature(raw_body, signature, &config.webhook_secret).map_err(|_| {
        SyncError::Authentication(format!(
            "Webhook signature mismatch (repo: {}).",
            repository.id
        ))
    })?;

    let (github, shortcut) = engine.build_clients(&config, anonymous)?;
    let ctx = EventContext {
        store,
        config: &config,
        github,
        shortcut,
        anonymous,
    };

    if !ctx.anonymous {
        if let Err(error) = upsert_user(
            ctx.store,
            &ctx.github,
            &ctx.shortcut,
            config.github_user_id,
            &config.shortcut_user_id,
        )
        .await
        {
            tracing::warn!(%error, repo = config.github_repo_id, "user link upsert failed");
        }
    }

    let action = body.action.clone().unwrap_or_default();
    match GithubEvent::classify(event_name, &action) {
        GithubEvent::CommentCreated => comment_created(&ctx, &body).await,
        GithubEvent::CommentEdited => comment_edited(&ctx, &body).await,
        GithubEvent::IssueEdited => issue_edited(&ctx, &body).await,
        GithubEvent::IssueClosed | GithubEvent::IssueReopened => {
            issue_state_changed(&ctx, &body).await
        }
        GithubEvent::IssueOpened => match create_story(&ctx, &body, false).await? {
            Creation::Created(_, message) => Ok(SyncOutcome::applied(message)),
            Creation::Skipped(reason) => Ok(SyncOutcome::skipped(reason)),
        },
        GithubEvent::IssueLabeled | GithubEvent::IssueUnlabeled => {
            let is_sync_label = body.label.as_ref().is_some_and(|label| {
                mapper::normalize_label_name(&label.name) == SYNC_LABEL
            });
            if is_sync_label && action == "labeled" {
                // Labeling with the sync label opts the issue in and batches
                // a history import.
                return match create_story(&ctx, &body, true).await? {
                    Creation::Created(_, message) => Ok(SyncOutcome::applied(message)),
                    Creation::Skipped(reason) => Ok(SyncOutcome::skipped(reason)),
                };
            }
            label_changed(&ctx, &body, &action).await
        }
        GithubEvent::IssueAssigned | GithubEvent::IssueUnassigned => {
            assignee_changed(&ctx, &body, &action).await
        }
        GithubEvent::IssueMilestoned | GithubEvent::IssueDemilestoned => {
            milestone_changed(&ctx, &body, &action).await
        }
        GithubEvent::Unsupported { event, action } => Ok(SyncOutcome::skipped(format!(
            "Unhandled github event {event}/{action}."
        ))),
    }
}

fn required_issue<'a>(body: &'a GithubWebhookBody) -> SyncResult<&'a GithubIssue> {
    body.issue
        .as_ref()
        .ok_or_else(|| SyncError::NotFound("Webhook payload carries no issue.".to_string()))
}

async fn comment_created(
    ctx: &EventContext<'_>,
    body: &GithubWebhookBody,
) -> SyncResult<SyncOutcome> {
    let issue = required_issue(body)?;
    let comment = body
        .comment
        .as_ref()
        .ok_or_else(|| SyncError::NotFound("Comment event carries no comment.".to_string()))?;
    let comment_body = comment.body.clone().unwrap_or_default();

    if markers::looks_like_own_write(&comment_body) {
        return Ok(SyncOutcome::skipped(skip_reason(
            "comment",
            format!("#{}", issue.number),
            true,
        )));
    }

    let Some(link) = ctx.find_link(issue.number)? else {
        return Ok(SyncOutcome::skipped(skip_reason(
            "comment",
            format!("#{}", issue.number),
            false,
        )));
    };

    let text = prepare_markdown_content(
        ctx.store,
        &comment_body,
        Platform::Github,
        TransformOptions::default(),
    );
    ctx.shortcut
        .create_comment(link.shortcut_story_id, &text, Some(&comment.id.to_string()))
        .await
        .map_err(SyncError::from)?;
    Ok(SyncOutcome::applied(format!(
        "Created comment on story {} for issue #{}.",
        link.shortcut_story_id, issue.number
    )))
}

async fn comment_edited(
    ctx: &EventContext<'_>,
    body: &GithubWebhookBody,
) -> SyncResult<SyncOutcome> {
    let issue = required_issue(body)?;
    let comment = body
        .comment
        .as_ref()
        .ok_or_else(|| SyncError::NotFound("Comment event carries no comment.".to_string()))?;

    let Some(link) = ctx.find_link(issue.number)? else {
        return Ok(SyncOutcome::skipped(skip_reason(
            "comment",
            format!("#{}", issue.number),
            false,
        )));
    };

    let comment_body = comment.body.clone().unwrap_or_default();
    let Some(marker) = markers::extract_comment_marker(&comment_body) else {
        // Only comments the engine mirrored from Shortcut carry a marker;
        // editing any other comment has no counterpart to update.
        return Ok(SyncOutcome::skipped(format!(
            "Comment {} carries no origin marker.",
            comment.id
        )));
    };
    let origin_comment_id: i64 = marker
        .parse()
        .with_context(|| format!("malformed comment marker '{marker}'"))?;

    let text = prepare_markdown_content(
        ctx.store,
        &markers::strip_back_reference(&comment_body),
        Platform::Github,
        TransformOptions::default(),
    );
    ctx.shortcut
        .update_comment(link.shortcut_story_id, origin_comment_id, &text)
        .await
        .map_err(SyncError::from)?;
    Ok(SyncOutcome::applied(format!(
        "Updated comment {} on story {}.",
        origin_comment_id, link.shortcut_story_id
    )))
}

async fn issue_edited(ctx: &EventContext<'_>, body: &GithubWebhookBody) -> SyncResult<SyncOutcome> {
    let issue = required_issue(body)?;
    let Some(link) = ctx.find_link(issue.number)? else {
        return Ok(SyncOutcome::skipped(skip_reason(
            "edit",
            format!("#{}", issue.number),
            false,
        )));
    };

    let title = markers::strip_story_key_prefix(&issue.title);
    let description = markers::strip_back_reference(issue.body.as_deref().unwrap_or(""));
    let text = prepare_markdown_content(
        ctx.store,
        &description,
        Platform::Github,
        TransformOptions::default(),
    );

    ctx.shortcut
        .update_story(
            link.shortcut_story_id,
            &StoryPatch {
                name: Some(title),
                description: Some(text),
                ..Default::default()
            },
        )
        .await
        .map_err(SyncError::from)?;
    Ok(SyncOutcome::applied(format!(
        "Edited story {} for issue #{}.",
        link.shortcut_story_id, issue.number
    )))
}

async fn issue_state_changed(
    ctx: &EventContext<'_>,
    body: &GithubWebhookBody,
) -> SyncResult<SyncOutcome> {
    let issue = required_issue(body)?;
    let Some(link) = ctx.find_link(issue.number)? else {
        return Ok(SyncOutcome::skipped(skip_reason(
            "state change",
            format!("#{}", issue.number),
            false,
        )));
    };

    let workflow_state_id = match issue.state_reason.as_deref() {
        Some("not_planned") => ctx.config.archived_state_id,
        Some("completed") => ctx.config.done_state_id,
        _ => ctx.config.started_state_id,
    };
    ctx.shortcut
        .update_story(
            link.shortcut_story_id,
            &StoryPatch {
                workflow_state_id: Some(workflow_state_id),
                ..Default::default()
            },
        )
        .await
        .map_err(SyncError::from)?;
    Ok(SyncOutcome::applied(format!(
        "Changed state for story {} (issue #{}).",
        link.shortcut_story_id, issue.number
    )))
}

enum Creation {
    Created(SyncLink, String),
    Skipped(String),
}

/// First mirror of an issue: create the story, persist the link, then run
/// the best-effort fan-out (title patch, back-reference attachment) and the
/// optional comment-history import.
async fn create_story(
    ctx: &EventContext<'_>,
    body: &GithubWebhookBody,
    import_history: bool,
) -> SyncResult<Creation> {
    let issue = required_issue(body)?;

    if let Some(link) = ctx.find_link(issue.number)? {
        return Ok(Creation::Skipped(format!(
            "Not creating: issue #{} exists as story {} (repo: {}).",
            issue.number,
            link.shortcut_story_id,
            ctx.repo_id()
        )));
    }

    if markers::title_carries_story_key(&issue.title) {
        return Ok(Creation::Skipped(format!(
            "Skipping creation as issue #{}'s title seems to contain a story key.",
            issue.number
        )));
    }

    let sender_linked = match body.sender.as_ref() {
        Some(sender) => ctx
            .store
            .find_user_link_by_github_id(sender.id)
            .context("user link lookup failed")?
            .is_some(),
        None => false,
    };
    let description = prepare_markdown_content(
        ctx.store,
        issue.body.as_deref().unwrap_or(""),
        Platform::Github,
        TransformOptions {
            strip_inline_comments: ctx.anonymous || !sender_linked,
        },
    );

    let mut label_ids = vec![ctx.config.public_label_id];
    for label in &issue.labels {
        if mapper::normalize_label_name(&label.name) == SYNC_LABEL {
            continue;
        }
        match mapper::ensure_shortcut_label(&ctx.shortcut, &label.name, label.color.as_deref())
            .await
        {
            Ok(Some(mapped)) if !label_ids.contains(&mapped.id) => label_ids.push(mapped.id),
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(%error, label = %label.name, "label mapping failed during creation");
            }
        }
    }

    let owner_ids = match issue.assignee.as_ref() {
        Some(assignee) => ctx
            .store
            .find_user_link_by_github_id(assignee.id)
            .context("user link lookup failed")?
            .map(|link| vec![link.shortcut_user_id])
            .unwrap_or_default(),
        None => Vec::new(),
    };

    let story = ctx
        .shortcut
        .create_story(&NewStory {
            name: issue.title.clone(),
            description,
            group_id: ctx.config.shortcut_team_id.clone(),
            label_ids,
            owner_ids,
        })
        .await
        .map_err(|error| {
            tracing::warn!(%error, issue = issue.number, "story creation failed");
            SyncError::api(
                format!(
                    "Failed to create story for #{} (repo: {}).",
                    issue.number,
                    ctx.repo_id()
                ),
                500,
            )
        })?;

    let link = SyncLink {
        github_repo_id: ctx.repo_id(),
        github_issue_number: issue.number,
        github_issue_id: issue.id,
        shortcut_story_id: story.id,
        shortcut_story_number: story.number,
        shortcut_team_id: story
            .team
            .as_ref()
            .map(|team| team.id.clone())
            .unwrap_or_else(|| ctx.config.shortcut_team_id.clone()),
    };
    if let Err(error) = ctx.store.create_sync_link(&link) {
        return match error {
            StoreError::AlreadyLinked(key) => {
                tracing::warn!(%key, "concurrent delivery already linked this issue");
                Ok(Creation::Skipped(format!(
                    "Not creating: issue #{} is already linked.",
                    issue.number
                )))
            }
            other => Err(SyncError::Other(
                anyhow::Error::new(other).context("sync link persist failed"),
            )),
        };
    }

    let short_name = story.short_name();
    if let Some(short_name) = short_name.as_deref() {
        let story_url = story
            .app_url
            .clone()
            .unwrap_or_else(|| format!("https://app.shortcut.com/story/{}", story.id));
        let issue_url = format!(
            "https://github.com/{}/issues/{}",
            ctx.config.repo_name, issue.number
        );
        let patch = IssuePatch {
            title: Some(format!("[{short_name}] {}", issue.title)),
            body: Some(format!(
                "{}\n\n<sub>[{short_name}]({story_url})</sub>",
                issue.body.as_deref().unwrap_or("")
            )),
            ..Default::default()
        };
        let attachment = AttachmentRequest {
            story_id: story.id,
            name: format!("github.com/{}/issues/{}", ctx.config.repo_name, issue.number),
            description: format!("GitHub Issue #{}", issue.number),
            url: issue_url,
        };

        // Independent post-creation writes; a failure in one must not
        // cancel the other or roll back the link.
        let (title_patch, attachment_create) = tokio::join!(
            ctx.github.update_issue(issue.number, &patch),
            ctx.shortcut.create_attachment(&attachment),
        );
        if let Err(error) = title_patch {
            tracing::warn!(%error, issue = issue.number, "title back-reference patch failed");
        }
        if let Err(error) = attachment_create {
            tracing::warn!(%error, issue = issue.number, "attachment creation failed");
        }
    } else {
        tracing::warn!(story = story.id, "created story carries no team; title patch skipped");
    }

    if import_history {
        import_comment_history(ctx, issue, &link).await;
    }

    let display = short_name.unwrap_or_else(|| format!("story {}", story.id));
    Ok(Creation::Created(
        link,
        format!("Created {display} for issue #{}.", issue.number),
    ))
}

/// Replay existing issue comments onto the fresh story. Best-effort end to
/// end: once the link exists, re-running the event is unsafe, so nothing
/// here may abort it.
async fn import_comment_history(ctx: &EventContext<'_>, issue: &GithubIssue, link: &SyncLink) {
    let comments = match ctx.github.list_comments(issue.number).await {
        Ok(comments) => comments,
        Err(error) => {
            tracing::warn!(%error, issue = issue.number, "comment history fetch failed");
            return;
        }
    };
    for comment in comments {
        let body = comment.body.unwrap_or_default();
        if markers::looks_like_own_write(&body) {
            continue;
        }
        let text = prepare_markdown_content(
            ctx.store,
            &body,
            Platform::Github,
            TransformOptions::default(),
        );
        if let Err(error) = ctx
            .shortcut
            .create_comment(link.shortcut_story_id, &text, Some(&comment.id.to_string()))
            .await
        {
            tracing::warn!(%error, comment = comment.id, "comment history replay failed");
        }
    }
}

async fn assignee_changed(
    ctx: &EventContext<'_>,
    body: &GithubWebhookBody,
    action: &str,
) -> SyncResult<SyncOutcome> {
    let issue = required_issue(body)?;
    let Some(link) = ctx.find_link(issue.number)? else {
        return Ok(SyncOutcome::skipped(skip_reason(
            "assignee",
            format!("#{}", issue.number),
            false,
        )));
    };

    // Current destination owner, to suppress redundant echo-triggering
    // writes.
    let story = ctx
        .shortcut
        .get_story(link.shortcut_story_id)
        .await
        .map_err(SyncError::from)?;
    let current_owner = story.owner_ids.first().cloned();

    let map_github_user = |github_user_id: i64| -> SyncResult<Option<String>> {
        Ok(ctx
            .store
            .find_user_link_by_github_id(github_user_id)
            .context("user link lookup failed")?
            .map(|user| user.shortcut_user_id))
    };

    let new_owner = if action == "unassigned" {
        // Whoever remains assigned on the issue, if anyone.
        match issue.assignee.as_ref() {
            Some(assignee) => map_github_user(assignee.id)?,
            None => None,
        }
    } else {
        let Some(assignee) = body.assignee.as_ref().or(issue.assignee.as_ref()) else {
            return Ok(SyncOutcome::skipped(format!(
                "Skipping assignee for issue #{}: event carries no assignee.",
                issue.number
            )));
        };
        let Some(mapped) = map_github_user(assignee.id)? else {
            return Ok(SyncOutcome::skipped(format!(
                "Skipping assignee for issue #{}: no Shortcut user found for {}.",
                issue.number, assignee.login
            )));
        };
        Some(mapped)
    };

    if current_owner == new_owner {
        return Ok(SyncOutcome::skipped(format!(
            "Assignee already up to date on story {}.",
            link.shortcut_story_id
        )));
    }

    ctx.shortcut
        .update_story(
            link.shortcut_story_id,
            &StoryPatch {
                owner_ids: Some(new_owner.clone().into_iter().collect()),
                ..Default::default()
            },
        )
        .await
        .map_err(|_| {
            SyncError::api(
                format!(
                    "Failed to update assignee on story {} for issue #{} (repo: {}).",
                    link.shortcut_story_id,
                    issue.number,
                    ctx.repo_id()
                ),
                500,
            )
        })?;

    let verb = if new_owner.is_some() { "Assigned" } else { "Removed assignee from" };
    Ok(SyncOutcome::applied(format!(
        "{verb} story {} for issue #{}.",
        link.shortcut_story_id, issue.number
    )))
}

async fn milestone_changed(
    ctx: &EventContext<'_>,
    body: &GithubWebhookBody,
    action: &str,
) -> SyncResult<SyncOutcome> {
    let issue = required_issue(body)?;

    let (link, mut messages) = match ctx.find_link(issue.number)? {
        Some(link) => (link, Vec::new()),
        None => {
            if action == "demilestoned" {
                return Ok(SyncOutcome::skipped(format!(
                    "Skipping milestone removal for issue #{}: not synced (repo: {}).",
                    issue.number,
                    ctx.repo_id()
                )));
            }
            // A milestoned issue that was never mirrored gets mirrored now,
            // history included, then the milestone is attached.
            match create_story(ctx, body, true).await? {
                Creation::Created(link, message) => (link, vec![message]),
                Creation::Skipped(reason) => return Ok(SyncOutcome::skipped(reason)),
            }
        }
    };

    if action == "demilestoned" {
        ctx.shortcut
            .update_story(
                link.shortcut_story_id,
                &StoryPatch {
                    epic_id: Some(None),
                    iteration_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .map_err(SyncError::from)?;
        return Ok(SyncOutcome::applied(format!(
            "Cleared epic/iteration for story {}.",
            link.shortcut_story_id
        )));
    }

    let Some(milestone) = issue.milestone.as_ref().or(body.milestone.as_ref()) else {
        return Ok(SyncOutcome::skipped(format!(
            "Skipping over removal of milestone for issue #{}.",
            issue.number
        )));
    };

    let Some(milestone_link) = mapper::ensure_shortcut_resource(
        ctx.store,
        &ctx.shortcut,
        milestone,
        ctx.repo_id(),
        &ctx.config.shortcut_team_id,
    )
    .await?
    else {
        return Ok(SyncOutcome::skipped(format!(
            "Skipping over milestone \"{}\" because it is caused by sync.",
            milestone.title
        )));
    };

    let is_epic = milestone
        .description
        .as_deref()
        .unwrap_or("")
        .contains("(Epic)");
    let patch = if is_epic {
        StoryPatch {
            epic_id: Some(Some(milestone_link.shortcut_resource_id)),
            ..Default::default()
        }
    } else {
        StoryPatch {
            iteration_id: Some(Some(milestone_link.shortcut_resource_id)),
            ..Default::default()
        }
    };
    ctx.shortcut
        .update_story(link.shortcut_story_id, &patch)
        .await
        .map_err(|_| {
            SyncError::api(
                format!(
                    "Failed to add story {} to epic/iteration.",
                    link.shortcut_story_id
                ),
                500,
            )
        })?;

    messages.push(format!(
        "Added story {} to {}.",
        link.shortcut_story_id,
        if is_epic { "epic" } else { "iteration" }
    ));
    Ok(SyncOutcome::applied(messages.join(" ")))
}

async fn label_changed(
    ctx: &EventContext<'_>,
    body: &GithubWebhookBody,
    action: &str,
) -> SyncResult<SyncOutcome> {
    let issue = required_issue(body)?;
    let label = body
        .label
        .as_ref()
        .ok_or_else(|| SyncError::NotFound("Label event carries no label.".to_string()))?;

    let Some(link) = ctx.find_link(issue.number)? else {
        return Ok(SyncOutcome::skipped(skip_reason(
            "label",
            format!("#{}", issue.number),
            false,
        )));
    };

    // Priority labels map to the story's priority field, not to a label.
    if let Some(value) = labels::priority_value_for(&label.name) {
        let priority = if action == "unlabeled" {
            Some(None)
        } else {
            Some(Some(value))
        };
        ctx.shortcut
            .update_story(
                link.shortcut_story_id,
                &StoryPatch {
                    priority,
                    ..Default::default()
                },
            )
            .await
            .map_err(SyncError::from)?;
        let verb = if action == "unlabeled" { "Cleared" } else { "Set" };
        return Ok(SyncOutcome::applied(format!(
            "{verb} priority on story {} for issue #{}.",
            link.shortcut_story_id, issue.number
        )));
    }

    let wanted = mapper::normalize_label_name(&label.name);
    let shortcut_label = ctx
        .shortcut
        .list_labels()
        .await
        .map_err(SyncError::from)?
        .into_iter()
        .find(|candidate| mapper::normalize_label_name(&candidate.name) == wanted);
    let Some(shortcut_label) = shortcut_label else {
        return Ok(SyncOutcome::skipped(format!(
            "Skipping label \"{}\" for story {} as no Shortcut label was found (repo: {}).",
            label.name,
            link.shortcut_story_id,
            ctx.repo_id()
        )));
    };

    let story = ctx
        .shortcut
        .get_story(link.shortcut_story_id)
        .await
        .map_err(SyncError::from)?;
    let mut label_ids: Vec<i64> = story
        .labels
        .iter()
        .map(|current| current.id)
        .filter(|id| *id != shortcut_label.id)
        .collect();
    if action == "labeled" {
        label_ids.push(shortcut_label.id);
    }

    ctx.shortcut
        .update_story(
            link.shortcut_story_id,
            &StoryPatch {
                label_ids: Some(label_ids),
                ..Default::default()
            },
        )
        .await
        .map_err(|_| {
            SyncError::api(
                format!(
                    "Failed to update label \"{}\" on story {} (repo: {}).",
                    label.name,
                    link.shortcut_story_id,
                    ctx.repo_id()
                ),
                500,
            )
        })?;

    let verb = if action == "labeled" { "Added" } else { "Removed" };
    Ok(SyncOutcome::applied(format!(
        "{verb} label \"{}\" on story {} (repo: {}).",
        label.name,
        link.shortcut_story_id,
        ctx.repo_id()
    )))
}
