//! Shortcut → GitHub event handler.
//!
//! Mirror image of the GitHub-side handler with the asymmetries of the
//! Shortcut webhook model: origin verification is by allow-listed source
//! IP, sync resolution matches (team reference, member id) against all
//! known configurations, and update events arrive as a map of
//! changed-field → {old, new} whose present keys are applied independently.

use anyhow::Context as _;
use serde_json::Value;
use tether_content::{prepare_markdown_content, upsert_user, TransformOptions};
use tether_core::{
    labels, markers, skip_reason, Platform, SyncError, SyncOutcome, SyncResult,
};
use tether_github::{GithubClient, IssuePatch, NewIssue};
use tether_shortcut::{AttachmentRequest, ShortcutClient, ShortcutLabel, ShortcutStory};
use tether_store::{StoreError, SyncConfig, SyncLink, SyncStore};

use crate::engine::SyncEngine;
use crate::mapper::{self, ShortcutResource};
use crate::shortcut_events::{FieldChange, ShortcutEvent, ShortcutWebhookBody};

struct EventContext<'a> {
    store: &'a SyncStore,
    config: &'a SyncConfig,
    github: GithubClient,
    shortcut: ShortcutClient,
}

pub(crate) async fn handle(
    engine: &SyncEngine,
    raw_body: &[u8],
    origin_ip: Option<&str>,
) -> SyncResult<SyncOutcome> {
    let ip = origin_ip.unwrap_or("").trim();
    if !engine
        .config
        .shortcut_allowed_ips
        .iter()
        .any(|allowed| allowed == ip)
    {
        return Err(SyncError::Authentication(format!(
            "Could not verify Shortcut webhook from {ip}."
        )));
    }

    let body: ShortcutWebhookBody =
        serde_json::from_slice(raw_body).context("invalid shortcut webhook payload")?;

    let action = body.action.clone().unwrap_or_default();
    let model = body.model.clone().unwrap_or_default();
    let event = ShortcutEvent::classify(&action, &model);
    if let ShortcutEvent::Unsupported { action, model } = &event {
        return Ok(SyncOutcome::skipped(format!(
            "Unhandled shortcut event {action}/{model}."
        )));
    }

    let member_id = body.member_id.clone().unwrap_or_default();
    let team_reference = body.team_reference().map(ToString::to_string);
    let store = engine.store();
    let configs = store.list_configs().context("sync config scan failed")?;
    let config = configs.iter().find(|candidate| {
        Some(candidate.shortcut_team_id.as_str()) == team_reference.as_deref()
            && candidate.shortcut_user_id == member_id
    });
    let Some(config) = config else {
        return Ok(SyncOutcome::skipped(format!(
            "Shortcut user {member_id} not found in syncs."
        )));
    };

    let (github, shortcut) = engine.build_clients(config, false)?;

    let Some(story_id) = body.story_id() else {
        return Ok(SyncOutcome::skipped(
            "Event carries no story reference.".to_string(),
        ));
    };
    let story = shortcut.get_story(story_id).await.map_err(|error| {
        if error.is_not_found() {
            SyncError::NotFound(format!("Could not find Shortcut story {story_id}."))
        } else {
            SyncError::from(error)
        }
    })?;

    let ctx = EventContext {
        store,
        config,
        github,
        shortcut,
    };

    if let Err(error) = upsert_user(
        ctx.store,
        &ctx.github,
        &ctx.shortcut,
        config.github_user_id,
        &member_id,
    )
    .await
    {
        tracing::warn!(%error, member = %member_id, "user link upsert failed");
    }

    let short_name = story
        .short_name()
        .unwrap_or_else(|| format!("SC-{}", story.id));
    let link = store
        .find_sync_link_by_story(story.id)
        .context("sync link lookup failed")?;

    match event {
        ShortcutEvent::CommentCreated => {
            comment_created(&ctx, &body, &story, link.as_ref(), &short_name).await
        }
        ShortcutEvent::StoryCreated => {
            story_created(&ctx, &story, link.as_ref(), &short_name).await
        }
        ShortcutEvent::StoryUpdated => {
            story_updated(&ctx, &body, &story, link.as_ref(), &short_name).await
        }
        ShortcutEvent::Unsupported { .. } => unreachable!("filtered above"),
    }
}

async fn comment_created(
    ctx: &EventContext<'_>,
    body: &ShortcutWebhookBody,
    story: &ShortcutStory,
    link: Option<&SyncLink>,
    short_name: &str,
) -> SyncResult<SyncOutcome> {
    let Some(link) = link else {
        return Ok(SyncOutcome::skipped(skip_reason("comment", short_name, false)));
    };
    let Some(comment_id) = body.primary_id else {
        return Ok(SyncOutcome::skipped(
            "Comment event carries no comment id.".to_string(),
        ));
    };

    let comment = ctx
        .shortcut
        .get_comment(story.id, comment_id)
        .await
        .map_err(|error| {
            if error.is_not_found() {
                SyncError::NotFound(format!("Could not find comment {comment_id}."))
            } else {
                SyncError::from(error)
            }
        })?;

    if comment.external_id.is_some() {
        return Ok(SyncOutcome::skipped(skip_reason("comment", short_name, true)));
    }

    let author_name = match ctx.shortcut.get_member(&comment.author_id).await {
        Ok(member) => member.name.unwrap_or(member.mention_name),
        Err(error) => {
            tracing::warn!(%error, author = %comment.author_id, "comment author lookup failed");
            "Unknown User".to_string()
        }
    };

    let text = prepare_markdown_content(
        ctx.store,
        &comment.text,
        Platform::Shortcut,
        TransformOptions::default(),
    );
    let footer = markers::github_comment_footer(&author_name, &comment.id.to_string());
    ctx.github
        .create_comment(link.github_issue_number, &format!("{text}{footer}"))
        .await
        .map_err(SyncError::from)?;
    Ok(SyncOutcome::applied(format!(
        "Synced comment for issue #{}.",
        link.github_issue_number
    )))
}

async fn story_created(
    ctx: &EventContext<'_>,
    story: &ShortcutStory,
    link: Option<&SyncLink>,
    short_name: &str,
) -> SyncResult<SyncOutcome> {
    let carries_sync_label = story
        .labels
        .iter()
        .any(|label| label.id == ctx.config.public_label_id);
    if !carries_sync_label {
        return Ok(SyncOutcome::skipped(
            "Story is not labeled for sync.".to_string(),
        ));
    }

    if let Some(link) = link {
        return Ok(SyncOutcome::skipped(format!(
            "Skipping story create: {short_name} exists as issue #{}.",
            link.github_issue_number
        )));
    }

    let description = prepare_markdown_content(
        ctx.store,
        story.description.as_deref().unwrap_or(""),
        Platform::Shortcut,
        TransformOptions::default(),
    );
    let assignee = match story.owner_ids.first() {
        Some(owner_id) => ctx
            .store
            .find_user_link_by_shortcut_id(owner_id)
            .context("user link lookup failed")?
            .map(|user| user.github_username),
        None => None,
    };

    let issue = ctx
        .github
        .create_issue(&NewIssue {
            title: format!("[{short_name}] {}", story.name),
            body: description,
            assignee,
        })
        .await
        .map_err(|error| {
            tracing::warn!(%error, story = story.id, "issue creation failed");
            SyncError::api(format!("Failed to create issue for {}.", story.id), 500)
        })?;

    let link = SyncLink {
        github_repo_id: ctx.config.github_repo_id,
        github_issue_number: issue.number,
        github_issue_id: issue.id,
        shortcut_story_id: story.id,
        shortcut_story_number: story.number,
        shortcut_team_id: ctx.config.shortcut_team_id.clone(),
    };
    if let Err(error) = ctx.store.create_sync_link(&link) {
        return match error {
            StoreError::AlreadyLinked(key) => {
                tracing::warn!(%key, "concurrent delivery already linked this story");
                Ok(SyncOutcome::skipped(format!(
                    "Skipping story create: {short_name} is already linked."
                )))
            }
            other => Err(SyncError::Other(
                anyhow::Error::new(other).context("sync link persist failed"),
            )),
        };
    }

    let issue_url = format!(
        "https://github.com/{}/issues/{}",
        ctx.config.repo_name, issue.number
    );
    // Back-reference comment and attachment are independent best-effort
    // writes; the external id marks the comment as the engine's own.
    let comment_body = format!("Created GitHub issue: {issue_url}");
    let comment_external_id = issue.id.to_string();
    let attachment_request = AttachmentRequest {
        story_id: story.id,
        name: format!("github.com/{}/issues/{}", ctx.config.repo_name, issue.number),
        description: format!("GitHub Issue #{}", issue.number),
        url: issue_url.clone(),
    };
    let (back_reference, attachment) = tokio::join!(
        ctx.shortcut.create_comment(
            story.id,
            &comment_body,
            Some(&comment_external_id),
        ),
        ctx.shortcut.create_attachment(&attachment_request),
    );
    if let Err(error) = back_reference {
        tracing::warn!(%error, story = story.id, "back-reference comment failed");
    }
    if let Err(error) = attachment {
        tracing::warn!(%error, story = story.id, "attachment creation failed");
    }

    apply_story_labels(ctx, story, issue.number).await;

    if let Some(owner_id) = story.owner_ids.first() {
        let owner_has_sync = ctx
            .store
            .list_configs()
            .context("sync config scan failed")?
            .iter()
            .any(|candidate| candidate.shortcut_user_id == *owner_id);
        if !owner_has_sync {
            invite_owner(ctx, owner_id).await;
        }
    }

    Ok(SyncOutcome::applied(format!(
        "Created issue #{} for {short_name}.",
        issue.number
    )))
}

/// Mirror the story's labels (plus its priority, as a label) onto a
/// freshly created issue. Best-effort per label.
async fn apply_story_labels(ctx: &EventContext<'_>, story: &ShortcutStory, issue_number: i64) {
    let mut names = Vec::new();
    for label in &story.labels {
        if label.id == ctx.config.public_label_id {
            continue;
        }
        match mapper::ensure_github_label(&ctx.github, &label.name, label.color.as_deref()).await
        {
            Ok(name) => names.push(name),
            Err(error) => {
                tracing::warn!(%error, label = %label.name, "label creation failed");
            }
        }
    }

    if let Some(priority) = story.priority.filter(|value| *value > 0) {
        if let Some(priority_label) = labels::priority_label_for(priority) {
            match mapper::ensure_github_label(
                &ctx.github,
                priority_label.name,
                Some(priority_label.color),
            )
            .await
            {
                Ok(name) => names.push(name),
                Err(error) => {
                    tracing::warn!(%error, "priority label creation failed");
                }
            }
        }
    }

    if let Err(error) = ctx.github.add_labels(issue_number, &names).await {
        tracing::warn!(%error, issue = issue_number, "label application failed");
    }
}

/// Invite a story owner without a sync configuration of their own as a
/// repo collaborator, when their identity is already linked. Best-effort.
async fn invite_owner(ctx: &EventContext<'_>, owner_id: &str) {
    let user = match ctx.store.find_user_link_by_shortcut_id(owner_id) {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(error) => {
            tracing::warn!(%error, owner = owner_id, "user link lookup failed");
            return;
        }
    };
    if let Err(error) = ctx.github.invite_collaborator(&user.github_username).await {
        tracing::warn!(%error, user = user.github_username, "collaborator invite failed");
    }
}

async fn story_updated(
    ctx: &EventContext<'_>,
    body: &ShortcutWebhookBody,
    story: &ShortcutStory,
    link: Option<&SyncLink>,
    short_name: &str,
) -> SyncResult<SyncOutcome> {
    let Some(changes) = body.changes.as_ref().filter(|changes| !changes.is_empty()) else {
        return Ok(SyncOutcome::skipped(
            "Update event carries no changed fields.".to_string(),
        ));
    };
    let Some(link) = link else {
        return Ok(SyncOutcome::skipped(skip_reason("edit", short_name, false)));
    };

    let mut applied = Vec::new();

    if let Some(change) = changes.get("labels") {
        label_changes(ctx, change, link, &mut applied).await?;
    }

    if changes.contains_key("name") {
        let patch = IssuePatch {
            title: Some(format!("[{short_name}] {}", story.name)),
            ..Default::default()
        };
        match ctx.github.update_issue(link.github_issue_number, &patch).await {
            Ok(_) => applied.push(format!("Updated title on issue #{}.", link.github_issue_number)),
            Err(error) => {
                tracing::warn!(%error, issue = link.github_issue_number, "title update failed");
            }
        }
    }

    if changes.contains_key("description") {
        let text = prepare_markdown_content(
            ctx.store,
            story.description.as_deref().unwrap_or(""),
            Platform::Shortcut,
            TransformOptions::default(),
        );
        let story_url = story
            .app_url
            .clone()
            .unwrap_or_else(|| format!("https://app.shortcut.com/story/{}", story.id));
        let patch = IssuePatch {
            body: Some(format!(
                "{text}\n\n<sub>{} | [{short_name}]({story_url})</sub>",
                markers::sync_footer()
            )),
            ..Default::default()
        };
        match ctx.github.update_issue(link.github_issue_number, &patch).await {
            Ok(_) => applied.push(format!(
                "Updated description on issue #{}.",
                link.github_issue_number
            )),
            Err(error) => {
                tracing::warn!(%error, issue = link.github_issue_number, "description update failed");
            }
        }
    }

    if let Some(change) = changes.get("workflow_state_id") {
        state_change(ctx, change, link, &mut applied).await;
    }

    if let Some(change) = changes.get("owner_ids") {
        owner_change(ctx, change, link, short_name, &mut applied).await?;
    }

    let epic_change = changes.get("epic_id");
    let iteration_change = changes.get("iteration_id");
    if epic_change.is_some() || iteration_change.is_some() {
        milestone_change(
            ctx,
            epic_change,
            iteration_change,
            link,
            short_name,
            &mut applied,
        )
        .await?;
    }

    if let Some(change) = changes.get("priority") {
        priority_change(ctx, change, link, &mut applied).await?;
    }

    if let Some(change) = changes.get("estimate") {
        estimate_change(ctx, change, link, &mut applied).await?;
    }

    if applied.is_empty() {
        return Ok(SyncOutcome::skipped(format!(
            "No applicable changes for {short_name}."
        )));
    }
    Ok(SyncOutcome::applied(applied.join(" ")))
}

fn change_labels(value: &Option<Value>) -> Vec<ShortcutLabel> {
    value
        .as_ref()
        .and_then(|value| serde_json::from_value(value.clone()).ok())
        .unwrap_or_default()
}

async fn label_changes(
    ctx: &EventContext<'_>,
    change: &FieldChange,
    link: &SyncLink,
    applied: &mut Vec<String>,
) -> SyncResult<()> {
    let old_labels = change_labels(&change.old);
    let new_labels = change_labels(&change.new_value);

    for removed in old_labels
        .iter()
        .filter(|old| !new_labels.iter().any(|new| new.id == old.id))
    {
        ctx.github
            .remove_label(link.github_issue_number, &removed.name)
            .await
            .map_err(|_| {
                SyncError::api(
                    format!(
                        "Failed to remove label \"{}\" from issue #{}.",
                        removed.name, link.github_issue_number
                    ),
                    403,
                )
            })?;
        applied.push(format!(
            "Removed label \"{}\" from issue #{}.",
            removed.name, link.github_issue_number
        ));
    }

    for added in new_labels
        .iter()
        .filter(|new| !old_labels.iter().any(|old| old.id == new.id))
    {
        if added.id == ctx.config.public_label_id {
            continue;
        }
        let name =
            match mapper::ensure_github_label(&ctx.github, &added.name, added.color.as_deref())
                .await
            {
                Ok(name) => name,
                Err(error) => {
                    tracing::warn!(%error, label = %added.name, "label creation failed");
                    continue;
                }
            };
        match ctx
            .github
            .add_labels(link.github_issue_number, std::slice::from_ref(&name))
            .await
        {
            Ok(()) => applied.push(format!(
                "Applied label \"{name}\" to issue #{}.",
                link.github_issue_number
            )),
            Err(error) => {
                tracing::warn!(%error, label = %name, "label application failed");
            }
        }
    }
    Ok(())
}

async fn state_change(
    ctx: &EventContext<'_>,
    change: &FieldChange,
    link: &SyncLink,
    applied: &mut Vec<String>,
) {
    let Some(new_state_id) = change.new_value.as_ref().and_then(Value::as_i64) else {
        return;
    };
    let patch = if new_state_id == ctx.config.archived_state_id {
        IssuePatch {
            state: Some("closed".to_string()),
            state_reason: Some("not_planned".to_string()),
            ..Default::default()
        }
    } else if new_state_id == ctx.config.done_state_id {
        IssuePatch {
            state: Some("closed".to_string()),
            state_reason: Some("completed".to_string()),
            ..Default::default()
        }
    } else {
        IssuePatch {
            state: Some("open".to_string()),
            ..Default::default()
        }
    };
    match ctx.github.update_issue(link.github_issue_number, &patch).await {
        Ok(_) => applied.push(format!(
            "Updated state on issue #{}.",
            link.github_issue_number
        )),
        Err(error) => {
            tracing::warn!(%error, issue = link.github_issue_number, "state update failed");
        }
    }
}

async fn owner_change(
    ctx: &EventContext<'_>,
    change: &FieldChange,
    link: &SyncLink,
    short_name: &str,
    applied: &mut Vec<String>,
) -> SyncResult<()> {
    // Current assignees are needed to avoid false re-assignment echoes.
    let issue = ctx
        .github
        .get_issue(link.github_issue_number)
        .await
        .map_err(SyncError::from)?;
    let previous: Vec<String> = issue
        .assignees
        .iter()
        .map(|assignee| assignee.login.clone())
        .collect();

    let new_owner_id = change
        .new_value
        .as_ref()
        .and_then(Value::as_array)
        .and_then(|owners| owners.first())
        .and_then(Value::as_str)
        .map(ToString::to_string);

    let Some(new_owner_id) = new_owner_id else {
        if !previous.is_empty() {
            ctx.github
                .remove_assignees(link.github_issue_number, &previous)
                .await
                .map_err(SyncError::from)?;
            applied.push(format!(
                "Removed assignees from issue #{}.",
                link.github_issue_number
            ));
        }
        return Ok(());
    };

    let mapped = ctx
        .store
        .find_user_link_by_shortcut_id(&new_owner_id)
        .context("user link lookup failed")?
        .map(|user| user.github_username);
    let Some(login) = mapped else {
        tracing::info!(
            owner = %new_owner_id,
            "skipping assign for {short_name}: no GitHub user found"
        );
        return Ok(());
    };

    if previous.contains(&login) {
        tracing::info!(%login, "skipping assign for {short_name}: already assigned");
        return Ok(());
    }

    if let Err(error) = ctx
        .github
        .add_assignees(link.github_issue_number, std::slice::from_ref(&login))
        .await
    {
        tracing::warn!(%error, issue = link.github_issue_number, "assignee add failed");
        return Ok(());
    }
    applied.push(format!(
        "Added assignee to issue #{}.",
        link.github_issue_number
    ));

    let stale: Vec<String> = previous.into_iter().filter(|prev| prev != &login).collect();
    if !stale.is_empty() {
        if let Err(error) = ctx
            .github
            .remove_assignees(link.github_issue_number, &stale)
            .await
        {
            tracing::warn!(%error, issue = link.github_issue_number, "assignee removal failed");
        } else {
            applied.push(format!(
                "Removed stale assignees from issue #{}.",
                link.github_issue_number
            ));
        }
    }
    Ok(())
}

async fn milestone_change(
    ctx: &EventContext<'_>,
    epic_change: Option<&FieldChange>,
    iteration_change: Option<&FieldChange>,
    link: &SyncLink,
    short_name: &str,
    applied: &mut Vec<String>,
) -> SyncResult<()> {
    let is_iteration = iteration_change.is_some();
    let Some(change) = iteration_change.or(epic_change) else {
        return Ok(());
    };
    let resource_id = change.new_value.as_ref().and_then(Value::as_i64);

    let Some(resource_id) = resource_id else {
        ctx.github
            .set_issue_milestone(link.github_issue_number, None)
            .await
            .map_err(|_| {
                SyncError::api(
                    format!(
                        "Failed to remove milestone for issue #{} ({short_name}).",
                        link.github_issue_number
                    ),
                    500,
                )
            })?;
        applied.push(format!("Removed milestone for {short_name}."));
        return Ok(());
    };

    let resource = if is_iteration {
        ShortcutResource::Iteration(ctx.shortcut.get_iteration(resource_id).await.map_err(
            |error| {
                if error.is_not_found() {
                    SyncError::NotFound(format!(
                        "Could not find iteration {resource_id} for {short_name}."
                    ))
                } else {
                    SyncError::from(error)
                }
            },
        )?)
    } else {
        ShortcutResource::Epic(ctx.shortcut.get_epic(resource_id).await.map_err(|error| {
            if error.is_not_found() {
                SyncError::NotFound(format!(
                    "Could not find epic {resource_id} for {short_name}."
                ))
            } else {
                SyncError::from(error)
            }
        })?)
    };

    let Some(milestone_link) = mapper::ensure_github_milestone(
        ctx.store,
        &ctx.github,
        &resource,
        ctx.config.github_repo_id,
        &ctx.config.shortcut_team_id,
    )
    .await?
    else {
        applied.push(format!(
            "Skipped epic/iteration for {short_name}: caused by sync."
        ));
        return Ok(());
    };

    ctx.github
        .set_issue_milestone(
            link.github_issue_number,
            Some(milestone_link.github_milestone_number),
        )
        .await
        .map_err(|_| {
            SyncError::api(
                format!(
                    "Failed to add milestone for issue #{} ({short_name}).",
                    link.github_issue_number
                ),
                500,
            )
        })?;
    applied.push(format!("Added milestone to issue #{}.", link.github_issue_number));
    Ok(())
}

async fn priority_change(
    ctx: &EventContext<'_>,
    change: &FieldChange,
    link: &SyncLink,
    applied: &mut Vec<String>,
) -> SyncResult<()> {
    let old_value = change.old.as_ref().and_then(Value::as_u64).unwrap_or(0) as u8;
    let new_value = change
        .new_value
        .as_ref()
        .and_then(Value::as_u64)
        .unwrap_or(0) as u8;

    let (Some(old_label), Some(new_label)) = (
        labels::priority_label_for(old_value),
        labels::priority_label_for(new_value),
    ) else {
        return Err(SyncError::api(
            format!("Could not find a priority label for {old_value} or {new_value}."),
            403,
        ));
    };

    match ctx
        .github
        .remove_label(link.github_issue_number, old_label.name)
        .await
    {
        Ok(_) => {}
        Err(error) => {
            tracing::warn!(%error, issue = link.github_issue_number, "priority label removal failed");
        }
    }

    if new_value == 0 {
        applied.push(format!(
            "Removed priority label \"{}\" from issue #{}.",
            old_label.name, link.github_issue_number
        ));
        return Ok(());
    }

    let name = mapper::ensure_github_label(&ctx.github, new_label.name, Some(new_label.color))
        .await
        .map_err(|_| SyncError::api("Could not create priority label.", 403))?;
    ctx.github
        .add_labels(link.github_issue_number, std::slice::from_ref(&name))
        .await
        .map_err(|_| {
            SyncError::api(
                format!(
                    "Failed to apply priority label \"{name}\" to issue #{}.",
                    link.github_issue_number
                ),
                403,
            )
        })?;
    applied.push(format!(
        "Applied priority label \"{name}\" to issue #{}.",
        link.github_issue_number
    ));
    Ok(())
}

async fn estimate_change(
    ctx: &EventContext<'_>,
    change: &FieldChange,
    link: &SyncLink,
    applied: &mut Vec<String>,
) -> SyncResult<()> {
    // The previous estimate label comes off before the new one goes on.
    if let Some(old_points) = change.old.as_ref().and_then(Value::as_i64) {
        let old_name = labels::estimate_label_name(old_points);
        match ctx
            .github
            .remove_label(link.github_issue_number, &old_name)
            .await
        {
            Ok(_) => {}
            Err(error) => {
                tracing::warn!(%error, issue = link.github_issue_number, "estimate label removal failed");
            }
        }
        applied.push(format!(
            "Removed estimate label \"{old_name}\" from issue #{}.",
            link.github_issue_number
        ));
    }

    let Some(new_points) = change
        .new_value
        .as_ref()
        .and_then(Value::as_i64)
        .filter(|points| *points > 0)
    else {
        return Ok(());
    };

    let name = labels::estimate_label_name(new_points);
    let name = mapper::ensure_github_label(
        &ctx.github,
        &name,
        Some(tether_core::ESTIMATE_LABEL_COLOR),
    )
    .await
    .map_err(|_| {
        SyncError::api(
            format!(
                "Could not create estimate label \"{name}\" for issue #{}.",
                link.github_issue_number
            ),
            403,
        )
    })?;
    ctx.github
        .add_labels(link.github_issue_number, std::slice::from_ref(&name))
        .await
        .map_err(|_| {
            SyncError::api(
                format!(
                    "Could not apply estimate label \"{name}\" to issue #{}.",
                    link.github_issue_number
                ),
                403,
            )
        })?;
    applied.push(format!(
        "Applied estimate label \"{name}\" to issue #{}.",
        link.github_issue_number
    ));
    Ok(())
}
