//! Label and milestone mapping: ensure the destination counterpart of a
//! source label/milestone/epic/iteration exists and return its reference.
//!
//! All ensure operations are idempotent under concurrent duplicate
//! deliveries: destination "already exists" rejections are success, and the
//! milestone link table's unique key resolves create races by re-reading.

use anyhow::Context as _;
use chrono::{DateTime, NaiveDate, Utc};
use tether_core::{markers, SyncError, SyncResult};
use tether_github::{Created as GithubCreated, GithubClient, GithubMilestone};
use tether_shortcut::{
    Created as ShortcutCreated, ShortcutApiError, ShortcutClient, ShortcutEpic, ShortcutIteration,
    ShortcutLabel,
};
use tether_store::{MilestoneLink, SyncStore};

const DEFAULT_LABEL_COLOR: &str = "ededed";
const EPIC_MARKER: &str = "(Epic)";

/// A Shortcut epic or iteration, the two milestone-shaped groupings.
#[derive(Debug, Clone)]
pub enum ShortcutResource {
    Epic(ShortcutEpic),
    Iteration(ShortcutIteration),
}

impl ShortcutResource {
    pub fn id(&self) -> i64 {
        match self {
            Self::Epic(epic) => epic.id,
            Self::Iteration(iteration) => iteration.id,
        }
    }

    fn description(&self) -> &str {
        match self {
            Self::Epic(epic) => epic.description.as_deref().unwrap_or(""),
            Self::Iteration(iteration) => iteration.description.as_deref().unwrap_or(""),
        }
    }

    fn end_date(&self) -> Option<&str> {
        match self {
            Self::Epic(epic) => epic.target_date.as_deref(),
            Self::Iteration(iteration) => iteration.end_date.as_deref(),
        }
    }

    /// Milestone title: epics use their name, iterations get a `v.`
    /// version-style title when unnamed or numerically named.
    fn milestone_title(&self) -> String {
        match self {
            Self::Epic(epic) => {
                if epic.name.trim().is_empty() {
                    "?".to_string()
                } else {
                    epic.name.clone()
                }
            }
            Self::Iteration(iteration) => {
                let name = iteration.name.trim();
                if name.is_empty() {
                    format!("v.{}", iteration.id)
                } else if name.parse::<f64>().is_ok() {
                    format!("v.{name}")
                } else {
                    name.to_string()
                }
            }
        }
    }

    fn is_epic(&self) -> bool {
        matches!(self, Self::Epic(_))
    }
}

pub fn normalize_label_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Find-or-create a Shortcut label by normalized name. Returns `None` only
/// when the label cannot be resolved even after a duplicate-create.
pub async fn ensure_shortcut_label(
    client: &ShortcutClient,
    name: &str,
    color: Option<&str>,
) -> Result<Option<ShortcutLabel>, ShortcutApiError> {
    let wanted = normalize_label_name(name);
    if let Some(label) = find_shortcut_label(client, &wanted).await? {
        return Ok(Some(label));
    }
    let color = color.unwrap_or(DEFAULT_LABEL_COLOR);
    match client.create_label(name.trim(), color).await? {
        ShortcutCreated::New(label) => Ok(Some(label)),
        // Lost a create race; whoever won owns the reference now.
        ShortcutCreated::AlreadyExists => find_shortcut_label(client, &wanted).await,
    }
}

async fn find_shortcut_label(
    client: &ShortcutClient,
    normalized: &str,
) -> Result<Option<ShortcutLabel>, ShortcutApiError> {
    let labels = client.list_labels().await?;
    Ok(labels
        .into_iter()
        .find(|label| normalize_label_name(&label.name) == normalized))
}

/// Create-if-absent for a GitHub repo label; labels are keyed by name on
/// GitHub, so the canonical reference is the trimmed name itself.
pub async fn ensure_github_label(
    client: &GithubClient,
    name: &str,
    color: Option<&str>,
) -> Result<String, tether_github::GithubApiError> {
    let trimmed = name.trim();
    let color = color
        .map(|value| value.trim_start_matches('#').to_string())
        .unwrap_or_else(|| DEFAULT_LABEL_COLOR.to_string());
    client.create_label(trimmed, &color).await?;
    Ok(trimmed.to_string())
}

/// Ensure a GitHub milestone has a Shortcut epic/iteration counterpart and
/// a persisted link. `None` means the milestone is an echo of the engine's
/// own creation and must be skipped.
pub async fn ensure_shortcut_resource(
    store: &SyncStore,
    shortcut: &ShortcutClient,
    milestone: &GithubMilestone,
    github_repo_id: i64,
    shortcut_team_id: &str,
) -> SyncResult<Option<MilestoneLink>> {
    if let Some(link) = store
        .find_milestone_link(milestone.number, github_repo_id)
        .context("milestone link lookup failed")?
    {
        return Ok(Some(link));
    }

    let origin_description = milestone.description.as_deref().unwrap_or("");
    if markers::looks_like_own_write(origin_description) {
        return Ok(None);
    }

    let is_epic = origin_description.contains(EPIC_MARKER);
    let description = format!("{origin_description}\n\n> {}", markers::sync_footer());
    let resource_id = if is_epic {
        shortcut
            .create_epic(
                &milestone.title,
                &description,
                shortcut_team_id,
                milestone.due_on.as_deref(),
            )
            .await
            .map_err(SyncError::from)?
            .id
    } else {
        let today = Utc::now().date_naive().to_string();
        shortcut
            .create_iteration(
                &milestone.title,
                &description,
                shortcut_team_id,
                &today,
                milestone.due_on.as_deref(),
            )
            .await
            .map_err(SyncError::from)?
            .id
    };

    let link = MilestoneLink {
        github_milestone_number: milestone.number,
        github_repo_id,
        shortcut_resource_id: resource_id,
        shortcut_team_id: shortcut_team_id.to_string(),
    };
    persist_milestone_link(store, link, || {
        store.find_milestone_link(milestone.number, github_repo_id)
    })
    .map(Some)
}

/// Ensure a Shortcut epic/iteration has a GitHub milestone counterpart and
/// a persisted link. `None` means the resource is an echo of the engine's
/// own creation.
pub async fn ensure_github_milestone(
    store: &SyncStore,
    github: &GithubClient,
    resource: &ShortcutResource,
    github_repo_id: i64,
    shortcut_team_id: &str,
) -> SyncResult<Option<MilestoneLink>> {
    if let Some(link) = store
        .find_milestone_link_by_resource(resource.id(), shortcut_team_id)
        .context("milestone link lookup failed")?
    {
        return Ok(Some(link));
    }

    if markers::looks_like_own_write(resource.description()) {
        return Ok(None);
    }

    let title = resource.milestone_title();
    let end_date = resource.end_date();
    let state = match end_date.and_then(parse_date) {
        Some(date) if date > Utc::now().date_naive() => "open",
        Some(_) => "closed",
        None => "open",
    };
    let epic_marker = if resource.is_epic() {
        format!(" {EPIC_MARKER}")
    } else {
        String::new()
    };
    let description = format!(
        "{}{epic_marker}\n\n> {}",
        resource.description(),
        markers::sync_footer()
    );

    let milestone_number = match github
        .create_milestone(&title, &description, state, end_date)
        .await
        .map_err(SyncError::from)?
    {
        GithubCreated::New(milestone) => milestone.number,
        GithubCreated::AlreadyExists => github
            .list_milestones()
            .await
            .map_err(SyncError::from)?
            .into_iter()
            .find(|milestone| milestone.title == title)
            .map(|milestone| milestone.number)
            .ok_or_else(|| {
                SyncError::api(
                    format!("milestone \"{title}\" exists but could not be resolved"),
                    500,
                )
            })?,
    };

    let link = MilestoneLink {
        github_milestone_number: milestone_number,
        github_repo_id,
        shortcut_resource_id: resource.id(),
        shortcut_team_id: shortcut_team_id.to_string(),
    };
    persist_milestone_link(store, link, || {
        store.find_milestone_link_by_resource(resource.id(), shortcut_team_id)
    })
    .map(Some)
}

/// Persist a milestone link, resolving a lost create race by re-reading
/// the winner's row.
fn persist_milestone_link(
    store: &SyncStore,
    link: MilestoneLink,
    reread: impl Fn() -> Result<Option<MilestoneLink>, tether_store::StoreError>,
) -> SyncResult<MilestoneLink> {
    match store.create_milestone_link(&link) {
        Ok(()) => Ok(link),
        Err(tether_store::StoreError::AlreadyLinked(_)) => Ok(reread()
            .context("milestone link re-read failed")?
            .unwrap_or(link)),
        Err(error) => Err(SyncError::Other(
            anyhow::Error::new(error).context("milestone link persist failed"),
        )),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|stamp| stamp.date_naive())
}
