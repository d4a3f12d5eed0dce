//! SQLite-backed store with durable link tables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::{MilestoneLink, StoreError, StoreResult, SyncConfig, SyncLink, UserLink};

/// Persistent store. Each operation opens its own short-lived connection;
/// WAL mode plus a busy timeout makes concurrent webhook deliveries safe
/// without in-process locking.
#[derive(Debug, Clone)]
pub struct SyncStore {
    db_path: PathBuf,
}

impl SyncStore {
    /// Open (or create) the store at `path`, creating schema if needed.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path };
        let connection = store.open_connection()?;
        initialize_schema(&connection)?;
        Ok(store)
    }

    fn open_connection(&self) -> StoreResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    pub fn insert_config(&self, config: &SyncConfig) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO sync_configs (
                github_repo_id, github_user_id, shortcut_user_id, shortcut_team_id,
                repo_name, webhook_secret,
                shortcut_api_key, shortcut_api_key_nonce,
                github_api_key, github_api_key_nonce,
                public_label_id, started_state_id, done_state_id, archived_state_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                config.github_repo_id,
                config.github_user_id,
                config.shortcut_user_id,
                config.shortcut_team_id,
                config.repo_name,
                config.webhook_secret,
                config.shortcut_api_key,
                config.shortcut_api_key_nonce,
                config.github_api_key,
                config.github_api_key_nonce,
                config.public_label_id,
                config.started_state_id,
                config.done_state_id,
                config.archived_state_id,
            ],
        )?;
        Ok(())
    }

    /// Config for a (repo, sender) pair, the normal resolution path.
    pub fn find_config(
        &self,
        github_repo_id: i64,
        github_user_id: i64,
    ) -> StoreResult<Option<SyncConfig>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!(
                    "{SELECT_CONFIG} WHERE github_repo_id = ?1 AND github_user_id = ?2"
                ),
                params![github_repo_id, github_user_id],
                config_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Any config for a repo, the anonymous-mode fallback.
    pub fn find_config_for_repo(&self, github_repo_id: i64) -> StoreResult<Option<SyncConfig>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("{SELECT_CONFIG} WHERE github_repo_id = ?1 LIMIT 1"),
                params![github_repo_id],
                config_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All configs, for the Shortcut-side (team reference, member id) scan.
    pub fn list_configs(&self) -> StoreResult<Vec<SyncConfig>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(SELECT_CONFIG)?;
        let rows = statement
            .query_map([], config_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert a new sync link. A second insert for the same
    /// `(repo, issue number)` key returns [`StoreError::AlreadyLinked`].
    pub fn create_sync_link(&self, link: &SyncLink) -> StoreResult<()> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;
        let exists = transaction
            .query_row(
                "SELECT 1 FROM sync_links WHERE github_repo_id = ?1 AND github_issue_number = ?2",
                params![link.github_repo_id, link.github_issue_number],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::AlreadyLinked(format!(
                "issue #{} (repo: {})",
                link.github_issue_number, link.github_repo_id
            )));
        }
        transaction.execute(
            r#"
            INSERT INTO sync_links (
                github_repo_id, github_issue_number, github_issue_id,
                shortcut_story_id, shortcut_story_number, shortcut_team_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                link.github_repo_id,
                link.github_issue_number,
                link.github_issue_id,
                link.shortcut_story_id,
                link.shortcut_story_number,
                link.shortcut_team_id,
            ],
        )?;
        transaction.commit()?;
        Ok(())
    }

    pub fn find_sync_link(
        &self,
        github_repo_id: i64,
        github_issue_number: i64,
    ) -> StoreResult<Option<SyncLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!(
                    "{SELECT_SYNC_LINK} WHERE github_repo_id = ?1 AND github_issue_number = ?2"
                ),
                params![github_repo_id, github_issue_number],
                sync_link_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_sync_link_by_story(&self, shortcut_story_id: i64) -> StoreResult<Option<SyncLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("{SELECT_SYNC_LINK} WHERE shortcut_story_id = ?1"),
                params![shortcut_story_id],
                sync_link_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Insert a new milestone link; duplicate keys surface as
    /// [`StoreError::AlreadyLinked`].
    pub fn create_milestone_link(&self, link: &MilestoneLink) -> StoreResult<()> {
        let mut connection = self.open_connection()?;
        let transaction = connection.transaction()?;
        let exists = transaction
            .query_row(
                "SELECT 1 FROM milestone_links WHERE github_milestone_number = ?1 AND github_repo_id = ?2",
                params![link.github_milestone_number, link.github_repo_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::AlreadyLinked(format!(
                "milestone {} (repo: {})",
                link.github_milestone_number, link.github_repo_id
            )));
        }
        transaction.execute(
            r#"
            INSERT INTO milestone_links (
                github_milestone_number, github_repo_id, shortcut_resource_id, shortcut_team_id
            ) VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                link.github_milestone_number,
                link.github_repo_id,
                link.shortcut_resource_id,
                link.shortcut_team_id,
            ],
        )?;
        transaction.commit()?;
        Ok(())
    }

    pub fn find_milestone_link(
        &self,
        github_milestone_number: i64,
        github_repo_id: i64,
    ) -> StoreResult<Option<MilestoneLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!(
                    "{SELECT_MILESTONE_LINK} WHERE github_milestone_number = ?1 AND github_repo_id = ?2"
                ),
                params![github_milestone_number, github_repo_id],
                milestone_link_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_milestone_link_by_resource(
        &self,
        shortcut_resource_id: i64,
        shortcut_team_id: &str,
    ) -> StoreResult<Option<MilestoneLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!(
                    "{SELECT_MILESTONE_LINK} WHERE shortcut_resource_id = ?1 AND shortcut_team_id = ?2"
                ),
                params![shortcut_resource_id, shortcut_team_id],
                milestone_link_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Sole write path for user links; refreshes cached handles in place.
    pub fn upsert_user_link(&self, link: &UserLink) -> StoreResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            r#"
            INSERT INTO user_links (
                github_user_id, shortcut_user_id, github_username, shortcut_username
            ) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(github_user_id, shortcut_user_id) DO UPDATE SET
                github_username = excluded.github_username,
                shortcut_username = excluded.shortcut_username
            "#,
            params![
                link.github_user_id,
                link.shortcut_user_id,
                link.github_username,
                link.shortcut_username,
            ],
        )?;
        Ok(())
    }

    pub fn find_user_link(
        &self,
        github_user_id: i64,
        shortcut_user_id: &str,
    ) -> StoreResult<Option<UserLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!(
                    "{SELECT_USER_LINK} WHERE github_user_id = ?1 AND shortcut_user_id = ?2"
                ),
                params![github_user_id, shortcut_user_id],
                user_link_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_user_link_by_github_id(
        &self,
        github_user_id: i64,
    ) -> StoreResult<Option<UserLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("{SELECT_USER_LINK} WHERE github_user_id = ?1"),
                params![github_user_id],
                user_link_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_user_link_by_shortcut_id(
        &self,
        shortcut_user_id: &str,
    ) -> StoreResult<Option<UserLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!("{SELECT_USER_LINK} WHERE shortcut_user_id = ?1"),
                params![shortcut_user_id],
                user_link_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Lookup by display handle on either platform, for mention rewriting.
    pub fn find_user_link_by_handle(&self, handle: &str) -> StoreResult<Option<UserLink>> {
        let connection = self.open_connection()?;
        let row = connection
            .query_row(
                &format!(
                    "{SELECT_USER_LINK} WHERE github_username = ?1 OR shortcut_username = ?1"
                ),
                params![handle],
                user_link_from_row,
            )
            .optional()?;
        Ok(row)
    }
}

const SELECT_CONFIG: &str = r#"
    SELECT github_repo_id, github_user_id, shortcut_user_id, shortcut_team_id,
           repo_name, webhook_secret,
           shortcut_api_key, shortcut_api_key_nonce,
           github_api_key, github_api_key_nonce,
           public_label_id, started_state_id, done_state_id, archived_state_id
    FROM sync_configs
"#;

const SELECT_SYNC_LINK: &str = r#"
    SELECT github_repo_id, github_issue_number, github_issue_id,
           shortcut_story_id, shortcut_story_number, shortcut_team_id
    FROM sync_links
"#;

const SELECT_MILESTONE_LINK: &str = r#"
    SELECT github_milestone_number, github_repo_id, shortcut_resource_id, shortcut_team_id
    FROM milestone_links
"#;

const SELECT_USER_LINK: &str = r#"
    SELECT github_user_id, shortcut_user_id, github_username, shortcut_username
    FROM user_links
"#;

fn initialize_schema(connection: &Connection) -> StoreResult<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sync_links (
            github_repo_id INTEGER NOT NULL,
            github_issue_number INTEGER NOT NULL,
            github_issue_id INTEGER NOT NULL,
            shortcut_story_id INTEGER NOT NULL,
            shortcut_story_number INTEGER NOT NULL,
            shortcut_team_id TEXT NOT NULL,
            PRIMARY KEY (github_repo_id, github_issue_number)
        );

        CREATE INDEX IF NOT EXISTS idx_sync_links_story ON sync_links (shortcut_story_id);

        CREATE TABLE IF NOT EXISTS milestone_links (
            github_milestone_number INTEGER NOT NULL,
            github_repo_id INTEGER NOT NULL,
            shortcut_resource_id INTEGER NOT NULL,
            shortcut_team_id TEXT NOT NULL,
            PRIMARY KEY (github_milestone_number, github_repo_id)
        );

        CREATE INDEX IF NOT EXISTS idx_milestone_links_resource
            ON milestone_links (shortcut_resource_id, shortcut_team_id);

        CREATE TABLE IF NOT EXISTS user_links (
            github_user_id INTEGER NOT NULL,
            shortcut_user_id TEXT NOT NULL,
            github_username TEXT NOT NULL,
            shortcut_username TEXT NOT NULL,
            UNIQUE (github_user_id, shortcut_user_id)
        );

        CREATE TABLE IF NOT EXISTS sync_configs (
            github_repo_id INTEGER NOT NULL,
            github_user_id INTEGER NOT NULL,
            shortcut_user_id TEXT NOT NULL,
            shortcut_team_id TEXT NOT NULL,
            repo_name TEXT NOT NULL,
            webhook_secret TEXT NOT NULL,
            shortcut_api_key TEXT NOT NULL,
            shortcut_api_key_nonce TEXT NOT NULL,
            github_api_key TEXT NOT NULL,
            github_api_key_nonce TEXT NOT NULL,
            public_label_id INTEGER NOT NULL,
            started_state_id INTEGER NOT NULL,
            done_state_id INTEGER NOT NULL,
            archived_state_id INTEGER NOT NULL,
            UNIQUE (github_repo_id, github_user_id)
        );
        "#,
    )?;
    Ok(())
}

fn config_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncConfig> {
    Ok(SyncConfig {
        github_repo_id: row.get(0)?,
        github_user_id: row.get(1)?,
        shortcut_user_id: row.get(2)?,
        shortcut_team_id: row.get(3)?,
        repo_name: row.get(4)?,
        webhook_secret: row.get(5)?,
        shortcut_api_key: row.get(6)?,
        shortcut_api_key_nonce: row.get(7)?,
        github_api_key: row.get(8)?,
        github_api_key_nonce: row.get(9)?,
        public_label_id: row.get(10)?,
        started_state_id: row.get(11)?,
        done_state_id: row.get(12)?,
        archived_state_id: row.get(13)?,
    })
}

fn sync_link_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncLink> {
    Ok(SyncLink {
        github_repo_id: row.get(0)?,
        github_issue_number: row.get(1)?,
        github_issue_id: row.get(2)?,
        shortcut_story_id: row.get(3)?,
        shortcut_story_number: row.get(4)?,
        shortcut_team_id: row.get(5)?,
    })
}

fn milestone_link_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MilestoneLink> {
    Ok(MilestoneLink {
        github_milestone_number: row.get(0)?,
        github_repo_id: row.get(1)?,
        shortcut_resource_id: row.get(2)?,
        shortcut_team_id: row.get(3)?,
    })
}

fn user_link_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserLink> {
    Ok(UserLink {
        github_user_id: row.get(0)?,
        shortcut_user_id: row.get(1)?,
        github_username: row.get(2)?,
        shortcut_username: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    fn test_store() -> (tempfile::TempDir, SyncStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SyncStore::open(dir.path().join("tether.db")).expect("open store");
        (dir, store)
    }

    fn sample_link() -> SyncLink {
        SyncLink {
            github_repo_id: 1001,
            github_issue_number: 42,
            github_issue_id: 987_654,
            shortcut_story_id: 7,
            shortcut_story_number: 7,
            shortcut_team_id: "team-uuid".to_string(),
        }
    }

    #[test]
    fn sync_link_round_trip_scoped_by_repo() {
        let (_dir, store) = test_store();
        store.create_sync_link(&sample_link()).expect("create");

        let found = store.find_sync_link(1001, 42).expect("find").expect("row");
        assert_eq!(found, sample_link());

        // Same issue number in a different repo is a different key.
        assert!(store.find_sync_link(2002, 42).expect("find").is_none());

        let by_story = store
            .find_sync_link_by_story(7)
            .expect("find")
            .expect("row");
        assert_eq!(by_story.github_issue_number, 42);
    }

    #[test]
    fn duplicate_sync_link_is_already_linked() {
        let (_dir, store) = test_store();
        store.create_sync_link(&sample_link()).expect("create");
        let error = store.create_sync_link(&sample_link()).unwrap_err();
        assert!(matches!(error, StoreError::AlreadyLinked(_)));

        // The original row is untouched.
        let found = store.find_sync_link(1001, 42).expect("find").expect("row");
        assert_eq!(found.shortcut_story_id, 7);
    }

    #[test]
    fn milestone_link_unique_per_repo_and_reverse_lookup() {
        let (_dir, store) = test_store();
        let link = MilestoneLink {
            github_milestone_number: 3,
            github_repo_id: 1001,
            shortcut_resource_id: 55,
            shortcut_team_id: "team-uuid".to_string(),
        };
        store.create_milestone_link(&link).expect("create");
        let error = store.create_milestone_link(&link).unwrap_err();
        assert!(matches!(error, StoreError::AlreadyLinked(_)));

        let by_resource = store
            .find_milestone_link_by_resource(55, "team-uuid")
            .expect("find")
            .expect("row");
        assert_eq!(by_resource.github_milestone_number, 3);
        assert!(store
            .find_milestone_link_by_resource(55, "other-team")
            .expect("find")
            .is_none());
    }

    #[test]
    fn user_link_upsert_refreshes_handles() {
        let (_dir, store) = test_store();
        let link = UserLink {
            github_user_id: 500,
            shortcut_user_id: "member-uuid".to_string(),
            github_username: "octocat".to_string(),
            shortcut_username: "octo".to_string(),
        };
        store.upsert_user_link(&link).expect("upsert");
        store
            .upsert_user_link(&UserLink {
                github_username: "octocat-renamed".to_string(),
                ..link.clone()
            })
            .expect("upsert again");

        let found = store
            .find_user_link(500, "member-uuid")
            .expect("find")
            .expect("row");
        assert_eq!(found.github_username, "octocat-renamed");

        let by_handle = store
            .find_user_link_by_handle("octo")
            .expect("find")
            .expect("row");
        assert_eq!(by_handle.github_user_id, 500);
        assert!(store
            .find_user_link_by_handle("stranger")
            .expect("find")
            .is_none());
    }

    #[test]
    fn config_lookup_falls_back_to_repo_scope() {
        let (_dir, store) = test_store();
        let config = SyncConfig {
            github_repo_id: 1001,
            github_user_id: 500,
            shortcut_user_id: "member-uuid".to_string(),
            shortcut_team_id: "team-uuid".to_string(),
            repo_name: "org/repo".to_string(),
            webhook_secret: "hush".to_string(),
            shortcut_api_key: "ct".to_string(),
            shortcut_api_key_nonce: "n".to_string(),
            github_api_key: "ct".to_string(),
            github_api_key_nonce: "n".to_string(),
            public_label_id: 12,
            started_state_id: 100,
            done_state_id: 101,
            archived_state_id: 102,
        };
        store.insert_config(&config).expect("insert");

        assert_eq!(store.find_config(1001, 500).expect("find"), Some(config.clone()));
        assert!(store.find_config(1001, 999).expect("find").is_none());
        assert_eq!(
            store
                .find_config_for_repo(1001)
                .expect("find")
                .expect("row")
                .github_user_id,
            500
        );
        assert_eq!(store.list_configs().expect("list").len(), 1);
    }
}
