// In-memory host - implements every host port over concurrent maps.
//
// Backs the dry-run binary: an administrator describes users, channels and
// team memberships in a JSON fixture, then replays posts against the real
// pipeline without a running chat server.

use crate::core::moderation::{
    AccountAdmin, ChannelDirectory, ChannelKind, EphemeralNotice, FileDirectory, FileInfo,
    HostError, Notifier, TeamDirectory, UserDirectory, UserSnapshot,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Fixture file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HostFixture {
    pub users: Vec<UserSnapshot>,
    /// channel id -> kind
    pub channels: HashMap<String, ChannelKind>,
    /// user id -> team ids
    pub teams: HashMap<String, Vec<String>>,
    /// file id -> attachment info, for posts that reference uploads by id
    pub files: HashMap<String, FileInfo>,
}

#[derive(Default)]
pub struct InMemoryHost {
    users: DashMap<String, UserSnapshot>,
    channels: DashMap<String, ChannelKind>,
    teams: DashMap<String, Vec<String>>,
    files: DashMap<String, FileInfo>,
    notices: Mutex<Vec<EphemeralNotice>>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: HostFixture) -> Self {
        let host = Self::new();
        for user in fixture.users {
            host.add_user(user);
        }
        for (channel_id, kind) in fixture.channels {
            host.channels.insert(channel_id, kind);
        }
        for (user_id, teams) in fixture.teams {
            host.teams.insert(user_id, teams);
        }
        for (file_id, file) in fixture.files {
            host.add_file(file_id, file);
        }
        host
    }

    /// Load a fixture from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, HostError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| HostError::Api(format!("{}: {}", path.display(), e)))?;
        let fixture: HostFixture = serde_json::from_str(&text)
            .map_err(|e| HostError::Api(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn add_user(&self, user: UserSnapshot) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn add_channel(&self, channel_id: impl Into<String>, kind: ChannelKind) {
        self.channels.insert(channel_id.into(), kind);
    }

    pub fn add_file(&self, file_id: impl Into<String>, file: FileInfo) {
        self.files.insert(file_id.into(), file);
    }

    pub fn add_team_member(&self, team_id: impl Into<String>, user_id: impl Into<String>) {
        let team_id = team_id.into();
        let mut teams = self.teams.entry(user_id.into()).or_default();
        if !teams.contains(&team_id) {
            teams.push(team_id);
        }
    }

    /// Take every notice sent so far.
    pub fn drain_notices(&self) -> Vec<EphemeralNotice> {
        std::mem::take(&mut *self.notices.lock())
    }
}

#[async_trait]
impl UserDirectory for InMemoryHost {
    async fn get_user(&self, user_id: &str) -> Result<UserSnapshot, HostError> {
        self.users
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HostError::not_found("user", user_id))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<UserSnapshot, HostError> {
        self.users
            .iter()
            .find(|entry| entry.username == username)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HostError::not_found("user", username))
    }

    async fn users_with_role(&self, role: &str) -> Result<Vec<UserSnapshot>, HostError> {
        let mut users: Vec<UserSnapshot> = self
            .users
            .iter()
            .filter(|entry| entry.has_role(role))
            .map(|entry| entry.value().clone())
            .collect();
        // Stable answer regardless of map iteration order
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }
}

#[async_trait]
impl AccountAdmin for InMemoryHost {
    async fn deactivate_user(&self, user_id: &str) -> Result<(), HostError> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or_else(|| HostError::not_found("user", user_id))?;
        user.deleted_at.get_or_insert_with(Utc::now);
        Ok(())
    }
}

#[async_trait]
impl TeamDirectory for InMemoryHost {
    async fn teams_for_user(&self, user_id: &str) -> Result<Vec<String>, HostError> {
        match self.teams.get(user_id) {
            Some(teams) if !teams.is_empty() => Ok(teams.value().clone()),
            _ => Err(HostError::not_found("team membership", user_id)),
        }
    }

    async fn remove_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        acting_admin_id: Option<&str>,
    ) -> Result<(), HostError> {
        let mut teams = self
            .teams
            .get_mut(user_id)
            .ok_or_else(|| HostError::not_found("team membership", user_id))?;
        let before = teams.len();
        teams.retain(|t| t != team_id);
        if teams.len() == before {
            return Err(HostError::not_found("team member", format!("{team_id}/{user_id}")));
        }
        tracing::debug!(team_id, user_id, acting_admin_id, "Removed team member");
        Ok(())
    }
}

#[async_trait]
impl ChannelDirectory for InMemoryHost {
    async fn channel_kind(&self, channel_id: &str) -> Result<ChannelKind, HostError> {
        self.channels
            .get(channel_id)
            .map(|kind| *kind)
            .ok_or_else(|| HostError::not_found("channel", channel_id))
    }
}

#[async_trait]
impl FileDirectory for InMemoryHost {
    async fn file_info(&self, file_id: &str) -> Result<FileInfo, HostError> {
        self.files
            .get(file_id)
            .map(|file| file.value().clone())
            .ok_or_else(|| HostError::not_found("file", file_id))
    }
}

#[async_trait]
impl Notifier for InMemoryHost {
    async fn send_ephemeral(&self, notice: EphemeralNotice) {
        tracing::info!(
            recipient_id = %notice.recipient_id,
            channel_id = %notice.channel_id,
            message = %notice.message,
            "Ephemeral notice"
        );
        self.notices.lock().push(notice);
    }
}
