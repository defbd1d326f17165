// Recording fake host shared by the pipeline and lifecycle tests.

use super::host_ports::{
    AccountAdmin, ChannelDirectory, FileDirectory, HostError, Notifier, TeamDirectory,
    UserDirectory,
};
use super::moderation_models::{ChannelKind, EphemeralNotice, FileInfo, UserSnapshot};
use crate::core::config::{ConfigHandle, DisposableDomains, RawConfig};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub team_id: String,
    pub user_id: String,
    pub acting_admin_id: Option<String>,
}

#[derive(Default)]
pub struct FakeHost {
    pub users: DashMap<String, UserSnapshot>,
    pub channels: DashMap<String, ChannelKind>,
    pub teams: DashMap<String, Vec<String>>,
    pub files: DashMap<String, FileInfo>,
    pub notices: Mutex<Vec<EphemeralNotice>>,
    pub removals: Mutex<Vec<Removal>>,
    pub deactivated: Mutex<Vec<String>>,
    pub get_user_calls: AtomicUsize,
    pub fail_get_user: AtomicBool,
    pub fail_channel_lookup: AtomicBool,
    pub fail_file_lookup: AtomicBool,
    pub fail_teams_lookup: AtomicBool,
    pub fail_remove_member: AtomicBool,
    pub fail_deactivate: AtomicBool,
    pub fail_role_lookup: AtomicBool,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, user: UserSnapshot) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn add_channel(&self, channel_id: &str, kind: ChannelKind) {
        self.channels.insert(channel_id.to_string(), kind);
    }

    pub fn add_file(&self, file_id: &str, name: &str) {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{ext}"))
            .unwrap_or_default();
        self.files.insert(
            file_id.to_string(),
            FileInfo {
                name: name.to_string(),
                extension,
            },
        );
    }

    pub fn join_team(&self, user_id: &str, team_id: &str) {
        self.teams
            .entry(user_id.to_string())
            .or_default()
            .push(team_id.to_string());
    }

    pub fn notices(&self) -> Vec<EphemeralNotice> {
        self.notices.lock().clone()
    }

    pub fn removals(&self) -> Vec<Removal> {
        self.removals.lock().clone()
    }

    pub fn deactivated(&self) -> Vec<String> {
        self.deactivated.lock().clone()
    }

    pub fn fail(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserDirectory for FakeHost {
    async fn get_user(&self, user_id: &str) -> Result<UserSnapshot, HostError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_user.load(Ordering::SeqCst) {
            return Err(HostError::Api("user service unavailable".into()));
        }
        self.users
            .get(user_id)
            .map(|u| u.value().clone())
            .ok_or_else(|| HostError::not_found("user", user_id))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<UserSnapshot, HostError> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.value().clone())
            .ok_or_else(|| HostError::not_found("user", username))
    }

    async fn users_with_role(&self, role: &str) -> Result<Vec<UserSnapshot>, HostError> {
        if self.fail_role_lookup.load(Ordering::SeqCst) {
            return Err(HostError::Api("user search unavailable".into()));
        }
        Ok(self
            .users
            .iter()
            .filter(|u| u.has_role(role))
            .map(|u| u.value().clone())
            .collect())
    }
}

#[async_trait]
impl AccountAdmin for FakeHost {
    async fn deactivate_user(&self, user_id: &str) -> Result<(), HostError> {
        if self.fail_deactivate.load(Ordering::SeqCst) {
            return Err(HostError::Api("deactivation refused".into()));
        }
        if let Some(mut user) = self.users.get_mut(user_id) {
            user.deleted_at.get_or_insert_with(Utc::now);
        }
        self.deactivated.lock().push(user_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl TeamDirectory for FakeHost {
    async fn teams_for_user(&self, user_id: &str) -> Result<Vec<String>, HostError> {
        if self.fail_teams_lookup.load(Ordering::SeqCst) {
            return Err(HostError::Api("team service unavailable".into()));
        }
        self.teams
            .get(user_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| HostError::not_found("team membership", user_id))
    }

    async fn remove_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        acting_admin_id: Option<&str>,
    ) -> Result<(), HostError> {
        self.removals.lock().push(Removal {
            team_id: team_id.to_string(),
            user_id: user_id.to_string(),
            acting_admin_id: acting_admin_id.map(str::to_string),
        });
        if self.fail_remove_member.load(Ordering::SeqCst) {
            return Err(HostError::Api("membership change refused".into()));
        }
        if let Some(mut teams) = self.teams.get_mut(user_id) {
            teams.retain(|t| t != team_id);
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelDirectory for FakeHost {
    async fn channel_kind(&self, channel_id: &str) -> Result<ChannelKind, HostError> {
        if self.fail_channel_lookup.load(Ordering::SeqCst) {
            return Err(HostError::Api("channel service unavailable".into()));
        }
        self.channels
            .get(channel_id)
            .map(|k| *k)
            .ok_or_else(|| HostError::not_found("channel", channel_id))
    }
}

#[async_trait]
impl FileDirectory for FakeHost {
    async fn file_info(&self, file_id: &str) -> Result<FileInfo, HostError> {
        if self.fail_file_lookup.load(Ordering::SeqCst) {
            return Err(HostError::Api("file service unavailable".into()));
        }
        self.files
            .get(file_id)
            .map(|f| f.value().clone())
            .ok_or_else(|| HostError::not_found("file", file_id))
    }
}

#[async_trait]
impl Notifier for FakeHost {
    async fn send_ephemeral(&self, notice: EphemeralNotice) {
        self.notices.lock().push(notice);
    }
}

pub fn user_created_at(id: &str, username: &str, created_at: DateTime<Utc>) -> UserSnapshot {
    UserSnapshot {
        id: id.to_string(),
        username: username.to_string(),
        nickname: String::new(),
        email: format!("{id}@gooddomain.com"),
        created_at,
        deleted_at: None,
        roles: "system_user".to_string(),
    }
}

/// A user whose account is `age` old.
pub fn user_aged(id: &str, age: Duration) -> UserSnapshot {
    user_created_at(id, &format!("user-{id}"), Utc::now() - age)
}

pub fn admin(id: &str, username: &str) -> UserSnapshot {
    UserSnapshot {
        roles: "system_user system_admin".to_string(),
        ..user_created_at(id, username, Utc::now() - Duration::days(365))
    }
}

pub fn config_handle(raw: RawConfig, builtin: &[&str]) -> Arc<ConfigHandle> {
    let domains: DisposableDomains = builtin.iter().map(|d| d.to_string()).collect();
    let handle = ConfigHandle::new(Arc::new(domains));
    handle
        .apply(raw)
        .expect("test configuration should compile");
    Arc::new(handle)
}
