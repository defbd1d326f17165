// Ports to the host chat server.
//
// The core defines WHAT it needs from the host, one narrow trait per
// capability, so a test double only implements the handful of methods a
// given service actually calls.

use super::moderation_models::{ChannelKind, EphemeralNotice, FileInfo, UserSnapshot};
use crate::core::users::UserRecordCache;
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum HostError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Host API error: {0}")]
    Api(String),
}

impl HostError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        HostError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::NotFound { .. })
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// Read access to user records.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch a user by id. A missing user is `HostError::NotFound`.
    async fn get_user(&self, user_id: &str) -> Result<UserSnapshot, HostError>;

    /// Fetch a user by username.
    async fn get_user_by_username(&self, username: &str) -> Result<UserSnapshot, HostError>;

    /// List users holding `role`. An empty list is a valid answer.
    async fn users_with_role(&self, role: &str) -> Result<Vec<UserSnapshot>, HostError>;
}

/// Account mutations.
#[async_trait]
pub trait AccountAdmin: Send + Sync {
    /// Soft-deactivate an account. Must be idempotent.
    async fn deactivate_user(&self, user_id: &str) -> Result<(), HostError>;
}

/// Team (group) membership.
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Ids of the teams a user belongs to. Hosts may answer `NotFound`
    /// for a user with no memberships.
    async fn teams_for_user(&self, user_id: &str) -> Result<Vec<String>, HostError>;

    /// Remove a user from a team, acting as `acting_admin_id` when given.
    async fn remove_team_member(
        &self,
        team_id: &str,
        user_id: &str,
        acting_admin_id: Option<&str>,
    ) -> Result<(), HostError>;
}

/// Channel classification.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn channel_kind(&self, channel_id: &str) -> Result<ChannelKind, HostError>;
}

/// Attachment metadata for uploads referenced only by id.
#[async_trait]
pub trait FileDirectory: Send + Sync {
    async fn file_info(&self, file_id: &str) -> Result<FileInfo, HostError>;
}

/// Sender-only notices. Fire-and-forget: delivery failures are the host's concern.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_ephemeral(&self, notice: EphemeralNotice);
}

// ============================================================================
// LOOK-ASIDE LOOKUP
// ============================================================================

/// Check the cache, fall back to the host on a miss and remember the answer.
/// Failed lookups are never cached.
pub async fn lookup_user<D: UserDirectory + ?Sized>(
    directory: &D,
    cache: &UserRecordCache,
    user_id: &str,
) -> Result<UserSnapshot, HostError> {
    if let Some(user) = cache.get(user_id) {
        return Ok(user);
    }

    let user = directory.get_user(user_id).await?;
    cache.put(user_id, &user);
    Ok(user)
}
