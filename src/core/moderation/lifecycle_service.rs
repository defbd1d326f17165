// Account lifecycle - reacts to accounts being created and joining teams.
//
// A flagged account is removed from its teams (best effort), deactivated
// (must succeed) and evicted from the user cache. The team-join hook covers
// accounts that slipped into a team before the creation hook finished.

use super::host_ports::{lookup_user, AccountAdmin, HostError, TeamDirectory, UserDirectory};
use super::moderation_models::{UserSnapshot, SYSTEM_ADMIN_ROLE};
use super::moderation_rules::{
    is_blocked, is_exempt, is_soft_deleted, requires_cleanup, violations, ModerationRule,
};
use crate::core::config::ConfigHandle;
use crate::core::users::UserRecordCache;
use std::sync::Arc;
use thiserror::Error;

pub const DEACTIVATED_LOGIN_NOTICE: &str =
    "Your account has been deactivated due to policy violations. Contact an administrator.";
pub const GUIDELINES_LOGIN_NOTICE: &str =
    "Your account does not meet community guidelines. Contact an administrator.";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to find user with id {user_id}")]
    UserLookup {
        user_id: String,
        #[source]
        source: HostError,
    },

    #[error("configured admin user {username} does not have system_admin role")]
    AdminNotAdministrator { username: String },

    #[error("failed to search for an administrator: {0}")]
    AdminLookup(#[source] HostError),

    #[error("no active account holds the system_admin role")]
    NoAdmin,

    #[error("unable to deactivate user {user_id}")]
    Deactivate {
        user_id: String,
        #[source]
        source: HostError,
    },
}

/// What the team-join hook did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamJoinOutcome {
    /// The account is in good standing.
    Allowed,
    /// The account was flagged and removed from the team.
    Removed,
    /// The account was flagged but the host refused the removal.
    RemovalFailed,
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct AccountLifecycleService<H> {
    host: Arc<H>,
    config: Arc<ConfigHandle>,
    cache: Arc<UserRecordCache>,
}

impl<H> AccountLifecycleService<H>
where
    H: UserDirectory + AccountAdmin + TeamDirectory,
{
    pub fn new(host: Arc<H>, config: Arc<ConfigHandle>, cache: Arc<UserRecordCache>) -> Self {
        Self {
            host,
            config,
            cache,
        }
    }

    /// Check a freshly created account and clean it up when flagged.
    ///
    /// Returns the rules the account tripped (empty when clean).
    pub async fn on_user_created(
        &self,
        user: &UserSnapshot,
    ) -> Result<Vec<ModerationRule>, LifecycleError> {
        let config = self.config.current();
        let tripped = violations(user, &config);
        if tripped.is_empty() {
            tracing::debug!(user_id = %user.id, "New account passed moderation rules");
            return Ok(tripped);
        }

        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            email = %user.email,
            rules = ?tripped,
            "New account flagged for moderation"
        );
        self.cleanup_user(user).await?;
        Ok(tripped)
    }

    /// Remove the user from every team, deactivate the account and drop it
    /// from the cache. Only the deactivation is allowed to fail the cleanup.
    pub async fn cleanup_user(&self, user: &UserSnapshot) -> Result<(), LifecycleError> {
        let teams = match self.host.teams_for_user(&user.id).await {
            Ok(teams) => teams,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => {
                tracing::warn!(
                    user_id = %user.id,
                    username = %user.username,
                    error = %e,
                    "Failed to list teams for flagged user, deactivating anyway"
                );
                Vec::new()
            }
        };

        if !teams.is_empty() {
            let admin_id = self.acting_admin_id().await;
            for team_id in &teams {
                if let Err(e) = self
                    .host
                    .remove_team_member(team_id, &user.id, admin_id.as_deref())
                    .await
                {
                    tracing::warn!(
                        user_id = %user.id,
                        username = %user.username,
                        team_id = %team_id,
                        error = %e,
                        "Failed to remove flagged user from team"
                    );
                }
            }
        }

        if let Err(source) = self.host.deactivate_user(&user.id).await {
            tracing::error!(
                user_id = %user.id,
                username = %user.username,
                email = %user.email,
                error = %source,
                "Failed to deactivate flagged user"
            );
            return Err(LifecycleError::Deactivate {
                user_id: user.id.clone(),
                source,
            });
        }

        self.cache.remove(&user.id);
        tracing::info!(
            user_id = %user.id,
            username = %user.username,
            teams = teams.len(),
            "Deactivated flagged user"
        );
        Ok(())
    }

    /// Re-check a user who just joined a team and pull them back out when
    /// the account is deactivated or awaiting cleanup.
    pub async fn on_user_joined_team(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> Result<TeamJoinOutcome, LifecycleError> {
        let user = lookup_user(self.host.as_ref(), &self.cache, user_id)
            .await
            .map_err(|source| {
                tracing::error!(user_id, team_id, error = %source, "Failed to get user joining team");
                LifecycleError::UserLookup {
                    user_id: user_id.to_string(),
                    source,
                }
            })?;

        let config = self.config.current();
        if !is_blocked(&user, &config) {
            return Ok(TeamJoinOutcome::Allowed);
        }

        let admin_id = self.acting_admin_id().await;
        match self
            .host
            .remove_team_member(team_id, user_id, admin_id.as_deref())
            .await
        {
            Ok(()) => {
                tracing::info!(
                    user_id,
                    username = %user.username,
                    team_id,
                    "Removed flagged user from team"
                );
                Ok(TeamJoinOutcome::Removed)
            }
            Err(e) => {
                tracing::error!(
                    user_id,
                    username = %user.username,
                    email = %user.email,
                    team_id,
                    error = %e,
                    "Failed to remove flagged user from team"
                );
                Ok(TeamJoinOutcome::RemovalFailed)
            }
        }
    }

    /// Find the account to act as for administrative calls.
    ///
    /// The configured admin username wins when it exists, but must really
    /// hold the administrator role. Otherwise any active administrator will do.
    pub async fn resolve_admin(&self) -> Result<UserSnapshot, LifecycleError> {
        let config = self.config.current();
        let username = config.raw.admin_username.trim();

        if !username.is_empty() {
            match self.host.get_user_by_username(username).await {
                Ok(user) if is_exempt(&user) => return Ok(user),
                Ok(_) => {
                    return Err(LifecycleError::AdminNotAdministrator {
                        username: username.to_string(),
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        username,
                        error = %e,
                        "Configured admin user not found, searching for another administrator"
                    );
                }
            }
        }

        self.host
            .users_with_role(SYSTEM_ADMIN_ROLE)
            .await
            .map_err(LifecycleError::AdminLookup)?
            .into_iter()
            .find(|user| !is_soft_deleted(user))
            .ok_or(LifecycleError::NoAdmin)
    }

    async fn acting_admin_id(&self) -> Option<String> {
        match self.resolve_admin().await {
            Ok(admin) => Some(admin.id),
            Err(e) => {
                tracing::error!(error = %e, "No administrative identity, removing without one");
                None
            }
        }
    }

    /// Refusal to show a user at login, if any. Deactivation is reported first.
    pub fn check_login(&self, user: &UserSnapshot) -> Option<&'static str> {
        if is_soft_deleted(user) {
            return Some(DEACTIVATED_LOGIN_NOTICE);
        }
        if requires_cleanup(user, &self.config.current()) {
            return Some(GUIDELINES_LOGIN_NOTICE);
        }
        None
    }
}
