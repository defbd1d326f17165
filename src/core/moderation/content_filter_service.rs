// Post pipeline - the ordered checks applied to every new or edited post.
//
// Stages, top to bottom. A rejection stops the pipeline:
// 1. Bot exemption (when ExcludeBots is on)
// 2. Blocked author (soft-deleted, or awaiting cleanup)
// 3. Direct-message age gate
// 4. Image age gate
// 5. Link age gate (skipped when the image gate already classified the post)
// 6. Profanity censor / reject
//
// NO host-specific types here - posts come in as `Post`, answers go out as
// `PostVerdict` plus ephemeral notices through the `Notifier` port.

use super::host_ports::{
    lookup_user, ChannelDirectory, FileDirectory, HostError, Notifier, UserDirectory,
};
use super::moderation_models::{
    ChannelKind, EmbedKind, EphemeralNotice, FileInfo, GatedContent, Post, PostVerdict,
    UserSnapshot,
};
use super::moderation_rules::{is_blocked, is_exempt, violations};
use super::text_normalize::NormalizedText;
use crate::core::config::duration::{parse_duration, DurationParseError, INDEFINITE};
use crate::core::config::{ConfigHandle, ModerationConfig};
use crate::core::users::UserRecordCache;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;

pub const GENERIC_FAILURE_NOTICE: &str =
    "Something went wrong when sending your message. Contact an administrator.";
pub const DIRECT_MESSAGE_GATE_NOTICE: &str =
    "Configuration settings limit new users from sending private messages.";
pub const FLAGGED_ACCOUNT_NOTICE: &str =
    "Your account has been flagged for moderation. Contact an administrator.";

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "tif", "tiff", "ico", "heic", "avif",
];

static LINK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:https?://|\bwww\.)\S+").unwrap());

static MARKDOWN_IMAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\(\s*[^)\s]+[^)]*\)").unwrap());

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to find user with id {user_id}")]
    UserLookup {
        user_id: String,
        #[source]
        source: HostError,
    },

    #[error("failed to classify channel {channel_id}")]
    ChannelLookup {
        channel_id: String,
        #[source]
        source: HostError,
    },

    #[error("failed to get file info for {file_id}")]
    FileLookup {
        file_id: String,
        #[source]
        source: HostError,
    },

    #[error("failed to parse duration {value:?}")]
    InvalidDuration {
        value: String,
        #[source]
        source: DurationParseError,
    },
}

// ============================================================================
// CONTENT CLASSIFICATION
// ============================================================================

/// Does the post carry a URL, either unfurled by the host or written out?
pub fn contains_links(post: &Post) -> bool {
    post.metadata.embeds.iter().any(|embed| embed.url.is_some())
        || LINK_REGEX.is_match(&post.message)
}

fn is_image_extension(extension: &str) -> bool {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&extension.as_str())
}

/// Image by extension, falling back to the file name when the host left
/// the extension blank.
pub fn is_image_file(file: &FileInfo) -> bool {
    if file.extension.is_empty() {
        file.name
            .rsplit_once('.')
            .map(|(_, ext)| is_image_extension(ext))
            .unwrap_or(false)
    } else {
        is_image_extension(&file.extension)
    }
}

/// Does the post carry an image: an image attachment, an image the host
/// resolved, or inline markdown image syntax?
///
/// Only looks at what the post already carries. Fresh uploads arrive as
/// bare `file_ids`; the pipeline resolves those through `FileDirectory`.
pub fn contains_images(post: &Post) -> bool {
    post.metadata.files.iter().any(is_image_file)
        || !post.metadata.images.is_empty()
        || post
            .metadata
            .embeds
            .iter()
            .any(|embed| embed.kind == EmbedKind::Image)
        || MARKDOWN_IMAGE_REGEX.is_match(&post.message)
}

// ============================================================================
// NEW-ACCOUNT GATE
// ============================================================================

/// Is `user` too young to post `content` under the configured `duration`?
///
/// Returns the rejection message when blocked, `None` when allowed. An age
/// exactly equal to the duration is allowed. `"-1"` blocks regardless of age.
pub fn is_user_too_new(
    user: &UserSnapshot,
    duration: &str,
    content: GatedContent,
    now: DateTime<Utc>,
) -> Result<Option<String>, FilterError> {
    let duration = duration.trim();
    if duration == INDEFINITE {
        return Ok(Some(format!(
            "New user not allowed to post {} indefinitely.",
            content
        )));
    }

    let limit = parse_duration(duration).map_err(|source| FilterError::InvalidDuration {
        value: duration.to_string(),
        source,
    })?;

    let age = now - user.created_at;
    if age < limit {
        Ok(Some(format!(
            "New user not allowed to post {} for {}.",
            content, duration
        )))
    } else {
        Ok(None)
    }
}

fn gate_notice(content: GatedContent) -> String {
    match content {
        GatedContent::DirectMessages => DIRECT_MESSAGE_GATE_NOTICE.to_string(),
        other => format!(
            "Configuration settings limit new users from posting {}.",
            other
        ),
    }
}

/// Feature toggle on and a duration configured.
fn gate_enabled(enabled: bool, duration: &str) -> bool {
    enabled && !duration.trim().is_empty()
}

// ============================================================================
// CORE SERVICE
// ============================================================================

pub struct ContentFilterService<H> {
    host: Arc<H>,
    config: Arc<ConfigHandle>,
    cache: Arc<UserRecordCache>,
}

impl<H> ContentFilterService<H>
where
    H: UserDirectory + ChannelDirectory + FileDirectory + Notifier,
{
    pub fn new(host: Arc<H>, config: Arc<ConfigHandle>, cache: Arc<UserRecordCache>) -> Self {
        Self {
            host,
            config,
            cache,
        }
    }

    /// Resolve a user through the cache, fetching from the host on a miss.
    pub async fn user_by_id(&self, user_id: &str) -> Result<UserSnapshot, FilterError> {
        lookup_user(self.host.as_ref(), &self.cache, user_id)
            .await
            .map_err(|source| FilterError::UserLookup {
                user_id: user_id.to_string(),
                source,
            })
    }

    /// Run a new or edited post through the pipeline.
    pub async fn filter_post(&self, post: Post) -> PostVerdict {
        self.filter_post_at(post, Utc::now()).await
    }

    /// Same as `filter_post`, with account ages measured at `now`.
    pub async fn filter_post_at(&self, post: Post, now: DateTime<Utc>) -> PostVerdict {
        let config = self.config.current();

        if post.from_bot && config.raw.exclude_bots {
            tracing::debug!(user_id = %post.user_id, "Bot post exempt from filtering");
            return PostVerdict::Allow(post);
        }

        let author = match self.user_by_id(&post.user_id).await {
            Ok(author) => author,
            Err(e) => {
                tracing::error!(user_id = %post.user_id, error = %e, "Failed to get post author");
                self.notify(&post, GENERIC_FAILURE_NOTICE).await;
                return PostVerdict::reject("Failed to get user");
            }
        };

        if is_blocked(&author, &config) {
            tracing::info!(
                user_id = %author.id,
                username = %author.username,
                soft_deleted = author.deleted_at.is_some(),
                rules = ?violations(&author, &config),
                "Rejected post from account flagged for moderation"
            );
            self.notify(&post, FLAGGED_ACCOUNT_NOTICE).await;
            return PostVerdict::reject(FLAGGED_ACCOUNT_NOTICE);
        }

        if gate_enabled(config.raw.block_new_user_pm, &config.raw.block_new_user_pm_time) {
            match self.is_direct_message(&post.channel_id).await {
                Ok(true) => {
                    if let Some(rejection) = self
                        .new_user_gate(
                            &post,
                            &author,
                            GatedContent::DirectMessages,
                            &config.raw.block_new_user_pm_time,
                            now,
                        )
                        .await
                    {
                        return rejection;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        user_id = %post.user_id,
                        channel_id = %post.channel_id,
                        error = %e,
                        "Failed to classify channel"
                    );
                    self.notify(&post, GENERIC_FAILURE_NOTICE).await;
                    return PostVerdict::reject("Failed to get channel");
                }
            }
        }

        let images_gated = if gate_enabled(
            config.raw.block_new_user_images,
            &config.raw.block_new_user_images_time,
        ) {
            match self.carries_image(&post).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::error!(user_id = %post.user_id, error = %e, "Failed to inspect uploaded files");
                    self.notify(&post, GENERIC_FAILURE_NOTICE).await;
                    return PostVerdict::reject("Failed to get file info");
                }
            }
        } else {
            false
        };

        // Image URLs look like links too; the more specific gate wins.
        let gated = if images_gated {
            Some((GatedContent::Images, &config.raw.block_new_user_images_time))
        } else if gate_enabled(
            config.raw.block_new_user_links,
            &config.raw.block_new_user_links_time,
        ) && contains_links(&post)
        {
            Some((GatedContent::Links, &config.raw.block_new_user_links_time))
        } else {
            None
        };

        if let Some((content, duration)) = gated {
            if let Some(rejection) = self
                .new_user_gate(&post, &author, content, duration, now)
                .await
            {
                return rejection;
            }
        }

        self.filter_profanity(&config, post).await
    }

    /// `contains_images`, plus a lookup of every uploaded file the post
    /// metadata does not describe yet.
    async fn carries_image(&self, post: &Post) -> Result<bool, FilterError> {
        if contains_images(post) {
            return Ok(true);
        }
        for file_id in &post.file_ids {
            let file = self
                .host
                .file_info(file_id)
                .await
                .map_err(|source| FilterError::FileLookup {
                    file_id: file_id.clone(),
                    source,
                })?;
            if is_image_file(&file) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn is_direct_message(&self, channel_id: &str) -> Result<bool, FilterError> {
        let kind = self.host.channel_kind(channel_id).await.map_err(|source| {
            FilterError::ChannelLookup {
                channel_id: channel_id.to_string(),
                source,
            }
        })?;
        Ok(kind == ChannelKind::Direct)
    }

    /// Apply the new-account gate. `Some` is the rejection to return.
    async fn new_user_gate(
        &self,
        post: &Post,
        author: &UserSnapshot,
        content: GatedContent,
        duration: &str,
        now: DateTime<Utc>,
    ) -> Option<PostVerdict> {
        if is_exempt(author) {
            tracing::debug!(user_id = %author.id, %content, "Administrator exempt from new user gate");
            return None;
        }

        match is_user_too_new(author, duration, content, now) {
            Ok(None) => None,
            Ok(Some(message)) => {
                tracing::info!(
                    user_id = %author.id,
                    %content,
                    duration,
                    "Rejected post from new user"
                );
                self.notify(post, gate_notice(content)).await;
                Some(PostVerdict::reject(message))
            }
            Err(e) => {
                // Surfaced to the administrator in the logs, never to the author.
                tracing::error!(user_id = %author.id, %content, error = %e, "New user gate misconfigured");
                self.notify(post, GENERIC_FAILURE_NOTICE).await;
                Some(PostVerdict::reject(e.to_string()))
            }
        }
    }

    async fn filter_profanity(&self, config: &ModerationConfig, mut post: Post) -> PostVerdict {
        let Some(regex) = &config.bad_words else {
            return PostVerdict::Allow(post);
        };

        let normalized = NormalizedText::new(&post.message);
        let detected = normalized.find_all(regex);
        if detected.is_empty() {
            return PostVerdict::Allow(post);
        }
        let words = detected.join(", ");

        if config.raw.reject_posts {
            let warning = config.raw.warning_message.replacen("%s", &words, 1);
            tracing::info!(user_id = %post.user_id, words = %words, "Rejected profane post");
            self.notify(&post, warning).await;
            return PostVerdict::reject(format!("Profane word not allowed: {}", words));
        }

        let censored = normalized.censor(regex, &config.raw.censor_character);
        tracing::debug!(user_id = %post.user_id, words = %words, "Censored profane post");
        post.message = censored;
        PostVerdict::Allow(post)
    }

    async fn notify(&self, post: &Post, message: impl Into<String>) {
        self.host
            .send_ephemeral(EphemeralNotice::for_post(post, message))
            .await;
    }
}
