// Moderation domain models - data structures shared by the rules, the post
// pipeline and the lifecycle controller.
//
// These are pure domain types with no host-server dependencies. The host
// adapter converts its own user/post objects into these before calling in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role token that marks an administrator in a user's role string.
pub const SYSTEM_ADMIN_ROLE: &str = "system_admin";

/// Snapshot of a user record as fetched from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    pub created_at: DateTime<Utc>,
    /// Set when the account has been soft-deleted (deactivated).
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Whitespace separated role names, e.g. `"system_user system_admin"`.
    #[serde(default)]
    pub roles: String,
}

impl UserSnapshot {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.split_whitespace().any(|r| r == role)
    }
}

/// How the host classifies a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    /// One-to-one conversation between two users.
    Direct,
    Group,
    Open,
    Private,
}

/// File attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    /// Extension with or without the leading dot, any case.
    pub extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedKind {
    OpenGraph,
    Image,
    MessageAttachment,
    Permalink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEmbed {
    pub kind: EmbedKind,
    pub url: Option<String>,
}

/// Host-computed metadata about a post (attachments, unfurled links).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetadata {
    #[serde(default)]
    pub files: Vec<FileInfo>,
    /// URLs of images the host resolved while rendering the post.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub embeds: Vec<PostEmbed>,
}

/// An outgoing or edited post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    /// Thread root, when the post is a reply.
    #[serde(default)]
    pub root_id: Option<String>,
    pub message: String,
    /// Uploaded attachments. On a fresh upload the host sends only these ids
    /// and `metadata.files` is still empty.
    #[serde(default)]
    pub file_ids: Vec<String>,
    /// Set by the host when an automated integration authored the post.
    #[serde(default)]
    pub from_bot: bool,
    #[serde(default)]
    pub metadata: PostMetadata,
}

/// A message visible only to its recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralNotice {
    pub recipient_id: String,
    pub channel_id: String,
    pub root_id: Option<String>,
    pub message: String,
}

impl EphemeralNotice {
    /// Build a notice addressed to the author of `post`, in the same channel and thread.
    pub fn for_post(post: &Post, message: impl Into<String>) -> Self {
        Self {
            recipient_id: post.user_id.clone(),
            channel_id: post.channel_id.clone(),
            root_id: post.root_id.clone(),
            message: message.into(),
        }
    }
}

/// What the pipeline decided for a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostVerdict {
    /// Let the post through, possibly modified (censored).
    Allow(Post),
    /// Drop the post. The reason goes back to the host, not to the author.
    Reject { reason: String },
}

impl PostVerdict {
    pub fn reject(reason: impl Into<String>) -> Self {
        PostVerdict::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, PostVerdict::Allow(_))
    }

    /// The post, when allowed.
    pub fn post(&self) -> Option<&Post> {
        match self {
            PostVerdict::Allow(post) => Some(post),
            PostVerdict::Reject { .. } => None,
        }
    }

    /// The rejection reason, when rejected.
    pub fn reason(&self) -> Option<&str> {
        match self {
            PostVerdict::Allow(_) => None,
            PostVerdict::Reject { reason } => Some(reason),
        }
    }
}

/// Kinds of content that new accounts can be throttled from posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedContent {
    DirectMessages,
    Images,
    Links,
}

impl GatedContent {
    /// Label used in user-facing rejection messages.
    pub fn label(&self) -> &'static str {
        match self {
            GatedContent::DirectMessages => "direct messages",
            GatedContent::Images => "images",
            GatedContent::Links => "links",
        }
    }
}

impl std::fmt::Display for GatedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
