// Configuration models.
//
// `RawConfig` is what the administrator types into the host's settings
// screen. `ModerationConfig` is the validated, compiled snapshot every
// moderation check reads from.

use super::duration::{BlockDuration, DurationParseError};
use crate::core::moderation::word_list::{
    compile_word_list, WordListError, SUBSTRING_TEMPLATE, WORD_BOUNDARY_TEMPLATE,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_CENSOR_CHARACTER: &str = "*";
pub const DEFAULT_WARNING_MESSAGE: &str =
    "Your post has been rejected by the Profanity Filter, because the following words are not allowed: `%s`.";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid duration format for {field}: {value}")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: DurationParseError,
    },

    #[error("failed to compile {field} regex")]
    InvalidWordList {
        field: &'static str,
        #[source]
        source: WordListError,
    },

    #[error("failed to parse builtin domains list: {0}")]
    BuiltinDomains(#[from] serde_json::Error),
}

// ============================================================================
// RAW CONFIG
// ============================================================================

/// Key/value fields as the host stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawConfig {
    pub bad_words_list: String,
    pub bad_domains_list: String,
    pub bad_usernames_list: String,
    pub builtin_bad_domains: bool,
    #[serde(rename = "BlockNewUserPM")]
    pub block_new_user_pm: bool,
    #[serde(rename = "BlockNewUserPMTime")]
    pub block_new_user_pm_time: String,
    pub block_new_user_links: bool,
    pub block_new_user_links_time: String,
    pub block_new_user_images: bool,
    pub block_new_user_images_time: String,
    pub censor_character: String,
    pub exclude_bots: bool,
    pub reject_posts: bool,
    /// Warning sent to the author in reject mode. The first `%s` receives
    /// the matched words.
    pub warning_message: String,
    /// Account to act as for destructive actions. Falls back to any
    /// active administrator when empty or unknown.
    pub admin_username: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            bad_words_list: String::new(),
            bad_domains_list: String::new(),
            bad_usernames_list: String::new(),
            builtin_bad_domains: false,
            block_new_user_pm: false,
            block_new_user_pm_time: String::new(),
            block_new_user_links: false,
            block_new_user_links_time: String::new(),
            block_new_user_images: false,
            block_new_user_images_time: String::new(),
            censor_character: DEFAULT_CENSOR_CHARACTER.to_string(),
            exclude_bots: false,
            reject_posts: false,
            warning_message: DEFAULT_WARNING_MESSAGE.to_string(),
            admin_username: String::new(),
        }
    }
}

// ============================================================================
// BUILTIN DOMAINS
// ============================================================================

/// Bundled set of throwaway email providers. Matching is exact equality on
/// the email's domain, never substring.
#[derive(Debug, Clone, Default)]
pub struct DisposableDomains {
    domains: HashSet<String>,
}

impl DisposableDomains {
    /// Parse a JSON array of domain strings.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let list: Vec<String> = serde_json::from_str(json)?;
        Ok(list.into_iter().collect())
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(&domain.trim().to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl FromIterator<String> for DisposableDomains {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            domains: iter
                .into_iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }
}

// ============================================================================
// COMPILED SNAPSHOT
// ============================================================================

/// Immutable, validated configuration. Published behind an `Arc` and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub raw: RawConfig,
    pub bad_words: Option<Regex>,
    pub bad_domains: Option<Regex>,
    pub bad_usernames: Option<Regex>,
    pub builtin_domains: Arc<DisposableDomains>,
}

impl ModerationConfig {
    /// Validate durations and compile the word lists. Any failure rejects
    /// the whole configuration.
    pub fn compile(
        raw: RawConfig,
        builtin_domains: Arc<DisposableDomains>,
    ) -> Result<Self, ConfigError> {
        validate_duration(&raw.block_new_user_pm_time, "BlockNewUserPMTime")?;
        validate_duration(&raw.block_new_user_links_time, "BlockNewUserLinksTime")?;
        validate_duration(&raw.block_new_user_images_time, "BlockNewUserImagesTime")?;

        let bad_words = compile_field(&raw.bad_words_list, WORD_BOUNDARY_TEMPLATE, "BadWordsList")?;
        let bad_domains =
            compile_field(&raw.bad_domains_list, SUBSTRING_TEMPLATE, "BadDomainsList")?;
        let bad_usernames =
            compile_field(&raw.bad_usernames_list, SUBSTRING_TEMPLATE, "BadUsernamesList")?;

        Ok(Self {
            raw,
            bad_words,
            bad_domains,
            bad_usernames,
            builtin_domains,
        })
    }

    /// Whether the builtin disposable-domain check applies.
    pub fn builtin_domains_enabled(&self) -> bool {
        self.raw.builtin_bad_domains
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            raw: RawConfig::default(),
            bad_words: None,
            bad_domains: None,
            bad_usernames: None,
            builtin_domains: Arc::new(DisposableDomains::default()),
        }
    }
}

fn validate_duration(value: &str, field: &'static str) -> Result<(), ConfigError> {
    BlockDuration::parse(value)
        .map(|_| ())
        .map_err(|source| ConfigError::InvalidDuration {
            field,
            value: value.to_string(),
            source,
        })
}

fn compile_field(
    list: &str,
    template: &str,
    field: &'static str,
) -> Result<Option<Regex>, ConfigError> {
    compile_word_list(list, template).map_err(|source| {
        tracing::error!(field, error = %source, "Invalid regex in word list");
        ConfigError::InvalidWordList { field, source }
    })
}
