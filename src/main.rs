// Dry-run tool for administrators tuning moderation settings.
//
// This file's job is to:
// 1. Load configuration (JSON file) and the bundled disposable-domain list
// 2. Build an in-memory host from a fixture file
// 3. Wire the services (dependency injection)
// 4. Replay stdin through them, one line per event:
//    - `/created <user_id>`          account-created event
//    - `/joined <user_id> <team_id>` team-joined event
//    - `/login <user_id>`            login check
//    - `{...}`                       a post as JSON
//    - anything else                 a plain post from DRY_RUN_USER in DRY_RUN_CHANNEL

use anyhow::{Context, Result};
use chat_moderation::core::config::ConfigHandle;
use chat_moderation::core::moderation::{
    AccountLifecycleService, ContentFilterService, Post, PostVerdict, UserDirectory,
};
use chat_moderation::core::users::UserRecordCache;
use chat_moderation::infra::config::JsonConfigSource;
use chat_moderation::infra::domains::load_builtin_domains;
use chat_moderation::infra::host::InMemoryHost;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "moderation.json";
const DEFAULT_USER: &str = "dry-run-user";
const DEFAULT_CHANNEL: &str = "town-square";

enum Event {
    Created(String),
    Joined { user_id: String, team_id: String },
    Login(String),
    Post(Post),
}

fn parse_line(line: &str, user_id: &str, channel_id: &str) -> Result<Event> {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("/created") => {
            let user_id = words.next().context("usage: /created <user_id>")?;
            Ok(Event::Created(user_id.to_string()))
        }
        Some("/joined") => match (words.next(), words.next()) {
            (Some(user_id), Some(team_id)) => Ok(Event::Joined {
                user_id: user_id.to_string(),
                team_id: team_id.to_string(),
            }),
            _ => anyhow::bail!("usage: /joined <user_id> <team_id>"),
        },
        Some("/login") => {
            let user_id = words.next().context("usage: /login <user_id>")?;
            Ok(Event::Login(user_id.to_string()))
        }
        _ if line.trim_start().starts_with('{') => {
            let post: Post = serde_json::from_str(line).context("invalid post JSON")?;
            Ok(Event::Post(post))
        }
        _ => Ok(Event::Post(Post {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            message: line.to_string(),
            ..Default::default()
        })),
    }
}

/// Load `.env` (or the file at `path`) into the environment, then build the
/// log filter from RUST_LOG. Variables already set in the process win.
fn load_env_filter(path: Option<&Path>) -> EnvFilter {
    match path {
        Some(path) => {
            dotenv::from_path(path).ok();
        }
        None => {
            dotenv::dotenv().ok();
        }
    }
    EnvFilter::from_default_env()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(load_env_filter(None))
        .with_writer(std::io::stderr)
        .init();

    let config_path =
        std::env::var("MODERATION_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let dry_run_user = std::env::var("DRY_RUN_USER").unwrap_or_else(|_| DEFAULT_USER.to_string());
    let dry_run_channel =
        std::env::var("DRY_RUN_CHANNEL").unwrap_or_else(|_| DEFAULT_CHANNEL.to_string());

    let builtin_domains = Arc::new(load_builtin_domains()?);
    let config = Arc::new(ConfigHandle::new(builtin_domains));
    config
        .reload(&JsonConfigSource::new(&config_path))
        .await
        .with_context(|| format!("failed to load {config_path}"))?;

    let host = match std::env::var("MODERATION_FIXTURE") {
        Ok(path) => InMemoryHost::load(&path)
            .await
            .with_context(|| format!("failed to load fixture {path}"))?,
        Err(_) => InMemoryHost::new(),
    };
    let host = Arc::new(host);
    let cache = Arc::new(UserRecordCache::default());

    let filter = ContentFilterService::new(Arc::clone(&host), Arc::clone(&config), Arc::clone(&cache));
    let lifecycle =
        AccountLifecycleService::new(Arc::clone(&host), Arc::clone(&config), Arc::clone(&cache));

    tracing::info!(config = %config_path, "Reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_line(&line, &dry_run_user, &dry_run_channel) {
            Ok(event) => event,
            Err(e) => {
                println!("error: {e:#}");
                continue;
            }
        };

        match event {
            Event::Post(post) => match filter.filter_post(post).await {
                PostVerdict::Allow(post) => println!("allow: {}", post.message),
                PostVerdict::Reject { reason } => println!("reject: {reason}"),
            },
            Event::Created(user_id) => match host.get_user(&user_id).await {
                Ok(user) => match lifecycle.on_user_created(&user).await {
                    Ok(rules) if rules.is_empty() => println!("clean: {user_id}"),
                    Ok(rules) => {
                        let rules: Vec<String> = rules.iter().map(ToString::to_string).collect();
                        println!("deactivated: {user_id} ({})", rules.join("; "));
                    }
                    Err(e) => println!("error: {e}"),
                },
                Err(e) => println!("error: {e}"),
            },
            Event::Joined { user_id, team_id } => {
                match lifecycle.on_user_joined_team(&user_id, &team_id).await {
                    Ok(outcome) => println!("{outcome:?}: {user_id} in {team_id}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            Event::Login(user_id) => match host.get_user(&user_id).await {
                Ok(user) => match lifecycle.check_login(&user) {
                    Some(refusal) => println!("refuse: {refusal}"),
                    None => println!("login: {user_id}"),
                },
                Err(e) => println!("error: {e}"),
            },
        }

        for notice in host.drain_notices() {
            println!("  notice to {}: {}", notice.recipient_id, notice.message);
        }
    }

    Ok(())
}
