// The core module contains all moderation business logic.
// Nothing in here knows which chat server hosts it; the host is reached
// only through the ports declared in `moderation::host_ports`.

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "config/mod.rs"]
pub mod config;

#[path = "users/user_cache.rs"]
pub mod users;
