// The infra module contains implementations of core traits.
// Each concern gets its own submodule.

#[path = "host/in_memory_host.rs"]
pub mod host;

#[path = "config/json_source.rs"]
pub mod config;

#[path = "domains/builtin_domains.rs"]
pub mod domains;
