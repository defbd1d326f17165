// Content moderation engine for a chat platform.
//
// **Architecture Overview:**
// - `core/` = Moderation logic (word lists, rules, post pipeline, account lifecycle)
// - `infra/` = Implementations of core ports (in-memory host, JSON config, bundled domains)
//
// The host chat server is an external collaborator: it feeds posts and
// account events in, and is called back through the narrow traits in
// `core::moderation::host_ports`.

// Layer roots live in descriptively named files rather than a stack of
// identical-looking mod.rs files.
#[path = "core/core_layer.rs"]
pub mod core;
#[path = "infra/infra_layer.rs"]
pub mod infra;
