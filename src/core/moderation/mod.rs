// Core moderation module - word lists, account rules, the post pipeline and
// the account lifecycle reactions.

pub mod content_filter_service;
pub mod host_ports;
pub mod lifecycle_service;
pub mod moderation_models;
pub mod moderation_rules;
pub mod text_normalize;
pub mod word_list;

#[cfg(test)]
pub(crate) mod test_support;

pub use content_filter_service::*;
pub use host_ports::*;
pub use lifecycle_service::*;
pub use moderation_models::*;
pub use moderation_rules::ModerationRule;
