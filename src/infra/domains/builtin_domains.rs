// Bundled disposable email providers, compiled into the binary.

use crate::core::config::{ConfigError, DisposableDomains};

const BUILTIN_DOMAINS_JSON: &str = include_str!("disposable_domains.json");

/// Parse the bundled list. Called once at startup; the set is shared by
/// every configuration snapshot afterwards.
pub fn load_builtin_domains() -> Result<DisposableDomains, ConfigError> {
    let domains = DisposableDomains::from_json(BUILTIN_DOMAINS_JSON)?;
    tracing::debug!(count = domains.len(), "Loaded builtin disposable domains");
    Ok(domains)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_list_parses() {
        let domains = load_builtin_domains().unwrap();

        assert!(!domains.is_empty());
        assert!(domains.contains("hoo.com"));
        assert!(domains.contains("mailinator.com"));
        assert!(domains.contains("MAILINATOR.COM"));
        assert!(!domains.contains("gmail.com"));
    }

    #[test]
    fn malformed_list_is_rejected() {
        let err = DisposableDomains::from_json("{\"not\": \"an array\"}").unwrap_err();
        assert!(matches!(err, ConfigError::BuiltinDomains(_)));
    }
}
