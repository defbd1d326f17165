// Account rules - pure predicates over a user snapshot and the active config.
//
// NO I/O here. The lifecycle controller and the post pipeline decide what to
// do with the answers.

use super::moderation_models::{UserSnapshot, SYSTEM_ADMIN_ROLE};
use crate::core::config::ModerationConfig;

/// The rules an account can trip. Evaluated in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationRule {
    /// Username or nickname matches the bad-usernames list.
    BadUsername,
    /// Email domain is in the bundled disposable-domain list.
    BuiltinDisposableDomain,
    /// Email domain matches the configured bad-domains list.
    BadEmailDomain,
}

impl ModerationRule {
    pub const ALL: [ModerationRule; 3] = [
        ModerationRule::BadUsername,
        ModerationRule::BuiltinDisposableDomain,
        ModerationRule::BadEmailDomain,
    ];

    pub fn violated_by(&self, user: &UserSnapshot, config: &ModerationConfig) -> bool {
        match self {
            ModerationRule::BadUsername => is_bad_username(user, config),
            ModerationRule::BuiltinDisposableDomain => is_builtin_disposable_email(user, config),
            ModerationRule::BadEmailDomain => matches_bad_domain_list(user, config),
        }
    }
}

impl std::fmt::Display for ModerationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationRule::BadUsername => write!(f, "username matches moderation list"),
            ModerationRule::BuiltinDisposableDomain => {
                write!(f, "email domain is in builtin list of bad domains")
            }
            ModerationRule::BadEmailDomain => write!(f, "email domain matches moderation list"),
        }
    }
}

/// Everything after the first `@`. An address without `@` has no domain.
pub fn email_domain(email: &str) -> Option<&str> {
    email.split_once('@').map(|(_, domain)| domain)
}

pub fn is_bad_username(user: &UserSnapshot, config: &ModerationConfig) -> bool {
    match &config.bad_usernames {
        Some(regex) => regex.is_match(&user.username) || regex.is_match(&user.nickname),
        None => false,
    }
}

/// Exact domain equality against the bundled list, when enabled.
pub fn is_builtin_disposable_email(user: &UserSnapshot, config: &ModerationConfig) -> bool {
    if !config.builtin_domains_enabled() {
        return false;
    }
    email_domain(&user.email)
        .map(|domain| config.builtin_domains.contains(domain))
        .unwrap_or(false)
}

/// Unanchored regex match against the email's domain.
pub fn matches_bad_domain_list(user: &UserSnapshot, config: &ModerationConfig) -> bool {
    match (&config.bad_domains, email_domain(&user.email)) {
        (Some(regex), Some(domain)) => regex.is_match(domain),
        _ => false,
    }
}

pub fn is_bad_email(user: &UserSnapshot, config: &ModerationConfig) -> bool {
    is_builtin_disposable_email(user, config) || matches_bad_domain_list(user, config)
}

pub fn is_soft_deleted(user: &UserSnapshot) -> bool {
    user.deleted_at.is_some()
}

/// Administrators bypass the new-account throttles (not the profanity filter).
pub fn is_exempt(user: &UserSnapshot) -> bool {
    user.has_role(SYSTEM_ADMIN_ROLE)
}

/// Every rule the user trips, in evaluation order.
pub fn violations(user: &UserSnapshot, config: &ModerationConfig) -> Vec<ModerationRule> {
    ModerationRule::ALL
        .into_iter()
        .filter(|rule| rule.violated_by(user, config))
        .collect()
}

pub fn requires_cleanup(user: &UserSnapshot, config: &ModerationConfig) -> bool {
    ModerationRule::ALL
        .iter()
        .any(|rule| rule.violated_by(user, config))
}

/// Soft-deleted accounts and accounts awaiting cleanup may not post.
pub fn is_blocked(user: &UserSnapshot, config: &ModerationConfig) -> bool {
    is_soft_deleted(user) || requires_cleanup(user, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{DisposableDomains, RawConfig};
    use chrono::Utc;
    use std::sync::Arc;

    fn config(raw: RawConfig, builtin: &[&str]) -> ModerationConfig {
        let domains: DisposableDomains = builtin.iter().map(|d| d.to_string()).collect();
        ModerationConfig::compile(raw, Arc::new(domains)).unwrap()
    }

    fn user(username: &str, nickname: &str, email: &str) -> UserSnapshot {
        UserSnapshot {
            id: "user-1".into(),
            username: username.into(),
            nickname: nickname.into(),
            email: email.into(),
            created_at: Utc::now(),
            deleted_at: None,
            roles: "system_user".into(),
        }
    }

    #[test]
    fn email_domain_is_everything_after_first_at() {
        assert_eq!(email_domain("user@example.com"), Some("example.com"));
        assert_eq!(email_domain("odd@name@example.com"), Some("name@example.com"));
        assert_eq!(email_domain("user@"), Some(""));
        assert_eq!(email_domain("no-at-sign"), None);
    }

    #[test]
    fn bad_username_checks_username_and_nickname() {
        let config = config(
            RawConfig {
                bad_usernames_list: "hate,sucks".into(),
                ..Default::default()
            },
            &[],
        );

        assert!(is_bad_username(&user("ihateneil", "", "a@b.com"), &config));
        assert!(is_bad_username(&user("neilfan", "Neil Sucks", "a@b.com"), &config));
        assert!(!is_bad_username(&user("neilfan", "Neil Rocks", "a@b.com"), &config));
    }

    #[test]
    fn empty_lists_never_match() {
        let config = config(RawConfig::default(), &[]);
        let u = user("ihateneil", "spammer", "x@baddomain.com");

        assert!(!is_bad_username(&u, &config));
        assert!(!is_bad_email(&u, &config));
        assert!(!requires_cleanup(&u, &config));
    }

    #[test]
    fn builtin_list_is_exact_match_only() {
        let config = config(
            RawConfig {
                builtin_bad_domains: true,
                ..Default::default()
            },
            &["hoo.com", "bad.com"],
        );

        assert!(is_bad_email(&user("u", "", "user@hoo.com"), &config));
        assert!(!is_bad_email(&user("u", "", "user@sub.bad.com"), &config));
        assert!(!is_bad_email(&user("u", "", "user@notbad.com"), &config));
    }

    #[test]
    fn builtin_list_respects_toggle() {
        let config = config(RawConfig::default(), &["hoo.com"]);
        assert!(!is_bad_email(&user("u", "", "user@hoo.com"), &config));
    }

    #[test]
    fn domain_regex_is_unanchored_substring() {
        let config = config(
            RawConfig {
                bad_domains_list: "bad.com".into(),
                ..Default::default()
            },
            &[],
        );

        assert!(is_bad_email(&user("u", "", "user@sub.bad.com"), &config));
        assert!(is_bad_email(&user("u", "", "user@BAD.COM"), &config));
        assert!(!is_bad_email(&user("u", "", "user@good.org"), &config));
    }

    #[test]
    fn domain_regex_supports_patterns() {
        let config = config(
            RawConfig {
                bad_domains_list: "10minutemail.com, tempmail.com, .*spam, spam.*".into(),
                ..Default::default()
            },
            &[],
        );

        for email in [
            "user@tempmail.com",
            "user@10minutemail.com",
            "user@spamdomain.com",
            "user@testspam.com",
            "user@spam.subdomain.com",
            "user@subdomain.spam.com",
        ] {
            assert!(is_bad_email(&user("u", "", email), &config), "{email}");
        }
        for email in ["user@example.com", "user@company.org", "user@gooddomain.com"] {
            assert!(!is_bad_email(&user("u", "", email), &config), "{email}");
        }
    }

    #[test]
    fn domain_regex_only_sees_the_domain() {
        let config = config(
            RawConfig {
                bad_domains_list: "spam".into(),
                ..Default::default()
            },
            &[],
        );
        assert!(!is_bad_email(&user("u", "", "spam@example.com"), &config));
    }

    #[test]
    fn malformed_email_never_matches() {
        let config = config(
            RawConfig {
                bad_domains_list: "example.com".into(),
                builtin_bad_domains: true,
                ..Default::default()
            },
            &["example.com"],
        );
        assert!(!is_bad_email(&user("u", "", "example.com"), &config));
        assert!(!is_bad_email(&user("u", "", ""), &config));
    }

    #[test]
    fn soft_deleted_and_exempt() {
        let mut u = user("u", "", "u@example.com");
        assert!(!is_soft_deleted(&u));
        assert!(!is_exempt(&u));

        u.deleted_at = Some(Utc::now());
        u.roles = "system_user system_admin".into();
        assert!(is_soft_deleted(&u));
        assert!(is_exempt(&u));
    }

    #[test]
    fn violations_lists_every_tripped_rule() {
        let config = config(
            RawConfig {
                bad_usernames_list: "hate".into(),
                bad_domains_list: "hoo.com".into(),
                builtin_bad_domains: true,
                ..Default::default()
            },
            &["hoo.com"],
        );

        let u = user("ihateneil", "", "x@hoo.com");
        assert_eq!(
            violations(&u, &config),
            vec![
                ModerationRule::BadUsername,
                ModerationRule::BuiltinDisposableDomain,
                ModerationRule::BadEmailDomain,
            ]
        );
        assert!(requires_cleanup(&u, &config));
        assert!(is_blocked(&u, &config));
    }
}
