//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, status codes)
//! - Check addon table and inline rule shapes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DevConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::DevConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("upstream.app_port must be non-zero")]
    AppPort,

    #[error("upstream.functions_port {0} collides with the app port")]
    FunctionsPort(u16),

    #[error("addon slug `{0}` must be a single path segment")]
    AddonSlug(String),

    #[error("addon `{slug}` has invalid base URL `{url}`")]
    AddonUrl { slug: String, url: String },

    #[error("redirect #{index}: `from` must start with `/` (got `{from}`)")]
    RuleFrom { index: usize, from: String },

    #[error("redirect #{index}: `to` is empty")]
    RuleTo { index: usize },

    #[error("redirect #{index}: status {status} is not an HTTP status")]
    RuleStatus { index: usize, status: u16 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &DevConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.upstream.app_port == 0 {
        errors.push(ValidationError::AppPort);
    }
    if let Some(port) = config.upstream.functions_port {
        if port == config.upstream.app_port || port == 0 {
            errors.push(ValidationError::FunctionsPort(port));
        }
    }

    for (slug, base) in &config.addons {
        if slug.is_empty() || slug.contains('/') {
            errors.push(ValidationError::AddonSlug(slug.clone()));
        }
        let valid_url = url::Url::parse(base)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
            .unwrap_or(false);
        if !valid_url {
            errors.push(ValidationError::AddonUrl {
                slug: slug.clone(),
                url: base.clone(),
            });
        }
    }

    for (index, rule) in config.redirects.iter().enumerate() {
        if !rule.from.starts_with('/') {
            errors.push(ValidationError::RuleFrom {
                index,
                from: rule.from.clone(),
            });
        }
        if rule.to.trim().is_empty() && !rule.force_404 {
            errors.push(ValidationError::RuleTo { index });
        }
        if let Some(status) = rule.status {
            if !(100..=599).contains(&status) {
                errors.push(ValidationError::RuleStatus { index, status });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Rule;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&DevConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = DevConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.upstream.functions_port = Some(config.upstream.app_port);
        config.addons.insert("a/b".into(), "ftp://x".into());
        config.redirects.push(Rule {
            from: "old".into(),
            to: "".into(),
            status: Some(999),
            ..Rule::default()
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.contains(&ValidationError::BindAddress("nowhere".into())));
        assert!(errors.contains(&ValidationError::RuleStatus { index: 0, status: 999 }));
    }

    #[test]
    fn force404_rule_needs_no_target() {
        let mut config = DevConfig::default();
        config.redirects.push(Rule {
            from: "/secret".into(),
            force_404: true,
            ..Rule::default()
        });
        assert!(validate_config(&config).is_ok());
    }
}
