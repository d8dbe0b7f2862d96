//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dev proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routing::Rule;

/// Root configuration for the dev proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DevConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream app server and functions runtime.
    pub upstream: UpstreamConfig,

    /// Site layout and routing inputs.
    pub site: SiteConfig,

    /// Addon slug to base URL.
    pub addons: BTreeMap<String, String>,

    /// Inline rewrite/redirect rules, consulted after the `_redirects` file.
    pub redirects: Vec<Rule>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request handling limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Reload rule and header tables when their files change.
    pub watch: WatchConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8888").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8888".to_string(),
        }
    }
}

/// Where the app server and functions runtime live.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Host used for every local backend.
    pub host: String,

    /// Port of the developer's app server (the default origin).
    pub app_port: u16,

    /// Port of the local functions runtime, if one is running.
    pub functions_port: Option<u16>,

    /// How long to wait for the app server port at startup.
    pub startup_timeout_secs: u64,

    /// Serve the publish dir on `app_port` instead of expecting a framework server.
    pub serve_static: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            app_port: 3000,
            functions_port: None,
            startup_timeout_secs: 30,
            serve_static: false,
        }
    }
}

impl UpstreamConfig {
    /// Base URL of the default origin.
    pub fn app_origin(&self) -> String {
        format!("http://{}:{}", self.host, self.app_port)
    }

    /// Base URL of the functions runtime.
    pub fn functions_origin(&self) -> Option<String> {
        self.functions_port
            .map(|port| format!("http://{}:{}", self.host, port))
    }
}

/// Site layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Project root; holds the project-level `_headers` file.
    pub project_dir: PathBuf,

    /// Build output directory served as the document root.
    pub publish_dir: PathBuf,

    /// Name of the framework dev server, when one handles its own routing.
    pub framework: Option<String>,

    /// Dotted path of the roles claim inside the `nf_jwt` payload.
    pub jwt_role_path: String,

    /// Rule file name, resolved against `publish_dir`.
    pub redirects_file: String,

    /// Header rule file name, resolved against both `project_dir` and `publish_dir`.
    pub headers_file: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            publish_dir: PathBuf::from("."),
            framework: None,
            jwt_role_path: "app_metadata.authorization.roles".to_string(),
            redirects_file: "_redirects".to_string(),
            headers_file: "_headers".to_string(),
        }
    }
}

impl SiteConfig {
    /// Path of the `_redirects` file.
    pub fn redirects_path(&self) -> PathBuf {
        self.publish_dir.join(&self.redirects_file)
    }

    /// Header files in merge order: project root first, build output last.
    pub fn headers_paths(&self) -> Vec<PathBuf> {
        let project = self.project_dir.join(&self.headers_file);
        let publish = self.publish_dir.join(&self.headers_file);
        if project == publish {
            vec![project]
        } else {
            vec![project, publish]
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for one upstream request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Request handling limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body buffered for replay, in bytes.
    pub max_body_size: usize,
    /// Add `x-forwarded-for` with the client address.
    pub forward_client_ip: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
            forward_client_ip: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// File watching for hot reload.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    /// Poll interval for backends that fall back to polling.
    pub poll_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: DevConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8888");
        assert_eq!(config.upstream.app_origin(), "http://localhost:3000");
        assert!(config.upstream.functions_origin().is_none());
        assert!(config.redirects.is_empty());
    }

    #[test]
    fn parses_rules_and_addons() {
        let config: DevConfig = toml::from_str(
            r#"
            [upstream]
            app_port = 5000
            functions_port = 34567

            [addons]
            search = "https://search.example.com"

            [[redirects]]
            from = "/api/*"
            to = "/.netlify/functions/:splat"
            status = 200
            force = true

            [[redirects]]
            from = "/admin/*"
            to = "/admin/:splat"
            exceptions = { JWT = "admin,:editor" }
            headers = { X-From = "dev" }
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.functions_origin().as_deref(), Some("http://localhost:34567"));
        assert_eq!(config.addons["search"], "https://search.example.com");
        assert_eq!(config.redirects.len(), 2);
        assert!(config.redirects[0].force);
        assert_eq!(config.redirects[1].jwt_exception(), Some("admin,:editor"));
        assert_eq!(config.redirects[1].proxy_headers["X-From"], "dev");
    }

    #[test]
    fn header_paths_deduplicate_same_dir() {
        let site = SiteConfig::default();
        assert_eq!(site.headers_paths().len(), 1);

        let site = SiteConfig {
            publish_dir: PathBuf::from("dist"),
            ..SiteConfig::default()
        };
        let paths = site.headers_paths();
        assert_eq!(paths, vec![PathBuf::from("./_headers"), PathBuf::from("dist/_headers")]);
    }
}
