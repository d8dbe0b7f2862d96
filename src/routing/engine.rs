//! Routing decision engine.
//!
//! # Responsibilities
//! - Short-circuit function and addon paths
//! - Apply a matched rule: role gate, force404, redirect, static shadowing,
//!   external proxy, rewrite
//! - Re-apply a pending rule once every static alternative has 404'd
//! - Prime the alternative-path queue for default-origin targets
//!
//! # Precedence
//! ```text
//! function/addon path → role gate → force404 → redirect
//!     → static file shadows rule (first pass only, unless forced)
//!     → external origin → rewrite (→ function/addon again) → default origin
//! ```

use std::path::{Path, PathBuf};

use axum::http::{HeaderValue, StatusCode};

use crate::config::DevConfig;
use crate::routing::addons::AddonTable;
use crate::routing::context::RequestContext;
use crate::routing::rewrite::{destination, is_internal, origin_of, strip_origin};
use crate::routing::rules::Rule;
use crate::routing::static_resolver::{alternatives, StaticResolver};
use crate::routing::target::{Target, TargetKind};
use crate::security::headers::{apply_proxy_headers, X_ORIGINAL_PATHNAME};
use crate::security::role_gate::{GateOutcome, RoleGate};

/// Path substituted for requests that fail a role exception.
pub const NOT_FOUND_SENTINEL: &str = "/.netlify/non-existent-path";

const FUNCTIONS_PREFIX: &str = "/.netlify/functions/";

/// Static inputs of the engine, fixed for a process run.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub origin: String,
    pub functions_origin: Option<String>,
    pub addons: AddonTable,
    pub publish_dir: PathBuf,
    pub framework: Option<String>,
    pub jwt_role_path: String,
}

impl EngineSettings {
    pub fn from_config(config: &DevConfig) -> Self {
        Self {
            origin: config.upstream.app_origin(),
            functions_origin: config.upstream.functions_origin(),
            addons: AddonTable::new(&config.addons),
            publish_dir: config.site.publish_dir.clone(),
            framework: config.site.framework.clone(),
            jwt_role_path: config.site.jwt_role_path.clone(),
        }
    }
}

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Dispatch(Target),
    Redirect { status: StatusCode, location: String },
    NotFound,
    InvalidToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Initial,
    AfterNotFound,
}

#[derive(Debug)]
pub struct DecisionEngine {
    origin: String,
    functions_origin: Option<String>,
    addons: AddonTable,
    framework: Option<String>,
    resolver: StaticResolver,
    gate: RoleGate,
}

impl DecisionEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            origin: settings.origin,
            functions_origin: settings.functions_origin,
            addons: settings.addons,
            framework: settings.framework,
            resolver: StaticResolver::new(settings.publish_dir),
            gate: RoleGate::new(settings.jwt_role_path),
        }
    }

    pub fn publish_dir(&self) -> &Path {
        self.resolver.root()
    }

    /// Function or addon target for a path, bypassing all rules.
    pub fn short_circuit(&self, path_and_query: &str) -> Option<Target> {
        if let Some(functions) = &self.functions_origin {
            if is_function_path(path_and_query) {
                return Some(Target::new(TargetKind::Function, functions.clone(), path_and_query));
            }
        }
        self.addons.resolve(path_and_query)
    }

    /// Decide how to serve a fresh request, given the rule matched for it.
    pub async fn resolve(&self, ctx: &mut RequestContext, rule: Option<Rule>) -> Decision {
        if let Some(target) = self.short_circuit(ctx.path_and_query()) {
            return Decision::Dispatch(target);
        }
        match rule {
            Some(rule) => self.apply(ctx, rule, Pass::Initial).await,
            None => Decision::Dispatch(self.origin_target(ctx, TargetKind::Static, None)),
        }
    }

    /// Re-apply a pending rule after the default origin had nothing to serve.
    pub async fn fallback(&self, ctx: &mut RequestContext, rule: Rule) -> Decision {
        self.apply(ctx, rule, Pass::AfterNotFound).await
    }

    /// Fill the retry queue for `target`; only the default origin retries.
    pub fn prime_alternatives(&self, ctx: &mut RequestContext, target: &Target) {
        ctx.alternatives.clear();
        if !target.kind.is_default_origin() {
            return;
        }
        let query = ctx.query().map(|q| format!("?{q}")).unwrap_or_default();
        ctx.alternatives
            .extend(alternatives(ctx.pathname()).into_iter().map(|path| path + &query));
    }

    async fn apply(&self, ctx: &mut RequestContext, rule: Rule, pass: Pass) -> Decision {
        ctx.active_rule = None;
        apply_proxy_headers(&mut ctx.headers, &rule.proxy_headers);

        if let Some(target) = self.short_circuit(ctx.path_and_query()) {
            return Decision::Dispatch(target);
        }

        let mut unauthenticated = false;
        if let Some(expected) = rule.jwt_exception() {
            match self.gate.check(ctx.cookie_header(), expected) {
                GateOutcome::Authorized => {}
                GateOutcome::Unauthenticated => {
                    tracing::debug!(request_id = %ctx.request_id, path = %ctx.pathname(), "Role exception not satisfied");
                    ctx.set_path_and_query(NOT_FOUND_SENTINEL);
                    unauthenticated = true;
                }
                GateOutcome::Malformed(_) => return Decision::InvalidToken,
            }
        }

        if rule.force_404 {
            return Decision::NotFound;
        }

        if rule.is_redirect() {
            if let Some(status) = rule.status.and_then(|s| StatusCode::from_u16(s).ok()) {
                return Decision::Redirect {
                    status,
                    location: rule.to,
                };
            }
        }

        if unauthenticated {
            return Decision::NotFound;
        }

        if pass == Pass::Initial
            && !rule.force
            && self.framework.is_none()
            && rule.status != Some(404)
            && self.resolver.is_static(ctx.pathname()).await
        {
            tracing::debug!(request_id = %ctx.request_id, path = %ctx.pathname(), from = %rule.from, "Static file shadows rule");
            ctx.active_rule = Some(rule);
            return Decision::Dispatch(self.origin_target(ctx, TargetKind::Static, None));
        }

        if rule.is_external() {
            let Some(origin) = origin_of(&rule.to) else {
                tracing::warn!(request_id = %ctx.request_id, to = %rule.to, "Rule target is not a valid URL");
                return Decision::NotFound;
            };
            tracing::info!(request_id = %ctx.request_id, to = %rule.to, "Proxying to external origin");
            return Decision::Dispatch(Target::new(TargetKind::External, origin, strip_origin(&rule.to)));
        }

        let original_pathname = ctx.pathname().to_string();
        let dest = destination(&rule.to, ctx.query());

        let mut kind = TargetKind::Static;
        let mut status = None;
        if rule.force || is_internal(&dest) || self.framework.is_none() {
            tracing::info!(request_id = %ctx.request_id, from = %original_pathname, to = %dest, "Rewrote URL");
            ctx.set_path_and_query(dest);
            kind = TargetKind::Internal;
            status = rule.status.and_then(|s| StatusCode::from_u16(s).ok());
        }

        if let Some(target) = self.short_circuit(ctx.path_and_query()) {
            if target.kind == TargetKind::Function {
                if let Ok(value) = HeaderValue::from_str(&original_pathname) {
                    ctx.headers.insert(X_ORIGINAL_PATHNAME, value);
                }
            }
            return Decision::Dispatch(target);
        }

        Decision::Dispatch(self.origin_target(ctx, kind, status))
    }

    fn origin_target(&self, ctx: &RequestContext, kind: TargetKind, status: Option<StatusCode>) -> Target {
        Target::new(kind, self.origin.clone(), ctx.path_and_query()).with_status(status)
    }
}

fn is_function_path(path_and_query: &str) -> bool {
    path_and_query
        .strip_prefix(FUNCTIONS_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}
