//! Dispatch loop: decision → upstream call → 404 fallbacks → final response.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → DecisionEngine::resolve (rule snapshot taken once per request)
//!     → Dispatch(target) → UpstreamClient::send
//!         → 404 and alternatives left → next alternative, same target
//!         → 404 and a pending rule    → DecisionEngine::fallback
//!         → otherwise                 → finish (status override, header rules)
//!     → Redirect / NotFound / InvalidToken → generated response → finish
//! ```
//!
//! # Design Decisions
//! - At most `MAX_REDISPATCH` re-dispatches per request, then the 404 page
//! - The buffered body is replayed on every re-dispatch
//! - Dropping the returned future cancels the in-flight call and all retries

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{Method, Response, StatusCode};

use crate::http::client::UpstreamClient;
use crate::http::response::{self, Source};
use crate::observability::metrics;
use crate::routing::{Decision, DecisionEngine, HeaderRules, RequestContext, TableSet, Target};

/// Upper bound on alternative pops plus rule fallbacks for one request.
pub const MAX_REDISPATCH: usize = 10;

/// Label used in metrics for responses the proxy generated itself.
pub const GENERATED: &str = "generated";

pub struct Dispatcher {
    engine: Arc<DecisionEngine>,
    tables: TableSet,
    client: UpstreamClient,
}

impl Dispatcher {
    pub fn new(engine: Arc<DecisionEngine>, tables: TableSet, client: UpstreamClient) -> Self {
        Self {
            engine,
            tables,
            client,
        }
    }

    /// Serve one request. Returns the response and the kind of target that
    /// produced it, for metrics.
    pub async fn dispatch(
        &self,
        method: &Method,
        mut ctx: RequestContext,
        body: Bytes,
    ) -> (Response<Body>, &'static str) {
        let header_rules = self.tables.headers();
        let rule = self.tables.rules().match_path(ctx.pathname());
        let mut decision = self.engine.resolve(&mut ctx, rule).await;
        let mut redispatches = 0;

        loop {
            let target = match decision {
                Decision::Dispatch(target) => target,
                Decision::Redirect { status, location } => {
                    tracing::info!(
                        request_id = %ctx.request_id,
                        status = status.as_u16(),
                        location = %location,
                        "Redirecting"
                    );
                    let redirect = response::redirect(status, &location);
                    return (finish(redirect, Source::Generated, None, &header_rules, &ctx), GENERATED);
                }
                Decision::NotFound => {
                    let page = response::not_found(self.engine.publish_dir()).await;
                    return (finish(page, Source::Generated, None, &header_rules, &ctx), GENERATED);
                }
                Decision::InvalidToken => {
                    let rejected = response::invalid_token();
                    return (finish(rejected, Source::Generated, None, &header_rules, &ctx), GENERATED);
                }
            };

            self.engine.prime_alternatives(&mut ctx, &target);
            match self.forward(method, &mut ctx, target, &body, &mut redispatches).await {
                Step::Respond {
                    response,
                    source,
                    status,
                    label,
                } => return (finish(response, source, status, &header_rules, &ctx), label),
                Step::Redecide(next) => decision = next,
            }
        }
    }

    /// Call `target`, walking the alternative queue on 404s. Hands back a
    /// new decision when a pending rule takes over.
    async fn forward(
        &self,
        method: &Method,
        ctx: &mut RequestContext,
        mut target: Target,
        body: &Bytes,
        redispatches: &mut usize,
    ) -> Step {
        loop {
            tracing::debug!(
                request_id = %ctx.request_id,
                kind = %target.kind,
                url = %target.url(),
                "Dispatching request"
            );
            let response = match self.client.send(method, &target, &ctx.headers, body.clone()).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        kind = %target.kind,
                        url = %target.url(),
                        error = %e,
                        "Upstream error"
                    );
                    return Step::Respond {
                        response: response::upstream_error(&e),
                        source: Source::Generated,
                        status: None,
                        label: target.kind.as_str(),
                    };
                }
            };

            let exhausted = ctx.alternatives.is_empty() && ctx.active_rule.is_none();
            if response.status() != StatusCode::NOT_FOUND || exhausted {
                return Step::Respond {
                    response,
                    source: Source::Upstream,
                    status: target.status,
                    label: target.kind.as_str(),
                };
            }

            *redispatches += 1;
            if *redispatches > MAX_REDISPATCH {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    path = %ctx.original_uri.path(),
                    "Re-dispatch limit reached"
                );
                metrics::record_fallback("not_found");
                return Step::Respond {
                    response: response::not_found(self.engine.publish_dir()).await,
                    source: Source::Generated,
                    status: None,
                    label: GENERATED,
                };
            }

            if let Some(next) = ctx.alternatives.pop_front() {
                tracing::debug!(request_id = %ctx.request_id, path = %next, "Trying alternative path");
                metrics::record_fallback("alternative");
                ctx.set_path_and_query(next);
                target.path_and_query = ctx.path_and_query().to_string();
                continue;
            }

            if let Some(rule) = ctx.active_rule.take() {
                tracing::debug!(request_id = %ctx.request_id, from = %rule.from, "Applying rule after 404");
                metrics::record_fallback("rule");
                return Step::Redecide(self.engine.fallback(ctx, rule).await);
            }
        }
    }
}

enum Step {
    Respond {
        response: Response<Body>,
        source: Source,
        status: Option<StatusCode>,
        label: &'static str,
    },
    Redecide(Decision),
}

fn finish(
    response: Response<Body>,
    source: Source,
    status: Option<StatusCode>,
    header_rules: &HeaderRules,
    ctx: &RequestContext,
) -> Response<Body> {
    response::finish(response, source, status, header_rules.headers_for(ctx.pathname()))
}
