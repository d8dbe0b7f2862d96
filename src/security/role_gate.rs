//! Role-based rule exceptions.
//!
//! # Responsibilities
//! - Find the `nf_jwt` cookie
//! - Decode the token payload and check expiry
//! - Compare the roles claim with a rule's expected roles
//!
//! # Trust boundary
//! The signature is NOT verified. This is only acceptable because the proxy
//! binds to localhost for development; it mirrors which content a role would
//! see and is not an access control mechanism.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

/// Cookie carrying the bearer token.
pub const JWT_COOKIE: &str = "nf_jwt";

/// Body of the 400 response for unusable tokens.
pub const INVALID_TOKEN_BODY: &str = "Invalid JWT provided. Please see logs for more info.";

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Why a presented token could not be used.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has no payload segment")]
    MissingPayload,

    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("roles claim at `{path}` is not a list of strings")]
    InvalidRoles { path: String },
}

/// Result of checking a request against a role exception.
#[derive(Debug)]
pub enum GateOutcome {
    /// A presented role is expected; serve the original path.
    Authorized,
    /// No cookie, expired token, or no matching role; serve as not found.
    Unauthenticated,
    /// Token present but unusable; answer 400.
    Malformed(TokenError),
}

/// Decides whether presented token roles satisfy a rule exception.
#[derive(Debug, Clone)]
pub struct RoleGate {
    role_path: String,
}

impl RoleGate {
    pub fn new(role_path: impl Into<String>) -> Self {
        Self {
            role_path: role_path.into(),
        }
    }

    pub fn check(&self, cookie_header: Option<&str>, expected_roles: &str) -> GateOutcome {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64().round())
            .unwrap_or(0.0);
        self.check_at(cookie_header, expected_roles, now)
    }

    fn check_at(&self, cookie_header: Option<&str>, expected_roles: &str, now: f64) -> GateOutcome {
        let Some(token) = cookie_header.and_then(|header| cookie_value(header, JWT_COOKIE)) else {
            return GateOutcome::Unauthenticated;
        };

        let payload = match decode_payload(token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Error while decoding JWT provided in request");
                return GateOutcome::Malformed(e);
            }
        };

        let exp = payload.get("exp").and_then(Value::as_f64).unwrap_or(0.0);
        if exp < now {
            tracing::warn!(exp, "Expired JWT provided in request");
            return GateOutcome::Unauthenticated;
        }

        let presented = match lookup(&payload, &self.role_path) {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Vec::new(),
            Some(Value::String(s)) if s.is_empty() => Vec::new(),
            Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Vec::new(),
            Some(Value::Array(items)) => match items.iter().map(Value::as_str).collect::<Option<Vec<_>>>() {
                Some(roles) => roles,
                None => return self.invalid_roles(),
            },
            Some(_) => return self.invalid_roles(),
        };

        let authorized = expected_roles
            .split(',')
            .map(|role| role.strip_prefix(':').unwrap_or(role))
            .any(|expected| presented.contains(&expected));

        if authorized {
            GateOutcome::Authorized
        } else {
            GateOutcome::Unauthenticated
        }
    }

    fn invalid_roles(&self) -> GateOutcome {
        let error = TokenError::InvalidRoles {
            path: self.role_path.clone(),
        };
        tracing::warn!(error = %error, "Invalid roles value provided in JWT");
        GateOutcome::Malformed(error)
    }
}

/// Value of cookie `name` in a `Cookie` header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key.trim() != name {
            return None;
        }
        let value = value.trim();
        Some(
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value),
        )
    })
}

/// Decode the JSON payload (second segment) of a JWT without verifying it.
///
/// A `null` payload decodes to an empty object.
pub fn decode_payload(token: &str) -> Result<Value, TokenError> {
    let segment = token.split('.').nth(1).ok_or(TokenError::MissingPayload)?;
    let normalized: String = segment
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    let bytes = PAYLOAD_ENGINE.decode(normalized)?;
    match serde_json::from_slice(&bytes)? {
        Value::Null => Ok(Value::Object(Default::default())),
        value => Ok(value),
    }
}

/// Follow a dotted path (`a.b[0].c`) into a JSON value.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split(['.', '[', ']'])
        .filter(|key| !key.is_empty())
        .try_fold(value, |current, key| match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            Value::Object(map) => map.get(key),
            _ => None,
        })
}
