//! Rule evaluators backed by bearer access tokens.

use http::{header::AUTHORIZATION, HeaderMap};
use tracing::debug;

use crate::{
    codec,
    rule::PermissionRule,
    token::{scope_set, SessionClaims, TokenType},
    Config,
};

use super::value::Outcome;

/// The parts of an incoming request the evaluators look at.
#[derive(Clone, Copy, Debug)]
pub struct RequestContext<'a> {
    /// The key configuration used for token verification.
    pub config: &'a Config,

    /// The request headers.
    pub headers: &'a HeaderMap,
}

impl<'a> RequestContext<'a> {
    /// Create a new request context.
    pub fn new(config: &'a Config, headers: &'a HeaderMap) -> Self {
        Self { config, headers }
    }

    /// The bearer token of the request, see [bearer_token].
    pub fn bearer_token(&self) -> Option<&'a str> {
        bearer_token(self.headers)
    }
}

/// Extract the token from an `Authorization: <scheme> <token>` header.
///
/// Only the second whitespace-separated segment is used. The scheme is not validated.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    header.split_whitespace().nth(1)
}

/// A named permission rule evaluator.
pub trait RuleEvaluator: Send + Sync {
    /// The name used when tracing evaluations.
    fn name(&self) -> &'static str;

    /// Evaluate the rule against a request.
    ///
    /// Must return [Outcome::NotApplicable] for rule kinds it does not handle.
    fn evaluate(&self, rule: &PermissionRule, request: &RequestContext<'_>) -> Outcome;
}

/// Evaluates [PermissionRule::Scope].
///
/// Allows iff the request carries a valid access token
/// whose `scopes` claim contains the required scope.
#[derive(Clone, Copy, Default, Debug)]
pub struct ScopeEvaluator;

impl RuleEvaluator for ScopeEvaluator {
    fn name(&self) -> &'static str {
        "scope"
    }

    fn evaluate(&self, rule: &PermissionRule, request: &RequestContext<'_>) -> Outcome {
        let PermissionRule::Scope(required_scope) = rule else {
            return Outcome::NotApplicable;
        };

        let Some(token) = request.bearer_token() else {
            return Outcome::DENY;
        };

        let Some(verified) = codec::verify(request.config, token, Some(TokenType::Access)) else {
            return Outcome::DENY;
        };

        // exact membership, no wildcard or hierarchy
        match verified.claim(SessionClaims::SCOPES).map(scope_set) {
            Some(Some(scopes)) => Outcome::from(scopes.contains(required_scope)),
            Some(None) => {
                debug!("malformed scopes claim");
                Outcome::DENY
            }
            None => Outcome::DENY,
        }
    }
}

/// Evaluates [PermissionRule::Valid].
///
/// Allows iff the request carries a valid access token.
#[derive(Clone, Copy, Default, Debug)]
pub struct ValidEvaluator;

impl RuleEvaluator for ValidEvaluator {
    fn name(&self) -> &'static str {
        "valid"
    }

    fn evaluate(&self, rule: &PermissionRule, request: &RequestContext<'_>) -> Outcome {
        if !matches!(rule, PermissionRule::Valid) {
            return Outcome::NotApplicable;
        }

        let Some(token) = request.bearer_token() else {
            return Outcome::DENY;
        };

        Outcome::from(codec::verify(request.config, token, Some(TokenType::Access)).is_some())
    }
}
