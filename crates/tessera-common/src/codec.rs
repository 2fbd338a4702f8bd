//! Signing and verification of tessera session tokens.
//!
//! Both directions fail closed: a missing key, a signing error or any kind of
//! verification problem yields `None`. The reason is only ever logged, so a
//! caller can not tell an expired token from a forged one.

use jsonwebtoken::{Algorithm, Header, Validation};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{
    token::{TokenEnvelope, TokenType, VerifiedToken, TOKEN_TYPE_CLAIM},
    Config,
};

/// The only algorithm tokens are signed and accepted with.
pub const ALGORITHM: Algorithm = Algorithm::RS512;

/// Sign `claims` as a token of the given type, issued now.
pub fn sign(config: &Config, claims: &Map<String, Value>, token_type: TokenType) -> Option<String> {
    sign_at(config, claims, token_type, OffsetDateTime::now_utc())
}

/// Sign `claims` as a token of the given type, issued at `issued_at`.
///
/// The expiry is derived from [TokenType::lifetime].
/// A `tokenType` key in `claims` is discarded; the type tag is always the one given here.
pub fn sign_at(
    config: &Config,
    claims: &Map<String, Value>,
    token_type: TokenType,
    issued_at: OffsetDateTime,
) -> Option<String> {
    let Some(signing_key) = config.signing_key() else {
        error!("failed to sign, there is no signing key configured");
        return None;
    };

    let mut claims = claims.clone();
    if claims.remove(TOKEN_TYPE_CLAIM).is_some() {
        debug!("discarded caller-supplied token type claim");
    }

    let Some(expires_at) = issued_at.checked_add(token_type.lifetime()) else {
        error!(%token_type, %issued_at, "failed to sign, expiry is out of range");
        return None;
    };

    let envelope = TokenEnvelope {
        token_type,
        iat: issued_at.unix_timestamp(),
        exp: expires_at.unix_timestamp(),
        jti: Uuid::new_v4(),
        claims,
    };

    match jsonwebtoken::encode(&Header::new(ALGORITHM), &envelope, signing_key) {
        Ok(token) => Some(token),
        Err(err) => {
            error!(?err, %token_type, "failed to sign token");
            None
        }
    }
}

/// Verify a token, optionally requiring a specific [TokenType].
pub fn verify(config: &Config, token: &str, expected: Option<TokenType>) -> Option<VerifiedToken> {
    let Some(verifying_key) = config.verifying_key() else {
        error!("failed to verify, there is no verifying key configured");
        return None;
    };

    let token_data =
        match jsonwebtoken::decode::<TokenEnvelope>(token, verifying_key, &validation()) {
            Ok(token_data) => token_data,
            Err(err) => {
                debug!(?err, "token verification denied");
                return None;
            }
        };

    if let Some(expected) = expected {
        if token_data.claims.token_type != expected {
            warn!(
                %expected,
                actual = %token_data.claims.token_type,
                "failed to verify, unexpected token type"
            );
            return None;
        }
    }

    Some(token_data.claims.into())
}

fn validation() -> Validation {
    // `Validation::new` pins the accepted algorithm list; the token header is never trusted
    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation
}
