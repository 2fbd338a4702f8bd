//! Types defining tessera session tokens.

use std::{fmt::Display, str::FromStr};

use fnv::FnvHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::id::UserId;

/// The reserved claim carrying the [TokenType].
pub const TOKEN_TYPE_CLAIM: &str = "tokenType";

/// The kind of a session token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token presented on every request.
    Access,
    /// Long-lived token only accepted when minting a new session.
    Refresh,
}

impl TokenType {
    /// How long a token of this type stays valid after issuance.
    pub fn lifetime(self) -> time::Duration {
        match self {
            Self::Access => time::Duration::minutes(10),
            Self::Refresh => time::Duration::days(365),
        }
    }

    /// The claim value of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            _ => Err("expected `access` or `refresh`"),
        }
    }
}

/// The signed payload of a tessera JWT.
///
/// The type tag lives in the envelope, outside of the caller-supplied claims,
/// so it can not be overridden through the open claim map.
#[derive(Serialize, Deserialize, Debug)]
pub struct TokenEnvelope {
    /// The token type.
    #[serde(rename = "tokenType")]
    pub token_type: TokenType,

    /// Issued at.
    pub iat: i64,

    /// Expiration time
    pub exp: i64,

    /// Unique token id.
    ///
    /// Makes every issued token distinct, also when two tokens with equal claims
    /// are issued within the same second.
    pub jti: Uuid,

    /// Caller-supplied claims.
    #[serde(default)]
    pub claims: Map<String, Value>,
}

/// A token which passed signature, expiry and type verification.
#[derive(Clone, PartialEq, Debug)]
pub struct VerifiedToken {
    /// The token type.
    pub token_type: TokenType,

    /// Issued at, unix seconds.
    pub issued_at: i64,

    /// Expiration time, unix seconds.
    pub expires_at: i64,

    /// Unique token id.
    pub token_id: Uuid,

    /// The claims supplied when the token was signed.
    pub claims: Map<String, Value>,
}

impl VerifiedToken {
    /// Look up one claim.
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The signed claims with the type tag merged in as [TOKEN_TYPE_CLAIM].
    pub fn flat_claims(&self) -> Map<String, Value> {
        let mut flat = self.claims.clone();
        flat.insert(
            TOKEN_TYPE_CLAIM.to_string(),
            Value::String(self.token_type.as_str().to_string()),
        );
        flat
    }
}

impl From<TokenEnvelope> for VerifiedToken {
    fn from(envelope: TokenEnvelope) -> Self {
        Self {
            token_type: envelope.token_type,
            issued_at: envelope.iat,
            expires_at: envelope.exp,
            token_id: envelope.jti,
            claims: envelope.claims,
        }
    }
}

/// The claims tessera puts into session tokens.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SessionClaims {
    /// The user the session belongs to.
    pub user_id: UserId,

    /// The user name at the time of issuance.
    pub username: String,

    /// Scopes granted to the session. Only carried by access tokens.
    pub scopes: Option<FnvHashSet<String>>,
}

impl SessionClaims {
    /// Claim name of the user id.
    pub const USER_ID: &'static str = "userId";

    /// Claim name of the user name.
    pub const USERNAME: &'static str = "username";

    /// Claim name of the scope set.
    pub const SCOPES: &'static str = "scopes";

    /// Encode as an open claim map.
    pub fn to_claims(&self) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert(Self::USER_ID.to_string(), Value::from(self.user_id.to_uint()));
        claims.insert(
            Self::USERNAME.to_string(),
            Value::String(self.username.clone()),
        );

        if let Some(scopes) = &self.scopes {
            let mut scopes: Vec<&String> = scopes.iter().collect();
            scopes.sort();
            claims.insert(
                Self::SCOPES.to_string(),
                Value::Array(scopes.into_iter().cloned().map(Value::String).collect()),
            );
        }

        claims
    }

    /// Decode from an open claim map.
    ///
    /// Returns `None` when `userId` or `username` are missing or malformed.
    /// A malformed `scopes` claim is treated as absent.
    pub fn from_claims(claims: &Map<String, Value>) -> Option<Self> {
        let user_id = UserId::from_claim(claims.get(Self::USER_ID)?)?;
        let username = claims.get(Self::USERNAME)?.as_str()?.to_string();
        let scopes = claims.get(Self::SCOPES).and_then(scope_set);

        Some(Self {
            user_id,
            username,
            scopes,
        })
    }
}

/// Interpret a claim value as a set of scope strings.
///
/// Anything but an array consisting only of strings yields `None`.
pub fn scope_set(value: &Value) -> Option<FnvHashSet<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}
