//! `tessera-session` implements the register, login and refresh flows that issue tessera session tokens.
//!
//! Sessions are stateless: everything a session knows lives in its signed tokens,
//! so the only server-side state is the user repository.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use http::HeaderMap;
use serde::Serialize;
use tessera_common::{
    codec,
    id::UserId,
    policy::{NoOpPolicyTracer, PolicyEngine, PolicyValue, RequestContext},
    rule::PermissionRule,
    token::{SessionClaims, TokenType},
    Config,
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub use builder::SessionsBuilder;
pub use error::Error;
pub use password::{Argon2Hasher, PasswordHasher};
pub use user::{MemoryUserRepository, NewUser, User, UserRepository};

mod builder;
mod error;

/// Password hashing.
pub mod password;

/// User records and storage.
pub mod user;

/// Shortest accepted length of user names and passwords is one more than this.
const MIN_INPUT_LENGTH: usize = 2;

/// Verified against when logging in with an unknown e-mail.
const DUMMY_PASSWORD: &str = "tessera-no-such-user";

/// The tokens of a freshly issued session.
///
/// Returned once to the caller and never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionPair {
    /// Short-lived access token.
    pub access_token: String,

    /// Long-lived refresh token.
    pub refresh_token: String,
}

/// The session service handle.
#[derive(Clone)]
pub struct Sessions {
    inner: Arc<SessionsInner>,
}

struct SessionsInner {
    config: Config,
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    policy_engine: PolicyEngine,
    dummy_hash: OnceCell<String>,
}

impl Sessions {
    /// Construct a new builder.
    pub fn builder() -> SessionsBuilder {
        SessionsBuilder::new()
    }

    /// The key configuration tokens are signed and verified with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Register a new user and open a session for it.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionPair, Error> {
        validate_length("username", username)?;
        validate_length("password", password)?;

        let password_hash = self.hash_password(password).await?;
        let user = self
            .inner
            .users
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                scopes: None,
            })
            .await?;

        info!(user_id = %user.id, "registered user");

        self.issue_session(&user)
    }

    /// Open a session for an existing user.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionPair, Error> {
        let Some(user) = self.inner.users.find_by_email(email).await? else {
            debug!("login for unknown e-mail");
            // pay the same hashing cost as for a known e-mail
            let dummy_hash = self.dummy_hash().await?;
            self.verify_password(dummy_hash, password).await?;
            return Err(Error::Credentials);
        };

        if !self
            .verify_password(user.password_hash.clone(), password)
            .await?
        {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(Error::Credentials);
        }

        self.issue_session(&user)
    }

    /// Exchange a refresh token for a new session.
    ///
    /// Both tokens are rotated; the presented refresh token stays valid until it expires.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionPair, Error> {
        let user_id = codec::verify(&self.inner.config, refresh_token, Some(TokenType::Refresh))
            .and_then(|verified| {
                verified
                    .claim(SessionClaims::USER_ID)
                    .and_then(UserId::from_claim)
            })
            .ok_or(Error::SessionValidation)?;

        let Some(user) = self.inner.users.find_by_id(user_id).await? else {
            debug!(%user_id, "refresh for unknown user");
            return Err(Error::SessionInvalid);
        };

        self.issue_session(&user)
    }

    /// All users.
    pub async fn get_all(&self) -> Result<Vec<User>, Error> {
        self.inner.users.find_all().await
    }

    /// A user by id.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, Error> {
        self.inner.users.find_by_id(id).await
    }

    /// Decide a permission rule for a request, given its headers.
    ///
    /// Rules no registered evaluator handles are denied.
    pub fn authorize(&self, rule: &PermissionRule, headers: &HeaderMap) -> PolicyValue {
        self.inner.policy_engine.eval(
            rule,
            &RequestContext::new(&self.inner.config, headers),
            &mut NoOpPolicyTracer,
        )
    }

    fn issue_session(&self, user: &User) -> Result<SessionPair, Error> {
        let access_claims = SessionClaims {
            user_id: user.id,
            username: user.username.clone(),
            scopes: user.scopes.clone().filter(|scopes| !scopes.is_empty()),
        };
        let refresh_claims = SessionClaims {
            scopes: None,
            ..access_claims.clone()
        };

        let access_token = codec::sign(
            &self.inner.config,
            &access_claims.to_claims(),
            TokenType::Access,
        )
        .ok_or(Error::SessionCreation)?;
        let refresh_token = codec::sign(
            &self.inner.config,
            &refresh_claims.to_claims(),
            TokenType::Refresh,
        )
        .ok_or(Error::SessionCreation)?;

        info!(user_id = %user.id, "issued session");

        Ok(SessionPair {
            access_token,
            refresh_token,
        })
    }

    async fn dummy_hash(&self) -> Result<String, Error> {
        self.inner
            .dummy_hash
            .get_or_try_init(|| self.hash_password(DUMMY_PASSWORD))
            .await
            .cloned()
    }

    async fn hash_password(&self, password: &str) -> Result<String, Error> {
        let hasher = self.inner.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(error::unclassified)?
    }

    async fn verify_password(&self, hash: String, password: &str) -> Result<bool, Error> {
        let hasher = self.inner.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(error::unclassified)?
    }
}

fn validate_length(field: &'static str, value: &str) -> Result<(), Error> {
    if value.chars().count() <= MIN_INPUT_LENGTH {
        return Err(Error::Validation { field });
    }
    Ok(())
}
