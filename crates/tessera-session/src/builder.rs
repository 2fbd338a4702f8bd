use std::sync::Arc;

use tessera_common::{
    policy::{PolicyEngine, RuleEvaluator},
    Config,
};
use tokio::sync::OnceCell;
use tracing::warn;

use crate::{
    password::{Argon2Hasher, PasswordHasher},
    user::UserRepository,
    Error, Sessions, SessionsInner,
};

/// A builder for configuring [Sessions].
pub struct SessionsBuilder {
    pub(crate) config: Option<Config>,
    pub(crate) users: Option<Arc<dyn UserRepository>>,
    pub(crate) hasher: Option<Arc<dyn PasswordHasher>>,
    pub(crate) policy_engine: PolicyEngine,
}

impl SessionsBuilder {
    pub(crate) fn new() -> Self {
        Self {
            config: None,
            users: None,
            hasher: None,
            policy_engine: PolicyEngine::standard(),
        }
    }

    /// Load the key configuration from the environment the process runs in.
    ///
    /// See [Config::from_environment].
    pub fn from_environment(mut self) -> Result<Self, Error> {
        self.config = Some(Config::from_environment()?);
        Ok(self)
    }

    /// Use the given key configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use the given user repository.
    pub fn with_user_repository(mut self, users: impl UserRepository + 'static) -> Self {
        self.users = Some(Arc::new(users));
        self
    }

    /// Use the given password hasher (default is [Argon2Hasher] with default parameters)
    pub fn with_password_hasher(mut self, hasher: impl PasswordHasher + 'static) -> Self {
        self.hasher = Some(Arc::new(hasher));
        self
    }

    /// Register an additional permission rule evaluator, consulted after the built-in ones.
    pub fn with_evaluator(mut self, evaluator: impl RuleEvaluator + 'static) -> Self {
        self.policy_engine.add_evaluator(evaluator);
        self
    }

    /// Build the session service.
    pub fn build(self) -> Result<Sessions, Error> {
        let users = self
            .users
            .ok_or(Error::MissingCollaborator("user repository"))?;
        let hasher = self
            .hasher
            .unwrap_or_else(|| Arc::new(Argon2Hasher::default()));
        let config = self.config.unwrap_or_default();

        if !config.can_sign() {
            warn!("no signing key configured, sessions can not be created");
        }

        Ok(Sessions {
            inner: Arc::new(SessionsInner {
                config,
                users,
                hasher,
                policy_engine: self.policy_engine,
                dummy_hash: OnceCell::new(),
            }),
        })
    }
}
