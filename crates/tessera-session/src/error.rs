use tessera_common::ConfigError;

/// Errors returned by the session flows and their collaborators.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Registration input was rejected.
    #[error("length of {field} must be greater than 2")]
    Validation {
        /// The offending input field.
        field: &'static str,
    },

    /// Login failed.
    ///
    /// Deliberately the same for an unknown e-mail and a wrong password.
    #[error("E-Mail or Password incorrect")]
    Credentials,

    /// The refresh token was not a valid refresh token carrying a user id.
    #[error("Failed to validate session")]
    SessionValidation,

    /// The refresh token names a user that does not exist.
    #[error("Session is invalid")]
    SessionInvalid,

    /// A token could not be signed after all checks passed.
    ///
    /// Indicates a missing or broken signing key.
    #[error("Failed to create session")]
    SessionCreation,

    /// The repository already has a user with this e-mail address.
    #[error("e-mail address already registered")]
    EmailTaken,

    /// Key configuration problem.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The session service was built without a required collaborator.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    /// A user repository failure.
    #[error("repository error: {0}")]
    Repository(anyhow::Error),

    /// A password hashing failure.
    #[error("password hash error: {0}")]
    PasswordHash(anyhow::Error),

    /// Other type of unclassified error.
    #[error("unclassified error: {0}")]
    Unclassified(anyhow::Error),
}

pub(crate) fn unclassified(err: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::Unclassified(anyhow::Error::from(err))
}

pub(crate) fn password_hash(err: argon2::password_hash::Error) -> Error {
    Error::PasswordHash(anyhow::anyhow!(err))
}

pub(crate) fn password_hash_params(err: argon2::Error) -> Error {
    Error::PasswordHash(anyhow::anyhow!(err))
}
