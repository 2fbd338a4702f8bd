//! User records and the repository they live in.

use std::{collections::BTreeMap, future::Future, pin::Pin, sync::Arc};

use fnv::FnvHashSet;
use serde::Serialize;
use tessera_common::id::UserId;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::Error;

/// A boxed future returned by [UserRepository] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered user.
#[derive(Clone, PartialEq, Eq, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Repository-assigned id.
    pub id: UserId,

    /// Display name, also carried in session tokens.
    pub username: String,

    /// Unique e-mail address used for login.
    pub email: String,

    /// Password hash in PHC string format.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Scopes granted to the user's access tokens.
    pub scopes: Option<FnvHashSet<String>>,

    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Last modification time.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A user that is not persisted yet.
#[derive(Clone, Debug)]
pub struct NewUser {
    /// Display name.
    pub username: String,

    /// E-mail address, must be unique within the repository.
    pub email: String,

    /// Password hash in PHC string format.
    pub password_hash: String,

    /// Initial scopes.
    pub scopes: Option<FnvHashSet<String>>,
}

/// Storage of [User] records.
///
/// Implementations must reject a [NewUser] whose e-mail is already registered
/// with [Error::EmailTaken].
pub trait UserRepository: Send + Sync {
    /// All users, ordered by id.
    fn find_all(&self) -> BoxFuture<'_, Result<Vec<User>, Error>>;

    /// Look up a user by id.
    fn find_by_id(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>, Error>>;

    /// Look up a user by e-mail address.
    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<Option<User>, Error>>;

    /// Persist a new user, assigning its id and timestamps.
    fn create(&self, user: NewUser) -> BoxFuture<'_, Result<User, Error>>;

    /// Persist changes to an existing user, refreshing `updated_at`.
    fn save(&self, user: User) -> BoxFuture<'_, Result<User, Error>>;
}

impl<R: UserRepository + ?Sized> UserRepository for Arc<R> {
    fn find_all(&self) -> BoxFuture<'_, Result<Vec<User>, Error>> {
        (**self).find_all()
    }

    fn find_by_id(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>, Error>> {
        (**self).find_by_id(id)
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<Option<User>, Error>> {
        (**self).find_by_email(email)
    }

    fn create(&self, user: NewUser) -> BoxFuture<'_, Result<User, Error>> {
        (**self).create(user)
    }

    fn save(&self, user: User) -> BoxFuture<'_, Result<User, Error>> {
        (**self).save(user)
    }
}

/// An in-process [UserRepository].
#[derive(Default, Debug)]
pub struct MemoryUserRepository {
    state: RwLock<MemoryState>,
}

#[derive(Default, Debug)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    last_id: u64,
}

impl MemoryUserRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryState {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.users
            .values()
            .any(|user| user.email == email && Some(user.id) != except)
    }
}

impl UserRepository for MemoryUserRepository {
    fn find_all(&self) -> BoxFuture<'_, Result<Vec<User>, Error>> {
        Box::pin(async move { Ok(self.state.read().await.users.values().cloned().collect()) })
    }

    fn find_by_id(&self, id: UserId) -> BoxFuture<'_, Result<Option<User>, Error>> {
        Box::pin(async move { Ok(self.state.read().await.users.get(&id).cloned()) })
    }

    fn find_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<Option<User>, Error>> {
        Box::pin(async move {
            Ok(self
                .state
                .read()
                .await
                .users
                .values()
                .find(|user| user.email == email)
                .cloned())
        })
    }

    fn create(&self, user: NewUser) -> BoxFuture<'_, Result<User, Error>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if state.email_taken(&user.email, None) {
                return Err(Error::EmailTaken);
            }

            state.last_id += 1;
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: UserId::from_uint(state.last_id),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                scopes: user.scopes,
                created_at: now,
                updated_at: now,
            };
            state.users.insert(user.id, user.clone());

            Ok(user)
        })
    }

    fn save(&self, mut user: User) -> BoxFuture<'_, Result<User, Error>> {
        Box::pin(async move {
            let mut state = self.state.write().await;
            if !state.users.contains_key(&user.id) {
                return Err(Error::Repository(anyhow::anyhow!(
                    "user {} does not exist",
                    user.id
                )));
            }
            if state.email_taken(&user.email, Some(user.id)) {
                return Err(Error::EmailTaken);
            }

            user.updated_at = OffsetDateTime::now_utc();
            state.users.insert(user.id, user.clone());

            Ok(user)
        })
    }
}
