use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use indoc::formatdoc;
use serde_json::{json, Map};
use tessera_common::{
    codec::{sign, verify},
    config::CONFIG_PATH_ENV,
    id::UserId,
    token::{SessionClaims, TokenType},
    Config,
};
use tessera_session::{
    Argon2Hasher, Error, MemoryUserRepository, PasswordHasher, Sessions, UserRepository,
};

use crate::{fast_hasher, sessions, sessions_with, signing_config};

#[test_log::test(tokio::test)]
async fn test_register_issues_verifiable_pair() {
    let sessions = sessions();
    let pair = sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let users = sessions.get_all().await.unwrap();
    assert_eq!(users.len(), 1);
    let alice = &users[0];
    assert_eq!(alice.username, "alice");
    assert_eq!(alice.email, "a@x.com");
    assert_ne!(alice.password_hash, "pw123");
    assert!(fast_hasher().verify(&alice.password_hash, "pw123").unwrap());

    let config = sessions.config();
    let access = verify(config, &pair.access_token, Some(TokenType::Access)).unwrap();
    let refresh = verify(config, &pair.refresh_token, Some(TokenType::Refresh)).unwrap();

    for verified in [&access, &refresh] {
        let claims = SessionClaims::from_claims(&verified.claims).unwrap();
        assert_eq!(claims.user_id, alice.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.scopes, None);
    }

    assert!(verify(config, &pair.access_token, Some(TokenType::Refresh)).is_none());
    assert!(verify(config, &pair.refresh_token, Some(TokenType::Access)).is_none());
}

#[test_log::test(tokio::test)]
async fn test_register_validates_input() {
    let sessions = sessions();

    let err = sessions.register("al", "a@x.com", "pw123").await.unwrap_err();
    assert!(matches!(err, Error::Validation { field: "username" }));
    assert_eq!(err.to_string(), "length of username must be greater than 2");

    let err = sessions.register("alice", "a@x.com", "pw").await.unwrap_err();
    assert!(matches!(err, Error::Validation { field: "password" }));
    assert_eq!(err.to_string(), "length of password must be greater than 2");

    assert!(sessions.get_all().await.unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_register_rejects_duplicate_email() {
    let sessions = sessions();
    sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let err = sessions
        .register("alice2", "a@x.com", "other")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmailTaken));
    assert_ne!(err.to_string(), Error::Credentials.to_string());

    assert_eq!(sessions.get_all().await.unwrap().len(), 1);
}

#[test_log::test(tokio::test)]
async fn test_login() {
    let sessions = sessions();
    sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let pair = sessions.login("a@x.com", "pw123").await.unwrap();
    let access = verify(sessions.config(), &pair.access_token, Some(TokenType::Access)).unwrap();
    assert_eq!(
        SessionClaims::from_claims(&access.claims).unwrap().user_id,
        UserId::from_uint(1)
    );
}

#[test_log::test(tokio::test)]
async fn test_login_failures_are_indistinguishable() {
    let sessions = sessions();
    sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let wrong_password = sessions.login("a@x.com", "pw124").await.unwrap_err();
    let unknown_email = sessions.login("b@x.com", "pw123").await.unwrap_err();

    assert!(matches!(wrong_password, Error::Credentials));
    assert!(matches!(unknown_email, Error::Credentials));
    assert_eq!(wrong_password.to_string(), "E-Mail or Password incorrect");
    assert_eq!(unknown_email.to_string(), wrong_password.to_string());
}

#[derive(Clone)]
struct CountingHasher {
    inner: Argon2Hasher,
    verifications: Arc<AtomicUsize>,
}

impl PasswordHasher for CountingHasher {
    fn hash(&self, password: &str) -> Result<String, Error> {
        self.inner.hash(password)
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, Error> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(hash, password)
    }
}

#[test_log::test(tokio::test)]
async fn test_unknown_email_still_verifies_a_password() {
    let verifications = Arc::new(AtomicUsize::new(0));
    let sessions = Sessions::builder()
        .with_config(signing_config())
        .with_user_repository(MemoryUserRepository::new())
        .with_password_hasher(CountingHasher {
            inner: fast_hasher(),
            verifications: verifications.clone(),
        })
        .build()
        .unwrap();
    sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    assert!(matches!(
        sessions.login("b@x.com", "pw123").await,
        Err(Error::Credentials)
    ));
    assert_eq!(verifications.load(Ordering::SeqCst), 1);

    assert!(matches!(
        sessions.login("a@x.com", "wrong").await,
        Err(Error::Credentials)
    ));
    assert_eq!(verifications.load(Ordering::SeqCst), 2);

    // the placeholder password opens nothing
    assert!(matches!(
        sessions.login("c@x.com", "tessera-no-such-user").await,
        Err(Error::Credentials)
    ));
}

#[test_log::test(tokio::test)]
async fn test_refresh_rotates_tokens() {
    let sessions = sessions();
    let first = sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let second = sessions.refresh(&first.refresh_token).await.unwrap();
    assert_ne!(second.access_token, first.access_token);
    assert_ne!(second.refresh_token, first.refresh_token);

    let third = sessions.refresh(&second.refresh_token).await.unwrap();
    assert_ne!(third.access_token, first.access_token);
    assert_ne!(third.access_token, second.access_token);

    let config = sessions.config();
    let access = verify(config, &third.access_token, Some(TokenType::Access)).unwrap();
    let claims = SessionClaims::from_claims(&access.claims).unwrap();
    assert_eq!(claims.user_id, UserId::from_uint(1));
    assert_eq!(claims.username, "alice");
    assert!(verify(config, &third.refresh_token, Some(TokenType::Refresh)).is_some());
}

#[test_log::test(tokio::test)]
async fn test_refresh_requires_refresh_token() {
    let sessions = sessions();
    let pair = sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let err = sessions.refresh(&pair.access_token).await.unwrap_err();
    assert!(matches!(err, Error::SessionValidation));
    assert_eq!(err.to_string(), "Failed to validate session");

    assert!(matches!(
        sessions.refresh("garbage").await,
        Err(Error::SessionValidation)
    ));
    assert!(matches!(
        sessions.refresh("").await,
        Err(Error::SessionValidation)
    ));
}

#[test_log::test(tokio::test)]
async fn test_refresh_requires_user_id_claim() {
    let sessions = sessions();
    let no_user_id = sign(
        &signing_config(),
        json!({ "username": "alice" }).as_object().unwrap(),
        TokenType::Refresh,
    )
    .unwrap();

    assert!(matches!(
        sessions.refresh(&no_user_id).await,
        Err(Error::SessionValidation)
    ));

    let zero_user_id = sign(
        &signing_config(),
        json!({ "userId": 0, "username": "alice" }).as_object().unwrap(),
        TokenType::Refresh,
    )
    .unwrap();

    assert!(matches!(
        sessions.refresh(&zero_user_id).await,
        Err(Error::SessionValidation)
    ));
}

#[test_log::test(tokio::test)]
async fn test_refresh_for_unknown_user() {
    let sessions = sessions();
    let orphan = sign(
        &signing_config(),
        &SessionClaims {
            user_id: UserId::from_uint(42),
            username: "ghost".to_string(),
            scopes: None,
        }
        .to_claims(),
        TokenType::Refresh,
    )
    .unwrap();

    let err = sessions.refresh(&orphan).await.unwrap_err();
    assert!(matches!(err, Error::SessionInvalid));
    assert_eq!(err.to_string(), "Session is invalid");
}

#[test_log::test(tokio::test)]
async fn test_refresh_token_from_foreign_key_is_rejected() {
    let foreign = Config::builder()
        .with_private_key_pem(include_bytes!("../../../../testdata/foreign-key.pem"))
        .unwrap()
        .build();
    let sessions = sessions();
    sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let forged = sign(
        &foreign,
        &SessionClaims {
            user_id: UserId::from_uint(1),
            username: "alice".to_string(),
            scopes: None,
        }
        .to_claims(),
        TokenType::Refresh,
    )
    .unwrap();

    assert!(matches!(
        sessions.refresh(&forged).await,
        Err(Error::SessionValidation)
    ));
}

#[test_log::test(tokio::test)]
async fn test_missing_signing_key() {
    let sessions = Sessions::builder()
        .with_user_repository(MemoryUserRepository::new())
        .with_password_hasher(fast_hasher())
        .build()
        .unwrap();

    let err = sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SessionCreation));
    assert_eq!(err.to_string(), "Failed to create session");

    // the user was created before signing failed
    assert_eq!(sessions.get_all().await.unwrap().len(), 1);

    assert!(matches!(
        sessions.login("a@x.com", "pw123").await,
        Err(Error::SessionCreation)
    ));
    assert!(matches!(
        sessions.refresh("anything").await,
        Err(Error::SessionValidation)
    ));
}

#[test_log::test(tokio::test)]
async fn test_verify_only_config_can_not_issue_sessions() {
    let verify_only = Config::builder()
        .with_certificate_pem(include_bytes!("../../../../testdata/signing-cert.pem"))
        .unwrap()
        .build();
    let sessions = Sessions::builder()
        .with_config(verify_only)
        .with_user_repository(MemoryUserRepository::new())
        .with_password_hasher(fast_hasher())
        .build()
        .unwrap();

    assert!(matches!(
        sessions.register("alice", "a@x.com", "pw123").await,
        Err(Error::SessionCreation)
    ));
}

#[test_log::test(tokio::test)]
async fn test_access_token_carries_user_scopes() {
    let users = MemoryUserRepository::new();
    users
        .create(tessera_session::NewUser {
            username: "admin".to_string(),
            email: "admin@x.com".to_string(),
            password_hash: fast_hasher().hash("pw123").unwrap(),
            scopes: Some(["read".to_string(), "write".to_string()].into_iter().collect()),
        })
        .await
        .unwrap();
    let sessions = sessions_with(users);

    let pair = sessions.login("admin@x.com", "pw123").await.unwrap();
    let config = sessions.config();

    let access = verify(config, &pair.access_token, Some(TokenType::Access)).unwrap();
    assert_eq!(access.claim("scopes"), Some(&json!(["read", "write"])));

    let refresh = verify(config, &pair.refresh_token, Some(TokenType::Refresh)).unwrap();
    assert_eq!(refresh.claim("scopes"), None);
}

#[test_log::test(tokio::test)]
async fn test_passthrough_reads() {
    let sessions = sessions();
    sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();
    sessions
        .register("bob", "b@x.com", "pw123")
        .await
        .unwrap();

    let all = sessions.get_all().await.unwrap();
    assert_eq!(
        all.iter().map(|user| user.username.as_str()).collect::<Vec<_>>(),
        vec!["alice", "bob"]
    );

    let bob = sessions.get_by_id(UserId::from_uint(2)).await.unwrap().unwrap();
    assert_eq!(bob.email, "b@x.com");
    assert_eq!(sessions.get_by_id(UserId::from_uint(3)).await.unwrap(), None);
}

#[test_log::test(tokio::test)]
async fn test_session_pair_serialization() {
    let pair = sessions()
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();

    let json = serde_json::to_value(&pair).unwrap();
    let object: &Map<_, _> = json.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(object["accessToken"], json!(pair.access_token));
    assert_eq!(object["refreshToken"], json!(pair.refresh_token));
}

#[test]
fn test_repository_is_required() {
    assert!(matches!(
        Sessions::builder().with_config(signing_config()).build(),
        Err(Error::MissingCollaborator(_))
    ));
}

// the only test in this binary touching the process environment
#[test_log::test(tokio::test)]
async fn test_sessions_from_environment() {
    let config_file = format!("{}/tessera-session.toml", env!("CARGO_TARGET_TMPDIR"));
    std::fs::write(
        &config_file,
        formatdoc! {r#"
            [keys]
            private-key-file = "{dir}/../../testdata/signing-key.pem"
            "#,
            dir = env!("CARGO_MANIFEST_DIR"),
        },
    )
    .unwrap();

    std::env::set_var(CONFIG_PATH_ENV, &config_file);
    let sessions = Sessions::builder()
        .from_environment()
        .unwrap()
        .with_user_repository(MemoryUserRepository::new())
        .with_password_hasher(fast_hasher())
        .build()
        .unwrap();
    std::env::remove_var(CONFIG_PATH_ENV);

    assert!(sessions.config().can_sign());
    sessions
        .register("alice", "a@x.com", "pw123")
        .await
        .unwrap();
}
