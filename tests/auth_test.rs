//! Identity and session flows: registration, password login, token
//! verification, refresh rotation, and logout.

mod common;

use std::sync::Arc;

use common::{InMemorySessionRepository, InMemoryUserRepository};
use taskdesk::domain::models::{AuthConfig, Role};
use taskdesk::domain::ports::UserRepository;
use taskdesk::services::AuthService;

fn auth_config() -> AuthConfig {
    AuthConfig {
        signing_key: "unit-test-signing-key-0123456789abcdef".into(),
        access_ttl_hours: 24,
        refresh_ttl_days: 7,
        issuer: "taskdesk-test".into(),
    }
}

struct Fixture {
    auth: AuthService,
    users: Arc<InMemoryUserRepository>,
    sessions: Arc<InMemorySessionRepository>,
}

fn fixture() -> Fixture {
    let users = Arc::new(InMemoryUserRepository::new());
    let sessions = Arc::new(InMemorySessionRepository::new());
    let auth = AuthService::new(users.clone(), sessions.clone(), None, auth_config());
    Fixture {
        auth,
        users,
        sessions,
    }
}

#[tokio::test]
async fn first_registration_becomes_admin_then_member() {
    let fx = fixture();
    let (first, _) = fx
        .auth
        .register("founder@example.com", "Founder", "hunter2hunter2")
        .await
        .unwrap();
    assert_eq!(first.role, Role::Admin);

    let (second, _) = fx
        .auth
        .register("later@example.com", "Later", "hunter2hunter2")
        .await
        .unwrap();
    assert_eq!(second.role, Role::Member);
}

#[tokio::test]
async fn registration_validates_input_and_duplicates() {
    let fx = fixture();
    let err = fx
        .auth
        .register("not-an-email", "", "short")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert!(err.details().unwrap().len() >= 3);

    fx.auth
        .register("dup@example.com", "Dup", "passwordpassword")
        .await
        .unwrap();
    let err = fx
        .auth
        .register("DUP@example.com", "Dup Again", "passwordpassword")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT");
}

#[tokio::test]
async fn login_issues_verifiable_claims() {
    let fx = fixture();
    fx.auth
        .register("amy@example.com", "Amy", "correct-horse-battery")
        .await
        .unwrap();

    let (user, tokens) = fx
        .auth
        .authenticate_password("amy@example.com", "correct-horse-battery")
        .await
        .unwrap();
    assert_eq!(tokens.expires_in, 24 * 3600);

    let actor = fx.auth.verify(&tokens.access_token).unwrap();
    assert_eq!(actor.user_id, user.id);
    assert_eq!(actor.email, "amy@example.com");
    assert_eq!(actor.role, Role::Admin);
    assert!(actor.has_permission("tasks.create"));
    assert!(actor.has_permission("departments.delete"));
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_unauthorized() {
    let fx = fixture();
    fx.auth
        .register("bo@example.com", "Bo", "rightpassword")
        .await
        .unwrap();

    let err = fx
        .auth
        .authenticate_password("bo@example.com", "wrongpassword")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    let err = fx
        .auth
        .authenticate_password("ghost@example.com", "whatever")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
}

#[tokio::test]
async fn deactivated_user_cannot_login() {
    let fx = fixture();
    let (user, _) = fx
        .auth
        .register("gone@example.com", "Gone", "passwordpassword")
        .await
        .unwrap();
    fx.users.deactivate(user.id).await.unwrap();

    let err = fx
        .auth
        .authenticate_password("gone@example.com", "passwordpassword")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
}

#[tokio::test]
async fn refresh_rotates_and_old_token_dies() {
    let fx = fixture();
    let (_, tokens) = fx
        .auth
        .register("rot@example.com", "Rot", "passwordpassword")
        .await
        .unwrap();

    let (_, rotated) = fx.auth.refresh(&tokens.refresh_token).await.unwrap();
    assert_ne!(rotated.refresh_token, tokens.refresh_token);

    // The presented token was revoked by the rotation.
    let err = fx.auth.refresh(&tokens.refresh_token).await.unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    // The rotated token still works.
    fx.auth.refresh(&rotated.refresh_token).await.unwrap();
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let fx = fixture();
    let (_, tokens) = fx
        .auth
        .register("bye@example.com", "Bye", "passwordpassword")
        .await
        .unwrap();
    assert_eq!(fx.sessions.active_count(), 1);

    fx.auth.logout(&tokens.refresh_token).await.unwrap();
    assert_eq!(fx.sessions.active_count(), 0);

    let err = fx.auth.refresh(&tokens.refresh_token).await.unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");

    // Logout is idempotent.
    fx.auth.logout(&tokens.refresh_token).await.unwrap();
}

#[tokio::test]
async fn verify_rejects_garbage_and_foreign_signatures() {
    let fx = fixture();
    assert!(fx.auth.verify("not-a-jwt").is_err());

    // A token minted under a different signing key must not verify.
    let other = AuthService::new(
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemorySessionRepository::new()),
        None,
        AuthConfig {
            signing_key: "a-completely-different-signing-key!!".into(),
            ..auth_config()
        },
    );
    let (_, foreign_tokens) = other
        .register("spoof@example.com", "Spoof", "passwordpassword")
        .await
        .unwrap();
    assert!(fx.auth.verify(&foreign_tokens.access_token).is_err());
}
