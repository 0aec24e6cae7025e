//! Identity and session service.
//!
//! Federates external OIDC identity, optionally authenticates local
//! passwords, and mints the service's own short-lived session tokens.
//! Access tokens are stateless HS256 JWTs; refresh tokens are random,
//! stored hashed, and rotated on every refresh.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng as PasswordOsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult, FieldError};
use crate::domain::models::{Actor, AuthConfig, AuthTokens, Claims, Role, Session, User};
use crate::domain::ports::{IdentityProvider, SessionRepository, UserRepository};
use crate::services::authorization::role_permissions;

/// The service's login/refresh/verify surface.
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    idp: Option<Arc<dyn IdentityProvider>>,
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        idp: Option<Arc<dyn IdentityProvider>>,
        config: AuthConfig,
    ) -> Self {
        let encoding_key = EncodingKey::from_secret(config.signing_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.signing_key.as_bytes());
        Self {
            users,
            sessions,
            idp,
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Authorization URL for the federated login flow.
    pub fn federated_authorize_url(&self, state: &str) -> DomainResult<String> {
        let idp = self
            .idp
            .as_ref()
            .ok_or_else(|| DomainError::ValidationFailed("federated login is not configured".into()))?;
        idp.authorize_url(state)
    }

    /// Exchange an authorization code, find-or-create the local user
    /// keyed by the external subject, and open a session.
    pub async fn federate(&self, code: &str) -> DomainResult<(User, AuthTokens)> {
        let idp = self
            .idp
            .as_ref()
            .ok_or_else(|| DomainError::ValidationFailed("federated login is not configured".into()))?;
        let identity = idp.exchange_code(code).await?;

        let user = match self.users.get_by_oidc_subject(&identity.subject).await? {
            Some(user) => user,
            None => {
                // Link by email when a local account predates federation.
                match self.users.get_by_email(&identity.email).await? {
                    Some(mut user) => {
                        user.oidc_subject = Some(identity.subject.clone());
                        user.updated_at = Utc::now();
                        self.users.update(&user).await?;
                        user
                    }
                    None => {
                        let role = if self.users.any_exists().await? {
                            Role::Member
                        } else {
                            Role::Admin
                        };
                        let mut user = User::new(identity.email.clone(), identity.name.clone(), role);
                        user.oidc_subject = Some(identity.subject.clone());
                        self.users.create(&user).await?;
                        tracing::info!(user_id = %user.id, "created user from federated identity");
                        user
                    }
                }
            }
        };

        if !user.is_active {
            return Err(DomainError::Unauthorized);
        }
        let tokens = self.open_session(&user).await?;
        Ok((user, tokens))
    }

    /// Local registration. The first registered user becomes Admin.
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> DomainResult<(User, AuthTokens)> {
        let mut errors = Vec::new();
        if !email.contains('@') || email.len() > 255 {
            errors.push(FieldError::new("email", "must be a valid email address"));
        }
        if name.trim().is_empty() || name.len() > 255 {
            errors.push(FieldError::new("name", "must be 1..255 characters"));
        }
        if password.len() < 8 {
            errors.push(FieldError::new("password", "must be at least 8 characters"));
        }
        if !errors.is_empty() {
            return Err(DomainError::ValidationDetails(errors));
        }
        if self.users.get_by_email(email).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "a user with email {email} already exists"
            )));
        }

        let role = if self.users.any_exists().await? {
            Role::Member
        } else {
            Role::Admin
        };
        let mut user = User::new(email.to_lowercase(), name.trim(), role);
        user.password_hash = Some(hash_password(password)?);
        self.users.create(&user).await?;

        let tokens = self.open_session(&user).await?;
        Ok((user, tokens))
    }

    /// Password login. Rejects deactivated users and federated-only
    /// accounts without leaking which condition failed.
    pub async fn authenticate_password(
        &self,
        email: &str,
        password: &str,
    ) -> DomainResult<(User, AuthTokens)> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or(DomainError::Unauthorized)?;
        let digest = user.password_hash.as_deref().ok_or(DomainError::Unauthorized)?;
        if !verify_password(password, digest) || !user.is_active {
            return Err(DomainError::Unauthorized);
        }
        let tokens = self.open_session(&user).await?;
        Ok((user, tokens))
    }

    /// Rotate a refresh token: revoke the presented session, open a new
    /// one. Rejects revoked, expired, and deactivated-user sessions.
    pub async fn refresh(&self, refresh_token: &str) -> DomainResult<(User, AuthTokens)> {
        let hash = hash_refresh_token(refresh_token);
        let session = self
            .sessions
            .get_by_token_hash(&hash)
            .await?
            .ok_or(DomainError::Unauthorized)?;
        if session.revoked || session.expires_at <= Utc::now() {
            return Err(DomainError::Unauthorized);
        }
        let user = self
            .users
            .get(session.user_id)
            .await?
            .ok_or(DomainError::Unauthorized)?;
        if !user.is_active {
            return Err(DomainError::Unauthorized);
        }

        self.sessions.revoke(session.id).await?;
        let tokens = self.open_session(&user).await?;
        Ok((user, tokens))
    }

    /// Revoke the session behind a refresh token. Unknown tokens are a
    /// no-op so logout is idempotent.
    pub async fn logout(&self, refresh_token: &str) -> DomainResult<()> {
        let hash = hash_refresh_token(refresh_token);
        if let Some(session) = self.sessions.get_by_token_hash(&hash).await? {
            self.sessions.revoke(session.id).await?;
        }
        Ok(())
    }

    /// Verify an access token and produce the typed Actor.
    pub fn verify(&self, access_token: &str) -> DomainResult<Actor> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let data = jsonwebtoken::decode::<Claims>(access_token, &self.decoding_key, &validation)
            .map_err(|e| DomainError::TokenInvalid(e.to_string()))?;
        Ok(Actor::from(data.claims))
    }

    /// Mint an access/refresh pair and persist the refresh session.
    async fn open_session(&self, user: &User) -> DomainResult<AuthTokens> {
        let now = Utc::now();
        let expires_in = Duration::hours(self.config.access_ttl_hours);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            department_id: user.department_id,
            permissions: role_permissions(user.role)
                .iter()
                .map(|p| p.to_string())
                .collect(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            iss: self.config.issuer.clone(),
        };
        let access_token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| DomainError::TokenInvalid(e.to_string()))?;

        let refresh_token = generate_refresh_token();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            refresh_token_hash: hash_refresh_token(&refresh_token),
            expires_at: now + Duration::days(self.config.refresh_ttl_days),
            revoked: false,
            created_at: now,
        };
        self.sessions.create(&session).await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: expires_in.num_seconds(),
        })
    }
}

/// Argon2id digest of a password.
pub fn hash_password(password: &str) -> DomainResult<String> {
    let salt = SaltString::generate(&mut PasswordOsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::CryptoError(format!("password hashing failed: {e}")))
}

/// Constant-time password check against a stored digest.
pub fn verify_password(password: &str, digest: &str) -> bool {
    PasswordHash::new(digest)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// 256-bit random refresh token, base64url.
fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex of a refresh token; only this form is persisted.
pub fn hash_refresh_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_digest_round_trips() {
        let digest = hash_password("correct horse battery staple").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(verify_password("correct horse battery staple", &digest));
        assert!(!verify_password("wrong", &digest));
    }

    #[test]
    fn malformed_digest_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn refresh_tokens_are_unique_and_hash_deterministically() {
        let a = generate_refresh_token();
        let b = generate_refresh_token();
        assert_ne!(a, b);
        assert_eq!(hash_refresh_token(&a), hash_refresh_token(&a));
        assert_ne!(hash_refresh_token(&a), hash_refresh_token(&b));
        // hex sha-256
        assert_eq!(hash_refresh_token(&a).len(), 64);
    }
}
