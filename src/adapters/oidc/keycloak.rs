//! Keycloak OIDC client.
//!
//! Exchanges authorization codes at the realm's token endpoint and
//! verifies the returned id-token against the realm's published JWKS
//! before trusting any claim in it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::OidcConfig;
use crate::domain::ports::{FederatedIdentity, IdentityProvider};

/// How long a fetched JWKS stays trusted before refetching.
const JWKS_TTL: Duration = Duration::from_secs(3600);

pub struct KeycloakProvider {
    http: Client,
    config: OidcConfig,
    jwks: RwLock<Option<(Instant, JwkSet)>>,
}

impl KeycloakProvider {
    pub fn new(config: OidcConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            jwks: RwLock::new(None),
        }
    }

    fn token_endpoint(&self) -> String {
        format!(
            "{}/protocol/openid-connect/token",
            self.config.issuer_url.trim_end_matches('/')
        )
    }

    fn jwks_endpoint(&self) -> String {
        format!(
            "{}/protocol/openid-connect/certs",
            self.config.issuer_url.trim_end_matches('/')
        )
    }

    async fn jwks(&self, force_refresh: bool) -> DomainResult<JwkSet> {
        if !force_refresh {
            let cached = self.jwks.read().await;
            if let Some((fetched_at, ref set)) = *cached {
                if fetched_at.elapsed() < JWKS_TTL {
                    return Ok(set.clone());
                }
            }
        }

        let response = self.http.get(self.jwks_endpoint()).send().await?;
        if !response.status().is_success() {
            return Err(DomainError::ExternalError(format!(
                "JWKS fetch returned {}",
                response.status()
            )));
        }
        let set: JwkSet = response.json().await?;
        *self.jwks.write().await = Some((Instant::now(), set.clone()));
        Ok(set)
    }

    /// Verify the id-token signature, issuer, and audience, and pull
    /// the identity claims out of it.
    async fn verify_id_token(&self, id_token: &str) -> DomainResult<FederatedIdentity> {
        let header = decode_header(id_token)
            .map_err(|e| DomainError::TokenInvalid(format!("id-token header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| DomainError::TokenInvalid("id-token missing kid".into()))?;

        // Refetch once on kid miss: the realm may have rotated keys.
        let mut jwks = self.jwks(false).await?;
        if jwks.find(&kid).is_none() {
            jwks = self.jwks(true).await?;
        }
        let jwk = jwks
            .find(&kid)
            .ok_or_else(|| DomainError::TokenInvalid(format!("unknown signing key '{kid}'")))?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| DomainError::TokenInvalid(format!("JWKS key: {e}")))?;

        let mut validation = Validation::new(header.alg);
        // Keycloak signs id-tokens with RS256 by default; reject the
        // rest outright rather than trusting the header blindly.
        if header.alg != Algorithm::RS256 {
            return Err(DomainError::TokenInvalid(format!(
                "unexpected id-token algorithm {:?}",
                header.alg
            )));
        }
        validation.set_audience(&[&self.config.client_id]);
        validation.set_issuer(&[self.config.issuer_url.trim_end_matches('/')]);

        let data = decode::<IdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| DomainError::TokenInvalid(format!("id-token: {e}")))?;
        let claims = data.claims;

        let email = claims
            .email
            .or(claims.preferred_username)
            .ok_or_else(|| DomainError::TokenInvalid("id-token carries no email".into()))?;
        let name = claims.name.unwrap_or_else(|| email.clone());

        Ok(FederatedIdentity {
            subject: claims.sub,
            email,
            name,
        })
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    fn authorize_url(&self, state: &str) -> DomainResult<String> {
        let mut url = url::Url::parse(&format!(
            "{}/protocol/openid-connect/auth",
            self.config.issuer_url.trim_end_matches('/')
        ))
        .map_err(|e| {
            DomainError::ValidationFailed(format!("invalid OIDC issuer URL: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("scope", "openid email profile")
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> DomainResult<FederatedIdentity> {
        let response = self
            .http
            .post(self.token_endpoint())
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("code", code),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(DomainError::Unauthorized);
        }
        let token: TokenEndpointResponse = response.json().await?;
        self.verify_id_token(&token.id_token).await
    }
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    id_token: String,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}
