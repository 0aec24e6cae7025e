//! Federated identity provider port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Verified identity extracted from an IdP id-token.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    /// Stable subject claim at the issuer.
    pub subject: String,
    pub email: String,
    pub name: String,
}

/// Client interface for the external OIDC issuer. The implementation
/// exchanges the authorization code and verifies the returned id-token
/// signature and audience against the issuer's published keys.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authorization URL carrying the CSRF `state`. Fails when the
    /// configured issuer or redirect URL cannot be parsed.
    fn authorize_url(&self, state: &str) -> DomainResult<String>;

    /// Exchange `code`, verify the id-token, and return the identity.
    async fn exchange_code(&self, code: &str) -> DomainResult<FederatedIdentity>;
}
