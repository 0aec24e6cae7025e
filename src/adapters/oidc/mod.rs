//! External identity provider adapters.

pub mod keycloak;

pub use keycloak::KeycloakProvider;
