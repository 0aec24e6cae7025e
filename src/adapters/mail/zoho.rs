//! Zoho Mail client.
//!
//! Wraps the Zoho accounts OAuth endpoints and the Zoho Mail REST API
//! for the operations the sync service needs: code/refresh exchange,
//! revocation, account discovery, and unread-message listing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{MailMessage, MailProvider, MailProviderConfig};
use crate::domain::ports::{MailProviderClient, OAuthTokens};

use super::{error_for_status, html_to_text, post_token_form, RateLimiter};

const ACCOUNTS_BASE: &str = "https://accounts.zoho.com/oauth/v2";
const MAIL_API_BASE: &str = "https://mail.zoho.com/api";

/// Scopes: read messages and account metadata.
const SCOPES: &str = "ZohoMail.messages.READ,ZohoMail.accounts.READ";

pub struct ZohoClient {
    http: Client,
    config: MailProviderConfig,
    /// Zoho allows roughly 100 API calls per minute per account.
    rate_limiter: Arc<Mutex<RateLimiter>>,
    accounts_base: String,
    api_base: String,
}

impl ZohoClient {
    pub fn new(config: MailProviderConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                100,
                Duration::from_secs(60),
            ))),
            accounts_base: ACCOUNTS_BASE.to_string(),
            api_base: MAIL_API_BASE.to_string(),
        }
    }

    /// Point the client at different endpoints (tests).
    #[doc(hidden)]
    pub fn with_bases(mut self, accounts_base: String, api_base: String) -> Self {
        self.accounts_base = accounts_base;
        self.api_base = api_base;
        self
    }

    /// The primary Zoho Mail account id for this token.
    async fn primary_account(&self, access_token: &str) -> DomainResult<ZohoAccount> {
        self.rate_limiter.lock().await.acquire().await;
        let response = self
            .http
            .get(format!("{}/accounts", self.api_base))
            .header("Authorization", format!("Zoho-oauthtoken {access_token}"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "zoho accounts").await);
        }
        let body: ZohoListResponse<ZohoAccount> = response.json().await?;
        body.data
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::ExternalError("zoho token has no mail account".into()))
    }
}

#[async_trait]
impl MailProviderClient for ZohoClient {
    fn provider(&self) -> MailProvider {
        MailProvider::Zoho
    }

    fn authorize_url(&self, state: &str) -> DomainResult<String> {
        let mut url = url::Url::parse(&format!("{}/auth", self.accounts_base))
            .map_err(|e| DomainError::ValidationFailed(format!("invalid Zoho auth URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", SCOPES)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("state", state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> DomainResult<OAuthTokens> {
        post_token_form(
            &self.http,
            &format!("{}/token", self.accounts_base),
            &[
                ("grant_type", "authorization_code"),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_url),
                ("code", code),
            ],
        )
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> DomainResult<OAuthTokens> {
        post_token_form(
            &self.http,
            &format!("{}/token", self.accounts_base),
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn revoke(&self, refresh_token: &str) -> DomainResult<()> {
        let response = self
            .http
            .post(format!("{}/token/revoke", self.accounts_base))
            .form(&[("token", refresh_token)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "zoho revoke").await);
        }
        Ok(())
    }

    async fn account_email(&self, access_token: &str) -> DomainResult<String> {
        let account = self.primary_account(access_token).await?;
        Ok(account.primary_email_address)
    }

    async fn fetch_unread(
        &self,
        access_token: &str,
        folder: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<MailMessage>> {
        let account = self.primary_account(access_token).await?;

        self.rate_limiter.lock().await.acquire().await;
        let mut request = self
            .http
            .get(format!(
                "{}/accounts/{}/messages/view",
                self.api_base, account.account_id
            ))
            .header("Authorization", format!("Zoho-oauthtoken {access_token}"))
            .query(&[("status", "unread"), ("limit", "50")]);
        if let Some(since) = since {
            request = request.query(&[("receivedTime", since.timestamp_millis().to_string())]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "zoho messages").await);
        }
        let body: ZohoListResponse<ZohoMessage> = response.json().await?;

        let folder_lower = folder.to_lowercase();
        let mut messages: Vec<MailMessage> = body
            .data
            .into_iter()
            .filter(|m| {
                m.folder_name.is_empty() || m.folder_name.to_lowercase() == folder_lower
            })
            .map(|m| {
                let received_at = m
                    .received_time
                    .parse::<i64>()
                    .ok()
                    .and_then(DateTime::from_timestamp_millis);
                MailMessage {
                    id: m.message_id,
                    subject: m.subject,
                    sender: m.from_address,
                    body_text: html_to_text(&m.summary),
                    received_at,
                    folder: folder.to_string(),
                }
            })
            .collect();
        messages.sort_by_key(|m| m.received_at);
        Ok(messages)
    }
}

#[derive(Debug, Deserialize)]
struct ZohoListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZohoAccount {
    account_id: String,
    primary_email_address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZohoMessage {
    message_id: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    from_address: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    received_time: String,
    #[serde(default)]
    folder_name: String,
}
