//! Outlook client over Microsoft Graph.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{MailMessage, MailProvider, MailProviderConfig};
use crate::domain::ports::{MailProviderClient, OAuthTokens};

use super::{error_for_status, html_to_text, post_token_form, RateLimiter};

const LOGIN_BASE: &str = "https://login.microsoftonline.com/common/oauth2/v2.0";
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Delegated scopes; `offline_access` yields the refresh token.
const SCOPES: &str = "offline_access User.Read Mail.Read";

pub struct OutlookClient {
    http: Client,
    config: MailProviderConfig,
    /// Graph throttles per app+mailbox; stay well under it.
    rate_limiter: Arc<Mutex<RateLimiter>>,
    login_base: String,
    graph_base: String,
}

impl OutlookClient {
    pub fn new(config: MailProviderConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                60,
                Duration::from_secs(60),
            ))),
            login_base: LOGIN_BASE.to_string(),
            graph_base: GRAPH_BASE.to_string(),
        }
    }

    /// Point the client at different endpoints (tests).
    #[doc(hidden)]
    pub fn with_bases(mut self, login_base: String, graph_base: String) -> Self {
        self.login_base = login_base;
        self.graph_base = graph_base;
        self
    }
}

#[async_trait]
impl MailProviderClient for OutlookClient {
    fn provider(&self) -> MailProvider {
        MailProvider::Outlook
    }

    fn authorize_url(&self, state: &str) -> DomainResult<String> {
        let mut url = url::Url::parse(&format!("{}/authorize", self.login_base))
            .map_err(|e| {
                DomainError::ValidationFailed(format!("invalid Microsoft login URL: {e}"))
            })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_mode", "query")
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> DomainResult<OAuthTokens> {
        post_token_form(
            &self.http,
            &format!("{}/token", self.login_base),
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
            &format!("{}/token", self.login_base),
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn revoke(&self, _refresh_token: &str) -> DomainResult<()> {
        // Graph has no token revocation endpoint for delegated refresh
        // tokens; invalidation happens when the user removes consent.
        tracing::debug!("outlook revoke is a no-op upstream");
        Ok(())
    }

    async fn account_email(&self, access_token: &str) -> DomainResult<String> {
        self.rate_limiter.lock().await.acquire().await;
        let response = self
            .http
            .get(format!("{}/me", self.graph_base))
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "graph /me").await);
        }
        let me: GraphUser = response.json().await?;
        Ok(me.mail.unwrap_or(me.user_principal_name))
    }

    async fn fetch_unread(
        &self,
        access_token: &str,
        folder: &str,
        since: Option<DateTime<Utc>>,
    ) -> DomainResult<Vec<MailMessage>> {
        self.rate_limiter.lock().await.acquire().await;

        let mut filter = "isRead eq false".to_string();
        if let Some(since) = since {
            filter.push_str(&format!(
                " and receivedDateTime gt {}",
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        let folder_segment = if folder.eq_ignore_ascii_case("inbox") {
            "inbox".to_string()
        } else {
            folder.to_string()
        };

        let response = self
            .http
            .get(format!(
                "{}/me/mailFolders/{}/messages",
                self.graph_base, folder_segment
            ))
            .bearer_auth(access_token)
            .query(&[
                ("$filter", filter.as_str()),
                ("$select", "id,subject,from,receivedDateTime,body,bodyPreview"),
                ("$orderby", "receivedDateTime asc"),
                ("$top", "50"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, "graph messages").await);
        }
        let body: GraphMessagesResponse = response.json().await?;

        Ok(body
            .value
            .into_iter()
            .map(|m| {
                let body_text = match m.body {
                    Some(body) if body.content_type.eq_ignore_ascii_case("html") => {
                        html_to_text(&body.content)
                    }
                    Some(body) => body.content,
                    None => m.body_preview.unwrap_or_default(),
                };
                MailMessage {
                    id: m.id,
                    subject: m.subject.unwrap_or_default(),
                    sender: m
                        .from
                        .and_then(|f| f.email_address)
                        .map(|e| e.address)
                        .unwrap_or_default(),
                    body_text,
                    received_at: m.received_date_time,
                    folder: folder.to_string(),
                }
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    #[serde(default)]
    mail: Option<String>,
    user_principal_name: String,
}

#[derive(Debug, Deserialize)]
struct GraphMessagesResponse {
    #[serde(default = "Vec::new")]
    value: Vec<GraphMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Option<GraphRecipient>,
    #[serde(default)]
    received_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    body: Option<GraphBody>,
    #[serde(default)]
    body_preview: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    #[serde(default)]
    email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
struct GraphEmailAddress {
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody {
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    content: String,
}
