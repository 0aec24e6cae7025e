//! Mail provider clients.
//!
//! One module per provider, sharing the token-endpoint plumbing, a
//! token-bucket rate limiter, and HTML-to-text normalization so the
//! extractor always sees plain text.

pub mod outlook;
pub mod zoho;

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::OAuthTokens;

pub use outlook::OutlookClient;
pub use zoho::ZohoClient;

/// Token-bucket rate limiter.
///
/// Allows up to `capacity` requests per `window`. When the bucket is
/// exhausted, [`acquire`](RateLimiter::acquire) sleeps until a token
/// becomes available.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    tokens: u32,
    window: Duration,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            tokens: capacity,
            window,
            window_start: Instant::now(),
        }
    }

    /// Acquire a single token, sleeping if necessary.
    pub async fn acquire(&mut self) {
        let elapsed = self.window_start.elapsed();
        if elapsed >= self.window {
            self.tokens = self.capacity;
            self.window_start = Instant::now();
        }

        if self.tokens > 0 {
            self.tokens -= 1;
        } else {
            let remaining = self.window.saturating_sub(elapsed);
            tracing::warn!(
                sleep_ms = remaining.as_millis() as u64,
                "mail provider rate limit reached, sleeping"
            );
            tokio::time::sleep(remaining).await;
            self.tokens = self.capacity - 1;
            self.window_start = Instant::now();
        }
    }
}

/// Wire shape of the OAuth token endpoints (both providers).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// POST a form to a token endpoint and parse the standard response.
pub(crate) async fn post_token_form(
    http: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> DomainResult<OAuthTokens> {
    let response = http.post(url).form(params).send().await?;
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(DomainError::RateLimited("token endpoint throttled".into()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DomainError::ExternalError(format!(
            "token endpoint returned {status}: {}",
            truncate(&body, 200)
        )));
    }
    let token: TokenResponse = response.json().await?;
    Ok(OAuthTokens {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_in: token.expires_in,
    })
}

/// Map a non-success API response to a domain error.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
    context: &str,
) -> DomainError {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return DomainError::RateLimited(format!("{context} throttled"));
    }
    let body = response.text().await.unwrap_or_default();
    DomainError::ExternalError(format!(
        "{context} returned {status}: {}",
        truncate(&body, 200)
    ))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Strip tags from an HTML body and collapse whitespace. Good enough
/// for task descriptions; not a general HTML renderer.
pub(crate) fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_reduced_to_text() {
        let html = "<html><body><p>Please&nbsp;review the <b>Q3 report</b>.</p><br/>Thanks</body></html>";
        assert_eq!(html_to_text(html), "Please review the Q3 report . Thanks");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(html_to_text("a &amp; b &lt;c&gt;"), "a & b <c>");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 200), "hello");
        assert_eq!(truncate("héllo wörld", 4), "héll");
    }
}
