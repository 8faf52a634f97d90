//! HTTP plumbing shared by the remote sources.

use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::source::pacer::RequestPacer;

/// A fetched HTTP body and its declared content type.
#[derive(Debug, Clone)]
pub struct HttpBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// GET client with identifying headers, a 403 fallback agent and request
/// pacing.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    fallback_user_agent: Option<String>,
    contact_email: Option<String>,
    pacer: RequestPacer,
}

impl HttpFetcher {
    pub fn new(
        timeout: Duration,
        user_agent: impl Into<String>,
        fallback_user_agent: Option<String>,
        contact_email: Option<String>,
        pacer: RequestPacer,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MirrorError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: user_agent.into(),
            fallback_user_agent,
            contact_email,
            pacer,
        })
    }

    /// Build a fetcher from mirror settings.
    pub fn from_config(config: &MirrorConfig) -> Result<Self> {
        let fallback = Some(config.fallback_user_agent.clone()).filter(|ua| !ua.trim().is_empty());
        Self::new(
            config.timeout(),
            identifying_agent(&config.user_agent, config.contact_email.as_deref()),
            fallback,
            config.contact_email.clone(),
            RequestPacer::new(config.requests_per_second),
        )
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET a URL. A 403 is retried once with the fallback agent, since some
    /// public portals reject unknown bots outright.
    pub async fn get(&self, url: &Url) -> Result<HttpBody> {
        let response = self.send(url, &self.user_agent).await?;

        let response = match (&self.fallback_user_agent, response.status()) {
            (Some(fallback), StatusCode::FORBIDDEN) => {
                tracing::warn!(url = %url, user_agent = %fallback, "Got 403, retrying with fallback user agent");
                self.send(url, fallback).await?
            }
            _ => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url, status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, e))?
            .to_vec();

        Ok(HttpBody { bytes, content_type })
    }

    async fn send(&self, url: &Url, user_agent: &str) -> Result<reqwest::Response> {
        self.pacer.until_ready().await;

        let mut request = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, user_agent)
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            );
        if let Some(email) = &self.contact_email {
            request = request.header(header::FROM, email);
        }

        request.send().await.map_err(|e| transport_error(url, e))
    }
}

/// `agent (Contact: email)` when a contact address is configured.
pub fn identifying_agent(agent: &str, contact_email: Option<&str>) -> String {
    match contact_email {
        Some(email) if !email.trim().is_empty() => format!("{} (Contact: {})", agent, email),
        _ => agent.to_string(),
    }
}

/// Map an HTTP status to the error taxonomy.
pub fn status_error(url: &Url, status: StatusCode) -> MirrorError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => MirrorError::NotFound(url.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MirrorError::AccessDenied(url.to_string()),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS || s == StatusCode::REQUEST_TIMEOUT => {
            MirrorError::remote(format!("{} returned {}", url, s))
        }
        s => MirrorError::RemoteUnavailable {
            message: format!("{} returned {}", url, s),
            retryable: false,
        },
    }
}

fn transport_error(url: &Url, err: reqwest::Error) -> MirrorError {
    let retryable = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
    MirrorError::RemoteUnavailable {
        message: format!("request to {} failed: {}", url, err),
        retryable,
    }
}
