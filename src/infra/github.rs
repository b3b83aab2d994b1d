//! reqwest-backed client for the public events endpoint.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ETAG, HeaderMap, IF_NONE_MATCH};
use reqwest::{Client, Url};

use crate::application::upstream::{EventSource, PageQuery, TransportError, UpstreamResponse};
use crate::config::UpstreamSettings;

use super::error::InfraError;

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const POLL_INTERVAL_HEADER: &str = "x-poll-interval";
const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Clone, Debug)]
pub struct GithubClient {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::configuration(format!("failed to build HTTP client: {err}")))?;

        let mut base = Url::parse(&settings.base_url).map_err(|err| {
            InfraError::configuration(format!("invalid upstream base URL: {err}"))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            client,
            base,
            token: settings.token.clone(),
        })
    }

    fn events_url(&self, query: &PageQuery) -> Result<Url, TransportError> {
        let mut url = self
            .base
            .join(&format!("users/{}/events/public", query.subject.as_str()))
            .map_err(|err| TransportError::network(format!("invalid events URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("per_page", &query.per_page.to_string())
            .append_pair("page", &query.page.to_string());
        Ok(url)
    }
}

#[async_trait]
impl EventSource for GithubClient {
    async fn fetch_page(&self, query: PageQuery) -> Result<UpstreamResponse, TransportError> {
        let url = self.events_url(&query)?;
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_GITHUB_JSON)
            .header(API_VERSION_HEADER, API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(etag) = &query.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response.headers();
        let etag = header_str(headers, ETAG.as_str()).map(str::to_string);
        let poll_interval = header_parse(headers, POLL_INTERVAL_HEADER);
        let rate_limit_remaining = header_parse(headers, RATE_LIMIT_REMAINING_HEADER);
        let rate_limit_reset = header_parse(headers, RATE_LIMIT_RESET_HEADER);
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(UpstreamResponse {
            status,
            etag,
            poll_interval,
            rate_limit_remaining,
            rate_limit_reset,
            body,
        })
    }

    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::network(err.to_string())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn header_parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|value| value.parse().ok())
}
