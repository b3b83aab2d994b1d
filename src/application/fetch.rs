//! Conditional fetch with ETag revalidation and stale-on-error fallback.
//!
//! Only bodies that pass [`Validator::decode_list`] are ever written to the
//! store, and every cached body is validated again before it is returned.

use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, CacheKey, CacheStore, StoreWrite};
use crate::domain::{Event, Subject, ValidationError, Validator, VariantPolicy};

use super::error::{FetchError, Unavailable};
use super::upstream::{EventSource, PageQuery, TransportError, UpstreamResponse};

const METRIC_FETCH_TOTAL: &str = "ghactivity_fetch_total";
const METRIC_UPSTREAM_REQUESTS: &str = "ghactivity_upstream_requests_total";
const METRIC_VALIDATION_FAILURES: &str = "ghactivity_validation_failures_total";
const METRIC_UPSTREAM_MS: &str = "ghactivity_upstream_ms";

pub const DEFAULT_PER_PAGE: u32 = 100;

/// Where the events in a [`FetchResult`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Upstream answered 200 with a valid body.
    Fresh,
    /// Upstream answered 304 and the cached body validated.
    CachedValid,
    /// Upstream failed and the cached body validated.
    StaleOnError,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::CachedValid => "cached_valid",
            CacheStatus::StaleOnError => "stale_on_error",
        }
    }

    /// Value for the `X-Cache-Status` response header.
    pub fn header_value(self) -> &'static str {
        match self {
            CacheStatus::Fresh => "MISS",
            CacheStatus::CachedValid => "HIT",
            CacheStatus::StaleOnError => "STALE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub events: Vec<Event>,
    pub cache_status: CacheStatus,
    /// How long callers should wait before polling again.
    pub poll_interval: Duration,
}

/// Bounds on the poll interval hint handed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub min_seconds: u64,
    pub default_seconds: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            min_seconds: 15,
            default_seconds: 60,
        }
    }
}

impl PollPolicy {
    pub fn interval(&self, hint: Option<u64>) -> Duration {
        Duration::from_secs(hint.unwrap_or(self.default_seconds).max(self.min_seconds))
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub per_page: u32,
    pub timeout: Duration,
    pub poll: PollPolicy,
    pub variant_policy: VariantPolicy,
    pub cache: CacheConfig,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            timeout: Duration::from_secs(10),
            poll: PollPolicy::default(),
            variant_policy: VariantPolicy::Strict,
            cache: CacheConfig::default(),
        }
    }
}

/// The conditional fetch cache manager.
#[derive(Clone)]
pub struct EventCache {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn EventSource>,
    validator: Validator,
    options: FetchOptions,
}

impl EventCache {
    pub fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn EventSource>,
        options: FetchOptions,
    ) -> Self {
        Self {
            store,
            source,
            validator: Validator::new(options.variant_policy),
            options,
        }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    pub fn per_page(&self) -> u32 {
        self.options.per_page
    }

    /// Fetch one page using the standard key family for the subject.
    pub async fn get_events(&self, subject: &Subject, page: u32) -> Result<FetchResult, FetchError> {
        self.fetch(subject, page, &CacheKey::events(subject, page)).await
    }

    pub async fn fetch(
        &self,
        subject: &Subject,
        page: u32,
        key: &CacheKey,
    ) -> Result<FetchResult, FetchError> {
        let result = self.fetch_inner(subject, page, key).await;
        let status = match &result {
            Ok(fetched) => fetched.cache_status.as_str(),
            Err(err) => err.kind().as_str(),
        };
        counter!(METRIC_FETCH_TOTAL, "status" => status).increment(1);
        match &result {
            Ok(fetched) => debug!(
                subject = %subject,
                page,
                cache_status = fetched.cache_status.as_str(),
                events = fetched.events.len(),
                "fetched events"
            ),
            Err(err) => info!(
                subject = %subject,
                page,
                error_kind = err.kind().as_str(),
                error = %err,
                "fetch failed without fallback"
            ),
        }
        result
    }

    async fn fetch_inner(
        &self,
        subject: &Subject,
        page: u32,
        key: &CacheKey,
    ) -> Result<FetchResult, FetchError> {
        let cached = self.read_body(key).await;
        let token = self.read_token(key).await;

        let response = match self.request(subject, page, token).await {
            Ok(response) => response,
            Err(err) => return self.fallback(cached, Unavailable::from(err).into(), subject, page),
        };

        if response.status != 304 {
            return self.settle(response, cached, key, subject, page).await;
        }

        if let Some(body) = &cached {
            match self.validator.decode_list(body) {
                Ok(events) => {
                    debug!(subject = %subject, page, "revalidated cached body");
                    return Ok(FetchResult {
                        events,
                        cache_status: CacheStatus::CachedValid,
                        poll_interval: self.options.poll.interval(response.poll_interval),
                    });
                }
                Err(err) => self.record_validation_failure(subject, page, "cache", &err),
            }
        }

        debug!(
            subject = %subject,
            page,
            had_body = cached.is_some(),
            "304 without a usable body; refetching unconditionally"
        );
        match self.request(subject, page, None).await {
            Ok(retry) if retry.status == 304 => self.fallback(
                cached,
                Unavailable::Status(304).into(),
                subject,
                page,
            ),
            Ok(retry) => self.settle(retry, cached, key, subject, page).await,
            Err(err) => self.fallback(cached, Unavailable::from(err).into(), subject, page),
        }
    }

    /// Interpret a non-304 response.
    async fn settle(
        &self,
        response: UpstreamResponse,
        cached: Option<Bytes>,
        key: &CacheKey,
        subject: &Subject,
        page: u32,
    ) -> Result<FetchResult, FetchError> {
        match response.status {
            200..=299 => match self.validator.decode_list(&response.body) {
                Ok(events) => {
                    self.write(key, &response).await;
                    Ok(FetchResult {
                        events,
                        cache_status: CacheStatus::Fresh,
                        poll_interval: self.options.poll.interval(response.poll_interval),
                    })
                }
                Err(err) => {
                    self.record_validation_failure(subject, page, "upstream", &err);
                    self.fallback(cached, err.into(), subject, page)
                }
            },
            404 => Err(FetchError::subject_not_found(subject.as_str())),
            _ if response.is_rate_limited() => {
                warn!(
                    subject = %subject,
                    page,
                    upstream_status = response.status,
                    reset = response.rate_limit_reset,
                    "upstream rate limit exhausted"
                );
                let err = FetchError::RateLimited {
                    reset_at: response.reset_at(),
                    authenticated: self.source.is_authenticated(),
                };
                self.fallback(cached, err, subject, page)
            }
            status => self.fallback(cached, Unavailable::Status(status).into(), subject, page),
        }
    }

    fn fallback(
        &self,
        cached: Option<Bytes>,
        error: FetchError,
        subject: &Subject,
        page: u32,
    ) -> Result<FetchResult, FetchError> {
        if !error.allows_stale() {
            return Err(error);
        }
        let Some(body) = cached else {
            return Err(error);
        };
        match self.validator.decode_list(&body) {
            Ok(events) => {
                warn!(
                    subject = %subject,
                    page,
                    error = %error,
                    "serving stale events after upstream failure"
                );
                Ok(FetchResult {
                    events,
                    cache_status: CacheStatus::StaleOnError,
                    poll_interval: self.options.poll.interval(None),
                })
            }
            Err(cache_err) => {
                self.record_validation_failure(subject, page, "cache", &cache_err);
                Err(error)
            }
        }
    }

    async fn request(
        &self,
        subject: &Subject,
        page: u32,
        etag: Option<String>,
    ) -> Result<UpstreamResponse, TransportError> {
        let query = PageQuery {
            subject: subject.clone(),
            page,
            per_page: self.options.per_page,
            etag,
        };
        let conditional = query.etag.is_some();
        let started = StdInstant::now();
        let outcome = match tokio::time::timeout(self.options.timeout, self.source.fetch_page(query))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };
        histogram!(METRIC_UPSTREAM_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        let status = match &outcome {
            Ok(response) => response.status.to_string(),
            Err(TransportError::Timeout) => "timeout".to_string(),
            Err(TransportError::Network(_)) => "network".to_string(),
        };
        debug!(
            subject = %subject,
            page,
            conditional,
            upstream_status = %status,
            "upstream request finished"
        );
        counter!(METRIC_UPSTREAM_REQUESTS, "status" => status).increment(1);
        outcome
    }

    /// Read the cached body; empty bodies and store failures count as a miss.
    async fn read_body(&self, key: &CacheKey) -> Option<Bytes> {
        match self.store.get(key.body()).await {
            Ok(Some(value)) if !value.bytes.trim_ascii().is_empty() => Some(value.bytes),
            Ok(_) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "cache body read failed; treating as miss");
                None
            }
        }
    }

    async fn read_token(&self, key: &CacheKey) -> Option<String> {
        match self.store.get(&key.token()).await {
            Ok(Some(value)) => std::str::from_utf8(&value.bytes)
                .ok()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
            Ok(None) => None,
            Err(err) => {
                warn!(key = %key, error = %err, "cache token read failed; sending unconditional request");
                None
            }
        }
    }

    async fn write(&self, key: &CacheKey, response: &UpstreamResponse) {
        let mut writes = vec![StoreWrite::new(
            key.body(),
            response.body.clone(),
            self.options.cache.body_ttl(),
        )];
        // An empty token clears any tag left over from a previous body.
        let token = response
            .etag
            .as_ref()
            .map(|etag| Bytes::from(etag.clone()))
            .unwrap_or_default();
        writes.push(StoreWrite::new(
            key.token(),
            token,
            self.options.cache.token_ttl(),
        ));
        if let Err(err) = self.store.put_many(writes).await {
            warn!(key = %key, error = %err, "cache write failed; serving fresh events uncached");
        }
    }

    fn record_validation_failure(
        &self,
        subject: &Subject,
        page: u32,
        origin: &'static str,
        err: &ValidationError,
    ) {
        counter!(METRIC_VALIDATION_FAILURES, "origin" => origin).increment(1);
        warn!(
            subject = %subject,
            page,
            origin,
            error_kind = err.label(),
            path = err.path(),
            error = %err,
            "event validation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::upstream::scripted::{ScriptedSource, Step};
    use crate::cache::MemoryStore;
    use crate::domain::fixtures;

    struct Harness {
        cache: EventCache,
        store: Arc<MemoryStore>,
        source: Arc<ScriptedSource>,
        subject: Subject,
    }

    fn harness_with(source: ScriptedSource) -> Harness {
        let store = Arc::new(MemoryStore::new(&CacheConfig::default()));
        let source = Arc::new(source);
        let cache = EventCache::new(store.clone(), source.clone(), FetchOptions::default());
        Harness {
            cache,
            store,
            source,
            subject: Subject::parse("octocat").expect("valid subject"),
        }
    }

    fn harness() -> Harness {
        harness_with(ScriptedSource::new())
    }

    impl Harness {
        async fn fetch(&self) -> Result<FetchResult, FetchError> {
            self.cache.get_events(&self.subject, 1).await
        }

        async fn seed(&self, body: &[u8], etag: Option<&str>) {
            let key = CacheKey::events(&self.subject, 1);
            self.store
                .put(key.body(), Bytes::copy_from_slice(body), Duration::from_secs(300))
                .await
                .expect("seed body");
            if let Some(etag) = etag {
                self.store
                    .put(&key.token(), Bytes::from(etag.to_string()), Duration::from_secs(1800))
                    .await
                    .expect("seed token");
            }
        }
    }

    #[tokio::test]
    async fn fresh_response_is_validated_and_cached() {
        let h = harness();
        let body = fixtures::page(0, 3);
        h.source.ok(&body, "\"v1\"");

        let result = h.fetch().await.expect("fresh fetch");
        assert_eq!(result.cache_status, CacheStatus::Fresh);
        assert_eq!(result.events.len(), 3);
        assert_eq!(result.poll_interval, Duration::from_secs(60));

        let key = CacheKey::events(&h.subject, 1);
        let token = h.store.get(&key.token()).await.expect("get").expect("token");
        assert_eq!(token.bytes, Bytes::from_static(b"\"v1\""));
        assert!(h.store.get(key.body()).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn untagged_fresh_body_clears_the_previous_token() {
        let h = harness();
        h.source.ok(&fixtures::page(0, 2), "\"vA\"");
        h.source.push(Step::Respond(UpstreamResponse {
            etag: None,
            ..crate::application::upstream::scripted::ok(&fixtures::page(10, 2), "")
        }));
        h.source.status(500);

        h.fetch().await.expect("tagged");
        let second = h.fetch().await.expect("untagged");
        assert_eq!(second.cache_status, CacheStatus::Fresh);
        h.fetch().await.expect("stale");

        let requests = h.source.requests();
        assert_eq!(requests[1].etag.as_deref(), Some("\"vA\""));
        assert_eq!(requests[2].etag, None);
    }

    #[tokio::test]
    async fn not_modified_returns_events_equal_to_the_cached_body() {
        let h = harness();
        let body = fixtures::page(0, 2);
        h.source.ok(&body, "\"v1\"").status(304);

        let first = h.fetch().await.expect("fresh");
        let second = h.fetch().await.expect("revalidated");

        assert_eq!(second.cache_status, CacheStatus::CachedValid);
        assert_eq!(second.events, first.events);
        assert_eq!(
            second.events,
            crate::domain::validate_list(&body).expect("fixture validates")
        );
        let requests = h.source.requests();
        assert_eq!(requests[0].etag, None);
        assert_eq!(requests[1].etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn not_modified_with_lone_token_refetches_without_condition() {
        let h = harness();
        let key = CacheKey::events(&h.subject, 1);
        h.store
            .put(&key.token(), Bytes::from_static(b"\"v1\""), Duration::from_secs(60))
            .await
            .expect("seed token");
        h.source.status(304).ok(&fixtures::page(0, 1), "\"v2\"");

        let result = h.fetch().await.expect("refetched");
        assert_eq!(result.cache_status, CacheStatus::Fresh);
        let requests = h.source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].etag.as_deref(), Some("\"v1\""));
        assert_eq!(requests[1].etag, None);
    }

    #[tokio::test]
    async fn not_modified_with_corrupt_cache_refetches() {
        let h = harness();
        h.seed(br#"[{"type":"PushEvent"}]"#, Some("\"v1\"")).await;
        h.source.status(304).ok(&fixtures::page(0, 2), "\"v2\"");

        let result = h.fetch().await.expect("refetched");
        assert_eq!(result.cache_status, CacheStatus::Fresh);
        assert_eq!(result.events.len(), 2);
    }

    #[tokio::test]
    async fn repeated_not_modified_after_retry_is_unavailable() {
        let h = harness();
        h.seed(br#"[{"type":"PushEvent"}]"#, Some("\"v1\"")).await;
        h.source.status(304).status(304);

        let err = h.fetch().await.expect_err("no usable body");
        assert_eq!(err, FetchError::Unavailable(Unavailable::Status(304)));
        assert_eq!(err.kind(), crate::application::error::FetchErrorKind::Unavailable);

        let requests = h.source.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].etag, None);
    }

    #[tokio::test]
    async fn server_error_serves_stale_events() {
        let h = harness();
        h.source.ok(&fixtures::page(0, 2), "\"v1\"").status(500);

        let first = h.fetch().await.expect("fresh");
        let second = h.fetch().await.expect("stale");
        assert_eq!(second.cache_status, CacheStatus::StaleOnError);
        assert_eq!(second.events, first.events);
    }

    #[tokio::test]
    async fn server_error_without_cache_is_unavailable() {
        let h = harness();
        h.source.status(502);
        assert_eq!(
            h.fetch().await.expect_err("no cache"),
            FetchError::Unavailable(Unavailable::Status(502))
        );
    }

    #[tokio::test]
    async fn not_found_never_serves_cached_data() {
        let h = harness();
        h.source.ok(&fixtures::page(0, 2), "\"v1\"").status(404);

        h.fetch().await.expect("fresh");
        assert_eq!(
            h.fetch().await.expect_err("404"),
            FetchError::subject_not_found("octocat")
        );
    }

    #[tokio::test]
    async fn invalid_fresh_body_keeps_last_known_good() {
        let h = harness();
        let mut broken = fixtures::page(0, 1);
        broken[0]["payload"]
            .as_object_mut()
            .expect("payload object")
            .remove("head");
        h.source
            .ok(&fixtures::page(0, 2), "\"v1\"")
            .ok(&broken, "\"v2\"")
            .status(304);

        h.fetch().await.expect("fresh");
        let stale = h.fetch().await.expect("stale after schema drift");
        assert_eq!(stale.cache_status, CacheStatus::StaleOnError);
        assert_eq!(stale.events.len(), 2);

        // the token was not replaced, so the next request still revalidates v1
        let revalidated = h.fetch().await.expect("revalidated");
        assert_eq!(revalidated.cache_status, CacheStatus::CachedValid);
        assert_eq!(h.source.requests()[2].etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn invalid_fresh_body_without_cache_reports_field_path() {
        let h = harness();
        h.source.ok(&json!([{"id": "1", "type": "PushEvent"}]), "\"v1\"");
        let err = h.fetch().await.expect_err("invalid");
        assert!(matches!(
            err,
            FetchError::Validation(ValidationError::MissingField { ref path }) if path == "[0].actor"
        ));
    }

    #[tokio::test]
    async fn corrupt_cache_does_not_mask_the_original_error() {
        let h = harness();
        h.seed(b"{not json", None).await;
        h.source.status(500);
        assert_eq!(
            h.fetch().await.expect_err("both failed"),
            FetchError::Unavailable(Unavailable::Status(500))
        );
    }

    #[tokio::test]
    async fn empty_cached_body_is_a_miss() {
        let h = harness();
        h.seed(b"", Some("\"v1\"")).await;
        h.source.status(500);
        assert!(matches!(
            h.fetch().await,
            Err(FetchError::Unavailable(Unavailable::Status(500)))
        ));
    }

    #[tokio::test]
    async fn rate_limit_without_cache_carries_reset_time() {
        let h = harness();
        h.source.push(Step::Respond(UpstreamResponse {
            status: 403,
            rate_limit_remaining: Some(0),
            rate_limit_reset: Some(1_714_567_800),
            ..Default::default()
        }));

        match h.fetch().await.expect_err("rate limited") {
            FetchError::RateLimited {
                reset_at,
                authenticated,
            } => {
                assert_eq!(reset_at.map(|at| at.unix_timestamp()), Some(1_714_567_800));
                assert!(!authenticated);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_with_cache_serves_stale() {
        let h = harness_with(ScriptedSource::new().authenticated());
        h.source.ok(&fixtures::page(0, 1), "\"v1\"");
        h.source.push(Step::Respond(UpstreamResponse {
            status: 403,
            rate_limit_remaining: Some(0),
            ..Default::default()
        }));

        h.fetch().await.expect("fresh");
        let stale = h.fetch().await.expect("stale");
        assert_eq!(stale.cache_status, CacheStatus::StaleOnError);
    }

    #[tokio::test]
    async fn forbidden_without_exhaustion_is_unavailable() {
        let h = harness();
        h.source.push(Step::Respond(UpstreamResponse {
            status: 403,
            rate_limit_remaining: Some(12),
            ..Default::default()
        }));
        assert_eq!(
            h.fetch().await.expect_err("forbidden"),
            FetchError::Unavailable(Unavailable::Status(403))
        );
    }

    #[tokio::test]
    async fn network_failure_falls_back_to_stale() {
        let h = harness();
        h.source.ok(&fixtures::page(0, 1), "\"v1\"");
        h.source.push(Step::Fail(TransportError::network("connection reset")));

        h.fetch().await.expect("fresh");
        assert_eq!(
            h.fetch().await.expect("stale").cache_status,
            CacheStatus::StaleOnError
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out_like_a_network_failure() {
        let h = harness();
        h.source.push(Step::Stall(Duration::from_secs(60)));
        assert_eq!(
            h.fetch().await.expect_err("timed out"),
            FetchError::Unavailable(Unavailable::Timeout)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn token_outlives_body_and_triggers_revalidation() {
        let h = harness();
        h.source.ok(&fixtures::page(0, 1), "\"v1\"").status(304).ok(&fixtures::page(0, 1), "\"v1\"");

        h.fetch().await.expect("fresh");
        tokio::time::advance(Duration::from_secs(301)).await;

        let result = h.fetch().await.expect("refetched after body expiry");
        assert_eq!(result.cache_status, CacheStatus::Fresh);
        let requests = h.source.requests();
        assert_eq!(requests[1].etag.as_deref(), Some("\"v1\""));
        assert_eq!(requests[2].etag, None);
    }

    #[tokio::test]
    async fn poll_hint_is_clamped_to_minimum() {
        let h = harness();
        let mut response = crate::application::upstream::scripted::ok(&fixtures::page(0, 1), "\"v1\"");
        response.poll_interval = Some(5);
        h.source.push(Step::Respond(response));

        let result = h.fetch().await.expect("fresh");
        assert_eq!(result.poll_interval, Duration::from_secs(15));
    }

    #[test]
    fn poll_policy_prefers_hint_over_default() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval(Some(120)), Duration::from_secs(120));
        assert_eq!(policy.interval(None), Duration::from_secs(60));
    }
}
