use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_NONE_MATCH},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    application::{
        error::{ErrorReport, FetchError, HttpError},
        fetch::CacheStatus,
        pagination::Paginator,
        syndication::{FeedFormat, FeedOptions, error_feed, project},
    },
    domain::{Event, EventKind, Subject, filter_events},
};

use super::middleware::{log_responses, set_request_context};

const X_CACHE_STATUS: &str = "x-cache-status";
const X_POLL_INTERVAL: &str = "x-poll-interval";
const CACHE_CONTROL_HIT: &str = "public, max-age=300, s-maxage=300, stale-while-revalidate=60";
const CACHE_CONTROL_MISS: &str = "public, max-age=60, s-maxage=60, stale-while-revalidate=30";
const CACHE_CONTROL_ERROR: &str = "no-cache";

#[derive(Clone)]
pub struct HttpState {
    pub paginator: Paginator,
    pub feed: FeedOptions,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/_health", get(health))
        .route("/{user}/rss", get(rss_feed))
        .route("/{user}/atom", get(atom_feed))
        .route("/{user}/events", get(events))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedQuery {
    #[serde(rename = "type")]
    types: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventsQuery {
    page: Option<u32>,
    #[serde(rename = "type")]
    types: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventsBody {
    subject: String,
    page: u32,
    cache_status: &'static str,
    poll_interval_seconds: u64,
    events: Vec<Event>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn rss_feed(
    State(state): State<HttpState>,
    Path(user): Path<String>,
    Query(query): Query<FeedQuery>,
    headers: HeaderMap,
) -> Response {
    serve_feed(&state, &user, &query, &headers, FeedFormat::Rss).await
}

async fn atom_feed(
    State(state): State<HttpState>,
    Path(user): Path<String>,
    Query(query): Query<FeedQuery>,
    headers: HeaderMap,
) -> Response {
    serve_feed(&state, &user, &query, &headers, FeedFormat::Atom).await
}

async fn serve_feed(
    state: &HttpState,
    user: &str,
    query: &FeedQuery,
    headers: &HeaderMap,
    format: FeedFormat,
) -> Response {
    let subject = match Subject::parse(user) {
        Ok(subject) => subject,
        Err(_) => {
            return error_feed_response(user, FetchError::subject_not_found(user), &state.feed);
        }
    };

    let pages = feed_pages(state.feed.item_limit, state.paginator.cache().per_page());
    let set = match state.paginator.fetch_all(&subject, pages).await {
        Ok(set) => set,
        Err(err) => return error_feed_response(subject.as_str(), err, &state.feed),
    };

    let cache_status = set.cache_status();
    let events = filter_events(set.events, &kinds(query.types.as_deref()));
    let document = project(&subject, &events, &state.feed);
    let etag = document.etag(format);

    if matches_etag(headers, &etag) {
        return cached_response(StatusCode::NOT_MODIFIED, cache_status, Some(&etag), Body::empty());
    }

    let body = document.render(format, Some(OffsetDateTime::now_utc()));
    let mut response = cached_response(StatusCode::OK, cache_status, Some(&etag), Body::from(body));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    response
}

async fn events(
    State(state): State<HttpState>,
    Path(user): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::events";

    let subject = match Subject::parse(&user) {
        Ok(subject) => subject,
        Err(_) => return fetch_error_json(FetchError::subject_not_found(user)),
    };

    let page = query.page.unwrap_or(1);
    let ceiling = state.paginator.ceiling();
    if page == 0 || page > ceiling {
        return HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid page",
            format!("page must be between 1 and {ceiling}, got {page}"),
        )
        .into_response();
    }

    let fetched = match state.paginator.fetch_page(&subject, page).await {
        Ok(fetched) => fetched,
        Err(err) => return fetch_error_json(err),
    };

    let body = EventsBody {
        subject: subject.as_str().to_string(),
        page,
        cache_status: fetched.cache_status.as_str(),
        poll_interval_seconds: fetched.poll_interval.as_secs(),
        events: filter_events(fetched.events, &kinds(query.types.as_deref())),
    };

    let mut response = Json(body).into_response();
    apply_cache_headers(response.headers_mut(), fetched.cache_status);
    if let Ok(value) = HeaderValue::from_str(&fetched.poll_interval.as_secs().to_string()) {
        response.headers_mut().insert(X_POLL_INTERVAL, value);
    }
    response
}

fn kinds(types: Option<&str>) -> Vec<EventKind> {
    types.map(EventKind::parse_list).unwrap_or_default()
}

/// Pages needed to fill `item_limit` items.
fn feed_pages(item_limit: usize, per_page: u32) -> u32 {
    let per_page = per_page.max(1) as usize;
    u32::try_from(item_limit.div_ceil(per_page))
        .unwrap_or(u32::MAX)
        .max(1)
}

fn cache_control(status: CacheStatus) -> &'static str {
    match status {
        CacheStatus::CachedValid => CACHE_CONTROL_HIT,
        CacheStatus::Fresh | CacheStatus::StaleOnError => CACHE_CONTROL_MISS,
    }
}

fn apply_cache_headers(headers: &mut HeaderMap, status: CacheStatus) {
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control(status)));
    headers.insert(X_CACHE_STATUS, HeaderValue::from_static(status.header_value()));
}

fn cached_response(
    status: StatusCode,
    cache_status: CacheStatus,
    etag: Option<&str>,
    body: Body,
) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    apply_cache_headers(response.headers_mut(), cache_status);
    if let Some(value) = etag.and_then(|etag| HeaderValue::from_str(etag).ok()) {
        response.headers_mut().insert(ETAG, value);
    }
    response
}

fn matches_etag(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|candidate| candidate.trim().trim_start_matches("W/"))
        .any(|candidate| candidate == "*" || candidate == etag)
}

fn error_feed_response(subject: &str, err: FetchError, options: &FeedOptions) -> Response {
    const SOURCE: &str = "infra::http::public::feed";

    let status = err.kind().status();
    let body = error_feed(subject, &err.remediation(), options, OffsetDateTime::now_utc());

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(FeedFormat::Rss.content_type()),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_ERROR));
    ErrorReport::from_error(SOURCE, status, &err).attach(&mut response);
    response
}

fn fetch_error_json(err: FetchError) -> Response {
    const SOURCE: &str = "infra::http::public::events";

    let kind = err.kind();
    let status = kind.status();
    let body = ErrorBody {
        error: kind.as_str(),
        message: err.remediation(),
    };

    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_ERROR));
    ErrorReport::from_error(SOURCE, status, &err).attach(&mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_pages_cover_item_limit() {
        assert_eq!(feed_pages(100, 100), 1);
        assert_eq!(feed_pages(101, 100), 2);
        assert_eq!(feed_pages(300, 100), 3);
        assert_eq!(feed_pages(0, 100), 1);
        assert_eq!(feed_pages(10, 0), 10);
    }

    #[test]
    fn cached_valid_gets_the_longer_lifetime() {
        assert_eq!(cache_control(CacheStatus::CachedValid), CACHE_CONTROL_HIT);
        assert_eq!(cache_control(CacheStatus::Fresh), CACHE_CONTROL_MISS);
        assert_eq!(cache_control(CacheStatus::StaleOnError), CACHE_CONTROL_MISS);
    }

    #[test]
    fn if_none_match_accepts_lists_weak_tags_and_wildcard() {
        let etag = "\"abc\"";
        let mut headers = HeaderMap::new();
        assert!(!matches_etag(&headers, etag));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"zzz\", W/\"abc\""));
        assert!(matches_etag(&headers, etag));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("*"));
        assert!(matches_etag(&headers, etag));

        headers.insert(IF_NONE_MATCH, HeaderValue::from_static("\"other\""));
        assert!(!matches_etag(&headers, etag));
    }

    #[test]
    fn unknown_type_filters_keep_everything() {
        assert!(kinds(Some("NotAnEvent")).is_empty());
        assert_eq!(kinds(Some("PushEvent")), vec![EventKind::Push]);
        assert!(kinds(None).is_empty());
    }
}
