//! Shared helpers for the integration suites: an in-process upstream and the
//! JSON fixtures under `tests/fixtures/`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use ghactivity::application::fetch::{EventCache, FetchOptions};
use ghactivity::application::pagination::Paginator;
use ghactivity::application::upstream::{
    EventSource, PageQuery, TransportError, UpstreamResponse,
};
use ghactivity::cache::MemoryStore;

pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}

pub fn fixture_json(name: &str) -> serde_json::Value {
    serde_json::from_str(&fixture(name)).expect("fixture should be valid JSON")
}

/// Replays queued upstream outcomes in order and records every request.
#[derive(Default)]
pub struct FakeSource {
    outcomes: Mutex<VecDeque<Result<UpstreamResponse, TransportError>>>,
    requests: Mutex<Vec<PageQuery>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, response: UpstreamResponse) -> &Self {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .push_back(Ok(response));
        self
    }

    pub fn ok(&self, body: &str, etag: &str) -> &Self {
        self.respond(UpstreamResponse {
            status: 200,
            etag: Some(etag.to_string()),
            body: Bytes::from(body.to_string()),
            ..Default::default()
        })
    }

    pub fn status(&self, status: u16) -> &Self {
        self.respond(UpstreamResponse {
            status,
            ..Default::default()
        })
    }

    pub fn fail(&self, error: TransportError) -> &Self {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<PageQuery> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl EventSource for FakeSource {
    async fn fetch_page(&self, query: PageQuery) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().expect("requests lock").push(query);
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("no outcome queued")))
    }
}

pub fn paginator(source: Arc<FakeSource>) -> Paginator {
    let options = FetchOptions::default();
    let store = Arc::new(MemoryStore::new(&options.cache));
    Paginator::new(EventCache::new(store, source, options), 300)
}
