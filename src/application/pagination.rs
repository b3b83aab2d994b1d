//! Bounded page walking over the conditional fetch cache.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{Event, Subject};

use super::error::FetchError;
use super::fetch::{CacheStatus, EventCache, FetchResult};

/// Upstream hard cap on records retrievable per subject.
pub const DEFAULT_MAX_RECORDS: u32 = 300;

/// Pages merged by [`Paginator::fetch_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSet {
    pub events: Vec<Event>,
    pub pages_fetched: u32,
    pub has_more: bool,
    pub statuses: Vec<CacheStatus>,
    pub poll_interval: Duration,
    /// Error that stopped the walk after at least one page was loaded.
    pub interrupted: Option<FetchError>,
}

impl PageSet {
    /// Aggregate status: stale if any page was stale, cached only if every page was.
    pub fn cache_status(&self) -> CacheStatus {
        if self.statuses.contains(&CacheStatus::StaleOnError) {
            CacheStatus::StaleOnError
        } else if !self.statuses.is_empty()
            && self.statuses.iter().all(|status| *status == CacheStatus::CachedValid)
        {
            CacheStatus::CachedValid
        } else {
            CacheStatus::Fresh
        }
    }

    pub fn into_fetch_result(self) -> FetchResult {
        let cache_status = self.cache_status();
        FetchResult {
            events: self.events,
            cache_status,
            poll_interval: self.poll_interval,
        }
    }
}

/// Appends events whose id has not been seen yet.
#[derive(Debug, Default)]
struct Merger {
    seen: HashSet<String>,
    events: Vec<Event>,
}

impl Merger {
    fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            if self.seen.insert(event.id.clone()) {
                self.events.push(event);
            }
        }
    }
}

#[derive(Clone)]
pub struct Paginator {
    cache: EventCache,
    ceiling: u32,
}

impl Paginator {
    /// `max_records` is the upstream cap; the page ceiling is derived from it.
    pub fn new(cache: EventCache, max_records: u32) -> Self {
        let per_page = cache.per_page().max(1);
        let ceiling = (max_records / per_page).max(1);
        Self { cache, ceiling }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn cache(&self) -> &EventCache {
        &self.cache
    }

    pub async fn fetch_page(&self, subject: &Subject, page: u32) -> Result<FetchResult, FetchError> {
        self.cache.get_events(subject, page).await
    }

    /// Walk pages `1..=max_pages`, never past the ceiling.
    ///
    /// Fails only when page 1 fails; a later failure is reported in
    /// [`PageSet::interrupted`] alongside the pages already merged.
    pub async fn fetch_all(&self, subject: &Subject, max_pages: u32) -> Result<PageSet, FetchError> {
        let limit = max_pages.clamp(1, self.ceiling);
        let per_page = self.cache.per_page() as usize;
        let mut merger = Merger::default();
        let mut statuses = Vec::new();
        let mut poll_interval = None;
        let mut has_more = false;
        let mut interrupted = None;

        for page in 1..=limit {
            let fetched = match self.cache.get_events(subject, page).await {
                Ok(fetched) => fetched,
                Err(err) if page == 1 => return Err(err),
                Err(err) => {
                    warn!(subject = %subject, page, error = %err, "pagination interrupted");
                    interrupted = Some(err);
                    has_more = true;
                    break;
                }
            };

            let received = fetched.events.len();
            statuses.push(fetched.cache_status);
            poll_interval.get_or_insert(fetched.poll_interval);
            merger.extend(fetched.events);

            if received < per_page {
                has_more = false;
                break;
            }
            has_more = page < self.ceiling;
        }

        let pages_fetched = statuses.len() as u32;
        debug!(
            subject = %subject,
            pages_fetched,
            events = merger.events.len(),
            has_more,
            "merged event pages"
        );
        Ok(PageSet {
            events: merger.events,
            pages_fetched,
            has_more,
            statuses,
            poll_interval: poll_interval.unwrap_or_else(|| self.cache.options().poll.interval(None)),
            interrupted,
        })
    }
}

/// Caller-retained pages: only page 1 is refreshed, later pages stay until reset.
pub struct EventTimeline {
    paginator: Paginator,
    subject: Subject,
    pages: Vec<Vec<Event>>,
    has_more: bool,
    last_status: Option<CacheStatus>,
    poll_interval: Option<Duration>,
}

impl EventTimeline {
    pub fn new(paginator: Paginator, subject: Subject) -> Self {
        Self {
            paginator,
            subject,
            pages: Vec::new(),
            has_more: true,
            last_status: None,
            poll_interval: None,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn pages_loaded(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn has_more(&self) -> bool {
        self.has_more && self.pages_loaded() < self.paginator.ceiling()
    }

    pub fn last_status(&self) -> Option<CacheStatus> {
        self.last_status
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }

    /// All loaded events in page order, without repeats.
    pub fn events(&self) -> Vec<Event> {
        let mut merger = Merger::default();
        for page in &self.pages {
            merger.extend(page.iter().cloned());
        }
        merger.events
    }

    /// Re-fetch page 1, keeping any later pages.
    pub async fn refresh(&mut self) -> Result<CacheStatus, FetchError> {
        let fetched = self.paginator.fetch_page(&self.subject, 1).await?;
        let full = fetched.events.len() >= self.paginator.cache().per_page() as usize;
        if self.pages.len() <= 1 {
            self.has_more = full;
        }
        self.last_status = Some(fetched.cache_status);
        self.poll_interval = Some(fetched.poll_interval);
        match self.pages.first_mut() {
            Some(first) => *first = fetched.events,
            None => self.pages.push(fetched.events),
        }
        Ok(fetched.cache_status)
    }

    /// Fetch the next page. Returns `false` without a request once exhausted.
    pub async fn load_more(&mut self) -> Result<bool, FetchError> {
        if self.pages.is_empty() {
            self.refresh().await?;
            return Ok(true);
        }
        if !self.has_more() {
            return Ok(false);
        }
        let next = self.pages_loaded() + 1;
        let fetched = self.paginator.fetch_page(&self.subject, next).await?;
        self.has_more = fetched.events.len() >= self.paginator.cache().per_page() as usize;
        self.last_status = Some(fetched.cache_status);
        self.pages.push(fetched.events);
        Ok(true)
    }

    /// Drop every loaded page.
    pub fn reset(&mut self) {
        self.pages.clear();
        self.has_more = true;
        self.last_status = None;
        self.poll_interval = None;
    }
}
