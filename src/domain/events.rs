//! The typed event model.
//!
//! An [`Event`] can only be built by the validator, and its payload is an enum
//! variant, so the `type` tag and the payload shape can never disagree.

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

use super::payloads::EventPayload;

/// The closed set of event variants served by the public events endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
    #[serde(rename = "PushEvent")]
    Push,
    #[serde(rename = "PullRequestEvent")]
    PullRequest,
    #[serde(rename = "PullRequestReviewEvent")]
    PullRequestReview,
    #[serde(rename = "PullRequestReviewCommentEvent")]
    PullRequestReviewComment,
    #[serde(rename = "PullRequestReviewThreadEvent")]
    PullRequestReviewThread,
    #[serde(rename = "IssuesEvent")]
    Issues,
    #[serde(rename = "IssueCommentEvent")]
    IssueComment,
    #[serde(rename = "CommitCommentEvent")]
    CommitComment,
    #[serde(rename = "ForkEvent")]
    Fork,
    #[serde(rename = "WatchEvent")]
    Watch,
    #[serde(rename = "CreateEvent")]
    Create,
    #[serde(rename = "DeleteEvent")]
    Delete,
    #[serde(rename = "ReleaseEvent")]
    Release,
    #[serde(rename = "MemberEvent")]
    Member,
    #[serde(rename = "PublicEvent")]
    Public,
    #[serde(rename = "GollumEvent")]
    Gollum,
}

impl EventKind {
    pub const ALL: [EventKind; 16] = [
        EventKind::Push,
        EventKind::PullRequest,
        EventKind::PullRequestReview,
        EventKind::PullRequestReviewComment,
        EventKind::PullRequestReviewThread,
        EventKind::Issues,
        EventKind::IssueComment,
        EventKind::CommitComment,
        EventKind::Fork,
        EventKind::Watch,
        EventKind::Create,
        EventKind::Delete,
        EventKind::Release,
        EventKind::Member,
        EventKind::Public,
        EventKind::Gollum,
    ];

    /// The upstream discriminant tag.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Push => "PushEvent",
            EventKind::PullRequest => "PullRequestEvent",
            EventKind::PullRequestReview => "PullRequestReviewEvent",
            EventKind::PullRequestReviewComment => "PullRequestReviewCommentEvent",
            EventKind::PullRequestReviewThread => "PullRequestReviewThreadEvent",
            EventKind::Issues => "IssuesEvent",
            EventKind::IssueComment => "IssueCommentEvent",
            EventKind::CommitComment => "CommitCommentEvent",
            EventKind::Fork => "ForkEvent",
            EventKind::Watch => "WatchEvent",
            EventKind::Create => "CreateEvent",
            EventKind::Delete => "DeleteEvent",
            EventKind::Release => "ReleaseEvent",
            EventKind::Member => "MemberEvent",
            EventKind::Public => "PublicEvent",
            EventKind::Gollum => "GollumEvent",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Human-readable label: `PullRequestReviewEvent` becomes `Pull Request Review`.
    pub fn label(self) -> String {
        let stem = self.as_str().trim_end_matches("Event");
        let mut label = String::with_capacity(stem.len() + 4);
        for (index, ch) in stem.char_indices() {
            if index > 0 && ch.is_ascii_uppercase() {
                label.push(' ');
            }
            label.push(ch);
        }
        label
    }

    /// Parse a comma separated list of tags, ignoring blanks and unknown tags.
    pub fn parse_list(raw: &str) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = raw
            .split(',')
            .map(str::trim)
            .filter_map(EventKind::from_tag)
            .collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user that triggered an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: u64,
    pub login: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_login: Option<String>,
    pub url: String,
    pub avatar_url: String,
}

/// Repository reference in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRef {
    pub id: u64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Org {
    pub id: u64,
    pub login: String,
    pub url: String,
    pub avatar_url: String,
}

/// A validated upstream event.
///
/// Only the validator builds these; outside the crate they are read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub(crate) id: String,
    pub(crate) actor: Actor,
    pub(crate) repo: RepoRef,
    pub(crate) public: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) org: Option<Org>,
    #[serde(flatten)]
    pub(crate) payload: EventPayload,
}

impl Event {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn org(&self) -> Option<&Org> {
        self.org.as_ref()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn actor_login(&self) -> &str {
        &self.actor.login
    }

    pub fn repo_name(&self) -> &str {
        &self.repo.name
    }
}

/// Keep only events whose kind is listed; an empty list keeps everything.
pub fn filter_events(events: Vec<Event>, kinds: &[EventKind]) -> Vec<Event> {
    if kinds.is_empty() {
        return events;
    }
    events
        .into_iter()
        .filter(|event| kinds.contains(&event.kind()))
        .collect()
}
