//! Discriminated validation from untyped JSON into [`Event`]s.
//!
//! The `type` tag is inspected before anything else. Required fields are strict,
//! unknown fields are ignored, and an unknown tag is never coerced into a default
//! variant. Validation is total: any input produces either events or an error.

use serde_json::Value;
use thiserror::Error;

use super::events::{Actor, Event, EventKind, Org, RepoRef};
use super::payloads::*;
use super::reader::Node;

/// Structured validation failure carrying the offending field path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{}", unknown_variant_message(path, tag.as_deref()))]
    UnknownVariant { path: String, tag: Option<String> },
    #[error("missing required field `{path}`")]
    MissingField { path: String },
    #[error("schema mismatch at `{}`: {message}", display_path(path))]
    SchemaError { path: String, message: String },
}

impl ValidationError {
    pub(crate) fn missing(path: impl Into<String>) -> Self {
        Self::MissingField { path: path.into() }
    }

    pub(crate) fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::UnknownVariant { path, .. }
            | Self::MissingField { path }
            | Self::SchemaError { path, .. } => path,
        }
    }

    /// Short machine-readable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnknownVariant { .. } => "unknown_variant",
            Self::MissingField { .. } => "missing_field",
            Self::SchemaError { .. } => "schema_error",
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "$" } else { path }
}

fn unknown_variant_message(path: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("unknown event variant `{tag}` at `{}`", display_path(path)),
        None => format!("missing event variant tag at `{}`", display_path(path)),
    }
}

/// How an unrecognised `type` tag is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariantPolicy {
    /// Report [`ValidationError::UnknownVariant`].
    #[default]
    Strict,
    /// Report [`ValidationError::SchemaError`] so the caller treats the response as invalid.
    Legacy,
}

/// Outcome of element-wise validation.
#[derive(Debug, Clone, Default)]
pub struct ValidatedBatch {
    pub events: Vec<Event>,
    pub rejected: Vec<(usize, ValidationError)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    policy: VariantPolicy,
}

impl Validator {
    pub fn new(policy: VariantPolicy) -> Self {
        Self { policy }
    }

    pub fn validate(&self, raw: &Value) -> Result<Event, ValidationError> {
        self.event(&Node::root(raw))
    }

    /// All-or-nothing: the first invalid element fails the whole batch.
    pub fn validate_list(&self, raw: &Value) -> Result<Vec<Event>, ValidationError> {
        Node::root(raw)
            .as_array()?
            .iter()
            .map(|node| self.event(node))
            .collect()
    }

    /// Opt-in element-wise tolerance; only a non-array input fails outright.
    pub fn validate_each(&self, raw: &Value) -> Result<ValidatedBatch, ValidationError> {
        let mut batch = ValidatedBatch::default();
        for (index, node) in Node::root(raw).as_array()?.iter().enumerate() {
            match self.event(node) {
                Ok(event) => batch.events.push(event),
                Err(err) => batch.rejected.push((index, err)),
            }
        }
        Ok(batch)
    }

    /// Parse a raw response body and validate it as a list.
    pub fn decode_list(&self, body: &[u8]) -> Result<Vec<Event>, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|err| ValidationError::schema("", format!("malformed JSON: {err}")))?;
        self.validate_list(&value)
    }

    fn event(&self, node: &Node<'_>) -> Result<Event, ValidationError> {
        node.expect_object()?;
        let kind = self.discriminate(node)?;

        let id = node.str("id")?;
        let actor = actor(&node.object_field("actor")?)?;
        let repo = repo(&node.object_field("repo")?)?;
        let public = node.bool("public")?;
        let created_at = node.field("created_at")?.as_timestamp()?;
        let org = node.optional("org")?.map(|org_node| org(&org_node)).transpose()?;
        let payload = payload(kind, &node.object_field("payload")?)?;

        Ok(Event {
            id,
            actor,
            repo,
            public,
            created_at,
            org,
            payload,
        })
    }

    fn discriminate(&self, node: &Node<'_>) -> Result<EventKind, ValidationError> {
        let tag_node = node.optional("type")?;
        let tag_path = match &tag_node {
            Some(tag) => tag.path().to_string(),
            None => child(node.path(), "type"),
        };
        let tag = tag_node.map(|tag| match tag.value().as_str() {
            Some(text) => text.to_string(),
            None => tag.value().to_string(),
        });

        if let Some(kind) = tag.as_deref().and_then(EventKind::from_tag) {
            return Ok(kind);
        }

        Err(match self.policy {
            VariantPolicy::Strict => ValidationError::UnknownVariant {
                path: tag_path,
                tag,
            },
            VariantPolicy::Legacy => ValidationError::schema(
                tag_path,
                match tag {
                    Some(tag) => format!("unrecognised event type `{tag}`"),
                    None => "event type is missing".to_string(),
                },
            ),
        })
    }
}

fn child(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// Validate one event with the strict variant policy.
pub fn validate(raw: &Value) -> Result<Event, ValidationError> {
    Validator::default().validate(raw)
}

/// Validate a list of events with the strict variant policy, failing the whole batch.
pub fn validate_list(raw: &Value) -> Result<Vec<Event>, ValidationError> {
    Validator::default().validate_list(raw)
}

/// Validate element-wise with the strict variant policy.
pub fn validate_each(raw: &Value) -> Result<ValidatedBatch, ValidationError> {
    Validator::default().validate_each(raw)
}

fn actor(node: &Node<'_>) -> Result<Actor, ValidationError> {
    Ok(Actor {
        id: node.u64("id")?,
        login: node.str("login")?,
        display_login: node.optional_str("display_login")?,
        url: node.str("url")?,
        avatar_url: node.str("avatar_url")?,
    })
}

fn repo(node: &Node<'_>) -> Result<RepoRef, ValidationError> {
    let name = node.str("name")?;
    if !is_owner_slash_name(&name) {
        return Err(ValidationError::schema(
            child(node.path(), "name"),
            format!("expected `owner/name`, found `{name}`"),
        ));
    }
    Ok(RepoRef {
        id: node.u64("id")?,
        name,
        url: node.str("url")?,
    })
}

fn is_owner_slash_name(name: &str) -> bool {
    match name.split_once('/') {
        Some((owner, repo)) => !owner.is_empty() && !repo.is_empty() && !repo.contains('/'),
        None => false,
    }
}

fn org(node: &Node<'_>) -> Result<Org, ValidationError> {
    node.expect_object()?;
    Ok(Org {
        id: node.u64("id")?,
        login: node.str("login")?,
        url: node.str("url")?,
        avatar_url: node.str("avatar_url")?,
    })
}

fn payload(kind: EventKind, node: &Node<'_>) -> Result<EventPayload, ValidationError> {
    Ok(match kind {
        EventKind::Push => EventPayload::Push(push(node)?),
        EventKind::PullRequest => EventPayload::PullRequest(PullRequestPayload {
            action: node.one_of("action", PullRequestAction::VALUES, PullRequestAction::parse)?,
            number: node.u64("number")?,
            pull_request: pull_request_ref(&node.object_field("pull_request")?)?,
            reason: node.optional_str("reason")?,
        }),
        EventKind::PullRequestReview => {
            EventPayload::PullRequestReview(PullRequestReviewPayload {
                action: node.one_of("action", CreatedAction::VALUES, CreatedAction::parse)?,
                pull_request: pull_request_ref(&node.object_field("pull_request")?)?,
                review: review(&node.object_field("review")?)?,
            })
        }
        EventKind::PullRequestReviewComment => {
            EventPayload::PullRequestReviewComment(PullRequestReviewCommentPayload {
                action: node.one_of("action", CreatedAction::VALUES, CreatedAction::parse)?,
                pull_request: pull_request_ref(&node.object_field("pull_request")?)?,
                comment: review_comment(&node.object_field("comment")?)?,
            })
        }
        EventKind::PullRequestReviewThread => {
            let thread = node.object_field("thread")?;
            EventPayload::PullRequestReviewThread(PullRequestReviewThreadPayload {
                action: node.one_of("action", ThreadAction::VALUES, ThreadAction::parse)?,
                pull_request: pull_request_ref(&node.object_field("pull_request")?)?,
                thread: ReviewThread {
                    id: thread.u64("id")?,
                    node_id: thread.str("node_id")?,
                },
            })
        }
        EventKind::Issues => EventPayload::Issues(IssuesPayload {
            action: node.one_of("action", IssuesAction::VALUES, IssuesAction::parse)?,
            issue: issue(&node.object_field("issue")?)?,
            label: node
                .optional("label")?
                .map(|label| label.str("name").map(|name| Label { name }))
                .transpose()?,
            assignee: node
                .optional("assignee")?
                .map(|assignee| user(&assignee))
                .transpose()?,
        }),
        EventKind::IssueComment => {
            let comment = node.object_field("comment")?;
            EventPayload::IssueComment(IssueCommentPayload {
                action: node.one_of(
                    "action",
                    IssueCommentAction::VALUES,
                    IssueCommentAction::parse,
                )?,
                issue: issue(&node.object_field("issue")?)?,
                comment: IssueComment {
                    id: comment.u64("id")?,
                    body: comment.str("body")?,
                    html_url: comment.str("html_url")?,
                    user: nullable_user(&comment, "user")?,
                },
            })
        }
        EventKind::CommitComment => {
            let comment = node.object_field("comment")?;
            EventPayload::CommitComment(CommitCommentPayload {
                action: node.one_of("action", CreatedAction::VALUES, CreatedAction::parse)?,
                comment: CommitComment {
                    id: comment.u64("id")?,
                    body: comment.str("body")?,
                    commit_id: comment.str("commit_id")?,
                    html_url: comment.str("html_url")?,
                    path: comment.nullable_str("path")?,
                    user: nullable_user(&comment, "user")?,
                },
            })
        }
        EventKind::Fork => {
            let forkee = node.object_field("forkee")?;
            EventPayload::Fork(ForkPayload {
                forkee: Forkee {
                    id: forkee.u64("id")?,
                    name: forkee.str("name")?,
                    full_name: forkee.str("full_name")?,
                    html_url: forkee.str("html_url")?,
                    description: forkee.nullable_str("description")?,
                },
            })
        }
        EventKind::Watch => EventPayload::Watch(WatchPayload {
            action: node.one_of("action", WatchAction::VALUES, WatchAction::parse)?,
        }),
        EventKind::Create => EventPayload::Create(CreatePayload {
            git_ref: node.nullable_str("ref")?,
            ref_type: node.one_of("ref_type", CreateRefType::VALUES, CreateRefType::parse)?,
            master_branch: node.str("master_branch")?,
            description: node.nullable_str("description")?,
            pusher_type: node.str("pusher_type")?,
        }),
        EventKind::Delete => EventPayload::Delete(DeletePayload {
            git_ref: node.str("ref")?,
            ref_type: node.one_of("ref_type", DeleteRefType::VALUES, DeleteRefType::parse)?,
            pusher_type: node.optional_str("pusher_type")?,
        }),
        EventKind::Release => EventPayload::Release(ReleasePayload {
            action: node.one_of("action", ReleaseAction::VALUES, ReleaseAction::parse)?,
            release: release(&node.object_field("release")?)?,
        }),
        EventKind::Member => EventPayload::Member(MemberPayload {
            action: node.one_of("action", MemberAction::VALUES, MemberAction::parse)?,
            member: user(&node.object_field("member")?)?,
        }),
        EventKind::Public => EventPayload::Public(PublicPayload {}),
        EventKind::Gollum => EventPayload::Gollum(GollumPayload {
            pages: node
                .field("pages")?
                .as_array()?
                .iter()
                .map(wiki_page)
                .collect::<Result<_, _>>()?,
        }),
    })
}

fn push(node: &Node<'_>) -> Result<PushPayload, ValidationError> {
    let commits = match node.optional("commits")? {
        Some(list) => list
            .as_array()?
            .iter()
            .map(|commit| {
                commit.expect_object()?;
                Ok(PushCommit {
                    sha: commit.str("sha")?,
                    message: commit.str("message")?,
                    distinct: commit.optional_bool("distinct")?,
                })
            })
            .collect::<Result<_, ValidationError>>()?,
        None => Vec::new(),
    };

    Ok(PushPayload {
        repository_id: node.u64("repository_id")?,
        push_id: node.u64("push_id")?,
        git_ref: node.str("ref")?,
        head: node.str("head")?,
        before: node.str("before")?,
        size: node.optional_u64("size")?,
        distinct_size: node.optional_u64("distinct_size")?,
        commits,
    })
}

fn user(node: &Node<'_>) -> Result<UserRef, ValidationError> {
    node.expect_object()?;
    Ok(UserRef {
        id: node.u64("id")?,
        login: node.str("login")?,
        html_url: node.str("html_url")?,
    })
}

fn nullable_user(node: &Node<'_>, name: &str) -> Result<Option<UserRef>, ValidationError> {
    node.nullable(name)?.map(|found| user(&found)).transpose()
}

fn branch(node: &Node<'_>) -> Result<BranchRef, ValidationError> {
    let repo = match node.nullable("repo")? {
        Some(repo) => {
            repo.expect_object()?;
            Some(BranchRepo {
                id: repo.u64("id")?,
                name: repo.str("name")?,
                url: repo.str("url")?,
            })
        }
        None => None,
    };
    Ok(BranchRef {
        git_ref: node.str("ref")?,
        sha: node.str("sha")?,
        repo,
    })
}

fn pull_request_ref(node: &Node<'_>) -> Result<PullRequestRef, ValidationError> {
    Ok(PullRequestRef {
        id: node.u64("id")?,
        number: node.u64("number")?,
        url: node.str("url")?,
        head: branch(&node.object_field("head")?)?,
        base: branch(&node.object_field("base")?)?,
        title: node.optional_str("title")?,
        body: node.optional_str("body")?,
        html_url: node.optional_str("html_url")?,
    })
}

fn issue(node: &Node<'_>) -> Result<Issue, ValidationError> {
    Ok(Issue {
        id: node.u64("id")?,
        number: node.u64("number")?,
        title: node.str("title")?,
        state: node.str("state")?,
        body: node.nullable_str("body")?,
        html_url: node.str("html_url")?,
        user: nullable_user(node, "user")?,
        pull_request: node
            .optional("pull_request")?
            .map(|link| -> Result<IssuePullLink, ValidationError> {
                link.expect_object()?;
                Ok(IssuePullLink {
                    html_url: link.optional_str("html_url")?,
                })
            })
            .transpose()?,
    })
}

fn review(node: &Node<'_>) -> Result<Review, ValidationError> {
    Ok(Review {
        id: node.u64("id")?,
        state: node.str("state")?,
        body: node.nullable_str("body")?,
        html_url: node.str("html_url")?,
        commit_id: node.str("commit_id")?,
        user: nullable_user(node, "user")?,
        submitted_at: node.optional_str("submitted_at")?,
    })
}

fn review_comment(node: &Node<'_>) -> Result<ReviewComment, ValidationError> {
    Ok(ReviewComment {
        id: node.u64("id")?,
        body: node.str("body")?,
        path: node.str("path")?,
        diff_hunk: node.str("diff_hunk")?,
        commit_id: node.str("commit_id")?,
        html_url: node.str("html_url")?,
        user: nullable_user(node, "user")?,
        in_reply_to_id: node.optional_u64("in_reply_to_id")?,
    })
}

fn release(node: &Node<'_>) -> Result<Release, ValidationError> {
    Ok(Release {
        id: node.u64("id")?,
        tag_name: node.str("tag_name")?,
        name: node.nullable_str("name")?,
        body: node.nullable_str("body")?,
        html_url: node.str("html_url")?,
        draft: node.bool("draft")?,
        prerelease: node.bool("prerelease")?,
        published_at: node.nullable_str("published_at")?,
        author: user(&node.object_field("author")?)?,
    })
}

fn wiki_page(node: &Node<'_>) -> Result<WikiPage, ValidationError> {
    node.expect_object()?;
    Ok(WikiPage {
        page_name: node.str("page_name")?,
        title: node.str("title")?,
        summary: node.optional_str("summary")?,
        action: node.one_of("action", WikiAction::VALUES, WikiAction::parse)?,
        sha: node.str("sha")?,
        html_url: node.str("html_url")?,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::fixtures;

    #[test]
    fn every_variant_fixture_validates_with_its_own_tag() {
        for kind in EventKind::ALL {
            let raw = fixtures::event(kind, "1");
            let event = validate(&raw).unwrap_or_else(|err| panic!("{kind}: {err}"));
            assert_eq!(event.kind(), kind);
            assert_eq!(event.kind().as_str(), raw["type"].as_str().expect("tag"));
        }
    }

    #[test]
    fn validation_is_idempotent() {
        let raw = fixtures::event(EventKind::PullRequest, "7");
        assert_eq!(validate(&raw), validate(&raw));
    }

    #[test]
    fn missing_payload_field_reports_its_path() {
        let mut raw = fixtures::event(EventKind::PullRequest, "7");
        raw["payload"]["pull_request"]
            .as_object_mut()
            .expect("object")
            .remove("number");
        let err = validate(&raw).expect_err("number removed");
        assert_eq!(
            err,
            ValidationError::MissingField {
                path: "payload.pull_request.number".to_string()
            }
        );
    }

    #[test]
    fn missing_envelope_field_fails_instead_of_defaulting() {
        let mut raw = fixtures::event(EventKind::Watch, "3");
        raw["actor"].as_object_mut().expect("object").remove("login");
        let err = validate(&raw).expect_err("login removed");
        assert_eq!(err.path(), "actor.login");
    }

    #[test]
    fn unknown_tag_is_reported_with_the_tag() {
        let mut raw = fixtures::event(EventKind::Watch, "3");
        raw["type"] = json!("SponsorshipEvent");
        let err = validate(&raw).expect_err("unknown");
        assert_eq!(
            err,
            ValidationError::UnknownVariant {
                path: "type".to_string(),
                tag: Some("SponsorshipEvent".to_string())
            }
        );
    }

    #[test]
    fn absent_tag_is_an_unknown_variant_without_tag() {
        let mut raw = fixtures::event(EventKind::Watch, "3");
        raw.as_object_mut().expect("object").remove("type");
        assert!(matches!(
            validate(&raw),
            Err(ValidationError::UnknownVariant { tag: None, .. })
        ));
    }

    #[test]
    fn legacy_policy_reports_unknown_tags_as_schema_errors() {
        let mut raw = fixtures::event(EventKind::Watch, "3");
        raw["type"] = json!(42);
        let err = Validator::new(VariantPolicy::Legacy)
            .validate(&raw)
            .expect_err("numeric tag");
        assert!(matches!(err, ValidationError::SchemaError { ref path, .. } if path == "type"));
    }

    #[test]
    fn foreign_payload_is_rejected_for_the_declared_tag() {
        let mut raw = fixtures::event(EventKind::Release, "3");
        raw["payload"] = fixtures::event(EventKind::Watch, "4")["payload"].clone();
        let err = validate(&raw).expect_err("watch payload under release tag");
        assert!(err.path().starts_with("payload."));
    }

    #[test]
    fn unknown_extra_fields_are_ignored() {
        let mut raw = fixtures::event(EventKind::Fork, "3");
        raw["brand_new_field"] = json!({"nested": true});
        raw["payload"]["forkee"]["topics"] = json!(["rust"]);
        assert!(validate(&raw).is_ok());
    }

    #[test]
    fn unexpected_action_value_is_a_schema_error() {
        let mut raw = fixtures::event(EventKind::Issues, "3");
        raw["payload"]["action"] = json!("transferred");
        let err = validate(&raw).expect_err("unknown action");
        assert!(matches!(err, ValidationError::SchemaError { ref path, .. } if path == "payload.action"));
    }

    #[test]
    fn non_object_inputs_never_panic() {
        for raw in [json!(null), json!(1), json!("PushEvent"), json!([]), json!(true)] {
            assert!(validate(&raw).is_err());
        }
        assert!(validate_list(&json!({"not": "a list"})).is_err());
    }

    #[test]
    fn list_failure_carries_the_element_index() {
        let mut bad = fixtures::event(EventKind::Create, "2");
        bad["payload"]["ref_type"] = json!("commit");
        let raw = json!([fixtures::event(EventKind::Push, "1"), bad]);
        let err = validate_list(&raw).expect_err("second element invalid");
        assert_eq!(err.path(), "[1].payload.ref_type");
    }

    #[test]
    fn validate_each_keeps_good_elements() {
        let raw = json!([
            fixtures::event(EventKind::Push, "1"),
            {"type": "NopeEvent"},
            fixtures::event(EventKind::Member, "3"),
        ]);
        let batch = validate_each(&raw).expect("array");
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].0, 1);
        assert_eq!(batch.rejected[0].1.path(), "[1].type");
    }

    #[test]
    fn decode_list_rejects_malformed_json() {
        let err = Validator::default()
            .decode_list(b"[{\"id\":")
            .expect_err("truncated body");
        assert!(matches!(err, ValidationError::SchemaError { ref path, .. } if path.is_empty()));
        assert!(err.to_string().contains("`$`"));
    }

    #[test]
    fn repo_name_must_be_owner_slash_name() {
        let mut raw = fixtures::event(EventKind::Watch, "3");
        raw["repo"]["name"] = json!("just-a-name");
        assert_eq!(validate(&raw).expect_err("bad name").path(), "repo.name");
    }

    #[test]
    fn serialized_event_validates_back_to_itself() {
        let raw = fixtures::event(EventKind::IssueComment, "9");
        let event = validate(&raw).expect("valid");
        let reserialized = serde_json::to_value(&event).expect("serialize");
        assert_eq!(validate(&reserialized).expect("valid again"), event);
    }
}
