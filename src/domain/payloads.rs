//! Variant payload shapes.
//!
//! Only the fields needed to discriminate and display events are modelled;
//! anything else the upstream sends is ignored by the validator.

use serde::Serialize;

use super::events::EventKind;

macro_rules! closed_values {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

closed_values!(
    /// The single action used by comment and review creation events.
    CreatedAction { Created => "created" }
);
closed_values!(IssueCommentAction {
    Created => "created",
    Edited => "edited",
    Deleted => "deleted",
});
closed_values!(IssuesAction {
    Opened => "opened",
    Edited => "edited",
    Closed => "closed",
    Reopened => "reopened",
    Assigned => "assigned",
    Unassigned => "unassigned",
    Labeled => "labeled",
    Unlabeled => "unlabeled",
});
closed_values!(PullRequestAction {
    Opened => "opened",
    Edited => "edited",
    Closed => "closed",
    Reopened => "reopened",
    Assigned => "assigned",
    Unassigned => "unassigned",
    ReviewRequested => "review_requested",
    ReviewRequestRemoved => "review_request_removed",
    Labeled => "labeled",
    Unlabeled => "unlabeled",
    Synchronize => "synchronize",
    Merged => "merged",
});
closed_values!(ThreadAction {
    Resolved => "resolved",
    Unresolved => "unresolved",
});
closed_values!(ReleaseAction { Published => "published" });
closed_values!(MemberAction { Added => "added" });
closed_values!(WatchAction { Started => "started" });
closed_values!(CreateRefType {
    Branch => "branch",
    Tag => "tag",
    Repository => "repository",
});
closed_values!(DeleteRefType {
    Branch => "branch",
    Tag => "tag",
});
closed_values!(WikiAction {
    Created => "created",
    Edited => "edited",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRef {
    pub id: u64,
    pub login: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushCommit {
    pub sha: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushPayload {
    pub repository_id: u64,
    pub push_id: u64,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub head: String,
    pub before: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_size: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<PushCommit>,
}

impl PushPayload {
    /// Commit count, preferring the explicit size over the listed commits.
    pub fn commit_count(&self) -> Option<u64> {
        self.size.or_else(|| {
            (!self.commits.is_empty()).then_some(self.commits.len() as u64)
        })
    }

    /// Branch or tag name without the `refs/heads/` or `refs/tags/` prefix.
    pub fn short_ref(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .or_else(|| self.git_ref.strip_prefix("refs/tags/"))
            .unwrap_or(&self.git_ref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRepo {
    pub id: u64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    pub repo: Option<BranchRepo>,
}

/// The abbreviated pull request object embedded in events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRef {
    pub id: u64,
    pub number: u64,
    pub url: String,
    pub head: BranchRef,
    pub base: BranchRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub state: String,
    pub body: Option<String>,
    pub html_url: String,
    pub user: Option<UserRef>,
    /// Present when the issue is the conversation of a pull request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<IssuePullLink>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuePullLink {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
    pub html_url: String,
    pub user: Option<UserRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitComment {
    pub id: u64,
    pub body: String,
    pub commit_id: String,
    pub html_url: String,
    pub path: Option<String>,
    pub user: Option<UserRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: u64,
    pub state: String,
    pub body: Option<String>,
    pub html_url: String,
    pub commit_id: String,
    pub user: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewComment {
    pub id: u64,
    pub body: String,
    pub path: String,
    pub diff_hunk: String,
    pub commit_id: String,
    pub html_url: String,
    pub user: Option<UserRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewThread {
    pub id: u64,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forkee {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    pub id: u64,
    pub tag_name: String,
    pub name: Option<String>,
    pub body: Option<String>,
    pub html_url: String,
    pub draft: bool,
    pub prerelease: bool,
    pub published_at: Option<String>,
    pub author: UserRef,
}

impl Release {
    /// Display name, falling back to the tag when the release is unnamed.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.tag_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiPage {
    pub page_name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub action: WikiAction,
    pub sha: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestPayload {
    pub action: PullRequestAction,
    pub number: u64,
    pub pull_request: PullRequestRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestReviewPayload {
    pub action: CreatedAction,
    pub pull_request: PullRequestRef,
    pub review: Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestReviewCommentPayload {
    pub action: CreatedAction,
    pub pull_request: PullRequestRef,
    pub comment: ReviewComment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestReviewThreadPayload {
    pub action: ThreadAction,
    pub pull_request: PullRequestRef,
    pub thread: ReviewThread,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuesPayload {
    pub action: IssuesAction,
    pub issue: Issue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueCommentPayload {
    pub action: IssueCommentAction,
    pub issue: Issue,
    pub comment: IssueComment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitCommentPayload {
    pub action: CreatedAction,
    pub comment: CommitComment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkPayload {
    pub forkee: Forkee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchPayload {
    pub action: WatchAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatePayload {
    #[serde(rename = "ref")]
    pub git_ref: Option<String>,
    pub ref_type: CreateRefType,
    pub master_branch: String,
    pub description: Option<String>,
    pub pusher_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletePayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub ref_type: DeleteRefType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pusher_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleasePayload {
    pub action: ReleaseAction,
    pub release: Release,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberPayload {
    pub action: MemberAction,
    pub member: UserRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicPayload {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GollumPayload {
    pub pages: Vec<WikiPage>,
}

/// Variant-specific payload; the serialized `type` tag is derived from the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "PushEvent")]
    Push(PushPayload),
    #[serde(rename = "PullRequestEvent")]
    PullRequest(PullRequestPayload),
    #[serde(rename = "PullRequestReviewEvent")]
    PullRequestReview(PullRequestReviewPayload),
    #[serde(rename = "PullRequestReviewCommentEvent")]
    PullRequestReviewComment(PullRequestReviewCommentPayload),
    #[serde(rename = "PullRequestReviewThreadEvent")]
    PullRequestReviewThread(PullRequestReviewThreadPayload),
    #[serde(rename = "IssuesEvent")]
    Issues(IssuesPayload),
    #[serde(rename = "IssueCommentEvent")]
    IssueComment(IssueCommentPayload),
    #[serde(rename = "CommitCommentEvent")]
    CommitComment(CommitCommentPayload),
    #[serde(rename = "ForkEvent")]
    Fork(ForkPayload),
    #[serde(rename = "WatchEvent")]
    Watch(WatchPayload),
    #[serde(rename = "CreateEvent")]
    Create(CreatePayload),
    #[serde(rename = "DeleteEvent")]
    Delete(DeletePayload),
    #[serde(rename = "ReleaseEvent")]
    Release(ReleasePayload),
    #[serde(rename = "MemberEvent")]
    Member(MemberPayload),
    #[serde(rename = "PublicEvent")]
    Public(PublicPayload),
    #[serde(rename = "GollumEvent")]
    Gollum(GollumPayload),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Push(_) => EventKind::Push,
            EventPayload::PullRequest(_) => EventKind::PullRequest,
            EventPayload::PullRequestReview(_) => EventKind::PullRequestReview,
            EventPayload::PullRequestReviewComment(_) => EventKind::PullRequestReviewComment,
            EventPayload::PullRequestReviewThread(_) => EventKind::PullRequestReviewThread,
            EventPayload::Issues(_) => EventKind::Issues,
            EventPayload::IssueComment(_) => EventKind::IssueComment,
            EventPayload::CommitComment(_) => EventKind::CommitComment,
            EventPayload::Fork(_) => EventKind::Fork,
            EventPayload::Watch(_) => EventKind::Watch,
            EventPayload::Create(_) => EventKind::Create,
            EventPayload::Delete(_) => EventKind::Delete,
            EventPayload::Release(_) => EventKind::Release,
            EventPayload::Member(_) => EventKind::Member,
            EventPayload::Public(_) => EventKind::Public,
            EventPayload::Gollum(_) => EventKind::Gollum,
        }
    }
}
