//! Representative upstream event documents used across unit tests.

use serde_json::{Value, json};

use super::events::EventKind;

fn user(login: &str) -> Value {
    json!({
        "id": 583231,
        "login": login,
        "html_url": format!("https://github.com/{login}"),
        "type": "User"
    })
}

fn branch(name: &str) -> Value {
    json!({
        "ref": name,
        "sha": "7638417db6d59f3c431d3e1f261cc637155684cd",
        "repo": {
            "id": 1296269,
            "name": "Hello-World",
            "url": "https://api.github.com/repos/octocat/Hello-World"
        }
    })
}

fn pull_request() -> Value {
    json!({
        "id": 1,
        "number": 1347,
        "url": "https://api.github.com/repos/octocat/Hello-World/pulls/1347",
        "head": branch("new-topic"),
        "base": branch("main"),
        "title": "Amazing new feature",
        "body": "Please pull these awesome changes in!",
        "html_url": "https://github.com/octocat/Hello-World/pull/1347"
    })
}

fn issue() -> Value {
    json!({
        "id": 1,
        "number": 1347,
        "title": "Found a bug",
        "state": "open",
        "body": "I'm having a problem with this.",
        "html_url": "https://github.com/octocat/Hello-World/issues/1347",
        "user": user("octocat")
    })
}

/// Payload document for each variant.
pub(crate) fn payload(kind: EventKind) -> Value {
    match kind {
        EventKind::Push => json!({
            "repository_id": 1296269,
            "push_id": 10115855396_u64,
            "ref": "refs/heads/main",
            "head": "7a8f3ac80e2ad2f6842cb86f576d4bfe2c03e300",
            "before": "883efe034920928c47fe18598c01249d1a9fdabd",
            "size": 2,
            "distinct_size": 2,
            "commits": [
                {"sha": "7a8f3ac80e2ad2f6842cb86f576d4bfe2c03e300", "message": "Fix parser", "distinct": true, "author": {"name": "Mona"}},
                {"sha": "883efe034920928c47fe18598c01249d1a9fdabd", "message": "Add tests", "distinct": true}
            ]
        }),
        EventKind::PullRequest => json!({
            "action": "opened",
            "number": 1347,
            "pull_request": pull_request()
        }),
        EventKind::PullRequestReview => json!({
            "action": "created",
            "pull_request": pull_request(),
            "review": {
                "id": 80,
                "state": "approved",
                "body": null,
                "html_url": "https://github.com/octocat/Hello-World/pull/1347#pullrequestreview-80",
                "commit_id": "ecdd80bb57125d7ba9641ffaa4d7d2c19d3f3091",
                "user": user("hubot"),
                "submitted_at": "2024-05-01T12:00:00Z"
            }
        }),
        EventKind::PullRequestReviewComment => json!({
            "action": "created",
            "pull_request": pull_request(),
            "comment": {
                "id": 10,
                "body": "Great stuff!",
                "path": "src/lib.rs",
                "diff_hunk": "@@ -16,33 +16,40 @@",
                "commit_id": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
                "html_url": "https://github.com/octocat/Hello-World/pull/1347#discussion-diff-10",
                "user": user("hubot")
            }
        }),
        EventKind::PullRequestReviewThread => json!({
            "action": "resolved",
            "pull_request": pull_request(),
            "thread": {"id": 11, "node_id": "PRRT_kwDOAAABc84AAAAA"}
        }),
        EventKind::Issues => json!({
            "action": "labeled",
            "issue": issue(),
            "label": {"name": "bug", "color": "f29513"}
        }),
        EventKind::IssueComment => json!({
            "action": "created",
            "issue": issue(),
            "comment": {
                "id": 1,
                "body": "Me too",
                "html_url": "https://github.com/octocat/Hello-World/issues/1347#issuecomment-1",
                "user": user("hubot")
            }
        }),
        EventKind::CommitComment => json!({
            "action": "created",
            "comment": {
                "id": 1,
                "body": "Nice change",
                "commit_id": "6dcb09b5b57875f334f61aebed695e2e4193db5e",
                "html_url": "https://github.com/octocat/Hello-World/commit/6dcb09b#commitcomment-1",
                "path": null,
                "user": user("hubot")
            }
        }),
        EventKind::Fork => json!({
            "forkee": {
                "id": 2,
                "name": "Hello-World",
                "full_name": "hubot/Hello-World",
                "html_url": "https://github.com/hubot/Hello-World",
                "description": null
            }
        }),
        EventKind::Watch => json!({"action": "started"}),
        EventKind::Create => json!({
            "ref": "v1.0.0",
            "ref_type": "tag",
            "master_branch": "main",
            "description": "My first repository",
            "pusher_type": "user"
        }),
        EventKind::Delete => json!({
            "ref": "old-topic",
            "ref_type": "branch",
            "pusher_type": "user"
        }),
        EventKind::Release => json!({
            "action": "published",
            "release": {
                "id": 1,
                "tag_name": "v1.0.0",
                "name": "First release",
                "body": "Description of the release",
                "html_url": "https://github.com/octocat/Hello-World/releases/v1.0.0",
                "draft": false,
                "prerelease": false,
                "published_at": "2024-05-01T12:00:00Z",
                "author": user("octocat")
            }
        }),
        EventKind::Member => json!({"action": "added", "member": user("hubot")}),
        EventKind::Public => json!({}),
        EventKind::Gollum => json!({
            "pages": [{
                "page_name": "Home",
                "title": "Home",
                "summary": null,
                "action": "created",
                "sha": "91ea1bd42aa2ba166b86e8aefe049e9837214e67",
                "html_url": "https://github.com/octocat/Hello-World/wiki/Home"
            }]
        }),
    }
}

/// A complete event document of the given variant.
pub(crate) fn event(kind: EventKind, id: &str) -> Value {
    json!({
        "id": id,
        "type": kind.as_str(),
        "actor": {
            "id": 583231,
            "login": "octocat",
            "display_login": "octocat",
            "gravatar_id": "",
            "url": "https://api.github.com/users/octocat",
            "avatar_url": "https://avatars.githubusercontent.com/u/583231?"
        },
        "repo": {
            "id": 1296269,
            "name": "octocat/Hello-World",
            "url": "https://api.github.com/repos/octocat/Hello-World"
        },
        "payload": payload(kind),
        "public": true,
        "created_at": "2024-05-01T12:00:00Z"
    })
}

/// A JSON array of `count` push events with ids `{offset}..{offset + count}`.
pub(crate) fn page(offset: usize, count: usize) -> Value {
    Value::Array(
        (offset..offset + count)
            .map(|index| event(EventKind::Push, &index.to_string()))
            .collect(),
    )
}
