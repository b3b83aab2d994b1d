//! Feed projection for RSS 2.0 and Atom 1.0.
//!
//! [`project`] is pure: the same events always yield the same document. The
//! build timestamp is supplied only at render time and is excluded from the
//! content hash used as the feed's entity tag.

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};

use crate::domain::payloads::EventPayload;
use crate::domain::{Event, Subject};

pub const DEFAULT_SITE_URL: &str = "https://ghactivity.com";
pub const DEFAULT_ITEM_LIMIT: usize = 100;
pub const DEFAULT_TTL_MINUTES: u32 = 60;

const GENERATOR: &str = "GitHub Activity RSS";
const GITHUB_URL: &str = "https://github.com";
const BODY_EXCERPT_CHARS: usize = 500;
const PUSH_COMMITS_SHOWN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedOptions {
    pub site_url: String,
    pub item_limit: usize,
    pub ttl_minutes: u32,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            item_limit: DEFAULT_ITEM_LIMIT,
            ttl_minutes: DEFAULT_TTL_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

impl FeedFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            FeedFormat::Rss => "application/rss+xml; charset=utf-8",
            FeedFormat::Atom => "application/atom+xml; charset=utf-8",
        }
    }

    fn path_segment(self) -> &'static str {
        match self {
            FeedFormat::Rss => "rss",
            FeedFormat::Atom => "atom",
        }
    }
}

/// One projected event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// Plain text; escaped when rendered.
    pub title: String,
    /// Markup fragment whose upstream text is already escaped.
    pub description: String,
    pub link: String,
    pub id: String,
    pub published_at: OffsetDateTime,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub subject: String,
    pub title: String,
    pub link: String,
    pub description: String,
    site_url: String,
    ttl_minutes: u32,
    pub items: Vec<FeedItem>,
}

/// Project validated events into a feed document, preserving their order.
pub fn project(subject: &Subject, events: &[Event], options: &FeedOptions) -> FeedDocument {
    let login = subject.as_str();
    FeedDocument {
        subject: login.to_string(),
        title: format!("{login}'s GitHub Activity"),
        link: format!("{GITHUB_URL}/{login}"),
        description: format!("Recent GitHub activity for {login}"),
        site_url: options.site_url.trim_end_matches('/').to_string(),
        ttl_minutes: options.ttl_minutes,
        items: events
            .iter()
            .take(options.item_limit)
            .map(project_event)
            .collect(),
    }
}

fn project_event(event: &Event) -> FeedItem {
    let label = event.kind().label();
    FeedItem {
        title: format!("{label} in {}", event.repo_name()),
        description: describe(event),
        link: format!("{GITHUB_URL}/{}", event.repo_name()),
        id: event.id.clone(),
        published_at: event.created_at,
        category: label,
    }
}

fn describe(event: &Event) -> String {
    let actor = xml_escape(event.actor_login());
    let repo = xml_escape(event.repo_name());

    match &event.payload {
        EventPayload::Push(push) => {
            let mut text = format!("{actor} pushed to {} in {repo}", xml_escape(push.short_ref()));
            if let Some(count) = push.commit_count().filter(|count| *count > 0) {
                let plural = if count == 1 { "" } else { "s" };
                text.push_str(&format!(" ({count} commit{plural})"));
            }
            if !push.commits.is_empty() {
                let messages: Vec<String> = push
                    .commits
                    .iter()
                    .take(PUSH_COMMITS_SHOWN)
                    .map(|commit| {
                        let summary = commit.message.lines().next().unwrap_or_default();
                        format!("• {}", xml_escape(summary))
                    })
                    .collect();
                text.push_str("<br/><br/>Recent commits:<br/>");
                text.push_str(&messages.join("<br/>"));
            }
            text
        }
        EventPayload::PullRequest(payload) => {
            let pr = &payload.pull_request;
            let mut text = format!(
                "{actor} {} pull request #{}: \"{}\" in {repo}",
                payload.action.as_str().replace('_', " "),
                payload.number,
                xml_escape(pr.title.as_deref().unwrap_or_default()),
            );
            append_excerpt(&mut text, pr.body.as_deref());
            text
        }
        EventPayload::PullRequestReview(payload) => format!(
            "{actor} reviewed pull request #{} in {repo} ({})",
            payload.pull_request.number,
            xml_escape(&payload.review.state.replace('_', " ")),
        ),
        EventPayload::PullRequestReviewComment(payload) => {
            let mut text = format!(
                "{actor} commented on pull request #{} in {repo}",
                payload.pull_request.number
            );
            append_excerpt(&mut text, Some(&payload.comment.body));
            text
        }
        EventPayload::PullRequestReviewThread(payload) => format!(
            "{actor} {} a review thread on pull request #{} in {repo}",
            payload.action.as_str(),
            payload.pull_request.number,
        ),
        EventPayload::Issues(payload) => format!(
            "{actor} {} issue #{}: \"{}\" in {repo}",
            payload.action.as_str(),
            payload.issue.number,
            xml_escape(&payload.issue.title),
        ),
        EventPayload::IssueComment(payload) => {
            let target = if payload.issue.is_pull_request() {
                "pull request"
            } else {
                "issue"
            };
            let mut text = format!(
                "{actor} commented on {target} #{} in {repo}",
                payload.issue.number
            );
            append_excerpt(&mut text, Some(&payload.comment.body));
            text
        }
        EventPayload::CommitComment(payload) => {
            let sha: String = payload.comment.commit_id.chars().take(7).collect();
            let mut text = format!("{actor} commented on commit {} in {repo}", xml_escape(&sha));
            append_excerpt(&mut text, Some(&payload.comment.body));
            text
        }
        EventPayload::Fork(payload) => format!(
            "{actor} forked {repo} to {}",
            xml_escape(&payload.forkee.full_name)
        ),
        EventPayload::Watch(_) => format!("{actor} starred {repo}"),
        EventPayload::Create(payload) => match &payload.git_ref {
            Some(git_ref) => format!(
                "{actor} created {} \"{}\" in {repo}",
                payload.ref_type.as_str(),
                xml_escape(git_ref)
            ),
            None => format!("{actor} created {} {repo}", payload.ref_type.as_str()),
        },
        EventPayload::Delete(payload) => format!(
            "{actor} deleted {} \"{}\" in {repo}",
            payload.ref_type.as_str(),
            xml_escape(&payload.git_ref)
        ),
        EventPayload::Release(payload) => format!(
            "{actor} {} release \"{}\" in {repo}",
            payload.action.as_str(),
            xml_escape(payload.release.display_name()),
        ),
        EventPayload::Member(payload) => format!(
            "{actor} {} {} as a collaborator to {repo}",
            payload.action.as_str(),
            xml_escape(&payload.member.login),
        ),
        EventPayload::Public(_) => format!("{actor} made {repo} public"),
        EventPayload::Gollum(payload) => match payload.pages.split_first() {
            Some((first, rest)) => {
                let mut text = format!(
                    "{actor} {} wiki page \"{}\" in {repo}",
                    first.action.as_str(),
                    xml_escape(&first.title),
                );
                if !rest.is_empty() {
                    text.push_str(&format!(" and {} more", rest.len()));
                }
                text
            }
            None => format!("{actor} updated the wiki in {repo}"),
        },
    }
}

fn append_excerpt(text: &mut String, body: Option<&str>) {
    let Some(body) = body.map(str::trim).filter(|body| !body.is_empty()) else {
        return;
    };
    text.push_str("<br/><br/>");
    text.push_str(&xml_escape(&truncate(body, BODY_EXCERPT_CHARS)));
}

fn truncate(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &input[..cut]),
        None => input.to_string(),
    }
}

impl FeedDocument {
    /// Render the document; `build_date` is omitted when `None`.
    pub fn render(&self, format: FeedFormat, build_date: Option<OffsetDateTime>) -> String {
        match format {
            FeedFormat::Rss => self.to_rss(build_date),
            FeedFormat::Atom => self.to_atom(build_date),
        }
    }

    /// Strong entity tag over the rendered content, excluding the build date.
    pub fn etag(&self, format: FeedFormat) -> String {
        let digest = Sha256::digest(self.render(format, None).as_bytes());
        format!("\"{}\"", hex::encode(digest))
    }

    fn self_link(&self, format: FeedFormat) -> String {
        format!("{}/{}/{}", self.site_url, self.subject, format.path_segment())
    }

    pub fn to_rss(&self, build_date: Option<OffsetDateTime>) -> String {
        let mut items = String::new();
        for item in &self.items {
            items.push_str(&format!(
                "    <item>\n      <title>{}</title>\n      <description><![CDATA[{}]]></description>\n      <link>{}</link>\n      <guid isPermaLink=\"false\">{}</guid>\n      <pubDate>{}</pubDate>\n      <author>{}@github.com</author>\n      <category>{}</category>\n    </item>\n",
                xml_escape(&item.title),
                item.description,
                xml_escape(&item.link),
                xml_escape(&item.id),
                rfc2822(item.published_at),
                xml_escape(&self.subject),
                xml_escape(&item.category),
            ));
        }

        let build = build_date
            .map(|at| format!("    <lastBuildDate>{}</lastBuildDate>\n", rfc2822(at)))
            .unwrap_or_default();

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n  <channel>\n    <title>{}</title>\n    <description>{}</description>\n    <link>{}</link>\n    <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\" />\n    <language>en-us</language>\n{}    <ttl>{}</ttl>\n    <generator>{GENERATOR}</generator>\n{}  </channel>\n</rss>\n",
            xml_escape(&self.title),
            xml_escape(&self.description),
            xml_escape(&self.link),
            xml_escape(&self.self_link(FeedFormat::Rss)),
            build,
            self.ttl_minutes,
            items,
        )
    }

    pub fn to_atom(&self, build_date: Option<OffsetDateTime>) -> String {
        let updated = build_date
            .or_else(|| self.items.first().map(|item| item.published_at))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);

        let mut entries = String::new();
        for item in &self.items {
            entries.push_str(&format!(
                "  <entry>\n    <title>{}</title>\n    <link href=\"{}\"/>\n    <id>urn:github:event:{}</id>\n    <updated>{}</updated>\n    <author><name>{}</name></author>\n    <category term=\"{}\"/>\n    <summary type=\"html\"><![CDATA[{}]]></summary>\n  </entry>\n",
                xml_escape(&item.title),
                xml_escape(&item.link),
                xml_escape(&item.id),
                rfc3339(item.published_at),
                xml_escape(&self.subject),
                xml_escape(&item.category),
                item.description,
            ));
        }

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<feed xmlns=\"http://www.w3.org/2005/Atom\">\n  <title>{}</title>\n  <subtitle>{}</subtitle>\n  <id>{}</id>\n  <updated>{}</updated>\n  <link href=\"{}\"/>\n  <link href=\"{}\" rel=\"self\"/>\n  <generator>{GENERATOR}</generator>\n{}</feed>\n",
            xml_escape(&self.title),
            xml_escape(&self.description),
            xml_escape(&self.link),
            rfc3339(updated),
            xml_escape(&self.link),
            xml_escape(&self.self_link(FeedFormat::Atom)),
            entries,
        )
    }
}

/// A single-item feed explaining why the real feed could not be produced.
pub fn error_feed(subject: &str, message: &str, options: &FeedOptions, at: OffsetDateTime) -> String {
    let link = format!("{GITHUB_URL}/{subject}");
    let document = FeedDocument {
        subject: subject.to_string(),
        title: format!("{subject}'s GitHub Activity"),
        link: link.clone(),
        description: format!("Recent GitHub activity for {subject}"),
        site_url: options.site_url.trim_end_matches('/').to_string(),
        ttl_minutes: options.ttl_minutes,
        items: vec![FeedItem {
            title: "Error loading GitHub activity".to_string(),
            description: xml_escape(message),
            link,
            id: format!("error-{}", at.unix_timestamp()),
            published_at: at,
            category: "Error".to_string(),
        }],
    };
    document.to_rss(Some(at))
}

fn rfc2822(at: OffsetDateTime) -> String {
    at.format(&Rfc2822).unwrap_or_else(|_| at.to_string())
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
