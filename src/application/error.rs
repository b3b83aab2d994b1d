use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{domain::ValidationError, infra::error::InfraError};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<FetchError> for HttpError {
    fn from(error: FetchError) -> Self {
        const SOURCE: &str = "application::error::fetch_error_to_http_error";
        let kind = error.kind();
        HttpError::from_error(SOURCE, kind.status(), kind.public_message(), &error)
    }
}

/// Transient upstream failures that a stale cache entry may paper over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    #[error("network failure: {0}")]
    Network(String),
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream responded with status {0}")]
    Status(u16),
}

/// Failure of one conditional fetch when no cached fallback could be served.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("upstream returned invalid events: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Unavailable(#[from] Unavailable),
    #[error("{}", rate_limited_message(*reset_at))]
    RateLimited {
        reset_at: Option<OffsetDateTime>,
        authenticated: bool,
    },
    #[error("subject `{subject}` not found")]
    SubjectNotFound { subject: String },
}

/// The four kinds callers render distinct messaging for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    InvalidData,
    Unavailable,
    RateLimited,
    SubjectNotFound,
}

impl FetchErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FetchErrorKind::InvalidData => "invalid_data",
            FetchErrorKind::Unavailable => "unavailable",
            FetchErrorKind::RateLimited => "rate_limited",
            FetchErrorKind::SubjectNotFound => "subject_not_found",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            FetchErrorKind::SubjectNotFound => StatusCode::NOT_FOUND,
            FetchErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            FetchErrorKind::Unavailable | FetchErrorKind::InvalidData => StatusCode::BAD_GATEWAY,
        }
    }

    fn public_message(self) -> &'static str {
        match self {
            FetchErrorKind::SubjectNotFound => "Subject not found",
            FetchErrorKind::RateLimited => "Upstream rate limit exceeded",
            FetchErrorKind::Unavailable => "Upstream unavailable",
            FetchErrorKind::InvalidData => "Upstream returned invalid data",
        }
    }
}

impl FetchError {
    pub fn subject_not_found(subject: impl Into<String>) -> Self {
        Self::SubjectNotFound {
            subject: subject.into(),
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Validation(_) => FetchErrorKind::InvalidData,
            FetchError::Unavailable(_) => FetchErrorKind::Unavailable,
            FetchError::RateLimited { .. } => FetchErrorKind::RateLimited,
            FetchError::SubjectNotFound { .. } => FetchErrorKind::SubjectNotFound,
        }
    }

    /// Whether a stale cache entry may be served in place of this error.
    pub fn allows_stale(&self) -> bool {
        !matches!(self, FetchError::SubjectNotFound { .. })
    }

    /// Human-actionable guidance for the failure.
    pub fn remediation(&self) -> String {
        match self {
            FetchError::Validation(err) => format!(
                "The upstream response did not match the event model at `{}`. This is a data contract bug, please report it.",
                err.path()
            ),
            FetchError::Unavailable(Unavailable::Status(403)) => {
                "Access to the upstream events endpoint was denied.".to_string()
            }
            FetchError::Unavailable(_) => {
                "The upstream API could not be reached. Try again later.".to_string()
            }
            FetchError::RateLimited {
                reset_at,
                authenticated,
            } => {
                let mut hint = match reset_at.and_then(|at| at.format(&Rfc3339).ok()) {
                    Some(at) => format!("Rate limit exceeded. Resets at {at}."),
                    None => "Rate limit exceeded. Try again later.".to_string(),
                };
                if !authenticated {
                    hint.push_str(
                        " Set GHACTIVITY__UPSTREAM__TOKEN to a personal access token for a higher limit.",
                    );
                }
                hint
            }
            FetchError::SubjectNotFound { subject } => {
                format!("User \"{subject}\" not found. Check the subject name.")
            }
        }
    }
}

fn rate_limited_message(reset_at: Option<OffsetDateTime>) -> String {
    match reset_at.and_then(|at| at.format(&Rfc3339).ok()) {
        Some(at) => format!("upstream rate limit exhausted until {at}"),
        None => "upstream rate limit exhausted".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("invalid input: {0}")]
    Input(String),
}

impl AppError {
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }
}
