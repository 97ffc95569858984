//! Upgrade endpoint routing
//!
//! - `/ws/invitations/{email}` subscribes to the user hub
//! - `/ws/{workspaceId}` subscribes to the workspace hub
//!
//! Segments are percent-decoded before topic validation; the query string and
//! a trailing slash are ignored.

use percent_encoding::percent_decode_str;
use thiserror::Error;
use tungstenite::http::StatusCode;

use crate::hub::{TopicKey, UserEmail, WorkspaceId};
use crate::utils::HubError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Workspace(WorkspaceId),
    Invitations(UserEmail),
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no upgrade endpoint at {0}")]
    NotFound(String),

    #[error("path segment is not valid UTF-8 once decoded")]
    Encoding,

    #[error(transparent)]
    InvalidTopic(#[from] HubError),
}

impl RouteError {
    /// HTTP status used to reject the handshake.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Encoding | Self::InvalidTopic(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl Route {
    pub fn parse(path: &str) -> Result<Self, RouteError> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        let rest = trimmed
            .strip_prefix("/ws/")
            .ok_or_else(|| RouteError::NotFound(path.to_string()))?;

        let segments: Vec<&str> = rest.split('/').collect();
        match segments.as_slice() {
            ["invitations", email] if !email.is_empty() => {
                Ok(Self::Invitations(UserEmail::parse(&decode(email)?)?))
            }
            [workspace] if !workspace.is_empty() => {
                Ok(Self::Workspace(WorkspaceId::parse(&decode(workspace)?)?))
            }
            _ => Err(RouteError::NotFound(path.to_string())),
        }
    }

    /// Namespace and topic, for logging.
    pub fn describe(&self) -> (&'static str, &str) {
        match self {
            Self::Workspace(id) => (WorkspaceId::NAMESPACE, id.as_str()),
            Self::Invitations(email) => (UserEmail::NAMESPACE, email.as_str()),
        }
    }
}

fn decode(segment: &str) -> Result<String, RouteError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| RouteError::Encoding)
}
