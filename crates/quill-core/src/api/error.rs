//! Error taxonomy for the article service client.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure surfaced by the authenticated client.
///
/// The display output is what views show the user: the server-supplied
/// detail message when one exists, the transport message otherwise.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or protocol failure before an HTTP response arrived.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response from the service.
    #[error("{}", Self::status_message(*status, detail.as_deref()))]
    Status {
        status: StatusCode,
        /// The body's `detail` field, when it carried one.
        detail: Option<String>,
    },

    /// The refresh exchange failed; the session has been terminated and
    /// every request that was queued behind the refresh fails with this.
    #[error("session expired: {message}")]
    RefreshFailed { message: String },
}

impl ApiError {
    fn status_message(status: StatusCode, detail: Option<&str>) -> String {
        match detail {
            Some(detail) => detail.to_string(),
            None => format!("request failed with status {status}"),
        }
    }
}
