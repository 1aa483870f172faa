//! Error types for the metrics poster.
//!
//! # Design
//! Errors are split by *when* they reach the caller. `ConfigError` is raised
//! synchronously while a `Poster` is built. Everything that happens after
//! `post` returns travels through the `ResultFuture`: the transport reports a
//! `TransportError`, the poster wraps it in a `PostError` naming the target
//! URL, and `get` wraps that again in `FutureError::Failed` so callers can
//! tell a failed exchange apart from a wait that timed out. Reading the
//! response body is a separate step with its own `BodyError`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Errors raised while building a `Poster` or loading its configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not parse URL {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme {scheme:?} in {url}, expected http or https")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("missing required setting {0}")]
    MissingSetting(&'static str),

    #[error("invalid value {value:?} for setting {name}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("invalid JSON configuration")]
    Json(#[from] serde_json::Error),

    #[error("failed to start transport runtime")]
    Runtime(#[source] io::Error),
}

/// Failures reported by a transport when an exchange could not complete.
///
/// HTTP error statuses are not transport failures; they arrive as a
/// successful `Response`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, or I/O error mid-transfer.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("HTTP engine error: {0}")]
    Http(#[source] ureq::Error),

    #[error("transport has been shut down")]
    Closed,
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(err)
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Io(io) => TransportError::Io(io),
            other => TransportError::Http(other),
        }
    }
}

/// Failure of a single `post`, delivered through its `ResultFuture`.
#[derive(Debug, Error)]
pub enum PostError {
    #[error("could not post measurements to {url}")]
    Transport {
        url: Url,
        #[source]
        source: TransportError,
    },

    /// The transport dropped the request without ever reporting back.
    #[error("request to {url} was dropped before it completed")]
    Abandoned { url: Url },
}

impl PostError {
    /// The endpoint the failed request was aimed at.
    pub fn url(&self) -> &Url {
        match self {
            PostError::Transport { url, .. } | PostError::Abandoned { url } => url,
        }
    }
}

/// Errors from materializing a response body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("failed to read response body")]
    Read(#[source] io::Error),

    #[error("response body was already consumed by a failed read")]
    Consumed,
}

/// Error returned by `ResultFuture::get` and `ResultFuture::get_timeout`.
#[derive(Debug, Error)]
pub enum FutureError<E>
where
    E: std::error::Error + 'static,
{
    /// The asynchronous operation completed with a failure.
    #[error("asynchronous operation failed: {0}")]
    Failed(#[source] Arc<E>),

    /// Nothing was recorded before the wait ran out. The operation itself
    /// may still complete later.
    #[error("timed out after {0:?} waiting for asynchronous operation")]
    Timeout(Duration),
}

impl<E> FutureError<E>
where
    E: std::error::Error + 'static,
{
    pub fn is_timeout(&self) -> bool {
        matches!(self, FutureError::Timeout(_))
    }

    /// The operation's own error, if it failed (as opposed to timing out).
    pub fn failure(&self) -> Option<&E> {
        match self {
            FutureError::Failed(err) => Some(err),
            FutureError::Timeout(_) => None,
        }
    }
}
