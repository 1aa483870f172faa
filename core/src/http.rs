//! HTTP request and response types exchanged with a `Transport`.
//!
//! # Design
//! `HttpRequest` is plain data: the poster builds it and the transport turns
//! it into bytes on the wire. Every request is a POST with a JSON body, so the
//! method is implied rather than stored.
//!
//! `Response` carries the status code eagerly and the body lazily. The
//! transport hands over a `ResponseBody` source that is only drained the
//! first time `Response::body` is called; reading can fail on its own even
//! though the status was already received. Clones share the same body state
//! so every holder of a completed future sees the same text.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use url::Url;

use crate::error::BodyError;

pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// An outbound POST described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response body that has not been read yet.
pub trait ResponseBody: Send {
    fn read_text(&mut self) -> io::Result<String>;
}

impl ResponseBody for String {
    fn read_text(&mut self) -> io::Result<String> {
        Ok(std::mem::take(self))
    }
}

impl ResponseBody for ureq::Body {
    fn read_text(&mut self) -> io::Result<String> {
        self.read_to_string().map_err(io::Error::other)
    }
}

enum BodyState {
    Unread(Box<dyn ResponseBody>),
    Read(String),
    Failed,
}

/// Response to a completed exchange, whatever its status code.
#[derive(Clone)]
pub struct Response {
    status: u16,
    body: Arc<Mutex<BodyState>>,
}

impl Response {
    pub fn new(status: u16, body: impl ResponseBody + 'static) -> Self {
        Self {
            status,
            body: Arc::new(Mutex::new(BodyState::Unread(Box::new(body)))),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Read the body as text, draining the source on first call.
    ///
    /// Later calls return the cached text. If the first read failed, the
    /// source is gone and later calls return `BodyError::Consumed`.
    pub fn body(&self) -> Result<String, BodyError> {
        let mut state = self.body.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *state {
            BodyState::Read(text) => Ok(text.clone()),
            BodyState::Failed => Err(BodyError::Consumed),
            BodyState::Unread(source) => match source.read_text() {
                Ok(text) => {
                    *state = BodyState::Read(text.clone());
                    Ok(text)
                }
                Err(err) => {
                    *state = BodyState::Failed;
                    Err(BodyError::Read(err))
                }
            },
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
