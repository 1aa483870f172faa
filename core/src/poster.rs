//! Fire-and-continue JSON POST to a metrics collection endpoint.
//!
//! # Design
//! `Poster` holds the parsed endpoint URL, the precomputed `Authorization`
//! value, and a transport shared by every call. `build_request` is pure and
//! deterministic; `post` hands the request to the transport and returns a
//! `ResultFuture` at once. The transport's completion callback owns a
//! `PendingPost`, which records the outcome in the future. If the callback is
//! dropped without running, `PendingPost`'s `Drop` fails the future instead so
//! no waiter blocks on a request that will never run.
//!
//! Status codes are not interpreted: a 500 is a successful exchange.

use tracing::{error, info, warn};
use url::Url;

use crate::auth::build_auth_header;
use crate::config::PosterConfig;
use crate::error::{ConfigError, PostError, TransportError};
use crate::future::ResultFuture;
use crate::http::{HttpRequest, Response, CONTENT_TYPE_JSON};
use crate::transport::{Transport, UreqTransport};

pub type PostFuture = ResultFuture<Response, PostError>;

pub struct Poster<T: Transport = UreqTransport> {
    url: Url,
    auth_header: String,
    default_user_agent: String,
    shutdown_grace: std::time::Duration,
    transport: T,
}

impl Poster<UreqTransport> {
    /// Build a poster with default settings.
    ///
    /// Fails immediately if `url` is not an absolute http(s) URL.
    pub fn new(url: &str, identity: &str, secret: &str) -> Result<Self, ConfigError> {
        Self::from_config(PosterConfig::new(url, identity, secret))
    }

    pub fn from_config(config: PosterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = UreqTransport::new(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Poster<T> {
    pub fn with_transport(config: PosterConfig, transport: T) -> Result<Self, ConfigError> {
        let url = config.parse_url()?;
        Ok(Self {
            auth_header: build_auth_header(&config.identity, &config.secret),
            default_user_agent: config.user_agent.clone(),
            shutdown_grace: config.shutdown_grace(),
            url,
            transport,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Describe the POST for `payload` without sending it.
    ///
    /// An empty or blank `user_agent` falls back to the configured default.
    pub fn build_request(&self, user_agent: &str, payload: &str) -> HttpRequest {
        let user_agent = if user_agent.trim().is_empty() {
            self.default_user_agent.as_str()
        } else {
            user_agent
        };
        HttpRequest {
            url: self.url.clone(),
            headers: vec![
                ("Authorization".to_string(), self.auth_header.clone()),
                ("User-Agent".to_string(), user_agent.to_string()),
                ("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string()),
            ],
            body: payload.to_string(),
        }
    }

    /// Submit `payload` and return a handle to the eventual response.
    ///
    /// Never blocks on the network and never fails synchronously; every
    /// failure arrives through the returned future.
    pub fn post(&self, user_agent: &str, payload: &str) -> PostFuture {
        let request = self.build_request(user_agent, payload);
        let future = PostFuture::new();
        let pending = PendingPost {
            url: self.url.clone(),
            future: Some(future.clone()),
        };

        info!(url = %self.url, bytes = payload.len(), "posting measurements");
        self.transport
            .submit(request, Box::new(move |outcome| pending.finish(outcome)));
        future
    }

    /// Shut the transport down, waiting up to the configured grace period
    /// for in-flight posts. Dropping the poster does the same.
    pub fn close(self) {
        info!(url = %self.url, "closing poster");
    }
}

impl<T: Transport> Drop for Poster<T> {
    fn drop(&mut self) {
        self.transport.shutdown(self.shutdown_grace);
    }
}

struct PendingPost {
    url: Url,
    future: Option<PostFuture>,
}

impl PendingPost {
    fn finish(mut self, outcome: Result<Response, TransportError>) {
        let Some(future) = self.future.take() else {
            return;
        };
        match outcome {
            Ok(response) => {
                info!(url = %self.url, status = response.status_code(), "response received");
                future.set(response);
            }
            Err(source) => {
                error!(url = %self.url, error = %source, "error posting measurements");
                future.set_failure(PostError::Transport {
                    url: self.url.clone(),
                    source,
                });
            }
        }
    }
}

impl Drop for PendingPost {
    fn drop(&mut self) {
        if let Some(future) = self.future.take() {
            warn!(url = %self.url, "transport dropped a request without completing it");
            future.set_failure(PostError::Abandoned {
                url: self.url.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::config::DEFAULT_USER_AGENT;
    use crate::error::FutureError;
    use crate::transport::Completion;

    /// Holds submitted requests until the test completes them.
    #[derive(Clone, Default)]
    struct ManualTransport {
        submitted: Arc<Mutex<Vec<(HttpRequest, Completion)>>>,
        shutdowns: Arc<Mutex<Vec<Duration>>>,
    }

    impl ManualTransport {
        fn take(&self) -> (HttpRequest, Completion) {
            self.submitted.lock().unwrap().remove(0)
        }
    }

    impl Transport for ManualTransport {
        fn submit(&self, request: HttpRequest, on_complete: Completion) {
            self.submitted.lock().unwrap().push((request, on_complete));
        }

        fn shutdown(&self, grace: Duration) {
            self.shutdowns.lock().unwrap().push(grace);
        }
    }

    const URL: &str = "http://example.test/metrics";

    fn poster() -> (Poster<ManualTransport>, ManualTransport) {
        let transport = ManualTransport::default();
        let config = PosterConfig::new(URL, "user@example.com", "tok123");
        let poster = Poster::with_transport(config, transport.clone()).unwrap();
        (poster, transport)
    }

    #[test]
    fn build_request_sets_headers_and_body() {
        let (poster, _) = poster();
        let req = poster.build_request("agent/1.0", r#"{"gauge":1}"#);
        assert_eq!(req.url.as_str(), URL);
        assert_eq!(req.body, r#"{"gauge":1}"#);
        assert_eq!(
            req.header("authorization"),
            Some("Basic dXNlckBleGFtcGxlLmNvbTp0b2sxMjM=")
        );
        assert_eq!(req.header("user-agent"), Some("agent/1.0"));
        assert_eq!(req.header("content-type"), Some("application/json; charset=utf-8"));
    }

    #[test]
    fn blank_user_agent_falls_back_to_default() {
        let (poster, _) = poster();
        assert_eq!(poster.build_request("", "{}").header("user-agent"), Some(DEFAULT_USER_AGENT));
        assert_eq!(poster.build_request("  ", "{}").header("user-agent"), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn success_populates_future_with_response() {
        let (poster, transport) = poster();
        let future = poster.post("agent/1.0", r#"{"gauge":1}"#);
        assert!(!future.is_done());

        let (request, complete) = transport.take();
        assert_eq!(request.header("user-agent"), Some("agent/1.0"));
        complete(Ok(Response::new(200, "ok".to_string())));

        let response = future.get().unwrap();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body().unwrap(), "ok");
        assert!(future.is_done());
    }

    #[test]
    fn error_status_is_still_a_success() {
        let (poster, transport) = poster();
        let future = poster.post("agent/1.0", "{}");
        let (_, complete) = transport.take();
        complete(Ok(Response::new(503, "unavailable".to_string())));

        assert_eq!(future.get().unwrap().status_code(), 503);
    }

    #[test]
    fn connection_refused_names_url_and_keeps_cause() {
        let (poster, transport) = poster();
        let future = poster.post("agent/1.0", r#"{"gauge":1}"#);
        let (_, complete) = transport.take();
        complete(Err(TransportError::Io(io::Error::from(
            io::ErrorKind::ConnectionRefused,
        ))));

        let err = future.get().unwrap_err();
        assert!(err.to_string().contains(URL), "message was {err}");
        match err.failure() {
            Some(PostError::Transport { url, source }) => {
                assert_eq!(url.as_str(), URL);
                assert!(
                    matches!(source, TransportError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused)
                );
            }
            other => panic!("unexpected failure: {other:?}"),
        }
        assert!(future.is_done());
    }

    #[test]
    fn post_returns_before_a_slow_exchange_finishes() {
        let (poster, transport) = poster();

        let start = Instant::now();
        let future = poster.post("agent/1.0", "{}");
        assert!(start.elapsed() < Duration::from_millis(100));

        let (_, complete) = transport.take();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            complete(Ok(Response::new(202, String::new())));
        });

        let err = future.get_timeout(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, FutureError::Timeout(_)));
        assert_eq!(future.get().unwrap().status_code(), 202);
    }

    #[test]
    fn dropped_completion_fails_the_future() {
        let (poster, transport) = poster();
        let future = poster.post("agent/1.0", "{}");
        drop(transport.take());

        let err = future.get_timeout(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err.failure(), Some(PostError::Abandoned { url }) if url.as_str() == URL));
    }

    #[test]
    fn malformed_url_fails_at_construction() {
        let config = PosterConfig::new("not a url", "user@example.com", "tok123");
        let err = Poster::with_transport(config, ManualTransport::default()).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn default_transport_rejects_malformed_url() {
        let err = Poster::new("not a url", "user@example.com", "tok123").err().unwrap();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn close_shuts_transport_down_once() {
        let (poster, transport) = poster();
        poster.close();
        assert_eq!(*transport.shutdowns.lock().unwrap(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn concurrent_posts_complete_independently() {
        let (poster, transport) = poster();
        let first = poster.post("agent/1.0", r#"{"n":1}"#);
        let second = poster.post("agent/1.0", r#"{"n":2}"#);

        let (_, complete_first) = transport.take();
        let (_, complete_second) = transport.take();
        complete_second(Ok(Response::new(201, "second".to_string())));
        assert!(second.is_done());
        assert!(!first.is_done());

        complete_first(Err(TransportError::Closed));
        assert_eq!(second.get().unwrap().body().unwrap(), "second");
        assert!(matches!(
            first.get().unwrap_err().failure(),
            Some(PostError::Transport { source: TransportError::Closed, .. })
        ));
    }
}
