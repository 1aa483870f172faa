//! Asynchronous HTTP transport seam and its default implementation.
//!
//! # Design
//! A `Transport` accepts a request and a completion callback and returns
//! immediately. It must invoke the callback exactly once, from a thread it
//! owns, with either the response or the reason the exchange failed. If a
//! transport drops a callback without calling it, the poster notices and
//! fails the corresponding future.
//!
//! `UreqTransport` runs each exchange as a blocking `ureq` call on the
//! blocking pool of a dedicated tokio runtime. The pool size bounds how many
//! exchanges run at once. `shutdown` marks the transport closed and takes the
//! runtime out. Later submits, and exchanges still queued behind the pool
//! limit, complete with `TransportError::Closed` without touching the network.
//!
//! Tokio refuses to block on runtime teardown from inside an async context, so
//! there `shutdown` detaches the runtime instead of waiting out the grace
//! period.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

use crate::config::PosterConfig;
use crate::error::{ConfigError, TransportError};
use crate::http::{HttpRequest, Response};

/// Callback a transport invokes once per submitted request.
pub type Completion = Box<dyn FnOnce(Result<Response, TransportError>) + Send + 'static>;

pub trait Transport: Send + Sync + 'static {
    /// Start the exchange and return without waiting for it.
    fn submit(&self, request: HttpRequest, on_complete: Completion);

    /// Release the transport's threads and connections, waiting at most
    /// `grace` for in-flight exchanges. Must be idempotent.
    fn shutdown(&self, grace: Duration);
}

pub struct UreqTransport {
    agent: ureq::Agent,
    runtime: Mutex<Option<Runtime>>,
    closed: Arc<AtomicBool>,
}

impl UreqTransport {
    pub fn new(config: &PosterConfig) -> Result<Self, ConfigError> {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.request_timeout())
            .build()
            .new_agent();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.max_in_flight)
            .thread_name("metrics-poster")
            .build()
            .map_err(ConfigError::Runtime)?;

        Ok(Self {
            agent,
            runtime: Mutex::new(Some(runtime)),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Transport for UreqTransport {
    fn submit(&self, request: HttpRequest, on_complete: Completion) {
        let runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(runtime) = runtime.as_ref() else {
            on_complete(Err(TransportError::Closed));
            return;
        };

        let agent = self.agent.clone();
        let closed = Arc::clone(&self.closed);
        runtime.spawn_blocking(move || {
            if closed.load(Ordering::Acquire) {
                debug!(url = %request.url, "transport closed before exchange started");
                on_complete(Err(TransportError::Closed));
                return;
            }
            on_complete(execute(&agent, request));
        });
    }

    fn shutdown(&self, grace: Duration) {
        self.closed.store(true, Ordering::Release);
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(runtime) = runtime else {
            return;
        };

        if Handle::try_current().is_ok() {
            info!("shutting down transport from async context without waiting");
            runtime.shutdown_background();
        } else {
            info!(?grace, "shutting down transport");
            runtime.shutdown_timeout(grace);
        }
    }
}

impl Drop for UreqTransport {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        let runtime = self
            .runtime
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}

fn execute(agent: &ureq::Agent, request: HttpRequest) -> Result<Response, TransportError> {
    let mut builder = agent.post(request.url.as_str());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let response = builder.send(request.body.as_bytes())?;
    let status = response.status().as_u16();
    debug!(url = %request.url, status, "exchange completed");
    Ok(Response::new(status, response.into_body()))
}
