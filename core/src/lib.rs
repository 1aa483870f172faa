//! Asynchronous JSON poster for a metrics collection endpoint.
//!
//! # Overview
//! A `Poster` sends caller-serialized metric payloads to one configured URL
//! with an `Authorization` header derived from an identity/secret pair.
//! `post` returns a `ResultFuture` immediately; the exchange runs on a
//! transport-owned thread and its completion callback fills the future in.
//! Callers block on `get` / `get_timeout` when they need the outcome.
//!
//! # Design
//! - `Transport` is the seam to the HTTP engine: submit a request plus a
//!   completion callback, get called back exactly once. `UreqTransport` is the
//!   default, running `ureq` calls on a tokio blocking pool.
//! - `ResultFuture` is a mutex + condvar cell: one writer, many waiters,
//!   first write wins.
//! - Errors surface either synchronously at construction (`ConfigError`) or
//!   through the future (`PostError`, wrapped in `FutureError`). Nothing is
//!   retried.
//! - The library only emits `tracing` events; installing a subscriber is left
//!   to the application.

pub mod auth;
pub mod config;
pub mod error;
pub mod future;
pub mod http;
pub mod poster;
pub mod transport;

pub use auth::build_auth_header;
pub use config::PosterConfig;
pub use error::{BodyError, ConfigError, FutureError, PostError, TransportError};
pub use future::ResultFuture;
pub use http::{HttpRequest, Response, ResponseBody};
pub use poster::{PostFuture, Poster};
pub use transport::{Completion, Transport, UreqTransport};
