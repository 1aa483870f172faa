//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! The poster and its futures cross the boundary as opaque boxed handles.
//! Outcomes are flattened into `FfiPostResult`: an error code, an optional
//! message, the HTTP status, and the body as a C string. Conversion helpers
//! live here to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use metrics_poster::{BodyError, FutureError, PostError, PostFuture, Response};

/// Opaque handle to a `Poster`.
pub struct FfiPoster {
    pub(crate) inner: metrics_poster::Poster,
}

/// Opaque handle to the future returned by `mp_poster_post`.
pub struct FfiPostFuture {
    pub(crate) inner: PostFuture,
}

/// Error codes returned in `FfiPostResult`.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    /// Connection, DNS, or I/O failure while posting.
    Transport = 1,
    /// The bounded wait ran out; the post may still complete.
    Timeout = 2,
    /// Status was received but the body could not be read.
    BodyRead = 3,
    /// The transport dropped the request.
    Abandoned = 4,
    NullArg = 5,
    Panic = 6,
}

/// Outcome of waiting on a post.
///
/// On success `error_code` is `Ok`, `http_status` holds the status, and
/// `body` the response text. On `BodyRead`, `http_status` is still set. On
/// other failures `http_status` is 0 and `body` is null.
#[repr(C)]
pub struct FfiPostResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub body: *mut c_char,
}

/// Build a C string, replacing interior NULs so the conversion cannot fail.
pub(crate) fn c_string(s: impl Into<String>) -> *mut c_char {
    let s: String = s.into();
    CString::new(s.replace('\0', "\u{FFFD}"))
        .unwrap_or_default()
        .into_raw()
}

impl FfiPostResult {
    fn boxed(
        error_code: FfiErrorCode,
        error_message: *mut c_char,
        http_status: u16,
        body: *mut c_char,
    ) -> *mut Self {
        Box::into_raw(Box::new(FfiPostResult {
            error_code,
            error_message,
            http_status,
            body,
        }))
    }

    /// Materialize the body of a completed exchange.
    pub(crate) fn from_response(response: Response) -> *mut Self {
        let status = response.status_code();
        match response.body() {
            Ok(body) => Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), status, c_string(body)),
            Err(err) => Self::from_body_error(status, &err),
        }
    }

    fn from_body_error(status: u16, err: &BodyError) -> *mut Self {
        Self::boxed(
            FfiErrorCode::BodyRead,
            c_string(err.to_string()),
            status,
            std::ptr::null_mut(),
        )
    }

    pub(crate) fn from_error(err: FutureError<PostError>) -> *mut Self {
        let code = match &err {
            FutureError::Timeout(_) => FfiErrorCode::Timeout,
            FutureError::Failed(post) => match post.as_ref() {
                PostError::Transport { .. } => FfiErrorCode::Transport,
                PostError::Abandoned { .. } => FfiErrorCode::Abandoned,
            },
        };
        Self::boxed(code, c_string(err.to_string()), 0, std::ptr::null_mut())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(
            FfiErrorCode::NullArg,
            c_string(format!("null argument: {name}")),
            0,
            std::ptr::null_mut(),
        )
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, c_string(msg), 0, std::ptr::null_mut())
    }
}
