//! C-ABI wrapper around `metrics-poster`.
//!
//! # Overview
//! Exposes the poster and its result futures through `extern "C"` functions
//! so any language with a C FFI can post metric payloads and wait for the
//! outcome without linking to Rust's threading or error types directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - `mp_poster_post` returns a future handle immediately; the exchange runs
//!   on the poster's transport threads.
//! - `mp_future_wait` flattens the outcome into one `FfiPostResult` envelope,
//!   reading the response body as part of the wait.
//! - The C caller owns all returned pointers and must call the matching
//!   `mp_*_free` function to release them. Freeing a poster shuts its
//!   transport down; futures already handed out stay valid.

pub mod types;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use metrics_poster::{Poster, PosterConfig};

use types::*;

/// Borrow a C string as `&str`, mapping null or invalid UTF-8 to `None`.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// ---------------------------------------------------------------------------
// Poster lifecycle
// ---------------------------------------------------------------------------

/// Create a poster for `url` authenticating as `identity` / `secret`.
///
/// Returns null if any argument is null, if `url` is not an absolute http(s)
/// URL, or if the transport could not start.
/// The caller must free the returned pointer with `mp_poster_free`.
#[unsafe(no_mangle)]
pub extern "C" fn mp_poster_new(
    url: *const c_char,
    identity: *const c_char,
    secret: *const c_char,
) -> *mut FfiPoster {
    catch_unwind(AssertUnwindSafe(|| {
        let (Some(url), Some(identity), Some(secret)) =
            (unsafe { str_arg(url) }, unsafe { str_arg(identity) }, unsafe { str_arg(secret) })
        else {
            return std::ptr::null_mut();
        };
        match Poster::new(url, identity, secret) {
            Ok(poster) => Box::into_raw(Box::new(FfiPoster { inner: poster })),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Create a poster from a JSON configuration object (`url`, `identity`,
/// `secret`, and optional `user_agent`, `max_in_flight`,
/// `request_timeout_ms`, `shutdown_grace_ms`).
///
/// Returns null if `json` is null or the configuration is invalid.
#[unsafe(no_mangle)]
pub extern "C" fn mp_poster_from_config_json(json: *const c_char) -> *mut FfiPoster {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(json) = (unsafe { str_arg(json) }) else {
            return std::ptr::null_mut();
        };
        PosterConfig::from_json(json)
            .and_then(Poster::from_config)
            .map(|poster| Box::into_raw(Box::new(FfiPoster { inner: poster })))
            .unwrap_or(std::ptr::null_mut())
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Close and free a poster. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn mp_poster_free(poster: *mut FfiPoster) {
    if !poster.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let poster = unsafe { Box::from_raw(poster) };
            poster.inner.close();
        }));
    }
}

// ---------------------------------------------------------------------------
// Posting
// ---------------------------------------------------------------------------

/// Post `payload` and return a handle to the eventual outcome.
///
/// `user_agent` may be null to use the poster's default. Returns null if
/// `poster` or `payload` is null. Transport failures are reported by
/// `mp_future_wait`, never here.
/// The caller must free the returned pointer with `mp_future_free`.
#[unsafe(no_mangle)]
pub extern "C" fn mp_poster_post(
    poster: *const FfiPoster,
    user_agent: *const c_char,
    payload: *const c_char,
) -> *mut FfiPostFuture {
    catch_unwind(AssertUnwindSafe(|| {
        if poster.is_null() {
            return std::ptr::null_mut();
        }
        let Some(payload) = (unsafe { str_arg(payload) }) else {
            return std::ptr::null_mut();
        };
        let poster = unsafe { &*poster };
        let user_agent = unsafe { str_arg(user_agent) }.unwrap_or("");
        let future = poster.inner.post(user_agent, payload);
        Box::into_raw(Box::new(FfiPostFuture { inner: future }))
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// True once the post has completed, successfully or not. False for null.
#[unsafe(no_mangle)]
pub extern "C" fn mp_future_is_done(future: *const FfiPostFuture) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if future.is_null() {
            return false;
        }
        unsafe { &*future }.inner.is_done()
    }))
    .unwrap_or(false)
}

/// Wait for the post to complete and return its outcome.
///
/// A negative `timeout_ms` waits indefinitely. When the wait runs out the
/// result carries `FfiErrorCode::Timeout` and the future can be waited on
/// again. Never returns null.
/// The caller must free the returned pointer with `mp_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn mp_future_wait(future: *const FfiPostFuture, timeout_ms: i64) -> *mut FfiPostResult {
    catch_unwind(AssertUnwindSafe(|| {
        if future.is_null() {
            return FfiPostResult::null_arg("future");
        }
        let future = unsafe { &*future };
        let outcome = if timeout_ms < 0 {
            future.inner.get()
        } else {
            future.inner.get_timeout(Duration::from_millis(timeout_ms as u64))
        };
        match outcome {
            Ok(response) => FfiPostResult::from_response(response),
            Err(err) => FfiPostResult::from_error(err),
        }
    }))
    .unwrap_or_else(|_| FfiPostResult::panic("panic while waiting for post"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a future returned by `mp_poster_post`. Safe to call with null.
/// The post itself keeps running.
#[unsafe(no_mangle)]
pub extern "C" fn mp_future_free(future: *mut FfiPostFuture) {
    if !future.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(future) });
        }));
    }
}

/// Free an `FfiPostResult` returned by `mp_future_wait`. Safe to call with
/// null.
#[unsafe(no_mangle)]
pub extern "C" fn mp_free_result(result: *mut FfiPostResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        if !result.error_message.is_null() {
            drop(unsafe { CString::from_raw(result.error_message) });
        }
        if !result.body.is_null() {
            drop(unsafe { CString::from_raw(result.body) });
        }
    }));
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
