//! Error types for the open platform client.
//!
//! # Design
//! Callers see exactly two outcomes of a failed call: the client could not be
//! configured (`Configuration`), or a dispatched call failed (`Http`). The
//! `Http` variant renders as `"{url}, HTTP_ERROR, {message}"` and keeps the
//! underlying failure as its source, so callers that care can still tell a
//! timeout from a bad status or an undecodable body.

use thiserror::Error;

/// Marker embedded in the message of every failed dispatch.
pub const HTTP_ERROR: &str = "HTTP_ERROR";

/// Errors returned by `Client`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// `app_key` or `app_secret` was missing at construction.
    #[error("{0}")]
    Configuration(String),

    /// The call to `url` failed during dispatch or while decoding the reply.
    #[error("{url}, HTTP_ERROR, {source}")]
    Http {
        url: String,
        #[source]
        source: DispatchError,
    },
}

/// What went wrong between sending a request and holding a decoded body.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not valid JSON.
    #[error("invalid JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures raised by a `Transport` before any response was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),
}
