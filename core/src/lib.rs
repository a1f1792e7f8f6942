//! Signing client for the Lazada-style e-commerce open platform API.
//!
//! # Overview
//! Every call carries a set of common parameters (`app_key`, `timestamp`,
//! `sign_method`, `access_token`) and a `sign` computed as the uppercase hex
//! HMAC-SHA256 of the API name followed by all parameters sorted by key. The
//! client assembles the signed URL, dispatches a GET or POST, and wraps the
//! decoded JSON body in a `Response`.
//!
//! # Design
//! - `Client::build_request` and `Client::parse_response` are free of I/O;
//!   `Client::execute` connects them through a `Transport`.
//! - `UreqTransport` is the default blocking transport. Tests and hosts with
//!   their own HTTP stack plug in any other `Transport`.
//! - A failed call surfaces as one `ApiError::Http` whose message contains the
//!   URL and the `HTTP_ERROR` marker. There are no retries.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod signing;
pub mod types;

pub use client::{build_url, Client};
pub use config::ClientConfig;
pub use error::{ApiError, DispatchError, TransportError, HTTP_ERROR};
pub use http::{
    HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport, API_PARAMS_HEADER, REQUEST_TIMEOUT,
};
pub use request::Request;
pub use response::Response;
pub use signing::{signature, signature_base_string, SIGN_METHOD};
pub use types::{ParamValue, Params};
