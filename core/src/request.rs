//! A single API call as described by the caller.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::http::HttpMethod;
use crate::types::{ParamValue, Params};

/// Everything `Client::execute` needs to know about one call.
///
/// `header_params` and `file_params` are carried for completeness but are not
/// forwarded to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    api_name: String,
    api_params: Params,
    http_method: HttpMethod,
    timestamp: Option<i64>,
    header_params: BTreeMap<String, String>,
    file_params: BTreeMap<String, PathBuf>,
}

impl Request {
    /// `api_name` is appended verbatim to the server URL, so it normally
    /// starts with `/`, e.g. `/orders/get`.
    ///
    /// The name is not validated. An empty name is the caller's error: it is
    /// signed as-is and the query string lands directly on the server URL.
    pub fn new(api_name: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            api_params: Params::new(),
            http_method: HttpMethod::Get,
            timestamp: None,
            header_params: BTreeMap::new(),
            file_params: BTreeMap::new(),
        }
    }

    pub fn add_api_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.api_params.insert(key, value);
        self
    }

    pub fn with_api_params(mut self, params: Params) -> Self {
        self.api_params = params;
        self
    }

    pub fn with_http_method(mut self, method: HttpMethod) -> Self {
        self.http_method = method;
        self
    }

    /// Fixes the request timestamp (epoch milliseconds) instead of using the
    /// clock at dispatch time.
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    pub fn add_header_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_params.insert(key.into(), value.into());
        self
    }

    pub fn add_file_param(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.file_params.insert(key.into(), path.into());
        self
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    pub fn api_params(&self) -> &Params {
        &self.api_params
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    pub fn header_params(&self) -> &BTreeMap<String, String> {
        &self.header_params
    }

    pub fn file_params(&self) -> &BTreeMap<String, PathBuf> {
        &self.file_params
    }

    /// The method actually used on the wire: POST when requested explicitly or
    /// when any file parameter is attached, GET otherwise.
    pub fn dispatch_method(&self) -> HttpMethod {
        if self.http_method == HttpMethod::Post || !self.file_params.is_empty() {
            HttpMethod::Post
        } else {
            HttpMethod::Get
        }
    }
}
