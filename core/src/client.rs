//! Signs and dispatches open platform calls.
//!
//! # Design
//! `Client` splits each call into a pure half and an I/O half:
//! `build_request` turns a `Request` into a signed `HttpRequest`,
//! `parse_response` turns an `HttpResponse` into a `Response`, and `execute`
//! runs one round trip through a `Transport` in between. Every failure after
//! the request is built becomes a single `ApiError::Http`; nothing is retried.
//!
//! Common parameters are signed in key order but sent in the URL in insertion
//! order. The gateway re-derives the signature from the parsed parameters, so
//! the two orders do not need to agree.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, DispatchError};
use crate::http::{HttpRequest, HttpResponse, Transport, UreqTransport, API_PARAMS_HEADER, REQUEST_TIMEOUT};
use crate::request::Request;
use crate::response::Response;
use crate::signing::{self, SIGN_METHOD};
use crate::types::Params;

/// Client for one application on the open platform.
///
/// `Client` is `Sync` whenever its transport is, so one instance can serve
/// many threads. The only state written by calls is `last_rest_url`.
pub struct Client<T = UreqTransport> {
    server_url: String,
    app_key: String,
    app_secret: String,
    transport: T,
    /// URL of the most recent `execute`, for diagnostics only. Concurrent
    /// calls overwrite it in whatever order they reach it; last writer wins.
    last_rest_url: Mutex<Option<String>>,
}

impl Client<UreqTransport> {
    /// Builds a client using the blocking `ureq` transport.
    ///
    /// `server_url` is not validated. Fails with `ApiError::Configuration`
    /// when `app_key` or `app_secret` is empty.
    pub fn new(
        server_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Result<Self, ApiError> {
        Client::with_transport(server_url, app_key, app_secret, UreqTransport::new())
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        Client::new(
            config.server_url.clone(),
            config.app_key.clone(),
            config.app_secret.clone(),
        )
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(
        server_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        transport: T,
    ) -> Result<Self, ApiError> {
        let client = Self {
            server_url: server_url.into(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            transport,
            last_rest_url: Mutex::new(None),
        };
        client.validate()?;
        Ok(client)
    }

    fn validate(&self) -> Result<(), ApiError> {
        if self.app_key.is_empty() {
            return Err(ApiError::Configuration("app_key is required".to_string()));
        }
        if self.app_secret.is_empty() {
            return Err(ApiError::Configuration("app_secret is required".to_string()));
        }
        Ok(())
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    pub fn sign_method(&self) -> &'static str {
        SIGN_METHOD
    }

    /// URL built by the most recent `execute`, if any.
    pub fn last_rest_url(&self) -> Option<String> {
        self.last_rest_url.lock().clone()
    }

    /// Parameters the client adds to every call, in wire order. A missing
    /// access token is sent with an empty value.
    pub fn common_params(&self, request: &Request, access_token: Option<&str>) -> Params {
        let mut params = Params::new();
        params.insert("app_key", self.app_key.as_str());
        params.insert("timestamp", request.timestamp().unwrap_or_else(now_millis));
        params.insert("sign_method", SIGN_METHOD);
        params.insert("access_token", access_token.unwrap_or_default());
        params
    }

    /// Signature of `common` merged with `api_params`, keyed by this client's
    /// app secret.
    pub fn signature(&self, common: &Params, api_params: Option<&Params>, api_name: &str) -> String {
        signing::signature(&self.app_secret, common, api_params, api_name)
    }

    /// Builds the signed request for `request` without sending it.
    pub fn build_request(&self, request: &Request, access_token: Option<&str>) -> HttpRequest {
        let mut common = self.common_params(request, access_token);
        let sign = self.signature(&common, Some(request.api_params()), request.api_name());
        common.insert("sign", sign);

        HttpRequest {
            method: request.dispatch_method(),
            url: build_url(&self.server_url, request.api_name(), &common),
            headers: vec![(
                API_PARAMS_HEADER.to_string(),
                request.api_params().to_form_encoded(),
            )],
            timeout: REQUEST_TIMEOUT,
        }
    }

    /// Decodes a received response. Non-2xx statuses and bodies that are not
    /// JSON are failures.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Response, DispatchError> {
        if !response.is_success() {
            return Err(DispatchError::Status {
                status: response.status,
                body: response.body,
            });
        }
        let body = serde_json::from_str(&response.body)?;
        Ok(Response::new(body))
    }

    /// Signs `request`, sends it, and decodes the reply.
    pub fn execute(&self, request: &Request, access_token: Option<&str>) -> Result<Response, ApiError> {
        let http_request = self.build_request(request, access_token);
        *self.last_rest_url.lock() = Some(http_request.url.clone());

        debug!(
            method = %http_request.method,
            url = %http_request.url,
            "dispatching open platform request"
        );

        let outcome = self
            .transport
            .send(&http_request)
            .map_err(DispatchError::from)
            .and_then(|response| self.parse_response(response));

        outcome.map_err(|source| {
            warn!(url = %http_request.url, error = %source, "open platform request failed");
            ApiError::Http {
                url: http_request.url,
                source,
            }
        })
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("server_url", &self.server_url)
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("sign_method", &SIGN_METHOD)
            .finish_non_exhaustive()
    }
}

/// Joins the server URL, the API name, and `common` as an unescaped query
/// string in insertion order. One trailing `/` on `base_url` is dropped.
pub fn build_url(base_url: &str, api_name: &str, common: &Params) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    let query = common
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}{api_name}?{query}")
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http::HttpMethod;
    use serde_json::json;

    const SIGN_FOO_BAR: &str = "2C023C5AF739D7ADDF3D96C09186D1DDC607C69D62EE3DDBE69FA03282BD5799";

    /// Records every request and replays one canned outcome.
    struct StubTransport {
        outcome: Result<HttpResponse, TransportError>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl StubTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                outcome: Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                }),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: TransportError) -> Self {
            Self {
                outcome: Err(err),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<HttpRequest> {
            self.seen.lock().clone()
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().push(request.clone());
            self.outcome.clone()
        }
    }

    fn client(transport: StubTransport) -> Client<StubTransport> {
        Client::with_transport("https://api.example.com/", "K", "S", transport).unwrap()
    }

    fn foo_request() -> Request {
        Request::new("/test")
            .add_api_param("foo", "bar")
            .with_timestamp(1_700_000_000_000)
    }

    // --- construction ---

    #[test]
    fn construction_requires_app_secret() {
        let err = Client::new("https://api.example.com", "K", "").unwrap_err();
        assert!(matches!(err, ApiError::Configuration(ref msg) if msg == "app_secret is required"));
    }

    #[test]
    fn construction_requires_app_key() {
        let err = Client::new("https://api.example.com", "", "S").unwrap_err();
        assert!(matches!(err, ApiError::Configuration(ref msg) if msg == "app_key is required"));
    }

    #[test]
    fn construction_succeeds_with_credentials() {
        let client = Client::new("not even a url", "K", "S").unwrap();
        assert_eq!(client.server_url(), "not even a url");
        assert_eq!(client.app_key(), "K");
        assert_eq!(client.sign_method(), "sha256");
        assert_eq!(client.last_rest_url(), None);
    }

    #[test]
    fn from_config_applies_same_validation() {
        let ok = ClientConfig::new("https://api.example.com", "K", "S");
        assert!(Client::from_config(&ok).is_ok());

        let missing = ClientConfig::new("https://api.example.com", "K", "");
        assert!(matches!(
            Client::from_config(&missing),
            Err(ApiError::Configuration(_))
        ));
    }

    #[test]
    fn debug_hides_secret() {
        let client = client(StubTransport::replying(200, "{}"));
        let rendered = format!("{client:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("\"S\""));
    }

    // --- url assembly ---

    #[test]
    fn build_url_strips_one_trailing_slash() {
        let params: Params = [("a", 1)].into_iter().collect();
        let with_slash = build_url("https://api.example.com/", "/orders/get", &params);
        let without = build_url("https://api.example.com", "/orders/get", &params);
        assert_eq!(with_slash, without);
        assert_eq!(without, "https://api.example.com/orders/get?a=1");

        assert_eq!(
            build_url("https://api.example.com//", "/x", &params),
            "https://api.example.com//x?a=1"
        );
    }

    #[test]
    fn build_url_keeps_insertion_order() {
        let mut params = Params::new();
        params.insert("timestamp", 5);
        params.insert("app_key", "K");
        params.insert("sign", "ABC");
        let url = build_url("https://api.example.com", "/orders/get", &params);
        assert_eq!(url, "https://api.example.com/orders/get?timestamp=5&app_key=K&sign=ABC");

        let sorted: Vec<_> = params.sorted().into_iter().map(|(k, _)| k).collect();
        assert_eq!(sorted, vec!["app_key", "sign", "timestamp"]);
    }

    #[test]
    fn build_url_does_not_escape_values() {
        let params: Params = [("q", "a b&c")].into_iter().collect();
        assert_eq!(build_url("http://h", "/s", &params), "http://h/s?q=a b&c");
    }

    #[test]
    fn empty_api_name_is_passed_through() {
        let client = client(StubTransport::replying(200, "{}"));
        let req = client.build_request(&Request::new("").with_timestamp(1), None);
        assert!(req.url.starts_with("https://api.example.com?app_key=K&timestamp=1&"));
    }

    #[test]
    fn build_url_with_no_params() {
        assert_eq!(build_url("http://h/", "/s", &Params::new()), "http://h/s?");
    }

    // --- request building ---

    #[test]
    fn common_params_in_wire_order() {
        let client = client(StubTransport::replying(200, "{}"));
        let common = client.common_params(&foo_request(), None);
        let entries: Vec<_> = common.iter().map(|(k, v)| format!("{k}={v}")).collect();
        assert_eq!(
            entries,
            vec![
                "app_key=K",
                "timestamp=1700000000000",
                "sign_method=sha256",
                "access_token=",
            ]
        );
    }

    #[test]
    fn common_params_use_clock_without_timestamp() {
        let client = client(StubTransport::replying(200, "{}"));
        let before = now_millis();
        let common = client.common_params(&Request::new("/test"), Some("tok"));
        let after = now_millis();

        let crate::types::ParamValue::Int(ts) = common.get("timestamp").unwrap().clone() else {
            panic!("timestamp should be an integer");
        };
        assert!(ts >= before && ts <= after);
        assert_eq!(common.get("access_token").unwrap().to_string(), "tok");
    }

    #[test]
    fn build_request_signs_and_assembles_url() {
        let client = client(StubTransport::replying(200, "{}"));
        let req = client.build_request(&foo_request(), None);

        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(
            req.url,
            format!(
                "https://api.example.com/test?app_key=K&timestamp=1700000000000\
                 &sign_method=sha256&access_token=&sign={SIGN_FOO_BAR}"
            )
        );
        assert_eq!(req.headers, vec![(API_PARAMS_HEADER.to_string(), "foo=bar".to_string())]);
        assert_eq!(req.timeout, REQUEST_TIMEOUT);
        assert_eq!(req.timeout.as_secs(), 10);
    }

    #[test]
    fn build_request_with_empty_api_params_sends_empty_header() {
        let client = client(StubTransport::replying(200, "{}"));
        let req = client.build_request(&Request::new("/ping").with_timestamp(1), None);
        assert_eq!(req.headers, vec![(API_PARAMS_HEADER.to_string(), String::new())]);
    }

    #[test]
    fn build_request_selects_post() {
        let client = client(StubTransport::replying(200, "{}"));

        let explicit = foo_request().with_http_method(HttpMethod::Post);
        assert_eq!(client.build_request(&explicit, None).method, HttpMethod::Post);

        let upload = foo_request().add_file_param("image", "/tmp/a.png");
        assert_eq!(client.build_request(&upload, None).method, HttpMethod::Post);
    }

    #[test]
    fn header_and_file_params_are_not_forwarded() {
        let client = client(StubTransport::replying(200, "{}"));
        let req = foo_request()
            .add_header_param("x-custom", "1")
            .add_file_param("image", "/tmp/a.png");
        let http = client.build_request(&req, None);
        assert_eq!(http.headers.len(), 1);
        assert!(!http.url.contains("x-custom"));
        assert!(!http.url.contains("image"));
    }

    // --- execution ---

    #[test]
    fn execute_returns_stub_body() {
        let client = client(StubTransport::replying(200, r#"{"code":"0","data":{"ok":true}}"#));
        let resp = client.execute(&foo_request(), None).unwrap();

        assert_eq!(resp.body(), &json!({"code": "0", "data": {"ok": true}}));
        assert!(resp.is_success());

        let seen = client.transport.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, HttpMethod::Get);
        assert!(seen[0].url.ends_with(&format!("&sign={SIGN_FOO_BAR}")));
        assert_eq!(client.last_rest_url(), Some(seen[0].url.clone()));
    }

    #[test]
    fn execute_post_path() {
        let client = client(StubTransport::replying(200, "[]"));
        let req = foo_request().with_http_method(HttpMethod::Post);
        let resp = client.execute(&req, Some("token-1")).unwrap();

        assert_eq!(resp.body(), &json!([]));
        let seen = client.transport.seen();
        assert_eq!(seen[0].method, HttpMethod::Post);
        assert!(seen[0].url.contains("&access_token=token-1&"));
    }

    #[test]
    fn execute_wraps_transport_failure() {
        let client = client(StubTransport::failing(TransportError::Connection(
            "connection refused".to_string(),
        )));
        let err = client.execute(&foo_request(), None).unwrap_err();

        let url = client.last_rest_url().unwrap();
        let message = err.to_string();
        assert!(message.starts_with(&url));
        assert!(message.contains("HTTP_ERROR"));
        assert!(message.contains("connection refused"));
        assert!(matches!(
            err,
            ApiError::Http {
                source: DispatchError::Transport(TransportError::Connection(_)),
                ..
            }
        ));
    }

    #[test]
    fn execute_wraps_timeout() {
        let client = client(StubTransport::failing(TransportError::Timeout("10s".to_string())));
        let err = client.execute(&foo_request(), None).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Http {
                source: DispatchError::Transport(TransportError::Timeout(_)),
                ..
            }
        ));
    }

    #[test]
    fn execute_wraps_bad_status() {
        let client = client(StubTransport::replying(503, "unavailable"));
        let err = client.execute(&foo_request(), None).unwrap_err();
        assert!(err.to_string().contains("HTTP_ERROR, HTTP 503: unavailable"));
        assert!(matches!(
            err,
            ApiError::Http {
                source: DispatchError::Status { status: 503, .. },
                ..
            }
        ));
    }

    #[test]
    fn execute_wraps_malformed_body() {
        let client = client(StubTransport::replying(200, "not json"));
        let err = client.execute(&foo_request(), None).unwrap_err();
        assert!(err.to_string().contains("HTTP_ERROR"));
        assert!(matches!(
            err,
            ApiError::Http {
                source: DispatchError::Decode(_),
                ..
            }
        ));
    }

    #[test]
    fn execute_does_not_retry() {
        let client = client(StubTransport::failing(TransportError::Timeout("slow".to_string())));
        let _ = client.execute(&foo_request(), None);
        assert_eq!(client.transport.seen().len(), 1);
    }

    #[test]
    fn last_rest_url_is_overwritten() {
        let client = client(StubTransport::replying(200, "{}"));
        client.execute(&Request::new("/first").with_timestamp(1), None).unwrap();
        client.execute(&Request::new("/second").with_timestamp(2), None).unwrap();
        assert!(client
            .last_rest_url()
            .unwrap()
            .starts_with("https://api.example.com/second?"));
    }

    #[test]
    fn shared_across_threads() {
        let client = client(StubTransport::replying(200, r#"{"code":"0"}"#));
        std::thread::scope(|s| {
            for i in 0..4 {
                let client = &client;
                s.spawn(move || {
                    let req = Request::new(format!("/call/{i}")).with_timestamp(i);
                    assert!(client.execute(&req, None).unwrap().is_success());
                });
            }
        });
        assert_eq!(client.transport.seen().len(), 4);
        assert!(client.last_rest_url().unwrap().contains("/call/"));
    }

    #[test]
    #[tracing_test::traced_test]
    fn execute_logs_dispatch_and_failure() {
        let client = client(StubTransport::replying(500, "boom"));
        let _ = client.execute(&foo_request(), None);
        assert!(logs_contain("dispatching open platform request"));
        assert!(logs_contain("open platform request failed"));
    }
}
