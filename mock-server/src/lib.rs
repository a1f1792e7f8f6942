use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method, StatusCode},
    routing::any,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::net::TcpListener;
use uuid::Uuid;

/// Header the client uses to carry form-encoded API parameters.
pub const API_PARAMS_HEADER: &str = "x-lazop-api-params";

/// The single application the mock gateway accepts.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub app_key: String,
    pub app_secret: String,
}

impl Credentials {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }
}

type Shared = Arc<Credentials>;

/// Router for the mock open platform.
///
/// Any path not under `/mock/` is treated as an API name: the signature is
/// re-derived from the parsed query and API-params header and the call is
/// answered in the platform's JSON envelope. `/mock/status/{code}` and
/// `/mock/garbage` produce transport-level failures for client tests.
pub fn app(credentials: Credentials) -> Router {
    Router::new()
        .route("/mock/status/{code}", any(fail_with_status))
        .route("/mock/garbage", any(garbage))
        .fallback(gateway)
        .with_state(Arc::new(credentials))
}

pub async fn run(listener: TcpListener, credentials: Credentials) -> Result<(), std::io::Error> {
    axum::serve(listener, app(credentials)).await
}

/// Uppercase hex HMAC-SHA256 of `api_name` followed by every sorted
/// `key` + `value` pair.
pub fn sign(secret: &str, api_name: &str, params: &BTreeMap<String, String>) -> String {
    let mut base = api_name.to_string();
    for (key, value) in params {
        base.push_str(key);
        base.push_str(value);
    }
    // HMAC pads or hashes the key to the block size, so every key length is valid.
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(base.as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

fn parse_form(input: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

fn error_envelope(code: &str, message: &str) -> Json<Value> {
    Json(json!({
        "type": "ISV",
        "code": code,
        "message": message,
        "request_id": Uuid::new_v4().to_string(),
    }))
}

async fn gateway(
    State(credentials): State<Shared>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Json<Value> {
    let api_name = uri.path().to_string();
    let common = parse_form(uri.query().unwrap_or_default());
    let api_params = parse_form(
        headers
            .get(API_PARAMS_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default(),
    );

    let lookup = |name: &str| {
        common
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    let (Some(app_key), Some(provided_sign)) = (lookup("app_key"), lookup("sign")) else {
        return error_envelope("MissingParameter", "app_key and sign are required");
    };
    if app_key != credentials.app_key {
        return error_envelope("InvalidAppKey", "The app key is not registered");
    }

    let mut signed: BTreeMap<String, String> = common
        .iter()
        .filter(|(k, _)| k != "sign")
        .cloned()
        .collect();
    for (key, value) in &api_params {
        signed.insert(key.clone(), value.clone());
    }

    let expected = sign(&credentials.app_secret, &api_name, &signed);
    if expected != provided_sign {
        tracing::warn!(%api_name, "signature mismatch");
        return error_envelope(
            "IncompleteSignature",
            "The request signature does not conform to platform standards",
        );
    }

    tracing::info!(%method, %api_name, "accepted signed call");
    let params: serde_json::Map<String, Value> = api_params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Json(json!({
        "code": "0",
        "request_id": Uuid::new_v4().to_string(),
        "data": {
            "api": api_name,
            "method": method.as_str(),
            "access_token": lookup("access_token").unwrap_or_default(),
            "params": params,
        }
    }))
}

async fn fail_with_status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, format!("mock failure {}", status.as_u16()))
}

async fn garbage() -> &'static str {
    "<html>definitely not json</html>"
}
