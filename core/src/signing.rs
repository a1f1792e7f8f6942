//! Request signature over the sorted common and API parameters.
//!
//! The base string is the API name followed by every `key` + `value` pair of
//! the merged parameters in key order, with no separators. The signature is
//! the uppercase hex HMAC-SHA256 of that string keyed by the app secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::Params;

type HmacSha256 = Hmac<Sha256>;

/// Identifier sent as `sign_method`.
pub const SIGN_METHOD: &str = "sha256";

/// Builds the string that gets signed. API params override common params on
/// key collisions.
pub fn signature_base_string(common: &Params, api_params: Option<&Params>, api_name: &str) -> String {
    let merged;
    let params = match api_params {
        Some(api) => {
            merged = common.merged(api);
            &merged
        }
        None => common,
    };

    let mut base = String::from(api_name);
    for (key, value) in params.sorted() {
        base.push_str(key);
        base.push_str(&value.to_string());
    }
    base
}

pub fn signature(app_secret: &str, common: &Params, api_params: Option<&Params>, api_name: &str) -> String {
    let base = signature_base_string(common, api_params, api_name);
    tracing::trace!(api_name, base_len = base.len(), "computing request signature");
    hmac_sha256_upper_hex(app_secret, &base)
}

fn hmac_sha256_upper_hex(secret: &str, message: &str) -> String {
    // HMAC pads or hashes the key to the block size, so every key length is valid.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}
