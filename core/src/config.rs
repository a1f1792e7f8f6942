//! Serializable client configuration.
//!
//! The library never reads the environment or the filesystem; callers load a
//! `ClientConfig` however they like (JSON, TOML, env) and hand it to
//! `Client::from_config`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection settings for one application on the open platform.
///
/// Missing credentials deserialize as empty strings and are rejected when the
/// client is built, not here.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub app_secret: String,
}

impl ClientConfig {
    pub fn new(
        server_url: impl Into<String>,
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            app_key: app_key.into(),
            app_secret: app_secret.into(),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("server_url", &self.server_url)
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}
