use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::WebError;

/// The default `User-Agent` header sent with every request.
pub const USER_AGENT: &str = concat!("querycache/", env!("CARGO_PKG_VERSION"));

/// Options for the HTTP client used by [`WebQuery`](crate::WebQuery).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout for establishing a connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Timeout for the entire request, including reading the response body.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(60),
            headers: BTreeMap::new(),
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl HttpConfig {
    /// Builds a [`reqwest::Client`] from this configuration.
    pub fn client(&self) -> Result<reqwest::Client, WebError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .default_headers(parse_headers(&self.headers)?)
            .build()?;

        Ok(client)
    }
}

/// Converts a plain header map into a validated [`HeaderMap`].
pub(crate) fn parse_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, WebError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| WebError::InvalidHeader(name.clone()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| WebError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}
