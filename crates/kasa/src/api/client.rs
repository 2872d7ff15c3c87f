//! Wallet API HTTP client implementation.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, trace};

use crate::auth::AccessToken;
use crate::config::ClientConfig;
use crate::error::{Error, InvalidInputError, ProtocolError, TransportError};
use crate::types::ApiUrl;

/// A complete description of one API call.
///
/// Requests are plain values so a rejected call can be submitted again
/// unchanged after its credentials are renewed.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A POST with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self, Error> {
        let body = serde_json::to_value(body).map_err(|e| InvalidInputError::Other {
            message: format!("request body is not valid JSON: {}", e),
        })?;
        Ok(Self::new(Method::POST, path).with_body(body))
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// HTTP transport for the wallet API.
///
/// This type knows nothing about sessions: callers pass the access token
/// explicitly, or `None` for unauthenticated calls.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    api_url: ApiUrl,
}

impl ApiClient {
    /// Create a new client for the configured API.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kasa/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    /// Returns the API base URL this client is configured for.
    pub fn api_url(&self) -> &ApiUrl {
        &self.api_url
    }

    /// Make an unauthenticated POST and decode the response.
    #[instrument(skip(self, body), fields(api = %self.api_url))]
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, Error>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let request = ApiRequest::post(path, body)?;
        let response = self.execute(&request, None).await?;
        Self::handle_response(response).await
    }

    /// Send a request, attaching `token` as the bearer credential if given.
    ///
    /// Only transport failures are errors here; the status is left for
    /// the caller to inspect.
    #[instrument(skip(self, request, token), fields(method = %request.method, path = %request.path))]
    pub(crate) async fn execute(
        &self,
        request: &ApiRequest,
        token: Option<&AccessToken>,
    ) -> Result<reqwest::Response, Error> {
        let url = self.api_url.endpoint(&request.path);
        debug!(%url, authenticated = token.is_some(), "API request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(self.headers(token)?);

        if !request.query.is_empty() {
            trace!(query = ?request.query, "query parameters");
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    fn headers(&self, token: Option<&AccessToken>) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = token {
            let value = HeaderValue::from_str(&token.bearer()).map_err(|_| TransportError::Http {
                message: "access token contains characters not allowed in a header".to_string(),
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Decode a successful body, or turn a failure status into a [`ProtocolError`].
    pub(crate) async fn handle_response<R: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<R, Error> {
        let status = response.status();
        trace!(status = %status, "API response");

        if !status.is_success() {
            return Err(Error::Protocol(Self::parse_error_response(response).await));
        }

        let bytes = response.bytes().await?;
        // Empty bodies (204, bare 200) decode as JSON null.
        let bytes: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(bytes).map_err(|e| {
            TransportError::Decode {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Parse an API error response.
    async fn parse_error_response(response: reqwest::Response) -> ProtocolError {
        let status = response.status().as_u16();

        match response.json::<serde_json::Value>().await {
            Ok(body) => ProtocolError::from_body(status, Some(body)),
            Err(_) => ProtocolError::from_body(status, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let config = ClientConfig::default();
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.api_url(), &config.api_url);
    }

    #[test]
    fn requests_are_replayable_values() {
        let request = ApiRequest::get("transactions/")
            .with_query("page", "2")
            .with_query("transaction_type", "deposit");
        let replay = request.clone();
        assert_eq!(request, replay);
        assert_eq!(replay.path(), "transactions/");
        assert_eq!(replay.method(), &Method::GET);
    }

    #[test]
    fn headers_carry_bearer_token() {
        let client = ApiClient::new(&ClientConfig::default()).unwrap();
        let headers = client.headers(Some(&AccessToken::new("T1"))).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer T1");

        let anonymous = client.headers(None).unwrap();
        assert!(anonymous.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn header_rejects_control_characters() {
        let client = ApiClient::new(&ClientConfig::default()).unwrap();
        assert!(client.headers(Some(&AccessToken::new("bad\ntoken"))).is_err());
    }
}
