//! Authenticated request pipeline.

use std::sync::Arc;

use reqwest::Method;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::Result;
use crate::auth::{AccessToken, RefreshCoordinator};
use crate::store::CredentialStore;

use super::client::{ApiClient, ApiRequest};

/// Sends API calls with the current access token and recovers from expiry.
///
/// Each call is attempted with whatever token is in the store. If the API
/// answers 401, the pipeline obtains a renewed token through the
/// [`RefreshCoordinator`] and submits the identical call exactly once
/// more. The replay's result is final, whatever it is.
///
/// The pipeline only reads the store; writes happen in the coordinator
/// and the session.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    client: ApiClient,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator,
}

impl RequestPipeline {
    pub fn new(
        client: ApiClient,
        store: Arc<dyn CredentialStore>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            client,
            store,
            coordinator,
        }
    }

    /// Send `request` and decode the response body.
    ///
    /// # Errors
    ///
    /// - transport failures, unchanged and without renewal
    /// - [`AuthError::RefreshFailed`](crate::error::AuthError::RefreshFailed)
    ///   if the call was rejected and renewal failed; the call is not replayed
    /// - the replay's own error if it fails, including a second 401
    #[instrument(skip(self, request), fields(method = %request.method(), path = %request.path()))]
    pub async fn send<R: DeserializeOwned>(&self, request: &ApiRequest) -> Result<R> {
        let presented = self.current_token()?;
        let response = self.client.execute(request, presented.as_ref()).await?;

        match ApiClient::handle_response(response).await {
            Err(e) if e.is_expiry_rejection() => {
                debug!("Access token rejected, replaying after renewal");
                let token = self.renewed_token(presented.as_ref()).await?;
                let response = self.client.execute(request, Some(&token)).await?;
                ApiClient::handle_response(response).await
            }
            other => other,
        }
    }

    /// GET `path` with query parameters.
    pub async fn get<R: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<R> {
        let request = query
            .iter()
            .fold(ApiRequest::get(path), |request, (key, value)| {
                request.with_query(*key, value.clone())
            });
        self.send(&request).await
    }

    /// POST a JSON body to `path`.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        self.send(&ApiRequest::post(path, body)?).await
    }

    /// POST an empty JSON object to `path`.
    pub async fn post_empty<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let request = ApiRequest::new(Method::POST, path).with_body(serde_json::json!({}));
        self.send(&request).await
    }

    fn current_token(&self) -> Result<Option<AccessToken>> {
        Ok(self.store.load()?.map(|pair| pair.access))
    }

    /// The token to replay a rejected call with.
    ///
    /// If the store already holds a different token than the one the call
    /// carried, another caller renewed it since; use that instead of
    /// renewing again.
    async fn renewed_token(&self, presented: Option<&AccessToken>) -> Result<AccessToken> {
        if let Some(current) = self.current_token()?
            && presented != Some(&current)
        {
            debug!("Token already renewed by another call");
            return Ok(current);
        }

        let pair = self.coordinator.refresh().await?;
        Ok(pair.access)
    }
}
