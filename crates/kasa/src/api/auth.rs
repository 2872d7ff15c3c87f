//! Login, registration and credential renewal calls.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::Result;
use crate::auth::{CredentialPair, LoginCredentials, RefreshToken, Registration, Renewer};
use crate::config::ClientConfig;
use crate::error::{AuthError, Error, ProtocolError};

use super::client::ApiClient;
use super::endpoints::{
    LoginRequest, RefreshRequest, RegisterRequest, RegisteredUser, TokenPairResponse,
};

const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check credentials.";
const LOCKED_MESSAGE: &str =
    "Account is locked due to too many failed login attempts. Please try again later.";

/// The unauthenticated side of the API: obtaining and renewing tokens.
///
/// Calls made here never carry a bearer token and never pass through the
/// request pipeline, so renewal cannot recurse into itself.
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: ApiClient,
    login_path: String,
    refresh_path: String,
    register_path: String,
}

impl AuthClient {
    pub fn new(client: ApiClient, config: &ClientConfig) -> Self {
        Self {
            client,
            login_path: config.login_path.clone(),
            refresh_path: config.refresh_path.clone(),
            register_path: config.register_path.clone(),
        }
    }

    /// Exchange a username and password for a credential pair.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AccountLocked`] when the server answers 403
    /// - [`AuthError::LoginFailed`] for any other rejection
    /// - transport errors unchanged
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<CredentialPair> {
        let request = LoginRequest {
            username: credentials.username(),
            password: credentials.password(),
        };

        let response: TokenPairResponse = match self.client.post(&self.login_path, &request).await
        {
            Ok(response) => response,
            Err(Error::Protocol(e)) => return Err(login_error(e).into()),
            Err(e) => return Err(e),
        };

        debug!("Login accepted");
        response.into_pair(None).ok_or_else(|| {
            AuthError::LoginFailed {
                message: "Invalid login response.".to_string(),
            }
            .into()
        })
    }

    /// Exchange a refresh token for a new pair.
    ///
    /// If the server does not rotate refresh tokens, the presented one is
    /// kept in the returned pair.
    #[instrument(skip(self, refresh))]
    pub async fn refresh(&self, refresh: &RefreshToken) -> Result<CredentialPair> {
        info!("Requesting credential renewal");

        let request = RefreshRequest {
            refresh: refresh.as_str(),
        };

        let response: TokenPairResponse = match self.client.post(&self.refresh_path, &request).await
        {
            Ok(response) => response,
            Err(Error::Protocol(e)) => {
                let reason = e.message.unwrap_or_else(|| format!("HTTP {}", e.status));
                return Err(AuthError::refresh_failed(reason).into());
            }
            Err(e) => return Err(e),
        };

        response
            .into_pair(Some(refresh.as_str()))
            .ok_or_else(|| AuthError::refresh_failed("renewal response had no tokens").into())
    }

    /// Create a new account. Does not sign in.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<RegisteredUser> {
        let request = RegisterRequest {
            username: &registration.username,
            email: &registration.email,
            password: &registration.password,
            first_name: &registration.first_name,
            last_name: &registration.last_name,
        };

        let user: RegisteredUser = self.client.post(&self.register_path, &request).await?;
        info!(id = user.id, "Account registered");
        Ok(user)
    }
}

#[async_trait]
impl Renewer for AuthClient {
    async fn renew(&self, refresh: &RefreshToken) -> Result<CredentialPair> {
        self.refresh(refresh).await
    }
}

fn login_error(error: ProtocolError) -> AuthError {
    if error.is_lockout() {
        AuthError::AccountLocked {
            message: error.message.unwrap_or_else(|| LOCKED_MESSAGE.to_string()),
        }
    } else {
        AuthError::LoginFailed {
            message: error
                .message
                .unwrap_or_else(|| LOGIN_FAILED_MESSAGE.to_string()),
        }
    }
}
