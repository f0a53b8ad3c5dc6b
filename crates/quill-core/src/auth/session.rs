//! Session controller: current-user state over the API client.

use std::sync::Arc;

use crate::api::types::{TokenGrant, UserProfile};
use crate::api::{ApiClient, ApiError};
use crate::auth::tokens::TokenSet;

/// Holds the signed-in user and drives the auth operations.
///
/// Every failure path leaves the token store consistent: a failed login
/// or register clears it, and a rejected profile fetch signs the session
/// out entirely.
pub struct Session {
    client: Arc<ApiClient>,
    user: Option<UserProfile>,
}

impl Session {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client, user: None }
    }

    /// The signed-in user, when there is one.
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Resolves the session at startup: fetches the profile when an
    /// access token is on hand, otherwise stays signed out without a
    /// network call.
    pub async fn initialize(&mut self) {
        if self.client.tokens().get().access_token.is_none() {
            return;
        }
        self.fetch_profile().await;
    }

    /// Exchanges credentials for a session.
    ///
    /// On success the token triple is stored and the profile fetched; a
    /// rejected profile fetch does not fail the login. On failure the
    /// token store is cleared and the error's display carries the
    /// server's detail message when one was supplied.
    ///
    /// # Errors
    /// Returns an error if the login endpoint rejects the credentials or
    /// cannot be reached.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ApiError> {
        match self.client.login(email, password).await {
            Ok(grant) => {
                self.apply_grant(grant).await;
                Ok(())
            }
            Err(err) => {
                self.clear_tokens();
                Err(err)
            }
        }
    }

    /// Registers a new account and signs in. Same contract as `login`;
    /// an empty `full_name` is not sent.
    ///
    /// # Errors
    /// Returns an error if registration is rejected or the endpoint
    /// cannot be reached.
    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<(), ApiError> {
        match self.client.register(email, password, full_name).await {
            Ok(grant) => {
                self.apply_grant(grant).await;
                Ok(())
            }
            Err(err) => {
                self.clear_tokens();
                Err(err)
            }
        }
    }

    /// Drops the local session. No network call: the tokens simply stop
    /// being presented.
    pub fn logout(&mut self) {
        self.clear_tokens();
        self.user = None;
    }

    /// Fetches the current user's profile. Any failure signs the session
    /// out (tokens cleared, user absent) instead of surfacing an error.
    pub async fn fetch_profile(&mut self) {
        match self.client.me().await {
            Ok(profile) => self.user = Some(profile),
            Err(err) => {
                tracing::debug!("profile fetch failed, signing out: {err}");
                self.clear_tokens();
                self.user = None;
            }
        }
    }

    async fn apply_grant(&mut self, grant: TokenGrant) {
        if let Err(err) = self.client.tokens().set(TokenSet {
            access_token: Some(grant.access_token),
            refresh_token: Some(grant.refresh_token),
            csrf_token: Some(grant.csrf_token),
        }) {
            tracing::warn!("failed to persist tokens: {err:#}");
        }
        self.fetch_profile().await;
    }

    fn clear_tokens(&self) {
        if let Err(err) = self.client.tokens().clear() {
            tracing::warn!("failed to clear token store: {err:#}");
        }
    }
}
