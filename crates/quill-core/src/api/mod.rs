//! Authenticated HTTP client for the article service.
//!
//! Every request goes out with the stored credentials attached. A 401
//! triggers a single-flight token refresh: the first request to see it
//! performs the refresh exchange while concurrent 401s queue for the
//! outcome, and each request is replayed at most once with the new
//! access token.

pub mod error;
pub mod types;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::auth::tokens::{TokenSet, TokenStore};
pub use error::ApiError;
use types::{Article, TokenGrant, UserProfile};

/// Header carrying the anti-forgery token.
const CSRF_HEADER: &str = "X-CSRF-Token";

/// Outcome of one refresh exchange, delivered to every queued request.
#[derive(Debug, Clone)]
enum RefreshOutcome {
    /// Replay the original request with this access token.
    Token(String),
    /// The exchange failed; queued requests fail with this message.
    Failed(String),
}

/// Single-flight refresh coordination.
///
/// Invariant: `waiters` is non-empty only while `refreshing` is true.
#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// How a 401 request participates in the refresh cycle.
enum RefreshRole {
    /// This request performs the refresh exchange.
    Lead { refresh_token: String },
    /// A refresh is already in flight; await its outcome.
    Wait(oneshot::Receiver<RefreshOutcome>),
    /// No refresh token on hand; the 401 is final.
    SignedOut,
}

/// HTTP client for the article service.
///
/// Refresh state lives on the instance, so independent clients coordinate
/// independently.
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<TokenStore>,
    refresh: Mutex<RefreshState>,
}

impl ApiClient {
    /// Creates a client for the service at `base_url` (scheme + host).
    ///
    /// The `/api` prefix is appended here; callers pass endpoint paths
    /// like `/auth/login`.
    pub fn new(base_url: &str, tokens: Arc<TokenStore>) -> Self {
        Self {
            base_url: format!("{}/api", base_url.trim_end_matches('/')),
            http: reqwest::Client::new(),
            tokens,
            refresh: Mutex::new(RefreshState::default()),
        }
    }

    /// The token store backing this client.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Exchanges credentials for a token grant. Does not persist it.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenGrant, ApiError> {
        self.post_json(
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Registers an account and returns its first token grant.
    /// An absent or empty `full_name` is omitted from the payload.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<TokenGrant, ApiError> {
        let mut payload = serde_json::json!({ "email": email, "password": password });
        if let Some(name) = full_name.map(str::trim).filter(|name| !name.is_empty()) {
            payload["full_name"] = serde_json::Value::String(name.to_string());
        }
        self.post_json("/auth/register", payload).await
    }

    /// Fetches the signed-in user's profile.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        self.get_json("/auth/me").await
    }

    /// Lists all articles, newest first.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn list_articles(&self) -> Result<Vec<Article>, ApiError> {
        self.get_json("/articles/").await
    }

    /// Searches articles by title or content.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn search_articles(&self, query: &str) -> Result<Vec<Article>, ApiError> {
        self.get_json(&search_path(query)).await
    }

    /// Fetches one article by id.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn get_article(&self, id: i64) -> Result<Article, ApiError> {
        self.get_json(&format!("/articles/{id}")).await
    }

    /// Publishes a new article.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn create_article(&self, title: &str, content: &str) -> Result<Article, ApiError> {
        self.post_json(
            "/articles/",
            serde_json::json!({ "title": title, "content": content }),
        )
        .await
    }

    /// Deletes an article by id.
    ///
    /// # Errors
    /// Returns an error if the operation fails.
    pub async fn delete_article(&self, id: i64) -> Result<(), ApiError> {
        self.send(Method::DELETE, &format!("/articles/{id}"), None)
            .await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self.send(Method::POST, path, Some(&body)).await?;
        Ok(response.json().await?)
    }

    /// Sends one request through the credential/refresh pipeline.
    ///
    /// The request goes out with the stored access token. On a 401 it
    /// triggers (or joins) a refresh and is replayed exactly once with
    /// the refreshed token; a 401 on the replay is surfaced, never
    /// retried again.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let access = self.tokens.get().access_token;
        let response = self
            .dispatch(method.clone(), path, body, access.as_deref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check(response).await;
        }

        let access = match self.join_refresh() {
            RefreshRole::Lead { refresh_token } => self.run_refresh(&refresh_token).await?,
            RefreshRole::Wait(rx) => Self::await_refresh(rx).await?,
            RefreshRole::SignedOut => {
                if let Err(err) = self.tokens.clear() {
                    tracing::warn!("failed to clear token store: {err:#}");
                }
                return Err(Self::status_error(response).await);
            }
        };

        let retry = self.dispatch(method, path, body, Some(&access)).await?;
        Self::check(retry).await
    }

    /// Issues a single request with credentials attached: the given
    /// access token as a bearer header and the stored CSRF token, each
    /// omitted when absent (covers pre-login requests).
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        access: Option<&str>,
    ) -> Result<Response, reqwest::Error> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(access) = access {
            request = request.header(AUTHORIZATION, format!("Bearer {access}"));
        }
        if let Some(csrf) = self.tokens.get().csrf_token {
            request = request.header(CSRF_HEADER, csrf);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await
    }

    /// Checks-and-sets the refresh flag. There is no await point between
    /// the check and the set, so exactly one request leads each cycle;
    /// everyone else queues.
    ///
    /// The refresh token is captured under the same lock: a request whose
    /// 401 arrives after a failed cycle cleared the store sees `SignedOut`
    /// here instead of starting a doomed second exchange.
    fn join_refresh(&self) -> RefreshRole {
        let mut state = self.refresh_state();
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            return RefreshRole::Wait(rx);
        }

        match self.tokens.get().refresh_token {
            Some(refresh_token) => {
                state.refreshing = true;
                RefreshRole::Lead { refresh_token }
            }
            None => RefreshRole::SignedOut,
        }
    }

    /// Performs the refresh exchange as the leading request.
    ///
    /// On success the new triple is persisted before any queued request
    /// is woken, so replays always see the fresh tokens. On failure the
    /// store is cleared and every queued request fails with the refresh
    /// error.
    async fn run_refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let mut lead = RefreshLead {
            client: self,
            finished: false,
        };

        tracing::debug!("access token rejected, refreshing session");
        let outcome = match self.refresh_exchange(refresh_token).await {
            Ok(grant) => {
                if let Err(err) = self.tokens.set(TokenSet {
                    access_token: Some(grant.access_token.clone()),
                    refresh_token: Some(grant.refresh_token),
                    csrf_token: Some(grant.csrf_token),
                }) {
                    tracing::warn!("failed to persist refreshed tokens: {err:#}");
                }
                RefreshOutcome::Token(grant.access_token)
            }
            Err(err) => {
                tracing::warn!("token refresh failed: {err}");
                if let Err(clear_err) = self.tokens.clear() {
                    tracing::warn!("failed to clear token store: {clear_err:#}");
                }
                RefreshOutcome::Failed(err.to_string())
            }
        };

        lead.finished = true;
        self.finish_refresh(&outcome);

        match outcome {
            RefreshOutcome::Token(access) => Ok(access),
            RefreshOutcome::Failed(message) => Err(ApiError::RefreshFailed { message }),
        }
    }

    /// The refresh exchange itself. Sent without credential headers, like
    /// any pre-login request.
    async fn refresh_exchange(&self, refresh_token: &str) -> Result<TokenGrant, ApiError> {
        let url = format!("{}/auth/refresh", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Resets the refresh flag and delivers the outcome to queued
    /// requests in arrival order.
    fn finish_refresh(&self, outcome: &RefreshOutcome) {
        let waiters = {
            let mut state = self.refresh_state();
            state.refreshing = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            // A waiter may have been dropped; nothing to deliver then.
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn await_refresh(rx: oneshot::Receiver<RefreshOutcome>) -> Result<String, ApiError> {
        match rx.await {
            Ok(RefreshOutcome::Token(access)) => Ok(access),
            Ok(RefreshOutcome::Failed(message)) => Err(ApiError::RefreshFailed { message }),
            Err(_) => Err(ApiError::RefreshFailed {
                message: "refresh interrupted".to_string(),
            }),
        }
    }

    fn refresh_state(&self) -> MutexGuard<'_, RefreshState> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Passes 2xx responses through; everything else becomes a status
    /// error carrying the server's detail message when present.
    async fn check(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(Self::status_error(response).await)
    }

    async fn status_error(response: Response) -> ApiError {
        #[derive(Deserialize)]
        struct ErrorBody {
            // Validation errors carry a non-string detail; those fall
            // back to the status line.
            detail: Option<String>,
        }

        let status = response.status();
        let detail = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.detail);
        ApiError::Status { status, detail }
    }
}

/// Clears the refresh flag if the leading request is dropped mid-exchange,
/// failing queued requests instead of leaving them parked forever.
struct RefreshLead<'a> {
    client: &'a ApiClient,
    finished: bool,
}

impl Drop for RefreshLead<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.client
                .finish_refresh(&RefreshOutcome::Failed("refresh interrupted".to_string()));
        }
    }
}

fn search_path(query: &str) -> String {
    let encoded: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("q", query)
        .finish();
    format!("/articles/search?{encoded}")
}
