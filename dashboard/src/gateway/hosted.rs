// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Gateways speaking to the managed backend over HTTP: the auth API under
//! `/auth/v1` and the REST data API under `/rest/v1`.
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use common::{Credentials, Session, User};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::session_store::SessionStore;
use super::{Collection, DataGateway, Record, Select, SessionGateway, validate_record};
use crate::error::AuthFailure;
use crate::session::{SessionEvents, SessionListener, Subscription};

/// Connection details shared by both hosted gateways.
struct Backend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Backend {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Every request carries the project key; the bearer token is the
    /// session's when there is one.
    fn authorized(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(token.unwrap_or(&self.api_key))
    }
}

/// Builds the hosted session and data gateways for the project at `url`.
pub fn connect(
    url: &str,
    api_key: &str,
    session_file: &Path,
) -> Result<(HostedSessionGateway, HostedDataGateway)> {
    let http = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let backend = Arc::new(Backend {
        http,
        base_url: url.trim_end_matches('/').to_string(),
        api_key: api_key.to_string(),
    });
    let keeper = Arc::new(SessionKeeper {
        backend,
        store: SessionStore::open(session_file),
        events: SessionEvents::new(),
        refreshing: Mutex::new(()),
    });

    info!("Using hosted backend at {}", keeper.backend.base_url);
    Ok((
        HostedSessionGateway {
            keeper: Arc::clone(&keeper),
        },
        HostedDataGateway { keeper },
    ))
}

/// Token payload returned by the auth API on sign-in, refresh and (when
/// email confirmation is off) sign-up.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Picks the human readable message out of an auth API error body.
fn error_message(body: &Value) -> Option<String> {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

async fn auth_failure(response: Response) -> AuthFailure {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    AuthFailure::new(
        error_message(&body).unwrap_or_else(|| format!("Request failed with status {status}")),
    )
}

async fn send_auth(request: RequestBuilder) -> Result<Response, AuthFailure> {
    let response = request
        .send()
        .await
        .map_err(|e| AuthFailure::new(e.to_string()))?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(auth_failure(response).await)
    }
}

/// The signed-in session shared by both hosted gateways. Whichever gateway
/// finds it expired refreshes it; concurrent callers wait for that refresh.
struct SessionKeeper {
    backend: Arc<Backend>,
    store: SessionStore,
    events: SessionEvents,
    refreshing: Mutex<()>,
}

impl SessionKeeper {
    fn store_session(&self, session: Option<Session>) {
        self.store.set(session.clone());
        self.events.emit(session.as_ref());
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthFailure> {
        let request = self.backend.authorized(
            self.backend
                .http
                .post(self.backend.url("/auth/v1/token?grant_type=refresh_token"))
                .json(&json!({ "refresh_token": refresh_token })),
            None,
        );
        let response = send_auth(request).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthFailure::new(e.to_string()))?;
        Ok(token.into_session())
    }

    /// The stored session, refreshed first when it has expired. A failed
    /// refresh drops the session and reports the sign-out.
    async fn valid_session(&self) -> Option<Session> {
        let session = self.store.get()?;
        if !session.is_expired(Utc::now()) {
            return Some(session);
        }

        let _refreshing = self.refreshing.lock().await;
        // Someone else may have refreshed while we waited.
        let session = self.store.get()?;
        if !session.is_expired(Utc::now()) {
            return Some(session);
        }

        debug!("Stored session has expired, refreshing it.");
        let refreshed = match session.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token).await,
            None => Err(AuthFailure::new("Session expired without a refresh token")),
        };
        match refreshed {
            Ok(session) => {
                info!("Session refreshed.");
                self.store_session(Some(session.clone()));
                Some(session)
            }
            Err(e) => {
                error!("Failed to refresh session: {}", e);
                self.store_session(None);
                None
            }
        }
    }

    /// Bearer token for data calls, refreshed when needed.
    async fn access_token(&self) -> Option<String> {
        self.valid_session().await.map(|session| session.access_token)
    }
}

/// Session gateway backed by the hosted auth API.
pub struct HostedSessionGateway {
    keeper: Arc<SessionKeeper>,
}

#[async_trait]
impl SessionGateway for HostedSessionGateway {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.keeper.valid_session().await)
    }

    async fn current_user(&self) -> Result<Option<User>> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };

        let backend = &self.keeper.backend;
        let response = backend
            .authorized(
                backend.http.get(backend.url("/auth/v1/user")),
                Some(&session.access_token),
            )
            .send()
            .await
            .context("Failed to request the current user")?
            .error_for_status()
            .context("Auth API rejected the user request")?;
        let user = response
            .json::<User>()
            .await
            .context("Failed to decode the current user")?;
        Ok(Some(user))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthFailure> {
        let backend = &self.keeper.backend;
        let request = backend.authorized(
            backend
                .http
                .post(backend.url("/auth/v1/signup"))
                .json(credentials),
            None,
        );
        let response = send_auth(request).await?;
        let body: Value = response.json().await.unwrap_or(Value::Null);

        // Without email confirmation the backend signs the new user in directly.
        if body.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(body).map_err(|e| AuthFailure::new(e.to_string()))?;
            self.keeper.store_session(Some(token.into_session()));
        }
        info!("Account created for {}", credentials.email);
        Ok(())
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<(), AuthFailure> {
        let backend = &self.keeper.backend;
        let request = backend.authorized(
            backend
                .http
                .post(backend.url("/auth/v1/token?grant_type=password"))
                .json(credentials),
            None,
        );
        let response = send_auth(request).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthFailure::new(e.to_string()))?;

        info!("Signed in as {}", credentials.email);
        self.keeper.store_session(Some(token.into_session()));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthFailure> {
        if let Some(token) = self.keeper.store.access_token() {
            let backend = &self.keeper.backend;
            let request = backend.authorized(
                backend.http.post(backend.url("/auth/v1/logout")),
                Some(&token),
            );
            let response = request
                .send()
                .await
                .map_err(|e| AuthFailure::new(e.to_string()))?;

            // An already invalid session still counts as signed out.
            let status = response.status();
            let session_gone = matches!(
                status,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
            );
            if !status.is_success() && !session_gone {
                return Err(auth_failure(response).await);
            }
        }

        info!("Signed out.");
        self.keeper.store_session(None);
        Ok(())
    }

    fn on_session_change(&self, listener: SessionListener) -> Subscription {
        self.keeper.events.subscribe(listener)
    }
}

/// Data gateway backed by the hosted REST API.
pub struct HostedDataGateway {
    keeper: Arc<SessionKeeper>,
}

/// Query string for a select, in the REST API's filter syntax.
fn select_params(query: &Select) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), query.selected_columns().join(","))];
    if let Some(filter) = &query.filter {
        params.push((filter.column.to_string(), format!("eq.{}", filter.value)));
    }
    if let Some(order) = query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl DataGateway for HostedDataGateway {
    async fn select(&self, query: &Select) -> Result<Vec<Record>> {
        query.validate()?;
        let token = self.keeper.access_token().await;
        let path = format!("/rest/v1/{}", query.collection.table());
        debug!("GET {} {:?}", path, select_params(query));

        let backend = &self.keeper.backend;
        let response = backend
            .authorized(
                backend
                    .http
                    .get(backend.url(&path))
                    .query(&select_params(query)),
                token.as_deref(),
            )
            .send()
            .await
            .with_context(|| format!("Failed to reach {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            bail!(
                "GET {} failed with {}: {}",
                path,
                status,
                error_message(&body).unwrap_or_default()
            );
        }

        response
            .json::<Vec<Record>>()
            .await
            .with_context(|| format!("Failed to decode rows from {path}"))
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Vec<Record>> {
        validate_record(collection, &record)?;
        let token = self.keeper.access_token().await;
        let path = format!("/rest/v1/{}", collection.table());
        debug!("POST {}", path);

        let backend = &self.keeper.backend;
        let response = backend
            .authorized(
                backend
                    .http
                    .post(backend.url(&path))
                    .header("Prefer", "return=representation")
                    .json(&[record]),
                token.as_deref(),
            )
            .send()
            .await
            .with_context(|| format!("Failed to reach {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            bail!(
                "POST {} failed with {}: {}",
                path,
                status,
                error_message(&body).unwrap_or_default()
            );
        }

        response
            .json::<Vec<Record>>()
            .await
            .with_context(|| format!("Failed to decode inserted rows from {path}"))
    }
}
