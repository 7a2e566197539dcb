// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use axum::{
    extract::{Form, Json, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use common::Credentials;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::render;
use crate::view::app::{AppRoot, View};
use crate::view::auth::SubmitOutcome;
use crate::view::dashboard::Tab;

#[derive(Debug, Deserialize)]
pub struct NewClientForm {
    pub name: String,
}

fn back_to_index() -> Redirect {
    Redirect::to("/")
}

/// Handler for the single page: loading, auth form or dashboard.
pub async fn index(State(app): State<Arc<AppRoot>>) -> Result<Html<String>, AppError> {
    if app.view() == View::Loading {
        return Ok(Html(render::render_loading()?));
    }

    let html = match app.reconcile().await {
        Some(shell) => render::render_dashboard(&shell.snapshot())?,
        None => render::render_auth(&app.auth().snapshot())?,
    };
    Ok(Html(html))
}

/// Handler for the auth form, in whichever mode it is in.
pub async fn submit_auth(
    State(app): State<Arc<AppRoot>>,
    Form(credentials): Form<Credentials>,
) -> Redirect {
    match app.auth().submit(credentials).await {
        SubmitOutcome::SignedUp => info!("Account created."),
        SubmitOutcome::SignInAccepted => info!("Signed in."),
        SubmitOutcome::Rejected(message) => debug!("Auth rejected: {}", message),
        SubmitOutcome::Busy => debug!("Auth submission already in flight."),
    }
    back_to_index()
}

pub async fn toggle_auth_mode(State(app): State<Arc<AppRoot>>) -> Redirect {
    app.auth().toggle_mode();
    back_to_index()
}

pub async fn logout(State(app): State<Arc<AppRoot>>) -> Redirect {
    if let Some(shell) = app.dashboard().await {
        shell.logout().await;
    }
    back_to_index()
}

/// Handler for the sidebar navigation.
pub async fn select_tab(
    State(app): State<Arc<AppRoot>>,
    Path(tab): Path<String>,
) -> Result<Redirect, AppError> {
    let tab: Tab = tab.parse().map_err(|e| {
        error!("{}", e);
        AppError::not_found(&format!("Tab '{}' not found.", tab))
    })?;

    if let Some(shell) = app.dashboard().await {
        shell.select_tab(tab).await;
    }
    Ok(back_to_index())
}

pub async fn add_client(
    State(app): State<Arc<AppRoot>>,
    Form(form): Form<NewClientForm>,
) -> Redirect {
    if let Some(shell) = app.dashboard().await {
        shell.clients().add_client(&form.name).await;
    }
    back_to_index()
}

pub async fn toggle_add_client_form(State(app): State<Arc<AppRoot>>) -> Redirect {
    if let Some(shell) = app.dashboard().await {
        shell.clients().toggle_add_form();
    }
    back_to_index()
}

pub async fn cancel_add_client(State(app): State<Arc<AppRoot>>) -> Redirect {
    if let Some(shell) = app.dashboard().await {
        shell.clients().cancel_add();
    }
    back_to_index()
}

/// Handler for expanding or collapsing one client.
pub async fn toggle_client(
    State(app): State<Arc<AppRoot>>,
    Path(client_id): Path<String>,
) -> Result<Redirect, AppError> {
    if let Some(shell) = app.dashboard().await {
        if !shell.clients().toggle(&client_id) {
            return Err(AppError::not_found(&format!(
                "Client with ID {} not found.",
                client_id
            )));
        }
    }
    Ok(back_to_index())
}

// --- Custom Error Handling ---

/// Error returned by the page handlers.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    fn not_found(message: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        error!("Template rendering failed: {:#}", err);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "An internal error occurred.",
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(
            "Responding with error: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        (
            self.code,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
