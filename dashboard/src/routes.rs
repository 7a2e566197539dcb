// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use crate::handlers;
use crate::view::app::AppRoot;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Creates and configures the application router.
pub fn create_router(app: Arc<AppRoot>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        // Auth form
        .route("/auth", post(handlers::submit_auth))
        .route("/auth/mode", post(handlers::toggle_auth_mode))
        .route("/logout", post(handlers::logout))
        // Sidebar navigation
        .route("/tabs/{tab}", post(handlers::select_tab))
        // Client panel
        .route("/clients", post(handlers::add_client))
        .route("/clients/form", post(handlers::toggle_add_client_form))
        .route("/clients/cancel", post(handlers::cancel_add_client))
        .route("/clients/{id}/toggle", post(handlers::toggle_client))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}
