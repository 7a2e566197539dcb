// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::gateway::Collection;
use thiserror::Error;

/// Message shown when the backend reports a failure without any text.
pub const GENERIC_AUTH_MESSAGE: &str = "An error occurred";

/// A sign-in, sign-up or sign-out rejected by the session gateway.
///
/// The message is whatever the backend said and is shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthFailure {
    pub message: String,
}

impl AuthFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The text to display, falling back to a generic message when the
    /// backend gave an empty one.
    pub fn display_message(&self) -> &str {
        if self.message.is_empty() {
            GENERIC_AUTH_MESSAGE
        } else {
            &self.message
        }
    }
}

/// Every failure a view can run into.
///
/// Only `Auth` is ever shown to the user. The other variants are logged by
/// the view that hit them, which then degrades its own state.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    #[error("failed to fetch {collection}: {cause:#}")]
    Fetch {
        collection: Collection,
        cause: anyhow::Error,
    },

    #[error("failed to insert into {collection}: {cause:#}")]
    Insert {
        collection: Collection,
        cause: anyhow::Error,
    },
}

impl DashboardError {
    pub fn fetch(collection: Collection, cause: anyhow::Error) -> Self {
        Self::Fetch { collection, cause }
    }

    pub fn insert(collection: Collection, cause: anyhow::Error) -> Self {
        Self::Insert { collection, cause }
    }
}
