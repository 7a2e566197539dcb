// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use chrono::{Local, Timelike};
use parking_lot::RwLock;
use serde::Serialize;

use super::Lifecycle;
use super::auth::AuthViewModel;

pub fn greeting_for_hour(hour: u32) -> &'static str {
    if hour < 12 {
        "Good Morning"
    } else if hour < 18 {
        "Good Afternoon"
    } else {
        "Good Evening"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderSnapshot {
    pub greeting: &'static str,
    pub user_name: String,
}

/// Greeting line at the top of the home tab.
pub struct Header {
    auth: Arc<AuthViewModel>,
    greeting: &'static str,
    user_name: RwLock<String>,
    lifecycle: Lifecycle,
}

impl Header {
    pub fn new(auth: Arc<AuthViewModel>) -> Self {
        Self::at_hour(auth, Local::now().hour())
    }

    pub fn at_hour(auth: Arc<AuthViewModel>, hour: u32) -> Self {
        Self {
            auth,
            greeting: greeting_for_hour(hour),
            user_name: RwLock::new("User".to_string()),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Looks up the signed-in user. Without one the name stays "User".
    pub async fn load(&self) {
        let user = self.auth.current_user().await;
        if !self.lifecycle.is_mounted() {
            return;
        }
        if let Some(user) = user.filter(|u| u.email.as_deref().is_some_and(|e| !e.is_empty())) {
            *self.user_name.write() = user.display_name();
        }
    }

    pub fn unmount(&self) {
        self.lifecycle.unmount();
    }

    pub fn snapshot(&self) -> HeaderSnapshot {
        HeaderSnapshot {
            greeting: self.greeting,
            user_name: self.user_name.read().clone(),
        }
    }
}
