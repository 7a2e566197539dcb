// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use common::{Credentials, Session, User};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info};

use super::Lifecycle;
use crate::error::{AuthFailure, DashboardError};
use crate::gateway::SessionGateway;
use crate::session::Subscription;

/// Which action the auth form performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    SignIn,
    SignUp,
}

impl AuthMode {
    fn toggled(self) -> Self {
        match self {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// The initial session query has not answered yet.
    Checking,
    SignIn,
    SignUp,
    Submitting,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The account was created and the form is back in sign-in mode.
    SignedUp,
    /// The credentials were accepted. The session itself arrives through the
    /// change stream.
    SignInAccepted,
    Rejected(String),
    /// Another submission is still in flight.
    Busy,
}

/// What the auth form renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub mode: AuthMode,
    pub email: String,
    pub error: Option<String>,
    pub is_submitting: bool,
}

#[derive(Debug)]
struct AuthFields {
    checking: bool,
    authenticated: bool,
    mode: AuthMode,
    submitting: bool,
    email: String,
    error: Option<String>,
}

/// Owner of the authentication state and the only subscriber to session
/// changes.
///
/// `authenticated` is only ever written from session presence: by the
/// initial check and by the change stream. Form submissions never set it.
pub struct AuthViewModel {
    gateway: Arc<dyn SessionGateway>,
    state: Arc<RwLock<AuthFields>>,
    lifecycle: Lifecycle,
    subscription: Mutex<Option<Subscription>>,
}

impl AuthViewModel {
    pub fn new(gateway: Arc<dyn SessionGateway>) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(AuthFields {
                checking: true,
                authenticated: false,
                mode: AuthMode::SignIn,
                submitting: false,
                email: String::new(),
                error: None,
            })),
            lifecycle: Lifecycle::new(),
            subscription: Mutex::new(None),
        }
    }

    /// Subscribes to session changes, then asks for the current session.
    pub async fn mount(&self) {
        {
            let mut subscription = self.subscription.lock();
            if subscription.is_some() || !self.lifecycle.is_mounted() {
                return;
            }

            let state = Arc::clone(&self.state);
            let lifecycle = self.lifecycle.clone();
            *subscription = Some(self.gateway.on_session_change(Arc::new(
                move |session: Option<&Session>| {
                    if !lifecycle.is_mounted() {
                        return;
                    }
                    debug!("Session changed (signed in: {}).", session.is_some());
                    state.write().authenticated = session.is_some();
                },
            )));
        }

        let result = self.gateway.current_session().await;
        if !self.lifecycle.is_mounted() {
            return;
        }

        let mut state = self.state.write();
        match result {
            Ok(session) => state.authenticated = session.is_some(),
            Err(e) => error!("Auth check error: {:#}", e),
        }
        state.checking = false;
    }

    /// Stops listening to session changes. Anything still in flight is
    /// dropped when it completes.
    pub fn unmount(&self) {
        self.lifecycle.unmount();
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
    }

    pub fn state(&self) -> AuthState {
        let state = self.state.read();
        if state.checking {
            AuthState::Checking
        } else if state.authenticated {
            AuthState::Authenticated
        } else if state.submitting {
            AuthState::Submitting
        } else {
            match state.mode {
                AuthMode::SignIn => AuthState::SignIn,
                AuthMode::SignUp => AuthState::SignUp,
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().authenticated
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        let state = self.state.read();
        AuthSnapshot {
            mode: state.mode,
            email: state.email.clone(),
            error: state.error.clone(),
            is_submitting: state.submitting,
        }
    }

    /// Switches between sign-in and sign-up, clearing any error.
    pub fn toggle_mode(&self) {
        let mut state = self.state.write();
        state.mode = state.mode.toggled();
        state.error = None;
    }

    /// Submits the form in the current mode.
    pub async fn submit(&self, credentials: Credentials) -> SubmitOutcome {
        let mode = {
            let mut state = self.state.write();
            if state.submitting {
                debug!("Ignoring auth submission while another one is in flight.");
                return SubmitOutcome::Busy;
            }
            state.submitting = true;
            state.error = None;
            state.email = credentials.email.clone();
            state.mode
        };

        let result = match mode {
            AuthMode::SignUp => self.gateway.sign_up(&credentials).await,
            AuthMode::SignIn => self.gateway.sign_in_with_password(&credentials).await,
        };

        let outcome = match &result {
            Ok(()) if mode == AuthMode::SignUp => SubmitOutcome::SignedUp,
            Ok(()) => SubmitOutcome::SignInAccepted,
            Err(failure) => SubmitOutcome::Rejected(failure.display_message().to_string()),
        };
        if !self.lifecycle.is_mounted() {
            return outcome;
        }

        let mut state = self.state.write();
        state.submitting = false;
        match result {
            Ok(()) if mode == AuthMode::SignUp => {
                info!("Sign-up succeeded, switching to sign-in.");
                state.email.clear();
                state.error = None;
                state.mode = AuthMode::SignIn;
            }
            Ok(()) => {}
            Err(failure) => {
                let message = failure.display_message().to_string();
                debug!("{}", DashboardError::from(failure));
                state.error = Some(message);
            }
        }
        outcome
    }

    /// Signs out. The view follows once the change stream reports it.
    pub async fn sign_out(&self) -> Result<(), AuthFailure> {
        self.gateway.sign_out().await.inspect_err(|e| {
            error!("Sign-out failed: {}", e);
        })
    }

    /// The signed-in user, if any. Failures are logged and read as "nobody".
    pub async fn current_user(&self) -> Option<User> {
        match self.gateway.current_user().await {
            Ok(user) => user,
            Err(e) => {
                error!("Error fetching current user: {:#}", e);
                None
            }
        }
    }
}

impl Drop for AuthViewModel {
    fn drop(&mut self) {
        self.unmount();
    }
}
