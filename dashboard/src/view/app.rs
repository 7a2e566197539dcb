// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::auth::{AuthState, AuthViewModel};
use super::dashboard::DashboardShell;
use crate::gateway::{DataGateway, SessionGateway};

/// The top-level page shown to the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Loading,
    Auth,
    Dashboard,
}

impl View {
    pub fn from_auth_state(state: AuthState) -> Self {
        match state {
            AuthState::Checking => View::Loading,
            AuthState::Authenticated => View::Dashboard,
            AuthState::SignIn | AuthState::SignUp | AuthState::Submitting => View::Auth,
        }
    }
}

/// Picks the page from the auth state and owns the dashboard while it is
/// shown.
pub struct AppRoot {
    auth: Arc<AuthViewModel>,
    data: Arc<dyn DataGateway>,
    dashboard: Mutex<Option<Arc<DashboardShell>>>,
}

impl AppRoot {
    pub fn new(session: Arc<dyn SessionGateway>, data: Arc<dyn DataGateway>) -> Self {
        Self {
            auth: Arc::new(AuthViewModel::new(session)),
            data,
            dashboard: Mutex::new(None),
        }
    }

    /// Subscribes to session changes and runs the initial session check.
    pub async fn mount(&self) {
        self.auth.mount().await;
        info!("Initial session check finished: {:?}.", self.view());
    }

    pub async fn unmount(&self) {
        if let Some(shell) = self.dashboard.lock().await.take() {
            shell.unmount();
        }
        self.auth.unmount();
    }

    pub fn view(&self) -> View {
        View::from_auth_state(self.auth.state())
    }

    pub fn auth(&self) -> &Arc<AuthViewModel> {
        &self.auth
    }

    /// Brings the dashboard in line with the current view: mounts and
    /// loads it when the view becomes Dashboard, unmounts it when the view
    /// leaves. Returns the shell while the dashboard is shown.
    pub async fn reconcile(&self) -> Option<Arc<DashboardShell>> {
        let mut slot = self.dashboard.lock().await;
        if self.view() != View::Dashboard {
            if let Some(shell) = slot.take() {
                info!("Unmounting the dashboard.");
                shell.unmount();
            }
            return None;
        }
        if let Some(shell) = slot.as_ref() {
            return Some(Arc::clone(shell));
        }

        info!("Mounting the dashboard.");
        let shell = Arc::new(DashboardShell::new(
            Arc::clone(&self.auth),
            Arc::clone(&self.data),
        ));
        *slot = Some(Arc::clone(&shell));
        drop(slot);

        shell.load().await;
        Some(shell)
    }

    /// The mounted shell, if any, without mounting one.
    pub async fn dashboard(&self) -> Option<Arc<DashboardShell>> {
        self.dashboard.lock().await.clone()
    }
}
