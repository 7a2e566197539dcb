// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Gateways with scripted behaviour for unit tests.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use common::{Credentials, Session, User};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio::sync::Notify;

use super::local::{LocalDataGateway, establish_connection_pool};
use super::{Collection, DataGateway, Record, Select, SessionGateway};
use crate::error::AuthFailure;
use crate::session::{SessionEvents, SessionListener, Subscription};

pub(crate) fn session_for(email: &str) -> Session {
    Session {
        access_token: format!("token-{email}"),
        refresh_token: None,
        expires_at: None,
        user: User {
            id: format!("id-{email}"),
            email: Some(email.to_string()),
        },
    }
}

/// Session gateway whose answers are set by the test.
#[derive(Default)]
pub(crate) struct FakeSessionGateway {
    pub session: RwLock<Option<Session>>,
    pub events: SessionEvents,
    /// When set, sign-in and sign-up fail with this message.
    pub reject_with: RwLock<Option<String>>,
    /// When set, `current_session` waits for a notification before answering.
    pub session_gate: Option<Arc<Notify>>,
    /// When set, sign-in and sign-up wait for a notification before answering.
    pub submit_gate: Option<Arc<Notify>>,
    pub fail_session_check: AtomicBool,
    pub sign_up_calls: AtomicUsize,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl FakeSessionGateway {
    pub fn signed_in(email: &str) -> Self {
        Self {
            session: RwLock::new(Some(session_for(email))),
            ..Self::default()
        }
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            reject_with: RwLock::new(Some(message.to_string())),
            ..Self::default()
        }
    }

    /// Simulates a change pushed by the backend (another tab, expiry, ...).
    pub fn push(&self, session: Option<Session>) {
        *self.session.write() = session.clone();
        self.events.emit(session.as_ref());
    }

    async fn wait_for_submit(&self) -> Result<(), AuthFailure> {
        if let Some(gate) = &self.submit_gate {
            gate.notified().await;
        }
        match self.reject_with.read().clone() {
            Some(message) => Err(AuthFailure::new(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionGateway for FakeSessionGateway {
    async fn current_session(&self) -> Result<Option<Session>> {
        if let Some(gate) = &self.session_gate {
            gate.notified().await;
        }
        if self.fail_session_check.load(Ordering::SeqCst) {
            return Err(anyhow!("auth service unreachable"));
        }
        Ok(self.session.read().clone())
    }

    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.session.read().as_ref().map(|s| s.user.clone()))
    }

    async fn sign_up(&self, _credentials: &Credentials) -> Result<(), AuthFailure> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_submit().await
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<(), AuthFailure> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_for_submit().await?;
        self.push(Some(session_for(&credentials.email)));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthFailure> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.push(None);
        Ok(())
    }

    fn on_session_change(&self, listener: SessionListener) -> Subscription {
        self.events.subscribe(listener)
    }
}

/// Local data gateway that can be told to fail.
pub(crate) struct ScriptedDataGateway {
    pub inner: LocalDataGateway,
    pub fail_selects: AtomicBool,
    pub fail_inserts: AtomicBool,
    pub select_calls: AtomicUsize,
}

impl ScriptedDataGateway {
    pub async fn new() -> Self {
        let pool = establish_connection_pool("sqlite::memory:").await.unwrap();
        Self {
            inner: LocalDataGateway::new(pool),
            fail_selects: AtomicBool::new(false),
            fail_inserts: AtomicBool::new(false),
            select_calls: AtomicUsize::new(0),
        }
    }

    pub async fn failing() -> Self {
        let gateway = Self::new().await;
        gateway.fail_selects.store(true, Ordering::SeqCst);
        gateway.fail_inserts.store(true, Ordering::SeqCst);
        gateway
    }

    pub async fn seed(&self, collection: Collection, row: Value) {
        let Value::Object(record) = row else {
            panic!("seed rows must be objects");
        };
        self.inner.insert(collection, record).await.unwrap();
    }

    pub async fn seed_task(&self, id: &str, status: &str, created_at: &str) {
        self.seed(
            Collection::Tasks,
            json!({
                "id": id,
                "title": format!("Task {id}"),
                "assignee": "Ana",
                "status": status,
                "created_at": created_at,
            }),
        )
        .await;
    }
}

#[async_trait]
impl DataGateway for ScriptedDataGateway {
    async fn select(&self, query: &Select) -> Result<Vec<Record>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_selects.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        self.inner.select(query).await
    }

    async fn insert(&self, collection: Collection, record: Record) -> Result<Vec<Record>> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(anyhow!("backend unavailable"));
        }
        self.inner.insert(collection, record).await
    }
}
