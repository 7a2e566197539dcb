// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name given to the category shown for a client that has none yet.
pub const PLACEHOLDER_CATEGORY_NAME: &str = "General Tasks";

/// Prefix of every locally synthesized category id. Real ids never carry it.
pub const PLACEHOLDER_CATEGORY_PREFIX: &str = "default-";

/// Prefix of the ids of the demo tasks shown when the task list cannot be fetched.
pub const DEMO_TASK_PREFIX: &str = "demo-";

/// The authenticated identity behind a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        display_name(self.email.as_deref())
    }
}

/// Derives the name shown in the greeting from an email address.
///
/// The local part of the address is used with its first character upper-cased.
/// Without an email address the generic "User" is returned.
pub fn display_name(email: Option<&str>) -> String {
    let Some(email) = email.filter(|e| !e.is_empty()) else {
        return "User".to_string();
    };

    let local_part = email.split('@').next().unwrap_or_default();
    let mut chars = local_part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// An authenticated session as handed out by the session gateway.
///
/// Views only ever look at whether a session is present. The token fields
/// are used by the gateways themselves.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiry as unix seconds, when the backend reports one.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= now.timestamp())
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Email and password as typed into the auth form.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A client as read from the `clients` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Client {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Structure used to insert a client. Only the name is chosen by the user,
/// the backend assigns the id and the creation time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
}

/// A task category belonging to one client.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TaskCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

impl TaskCategory {
    /// The "General Tasks" category displayed for a client without categories.
    pub fn placeholder_for(client_id: &str) -> Entry<TaskCategory> {
        Entry::Synthesized(TaskCategory {
            id: format!("{PLACEHOLDER_CATEGORY_PREFIX}{client_id}"),
            name: PLACEHOLDER_CATEGORY_NAME.to_string(),
            client_id: Some(client_id.to_string()),
        })
    }
}

/// Status of a task as stored by the backend.
///
/// Unknown strings are kept verbatim so they survive a round trip and can
/// still be rendered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => TaskStatus::Pending,
            "in-progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            _ => TaskStatus::Other(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task as read from the `tasks` collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub assignee: String,
    pub status: TaskStatus,
}

impl Task {
    /// The two example tasks shown when the task list cannot be fetched.
    pub fn demo_fallback() -> Vec<Entry<Task>> {
        vec![
            Entry::Synthesized(Task {
                id: format!("{DEMO_TASK_PREFIX}1"),
                title: "Boost Weekly".to_string(),
                assignee: "Vikram Durga".to_string(),
                status: TaskStatus::InProgress,
            }),
            Entry::Synthesized(Task {
                id: format!("{DEMO_TASK_PREFIX}2"),
                title: "SQR".to_string(),
                assignee: "Vikram Durga".to_string(),
                status: TaskStatus::Completed,
            }),
        ]
    }
}

/// Distinguishes records read from the backend from the ones made up locally
/// for display.
///
/// `Entry` has no `Serialize` impl, so a synthesized record can be shown but
/// never written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<T> {
    Real(T),
    Synthesized(T),
}

impl<T> Entry<T> {
    pub fn get(&self) -> &T {
        match self {
            Entry::Real(value) | Entry::Synthesized(value) => value,
        }
    }

    pub fn as_real(&self) -> Option<&T> {
        match self {
            Entry::Real(value) => Some(value),
            Entry::Synthesized(_) => None,
        }
    }

    pub fn is_synthesized(&self) -> bool {
        matches!(self, Entry::Synthesized(_))
    }
}

/// Number of tasks per known status.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusCounts {
    /// Counts statuses by exact string equality. Anything that is not one of
    /// the three known statuses is ignored.
    pub fn tally<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
        statuses
            .into_iter()
            .fold(StatusCounts::default(), |mut counts, status| {
                match status {
                    "pending" => counts.pending += 1,
                    "in-progress" => counts.in_progress += 1,
                    "completed" => counts.completed += 1,
                    _ => {}
                }
                counts
            })
    }
}
