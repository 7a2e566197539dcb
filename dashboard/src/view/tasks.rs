// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use common::{Entry, Task, TaskStatus};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info};

use super::Lifecycle;
use crate::gateway::{self, Collection, DataGateway, Select};

/// Number of recent tasks requested for the "My Tasks" table.
pub const RECENT_TASKS_LIMIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Affirmative,
    Neutral,
    Cautionary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

/// Badge for a task status. Anything that is neither completed nor in
/// progress is shown as pending.
pub fn status_badge(status: &TaskStatus) -> StatusBadge {
    match status {
        TaskStatus::Completed => StatusBadge {
            label: "Completed",
            tone: BadgeTone::Affirmative,
        },
        TaskStatus::InProgress => StatusBadge {
            label: "In-Progress",
            tone: BadgeTone::Neutral,
        },
        TaskStatus::Pending | TaskStatus::Other(_) => StatusBadge {
            label: "Pending",
            tone: BadgeTone::Cautionary,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub assignee: String,
    pub badge: StatusBadge,
    pub is_demo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskListSnapshot {
    pub loading: bool,
    pub rows: Vec<TaskRow>,
}

struct TaskListFields {
    loading: bool,
    tasks: Vec<Entry<Task>>,
}

/// The "My Tasks" table on the home tab.
pub struct TaskList {
    data: Arc<dyn DataGateway>,
    state: RwLock<TaskListFields>,
    lifecycle: Lifecycle,
}

impl TaskList {
    pub fn new(data: Arc<dyn DataGateway>) -> Self {
        Self {
            data,
            state: RwLock::new(TaskListFields {
                loading: true,
                tasks: Vec::new(),
            }),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Fetches the most recent tasks. On failure the demo tasks are shown
    /// instead of an empty table.
    pub async fn load(&self) {
        let query = Select::new(Collection::Tasks)
            .columns(&["id", "title", "assignee", "status"])
            .order("created_at", false)
            .limit(RECENT_TASKS_LIMIT);
        let result = gateway::fetch::<Task>(self.data.as_ref(), &query).await;
        if !self.lifecycle.is_mounted() {
            return;
        }

        let tasks = match result {
            Ok(tasks) => {
                info!("Successfully retrieved {} tasks.", tasks.len());
                tasks.into_iter().map(Entry::Real).collect()
            }
            Err(e) => {
                error!("Error fetching tasks: {}", e);
                Task::demo_fallback()
            }
        };

        let mut state = self.state.write();
        state.tasks = tasks;
        state.loading = false;
    }

    pub fn unmount(&self) {
        self.lifecycle.unmount();
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn tasks(&self) -> Vec<Entry<Task>> {
        self.state.read().tasks.clone()
    }

    pub fn snapshot(&self) -> TaskListSnapshot {
        let state = self.state.read();
        TaskListSnapshot {
            loading: state.loading,
            rows: state
                .tasks
                .iter()
                .map(|entry| {
                    let task = entry.get();
                    TaskRow {
                        id: task.id.clone(),
                        title: task.title.clone(),
                        assignee: task.assignee.clone(),
                        badge: status_badge(&task.status),
                        is_demo: entry.is_synthesized(),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedDataGateway;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_status_badges() {
        assert_eq!(status_badge(&TaskStatus::Completed).tone, BadgeTone::Affirmative);
        assert_eq!(status_badge(&TaskStatus::InProgress).tone, BadgeTone::Neutral);
        assert_eq!(status_badge(&TaskStatus::Pending).tone, BadgeTone::Cautionary);

        let unknown = status_badge(&TaskStatus::Other("blocked".to_string()));
        assert_eq!(unknown.tone, BadgeTone::Cautionary);
        assert_eq!(unknown.label, "Pending");
    }

    #[tokio::test]
    async fn test_loads_two_most_recent_tasks() {
        let data = Arc::new(ScriptedDataGateway::new().await);
        data.seed_task("t1", "pending", "2025-01-01T00:00:00.000000Z").await;
        data.seed_task("t2", "completed", "2025-01-02T00:00:00.000000Z").await;
        data.seed_task("t3", "in-progress", "2025-01-03T00:00:00.000000Z").await;

        let list = TaskList::new(data);
        assert!(list.is_loading());
        list.load().await;

        assert!(!list.is_loading());
        let ids: Vec<String> = list.tasks().iter().map(|t| t.get().id.clone()).collect();
        assert_eq!(ids, vec!["t3", "t2"]);
        assert!(list.tasks().iter().all(|t| !t.is_synthesized()));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_demo_tasks() {
        let data = Arc::new(ScriptedDataGateway::failing().await);
        let list = TaskList::new(data);
        list.load().await;

        let snapshot = list.snapshot();
        assert!(!snapshot.loading);
        assert_eq!(snapshot.rows.len(), 2);
        assert_eq!(snapshot.rows[0].title, "Boost Weekly");
        assert_eq!(snapshot.rows[0].badge.label, "In-Progress");
        assert_eq!(snapshot.rows[1].title, "SQR");
        assert_eq!(snapshot.rows[1].badge.label, "Completed");
        assert!(snapshot.rows.iter().all(|row| row.is_demo));
    }

    #[tokio::test]
    async fn test_empty_result_is_not_replaced() {
        let data = Arc::new(ScriptedDataGateway::new().await);
        let list = TaskList::new(data);
        list.load().await;

        assert!(list.tasks().is_empty());
        assert!(!list.is_loading());
    }

    #[tokio::test]
    async fn test_unmounted_list_ignores_result() {
        let data = Arc::new(ScriptedDataGateway::new().await);
        data.seed_task("t1", "pending", "2025-01-01T00:00:00.000000Z").await;
        let list = TaskList::new(Arc::clone(&data) as Arc<dyn DataGateway>);

        list.unmount();
        list.load().await;

        assert_eq!(data.select_calls.load(Ordering::SeqCst), 1);
        assert!(list.is_loading());
        assert!(list.tasks().is_empty());
    }
}
