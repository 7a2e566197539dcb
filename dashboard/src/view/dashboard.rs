// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Local, Weekday};
use common::StatusCounts;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use super::Lifecycle;
use super::auth::AuthViewModel;
use super::clients::{ClientTree, ClientTreeSnapshot};
use super::header::{Header, HeaderSnapshot};
use super::tasks::{TaskList, TaskListSnapshot};
use crate::gateway::{self, Collection, DataGateway, Select};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Home,
    Inbox,
    Tasks,
    Chats,
    Calendar,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Home,
        Tab::Inbox,
        Tab::Tasks,
        Tab::Chats,
        Tab::Calendar,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Tab::Home => "home",
            Tab::Inbox => "inbox",
            Tab::Tasks => "tasks",
            Tab::Chats => "chats",
            Tab::Calendar => "calendar",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Home => "Home",
            Tab::Inbox => "Inbox",
            Tab::Tasks => "Tasks",
            Tab::Chats => "Chats",
            Tab::Calendar => "Calendar",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown tab '{0}'")]
pub struct UnknownTab(pub String);

impl FromStr for Tab {
    type Err = UnknownTab;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.id() == s)
            .ok_or_else(|| UnknownTab(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryCard {
    pub label: &'static str,
    pub count: usize,
    pub tone: &'static str,
}

/// The three cards under the greeting, in display order.
pub fn summary_cards(counts: StatusCounts) -> Vec<SummaryCard> {
    vec![
        SummaryCard {
            label: "Tasks To Do",
            count: counts.pending,
            tone: "blue",
        },
        SummaryCard {
            label: "Tasks Completed",
            count: counts.completed,
            tone: "green",
        },
        SummaryCard {
            label: "Tasks In-Progress",
            count: counts.in_progress,
            tone: "orange",
        },
    ]
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub id: &'static str,
    pub label: &'static str,
    pub active: bool,
}

/// Everything the sidebar renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarSnapshot {
    pub weekday: &'static str,
    pub items: Vec<NavItem>,
    /// Shown but not wired to anything.
    pub bottom_items: Vec<&'static str>,
}

pub fn sidebar(active: Tab, weekday: Weekday) -> SidebarSnapshot {
    SidebarSnapshot {
        weekday: weekday_name(weekday),
        items: Tab::ALL
            .into_iter()
            .map(|tab| NavItem {
                id: tab.id(),
                label: tab.label(),
                active: tab == active,
            })
            .collect(),
        bottom_items: vec!["Settings", "Help & Support"],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub active_tab: Tab,
    pub active_label: &'static str,
    pub sidebar: SidebarSnapshot,
    pub summary_cards: Vec<SummaryCard>,
    pub header: Option<HeaderSnapshot>,
    pub tasks: Option<TaskListSnapshot>,
    pub clients: ClientTreeSnapshot,
}

#[derive(Deserialize)]
struct StatusRow {
    status: Option<String>,
}

/// Views that only exist while the home tab is shown.
#[derive(Clone)]
struct HomeViews {
    header: Arc<Header>,
    tasks: Arc<TaskList>,
}

impl HomeViews {
    fn unmount(&self) {
        self.header.unmount();
        self.tasks.unmount();
    }
}

struct ShellFields {
    active_tab: Tab,
    counts: StatusCounts,
}

/// The signed-in page: sidebar, summary, task list and client panel.
pub struct DashboardShell {
    auth: Arc<AuthViewModel>,
    data: Arc<dyn DataGateway>,
    state: RwLock<ShellFields>,
    home: RwLock<Option<HomeViews>>,
    clients: Arc<ClientTree>,
    lifecycle: Lifecycle,
}

impl DashboardShell {
    pub fn new(auth: Arc<AuthViewModel>, data: Arc<dyn DataGateway>) -> Self {
        Self {
            auth,
            clients: Arc::new(ClientTree::new(Arc::clone(&data))),
            data,
            state: RwLock::new(ShellFields {
                active_tab: Tab::Home,
                counts: StatusCounts::default(),
            }),
            home: RwLock::new(None),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Runs the initial fetches of the home tab and the client panel.
    pub async fn load(&self) {
        tokio::join!(self.enter_home(), self.clients.load());
    }

    pub fn unmount(&self) {
        self.lifecycle.unmount();
        if let Some(home) = self.home.write().take() {
            home.unmount();
        }
        self.clients.unmount();
    }

    pub fn active_tab(&self) -> Tab {
        self.state.read().active_tab
    }

    pub fn counts(&self) -> StatusCounts {
        self.state.read().counts
    }

    pub fn clients(&self) -> &Arc<ClientTree> {
        &self.clients
    }

    pub fn task_list(&self) -> Option<Arc<TaskList>> {
        self.home.read().as_ref().map(|home| Arc::clone(&home.tasks))
    }

    /// Switches tab. Entering home re-fetches the statistics and re-mounts
    /// its views; selecting the tab already shown does nothing.
    pub async fn select_tab(&self, tab: Tab) {
        let previous = {
            let mut state = self.state.write();
            if state.active_tab == tab {
                return;
            }
            std::mem::replace(&mut state.active_tab, tab)
        };
        debug!("Switching tab from {} to {}", previous.id(), tab.id());

        if previous == Tab::Home {
            if let Some(home) = self.home.write().take() {
                home.unmount();
            }
        }
        if tab == Tab::Home {
            self.enter_home().await;
        }
    }

    async fn enter_home(&self) {
        if !self.lifecycle.is_mounted() {
            return;
        }
        let home = HomeViews {
            header: Arc::new(Header::new(Arc::clone(&self.auth))),
            tasks: Arc::new(TaskList::new(Arc::clone(&self.data))),
        };
        *self.home.write() = Some(home.clone());

        tokio::join!(self.refresh_stats(), home.header.load(), home.tasks.load());
    }

    /// Counts every task by status. On failure the previous counts stay.
    async fn refresh_stats(&self) {
        let query = Select::new(Collection::Tasks).columns(&["status"]);
        let result = gateway::fetch::<StatusRow>(self.data.as_ref(), &query).await;
        if !self.lifecycle.is_mounted() {
            return;
        }

        match result {
            Ok(rows) => {
                let counts =
                    StatusCounts::tally(rows.iter().filter_map(|row| row.status.as_deref()));
                info!(
                    "Task stats: {} pending, {} in progress, {} completed.",
                    counts.pending, counts.in_progress, counts.completed
                );
                self.state.write().counts = counts;
            }
            Err(e) => error!("Error fetching task stats: {}", e),
        }
    }

    /// Signs out through the auth view-model. The app root switches views
    /// once the session change arrives.
    pub async fn logout(&self) {
        // Failures are already logged by the auth view-model.
        let _ = self.auth.sign_out().await;
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let (active_tab, counts) = {
            let state = self.state.read();
            (state.active_tab, state.counts)
        };
        let home = self.home.read().clone();

        DashboardSnapshot {
            active_tab,
            active_label: active_tab.label(),
            sidebar: sidebar(active_tab, Local::now().weekday()),
            summary_cards: summary_cards(counts),
            header: home.as_ref().map(|home| home.header.snapshot()),
            tasks: home.as_ref().map(|home| home.tasks.snapshot()),
            clients: self.clients.snapshot(),
        }
    }
}
