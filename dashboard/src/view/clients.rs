// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::sync::Arc;

use common::{Client, Entry, NewClient, TaskCategory};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info};

use super::Lifecycle;
use crate::error::DashboardError;
use crate::gateway::{self, Collection, DataGateway, Select};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryNode {
    pub category: Entry<TaskCategory>,
    /// Never filled in from task records, so it stays at zero.
    pub task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientNode {
    pub id: String,
    pub name: String,
    pub categories: Vec<CategoryNode>,
    pub is_expanded: bool,
}

impl ClientNode {
    /// Builds an expanded node, substituting the placeholder category when
    /// the client has none.
    pub fn new(client: Client, categories: Vec<TaskCategory>) -> Self {
        let mut categories: Vec<Entry<TaskCategory>> =
            categories.into_iter().map(Entry::Real).collect();
        if categories.is_empty() {
            categories.push(TaskCategory::placeholder_for(&client.id));
        }

        Self {
            id: client.id,
            name: client.name,
            categories: categories
                .into_iter()
                .map(|category| CategoryNode {
                    category,
                    task_count: 0,
                })
                .collect(),
            is_expanded: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    pub id: String,
    pub name: String,
    pub task_count: usize,
    pub is_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientView {
    pub id: String,
    pub name: String,
    pub is_expanded: bool,
    pub categories: Vec<CategoryView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientTreeSnapshot {
    pub loading: bool,
    pub is_adding: bool,
    pub new_client_name: String,
    pub clients: Vec<ClientView>,
}

struct TreeFields {
    loading: bool,
    clients: Vec<ClientNode>,
    is_adding: bool,
    new_client_name: String,
}

/// Fetches clients newest first, then the categories of each client.
async fn fetch_tree(data: &dyn DataGateway) -> Result<Vec<ClientNode>, DashboardError> {
    let clients: Vec<Client> = gateway::fetch(
        data,
        &Select::new(Collection::Clients)
            .columns(&["id", "name"])
            .order("created_at", false),
    )
    .await?;

    let mut nodes = Vec::with_capacity(clients.len());
    for client in clients {
        let categories: Vec<TaskCategory> = gateway::fetch(
            data,
            &Select::new(Collection::TaskCategories)
                .columns(&["id", "name"])
                .where_eq("client_id", client.id.as_str()),
        )
        .await?;
        nodes.push(ClientNode::new(client, categories));
    }
    Ok(nodes)
}

/// The client panel: a client/category tree and the "add client" form.
pub struct ClientTree {
    data: Arc<dyn DataGateway>,
    state: RwLock<TreeFields>,
    lifecycle: Lifecycle,
}

impl ClientTree {
    pub fn new(data: Arc<dyn DataGateway>) -> Self {
        Self {
            data,
            state: RwLock::new(TreeFields {
                loading: true,
                clients: Vec::new(),
                is_adding: false,
                new_client_name: String::new(),
            }),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Re-fetches the whole tree. A failure keeps the previous tree.
    pub async fn load(&self) {
        let result = fetch_tree(self.data.as_ref()).await;
        if !self.lifecycle.is_mounted() {
            return;
        }

        let mut state = self.state.write();
        match result {
            Ok(clients) => {
                info!("Successfully retrieved {} clients.", clients.len());
                state.clients = clients;
            }
            Err(e) => error!("Error fetching clients: {}", e),
        }
        state.loading = false;
    }

    pub fn unmount(&self) {
        self.lifecycle.unmount();
    }

    /// Flips the expansion of one client. Returns false when no client has
    /// that id.
    pub fn toggle(&self, client_id: &str) -> bool {
        let mut state = self.state.write();
        match state.clients.iter_mut().find(|client| client.id == client_id) {
            Some(client) => {
                client.is_expanded = !client.is_expanded;
                true
            }
            None => false,
        }
    }

    pub fn toggle_add_form(&self) {
        let mut state = self.state.write();
        state.is_adding = !state.is_adding;
    }

    pub fn cancel_add(&self) {
        let mut state = self.state.write();
        state.is_adding = false;
        state.new_client_name.clear();
    }

    /// Inserts a client and reloads the tree. Blank names are ignored.
    /// Returns whether the client was added.
    pub async fn add_client(&self, name: &str) -> bool {
        if name.trim().is_empty() {
            debug!("Ignoring blank client name.");
            return false;
        }
        self.state.write().new_client_name = name.to_string();

        let result = gateway::insert(
            self.data.as_ref(),
            &NewClient {
                name: name.to_string(),
            },
        )
        .await;
        if !self.lifecycle.is_mounted() {
            return result.is_ok();
        }

        match result {
            Ok(_) => {
                info!("Client '{}' added.", name);
                {
                    let mut state = self.state.write();
                    state.new_client_name.clear();
                    state.is_adding = false;
                }
                self.load().await;
                true
            }
            Err(e) => {
                error!("Error adding client: {}", e);
                false
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn clients(&self) -> Vec<ClientNode> {
        self.state.read().clients.clone()
    }

    pub fn snapshot(&self) -> ClientTreeSnapshot {
        let state = self.state.read();
        ClientTreeSnapshot {
            loading: state.loading,
            is_adding: state.is_adding,
            new_client_name: state.new_client_name.clone(),
            clients: state
                .clients
                .iter()
                .map(|client| ClientView {
                    id: client.id.clone(),
                    name: client.name.clone(),
                    is_expanded: client.is_expanded,
                    categories: client
                        .categories
                        .iter()
                        .map(|node| CategoryView {
                            id: node.category.get().id.clone(),
                            name: node.category.get().name.clone(),
                            task_count: node.task_count,
                            is_placeholder: node.category.is_synthesized(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedDataGateway;
    use common::PLACEHOLDER_CATEGORY_NAME;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn client(id: &str, name: &str) -> Client {
        Client {
            id: id.to_string(),
            name: name.to_string(),
            created_at: None,
        }
    }

    async fn seeded() -> Arc<ScriptedDataGateway> {
        let data = Arc::new(ScriptedDataGateway::new().await);
        data.seed(
            Collection::Clients,
            json!({ "id": "c1", "name": "Acme", "created_at": "2025-01-01T00:00:00.000000Z" }),
        )
        .await;
        data.seed(
            Collection::Clients,
            json!({ "id": "c2", "name": "Globex", "created_at": "2025-02-01T00:00:00.000000Z" }),
        )
        .await;
        data.seed(
            Collection::TaskCategories,
            json!({ "id": "k1", "name": "Design", "client_id": "c1" }),
        )
        .await;
        data.seed(
            Collection::TaskCategories,
            json!({ "id": "k2", "name": "Billing", "client_id": "c1" }),
        )
        .await;
        data
    }

    #[test]
    fn test_client_without_categories_gets_placeholder() {
        let node = ClientNode::new(client("c9", "Initech"), Vec::new());

        assert_eq!(node.categories.len(), 1);
        let placeholder = &node.categories[0];
        assert!(placeholder.category.is_synthesized());
        assert_eq!(placeholder.category.get().name, PLACEHOLDER_CATEGORY_NAME);
        assert_eq!(placeholder.category.get().id, "default-c9");
        assert_eq!(placeholder.task_count, 0);
        assert!(node.is_expanded);
    }

    #[test]
    fn test_real_categories_are_kept() {
        let node = ClientNode::new(
            client("c1", "Acme"),
            vec![TaskCategory {
                id: "k1".to_string(),
                name: "Design".to_string(),
                client_id: None,
            }],
        );
        assert_eq!(node.categories.len(), 1);
        assert!(!node.categories[0].category.is_synthesized());
    }

    #[tokio::test]
    async fn test_load_builds_tree_newest_first() {
        let tree = ClientTree::new(seeded().await);
        assert!(tree.is_loading());
        tree.load().await;

        let clients = tree.clients();
        assert!(!tree.is_loading());
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].name, "Globex");
        assert_eq!(clients[0].categories.len(), 1);
        assert!(clients[0].categories[0].category.is_synthesized());
        assert_eq!(clients[1].name, "Acme");
        assert_eq!(clients[1].categories.len(), 2);
        assert!(clients.iter().all(|c| c.is_expanded));
        assert!(
            clients
                .iter()
                .flat_map(|c| &c.categories)
                .all(|k| k.task_count == 0)
        );
    }

    #[tokio::test]
    async fn test_toggle_is_local_to_one_client() {
        let tree = ClientTree::new(seeded().await);
        tree.load().await;

        assert!(tree.toggle("c1"));
        let clients = tree.clients();
        assert!(!clients.iter().find(|c| c.id == "c1").unwrap().is_expanded);
        assert!(clients.iter().find(|c| c.id == "c2").unwrap().is_expanded);

        assert!(tree.toggle("c1"));
        assert!(tree.clients().iter().all(|c| c.is_expanded));

        assert!(!tree.toggle("missing"));
    }

    #[tokio::test]
    async fn test_add_client_refetches_tree() {
        let data = seeded().await;
        let tree = ClientTree::new(Arc::clone(&data) as Arc<dyn DataGateway>);
        tree.load().await;
        tree.toggle("c1");
        tree.toggle_add_form();
        let selects_before = data.select_calls.load(Ordering::SeqCst);

        assert!(tree.add_client("Umbrella").await);

        let snapshot = tree.snapshot();
        assert!(!snapshot.is_adding);
        assert_eq!(snapshot.new_client_name, "");
        assert_eq!(snapshot.clients.len(), 3);
        assert_eq!(snapshot.clients[0].name, "Umbrella");
        assert!(snapshot.clients[0].categories[0].is_placeholder);
        // A full re-fetch resets local expansion state.
        assert!(snapshot.clients.iter().all(|c| c.is_expanded));
        // One clients query plus one categories query per client.
        assert_eq!(data.select_calls.load(Ordering::SeqCst) - selects_before, 4);
    }

    #[tokio::test]
    async fn test_blank_name_is_ignored() {
        let data = seeded().await;
        let tree = ClientTree::new(Arc::clone(&data) as Arc<dyn DataGateway>);
        tree.load().await;
        tree.toggle_add_form();

        assert!(!tree.add_client("   ").await);
        assert!(tree.snapshot().is_adding);
        assert_eq!(tree.clients().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_state_unchanged() {
        let data = seeded().await;
        let tree = ClientTree::new(Arc::clone(&data) as Arc<dyn DataGateway>);
        tree.load().await;
        tree.toggle_add_form();
        data.fail_inserts.store(true, Ordering::SeqCst);

        assert!(!tree.add_client("Umbrella").await);

        let snapshot = tree.snapshot();
        assert!(snapshot.is_adding);
        assert_eq!(snapshot.new_client_name, "Umbrella");
        assert_eq!(snapshot.clients.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_tree() {
        let data = seeded().await;
        let tree = ClientTree::new(Arc::clone(&data) as Arc<dyn DataGateway>);
        tree.load().await;

        data.fail_selects.store(true, Ordering::SeqCst);
        tree.load().await;

        assert_eq!(tree.clients().len(), 2);
        assert!(!tree.is_loading());
    }

    #[tokio::test]
    async fn test_failed_first_fetch_ends_loading_empty() {
        let tree = ClientTree::new(Arc::new(ScriptedDataGateway::failing().await));
        tree.load().await;

        assert!(!tree.is_loading());
        assert!(tree.clients().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_clears_draft() {
        let tree = ClientTree::new(Arc::new(ScriptedDataGateway::failing().await));
        tree.toggle_add_form();
        tree.add_client("Draft").await;

        tree.cancel_add();

        let snapshot = tree.snapshot();
        assert!(!snapshot.is_adding);
        assert_eq!(snapshot.new_client_name, "");
    }
}
