// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Seams to the managed backend.
//!
//! [`SessionGateway`] covers authentication and the session-change stream,
//! [`DataGateway`] covers reads and inserts over the three collections the
//! dashboard knows about. Both have a hosted implementation (HTTP) and a
//! local one (SQLite).
pub mod hosted;
pub mod local;
pub mod session_store;
#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use common::{Credentials, NewClient, Session, User};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Backend;
use crate::error::{AuthFailure, DashboardError};
use crate::session::{SessionListener, Subscription};

/// One row as exchanged with the data gateway, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// The collections the dashboard reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Clients,
    TaskCategories,
    Tasks,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Collection::Clients => "clients",
            Collection::TaskCategories => "task_categories",
            Collection::Tasks => "tasks",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Collection::Clients => &["id", "name", "created_at"],
            Collection::TaskCategories => &["id", "name", "client_id"],
            Collection::Tasks => &["id", "title", "assignee", "status", "created_at"],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().iter().any(|known| *known == column)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

/// A read over one collection.
///
/// ```
/// use dashboard::gateway::{Collection, Select};
///
/// let query = Select::new(Collection::Tasks)
///     .columns(&["id", "title", "assignee", "status"])
///     .order("created_at", false)
///     .limit(2);
/// assert!(query.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub collection: Collection,
    pub columns: Vec<&'static str>,
    pub filter: Option<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            columns: Vec::new(),
            filter: None,
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<String>) -> Self {
        self.filter = Some(Filter {
            column,
            value: value.into(),
        });
        self
    }

    pub fn order(mut self, column: &'static str, ascending: bool) -> Self {
        self.order = Some(Order { column, ascending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The requested columns, or every column of the collection when none
    /// were named.
    pub fn selected_columns(&self) -> &[&'static str] {
        if self.columns.is_empty() {
            self.collection.columns()
        } else {
            &self.columns
        }
    }

    /// Rejects any column the collection does not have.
    pub fn validate(&self) -> Result<()> {
        let referenced = self
            .selected_columns()
            .iter()
            .copied()
            .chain(self.filter.as_ref().map(|filter| filter.column))
            .chain(self.order.map(|order| order.column));

        for column in referenced {
            if !self.collection.has_column(column) {
                bail!(
                    "Unknown column '{}' for collection '{}'",
                    column,
                    self.collection
                );
            }
        }
        Ok(())
    }
}

/// Rejects a record carrying a column the collection does not have.
pub fn validate_record(collection: Collection, record: &Record) -> Result<()> {
    if let Some(column) = record.keys().find(|key| !collection.has_column(key)) {
        bail!(
            "Unknown column '{}' for collection '{}'",
            column,
            collection
        );
    }
    Ok(())
}

/// Authentication against the managed backend.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>>;

    async fn current_user(&self) -> Result<Option<User>>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthFailure>;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<(), AuthFailure>;

    async fn sign_out(&self) -> Result<(), AuthFailure>;

    /// Registers a listener for every later session change.
    fn on_session_change(&self, listener: SessionListener) -> Subscription;
}

/// Reads and inserts over the dashboard's collections.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn select(&self, query: &Select) -> Result<Vec<Record>>;

    /// Inserts one record and returns the stored representation.
    async fn insert(&self, collection: Collection, record: Record) -> Result<Vec<Record>>;
}

/// A record type the dashboard is allowed to write.
pub trait Insertable: Serialize {
    const COLLECTION: Collection;
}

impl Insertable for NewClient {
    const COLLECTION: Collection = Collection::Clients;
}

/// Runs `query` and decodes every row into `T`.
pub async fn fetch<T: DeserializeOwned>(
    gateway: &dyn DataGateway,
    query: &Select,
) -> Result<Vec<T>, DashboardError> {
    let rows = gateway
        .select(query)
        .await
        .map_err(|err| DashboardError::fetch(query.collection, err))?;

    rows.into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)))
        .collect::<Result<Vec<T>, _>>()
        .context("Failed to decode rows")
        .map_err(|err| DashboardError::fetch(query.collection, err))
}

/// Inserts a typed record into its collection.
pub async fn insert<T: Insertable>(
    gateway: &dyn DataGateway,
    value: &T,
) -> Result<Vec<Record>, DashboardError> {
    let record = match serde_json::to_value(value) {
        Ok(Value::Object(record)) => record,
        Ok(other) => {
            return Err(DashboardError::insert(
                T::COLLECTION,
                anyhow::anyhow!("Expected an object, got {}", other),
            ));
        }
        Err(err) => return Err(DashboardError::insert(T::COLLECTION, err.into())),
    };

    gateway
        .insert(T::COLLECTION, record)
        .await
        .map_err(|err| DashboardError::insert(T::COLLECTION, err))
}

/// The pair of gateways the application runs against.
pub struct Gateways {
    pub session: Arc<dyn SessionGateway>,
    pub data: Arc<dyn DataGateway>,
}

/// Builds the gateways for the configured backend.
pub async fn connect(backend: &Backend) -> Result<Gateways> {
    match backend {
        Backend::Hosted {
            url,
            api_key,
            session_file,
        } => {
            let (session, data) = hosted::connect(url, api_key, session_file)?;
            Ok(Gateways {
                session: Arc::new(session),
                data: Arc::new(data),
            })
        }
        Backend::Local { database_url } => {
            let pool = local::establish_connection_pool(database_url).await?;
            Ok(Gateways {
                session: Arc::new(local::LocalSessionGateway::new(pool.clone())),
                data: Arc::new(local::LocalDataGateway::new(pool)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_defaults_to_every_column() {
        let query = Select::new(Collection::Clients);
        assert_eq!(query.selected_columns(), &["id", "name", "created_at"]);
    }

    #[test]
    fn test_validate_rejects_unknown_columns() {
        let bad_column = Select::new(Collection::Tasks).columns(&["id", "secret"]);
        assert!(bad_column.validate().is_err());

        let bad_filter = Select::new(Collection::TaskCategories).where_eq("owner", "x");
        assert!(bad_filter.validate().is_err());

        let bad_order = Select::new(Collection::TaskCategories).order("created_at", false);
        assert!(bad_order.validate().is_err());

        let good = Select::new(Collection::TaskCategories)
            .columns(&["id", "name"])
            .where_eq("client_id", "c1");
        assert!(good.validate().is_ok());
    }

    #[test]
    fn test_validate_record() {
        let mut record = Record::new();
        record.insert("name".to_string(), json!("Acme"));
        assert!(validate_record(Collection::Clients, &record).is_ok());

        record.insert("client_id".to_string(), json!("c1"));
        assert!(validate_record(Collection::Clients, &record).is_err());
    }

    #[test]
    fn test_new_client_targets_clients() {
        assert_eq!(NewClient::COLLECTION, Collection::Clients);
    }
}
