// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use common::{Credentials, Session, User};
use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, migrate::MigrateDatabase};
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{Collection, DataGateway, Record, Select, SessionGateway, validate_record};
use crate::error::AuthFailure;
use crate::session::{SessionEvents, SessionListener, Subscription};

const MIN_PASSWORD_LENGTH: usize = 6;

const SCHEMA: [(&str, &str); 4] = [
    (
        "clients",
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "task_categories",
        r#"
        CREATE TABLE IF NOT EXISTS task_categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            client_id TEXT NOT NULL REFERENCES clients(id)
        );
        "#,
    ),
    (
        "tasks",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            assignee TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL
        );
        "#,
    ),
    (
        "accounts",
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    ),
];

/// Timestamps are stored as fixed-width RFC 3339 text so that they sort
/// chronologically as strings.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures every table exists.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    let in_memory = database_url.contains(":memory:");

    if !in_memory && !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        if let Some(parent_dir) = database_file(database_url).and_then(Path::parent) {
            std::fs::create_dir_all(parent_dir)
                .with_context(|| format!("Failed to create {}", parent_dir.display()))?;
        }
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    // An in-memory database lives as long as its single connection.
    let options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
    };
    let pool = options
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Path of the database file named by a `sqlite:` URL.
fn database_file(database_url: &str) -> Option<&Path> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let file = rest.split('?').next()?;
    (!file.is_empty()).then(|| Path::new(file))
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    for (table, statement) in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create '{}' table", table))?;
        debug!("'{}' table is ready.", table);
    }
    Ok(())
}

fn row_to_record(row: &SqliteRow, columns: &[&str]) -> Result<Record> {
    let mut record = Record::new();
    for column in columns {
        let value: Option<String> = row
            .try_get(*column)
            .with_context(|| format!("Failed to read column '{}'", column))?;
        record.insert(column.to_string(), value.map_or(Value::Null, Value::String));
    }
    Ok(record)
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Data gateway over the local SQLite database.
pub struct LocalDataGateway {
    pool: SqlitePool,
}

impl LocalDataGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataGateway for LocalDataGateway {
    async fn select(&self, query: &Select) -> Result<Vec<Record>> {
        // Identifiers are checked against the collection before they are
        // spliced into the statement; values are always bound.
        query.validate()?;
        let columns = query.selected_columns();

        let mut sql = format!(
            "SELECT {} FROM {}",
            columns.join(", "),
            query.collection.table()
        );
        if let Some(filter) = &query.filter {
            sql.push_str(&format!(" WHERE {} = ?", filter.column));
        }
        if let Some(order) = query.order {
            let direction = if order.ascending { "ASC" } else { "DESC" };
            sql.push_str(&format!(" ORDER BY {} {}", order.column, direction));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        debug!("Select: {}", sql);

        let mut statement = sqlx::query(&sql);
        if let Some(filter) = &query.filter {
            statement = statement.bind(filter.value.as_str());
        }
        let rows = statement
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to select from '{}'", query.collection))?;

        rows.iter().map(|row| row_to_record(row, columns)).collect()
    }

    async fn insert(&self, collection: Collection, mut record: Record) -> Result<Vec<Record>> {
        validate_record(collection, &record)?;

        record
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        if collection.has_column("created_at") {
            record
                .entry("created_at")
                .or_insert_with(|| Value::String(now_timestamp()));
        }

        let columns: Vec<&str> = record.keys().map(String::as_str).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection.table(),
            columns.join(", "),
            placeholders
        );
        debug!("Insert: {}", sql);

        let mut statement = sqlx::query(&sql);
        for value in record.values() {
            statement = statement.bind(value_to_text(value));
        }
        statement
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert into '{}'", collection))?;

        Ok(vec![record])
    }
}

#[derive(sqlx::FromRow)]
struct Account {
    id: String,
    email: String,
    password_salt: String,
    password_hash: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Salted SHA-256. Good enough for a development backend, not for real
/// credentials.
fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Session gateway over the `accounts` table, for development without the
/// hosted backend. Not meant to hold real credentials.
///
/// Signing up never signs the user in, the same way the hosted backend
/// behaves when email confirmation is required. Sessions live in memory.
pub struct LocalSessionGateway {
    pool: SqlitePool,
    current: RwLock<Option<Session>>,
    events: SessionEvents,
}

impl LocalSessionGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            current: RwLock::new(None),
            events: SessionEvents::new(),
        }
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>> {
        sqlx::query_as::<_, Account>(
            "SELECT id, email, password_salt, password_hash FROM accounts WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up account")
    }

    fn set_session(&self, session: Option<Session>) {
        *self.current.write() = session.clone();
        self.events.emit(session.as_ref());
    }
}

fn storage_failure(err: anyhow::Error) -> AuthFailure {
    error!("Account storage error: {:#}", err);
    AuthFailure::new("Database error")
}

#[async_trait]
impl SessionGateway for LocalSessionGateway {
    async fn current_session(&self) -> Result<Option<Session>> {
        Ok(self.current.read().clone())
    }

    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.current.read().as_ref().map(|session| session.user.clone()))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<(), AuthFailure> {
        let email = normalize_email(&credentials.email);
        if email.is_empty() {
            return Err(AuthFailure::new("Anonymous sign-ups are disabled"));
        }
        if credentials.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthFailure::new(format!(
                "Password should be at least {} characters.",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.find_account(&email).await.map_err(storage_failure)?.is_some() {
            return Err(AuthFailure::new("User already registered"));
        }

        let salt = Uuid::new_v4().simple().to_string();
        sqlx::query(
            "INSERT INTO accounts (id, email, password_salt, password_hash, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(&salt)
        .bind(hash_password(&salt, &credentials.password))
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert account")
        .map_err(storage_failure)?;

        info!("Account created for {}", email);
        Ok(())
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<(), AuthFailure> {
        let email = normalize_email(&credentials.email);
        let account = self.find_account(&email).await.map_err(storage_failure)?;

        let Some(account) = account
            .filter(|a| a.password_hash == hash_password(&a.password_salt, &credentials.password))
        else {
            debug!("Rejected sign-in for {}", email);
            return Err(AuthFailure::new("Invalid login credentials"));
        };

        info!("Signed in as {}", account.email);
        self.set_session(Some(Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: account.id,
                email: Some(account.email),
            },
        }));
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthFailure> {
        info!("Signed out.");
        self.set_session(None);
        Ok(())
    }

    fn on_session_change(&self, listener: SessionListener) -> Subscription {
        self.events.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Client, NewClient, TaskCategory};
    use serde_json::json;

    /// Helper function to set up an in-memory SQLite database for testing.
    /// This creates a fresh, empty database for each test, ensuring they are isolated.
    async fn setup_test_db() -> SqlitePool {
        establish_connection_pool("sqlite::memory:").await.unwrap()
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_database_file_from_url() {
        assert_eq!(
            database_file("sqlite://database/sqlite.db"),
            Some(Path::new("database/sqlite.db"))
        );
        assert_eq!(
            database_file("sqlite:data.db?mode=rwc"),
            Some(Path::new("data.db"))
        );
        assert_eq!(database_file("postgres://x"), None);
    }

    #[tokio::test]
    async fn test_insert_and_select_client() {
        let gateway = LocalDataGateway::new(setup_test_db().await);

        let inserted = crate::gateway::insert(
            &gateway,
            &NewClient {
                name: "Acme".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(inserted.len(), 1);
        assert!(inserted[0].contains_key("id"));
        assert!(inserted[0].contains_key("created_at"));

        let clients: Vec<Client> =
            crate::gateway::fetch(&gateway, &Select::new(Collection::Clients))
                .await
                .unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].name, "Acme");
        assert!(clients[0].created_at.is_some());
    }

    #[tokio::test]
    async fn test_select_orders_filters_and_limits() {
        let gateway = LocalDataGateway::new(setup_test_db().await);
        for (id, name, created_at) in [
            ("c1", "Oldest", "2025-01-01T00:00:00.000000Z"),
            ("c2", "Middle", "2025-02-01T00:00:00.000000Z"),
            ("c3", "Newest", "2025-03-01T00:00:00.000000Z"),
        ] {
            gateway
                .insert(
                    Collection::Clients,
                    record(json!({ "id": id, "name": name, "created_at": created_at })),
                )
                .await
                .unwrap();
        }
        gateway
            .insert(
                Collection::TaskCategories,
                record(json!({ "id": "cat1", "name": "Design", "client_id": "c2" })),
            )
            .await
            .unwrap();

        let newest_first = gateway
            .select(
                &Select::new(Collection::Clients)
                    .columns(&["id", "name"])
                    .order("created_at", false)
                    .limit(2),
            )
            .await
            .unwrap();
        let names: Vec<&str> = newest_first
            .iter()
            .map(|row| row["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Newest", "Middle"]);
        assert!(!newest_first[0].contains_key("created_at"));

        let categories: Vec<TaskCategory> = crate::gateway::fetch(
            &gateway,
            &Select::new(Collection::TaskCategories)
                .columns(&["id", "name"])
                .where_eq("client_id", "c2"),
        )
        .await
        .unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Design");
        assert_eq!(categories[0].client_id, None);
    }

    #[tokio::test]
    async fn test_unknown_columns_are_rejected() {
        let gateway = LocalDataGateway::new(setup_test_db().await);

        let select = gateway
            .select(&Select::new(Collection::Clients).columns(&["id; DROP TABLE clients"]))
            .await;
        assert!(select.is_err());

        let insert = gateway
            .insert(Collection::Clients, record(json!({ "name": "x", "owner": "y" })))
            .await;
        assert!(insert.is_err());
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let gateway = LocalSessionGateway::new(setup_test_db().await);

        gateway
            .sign_up(&credentials("Ana@Example.com", "secret-pass"))
            .await
            .unwrap();
        // Signing up does not sign in.
        assert!(gateway.current_session().await.unwrap().is_none());

        gateway
            .sign_in_with_password(&credentials("ana@example.com", "secret-pass"))
            .await
            .unwrap();
        let user = gateway.current_user().await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("ana@example.com"));

        gateway.sign_out().await.unwrap();
        assert!(gateway.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_rejections() {
        let gateway = LocalSessionGateway::new(setup_test_db().await);

        let short = gateway.sign_up(&credentials("a@b.c", "123")).await;
        assert_eq!(
            short.unwrap_err().message,
            "Password should be at least 6 characters."
        );

        let anonymous = gateway.sign_up(&credentials("  ", "123456")).await;
        assert_eq!(anonymous.unwrap_err().message, "Anonymous sign-ups are disabled");

        gateway.sign_up(&credentials("a@b.c", "123456")).await.unwrap();
        let duplicate = gateway.sign_up(&credentials("A@B.C", "654321")).await;
        assert_eq!(duplicate.unwrap_err().message, "User already registered");
    }

    #[tokio::test]
    async fn test_same_password_gets_different_hashes() {
        let pool = setup_test_db().await;
        let gateway = LocalSessionGateway::new(pool.clone());
        gateway.sign_up(&credentials("a@b.c", "123456")).await.unwrap();
        gateway.sign_up(&credentials("d@e.f", "123456")).await.unwrap();

        let hashes: Vec<(String, String)> =
            sqlx::query_as("SELECT password_salt, password_hash FROM accounts")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(hashes.len(), 2);
        assert_ne!(hashes[0].0, hashes[1].0);
        assert_ne!(hashes[0].1, hashes[1].1);
        assert!(hashes.iter().all(|(_, hash)| hash != &hash_password("", "123456")));

        gateway
            .sign_in_with_password(&credentials("d@e.f", "123456"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sign_in_with_wrong_password() {
        let gateway = LocalSessionGateway::new(setup_test_db().await);
        gateway.sign_up(&credentials("a@b.c", "123456")).await.unwrap();

        let wrong = gateway
            .sign_in_with_password(&credentials("a@b.c", "1234567"))
            .await;
        assert_eq!(wrong.unwrap_err().message, "Invalid login credentials");

        let unknown = gateway
            .sign_in_with_password(&credentials("nobody@b.c", "123456"))
            .await;
        assert_eq!(unknown.unwrap_err().message, "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_sign_in_and_out_emit_changes() {
        let gateway = LocalSessionGateway::new(setup_test_db().await);
        gateway.sign_up(&credentials("a@b.c", "123456")).await.unwrap();

        let seen = std::sync::Arc::new(RwLock::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        let _subscription = gateway.on_session_change(std::sync::Arc::new(
            move |session: Option<&Session>| sink.write().push(session.is_some()),
        ));

        gateway
            .sign_in_with_password(&credentials("a@b.c", "123456"))
            .await
            .unwrap();
        gateway.sign_out().await.unwrap();

        assert_eq!(*seen.read(), vec![true, false]);
    }
}
