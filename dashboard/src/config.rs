// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Loopback only: the process serves a single signed-in session to every
/// request it receives.
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_DB_URL: &str = "sqlite://database/sqlite.db";
pub const DEFAULT_SESSION_FILE: &str = "database/session.json";

/// Where sessions and records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// A managed auth + REST service.
    Hosted {
        url: String,
        api_key: String,
        session_file: PathBuf,
    },
    /// A SQLite file next to the binary.
    Local { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub backend: Backend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let addr = get("DASHBOARD_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let listen_addr = addr
            .parse()
            .with_context(|| format!("Invalid DASHBOARD_ADDR '{}'", addr))?;

        let backend = match (get("DASHBOARD_BACKEND_URL"), get("DASHBOARD_BACKEND_KEY")) {
            (Some(url), Some(api_key)) => Backend::Hosted {
                url: url.trim_end_matches('/').to_string(),
                api_key,
                session_file: get("DASHBOARD_SESSION_FILE")
                    .unwrap_or_else(|| DEFAULT_SESSION_FILE.to_string())
                    .into(),
            },
            (None, None) => Backend::Local {
                database_url: get("DASHBOARD_DB_URL")
                    .unwrap_or_else(|| DEFAULT_DB_URL.to_string()),
            },
            (Some(_), None) => {
                bail!("DASHBOARD_BACKEND_URL is set but DASHBOARD_BACKEND_KEY is missing")
            }
            (None, Some(_)) => {
                bail!("DASHBOARD_BACKEND_KEY is set but DASHBOARD_BACKEND_URL is missing")
            }
        };

        Ok(Self {
            listen_addr,
            backend,
        })
    }
}
