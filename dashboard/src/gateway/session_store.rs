// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use common::Session;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

/// The signed-in session of the hosted backend, kept in memory and mirrored
/// to a JSON file so that it can be restored on the next start.
pub struct SessionStore {
    path: PathBuf,
    current: RwLock<Option<Session>>,
}

impl SessionStore {
    /// Opens the store backed by `path`, restoring any session saved there.
    /// A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let restored = load_session(&path).unwrap_or_else(|e| {
            warn!(
                "Could not restore session from {}: {:#}. Starting signed out.",
                path.display(),
                e
            );
            None
        });
        debug!(
            "Session store opened at {} (restored: {}).",
            path.display(),
            restored.is_some()
        );

        Self {
            path,
            current: RwLock::new(restored),
        }
    }

    pub fn get(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current
            .read()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    /// Replaces the current session and persists the change.
    pub fn set(&self, session: Option<Session>) {
        let mut current = self.current.write();
        *current = session;

        if let Err(e) = save_session(&self.path, current.as_ref()) {
            error!("Error saving session to {}: {:#}", self.path.display(), e);
        }
    }
}

fn load_session(path: &Path) -> Result<Option<Session>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let session = serde_json::from_str(&data).context("Failed to parse saved session")?;
    Ok(Some(session))
}

fn save_session(path: &Path, session: Option<&Session>) -> Result<()> {
    let Some(session) = session else {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        return Ok(());
    };

    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir)
        .with_context(|| format!("Failed to create {}", parent_dir.display()))?;

    // The file holds live tokens: owner-only, and replaced in one rename.
    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .context("Failed to create temporary session file")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp_file.path(), fs::Permissions::from_mode(0o600))
            .context("Failed to restrict session file permissions")?;
    }

    let data = serde_json::to_string_pretty(session)?;
    temp_file
        .write_all(data.as_bytes())
        .context("Failed to write temporary session file")?;
    temp_file
        .persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
