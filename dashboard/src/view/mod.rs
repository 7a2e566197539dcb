// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! View-models behind the rendered pages.
//!
//! Each view owns its state and its error handling. State sits behind a
//! `parking_lot` lock that is never held across an await; after every
//! gateway call a view checks its [`Lifecycle`] before writing anything.
pub mod app;
pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod header;
pub mod tasks;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether a view is still mounted. Cloned into callbacks and pending
/// fetches so they can drop their results once the view is gone.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    mounted: Arc<AtomicBool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
