//! Offline mode detection and state management.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// Online and connected to the API.
    Online,
    /// Offline (network unreachable or API unavailable).
    Offline,
}

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("client is offline; operation requires network connection")]
    Offline,
}

/// Shared connectivity flag.
///
/// Starts online. Cheap to share behind an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct OfflineMode {
    offline: AtomicBool,
}

impl OfflineMode {
    pub fn new() -> Self {
        Self {
            offline: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        if self.is_offline() {
            ConnectivityState::Offline
        } else {
            ConnectivityState::Online
        }
    }

    /// Mark the client as offline.
    pub fn set_offline(&self) {
        if !self.offline.swap(true, Ordering::SeqCst) {
            tracing::info!("connectivity lost; switching to offline mode");
        }
    }

    /// Mark the client as online.
    pub fn set_online(&self) {
        if self.offline.swap(false, Ordering::SeqCst) {
            tracing::info!("connectivity restored");
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Ensure the client is online; return error if offline.
    pub fn require_online(&self) -> Result<(), OfflineError> {
        if self.is_offline() {
            Err(OfflineError::Offline)
        } else {
            Ok(())
        }
    }
}

impl Default for OfflineMode {
    fn default() -> Self {
        Self::new()
    }
}
