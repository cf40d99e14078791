// ── App version info ──

use serde::{Deserialize, Serialize};

/// Upgrade guidance published by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersionInfo {
    /// Whether the running app version is still supported.
    pub current_is_supported: bool,

    /// Newest stable release.
    pub latest_stable: String,

    /// Newest release including betas.
    pub latest: String,
}
