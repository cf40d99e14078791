// ── Tunnel state ──

use serde::{Deserialize, Serialize};

use crate::location::GeoLocation;

/// Externally observable state of the daemon's tunnel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelState {
    Disconnected,
    Connecting { location: Option<GeoLocation> },
    Connected { location: Option<GeoLocation> },
    Disconnecting { after_disconnect: ActionAfterDisconnect },
    Error { is_blocking: bool },
}

impl Default for TunnelState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// What the daemon does once the current disconnect completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionAfterDisconnect {
    Nothing,
    Block,
    Reconnect,
}
