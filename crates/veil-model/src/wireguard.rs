// ── WireGuard key status ──

use serde::{Deserialize, Serialize};

/// Result of the most recent key generation or verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyStatus {
    NewKey(WireguardKey),
    TooManyKeys,
    GenerationFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireguardKey {
    /// Base64-encoded public key.
    pub public_key: String,

    /// Whether the daemon has confirmed the key is registered with the
    /// relay infrastructure; `None` while unverified.
    pub verified: Option<bool>,
}
