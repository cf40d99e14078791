// ── Account domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account data as reported by the daemon.
///
/// The expiry is carried in the fixed wire format (see [`crate::expiry`])
/// and parsed by the consumer; a malformed value is a failed fetch
/// attempt, not a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub expiry: String,
}

/// The currently logged-in account, if any, as observed by listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStatus {
    /// The account number.
    pub account: String,

    /// Expiry of the account, or `None` while still unknown. Crosses
    /// the wire in the fixed timestamp format.
    #[serde(with = "crate::expiry::wire_opt")]
    pub expiry: Option<DateTime<Utc>>,

    /// Whether this account was created from this device and has not
    /// been used anywhere else yet.
    pub is_new: bool,
}
