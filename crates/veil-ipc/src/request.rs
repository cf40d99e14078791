// ── Inbound request set ──
//
// Every user intent a listener can forward to the service. The reply
// address for `RegisterListener` is transport metadata and rides the
// request envelope, not the message body.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A command sent from a client context to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Request {
    AddCustomDnsServer(IpAddr),
    Connect,
    CreateAccount,
    Disconnect,
    ExcludeApp(String),
    FetchAccountExpiry,
    FetchAuthToken,

    /// Hint that the given cached expiry is known stale (e.g. right
    /// after a voucher redemption) and must be re-fetched until it
    /// changes or the retry ceiling is hit.
    InvalidateAccountExpiry(#[serde(with = "veil_model::expiry::wire")] DateTime<Utc>),

    IncludeApp(String),
    Login(String),
    Logout,
    PersistExcludedApps,
    Reconnect,
    RegisterListener,
    RemoveAccountFromHistory(String),
    RemoveCustomDnsServer(IpAddr),
    ReplaceCustomDnsServer {
        old_server: IpAddr,
        new_server: IpAddr,
    },
    SetAllowLan(bool),
    SetCustomDnsEnabled(bool),
    SetSplitTunnelingEnabled(bool),
    SetWireguardMtu(Option<u16>),
    SubmitVoucher(String),
    WireguardGenerateKey,
    WireguardVerifyKey,
}
