// ── Daemon settings domain types ──
//
// A `Settings` value is a full snapshot of the daemon's persisted
// configuration. The service-side settings cache compares individual
// fields between snapshots to derive narrow change notifications.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Full settings snapshot from the daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// The configured account number, if logged in.
    pub account_number: Option<String>,

    /// Whether traffic to the local network bypasses the tunnel.
    pub allow_lan: bool,

    /// Relay selection constraints.
    pub relay_settings: RelaySettings,

    /// Per-tunnel options.
    pub tunnel_options: TunnelOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelOptions {
    pub wireguard: WireguardOptions,
    pub dns_options: DnsOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireguardOptions {
    /// Tunnel MTU override; `None` uses the daemon default.
    pub mtu: Option<u16>,
}

/// Custom DNS configuration: an ordered server list plus an enable flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsOptions {
    pub custom: bool,
    pub addresses: Vec<IpAddr>,
}

/// Relay selection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelaySettings {
    Normal(RelayConstraints),
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::Normal(RelayConstraints::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConstraints {
    pub location: Constraint<LocationConstraint>,
}

/// A constraint that is either unrestricted or pinned to one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint<T> {
    Any,
    Only(T),
}

// Manual impl: `Any` needs no `T: Default`.
impl<T> Default for Constraint<T> {
    fn default() -> Self {
        Self::Any
    }
}

impl<T> Constraint<T> {
    pub fn as_only(&self) -> Option<&T> {
        match self {
            Self::Any => None,
            Self::Only(value) => Some(value),
        }
    }
}

/// Geographic narrowing of relay selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationConstraint {
    Country {
        country: String,
    },
    City {
        country: String,
        city: String,
    },
    Hostname {
        country: String,
        city: String,
        hostname: String,
    },
}
