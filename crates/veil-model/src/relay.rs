// ── Relay list domain types ──

use serde::{Deserialize, Serialize};

/// The daemon's full relay catalogue, grouped geographically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayList {
    pub countries: Vec<RelayCountry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayCountry {
    pub name: String,
    pub code: String,
    pub cities: Vec<RelayCity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayCity {
    pub name: String,
    pub code: String,
    pub relays: Vec<Relay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    pub hostname: String,
    pub active: bool,
}
