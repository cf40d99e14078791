// ── Geographical location ──

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

/// A resolved or partially-known geographical location.
///
/// Partial values occur when a location is derived from a relay
/// constraint rather than a lookup — only the constrained fields are
/// populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub hostname: Option<String>,
}

impl GeoLocation {
    /// Location known only down to a country code.
    pub fn country(code: impl Into<String>) -> Self {
        Self {
            country: Some(code.into()),
            ..Self::default()
        }
    }

    /// Location known down to a city code.
    pub fn city(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: Some(country.into()),
            city: Some(city.into()),
            ..Self::default()
        }
    }

    /// Location pinned to a single relay host.
    pub fn hostname(
        country: impl Into<String>,
        city: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            country: Some(country.into()),
            city: Some(city.into()),
            hostname: Some(hostname.into()),
            ..Self::default()
        }
    }
}
