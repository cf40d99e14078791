// veil-model: Domain types that cross the daemon and listener boundaries.

pub mod account;
pub mod expiry;
pub mod location;
pub mod relay;
pub mod settings;
pub mod tunnel;
pub mod version;
pub mod voucher;
pub mod wireguard;

// ── Primary re-exports ──────────────────────────────────────────────
pub use account::{AccountData, LoginStatus};
pub use expiry::{ExpiryParseError, format_expiry, parse_expiry};
pub use location::GeoLocation;
pub use relay::{Relay, RelayCity, RelayCountry, RelayList};
pub use settings::{
    Constraint, DnsOptions, LocationConstraint, RelayConstraints, RelaySettings, Settings,
    TunnelOptions, WireguardOptions,
};
pub use tunnel::{ActionAfterDisconnect, TunnelState};
pub use version::AppVersionInfo;
pub use voucher::{VoucherResult, VoucherSubmission};
pub use wireguard::{KeyStatus, WireguardKey};
