// ── Outbound event set ──
//
// Every externally observable state transition the service can report.
// An `Option` payload uses `None` for "unknown / not available" — a
// valid, distinct value that listeners must handle.

use serde::{Deserialize, Serialize};
use strum::EnumDiscriminants;

use veil_model::{
    AppVersionInfo, GeoLocation, KeyStatus, LoginStatus, RelayList, Settings, TunnelState,
    VoucherResult,
};

/// A state transition pushed to every registered listener.
///
/// [`EventKind`] is the payload-free discriminant used to key handler
/// registrations on the client side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Hash))]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    AccountHistory(Option<Vec<String>>),
    AppVersionInfo(Option<AppVersionInfo>),
    AuthToken(Option<String>),
    CurrentVersion(Option<String>),

    /// Sentinel closing a freshly registered listener's state snapshot.
    /// Carries no payload.
    ListenerReady,

    LoginStatus(Option<LoginStatus>),
    NewLocation(Option<GeoLocation>),
    NewRelayList(Option<RelayList>),
    SettingsUpdate(Option<Settings>),
    SplitTunnelingUpdate(Option<Vec<String>>),
    TunnelStateChange(TunnelState),
    VoucherSubmissionResult {
        voucher: String,
        result: VoucherResult,
    },
    WireguardKeyStatus(Option<KeyStatus>),
}

impl Event {
    /// The discriminant this event dispatches on.
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }
}
