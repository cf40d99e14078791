// ── The tunnel daemon boundary ──
//
// The daemon's tunnel and cryptographic internals are not part of this
// repository; the caches consume it through this trait. The handle is
// a single shared, possibly-absent resource — callers wait for it to
// attach rather than fail, and all simultaneous waiters resume
// together.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use veil_model::{
    AccountData, AppVersionInfo, Constraint, DnsOptions, GeoLocation, KeyStatus,
    LocationConstraint, RelayList, Settings, TunnelState, VoucherResult,
};
use veil_sync::AwaitCell;

/// An RPC against the daemon failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DaemonRpcError {
    /// The account the call referred to does not exist. Terminal for
    /// an expiry fetch — never retried.
    #[error("account is invalid")]
    InvalidAccount,

    #[error("daemon call failed: {0}")]
    Rpc(String),
}

/// The daemon surface the caches rely on: blocking RPCs plus push
/// streams for the state the daemon changes on its own.
#[async_trait]
pub trait TunnelDaemon: Send + Sync {
    // ── Account ──────────────────────────────────────────────────
    async fn create_account(&self) -> Result<(), DaemonRpcError>;
    async fn set_account(&self, account: Option<String>) -> Result<(), DaemonRpcError>;
    async fn get_account_data(&self, account: &str) -> Result<AccountData, DaemonRpcError>;
    async fn get_account_history(&self) -> Result<Vec<String>, DaemonRpcError>;
    async fn remove_account_from_history(&self, account: &str) -> Result<(), DaemonRpcError>;
    async fn get_www_auth_token(&self) -> Result<String, DaemonRpcError>;
    async fn submit_voucher(&self, voucher: &str) -> Result<VoucherResult, DaemonRpcError>;

    // ── Settings ─────────────────────────────────────────────────
    async fn get_settings(&self) -> Result<Settings, DaemonRpcError>;
    async fn set_allow_lan(&self, allow: bool) -> Result<(), DaemonRpcError>;
    async fn set_wireguard_mtu(&self, mtu: Option<u16>) -> Result<(), DaemonRpcError>;
    async fn set_dns_options(&self, options: DnsOptions) -> Result<(), DaemonRpcError>;
    async fn update_relay_location(
        &self,
        location: Constraint<LocationConstraint>,
    ) -> Result<(), DaemonRpcError>;

    // ── Relays and location ──────────────────────────────────────
    async fn get_relay_locations(&self) -> Result<RelayList, DaemonRpcError>;
    async fn get_current_location(&self) -> Result<Option<GeoLocation>, DaemonRpcError>;

    // ── Tunnel control ───────────────────────────────────────────
    async fn connect_tunnel(&self) -> Result<(), DaemonRpcError>;
    async fn disconnect_tunnel(&self) -> Result<(), DaemonRpcError>;
    async fn reconnect_tunnel(&self) -> Result<(), DaemonRpcError>;

    // ── WireGuard keys ───────────────────────────────────────────
    async fn generate_wireguard_key(&self) -> Result<KeyStatus, DaemonRpcError>;
    async fn verify_wireguard_key(&self) -> Result<bool, DaemonRpcError>;

    // ── Versions ─────────────────────────────────────────────────
    async fn get_current_version(&self) -> Result<String, DaemonRpcError>;
    async fn get_version_info(&self) -> Result<AppVersionInfo, DaemonRpcError>;

    // ── Push streams ─────────────────────────────────────────────
    fn settings_changes(&self) -> broadcast::Receiver<Settings>;
    fn tunnel_state_changes(&self) -> broadcast::Receiver<TunnelState>;
    fn relay_list_changes(&self) -> broadcast::Receiver<RelayList>;
    fn key_events(&self) -> broadcast::Receiver<KeyStatus>;
    fn version_info_changes(&self) -> broadcast::Receiver<AppVersionInfo>;
}

pub type DaemonHandle = Arc<dyn TunnelDaemon>;

/// The process-wide daemon slot.
///
/// Constructed once at startup and passed explicitly to every
/// component that needs the daemon.
#[derive(Clone, Default)]
pub struct DaemonConnection {
    cell: AwaitCell<DaemonHandle>,
}

impl DaemonConnection {
    pub fn new() -> Self {
        Self {
            cell: AwaitCell::new(),
        }
    }

    /// Attach a daemon, resuming every pending waiter.
    pub fn attach(&self, daemon: DaemonHandle) {
        self.cell.set(daemon);
    }

    /// Detach the daemon; callers suspend until re-attachment.
    pub fn detach(&self) {
        self.cell.clear();
    }

    pub fn current(&self) -> Option<DaemonHandle> {
        self.cell.get()
    }

    /// Suspend until a daemon is attached. No timeout.
    pub async fn wait(&self) -> DaemonHandle {
        self.cell.wait().await
    }

    /// Observe attach/detach transitions.
    pub fn watch(&self) -> watch::Receiver<Option<DaemonHandle>> {
        self.cell.subscribe()
    }
}

/// Run `session` against whichever daemon is attached, restarting it
/// on every attach/detach transition. The session future is dropped
/// when the connection changes and re-created for the new daemon; if
/// it finishes on its own (its push stream closed) the next session
/// waits for the connection to change first.
pub(crate) fn follow_daemon<F, Fut>(connection: &DaemonConnection, mut session: F) -> JoinHandle<()>
where
    F: FnMut(DaemonHandle) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let mut attachments = connection.watch();

    tokio::spawn(async move {
        loop {
            let daemon = loop {
                if let Some(daemon) = attachments.borrow_and_update().clone() {
                    break daemon;
                }
                if attachments.changed().await.is_err() {
                    return;
                }
            };

            tokio::select! {
                biased;
                changed = attachments.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                () = session(daemon) => {
                    if attachments.changed().await.is_err() {
                        return;
                    }
                }
            }
        }
    })
}
