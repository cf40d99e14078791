// Scriptable in-process daemon for end-to-end tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::broadcast;

use veil_model::{
    AccountData, AppVersionInfo, Constraint, DnsOptions, GeoLocation, KeyStatus,
    LocationConstraint, RelayList, Settings, TunnelState, VoucherResult,
};
use veil_service::{DaemonRpcError, TunnelDaemon};

const CHANNEL_CAPACITY: usize = 64;

struct State {
    settings: Settings,
    history: Vec<String>,
    /// Scripted `get_account_data` responses; the last entry repeats.
    expiry_responses: VecDeque<Result<String, DaemonRpcError>>,
    current_location: Option<GeoLocation>,
    auth_token: String,
    current_version: String,
    version_info: AppVersionInfo,
}

pub struct MockDaemon {
    state: Mutex<State>,
    account_data_calls: AtomicUsize,
    settings_tx: broadcast::Sender<Settings>,
    tunnel_tx: broadcast::Sender<TunnelState>,
    relay_tx: broadcast::Sender<RelayList>,
    key_tx: broadcast::Sender<KeyStatus>,
    version_tx: broadcast::Sender<AppVersionInfo>,
}

impl MockDaemon {
    pub fn new() -> Arc<Self> {
        let (settings_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (tunnel_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (relay_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (key_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (version_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        Arc::new(Self {
            state: Mutex::new(State {
                settings: Settings::default(),
                history: Vec::new(),
                expiry_responses: VecDeque::new(),
                current_location: Some(GeoLocation::country("se")),
                auth_token: "test-token".into(),
                current_version: "2026.2".into(),
                version_info: AppVersionInfo {
                    current_is_supported: true,
                    latest_stable: "2026.2".into(),
                    latest: "2026.3-beta1".into(),
                },
            }),
            account_data_calls: AtomicUsize::new(0),
            settings_tx,
            tunnel_tx,
            relay_tx,
            key_tx,
            version_tx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue one `get_account_data` response. The last queued response
    /// keeps repeating once the queue drains.
    pub fn queue_expiry(&self, expiry: &str) {
        self.lock()
            .expiry_responses
            .push_back(Ok(expiry.to_owned()));
    }

    pub fn queue_expiry_error(&self, error: DaemonRpcError) {
        self.lock().expiry_responses.push_back(Err(error));
    }

    pub fn set_history(&self, history: Vec<String>) {
        self.lock().history = history;
    }

    pub fn push_tunnel_state(&self, state: TunnelState) {
        let _ = self.tunnel_tx.send(state);
    }

    pub fn account_data_calls(&self) -> usize {
        self.account_data_calls.load(Ordering::SeqCst)
    }

    fn publish_settings(&self, settings: Settings) {
        let _ = self.settings_tx.send(settings);
    }
}

#[async_trait]
impl TunnelDaemon for MockDaemon {
    async fn create_account(&self) -> Result<(), DaemonRpcError> {
        let settings = {
            let mut state = self.lock();
            state.settings.account_number = Some("1111222233334444".into());
            state.settings.clone()
        };
        self.publish_settings(settings);
        Ok(())
    }

    async fn set_account(&self, account: Option<String>) -> Result<(), DaemonRpcError> {
        let settings = {
            let mut state = self.lock();
            state.settings.account_number = account;
            state.settings.clone()
        };
        self.publish_settings(settings);
        Ok(())
    }

    async fn get_account_data(&self, _account: &str) -> Result<AccountData, DaemonRpcError> {
        self.account_data_calls.fetch_add(1, Ordering::SeqCst);
        let response = {
            let mut state = self.lock();
            if state.expiry_responses.len() > 1 {
                state.expiry_responses.pop_front()
            } else {
                state.expiry_responses.front().cloned()
            }
        };
        match response {
            Some(Ok(expiry)) => Ok(AccountData { expiry }),
            Some(Err(error)) => Err(error),
            None => Err(DaemonRpcError::Rpc("no scripted expiry".into())),
        }
    }

    async fn get_account_history(&self) -> Result<Vec<String>, DaemonRpcError> {
        Ok(self.lock().history.clone())
    }

    async fn remove_account_from_history(&self, account: &str) -> Result<(), DaemonRpcError> {
        self.lock().history.retain(|entry| entry != account);
        Ok(())
    }

    async fn get_www_auth_token(&self) -> Result<String, DaemonRpcError> {
        Ok(self.lock().auth_token.clone())
    }

    async fn submit_voucher(&self, voucher: &str) -> Result<VoucherResult, DaemonRpcError> {
        if voucher.starts_with("VALID") {
            Ok(VoucherResult::Ok(veil_model::VoucherSubmission {
                time_added_secs: 30 * 24 * 60 * 60,
                new_expiry: "2031-01-01 00:00:00 UTC".into(),
            }))
        } else {
            Ok(VoucherResult::InvalidVoucher)
        }
    }

    async fn get_settings(&self) -> Result<Settings, DaemonRpcError> {
        Ok(self.lock().settings.clone())
    }

    async fn set_allow_lan(&self, allow: bool) -> Result<(), DaemonRpcError> {
        let settings = {
            let mut state = self.lock();
            state.settings.allow_lan = allow;
            state.settings.clone()
        };
        self.publish_settings(settings);
        Ok(())
    }

    async fn set_wireguard_mtu(&self, mtu: Option<u16>) -> Result<(), DaemonRpcError> {
        let settings = {
            let mut state = self.lock();
            state.settings.tunnel_options.wireguard.mtu = mtu;
            state.settings.clone()
        };
        self.publish_settings(settings);
        Ok(())
    }

    async fn set_dns_options(&self, options: DnsOptions) -> Result<(), DaemonRpcError> {
        let settings = {
            let mut state = self.lock();
            state.settings.tunnel_options.dns_options = options;
            state.settings.clone()
        };
        self.publish_settings(settings);
        Ok(())
    }

    async fn update_relay_location(
        &self,
        location: Constraint<LocationConstraint>,
    ) -> Result<(), DaemonRpcError> {
        let settings = {
            let mut state = self.lock();
            let veil_model::RelaySettings::Normal(ref mut constraints) =
                state.settings.relay_settings;
            constraints.location = location;
            state.settings.clone()
        };
        self.publish_settings(settings);
        Ok(())
    }

    async fn get_relay_locations(&self) -> Result<RelayList, DaemonRpcError> {
        Ok(RelayList::default())
    }

    async fn get_current_location(&self) -> Result<Option<GeoLocation>, DaemonRpcError> {
        Ok(self.lock().current_location.clone())
    }

    async fn connect_tunnel(&self) -> Result<(), DaemonRpcError> {
        self.push_tunnel_state(TunnelState::Connected {
            location: Some(GeoLocation::country("se")),
        });
        Ok(())
    }

    async fn disconnect_tunnel(&self) -> Result<(), DaemonRpcError> {
        self.push_tunnel_state(TunnelState::Disconnected);
        Ok(())
    }

    async fn reconnect_tunnel(&self) -> Result<(), DaemonRpcError> {
        self.push_tunnel_state(TunnelState::Connected {
            location: Some(GeoLocation::country("se")),
        });
        Ok(())
    }

    async fn generate_wireguard_key(&self) -> Result<KeyStatus, DaemonRpcError> {
        Ok(KeyStatus::NewKey(veil_model::WireguardKey {
            public_key: "dGVzdC1rZXk=".into(),
            verified: None,
        }))
    }

    async fn verify_wireguard_key(&self) -> Result<bool, DaemonRpcError> {
        Ok(true)
    }

    async fn get_current_version(&self) -> Result<String, DaemonRpcError> {
        Ok(self.lock().current_version.clone())
    }

    async fn get_version_info(&self) -> Result<AppVersionInfo, DaemonRpcError> {
        Ok(self.lock().version_info.clone())
    }

    fn settings_changes(&self) -> broadcast::Receiver<Settings> {
        self.settings_tx.subscribe()
    }

    fn tunnel_state_changes(&self) -> broadcast::Receiver<TunnelState> {
        self.tunnel_tx.subscribe()
    }

    fn relay_list_changes(&self) -> broadcast::Receiver<RelayList> {
        self.relay_tx.subscribe()
    }

    fn key_events(&self) -> broadcast::Receiver<KeyStatus> {
        self.key_tx.subscribe()
    }

    fn version_info_changes(&self) -> broadcast::Receiver<AppVersionInfo> {
        self.version_tx.subscribe()
    }
}
