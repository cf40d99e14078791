// ── App connection ──
//
// One per client context: builds the dispatcher and every mirror
// cache, registers itself as a listener (which triggers the service's
// snapshot-then-ready sequence) and pumps the event stream into the
// dispatcher until torn down.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::warn;

use veil_ipc::{EventKind, RequestSender, event_channel};
use veil_sync::EventNotifier;

use crate::account::AccountCache;
use crate::auth_token::AuthTokenCache;
use crate::connection_proxy::ConnectionProxy;
use crate::custom_dns::CustomDns;
use crate::dispatcher::EventDispatcher;
use crate::key_status::KeyStatusListener;
use crate::location::LocationInfoCache;
use crate::relay_list::RelayListListener;
use crate::settings::SettingsListener;
use crate::split_tunnel::SplitTunneling;
use crate::version::AppVersionInfoCache;
use crate::voucher::VoucherRedeemer;

/// The client context's entry point to the service.
pub struct AppConnection {
    pub account: AccountCache,
    pub auth_token: AuthTokenCache,
    pub connection_proxy: ConnectionProxy,
    pub custom_dns: CustomDns,
    pub key_status: KeyStatusListener,
    pub location: LocationInfoCache,
    pub relay_list: RelayListListener,
    pub settings: SettingsListener,
    pub split_tunneling: SplitTunneling,
    pub version_info: AppVersionInfoCache,
    pub voucher: VoucherRedeemer,

    dispatcher: Arc<EventDispatcher>,
    ready: Arc<EventNotifier<bool>>,
    pump: JoinHandle<()>,
}

impl AppConnection {
    /// Wire up all mirrors and register with the service.
    ///
    /// Handlers are registered before the listener registration is
    /// sent, so the snapshot events all find their mirror.
    pub fn connect(requests: RequestSender) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new());

        let account = AccountCache::new(requests.clone(), &dispatcher);
        let auth_token = AuthTokenCache::new(requests.clone(), &dispatcher);
        let connection_proxy = ConnectionProxy::new(requests.clone(), &dispatcher);
        let custom_dns = CustomDns::new(requests.clone());
        let key_status = KeyStatusListener::new(requests.clone(), &dispatcher);
        let location = LocationInfoCache::new(&dispatcher);
        let relay_list = RelayListListener::new(&dispatcher);
        let settings = SettingsListener::new(requests.clone(), &dispatcher);
        let split_tunneling = SplitTunneling::new(requests.clone(), &dispatcher);
        let version_info = AppVersionInfoCache::new(&dispatcher);
        let voucher = VoucherRedeemer::new(requests.clone(), &dispatcher);

        let ready = Arc::new(EventNotifier::new(false));
        dispatcher.register_handler(EventKind::ListenerReady, {
            let ready = Arc::clone(&ready);
            move |_| ready.notify_if_changed(true)
        });

        let (sink, mut events) = event_channel();
        if let Err(e) = requests.register_listener(sink) {
            warn!(error = %e, "failed to register listener with the service");
        }

        let pump = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            async move {
                while let Some(next) = events.next().await {
                    match next {
                        Ok(event) => dispatcher.dispatch(&event),
                        Err(e) => warn!(error = %e, "dropping malformed event frame"),
                    }
                }
            }
        });

        Self {
            account,
            auth_token,
            connection_proxy,
            custom_dns,
            key_status,
            location,
            relay_list,
            settings,
            split_tunneling,
            version_info,
            voucher,
            dispatcher,
            ready,
            pump,
        }
    }

    /// Fires `true` once the service's initial snapshot has been
    /// delivered (replayed immediately for late subscribers).
    pub fn ready(&self) -> Arc<EventNotifier<bool>> {
        Arc::clone(&self.ready)
    }

    pub fn dispatcher(&self) -> Arc<EventDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Tear down the context: stop dispatching, clear every mirror.
    pub fn teardown(&self) {
        self.dispatcher.teardown();
        self.pump.abort();

        self.account.teardown();
        self.auth_token.teardown();
        self.connection_proxy.teardown();
        self.key_status.teardown();
        self.location.teardown();
        self.relay_list.teardown();
        self.settings.teardown();
        self.split_tunneling.teardown();
        self.version_info.teardown();
        self.voucher.teardown();
        self.ready.unsubscribe_all();
    }
}
