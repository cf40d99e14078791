// ── Service endpoint ──
//
// Builds every authoritative cache around one daemon connection, wires
// each notifier into outgoing events, routes inbound requests to the
// owning cache, and hands freshly registered listeners a full state
// snapshot followed by the ready sentinel.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use veil_ipc::{Event, ListenerSink, Request, RequestStream};
use veil_sync::{Closed, CommandActor};

use crate::account::AccountCache;
use crate::auth_token::AuthTokenCache;
use crate::config::SyncConfig;
use crate::connection_proxy::ConnectionProxy;
use crate::custom_dns::CustomDnsCache;
use crate::daemon::DaemonConnection;
use crate::key_status::KeyStatusListener;
use crate::location::LocationCache;
use crate::registry::ListenerRegistry;
use crate::relay_list::RelayListCache;
use crate::settings::SettingsCache;
use crate::split_tunnel::{ExclusionStore, SplitTunneling};
use crate::version::AppVersionInfoCache;
use crate::voucher::VoucherRedeemer;

struct Caches {
    settings: SettingsCache,
    account: AccountCache,
    custom_dns: CustomDnsCache,
    connection_proxy: ConnectionProxy,
    location: LocationCache,
    relay_list: RelayListCache,
    split_tunneling: SplitTunneling,
    key_status: KeyStatusListener,
    auth_token: AuthTokenCache,
    version_info: AppVersionInfoCache,
    voucher: VoucherRedeemer,
    registrations: CommandActor<ListenerSink>,
}

/// The authoritative side of the synchronization layer, one per
/// service process.
pub struct ServiceEndpoint {
    caches: Arc<Caches>,
    registry: Arc<ListenerRegistry>,
    router: JoinHandle<()>,
}

impl ServiceEndpoint {
    pub fn spawn(
        connection: DaemonConnection,
        mut requests: RequestStream,
        exclusions: Arc<dyn ExclusionStore>,
        config: &SyncConfig,
    ) -> Self {
        let registry = Arc::new(ListenerRegistry::new());

        // ── Caches ───────────────────────────────────────────────
        let settings = SettingsCache::spawn(connection.clone());
        let account = AccountCache::spawn(settings.notifiers(), connection.clone(), config);
        let custom_dns = CustomDnsCache::spawn(settings.notifiers(), connection.clone());
        let connection_proxy = ConnectionProxy::spawn(connection.clone());
        let location = LocationCache::spawn(
            connection.clone(),
            connection_proxy.tunnel_state(),
            settings.notifiers(),
            config,
        );
        let relay_list = RelayListCache::spawn(connection.clone());
        let split_tunneling = SplitTunneling::new(exclusions);
        let key_status = KeyStatusListener::spawn(connection.clone());
        let auth_token = AuthTokenCache::spawn(connection.clone());
        let version_info = AppVersionInfoCache::spawn(connection.clone());

        let voucher = VoucherRedeemer::spawn(connection.clone(), {
            let registry = Arc::clone(&registry);
            move |voucher, result| {
                registry.broadcast(&Event::VoucherSubmissionResult { voucher, result });
            }
        });

        // ── Notifier → event wiring ──────────────────────────────
        wire_events(
            &registry,
            &settings,
            &account,
            &connection_proxy,
            &location,
            &relay_list,
            &split_tunneling,
            &key_status,
            &auth_token,
            &version_info,
        );

        // ── Listener registration ────────────────────────────────
        // Registrations queue until the daemon is up, then each new
        // listener gets the full snapshot and the ready sentinel.
        let registrations = CommandActor::spawn({
            let registry = Arc::clone(&registry);
            let connection = connection.clone();
            let account_notifiers = account.notifiers();
            let settings_notifiers = settings.notifiers();
            let location_notifier = location.location();
            let key_status_notifier = key_status.key_status();
            let split_notifier = split_tunneling.on_change();
            let current_version = version_info.current_version();
            let app_version_info = version_info.version_info();
            move |sink: ListenerSink| {
                let registry = Arc::clone(&registry);
                let connection = connection.clone();
                let account_notifiers = Arc::clone(&account_notifiers);
                let settings_notifiers = Arc::clone(&settings_notifiers);
                let location_notifier = Arc::clone(&location_notifier);
                let key_status_notifier = Arc::clone(&key_status_notifier);
                let split_notifier = Arc::clone(&split_notifier);
                let current_version = Arc::clone(&current_version);
                let app_version_info = Arc::clone(&app_version_info);
                async move {
                    connection.wait().await;

                    registry.register(sink.clone());

                    let snapshot = [
                        Event::LoginStatus(account_notifiers.login_status.latest()),
                        Event::AccountHistory(account_notifiers.account_history.latest()),
                        Event::SettingsUpdate(settings_notifiers.settings.latest()),
                        Event::NewLocation(location_notifier.latest()),
                        Event::WireguardKeyStatus(key_status_notifier.latest()),
                        Event::SplitTunnelingUpdate(split_notifier.latest()),
                        Event::CurrentVersion(current_version.latest()),
                        Event::AppVersionInfo(app_version_info.latest()),
                        Event::ListenerReady,
                    ];

                    for event in snapshot {
                        if let Err(e) = sink.deliver(&event) {
                            debug!(listener = %sink.id(), error = %e, "listener died during snapshot");
                            registry.unregister(sink.id());
                            break;
                        }
                    }
                }
            }
        });

        let caches = Arc::new(Caches {
            settings,
            account,
            custom_dns,
            connection_proxy,
            location,
            relay_list,
            split_tunneling,
            key_status,
            auth_token,
            version_info,
            voucher,
            registrations,
        });

        // ── Request routing ──────────────────────────────────────
        let router = tokio::spawn({
            let caches = Arc::clone(&caches);
            async move {
                while let Some((request, reply_to)) = requests.next().await {
                    match request {
                        Ok(request) => route(&caches, request, reply_to),
                        Err(e) => warn!(error = %e, "dropping malformed request frame"),
                    }
                }
            }
        });

        Self {
            caches,
            registry,
            router,
        }
    }

    pub fn registry(&self) -> Arc<ListenerRegistry> {
        Arc::clone(&self.registry)
    }

    pub async fn shutdown(&self) {
        let caches = &self.caches;
        caches.registrations.shutdown().await;

        caches.account.shutdown().await;
        caches.auth_token.shutdown().await;
        caches.custom_dns.shutdown().await;
        caches.connection_proxy.shutdown().await;
        caches.key_status.shutdown().await;
        caches.location.shutdown().await;
        caches.relay_list.shutdown().await;
        caches.settings.shutdown().await;
        caches.split_tunneling.shutdown();
        caches.version_info.shutdown();
        caches.voucher.shutdown().await;

        self.router.abort();
    }
}

/// Subscribe the registry to every observable facet. The replayed
/// initial values fire before any listener registers, so they reach
/// nobody — late joiners get theirs from the snapshot instead.
#[allow(clippy::too_many_arguments)]
fn wire_events(
    registry: &Arc<ListenerRegistry>,
    settings: &SettingsCache,
    account: &AccountCache,
    connection_proxy: &ConnectionProxy,
    location: &LocationCache,
    relay_list: &RelayListCache,
    split_tunneling: &SplitTunneling,
    key_status: &KeyStatusListener,
    auth_token: &AuthTokenCache,
    version_info: &AppVersionInfoCache,
) {
    let broadcast = |registry: &Arc<ListenerRegistry>| {
        let registry = Arc::clone(registry);
        move |event: Event| registry.broadcast(&event)
    };

    let send = broadcast(registry);
    settings.notifiers().settings.subscribe(move |settings| {
        send(Event::SettingsUpdate(settings.clone()));
    });

    let send = broadcast(registry);
    let account_notifiers = account.notifiers();
    account_notifiers.account_history.subscribe(move |history| {
        send(Event::AccountHistory(history.clone()));
    });

    let send = broadcast(registry);
    account_notifiers.login_status.subscribe(move |status| {
        send(Event::LoginStatus(status.clone()));
    });

    let send = broadcast(registry);
    connection_proxy.tunnel_state().subscribe(move |state| {
        send(Event::TunnelStateChange(state.clone()));
    });

    let send = broadcast(registry);
    location.location().subscribe(move |location| {
        send(Event::NewLocation(location.clone()));
    });

    let send = broadcast(registry);
    relay_list.relay_list().subscribe(move |list| {
        send(Event::NewRelayList(list.clone()));
    });

    let send = broadcast(registry);
    split_tunneling.on_change().subscribe(move |apps| {
        send(Event::SplitTunnelingUpdate(apps.clone()));
    });

    let send = broadcast(registry);
    key_status.key_status().subscribe(move |status| {
        send(Event::WireguardKeyStatus(status.clone()));
    });

    let send = broadcast(registry);
    auth_token.auth_token().subscribe(move |token| {
        send(Event::AuthToken(token.clone()));
    });

    let send = broadcast(registry);
    version_info.current_version().subscribe(move |version| {
        send(Event::CurrentVersion(version.clone()));
    });

    let send = broadcast(registry);
    version_info.version_info().subscribe(move |info| {
        send(Event::AppVersionInfo(info.clone()));
    });
}

fn route(caches: &Caches, request: Request, reply_to: Option<ListenerSink>) {
    let result = match request {
        Request::AddCustomDnsServer(server) => caches.custom_dns.add_server(server),
        Request::Connect => caches.connection_proxy.connect(),
        Request::CreateAccount => caches.account.create_account(),
        Request::Disconnect => caches.connection_proxy.disconnect(),
        Request::ExcludeApp(app) => {
            caches.split_tunneling.exclude_app(app);
            Ok(())
        }
        Request::FetchAccountExpiry => caches.account.fetch_account_expiry(),
        Request::FetchAuthToken => caches.auth_token.fetch_new_token(),
        Request::IncludeApp(app) => {
            caches.split_tunneling.include_app(&app);
            Ok(())
        }
        Request::InvalidateAccountExpiry(expiry) => {
            caches.account.invalidate_account_expiry(expiry)
        }
        Request::Login(account) => caches.account.login(account),
        Request::Logout => caches.account.logout(),
        Request::PersistExcludedApps => {
            caches.split_tunneling.persist();
            Ok(())
        }
        Request::Reconnect => caches.connection_proxy.reconnect(),
        Request::RegisterListener => match reply_to {
            Some(sink) => caches.registrations.enqueue(sink),
            None => {
                warn!("register-listener request without a reply address");
                Ok(())
            }
        },
        Request::RemoveAccountFromHistory(account) => caches.account.remove_from_history(account),
        Request::RemoveCustomDnsServer(server) => caches.custom_dns.remove_server(server),
        Request::ReplaceCustomDnsServer {
            old_server,
            new_server,
        } => caches.custom_dns.replace_server(old_server, new_server),
        Request::SetAllowLan(allow) => caches.settings.set_allow_lan(allow),
        Request::SetCustomDnsEnabled(enabled) => caches.custom_dns.set_enabled(enabled),
        Request::SetSplitTunnelingEnabled(enabled) => {
            caches.split_tunneling.set_enabled(enabled);
            Ok(())
        }
        Request::SetWireguardMtu(mtu) => caches.settings.set_wireguard_mtu(mtu),
        Request::SubmitVoucher(voucher) => caches.voucher.submit(voucher),
        Request::WireguardGenerateKey => caches.key_status.generate_key(),
        Request::WireguardVerifyKey => caches.key_status.verify_key(),
    };

    if let Err(Closed) = result {
        // Normal shutdown race: the owning actor already stopped.
        debug!("request dropped, its cache is shutting down");
    }
}
