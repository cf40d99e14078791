// ── Settings cache ──
//
// Receives full settings snapshots from the daemon (initial pull on
// attach, then push) and derives three independent change
// notifications by comparing the incoming snapshot's fields against
// the previous one before replacing it — downstream consumers are not
// fired for unrelated field changes.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use veil_model::{DnsOptions, RelaySettings, Settings};
use veil_sync::{Closed, CommandActor, EventNotifier};

use crate::daemon::{DaemonConnection, follow_daemon};

enum Command {
    SetAllowLan(bool),
    SetWireguardMtu(Option<u16>),
}

/// The independently observable facets of the settings entity.
pub struct SettingsNotifiers {
    pub account_number: EventNotifier<Option<String>>,
    pub dns_options: EventNotifier<Option<DnsOptions>>,
    pub relay_settings: EventNotifier<Option<RelaySettings>>,
    pub settings: EventNotifier<Option<Settings>>,
}

struct Inner {
    /// Previous full snapshot; the comparison base for derivations.
    state: Mutex<Option<Settings>>,
    notifiers: Arc<SettingsNotifiers>,
}

impl Inner {
    /// Compare, derive, replace, notify — one mutual-exclusion region,
    /// so subscribers observe the compound transition atomically.
    fn handle_new_settings(&self, new: Settings) {
        let mut state = self.lock();

        let previous_account = state.as_ref().and_then(|s| s.account_number.clone());
        if previous_account != new.account_number {
            self.notifiers
                .account_number
                .notify(new.account_number.clone());
        }

        let previous_dns = state.as_ref().map(|s| s.tunnel_options.dns_options.clone());
        if previous_dns.as_ref() != Some(&new.tunnel_options.dns_options) {
            self.notifiers
                .dns_options
                .notify(Some(new.tunnel_options.dns_options.clone()));
        }

        let previous_relay = state.as_ref().map(|s| s.relay_settings.clone());
        if previous_relay.as_ref() != Some(&new.relay_settings) {
            self.notifiers
                .relay_settings
                .notify(Some(new.relay_settings.clone()));
        }

        *state = Some(new.clone());
        self.notifiers.settings.notify(Some(new));
    }

    fn lock(&self) -> MutexGuard<'_, Option<Settings>> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Authoritative cache for the daemon's settings.
pub struct SettingsCache {
    inner: Arc<Inner>,
    actor: CommandActor<Command>,
    follower: JoinHandle<()>,
}

impl SettingsCache {
    pub fn spawn(connection: DaemonConnection) -> Self {
        let notifiers = Arc::new(SettingsNotifiers {
            account_number: EventNotifier::new(None),
            dns_options: EventNotifier::new(None),
            relay_settings: EventNotifier::new(None),
            settings: EventNotifier::new(None),
        });
        let inner = Arc::new(Inner {
            state: Mutex::new(None),
            notifiers,
        });

        let follower = follow_daemon(&connection, {
            let inner = Arc::clone(&inner);
            move |daemon| {
                let inner = Arc::clone(&inner);
                async move {
                    // Subscribe before the initial pull so no push is lost
                    // in between.
                    let mut pushes = daemon.settings_changes();

                    match daemon.get_settings().await {
                        Ok(settings) => inner.handle_new_settings(settings),
                        Err(e) => warn!(error = %e, "initial settings pull failed"),
                    }

                    loop {
                        match pushes.recv().await {
                            Ok(settings) => inner.handle_new_settings(settings),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "settings push stream lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        let actor = CommandActor::spawn({
            move |command: Command| {
                let connection = connection.clone();
                async move {
                    let daemon = connection.wait().await;
                    let result = match command {
                        Command::SetAllowLan(allow) => daemon.set_allow_lan(allow).await,
                        Command::SetWireguardMtu(mtu) => daemon.set_wireguard_mtu(mtu).await,
                    };
                    if let Err(e) = result {
                        warn!(error = %e, "settings update rejected by daemon");
                    }
                }
            }
        });

        Self {
            inner,
            actor,
            follower,
        }
    }

    pub fn notifiers(&self) -> Arc<SettingsNotifiers> {
        Arc::clone(&self.inner.notifiers)
    }

    pub fn allow_lan(&self) -> bool {
        self.inner.lock().as_ref().is_some_and(|s| s.allow_lan)
    }

    pub fn wireguard_mtu(&self) -> Option<u16> {
        self.inner
            .lock()
            .as_ref()
            .and_then(|s| s.tunnel_options.wireguard.mtu)
    }

    pub fn set_allow_lan(&self, allow: bool) -> Result<(), Closed> {
        self.actor.enqueue(Command::SetAllowLan(allow))
    }

    pub fn set_wireguard_mtu(&self, mtu: Option<u16>) -> Result<(), Closed> {
        self.actor.enqueue(Command::SetWireguardMtu(mtu))
    }

    pub async fn shutdown(&self) {
        self.actor.shutdown().await;
        self.follower.abort();

        let notifiers = &self.inner.notifiers;
        notifiers.account_number.unsubscribe_all();
        notifiers.dns_options.unsubscribe_all();
        notifiers.relay_settings.unsubscribe_all();
        notifiers.settings.unsubscribe_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use veil_model::{Constraint, LocationConstraint, RelayConstraints};

    fn inner() -> Arc<Inner> {
        Arc::new(Inner {
            state: Mutex::new(None),
            notifiers: Arc::new(SettingsNotifiers {
                account_number: EventNotifier::new(None),
                dns_options: EventNotifier::new(None),
                relay_settings: EventNotifier::new(None),
                settings: EventNotifier::new(None),
            }),
        })
    }

    fn counting(notifier: &EventNotifier<impl Clone + Send + Sync + 'static>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn unrelated_field_changes_do_not_fire_derived_notifiers() {
        let inner = inner();
        let account_notifications = counting(&inner.notifiers.account_number);
        let dns_notifications = counting(&inner.notifiers.dns_options);

        let mut settings = Settings {
            account_number: Some("1234".into()),
            ..Settings::default()
        };
        inner.handle_new_settings(settings.clone());

        // Replay + first derivation each.
        assert_eq!(account_notifications.load(Ordering::SeqCst), 2);
        assert_eq!(dns_notifications.load(Ordering::SeqCst), 2);

        // Only allow_lan changes: neither derived notifier fires.
        settings.allow_lan = true;
        inner.handle_new_settings(settings.clone());
        assert_eq!(account_notifications.load(Ordering::SeqCst), 2);
        assert_eq!(dns_notifications.load(Ordering::SeqCst), 2);

        // Account change fires only the account notifier.
        settings.account_number = Some("5678".into());
        inner.handle_new_settings(settings);
        assert_eq!(account_notifications.load(Ordering::SeqCst), 3);
        assert_eq!(dns_notifications.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn relay_constraint_changes_fire_the_relay_notifier() {
        let inner = inner();
        let relay_notifications = counting(&inner.notifiers.relay_settings);

        inner.handle_new_settings(Settings::default());
        let baseline = relay_notifications.load(Ordering::SeqCst);

        let constrained = Settings {
            relay_settings: RelaySettings::Normal(RelayConstraints {
                location: Constraint::Only(LocationConstraint::Country {
                    country: "se".into(),
                }),
            }),
            ..Settings::default()
        };
        inner.handle_new_settings(constrained);
        assert_eq!(relay_notifications.load(Ordering::SeqCst), baseline + 1);
    }

    #[test]
    fn full_snapshot_notifier_fires_every_time() {
        let inner = inner();
        let snapshots = counting(&inner.notifiers.settings);

        inner.handle_new_settings(Settings::default());
        inner.handle_new_settings(Settings::default());
        assert_eq!(snapshots.load(Ordering::SeqCst), 3); // replay + 2
    }
}
