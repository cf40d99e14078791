// ── Location cache ──
//
// Publishes the location the UI should display for the current tunnel
// state. While disconnected or freshly connected the real or relay
// location is polled from the daemon through the conflated backoff
// fetcher: empty results retry, and a newer fetch request supersedes
// both the pending delay and any intermediate result (coalescing).

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use veil_model::{
    ActionAfterDisconnect, Constraint, GeoLocation, LocationConstraint, RelaySettings, TunnelState,
};
use veil_sync::{EventNotifier, ExponentialBackoff, FetchControl, Fetcher, SubscriptionId};

use crate::config::SyncConfig;
use crate::daemon::DaemonConnection;
use crate::settings::SettingsNotifiers;

/// What a fetched location will be used as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchTarget {
    RealLocation,
    RelayLocation,
}

#[derive(Default)]
struct LocationState {
    last_known_real: Option<GeoLocation>,
    selected_relay: Option<GeoLocation>,
}

struct Inner {
    state: Mutex<LocationState>,
    location: Arc<EventNotifier<Option<GeoLocation>>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, LocationState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Map a tunnel-state transition to the location to publish now,
    /// and the fetch (if any) that refines it later.
    fn handle_tunnel_state(&self, tunnel_state: &TunnelState) -> Option<FetchTarget> {
        let state = self.lock();
        match tunnel_state {
            TunnelState::Disconnected => {
                self.location.notify(state.last_known_real.clone());
                Some(FetchTarget::RealLocation)
            }
            TunnelState::Connecting { location } => {
                self.location.notify(location.clone());
                None
            }
            TunnelState::Connected { location } => {
                self.location.notify(location.clone());
                Some(FetchTarget::RelayLocation)
            }
            TunnelState::Disconnecting { after_disconnect } => {
                match after_disconnect {
                    ActionAfterDisconnect::Nothing => {
                        self.location.notify(state.last_known_real.clone());
                    }
                    ActionAfterDisconnect::Block => self.location.notify(None),
                    ActionAfterDisconnect::Reconnect => {
                        self.location.notify(state.selected_relay.clone());
                    }
                }
                None
            }
            TunnelState::Error { .. } => {
                self.location.notify(None);
                None
            }
        }
    }

    fn handle_new_location(&self, target: FetchTarget, location: GeoLocation) {
        let mut state = self.lock();
        if target == FetchTarget::RealLocation {
            state.last_known_real = Some(location.clone());
        }
        self.location.notify(Some(location));
    }

    fn handle_relay_settings(&self, settings: Option<&RelaySettings>) {
        let selected = settings.and_then(|RelaySettings::Normal(constraints)| {
            match &constraints.location {
                Constraint::Any => None,
                Constraint::Only(LocationConstraint::Country { country }) => {
                    Some(GeoLocation::country(country.clone()))
                }
                Constraint::Only(LocationConstraint::City { country, city }) => {
                    Some(GeoLocation::city(country.clone(), city.clone()))
                }
                Constraint::Only(LocationConstraint::Hostname {
                    country,
                    city,
                    hostname,
                }) => Some(GeoLocation::hostname(
                    country.clone(),
                    city.clone(),
                    hostname.clone(),
                )),
            }
        });
        self.lock().selected_relay = selected;
    }
}

/// Authoritative cache for the displayed location.
pub struct LocationCache {
    inner: Arc<Inner>,
    fetcher: Arc<Fetcher<FetchTarget>>,
    tunnel_state: Arc<EventNotifier<TunnelState>>,
    tunnel_subscription: SubscriptionId,
    settings_notifiers: Arc<SettingsNotifiers>,
    relay_subscription: SubscriptionId,
}

impl LocationCache {
    pub fn spawn(
        connection: DaemonConnection,
        tunnel_state: Arc<EventNotifier<TunnelState>>,
        settings_notifiers: Arc<SettingsNotifiers>,
        config: &SyncConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(LocationState::default()),
            location: Arc::new(EventNotifier::new(None)),
        });

        let fetcher = Arc::new(Fetcher::spawn(
            ExponentialBackoff::new(config.location_backoff.clone()),
            || true,
            {
                move |_target: FetchTarget, _attempt| {
                    let connection = connection.clone();
                    async move {
                        let daemon = connection.wait().await;
                        match daemon.get_current_location().await {
                            // Accept the first non-empty result.
                            Ok(Some(location)) => FetchControl::Accept(location),
                            Ok(None) => FetchControl::Retry,
                            Err(e) => {
                                warn!(error = %e, "location fetch attempt failed");
                                FetchControl::Retry
                            }
                        }
                    }
                }
            },
            {
                let inner = Arc::clone(&inner);
                move |target: &FetchTarget, location| inner.handle_new_location(*target, location)
            },
        ));

        let tunnel_subscription = tunnel_state.subscribe({
            let inner = Arc::clone(&inner);
            let fetcher = Arc::clone(&fetcher);
            move |tunnel_state: &TunnelState| {
                if let Some(target) = inner.handle_tunnel_state(tunnel_state) {
                    let _ = fetcher.request(target);
                }
            }
        });

        let relay_subscription = settings_notifiers.relay_settings.subscribe({
            let inner = Arc::clone(&inner);
            move |settings: &Option<RelaySettings>| {
                inner.handle_relay_settings(settings.as_ref());
            }
        });

        Self {
            inner,
            fetcher,
            tunnel_state,
            tunnel_subscription,
            settings_notifiers,
            relay_subscription,
        }
    }

    pub fn location(&self) -> Arc<EventNotifier<Option<GeoLocation>>> {
        Arc::clone(&self.inner.location)
    }

    pub async fn shutdown(&self) {
        self.tunnel_state.unsubscribe(self.tunnel_subscription);
        self.settings_notifiers
            .relay_settings
            .unsubscribe(self.relay_subscription);
        self.fetcher.shutdown().await;
        self.inner.location.unsubscribe_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inner() -> Arc<Inner> {
        Arc::new(Inner {
            state: Mutex::new(LocationState::default()),
            location: Arc::new(EventNotifier::new(None)),
        })
    }

    #[test]
    fn disconnected_publishes_the_last_known_real_location() {
        let inner = inner();
        inner.handle_new_location(FetchTarget::RealLocation, GeoLocation::country("se"));

        let target = inner.handle_tunnel_state(&TunnelState::Disconnected);
        assert_eq!(target, Some(FetchTarget::RealLocation));
        assert_eq!(inner.location.latest(), Some(GeoLocation::country("se")));
    }

    #[test]
    fn connected_publishes_the_state_location_and_refetches() {
        let inner = inner();

        let target = inner.handle_tunnel_state(&TunnelState::Connected {
            location: Some(GeoLocation::city("se", "got")),
        });
        assert_eq!(target, Some(FetchTarget::RelayLocation));
        assert_eq!(inner.location.latest(), Some(GeoLocation::city("se", "got")));
    }

    #[test]
    fn disconnecting_republishes_per_the_after_disconnect_action() {
        let inner = inner();
        inner.handle_new_location(FetchTarget::RealLocation, GeoLocation::country("se"));
        inner.handle_relay_settings(Some(&RelaySettings::Normal(veil_model::RelayConstraints {
            location: Constraint::Only(LocationConstraint::Country {
                country: "no".into(),
            }),
        })));

        inner.handle_tunnel_state(&TunnelState::Disconnecting {
            after_disconnect: ActionAfterDisconnect::Reconnect,
        });
        assert_eq!(inner.location.latest(), Some(GeoLocation::country("no")));

        inner.handle_tunnel_state(&TunnelState::Disconnecting {
            after_disconnect: ActionAfterDisconnect::Block,
        });
        assert_eq!(inner.location.latest(), None);

        inner.handle_tunnel_state(&TunnelState::Disconnecting {
            after_disconnect: ActionAfterDisconnect::Nothing,
        });
        assert_eq!(inner.location.latest(), Some(GeoLocation::country("se")));
    }

    #[test]
    fn error_state_publishes_unknown() {
        let inner = inner();
        inner.handle_new_location(FetchTarget::RealLocation, GeoLocation::country("se"));

        inner.handle_tunnel_state(&TunnelState::Error { is_blocking: true });
        assert_eq!(inner.location.latest(), None);
    }

    #[test]
    fn only_real_location_fetches_update_the_fallback() {
        let inner = inner();
        inner.handle_new_location(FetchTarget::RelayLocation, GeoLocation::country("nl"));

        assert!(inner.lock().last_known_real.is_none());
        assert_eq!(inner.location.latest(), Some(GeoLocation::country("nl")));
    }
}
