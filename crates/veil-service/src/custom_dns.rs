// ── Custom DNS cache ──
//
// An ordered server list plus an enable flag. Every effective mutation
// resubmits the full list to the daemon as one combined update; the
// authoritative echo comes back through the settings cache's DNS
// notifier and re-syncs the local copy.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use veil_model::DnsOptions;
use veil_sync::{Closed, CommandActor};

use crate::daemon::DaemonConnection;
use crate::settings::SettingsNotifiers;

enum Command {
    Add(IpAddr),
    Remove(IpAddr),
    Replace { old_server: IpAddr, new_server: IpAddr },
    SetEnabled(bool),
}

#[derive(Default)]
struct DnsState {
    servers: Vec<IpAddr>,
    enabled: bool,
}

struct Inner {
    state: Mutex<DnsState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, DnsState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Apply one command to the local list. Returns the combined
    /// update to submit, or `None` for a no-op.
    fn apply(&self, command: &Command) -> Option<DnsOptions> {
        let mut state = self.lock();

        match *command {
            Command::Add(server) => {
                if state.servers.contains(&server) {
                    return None;
                }
                state.servers.push(server);
            }
            Command::Remove(server) => {
                let before = state.servers.len();
                state.servers.retain(|existing| *existing != server);
                if state.servers.len() == before {
                    return None;
                }
            }
            Command::Replace {
                old_server,
                new_server,
            } => {
                if old_server == new_server || state.servers.contains(&new_server) {
                    return None;
                }
                // Position is preserved.
                let Some(index) = state.servers.iter().position(|s| *s == old_server) else {
                    return None;
                };
                state.servers[index] = new_server;
            }
            Command::SetEnabled(enabled) => {
                return Some(DnsOptions {
                    custom: enabled,
                    addresses: state.servers.clone(),
                });
            }
        }

        Some(DnsOptions {
            custom: state.enabled,
            addresses: state.servers.clone(),
        })
    }
}

/// Authoritative cache for the custom DNS server list.
pub struct CustomDnsCache {
    inner: Arc<Inner>,
    actor: CommandActor<Command>,
    settings_notifiers: Arc<SettingsNotifiers>,
    settings_subscription: veil_sync::SubscriptionId,
}

impl CustomDnsCache {
    pub fn spawn(settings_notifiers: Arc<SettingsNotifiers>, connection: DaemonConnection) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(DnsState::default()),
        });

        // The daemon's settings snapshot is the source of truth for the
        // local list.
        let settings_subscription = settings_notifiers.dns_options.subscribe({
            let inner = Arc::clone(&inner);
            move |options: &Option<DnsOptions>| {
                if let Some(options) = options {
                    let mut state = inner.lock();
                    state.enabled = options.custom;
                    state.servers = options.addresses.clone();
                }
            }
        });

        let actor = CommandActor::spawn({
            let inner = Arc::clone(&inner);
            move |command: Command| {
                let inner = Arc::clone(&inner);
                let connection = connection.clone();
                async move {
                    let Some(update) = inner.apply(&command) else {
                        return;
                    };
                    let daemon = connection.wait().await;
                    if let Err(e) = daemon.set_dns_options(update).await {
                        warn!(error = %e, "DNS options update rejected by daemon");
                    }
                }
            }
        });

        Self {
            inner,
            actor,
            settings_notifiers,
            settings_subscription,
        }
    }

    pub fn add_server(&self, server: IpAddr) -> Result<(), Closed> {
        self.actor.enqueue(Command::Add(server))
    }

    pub fn remove_server(&self, server: IpAddr) -> Result<(), Closed> {
        self.actor.enqueue(Command::Remove(server))
    }

    pub fn replace_server(&self, old_server: IpAddr, new_server: IpAddr) -> Result<(), Closed> {
        self.actor.enqueue(Command::Replace {
            old_server,
            new_server,
        })
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), Closed> {
        self.actor.enqueue(Command::SetEnabled(enabled))
    }

    pub async fn shutdown(&self) {
        self.settings_notifiers
            .dns_options
            .unsubscribe(self.settings_subscription);
        self.actor.shutdown().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn addr(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    fn inner_with(servers: &[IpAddr], enabled: bool) -> Inner {
        Inner {
            state: Mutex::new(DnsState {
                servers: servers.to_vec(),
                enabled,
            }),
        }
    }

    #[test]
    fn add_is_a_no_op_when_already_present() {
        let inner = inner_with(&[addr(1)], true);

        assert!(inner.apply(&Command::Add(addr(1))).is_none());

        let update = inner.apply(&Command::Add(addr(2))).unwrap();
        assert_eq!(update.addresses, vec![addr(1), addr(2)]);
        assert!(update.custom);
    }

    #[test]
    fn replace_preserves_position() {
        let inner = inner_with(&[addr(1), addr(2), addr(3)], false);

        let update = inner
            .apply(&Command::Replace {
                old_server: addr(2),
                new_server: addr(9),
            })
            .unwrap();
        assert_eq!(update.addresses, vec![addr(1), addr(9), addr(3)]);
    }

    #[test]
    fn replace_is_a_no_op_when_target_absent_or_value_present() {
        let inner = inner_with(&[addr(1), addr(2)], false);

        assert!(
            inner
                .apply(&Command::Replace {
                    old_server: addr(7),
                    new_server: addr(9),
                })
                .is_none()
        );
        assert!(
            inner
                .apply(&Command::Replace {
                    old_server: addr(1),
                    new_server: addr(2),
                })
                .is_none()
        );
    }

    #[test]
    fn remove_submits_only_when_something_was_removed() {
        let inner = inner_with(&[addr(1)], true);

        assert!(inner.apply(&Command::Remove(addr(2))).is_none());
        let update = inner.apply(&Command::Remove(addr(1))).unwrap();
        assert!(update.addresses.is_empty());
    }

    #[test]
    fn set_enabled_submits_the_current_list_with_the_new_flag() {
        let inner = inner_with(&[addr(1)], false);

        let update = inner.apply(&Command::SetEnabled(true)).unwrap();
        assert!(update.custom);
        assert_eq!(update.addresses, vec![addr(1)]);
    }
}
