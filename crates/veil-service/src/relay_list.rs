// ── Relay list cache ──
//
// Thin: the relay catalogue is fetched once when the daemon attaches
// (only if still unknown), then kept current purely by daemon pushes.
// Relay constraint updates go through a conflated actor — only the
// most recent selection reaches the daemon.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use veil_model::{Constraint, LocationConstraint, RelayList};
use veil_sync::{Closed, ConflatedActor, EventNotifier};

use crate::daemon::{DaemonConnection, follow_daemon};

/// The single command the conflated actor understands; the payload is
/// read from the cache at execution time, so intermediate selections
/// never reach the daemon.
struct UpdateRelayLocation;

pub struct RelayListCache {
    relay_list: Arc<EventNotifier<Option<RelayList>>>,
    selected: Arc<Mutex<Option<LocationConstraint>>>,
    actor: ConflatedActor<UpdateRelayLocation>,
    follower: JoinHandle<()>,
}

impl RelayListCache {
    pub fn spawn(connection: DaemonConnection) -> Self {
        let relay_list = Arc::new(EventNotifier::new(None));
        let selected: Arc<Mutex<Option<LocationConstraint>>> = Arc::new(Mutex::new(None));

        let follower = follow_daemon(&connection, {
            let relay_list = Arc::clone(&relay_list);
            move |daemon| {
                let relay_list = Arc::clone(&relay_list);
                async move {
                    let mut pushes = daemon.relay_list_changes();

                    if relay_list.latest().is_none() {
                        match daemon.get_relay_locations().await {
                            Ok(list) => relay_list.notify(Some(list)),
                            Err(e) => warn!(error = %e, "initial relay list fetch failed"),
                        }
                    }

                    loop {
                        match pushes.recv().await {
                            Ok(list) => relay_list.notify(Some(list)),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "relay list stream lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        let actor = ConflatedActor::spawn({
            let selected = Arc::clone(&selected);
            move |_command: UpdateRelayLocation| {
                let connection = connection.clone();
                let selected = Arc::clone(&selected);
                async move {
                    let constraint = lock(&selected)
                        .clone()
                        .map_or(Constraint::Any, Constraint::Only);

                    let daemon = connection.wait().await;
                    if let Err(e) = daemon.update_relay_location(constraint).await {
                        warn!(error = %e, "relay constraint update rejected by daemon");
                    }
                }
            }
        });

        Self {
            relay_list,
            selected,
            actor,
            follower,
        }
    }

    pub fn relay_list(&self) -> Arc<EventNotifier<Option<RelayList>>> {
        Arc::clone(&self.relay_list)
    }

    /// Change the selected relay location and push it to the daemon.
    pub fn set_selected_location(
        &self,
        location: Option<LocationConstraint>,
    ) -> Result<(), Closed> {
        *lock(&self.selected) = location;
        self.actor.enqueue(UpdateRelayLocation)
    }

    pub async fn shutdown(&self) {
        self.actor.shutdown().await;
        self.follower.abort();
        self.relay_list.unsubscribe_all();
    }
}

fn lock(
    selected: &Arc<Mutex<Option<LocationConstraint>>>,
) -> MutexGuard<'_, Option<LocationConstraint>> {
    selected
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
