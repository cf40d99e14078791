// ── Connection proxy ──
//
// Forwards tunnel control commands to the daemon and mirrors the
// daemon's tunnel-state pushes into a notifier cell.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use veil_model::TunnelState;
use veil_sync::{Closed, CommandActor, EventNotifier};

use crate::daemon::{DaemonConnection, follow_daemon};

enum Command {
    Connect,
    Disconnect,
    Reconnect,
}

pub struct ConnectionProxy {
    tunnel_state: Arc<EventNotifier<TunnelState>>,
    actor: CommandActor<Command>,
    follower: JoinHandle<()>,
}

impl ConnectionProxy {
    pub fn spawn(connection: DaemonConnection) -> Self {
        let tunnel_state = Arc::new(EventNotifier::new(TunnelState::Disconnected));

        let follower = follow_daemon(&connection, {
            let tunnel_state = Arc::clone(&tunnel_state);
            move |daemon| {
                let tunnel_state = Arc::clone(&tunnel_state);
                async move {
                    let mut pushes = daemon.tunnel_state_changes();
                    loop {
                        match pushes.recv().await {
                            Ok(state) => tunnel_state.notify(state),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "tunnel state stream lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        let actor = CommandActor::spawn(move |command: Command| {
            let connection = connection.clone();
            async move {
                let daemon = connection.wait().await;
                let result = match command {
                    Command::Connect => daemon.connect_tunnel().await,
                    Command::Disconnect => daemon.disconnect_tunnel().await,
                    Command::Reconnect => daemon.reconnect_tunnel().await,
                };
                if let Err(e) = result {
                    warn!(error = %e, "tunnel control command failed");
                }
            }
        });

        Self {
            tunnel_state,
            actor,
            follower,
        }
    }

    pub fn tunnel_state(&self) -> Arc<EventNotifier<TunnelState>> {
        Arc::clone(&self.tunnel_state)
    }

    pub fn connect(&self) -> Result<(), Closed> {
        self.actor.enqueue(Command::Connect)
    }

    pub fn disconnect(&self) -> Result<(), Closed> {
        self.actor.enqueue(Command::Disconnect)
    }

    pub fn reconnect(&self) -> Result<(), Closed> {
        self.actor.enqueue(Command::Reconnect)
    }

    pub async fn shutdown(&self) {
        self.actor.shutdown().await;
        self.follower.abort();
        self.tunnel_state.unsubscribe_all();
    }
}
