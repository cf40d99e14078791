// ── WireGuard key status listener ──
//
// Mirrors the daemon's key events and serializes key generation and
// verification through a FIFO actor.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use veil_model::KeyStatus;
use veil_sync::{Closed, CommandActor, EventNotifier};

use crate::daemon::{DaemonConnection, follow_daemon};

enum Command {
    GenerateKey,
    VerifyKey,
}

pub struct KeyStatusListener {
    key_status: Arc<EventNotifier<Option<KeyStatus>>>,
    actor: CommandActor<Command>,
    follower: JoinHandle<()>,
}

impl KeyStatusListener {
    pub fn spawn(connection: DaemonConnection) -> Self {
        let key_status = Arc::new(EventNotifier::new(None));

        let follower = follow_daemon(&connection, {
            let key_status = Arc::clone(&key_status);
            move |daemon| {
                let key_status = Arc::clone(&key_status);
                async move {
                    let mut pushes = daemon.key_events();
                    loop {
                        match pushes.recv().await {
                            Ok(status) => key_status.notify(Some(status)),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "key event stream lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        let actor = CommandActor::spawn({
            let key_status = Arc::clone(&key_status);
            move |command: Command| {
                let key_status = Arc::clone(&key_status);
                let connection = connection.clone();
                async move {
                    let daemon = connection.wait().await;
                    match command {
                        Command::GenerateKey => match daemon.generate_wireguard_key().await {
                            Ok(status) => key_status.notify(Some(status)),
                            Err(e) => warn!(error = %e, "key generation failed"),
                        },
                        Command::VerifyKey => match daemon.verify_wireguard_key().await {
                            Ok(verified) => {
                                // Fold the verdict into the current key,
                                // if we hold one.
                                let updated = match key_status.latest() {
                                    Some(KeyStatus::NewKey(mut key)) => {
                                        key.verified = Some(verified);
                                        Some(KeyStatus::NewKey(key))
                                    }
                                    other => other,
                                };
                                key_status.notify(updated);
                            }
                            Err(e) => warn!(error = %e, "key verification failed"),
                        },
                    }
                }
            }
        });

        Self {
            key_status,
            actor,
            follower,
        }
    }

    pub fn key_status(&self) -> Arc<EventNotifier<Option<KeyStatus>>> {
        Arc::clone(&self.key_status)
    }

    pub fn generate_key(&self) -> Result<(), Closed> {
        self.actor.enqueue(Command::GenerateKey)
    }

    pub fn verify_key(&self) -> Result<(), Closed> {
        self.actor.enqueue(Command::VerifyKey)
    }

    pub async fn shutdown(&self) {
        self.actor.shutdown().await;
        self.follower.abort();
        self.key_status.unsubscribe_all();
    }
}
