// ── App version info cache ──
//
// The running daemon version is pulled once per attachment; upgrade
// guidance is pulled if still unknown and then follows the daemon's
// push stream.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

use veil_model::AppVersionInfo;
use veil_sync::EventNotifier;

use crate::daemon::{DaemonConnection, follow_daemon};

pub struct AppVersionInfoCache {
    current_version: Arc<EventNotifier<Option<String>>>,
    version_info: Arc<EventNotifier<Option<AppVersionInfo>>>,
    follower: JoinHandle<()>,
}

impl AppVersionInfoCache {
    pub fn spawn(connection: DaemonConnection) -> Self {
        let current_version = Arc::new(EventNotifier::new(None));
        let version_info = Arc::new(EventNotifier::new(None));

        let follower = follow_daemon(&connection, {
            let current_version = Arc::clone(&current_version);
            let version_info = Arc::clone(&version_info);
            move |daemon| {
                let current_version = Arc::clone(&current_version);
                let version_info = Arc::clone(&version_info);
                async move {
                    let mut pushes = daemon.version_info_changes();

                    if current_version.latest().is_none() {
                        match daemon.get_current_version().await {
                            Ok(version) => current_version.notify(Some(version)),
                            Err(e) => warn!(error = %e, "current version fetch failed"),
                        }
                    }

                    if version_info.latest().is_none() {
                        match daemon.get_version_info().await {
                            Ok(info) => version_info.notify(Some(info)),
                            Err(e) => warn!(error = %e, "version info fetch failed"),
                        }
                    }

                    loop {
                        match pushes.recv().await {
                            Ok(info) => version_info.notify(Some(info)),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "version info stream lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        });

        Self {
            current_version,
            version_info,
            follower,
        }
    }

    pub fn current_version(&self) -> Arc<EventNotifier<Option<String>>> {
        Arc::clone(&self.current_version)
    }

    pub fn version_info(&self) -> Arc<EventNotifier<Option<AppVersionInfo>>> {
        Arc::clone(&self.version_info)
    }

    pub fn shutdown(&self) {
        self.follower.abort();
        self.current_version.unsubscribe_all();
        self.version_info.unsubscribe_all();
    }
}
