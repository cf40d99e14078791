// ── App version info mirror ──

use std::sync::Arc;

use veil_ipc::{Event, EventKind};
use veil_model::AppVersionInfo;
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct AppVersionInfoCache {
    current_version: Arc<EventNotifier<Option<String>>>,
    version_info: Arc<EventNotifier<Option<AppVersionInfo>>>,
}

impl AppVersionInfoCache {
    pub fn new(dispatcher: &EventDispatcher) -> Self {
        let current_version = Arc::new(EventNotifier::new(None));
        let version_info = Arc::new(EventNotifier::new(None));

        dispatcher.register_handler(EventKind::CurrentVersion, {
            let current_version = Arc::clone(&current_version);
            move |event| {
                if let Event::CurrentVersion(version) = event {
                    current_version.notify(version.clone());
                }
            }
        });

        dispatcher.register_handler(EventKind::AppVersionInfo, {
            let version_info = Arc::clone(&version_info);
            move |event| {
                if let Event::AppVersionInfo(info) = event {
                    version_info.notify(info.clone());
                }
            }
        });

        Self {
            current_version,
            version_info,
        }
    }

    pub fn current_version(&self) -> Arc<EventNotifier<Option<String>>> {
        Arc::clone(&self.current_version)
    }

    pub fn version_info(&self) -> Arc<EventNotifier<Option<AppVersionInfo>>> {
        Arc::clone(&self.version_info)
    }

    pub fn teardown(&self) {
        self.current_version.unsubscribe_all();
        self.version_info.unsubscribe_all();
    }
}
