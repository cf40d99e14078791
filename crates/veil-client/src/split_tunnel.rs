// ── Split tunneling mirror ──

use std::sync::Arc;

use veil_ipc::{Event, EventKind, Request, RequestSender, SendRequestError};
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct SplitTunneling {
    requests: RequestSender,
    excluded_apps: Arc<EventNotifier<Option<Vec<String>>>>,
}

impl SplitTunneling {
    pub fn new(requests: RequestSender, dispatcher: &EventDispatcher) -> Self {
        let excluded_apps = Arc::new(EventNotifier::new(None));

        dispatcher.register_handler(EventKind::SplitTunnelingUpdate, {
            let excluded_apps = Arc::clone(&excluded_apps);
            move |event| {
                if let Event::SplitTunnelingUpdate(apps) = event {
                    excluded_apps.notify(apps.clone());
                }
            }
        });

        Self {
            requests,
            excluded_apps,
        }
    }

    /// `Some(apps)` while split tunneling is enabled, `None` otherwise.
    pub fn excluded_apps(&self) -> Arc<EventNotifier<Option<Vec<String>>>> {
        Arc::clone(&self.excluded_apps)
    }

    pub fn exclude_app(&self, app: String) -> Result<(), SendRequestError> {
        self.requests.send(&Request::ExcludeApp(app))
    }

    pub fn include_app(&self, app: String) -> Result<(), SendRequestError> {
        self.requests.send(&Request::IncludeApp(app))
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), SendRequestError> {
        self.requests
            .send(&Request::SetSplitTunnelingEnabled(enabled))
    }

    pub fn persist(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::PersistExcludedApps)
    }

    pub fn teardown(&self) {
        self.excluded_apps.unsubscribe_all();
    }
}
