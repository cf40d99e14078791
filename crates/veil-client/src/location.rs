// ── Location mirror ──

use std::sync::Arc;

use veil_ipc::{Event, EventKind};
use veil_model::GeoLocation;
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct LocationInfoCache {
    location: Arc<EventNotifier<Option<GeoLocation>>>,
}

impl LocationInfoCache {
    pub fn new(dispatcher: &EventDispatcher) -> Self {
        let location = Arc::new(EventNotifier::new(None));

        dispatcher.register_handler(EventKind::NewLocation, {
            let location = Arc::clone(&location);
            move |event| {
                if let Event::NewLocation(new_location) = event {
                    location.notify(new_location.clone());
                }
            }
        });

        Self { location }
    }

    pub fn location(&self) -> Arc<EventNotifier<Option<GeoLocation>>> {
        Arc::clone(&self.location)
    }

    pub fn teardown(&self) {
        self.location.unsubscribe_all();
    }
}
