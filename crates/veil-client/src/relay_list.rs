// ── Relay list mirror ──
//
// Read-only: the catalogue arrives by event; relay selection is a
// settings concern and flows through the settings facets.

use std::sync::Arc;

use veil_ipc::{Event, EventKind};
use veil_model::RelayList;
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct RelayListListener {
    relay_list: Arc<EventNotifier<Option<RelayList>>>,
}

impl RelayListListener {
    pub fn new(dispatcher: &EventDispatcher) -> Self {
        let relay_list = Arc::new(EventNotifier::new(None));

        dispatcher.register_handler(EventKind::NewRelayList, {
            let relay_list = Arc::clone(&relay_list);
            move |event| {
                if let Event::NewRelayList(list) = event {
                    relay_list.notify(list.clone());
                }
            }
        });

        Self { relay_list }
    }

    pub fn relay_list(&self) -> Arc<EventNotifier<Option<RelayList>>> {
        Arc::clone(&self.relay_list)
    }

    pub fn teardown(&self) {
        self.relay_list.unsubscribe_all();
    }
}
