// ── WireGuard key status mirror ──

use std::sync::Arc;

use veil_ipc::{Event, EventKind, Request, RequestSender, SendRequestError};
use veil_model::KeyStatus;
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct KeyStatusListener {
    requests: RequestSender,
    key_status: Arc<EventNotifier<Option<KeyStatus>>>,
}

impl KeyStatusListener {
    pub fn new(requests: RequestSender, dispatcher: &EventDispatcher) -> Self {
        let key_status = Arc::new(EventNotifier::new(None));

        dispatcher.register_handler(EventKind::WireguardKeyStatus, {
            let key_status = Arc::clone(&key_status);
            move |event| {
                if let Event::WireguardKeyStatus(status) = event {
                    key_status.notify(status.clone());
                }
            }
        });

        Self {
            requests,
            key_status,
        }
    }

    pub fn key_status(&self) -> Arc<EventNotifier<Option<KeyStatus>>> {
        Arc::clone(&self.key_status)
    }

    pub fn generate_key(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::WireguardGenerateKey)
    }

    pub fn verify_key(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::WireguardVerifyKey)
    }

    pub fn teardown(&self) {
        self.key_status.unsubscribe_all();
    }
}
