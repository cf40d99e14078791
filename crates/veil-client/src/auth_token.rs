// ── Auth token mirror ──

use std::sync::Arc;

use veil_ipc::{Event, EventKind, Request, RequestSender, SendRequestError};
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct AuthTokenCache {
    requests: RequestSender,
    auth_token: Arc<EventNotifier<Option<String>>>,
}

impl AuthTokenCache {
    pub fn new(requests: RequestSender, dispatcher: &EventDispatcher) -> Self {
        let auth_token = Arc::new(EventNotifier::new(None));

        dispatcher.register_handler(EventKind::AuthToken, {
            let auth_token = Arc::clone(&auth_token);
            move |event| {
                if let Event::AuthToken(token) = event {
                    auth_token.notify(token.clone());
                }
            }
        });

        Self {
            requests,
            auth_token,
        }
    }

    pub fn auth_token(&self) -> Arc<EventNotifier<Option<String>>> {
        Arc::clone(&self.auth_token)
    }

    pub fn fetch_new_token(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::FetchAuthToken)
    }

    pub fn teardown(&self) {
        self.auth_token.unsubscribe_all();
    }
}
