// ── Tunnel state mirror and control ──

use std::sync::Arc;

use veil_ipc::{Event, EventKind, Request, RequestSender, SendRequestError};
use veil_model::TunnelState;
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct ConnectionProxy {
    requests: RequestSender,
    tunnel_state: Arc<EventNotifier<TunnelState>>,
}

impl ConnectionProxy {
    pub fn new(requests: RequestSender, dispatcher: &EventDispatcher) -> Self {
        let tunnel_state = Arc::new(EventNotifier::new(TunnelState::Disconnected));

        dispatcher.register_handler(EventKind::TunnelStateChange, {
            let tunnel_state = Arc::clone(&tunnel_state);
            move |event| {
                if let Event::TunnelStateChange(state) = event {
                    tunnel_state.notify(state.clone());
                }
            }
        });

        Self {
            requests,
            tunnel_state,
        }
    }

    pub fn tunnel_state(&self) -> Arc<EventNotifier<TunnelState>> {
        Arc::clone(&self.tunnel_state)
    }

    pub fn connect(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::Connect)
    }

    pub fn disconnect(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::Disconnect)
    }

    pub fn reconnect(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::Reconnect)
    }

    pub fn teardown(&self) {
        self.tunnel_state.unsubscribe_all();
    }
}
