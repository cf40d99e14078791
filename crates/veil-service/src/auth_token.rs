// ── Auth token cache ──
//
// Fetches short-lived web auth tokens from the daemon on demand.
// Requests queue on a FIFO actor and each waits for the daemon to be
// attached, so a token request made before attach resolves later
// instead of failing.

use std::sync::Arc;

use tracing::warn;

use veil_sync::{Closed, CommandActor, EventNotifier};

use crate::daemon::DaemonConnection;

struct FetchToken;

pub struct AuthTokenCache {
    auth_token: Arc<EventNotifier<Option<String>>>,
    actor: CommandActor<FetchToken>,
}

impl AuthTokenCache {
    pub fn spawn(connection: DaemonConnection) -> Self {
        let auth_token = Arc::new(EventNotifier::new(None));

        let actor = CommandActor::spawn({
            let auth_token = Arc::clone(&auth_token);
            move |_request: FetchToken| {
                let auth_token = Arc::clone(&auth_token);
                let connection = connection.clone();
                async move {
                    match connection.wait().await.get_www_auth_token().await {
                        Ok(token) => auth_token.notify(Some(token)),
                        Err(e) => warn!(error = %e, "auth token fetch failed"),
                    }
                }
            }
        });

        Self { auth_token, actor }
    }

    pub fn auth_token(&self) -> Arc<EventNotifier<Option<String>>> {
        Arc::clone(&self.auth_token)
    }

    pub fn fetch_new_token(&self) -> Result<(), Closed> {
        self.actor.enqueue(FetchToken)
    }

    pub async fn shutdown(&self) {
        self.actor.shutdown().await;
        self.auth_token.unsubscribe_all();
    }
}
