// ── Account mirror ──
//
// Rebuilds login state purely from dispatched events; the derived
// number and expiry notifiers fire only on actual change.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use veil_ipc::{Event, EventKind, Request, RequestSender, SendRequestError};
use veil_model::LoginStatus;
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct AccountNotifiers {
    pub account_number: EventNotifier<Option<String>>,
    pub account_expiry: EventNotifier<Option<DateTime<Utc>>>,
    pub account_history: EventNotifier<Option<Vec<String>>>,
    pub login_status: EventNotifier<Option<LoginStatus>>,
}

pub struct AccountCache {
    requests: RequestSender,
    notifiers: Arc<AccountNotifiers>,
}

impl AccountCache {
    pub fn new(requests: RequestSender, dispatcher: &EventDispatcher) -> Self {
        let notifiers = Arc::new(AccountNotifiers {
            account_number: EventNotifier::new(None),
            account_expiry: EventNotifier::new(None),
            account_history: EventNotifier::new(None),
            login_status: EventNotifier::new(None),
        });

        dispatcher.register_handler(EventKind::AccountHistory, {
            let notifiers = Arc::clone(&notifiers);
            move |event| {
                if let Event::AccountHistory(history) = event {
                    notifiers.account_history.notify(history.clone());
                }
            }
        });

        dispatcher.register_handler(EventKind::LoginStatus, {
            let notifiers = Arc::clone(&notifiers);
            move |event| {
                if let Event::LoginStatus(status) = event {
                    notifiers.login_status.notify(status.clone());
                    notifiers
                        .account_number
                        .notify_if_changed(status.as_ref().map(|s| s.account.clone()));
                    notifiers
                        .account_expiry
                        .notify_if_changed(status.as_ref().and_then(|s| s.expiry));
                }
            }
        });

        Self {
            requests,
            notifiers,
        }
    }

    pub fn notifiers(&self) -> Arc<AccountNotifiers> {
        Arc::clone(&self.notifiers)
    }

    pub fn create_account(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::CreateAccount)
    }

    pub fn login(&self, account: String) -> Result<(), SendRequestError> {
        self.requests.send(&Request::Login(account))
    }

    pub fn logout(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::Logout)
    }

    pub fn fetch_account_expiry(&self) -> Result<(), SendRequestError> {
        self.requests.send(&Request::FetchAccountExpiry)
    }

    pub fn invalidate_account_expiry(
        &self,
        stale_expiry: DateTime<Utc>,
    ) -> Result<(), SendRequestError> {
        self.requests
            .send(&Request::InvalidateAccountExpiry(stale_expiry))
    }

    pub fn remove_from_history(&self, account: String) -> Result<(), SendRequestError> {
        self.requests
            .send(&Request::RemoveAccountFromHistory(account))
    }

    pub fn teardown(&self) {
        self.notifiers.account_number.unsubscribe_all();
        self.notifiers.account_expiry.unsubscribe_all();
        self.notifiers.account_history.unsubscribe_all();
        self.notifiers.login_status.unsubscribe_all();
    }
}
