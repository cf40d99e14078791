// ── Account cache ──
//
// Owns login state, account expiry, and account history. Mutations go
// through a FIFO actor; the expiry is fetched from the daemon by a
// backoff fetcher that keeps polling while an invalidation is armed,
// until the value changes or the retry ceiling is reached.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use veil_model::{LoginStatus, expiry};
use veil_sync::{Closed, CommandActor, EventNotifier, ExponentialBackoff, FetchControl, Fetcher};

use crate::config::SyncConfig;
use crate::daemon::{DaemonConnection, DaemonRpcError};
use crate::settings::SettingsNotifiers;

enum Command {
    CreateAccount,
    Login(String),
    Logout,
    RemoveFromHistory(String),
    FetchHistory,
}

/// One expiry fetch request, pinned to the account it was issued for.
/// Results for a since-changed account are discarded.
#[derive(Clone)]
struct ExpiryFetch {
    account: String,
}

/// The independently observable facets of the account entity.
pub struct AccountNotifiers {
    pub account_number: EventNotifier<Option<String>>,
    pub account_expiry: EventNotifier<Option<DateTime<Utc>>>,
    pub account_history: EventNotifier<Option<Vec<String>>>,
    pub login_status: EventNotifier<Option<LoginStatus>>,
}

struct AccountState {
    account_number: Option<String>,
    account_expiry: Option<DateTime<Utc>>,

    /// Armed by an invalidation: the stale value the fetch loop must
    /// out-wait.
    old_account_expiry: Option<DateTime<Utc>>,

    /// Expiry observed right after account creation; used to detect
    /// the account having been used elsewhere before first login.
    created_account_expiry: Option<DateTime<Utc>>,

    newly_created: bool,
    login_status: Option<LoginStatus>,
}

struct Inner {
    state: Mutex<AccountState>,
    notifiers: Arc<AccountNotifiers>,
    retry_ceiling: u32,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, AccountState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// A new account number arrived from the settings cache. Resets
    /// the expiry to unknown, recomputes the login status and reports
    /// which account (if any) needs a fresh expiry fetch — one atomic
    /// compound transition.
    fn handle_new_account_number(&self, new_number: Option<String>) -> Option<ExpiryFetch> {
        let mut state = self.lock();

        state.account_expiry = None;
        state.account_number = new_number.clone();
        state.login_status = new_number.clone().map(|account| LoginStatus {
            account,
            expiry: None,
            is_new: state.newly_created,
        });

        self.notifiers.account_expiry.notify(None);
        self.notifiers.account_number.notify(new_number);
        self.notifiers
            .login_status
            .notify(state.login_status.clone());

        state
            .account_number
            .clone()
            .map(|account| ExpiryFetch { account })
    }

    /// Judge one fetched expiry. Returns `true` when the value was
    /// accepted (and published) or the fetch is moot; `false` keeps
    /// the fetch loop retrying.
    fn handle_new_expiry(&self, account: &str, new_expiry: DateTime<Utc>, attempt: u32) -> bool {
        let mut state = self.lock();

        if state.account_number.as_deref() != Some(account) {
            // The account changed mid-fetch; this result is for nobody.
            return true;
        }

        if Some(new_expiry) == state.old_account_expiry && attempt < self.retry_ceiling {
            return false;
        }

        state.account_expiry = Some(new_expiry);
        state.old_account_expiry = None;

        state.login_status = state.login_status.take().map(|status| LoginStatus {
            expiry: Some(new_expiry),
            ..status
        });

        if state.newly_created {
            match state.created_account_expiry {
                None => state.created_account_expiry = Some(new_expiry),
                Some(created) if created != new_expiry => {
                    // Someone else used the account before first login
                    // here; it is not "new" anymore.
                    state.newly_created = false;
                    state.created_account_expiry = None;
                }
                Some(_) => {}
            }
        }

        self.notifiers.account_expiry.notify(Some(new_expiry));
        self.notifiers
            .login_status
            .notify(state.login_status.clone());

        true
    }

    fn mark_account_not_new(state: &mut AccountState) {
        state.newly_created = false;
        state.created_account_expiry = None;
    }

    fn set_history(&self, history: Vec<String>) {
        self.notifiers.account_history.notify(Some(history));
    }
}

/// Authoritative cache for the account entity.
pub struct AccountCache {
    inner: Arc<Inner>,
    actor: Arc<CommandActor<Command>>,
    expiry_fetcher: Arc<Fetcher<ExpiryFetch>>,
    settings_notifiers: Arc<SettingsNotifiers>,
    settings_subscription: veil_sync::SubscriptionId,
}

impl AccountCache {
    pub fn spawn(
        settings_notifiers: Arc<SettingsNotifiers>,
        connection: DaemonConnection,
        config: &SyncConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(AccountState {
                account_number: None,
                account_expiry: None,
                old_account_expiry: None,
                created_account_expiry: None,
                newly_created: false,
                login_status: None,
            }),
            notifiers: Arc::new(AccountNotifiers {
                account_number: EventNotifier::new(None),
                account_expiry: EventNotifier::new(None),
                account_history: EventNotifier::new(None),
                login_status: EventNotifier::new(None),
            }),
            retry_ceiling: config.invalidated_retry_ceiling,
        });

        let expiry_fetcher = Arc::new(Fetcher::spawn(
            ExponentialBackoff::new(config.expiry_backoff.clone()),
            {
                // The expiry is observable directly and through the
                // login status it rides in; the loop only goes idle
                // once nobody watches either.
                let inner = Arc::clone(&inner);
                move || {
                    inner.notifiers.account_expiry.has_subscribers()
                        || inner.notifiers.login_status.has_subscribers()
                }
            },
            {
                let inner = Arc::clone(&inner);
                let connection = connection.clone();
                move |fetch: ExpiryFetch, attempt| {
                    let inner = Arc::clone(&inner);
                    let connection = connection.clone();
                    async move {
                        let daemon = connection.wait().await;
                        match daemon.get_account_data(&fetch.account).await {
                            Ok(data) => match expiry::parse_expiry(&data.expiry) {
                                Ok(new_expiry) => {
                                    if inner.handle_new_expiry(&fetch.account, new_expiry, attempt)
                                    {
                                        FetchControl::Accept(())
                                    } else {
                                        debug!(attempt, "invalidated expiry unchanged, retrying");
                                        FetchControl::Retry
                                    }
                                }
                                Err(e) => {
                                    // Never silently accept a default in
                                    // place of a malformed timestamp.
                                    warn!(error = %e, "daemon reported malformed expiry");
                                    FetchControl::Retry
                                }
                            },
                            Err(DaemonRpcError::InvalidAccount) => {
                                debug!("account invalid, expiry fetch aborted");
                                FetchControl::Abort
                            }
                            Err(e) => {
                                warn!(error = %e, "expiry fetch attempt failed");
                                FetchControl::Retry
                            }
                        }
                    }
                }
            },
            |_fetch, ()| {},
        ));

        let actor = Arc::new(CommandActor::spawn({
            let inner = Arc::clone(&inner);
            let connection = connection.clone();
            move |command: Command| {
                let inner = Arc::clone(&inner);
                let connection = connection.clone();
                async move { apply_command(&inner, &connection, command).await }
            }
        }));

        let settings_subscription = settings_notifiers.account_number.subscribe({
            let inner = Arc::clone(&inner);
            let fetcher = Arc::clone(&expiry_fetcher);
            let actor = Arc::clone(&actor);
            move |new_number: &Option<String>| {
                if let Some(fetch) = inner.handle_new_account_number(new_number.clone()) {
                    let _ = fetcher.request(fetch);
                }
                let _ = actor.enqueue(Command::FetchHistory);
            }
        });

        Self {
            inner,
            actor,
            expiry_fetcher,
            settings_notifiers,
            settings_subscription,
        }
    }

    pub fn notifiers(&self) -> Arc<AccountNotifiers> {
        Arc::clone(&self.inner.notifiers)
    }

    pub fn create_account(&self) -> Result<(), Closed> {
        self.actor.enqueue(Command::CreateAccount)
    }

    pub fn login(&self, account: String) -> Result<(), Closed> {
        self.actor.enqueue(Command::Login(account))
    }

    pub fn logout(&self) -> Result<(), Closed> {
        self.actor.enqueue(Command::Logout)
    }

    pub fn remove_from_history(&self, account: String) -> Result<(), Closed> {
        self.actor.enqueue(Command::RemoveFromHistory(account))
    }

    /// Re-fetch the expiry of the current account, if any.
    pub fn fetch_account_expiry(&self) -> Result<(), Closed> {
        let fetch = {
            let state = self.inner.lock();
            state
                .account_number
                .clone()
                .map(|account| ExpiryFetch { account })
        };
        match fetch {
            Some(fetch) => self.expiry_fetcher.request(fetch),
            None => Ok(()),
        }
    }

    /// Arm an invalidation: `stale_expiry` is known out of date (e.g.
    /// a voucher was just redeemed). Only arms if it still matches the
    /// cached value.
    pub fn invalidate_account_expiry(&self, stale_expiry: DateTime<Utc>) -> Result<(), Closed> {
        let fetch = {
            let mut state = self.inner.lock();
            if state.account_expiry == Some(stale_expiry) {
                state.old_account_expiry = Some(stale_expiry);
                state
                    .account_number
                    .clone()
                    .map(|account| ExpiryFetch { account })
            } else {
                None
            }
        };
        match fetch {
            Some(fetch) => self.expiry_fetcher.request(fetch),
            None => Ok(()),
        }
    }

    pub async fn shutdown(&self) {
        self.settings_notifiers
            .account_number
            .unsubscribe(self.settings_subscription);
        self.actor.shutdown().await;
        self.expiry_fetcher.shutdown().await;

        let notifiers = &self.inner.notifiers;
        notifiers.account_number.unsubscribe_all();
        notifiers.account_expiry.unsubscribe_all();
        notifiers.account_history.unsubscribe_all();
        notifiers.login_status.unsubscribe_all();
    }
}

async fn apply_command(inner: &Arc<Inner>, connection: &DaemonConnection, command: Command) {
    match command {
        Command::CreateAccount => {
            {
                let mut state = inner.lock();
                state.newly_created = true;
                state.created_account_expiry = None;
            }
            // The daemon applies the new account to its settings; the
            // number flows back through the settings push.
            if let Err(e) = connection.wait().await.create_account().await {
                warn!(error = %e, "account creation failed");
            }
        }
        Command::Login(account) => {
            let already_current = {
                let mut state = inner.lock();
                if state.account_number.as_deref() == Some(account.as_str()) {
                    true
                } else {
                    Inner::mark_account_not_new(&mut state);
                    false
                }
            };
            if !already_current {
                if let Err(e) = connection.wait().await.set_account(Some(account)).await {
                    warn!(error = %e, "login failed");
                }
            }
        }
        Command::Logout => {
            {
                let mut state = inner.lock();
                Inner::mark_account_not_new(&mut state);
            }
            if let Err(e) = connection.wait().await.set_account(None).await {
                warn!(error = %e, "logout failed");
            }
        }
        Command::RemoveFromHistory(account) => {
            let daemon = connection.wait().await;
            if let Err(e) = daemon.remove_account_from_history(&account).await {
                warn!(error = %e, "removing account from history failed");
            }
            fetch_history(inner, connection).await;
        }
        Command::FetchHistory => fetch_history(inner, connection).await,
    }
}

async fn fetch_history(inner: &Arc<Inner>, connection: &DaemonConnection) {
    match connection.wait().await.get_account_history().await {
        Ok(history) => inner.set_history(history),
        Err(e) => warn!(error = %e, "account history fetch failed"),
    }
}
