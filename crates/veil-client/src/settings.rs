// ── Settings mirror ──
//
// Rebuilds the settings snapshot from events and re-derives the same
// narrow change notifications the service side publishes, so UI
// consumers can subscribe to just the facet they render.

use std::sync::Arc;

use veil_ipc::{Event, EventKind, Request, RequestSender, SendRequestError};
use veil_model::{DnsOptions, RelaySettings, Settings};
use veil_sync::EventNotifier;

use crate::dispatcher::EventDispatcher;

pub struct SettingsNotifiers {
    pub account_number: EventNotifier<Option<String>>,
    pub dns_options: EventNotifier<Option<DnsOptions>>,
    pub relay_settings: EventNotifier<Option<RelaySettings>>,
    pub settings: EventNotifier<Option<Settings>>,
}

pub struct SettingsListener {
    requests: RequestSender,
    notifiers: Arc<SettingsNotifiers>,
}

impl SettingsListener {
    pub fn new(requests: RequestSender, dispatcher: &EventDispatcher) -> Self {
        let notifiers = Arc::new(SettingsNotifiers {
            account_number: EventNotifier::new(None),
            dns_options: EventNotifier::new(None),
            relay_settings: EventNotifier::new(None),
            settings: EventNotifier::new(None),
        });

        dispatcher.register_handler(EventKind::SettingsUpdate, {
            let notifiers = Arc::clone(&notifiers);
            move |event| {
                if let Event::SettingsUpdate(settings) = event {
                    notifiers
                        .account_number
                        .notify_if_changed(settings.as_ref().and_then(|s| s.account_number.clone()));
                    notifiers.dns_options.notify_if_changed(
                        settings.as_ref().map(|s| s.tunnel_options.dns_options.clone()),
                    );
                    notifiers
                        .relay_settings
                        .notify_if_changed(settings.as_ref().map(|s| s.relay_settings.clone()));
                    notifiers.settings.notify(settings.clone());
                }
            }
        });

        Self {
            requests,
            notifiers,
        }
    }

    pub fn notifiers(&self) -> Arc<SettingsNotifiers> {
        Arc::clone(&self.notifiers)
    }

    pub fn settings(&self) -> Option<Settings> {
        self.notifiers.settings.latest()
    }

    pub fn allow_lan(&self) -> bool {
        self.settings().is_some_and(|s| s.allow_lan)
    }

    pub fn set_allow_lan(&self, allow: bool) -> Result<(), SendRequestError> {
        self.requests.send(&Request::SetAllowLan(allow))
    }

    pub fn wireguard_mtu(&self) -> Option<u16> {
        self.settings().and_then(|s| s.tunnel_options.wireguard.mtu)
    }

    pub fn set_wireguard_mtu(&self, mtu: Option<u16>) -> Result<(), SendRequestError> {
        self.requests.send(&Request::SetWireguardMtu(mtu))
    }

    pub fn teardown(&self) {
        self.notifiers.account_number.unsubscribe_all();
        self.notifiers.dns_options.unsubscribe_all();
        self.notifiers.relay_settings.unsubscribe_all();
        self.notifiers.settings.unsubscribe_all();
    }
}
