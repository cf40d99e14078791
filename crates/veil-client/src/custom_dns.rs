// ── Custom DNS requests ──
//
// Pure command surface: the authoritative list lives in the service's
// DNS cache, and its observable state arrives through the settings
// mirror's `dns_options` facet.

use std::net::IpAddr;

use veil_ipc::{Request, RequestSender, SendRequestError};

pub struct CustomDns {
    requests: RequestSender,
}

impl CustomDns {
    pub fn new(requests: RequestSender) -> Self {
        Self { requests }
    }

    pub fn add_server(&self, server: IpAddr) -> Result<(), SendRequestError> {
        self.requests.send(&Request::AddCustomDnsServer(server))
    }

    pub fn remove_server(&self, server: IpAddr) -> Result<(), SendRequestError> {
        self.requests.send(&Request::RemoveCustomDnsServer(server))
    }

    pub fn replace_server(
        &self,
        old_server: IpAddr,
        new_server: IpAddr,
    ) -> Result<(), SendRequestError> {
        self.requests.send(&Request::ReplaceCustomDnsServer {
            old_server,
            new_server,
        })
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<(), SendRequestError> {
        self.requests.send(&Request::SetCustomDnsEnabled(enabled))
    }
}
