// ── In-process transport ──
//
// Frames flow over unbounded channels: events from the service to each
// listener, requests from each client to the service. A listener sink
// is the opaque reply address — delivery to a gone peer reports
// `Disconnected` so the registry can prune the handle.

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::codec::{self, CodecError};
use crate::event::Event;
use crate::request::Request;

// ── Events: service → listener ──────────────────────────────────────

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The remote endpoint is gone. Non-fatal: the caller prunes the
    /// handle and carries on.
    #[error("listener endpoint disconnected")]
    Disconnected,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// The service-held end of one listener connection: an opaque reply
/// address with a stable identity.
#[derive(Debug, Clone)]
pub struct ListenerSink {
    id: Uuid,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ListenerSink {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Encode and deliver one event to this listener.
    pub fn deliver(&self, event: &Event) -> Result<(), DeliveryError> {
        let frame = codec::encode_event(event)?;
        self.tx.send(frame).map_err(|_| DeliveryError::Disconnected)
    }
}

/// The client-held end: decoded events in delivery order.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl EventStream {
    /// Next event, or `None` once the service side is gone.
    /// A malformed frame surfaces as an error and the stream continues.
    pub async fn next(&mut self) -> Option<Result<Event, CodecError>> {
        let frame = self.rx.recv().await?;
        Some(codec::decode_event(&frame))
    }
}

/// One listener connection.
pub fn event_channel() -> (ListenerSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ListenerSink {
            id: Uuid::new_v4(),
            tx,
        },
        EventStream { rx },
    )
}

// ── Requests: client → service ──────────────────────────────────────

#[derive(Debug, Error)]
pub enum SendRequestError {
    #[error("service endpoint is gone")]
    Disconnected,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// An encoded request plus transport metadata. Only `RegisterListener`
/// carries a reply address.
pub struct RequestEnvelope {
    frame: Vec<u8>,
    reply_to: Option<ListenerSink>,
}

#[derive(Clone)]
pub struct RequestSender {
    tx: mpsc::UnboundedSender<RequestEnvelope>,
}

impl RequestSender {
    pub fn send(&self, request: &Request) -> Result<(), SendRequestError> {
        self.send_envelope(request, None)
    }

    /// Send `RegisterListener` with the reply address the service will
    /// broadcast events to.
    pub fn register_listener(&self, reply_to: ListenerSink) -> Result<(), SendRequestError> {
        self.send_envelope(&Request::RegisterListener, Some(reply_to))
    }

    fn send_envelope(
        &self,
        request: &Request,
        reply_to: Option<ListenerSink>,
    ) -> Result<(), SendRequestError> {
        let frame = codec::encode_request(request)?;
        self.tx
            .send(RequestEnvelope { frame, reply_to })
            .map_err(|_| SendRequestError::Disconnected)
    }
}

/// The service-held end of the request flow.
pub struct RequestStream {
    rx: mpsc::UnboundedReceiver<RequestEnvelope>,
}

impl RequestStream {
    /// Next request with its optional reply address, or `None` once all
    /// senders are gone. Malformed frames surface as errors.
    pub async fn next(&mut self) -> Option<(Result<Request, CodecError>, Option<ListenerSink>)> {
        let envelope = self.rx.recv().await?;
        Some((codec::decode_request(&envelope.frame), envelope.reply_to))
    }
}

pub fn request_channel() -> (RequestSender, RequestStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RequestSender { tx }, RequestStream { rx })
}
