// veil-ipc: The typed message boundary between the service and its
// listeners. Commands and events are single discriminated messages
// (type tag + payload) carried over any reliable ordered one-way
// transport; the in-process channel transport here is what tests and
// same-process UIs use.

pub mod codec;
pub mod event;
pub mod request;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use codec::CodecError;
pub use event::{Event, EventKind};
pub use request::Request;
pub use transport::{
    DeliveryError, EventStream, ListenerSink, RequestSender, RequestStream, SendRequestError,
    event_channel, request_channel,
};
