// veil-sync: Primitives the state synchronization layer is built from.
//
// Leaves first: an observable value cell, a capped exponential backoff
// schedule, a single-slot conflated channel, single-consumer command
// actors, the poll-until-stable backoff fetcher, and the await-cell
// holding the intermittent daemon handle.

pub mod actor;
pub mod await_cell;
pub mod backoff;
pub mod conflated;
pub mod fetcher;
pub mod notifier;

// ── Primary re-exports ──────────────────────────────────────────────
pub use actor::{Closed, CommandActor, ConflatedActor};
pub use await_cell::AwaitCell;
pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use fetcher::{FetchControl, Fetcher};
pub use notifier::{EventNotifier, SubscriptionId};
