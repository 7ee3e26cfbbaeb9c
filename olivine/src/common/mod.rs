//! Shared infrastructure: values, ordering, locking, events, and time.

pub mod event_bus;
pub(crate) mod lock;
pub mod sort_order;
pub mod util;
pub mod value;

pub use event_bus::{OlivineEventBus, SubscriberRef};
pub use sort_order::SortOrder;

// Re-exported so callers can build big-number keys and values without
// depending on the underlying crates directly.
pub use bigdecimal::BigDecimal;
pub use num_bigint::BigInt;
pub use util::{
    atomic, get_current_time, get_current_time_or_zero, Atomic, ReadExecutor, WriteExecutor,
};
pub use value::Value;

pub(crate) use lock::{KeyLockRegistry, LockHandle};
