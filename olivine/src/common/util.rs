use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

/// A thread-safe, shared, mutable value.
///
/// Cloning an `Atomic<T>` produces another handle to the same underlying
/// value, protected by a `parking_lot` read-write lock.
pub type Atomic<T> = Arc<RwLock<T>>;

/// Wraps a value into an [`Atomic`] handle.
pub fn atomic<T>(value: T) -> Atomic<T> {
    Arc::new(RwLock::new(value))
}

/// Executes a closure with read access to a lock-protected value.
pub trait ReadExecutor<T> {
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R;
}

/// Executes a closure with write access to a lock-protected value.
pub trait WriteExecutor<T> {
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;
}

impl<T> ReadExecutor<T> for Atomic<T> {
    fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.read();
        f(&guard)
    }
}

impl<T> WriteExecutor<T> for Atomic<T> {
    fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.write();
        f(&mut guard)
    }
}

/// Returns the current time as milliseconds since the Unix epoch.
pub fn get_current_time() -> Result<u128, SystemTimeError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
}

/// Returns the current time in milliseconds, or zero if the system clock
/// is unavailable.
pub fn get_current_time_or_zero() -> u128 {
    get_current_time().unwrap_or_else(|err| {
        log::warn!("Failed to read system clock: {}. Defaulting to 0.", err);
        0
    })
}
