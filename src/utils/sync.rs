//! Utilities for concurrency.

use std::sync::Mutex as StdMutex;

pub use std::sync::MutexGuard;


//------------ Mutex ---------------------------------------------------------

/// A wrapper around a std mutex that panics if it is poisoned.
///
/// A poisoned mutex means some thread panicked while holding the lock. In
/// this case, the data behind the lock may be in any state and there is
/// nothing sensible we can do about it.
#[derive(Debug, Default)]
pub struct Mutex<T: ?Sized>(StdMutex<T>);

impl<T> Mutex<T> {
    /// Creates a new mutex in unlocked state.
    pub fn new(t: T) -> Self {
        Mutex(StdMutex::new(t))
    }
}

impl<T: ?Sized> Mutex<T> {
    /// Acquires the mutex.
    ///
    /// The current thread will be blocked until nobody else holds the mutex.
    ///
    /// # Panics
    ///
    /// The method panics if the lock is poisoned. It may also panic if the
    /// current thread already holds the lock.
    pub fn lock(&self) -> MutexGuard<T> {
        self.0.lock().expect("acquiring a poisoned mutex")
    }
}
