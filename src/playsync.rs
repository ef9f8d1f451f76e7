// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A cancel flag shared between a background loop and its owner. The loop checks it
/// at least once per tick and exits once it is set.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelHandle {
    pub fn new() -> CancelHandle {
        CancelHandle {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// True once the owner has asked the loop to stop.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Blocks until the handle is cancelled.
    pub fn wait(&self) {
        let (flag, condvar) = &*self.inner;
        let mut stopped = flag.lock();
        condvar.wait_while(&mut stopped, |stopped| !*stopped);
    }

    /// Sleeps for up to `timeout`, waking early on cancel. Returns whether the handle
    /// was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let mut stopped = flag.lock();
        if !*stopped {
            let _ = condvar.wait_while_for(&mut stopped, |stopped| !*stopped, timeout);
        }
        *stopped
    }

    /// Asks the loop to stop and wakes any waiters.
    pub fn cancel(&self) {
        let (flag, condvar) = &*self.inner;
        let mut stopped = flag.lock();
        if !*stopped {
            *stopped = true;
            condvar.notify_all();
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_wait_returns_after_cancel() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());

        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.wait())
        };

        handle.cancel();
        waiter.join().unwrap();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let cancel_handle = CancelHandle::new();
        let start = Instant::now();
        assert!(!cancel_handle.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_timeout_wakes_on_cancel() {
        let cancel_handle = CancelHandle::new();
        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || cancel_handle.wait_timeout(Duration::from_secs(30)))
        };

        cancel_handle.cancel();
        assert!(join.join().unwrap());
        // Already cancelled handles return immediately.
        assert!(cancel_handle.wait_timeout(Duration::from_secs(30)));
    }
}
