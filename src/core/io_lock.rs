//! Process-wide read/write lock that every filesystem mutation goes through.
//!
//! Reads take a shared guard; creates, moves, deletes, and archive writes take
//! the exclusive guard. The thread holding the write guard may take `write()` or
//! `read()` again without deadlocking. There is no upgrade from read to write: a
//! thread holding only a read guard must drop it before calling `write()`, and
//! must re-check whatever it observed under the read guard.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::ThreadId;
use tokio::sync::watch;
use tracing::trace;

#[derive(Debug)]
struct WriterState {
    thread: ThreadId,
    depth: usize,
}

pub struct IoLock {
    lock: RwLock<()>,
    writer: Mutex<Option<WriterState>>,
    state: watch::Sender<bool>,
}

/// Shared access. Releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct IoReadGuard<'a> {
    _guard: Option<RwLockReadGuard<'a, ()>>,
}

/// Exclusive access. Releases on drop, including during unwinding.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct IoWriteGuard<'a> {
    lock: &'a IoLock,
    guard: Option<RwLockWriteGuard<'a, ()>>,
}

impl IoLock {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            lock: RwLock::new(()),
            writer: Mutex::new(None),
            state,
        }
    }

    fn held_by_current_thread(&self) -> bool {
        let current = std::thread::current().id();
        self.writer
            .lock()
            .as_ref()
            .is_some_and(|w| w.thread == current)
    }

    pub fn read(&self) -> IoReadGuard<'_> {
        if self.held_by_current_thread() {
            return IoReadGuard { _guard: None };
        }

        let guard = self.lock.read_recursive();
        trace!("Read locked");
        IoReadGuard {
            _guard: Some(guard),
        }
    }

    pub fn write(&self) -> IoWriteGuard<'_> {
        if self.held_by_current_thread() {
            if let Some(w) = self.writer.lock().as_mut() {
                w.depth += 1;
            }
            return IoWriteGuard {
                lock: self,
                guard: None,
            };
        }

        let guard = self.lock.write();
        *self.writer.lock() = Some(WriterState {
            thread: std::thread::current().id(),
            depth: 1,
        });
        trace!("Write locked");
        self.state.send_replace(true);

        IoWriteGuard {
            lock: self,
            guard: Some(guard),
        }
    }

    /// Runs `action` under the read lock.
    pub fn with_read<T>(&self, action: impl FnOnce() -> T) -> T {
        let _guard = self.read();
        action()
    }

    /// Runs `action` under the write lock.
    pub fn with_write<T>(&self, action: impl FnOnce() -> T) -> T {
        let _guard = self.write();
        action()
    }

    /// Busy signal for display purposes: `true` while a writer holds the lock.
    pub fn state(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    pub fn is_write_locked(&self) -> bool {
        self.lock.is_locked_exclusive()
    }
}

impl Default for IoLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IoWriteGuard<'_> {
    fn drop(&mut self) {
        let mut writer = self.lock.writer.lock();
        let released = match writer.as_mut() {
            Some(w) if w.depth > 1 => {
                w.depth -= 1;
                false
            }
            _ => {
                *writer = None;
                true
            }
        };
        drop(writer);

        if released {
            drop(self.guard.take());
            trace!("Write unlocked");
            self.lock.state.send_replace(false);
        }
    }
}
