//! Sync iterator for consuming notifications from a streaming subscription
//!
//! Provides a blocking iterator interface for processing notifications
//! without requiring async/await or a callback.

use std::sync::mpsc;
use std::time::Duration;

use mobius_stream::Notification;

/// Blocking iterator over decoded notifications
///
/// `next()` blocks until a notification arrives or the listener has exited.
/// Use `try_recv()` for non-blocking access.
pub struct NotificationIterator {
    rx: mpsc::Receiver<Notification>,
}

impl NotificationIterator {
    pub(crate) fn new(rx: mpsc::Receiver<Notification>) -> Self {
        Self { rx }
    }

    /// Block until a notification is available
    ///
    /// Returns `None` once the listener has exited.
    pub fn recv(&self) -> Option<Notification> {
        self.rx.recv().ok()
    }

    /// Try to receive a notification without blocking
    pub fn try_recv(&self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Block until a notification is available or `timeout` expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Notification> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Like [`recv_timeout`](Self::recv_timeout), but tells a timeout apart from a
    /// listener that has exited
    pub fn wait(&self, timeout: Duration) -> Result<Notification, mpsc::RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Non-blocking iterator over the notifications currently queued
    pub fn try_iter(&self) -> impl Iterator<Item = Notification> + '_ {
        self.rx.try_iter()
    }
}

impl Iterator for NotificationIterator {
    type Item = Notification;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
