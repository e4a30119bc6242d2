//! Background worker thread for the notification listener
//!
//! Spawns a thread with its own single-threaded tokio runtime that drives the
//! async [`NotificationListener`] while the owning [`MobiusSubscription`]
//! stays fully synchronous.
//!
//! [`MobiusSubscription`]: crate::MobiusSubscription

use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mobius_stream::{
    stop_channel, ListenerExit, Notification, NotificationListener, NotificationTransport,
    StopTrigger,
};
use onem2m_client::SubscriptionConfig;

/// Handle to a running listener thread
pub(crate) struct ListenerWorker {
    stop: StopTrigger,
    exit_rx: mpsc::Receiver<ListenerExit>,
    handle: JoinHandle<()>,
}

/// Spawns the background listener thread
///
/// The thread owns the transport and the handler; both are dropped when the
/// listener exits.
pub(crate) fn spawn_listener_worker<T, F>(
    config: SubscriptionConfig,
    transport: T,
    handler: F,
) -> io::Result<ListenerWorker>
where
    T: NotificationTransport + 'static,
    F: FnMut(Notification) + Send + 'static,
{
    let (stop, signal) = stop_channel();
    let (exit_tx, exit_rx) = mpsc::channel();

    let handle = thread::Builder::new()
        .name(format!("mobius-listener-{}", config.endpoint()))
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create tokio runtime for listener worker: {}", e);
                    let _ = exit_tx.send(ListenerExit::ConnectFailed(format!(
                        "runtime unavailable: {}",
                        e
                    )));
                    return;
                }
            };

            let listener = NotificationListener::new(transport, &config);
            tracing::debug!("Listener worker started for topic '{}'", listener.topic());

            let exit = rt.block_on(listener.run(handler, signal));
            tracing::debug!("Listener worker exiting: {:?}", exit);

            // Nobody waits for the exit once the subscription has given up on us
            let _ = exit_tx.send(exit);
        })?;

    Ok(ListenerWorker {
        stop,
        exit_rx,
        handle,
    })
}

impl ListenerWorker {
    /// Ask the listener to stop and wait up to `timeout` for it to confirm.
    ///
    /// Returns `None` if the listener did not confirm in time. A listener that
    /// already exited on its own confirms immediately with its exit reason.
    pub(crate) fn stop(&self, timeout: Duration) -> Option<ListenerExit> {
        self.stop.trigger();
        self.exit_rx.recv_timeout(timeout).ok()
    }

    /// Wait for the thread to finish
    pub(crate) fn join(self) {
        if self.handle.join().is_err() {
            tracing::error!("Listener worker thread panicked");
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
