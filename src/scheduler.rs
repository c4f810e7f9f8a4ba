//! Background periodic flush
//!
//! [`Reporter`] moves a client behind a mutex and flushes it from a worker
//! thread once per configured interval. Producers keep recording through
//! [`Reporter::with_client`]; the lock is held for a whole flush so a pass
//! never observes a half-applied update.

use crate::client::Collectd;
use crate::metrics::FlushReport;
use crate::system::Clock;
use crate::transport::Transport;
use log::{debug, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Periodic flush driver
pub struct Reporter<T: Transport, C: Clock> {
    client: Arc<Mutex<Collectd<T, C>>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<T, C> Reporter<T, C>
where
    T: Transport + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Start flushing `client` every configured interval
    pub fn start(client: Collectd<T, C>) -> Self {
        let interval = client.config().interval;
        Self::start_with_interval(client, interval)
    }

    /// Start flushing `client` every `interval`
    pub fn start_with_interval(client: Collectd<T, C>, interval: Duration) -> Self {
        let client = Arc::new(Mutex::new(client));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let worker_client = Arc::downgrade(&client);
        let worker = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => match worker_client.upgrade() {
                    Some(client) => {
                        lock(&client).flush();
                    }
                    None => break,
                },
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        debug!("Reporter started, interval {:?}", interval);

        Self {
            client,
            stop: Some(stop_tx),
            worker: Some(worker),
        }
    }

    /// Run `f` with exclusive access to the client
    pub fn with_client<R>(&self, f: impl FnOnce(&mut Collectd<T, C>) -> R) -> R {
        f(&mut lock(&self.client))
    }

    /// Flush now, outside the regular schedule
    pub fn flush_now(&self) -> FlushReport {
        lock(&self.client).flush()
    }

    /// Stop the schedule, flush one last time, and hand the client back
    ///
    /// The client is `None` only if another strong handle to it is still
    /// alive; the final flush happens either way.
    pub fn stop(mut self) -> (Option<Collectd<T, C>>, FlushReport) {
        self.halt();
        let report = lock(&self.client).flush();
        let client = Arc::clone(&self.client);
        drop(self);

        let client = Arc::try_unwrap(client)
            .ok()
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner));
        debug!("Reporter stopped");
        (client, report)
    }
}

impl<T: Transport, C: Clock> Reporter<T, C> {
    fn halt(&mut self) {
        if let Some(stop) = self.stop.take() {
            // A worker that already exited has dropped the receiver
            let _ = stop.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Reporter thread panicked");
            }
        }
    }
}

impl<T: Transport, C: Clock> Drop for Reporter<T, C> {
    fn drop(&mut self) {
        self.halt();
    }
}
