//! Bounded-time wrapper around venue calls.
//!
//! A venue that never answers would otherwise stall the tick forever. With a
//! timeout set, calls run on one long-lived worker thread per venue and the
//! caller gives up after the deadline. While a timed-out call is still stuck
//! on the worker, further calls to that venue fail fast instead of queueing.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::error::BotError;
use crate::ports::broker_port::BrokerPort;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Debug)]
struct Worker {
    jobs: Sender<Job>,
    busy: Arc<AtomicBool>,
}

impl Worker {
    fn spawn(venue: &str) -> Result<Self, BotError> {
        let (jobs, queue) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name(format!("venue-{venue}"))
            .spawn(move || {
                for job in queue {
                    job();
                }
            })?;
        Ok(Self {
            jobs,
            busy: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct VenueGuard {
    timeout: Option<Duration>,
    workers: Arc<Mutex<HashMap<String, Worker>>>,
}

impl VenueGuard {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            workers: Arc::default(),
        }
    }

    /// No deadline: calls run inline on the session thread.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn call<T, F>(
        &self,
        venue: &Arc<dyn BrokerPort>,
        operation: &str,
        f: F,
    ) -> Result<T, BotError>
    where
        T: Send + 'static,
        F: FnOnce(&Arc<dyn BrokerPort>) -> Result<T, BotError> + Send + 'static,
    {
        let Some(timeout) = self.timeout else {
            return f(venue);
        };

        let name = venue.name().to_string();
        let (tx, rx) = mpsc::channel();
        self.dispatch(&name, operation, timeout, {
            let venue = Arc::clone(venue);
            move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| f(&venue)));
                // The receiver is gone once the caller has timed out.
                let _ = tx.send(result);
            }
        })?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(venue_failure(&name, format!("{operation} panicked"))),
            Err(RecvTimeoutError::Timeout) => Err(timed_out(&name, operation, timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                Err(venue_failure(&name, format!("{operation}: worker stopped")))
            }
        }
    }

    /// Queue `job` on the venue's worker, spawning it on first use.
    fn dispatch(
        &self,
        name: &str,
        operation: &str,
        timeout: Duration,
        job: impl FnOnce() + Send + 'static,
    ) -> Result<(), BotError> {
        let mut workers = self
            .workers
            .lock()
            .map_err(|_| venue_failure(name, "venue workers poisoned".into()))?;
        if !workers.contains_key(name) {
            workers.insert(name.to_string(), Worker::spawn(name)?);
        }
        let Some(worker) = workers.get(name) else {
            return Err(venue_failure(name, "venue worker missing".into()));
        };

        if worker.busy.swap(true, Ordering::AcqRel) {
            return Err(timed_out(name, operation, timeout));
        }
        let busy = Arc::clone(&worker.busy);
        let job: Job = Box::new(move || {
            job();
            busy.store(false, Ordering::Release);
        });
        if worker.jobs.send(job).is_err() {
            workers.remove(name);
            return Err(venue_failure(name, format!("{operation}: worker stopped")));
        }
        Ok(())
    }
}

fn timed_out(venue: &str, operation: &str, timeout: Duration) -> BotError {
    BotError::Timeout {
        venue: venue.to_string(),
        operation: operation.to_string(),
        millis: timeout.as_millis(),
    }
}

fn venue_failure(venue: &str, reason: String) -> BotError {
    BotError::Venue {
        venue: venue.to_string(),
        instrument: String::new(),
        reason,
    }
}
