//! Best-effort telemetry export.
//!
//! Snapshots go to a worker thread through a bounded channel. The sort loop
//! only ever `try_send`s: a full queue drops the snapshot, and sink failures
//! are logged by the worker and never reported back.
use crossbeam_channel as xch;
use sorter_traits::TelemetrySink;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub good_count: u64,
    pub bad_count: u64,
    pub avg_weight_g: f64,
}

/// Delivery counters shared with the worker.
#[derive(Debug, Default)]
pub struct TelemetryCounters {
    pub sent: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

pub struct TelemetryWorker {
    tx: Option<xch::Sender<TelemetrySnapshot>>,
    counters: Arc<TelemetryCounters>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TelemetryWorker {
    pub fn spawn<S: TelemetrySink + Send + 'static>(mut sink: S, queue: usize) -> std::io::Result<Self> {
        let (tx, rx) = xch::bounded::<TelemetrySnapshot>(queue.max(1));
        let counters = Arc::new(TelemetryCounters::default());
        let c = counters.clone();

        let join_handle = std::thread::Builder::new()
            .name("telemetry".into())
            .spawn(move || {
                // Ends when the sender side is dropped
                for snap in rx {
                    match sink.push(snap.good_count, snap.bad_count, snap.avg_weight_g) {
                        Ok(()) => {
                            c.sent.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(good = snap.good_count, bad = snap.bad_count, "telemetry pushed");
                        }
                        Err(e) => {
                            c.failed.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(error = %e, "telemetry push failed");
                        }
                    }
                }
                tracing::trace!("telemetry worker exiting cleanly");
            })?;

        Ok(Self {
            tx: Some(tx),
            counters,
            join_handle: Some(join_handle),
        })
    }

    /// Queue a snapshot without blocking. Returns false when it was dropped.
    pub fn submit(&self, snap: TelemetrySnapshot) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(snap) {
            Ok(()) => true,
            Err(xch::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("telemetry queue full; snapshot dropped");
                false
            }
            Err(xch::TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn counters(&self) -> Arc<TelemetryCounters> {
        self.counters.clone()
    }

    /// Close the queue and wait for pending pushes to finish.
    pub fn shutdown(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("telemetry worker joined"),
                Err(e) => tracing::warn!(?e, "telemetry worker panicked during shutdown"),
            }
        }
    }
}

impl Drop for TelemetryWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter_traits::BoxError;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recording(Arc<Mutex<Vec<(u64, u64)>>>);
    impl TelemetrySink for Recording {
        fn push(&mut self, good: u64, bad: u64, _avg: f64) -> Result<(), BoxError> {
            self.0.lock().unwrap().push((good, bad));
            Ok(())
        }
    }

    struct Failing;
    impl TelemetrySink for Failing {
        fn push(&mut self, _: u64, _: u64, _: f64) -> Result<(), BoxError> {
            Err("network unreachable".into())
        }
    }

    fn snap(good: u64) -> TelemetrySnapshot {
        TelemetrySnapshot {
            good_count: good,
            bad_count: 1,
            avg_weight_g: 0.2,
        }
    }

    #[test]
    fn shutdown_flushes_queued_snapshots() {
        let rec = Recording::default();
        let mut w = TelemetryWorker::spawn(rec.clone(), 8).unwrap();
        assert!(w.submit(snap(1)));
        assert!(w.submit(snap(2)));
        w.shutdown();
        assert_eq!(*rec.0.lock().unwrap(), vec![(1, 1), (2, 1)]);
        assert_eq!(w.counters().sent.load(Ordering::Relaxed), 2);
        assert!(!w.submit(snap(3)));
    }

    #[test]
    fn failures_are_counted_not_propagated() {
        let mut w = TelemetryWorker::spawn(Failing, 2).unwrap();
        w.submit(snap(1));
        w.shutdown();
        assert_eq!(w.counters().failed.load(Ordering::Relaxed), 1);
    }
}
