use super::Sweep;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info};

/// Drives registered sweeps on their intervals until the shutdown signal
/// flips. Each sweep gets its own task; a failed run is logged and the
/// interval keeps ticking.
pub struct SweepScheduler {
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl SweepScheduler {
    pub fn new(shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a sweep. The first run happens one full interval after
    /// startup, not immediately.
    pub fn spawn(&mut self, sweep: Arc<dyn Sweep>, period: Duration) {
        let mut shutdown_rx = self.shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            info!(sweep = sweep.name(), ?period, "sweep scheduled");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match sweep.run().await {
                            Ok(0) => debug!(sweep = sweep.name(), "sweep found nothing to do"),
                            Ok(items) => info!(sweep = sweep.name(), items, "sweep completed"),
                            Err(err) => error!(sweep = sweep.name(), error = %err, "sweep failed"),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(sweep = sweep.name(), "sweep stopped");
        });

        self.handles.push(handle);
    }

    /// Wait for every sweep task to observe the shutdown signal and finish.
    pub async fn shutdown(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "sweep task failed during shutdown");
            }
        }
        info!("all sweeps stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingSweep {
        runs: AtomicU64,
    }

    #[async_trait]
    impl Sweep for CountingSweep {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self) -> Result<u64, ServiceError> {
            Ok(self.runs.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[tokio::test]
    async fn sweeps_tick_until_shutdown() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweep = Arc::new(CountingSweep {
            runs: AtomicU64::new(0),
        });

        let mut scheduler = SweepScheduler::new(shutdown_rx);
        scheduler.spawn(sweep.clone(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(110)).await;
        shutdown_tx.send(true).unwrap();
        scheduler.shutdown().await;

        let runs = sweep.runs.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least two runs, got {runs}");

        // No further ticks after shutdown
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(sweep.runs.load(Ordering::SeqCst), runs);
    }
}
