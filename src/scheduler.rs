//! Long-running poll loops.
//!
//! Each loop runs one cycle, then sleeps a fixed interval. A failed cycle is
//! logged and retried after the same interval, so the loop never exits on
//! its own; it stops only when its shutdown flag is set.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::PipelineError;

/// One pass of a pipeline, as driven by a poll loop.
#[async_trait]
pub trait PollCycle: Send + Sync {
    /// Loop name for logs.
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> Result<(), PipelineError>;
}

/// Drive `cycle` until `shutdown` is set.
pub async fn run_loop(cycle: Arc<dyn PollCycle>, interval: Duration, shutdown: Arc<AtomicBool>) {
    let name = cycle.name();
    info!(interval_secs = interval.as_secs(), "{name} loop started");

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("{name} loop shutting down");
            return;
        }

        if let Err(e) = cycle.run_once().await {
            error!(error = %e, "{name} cycle failed, retrying in {}s", interval.as_secs());
        }

        tokio::time::sleep(interval).await;
    }
}

/// Spawn a poll loop. Returns its handle and shutdown flag.
pub fn spawn_loop(
    cycle: Arc<dyn PollCycle>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = tokio::spawn(run_loop(cycle, interval, Arc::clone(&shutdown)));
    (handle, shutdown)
}
