//! Tick loop with cooperative shutdown.

use tokio::sync::watch;
use tracing::{info, warn};

use tiergrid_core::Tick;
use tiergrid_dispatch::{BurstSource, Dispatcher};

/// Step `dispatcher` up to `total_ticks` times.
///
/// The shutdown flag is checked between ticks, so an abort never leaves a
/// tick half-applied. Returns the number of ticks completed.
pub async fn drive<B: BurstSource>(
    dispatcher: &mut Dispatcher<B>,
    total_ticks: Tick,
    shutdown: watch::Receiver<bool>,
) -> Tick {
    info!(total_ticks, "simulation started");

    for _ in 0..total_ticks {
        if *shutdown.borrow() {
            warn!(completed = dispatcher.tick(), total_ticks, "simulation aborted");
            break;
        }
        let report = dispatcher.step();
        if report.generated > 0 {
            tracing::debug!(
                tick = report.tick,
                generated = report.generated,
                admitted = report.admitted,
                "tick completed"
            );
        }
        tokio::task::yield_now().await;
    }

    dispatcher.tick()
}
